//! The host value model walked by the mapping engine.
//!
//! `Value` stands in for the host application's data: scalars, ordered
//! sequences (including tuples), sets, key/value maps, and records with
//! named fields. Input mapping reads these via accessors; output
//! evaluation builds them back up from facts.
//!
//! All variants order and hash structurally, so values can live inside
//! `Value::Set` and key `Value::Map` without extra plumbing.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use aspio_dsl::ast::Name;
use aspio_dsl::Term;

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "tag", content = "value", rename_all = "snake_case")]
pub enum Value {
    Int(i64),
    Str(String),
    /// An ordered, indexable collection; also the result of constructing
    /// an object without a constructor name (a plain tuple).
    Seq(Vec<Value>),
    Set(BTreeSet<Value>),
    Map(BTreeMap<Value, Value>),
    /// A named record with named fields, the analogue of a host object.
    Record {
        constructor: Name,
        fields: BTreeMap<Name, Value>,
    },
}

impl Value {
    pub fn record<N, F, V>(constructor: N, fields: F) -> Value
    where
        N: Into<Name>,
        F: IntoIterator<Item = (V, Value)>,
        V: Into<Name>,
    {
        Value::Record {
            constructor: constructor.into(),
            fields: fields
                .into_iter()
                .map(|(name, value)| (name.into(), value))
                .collect(),
        }
    }

    pub fn seq<I: IntoIterator<Item = Value>>(items: I) -> Value {
        Value::Seq(items.into_iter().collect())
    }

    pub fn set<I: IntoIterator<Item = Value>>(items: I) -> Value {
        Value::Set(items.into_iter().collect())
    }

    pub fn map<I: IntoIterator<Item = (Value, Value)>>(entries: I) -> Value {
        Value::Map(entries.into_iter().collect())
    }

    /// A short tag for error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Str(_) => "string",
            Value::Seq(_) => "sequence",
            Value::Set(_) => "set",
            Value::Map(_) => "mapping",
            Value::Record { .. } => "record",
        }
    }

    /// Look up a named field (records only).
    pub fn field(&self, name: &str) -> Option<&Value> {
        match self {
            Value::Record { fields, .. } => fields.get(name),
            _ => None,
        }
    }

    /// The scalar term this value crosses the solver boundary as, if any.
    pub fn as_term(&self) -> Option<Term> {
        match self {
            Value::Int(n) => Some(Term::Int(*n)),
            Value::Str(s) => Some(Term::Str(s.clone())),
            _ => None,
        }
    }
}

impl From<Term> for Value {
    fn from(term: Term) -> Self {
        match term {
            Term::Int(n) => Value::Int(n),
            Term::Str(s) => Value::Str(s),
        }
    }
}

impl From<&Term> for Value {
    fn from(term: &Term) -> Self {
        Value::from(term.clone())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Str(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Str(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_lookup_only_on_records() {
        let node = Value::record("Node", [("label", Value::from("a"))]);
        assert_eq!(node.field("label"), Some(&Value::from("a")));
        assert_eq!(node.field("missing"), None);
        assert_eq!(Value::Int(1).field("label"), None);
    }

    #[test]
    fn only_scalars_convert_to_terms() {
        assert_eq!(Value::Int(7).as_term(), Some(Term::Int(7)));
        assert_eq!(Value::from("x").as_term(), Some(Term::Str("x".to_string())));
        assert_eq!(Value::seq([]).as_term(), None);
    }

    #[test]
    fn serializes_with_stable_tags() {
        let value = Value::record("Node", [("label", Value::from("a"))]);
        let json = serde_json::to_value(&value).expect("serialize");
        assert_eq!(json["tag"], "record");
        let back: Value = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, value);

        assert_eq!(
            serde_json::to_string(&Value::Int(3)).expect("serialize"),
            r#"{"tag":"int","value":3}"#
        );
    }

    #[test]
    fn values_nest_in_sets_and_maps() {
        let set = Value::set([Value::seq([Value::Int(1)]), Value::seq([Value::Int(1)])]);
        match &set {
            Value::Set(items) => assert_eq!(items.len(), 1),
            other => panic!("expected set, got {other:?}"),
        }
    }
}
