//! Typed ASTs for the `INPUT` and `OUTPUT` statements.
//!
//! All nodes are plain immutable values: they are produced once by the
//! parsers in [`crate::parser`] and then shared read-only (an
//! `InputSpecification` is typically evaluated once per solve call, an
//! `OutputSpecification` once per answer set).

use std::fmt;

use serde::{Deserialize, Serialize};

pub type Name = String;

/// A scalar fact argument: the only values that cross the solver boundary.
///
/// Solver constants and quoted strings both surface as `Term::Str`; the
/// quoted/unquoted distinction the solver makes is not preserved here.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Term {
    Int(i64),
    Str(String),
}

impl Term {
    /// Render as ASP program text (strings are quoted and escaped).
    pub fn to_asp(&self) -> String {
        match self {
            Term::Int(n) => n.to_string(),
            Term::Str(s) => {
                let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
                format!("\"{escaped}\"")
            }
        }
    }
}

impl fmt::Display for Term {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Term::Int(n) => write!(f, "{n}"),
            Term::Str(s) => write!(f, "{s}"),
        }
    }
}

impl From<i64> for Term {
    fn from(n: i64) -> Self {
        Term::Int(n)
    }
}

impl From<&str> for Term {
    fn from(s: &str) -> Self {
        Term::Str(s.to_string())
    }
}

impl From<String> for Term {
    fn from(s: String) -> Self {
        Term::Str(s)
    }
}

// ============================================================================
// Input side
// ============================================================================

/// One step of an accessor path: `.field` or `[index]`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum PathStep {
    Field { name: Name },
    Index { position: usize },
}

/// A variable plus a path of field/index steps, e.g. `node.neighbors[2].label`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accessor {
    pub root: Name,
    pub path: Vec<PathStep>,
}

impl Accessor {
    pub fn var(root: impl Into<Name>) -> Self {
        Accessor {
            root: root.into(),
            path: Vec::new(),
        }
    }
}

/// An iteration clause of a predicate spec.
///
/// Each clause introduces one nested loop and binds one or two fresh
/// variables per element of the source collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum Iteration {
    /// `for x in [set] xs` — one variable per element, order unspecified.
    Set { element: Name, source: Accessor },
    /// `for (i, x) in sequence xs` — position and element, in order.
    Sequence {
        assoc: Name,
        element: Name,
        source: Accessor,
    },
    /// `for (k, v) in mapping xs` — key and value, order unspecified.
    Mapping {
        assoc: Name,
        element: Name,
        source: Accessor,
    },
}

impl Iteration {
    pub fn source(&self) -> &Accessor {
        match self {
            Iteration::Set { source, .. }
            | Iteration::Sequence { source, .. }
            | Iteration::Mapping { source, .. } => source,
        }
    }
}

/// One `name(args...) iterations... ;` clause of an `INPUT` statement.
///
/// Scoping is static and left to right: an arg accessor or iteration
/// source may only refer to declared parameters or to variables bound by
/// an earlier iteration of the same spec. Violations surface as unbound
/// variable errors when the spec is evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateSpec {
    pub name: Name,
    pub args: Vec<Accessor>,
    pub iterations: Vec<Iteration>,
}

/// A parsed `INPUT ( params... ) { predicate specs... }` statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InputSpecification {
    pub parameters: Vec<Name>,
    pub predicates: Vec<PredicateSpec>,
}

// ============================================================================
// Output side
// ============================================================================

/// An output expression, evaluated against a parsed answer set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum Expr {
    /// An integer or quoted-string constant.
    Literal { value: Term },
    /// A bare ASP variable, meaningful only inside a collection's
    /// `content:`/`key:` sub-expression where pattern matching bound it.
    Variable { name: Name },
    /// `&name` — the value of another output definition.
    Reference { name: Name },
    /// `[qualified.name] ( args... )` — constructor application, or a
    /// plain tuple when no constructor name is given.
    Object {
        constructor: Option<Name>,
        args: Vec<Expr>,
    },
    /// `set { pred }` — the raw argument tuples stored under `pred`.
    SimpleSet { predicate: Name },
    /// `set { predicate: ...; content: ...; }`
    Set { pattern: String, content: Box<Expr> },
    /// `sequence { predicate: ...; content: ...; index: ...; }`
    Sequence {
        pattern: String,
        content: Box<Expr>,
        index: Name,
    },
    /// `mapping { predicate: ...; content: ...; key: ...; }`
    Mapping {
        pattern: String,
        content: Box<Expr>,
        key: Box<Expr>,
    },
}

/// A parsed `OUTPUT { name = expr, ... }` statement.
///
/// Definition names are unique; definitions may refer to each other via
/// [`Expr::Reference`] as long as the reference graph stays acyclic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputSpecification {
    pub defs: Vec<(Name, Expr)>,
}

impl OutputSpecification {
    pub fn get(&self, name: &str) -> Option<&Expr> {
        self.defs
            .iter()
            .find(|(def_name, _)| def_name == name)
            .map(|(_, expr)| expr)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nodes_serialize_with_stable_tags() {
        let iteration = Iteration::Sequence {
            assoc: "i".to_string(),
            element: "x".to_string(),
            source: Accessor::var("xs"),
        };
        let json = serde_json::to_value(&iteration).expect("serialize");
        assert_eq!(json["tag"], "sequence");
        let back: Iteration = serde_json::from_value(json).expect("deserialize");
        assert_eq!(back, iteration);
    }

    #[test]
    fn terms_serialize_untagged() {
        assert_eq!(serde_json::to_string(&Term::Int(3)).expect("serialize"), "3");
        assert_eq!(
            serde_json::to_string(&Term::from("a")).expect("serialize"),
            r#""a""#
        );
    }

    #[test]
    fn renders_asp_terms() {
        assert_eq!(Term::Int(-4).to_asp(), "-4");
        assert_eq!(Term::from(r#"a"b\c"#).to_asp(), r#""a\"b\\c""#);
    }
}
