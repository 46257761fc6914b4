//! The output expression evaluator: reconstructing host values from a
//! parsed answer set.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use thiserror::Error;

use aspio_dsl::ast::{Expr, Name, OutputSpecification};
use aspio_dsl::{AnswerSet, LiteralPattern, ParseError, Term};

use crate::value::Value;

/// A host-value constructor, applied positionally.
pub type Constructor = Box<dyn Fn(Vec<Value>) -> Value + Send + Sync>;

/// Maps qualified constructor names to callables. Population of the map
/// is the host's business; the evaluator only looks names up.
pub trait ConstructorResolver {
    fn resolve(&self, name: &str) -> Option<&Constructor>;
}

/// A plain name→constructor map resolver.
#[derive(Default)]
pub struct ConstructorRegistry {
    constructors: HashMap<Name, Constructor>,
}

impl ConstructorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<F>(&mut self, name: impl Into<Name>, constructor: F)
    where
        F: Fn(Vec<Value>) -> Value + Send + Sync + 'static,
    {
        self.constructors.insert(name.into(), Box::new(constructor));
    }
}

impl ConstructorResolver for ConstructorRegistry {
    fn resolve(&self, name: &str) -> Option<&Constructor> {
        self.constructors.get(name)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct EvalOptions {
    /// When set, a fact whose arity differs from its literal pattern is
    /// an error instead of a non-match.
    pub strict_patterns: bool,
}

#[derive(Debug, Error)]
pub enum EvalError {
    #[error("invalid literal pattern `{pattern}`")]
    Pattern {
        pattern: String,
        #[source]
        source: ParseError,
    },
    #[error("variable `{0}` is not bound by the enclosing pattern")]
    UnboundVariable(Name),
    #[error("no output definition named `{0}`")]
    UnknownOutput(Name),
    #[error("no constructor registered for `{0}`")]
    UnknownConstructor(Name),
    #[error("circular reference among output definitions: {0}")]
    DependencyCycle(String),
    #[error("sequence index variable `{var}` is bound to non-integer term {term}")]
    NonIntegerIndex { var: Name, term: Term },
    #[error("sequence index {0} is produced by two matches with different contents")]
    DuplicateIndex(i64),
    #[error("mapping key {0:?} is produced by two matches with different contents")]
    DuplicateKey(Value),
    #[error("fact of `{predicate}` has arity {got}, pattern `{pattern}` expects {expected}")]
    PatternMismatch {
        predicate: Name,
        pattern: String,
        expected: usize,
        got: usize,
    },
}

/// Evaluate every output definition against `answer_set` with default
/// options. Returns the defined values keyed by definition name.
pub fn evaluate(
    spec: &OutputSpecification,
    answer_set: &AnswerSet,
    resolver: &dyn ConstructorResolver,
) -> Result<BTreeMap<Name, Value>, EvalError> {
    evaluate_with(spec, answer_set, resolver, EvalOptions::default())
}

/// Like [`evaluate`], with explicit options.
///
/// Memoization and cycle detection are scoped to this single call: each
/// definition is computed at most once no matter how many `&name`
/// references point at it, and a reference chain that reaches a
/// definition already on the evaluation stack fails instead of looping.
pub fn evaluate_with(
    spec: &OutputSpecification,
    answer_set: &AnswerSet,
    resolver: &dyn ConstructorResolver,
    options: EvalOptions,
) -> Result<BTreeMap<Name, Value>, EvalError> {
    let mut evaluator = Evaluator {
        spec,
        answer_set,
        resolver,
        options,
        memo: HashMap::new(),
        in_flight: Vec::new(),
    };
    let mut values = BTreeMap::new();
    for (name, _) in &spec.defs {
        values.insert(name.clone(), evaluator.reference(name)?);
    }
    Ok(values)
}

type Bindings = HashMap<Name, Term>;

struct Evaluator<'a> {
    spec: &'a OutputSpecification,
    answer_set: &'a AnswerSet,
    resolver: &'a dyn ConstructorResolver,
    options: EvalOptions,
    memo: HashMap<&'a str, Value>,
    in_flight: Vec<&'a str>,
}

impl<'a> Evaluator<'a> {
    /// Resolve an output definition by name, computing it on first use.
    fn reference(&mut self, name: &'a str) -> Result<Value, EvalError> {
        if let Some(value) = self.memo.get(name) {
            return Ok(value.clone());
        }
        if self.in_flight.contains(&name) {
            let mut chain: Vec<&str> = self.in_flight.clone();
            chain.push(name);
            return Err(EvalError::DependencyCycle(chain.join(" -> ")));
        }
        let expr = self
            .spec
            .get(name)
            .ok_or_else(|| EvalError::UnknownOutput(name.to_string()))?;
        self.in_flight.push(name);
        let result = self.eval(expr, &Bindings::new());
        self.in_flight.pop();
        let value = result?;
        tracing::debug!(output = name, "memoized output definition");
        self.memo.insert(name, value.clone());
        Ok(value)
    }

    fn eval(&mut self, expr: &'a Expr, bindings: &Bindings) -> Result<Value, EvalError> {
        match expr {
            Expr::Literal { value } => Ok(Value::from(value)),
            Expr::Variable { name } => bindings
                .get(name)
                .map(Value::from)
                .ok_or_else(|| EvalError::UnboundVariable(name.clone())),
            Expr::Reference { name } => self.reference(name),
            Expr::Object { constructor, args } => {
                let mut values = Vec::with_capacity(args.len());
                for arg in args {
                    values.push(self.eval(arg, bindings)?);
                }
                match constructor {
                    None => Ok(Value::Seq(values)),
                    Some(name) => {
                        let constructor = self
                            .resolver
                            .resolve(name)
                            .ok_or_else(|| EvalError::UnknownConstructor(name.clone()))?;
                        Ok(constructor(values))
                    }
                }
            }
            Expr::SimpleSet { predicate } => {
                let tuples = self
                    .answer_set
                    .tuples(predicate)
                    .iter()
                    .map(|tuple| Value::Seq(tuple.iter().map(Value::from).collect()))
                    .collect();
                Ok(Value::Set(tuples))
            }
            Expr::Set { pattern, content } => {
                let mut items = BTreeSet::new();
                for bound in self.matches(pattern)? {
                    items.insert(self.eval(content, &bound)?);
                }
                Ok(Value::Set(items))
            }
            Expr::Sequence {
                pattern,
                content,
                index,
            } => {
                let mut ordered: BTreeMap<i64, Value> = BTreeMap::new();
                for bound in self.matches(pattern)? {
                    let term = bound
                        .get(index)
                        .ok_or_else(|| EvalError::UnboundVariable(index.clone()))?;
                    let Term::Int(position) = term else {
                        return Err(EvalError::NonIntegerIndex {
                            var: index.clone(),
                            term: term.clone(),
                        });
                    };
                    let item = self.eval(content, &bound)?;
                    match ordered.get(position) {
                        Some(existing) if *existing != item => {
                            return Err(EvalError::DuplicateIndex(*position));
                        }
                        _ => {
                            ordered.insert(*position, item);
                        }
                    }
                }
                Ok(Value::Seq(ordered.into_values().collect()))
            }
            Expr::Mapping {
                pattern,
                content,
                key,
            } => {
                let mut entries: BTreeMap<Value, Value> = BTreeMap::new();
                for bound in self.matches(pattern)? {
                    let key = self.eval(key, &bound)?;
                    let item = self.eval(content, &bound)?;
                    match entries.get(&key) {
                        Some(existing) if *existing != item => {
                            return Err(EvalError::DuplicateKey(key));
                        }
                        _ => {
                            entries.insert(key, item);
                        }
                    }
                }
                Ok(Value::Map(entries))
            }
        }
    }

    /// Parse a literal-pattern template and collect the bindings of every
    /// matching fact tuple, in answer-set order.
    fn matches(&self, template: &str) -> Result<Vec<Bindings>, EvalError> {
        let pattern = LiteralPattern::parse(template).map_err(|source| EvalError::Pattern {
            pattern: template.to_string(),
            source,
        })?;
        let mut bound = Vec::new();
        for tuple in self.answer_set.tuples(&pattern.predicate) {
            if self.options.strict_patterns && tuple.len() != pattern.arity() {
                return Err(EvalError::PatternMismatch {
                    predicate: pattern.predicate.clone(),
                    pattern: template.to_string(),
                    expected: pattern.arity(),
                    got: tuple.len(),
                });
            }
            if let Some(bindings) = pattern.match_args(tuple) {
                bound.push(bindings);
            }
        }
        Ok(bound)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aspio_dsl::{parse_answer_set, parse_output_spec};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    fn eval_one(
        spec_text: &str,
        line: &str,
        resolver: &dyn ConstructorResolver,
    ) -> Result<BTreeMap<Name, Value>, EvalError> {
        let spec = parse_output_spec(spec_text).expect("spec parses");
        let answer_set = parse_answer_set(line).expect("answer set parses");
        evaluate(&spec, &answer_set, resolver)
    }

    #[test]
    fn literals_and_tuples() {
        let values = eval_one(
            r#"OUTPUT { n = 42, s = "hi", pair = (1, "a") }"#,
            "{}",
            &ConstructorRegistry::new(),
        )
        .expect("evaluate");
        assert_eq!(values["n"], Value::Int(42));
        assert_eq!(values["s"], Value::from("hi"));
        assert_eq!(values["pair"], Value::seq([Value::Int(1), Value::from("a")]));
    }

    #[test]
    fn simple_set_collects_raw_tuples() {
        let values = eval_one(
            "OUTPUT { ps = set { p } }",
            r#"{p(1,2), p(3,4), q(9)}"#,
            &ConstructorRegistry::new(),
        )
        .expect("evaluate");
        assert_eq!(
            values["ps"],
            Value::set([
                Value::seq([Value::Int(1), Value::Int(2)]),
                Value::seq([Value::Int(3), Value::Int(4)]),
            ])
        );
    }

    #[test]
    fn simple_set_of_absent_predicate_is_empty() {
        let values = eval_one(
            "OUTPUT { ps = set { nothing } }",
            "{q(1)}",
            &ConstructorRegistry::new(),
        )
        .expect("evaluate");
        assert_eq!(values["ps"], Value::set([]));
    }

    #[test]
    fn set_binds_pattern_variables_and_dedups() {
        let values = eval_one(
            "OUTPUT { colors = set { predicate: color(V, C); content: C; } }",
            r#"{color(a,"red"), color(b,"red"), color(c,"blue")}"#,
            &ConstructorRegistry::new(),
        )
        .expect("evaluate");
        assert_eq!(
            values["colors"],
            Value::set([Value::from("red"), Value::from("blue")])
        );
    }

    #[test]
    fn fixed_pattern_positions_filter_facts() {
        let values = eval_one(
            r#"OUTPUT { reds = set { predicate: color(V, "red"); content: V; } }"#,
            r#"{color("a","red"), color("b","blue"), color("c","red")}"#,
            &ConstructorRegistry::new(),
        )
        .expect("evaluate");
        assert_eq!(values["reds"], Value::set([Value::from("a"), Value::from("c")]));
    }

    #[test]
    fn sequence_sorts_by_index_binding() {
        let values = eval_one(
            "OUTPUT { path = sequence { predicate: visit(I, N); content: N; index: I; } }",
            r#"{visit(2,"c"), visit(0,"a"), visit(1,"b")}"#,
            &ConstructorRegistry::new(),
        )
        .expect("evaluate");
        assert_eq!(
            values["path"],
            Value::seq([Value::from("a"), Value::from("b"), Value::from("c")])
        );
    }

    #[test]
    fn conflicting_sequence_indices_fail() {
        let err = eval_one(
            "OUTPUT { path = sequence { predicate: visit(I, N); content: N; index: I; } }",
            r#"{visit(0,"a"), visit(0,"b")}"#,
            &ConstructorRegistry::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EvalError::DuplicateIndex(0)));
    }

    #[test]
    fn equal_duplicate_index_entries_collapse() {
        let values = eval_one(
            "OUTPUT { path = sequence { predicate: visit(I, N); content: N; index: I; } }",
            r#"{visit(0,"a"), visit(0,"a"), visit(1,"b")}"#,
            &ConstructorRegistry::new(),
        )
        .expect("evaluate");
        assert_eq!(values["path"], Value::seq([Value::from("a"), Value::from("b")]));
    }

    #[test]
    fn non_integer_index_fails() {
        let err = eval_one(
            "OUTPUT { path = sequence { predicate: visit(I, N); content: N; index: I; } }",
            r#"{visit("zero","a")}"#,
            &ConstructorRegistry::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EvalError::NonIntegerIndex { var, .. } if var == "I"));
    }

    #[test]
    fn mapping_builds_key_to_content_entries() {
        let values = eval_one(
            "OUTPUT { ages = mapping { predicate: age(P, A); content: A; key: P; } }",
            r#"{age("ada",36), age("bob",41)}"#,
            &ConstructorRegistry::new(),
        )
        .expect("evaluate");
        assert_eq!(
            values["ages"],
            Value::map([
                (Value::from("ada"), Value::Int(36)),
                (Value::from("bob"), Value::Int(41)),
            ])
        );
    }

    #[test]
    fn conflicting_mapping_keys_fail() {
        let err = eval_one(
            "OUTPUT { ages = mapping { predicate: age(P, A); content: A; key: P; } }",
            r#"{age("ada",36), age("ada",37)}"#,
            &ConstructorRegistry::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EvalError::DuplicateKey(_)));
    }

    #[test]
    fn arity_mismatch_is_skipped_unless_strict() {
        let spec =
            parse_output_spec("OUTPUT { ps = set { predicate: p(X); content: X; } }").unwrap();
        let answer_set = parse_answer_set("{p(1), p(2,3)}").unwrap();
        let registry = ConstructorRegistry::new();

        let values = evaluate(&spec, &answer_set, &registry).expect("lenient");
        assert_eq!(values["ps"], Value::set([Value::Int(1)]));

        let err = evaluate_with(
            &spec,
            &answer_set,
            &registry,
            EvalOptions {
                strict_patterns: true,
            },
        )
        .unwrap_err();
        assert!(matches!(
            err,
            EvalError::PatternMismatch {
                expected: 1,
                got: 2,
                ..
            }
        ));
    }

    #[test]
    fn constructor_is_resolved_and_applied_positionally() {
        let mut registry = ConstructorRegistry::new();
        registry.register("graph.Node", |args| {
            Value::record("Node", [("label", args[0].clone())])
        });
        let values = eval_one(
            r#"OUTPUT { node = graph.Node("a") }"#,
            "{}",
            &registry,
        )
        .expect("evaluate");
        assert_eq!(
            values["node"],
            Value::record("Node", [("label", Value::from("a"))])
        );
    }

    #[test]
    fn unresolved_constructor_is_a_name_error() {
        let err = eval_one(
            r#"OUTPUT { node = graph.Node("a") }"#,
            "{}",
            &ConstructorRegistry::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EvalError::UnknownConstructor(name) if name == "graph.Node"));
    }

    #[test]
    fn references_resolve_in_declaration_independent_order() {
        let values = eval_one(
            "OUTPUT { total = &count, count = 3 }",
            "{}",
            &ConstructorRegistry::new(),
        )
        .expect("evaluate");
        assert_eq!(values["total"], Value::Int(3));
        assert_eq!(values["count"], Value::Int(3));
    }

    #[test]
    fn referenced_definitions_are_computed_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&calls);
        let mut registry = ConstructorRegistry::new();
        registry.register("counter", move |args| {
            seen.fetch_add(1, Ordering::SeqCst);
            Value::Seq(args)
        });
        let values = eval_one(
            "OUTPUT { base = counter(1), a = &base, b = &base }",
            "{}",
            &registry,
        )
        .expect("evaluate");
        assert_eq!(values["a"], values["b"]);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn reference_cycles_are_detected() {
        let err = eval_one(
            "OUTPUT { a = &b, b = &a }",
            "{}",
            &ConstructorRegistry::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EvalError::DependencyCycle(chain) if chain.contains("a -> b")));
    }

    #[test]
    fn reference_to_missing_definition_fails() {
        let err = eval_one("OUTPUT { a = &ghost }", "{}", &ConstructorRegistry::new())
            .unwrap_err();
        assert!(matches!(err, EvalError::UnknownOutput(name) if name == "ghost"));
    }

    #[test]
    fn variable_outside_a_pattern_scope_is_unbound() {
        let err = eval_one("OUTPUT { x = X }", "{}", &ConstructorRegistry::new()).unwrap_err();
        assert!(matches!(err, EvalError::UnboundVariable(name) if name == "X"));
    }

    #[test]
    fn malformed_pattern_template_fails_at_evaluation() {
        let err = eval_one(
            "OUTPUT { xs = set { predicate: p(; content: X; } }",
            "{}",
            &ConstructorRegistry::new(),
        )
        .unwrap_err();
        assert!(matches!(err, EvalError::Pattern { .. }));
    }

    #[test]
    fn nested_collections_compose() {
        let mut registry = ConstructorRegistry::new();
        registry.register("Arc", |args| {
            Value::record(
                "Arc",
                [("from", args[0].clone()), ("to", args[1].clone())],
            )
        });
        let values = eval_one(
            "OUTPUT { arcs = set { predicate: arc(A, B); content: Arc(A, B); } }",
            r#"{arc("x","y"), arc("y","z")}"#,
            &registry,
        )
        .expect("evaluate");
        assert_eq!(
            values["arcs"],
            Value::set([
                Value::record("Arc", [("from", Value::from("x")), ("to", Value::from("y"))]),
                Value::record("Arc", [("from", Value::from("y")), ("to", Value::from("z"))]),
            ])
        );
    }
}
