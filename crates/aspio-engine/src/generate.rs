//! The input mapping engine: walking host data under iteration clauses
//! and emitting relational facts.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use aspio_dsl::ast::{Accessor, InputSpecification, Iteration, Name, PathStep, PredicateSpec};
use aspio_dsl::Term;

use crate::value::Value;

/// Receiver for generated facts. Deduplication, buffering, and transport
/// to the solver are the sink's business, not the engine's.
pub trait FactSink {
    fn add_fact(&mut self, predicate: &str, args: Vec<Term>);
}

/// A sink that collects facts in emission order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FactBuffer {
    facts: Vec<(Name, Vec<Term>)>,
}

impl FactBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn facts(&self) -> &[(Name, Vec<Term>)] {
        &self.facts
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// Render the collected facts as ASP program text, one fact per line.
    pub fn to_asp_facts(&self) -> String {
        let lines: Vec<String> = self
            .facts
            .iter()
            .map(|(predicate, args)| {
                if args.is_empty() {
                    format!("{predicate}.")
                } else {
                    let args: Vec<String> = args.iter().map(Term::to_asp).collect();
                    format!("{predicate}({}).", args.join(","))
                }
            })
            .collect();
        lines.join("\n")
    }
}

impl FactSink for FactBuffer {
    fn add_fact(&mut self, predicate: &str, args: Vec<Term>) {
        self.facts.push((predicate.to_string(), args));
    }
}

#[derive(Debug, Error)]
pub enum MapError {
    #[error("expected {expected} parameter values, got {got}")]
    ParameterCount { expected: usize, got: usize },
    #[error("variable `{0}` is not bound")]
    UnboundVariable(Name),
    #[error("{kind} value has no field `{field}`")]
    MissingField { field: Name, kind: &'static str },
    #[error("index {position} is out of range (length {len})")]
    IndexOutOfRange { position: usize, len: usize },
    #[error("cannot index into {kind} value")]
    NotIndexable { kind: &'static str },
    #[error("`for {var} in ...` needs a collection, found {kind}")]
    NotIterable { var: Name, kind: &'static str },
    #[error("argument of `{predicate}` is not a scalar (found {kind})")]
    NonScalarArgument {
        predicate: Name,
        kind: &'static str,
    },
}

type Scope<'a> = HashMap<&'a str, Value>;

/// Evaluate `spec` against `parameters` (positional, matching
/// `spec.parameters`) and emit every resulting fact into `sink`.
///
/// Each predicate spec is independent: its iterations nest left to
/// right, and the innermost level emits exactly one fact per combination
/// of loop bindings (zero iterations ⇒ exactly one fact).
pub fn generate(
    spec: &InputSpecification,
    parameters: &[Value],
    sink: &mut dyn FactSink,
) -> Result<(), MapError> {
    if parameters.len() != spec.parameters.len() {
        return Err(MapError::ParameterCount {
            expected: spec.parameters.len(),
            got: parameters.len(),
        });
    }
    let mut scope: Scope = spec
        .parameters
        .iter()
        .map(Name::as_str)
        .zip(parameters.iter().cloned())
        .collect();
    for predicate in &spec.predicates {
        let emitted = emit(predicate, &predicate.iterations, &mut scope, sink)?;
        tracing::debug!(predicate = %predicate.name, facts = emitted, "generated facts");
    }
    Ok(())
}

fn emit<'a>(
    predicate: &'a PredicateSpec,
    iterations: &'a [Iteration],
    scope: &mut Scope<'a>,
    sink: &mut dyn FactSink,
) -> Result<usize, MapError> {
    let Some((first, rest)) = iterations.split_first() else {
        let mut args = Vec::with_capacity(predicate.args.len());
        for accessor in &predicate.args {
            let value = resolve(scope, accessor)?;
            let term = value.as_term().ok_or_else(|| MapError::NonScalarArgument {
                predicate: predicate.name.clone(),
                kind: value.kind(),
            })?;
            args.push(term);
        }
        sink.add_fact(&predicate.name, args);
        return Ok(1);
    };

    let source = resolve(scope, first.source())?.clone();
    let mut emitted = 0;
    match first {
        Iteration::Set { element, .. } => {
            let items: Vec<Value> = match source {
                Value::Seq(items) => items,
                Value::Set(items) => items.into_iter().collect(),
                // Iterating a mapping as a set visits its keys.
                Value::Map(entries) => entries.into_keys().collect(),
                other => {
                    return Err(MapError::NotIterable {
                        var: element.clone(),
                        kind: other.kind(),
                    })
                }
            };
            for item in items {
                let saved = scope.insert(element, item);
                let result = emit(predicate, rest, scope, sink);
                restore(scope, element, saved);
                emitted += result?;
            }
        }
        Iteration::Sequence { assoc, element, .. } => {
            let Value::Seq(items) = source else {
                return Err(MapError::NotIterable {
                    var: element.clone(),
                    kind: source.kind(),
                });
            };
            for (position, item) in items.into_iter().enumerate() {
                let saved_assoc = scope.insert(assoc, Value::Int(position as i64));
                let saved_element = scope.insert(element, item);
                let result = emit(predicate, rest, scope, sink);
                restore(scope, element, saved_element);
                restore(scope, assoc, saved_assoc);
                emitted += result?;
            }
        }
        Iteration::Mapping { assoc, element, .. } => {
            let Value::Map(entries) = source else {
                return Err(MapError::NotIterable {
                    var: element.clone(),
                    kind: source.kind(),
                });
            };
            for (key, item) in entries {
                let saved_assoc = scope.insert(assoc, key);
                let saved_element = scope.insert(element, item);
                let result = emit(predicate, rest, scope, sink);
                restore(scope, element, saved_element);
                restore(scope, assoc, saved_assoc);
                emitted += result?;
            }
        }
    }
    Ok(emitted)
}

fn restore<'a>(scope: &mut Scope<'a>, name: &'a str, saved: Option<Value>) {
    match saved {
        Some(value) => {
            scope.insert(name, value);
        }
        None => {
            scope.remove(name);
        }
    }
}

/// Resolve an accessor in the given scope: look up the root variable,
/// then apply field and index steps left to right.
fn resolve<'v>(scope: &'v Scope<'_>, accessor: &Accessor) -> Result<&'v Value, MapError> {
    let mut value = scope
        .get(accessor.root.as_str())
        .ok_or_else(|| MapError::UnboundVariable(accessor.root.clone()))?;
    for step in &accessor.path {
        value = match step {
            PathStep::Field { name } => {
                value.field(name).ok_or_else(|| MapError::MissingField {
                    field: name.clone(),
                    kind: value.kind(),
                })?
            }
            PathStep::Index { position } => match value {
                Value::Seq(items) => {
                    items.get(*position).ok_or(MapError::IndexOutOfRange {
                        position: *position,
                        len: items.len(),
                    })?
                }
                other => {
                    return Err(MapError::NotIndexable {
                        kind: other.kind(),
                    })
                }
            },
        };
    }
    Ok(value)
}
