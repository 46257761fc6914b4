//! Execution engine for the mapping language in `aspio-dsl`.
//!
//! Two halves mirror the round trip to the solver:
//!
//! - [`generate`]: walk host [`Value`]s under an `INPUT` specification's
//!   iteration clauses and emit relational facts into a [`FactSink`].
//! - [`evaluate`]: rebuild host values from a parsed [`AnswerSet`]
//!   according to an `OUTPUT` specification, applying registered
//!   constructors via a [`ConstructorResolver`].
//!
//! Both halves are pure tree traversals with per-call state only, so
//! parsed specifications can be shared read-only across threads.
//!
//! [`generate`]: generate::generate
//! [`evaluate`]: evaluate::evaluate
//! [`AnswerSet`]: aspio_dsl::AnswerSet

pub mod evaluate;
pub mod generate;
pub mod value;

pub use evaluate::{
    evaluate, evaluate_with, Constructor, ConstructorRegistry, ConstructorResolver, EvalError,
    EvalOptions,
};
pub use generate::{generate, FactBuffer, FactSink, MapError};
pub use value::Value;
