//! Aspio I/O mapping language
//!
//! This crate defines the surface syntax used to map host data structures
//! onto the relational facts consumed by an ASP solver, and to map the
//! solver's answer sets back onto host values.
//!
//! It provides:
//! - typed ASTs for the `INPUT` and `OUTPUT` statements ([`ast`]),
//! - nom parsers for both statements ([`parser`]),
//! - the `%!` comment extractor that pulls specification text out of an
//!   ASP program ([`embedded`]),
//! - a parser for one line of solver output ([`answer_set`]), and
//! - literal-pattern templates used to select and bind facts during
//!   output reconstruction ([`pattern`]).
//!
//! Walking host data and reconstructing host values live in the companion
//! `aspio-engine` crate; this crate is purely syntax and data.

pub mod answer_set;
pub mod ast;
pub mod embedded;
pub mod parser;
pub mod pattern;

pub use answer_set::{parse_answer_set, AnswerSet, FactTuple};
pub use ast::{
    Accessor, Expr, InputSpecification, Iteration, OutputSpecification, PathStep, PredicateSpec,
    Term,
};
pub use embedded::{extract_spec, parse_embedded_spec};
pub use parser::{parse_input_spec, parse_output_spec, parse_spec, MappingSpec, ParseError};
pub use pattern::{LiteralPattern, PatternSlot};
