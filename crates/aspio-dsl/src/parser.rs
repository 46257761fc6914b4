//! nom parsers for the `INPUT` and `OUTPUT` statements.
//!
//! The grammar is whitespace-insensitive, keywords are case-insensitive,
//! and `%` comments run to the end of the line. Parsers are plain
//! functions over `&str`; there is no shared parser state to construct or
//! configure.
//!
//! Variables may not be named after a keyword. The surface syntax cannot
//! otherwise distinguish `for x in set ...` (keyword) from a variable
//! that happens to be called `set`, so keyword names are reserved
//! outright rather than disambiguated by lookahead.

use nom::{
    branch::alt,
    bytes::complete::{is_not, take_while, take_while1},
    character::complete::{char as pchar, digit1},
    combinator::{all_consuming, map, map_res, opt, recognize},
    multi::{many0, many1, separated_list0},
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ast::{
    Accessor, Expr, InputSpecification, Iteration, Name, OutputSpecification, PathStep,
    PredicateSpec, Term,
};

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("syntax error at line {line}, column {column} (near `{snippet}`)")]
    Syntax {
        line: usize,
        column: usize,
        snippet: String,
    },
    #[error("invalid specification: {message}")]
    Invalid { message: String },
}

/// The result of parsing a full mapping specification: one `INPUT` and
/// one `OUTPUT` statement, each optional, in either order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MappingSpec {
    pub input: Option<InputSpecification>,
    pub output: Option<OutputSpecification>,
}

/// Parse a single `INPUT ( ... ) { ... }` statement.
pub fn parse_input_spec(text: &str) -> Result<InputSpecification, ParseError> {
    let spec = run(text, input_statement)?;
    validate_input(&spec)?;
    Ok(spec)
}

/// Parse a single `OUTPUT { ... }` statement.
pub fn parse_output_spec(text: &str) -> Result<OutputSpecification, ParseError> {
    let spec = run(text, output_statement)?;
    validate_output(&spec)?;
    Ok(spec)
}

/// Parse a whole mapping specification (both statements optional, any order).
pub fn parse_spec(text: &str) -> Result<MappingSpec, ParseError> {
    let statements = run(text, many0(statement))?;
    let mut spec = MappingSpec::default();
    for stmt in statements {
        match stmt {
            Statement::Input(input) => {
                validate_input(&input)?;
                if spec.input.replace(input).is_some() {
                    return Err(ParseError::Invalid {
                        message: "more than one INPUT statement".to_string(),
                    });
                }
            }
            Statement::Output(output) => {
                validate_output(&output)?;
                if spec.output.replace(output).is_some() {
                    return Err(ParseError::Invalid {
                        message: "more than one OUTPUT statement".to_string(),
                    });
                }
            }
        }
    }
    Ok(spec)
}

fn validate_input(spec: &InputSpecification) -> Result<(), ParseError> {
    for (i, name) in spec.parameters.iter().enumerate() {
        if spec.parameters[..i].contains(name) {
            return Err(ParseError::Invalid {
                message: format!("duplicate input parameter `{name}`"),
            });
        }
    }
    Ok(())
}

fn validate_output(spec: &OutputSpecification) -> Result<(), ParseError> {
    for (i, (name, _)) in spec.defs.iter().enumerate() {
        if spec.defs[..i].iter().any(|(other, _)| other == name) {
            return Err(ParseError::Invalid {
                message: format!("duplicate output definition `{name}`"),
            });
        }
    }
    Ok(())
}

// ============================================================================
// Driver and error positions
// ============================================================================

pub(crate) fn run<'a, O>(
    text: &'a str,
    parser: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> Result<O, ParseError> {
    match all_consuming(terminated(parser, sc))(text) {
        Ok((_, value)) => Ok(value),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(syntax_error(text, e.input)),
        Err(nom::Err::Incomplete(_)) => Err(syntax_error(text, "")),
    }
}

/// Build a [`ParseError::Syntax`] from the original input and the
/// remaining (suffix) slice the parser stopped at.
pub(crate) fn syntax_error(full: &str, rest: &str) -> ParseError {
    let offset = full.len().saturating_sub(rest.len());
    let consumed = &full[..offset];
    let line = consumed.matches('\n').count() + 1;
    let line_start = consumed.rfind('\n').map(|i| i + 1).unwrap_or(0);
    let column = offset - line_start + 1;
    let snippet: String = rest.chars().take(24).collect();
    let snippet = if snippet.is_empty() {
        "<end of input>".to_string()
    } else {
        snippet
    };
    ParseError::Syntax {
        line,
        column,
        snippet,
    }
}

// ============================================================================
// Trivia and tokens
// ============================================================================

/// Skip whitespace and `%` comments (to end of line).
fn sc(mut input: &str) -> IResult<&str, ()> {
    loop {
        let trimmed = input.trim_start();
        if let Some(comment) = trimmed.strip_prefix('%') {
            input = match comment.split_once('\n') {
                Some((_, tail)) => tail,
                None => "",
            };
        } else {
            return Ok((trimmed, ()));
        }
    }
}

const KEYWORDS: &[&str] = &[
    "input",
    "output",
    "for",
    "in",
    "set",
    "sequence",
    "mapping",
    "index",
    "key",
    "content",
    "predicate",
    "class",
    "arguments",
];

fn is_keyword(word: &str) -> bool {
    KEYWORDS.iter().any(|k| word.eq_ignore_ascii_case(k))
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_ident_continue(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn raw_word(input: &str) -> IResult<&str, &str> {
    recognize(pair(take_while1(is_ident_start), take_while(is_ident_continue)))(input)
}

fn keyword<'a>(kw: &'static str) -> impl FnMut(&'a str) -> IResult<&'a str, ()> {
    move |input: &'a str| {
        let (rest, word) = preceded(sc, raw_word)(input)?;
        if word.eq_ignore_ascii_case(kw) {
            Ok((rest, ()))
        } else {
            Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Tag,
            )))
        }
    }
}

fn sym<'a>(c: char) -> impl FnMut(&'a str) -> IResult<&'a str, char> {
    preceded(sc, pchar(c))
}

/// Host-language identifier (fields, output names): `[A-Za-z_][A-Za-z0-9_]*`.
fn identifier(input: &str) -> IResult<&str, Name> {
    map(preceded(sc, raw_word), str::to_string)(input)
}

/// Qualified host identifier for constructors, e.g. `graph.ColoredNode`.
fn qualified_identifier(input: &str) -> IResult<&str, Name> {
    map(
        preceded(
            sc,
            recognize(pair(
                take_while1(is_ident_start),
                take_while(|c| is_ident_continue(c) || c == '.'),
            )),
        ),
        str::to_string,
    )(input)
}

/// Predicate name: `[A-Za-z][A-Za-z0-9_]*`.
fn predicate_name(input: &str) -> IResult<&str, Name> {
    map(
        preceded(
            sc,
            recognize(pair(
                take_while1(|c: char| c.is_ascii_alphabetic()),
                take_while(is_ident_continue),
            )),
        ),
        str::to_string,
    )(input)
}

/// Input-side variable: `[A-Za-z][A-Za-z0-9]*`, keywords reserved.
fn variable(input: &str) -> IResult<&str, Name> {
    let (rest, word) = preceded(
        sc,
        recognize(pair(
            take_while1(|c: char| c.is_ascii_alphabetic()),
            take_while(|c: char| c.is_ascii_alphanumeric()),
        )),
    )(input)?;
    if is_keyword(word) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }
    Ok((rest, word.to_string()))
}

/// Output-side ASP variable: letters only, keywords reserved.
fn asp_variable(input: &str) -> IResult<&str, Name> {
    let (rest, word) = preceded(sc, take_while1(|c: char| c.is_ascii_alphabetic()))(input)?;
    if is_keyword(word) {
        return Err(nom::Err::Error(nom::error::Error::new(
            input,
            nom::error::ErrorKind::Verify,
        )));
    }
    Ok((rest, word.to_string()))
}

fn integer(input: &str) -> IResult<&str, i64> {
    preceded(sc, map_res(digit1, |s: &str| s.parse::<i64>()))(input)
}

fn index_number(input: &str) -> IResult<&str, usize> {
    preceded(sc, map_res(digit1, |s: &str| s.parse::<usize>()))(input)
}

/// Double-quoted, backslash-escaped string literal (raw, no leading trivia).
pub(crate) fn string_literal(input: &str) -> IResult<&str, String> {
    let mut chars = input.char_indices();
    match chars.next() {
        Some((_, '"')) => {}
        _ => {
            return Err(nom::Err::Error(nom::error::Error::new(
                input,
                nom::error::ErrorKind::Char,
            )))
        }
    }
    let mut out = String::new();
    let mut escaped = false;
    for (idx, ch) in chars {
        if escaped {
            out.push(match ch {
                'n' => '\n',
                't' => '\t',
                'r' => '\r',
                other => other,
            });
            escaped = false;
        } else if ch == '\\' {
            escaped = true;
        } else if ch == '"' {
            return Ok((&input[idx + 1..], out));
        } else {
            out.push(ch);
        }
    }
    // Unterminated string.
    Err(nom::Err::Error(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Char,
    )))
}

/// Comma-separated list, zero or more items, optional trailing comma.
fn comma_list<'a, O>(
    item: impl FnMut(&'a str) -> IResult<&'a str, O>,
) -> impl FnMut(&'a str) -> IResult<&'a str, Vec<O>> {
    terminated(separated_list0(sym(','), item), opt(sym(',')))
}

// ============================================================================
// INPUT statement
// ============================================================================

fn path_step(input: &str) -> IResult<&str, PathStep> {
    alt((
        map(preceded(sym('.'), identifier), |name| PathStep::Field {
            name,
        }),
        map(delimited(sym('['), index_number, sym(']')), |position| {
            PathStep::Index { position }
        }),
    ))(input)
}

fn accessor(input: &str) -> IResult<&str, Accessor> {
    let (input, root) = variable(input)?;
    let (input, path) = many0(path_step)(input)?;
    Ok((input, Accessor { root, path }))
}

/// `for (a, v) in sequence ...` / `for (a, v) in mapping ...`
fn assoc_iteration(input: &str) -> IResult<&str, Iteration> {
    let (input, _) = keyword("for")(input)?;
    let (input, _) = sym('(')(input)?;
    let (input, assoc) = variable(input)?;
    let (input, _) = sym(',')(input)?;
    let (input, element) = variable(input)?;
    let (input, _) = sym(')')(input)?;
    let (input, _) = keyword("in")(input)?;
    let (input, is_mapping) = alt((
        map(keyword("sequence"), |_| false),
        map(keyword("mapping"), |_| true),
    ))(input)?;
    let (input, source) = accessor(input)?;
    let iteration = if is_mapping {
        Iteration::Mapping {
            assoc,
            element,
            source,
        }
    } else {
        Iteration::Sequence {
            assoc,
            element,
            source,
        }
    };
    Ok((input, iteration))
}

/// `for v in [set] ...`
fn set_iteration(input: &str) -> IResult<&str, Iteration> {
    let (input, _) = keyword("for")(input)?;
    let (input, element) = variable(input)?;
    let (input, _) = keyword("in")(input)?;
    let (input, _) = opt(keyword("set"))(input)?;
    let (input, source) = accessor(input)?;
    Ok((input, Iteration::Set { element, source }))
}

fn iteration(input: &str) -> IResult<&str, Iteration> {
    alt((assoc_iteration, set_iteration))(input)
}

fn predicate_spec(input: &str) -> IResult<&str, PredicateSpec> {
    let (input, name) = predicate_name(input)?;
    let (input, args) = delimited(sym('('), comma_list(accessor), sym(')'))(input)?;
    let (input, iterations) = many0(iteration)(input)?;
    let (input, _) = sym(';')(input)?;
    Ok((
        input,
        PredicateSpec {
            name,
            args,
            iterations,
        },
    ))
}

fn input_statement(input: &str) -> IResult<&str, InputSpecification> {
    let (input, _) = keyword("input")(input)?;
    let (input, parameters) = delimited(sym('('), comma_list(variable), sym(')'))(input)?;
    let (input, predicates) = delimited(sym('{'), many0(predicate_spec), sym('}'))(input)?;
    Ok((
        input,
        InputSpecification {
            parameters,
            predicates,
        },
    ))
}

// ============================================================================
// OUTPUT statement
// ============================================================================

fn literal_expr(input: &str) -> IResult<&str, Expr> {
    alt((
        map(integer, |n| Expr::Literal {
            value: Term::Int(n),
        }),
        map(preceded(sc, string_literal), |s| Expr::Literal {
            value: Term::Str(s),
        }),
    ))(input)
}

fn reference_expr(input: &str) -> IResult<&str, Expr> {
    map(preceded(sym('&'), identifier), |name| Expr::Reference {
        name,
    })(input)
}

fn variable_expr(input: &str) -> IResult<&str, Expr> {
    map(asp_variable, |name| Expr::Variable { name })(input)
}

fn object_expr(input: &str) -> IResult<&str, Expr> {
    let (input, constructor) = opt(qualified_identifier)(input)?;
    let (input, args) = delimited(sym('('), comma_list(expr), sym(')'))(input)?;
    Ok((input, Expr::Object { constructor, args }))
}

/// The body of a `predicate:` clause: free text up to the terminating
/// `;`, with quoted substrings exempt from terminator matching. The
/// template is interpreted lazily, at evaluation time (see
/// [`crate::pattern`]).
fn pattern_text(input: &str) -> IResult<&str, String> {
    let (input, _) = sc(input)?;
    let (rest, raw) = recognize(many1(alt((recognize(string_literal), is_not(";\"")))))(input)?;
    Ok((rest, raw.trim().to_string()))
}

#[derive(Debug)]
enum Clause {
    Pattern(String),
    Content(Expr),
    Index(Name),
    Key(Expr),
}

fn clause(input: &str) -> IResult<&str, Clause> {
    alt((
        map(
            delimited(pair(keyword("predicate"), sym(':')), pattern_text, sym(';')),
            Clause::Pattern,
        ),
        map(
            delimited(pair(keyword("content"), sym(':')), expr, sym(';')),
            Clause::Content,
        ),
        map(
            delimited(pair(keyword("index"), sym(':')), asp_variable, sym(';')),
            Clause::Index,
        ),
        map(
            delimited(pair(keyword("key"), sym(':')), expr, sym(';')),
            Clause::Key,
        ),
    ))(input)
}

#[derive(Debug, Default)]
struct Clauses {
    pattern: Option<String>,
    content: Option<Expr>,
    index: Option<Name>,
    key: Option<Expr>,
}

/// One or more clauses in any order, each at most once.
fn clauses(input: &str) -> IResult<&str, Clauses> {
    let (rest, items) = many1(clause)(input)?;
    let mut out = Clauses::default();
    for item in items {
        let duplicate = match item {
            Clause::Pattern(p) => out.pattern.replace(p).is_some(),
            Clause::Content(e) => out.content.replace(e).is_some(),
            Clause::Index(v) => out.index.replace(v).is_some(),
            Clause::Key(e) => out.key.replace(e).is_some(),
        };
        if duplicate {
            return clause_failure(input);
        }
    }
    Ok((rest, out))
}

fn clause_failure<T>(input: &str) -> IResult<&str, T> {
    Err(nom::Err::Failure(nom::error::Error::new(
        input,
        nom::error::ErrorKind::Verify,
    )))
}

fn set_expr(input: &str) -> IResult<&str, Expr> {
    let (input, _) = keyword("set")(input)?;
    let (input, _) = sym('{')(input)?;
    let (input, body) = alt((set_clauses, simple_set))(input)?;
    let (input, _) = sym('}')(input)?;
    Ok((input, body))
}

fn set_clauses(input: &str) -> IResult<&str, Expr> {
    let (rest, c) = clauses(input)?;
    let (Some(pattern), Some(content)) = (c.pattern, c.content) else {
        return clause_failure(input);
    };
    if c.index.is_some() || c.key.is_some() {
        return clause_failure(input);
    }
    Ok((
        rest,
        Expr::Set {
            pattern,
            content: Box::new(content),
        },
    ))
}

fn simple_set(input: &str) -> IResult<&str, Expr> {
    map(predicate_name, |predicate| Expr::SimpleSet { predicate })(input)
}

fn sequence_expr(input: &str) -> IResult<&str, Expr> {
    let (input, _) = keyword("sequence")(input)?;
    let (input, _) = sym('{')(input)?;
    let (rest, c) = clauses(input)?;
    let (Some(pattern), Some(content), Some(index)) = (c.pattern, c.content, c.index) else {
        return clause_failure(input);
    };
    if c.key.is_some() {
        return clause_failure(input);
    }
    let (rest, _) = sym('}')(rest)?;
    Ok((
        rest,
        Expr::Sequence {
            pattern,
            content: Box::new(content),
            index,
        },
    ))
}

fn mapping_expr(input: &str) -> IResult<&str, Expr> {
    let (input, _) = keyword("mapping")(input)?;
    let (input, _) = sym('{')(input)?;
    let (rest, c) = clauses(input)?;
    let (Some(pattern), Some(content), Some(key)) = (c.pattern, c.content, c.key) else {
        return clause_failure(input);
    };
    if c.index.is_some() {
        return clause_failure(input);
    }
    let (rest, _) = sym('}')(rest)?;
    Ok((
        rest,
        Expr::Mapping {
            pattern,
            content: Box::new(content),
            key: Box::new(key),
        },
    ))
}

fn collection_expr(input: &str) -> IResult<&str, Expr> {
    alt((set_expr, sequence_expr, mapping_expr))(input)
}

fn expr(input: &str) -> IResult<&str, Expr> {
    alt((
        literal_expr,
        collection_expr,
        object_expr,
        reference_expr,
        variable_expr,
    ))(input)
}

fn named_def(input: &str) -> IResult<&str, (Name, Expr)> {
    let (input, name) = identifier(input)?;
    let (input, _) = sym('=')(input)?;
    let (input, value) = expr(input)?;
    Ok((input, (name, value)))
}

fn output_statement(input: &str) -> IResult<&str, OutputSpecification> {
    let (input, _) = keyword("output")(input)?;
    let (input, defs) = delimited(sym('{'), comma_list(named_def), sym('}'))(input)?;
    Ok((input, OutputSpecification { defs }))
}

// ============================================================================
// Whole specification
// ============================================================================

enum Statement {
    Input(InputSpecification),
    Output(OutputSpecification),
}

fn statement(input: &str) -> IResult<&str, Statement> {
    alt((
        map(input_statement, Statement::Input),
        map(output_statement, Statement::Output),
    ))(input)
}
