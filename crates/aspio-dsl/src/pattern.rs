//! Literal patterns: predicate-shaped templates that select and bind facts.
//!
//! The grammar stores the body of a `predicate:` clause as opaque text
//! (see [`crate::parser`]); this module gives that text its meaning. A
//! template like `colored(N, "red", 3)` names a predicate and, per
//! position, either a fixed value that a fact must carry verbatim or a
//! variable that a matching fact binds.
//!
//! Following ASP convention, a bare identifier starting with an uppercase
//! letter is a variable; integers, quoted strings, and lowercase symbols
//! are fixed values. A variable repeated across positions must match the
//! same value in every position.

use std::collections::HashMap;

use nom::{
    branch::alt,
    bytes::complete::{take_while, take_while1},
    character::complete::{char as pchar, digit1, multispace0},
    combinator::{all_consuming, map, map_res, opt, recognize},
    multi::separated_list0,
    sequence::{delimited, pair, preceded, terminated},
    IResult,
};
use serde::{Deserialize, Serialize};

use crate::ast::{Name, Term};
use crate::parser::{string_literal, syntax_error, ParseError};

/// One argument position of a literal pattern.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "tag", rename_all = "snake_case")]
pub enum PatternSlot {
    Fixed { value: Term },
    Var { name: Name },
}

/// A parsed literal pattern: predicate name, arity, and per-position
/// fixed values or variables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiteralPattern {
    pub predicate: Name,
    pub slots: Vec<PatternSlot>,
}

impl LiteralPattern {
    /// Parse a pattern template such as `colored(N, "red")` or `done`.
    pub fn parse(template: &str) -> Result<LiteralPattern, ParseError> {
        match all_consuming(terminated(pattern, multispace0))(template) {
            Ok((_, p)) => Ok(p),
            Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
                Err(syntax_error(template, e.input))
            }
            Err(nom::Err::Incomplete(_)) => Err(syntax_error(template, "")),
        }
    }

    pub fn arity(&self) -> usize {
        self.slots.len()
    }

    /// Match one fact's argument tuple against this pattern.
    ///
    /// Returns the variable bindings on a match, `None` when the arity
    /// differs, a fixed slot disagrees, or a repeated variable would bind
    /// two different values.
    pub fn match_args(&self, args: &[Term]) -> Option<HashMap<Name, Term>> {
        if args.len() != self.slots.len() {
            return None;
        }
        let mut bindings: HashMap<Name, Term> = HashMap::new();
        for (slot, arg) in self.slots.iter().zip(args) {
            match slot {
                PatternSlot::Fixed { value } => {
                    if value != arg {
                        return None;
                    }
                }
                PatternSlot::Var { name } => match bindings.get(name) {
                    Some(bound) if bound != arg => return None,
                    Some(_) => {}
                    None => {
                        bindings.insert(name.clone(), arg.clone());
                    }
                },
            }
        }
        Some(bindings)
    }
}

fn pattern(input: &str) -> IResult<&str, LiteralPattern> {
    let (input, predicate) = preceded(multispace0, symbol)(input)?;
    let (input, slots) = opt(delimited(
        preceded(multispace0, pchar('(')),
        separated_list0(preceded(multispace0, pchar(',')), slot),
        preceded(multispace0, pchar(')')),
    ))(input)?;
    Ok((
        input,
        LiteralPattern {
            predicate,
            slots: slots.unwrap_or_default(),
        },
    ))
}

fn symbol(input: &str) -> IResult<&str, Name> {
    map(
        recognize(pair(
            take_while1(|c: char| c.is_ascii_alphabetic()),
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        )),
        str::to_string,
    )(input)
}

fn slot(input: &str) -> IResult<&str, PatternSlot> {
    preceded(
        multispace0,
        alt((
            map(map_res(digit1, |s: &str| s.parse::<i64>()), |n| {
                PatternSlot::Fixed {
                    value: Term::Int(n),
                }
            }),
            map(string_literal, |s| PatternSlot::Fixed {
                value: Term::Str(s),
            }),
            map(symbol, |name| {
                if name.starts_with(|c: char| c.is_ascii_uppercase()) {
                    PatternSlot::Var { name }
                } else {
                    PatternSlot::Fixed {
                        value: Term::Str(name),
                    }
                }
            }),
        )),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_variables_and_fixed_values() {
        let p = LiteralPattern::parse(r#"colored(N, "red", 3, blue)"#).expect("parse");
        assert_eq!(p.predicate, "colored");
        assert_eq!(p.arity(), 4);
        assert_eq!(
            p.slots,
            vec![
                PatternSlot::Var {
                    name: "N".to_string()
                },
                PatternSlot::Fixed {
                    value: Term::Str("red".to_string())
                },
                PatternSlot::Fixed {
                    value: Term::Int(3)
                },
                PatternSlot::Fixed {
                    value: Term::Str("blue".to_string())
                },
            ]
        );
    }

    #[test]
    fn parses_nullary_pattern() {
        assert_eq!(LiteralPattern::parse("done").expect("parse").arity(), 0);
        assert_eq!(LiteralPattern::parse("done()").expect("parse").arity(), 0);
    }

    #[test]
    fn rejects_malformed_template() {
        assert!(LiteralPattern::parse("p(X").is_err());
        assert!(LiteralPattern::parse("p(X) trailing").is_err());
        assert!(LiteralPattern::parse("").is_err());
    }

    #[test]
    fn matches_and_binds() {
        let p = LiteralPattern::parse("colored(N, C)").expect("parse");
        let bindings = p
            .match_args(&[Term::Str("a".to_string()), Term::Str("red".to_string())])
            .expect("match");
        assert_eq!(bindings["N"], Term::Str("a".to_string()));
        assert_eq!(bindings["C"], Term::Str("red".to_string()));
    }

    #[test]
    fn fixed_positions_filter_facts() {
        let p = LiteralPattern::parse(r#"colored(N, "red")"#).expect("parse");
        assert!(p
            .match_args(&[Term::Str("a".to_string()), Term::Str("red".to_string())])
            .is_some());
        assert!(p
            .match_args(&[Term::Str("a".to_string()), Term::Str("blue".to_string())])
            .is_none());
    }

    #[test]
    fn arity_mismatch_does_not_match() {
        let p = LiteralPattern::parse("p(X, Y)").expect("parse");
        assert!(p.match_args(&[Term::Int(1)]).is_none());
    }

    #[test]
    fn repeated_variable_must_agree() {
        let p = LiteralPattern::parse("edge(X, X)").expect("parse");
        assert!(p.match_args(&[Term::Int(1), Term::Int(1)]).is_some());
        assert!(p.match_args(&[Term::Int(1), Term::Int(2)]).is_none());
    }
}
