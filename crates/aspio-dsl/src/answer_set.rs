//! Parser for one line of solver output.
//!
//! A line has the shape `{p(1,"a"), q, r(x,2)}`. Facts are collected per
//! predicate in first-occurrence order, and duplicate tuples are appended
//! as-is: the upstream solver already deduplicates, so no collision
//! checking happens here.

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

/// One fact's argument tuple.
pub type FactTuple = Vec<Term>;

/// All facts of one answer set, grouped by predicate.
///
/// Predicate order follows first occurrence in the parsed line; tuple
/// order per predicate follows occurrence order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnswerSet {
    entries: Vec<(Name, Vec<FactTuple>)>,
}

impl AnswerSet {
    pub fn push(&mut self, predicate: &str, args: FactTuple) {
        match self
            .entries
            .iter_mut()
            .find(|(name, _)| name == predicate)
        {
            Some((_, tuples)) => tuples.push(args),
            None => self.entries.push((predicate.to_string(), vec![args])),
        }
    }

    /// The tuples stored under `predicate` (empty if it has no facts).
    pub fn tuples(&self, predicate: &str) -> &[FactTuple] {
        self.entries
            .iter()
            .find(|(name, _)| name == predicate)
            .map(|(_, tuples)| tuples.as_slice())
            .unwrap_or(&[])
    }

    pub fn predicates(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[FactTuple])> {
        self.entries
            .iter()
            .map(|(name, tuples)| (name.as_str(), tuples.as_slice()))
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Parse one solver output line into an [`AnswerSet`].
pub fn parse_answer_set(line: &str) -> Result<AnswerSet, ParseError> {
    match all_consuming(terminated(answer_set, multispace0))(line) {
        Ok((_, set)) => Ok(set),
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => Err(syntax_error(line, e.input)),
        Err(nom::Err::Incomplete(_)) => Err(syntax_error(line, "")),
    }
}

fn answer_set(input: &str) -> IResult<&str, AnswerSet> {
    let (input, facts) = delimited(
        preceded(multispace0, pchar('{')),
        separated_list0(preceded(multispace0, pchar(',')), fact),
        preceded(multispace0, pchar('}')),
    )(input)?;
    let mut set = AnswerSet::default();
    for (predicate, args) in facts {
        set.push(&predicate, args);
    }
    Ok((input, set))
}

fn fact(input: &str) -> IResult<&str, (Name, FactTuple)> {
    let (input, predicate) = preceded(multispace0, predicate_name)(input)?;
    let (input, args) = opt(delimited(
        preceded(multispace0, pchar('(')),
        separated_list0(preceded(multispace0, pchar(',')), argument),
        preceded(multispace0, pchar(')')),
    ))(input)?;
    Ok((input, (predicate, args.unwrap_or_default())))
}

fn predicate_name(input: &str) -> IResult<&str, Name> {
    map(
        recognize(pair(
            take_while1(|c: char| c.is_ascii_alphabetic()),
            take_while(|c: char| c.is_ascii_alphanumeric() || c == '_'),
        )),
        str::to_string,
    )(input)
}

fn argument(input: &str) -> IResult<&str, Term> {
    preceded(
        multispace0,
        alt((
            map(map_res(digit1, |s: &str| s.parse::<i64>()), Term::Int),
            map(string_literal, Term::Str),
            // Bare constant symbols surface as strings, same as quoted ones.
            map(predicate_name, Term::Str),
        )),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(v: &str) -> Term {
        Term::Str(v.to_string())
    }

    #[test]
    fn parses_facts_with_mixed_arguments() {
        let set = parse_answer_set(r#"{p(1,"a"), q()}"#).expect("parse");
        assert_eq!(set.tuples("p"), &[vec![Term::Int(1), s("a")]]);
        assert_eq!(set.tuples("q"), &[Vec::new()]);
    }

    #[test]
    fn parses_bare_symbols_and_zero_arity() {
        let set = parse_answer_set("{ colored(a, red), sat }").expect("parse");
        assert_eq!(set.tuples("colored"), &[vec![s("a"), s("red")]]);
        assert_eq!(set.tuples("sat"), &[Vec::new()]);
    }

    #[test]
    fn preserves_first_occurrence_and_tuple_order() {
        let set = parse_answer_set("{p(2), q(9), p(1), p(2)}").expect("parse");
        assert_eq!(set.predicates().collect::<Vec<_>>(), vec!["p", "q"]);
        // Duplicates are appended, not collapsed.
        assert_eq!(
            set.tuples("p"),
            &[vec![Term::Int(2)], vec![Term::Int(1)], vec![Term::Int(2)]]
        );
    }

    #[test]
    fn parses_empty_answer_set() {
        let set = parse_answer_set("{}").expect("parse");
        assert!(set.is_empty());
        assert!(set.tuples("anything").is_empty());
    }

    #[test]
    fn unwraps_string_escapes() {
        let set = parse_answer_set(r#"{p("a\"b\\c")}"#).expect("parse");
        assert_eq!(set.tuples("p"), &[vec![s(r#"a"b\c"#)]]);
    }

    #[test]
    fn rejects_malformed_lines() {
        for line in [
            "{p(1)",       // unterminated brace
            "{p(}",        // malformed argument
            "{p(1)} rest", // trailing input
            "p(1)",        // missing braces
            "{p(1,)}",     // dangling comma
        ] {
            let err = parse_answer_set(line).unwrap_err();
            assert!(matches!(err, ParseError::Syntax { .. }), "{line}: {err}");
        }
    }

    #[test]
    fn error_position_points_at_offending_text() {
        let err = parse_answer_set("{p(1), q(:)}").unwrap_err();
        match err {
            ParseError::Syntax { column, .. } => assert!(column >= 8, "column {column}"),
            other => panic!("expected syntax error, got {other}"),
        }
    }

    mod properties {
        use super::*;
        use proptest::prelude::*;

        fn symbol_strategy() -> impl Strategy<Value = String> {
            "[a-z][a-z0-9_]{0,8}"
        }

        fn term_strategy() -> impl Strategy<Value = Term> {
            prop_oneof![
                (0i64..100_000).prop_map(Term::Int),
                symbol_strategy().prop_map(Term::Str),
                "[A-Za-z0-9 .:;,%-]{0,12}".prop_map(Term::Str),
            ]
        }

        fn render_line(facts: &[(String, Vec<Term>)]) -> String {
            let rendered: Vec<String> = facts
                .iter()
                .map(|(name, args)| {
                    if args.is_empty() {
                        name.clone()
                    } else {
                        let args: Vec<String> = args.iter().map(Term::to_asp).collect();
                        format!("{name}({})", args.join(","))
                    }
                })
                .collect();
            format!("{{{}}}", rendered.join(", "))
        }

        proptest! {
            #![proptest_config(ProptestConfig {
                cases: 256,
                failure_persistence: None,
                ..ProptestConfig::default()
            })]

            #[test]
            fn parses_rendered_fact_lines(
                facts in prop::collection::vec(
                    (symbol_strategy(), prop::collection::vec(term_strategy(), 0..4)),
                    0..6,
                )
            ) {
                let line = render_line(&facts);
                let set = parse_answer_set(&line).expect("rendered line must parse");
                let parsed: usize = set.iter().map(|(_, tuples)| tuples.len()).sum();
                prop_assert_eq!(parsed, facts.len());
                for (name, args) in &facts {
                    prop_assert!(set.tuples(name).contains(args));
                }
            }
        }
    }
}
