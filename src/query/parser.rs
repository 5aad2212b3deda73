//! Query language parser using nom.
//!
//! Reads the strings produced by [`FilterExpr`]'s `Display` back into the
//! AST. Literals are kept in their escaped form; the evaluator compares them
//! against escaped document values.

use super::ast::*;
use crate::core::{RedtraceError, Result};
use nom::{
    branch::alt,
    bytes::complete::{escaped, is_not, tag, take_while1},
    character::complete::{anychar, char, multispace0, multispace1},
    combinator::{all_consuming, map, value as nom_value, verify},
    multi::separated_list1,
    number::complete::double,
    sequence::{delimited, preceded, separated_pair, tuple},
    IResult,
};

/// Parse a query string into a filter expression
pub fn parse_filter(input: &str) -> Result<FilterExpr> {
    let input = input.trim();

    if input.is_empty() {
        return Err(RedtraceError::parse("empty query"));
    }
    if input == "*" {
        return Ok(FilterExpr::all());
    }

    match all_consuming(predicates)(input) {
        Ok((_, predicates)) => Ok(FilterExpr { predicates }),
        Err(e) => Err(RedtraceError::parse(format!("failed to parse query '{}': {}", input, e))),
    }
}

/// Whitespace-separated conjunction of terms
fn predicates(input: &str) -> IResult<&str, Vec<Predicate>> {
    separated_list1(multispace1, predicate)(input)
}

/// `@field:` followed by one of the value forms
fn predicate(input: &str) -> IResult<&str, Predicate> {
    let (input, field) = delimited(char('@'), field_name, char(':'))(input)?;
    let field = field.to_string();

    alt((
        map(tag_set, {
            let field = field.clone();
            move |values| Predicate::Tag {
                field: field.clone(),
                values,
            }
        }),
        map(range, {
            let field = field.clone();
            move |(min, max)| Predicate::Range {
                field: field.clone(),
                min,
                max,
            }
        }),
        map(text_group, {
            let field = field.clone();
            move |alternatives| Predicate::Text {
                field: field.clone(),
                alternatives,
            }
        }),
        map(literal, move |lit| Predicate::Text {
            field: field.clone(),
            alternatives: vec![lit],
        }),
    ))(input)
}

/// Attribute names (e.g., processServiceName, span_kind)
fn field_name(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

/// `{a|b}`
fn tag_set(input: &str) -> IResult<&str, Vec<String>> {
    delimited(char('{'), alternatives, char('}'))(input)
}

/// `(a|b)`
fn text_group(input: &str) -> IResult<&str, Vec<String>> {
    delimited(char('('), alternatives, char(')'))(input)
}

fn alternatives(input: &str) -> IResult<&str, Vec<String>> {
    separated_list1(
        char('|'),
        delimited(multispace0, literal, multispace0),
    )(input)
}

/// `[min max]`
fn range(input: &str) -> IResult<&str, (Bound, Bound)> {
    delimited(
        tuple((char('['), multispace0)),
        separated_pair(bound, multispace1, bound),
        tuple((multispace0, char(']'))),
    )(input)
}

/// Parse range bounds
fn bound(input: &str) -> IResult<&str, Bound> {
    alt((
        nom_value(Bound::NegInfinity, tag("-inf")),
        nom_value(Bound::PosInfinity, preceded(char('+'), tag("inf"))),
        nom_value(Bound::PosInfinity, tag("inf")),
        map(double, Bound::Value),
    ))(input)
}

/// An escaped literal; a backslash always consumes the following character
fn literal(input: &str) -> IResult<&str, String> {
    map(
        verify(escaped(is_not(" \t\r\n|{}()[]\\"), '\\', anychar), |s: &str| !s.is_empty()),
        |s: &str| s.to_string(),
    )(input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::escape::encode;

    #[test]
    fn test_match_all() {
        assert!(parse_filter("*").unwrap().is_match_all());
        assert!(parse_filter("  *  ").unwrap().is_match_all());
        assert!(parse_filter("").is_err());
    }

    #[test]
    fn test_single_literal() {
        let expr = parse_filter("@processServiceName:checkout").unwrap();
        assert_eq!(expr.predicates, vec![Predicate::text("processServiceName", "checkout")]);
    }

    #[test]
    fn test_all_forms() {
        let expr = parse_filter(
            "@traceID:(00000000000000a1|00000000000000b2) @tagKey:{error|http\\.status} \
             @duration:[-inf 5000] @startTime:[1 +inf]",
        )
        .unwrap();

        assert_eq!(
            expr.predicates,
            vec![
                Predicate::Text {
                    field: "traceID".to_string(),
                    alternatives: vec!["00000000000000a1".to_string(), "00000000000000b2".to_string()],
                },
                Predicate::Tag {
                    field: "tagKey".to_string(),
                    values: vec!["error".to_string(), "http\\.status".to_string()],
                },
                Predicate::range("duration", Bound::NegInfinity, Bound::Value(5000.0)),
                Predicate::range("startTime", Bound::Value(1.0), Bound::PosInfinity),
            ]
        );
    }

    #[test]
    fn test_escaped_literals_stay_escaped() {
        let raw = encode("POST /api/v1 {id}|x\\y");
        let query = format!("@operationName:{}", raw);
        let expr = parse_filter(&query).unwrap();
        assert_eq!(expr.predicates, vec![Predicate::text("operationName", raw)]);
    }

    #[test]
    fn test_display_parses_back() {
        let expr = FilterExpr::all()
            .and(Predicate::text("processServiceName", encode("front end")))
            .and(Predicate::tag("tagPair", format!("{}={}", encode("http.code"), encode("500"))))
            .and(Predicate::range("startTime", Bound::from(10u64), Bound::from(20u64)));
        assert_eq!(parse_filter(&expr.to_string()).unwrap(), expr);
    }

    #[test]
    fn test_rejects_malformed() {
        assert!(parse_filter("service=api").is_err());
        assert!(parse_filter("@duration:[1]").is_err());
        assert!(parse_filter("@tagKey:{}").is_err());
        assert!(parse_filter("@tagKey:{a").is_err());
        assert!(parse_filter("@traceID:").is_err());
        assert!(parse_filter("@a:b trailing").is_err());
    }
}
