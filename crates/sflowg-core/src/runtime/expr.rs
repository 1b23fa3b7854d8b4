//! Expression Host (C13): evaluates expressions against a [`ValueStore`],
//! with the built-in `defined(...)` and `??` coalescing helpers, per spec
//! §4.12/§4.13.

use nom::branch::alt;
use nom::bytes::complete::{tag, take_while1};
use nom::character::complete::{char, digit1, multispace0};
use nom::combinator::{map, opt, recognize};
use nom::number::complete::double;
use nom::sequence::{delimited, pair, preceded};
use nom::IResult;
use serde_json::Value;
use thiserror::Error;

use super::value_store::ValueStore;

#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    Path(String),
    StringLit(String),
    NumberLit(f64),
    BoolLit(bool),
    NullLit,
    Defined(Box<Expr>),
    Coalesce(Box<Expr>, Box<Expr>),
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExprError {
    #[error("malformed expression: {0}")]
    Malformed(String),
}

/// Parses `input` into an [`Expr`]. The expression grammar is: a dotted
/// identifier path, a string/number/bool/null literal, `defined(expr)`, or
/// `expr ?? expr` (lowest precedence).
pub fn parse(input: &str) -> Result<Expr, ExprError> {
    match parse_coalesce(input.trim()) {
        Ok((rest, expr)) if rest.trim().is_empty() => Ok(expr),
        _ => Err(ExprError::Malformed(input.to_string())),
    }
}

fn parse_coalesce(input: &str) -> IResult<&str, Expr> {
    let (input, first) = parse_primary(input)?;
    let (input, rest) = opt(preceded(
        delimited(multispace0, tag("??"), multispace0),
        parse_coalesce,
    ))(input)?;
    let expr = match rest {
        Some(second) => Expr::Coalesce(Box::new(first), Box::new(second)),
        None => first,
    };
    Ok((input, expr))
}

fn parse_primary(input: &str) -> IResult<&str, Expr> {
    let input = input.trim_start();
    alt((parse_defined, parse_parenthesized, parse_literal, parse_path))(input)
}

fn parse_parenthesized(input: &str) -> IResult<&str, Expr> {
    delimited(
        pair(char('('), multispace0),
        parse_coalesce,
        pair(multispace0, char(')')),
    )(input)
}

fn parse_defined(input: &str) -> IResult<&str, Expr> {
    let (input, _) = tag("defined")(input)?;
    let (input, _) = multispace0(input)?;
    let (input, inner) = delimited(
        pair(char('('), multispace0),
        parse_coalesce,
        pair(multispace0, char(')')),
    )(input)?;
    Ok((input, Expr::Defined(Box::new(inner))))
}

fn parse_literal(input: &str) -> IResult<&str, Expr> {
    alt((parse_string_lit, parse_bool_lit, parse_null_lit, parse_number_lit))(input)
}

fn parse_string_lit(input: &str) -> IResult<&str, Expr> {
    map(
        delimited(char('"'), nom::bytes::complete::take_till(|c| c == '"'), char('"')),
        |s: &str| Expr::StringLit(s.to_string()),
    )(input)
}

fn parse_bool_lit(input: &str) -> IResult<&str, Expr> {
    alt((
        map(tag("true"), |_| Expr::BoolLit(true)),
        map(tag("false"), |_| Expr::BoolLit(false)),
    ))(input)
}

fn parse_null_lit(input: &str) -> IResult<&str, Expr> {
    map(tag("null"), |_| Expr::NullLit)(input)
}

fn parse_number_lit(input: &str) -> IResult<&str, Expr> {
    map(recognize(pair(opt(char('-')), alt((recognize(pair(digit1, opt(pair(char('.'), digit1)))), digit1)))), |s: &str| {
        Expr::NumberLit(double::<_, nom::error::Error<&str>>(s).map(|(_, n)| n).unwrap_or(0.0))
    })(input)
}

fn parse_path(input: &str) -> IResult<&str, Expr> {
    map(
        recognize(pair(
            take_while1(is_path_start),
            nom::multi::many0(alt((
                recognize(pair(char('.'), take_while1(is_path_char))),
                recognize(take_while1(is_path_char)),
            ))),
        )),
        |s: &str| Expr::Path(s.to_string()),
    )(input)
}

fn is_path_start(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_path_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Evaluates `expr` against `store`. A missing path resolves to `Value::Null`
/// rather than an error; the only way evaluation fails is a malformed
/// expression, which is rejected at parse time.
pub fn eval(expr: &Expr, store: &ValueStore) -> Value {
    match expr {
        Expr::Path(path) => store.get(path).cloned().unwrap_or(Value::Null),
        Expr::StringLit(s) => Value::String(s.clone()),
        Expr::NumberLit(n) => serde_json::Number::from_f64(*n).map(Value::Number).unwrap_or(Value::Null),
        Expr::BoolLit(b) => Value::Bool(*b),
        Expr::NullLit => Value::Null,
        Expr::Defined(inner) => Value::Bool(!matches!(eval(inner, store), Value::Null)),
        Expr::Coalesce(first, second) => {
            let value = eval(first, store);
            if matches!(value, Value::Null) {
                eval(second, store)
            } else {
                value
            }
        }
    }
}

/// Parses and evaluates `raw` in one step, as used by the Step Executor for
/// any string argument (spec §4.12: strings are always treated as
/// expressions).
pub fn parse_and_eval(raw: &str, store: &ValueStore) -> Result<Value, ExprError> {
    let expr = parse(raw)?;
    Ok(eval(&expr, store))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn parses_path_literal_and_evaluates() {
        let mut store = ValueStore::new();
        store.set("request.body.id", json!(42));
        let value = parse_and_eval("request.body.id", &store).unwrap();
        assert_eq!(value, json!(42));
    }

    #[test]
    fn parses_string_literal() {
        let store = ValueStore::new();
        let value = parse_and_eval("\"hello\"", &store).unwrap();
        assert_eq!(value, json!("hello"));
    }

    #[test]
    fn defined_reports_presence() {
        let mut store = ValueStore::new();
        store.set("x", json!(1));
        assert_eq!(parse_and_eval("defined(x)", &store).unwrap(), json!(true));
        assert_eq!(parse_and_eval("defined(y)", &store).unwrap(), json!(false));
    }

    #[test]
    fn coalescing_falls_through_on_null() {
        let mut store = ValueStore::new();
        store.set("fallback", json!("default"));
        let value = parse_and_eval("missing ?? fallback", &store).unwrap();
        assert_eq!(value, json!("default"));
    }

    #[test]
    fn coalescing_prefers_first_defined_value() {
        let mut store = ValueStore::new();
        store.set("primary", json!("present"));
        store.set("fallback", json!("default"));
        let value = parse_and_eval("primary ?? fallback", &store).unwrap();
        assert_eq!(value, json!("present"));
    }

    #[test]
    fn malformed_expression_errors() {
        let store = ValueStore::new();
        assert!(parse_and_eval("(unclosed", &store).is_err());
    }
}
