//! Condition cell parser using nom.
//!
//! Reads compact textual conditions, as typed on the command line, into
//! relation cells.
//!
//! # Syntax Overview
//!
//! ```text
//! a.username RIGHT_LIKE 'jack'
//! ─┬──────── ─┬──────── ──┬───
//!  │          │           └── Value: number, 'string' or (list)
//!  │          └── Operator name (any case)
//!  └── Column, optionally alias-qualified
//! ```
//!
//! Strings use single quotes; a doubled quote (`''`) stands for one quote.
//! Lists hold either numbers or strings: `(1, 2, 3)`, `('a', 'b')`.

use nom::{
    branch::alt,
    bytes::complete::{is_not, tag, take_while1},
    character::complete::{char, digit1, multispace0, multispace1},
    combinator::{map, map_res, opt, recognize, value},
    multi::{fold_many0, separated_list1},
    sequence::{delimited, pair, preceded, tuple},
    IResult,
};

use crate::condition::Operator;
use crate::error::{SqlError, SqlResult};
use crate::relation::ConditionRelation;
use crate::value::Value;

/// One parsed condition cell.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub column: String,
    pub operator: Operator,
    pub value: Value,
}

/// Parse a complete `column OPERATOR value` cell.
pub fn parse_cell(input: &str) -> SqlResult<Cell> {
    let input = input.trim();

    let (column, operator, value) = match parse_raw_cell(input) {
        Ok(("", parts)) => parts,
        Ok((remaining, _)) => {
            return Err(SqlError::parse(
                input.len() - remaining.len(),
                format!("Unexpected trailing content: '{}'", remaining),
            ));
        }
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => {
            return Err(SqlError::parse(
                input.len() - e.input.len(),
                format!("Parse failed: {:?}", e.code),
            ));
        }
        Err(nom::Err::Incomplete(_)) => {
            return Err(SqlError::parse(input.len(), "Unexpected end of input"));
        }
    };

    Ok(Cell {
        column: column.to_string(),
        operator: operator.parse()?,
        value,
    })
}

/// Parse every cell and fold them into one relation, in order.
pub fn parse_relation<I, S>(cells: I) -> SqlResult<ConditionRelation>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut relation = ConditionRelation::new();
    for cell in cells {
        let Cell {
            column,
            operator,
            value,
        } = parse_cell(cell.as_ref())?;
        relation.put(column, operator, value);
    }
    Ok(relation)
}

fn parse_raw_cell(input: &str) -> IResult<&str, (&str, &str, Value)> {
    let (input, column) = parse_column(input)?;
    let (input, _) = multispace1(input)?;
    let (input, operator) = parse_identifier(input)?;
    let (input, _) = multispace1(input)?;
    let (input, value) = parse_value(input)?;
    let (input, _) = multispace0(input)?;
    Ok((input, (column, operator, value)))
}

/// Parse an identifier (column, alias, operator).
fn parse_identifier(input: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)
}

/// Parse a column with an optional `alias.` prefix.
fn parse_column(input: &str) -> IResult<&str, &str> {
    recognize(pair(
        parse_identifier,
        opt(preceded(char('.'), parse_identifier)),
    ))(input)
}

fn parse_value(input: &str) -> IResult<&str, Value> {
    alt((
        value(Value::Bool(true), tag("true")),
        value(Value::Bool(false), tag("false")),
        parse_number,
        map(parse_quoted_string, Value::String),
        parse_list,
    ))(input)
}

/// Parse a number (integer or float).
fn parse_number(input: &str) -> IResult<&str, Value> {
    alt((
        map_res(
            recognize(tuple((opt(char('-')), digit1, char('.'), digit1))),
            |s: &str| s.parse::<f64>().map(Value::Float),
        ),
        map(parse_integer, Value::Int),
    ))(input)
}

fn parse_integer(input: &str) -> IResult<&str, i64> {
    map_res(recognize(pair(opt(char('-')), digit1)), str::parse)(input)
}

/// Parse a single-quoted string, unfolding `''` into `'`.
fn parse_quoted_string(input: &str) -> IResult<&str, String> {
    delimited(
        char('\''),
        fold_many0(
            alt((is_not("'"), value("'", tag("''")))),
            String::new,
            |mut acc, part| {
                acc.push_str(part);
                acc
            },
        ),
        char('\''),
    )(input)
}

/// Parse `(n, ...)` or `('s', ...)`.
fn parse_list(input: &str) -> IResult<&str, Value> {
    delimited(
        pair(char('('), multispace0),
        alt((
            map(separated_list1(parse_comma, parse_integer), Value::from),
            map(separated_list1(parse_comma, parse_quoted_string), Value::from),
        )),
        pair(multispace0, char(')')),
    )(input)
}

fn parse_comma(input: &str) -> IResult<&str, char> {
    delimited(multispace0, char(','), multispace0)(input)
}
