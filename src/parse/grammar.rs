//! Mini-grammars for the condition and constraint lists inside
//! `evaluate(...)` and `method(...)` designators.

use std::collections::BTreeMap;

use winnow::combinator::{alt, delimited, opt, separated, terminated};
use winnow::error::ModalResult;
use winnow::prelude::*;
use winnow::token::{any, take_while};

use crate::runtime::condition::{
    ArgumentConstraint, ConditionOperand, RuntimeCondition, RuntimeOp,
};
use crate::value::Value;

// -- Whitespace -------------------------------------------------------------

fn ws(input: &mut &str) -> ModalResult<()> {
    take_while(0.., |c: char| c.is_ascii_whitespace())
        .void()
        .parse_next(input)
}

// -- Tokens -----------------------------------------------------------------

fn quoted_string(input: &mut &str, mut quote: char) -> ModalResult<String> {
    quote.parse_next(input)?;
    let mut s = String::new();
    loop {
        let ch = any.parse_next(input)?;
        if ch == quote {
            return Ok(s);
        }
        if ch == '\\' {
            let esc = any.parse_next(input)?;
            if esc == quote || esc == '\\' {
                s.push(esc);
            } else {
                s.push('\\');
                s.push(esc);
            }
        } else {
            s.push(ch);
        }
    }
}

fn double_quoted(input: &mut &str) -> ModalResult<String> {
    quoted_string(input, '"')
}

fn single_quoted(input: &mut &str) -> ModalResult<String> {
    quoted_string(input, '\'')
}

/// Bare tokens cover dotted property paths, numbers and identifiers
/// uniformly; their interpretation happens in
/// [`ConditionOperand::from_token`].
fn bare_token<'i>(input: &mut &'i str) -> ModalResult<&'i str> {
    take_while(1.., |c: char| {
        c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'
    })
    .parse_next(input)
}

// Longer operators first, so `===` wins over `==`
fn runtime_op(input: &mut &str) -> ModalResult<RuntimeOp> {
    alt((
        "===".value(RuntimeOp::EqStrict),
        "==".value(RuntimeOp::Eq),
        "!==".value(RuntimeOp::NeqStrict),
        "!=".value(RuntimeOp::Neq),
        "<=".value(RuntimeOp::Lte),
        ">=".value(RuntimeOp::Gte),
        "<".value(RuntimeOp::Lt),
        ">".value(RuntimeOp::Gt),
        "in".value(RuntimeOp::In),
        "contains".value(RuntimeOp::Contains),
        "matches".value(RuntimeOp::Matches),
    ))
    .parse_next(input)
}

// -- Operands ---------------------------------------------------------------

fn list_entry(input: &mut &str) -> ModalResult<ConditionOperand> {
    alt((
        double_quoted.map(|s| ConditionOperand::Literal(Value::String(s))),
        single_quoted.map(|s| ConditionOperand::Literal(Value::String(s))),
        bare_token.map(ConditionOperand::from_token),
    ))
    .parse_next(input)
}

fn value_list(input: &mut &str) -> ModalResult<Vec<ConditionOperand>> {
    delimited(
        ('(', ws),
        separated(1.., list_entry, (ws, ',', ws)),
        (ws, ')'),
    )
    .parse_next(input)
}

fn operand(input: &mut &str) -> ModalResult<ConditionOperand> {
    alt((
        double_quoted.map(|s| ConditionOperand::Literal(Value::String(s))),
        single_quoted.map(|s| ConditionOperand::Literal(Value::String(s))),
        value_list.map(ConditionOperand::List),
        bare_token.map(ConditionOperand::from_token),
    ))
    .parse_next(input)
}

// -- Condition lists --------------------------------------------------------

fn condition(input: &mut &str) -> ModalResult<RuntimeCondition> {
    let (_, left, _, operator, _, right) =
        (ws, operand, ws, runtime_op, ws, operand).parse_next(input)?;
    Ok(RuntimeCondition {
        left,
        operator,
        right,
    })
}

fn condition_list(input: &mut &str) -> ModalResult<Vec<RuntimeCondition>> {
    terminated(
        separated(1.., condition, (ws, ',')),
        (opt((ws, ',')), ws),
    )
    .parse_next(input)
}

fn constraint_entry(input: &mut &str) -> ModalResult<(String, RuntimeOp, ConditionOperand)> {
    let (_, key, _, operator, _, value) =
        (ws, bare_token, ws, runtime_op, ws, operand).parse_next(input)?;
    Ok((key.to_owned(), operator, value))
}

fn constraint_list(
    input: &mut &str,
) -> ModalResult<Vec<(String, RuntimeOp, ConditionOperand)>> {
    terminated(
        separated(1.., constraint_entry, (ws, ',')),
        (opt((ws, ',')), ws),
    )
    .parse_next(input)
}

// -- Entry points -----------------------------------------------------------

/// Parses the condition list of an `evaluate(...)` designator.
pub(crate) fn parse_conditions(input: &str) -> Result<Vec<RuntimeCondition>, String> {
    condition_list.parse(input).map_err(|e| e.to_string())
}

/// Parses the argument list of a `method(...)` or annotation designator
/// into per-argument constraints; repeated constraints on one argument
/// accumulate in order.
pub(crate) fn parse_argument_constraints(
    input: &str,
) -> Result<BTreeMap<String, ArgumentConstraint>, String> {
    let entries = constraint_list.parse(input).map_err(|e| e.to_string())?;
    let mut constraints: BTreeMap<String, ArgumentConstraint> = BTreeMap::new();
    for (key, operator, value) in entries {
        constraints.entry(key).or_default().push(operator, value);
    }
    Ok(constraints)
}
