//! Import functions shipped with the CLI under module `builtin.math`.

use serde_json::{Map, Number, Value, json};
use weaver_core::{Error, Result, ToolReturn};
use weaver_engine::{FnTool, SymbolTable};

/// Module path the built-in functions are registered under
pub const MODULE: &str = "builtin.math";

/// Symbol table holding every built-in function
pub fn symbols() -> SymbolTable {
    SymbolTable::new()
        .with_function(MODULE, FnTool::new("add_numbers", ["a", "b"], add_numbers))
        .with_function(
            MODULE,
            FnTool::new("multiply_by_two", ["add_numbers_result"], multiply_by_two),
        )
        .with_function(
            MODULE,
            FnTool::new("format_result", ["multiply_by_two_result"], format_result),
        )
}

fn number(inputs: &Map<String, Value>, name: &str) -> Result<Number> {
    match inputs.get(name) {
        Some(Value::Number(number)) => Ok(number.clone()),
        Some(other) => Err(Error::ToolCall(format!("{name} is not a number: {other}"))),
        None => Err(Error::MissingRequiredInput {
            input: name.to_owned(),
        }),
    }
}

fn combine(
    left: &Number,
    right: &Number,
    int_op: fn(i64, i64) -> Option<i64>,
    float_op: fn(f64, f64) -> f64,
) -> Value {
    if let (Some(left), Some(right)) = (left.as_i64(), right.as_i64())
        && let Some(value) = int_op(left, right)
    {
        return json!(value);
    }
    let left = left.as_f64().unwrap_or_default();
    let right = right.as_f64().unwrap_or_default();
    Number::from_f64(float_op(left, right)).map_or(Value::Null, Value::Number)
}

fn add_numbers(inputs: &Map<String, Value>) -> Result<ToolReturn> {
    let sum = combine(
        &number(inputs, "a")?,
        &number(inputs, "b")?,
        i64::checked_add,
        |left, right| left + right,
    );
    Ok(ToolReturn::from(sum))
}

fn multiply_by_two(inputs: &Map<String, Value>) -> Result<ToolReturn> {
    let doubled = combine(
        &number(inputs, "add_numbers_result")?,
        &Number::from(2),
        i64::checked_mul,
        |left, right| left * right,
    );
    Ok(ToolReturn::from(doubled))
}

fn format_result(inputs: &Map<String, Value>) -> Result<ToolReturn> {
    let value = number(inputs, "multiply_by_two_result")?;
    Ok(ToolReturn::from(json!({
        "formatted": format!("The final result is: {value}")
    })))
}
