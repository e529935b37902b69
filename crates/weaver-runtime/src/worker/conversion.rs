//! JavaScript value to JSON conversion.

use boa_engine::{Context, JsNativeError, JsResult, JsValue, js_string};
use serde_json::{Map, Number, Value};

/// Largest array a result may contain.
const MAX_ARRAY_LENGTH: u32 = 1_000_000;
/// Deepest nesting of arrays and objects a result may contain.
const MAX_DEPTH: usize = 128;

/// Convert a JavaScript value into a JSON value
///
/// Whole finite numbers become integers. Values with no JSON counterpart
/// (functions, symbols) are rendered with their display form.
///
/// # Errors
/// Returns error if reading an object property throws, or a `RangeError`
/// when an array is longer than `MAX_ARRAY_LENGTH` or the value nests
/// deeper than `MAX_DEPTH` (cyclic values included)
pub fn js_value_to_json(value: &JsValue, context: &mut Context) -> JsResult<Value> {
    convert(value, context, 0)
}

fn convert(value: &JsValue, context: &mut Context, depth: usize) -> JsResult<Value> {
    if value.is_null() || value.is_undefined() {
        Ok(Value::Null)
    } else if let Some(boolean) = value.as_boolean() {
        Ok(Value::Bool(boolean))
    } else if let Some(number) = value.as_number() {
        if number.fract().abs() < f64::EPSILON
            && number.is_finite()
            && number.abs() < 9_007_199_254_740_992.0
        {
            Ok(Value::Number(Number::from(number as i64)))
        } else {
            Ok(Number::from_f64(number).map_or(Value::Null, Value::Number))
        }
    } else if let Some(string) = value.as_string() {
        Ok(Value::String(string.to_std_string_escaped()))
    } else if let Some(obj) = value.as_object() {
        if obj.is_callable() {
            return Ok(Value::String(value.display().to_string()));
        }
        if depth >= MAX_DEPTH {
            return Err(JsNativeError::range()
                .with_message(format!("result nests deeper than {MAX_DEPTH} levels"))
                .into());
        }
        if obj.is_array() {
            let length = obj
                .get(js_string!("length"), context)?
                .to_u32(context)
                .unwrap_or(0);
            if length > MAX_ARRAY_LENGTH {
                return Err(JsNativeError::range()
                    .with_message(format!(
                        "result array has {length} elements; at most {MAX_ARRAY_LENGTH} are allowed"
                    ))
                    .into());
            }
            let mut array = Vec::new();
            for index in 0..length {
                let element = obj.get(index, context)?;
                array.push(convert(&element, context, depth + 1)?);
            }
            Ok(Value::Array(array))
        } else {
            let mut map = Map::new();
            for key in obj.own_property_keys(context)? {
                let key_value = JsValue::from(key.clone());
                let key_string = key_value.to_string(context)?;
                let prop_value = obj.get(key, context)?;
                if prop_value.is_undefined() {
                    continue;
                }
                map.insert(
                    key_string.to_std_string_escaped(),
                    convert(&prop_value, context, depth + 1)?,
                );
            }
            Ok(Value::Object(map))
        }
    } else {
        Ok(Value::String(value.display().to_string()))
    }
}
