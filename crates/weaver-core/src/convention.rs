//! Context propagation convention.
//!
//! A tool function is a transform over explicitly named inputs. Binding reads
//! each declared input from the [`SharedContext`]; folding writes the
//! function's return value back. Both the in-process and the worker dispatch
//! path go through [`bind_inputs`] semantics and [`fold`], so a function
//! produces the same context no matter where it ran.

use serde_json::{Map, Value};

use crate::context::SharedContext;
use crate::error::{Error, Result};

/// Error name a worker uses to report a missing declared input.
///
/// The error message carries the input name only.
pub const MISSING_INPUT_ERROR: &str = "MissingRequiredInput";

/// Suffix of the key under which scalar returns are stored.
const RESULT_SUFFIX: &str = "_result";

/// Value returned by a tool function, classified for folding.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolReturn {
    /// No return value; the context is left untouched
    Nothing,
    /// Mapping return; merged key by key
    Mapping(Map<String, Value>),
    /// Any other value; stored under `<function>_result`
    Scalar(Value),
}

impl ToolReturn {
    /// Classify an optional JSON value.
    ///
    /// `None` and `null` both mean "no return".
    pub fn from_value(value: Option<Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::Nothing,
            Some(Value::Object(map)) => Self::Mapping(map),
            Some(other) => Self::Scalar(other),
        }
    }
}

impl From<Value> for ToolReturn {
    fn from(value: Value) -> Self {
        Self::from_value(Some(value))
    }
}

/// Key under which a scalar return of `function` is stored
pub fn result_key(function: &str) -> String {
    format!("{function}{RESULT_SUFFIX}")
}

/// Read every declared input from the context.
///
/// # Errors
/// Returns [`Error::MissingRequiredInput`] for the first declared name the
/// context does not bind
pub fn bind_inputs<S: AsRef<str>>(
    inputs: &[S],
    context: &SharedContext,
) -> Result<Map<String, Value>> {
    let mut bound = Map::new();
    for name in inputs {
        let name = name.as_ref();
        let value = context
            .get(name)
            .ok_or_else(|| Error::MissingRequiredInput {
                input: name.to_owned(),
            })?;
        bound.insert(name.to_owned(), value.clone());
    }
    Ok(bound)
}

/// Fold a function's return value into the context
pub fn fold(context: &mut SharedContext, function: &str, returned: ToolReturn) {
    match returned {
        ToolReturn::Nothing => {
            tracing::debug!(function, "tool returned nothing; context unchanged");
        }
        ToolReturn::Mapping(entries) => {
            tracing::debug!(function, keys = entries.len(), "merging mapping result");
            context.merge(entries);
        }
        ToolReturn::Scalar(value) => {
            let key = result_key(function);
            tracing::debug!(function, key = key.as_str(), "storing scalar result");
            context.insert(key, value);
        }
    }
}

/// Map a worker-side error back onto the convention's error when it reports a
/// missing input, so both dispatch paths fail identically.
pub fn remote_error(name: String, message: String) -> Error {
    if name == MISSING_INPUT_ERROR {
        Error::MissingRequiredInput { input: message }
    } else {
        Error::RemoteExecution { name, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context_of(value: Value) -> SharedContext {
        match value {
            Value::Object(map) => SharedContext::from(map),
            other => panic!("expected object fixture, got {other}"),
        }
    }

    #[test]
    fn test_bind_inputs_reads_declared_names_only() {
        let context = context_of(json!({"a": 5, "b": 3, "c": "unused"}));
        let bound = bind_inputs(&["a", "b"], &context).unwrap();
        assert_eq!(Value::Object(bound), json!({"a": 5, "b": 3}));
    }

    #[test]
    fn test_bind_inputs_missing_name() {
        let context = context_of(json!({"a": 5}));
        let error = bind_inputs(&["a", "b"], &context).unwrap_err();
        assert!(matches!(error, Error::MissingRequiredInput { ref input } if input == "b"));
    }

    #[test]
    fn test_null_is_a_bound_value() {
        let context = context_of(json!({"a": null}));
        let bound = bind_inputs(&["a"], &context).unwrap();
        assert_eq!(bound.get("a"), Some(&Value::Null));
    }

    #[test]
    fn test_fold_scalar_uses_result_key() {
        let mut context = context_of(json!({"a": 5, "b": 3}));
        fold(&mut context, "add_numbers", ToolReturn::from(json!(8)));
        assert_eq!(context.get("add_numbers_result"), Some(&json!(8)));
        assert_eq!(context.len(), 3);
    }

    #[test]
    fn test_fold_mapping_merges() {
        let mut context = context_of(json!({"result": 1}));
        fold(
            &mut context,
            "format_result",
            ToolReturn::from(json!({"result": 2, "formatted": "two"})),
        );
        assert_eq!(context, context_of(json!({"result": 2, "formatted": "two"})));
    }

    #[test]
    fn test_fold_nothing_leaves_context() {
        let mut context = context_of(json!({"a": 1}));
        let before = context.clone();
        fold(&mut context, "noop", ToolReturn::from_value(None));
        fold(&mut context, "noop", ToolReturn::from(Value::Null));
        assert_eq!(context, before);
    }

    #[test]
    fn test_remote_missing_input_maps_back() {
        let error = remote_error(MISSING_INPUT_ERROR.to_owned(), "b".to_owned());
        assert!(matches!(error, Error::MissingRequiredInput { ref input } if input == "b"));

        let error = remote_error("TypeError".to_owned(), "boom".to_owned());
        assert!(matches!(error, Error::RemoteExecution { .. }));
    }
}
