//! Settling promises returned by submitted code.

use boa_engine::property::Attribute;
use boa_engine::{Context, JsError, JsNativeError, JsValue, Source, js_string};

/// If `result` is a Promise, drive the job queue and return its settled value.
///
/// A rejected promise is surfaced as the rejection value; a promise still
/// pending after the job queue drains is an error.
///
/// # Errors
/// Returns the rejection reason, or an error if the promise never settles
pub fn settle_promise(result: JsValue, context: &mut Context) -> Result<JsValue, JsError> {
    let Some(obj) = result.as_object() else {
        return Ok(result);
    };

    let is_promise = obj
        .get(js_string!("constructor"), context)
        .ok()
        .and_then(|constructor| constructor.as_object())
        .and_then(|constructor_obj| constructor_obj.get(js_string!("name"), context).ok())
        .and_then(|name| {
            name.as_string()
                .map(|js_str| js_str.to_std_string_escaped())
        })
        .is_some_and(|name| name == "Promise");

    if !is_promise {
        return Ok(result);
    }

    tracing::debug!("Submission returned a Promise, settling it");

    context.register_global_property(
        js_string!("__weaver_promise__"),
        result,
        Attribute::all(),
    )?;

    // `var` so repeated submissions on the same worker can redeclare
    let setup_handler = r"
        var __weaver_settled__ = false;
        var __weaver_value__;
        var __weaver_error__;
        var __weaver_rejected__ = false;
        __weaver_promise__.then(
            value => { __weaver_settled__ = true; __weaver_value__ = value; },
            error => { __weaver_settled__ = true; __weaver_rejected__ = true; __weaver_error__ = error; }
        );
    ";
    context.eval(Source::from_bytes(setup_handler))?;
    drop(context.run_jobs());

    let settled = context.eval(Source::from_bytes("__weaver_settled__"))?;
    if !settled.to_boolean() {
        return Err(JsNativeError::error()
            .with_message("Promise did not settle")
            .into());
    }

    let rejected = context.eval(Source::from_bytes("__weaver_rejected__"))?;
    if rejected.to_boolean() {
        let reason = context.eval(Source::from_bytes("__weaver_error__"))?;
        return Err(JsError::from_opaque(reason));
    }

    context.eval(Source::from_bytes("__weaver_value__"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settle(code: &str) -> Result<JsValue, JsError> {
        let mut context = Context::default();
        let value = context.eval(Source::from_bytes(code))?;
        drop(context.run_jobs());
        settle_promise(value, &mut context)
    }

    #[test]
    fn test_plain_values_pass_through() {
        let value = settle("40 + 2").unwrap();
        assert_eq!(value.as_number(), Some(42.0));
    }

    #[test]
    fn test_resolved_promise() {
        let value = settle("(async () => 7)()").unwrap();
        assert_eq!(value.as_number(), Some(7.0));
    }

    #[test]
    fn test_rejected_promise() {
        let error = settle("(async () => { throw new TypeError('bad'); })()").unwrap_err();
        let mut context = Context::default();
        let opaque = error.to_opaque(&mut context);
        assert!(opaque.is_object());
    }
}
