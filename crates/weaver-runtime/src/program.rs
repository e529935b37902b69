//! Builds the program a worker evaluates for one code-tool invocation.

use weaver_core::convention::MISSING_INPUT_ERROR;
use weaver_core::{CodeTool, Error, Result, SharedContext};

/// Synthesize a self-contained program that defines the tool, binds its
/// declared inputs from `context` and evaluates to the function's return value.
///
/// Everything is wrapped in a single function scope so repeated submissions on
/// a long-lived worker neither leak nor redeclare globals. The context travels
/// as a string handed to `JSON.parse`, so every key (`__proto__` included)
/// becomes an own property exactly as in the host map. A declared input
/// absent from the context throws an error named
/// [`MISSING_INPUT_ERROR`] whose message is the input name.
///
/// # Errors
/// Returns [`Error::InvalidTool`] if the function name is not an identifier,
/// or a serialization error if the context cannot be rendered
pub fn synthesize(tool: &CodeTool, context: &SharedContext) -> Result<String> {
    if !is_identifier(&tool.function) {
        return Err(Error::InvalidTool {
            name: tool.function.clone(),
            reason: "function name is not a valid identifier".to_owned(),
        });
    }

    let context_literal = serde_json::to_string(&context.to_json_literal()?)?;
    let inputs_literal = serde_json::to_string(&tool.inputs)?;
    let function = &tool.function;
    let source = &tool.source;

    Ok(format!(
        r"(() => {{
const __weaver_context__ = JSON.parse({context_literal});
{source}
;return (() => {{
    const __weaver_args__ = [];
    for (const __weaver_name__ of {inputs_literal}) {{
        if (!Object.prototype.hasOwnProperty.call(__weaver_context__, __weaver_name__)) {{
            const __weaver_missing__ = new Error(__weaver_name__);
            __weaver_missing__.name = {missing};
            throw __weaver_missing__;
        }}
        __weaver_args__.push(__weaver_context__[__weaver_name__]);
    }}
    return {function}(...__weaver_args__);
}})();
}})()",
        missing = serde_json::to_string(MISSING_INPUT_ERROR)?,
    ))
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|first| first.is_ascii_alphabetic() || first == '_' || first == '$')
        && chars.all(|ch| ch.is_ascii_alphanumeric() || ch == '_' || ch == '$')
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn add_tool() -> CodeTool {
        CodeTool {
            source: "function add(a, b) { return a + b; }".to_owned(),
            function: "add".to_owned(),
            inputs: vec!["a".to_owned(), "b".to_owned()],
        }
    }

    #[test]
    fn test_program_embeds_context_and_call() {
        let mut context = SharedContext::new();
        context.insert("a", json!(5));
        context.insert("b", json!(3));

        let program = synthesize(&add_tool(), &context).unwrap();
        assert!(program.contains(r#"const __weaver_context__ = JSON.parse("{\"a\":5,\"b\":3}");"#));
        assert!(program.contains(r#"of ["a","b"]"#));
        assert!(program.contains("return add(...__weaver_args__);"));
        assert!(program.contains(r#"__weaver_missing__.name = "MissingRequiredInput";"#));
    }

    #[test]
    fn test_rejects_non_identifier_function() {
        let mut tool = add_tool();
        tool.function = "add); evil(".to_owned();
        let error = synthesize(&tool, &SharedContext::new()).unwrap_err();
        assert!(matches!(error, Error::InvalidTool { .. }));
    }

    #[test]
    fn test_identifier_rules() {
        assert!(is_identifier("_private$1"));
        assert!(!is_identifier("1abc"));
        assert!(!is_identifier(""));
    }
}
