//! Resolution of import references to in-process functions.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use weaver_core::{Result, ToolReturn};

/// A function callable in-process by an import tool.
#[async_trait]
pub trait ToolFunction: Send + Sync {
    /// Function name; scalar returns are stored under `<name>_result`
    fn name(&self) -> &str;

    /// Declared input names, bound from the shared context in this order
    fn inputs(&self) -> &[String];

    /// Invoke the function with its bound inputs.
    ///
    /// # Errors
    ///
    /// Returns whatever error the function raises.
    async fn call(&self, inputs: Map<String, Value>) -> Result<ToolReturn>;
}

/// Maps `(module, symbol)` import references to functions.
pub trait SymbolResolver: Send + Sync {
    /// Resolve a reference; `None` if nothing is registered under it
    fn resolve(&self, module: &str, symbol: &str) -> Option<Arc<dyn ToolFunction>>;
}

/// Adapts a plain closure into a [`ToolFunction`].
pub struct FnTool<F> {
    name: String,
    inputs: Vec<String>,
    func: F,
}

impl<F> FnTool<F>
where
    F: Fn(&Map<String, Value>) -> Result<ToolReturn> + Send + Sync,
{
    /// Wrap `func` under `name`, declaring `inputs`
    pub fn new<N, I, S>(name: N, inputs: I, func: F) -> Self
    where
        N: Into<String>,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            inputs: inputs.into_iter().map(Into::into).collect(),
            func,
        }
    }
}

#[async_trait]
impl<F> ToolFunction for FnTool<F>
where
    F: Fn(&Map<String, Value>) -> Result<ToolReturn> + Send + Sync,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn inputs(&self) -> &[String] {
        &self.inputs
    }

    async fn call(&self, inputs: Map<String, Value>) -> Result<ToolReturn> {
        (self.func)(&inputs)
    }
}

/// Static module → symbol → function table.
#[derive(Default, Clone)]
pub struct SymbolTable {
    modules: HashMap<String, HashMap<String, Arc<dyn ToolFunction>>>,
}

impl SymbolTable {
    /// Create an empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `function` under `module`, keyed by its own name
    #[must_use]
    pub fn with_function(mut self, module: &str, function: impl ToolFunction + 'static) -> Self {
        self.register(module, Arc::new(function));
        self
    }

    /// Register an already shared function under `module`
    pub fn register(&mut self, module: &str, function: Arc<dyn ToolFunction>) {
        self.modules
            .entry(module.to_owned())
            .or_default()
            .insert(function.name().to_owned(), function);
    }

    /// Number of registered functions across all modules
    pub fn len(&self) -> usize {
        self.modules.values().map(HashMap::len).sum()
    }

    /// Whether nothing is registered
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl SymbolResolver for SymbolTable {
    fn resolve(&self, module: &str, symbol: &str) -> Option<Arc<dyn ToolFunction>> {
        self.modules.get(module)?.get(symbol).map(Arc::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio_test::block_on;

    fn double() -> FnTool<impl Fn(&Map<String, Value>) -> Result<ToolReturn> + Send + Sync> {
        FnTool::new("double", ["value"], |inputs: &Map<String, Value>| {
            let value = inputs.get("value").and_then(Value::as_i64).unwrap_or_default();
            Ok(ToolReturn::from(json!(value * 2)))
        })
    }

    #[test]
    fn test_resolve_registered_symbol() {
        let table = SymbolTable::new().with_function("math", double());
        assert_eq!(table.len(), 1);

        let function = table.resolve("math", "double").unwrap();
        assert_eq!(function.inputs(), ["value".to_owned()]);

        let mut inputs = Map::new();
        inputs.insert("value".to_owned(), json!(21));
        let returned = block_on(function.call(inputs)).unwrap();
        assert_eq!(returned, ToolReturn::Scalar(json!(42)));
    }

    #[test]
    fn test_unknown_module_or_symbol() {
        let table = SymbolTable::new().with_function("math", double());
        assert!(table.resolve("math", "triple").is_none());
        assert!(table.resolve("strings", "double").is_none());
    }
}
