//! Concrete `ToolRegistryPort` implementation.

use cortex_core::error::ToolPortError;
use cortex_core::ports::{ToolDefinition, ToolExecutor, ToolRegistryPort};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Registry of tools available to a task, shared via `&self` so the
/// coordinator can hand out one `Arc<Registry>` across concurrent task
/// executions. Registration itself is rare (typically happens once at
/// startup) so an `RwLock<HashMap<..>>` is the simple, correct choice —
/// the same tradeoff `neuron-tool::ToolRegistry` makes, just behind
/// interior mutability instead of `&mut self`.
pub struct Registry {
    tools: RwLock<HashMap<String, Arc<dyn ToolExecutor>>>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: RwLock::new(HashMap::new()),
        }
    }

    /// Build a registry pre-populated with the given tools.
    pub fn from_tools(tools: impl IntoIterator<Item = Arc<dyn ToolExecutor>>) -> Self {
        let registry = Self::new();
        for tool in tools {
            registry.register(tool);
        }
        registry
    }

    /// Look up and execute a tool by name in one call, mapping an
    /// absent tool to `ToolPortError::NotFound`.
    pub async fn execute(
        &self,
        call: &cortex_core::tool_call::ToolCall,
    ) -> Result<cortex_core::tool_call::ToolResult, ToolPortError> {
        let tool = self
            .get(&call.name)
            .ok_or_else(|| ToolPortError::NotFound(call.name.clone()))?;
        tool.execute(call).await
    }

    /// Build a filtered view containing every tool except `name`.
    /// Used to remove the subagent-spawning tool before preset
    /// filtering when the call originates inside a subagent context
    /// (`spec.md` §4.4's invariant).
    pub fn without(&self, name: &str) -> Registry {
        let filtered: Vec<Arc<dyn ToolExecutor>> = self
            .tools
            .read()
            .unwrap()
            .iter()
            .filter(|(n, _)| n.as_str() != name)
            .map(|(_, t)| Arc::clone(t))
            .collect();
        Registry::from_tools(filtered)
    }

    /// Build a filtered view retaining only the named tools, in no
    /// particular order. Used by the Preset Resolver.
    pub fn retaining(&self, names: &[String]) -> Registry {
        let filtered: Vec<Arc<dyn ToolExecutor>> = names
            .iter()
            .filter_map(|n| self.get(n))
            .collect();
        Registry::from_tools(filtered)
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl ToolRegistryPort for Registry {
    fn register(&self, executor: Arc<dyn ToolExecutor>) {
        let name = executor.definition().name.clone();
        self.tools.write().unwrap().insert(name, executor);
    }

    fn get(&self, name: &str) -> Option<Arc<dyn ToolExecutor>> {
        self.tools.read().unwrap().get(name).cloned()
    }

    fn list(&self) -> Vec<ToolDefinition> {
        self.tools
            .read()
            .unwrap()
            .values()
            .map(|t| t.definition())
            .collect()
    }

    fn unregister(&self, name: &str) {
        self.tools.write().unwrap().remove(name);
    }

    fn len(&self) -> usize {
        self.tools.read().unwrap().len()
    }
}
