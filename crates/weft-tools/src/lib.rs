//! Capabilities — the operations a bounded loop exposes to its LLM.
//!
//! Each loop is handed an explicit [`CapabilityTable`]; the step cap and the
//! capability set are configuration, not call-stack shape. Inputs are
//! validated by serde deserialization before any side effect runs.

use async_trait::async_trait;

use weft_providers::ToolDefinition;

pub mod date;
pub mod flash_card;
pub mod run_code;
pub mod search;

/// One named async operation callable from a bounded loop.
#[async_trait]
pub trait Capability: Send + Sync {
    /// Capability name as exposed to the LLM (e.g., "search", "run-code").
    fn name(&self) -> &str;

    /// Human-readable description for the LLM.
    fn description(&self) -> &str;

    /// JSON Schema describing the capability's input.
    fn parameters_schema(&self) -> serde_json::Value;

    /// Execute with a validated input. `call_id` is the tool-invocation
    /// identifier assigned by the model and doubles as the step id for any
    /// progress the caller reports.
    async fn execute(
        &self,
        call_id: &str,
        input: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value>;
}

/// The capability set injected into one bounded loop.
#[derive(Default)]
pub struct CapabilityTable {
    entries: Vec<Box<dyn Capability>>,
}

impl CapabilityTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, capability: Box<dyn Capability>) {
        self.entries.push(capability);
    }

    pub fn get(&self, name: &str) -> Option<&dyn Capability> {
        self.entries
            .iter()
            .find(|c| c.name() == name)
            .map(|c| c.as_ref())
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|c| c.name()).collect()
    }

    /// Tool definitions for the provider request.
    pub fn to_definitions(&self) -> Vec<ToolDefinition> {
        self.entries
            .iter()
            .map(|c| ToolDefinition {
                name: c.name().to_string(),
                description: c.description().to_string(),
                parameters_schema: c.parameters_schema(),
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Echo;

    #[async_trait]
    impl Capability for Echo {
        fn name(&self) -> &str {
            "echo"
        }

        fn description(&self) -> &str {
            "Echo the input back"
        }

        fn parameters_schema(&self) -> serde_json::Value {
            json!({"type": "object"})
        }

        async fn execute(
            &self,
            _call_id: &str,
            input: serde_json::Value,
        ) -> anyhow::Result<serde_json::Value> {
            Ok(input)
        }
    }

    #[tokio::test]
    async fn test_table_lookup_and_definitions() {
        let mut table = CapabilityTable::new();
        assert!(table.is_empty());
        table.register(Box::new(Echo));

        assert_eq!(table.names(), vec!["echo"]);
        assert!(table.get("missing").is_none());

        let defs = table.to_definitions();
        assert_eq!(defs.len(), 1);
        assert_eq!(defs[0].name, "echo");

        let out = table
            .get("echo")
            .unwrap()
            .execute("call_1", json!({"a": 1}))
            .await
            .unwrap();
        assert_eq!(out, json!({"a": 1}));
    }
}
