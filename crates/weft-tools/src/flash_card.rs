//! Flash-card capability for the artifact delegate.

use async_trait::async_trait;
use serde_json::json;

use weft_core::types::FlashCardSet;

use crate::Capability;

pub struct FlashCardCapability;

#[async_trait]
impl Capability for FlashCardCapability {
    fn name(&self) -> &str {
        "flash-card"
    }

    fn description(&self) -> &str {
        "Use the flash-card tool when creating flash cards"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {
                "title": {
                    "type": "string",
                    "description": "The title of the flash cards"
                },
                "cards": {
                    "type": "array",
                    "description": "The cards of the flash card",
                    "items": {
                        "type": "object",
                        "properties": {
                            "question": { "type": "string" },
                            "answer": { "type": "string" }
                        },
                        "required": ["question", "answer"]
                    }
                }
            },
            "required": ["title", "cards"]
        })
    }

    async fn execute(
        &self,
        _call_id: &str,
        input: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        let set: FlashCardSet = serde_json::from_value(input)?;
        Ok(serde_json::to_value(set.cards)?)
    }
}
