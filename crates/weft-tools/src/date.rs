//! Current-date capability for the search delegate.

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use crate::Capability;

pub struct DateCapability;

/// "August 7, 2026" — the long en-US date format the prompts reference.
pub fn today_long_format() -> String {
    Utc::now().format("%B %-d, %Y").to_string()
}

#[async_trait]
impl Capability for DateCapability {
    fn name(&self) -> &str {
        "date"
    }

    fn description(&self) -> &str {
        "Get the current date"
    }

    fn parameters_schema(&self) -> serde_json::Value {
        json!({
            "type": "object",
            "properties": {}
        })
    }

    async fn execute(
        &self,
        _call_id: &str,
        _input: serde_json::Value,
    ) -> anyhow::Result<serde_json::Value> {
        Ok(json!(today_long_format()))
    }
}
