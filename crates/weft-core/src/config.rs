//! Configuration loading and defaults.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::WeftError;

/// Top-level Weft configuration, loaded from a JSON file.
///
/// Everything is optional; accessor methods supply the defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub models: Option<ModelsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub budgets: Option<BudgetsConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub search: Option<SearchConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub sandbox: Option<SandboxConfig>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Model driving the orchestrator loop.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orchestrator: Option<String>,

    /// Model driving the delegate inner loops.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delegate: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

/// Hard caps on reasoning iterations for each bounded loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BudgetsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub orchestrator_steps: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_steps: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub artifact_steps: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_steps: Option<u32>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub num_results: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SandboxConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub runtime: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl Config {
    /// Load a config file, or default everything when the path is absent.
    pub fn load(path: Option<&Path>) -> crate::error::Result<Self> {
        match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    WeftError::Config(format!("cannot read {}: {e}", path.display()))
                })?;
                serde_json::from_str(&raw)
                    .map_err(|e| WeftError::Config(format!("invalid config: {e}")))
            }
            None => Ok(Self::default()),
        }
    }

    pub fn orchestrator_model(&self) -> String {
        self.models
            .as_ref()
            .and_then(|m| m.orchestrator.clone())
            .unwrap_or_else(|| "gpt-4.1".into())
    }

    pub fn delegate_model(&self) -> String {
        self.models
            .as_ref()
            .and_then(|m| m.delegate.clone())
            .unwrap_or_else(|| "gpt-4.1-nano".into())
    }

    pub fn max_tokens(&self) -> u32 {
        self.models
            .as_ref()
            .and_then(|m| m.max_tokens)
            .unwrap_or(4096)
    }

    pub fn temperature(&self) -> Option<f64> {
        self.models.as_ref().and_then(|m| m.temperature)
    }

    pub fn resolve_model_api_key(&self) -> Option<String> {
        let models = self.models.as_ref()?;
        resolve_secret_field(&models.api_key, &models.api_key_env)
            .or_else(|| std::env::var("OPENAI_API_KEY").ok())
    }

    pub fn orchestrator_steps(&self) -> u32 {
        self.budgets
            .as_ref()
            .and_then(|b| b.orchestrator_steps)
            .unwrap_or(10)
    }

    pub fn search_steps(&self) -> u32 {
        self.budgets
            .as_ref()
            .and_then(|b| b.search_steps)
            .unwrap_or(5)
    }

    pub fn artifact_steps(&self) -> u32 {
        self.budgets
            .as_ref()
            .and_then(|b| b.artifact_steps)
            .unwrap_or(3)
    }

    pub fn analysis_steps(&self) -> u32 {
        self.budgets
            .as_ref()
            .and_then(|b| b.analysis_steps)
            .unwrap_or(5)
    }

    pub fn search_num_results(&self) -> usize {
        self.search
            .as_ref()
            .and_then(|s| s.num_results)
            .unwrap_or(5)
    }

    pub fn resolve_search_api_key(&self) -> Option<String> {
        let search = self.search.as_ref()?;
        resolve_secret_field(&search.api_key, &search.api_key_env)
            .or_else(|| std::env::var("EXA_API_KEY").ok())
    }

    pub fn sandbox_runtime(&self) -> String {
        self.sandbox
            .as_ref()
            .and_then(|s| s.runtime.clone())
            .unwrap_or_else(|| "python3.13".into())
    }

    pub fn sandbox_timeout(&self) -> Duration {
        Duration::from_secs(
            self.sandbox
                .as_ref()
                .and_then(|s| s.timeout_secs)
                .unwrap_or(60),
        )
    }
}

/// Resolve a secret: inline value wins, then the named environment variable.
fn resolve_secret_field(value: &Option<String>, env_name: &Option<String>) -> Option<String> {
    if let Some(v) = value {
        if !v.is_empty() {
            return Some(v.clone());
        }
    }
    env_name
        .as_ref()
        .and_then(|name| std::env::var(name).ok())
        .filter(|v| !v.is_empty())
}
