//! Model identifier -> upstream deployment lookup.
//!
//! The table is built once at startup and shared read-only between requests.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::{DeploymentConfig, ProxyConfig};
use crate::error::{ProxyError, Result};

#[derive(Debug, Clone)]
pub struct DeploymentResolver {
    deployments: Arc<HashMap<String, DeploymentConfig>>,
    default_model: String,
}

impl DeploymentResolver {
    pub fn new(
        deployments: HashMap<String, DeploymentConfig>,
        default_model: impl Into<String>,
    ) -> Self {
        Self {
            deployments: Arc::new(deployments),
            default_model: default_model.into(),
        }
    }

    pub fn from_config(config: &ProxyConfig) -> Self {
        Self::new(config.resolve_deployments(), config.default_model.clone())
    }

    /// Normalize a requested model identifier: trimmed, with empty falling
    /// back to the default model.
    pub fn model_id<'a>(&'a self, requested: &'a str) -> &'a str {
        let model = requested.trim();
        if model.is_empty() {
            &self.default_model
        } else {
            model
        }
    }

    /// Exact-match lookup. No fallback to the default deployment on a miss.
    pub fn resolve(&self, model: &str) -> Result<&DeploymentConfig> {
        self.deployments
            .get(model)
            .ok_or_else(|| ProxyError::DeploymentNotFound {
                model: model.to_string(),
            })
    }

    pub fn models(&self) -> Vec<&str> {
        let mut models: Vec<&str> = self.deployments.keys().map(String::as_str).collect();
        models.sort_unstable();
        models
    }
}
