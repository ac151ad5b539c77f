use crate::error::{ProxyError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub const APP_NAME: &str = "gemini-openai-proxy";
pub const GEMINI_API_KEY_ENV: &str = "GEMINI_API_KEY";
pub const UPSTREAM_PROXY_ENV: &str = "UPSTREAM_PROXY_URL";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    /// Model used when a request names none.
    #[serde(default = "default_model")]
    pub default_model: String,
    #[serde(default)]
    pub deployments: HashMap<String, DeploymentConfig>,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DeploymentConfig {
    /// Upstream model name; empty means "same as the deployment key".
    #[serde(default)]
    pub model_name: String,
    #[serde(default = "default_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_api_version")]
    pub api_version: String,
    /// Empty means the caller's bearer token is forwarded instead.
    #[serde(default)]
    pub api_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proxy_url: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Honour `HTTP_PROXY`/`HTTPS_PROXY` when no `proxy_url` is set.
    #[serde(default = "default_true")]
    pub system_proxy: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionConfig {
    #[serde(default = "default_object")]
    pub object: String,
    #[serde(default = "default_id_prefix")]
    pub id_prefix: String,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            proxy_url: None,
            timeout_secs: default_timeout_secs(),
            system_proxy: true,
        }
    }
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            object: default_object(),
            id_prefix: default_id_prefix(),
        }
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            default_model: default_model(),
            deployments: HashMap::new(),
            transport: TransportConfig::default(),
            completion: CompletionConfig::default(),
        }
    }
}

fn default_port() -> u16 {
    8080
}

fn default_model() -> String {
    "gemini-pro".to_string()
}

fn default_endpoint() -> String {
    "https://generativelanguage.googleapis.com".to_string()
}

fn default_api_version() -> String {
    "v1beta".to_string()
}

fn default_timeout_secs() -> u64 {
    300
}

fn default_true() -> bool {
    true
}

fn default_object() -> String {
    "chat.completion".to_string()
}

fn default_id_prefix() -> String {
    "chatcmpl-".to_string()
}

impl DeploymentConfig {
    pub fn new(model_name: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            model_name: model_name.into(),
            endpoint: default_endpoint(),
            api_version: default_api_version(),
            api_key: api_key.into(),
            api_key_env: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl ProxyConfig {
    /// Load config from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ProxyError::config(format!("Failed to read config file {}: {}", path.display(), e))
        })?;
        let config: Self = toml::from_str(&content)?;
        Ok(config)
    }

    /// Search standard locations for a config file.
    /// Priority: CLI arg > CWD > XDG config > home dir > built-in defaults
    pub fn find_and_load(explicit_path: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit_path {
            return Self::load(path);
        }

        for candidate in config_search_paths() {
            if candidate.exists() {
                tracing::info!(path = %candidate.display(), "Loading config");
                return Self::load(&candidate);
            }
        }

        tracing::info!("No config file found, using defaults");
        Ok(Self::default())
    }

    /// Produce the final model -> deployment table.
    ///
    /// Empty `model_name`s take the map key, empty `api_key`s are filled from
    /// `api_key_env`. Without any configured deployment a single entry for
    /// `default_model` is synthesized from `GEMINI_API_KEY`.
    pub fn resolve_deployments(&self) -> HashMap<String, DeploymentConfig> {
        let mut table = self.deployments.clone();

        if table.is_empty() {
            let mut deployment = DeploymentConfig::new(self.default_model.clone(), "");
            deployment.api_key_env = Some(GEMINI_API_KEY_ENV.to_string());
            table.insert(self.default_model.clone(), deployment);
        }

        for (model, deployment) in &mut table {
            if deployment.model_name.is_empty() {
                deployment.model_name.clone_from(model);
            }
            if deployment.api_key.is_empty() {
                if let Some(ref env) = deployment.api_key_env {
                    deployment.api_key = std::env::var(env).unwrap_or_default();
                }
            }
        }

        table
    }
}

impl TransportConfig {
    /// Forward proxy to dial through: config first, then `UPSTREAM_PROXY_URL`.
    pub fn effective_proxy_url(&self) -> Option<String> {
        self.proxy_url_or(|| std::env::var(UPSTREAM_PROXY_ENV).ok())
    }

    fn proxy_url_or(&self, fallback: impl FnOnce() -> Option<String>) -> Option<String> {
        self.proxy_url
            .clone()
            .or_else(fallback)
            .filter(|url| !url.trim().is_empty())
    }
}

pub fn config_search_paths() -> Vec<PathBuf> {
    let mut paths = vec![PathBuf::from(format!("{APP_NAME}.toml"))];

    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        paths.push(PathBuf::from(xdg).join(APP_NAME).join("config.toml"));
    }

    if let Some(home) = home_dir() {
        paths.push(home.join(".config").join(APP_NAME).join("config.toml"));
        paths.push(home.join(format!(".{APP_NAME}.toml")));
    }

    paths
}

fn home_dir() -> Option<PathBuf> {
    std::env::var("HOME").ok().map(PathBuf::from)
}
