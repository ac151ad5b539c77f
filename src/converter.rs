//! Rewrites the outbound target for a resolved deployment.

use reqwest::Url;

use crate::config::DeploymentConfig;
use crate::error::{ProxyError, Result};

/// Produces the upstream URL a translated request is sent to.
pub trait RequestConverter: Send + Sync {
    fn convert(&self, deployment: &DeploymentConfig, credential: &str) -> Result<Url>;
}

/// Targets `{endpoint}/{api_version}/models/{model}:generateContent?key=...`.
#[derive(Debug, Clone, Copy, Default)]
pub struct GenerateContentConverter;

impl RequestConverter for GenerateContentConverter {
    fn convert(&self, deployment: &DeploymentConfig, credential: &str) -> Result<Url> {
        let raw = format!(
            "{}/{}/models/{}:generateContent",
            deployment.endpoint.trim_end_matches('/'),
            deployment.api_version.trim_matches('/'),
            deployment.model_name,
        );

        let mut url = Url::parse(&raw)
            .map_err(|e| ProxyError::convert(format!("invalid upstream url {raw}: {e}")))?;
        url.query_pairs_mut().append_pair("key", credential);

        Ok(url)
    }
}
