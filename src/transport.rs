//! Outbound HTTP client construction.
//!
//! Without a configured forward proxy the client keeps reqwest's platform
//! defaults (which already honour `HTTP_PROXY`/`HTTPS_PROXY`) unless
//! `system_proxy` is switched off.

use std::time::Duration;

use reqwest::Proxy;

use crate::config::TransportConfig;
use crate::error::{ProxyError, Result};

pub fn build_client(config: &TransportConfig) -> Result<reqwest::Client> {
    client_with_proxy(config, config.effective_proxy_url())
}

fn client_with_proxy(
    config: &TransportConfig,
    proxy_url: Option<String>,
) -> Result<reqwest::Client> {
    let mut builder =
        reqwest::Client::builder().timeout(Duration::from_secs(config.timeout_secs));

    if let Some(proxy_url) = proxy_url {
        let proxy = Proxy::all(&proxy_url).map_err(|e| {
            ProxyError::config(format!("Invalid upstream proxy url {proxy_url}: {e}"))
        })?;
        tracing::info!(proxy = %proxy_url, "Routing upstream traffic through forward proxy");
        builder = builder.proxy(proxy);
    } else if !config.system_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|e| ProxyError::config(format!("Failed to build HTTP client: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_transport() {
        assert!(client_with_proxy(&TransportConfig::default(), None).is_ok());
    }

    #[test]
    fn test_direct_transport() {
        let config = TransportConfig {
            system_proxy: false,
            ..TransportConfig::default()
        };
        assert!(client_with_proxy(&config, config.proxy_url.clone()).is_ok());
    }

    #[test]
    fn test_forward_proxy() {
        let config = TransportConfig {
            proxy_url: Some("http://127.0.0.1:3128".to_string()),
            timeout_secs: 5,
            system_proxy: true,
        };
        assert!(client_with_proxy(&config, config.proxy_url.clone()).is_ok());
    }

    #[test]
    fn test_invalid_proxy_url() {
        let config = TransportConfig {
            proxy_url: Some("http://[::1".to_string()),
            timeout_secs: 5,
            system_proxy: true,
        };
        assert!(matches!(
            client_with_proxy(&config, config.proxy_url.clone()),
            Err(ProxyError::Config { .. })
        ));
    }
}
