//! The interception pipeline.
//!
//! One request runs `before_send` -> `dispatch` -> `after_receive`. The first
//! stage swaps the caller's `OpenAI` request for a Gemini one; the last swaps
//! Gemini's answer for an `OpenAI` completion. A failure anywhere ends the
//! request. The raw upstream body is never handed back.

use std::sync::Arc;

use axum::http::header::{AUTHORIZATION, CONTENT_LENGTH, CONTENT_TYPE};
use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use reqwest::Url;
use uuid::Uuid;

use crate::config::{CompletionConfig, DeploymentConfig};
use crate::converter::{GenerateContentConverter, RequestConverter};
use crate::deployment::DeploymentResolver;
use crate::error::{ProxyError, Result};
use crate::logging::{mask_credentials, LogEntry, LogLevel, SharedLogger};
use crate::translate::gemini_types::{GenerateContentResponse, GeminiErrorResponse};
use crate::translate::openai_types::ChatCompletionRequest;
use crate::translate::request::openai_to_gemini;
use crate::translate::response::{gemini_to_openai, CompletionContext};

/// Set on every outbound request so tunnelling services (ngrok and the like)
/// skip their browser interstitial.
pub const SKIP_BROWSER_WARNING_HEADER: &str = "ngrok-skip-browser-warning";
const SKIP_BROWSER_WARNING_VALUE: &str = "true";

/// The caller's request as received.
#[derive(Debug, Clone)]
pub struct InboundRequest {
    pub uri: String,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// The fully rewritten request handed to the transport.
#[derive(Debug, Clone)]
pub struct OutboundRequest {
    /// Resolved model identifier the caller asked for.
    pub model: String,
    pub url: Url,
    pub headers: HeaderMap,
    pub body: Bytes,
}

/// The rewritten response handed back to the caller.
#[derive(Debug, Clone)]
pub struct TranscodedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl IntoResponse for TranscodedResponse {
    fn into_response(self) -> Response {
        (self.status, self.headers, self.body).into_response()
    }
}

#[derive(Clone)]
pub struct Pipeline {
    resolver: DeploymentResolver,
    converter: Arc<dyn RequestConverter>,
    client: reqwest::Client,
    completion: CompletionConfig,
    logger: SharedLogger,
}

impl Pipeline {
    pub fn new(
        resolver: DeploymentResolver,
        client: reqwest::Client,
        completion: CompletionConfig,
        logger: SharedLogger,
    ) -> Self {
        Self {
            resolver,
            converter: Arc::new(GenerateContentConverter),
            client,
            completion,
            logger,
        }
    }

    #[must_use]
    pub fn with_converter(mut self, converter: Arc<dyn RequestConverter>) -> Self {
        self.converter = converter;
        self
    }

    pub fn resolver(&self) -> &DeploymentResolver {
        &self.resolver
    }

    /// Run the whole cycle for one caller request.
    pub async fn handle(&self, inbound: &InboundRequest) -> Result<TranscodedResponse> {
        let outbound = self.before_send(inbound)?;
        let ctx = self.completion_context(&outbound.model);
        let response = self.dispatch(outbound).await?;
        self.after_receive(response, &ctx).await
    }

    /// Rewrite the caller's request into the upstream request. Nothing of the
    /// inbound target or body survives except in the log line.
    pub fn before_send(&self, inbound: &InboundRequest) -> Result<OutboundRequest> {
        if inbound.body.is_empty() {
            return Err(ProxyError::EmptyBody);
        }

        let chat: ChatCompletionRequest =
            serde_json::from_slice(&inbound.body).map_err(ProxyError::PayloadParse)?;

        let model = self.resolver.model_id(&chat.model).to_string();
        let payload = openai_to_gemini(&chat);
        let deployment = self.resolver.resolve(&model)?;
        let credential = resolve_credential(deployment, &inbound.headers)?;

        let body = serde_json::to_vec(&payload).map_err(ProxyError::OutboundSerialize)?;
        let url = self.converter.convert(deployment, &credential)?;
        let headers = outbound_headers(&credential)?;

        let masked = mask_credentials(url.as_str());
        tracing::info!(model = %model, from = %inbound.uri, to = %masked, "proxying request");
        self.logger.log(
            LogEntry::new(
                LogLevel::Info,
                "proxy",
                format!("proxying request [{}] {} -> {}", model, inbound.uri, masked),
            )
            .with_model(&model)
            .with_context(serde_json::json!({
                "messages": chat.messages.len(),
                "upstream_model": deployment.model_name,
            })),
        );

        Ok(OutboundRequest {
            model,
            url,
            headers,
            body: Bytes::from(body),
        })
    }

    /// Transport stage. Success or failure is whatever the client reports.
    pub async fn dispatch(&self, outbound: OutboundRequest) -> Result<reqwest::Response> {
        self.client
            .post(outbound.url)
            .headers(outbound.headers)
            .body(outbound.body)
            .send()
            .await
            .map_err(ProxyError::Transport)
    }

    /// Rewrite the upstream response into the caller's response.
    pub async fn after_receive(
        &self,
        response: reqwest::Response,
        ctx: &CompletionContext,
    ) -> Result<TranscodedResponse> {
        let status = response.status();
        let body = response.bytes().await.map_err(ProxyError::ResponseRead)?;

        tracing::debug!(status = status.as_u16(), body_len = body.len(), "upstream response");

        if !status.is_success() {
            let err = upstream_error(status, &body);
            self.logger.warn("proxy", err.to_string());
            return Err(err);
        }

        let body = transform_response_body(&body, ctx)?;

        // Upstream headers describe Gemini's body, not this one.
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(CONTENT_LENGTH, HeaderValue::from(body.len()));

        Ok(TranscodedResponse {
            status,
            headers,
            body,
        })
    }

    pub fn completion_context(&self, model: &str) -> CompletionContext {
        CompletionContext {
            id: format!("{}{}", self.completion.id_prefix, Uuid::new_v4().simple()),
            model: model.to_string(),
            object: self.completion.object.clone(),
        }
    }
}

/// A non-empty deployment key wins; otherwise the caller's bearer token is
/// forwarded with its `Bearer ` prefix removed.
pub fn resolve_credential(deployment: &DeploymentConfig, headers: &HeaderMap) -> Result<String> {
    if !deployment.api_key.is_empty() {
        return Ok(deployment.api_key.clone());
    }

    let raw = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    let token = raw.strip_prefix("Bearer ").unwrap_or(raw);

    if token.is_empty() {
        Err(ProxyError::MissingCredential)
    } else {
        Ok(token.to_string())
    }
}

/// Parse, translate and re-serialize a Gemini response body.
pub fn transform_response_body(body: &[u8], ctx: &CompletionContext) -> Result<Bytes> {
    let gemini: GenerateContentResponse =
        serde_json::from_slice(body).map_err(ProxyError::ResponseParse)?;
    let completion = gemini_to_openai(&gemini, ctx)?;
    let json = serde_json::to_vec(&completion).map_err(ProxyError::ResponseSerialize)?;
    Ok(Bytes::from(json))
}

fn outbound_headers(credential: &str) -> Result<HeaderMap> {
    let mut headers = HeaderMap::new();
    let auth = HeaderValue::from_str(credential)
        .map_err(|_| ProxyError::convert("credential is not a valid header value"))?;
    headers.insert(AUTHORIZATION, auth);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(
        HeaderName::from_static(SKIP_BROWSER_WARNING_HEADER),
        HeaderValue::from_static(SKIP_BROWSER_WARNING_VALUE),
    );
    Ok(headers)
}

fn upstream_error(status: StatusCode, body: &[u8]) -> ProxyError {
    let message = serde_json::from_slice::<GeminiErrorResponse>(body)
        .map(|e| e.error.message)
        .unwrap_or_else(|_| format!("{} bytes of unparseable error body", body.len()));

    ProxyError::Upstream {
        status: status.as_u16(),
        message: mask_credentials(&message),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn pipeline(deployments: Vec<(&str, DeploymentConfig)>) -> Pipeline {
        let table: HashMap<String, DeploymentConfig> = deployments
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect();
        Pipeline::new(
            DeploymentResolver::new(table, "gemini-pro"),
            reqwest::Client::new(),
            CompletionConfig::default(),
            SharedLogger::in_memory(),
        )
    }

    fn inbound(body: &str, auth: Option<&str>) -> InboundRequest {
        let mut headers = HeaderMap::new();
        if let Some(a) = auth {
            headers.insert(AUTHORIZATION, HeaderValue::from_str(a).unwrap());
        }
        InboundRequest {
            uri: "/v1/chat/completions".to_string(),
            headers,
            body: Bytes::from(body.to_string()),
        }
    }

    #[test]
    fn test_before_send_rewrites_request() {
        let p = pipeline(vec![("m1", DeploymentConfig::new("gemini-1.5-flash", "K"))]);
        let req = inbound(
            r#"{"model":"m1","messages":[{"role":"user","content":" hi "}],"temperature":0.5}"#,
            Some("Bearer caller-token"),
        );

        let out = p.before_send(&req).unwrap();

        assert_eq!(out.model, "m1");
        assert_eq!(out.headers[AUTHORIZATION], "K");
        assert_eq!(out.headers[SKIP_BROWSER_WARNING_HEADER], "true");
        assert_eq!(
            out.url.path(),
            "/v1beta/models/gemini-1.5-flash:generateContent"
        );

        let body: serde_json::Value = serde_json::from_slice(&out.body).unwrap();
        assert_eq!(
            body["contents"],
            serde_json::json!([{"role": "user", "parts": [{"text": "hi"}]}])
        );
        assert_eq!(body["generationConfig"]["temperature"], 0.5);
        assert_eq!(body["generationConfig"]["stopSequences"], serde_json::json!(["Title"]));
    }

    #[test]
    fn test_before_send_logs_masked_url_once() {
        let p = pipeline(vec![("m1", DeploymentConfig::new("gemini-pro", "SECRET"))]);
        p.before_send(&inbound(r#"{"model":"m1","messages":[]}"#, None))
            .unwrap();

        let entries = p.logger.recent(10);
        assert_eq!(entries.len(), 1);
        assert!(!entries[0].message.contains("SECRET"));
        assert!(entries[0].message.contains("key=******"));
    }

    #[test]
    fn test_before_send_accepts_null_fields() {
        let p = pipeline(vec![("gemini-pro", DeploymentConfig::new("gemini-pro", "K"))]);
        let req = inbound(
            r#"{"model":null,"max_tokens":-1,"messages":[{"role":"user","content":"hi"},{"role":"assistant","content":null}]}"#,
            None,
        );

        let out = p.before_send(&req).unwrap();

        assert_eq!(out.model, "gemini-pro");
        let body: serde_json::Value = serde_json::from_slice(&out.body).unwrap();
        assert_eq!(body["contents"].as_array().unwrap().len(), 2);
        assert_eq!(body["contents"][1]["role"], "model");
        assert_eq!(body["contents"][1]["parts"][0]["text"], "");
        assert_eq!(body["generationConfig"]["maxOutputTokens"], -1);
    }

    #[test]
    fn test_empty_body() {
        let p = pipeline(vec![]);
        assert!(matches!(
            p.before_send(&inbound("", None)),
            Err(ProxyError::EmptyBody)
        ));
    }

    #[test]
    fn test_malformed_body() {
        let p = pipeline(vec![("gemini-pro", DeploymentConfig::new("gemini-pro", "K"))]);
        assert!(matches!(
            p.before_send(&inbound("{not json", None)),
            Err(ProxyError::PayloadParse(_))
        ));
    }

    #[test]
    fn test_unknown_deployment() {
        let p = pipeline(vec![("gemini-pro", DeploymentConfig::new("gemini-pro", "K"))]);
        let err = p
            .before_send(&inbound(r#"{"model":"gpt-4","messages":[]}"#, None))
            .unwrap_err();
        assert!(matches!(err, ProxyError::DeploymentNotFound { model } if model == "gpt-4"));
    }

    #[test]
    fn test_empty_model_uses_default_deployment() {
        let p = pipeline(vec![("gemini-pro", DeploymentConfig::new("gemini-pro", "K"))]);
        let out = p
            .before_send(&inbound(r#"{"model":"  ","messages":[]}"#, None))
            .unwrap();
        assert_eq!(out.model, "gemini-pro");
    }

    #[test]
    fn test_credential_deployment_key_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer other"));
        let cred = resolve_credential(&DeploymentConfig::new("m", "K"), &headers).unwrap();
        assert_eq!(cred, "K");
    }

    #[test]
    fn test_credential_falls_back_to_bearer() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer caller"));
        let cred = resolve_credential(&DeploymentConfig::new("m", ""), &headers).unwrap();
        assert_eq!(cred, "caller");

        headers.insert(AUTHORIZATION, HeaderValue::from_static("raw-token"));
        let cred = resolve_credential(&DeploymentConfig::new("m", ""), &headers).unwrap();
        assert_eq!(cred, "raw-token");
    }

    #[test]
    fn test_credential_missing() {
        let deployment = DeploymentConfig::new("m", "");
        assert!(matches!(
            resolve_credential(&deployment, &HeaderMap::new()),
            Err(ProxyError::MissingCredential)
        ));

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Bearer "));
        assert!(matches!(
            resolve_credential(&deployment, &headers),
            Err(ProxyError::MissingCredential)
        ));
    }

    #[test]
    fn test_transform_response_body() {
        let p = pipeline(vec![]);
        let ctx = p.completion_context("m1");
        let body = transform_response_body(
            br#"{"candidates":[{"content":{"parts":[{"text":"Hello"}]},"finishReason":"STOP","index":0}]}"#,
            &ctx,
        )
        .unwrap();

        let json: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(json["model"], "m1");
        assert_eq!(json["object"], "chat.completion");
        assert!(json["id"].as_str().unwrap().starts_with("chatcmpl-"));
        assert_eq!(json["choices"][0]["finish_reason"], "stop");
        assert_eq!(json["choices"][0]["index"], 0);
        assert_eq!(
            json["choices"][0]["message"],
            serde_json::json!({"role": "assistant", "content": "Hello"})
        );
    }

    #[test]
    fn test_transform_rejects_malformed_response() {
        let ctx = pipeline(vec![]).completion_context("m1");
        assert!(matches!(
            transform_response_body(b"<html>", &ctx),
            Err(ProxyError::ResponseParse(_))
        ));
    }

    #[test]
    fn test_upstream_error_message() {
        let err = upstream_error(
            StatusCode::BAD_REQUEST,
            br#"{"error":{"code":400,"message":"API key not valid","status":"INVALID_ARGUMENT"}}"#,
        );
        assert!(matches!(err, ProxyError::Upstream { status: 400, ref message } if message == "API key not valid"));
    }
}
