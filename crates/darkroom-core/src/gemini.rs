use http::header::{CONTENT_TYPE, RETRY_AFTER};
use http::{HeaderMap, HeaderValue, StatusCode};
use std::time::SystemTime;
use async_trait::async_trait;
use time::Duration;
use tracing::{info, warn};

use darkroom_pool::redact_secret;
use darkroom_protocol::error::ErrorEnvelope;
use darkroom_protocol::generate_content::{GenerateContentRequestBody, GenerateContentResponse, GenerationConfig};
use darkroom_protocol::list_models::{ListModelsQuery, ListModelsResponse};
use darkroom_protocol::types::{Content, ContentRole, Modality, Part};

use crate::adapter::{AttemptPayload, PayloadPart, RemoteAdapter};
use crate::outcome::{AttemptOutcome, ProbeOutcome};
use crate::request::ImageBlob;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash-image";

#[derive(Debug, thiserror::Error)]
pub enum AdapterError {
    #[error("failed to build http client: {0}")]
    Client(String),
}

/// Remote adapter for the Generative Language API (`generateContent`).
pub struct GeminiAdapter {
    client: wreq::Client,
    base_url: String,
    model: String,
}

impl GeminiAdapter {
    pub fn new() -> Result<Self, AdapterError> {
        let client = wreq::Client::builder()
            .build()
            .map_err(|err| AdapterError::Client(err.to_string()))?;
        Ok(Self {
            client,
            base_url: DEFAULT_BASE_URL.to_owned(),
            model: DEFAULT_MODEL.to_owned(),
        })
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url.trim_end_matches('/'),
            self.model
        )
    }

    fn models_url(&self) -> String {
        format!("{}/v1beta/models", self.base_url.trim_end_matches('/'))
    }
}

fn build_headers(api_key: &str) -> Option<HeaderMap> {
    let mut headers = HeaderMap::new();
    headers.insert("x-goog-api-key", HeaderValue::from_str(api_key).ok()?);
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    Some(headers)
}

fn request_body(payload: &AttemptPayload) -> GenerateContentRequestBody {
    let parts = payload
        .parts
        .iter()
        .map(|part| match part {
            PayloadPart::Image(image) => {
                Part::inline_data(image.mime_type.clone(), image.to_base64())
            }
            PayloadPart::Text(text) => Part::text(text.clone()),
        })
        .collect();
    GenerateContentRequestBody {
        contents: vec![Content {
            parts,
            role: Some(ContentRole::User),
        }],
        generation_config: Some(GenerationConfig {
            response_modalities: Some(vec![Modality::Image]),
            ..GenerationConfig::default()
        }),
    }
}

fn classify_failure(status: StatusCode, headers: &HeaderMap, body: &[u8]) -> AttemptOutcome {
    let message = ErrorEnvelope::message_from_bytes(body);
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => AttemptOutcome::AuthFailure,
        StatusCode::TOO_MANY_REQUESTS => AttemptOutcome::QuotaFailure {
            retry_after: retry_after(headers),
        },
        // The API reports a malformed key as 400 rather than 401.
        StatusCode::BAD_REQUEST if message.contains("API key not valid") => {
            AttemptOutcome::AuthFailure
        }
        _ => AttemptOutcome::OtherFailure(format!("{}: {message}", status.as_u16())),
    }
}

fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    let value = headers.get(RETRY_AFTER)?.to_str().ok()?.trim();
    if let Ok(seconds) = value.parse::<u64>() {
        return Some(Duration::seconds(seconds as i64));
    }
    if let Ok(when) = httpdate::parse_http_date(value) {
        return when
            .duration_since(SystemTime::now())
            .ok()
            .map(|duration| Duration::seconds(duration.as_secs() as i64));
    }
    None
}

#[async_trait]
impl RemoteAdapter for GeminiAdapter {
    async fn attempt(&self, secret: &str, payload: &AttemptPayload) -> AttemptOutcome {
        let Some(headers) = build_headers(secret) else {
            // A key that cannot even be a header value is a bad key.
            return AttemptOutcome::AuthFailure;
        };
        let body = request_body(payload);
        info!(
            event = "upstream_request",
            op = "generate_content",
            model = %self.model,
            key = %redact_secret(secret),
            parts = payload.parts.len()
        );
        let response = match self
            .client
            .post(self.generate_url())
            .headers(headers)
            .json(&body)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                warn!(event = "upstream_response", op = "generate_content", status = "error", error = %err);
                return AttemptOutcome::OtherFailure(err.to_string());
            }
        };

        let status = response.status();
        info!(
            event = "upstream_response",
            op = "generate_content",
            status = %status.as_u16()
        );
        if !status.is_success() {
            let response_headers = response.headers().clone();
            let bytes = match response.bytes().await {
                Ok(bytes) => bytes,
                Err(err) => return AttemptOutcome::OtherFailure(err.to_string()),
            };
            return classify_failure(status, &response_headers, &bytes);
        }

        let parsed: GenerateContentResponse = match response.json().await {
            Ok(parsed) => parsed,
            Err(err) => {
                return AttemptOutcome::OtherFailure(format!("unreadable response: {err}"));
            }
        };
        let Some(blob) = parsed.first_inline_image() else {
            return AttemptOutcome::OtherFailure("response contained no image".to_owned());
        };
        match ImageBlob::from_base64(&blob.data, blob.mime_type.clone()) {
            Ok(image) => AttemptOutcome::Success(image),
            Err(err) => AttemptOutcome::OtherFailure(format!("undecodable image data: {err}")),
        }
    }

    async fn probe(&self, secret: &str) -> ProbeOutcome {
        let Some(headers) = build_headers(secret) else {
            return ProbeOutcome::Invalid;
        };
        info!(
            event = "upstream_request",
            op = "list_models",
            key = %redact_secret(secret)
        );
        let response = match self
            .client
            .get(self.models_url())
            .headers(headers)
            .query(&ListModelsQuery {
                page_size: Some(1),
                page_token: None,
            })
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => return ProbeOutcome::Unreachable(err.to_string()),
        };

        let status = response.status();
        if status.is_success() {
            return match response.json::<ListModelsResponse>().await {
                Ok(_) => ProbeOutcome::Valid,
                Err(err) => ProbeOutcome::Unreachable(format!("unreadable response: {err}")),
            };
        }
        let bytes = response.bytes().await.unwrap_or_default();
        match classify_failure(status, &HeaderMap::new(), &bytes) {
            AttemptOutcome::AuthFailure => ProbeOutcome::Invalid,
            // Rate-limited keys authenticated fine; they are valid.
            AttemptOutcome::QuotaFailure { .. } => ProbeOutcome::Valid,
            AttemptOutcome::OtherFailure(message) => ProbeOutcome::Unreachable(message),
            AttemptOutcome::Success(_) => ProbeOutcome::Valid,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;

    #[test]
    fn auth_statuses_map_to_auth_failure() {
        let headers = HeaderMap::new();
        assert_eq!(
            classify_failure(StatusCode::UNAUTHORIZED, &headers, b"{}"),
            AttemptOutcome::AuthFailure
        );
        assert_eq!(
            classify_failure(StatusCode::FORBIDDEN, &headers, b"{}"),
            AttemptOutcome::AuthFailure
        );
    }

    #[test]
    fn bad_key_as_bad_request_maps_to_auth_failure() {
        let body = br#"{"error":{"code":400,"message":"API key not valid. Please pass a valid API key.","status":"INVALID_ARGUMENT"}}"#;
        assert_eq!(
            classify_failure(StatusCode::BAD_REQUEST, &HeaderMap::new(), body),
            AttemptOutcome::AuthFailure
        );
    }

    #[test]
    fn rate_limit_maps_to_quota_with_retry_hint() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, HeaderValue::from_static("17"));
        assert_eq!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, &headers, b"{}"),
            AttemptOutcome::QuotaFailure {
                retry_after: Some(Duration::seconds(17))
            }
        );
        assert_eq!(
            classify_failure(StatusCode::TOO_MANY_REQUESTS, &HeaderMap::new(), b"{}"),
            AttemptOutcome::QuotaFailure { retry_after: None }
        );
    }

    #[test]
    fn unrecognized_statuses_default_to_other_failure() {
        let body = br#"{"error":{"code":500,"message":"internal","status":"INTERNAL"}}"#;
        let outcome = classify_failure(StatusCode::INTERNAL_SERVER_ERROR, &HeaderMap::new(), body);
        assert_eq!(outcome, AttemptOutcome::OtherFailure("500: internal".into()));
    }

    #[test]
    fn request_body_preserves_part_order_and_sets_image_modality() {
        let payload = AttemptPayload {
            parts: vec![
                PayloadPart::Image(ImageBlob::new(Bytes::from_static(b"img"), "image/png")),
                PayloadPart::Text("do the thing".into()),
            ],
        };
        let body = request_body(&payload);
        assert_eq!(body.contents.len(), 1);
        let parts = &body.contents[0].parts;
        assert!(parts[0].inline_data.is_some());
        assert_eq!(parts[1].text.as_deref(), Some("do the thing"));
        let config = body.generation_config.expect("generation config");
        assert_eq!(config.response_modalities, Some(vec![Modality::Image]));
    }
}
