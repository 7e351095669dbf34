//! Shared-key authentication for the SMS gateway webhook

use axum::{
    body::Body,
    extract::State,
    http::{Request, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;

use crate::twiml::TwiMl;

/// Header the gateway sends the shared key in
pub const API_KEY_HEADER: &str = "x-api-key";

/// Webhook authentication configuration
#[derive(Debug, Clone)]
pub struct ApiKeyConfig {
    /// Expected key (None = auth disabled)
    pub api_key: Option<String>,
}

impl ApiKeyConfig {
    pub fn new(api_key: Option<String>) -> Self {
        let api_key = api_key
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty());
        Self { api_key }
    }

    /// Load from SMS_API_KEY
    pub fn from_env() -> Self {
        let config = Self::new(std::env::var("SMS_API_KEY").ok());

        if config.is_enabled() {
            tracing::info!("SMS webhook authentication enabled");
        } else {
            tracing::warn!("SMS webhook authentication DISABLED - anyone can post to /sms!");
        }

        config
    }

    pub fn is_enabled(&self) -> bool {
        self.api_key.is_some()
    }

    /// Check a presented key
    pub fn validate(&self, presented: &str) -> bool {
        match &self.api_key {
            Some(expected) => constant_time_eq(expected.as_bytes(), presented.as_bytes()),
            None => true,
        }
    }
}

/// Constant-time byte comparison to prevent timing attacks
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut result = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        result |= x ^ y;
    }
    result == 0
}

/// Middleware rejecting webhook calls without the shared key
pub async fn sms_auth_middleware(
    State(config): State<Arc<ApiKeyConfig>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if !config.is_enabled() {
        return next.run(request).await;
    }

    let presented = request
        .headers()
        .get(API_KEY_HEADER)
        .and_then(|v| v.to_str().ok());
    let key_present = presented.is_some();
    let authorized = presented.is_some_and(|key| config.validate(key));

    if authorized {
        return next.run(request).await;
    }

    tracing::warn!(key_present, "Rejected SMS webhook call with bad API key");
    TwiMl::with_status(StatusCode::UNAUTHORIZED, "Unauthorized").into_response()
}
