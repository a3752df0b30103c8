#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use axum::{
    body::Body,
    http::{header::AUTHORIZATION, Request, StatusCode},
    Router,
};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tower::ServiceExt;

use outing_api::api::{app, AppState};
use outing_api::auth::{AuthenticationGate, GateConfig, ParameterMap, SignatureVerifier};
use outing_api::services::RouteAggregationService;
use outing_api::testing::MemoryStore;

pub const SECRET: &str = "integration-secret";

pub struct TestApp {
    pub store: MemoryStore,
    pub router: Router,
}

impl TestApp {
    pub fn new(strict: bool) -> Self {
        Self::with_timeout(strict, Duration::from_secs(5))
    }

    pub fn with_timeout(strict: bool, timeout: Duration) -> Self {
        let store = MemoryStore::new();
        let aggregation = Arc::new(RouteAggregationService::new(Arc::new(store.clone()), timeout));
        let state = AppState::new(Arc::new(store.clone()), aggregation);
        let gate = Arc::new(AuthenticationGate::new(gate_config(strict)));

        Self {
            store,
            router: app(state, gate),
        }
    }

    /// Send a GET, optionally with an Authorization header, and decode the JSON body.
    pub async fn get(&self, path: &str, authorization: Option<&str>) -> Result<(StatusCode, Value)> {
        let mut request = Request::builder().uri(path);
        if let Some(value) = authorization {
            request = request.header(AUTHORIZATION, value);
        }

        let response = self.router.clone().oneshot(request.body(Body::empty())?).await?;
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes)?
        };
        Ok((status, body))
    }
}

pub fn gate_config(strict: bool) -> GateConfig {
    GateConfig {
        secret: SECRET.as_bytes().to_vec(),
        strict,
        max_age: Duration::from_secs(3600),
        signed_prefix: Some("vk_".to_string()),
        exempt_prefixes: vec!["/swagger/".to_string(), "/health".to_string()],
    }
}

/// `Bearer <signed launch params>` for `user_id`, signed at `issued_at`.
pub fn bearer(user_id: i64, issued_at: DateTime<Utc>) -> String {
    let mut params = ParameterMap::new();
    params.insert("vk_user_id".to_string(), user_id.to_string());
    params.insert("vk_ts".to_string(), issued_at.timestamp().to_string());
    params.insert("vk_language".to_string(), "en".to_string());
    params.insert("vk_platform".to_string(), "mobile_iphone".to_string());

    let query = SignatureVerifier::with_signed_prefix("vk_")
        .sign_query(&params, SECRET.as_bytes())
        .expect("hmac accepts any key");
    format!("Bearer {}", query)
}

pub fn fresh_bearer(user_id: i64) -> String {
    bearer(user_id, Utc::now())
}
