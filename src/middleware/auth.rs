use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::{header::AUTHORIZATION, HeaderMap},
    middleware::Next,
    response::Response,
};
use chrono::Utc;

use crate::auth::AuthenticationGate;
use crate::error::ApiError;

/// Launch parameter authentication for every non-exempt path.
///
/// On success the caller's `VerifiedIdentity` is inserted into the request
/// extensions; handlers take it with `Extension<VerifiedIdentity>`.
pub async fn launch_params_middleware(
    State(gate): State<Arc<AuthenticationGate>>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if gate.config().is_exempt(request.uri().path()) {
        return Ok(next.run(request).await);
    }

    let credential = extract_credential(request.headers()).map_err(|msg| {
        tracing::debug!("Authorization failed: {}", msg);
        ApiError::unauthorized(msg)
    })?;

    let identity = gate.authenticate(&credential, Utc::now())?;
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

/// Raw launch parameters from the Authorization header, `Bearer ` optional
fn extract_credential(headers: &HeaderMap) -> Result<String, &'static str> {
    let auth_header = headers
        .get(AUTHORIZATION)
        .ok_or("Missing Authorization header")?;

    let auth_str = auth_header
        .to_str()
        .map_err(|_| "Invalid Authorization header format")?;

    let credential = auth_str.strip_prefix("Bearer ").unwrap_or(auth_str).trim();
    if credential.is_empty() {
        return Err("Empty Authorization header");
    }

    Ok(credential.to_string())
}
