use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;
use thiserror::Error;

use super::signature::{ParameterMap, SignatureVerifier};

/// Launch parameter carrying the platform user id.
pub const USER_ID_PARAM: &str = "vk_user_id";
/// Launch parameter carrying the signing time, unix seconds.
pub const ISSUED_AT_PARAM: &str = "vk_ts";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Authorization failed: {0}")]
    Unauthorized(String),

    #[error("Authorization failed, signature expired")]
    Expired { age_secs: i64 },
}

impl AuthError {
    pub fn unauthorized(message: impl Into<String>) -> Self {
        AuthError::Unauthorized(message.into())
    }
}

/// Immutable settings for the authentication gate, fixed at startup.
#[derive(Debug, Clone)]
pub struct GateConfig {
    pub secret: Vec<u8>,
    /// Production mode: enforce `max_age` on the signing time.
    pub strict: bool,
    pub max_age: Duration,
    /// Only keys with this prefix are signed by the host platform.
    pub signed_prefix: Option<String>,
    /// Path prefixes served without authentication.
    pub exempt_prefixes: Vec<String>,
}

impl GateConfig {
    pub fn is_exempt(&self, path: &str) -> bool {
        self.exempt_prefixes
            .iter()
            .any(|prefix| path.starts_with(prefix.as_str()))
    }
}

/// Caller identity established from verified launch parameters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerifiedIdentity {
    pub platform_user_id: i64,
    pub issued_at: DateTime<Utc>,
    pub raw_params: ParameterMap,
}

impl VerifiedIdentity {
    pub fn param(&self, key: &str) -> Option<&str> {
        self.raw_params.get(key).map(String::as_str)
    }

    pub fn language(&self) -> Option<&str> {
        self.param("vk_language")
    }

    pub fn platform(&self) -> Option<&str> {
        self.param("vk_platform")
    }

    pub fn app_id(&self) -> Option<i64> {
        self.param("vk_app_id").and_then(|v| v.parse().ok())
    }
}

/// Verifies launch parameters and enforces the freshness window.
///
/// Shared by every request; holds no mutable state.
#[derive(Debug, Clone)]
pub struct AuthenticationGate {
    config: GateConfig,
    verifier: SignatureVerifier,
}

impl AuthenticationGate {
    pub fn new(config: GateConfig) -> Self {
        let verifier = match &config.signed_prefix {
            Some(prefix) => SignatureVerifier::with_signed_prefix(prefix.clone()),
            None => SignatureVerifier::new(),
        };
        Self { config, verifier }
    }

    pub fn config(&self) -> &GateConfig {
        &self.config
    }

    pub fn verifier(&self) -> &SignatureVerifier {
        &self.verifier
    }

    pub fn authenticate(&self, raw: &str, now: DateTime<Utc>) -> Result<VerifiedIdentity, AuthError> {
        let params = self.verifier.verify(raw, &self.config.secret).map_err(|e| {
            tracing::debug!("Launch params rejected: {}", e);
            AuthError::unauthorized("invalid launch params signature")
        })?;

        let issued_at = params
            .get(ISSUED_AT_PARAM)
            .and_then(|v| v.parse::<i64>().ok())
            .and_then(|ts| Utc.timestamp_opt(ts, 0).single())
            .ok_or_else(|| AuthError::unauthorized(format!("missing or invalid '{}'", ISSUED_AT_PARAM)))?;

        let platform_user_id = params
            .get(USER_ID_PARAM)
            .and_then(|v| v.parse::<i64>().ok())
            .ok_or_else(|| AuthError::unauthorized(format!("missing or invalid '{}'", USER_ID_PARAM)))?;

        if self.config.strict {
            let age_secs = now.signed_duration_since(issued_at).num_seconds();
            let max_age_secs = i64::try_from(self.config.max_age.as_secs()).unwrap_or(i64::MAX);
            if age_secs > max_age_secs {
                tracing::debug!("Authorization failed, signature expired {}s ago", age_secs);
                return Err(AuthError::Expired { age_secs });
            }
        }

        tracing::debug!("Authorization success for platform user {}", platform_user_id);

        Ok(VerifiedIdentity {
            platform_user_id,
            issued_at,
            raw_params: params,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration as ChronoDuration;

    const SECRET: &str = "gate-secret";

    fn gate(strict: bool) -> AuthenticationGate {
        AuthenticationGate::new(GateConfig {
            secret: SECRET.as_bytes().to_vec(),
            strict,
            max_age: Duration::from_secs(3600),
            signed_prefix: Some("vk_".to_string()),
            exempt_prefixes: vec!["/swagger/".to_string()],
        })
    }

    fn credential(gate: &AuthenticationGate, pairs: &[(&str, String)]) -> String {
        let params: ParameterMap = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        gate.verifier().sign_query(&params, SECRET.as_bytes()).unwrap()
    }

    fn issued(gate: &AuthenticationGate, at: DateTime<Utc>) -> String {
        credential(
            gate,
            &[
                ("vk_user_id", "42".to_string()),
                ("vk_ts", at.timestamp().to_string()),
                ("vk_language", "ru".to_string()),
                ("vk_platform", "desktop_web".to_string()),
            ],
        )
    }

    #[test]
    fn fresh_credential_yields_identity() {
        let gate = gate(true);
        let now = Utc::now();
        let identity = gate.authenticate(&issued(&gate, now), now).unwrap();

        assert_eq!(identity.platform_user_id, 42);
        assert_eq!(identity.issued_at.timestamp(), now.timestamp());
        assert_eq!(identity.language(), Some("ru"));
        assert_eq!(identity.platform(), Some("desktop_web"));
    }

    #[test]
    fn stale_credential_expires_only_in_strict_mode() {
        let now = Utc::now();
        let two_hours_ago = now - ChronoDuration::hours(2);

        let strict = gate(true);
        assert!(matches!(
            strict.authenticate(&issued(&strict, two_hours_ago), now),
            Err(AuthError::Expired { age_secs }) if age_secs >= 7200
        ));

        let relaxed = gate(false);
        let identity = relaxed.authenticate(&issued(&relaxed, two_hours_ago), now).unwrap();
        assert_eq!(identity.platform_user_id, 42);
    }

    #[test]
    fn age_equal_to_window_is_still_fresh() {
        let gate = gate(true);
        let now = Utc::now();
        let at_limit = now - ChronoDuration::seconds(3600);

        assert!(gate.authenticate(&issued(&gate, at_limit), now).is_ok());
    }

    #[test]
    fn unsigned_extras_stay_out_of_the_identity() {
        let gate = gate(true);
        let now = Utc::now();
        let raw = format!("{}&role=admin&language=xx", issued(&gate, now));

        let identity = gate.authenticate(&raw, now).unwrap();
        assert_eq!(identity.param("role"), None);
        assert_eq!(identity.param("language"), None);
        assert_eq!(identity.language(), Some("ru"));
        assert!(identity.raw_params.keys().all(|key| key.starts_with("vk_")));
    }

    #[test]
    fn bad_signature_is_unauthorized() {
        let gate = gate(true);
        let now = Utc::now();
        let forged = issued(&gate, now).replace("vk_user_id=42", "vk_user_id=43");

        assert!(matches!(gate.authenticate(&forged, now), Err(AuthError::Unauthorized(_))));
        assert!(matches!(gate.authenticate("", now), Err(AuthError::Unauthorized(_))));
    }

    #[test]
    fn missing_or_invalid_timestamp_is_unauthorized() {
        let gate = gate(false);
        let now = Utc::now();

        let missing = credential(&gate, &[("vk_user_id", "42".to_string())]);
        assert!(matches!(gate.authenticate(&missing, now), Err(AuthError::Unauthorized(_))));

        let garbage = credential(
            &gate,
            &[("vk_user_id", "42".to_string()), ("vk_ts", "yesterday".to_string())],
        );
        assert!(matches!(gate.authenticate(&garbage, now), Err(AuthError::Unauthorized(_))));
    }

    #[test]
    fn missing_user_id_is_unauthorized() {
        let gate = gate(false);
        let now = Utc::now();
        let raw = credential(&gate, &[("vk_ts", now.timestamp().to_string())]);

        assert!(matches!(gate.authenticate(&raw, now), Err(AuthError::Unauthorized(_))));
    }

    #[test]
    fn exempt_prefixes_match_by_prefix() {
        let gate = gate(true);
        assert!(gate.config().is_exempt("/swagger/index.html"));
        assert!(!gate.config().is_exempt("/routes"));
        assert!(!gate.config().is_exempt("/swagger"));
    }
}
