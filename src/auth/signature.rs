// auth/signature.rs - HMAC verification of host-platform launch parameters
//
// The host signs its launch parameters by sorting them by key, encoding them
// as a query string and taking HMAC-SHA256 with the app secret. The digest is
// carried, unpadded URL-safe base64, in the `sign` parameter.

use std::collections::BTreeMap;

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use thiserror::Error;
use url::{form_urlencoded, Url};

/// Decoded launch parameters, ordered by key.
pub type ParameterMap = BTreeMap<String, String>;

type HmacSha256 = Hmac<Sha256>;

/// Parameter reserved for the signature itself.
pub const SIGN_PARAM: &str = "sign";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvalidSignature {
    #[error("launch parameters are empty")]
    Empty,

    #[error("missing 'sign' parameter")]
    MissingSignature,

    #[error("signature is not url-safe base64")]
    MalformedSignature,

    #[error("undecodable launch parameter")]
    MalformedParameter,

    #[error("duplicate launch parameter '{0}'")]
    DuplicateParameter(String),

    #[error("signing key rejected")]
    InvalidKey,

    #[error("signature mismatch")]
    Mismatch,
}

/// Verifies and produces launch parameter signatures.
///
/// By default every parameter except `sign` is signed. With a signed prefix
/// only keys starting with it enter the canonical string; the rest are not
/// covered by the signature and never reach the caller.
#[derive(Debug, Clone, Default)]
pub struct SignatureVerifier {
    signed_prefix: Option<String>,
}

impl SignatureVerifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_signed_prefix(prefix: impl Into<String>) -> Self {
        Self {
            signed_prefix: Some(prefix.into()),
        }
    }

    /// Check the signature of `raw` against `secret` and return the decoded
    /// signed parameters. The signature itself and any unsigned extras are
    /// left out.
    pub fn verify(&self, raw: &str, secret: &[u8]) -> Result<ParameterMap, InvalidSignature> {
        let mut params = parse_params(raw)?;

        let signature = params
            .remove(SIGN_PARAM)
            .filter(|s| !s.is_empty())
            .ok_or(InvalidSignature::MissingSignature)?;

        let expected = URL_SAFE_NO_PAD
            .decode(signature.trim_end_matches('='))
            .map_err(|_| InvalidSignature::MalformedSignature)?;

        // verify_slice compares in constant time
        self.mac(&params, secret)?
            .verify_slice(&expected)
            .map_err(|_| InvalidSignature::Mismatch)?;

        params.retain(|key, _| self.is_signed(key));
        Ok(params)
    }

    /// Signature for `params`, encoded the way the host platform sends it.
    pub fn sign(&self, params: &ParameterMap, secret: &[u8]) -> Result<String, InvalidSignature> {
        let digest = self.mac(params, secret)?.finalize().into_bytes();
        Ok(URL_SAFE_NO_PAD.encode(digest))
    }

    /// Full query string for `params` with the `sign` parameter appended.
    pub fn sign_query(&self, params: &ParameterMap, secret: &[u8]) -> Result<String, InvalidSignature> {
        let signature = self.sign(params, secret)?;

        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in params.iter().filter(|(key, _)| key.as_str() != SIGN_PARAM) {
            serializer.append_pair(key, value);
        }
        serializer.append_pair(SIGN_PARAM, &signature);
        Ok(serializer.finish())
    }

    /// Signed pairs sorted by key, as `key=value` joined with `&`.
    pub fn canonical_string(&self, params: &ParameterMap) -> String {
        let mut serializer = form_urlencoded::Serializer::new(String::new());
        for (key, value) in params.iter().filter(|(key, _)| self.is_signed(key)) {
            serializer.append_pair(key, value);
        }
        serializer.finish()
    }

    fn is_signed(&self, key: &str) -> bool {
        key != SIGN_PARAM
            && self
                .signed_prefix
                .as_deref()
                .map_or(true, |prefix| key.starts_with(prefix))
    }

    fn mac(&self, params: &ParameterMap, secret: &[u8]) -> Result<HmacSha256, InvalidSignature> {
        let mut mac = HmacSha256::new_from_slice(secret).map_err(|_| InvalidSignature::InvalidKey)?;
        mac.update(self.canonical_string(params).as_bytes());
        Ok(mac)
    }
}

/// Accepts a bare query string, one starting with `?`, or a full URL.
fn parse_params(raw: &str) -> Result<ParameterMap, InvalidSignature> {
    let raw = raw.trim();
    let url;
    let query = if let Some(query) = raw.strip_prefix('?') {
        query.split_once('#').map_or(query, |(query, _)| query)
    } else if let Ok(parsed) = Url::parse(raw) {
        url = parsed;
        url.query().unwrap_or_default()
    } else {
        raw
    };

    if query.is_empty() {
        return Err(InvalidSignature::Empty);
    }

    let mut params = ParameterMap::new();
    for (key, value) in form_urlencoded::parse(query.as_bytes()) {
        // Invalid UTF-8 escapes decode to U+FFFD
        if key.is_empty()
            || key.contains(char::REPLACEMENT_CHARACTER)
            || value.contains(char::REPLACEMENT_CHARACTER)
        {
            return Err(InvalidSignature::MalformedParameter);
        }

        let key = key.into_owned();
        if params.contains_key(&key) {
            return Err(InvalidSignature::DuplicateParameter(key));
        }
        params.insert(key, value.into_owned());
    }

    if params.is_empty() {
        return Err(InvalidSignature::Empty);
    }
    Ok(params)
}
