//! Error envelope shared between the backend contract and the client.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// JSON error body the backend returns on failures: `{"detail": "..."}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

/// Typed rejection every Remote Gateway call can bubble. Components catch at
/// their own boundary and decide whether to alert, log or silently degrade.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GatewayError {
    /// Bad password or rejected session. Surfaced, never retried.
    #[error("authentication failed: {0}")]
    Auth(String),
    /// Unknown event code (or participant/distance id).
    #[error("not found: {0}")]
    NotFound(String),
    /// Malformed participant or shot payload. Surfaced inline.
    #[error("invalid request: {0}")]
    Validation(String),
    /// Request failed or channel dropped. Read paths retry on a timer;
    /// write-path auto-saves log only.
    #[error("network error: {0}")]
    Transient(String),
    /// Response body could not be decoded.
    #[error("unexpected response: {0}")]
    Decode(String),
    /// The server reported a state the client assumed impossible. Resolved
    /// by forcing the client back to a consistent state, never by guessing.
    #[error("stale state: {0}")]
    Stale(String),
}

impl GatewayError {
    /// Classify a non-2xx response by status code.
    pub fn from_status(status: u16, detail: String) -> Self {
        match status {
            401 | 403 => GatewayError::Auth(detail),
            404 => GatewayError::NotFound(detail),
            400 | 422 => GatewayError::Validation(detail),
            _ => GatewayError::Transient(format!("HTTP {status}: {detail}")),
        }
    }

    pub fn is_auth(&self) -> bool {
        matches!(self, GatewayError::Auth(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, GatewayError::NotFound(_))
    }
}

/// Pull a human-readable detail out of an error body, falling back to the
/// raw text when it is not the expected JSON shape.
pub fn extract_detail(body: &str) -> String {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) if !parsed.detail.trim().is_empty() => parsed.detail,
        _ => body.trim().to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_codes_map_to_the_taxonomy() {
        assert!(GatewayError::from_status(401, "bad password".into()).is_auth());
        assert!(GatewayError::from_status(404, "no such event".into()).is_not_found());
        assert_eq!(
            GatewayError::from_status(422, "shift required".into()),
            GatewayError::Validation("shift required".into())
        );
        assert!(matches!(
            GatewayError::from_status(502, "upstream".into()),
            GatewayError::Transient(_)
        ));
    }

    #[test]
    fn detail_extraction_prefers_the_json_body() {
        assert_eq!(extract_detail(r#"{"detail":"Invalid lane password"}"#), "Invalid lane password");
        assert_eq!(extract_detail("gateway timeout"), "gateway timeout");
    }
}
