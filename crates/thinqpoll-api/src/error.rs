use thiserror::Error;

/// Top-level error type for the `thinqpoll-api` crate.
///
/// Covers every failure mode across the API surface: authentication,
/// transport, envelope-level service errors, and monitor payloads.
/// `thinqpoll-core` maps these into pipeline-level outcomes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Login or token refresh rejected (wrong credentials, revoked
    /// refresh token, etc.). Fatal -- never retried.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The service reported a stale access token (result code `0102`).
    /// Recoverable: refresh the session and retry the failed call.
    #[error("Not authenticated -- access token is stale")]
    NotAuthenticated,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// TLS setup or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Service ─────────────────────────────────────────────────────
    /// Error from the service envelope (`resultCode` != "0000").
    #[error("API error (code {code}): {message}")]
    Api { code: String, message: String },

    /// Monitor session could not be opened or operated -- typically
    /// another monitor is already open for the device.
    #[error("Monitor session error: {message}")]
    Monitor { message: String },

    /// Monitor returned a payload that could not be unwrapped
    /// (e.g. invalid base64). Transient for the polling pipeline.
    #[error("Unusable monitor payload: {message}")]
    Payload { message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if re-authenticating (refresh + retry) might
    /// resolve this error.
    pub fn is_auth_expired(&self) -> bool {
        matches!(self, Self::NotAuthenticated)
    }

    /// Returns `true` if the polling loop should treat this as a
    /// transient per-frame failure rather than aborting the run.
    pub fn is_transient_frame(&self) -> bool {
        matches!(self, Self::Payload { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_stale_tokens_are_recoverable() {
        assert!(Error::NotAuthenticated.is_auth_expired());
        assert!(
            !Error::Authentication {
                message: "bad credentials".into(),
            }
            .is_auth_expired()
        );
        assert!(
            !Error::Api {
                code: "0010".into(),
                message: "refused".into(),
            }
            .is_auth_expired()
        );
    }

    #[test]
    fn only_payload_errors_are_transient_frames() {
        assert!(
            Error::Payload {
                message: "not base64".into(),
            }
            .is_transient_frame()
        );
        assert!(!Error::NotAuthenticated.is_transient_frame());
        assert!(
            !Error::Monitor {
                message: "poll failed".into(),
            }
            .is_transient_frame()
        );
    }
}
