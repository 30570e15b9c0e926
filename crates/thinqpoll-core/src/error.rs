// ── Core error types ──
//
// Pipeline-level errors. Only fatal outcomes appear here: transient
// conditions (malformed frames, unrecognized fields, empty polls) are
// handled inside the poll loop and never surface as errors. The
// `From<thinqpoll_api::Error>` impl translates transport-layer errors
// into run-terminating variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Invalid credentials, a rejected refresh, or an exhausted
    /// re-authentication budget. Fatal -- the run is not retried.
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// No acceptable frame arrived within the bounded attempt budget.
    /// The monitor session has already been closed when this is raised.
    #[error("No acceptable frame after {attempts} poll attempts")]
    PollTimeout { attempts: u32 },

    /// The monitor session could not be opened or operated (e.g. another
    /// session is already open for the device).
    #[error("Monitor session failed: {message}")]
    MonitorFailed { message: String },

    /// The service could not be reached.
    #[error("Cannot connect to service: {reason}")]
    ConnectionFailed { reason: String },

    /// Any other service-level failure.
    #[error("API error: {message}")]
    Api { message: String },

    /// The final measurement could not be written to the metrics sink.
    #[error("Metrics sink write failed: {message}")]
    SinkWrite { message: String },
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<thinqpoll_api::Error> for CoreError {
    fn from(err: thinqpoll_api::Error) -> Self {
        match err {
            thinqpoll_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            thinqpoll_api::Error::NotAuthenticated => CoreError::AuthenticationFailed {
                message: "session expired and was not recovered".into(),
            },
            thinqpoll_api::Error::Monitor { message } => CoreError::MonitorFailed { message },
            thinqpoll_api::Error::Transport(ref e) if e.is_connect() || e.is_timeout() => {
                CoreError::ConnectionFailed {
                    reason: e.to_string(),
                }
            }
            other => CoreError::Api {
                message: other.to_string(),
            },
        }
    }
}
