//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` variants into user-facing errors with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use thinqpoll_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the appliance cloud")]
    #[diagnostic(
        code(thinqpoll::connection_failed),
        help("Check network connectivity and the base_url in your config.")
    )]
    ConnectionFailed {
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(thinqpoll::auth_failed),
        help(
            "Verify the credentials in the [auth] section of your config.\n\
             Saved tokens may have been revoked; remove them to force a fresh login."
        )
    )]
    AuthFailed { message: String },

    #[error("No credentials configured")]
    #[diagnostic(
        code(thinqpoll::no_credentials),
        help(
            "Provide either access_token/refresh_token or username/password\n\
             in the [auth] section, or set THINQPOLL_AUTH__PASSWORD."
        )
    )]
    NoCredentials,

    // ── Polling ──────────────────────────────────────────────────────

    #[error("Device reported no usable status in {attempts} poll attempts")]
    #[diagnostic(
        code(thinqpoll::poll_timeout),
        help(
            "The appliance may be idle or offline. Increase [poll] attempts\n\
             or interval_secs if the device is merely slow to report."
        )
    )]
    PollTimeout { attempts: u32 },

    #[error("Monitor session failed: {message}")]
    #[diagnostic(code(thinqpoll::monitor))]
    Monitor { message: String },

    // ── API ──────────────────────────────────────────────────────────

    #[error("API error: {message}")]
    #[diagnostic(code(thinqpoll::api_error))]
    ApiError { message: String },

    // ── Sink ─────────────────────────────────────────────────────────

    #[error("InfluxDB write failed: {message}")]
    #[diagnostic(
        code(thinqpoll::sink_write),
        help("Check the [influx] url and database, and that the server is up.")
    )]
    SinkWrite { message: String },

    // ── Validation / Configuration ───────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(thinqpoll::validation))]
    Validation { field: String, reason: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(thinqpoll::no_config),
        help("Create one and point --config at it.\nExpected at: {path}")
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(thinqpoll::config))]
    Config(Box<figment::Error>),

    // ── IO / Serialization ───────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Serialization failed: {0}")]
    #[diagnostic(code(thinqpoll::json))]
    Json(#[from] serde_json::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials => exit_code::AUTH,
            Self::PollTimeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NoConfig { .. } | Self::Config(_) => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },

            CoreError::PollTimeout { attempts } => CliError::PollTimeout { attempts },

            CoreError::MonitorFailed { message } => CliError::Monitor { message },

            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed {
                source: reason.into(),
            },

            CoreError::Api { message } => CliError::ApiError { message },

            CoreError::SinkWrite { message } => CliError::SinkWrite { message },
        }
    }
}
