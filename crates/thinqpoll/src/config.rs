//! CLI-owned configuration: TOML file, environment overrides, and
//! credential resolution.
//!
//! Core never sees these types -- it receives a pre-built client and a
//! `PollPolicy`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};

use thinqpoll_api::{TlsMode, TransportConfig};
use thinqpoll_core::PollPolicy;

use crate::error::CliError;

// ── TOML config structs ──────────────────────────────────────────────

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct Config {
    pub device: DeviceSection,

    pub auth: AuthSection,

    pub influx: InfluxSection,

    #[serde(default)]
    pub poll: PollSection,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct DeviceSection {
    /// Device to poll.
    #[serde(default)]
    pub device_id: String,

    /// Free-form location tag attached to every measurement.
    #[serde(default = "default_location")]
    pub location_general: String,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct AuthSection {
    /// Cloud API base URL.
    #[serde(default)]
    pub base_url: String,

    /// Username for a fresh login.
    pub username: Option<String>,

    /// Password for a fresh login (plaintext -- prefer THINQPOLL_AUTH__PASSWORD).
    pub password: Option<String>,

    /// Saved access token. Takes precedence over username/password.
    pub access_token: Option<String>,

    /// Saved refresh token, paired with `access_token`.
    pub refresh_token: Option<String>,

    /// Path to custom CA certificate.
    pub ca_cert: Option<PathBuf>,

    /// Accept self-signed TLS certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct InfluxSection {
    /// InfluxDB base URL (e.g., "http://localhost:8086").
    #[serde(default)]
    pub url: String,

    /// Target database.
    #[serde(default)]
    pub database: String,

    pub username: Option<String>,

    pub password: Option<String>,

    /// Measurement name the fields are written under.
    #[serde(default = "default_measurement")]
    pub measurement: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct PollSection {
    /// Poll attempts before giving up on the device.
    #[serde(default = "default_attempts")]
    pub attempts: u32,

    /// Seconds between poll attempts.
    #[serde(default = "default_interval")]
    pub interval_secs: u64,

    /// Session refreshes allowed within one run.
    #[serde(default = "default_auth_retries")]
    pub auth_retries: u32,
}

impl Default for PollSection {
    fn default() -> Self {
        Self {
            attempts: default_attempts(),
            interval_secs: default_interval(),
            auth_retries: default_auth_retries(),
        }
    }
}

fn default_location() -> String {
    "unknown".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_measurement() -> String {
    "lg_dryer".into()
}
fn default_attempts() -> u32 {
    60
}
fn default_interval() -> u64 {
    1
}
fn default_auth_retries() -> u32 {
    3
}

// ── Config file path ─────────────────────────────────────────────────

/// Resolve the default config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "thinqpoll", "thinqpoll")
        .map(|dirs| dirs.config_dir().join("config.toml"))
        .unwrap_or_else(|| {
            let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
            p.push(".config");
            p.push("thinqpoll");
            p.push("config.toml");
            p
        })
}

// ── Config loading ───────────────────────────────────────────────────

/// Load the full Config from file + environment.
///
/// Environment variables use a double-underscore section separator,
/// e.g. `THINQPOLL_AUTH__PASSWORD` → `auth.password`.
pub fn load(path: Option<&Path>) -> Result<Config, CliError> {
    let path = path.map_or_else(config_path, Path::to_path_buf);
    if !path.exists() && std::env::vars().all(|(k, _)| !k.starts_with("THINQPOLL_")) {
        return Err(CliError::NoConfig {
            path: path.display().to_string(),
        });
    }

    let config = extract(
        Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed("THINQPOLL_").split("__")),
    )?;
    validate(&config)?;
    Ok(config)
}

fn extract(figment: Figment) -> Result<Config, CliError> {
    Ok(figment.extract::<Config>()?)
}

fn validate(config: &Config) -> Result<(), CliError> {
    if config.device.device_id.is_empty() {
        return Err(CliError::Validation {
            field: "device.device_id".into(),
            reason: "must be set".into(),
        });
    }
    if config.auth.base_url.is_empty() {
        return Err(CliError::Validation {
            field: "auth.base_url".into(),
            reason: "must be set".into(),
        });
    }
    Ok(())
}

// ── Translation to api/core types ────────────────────────────────────

/// Credentials resolved from the `[auth]` section. Saved tokens win
/// over username/password so a run never re-logs-in needlessly.
pub enum Credentials {
    Saved {
        access_token: String,
        refresh_token: String,
    },
    Password {
        username: String,
        password: SecretString,
    },
}

pub fn resolve_credentials(auth: &AuthSection) -> Result<Credentials, CliError> {
    if let (Some(access), Some(refresh)) = (&auth.access_token, &auth.refresh_token) {
        return Ok(Credentials::Saved {
            access_token: access.clone(),
            refresh_token: refresh.clone(),
        });
    }

    if let (Some(username), Some(password)) = (&auth.username, &auth.password) {
        return Ok(Credentials::Password {
            username: username.clone(),
            password: SecretString::from(password.clone()),
        });
    }

    Err(CliError::NoCredentials)
}

pub fn transport_config(auth: &AuthSection, insecure_flag: bool) -> TransportConfig {
    let tls = if insecure_flag || auth.insecure {
        TlsMode::DangerAcceptInvalid
    } else if let Some(ref ca_path) = auth.ca_cert {
        TlsMode::CustomCa(ca_path.clone())
    } else {
        TlsMode::System
    };

    TransportConfig {
        tls,
        timeout: Duration::from_secs(auth.timeout_secs),
    }
}

impl PollSection {
    pub fn to_policy(&self) -> PollPolicy {
        PollPolicy {
            poll_attempts: self.attempts,
            poll_interval: Duration::from_secs(self.interval_secs),
            auth_retries: self.auth_retries,
            ..PollPolicy::default()
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use pretty_assertions::assert_eq;

    use super::*;

    fn from_toml(toml: &str) -> Result<Config, CliError> {
        let config = extract(
            Figment::new()
                .merge(Serialized::defaults(Config::default()))
                .merge(Toml::string(toml)),
        )?;
        validate(&config)?;
        Ok(config)
    }

    const MINIMAL: &str = r#"
        [device]
        device_id = "dryer-1"

        [auth]
        base_url = "https://cloud.example.com"
        username = "me"
        password = "hunter2"

        [influx]
        url = "http://localhost:8086"
        database = "appliances"
    "#;

    #[test]
    fn minimal_config_fills_defaults() {
        let config = from_toml(MINIMAL).unwrap();

        assert_eq!(config.device.location_general, "unknown");
        assert_eq!(config.influx.measurement, "lg_dryer");
        assert_eq!(config.poll.attempts, 60);
        assert_eq!(config.poll.interval_secs, 1);
        assert_eq!(config.poll.auth_retries, 3);
        assert_eq!(config.auth.timeout_secs, 30);
    }

    #[test]
    fn missing_device_id_is_a_validation_error() {
        let result = from_toml(
            r#"
            [auth]
            base_url = "https://cloud.example.com"
            "#,
        );
        assert!(matches!(result, Err(CliError::Validation { field, .. }) if field == "device.device_id"));
    }

    #[test]
    fn saved_tokens_win_over_password() {
        let mut config = from_toml(MINIMAL).unwrap();
        config.auth.access_token = Some("at".into());
        config.auth.refresh_token = Some("rt".into());

        match resolve_credentials(&config.auth).unwrap() {
            Credentials::Saved { access_token, .. } => assert_eq!(access_token, "at"),
            Credentials::Password { .. } => panic!("expected saved tokens to take precedence"),
        }
    }

    #[test]
    fn no_credentials_at_all_is_rejected() {
        let mut config = from_toml(MINIMAL).unwrap();
        config.auth.username = None;
        config.auth.password = None;

        assert!(matches!(
            resolve_credentials(&config.auth),
            Err(CliError::NoCredentials)
        ));
    }

    #[test]
    fn insecure_flag_overrides_config() {
        let config = from_toml(MINIMAL).unwrap();
        let transport = transport_config(&config.auth, true);
        assert!(matches!(transport.tls, TlsMode::DangerAcceptInvalid));
    }
}
