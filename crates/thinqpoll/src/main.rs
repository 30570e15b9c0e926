mod cli;
mod config;
mod error;
mod influx;

use std::collections::BTreeMap;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use thinqpoll_api::ThinqClient;
use thinqpoll_core::{Measurement, MetricsSink, StatusSnapshot, collect};

use crate::cli::Cli;
use crate::config::{Config, Credentials};
use crate::error::CliError;
use crate::influx::InfluxSink;

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    init_tracing(cli.verbose);

    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8) {
    let filter = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let cfg = config::load(cli.config.as_deref())?;
    let device_id = cli
        .device_id
        .unwrap_or_else(|| cfg.device.device_id.clone());

    let client = build_client(&cfg, cli.insecure).await?;

    let policy = cfg.poll.to_policy();
    let snapshot = collect(&client, &device_id, &policy).await?;
    tracing::info!(fields = snapshot.fields.len(), "status collected");

    let measurement = build_measurement(&cfg, snapshot);

    if cli.dry_run {
        println!("{}", serde_json::to_string_pretty(&measurement)?);
        return Ok(());
    }

    let sink = InfluxSink::new(&cfg.influx)?;
    sink.write_point(&measurement)
        .await
        .map_err(|e| CliError::SinkWrite { message: e.message })?;
    tracing::info!(measurement = %measurement.name, "measurement written");

    Ok(())
}

/// Build an authenticated client: resume from saved tokens when the
/// config carries them, otherwise perform a fresh login.
async fn build_client(cfg: &Config, insecure_flag: bool) -> Result<ThinqClient, CliError> {
    let base_url: url::Url = cfg.auth.base_url.parse().map_err(|_| CliError::Validation {
        field: "auth.base_url".into(),
        reason: format!("invalid URL: {}", cfg.auth.base_url),
    })?;
    let transport = config::transport_config(&cfg.auth, insecure_flag);

    match config::resolve_credentials(&cfg.auth)? {
        Credentials::Saved {
            access_token,
            refresh_token,
        } => {
            tracing::debug!("resuming saved session");
            ThinqClient::with_session(base_url, access_token, refresh_token, &transport)
                .map_err(api_error)
        }
        Credentials::Password { username, password } => {
            let client = ThinqClient::new(base_url, &transport).map_err(api_error)?;
            client
                .login(&username, &password)
                .await
                .map_err(api_error)?;
            Ok(client)
        }
    }
}

fn api_error(err: thinqpoll_api::Error) -> CliError {
    match err {
        thinqpoll_api::Error::Authentication { message } => CliError::AuthFailed { message },
        thinqpoll_api::Error::NotAuthenticated => CliError::AuthFailed {
            message: "session rejected".into(),
        },
        thinqpoll_api::Error::Tls(message) => CliError::ConnectionFailed {
            source: message.into(),
        },
        thinqpoll_api::Error::Transport(e) if e.is_connect() || e.is_timeout() => {
            CliError::ConnectionFailed { source: e.into() }
        }
        other => CliError::ApiError {
            message: other.to_string(),
        },
    }
}

/// Assemble the final measurement: identity tags from the device
/// descriptor and config, fields from the normalized snapshot.
fn build_measurement(cfg: &Config, snapshot: StatusSnapshot) -> Measurement {
    let mut tags = BTreeMap::new();
    tags.insert("device_id".to_string(), snapshot.device.device_id.clone());
    tags.insert(
        "location_general".to_string(),
        cfg.device.location_general.clone(),
    );
    tags.insert("model_id".to_string(), snapshot.device.model_id.clone());
    tags.insert("name".to_string(), snapshot.device.name.clone());
    tags.insert("type".to_string(), snapshot.device.device_type.clone());

    Measurement {
        name: cfg.influx.measurement.clone(),
        tags,
        fields: snapshot.fields.into_fields(),
    }
}
