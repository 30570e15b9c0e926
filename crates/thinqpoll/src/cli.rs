//! Clap derive structure for the `thinqpoll` CLI.

use std::path::PathBuf;

use clap::Parser;

/// thinqpoll -- one-shot appliance telemetry poller
#[derive(Debug, Parser)]
#[command(
    name = "thinqpoll",
    version,
    about = "Poll an appliance's cloud telemetry and write one measurement to InfluxDB",
    long_about = "Resolves a device and its model catalog, opens a monitor session,\n\
        polls for a status frame, normalizes it, and writes a single measurement\n\
        to InfluxDB. Designed to run under cron or a systemd timer."
)]
pub struct Cli {
    /// Path to the config file
    #[arg(long, short = 'c', env = "THINQPOLL_CONFIG")]
    pub config: Option<PathBuf>,

    /// Device to poll (overrides the config file)
    #[arg(long, short = 'd')]
    pub device_id: Option<String>,

    /// Print the measurement as JSON instead of writing to InfluxDB
    #[arg(long)]
    pub dry_run: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "THINQPOLL_INSECURE")]
    pub insecure: bool,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count)]
    pub verbose: u8,
}
