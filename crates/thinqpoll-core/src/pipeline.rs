// ── Pipeline ──
//
// One full telemetry run: resolve the device and its catalog (with
// bounded re-authentication), open a monitor session, poll until a frame
// normalizes into an acceptable field set, and close the session on
// every exit path. The caller turns the snapshot into a measurement and
// hands it to the sink.

use std::time::Duration;

use futures_util::future::BoxFuture;
use tokio::time::sleep;
use tracing::{debug, info, trace, warn};

use thinqpoll_api::{DeviceDescriptor, ModelCatalog, Monitor, ThinqClient};

use crate::decode::decode_frame;
use crate::error::CoreError;
use crate::normalize::{FieldAccumulator, normalize_into};

// ── PollPolicy ───────────────────────────────────────────────────────

/// Bounds on the run: poll attempts, inter-poll delay, and the
/// re-authentication budget. Every loop in the pipeline terminates
/// within these bounds; a misbehaving service cannot block forever.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Maximum poll attempts before the run fails with `PollTimeout`.
    pub poll_attempts: u32,

    /// Delay between poll attempts. The first request after a monitor
    /// opens usually returns no data, so the loop always sleeps between
    /// attempts.
    pub poll_interval: Duration,

    /// Maximum refresh+retry cycles per call on a stale session.
    pub auth_retries: u32,

    /// Delay before the first retried call after a refresh; doubled per
    /// cycle.
    pub auth_backoff: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            poll_attempts: 60,
            poll_interval: Duration::from_secs(1),
            auth_retries: 3,
            auth_backoff: Duration::from_millis(500),
        }
    }
}

// ── StatusSnapshot ───────────────────────────────────────────────────

/// Result of one successful run: the device identity and the final
/// accumulator contents.
#[derive(Debug)]
pub struct StatusSnapshot {
    pub device: DeviceDescriptor,
    pub fields: FieldAccumulator,
}

// ── Run ──────────────────────────────────────────────────────────────

/// Execute one poll → decode → normalize run against a device.
///
/// The monitor session is closed exactly once on every exit path:
/// normal completion, exhausted poll budget, and any error raised while
/// polling or decoding.
pub async fn collect(
    client: &ThinqClient,
    device_id: &str,
    policy: &PollPolicy,
) -> Result<StatusSnapshot, CoreError> {
    let device = with_reauth(client, policy, "get_device", |c| {
        Box::pin(c.get_device(device_id))
    })
    .await?;
    info!(
        device_id = %device.device_id,
        model_id = %device.model_id,
        name = %device.name,
        "device resolved"
    );

    let catalog = with_reauth(client, policy, "model_info", |c| {
        Box::pin(c.model_info(&device))
    })
    .await?;
    debug!(descriptors = catalog.len(), "model catalog resolved");

    let mut monitor = client.open_monitor(device_id).await.map_err(CoreError::from)?;

    let outcome = poll_loop(&mut monitor, &catalog, policy).await;

    // The stop must run regardless of how the loop exited; a failed stop
    // is logged but never masks the loop outcome.
    if let Err(e) = monitor.close().await {
        warn!(error = %e, "monitor stop failed (non-fatal)");
    }

    let fields = outcome?;
    Ok(StatusSnapshot { device, fields })
}

/// Poll until a frame normalizes into a non-empty field set or the
/// attempt budget is exhausted.
///
/// Transient conditions -- no data yet, malformed frames, unusable
/// payloads, failed merges -- are logged and polling continues. Only
/// transport and session errors escape.
async fn poll_loop(
    monitor: &mut Monitor,
    catalog: &ModelCatalog,
    policy: &PollPolicy,
) -> Result<FieldAccumulator, CoreError> {
    let mut acc = FieldAccumulator::new();

    for attempt in 1..=policy.poll_attempts {
        match monitor.poll().await {
            Ok(Some(frame)) => match decode_frame(&frame) {
                Ok(decoded) => {
                    match normalize_into(&mut acc, decoded, catalog) {
                        Ok(()) => {
                            if !acc.is_empty() {
                                debug!(attempt, fields = acc.len(), "acceptable field set");
                                return Ok(acc);
                            }
                        }
                        Err(e) => {
                            debug!(attempt, error = %e, "merge failed, continuing to poll");
                        }
                    }
                }
                Err(e) => {
                    debug!(
                        attempt,
                        error = %e,
                        payload = %String::from_utf8_lossy(&frame.payload),
                        "malformed frame, continuing to poll"
                    );
                }
            },
            Ok(None) => trace!(attempt, "no data yet"),
            Err(e) if e.is_transient_frame() => {
                debug!(attempt, error = %e, "unusable payload, continuing to poll");
            }
            Err(e) => return Err(e.into()),
        }

        sleep(policy.poll_interval).await;
    }

    Err(CoreError::PollTimeout {
        attempts: policy.poll_attempts,
    })
}

/// Run a session-scoped call with bounded refresh+retry recovery.
///
/// A `NotAuthenticated` result triggers `refresh()` and a retry of the
/// same call, up to `policy.auth_retries` times with doubling backoff.
/// A rejected refresh, or an exhausted budget, is a fatal
/// authentication failure. Any other error propagates immediately.
async fn with_reauth<'c, T>(
    client: &'c ThinqClient,
    policy: &PollPolicy,
    what: &str,
    op: impl Fn(&'c ThinqClient) -> BoxFuture<'c, Result<T, thinqpoll_api::Error>>,
) -> Result<T, CoreError> {
    let mut backoff = policy.auth_backoff;
    let mut refreshes = 0;

    loop {
        match op(client).await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_auth_expired() => {
                refreshes += 1;
                if refreshes > policy.auth_retries {
                    return Err(CoreError::AuthenticationFailed {
                        message: format!(
                            "{what}: session still stale after {} refreshes",
                            policy.auth_retries
                        ),
                    });
                }
                warn!(call = what, refresh = refreshes, "stale session, refreshing");
                client.refresh().await.map_err(CoreError::from)?;
                sleep(backoff).await;
                backoff *= 2;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
