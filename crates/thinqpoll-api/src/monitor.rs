// Monitor session
//
// A monitor is the device-scoped polling channel: opened once, polled for
// raw status frames, and stopped exactly once. The service enforces a
// single monitor per device; opening a second one is rejected.

use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, trace};

use crate::client::ThinqClient;
use crate::error::Error;
use crate::models::{RC_NO_DATA, RC_OK};

/// One opaque telemetry payload as reported by the device for a single
/// poll attempt. The payload is the base64-decoded `returnData` bytes;
/// decoding into typed fields is the pipeline's job.
#[derive(Debug, Clone)]
pub struct RawFrame {
    pub payload: Vec<u8>,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct MonitorStartResult {
    #[serde(rename = "workId")]
    work_id: String,
}

#[derive(Debug, Deserialize)]
struct MonitorPollResult {
    #[serde(rename = "returnCode")]
    return_code: String,
    #[serde(default, rename = "returnData")]
    return_data: Option<String>,
}

impl ThinqClient {
    /// Open a monitor session for a device.
    ///
    /// `POST /v1/rti/rtiMon` with `cmdOpt: "Start"`.
    ///
    /// Fails with [`Error::Monitor`] when the service refuses to start a
    /// session -- most commonly because another monitor is already open
    /// for the device.
    pub async fn open_monitor(&self, device_id: &str) -> Result<Monitor, Error> {
        let url = self.api_url("rti/rtiMon")?;
        debug!(device_id, "opening monitor session");

        let body = json!({
            "cmd": "Mon",
            "cmdOpt": "Start",
            "deviceId": device_id,
        });

        let result: MonitorStartResult = match self.post(url, &body).await {
            Ok(result) => result,
            Err(Error::Api { code, message }) => {
                return Err(Error::Monitor {
                    message: format!("monitor start refused (code {code}): {message}"),
                });
            }
            Err(e) => return Err(e),
        };

        debug!(work_id = %result.work_id, "monitor session open");
        Ok(Monitor {
            client: self.clone(),
            device_id: device_id.to_owned(),
            work_id: result.work_id,
        })
    }
}

/// Handle for an open monitor session, bound to exactly one device.
///
/// Lifecycle: opened once via [`ThinqClient::open_monitor`], polled zero
/// or more times, closed exactly once -- [`close()`](Self::close) consumes
/// the handle so a double stop cannot compile.
#[derive(Debug)]
pub struct Monitor {
    client: ThinqClient,
    device_id: String,
    work_id: String,
}

impl Monitor {
    /// The device this session is bound to.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// One non-blocking attempt to fetch a raw frame.
    ///
    /// `POST /v1/rti/rtiResult`
    ///
    /// Returns `Ok(None)` when the device has not reported yet (return
    /// code `0106`). A frame whose `returnData` cannot be unwrapped maps
    /// to [`Error::Payload`], which the pipeline treats as transient.
    pub async fn poll(&mut self) -> Result<Option<RawFrame>, Error> {
        let url = self.client.api_url("rti/rtiResult")?;

        let body = json!({
            "workId": self.work_id,
            "deviceId": self.device_id,
        });

        let result: MonitorPollResult = self.client.post(url, &body).await?;

        match result.return_code.as_str() {
            RC_NO_DATA => {
                trace!(device_id = %self.device_id, "no data yet");
                Ok(None)
            }
            RC_OK => {
                let encoded = result.return_data.ok_or_else(|| Error::Payload {
                    message: "monitor result carries no returnData".into(),
                })?;
                let payload = BASE64.decode(encoded.as_bytes()).map_err(|e| Error::Payload {
                    message: format!("returnData is not valid base64: {e}"),
                })?;
                trace!(device_id = %self.device_id, bytes = payload.len(), "frame received");
                Ok(Some(RawFrame {
                    payload,
                    received_at: Utc::now(),
                }))
            }
            code => Err(Error::Monitor {
                message: format!("monitor poll failed (return code {code})"),
            }),
        }
    }

    /// Stop the monitor session.
    ///
    /// `POST /v1/rti/rtiMon` with `cmdOpt: "Stop"`. Consumes the handle.
    pub async fn close(self) -> Result<(), Error> {
        let url = self.client.api_url("rti/rtiMon")?;
        debug!(device_id = %self.device_id, work_id = %self.work_id, "closing monitor session");

        let body = json!({
            "cmd": "Mon",
            "cmdOpt": "Stop",
            "deviceId": self.device_id,
            "workId": self.work_id,
        });

        let _: serde_json::Value = self.client.post(url, &body).await?;
        debug!("monitor session closed");
        Ok(())
    }
}
