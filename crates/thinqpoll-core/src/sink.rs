// Metrics sink seam
//
// The single outward boundary of the pipeline: one finished measurement
// handed to whatever backend the binary wires in. Keeping this a trait
// lets the pipeline be exercised in tests without a metrics database.

use std::collections::BTreeMap;
use std::future::Future;

use serde::Serialize;
use thiserror::Error;

use crate::decode::FieldValue;

/// One finished measurement record: identity tags plus the normalized
/// field set from a successful decode+normalize pass.
#[derive(Debug, Serialize)]
pub struct Measurement {
    pub name: String,
    pub tags: BTreeMap<String, String>,
    pub fields: BTreeMap<String, FieldValue>,
}

/// The sink rejected or failed to store the measurement. Fatal to the
/// run -- re-running is the scheduler's responsibility.
#[derive(Debug, Error)]
#[error("{message}")]
pub struct SinkError {
    pub message: String,
}

impl From<SinkError> for crate::error::CoreError {
    fn from(err: SinkError) -> Self {
        Self::SinkWrite {
            message: err.message,
        }
    }
}

/// Destination for finished measurements.
pub trait MetricsSink {
    /// Write one measurement point.
    fn write_point(
        &self,
        point: &Measurement,
    ) -> impl Future<Output = Result<(), SinkError>> + Send;
}
