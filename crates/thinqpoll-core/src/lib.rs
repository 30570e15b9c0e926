//! Poll → decode → normalize pipeline for appliance telemetry.
//!
//! One run resolves a device and its model catalog, opens a monitor
//! session, polls for raw status frames, decodes and normalizes them
//! into a final field set, and guarantees the session is closed on
//! every exit path. The finished measurement goes to a [`MetricsSink`].

pub mod decode;
pub mod error;
pub mod normalize;
pub mod pipeline;
pub mod sink;

pub use decode::{DecodedFrame, FieldValue, decode_frame};
pub use error::CoreError;
pub use normalize::{FieldAccumulator, normalize_into};
pub use pipeline::{PollPolicy, StatusSnapshot, collect};
pub use sink::{Measurement, MetricsSink, SinkError};
