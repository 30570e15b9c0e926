// thinqpoll-api: Async Rust client for the ThinQ appliance cloud API

pub mod auth;
pub mod client;
pub mod devices;
pub mod error;
pub mod models;
pub mod monitor;
pub mod transport;

pub use client::ThinqClient;
pub use error::Error;
pub use models::{DeviceDescriptor, ModelCatalog, ValueDescriptor};
pub use monitor::{Monitor, RawFrame};
pub use transport::{TlsMode, TransportConfig};
