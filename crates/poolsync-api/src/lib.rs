// poolsync-api: Async Rust client for the PoolSync local HTTP API

pub mod client;
pub mod error;
pub mod transport;
pub mod types;

pub use client::DeviceClient;
pub use error::{Error, ErrorKind};
pub use transport::TransportConfig;
pub use types::{Credential, PairingStatus};
