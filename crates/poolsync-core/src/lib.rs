// poolsync-core: Pairing, synchronization, and snapshot interpretation
// between poolsync-api and consumers (CLI or any other host).

pub mod catalog;
pub mod config;
pub mod coordinator;
pub mod decode;
pub mod device;
pub mod diagnostics;
pub mod error;
pub mod pairing;
pub mod path;
pub mod registry;
pub mod snapshot;

// ── Primary re-exports ──────────────────────────────────────────────
pub use catalog::{FieldReading, FieldSpec, FieldValue, Scope, Unit, UnitSystem, WritableField};
pub use config::{ClientConfig, CoordinatorConfig, PairingConfig};
pub use coordinator::{PollResult, SyncCoordinator, SyncEvent, SyncStatus};
pub use decode::{HeatMode, RunAction};
pub use device::DeviceApi;
pub use error::CoreError;
pub use pairing::{Pairing, PairingFailure, PairingHandle, PairingOutcome, PairingSession, PairingState};
pub use path::{FieldPath, PathSegment, resolve};
pub use registry::DeviceRegistry;
pub use snapshot::{DeviceInfo, DeviceKind, Snapshot};

// Transport types consumers need alongside the core API.
pub use poolsync_api::{Credential, DeviceClient, ErrorKind};
