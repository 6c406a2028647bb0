// ── Core error types ──
//
// User-facing errors from poolsync-core. Consumers see domain failures
// (unreachable device, rejected credential, incompatible firmware), not
// HTTP plumbing. The `From<poolsync_api::Error>` impl does the translation.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Clone, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach PoolSync device: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Device did not answer within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    #[error("Credential rejected by the device; pair again to continue")]
    NeedsRepairing,

    #[error("No credential configured; run pairing first")]
    NotPaired,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Device answered with unexpected data: {message}")]
    Protocol { message: String, status: Option<u16> },

    #[error("Unknown field: {key}")]
    UnknownField { key: String },

    #[error("Sub-device not present in snapshot: {kind}")]
    DeviceNotFound { kind: String },

    #[error("No snapshot available yet")]
    NoData,

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    #[error("Pairing failed: {message}")]
    PairingFailed { message: String },

    #[error("Coordinator has been shut down")]
    Stopped,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Returns `true` when the stored credential must be replaced.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed { .. } | Self::NeedsRepairing | Self::NotPaired
        )
    }

    /// Returns `true` for failures that may clear up on the next attempt.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::ConnectionFailed { .. } | Self::Timeout { .. })
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<poolsync_api::Error> for CoreError {
    fn from(err: poolsync_api::Error) -> Self {
        match err {
            poolsync_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            poolsync_api::Error::Authentication { message, .. } => {
                CoreError::AuthenticationFailed { message }
            }
            poolsync_api::Error::Protocol { message, status, .. } => {
                CoreError::Protocol { message, status }
            }
            poolsync_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid device address: {e}"),
            },
            poolsync_api::Error::Client(message) => CoreError::Config { message },
            poolsync_api::Error::Communication { message } => {
                CoreError::ConnectionFailed { reason: message }
            }
        }
    }
}
