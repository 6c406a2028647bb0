//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError`, `PairingFailure`, and `ConfigError` into user-facing
//! errors with actionable help text and distinct exit codes.

use miette::Diagnostic;
use thiserror::Error;

use poolsync_config::ConfigError;
use poolsync_core::{CoreError, PairingFailure};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const PAIRING: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
#[allow(unused_assignments)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the PoolSync hub: {reason}")]
    #[diagnostic(
        code(poolsync::connection_failed),
        help(
            "Check that the hub is powered and on the same network.\n\
             Override the address with --address if it changed."
        )
    )]
    ConnectionFailed { reason: String },

    #[error("Hub did not answer within {seconds}s")]
    #[diagnostic(
        code(poolsync::timeout),
        help("Increase the timeout with --timeout or check the hub's Wi-Fi signal.")
    )]
    Timeout { seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────

    #[error("The hub rejected the stored credential")]
    #[diagnostic(
        code(poolsync::auth_failed),
        help(
            "The hub was reset or paired elsewhere. Pair again with:\n\
             poolsync pair <address> --profile {profile}"
        )
    )]
    AuthFailed { profile: String },

    #[error("No credentials stored for profile '{profile}'")]
    #[diagnostic(
        code(poolsync::no_credentials),
        help("Pair first with: poolsync pair <address> --profile {profile}")
    )]
    NoCredentials { profile: String },

    // ── Pairing ──────────────────────────────────────────────────────

    #[error("Pairing failed: {reason}")]
    #[diagnostic(
        code(poolsync::pairing_failed),
        help(
            "Run the command, then press the button on the hub within the\n\
             link window. The hub must be reachable throughout."
        )
    )]
    PairingFailed { reason: String },

    // ── Data ─────────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(code(poolsync::not_found), help("{hint}"))]
    NotFound {
        resource_type: String,
        identifier: String,
        hint: String,
    },

    #[error("Unexpected response from the hub: {message}")]
    #[diagnostic(
        code(poolsync::protocol),
        help("The hub firmware may be newer than this tool understands. Run with -vv for details.")
    )]
    Protocol { message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(poolsync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(poolsync::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: poolsync pair <address> --profile {name}"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error(transparent)]
    #[diagnostic(code(poolsync::config))]
    Config(Box<ConfigError>),

    // ── IO / Serialization ────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Failed to render JSON: {0}")]
    #[diagnostic(code(poolsync::json))]
    Json(#[from] serde_json::Error),

    #[error("Failed to render YAML: {0}")]
    #[diagnostic(code(poolsync::yaml))]
    Yaml(#[from] serde_yaml::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::PairingFailed { .. } => exit_code::PAIRING,
            Self::NotFound { .. } | Self::ProfileNotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the active profile name to credential errors.
    pub fn for_profile(self, profile: &str) -> Self {
        match self {
            Self::AuthFailed { .. } => Self::AuthFailed {
                profile: profile.to_owned(),
            },
            Self::NoCredentials { .. } => Self::NoCredentials {
                profile: profile.to_owned(),
            },
            other => other,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed { reason },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::AuthenticationFailed { .. } | CoreError::NeedsRepairing => {
                CliError::AuthFailed {
                    profile: "default".into(),
                }
            }

            CoreError::NotPaired => CliError::NoCredentials {
                profile: "default".into(),
            },

            CoreError::Protocol { message, .. } => CliError::Protocol { message },

            CoreError::UnknownField { key } => CliError::NotFound {
                resource_type: "field".into(),
                identifier: key,
                hint: "Run: poolsync status --all to see every field".into(),
            },

            CoreError::DeviceNotFound { kind } => CliError::NotFound {
                resource_type: "equipment".into(),
                identifier: kind,
                hint: "Run: poolsync get deviceType to see what the hub reports".into(),
            },

            CoreError::NoData => CliError::Protocol {
                message: "no data received from the hub".into(),
            },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::PairingFailed { message } => CliError::PairingFailed { reason: message },

            CoreError::Stopped => CliError::Protocol {
                message: "polling stopped".into(),
            },

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

impl From<PairingFailure> for CliError {
    fn from(failure: PairingFailure) -> Self {
        CliError::PairingFailed {
            reason: failure.to_string(),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(Box::new(other)),
        }
    }
}
