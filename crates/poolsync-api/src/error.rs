use thiserror::Error;

/// How a failed request should be treated by callers.
///
/// Retry policy lives with the caller, so every [`Error`] collapses into
/// one of these three buckets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Network unreachable, timeout, connection reset. Worth retrying later.
    Communication,
    /// The device rejected the credential. Fatal for that credential.
    Auth,
    /// The device answered with something we could not interpret.
    Protocol,
}

/// Top-level error type for the `poolsync-api` crate.
///
/// Never carries secret material: auth failures record the HTTP status
/// and a message, not the rejected header value.
#[derive(Debug, Clone, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// Connection refused, DNS failure, reset mid-response, etc.
    #[error("Cannot reach PoolSync device: {message}")]
    Communication { message: String },

    /// The request-level timeout elapsed.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The HTTP client could not be built.
    #[error("HTTP client error: {0}")]
    Client(String),

    // ── Authentication ──────────────────────────────────────────────
    /// HTTP 401/403, or a snapshot fetch attempted without a secret.
    #[error("Authentication failed: {message}")]
    Authentication { status: Option<u16>, message: String },

    // ── Protocol ────────────────────────────────────────────────────
    /// Non-success status, undecodable JSON, or a response missing
    /// mandatory sections. `body` holds a preview for debugging.
    #[error("Protocol error: {message}")]
    Protocol {
        message: String,
        status: Option<u16>,
        body: Option<String>,
    },
}

impl Error {
    /// Classify this error for retry decisions.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Communication { .. } | Self::Timeout { .. } | Self::InvalidUrl(_) | Self::Client(_) => {
                ErrorKind::Communication
            }
            Self::Authentication { .. } => ErrorKind::Auth,
            Self::Protocol { .. } => ErrorKind::Protocol,
        }
    }

    /// Returns `true` if the device rejected the credential.
    pub fn is_auth(&self) -> bool {
        self.kind() == ErrorKind::Auth
    }

    /// Returns `true` if this is a transient error worth retrying.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Communication { .. } | Self::Timeout { .. })
    }

    /// HTTP status attached to the error, if the device answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Authentication { status, .. } | Self::Protocol { status, .. } => *status,
            _ => None,
        }
    }

    pub(crate) fn from_reqwest(err: &reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            Self::Timeout { timeout_secs }
        } else {
            Self::Communication {
                message: err.to_string(),
            }
        }
    }

    pub(crate) fn protocol(message: impl Into<String>, status: Option<u16>, body: Option<&str>) -> Self {
        Self::Protocol {
            message: message.into(),
            status,
            body: body.map(|b| preview(b).to_owned()),
        }
    }
}

/// First 200 bytes of a body, cut on a char boundary.
pub(crate) fn preview(body: &str) -> &str {
    let mut end = body.len().min(200);
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}
