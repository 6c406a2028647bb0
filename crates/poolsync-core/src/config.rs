// ── Runtime configuration ──
//
// These types describe how to talk to one PoolSync device and how often.
// They never touch disk: the binary (or any other host) reads its own
// settings and hands these in.

use std::time::Duration;

use poolsync_api::{DeviceClient, TransportConfig};

use crate::catalog::UnitSystem;
use crate::error::CoreError;

/// Default periodic refresh interval.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(120);
/// Shortest refresh interval accepted by validation.
pub const MIN_REFRESH_INTERVAL: Duration = Duration::from_secs(10);
/// Upper bound for the widened interval during communication failures.
pub const MAX_BACKOFF_INTERVAL: Duration = Duration::from_secs(600);

/// Connection settings for one device.
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// IP or host name, optionally with a port.
    pub address: String,
    /// Per-request timeout.
    pub timeout: Duration,
}

impl ClientConfig {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            timeout: poolsync_api::transport::DEFAULT_TIMEOUT,
        }
    }

    /// Build the HTTP client for this device.
    pub fn build_client(&self) -> Result<DeviceClient, CoreError> {
        if self.address.trim().is_empty() {
            return Err(CoreError::Config {
                message: "device address is empty".into(),
            });
        }
        let transport = TransportConfig::default().with_timeout(self.timeout);
        Ok(DeviceClient::new(&self.address, &transport)?)
    }
}

/// Timing for the push-link handshake.
#[derive(Debug, Clone)]
pub struct PairingConfig {
    /// Delay between status polls.
    pub check_interval: Duration,
    /// Overall window before giving up.
    pub timeout: Duration,
    /// Consecutive communication failures tolerated while polling.
    pub max_communication_failures: u32,
}

impl Default for PairingConfig {
    fn default() -> Self {
        Self {
            check_interval: Duration::from_secs(5),
            timeout: Duration::from_secs(120),
            max_communication_failures: 3,
        }
    }
}

/// Polling cadence for the sync coordinator.
#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Steady-state refresh interval.
    pub refresh_interval: Duration,
    /// Factor applied per consecutive communication failure.
    pub backoff_multiplier: u32,
    /// Cap for the widened interval.
    pub max_interval: Duration,
    /// Temperature scale the device reports in.
    pub units: UnitSystem,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            refresh_interval: DEFAULT_REFRESH_INTERVAL,
            backoff_multiplier: 2,
            max_interval: MAX_BACKOFF_INTERVAL,
            units: UnitSystem::default(),
        }
    }
}

impl CoordinatorConfig {
    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn validate(&self) -> Result<(), CoreError> {
        if self.refresh_interval < MIN_REFRESH_INTERVAL {
            return Err(CoreError::ValidationFailed {
                message: format!(
                    "refresh interval must be at least {}s (got {}s)",
                    MIN_REFRESH_INTERVAL.as_secs(),
                    self.refresh_interval.as_secs()
                ),
            });
        }
        if self.backoff_multiplier == 0 {
            return Err(CoreError::ValidationFailed {
                message: "backoff multiplier must be at least 1".into(),
            });
        }
        if self.max_interval < self.refresh_interval {
            return Err(CoreError::ValidationFailed {
                message: "maximum interval is shorter than the refresh interval".into(),
            });
        }
        Ok(())
    }

    /// Delay before the next periodic refresh given the current
    /// communication-failure streak.
    pub fn next_delay(&self, failure_streak: u32) -> Duration {
        let mut delay = self.refresh_interval;
        for _ in 0..failure_streak {
            delay = delay.saturating_mul(self.backoff_multiplier);
            if delay >= self.max_interval {
                return self.max_interval;
            }
        }
        delay
    }
}

/// Stand-in identifier for a device that did not report its hardware
/// address: `ip_` followed by the address with dots replaced.
pub fn synthetic_identifier(address: &str) -> String {
    format!("ip_{}", address.trim().replace(['.', ':'], "_"))
}
