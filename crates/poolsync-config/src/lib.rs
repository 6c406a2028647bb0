//! Shared configuration for PoolSync tools.
//!
//! TOML device profiles, secret resolution (env + keyring + plaintext),
//! and translation to the runtime config types of `poolsync_core`. The
//! CLI layers its flag overrides on top of this.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use poolsync_core::config::{DEFAULT_REFRESH_INTERVAL, synthetic_identifier};
use poolsync_core::{ClientConfig, CoordinatorConfig, Credential, UnitSystem};

/// Keyring service name for stored device secrets.
pub const KEYRING_SERVICE: &str = "poolsync";
/// Prefix for environment overrides, e.g. `POOLSYNC_DEFAULTS__TIMEOUT=10`.
pub const ENV_PREFIX: &str = "POOLSYNC_";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{profile}'")]
    UnknownProfile { profile: String },

    #[error("no credentials stored for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named device profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Refresh interval in seconds.
    #[serde(default = "default_scan_interval")]
    pub scan_interval: u64,

    #[serde(default)]
    pub units: UnitSystem,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            scan_interval: default_scan_interval(),
            units: UnitSystem::default(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    30
}
fn default_scan_interval() -> u64 {
    DEFAULT_REFRESH_INTERVAL.as_secs()
}

/// A paired device.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// IP or host name of the hub.
    pub address: String,

    /// Hardware identifier reported during pairing.
    pub identifier: Option<String>,

    /// Override the refresh interval, in seconds.
    pub scan_interval: Option<u64>,

    /// Override the request timeout, in seconds.
    pub timeout: Option<u64>,

    pub units: Option<UnitSystem>,

    /// Device secret (plaintext, used when the keyring is unavailable).
    pub password: Option<String>,

    /// Environment variable holding the device secret.
    pub password_env: Option<String>,
}

impl Config {
    /// Name of the profile to use: `requested`, else the default.
    pub fn profile_name(&self, requested: Option<&str>) -> String {
        requested
            .map(str::to_owned)
            .or_else(|| self.default_profile.clone())
            .unwrap_or_else(|| "default".into())
    }

    pub fn profile(&self, name: &str) -> Result<&Profile, ConfigError> {
        self.profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile {
                profile: name.into(),
            })
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "poolsync", "poolsync").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("poolsync");
    p
}

// ── Loading and saving ──────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_from(&config_path())
}

/// Load config from `path` merged with `POOLSYNC_` environment variables.
/// A missing file yields the defaults.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed(ENV_PREFIX).split("__"))
        .extract()?;
    Ok(config)
}

/// Load config, returning a default if it can't be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Serialize config to TOML at the canonical path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_to(cfg, &config_path())
}

pub fn save_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_user(profile_name: &str) -> String {
    format!("{profile_name}/password")
}

/// Resolve the device secret: `password_env` → keyring → plaintext.
pub fn resolve_secret(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Environment variable named by the profile
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            if !val.is_empty() {
                return Ok(SecretString::from(val));
            }
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name)) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref pw) = profile.password {
        if !pw.is_empty() {
            return Ok(SecretString::from(pw.clone()));
        }
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Full credential for a profile. Profiles paired without a hardware
/// identifier fall back to the address-derived one.
pub fn resolve_credential(profile: &Profile, profile_name: &str) -> Result<Credential, ConfigError> {
    let secret = resolve_secret(profile, profile_name)?;
    let identifier = profile
        .identifier
        .clone()
        .unwrap_or_else(|| synthetic_identifier(&profile.address));
    Ok(Credential::new(secret, identifier))
}

/// Where `store_credential` put the secret.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SecretStorage {
    Keyring,
    Plaintext,
}

/// Record a freshly paired device under `profile_name`.
///
/// The identifier goes to the TOML profile; the secret goes to the
/// keyring, or into the profile as plaintext when no keyring is
/// available. The caller saves `cfg`.
pub fn store_credential(
    cfg: &mut Config,
    profile_name: &str,
    address: &str,
    credential: &Credential,
) -> SecretStorage {
    let stored = keyring::Entry::new(KEYRING_SERVICE, &keyring_user(profile_name))
        .and_then(|entry| entry.set_password(credential.secret().expose_secret()));

    match stored {
        Ok(()) => {
            debug!(profile = profile_name, "secret stored in keyring");
            record_profile(cfg, profile_name, address, credential, SecretStorage::Keyring);
            SecretStorage::Keyring
        }
        Err(e) => {
            warn!(profile = profile_name, error = %e, "keyring unavailable, storing secret in config file");
            record_profile(cfg, profile_name, address, credential, SecretStorage::Plaintext);
            SecretStorage::Plaintext
        }
    }
}

fn record_profile(
    cfg: &mut Config,
    profile_name: &str,
    address: &str,
    credential: &Credential,
    storage: SecretStorage,
) {
    let profile = cfg.profiles.entry(profile_name.to_owned()).or_default();
    profile.address = address.to_owned();
    profile.identifier = Some(credential.identifier().to_owned());
    profile.password = match storage {
        SecretStorage::Plaintext => Some(credential.secret().expose_secret().to_owned()),
        SecretStorage::Keyring => None,
    };
    // A default naming no stored profile is replaced by the one just paired.
    let dangling = cfg
        .default_profile
        .as_ref()
        .is_none_or(|name| !cfg.profiles.contains_key(name));
    if dangling {
        cfg.default_profile = Some(profile_name.to_owned());
    }
}

// ── Runtime config translation ──────────────────────────────────────

/// Connection settings for a profile.
pub fn profile_to_client_config(profile: &Profile, defaults: &Defaults) -> ClientConfig {
    ClientConfig {
        address: profile.address.clone(),
        timeout: Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout)),
    }
}

/// Polling settings for a profile, validated.
pub fn profile_to_coordinator_config(
    profile: &Profile,
    defaults: &Defaults,
) -> Result<CoordinatorConfig, ConfigError> {
    let interval = Duration::from_secs(profile.scan_interval.unwrap_or(defaults.scan_interval));
    let config = CoordinatorConfig {
        units: profile.units.unwrap_or(defaults.units),
        ..CoordinatorConfig::default().with_refresh_interval(interval)
    };
    config.validate().map_err(|e| ConfigError::Validation {
        field: "scan_interval".into(),
        reason: e.to_string(),
    })?;
    Ok(config)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use figment::Jail;
    use pretty_assertions::assert_eq;

    use super::*;

    const SAMPLE: &str = r#"
default_profile = "backyard"

[defaults]
timeout = 15
units = "imperial"

[profiles.backyard]
address = "192.168.1.50"
identifier = "AA:BB:CC:DD:EE:FF"
scan_interval = 60
password = "plain"
"#;

    // Loading reads the process environment, so every load runs inside a
    // Jail to stay isolated from the env-override test.

    #[test]
    fn missing_file_yields_defaults() {
        Jail::expect_with(|jail| {
            let cfg = load_from(&jail.directory().join("absent.toml")).unwrap();
            assert_eq!(cfg.default_profile.as_deref(), Some("default"));
            assert_eq!(cfg.defaults.timeout, 30);
            assert_eq!(cfg.defaults.scan_interval, 120);
            assert!(cfg.profiles.is_empty());
            Ok(())
        });
    }

    #[test]
    fn loads_profiles_from_toml() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", SAMPLE)?;

            let cfg = load_from(&jail.directory().join("config.toml")).unwrap();
            assert_eq!(cfg.profile_name(None), "backyard");
            assert_eq!(cfg.profile_name(Some("other")), "other");

            let profile = cfg.profile("backyard").unwrap();
            assert_eq!(profile.address, "192.168.1.50");
            assert_eq!(profile.scan_interval, Some(60));
            assert_eq!(cfg.defaults.units, UnitSystem::Imperial);
            assert!(matches!(
                cfg.profile("missing"),
                Err(ConfigError::UnknownProfile { .. })
            ));
            Ok(())
        });
    }

    #[test]
    fn environment_overrides_file() {
        Jail::expect_with(|jail| {
            jail.create_file("config.toml", SAMPLE)?;
            jail.set_env("POOLSYNC_DEFAULTS__TIMEOUT", "5");
            jail.set_env("POOLSYNC_DEFAULT_PROFILE", "pool");

            let cfg = load_from(&jail.directory().join("config.toml")).unwrap();
            assert_eq!(cfg.defaults.timeout, 5);
            assert_eq!(cfg.default_profile.as_deref(), Some("pool"));
            Ok(())
        });
    }

    #[test]
    fn password_env_takes_precedence_over_plaintext() {
        Jail::expect_with(|jail| {
            jail.set_env("POOLSYNC_TEST_SECRET_A1", "from-env");
            let profile = Profile {
                address: "10.0.0.7".into(),
                password: Some("plain".into()),
                password_env: Some("POOLSYNC_TEST_SECRET_A1".into()),
                ..Profile::default()
            };
            let secret = resolve_secret(&profile, "password-env-test-profile").unwrap();
            assert_eq!(secret.expose_secret(), "from-env");
            Ok(())
        });
    }

    #[test]
    fn credential_falls_back_to_synthetic_identifier() {
        let profile = Profile {
            address: "10.0.0.7".into(),
            password: Some("plain".into()),
            ..Profile::default()
        };
        let credential = resolve_credential(&profile, "synthetic-id-test-profile").unwrap();
        assert_eq!(credential.identifier(), "ip_10_0_0_7");
    }

    #[test]
    fn profile_without_secret_has_no_credentials() {
        let profile = Profile {
            address: "10.0.0.7".into(),
            ..Profile::default()
        };
        assert!(matches!(
            resolve_secret(&profile, "no-secret-test-profile"),
            Err(ConfigError::NoCredentials { .. })
        ));
    }

    #[test]
    fn record_profile_round_trips_through_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let credential = Credential::new(SecretString::from("s3cret".to_owned()), "AA:BB");

        let mut cfg = Config::default();
        record_profile(&mut cfg, "pool", "10.0.0.7", &credential, SecretStorage::Plaintext);
        save_to(&cfg, &path).unwrap();

        let mut loaded = None;
        Jail::expect_with(|_| {
            loaded = Some(load_from(&path).unwrap());
            Ok(())
        });
        let loaded = loaded.unwrap();
        let profile = loaded.profile("pool").unwrap();
        assert_eq!(profile.identifier.as_deref(), Some("AA:BB"));
        assert_eq!(profile.password.as_deref(), Some("s3cret"));

        let mut cfg = loaded;
        record_profile(&mut cfg, "pool", "10.0.0.8", &credential, SecretStorage::Keyring);
        let profile = cfg.profile("pool").unwrap();
        assert_eq!(profile.address, "10.0.0.8");
        assert_eq!(profile.password, None);
    }

    #[test]
    fn first_paired_profile_becomes_default() {
        let credential = Credential::new(SecretString::from("s3cret".to_owned()), "AA:BB");

        let mut cfg = Config::default();
        record_profile(&mut cfg, "spa", "10.0.0.9", &credential, SecretStorage::Keyring);
        assert_eq!(cfg.default_profile.as_deref(), Some("spa"));
        assert_eq!(cfg.profile_name(None), "spa");

        record_profile(&mut cfg, "pool", "10.0.0.7", &credential, SecretStorage::Keyring);
        assert_eq!(cfg.default_profile.as_deref(), Some("spa"));
    }

    #[test]
    fn coordinator_config_rejects_short_interval() {
        let defaults = Defaults::default();
        let mut profile = Profile {
            address: "10.0.0.7".into(),
            scan_interval: Some(5),
            ..Profile::default()
        };
        assert!(matches!(
            profile_to_coordinator_config(&profile, &defaults),
            Err(ConfigError::Validation { .. })
        ));

        profile.scan_interval = None;
        profile.units = Some(UnitSystem::Imperial);
        let config = profile_to_coordinator_config(&profile, &defaults).unwrap();
        assert_eq!(config.refresh_interval, Duration::from_secs(120));
        assert_eq!(config.units, UnitSystem::Imperial);

        let client = profile_to_client_config(&profile, &defaults);
        assert_eq!(client.timeout, Duration::from_secs(30));
    }
}
