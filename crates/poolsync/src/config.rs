//! CLI-aware wrappers over `poolsync_config`: global flag overrides on
//! top of the stored profile, and the connect step shared by every
//! device command.

use poolsync_config::{
    Config, Profile, profile_to_client_config, profile_to_coordinator_config, resolve_credential,
};
use poolsync_core::{ClientConfig, CoordinatorConfig, Credential, SyncCoordinator};

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use poolsync_config::{config_path, load_config, load_config_or_default, save_config};

/// Everything needed to talk to one paired hub.
pub struct Target {
    pub profile: String,
    pub client: ClientConfig,
    pub coordinator: CoordinatorConfig,
    pub credential: Credential,
}

/// Profile named by `--profile`, else the config default.
pub fn active_profile_name(global: &GlobalOpts, cfg: &Config) -> String {
    cfg.profile_name(global.profile.as_deref())
}

/// Resolve the active profile with CLI flag overrides applied.
pub fn resolve_target(global: &GlobalOpts) -> Result<Target, CliError> {
    let cfg = load_config_or_default();
    let name = active_profile_name(global, &cfg);

    let Some(stored) = cfg.profiles.get(&name) else {
        if cfg.profiles.is_empty() {
            return Err(CliError::NoCredentials { profile: name });
        }
        let mut available: Vec<&str> = cfg.profiles.keys().map(String::as_str).collect();
        available.sort_unstable();
        return Err(CliError::ProfileNotFound {
            name,
            available: available.join(", "),
        });
    };

    let profile = apply_overrides(stored.clone(), global);
    let client = profile_to_client_config(&profile, &cfg.defaults);
    let coordinator = profile_to_coordinator_config(&profile, &cfg.defaults)?;
    let credential =
        resolve_credential(&profile, &name).map_err(|e| CliError::from(e).for_profile(&name))?;

    Ok(Target {
        profile: name,
        client,
        coordinator,
        credential,
    })
}

fn apply_overrides(mut profile: Profile, global: &GlobalOpts) -> Profile {
    if let Some(ref address) = global.address {
        profile.address.clone_from(address);
    }
    if global.timeout.is_some() {
        profile.timeout = global.timeout;
    }
    if global.units.is_some() {
        profile.units = global.units;
    }
    profile
}

/// Build the client and wait for the first snapshot.
pub async fn connect(target: Target) -> Result<SyncCoordinator, CliError> {
    let Target {
        profile,
        client,
        coordinator,
        credential,
    } = target;

    let client = client.build_client()?;
    tracing::debug!(address = client.address(), %profile, "connecting");
    SyncCoordinator::connect(client, credential, coordinator)
        .await
        .map_err(|e| CliError::from(e).for_profile(&profile))
}
