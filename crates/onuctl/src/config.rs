//! CLI configuration: thin wrapper around `onuctl_config` shared types.
//!
//! Re-exports the shared types and adds CLI-specific resolution that
//! respects `GlobalOpts` and `run` flag overrides.

use std::io::IsTerminal;
use std::path::PathBuf;

use onuctl_core::{DeviceConfig, EngineTuning, Ledger, Transcript};

use crate::cli::{GlobalOpts, RunArgs};
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use onuctl_config::{
    Config, ConfigError, Profile, config_path, load_config_or_default, save_config,
    store_password,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    config.profile_name(global.profile.as_deref())
}

/// Everything `run` needs to build an engine.
pub struct Resolved {
    pub profile_name: String,
    pub device: DeviceConfig,
    pub tuning: EngineTuning,
}

/// Translate the active profile + flags into device config and tuning.
///
/// Flag overrides take priority over profile values. Without a matching
/// profile, `--host` alone is enough to build one from defaults.
pub fn resolve_device(
    global: &GlobalOpts,
    config: &Config,
    args: &RunArgs,
) -> Result<Resolved, CliError> {
    let profile_name = active_profile_name(global, config);

    let mut profile = match (config.profiles.get(&profile_name), &global.host) {
        (Some(profile), _) => profile.clone(),
        (None, Some(host)) => Profile {
            host: host.clone(),
            ..Profile::default()
        },
        (None, None) if global.profile.is_some() => {
            let mut available: Vec<&str> = config.profiles.keys().map(String::as_str).collect();
            available.sort_unstable();
            return Err(CliError::ProfileNotFound {
                name: profile_name,
                available: if available.is_empty() {
                    "(none)".into()
                } else {
                    available.join(", ")
                },
            });
        }
        (None, None) => {
            return Err(CliError::NoConfig {
                path: config_path().display().to_string(),
            });
        }
    };

    // 1. Connection (flag > env > profile)
    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if let Some(port) = global.port {
        profile.port = port;
    }
    if let Some(ref username) = global.username {
        profile.username.clone_from(username);
    }

    // 2. Provisioning conventions
    if let Some(ref prefix) = args.vlan_prefix {
        profile.vlan_prefix.clone_from(prefix);
    }
    if let Some(ref onu_type) = args.onu_type {
        profile.onu_type.clone_from(onu_type);
    }
    if args.workers.is_some() {
        profile.config_workers = args.workers;
    }
    if args.auto_write {
        profile.auto_write = true;
    }

    // 3. Credentials, prompting on a terminal as a last resort
    let device = match onuctl_config::profile_to_device_config(&profile, &profile_name) {
        Ok(device) => device,
        Err(ConfigError::NoCredentials { .. }) if std::io::stdin().is_terminal() => {
            let prompt = format!("Password for {}@{}: ", profile.username, profile.host);
            profile.password = Some(rpassword::prompt_password(prompt)?);
            onuctl_config::profile_to_device_config(&profile, &profile_name)?
        }
        Err(e) => return Err(e.into()),
    };

    let tuning = profile.tuning.to_tuning()?;

    Ok(Resolved {
        profile_name,
        device,
        tuning,
    })
}

/// Status ledger at the flag path, else the configured default.
pub fn ledger(global: &GlobalOpts, config: &Config) -> Ledger {
    Ledger::new(ledger_path(global, config))
}

pub fn ledger_path(global: &GlobalOpts, config: &Config) -> PathBuf {
    global
        .ledger
        .clone()
        .unwrap_or_else(|| config.defaults.ledger.clone())
}

/// Transcript at the flag path, else the configured one, else disabled.
pub fn transcript(global: &GlobalOpts, config: &Config) -> Transcript {
    global
        .transcript
        .clone()
        .or_else(|| config.defaults.transcript.clone())
        .map_or_else(Transcript::disabled, Transcript::at)
}
