//! Shared configuration for the onuctl CLI.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! engine tuning overrides, and translation to
//! `onuctl_core::DeviceConfig`. The CLI layers its flags on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use onuctl_core::{DeviceConfig, EngineTuning};

/// Keyring service under which profile passwords are stored.
pub const KEYRING_SERVICE: &str = "onuctl";

/// Environment variable consulted for the device password.
pub const PASSWORD_ENV: &str = "ONUCTL_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no password configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{profile}' not found")]
    UnknownProfile { profile: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

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
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Default profile name.
    pub default_profile: Option<String>,

    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named OLT profiles.
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

impl Config {
    /// Profile name selected by `requested`, else the configured default.
    pub fn profile_name(&self, requested: Option<&str>) -> String {
        requested
            .map(String::from)
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

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    /// Status ledger CSV, shared by every run.
    #[serde(default = "default_ledger")]
    pub ledger: PathBuf,

    /// Raw device output transcript; disabled when unset.
    #[serde(default)]
    pub transcript: Option<PathBuf>,

    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Ports provisioned concurrently by `run` with several files.
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            ledger: default_ledger(),
            transcript: None,
            output: default_output(),
            color: default_color(),
            pool_size: default_pool_size(),
        }
    }
}

fn default_ledger() -> PathBuf {
    PathBuf::from("onu_status.csv")
}
fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_pool_size() -> usize {
    4
}

/// A named OLT profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// OLT management address.
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_username")]
    pub username: String,

    /// Plaintext password. Keyring and `password_env` take precedence.
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// Prefix of the device VLAN profile names, e.g. "PPPOE-".
    #[serde(default)]
    pub vlan_prefix: String,

    /// ONU type declared at registration.
    #[serde(default = "default_onu_type")]
    pub onu_type: String,

    /// Configuration workers; automatic when unset.
    pub config_workers: Option<usize>,

    /// Persist with `write` on every buffer flush.
    #[serde(default)]
    pub auto_write: bool,

    /// SSH connect timeout in seconds.
    pub connect_timeout: Option<u64>,

    /// Engine timing overrides.
    #[serde(default)]
    pub tuning: TuningOverrides,
}

impl Default for Profile {
    fn default() -> Self {
        Self {
            host: "192.168.1.1".into(),
            port: default_port(),
            username: default_username(),
            password: None,
            password_env: None,
            vlan_prefix: String::new(),
            onu_type: default_onu_type(),
            config_workers: None,
            auto_write: false,
            connect_timeout: None,
            tuning: TuningOverrides::default(),
        }
    }
}

fn default_port() -> u16 {
    22
}
fn default_username() -> String {
    "admin".into()
}
fn default_onu_type() -> String {
    "ALL".into()
}

/// Optional per-profile engine tuning. Unset fields keep engine defaults.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TuningOverrides {
    pub batch_size: Option<usize>,
    pub batch_delay_secs: Option<u64>,
    pub flush_every: Option<usize>,
    pub reconnect_pause_secs: Option<u64>,
    pub commit_timeout_secs: Option<u64>,
    pub poll_interval_secs: Option<u64>,
    pub extended_wait_secs: Option<u64>,
    pub query_window_secs: Option<u64>,
    pub worker_stagger_secs: Option<u64>,
    pub single_worker_limit: Option<usize>,
    pub send_delay_ms: Option<u64>,
    pub read_window_ms: Option<u64>,
    pub quiet_ms: Option<u64>,
}

impl TuningOverrides {
    /// Engine tuning with these overrides applied over the defaults.
    pub fn to_tuning(&self) -> Result<EngineTuning, ConfigError> {
        let mut tuning = EngineTuning::default();
        let secs = Duration::from_secs;
        let millis = Duration::from_millis;

        if let Some(size) = self.batch_size {
            if size == 0 {
                return Err(ConfigError::Validation {
                    field: "tuning.batch_size".into(),
                    reason: "must be at least 1".into(),
                });
            }
            tuning.registration.batch_size = size;
        }
        if let Some(n) = self.flush_every {
            if n == 0 {
                return Err(ConfigError::Validation {
                    field: "tuning.flush_every".into(),
                    reason: "must be at least 1".into(),
                });
            }
            tuning.registration.flush_every = n;
        }
        if let Some(v) = self.batch_delay_secs {
            tuning.registration.batch_delay = secs(v);
        }
        if let Some(v) = self.reconnect_pause_secs {
            tuning.registration.reconnect_pause = secs(v);
        }
        if let Some(v) = self.commit_timeout_secs {
            tuning.commit.timeout = secs(v);
        }
        if let Some(v) = self.poll_interval_secs {
            tuning.commit.poll_interval = secs(v);
        }
        if let Some(v) = self.extended_wait_secs {
            tuning.commit.extended_wait = secs(v);
        }
        if let Some(v) = self.query_window_secs {
            tuning.commit.query_window = secs(v);
        }
        if let Some(v) = self.worker_stagger_secs {
            tuning.configuration.worker_stagger = secs(v);
        }
        if let Some(v) = self.single_worker_limit {
            tuning.configuration.single_worker_limit = v;
        }
        if let Some(v) = self.send_delay_ms {
            tuning.read.send_delay = millis(v);
        }
        if let Some(v) = self.read_window_ms {
            tuning.read.read_window = millis(v);
        }
        if let Some(v) = self.quiet_ms {
            tuning.read.quiet = millis(v);
        }
        Ok(tuning)
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "onuctl", "onuctl").map_or_else(
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
    p.push("onuctl");
    p
}

// ── Config loading ──────────────────────────────────────────────────

fn figment_for(path: &Path) -> Figment {
    Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("ONUCTL_").split("__"))
}

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file path, still layering the environment.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let config: Config = figment_for(path).extract()?;
    Ok(config)
}

/// Load config, returning a default if loading fails.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

fn keyring_entry(profile_name: &str) -> Result<keyring::Entry, ConfigError> {
    Ok(keyring::Entry::new(
        KEYRING_SERVICE,
        &format!("{profile_name}/password"),
    )?)
}

/// Resolve the device password without CLI flags.
///
/// Order: the profile's `password_env` variable, `ONUCTL_PASSWORD`, the
/// system keyring, then plaintext in the config.
pub fn resolve_password(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. Global env var
    if let Ok(val) = std::env::var(PASSWORD_ENV) {
        return Ok(SecretString::from(val));
    }

    // 3. System keyring
    if let Ok(entry) = keyring_entry(profile_name) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 4. Plaintext in config
    if let Some(ref pw) = profile.password {
        return Ok(SecretString::from(pw.clone()));
    }

    Err(ConfigError::NoCredentials {
        profile: profile_name.into(),
    })
}

/// Store a profile password in the system keyring.
pub fn store_password(profile_name: &str, password: &str) -> Result<(), ConfigError> {
    keyring_entry(profile_name)?.set_password(password)?;
    Ok(())
}

/// Build a `DeviceConfig` from a profile alone, without CLI flag overrides.
pub fn profile_to_device_config(
    profile: &Profile,
    profile_name: &str,
) -> Result<DeviceConfig, ConfigError> {
    if profile.host.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: "must not be empty".into(),
        });
    }
    if profile.config_workers == Some(0) {
        return Err(ConfigError::Validation {
            field: "config_workers".into(),
            reason: "must be at least 1".into(),
        });
    }

    let password = resolve_password(profile, profile_name)?;
    let defaults = DeviceConfig::default();

    Ok(DeviceConfig {
        host: profile.host.clone(),
        port: profile.port,
        username: profile.username.clone(),
        password,
        vlan_prefix: profile.vlan_prefix.clone(),
        onu_type: profile.onu_type.clone(),
        config_workers: profile.config_workers,
        auto_write: profile.auto_write,
        connect_timeout: profile
            .connect_timeout
            .map_or(defaults.connect_timeout, Duration::from_secs),
    })
}
