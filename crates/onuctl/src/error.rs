//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use onuctl_config::ConfigError;
use onuctl_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
#[allow(unused_assignments)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach the OLT at {target}")]
    #[diagnostic(
        code(onuctl::connection_failed),
        help(
            "Check that the OLT management address is reachable over SSH.\n\
             Target: {target}\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { target: String, reason: String },

    #[error("Timed out connecting to {target} after {seconds}s")]
    #[diagnostic(
        code(onuctl::timeout),
        help("Raise connect_timeout in the profile or check the OLT's SSH service.")
    )]
    Timeout { target: String, seconds: u64 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed on {target} as '{username}'")]
    #[diagnostic(
        code(onuctl::auth_failed),
        help(
            "Verify the username and password for this OLT.\n\
             Run: onuctl config set-password --profile {profile}"
        )
    )]
    AuthFailed {
        target: String,
        username: String,
        profile: String,
    },

    #[error("No password configured for profile '{profile}'")]
    #[diagnostic(
        code(onuctl::no_credentials),
        help(
            "Store one with: onuctl config set-password --profile {profile}\n\
             Or set the ONUCTL_PASSWORD environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Input ────────────────────────────────────────────────────────
    #[error("Work order {path} not found")]
    #[diagnostic(code(onuctl::not_found), help("Check the CSV path and try again."))]
    FileNotFound { path: String },

    #[error("Invalid work order {path}: {reason}")]
    #[diagnostic(
        code(onuctl::invalid_work_order),
        help(
            "Expected columns: interface, onu_id, sn, name, description, profile, \
             username, password, vlan_inet, vlan_hotspot, wifi_ssid.\n\
             Each file must target exactly one port."
        )
    )]
    InvalidWorkOrder { path: String, reason: String },

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(onuctl::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(onuctl::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: onuctl config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No OLT configured")]
    #[diagnostic(
        code(onuctl::no_config),
        help(
            "Create a profile with: onuctl config init\n\
             Or pass --host. Config expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(onuctl::config))]
    Config(ConfigError),

    // ── Provisioning ─────────────────────────────────────────────────
    #[error("Provisioning failed: {0}")]
    #[diagnostic(
        code(onuctl::provisioning),
        help("Completed units are kept in the ledger; re-run the same work order to resume.")
    )]
    Provisioning(CoreError),

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::FileNotFound { .. } | Self::ProfileNotFound { .. } | Self::NoConfig { .. } => {
                exit_code::NOT_FOUND
            }
            Self::InvalidWorkOrder { .. } | Self::Validation { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Attach the active profile to an authentication failure.
    pub fn with_profile(self, name: &str) -> Self {
        match self {
            Self::AuthFailed {
                target, username, ..
            } => Self::AuthFailed {
                target,
                username,
                profile: name.to_owned(),
            },
            other => other,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::Connect { target, reason } => Self::ConnectionFailed { target, reason },
            CoreError::Timeout {
                target,
                timeout_secs,
            } => Self::Timeout {
                target,
                seconds: timeout_secs,
            },
            CoreError::AuthenticationFailed { target, username } => Self::AuthFailed {
                target,
                username,
                profile: "default".into(),
            },
            CoreError::ConnectionLost { reason } => Self::ConnectionFailed {
                target: "(session)".into(),
                reason,
            },
            e @ CoreError::Drop { .. } => Self::ConnectionFailed {
                target: "(session)".into(),
                reason: e.to_string(),
            },
            e if e.is_input_error() => Self::InvalidWorkOrder {
                path: "(work order)".into(),
                reason: e.to_string(),
            },
            other => Self::Provisioning(other),
        }
    }
}

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => Self::NoCredentials { profile },
            ConfigError::Validation { field, reason } => Self::Validation { field, reason },
            other => Self::Config(other),
        }
    }
}
