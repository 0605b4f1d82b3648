// ── Core error types ──
//
// Provisioning errors from onuctl-core. Consumers never see SSH protocol
// errors directly: the `From<onuctl_shell::Error>` impl folds transport
// failures into "could not connect" and "connection lost".

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Session errors ───────────────────────────────────────────────
    #[error("Cannot open a session to {target}: {reason}")]
    Connect { target: String, reason: String },

    #[error("Authentication failed on {target} as '{username}'")]
    AuthenticationFailed { target: String, username: String },

    #[error("Timed out connecting to {target} after {timeout_secs}s")]
    Timeout { target: String, timeout_secs: u64 },

    #[error("Connection lost: {reason}")]
    ConnectionLost { reason: String },

    // ── Provisioning outcomes ────────────────────────────────────────
    #[error("Shell dropped during register batch {batch} on {interface}: {reason}")]
    Drop {
        interface: String,
        batch: usize,
        reason: String,
    },

    #[error("Error during config: {detail}")]
    Command {
        interface: String,
        onu_id: String,
        detail: String,
    },

    #[error("{} ONU(s) never appeared on {interface}: {}", .missing.len(), .missing.join(", "))]
    CommitTimeout {
        interface: String,
        missing: Vec<String>,
    },

    // ── Work order errors ────────────────────────────────────────────
    #[error("Invalid work order row {line}: {reason}")]
    InvalidRow { line: usize, reason: String },

    #[error("Work order contains no rows")]
    EmptyWorkOrder,

    #[error("Work order must target exactly one port, found {}: {}", .ports.len(), .ports.join(", "))]
    MultiplePorts { ports: Vec<String> },

    #[error("Duplicate ONU {key} in work order")]
    DuplicateKey { key: String },

    #[error("Port {interface} appears in more than one work order")]
    DuplicatePort { interface: String },

    #[error("Cannot read work order: {0}")]
    Csv(#[from] csv::Error),

    // ── Persistence errors ───────────────────────────────────────────
    #[error("Status ledger {path}: {message}")]
    Ledger { path: String, message: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Returns `true` if the session could not be established at all.
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::AuthenticationFailed { .. } | Self::Timeout { .. }
        )
    }

    /// Returns `true` if the error comes from the work order itself and
    /// retrying without editing the input cannot help.
    pub fn is_input_error(&self) -> bool {
        matches!(
            self,
            Self::InvalidRow { .. }
                | Self::EmptyWorkOrder
                | Self::MultiplePorts { .. }
                | Self::DuplicateKey { .. }
                | Self::DuplicatePort { .. }
                | Self::Csv(_)
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<onuctl_shell::Error> for CoreError {
    fn from(err: onuctl_shell::Error) -> Self {
        match err {
            onuctl_shell::Error::Connect { target, reason } => CoreError::Connect { target, reason },
            onuctl_shell::Error::Authentication { target, username } => {
                CoreError::AuthenticationFailed { target, username }
            }
            onuctl_shell::Error::Timeout {
                target,
                timeout_secs,
            } => CoreError::Timeout {
                target,
                timeout_secs,
            },
            e @ (onuctl_shell::Error::Ssh(_)
            | onuctl_shell::Error::ChannelClosed
            | onuctl_shell::Error::NotConnected
            | onuctl_shell::Error::Io(_)) => CoreError::ConnectionLost {
                reason: e.to_string(),
            },
        }
    }
}
