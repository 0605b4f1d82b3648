use thiserror::Error;

/// Top-level error type for the `onuctl-shell` crate.
///
/// Covers connection setup, authentication and mid-session channel
/// failures. `onuctl-core` maps these into provisioning outcomes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Connection setup ───────────────────────────────────────────
    /// TCP connect or SSH handshake failed.
    #[error("Cannot connect to {target}: {reason}")]
    Connect { target: String, reason: String },

    /// The device rejected the supplied credentials.
    #[error("Authentication rejected for user '{username}' on {target}")]
    Authentication { target: String, username: String },

    /// Connection setup did not complete in time.
    #[error("Connection to {target} timed out after {timeout_secs}s")]
    Timeout { target: String, timeout_secs: u64 },

    // ── Session ────────────────────────────────────────────────────
    /// SSH protocol error on an established connection.
    #[error("SSH protocol error: {0}")]
    Ssh(#[from] russh::Error),

    /// The device closed the shell channel (EOF or channel close).
    #[error("Shell channel closed by peer")]
    ChannelClosed,

    /// A command was sent on a session whose shell has been dropped.
    #[error("Session is not connected")]
    NotConnected,

    /// Socket-level IO failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Returns `true` if the shell was lost mid-session and a reconnect
    /// might recover it.
    pub fn is_connection_loss(&self) -> bool {
        matches!(
            self,
            Self::Ssh(_) | Self::ChannelClosed | Self::NotConnected | Self::Io(_)
        )
    }

    /// Returns `true` if the session could not be established at all.
    pub fn is_connect_failure(&self) -> bool {
        matches!(
            self,
            Self::Connect { .. } | Self::Authentication { .. } | Self::Timeout { .. }
        )
    }

    /// Returns `true` if this is a transient error worth retrying later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Connect { .. } | Self::Timeout { .. } | Self::ChannelClosed | Self::Io(_) => {
                true
            }
            _ => false,
        }
    }
}
