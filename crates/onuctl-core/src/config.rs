// ── Runtime provisioning configuration ──
//
// These types describe *which* OLT to drive and *how hard* to drive it.
// They carry credential data and timing, but never touch disk.
// The CLI constructs a `DeviceConfig` + `EngineTuning` and hands them in.

use std::time::Duration;

use onuctl_shell::{ReadTiming, SshTarget, TransportConfig};
use secrecy::SecretString;

/// Connection target and per-run provisioning conventions.
#[derive(Debug, Clone)]
pub struct DeviceConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: SecretString,
    /// Prefix of the device-side VLAN profile names (`{prefix}{vlan}`).
    pub vlan_prefix: String,
    /// Unit type declared at registration (`onu N type <onu_type> sn ...`).
    pub onu_type: String,
    /// Explicit configuration worker count; `None` picks automatically.
    pub config_workers: Option<usize>,
    /// Persist to non-volatile storage (`write`) on every buffer flush.
    pub auto_write: bool,
    pub connect_timeout: Duration,
}

impl DeviceConfig {
    /// `host:port` label used in logs.
    pub fn label(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn ssh_target(&self) -> SshTarget {
        SshTarget {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
        }
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            connect_timeout: self.connect_timeout,
            ..TransportConfig::default()
        }
    }
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: "192.168.1.1".into(),
            port: 22,
            username: "admin".into(),
            password: SecretString::from(String::new()),
            vlan_prefix: String::new(),
            onu_type: "ALL".into(),
            config_workers: None,
            auto_write: false,
            connect_timeout: Duration::from_secs(15),
        }
    }
}

// ── Engine tuning ────────────────────────────────────────────────────

/// Every size and timing knob of the engine.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineTuning {
    pub read: ReadTiming,
    pub registration: RegistrationTuning,
    pub commit: CommitPolicy,
    pub configuration: ConfigurationTuning,
}

/// Batching and buffer-flush behaviour of the register phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationTuning {
    pub batch_size: usize,
    /// Pause after every batch so the device can digest it.
    pub batch_delay: Duration,
    /// Units sent between two buffer flushes. The device silently drops
    /// uncommitted identities once roughly 110 are pending.
    pub flush_every: usize,
    /// Pause between closing and reopening the session on a flush.
    pub reconnect_pause: Duration,
    /// Pause between the last batch and the first commit query.
    pub settle_before_verify: Duration,
    /// Read window for the `write` command.
    pub write_window: Duration,
}

impl Default for RegistrationTuning {
    fn default() -> Self {
        Self {
            batch_size: 32,
            batch_delay: Duration::from_secs(5),
            flush_every: 96,
            reconnect_pause: Duration::from_secs(2),
            settle_before_verify: Duration::from_secs(2),
            write_window: Duration::from_secs(10),
        }
    }
}

/// Bounds of the commit verification poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitPolicy {
    /// Overall polling budget before the extended wait.
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// One-shot wait before the final re-check.
    pub extended_wait: Duration,
    /// Send delay of the state query.
    pub query_delay: Duration,
    /// Read window of the state query (long listings page slowly).
    pub query_window: Duration,
}

impl Default for CommitPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(180),
            poll_interval: Duration::from_secs(10),
            extended_wait: Duration::from_secs(120),
            query_delay: Duration::from_secs(1),
            query_window: Duration::from_secs(20),
        }
    }
}

/// Worker fan-out of the configuration phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigurationTuning {
    /// Delay between consecutive workers' first connection.
    pub worker_stagger: Duration,
    /// Orders up to this size run on a single worker; larger ones on two.
    pub single_worker_limit: usize,
}

impl Default for ConfigurationTuning {
    fn default() -> Self {
        Self {
            worker_stagger: Duration::from_secs(2),
            single_worker_limit: 36,
        }
    }
}
