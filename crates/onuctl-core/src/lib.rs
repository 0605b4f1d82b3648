//! Provisioning engine for bulk ONU registration on GPON OLTs.
//!
//! The engine drives the OLT's interactive shell through
//! [`onuctl_shell::Session`] in two phases:
//!
//! - **Registration** declares unit identities on one port in batches,
//!   flushes the device buffer by reconnecting, and polls device state
//!   until the identities are committed ([`verify`]).
//! - **Configuration** pushes one service block per registered unit from
//!   one or two concurrent sessions.
//!
//! Every per-unit outcome lands in the CSV [`Ledger`], which makes runs
//! resumable: re-running a work order only repeats what is unfinished.
//! Per-port counters are published on the [`ProgressBoard`].

pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod model;
pub mod orchestrator;
pub mod store;
pub mod verify;

#[cfg(test)]
pub(crate) mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::{
    CommitPolicy, ConfigurationTuning, DeviceConfig, EngineTuning, RegistrationTuning,
};
pub use engine::{Engine, MAX_PORT_POOL, RunMode, RunOutcome, RunSummary, StatusCounts};
pub use error::CoreError;
pub use model::{
    PhaseStatus, ProgressEntry, ProvisioningRow, StatusRecord, UnitKey, UnitStatus, WorkOrder,
};
pub use orchestrator::{ConfigurationReport, RegistrationReport};
pub use store::{Ledger, ProgressBoard, ProgressSnapshot, Transcript};
pub use verify::{CommitReport, parse_committed_ids};

pub use onuctl_shell::ReadTiming;
