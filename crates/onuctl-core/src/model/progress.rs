// ── Per-port phase progress ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum PhaseStatus {
    #[default]
    Waiting,
    Running,
    Finished,
}

/// Counters for the phase currently running on one port.
///
/// `total` is fixed when the phase starts; `done` only grows.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEntry {
    pub done: usize,
    pub total: usize,
    pub status: PhaseStatus,
}

impl ProgressEntry {
    pub fn is_finished(&self) -> bool {
        self.status == PhaseStatus::Finished
    }
}
