// ── Persisted per-unit outcome ──

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use super::row::{ProvisioningRow, UnitKey};

/// Lifecycle of one unit across both phases.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum UnitStatus {
    /// Register command sent, commit not yet observed.
    Pending,
    /// Identity visible in device state; ready for configuration.
    Registered,
    /// Service configuration applied.
    Success,
    /// Configuration rejected or failed terminally.
    Error,
}

impl UnitStatus {
    /// Whether the unit still needs the register phase. Error rows are
    /// retried from scratch on a later run.
    pub fn needs_registration(self) -> bool {
        !matches!(self, Self::Registered | Self::Success)
    }
}

/// One ledger row. Column order matches the on-disk header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub interface: String,
    pub onu_id: String,
    pub sn: String,
    #[serde(default)]
    pub name: String,
    pub status: UnitStatus,
    #[serde(default)]
    pub message: String,
}

impl StatusRecord {
    pub fn for_row(row: &ProvisioningRow, status: UnitStatus, message: impl Into<String>) -> Self {
        Self {
            interface: row.interface.clone(),
            onu_id: row.onu_id_text(),
            sn: row.sn.clone(),
            name: row.name.clone(),
            status,
            message: message.into(),
        }
    }

    pub fn key(&self) -> UnitKey {
        UnitKey::new(&self.interface, &self.onu_id, &self.sn)
    }
}
