// ── Provisioning rows and identity keys ──

use std::fmt;

use serde::{Deserialize, Serialize};

/// Composite identity of one unit: `(interface, onu_id, sn)`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnitKey {
    pub interface: String,
    pub onu_id: String,
    pub sn: String,
}

impl UnitKey {
    pub fn new(
        interface: impl Into<String>,
        onu_id: impl Into<String>,
        sn: impl Into<String>,
    ) -> Self {
        Self {
            interface: interface.into(),
            onu_id: onu_id.into(),
            sn: sn.into(),
        }
    }
}

impl fmt::Display for UnitKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{} ({})", self.interface, self.onu_id, self.sn)
    }
}

/// One subscriber unit to register and configure.
///
/// Built only through [`WorkOrder`](super::WorkOrder) ingestion, which
/// guarantees a non-blank interface with a port part, a numeric slot and
/// a serial number. Every other field may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ProvisioningRow {
    /// Physical port, e.g. `gpon-olt_1/2/6`.
    pub interface: String,
    /// Slot on that port.
    pub onu_id: u32,
    pub sn: String,
    pub name: String,
    pub description: String,
    pub service_profile: String,
    pub pppoe_username: String,
    pub pppoe_password: String,
    pub vlan_internet: String,
    pub vlan_hotspot: String,
    pub wifi_ssid: String,
}

impl ProvisioningRow {
    pub fn key(&self) -> UnitKey {
        UnitKey::new(&self.interface, self.onu_id.to_string(), &self.sn)
    }

    /// Slot id as it appears in device output and the ledger.
    pub fn onu_id_text(&self) -> String {
        self.onu_id.to_string()
    }

    /// The `chassis/slot/port` part of the interface (`1/2/6`).
    pub fn port_path(&self) -> &str {
        self.interface
            .split_once('_')
            .map_or(self.interface.as_str(), |(_, path)| path)
    }

    /// Logical per-unit interface, `gpon-onu_1/2/6:<id>`.
    pub fn onu_interface(&self) -> String {
        format!("gpon-onu_{}:{}", self.port_path(), self.onu_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(interface: &str, onu_id: u32) -> ProvisioningRow {
        ProvisioningRow {
            interface: interface.into(),
            onu_id,
            sn: "ZTEGC0FFEE01".into(),
            name: String::new(),
            description: String::new(),
            service_profile: String::new(),
            pppoe_username: String::new(),
            pppoe_password: String::new(),
            vlan_internet: String::new(),
            vlan_hotspot: String::new(),
            wifi_ssid: String::new(),
        }
    }

    #[test]
    fn onu_interface_uses_port_path() {
        assert_eq!(row("gpon-olt_1/2/6", 17).onu_interface(), "gpon-onu_1/2/6:17");
    }

    #[test]
    fn key_carries_textual_slot() {
        let key = row("gpon-olt_1/2/6", 3).key();
        assert_eq!(key, UnitKey::new("gpon-olt_1/2/6", "3", "ZTEGC0FFEE01"));
        assert_eq!(key.to_string(), "gpon-olt_1/2/6:3 (ZTEGC0FFEE01)");
    }
}
