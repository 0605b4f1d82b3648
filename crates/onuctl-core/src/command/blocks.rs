use std::fmt::Write as _;

use crate::model::ProvisioningRow;

/// Register block for one port: clear then declare every slot, in input
/// order, inside a single interface scope.
///
/// Empty input yields empty text.
pub fn build_register_block(interface: &str, rows: &[ProvisioningRow], onu_type: &str) -> String {
    if rows.is_empty() {
        return String::new();
    }

    let mut block = format!("interface {interface}\n");
    for row in rows {
        let _ = writeln!(block, "no onu {}", row.onu_id);
        let _ = writeln!(block, "onu {} type {onu_type} sn {}", row.onu_id, row.sn);
    }
    block.push_str("exit\n");
    block
}

/// Service configuration for one registered unit.
///
/// The unit name has spaces replaced with underscores because the device
/// treats the first space as the end of the argument.
pub fn build_config_block(row: &ProvisioningRow, vlan_prefix: &str) -> String {
    let onu = row.onu_interface();
    let name = row.name.replace(' ', "_");
    let vi = &row.vlan_internet;
    let vh = &row.vlan_hotspot;

    let lines = [
        format!("interface {onu}"),
        format!("name {name}"),
        format!("description {}", row.description),
        format!("tcont 1 profile {}", row.service_profile),
        "gemport 1 tcont 1".to_owned(),
        format!("service-port 1 vport 1 user-vlan {vi} vlan {vi}"),
        format!("service-port 2 vport 1 user-vlan {vh} vlan {vh}"),
        "exit".to_owned(),
        String::new(),
        format!("pon-onu-mng {onu}"),
        format!("service pppoe gemport 1 vlan {vi}"),
        format!(
            "wan-ip 1 mode pppoe username {} password {} vlan-profile {vlan_prefix}{vi} host 1",
            row.pppoe_username, row.pppoe_password
        ),
        format!("service hotspot gemport 1 vlan {vh}"),
        format!("vlan port wifi_0/4 mode tag vlan {vh}"),
        "ssid auth wep wifi_0/4 open-system".to_owned(),
        format!("ssid ctrl wifi_0/4 name {}", row.wifi_ssid),
        "interface wifi wifi_0/4 state unlock".to_owned(),
        "security-mgmt 1 state enable mode forward protocol web".to_owned(),
        "exit".to_owned(),
    ];

    let mut block = lines.join("\n");
    block.push('\n');
    block
}
