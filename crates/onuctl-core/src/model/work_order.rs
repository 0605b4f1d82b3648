// ── Work order ingestion ──
//
// A work order is the validated, single-port set of rows submitted
// together. CSV columns follow the operator spreadsheet layout:
// interface, onu_id, sn, name, description, profile, username, password,
// vlan_inet, vlan_hotspot, wifi_ssid.

use std::collections::{BTreeSet, HashSet};
use std::io::Read;
use std::path::Path;

use serde::Deserialize;

use super::row::ProvisioningRow;
use crate::error::CoreError;

/// Raw CSV record; every column optional so validation can name the
/// offending field instead of failing inside serde.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct CsvRow {
    interface: String,
    onu_id: String,
    sn: String,
    name: String,
    description: String,
    #[serde(alias = "service_profile")]
    profile: String,
    #[serde(alias = "pppoe_username")]
    username: String,
    #[serde(alias = "pppoe_password")]
    password: String,
    #[serde(alias = "vlan_internet")]
    vlan_inet: String,
    vlan_hotspot: String,
    wifi_ssid: String,
}

impl CsvRow {
    fn validate(self, line: usize) -> Result<ProvisioningRow, CoreError> {
        let invalid = |reason: String| CoreError::InvalidRow { line, reason };

        let interface = self.interface.trim().to_owned();
        if interface.is_empty() {
            return Err(invalid("missing interface".into()));
        }
        match interface.split_once('_') {
            Some((_, path)) if !path.is_empty() => {}
            _ => {
                return Err(invalid(format!(
                    "interface '{interface}' has no port part (expected e.g. gpon-olt_1/2/6)"
                )));
            }
        }

        let onu_id_raw = self.onu_id.trim();
        if onu_id_raw.is_empty() {
            return Err(invalid("missing onu_id".into()));
        }
        let onu_id: u32 = onu_id_raw
            .parse()
            .map_err(|_| invalid(format!("onu_id '{onu_id_raw}' is not a slot number")))?;

        let sn = self.sn.trim().to_owned();
        if sn.is_empty() {
            return Err(invalid("missing sn".into()));
        }

        Ok(ProvisioningRow {
            interface,
            onu_id,
            sn,
            name: self.name.trim().to_owned(),
            description: self.description.trim().to_owned(),
            service_profile: self.profile.trim().to_owned(),
            pppoe_username: self.username.trim().to_owned(),
            pppoe_password: self.password.trim().to_owned(),
            vlan_internet: self.vlan_inet.trim().to_owned(),
            vlan_hotspot: self.vlan_hotspot.trim().to_owned(),
            wifi_ssid: self.wifi_ssid.trim().to_owned(),
        })
    }
}

/// Ordered, validated rows that all target one physical port.
#[derive(Debug, Clone)]
pub struct WorkOrder {
    interface: String,
    rows: Vec<ProvisioningRow>,
}

impl WorkOrder {
    /// Validate `rows` as one work order.
    ///
    /// Rejects empty input, rows spanning several ports and repeated
    /// identity keys.
    pub fn new(rows: Vec<ProvisioningRow>) -> Result<Self, CoreError> {
        let Some(first) = rows.first() else {
            return Err(CoreError::EmptyWorkOrder);
        };
        let interface = first.interface.clone();

        let ports: BTreeSet<&str> = rows.iter().map(|r| r.interface.as_str()).collect();
        if ports.len() > 1 {
            return Err(CoreError::MultiplePorts {
                ports: ports.into_iter().map(String::from).collect(),
            });
        }

        let mut seen = HashSet::with_capacity(rows.len());
        for row in &rows {
            let key = row.key();
            if !seen.insert(key.clone()) {
                return Err(CoreError::DuplicateKey {
                    key: key.to_string(),
                });
            }
        }

        Ok(Self { interface, rows })
    }

    /// Parse and validate a CSV work order with a header row.
    ///
    /// Row numbers in errors count data lines from 1.
    pub fn from_csv_reader<R: Read>(reader: R) -> Result<Self, CoreError> {
        let mut csv = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(reader);

        let mut rows = Vec::new();
        for (index, record) in csv.deserialize::<CsvRow>().enumerate() {
            let line = index + 1;
            let raw = record?;
            if raw.interface.is_empty() && raw.onu_id.is_empty() && raw.sn.is_empty() {
                continue;
            }
            rows.push(raw.validate(line)?);
        }

        Self::new(rows)
    }

    pub fn from_csv_path(path: &Path) -> Result<Self, CoreError> {
        let file = std::fs::File::open(path)?;
        Self::from_csv_reader(file)
    }

    /// The single port every row targets.
    pub fn interface(&self) -> &str {
        &self.interface
    }

    pub fn rows(&self) -> &[ProvisioningRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
