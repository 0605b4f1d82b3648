// ── CSV status ledger ──
//
// One row per unit identity. Every upsert rewrites the whole table under
// a single writer lock, into a temp file that is then renamed over the
// original, so readers never observe a half-written ledger.

use std::collections::HashMap;
use std::fs::File;
use std::io::{self, Write as _};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use tracing::{debug, warn};

use crate::error::CoreError;
use crate::model::{StatusRecord, UnitKey, UnitStatus};

/// Column header of the ledger file.
pub const LEDGER_HEADER: [&str; 6] = ["interface", "onu_id", "sn", "name", "status", "message"];

/// Raw ledger row. Status stays textual so a row with an unknown status
/// survives rewrites untouched.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct LedgerRow {
    interface: String,
    onu_id: String,
    sn: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    status: String,
    #[serde(default)]
    message: String,
}

impl LedgerRow {
    fn key(&self) -> UnitKey {
        UnitKey::new(&self.interface, &self.onu_id, &self.sn)
    }

    fn status(&self) -> Option<UnitStatus> {
        self.status.parse().ok()
    }
}

impl From<&StatusRecord> for LedgerRow {
    fn from(record: &StatusRecord) -> Self {
        Self {
            interface: record.interface.clone(),
            onu_id: record.onu_id.clone(),
            sn: record.sn.clone(),
            name: record.name.clone(),
            status: record.status.to_string(),
            message: record.message.clone(),
        }
    }
}

/// Durable per-unit status table backed by a CSV file.
#[derive(Debug)]
pub struct Ledger {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl Ledger {
    /// Ledger at `path`. The file is created on the first upsert.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Status per identity key. A missing file is an empty ledger; rows
    /// with an unrecognised status are skipped.
    pub fn load_status(&self) -> Result<HashMap<UnitKey, UnitStatus>, CoreError> {
        let rows = self.read_rows()?;
        let mut map = HashMap::with_capacity(rows.len());
        for row in rows {
            match row.status() {
                Some(status) => {
                    map.insert(row.key(), status);
                }
                None => {
                    warn!(key = %row.key(), status = %row.status, "ignoring ledger row with unknown status");
                }
            }
        }
        Ok(map)
    }

    /// Every row with a recognised status, in file order.
    pub fn records(&self) -> Result<Vec<StatusRecord>, CoreError> {
        Ok(self
            .read_rows()?
            .into_iter()
            .filter_map(|row| {
                let status = row.status()?;
                Some(StatusRecord {
                    interface: row.interface,
                    onu_id: row.onu_id,
                    sn: row.sn,
                    name: row.name,
                    status,
                    message: row.message,
                })
            })
            .collect())
    }

    /// Replace the row for `record`'s key, or append one if none exists.
    ///
    /// The replacement keeps the position of the first existing row and
    /// drops any later duplicates, so exactly one row per key remains.
    pub fn upsert(&self, record: &StatusRecord) -> Result<(), CoreError> {
        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        let key = record.key();
        let mut rows = self.read_rows()?;
        let position = rows.iter().position(|row| row.key() == key);
        rows.retain(|row| row.key() != key);

        let row = LedgerRow::from(record);
        match position {
            Some(index) => rows.insert(index, row),
            None => rows.push(row),
        }

        self.write_rows(&rows)?;
        debug!(key = %key, status = %record.status, "ledger updated");
        Ok(())
    }

    fn read_rows(&self) -> Result<Vec<LedgerRow>, CoreError> {
        let file = match File::open(&self.path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(self.error(&e)),
        };

        let mut reader = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(file);
        reader
            .deserialize()
            .collect::<Result<Vec<LedgerRow>, _>>()
            .map_err(|e| self.error(&e))
    }

    fn write_rows(&self, rows: &[LedgerRow]) -> Result<(), CoreError> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        std::fs::create_dir_all(dir).map_err(|e| self.error(&e))?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir).map_err(|e| self.error(&e))?;
        {
            let mut writer = csv::WriterBuilder::new()
                .has_headers(false)
                .from_writer(tmp.as_file_mut());
            writer
                .write_record(LEDGER_HEADER)
                .map_err(|e| self.error(&e))?;
            for row in rows {
                writer.serialize(row).map_err(|e| self.error(&e))?;
            }
            writer.flush().map_err(|e| self.error(&e))?;
        }
        tmp.as_file_mut().sync_all().map_err(|e| self.error(&e))?;
        tmp.persist(&self.path).map_err(|e| self.error(&e.error))?;
        Ok(())
    }

    fn error(&self, err: &dyn std::fmt::Display) -> CoreError {
        CoreError::Ledger {
            path: self.path.display().to_string(),
            message: err.to_string(),
        }
    }
}
