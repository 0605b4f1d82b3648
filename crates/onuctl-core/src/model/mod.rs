// ── Provisioning domain model ──
//
// Typed rows validated at ingestion, the single-port work order, the
// persisted per-unit status and the per-port progress counters.

pub mod progress;
pub mod row;
pub mod status;
pub mod work_order;

pub use progress::{PhaseStatus, ProgressEntry};
pub use row::{ProvisioningRow, UnitKey};
pub use status::{StatusRecord, UnitStatus};
pub use work_order::WorkOrder;
