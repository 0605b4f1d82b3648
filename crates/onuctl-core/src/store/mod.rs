// ── Run state shared between orchestrators ──
//
// The ledger is the durable record of what has been done to each unit.
// The progress board is the in-memory view observers poll or subscribe
// to. The transcript keeps raw device output for troubleshooting only.

mod ledger;
mod progress;
mod transcript;

pub use ledger::{LEDGER_HEADER, Ledger};
pub use progress::{ProgressBoard, ProgressSnapshot};
pub use transcript::Transcript;
