// ── Per-port progress board ──
//
// Counters live in a `watch` channel: writers serialize through
// `send_modify`, observers either read a snapshot or subscribe and wake
// on every change.

use std::collections::BTreeMap;

use tokio::sync::watch;

use crate::model::{PhaseStatus, ProgressEntry};

pub type ProgressSnapshot = BTreeMap<String, ProgressEntry>;

#[derive(Debug)]
pub struct ProgressBoard {
    entries: watch::Sender<ProgressSnapshot>,
}

impl Default for ProgressBoard {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressBoard {
    pub fn new() -> Self {
        let (entries, _) = watch::channel(BTreeMap::new());
        Self { entries }
    }

    /// Mark a phase as queued on `interface`, resetting its counters.
    pub fn queue(&self, interface: &str) {
        self.entries.send_modify(|map| {
            map.insert(interface.to_owned(), ProgressEntry::default());
        });
    }

    /// Begin a phase of `total` units.
    pub fn start(&self, interface: &str, total: usize) {
        self.entries.send_modify(|map| {
            map.insert(
                interface.to_owned(),
                ProgressEntry {
                    done: 0,
                    total,
                    status: PhaseStatus::Running,
                },
            );
        });
    }

    /// Count `count` more completed units. Never exceeds `total`.
    pub fn advance(&self, interface: &str, count: usize) {
        if count == 0 {
            return;
        }
        self.entries.send_modify(|map| {
            let entry = map.entry(interface.to_owned()).or_default();
            entry.done = entry.done.saturating_add(count).min(entry.total);
        });
    }

    pub fn finish(&self, interface: &str) {
        self.entries.send_modify(|map| {
            map.entry(interface.to_owned()).or_default().status = PhaseStatus::Finished;
        });
    }

    pub fn get(&self, interface: &str) -> Option<ProgressEntry> {
        self.entries.borrow().get(interface).copied()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.entries.borrow().clone()
    }

    /// Receiver that wakes on every counter change.
    pub fn subscribe(&self) -> watch::Receiver<ProgressSnapshot> {
        self.entries.subscribe()
    }
}
