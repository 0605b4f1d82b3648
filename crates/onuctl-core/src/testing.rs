// ── Scripted in-memory OLT ──
//
// A `Connector` whose shells answer like the device CLI closely enough
// for the orchestrators: register blocks declare slots, state queries
// list committed slots, config blocks can be rejected or dropped.

#![allow(clippy::unwrap_used)]

use std::collections::{BTreeSet, HashSet, VecDeque};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use onuctl_shell::{Connector, Error, Shell};
use tokio::time::{Instant, sleep};

use crate::model::{ProvisioningRow, WorkOrder};

pub(crate) const PORT: &str = "gpon-olt_1/2/6";

#[derive(Debug, Default)]
pub(crate) struct FakeState {
    pub opens: usize,
    /// When each open happened, on the tokio clock.
    pub open_times: Vec<Instant>,
    /// Open ordinals (1-based) that fail with a connect error.
    pub open_failures: HashSet<usize>,
    /// Every write, verbatim.
    pub commands: Vec<String>,
    pub declared: BTreeSet<u32>,
    pub state_queries: usize,
    /// State queries answered with an empty listing before slots appear.
    pub visible_after_queries: usize,
    /// Declared slots that never show up as committed.
    pub hidden: BTreeSet<u32>,
    /// Register blocks answered with no output at all.
    pub drop_register_batches: usize,
    /// Register block writes that fail with a closed channel.
    pub lose_register_batches: usize,
    /// State query writes that fail with a closed channel.
    pub lose_state_queries: usize,
    /// Slots whose config block is rejected with an error marker.
    pub reject_ids: BTreeSet<u32>,
    /// Slots whose first config write fails with a closed channel.
    pub lose_on: BTreeSet<u32>,
    /// When set, each open records whether this file existed.
    pub observe_path: Option<PathBuf>,
    pub path_seen_at_open: Vec<bool>,
}

impl FakeState {
    fn reply(&mut self, text: &str) -> Result<String, Error> {
        let first = text.lines().next().unwrap_or_default().trim();

        if first.starts_with("interface gpon-olt_") {
            if self.lose_register_batches > 0 {
                self.lose_register_batches -= 1;
                return Err(Error::ChannelClosed);
            }
            if self.drop_register_batches > 0 {
                self.drop_register_batches -= 1;
                return Ok(String::new());
            }
            for line in text.lines().map(str::trim) {
                if let Some(rest) = line.strip_prefix("no onu ") {
                    if let Ok(id) = rest.parse::<u32>() {
                        self.declared.remove(&id);
                    }
                } else if let Some(rest) = line.strip_prefix("onu ") {
                    if let Some(id) = rest.split_whitespace().next().and_then(|t| t.parse().ok()) {
                        self.declared.insert(id);
                    }
                }
            }
            return Ok("OLT(config-if)#\r\nOLT(config)#".into());
        }

        if let Some(onu) = first.strip_prefix("interface gpon-onu_") {
            let id: u32 = onu
                .rsplit(':')
                .next()
                .and_then(|t| t.parse().ok())
                .unwrap_or_default();
            if self.lose_on.remove(&id) {
                return Err(Error::ChannelClosed);
            }
            if self.reject_ids.contains(&id) {
                return Ok("%Error 20202: Invalid input detected at '^' marker.\r\nOLT(config)#".into());
            }
            return Ok("OLT(config-if)#\r\nOLT(config)#".into());
        }

        if first.starts_with("show gpon onu state") {
            self.state_queries += 1;
            if self.lose_state_queries > 0 {
                self.lose_state_queries -= 1;
                return Err(Error::ChannelClosed);
            }
            let mut out = String::from("OnuIndex   Admin State  OMCC State  Phase State\r\n");
            if self.state_queries > self.visible_after_queries {
                for id in self.declared.difference(&self.hidden) {
                    out.push_str(&format!("1/2/6:{id}   enable       enable      working\r\n"));
                }
            }
            out.push_str("OLT#");
            return Ok(out);
        }

        Ok("OLT#".into())
    }
}

#[derive(Debug, Clone, Default)]
pub(crate) struct FakeOlt {
    state: Arc<Mutex<FakeState>>,
}

impl FakeOlt {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connector(&self) -> Arc<dyn Connector> {
        Arc::new(self.clone())
    }

    pub fn declare(&self, ids: impl IntoIterator<Item = u32>) {
        self.state.lock().unwrap().declared.extend(ids);
    }

    pub fn with_state<R>(&self, f: impl FnOnce(&mut FakeState) -> R) -> R {
        f(&mut self.state.lock().unwrap())
    }

    pub fn opens(&self) -> usize {
        self.state.lock().unwrap().opens
    }

    pub fn state_queries(&self) -> usize {
        self.state.lock().unwrap().state_queries
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    /// Writes that start a block for the unit interface of `onu_id`.
    pub fn config_sends(&self, onu_id: u32) -> usize {
        let prefix = format!("interface gpon-onu_1/2/6:{onu_id}\n");
        self.commands()
            .iter()
            .filter(|c| c.starts_with(&prefix))
            .count()
    }

    pub fn register_sends(&self) -> usize {
        self.commands()
            .iter()
            .filter(|c| c.starts_with("interface gpon-olt_"))
            .count()
    }
}

#[async_trait]
impl Connector for FakeOlt {
    async fn open(&self) -> Result<Box<dyn Shell>, Error> {
        let mut state = self.state.lock().unwrap();
        state.opens += 1;
        state.open_times.push(Instant::now());
        if let Some(path) = state.observe_path.clone() {
            state.path_seen_at_open.push(path.exists());
        }
        if state.open_failures.contains(&state.opens) {
            return Err(Error::Connect {
                target: "fake-olt:22".into(),
                reason: "connection refused".into(),
            });
        }
        Ok(Box::new(FakeShell {
            state: Arc::clone(&self.state),
            pending: VecDeque::new(),
        }))
    }

    fn label(&self) -> String {
        "fake-olt:22".into()
    }
}

struct FakeShell {
    state: Arc<Mutex<FakeState>>,
    pending: VecDeque<String>,
}

#[async_trait]
impl Shell for FakeShell {
    async fn write(&mut self, data: &[u8]) -> Result<(), Error> {
        let text = String::from_utf8_lossy(data).into_owned();
        let reply = {
            let mut state = self.state.lock().unwrap();
            state.commands.push(text.clone());
            state.reply(&text)?
        };
        if !reply.is_empty() {
            self.pending.push_back(reply);
        }
        Ok(())
    }

    async fn recv(&mut self, wait: Duration) -> Result<Option<String>, Error> {
        if let Some(chunk) = self.pending.pop_front() {
            return Ok(Some(chunk));
        }
        sleep(wait).await;
        Ok(None)
    }

    async fn close(&mut self) {}
}

pub(crate) fn row(onu_id: u32) -> ProvisioningRow {
    ProvisioningRow {
        interface: PORT.into(),
        onu_id,
        sn: format!("ZTEGC{onu_id:07}"),
        name: format!("Subscriber {onu_id}"),
        description: format!("Blok {onu_id}"),
        service_profile: "UP-20M".into(),
        pppoe_username: format!("user{onu_id}"),
        pppoe_password: "secret".into(),
        vlan_internet: "100".into(),
        vlan_hotspot: "200".into(),
        wifi_ssid: format!("Net-{onu_id}"),
    }
}

pub(crate) fn order(ids: impl IntoIterator<Item = u32>) -> WorkOrder {
    WorkOrder::new(ids.into_iter().map(row).collect()).unwrap()
}

/// Engine state over `olt` with default tuning and a ledger in `dir`.
pub(crate) fn shared(olt: &FakeOlt, dir: &std::path::Path) -> crate::orchestrator::Shared {
    crate::orchestrator::Shared {
        device: crate::config::DeviceConfig::default(),
        tuning: crate::config::EngineTuning::default(),
        connector: olt.connector(),
        ledger: Arc::new(crate::store::Ledger::new(dir.join("status.csv"))),
        progress: Arc::new(crate::store::ProgressBoard::new()),
        transcript: Arc::new(crate::store::Transcript::disabled()),
    }
}
