// ── Commit verification ──
//
// Registration is asynchronous on the device: `onu N type ... sn ...` is
// accepted immediately but the identity only shows up in
// `show gpon onu state` once committed. The verifier polls that listing
// until every expected slot is visible or the time budget runs out.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use onuctl_shell::Session;
use regex::Regex;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::command::{EXEC_PREAMBLE, state_query};
use crate::config::CommitPolicy;
use crate::error::CoreError;

static SLOT_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\d+/\d+/\d+:(\d+)\b").expect("slot pattern is a valid regex")
});

/// Slot ids of every `<chassis>/<slot>/<port>:<id>` token in `output`.
///
/// Only the first token of each line counts. Ids are normalized, so
/// `1/2/6:007` yields `"7"`.
pub fn parse_committed_ids(output: &str) -> BTreeSet<String> {
    output
        .lines()
        .filter_map(|line| {
            let line = line.replace('\r', "").replace('\t', " ");
            let caps = SLOT_PATTERN.captures(&line)?;
            let id: u32 = caps.get(1)?.as_str().parse().ok()?;
            Some(id.to_string())
        })
        .collect()
}

/// Result of one verification run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitReport {
    /// Expected ids seen at least once.
    pub confirmed: BTreeSet<String>,
    /// Expected ids never seen. These are still pending, not failed.
    pub missing: BTreeSet<String>,
    /// State queries issued, including the extended re-check.
    pub polls: usize,
    /// Whether the one-shot extended wait was used.
    pub extended: bool,
}

impl CommitReport {
    pub fn is_complete(&self) -> bool {
        self.missing.is_empty()
    }

    /// The units left unconfirmed as an error value, for reporting.
    pub fn timeout_error(&self, interface: &str) -> Option<CoreError> {
        if self.is_complete() {
            return None;
        }
        Some(CoreError::CommitTimeout {
            interface: interface.to_owned(),
            missing: self.missing.iter().cloned().collect(),
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum VerifyState {
    Polling,
    ExtendedWait,
    Done,
}

/// Poll until every id in `expected` is visible on `interface`.
///
/// The first query is immediate. After `policy.timeout` without full
/// confirmation, one extended wait and one final query follow. A failed
/// query counts as an empty poll; a lost shell is reopened before the
/// next one.
pub async fn wait_until_committed(
    session: &mut Session,
    interface: &str,
    expected: &BTreeSet<String>,
    policy: &CommitPolicy,
) -> CommitReport {
    let mut report = CommitReport {
        missing: expected.clone(),
        ..CommitReport::default()
    };
    if expected.is_empty() {
        return report;
    }

    if let Err(e) = send_preamble(session).await {
        warn!(interface, error = %e, "state preamble failed");
        recover(session).await;
    }

    let started = Instant::now();
    let mut state = VerifyState::Polling;
    while state != VerifyState::Done {
        state = match state {
            VerifyState::Polling => {
                if started.elapsed() >= policy.timeout {
                    VerifyState::ExtendedWait
                } else {
                    poll_once(session, interface, expected, policy, &mut report).await;
                    if report.is_complete() {
                        VerifyState::Done
                    } else {
                        sleep(policy.poll_interval).await;
                        VerifyState::Polling
                    }
                }
            }
            VerifyState::ExtendedWait => {
                report.extended = true;
                info!(
                    interface,
                    missing = report.missing.len(),
                    wait_secs = policy.extended_wait.as_secs(),
                    "commit timeout reached, waiting once more before re-check"
                );
                sleep(policy.extended_wait).await;
                if let Err(e) = send_preamble(session).await {
                    warn!(interface, error = %e, "state preamble failed");
                    recover(session).await;
                }
                poll_once(session, interface, expected, policy, &mut report).await;
                VerifyState::Done
            }
            VerifyState::Done => VerifyState::Done,
        };
    }

    info!(
        interface,
        confirmed = report.confirmed.len(),
        expected = expected.len(),
        polls = report.polls,
        "commit verification finished"
    );
    report
}

async fn poll_once(
    session: &mut Session,
    interface: &str,
    expected: &BTreeSet<String>,
    policy: &CommitPolicy,
    report: &mut CommitReport,
) {
    report.polls += 1;
    match session
        .send_awaiting_prompt(&state_query(interface), policy.query_delay, policy.query_window)
        .await
    {
        Ok(output) => {
            let seen = parse_committed_ids(&output);
            report
                .confirmed
                .extend(expected.intersection(&seen).cloned());
            report.missing.retain(|id| !seen.contains(id));
            debug!(
                interface,
                poll = report.polls,
                confirmed = report.confirmed.len(),
                expected = expected.len(),
                "state poll"
            );
        }
        Err(e) => {
            warn!(interface, poll = report.polls, error = %e, "state query failed");
            if !session.is_open() {
                recover(session).await;
            }
        }
    }
}

async fn send_preamble(session: &mut Session) -> Result<(), onuctl_shell::Error> {
    for command in EXEC_PREAMBLE {
        session.send_default(command).await?;
    }
    Ok(())
}

/// Reopen a lost shell and put it back into exec mode. Best effort.
async fn recover(session: &mut Session) {
    if session.is_open() {
        return;
    }
    if let Err(e) = session.reopen().await {
        warn!(target = %session.label(), error = %e, "reopen for state polling failed");
        return;
    }
    if let Err(e) = send_preamble(session).await {
        warn!(target = %session.label(), error = %e, "state preamble failed after reopen");
    }
}
