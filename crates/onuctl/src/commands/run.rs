//! `run` handler: load work orders, drive the engine, render a summary.

use std::collections::HashMap;
use std::path::Path;
use std::time::{Duration, Instant};

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;
use tabled::Tabled;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use onuctl_core::{CoreError, Engine, ProgressBoard, RunMode, RunOutcome, WorkOrder};

use crate::cli::{GlobalOpts, RunArgs, RunModeArg};
use crate::config;
use crate::error::CliError;
use crate::output;

impl From<RunModeArg> for RunMode {
    fn from(arg: RunModeArg) -> Self {
        match arg {
            RunModeArg::Full => Self::Full,
            RunModeArg::Register => Self::Register,
            RunModeArg::Config => Self::Config,
        }
    }
}

// ── Summary rows ────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Tabled)]
struct SummaryRow {
    #[tabled(rename = "Port")]
    interface: String,
    #[tabled(rename = "Result")]
    outcome: &'static str,
    #[tabled(rename = "Sent")]
    sent: usize,
    #[tabled(rename = "Committed")]
    committed: usize,
    #[tabled(rename = "Configured")]
    configured: usize,
    #[tabled(rename = "Pending")]
    pending: usize,
    #[tabled(rename = "Registered")]
    registered: usize,
    #[tabled(rename = "Success")]
    success: usize,
    #[tabled(rename = "Error")]
    error: usize,
    #[tabled(skip)]
    #[serde(skip_serializing_if = "Option::is_none")]
    failure: Option<String>,
}

impl SummaryRow {
    fn new(engine: &Engine, order: &WorkOrder, result: &Result<RunOutcome, CoreError>) -> Self {
        let mut row = Self {
            interface: order.interface().to_owned(),
            outcome: "idle",
            sent: 0,
            committed: 0,
            configured: 0,
            pending: 0,
            registered: 0,
            success: 0,
            error: 0,
            failure: None,
        };

        let counts = match result {
            Ok(RunOutcome::Completed(summary)) => {
                row.outcome = "done";
                if let Some(ref reg) = summary.registration {
                    row.sent = reg.sent;
                    row.committed = reg.confirmed();
                }
                if let Some(ref conf) = summary.configuration {
                    row.configured = conf.succeeded;
                }
                Some(summary.counts)
            }
            Ok(RunOutcome::Idle) => engine.count_statuses(order).ok(),
            Err(e) => {
                row.outcome = "failed";
                row.failure = Some(e.to_string());
                engine.count_statuses(order).ok()
            }
        };

        if let Some(counts) = counts {
            row.pending = counts.pending;
            row.registered = counts.registered;
            row.success = counts.success;
            row.error = counts.error;
        }
        row
    }
}

// ── Work order loading ──────────────────────────────────────────────

fn load_order(path: &Path) -> Result<WorkOrder, CliError> {
    if !path.is_file() {
        return Err(CliError::FileNotFound {
            path: path.display().to_string(),
        });
    }
    WorkOrder::from_csv_path(path).map_err(|e| match e {
        e if e.is_input_error() => CliError::InvalidWorkOrder {
            path: path.display().to_string(),
            reason: e.to_string(),
        },
        other => other.into(),
    })
}

// ── Progress display ────────────────────────────────────────────────

fn to_u64(n: usize) -> u64 {
    u64::try_from(n).unwrap_or(u64::MAX)
}

/// Render the progress board as one bar per port until `stop` fires.
fn spawn_progress(board: &ProgressBoard) -> (oneshot::Sender<()>, JoinHandle<()>) {
    let (stop_tx, mut stop_rx) = oneshot::channel::<()>();
    let mut rx = board.subscribe();

    let handle = tokio::spawn(async move {
        let multi = MultiProgress::new();
        let style = ProgressStyle::with_template(
            "{prefix:>18.bold} [{bar:32.cyan/blue}] {pos:>4}/{len:<4} {msg}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=> ");
        let mut bars: HashMap<String, ProgressBar> = HashMap::new();

        loop {
            let snapshot = rx.borrow_and_update().clone();
            for (interface, entry) in snapshot {
                let bar = bars.entry(interface.clone()).or_insert_with(|| {
                    let bar = multi.add(ProgressBar::new(0));
                    bar.set_style(style.clone());
                    bar.set_prefix(interface);
                    bar
                });
                bar.set_length(to_u64(entry.total));
                bar.set_position(to_u64(entry.done));
                bar.set_message(entry.status.to_string());
            }

            tokio::select! {
                changed = rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                }
                _ = &mut stop_rx => break,
            }
        }

        for bar in bars.values() {
            bar.finish();
        }
    });

    (stop_tx, handle)
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();

    let orders = args
        .files
        .iter()
        .map(|path| load_order(path))
        .collect::<Result<Vec<_>, _>>()?;

    let resolved = config::resolve_device(global, &cfg, &args)?;
    let profile_name = resolved.profile_name;
    let engine = Engine::new(
        resolved.device,
        resolved.tuning,
        config::ledger(global, &cfg),
        config::transcript(global, &cfg),
    );
    let mode = RunMode::from(args.mode);

    tracing::debug!(orders = orders.len(), %mode, "starting run");
    let started = Instant::now();
    let progress = (!global.quiet).then(|| spawn_progress(&engine.progress()));

    let results = if let [order] = orders.as_slice() {
        vec![engine.run(order, mode).await]
    } else {
        let pool = args.pool.unwrap_or(cfg.defaults.pool_size);
        engine
            .run_many(orders.clone(), mode, pool)
            .await
            .map_err(CliError::from)?
    };

    if let Some((stop, handle)) = progress {
        let _ = stop.send(());
        let _ = handle.await;
    }

    let rows: Vec<SummaryRow> = orders
        .iter()
        .zip(&results)
        .map(|(order, result)| SummaryRow::new(&engine, order, result))
        .collect();

    for row in &rows {
        if let Some(ref failure) = row.failure {
            eprintln!("✗ {}: {failure}", row.interface);
        }
    }
    if !global.quiet && rows.iter().all(|r| r.outcome == "idle") {
        eprintln!("Nothing to do: every unit is already provisioned");
    }

    let out = output::render_list(
        &global.output,
        &rows,
        SummaryRow::clone,
        |r| format!("{} {}", r.interface, r.outcome),
    );
    output::print_output(&out, global.quiet);

    if !global.quiet {
        let elapsed = Duration::from_secs(started.elapsed().as_secs());
        eprintln!("Finished in {}", humantime::format_duration(elapsed));
    }

    match results.into_iter().find_map(Result::err) {
        Some(err) => Err(CliError::from(err).with_profile(&profile_name)),
        None => Ok(()),
    }
}
