//! `status` handler: list ledger records.

use owo_colors::OwoColorize;
use tabled::Tabled;

use onuctl_core::{StatusRecord, UnitStatus};

use crate::cli::{GlobalOpts, StatusArgs, UnitStatusArg};
use crate::config;
use crate::error::CliError;
use crate::output;

impl From<UnitStatusArg> for UnitStatus {
    fn from(arg: UnitStatusArg) -> Self {
        match arg {
            UnitStatusArg::Pending => Self::Pending,
            UnitStatusArg::Registered => Self::Registered,
            UnitStatusArg::Success => Self::Success,
            UnitStatusArg::Error => Self::Error,
        }
    }
}

#[derive(Tabled)]
struct StatusRow {
    #[tabled(rename = "Port")]
    interface: String,
    #[tabled(rename = "ONU")]
    onu_id: String,
    #[tabled(rename = "SN")]
    sn: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Message")]
    message: String,
}

fn paint(status: UnitStatus, color: bool) -> String {
    let label = status.to_string();
    if !color {
        return label;
    }
    match status {
        UnitStatus::Pending => label.yellow().to_string(),
        UnitStatus::Registered => label.cyan().to_string(),
        UnitStatus::Success => label.green().to_string(),
        UnitStatus::Error => label.red().to_string(),
    }
}

fn to_row(record: &StatusRecord, color: bool) -> StatusRow {
    StatusRow {
        interface: record.interface.clone(),
        onu_id: record.onu_id.clone(),
        sn: record.sn.clone(),
        name: record.name.clone(),
        status: paint(record.status, color),
        message: record.message.clone(),
    }
}

pub fn handle(args: &StatusArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let cfg = config::load_config_or_default();
    let ledger = config::ledger(global, &cfg);
    tracing::debug!(path = %ledger.path().display(), "reading status ledger");

    let wanted = args.status.map(UnitStatus::from);
    let mut records: Vec<StatusRecord> = ledger
        .records()?
        .into_iter()
        .filter(|r| args.interface.as_deref().is_none_or(|i| r.interface == i))
        .filter(|r| wanted.is_none_or(|s| r.status == s))
        .collect();
    records.sort_by(|a, b| {
        a.interface.cmp(&b.interface).then_with(|| {
            let slot = |r: &StatusRecord| r.onu_id.parse::<u32>().unwrap_or(u32::MAX);
            slot(a).cmp(&slot(b))
        })
    });

    let color = output::should_color(&global.color);
    let out = output::render_list(
        &global.output,
        &records,
        |r| to_row(r, color),
        |r| format!("{}:{}", r.interface, r.onu_id),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
