//! Rendering for `--output`: rounded tables, JSON, YAML or bare ids.

use std::io::{self, IsTerminal, Write};

use serde::Serialize;
use tabled::{Table, Tabled, settings::Style};

use crate::cli::{ColorMode, OutputFormat};

pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => std::env::var_os("NO_COLOR").is_none() && io::stdout().is_terminal(),
    }
}

/// Serialized form for the machine-readable formats, `None` for the
/// human ones.
fn structured<T: Serialize + ?Sized>(format: &OutputFormat, data: &T) -> Option<String> {
    let text = match format {
        OutputFormat::Json => serde_json::to_string_pretty(data).map_err(|e| e.to_string()),
        OutputFormat::JsonCompact => serde_json::to_string(data).map_err(|e| e.to_string()),
        OutputFormat::Yaml => serde_yaml::to_string(data).map_err(|e| e.to_string()),
        OutputFormat::Table | OutputFormat::Plain => return None,
    };
    Some(text.unwrap_or_else(|e| format!("serialization failed: {e}")))
}

/// Render a collection. `to_row` builds the table view of one item and
/// `id_of` its plain-format line.
pub fn render_list<T, R>(
    format: &OutputFormat,
    items: &[T],
    to_row: impl Fn(&T) -> R,
    id_of: impl Fn(&T) -> String,
) -> String
where
    T: Serialize,
    R: Tabled,
{
    if let Some(text) = structured(format, items) {
        return text;
    }
    if matches!(format, OutputFormat::Plain) {
        return items.iter().map(id_of).collect::<Vec<_>>().join("\n");
    }
    let rows: Vec<R> = items.iter().map(to_row).collect();
    Table::new(rows).with(Style::rounded()).to_string()
}

/// Render one value. `detail` produces the table-format text.
pub fn render_single<T: Serialize>(
    format: &OutputFormat,
    item: &T,
    detail: impl Fn(&T) -> String,
    id_of: impl Fn(&T) -> String,
) -> String {
    structured(format, item).unwrap_or_else(|| match format {
        OutputFormat::Plain => id_of(item),
        _ => detail(item),
    })
}

pub fn print_output(rendered: &str, quiet: bool) {
    if quiet || rendered.is_empty() {
        return;
    }
    let _ = writeln!(io::stdout().lock(), "{rendered}");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize)]
    struct Port {
        slot: u32,
    }

    #[derive(Tabled)]
    struct PortRow {
        #[tabled(rename = "Slot")]
        slot: u32,
    }

    fn render(format: &OutputFormat) -> String {
        let ports = [Port { slot: 3 }, Port { slot: 10 }];
        render_list(format, &ports, |p| PortRow { slot: p.slot }, |p| p.slot.to_string())
    }

    #[test]
    fn plain_is_one_line_per_item() {
        assert_eq!(render(&OutputFormat::Plain), "3\n10");
    }

    #[test]
    fn compact_json_is_single_line() {
        assert_eq!(render(&OutputFormat::JsonCompact), r#"[{"slot":3},{"slot":10}]"#);
    }

    #[test]
    fn table_carries_renamed_header() {
        let table = render(&OutputFormat::Table);
        assert!(table.contains("Slot"));
        assert!(table.contains("╭"));
    }

    #[test]
    fn single_plain_uses_id() {
        let out = render_single(&OutputFormat::Plain, &Port { slot: 7 }, |_| "detail".into(), |p| {
            p.slot.to_string()
        });
        assert_eq!(out, "7");
    }
}
