//! Output formatting: table, JSON, YAML, plain.
//!
//! Renders data in the format selected by `--output`. Table uses `tabled`,
//! structured formats use serde, plain emits one line per item.

use std::io::{self, IsTerminal, Write};

use owo_colors::{OwoColorize, Stream};
use tabled::{Table, Tabled, settings::Style};

use poolsync_core::{FieldReading, FieldValue};

use crate::cli::{ColorMode, OutputFormat};
use crate::error::CliError;

// ── Color helpers ────────────────────────────────────────────────────

/// Determine whether color output should be enabled.
pub fn should_color(mode: &ColorMode) -> bool {
    match mode {
        ColorMode::Always => true,
        ColorMode::Never => false,
        ColorMode::Auto => io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    }
}

/// Apply the global color choice to every `if_supports_color` call.
pub fn init_color(mode: &ColorMode) {
    match mode {
        ColorMode::Always => owo_colors::set_override(true),
        ColorMode::Never => owo_colors::set_override(false),
        ColorMode::Auto => {
            if !should_color(mode) {
                owo_colors::set_override(false);
            }
        }
    }
}

/// Value text colored by kind: on/off states green/red, absent dimmed.
pub fn paint_value(value: &FieldValue) -> String {
    let text = value.to_string();
    match value {
        FieldValue::Bool(true) => text
            .if_supports_color(Stream::Stdout, |t| t.green())
            .to_string(),
        FieldValue::Bool(false) => text
            .if_supports_color(Stream::Stdout, |t| t.red())
            .to_string(),
        FieldValue::Absent => text
            .if_supports_color(Stream::Stdout, |t| t.dimmed())
            .to_string(),
        _ => text,
    }
}

// ── Rows ─────────────────────────────────────────────────────────────

#[derive(Tabled)]
pub struct FieldRow {
    #[tabled(rename = "Equipment")]
    pub scope: String,
    #[tabled(rename = "Field")]
    pub name: String,
    #[tabled(rename = "Value")]
    pub value: String,
    #[tabled(rename = "Key")]
    pub key: String,
}

impl From<&FieldReading> for FieldRow {
    fn from(r: &FieldReading) -> Self {
        let value = match r.unit {
            Some(unit) if !r.value.is_absent() => format!("{} {unit}", paint_value(&r.value)),
            _ => paint_value(&r.value),
        };
        Self {
            scope: r.scope.to_string(),
            name: r.name.to_owned(),
            value,
            key: r.key.to_owned(),
        }
    }
}

// ── Render dispatchers ───────────────────────────────────────────────

/// Render a list of serde-serializable + tabled items in the chosen format.
pub fn render_list<T, R>(
    format: &OutputFormat,
    data: &[T],
    to_row: impl Fn(&T) -> R,
    plain_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize,
    R: Tabled,
{
    Ok(match format {
        OutputFormat::Table => {
            let rows: Vec<R> = data.iter().map(to_row).collect();
            render_table(&rows)
        }
        OutputFormat::Json => render_json(data, false)?,
        OutputFormat::JsonCompact => render_json(data, true)?,
        OutputFormat::Yaml => render_yaml(data)?,
        OutputFormat::Plain => data.iter().map(&plain_fn).collect::<Vec<_>>().join("\n"),
    })
}

/// Render a single serde-serializable item in the chosen format.
///
/// Table rendering uses `detail_fn`, since single values don't have rows.
pub fn render_single<T>(
    format: &OutputFormat,
    data: &T,
    detail_fn: impl Fn(&T) -> String,
) -> Result<String, CliError>
where
    T: serde::Serialize + ?Sized,
{
    Ok(match format {
        OutputFormat::Table | OutputFormat::Plain => detail_fn(data),
        OutputFormat::Json => render_json(data, false)?,
        OutputFormat::JsonCompact => render_json(data, true)?,
        OutputFormat::Yaml => render_yaml(data)?,
    })
}

/// Print the rendered output to stdout, respecting quiet mode.
pub fn print_output(output: &str, quiet: bool) {
    if quiet || output.is_empty() {
        return;
    }
    let mut stdout = io::stdout().lock();
    let _ = writeln!(stdout, "{output}");
}

// ── Format-specific renderers ────────────────────────────────────────

fn render_table<R: Tabled>(rows: &[R]) -> String {
    Table::new(rows).with(Style::rounded()).to_string()
}

pub(crate) fn render_json<T: serde::Serialize + ?Sized>(
    data: &T,
    compact: bool,
) -> Result<String, CliError> {
    Ok(if compact {
        serde_json::to_string(data)?
    } else {
        serde_json::to_string_pretty(data)?
    })
}

pub(crate) fn render_yaml<T: serde::Serialize + ?Sized>(data: &T) -> Result<String, CliError> {
    Ok(serde_yaml::to_string(data)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn single_value_formats() {
        let value = json!({ "mode": 1 });
        let json = render_single(&OutputFormat::JsonCompact, &value, ToString::to_string).unwrap();
        assert_eq!(json, r#"{"mode":1}"#);

        let yaml = render_single(&OutputFormat::Yaml, &value, ToString::to_string).unwrap();
        assert_eq!(yaml.trim(), "mode: 1");
    }

    #[test]
    fn field_rows_carry_units() {
        owo_colors::set_override(false);
        let reading = FieldReading {
            key: "salt_ppm",
            name: "Salt level",
            scope: poolsync_core::Scope::Hub,
            value: FieldValue::Number(3300.into()),
            unit: Some("ppm"),
        };
        let row = FieldRow::from(&reading);
        assert_eq!(row.value, "3300 ppm");
        assert_eq!(row.scope, "hub");
    }

    #[test]
    fn reading_list_renders_as_table_and_plain() {
        owo_colors::set_override(false);
        let readings = vec![FieldReading {
            key: "hp_setpoint",
            name: "Setpoint",
            scope: poolsync_core::Scope::Device(poolsync_core::DeviceKind::HeatPump),
            value: FieldValue::Number(82.into()),
            unit: Some("°F"),
        }];

        let table =
            render_list(&OutputFormat::Table, &readings, |r| FieldRow::from(r), |r| r.key.into())
                .unwrap();
        assert!(table.contains("Setpoint"));
        assert!(table.contains("82 °F"));

        let plain =
            render_list(&OutputFormat::Plain, &readings, |r| FieldRow::from(r), |r| r.key.into())
                .unwrap();
        assert_eq!(plain, "hp_setpoint");
    }
}
