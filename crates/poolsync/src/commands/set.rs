//! `poolsync set <field> <value>`: validated write, then a refresh.

use std::str::FromStr;

use owo_colors::{OwoColorize, Stream};
use serde::Serialize;

use poolsync_core::{FieldValue, HeatMode, PollResult, WritableField};

use crate::cli::{GlobalOpts, SetArgs};
use crate::config::{self, Target};
use crate::error::CliError;
use crate::output;

enum Requested {
    Mode(HeatMode),
    Number(f64),
}

fn parse_field(raw: &str) -> Result<WritableField, CliError> {
    WritableField::from_str(raw).map_err(|_| CliError::NotFound {
        resource_type: "writable field".into(),
        identifier: raw.to_owned(),
        hint: "Writable fields: chlor_output, hp_setpoint, hp_mode".into(),
    })
}

fn parse_value(field: WritableField, raw: &str) -> Result<Requested, CliError> {
    if field == WritableField::Mode {
        if let Ok(mode) = HeatMode::from_str(raw) {
            return Ok(Requested::Mode(mode));
        }
    }
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .map(Requested::Number)
        .ok_or_else(|| CliError::Validation {
            field: field.to_string(),
            reason: format!("'{raw}' is not a number"),
        })
}

#[derive(Serialize)]
struct SetResult {
    field: String,
    value: FieldValue,
    unit: Option<&'static str>,
    refreshed: bool,
}

pub async fn handle(args: SetArgs, target: Target, global: &GlobalOpts) -> Result<(), CliError> {
    let field = parse_field(&args.field)?;
    let requested = parse_value(field, &args.value)?;
    let units = target.coordinator.units;
    let profile = target.profile.clone();

    let coordinator = config::connect(target).await?;
    let written = match requested {
        Requested::Mode(mode) => coordinator.set_heat_mode(mode).await,
        Requested::Number(value) => coordinator.write_setting(field, value).await,
    };
    let result = written.map_err(|e| CliError::from(e).for_profile(&profile));
    coordinator.shutdown().await;

    let spec = field.spec();
    let (value, refreshed) = match result? {
        PollResult::Updated(snapshot) => (spec.evaluate(&snapshot), true),
        other => {
            tracing::warn!(result = ?other, "value written but the follow-up refresh failed");
            (FieldValue::Absent, false)
        }
    };

    let result = SetResult {
        field: spec.key.to_owned(),
        value,
        unit: spec.unit.map(|u| u.symbol(units)),
        refreshed,
    };
    let out = output::render_single(&global.output, &result, |r| {
        if r.refreshed {
            format!(
                "{} {} = {}{}",
                "✓".if_supports_color(Stream::Stdout, |t| t.green()),
                r.field,
                output::paint_value(&r.value),
                r.unit.map(|u| format!(" {u}")).unwrap_or_default()
            )
        } else {
            format!("{} written; refresh pending", r.field)
        }
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn mode_accepts_names_and_numbers() {
        assert!(matches!(
            parse_value(WritableField::Mode, "cool").unwrap(),
            Requested::Mode(HeatMode::Cool)
        ));
        assert!(matches!(
            parse_value(WritableField::Mode, "1").unwrap(),
            Requested::Number(_)
        ));
        assert!(parse_value(WritableField::Setpoint, "warm").is_err());
        assert!(parse_value(WritableField::Setpoint, "NaN").is_err());
    }

    #[test]
    fn fields_parse_by_key_or_wire_name() {
        assert_eq!(parse_field("hp_setpoint").unwrap(), WritableField::Setpoint);
        assert_eq!(parse_field("chlorOutput").unwrap(), WritableField::ChlorOutput);
        assert!(matches!(
            parse_field("salt_ppm"),
            Err(CliError::NotFound { .. })
        ));
    }
}
