//! `poolsync status`: one refresh, printed as the field catalog.

use owo_colors::{OwoColorize, Stream};

use poolsync_core::{CoreError, catalog};

use crate::cli::{GlobalOpts, OutputFormat, StatusArgs};
use crate::config::{self, Target};
use crate::error::CliError;
use crate::output::{self, FieldRow};

pub async fn handle(args: StatusArgs, target: Target, global: &GlobalOpts) -> Result<(), CliError> {
    let units = target.coordinator.units;
    let coordinator = config::connect(target).await?;

    if args.diagnostics {
        let doc = coordinator.diagnostics();
        let out = output::render_single(&global.output, &doc, |d| {
            serde_json::to_string_pretty(d).unwrap_or_default()
        })?;
        output::print_output(&out, global.quiet);
        coordinator.shutdown().await;
        return Ok(());
    }

    let snapshot = coordinator.current_snapshot().ok_or(CoreError::NoData)?;
    let mut readings = catalog::evaluate(&snapshot, units);
    if !args.all {
        readings.retain(|r| !r.value.is_absent());
    }

    if matches!(global.output, OutputFormat::Table) && !global.quiet {
        if let Some(info) = coordinator.device_info() {
            println!(
                "{} {} · firmware {} · {}",
                info.name.if_supports_color(Stream::Stdout, |t| t.bold()),
                info.model,
                info.firmware.as_deref().unwrap_or("?"),
                info.configuration_url
            );
        }
    }

    let out = output::render_list(&global.output, &readings, |r| FieldRow::from(r), |r| {
        format!("{}\t{}", r.key, r.value)
    })?;
    output::print_output(&out, global.quiet);

    coordinator.shutdown().await;
    Ok(())
}
