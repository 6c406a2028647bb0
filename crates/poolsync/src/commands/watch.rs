//! `poolsync watch`: keep the coordinator running and print each cycle.

use std::collections::BTreeMap;
use std::time::Duration;

use futures_util::StreamExt;
use owo_colors::{OwoColorize, Stream};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;

use poolsync_core::{CoreError, FieldValue, Snapshot, SyncEvent, UnitSystem, catalog};

use crate::cli::{GlobalOpts, OutputFormat, WatchArgs};
use crate::config::{self, Target};
use crate::error::CliError;
use crate::output;

/// Which catalog fields a watch prints.
fn selected_fields(keys: &[String]) -> Result<Vec<&'static catalog::FieldSpec>, CliError> {
    if keys.is_empty() {
        return Ok(catalog::fields().iter().collect());
    }
    keys.iter()
        .map(|key| {
            catalog::find(key)
                .ok_or_else(|| CliError::from(CoreError::UnknownField { key: key.clone() }))
        })
        .collect()
}

fn render_cycle(
    format: &OutputFormat,
    snapshot: &Snapshot,
    fields: &[&'static catalog::FieldSpec],
    units: UnitSystem,
) -> Result<String, CliError> {
    let values: BTreeMap<&str, FieldValue> = fields
        .iter()
        .map(|spec| (spec.key, spec.evaluate(snapshot)))
        .filter(|(_, v)| !v.is_absent())
        .collect();

    match format {
        OutputFormat::Json | OutputFormat::JsonCompact => {
            let line = serde_json::json!({
                "fetched_at": snapshot.fetched_at(),
                "fields": values,
            });
            output::render_json(&line, true)
        }
        OutputFormat::Yaml => {
            let doc = serde_json::json!({
                "fetched_at": snapshot.fetched_at(),
                "fields": values,
            });
            Ok(format!("---\n{}", output::render_yaml(&doc)?))
        }
        OutputFormat::Table | OutputFormat::Plain => {
            let stamp = snapshot
                .fetched_at()
                .with_timezone(&chrono::Local)
                .format("%H:%M:%S")
                .to_string();
            let body = fields
                .iter()
                .filter_map(|spec| {
                    let value = values.get(spec.key)?;
                    let unit = spec.unit_symbol(units);
                    let sep = if unit.is_empty() { "" } else { " " };
                    Some(format!("{}={}{sep}{unit}", spec.key, output::paint_value(value)))
                })
                .collect::<Vec<_>>()
                .join("  ");
            Ok(format!(
                "{}  {body}",
                stamp.if_supports_color(Stream::Stdout, |t| t.dimmed())
            ))
        }
    }
}

pub async fn handle(args: WatchArgs, mut target: Target, global: &GlobalOpts) -> Result<(), CliError> {
    let fields = selected_fields(&args.field)?;
    if let Some(secs) = args.interval {
        target.coordinator.refresh_interval = Duration::from_secs(secs);
    }
    let units = target.coordinator.units;
    let profile = target.profile.clone();

    let coordinator = config::connect(target).await?;
    let mut events = BroadcastStream::new(coordinator.events());

    let mut printed = 0usize;
    if let Some(snapshot) = coordinator.current_snapshot() {
        output::print_output(&render_cycle(&global.output, &snapshot, &fields, units)?, global.quiet);
        printed += 1;
    }

    let result = loop {
        if args.count.is_some_and(|n| printed >= n) {
            break Ok(());
        }
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            event = events.next() => event,
        };
        match event {
            Some(Ok(SyncEvent::Updated(snapshot))) => {
                output::print_output(
                    &render_cycle(&global.output, &snapshot, &fields, units)?,
                    global.quiet,
                );
                printed += 1;
            }
            Some(Ok(SyncEvent::Failed { kind, message })) => {
                let retry = humantime::format_duration(coordinator.status().interval);
                eprintln!(
                    "{} {message} ({kind:?}); retrying in {retry}",
                    "warning:".if_supports_color(Stream::Stderr, |t| t.yellow()),
                );
            }
            Some(Ok(SyncEvent::NeedsRepairing)) => {
                break Err(CliError::AuthFailed {
                    profile: profile.clone(),
                });
            }
            Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                tracing::warn!(skipped, "output fell behind, some refreshes were not printed");
            }
            None => break Ok(()),
        }
    };

    coordinator.shutdown().await;
    result
}
