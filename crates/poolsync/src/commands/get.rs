//! `poolsync get <path>`: raw JSON at a dotted path of the snapshot.

use serde_json::Value;

use poolsync_core::{CoreError, FieldPath};

use crate::cli::{GetArgs, GlobalOpts};
use crate::config::{self, Target};
use crate::error::CliError;
use crate::output;

pub async fn handle(args: GetArgs, target: Target, global: &GlobalOpts) -> Result<(), CliError> {
    let path = args.path.parse::<FieldPath>().map_err(|e| CliError::Validation {
        field: "path".into(),
        reason: e.to_string(),
    })?;

    let coordinator = config::connect(target).await?;
    let snapshot = coordinator.current_snapshot().ok_or(CoreError::NoData)?;
    let value = snapshot
        .get(&path)
        .cloned()
        .ok_or_else(|| CliError::NotFound {
            resource_type: "path".into(),
            identifier: path.to_string(),
            hint: "Run: poolsync get '' -o json to see the whole snapshot".into(),
        });
    coordinator.shutdown().await;

    let out = output::render_single(&global.output, &value?, |v| match v {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}
