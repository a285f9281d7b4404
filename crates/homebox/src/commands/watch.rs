//! Long-running sync: print changes as the coordinator publishes them.

use std::sync::Arc;

use serde_json::json;

use homebox_core::{Coordinator, CoordinatorEvent, EventFilter, LocationId, Snapshot};

use crate::cli::{GlobalOpts, OutputFormat};
use crate::error::CliError;
use crate::output;

pub async fn handle(
    coordinator: &Coordinator,
    snapshot: &Arc<Snapshot>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let json = matches!(global.output, OutputFormat::Json | OutputFormat::JsonCompact);

    // Snapshot payloads are summarized; the full view is `homebox snapshot`.
    let mut events = coordinator.subscribe_filtered(EventFilter::All);
    emit(&summary_line(snapshot, color), &summary_json(snapshot), json, global.quiet);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted, stopping");
                break;
            }
            event = events.recv() => {
                let Some(event) = event else { break };
                let (line, value) = describe(&event, coordinator, color);
                emit(&line, &value, json, global.quiet);
            }
        }
    }
    Ok(())
}

fn emit(line: &str, value: &serde_json::Value, json: bool, quiet: bool) {
    if json {
        output::print_output(&value.to_string(), quiet);
    } else {
        output::print_output(line, quiet);
    }
}

fn summary_line(snapshot: &Snapshot, color: bool) -> String {
    format!(
        "[{}] snapshot {}: {} assets, {} locations",
        snapshot.fetched_at().format("%H:%M:%S"),
        output::status_label(snapshot.fetch_status(), color),
        snapshot.assets().len(),
        snapshot.locations().len()
    )
}

fn summary_json(snapshot: &Snapshot) -> serde_json::Value {
    json!({
        "event": "snapshot_updated",
        "fetched_at": snapshot.fetched_at(),
        "fetch_status": snapshot.fetch_status(),
        "assets": snapshot.assets().len(),
        "locations": snapshot.locations().len(),
        "integrity_issues": snapshot.integrity_issues().len(),
    })
}

fn describe(
    event: &CoordinatorEvent,
    coordinator: &Coordinator,
    color: bool,
) -> (String, serde_json::Value) {
    match event {
        CoordinatorEvent::SnapshotUpdated(snapshot) => {
            (summary_line(snapshot, color), summary_json(snapshot))
        }
        CoordinatorEvent::LocationChanged(change) => {
            let snapshot = coordinator.snapshot();
            let path = |id: Option<&str>| {
                id.map_or_else(
                    || "-".to_owned(),
                    |id| {
                        snapshot
                            .as_deref()
                            .and_then(|s| s.location_path(id))
                            .unwrap_or_else(|| id.to_owned())
                    },
                )
            };
            let name = snapshot
                .as_deref()
                .and_then(|s| s.asset(change.asset_id.as_str()))
                .map_or_else(|| change.asset_id.to_string(), |a| a.name.clone());
            let line = format!(
                "moved {name}: {} -> {}",
                path(change.old_location_id.as_ref().map(LocationId::as_str)),
                path(change.new_location_id.as_ref().map(LocationId::as_str)),
            );
            let mut value = serde_json::to_value(change).unwrap_or_default();
            value["event"] = json!("location_changed");
            (line, value)
        }
        CoordinatorEvent::StatusChanged { status, message } => {
            let line = match message {
                Some(message) => format!(
                    "status {}: {message}",
                    output::status_label(*status, color)
                ),
                None => format!("status {}", output::status_label(*status, color)),
            };
            let value = json!({
                "event": "status_changed",
                "status": status,
                "message": message,
            });
            (line, value)
        }
        CoordinatorEvent::AssetRefreshed { asset_id, removed } => {
            let line = if *removed {
                format!("asset {asset_id} removed")
            } else {
                format!("asset {asset_id} refreshed")
            };
            let value = json!({
                "event": "asset_refreshed",
                "asset_id": asset_id,
                "removed": removed,
            });
            (line, value)
        }
    }
}
