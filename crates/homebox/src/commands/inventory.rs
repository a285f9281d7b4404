//! Snapshot, asset and location handlers.

use std::fmt::Write as _;

use tabled::Tabled;

use homebox_core::{Asset, Coordinator, Location, Snapshot};

use crate::cli::{AssetsArgs, GlobalOpts, MoveArgs, RefreshArgs};
use crate::error::CliError;
use crate::output;

// ── Row types ────────────────────────────────────────────────────────

#[derive(Tabled)]
struct AssetRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Qty")]
    quantity: i64,
    #[tabled(rename = "Location")]
    location: String,
    #[tabled(rename = "Modified")]
    modified: String,
}

#[derive(Tabled)]
struct LocationRow {
    #[tabled(rename = "ID")]
    id: String,
    #[tabled(rename = "Path")]
    path: String,
    #[tabled(rename = "Assets")]
    assets: usize,
}

fn asset_row(snapshot: &Snapshot, asset: &Asset) -> AssetRow {
    AssetRow {
        id: asset.id.to_string(),
        name: asset.name.clone(),
        quantity: asset.quantity,
        location: location_label(snapshot, asset),
        modified: asset
            .last_modified
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_default(),
    }
}

fn location_label(snapshot: &Snapshot, asset: &Asset) -> String {
    match &asset.location_id {
        Some(id) => snapshot
            .location_path(id.as_str())
            .unwrap_or_else(|| format!("{id} (unknown)")),
        None => "-".into(),
    }
}

// ── Handlers ─────────────────────────────────────────────────────────

pub fn snapshot(snapshot: &Snapshot, global: &GlobalOpts) -> Result<(), CliError> {
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        snapshot,
        |s| snapshot_detail(s, color),
        |s| s.fetch_status().to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn snapshot_detail(snapshot: &Snapshot, color: bool) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Fetched:    {}",
        snapshot.fetched_at().format("%Y-%m-%d %H:%M:%S UTC")
    );
    let _ = writeln!(
        out,
        "Status:     {}",
        output::status_label(snapshot.fetch_status(), color)
    );
    let _ = writeln!(out, "Assets:     {}", snapshot.assets().len());
    let _ = write!(out, "Locations:  {}", snapshot.locations().len());
    let issues = snapshot.integrity_issues();
    if !issues.is_empty() {
        let _ = write!(out, "\nIssues:     {}", issues.len());
        for issue in issues {
            let _ = write!(out, "\n  - {issue}");
        }
    }
    out
}

pub fn assets(snapshot: &Snapshot, args: &AssetsArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let assets: Vec<Asset> = match &args.location {
        Some(location) => {
            if snapshot.location(location).is_none() {
                return Err(location_not_found(location));
            }
            let mut at = snapshot.assets_at(location);
            at.sort_by(|a, b| a.id.cmp(&b.id));
            at.into_iter().cloned().collect()
        }
        None => snapshot.assets_sorted().into_iter().cloned().collect(),
    };

    let out = output::render_list(
        &global.output,
        &assets,
        |a| asset_row(snapshot, a),
        |a| a.id.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub fn locations(snapshot: &Snapshot, global: &GlobalOpts) -> Result<(), CliError> {
    let mut locations: Vec<(String, Location)> = snapshot
        .locations()
        .values()
        .map(|l| {
            let path = snapshot
                .location_path(l.id.as_str())
                .unwrap_or_else(|| l.name.clone());
            (path, l.clone())
        })
        .collect();
    locations.sort_by(|a, b| a.0.cmp(&b.0));
    let locations: Vec<Location> = locations.into_iter().map(|(_, l)| l).collect();

    let out = output::render_list(
        &global.output,
        &locations,
        |l| LocationRow {
            id: l.id.to_string(),
            path: snapshot
                .location_path(l.id.as_str())
                .unwrap_or_else(|| l.name.clone()),
            assets: snapshot.assets_at(l.id.as_str()).len(),
        },
        |l| l.id.to_string(),
    )?;
    output::print_output(&out, global.quiet);

    if !global.quiet && !snapshot.integrity_issues().is_empty() {
        eprintln!(
            "{} location(s) excluded or repaired; run `homebox snapshot` for details",
            snapshot.integrity_issues().len()
        );
    }
    Ok(())
}

pub async fn refresh(
    coordinator: &Coordinator,
    args: RefreshArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let Some(asset) = coordinator.refresh_asset(args.asset.as_str().into()).await? else {
        return Err(CliError::NotFound {
            resource_type: "asset".into(),
            identifier: args.asset,
            list_command: "assets".into(),
        });
    };

    let snapshot = coordinator.snapshot();
    let out = output::render_single(
        &global.output,
        &asset,
        |a| {
            let location = snapshot
                .as_deref()
                .map_or_else(|| "-".into(), |s| location_label(s, a));
            format!(
                "ID:        {}\nName:      {}\nQuantity:  {}\nLocation:  {location}",
                a.id, a.name, a.quantity
            )
        },
        |a| a.id.to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn move_asset(
    coordinator: &Coordinator,
    args: &MoveArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let destination = coordinator
        .snapshot()
        .and_then(|s| s.location_path(&args.location))
        .ok_or_else(|| location_not_found(&args.location))?;

    coordinator
        .move_asset(args.asset.as_str().into(), args.location.as_str().into())
        .await?;

    if !global.quiet {
        eprintln!("Moved {} to {destination}", args.asset);
    }
    Ok(())
}

fn location_not_found(id: &str) -> CliError {
    CliError::NotFound {
        resource_type: "location".into(),
        identifier: id.into(),
        list_command: "locations".into(),
    }
}
