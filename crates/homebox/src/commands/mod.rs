//! Command dispatch: bridges CLI args -> coordinator -> output formatting.

pub mod config_cmd;
pub mod inventory;
pub mod watch;
pub mod webhook;

use homebox_core::Coordinator;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Start the coordinator, run a command against it, and shut it down.
pub async fn dispatch(
    cmd: Command,
    coordinator: &Coordinator,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let snapshot = coordinator.start().await?;

    let result = match cmd {
        Command::Snapshot => inventory::snapshot(&snapshot, global),
        Command::Assets(args) => inventory::assets(&snapshot, &args, global),
        Command::Locations => inventory::locations(&snapshot, global),
        Command::Refresh(args) => inventory::refresh(coordinator, args, global).await,
        Command::Move(args) => inventory::move_asset(coordinator, &args, global).await,
        Command::Watch(_) => watch::handle(coordinator, &snapshot, global).await,
        Command::Config(_) | Command::Completions(_) | Command::Webhook(_) => Err(
            CliError::Internal("command does not run through the coordinator".into()),
        ),
    };

    coordinator.shutdown().await;
    result
}
