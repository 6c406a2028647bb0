//! Command dispatch: bridges CLI args -> coordinator calls -> output formatting.

pub mod config_cmd;
pub mod get;
pub mod pair;
pub mod set;
pub mod status;
pub mod watch;

use crate::cli::{Command, GlobalOpts};
use crate::config::Target;
use crate::error::CliError;

/// Dispatch a command that needs a paired hub.
pub async fn dispatch(cmd: Command, target: Target, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Status(args) => status::handle(args, target, global).await,
        Command::Watch(args) => watch::handle(args, target, global).await,
        Command::Get(args) => get::handle(args, target, global).await,
        Command::Set(args) => set::handle(args, target, global).await,
        // Pair, Config, and Completions are handled before dispatch
        Command::Pair(_) | Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
