//! Command dispatch: bridges CLI args -> controller / client calls -> output.

pub mod config_cmd;
pub mod notify;
pub mod pair;
pub mod session;
pub mod status;
pub mod unlink;
pub mod util;

use pairlink_core::LinkConfig;

use crate::cli::{Command, GlobalOpts};
use crate::config::{self, Config};
use crate::error::CliError;

/// Dispatch a bridge-bound command to the appropriate handler.
pub async fn dispatch(
    cmd: Command,
    cfg: &Config,
    link_config: LinkConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let result = match cmd {
        Command::Status => status::handle(&link_config, global).await,
        Command::Pair(args) => pair::handle(link_config, args, global).await,
        Command::Unlink(args) => unlink::handle(link_config, args, global).await,
        Command::CloseSession => session::handle(&link_config, global).await,
        Command::Notify(args) => notify::handle(&link_config, &cfg.defaults, args, global).await,
        // Config and Completions are handled before dispatch
        Command::Config(_) | Command::Completions(_) => Ok(()),
    };
    result.map_err(|e| e.for_profile(&config::active_profile_name(global, cfg)))
}
