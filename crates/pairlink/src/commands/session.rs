//! `pairlink close-session`: drop the bridge socket, keep credentials.

use tokio_util::sync::CancellationToken;

use pairlink_core::LinkConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub async fn handle(link_config: &LinkConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let client = link_config.build_client()?;
    let response = client.close_session(&CancellationToken::new()).await?;

    if !response.ok {
        return Err(CliError::Rejected {
            message: response.message,
        });
    }
    if !global.quiet {
        eprintln!("✓ {}", non_empty(&response.message, "Bridge session closed"));
    }
    Ok(())
}

pub(crate) fn non_empty<'a>(message: &'a str, fallback: &'a str) -> &'a str {
    if message.trim().is_empty() {
        fallback
    } else {
        message
    }
}
