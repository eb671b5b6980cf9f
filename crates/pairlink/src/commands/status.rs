//! `pairlink status`: one status call, no controller.

use serde::Serialize;
use tokio_util::sync::CancellationToken;

use pairlink_core::{LinkConfig, LinkState};

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct StatusView {
    bridge: String,
    connected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    identifier: Option<String>,
}

pub async fn handle(link_config: &LinkConfig, global: &GlobalOpts) -> Result<(), CliError> {
    let client = link_config.build_client()?;
    let status = client.status(&CancellationToken::new()).await?;

    let view = StatusView {
        bridge: link_config.url.to_string(),
        connected: status.connected,
        identifier: status.identifier,
    };

    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        &view,
        |v| {
            let state = if v.connected {
                LinkState::Connected
            } else {
                LinkState::Disconnected
            };
            let mut detail = format!(
                "Bridge:   {}\nState:    {}",
                v.bridge,
                output::state_label(state, color)
            );
            if let Some(ref identifier) = v.identifier {
                detail.push_str(&format!("\nAccount:  {identifier}"));
            }
            detail
        },
        |v| v.connected.to_string(),
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
