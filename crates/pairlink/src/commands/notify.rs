//! `pairlink notify`: appointment confirmation through the bridge.

use tokio_util::sync::CancellationToken;

use pairlink_api::NotificationRequest;
use pairlink_core::LinkConfig;

use crate::cli::{GlobalOpts, NotifyArgs};
use crate::config::Defaults;
use crate::error::CliError;

use super::session::non_empty;

pub async fn handle(
    link_config: &LinkConfig,
    defaults: &Defaults,
    args: NotifyArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let request = NotificationRequest {
        number: args.number,
        name: args.name,
        patient: args.patient,
        date: args.date,
        time: args.time,
    };
    request
        .validate(&defaults.notify_prefix, defaults.notify_min_len)
        .map_err(|reason| CliError::Validation {
            field: "number".into(),
            reason,
        })?;

    let client = link_config.build_client()?;
    tracing::info!(number = %request.number, "sending appointment notification");
    let response = client.notify(&request, &CancellationToken::new()).await?;

    if !response.ok {
        return Err(CliError::Rejected {
            message: response.message,
        });
    }
    if !global.quiet {
        eprintln!("✓ {}", non_empty(&response.message, "Notification sent"));
    }
    Ok(())
}
