//! `pairlink unlink`: drop the linked account and show a fresh code.

use tokio::sync::broadcast::error::RecvError;

use pairlink_core::{LinkConfig, LinkController, LinkEvent, LinkState, UnlinkPhase, UnlinkProcedure};

use crate::cli::{GlobalOpts, UnlinkArgs};
use crate::error::CliError;

use super::{pair, util};

pub async fn handle(
    link_config: LinkConfig,
    args: UnlinkArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if !util::confirm(
        "Unlink the current account? Messages stop until a new code is scanned.",
        "unlink",
        global.yes,
    )? {
        return Ok(());
    }

    let controller = LinkController::new(link_config)?;
    let result = unlink(&controller, &args, global).await;
    controller.dispose();
    result
}

async fn unlink(
    controller: &LinkController,
    args: &UnlinkArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let session = controller.initialize().await?;
    if session.state == LinkState::Error {
        return Err(CliError::LinkFailed {
            message: session.last_error.unwrap_or_default(),
        });
    }

    let mut events = controller.events();
    let bar = util::spinner(global, "Requesting unlink");

    let unlink = controller.unlink();
    tokio::pin!(unlink);
    let result = loop {
        tokio::select! {
            result = &mut unlink => break result,
            event = events.recv() => match event {
                Ok(LinkEvent::UnlinkPhase(procedure)) => bar.set_message(phase_message(&procedure)),
                Err(RecvError::Closed) => break (&mut unlink).await,
                Ok(_) | Err(RecvError::Lagged(_)) => {}
            },
        }
    };
    bar.finish_and_clear();

    let session = result?;
    if session.state == LinkState::Error {
        return Err(CliError::LinkFailed {
            message: session.last_error.unwrap_or_default(),
        });
    }

    pair::show_code(&session, global);

    if args.wait {
        // Events up to here were for the unlink itself.
        let mut events = events.resubscribe();
        pair::wait_for_scan(
            controller,
            &mut events,
            args.max_wait.map(Into::into),
            global,
        )
        .await?;
    }
    Ok(())
}

fn phase_message(procedure: &UnlinkProcedure) -> String {
    let UnlinkProcedure {
        phase,
        attempt,
        max_attempts,
        ..
    } = *procedure;
    match phase {
        UnlinkPhase::Requesting => "Requesting unlink".into(),
        UnlinkPhase::AwaitingDisconnectConfirm => {
            format!("Waiting for the bridge to disconnect ({attempt}/{max_attempts})")
        }
        UnlinkPhase::AwaitingCodeRegeneration => {
            format!("Waiting for a new pairing code ({attempt}/{max_attempts})")
        }
        UnlinkPhase::Done => "Unlinked".into(),
        UnlinkPhase::Failed => "Unlink failed".into(),
    }
}
