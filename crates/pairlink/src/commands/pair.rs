//! `pairlink pair`: show the pairing code and wait for the scan.
//!
//! Follows the controller's event stream rather than polling the bridge
//! itself. Codes older than the profile's staleness threshold are
//! replaced through `refresh()`.

use std::time::Duration;

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::time::{Instant, MissedTickBehavior};

use pairlink_core::{LinkConfig, LinkController, LinkEvent, LinkSession, LinkState};

use crate::cli::{GlobalOpts, PairArgs};
use crate::error::CliError;
use crate::output;

use super::util;

/// How often the pairing code's age is checked.
const STALE_CHECK_INTERVAL: Duration = Duration::from_secs(5);

pub async fn handle(
    link_config: LinkConfig,
    args: PairArgs,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let controller = LinkController::new(link_config)?;
    // Subscribe first so the transitions made by initialize() are seen.
    let mut events = controller.events();

    let result = pair(&controller, &mut events, args.max_wait.map(Into::into), global).await;
    controller.dispose();
    result
}

async fn pair(
    controller: &LinkController,
    events: &mut broadcast::Receiver<LinkEvent>,
    max_wait: Option<Duration>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    controller.initialize().await?;
    wait_for_scan(controller, events, max_wait, global).await
}

/// Follow `events` until the bridge reports a linked session.
///
/// Prints every new pairing code. Returns `Ok` on a successful scan or
/// on Ctrl-C, `Err` when the session fails or `max_wait` runs out.
pub(crate) async fn wait_for_scan(
    controller: &LinkController,
    events: &mut broadcast::Receiver<LinkEvent>,
    max_wait: Option<Duration>,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    if let Some(done) = settled(controller.snapshot()) {
        return done.map(|session| show_linked(&session, global));
    }

    let bar = util::spinner(global, "Waiting for the code to be scanned");
    let deadline = max_wait.map(|wait| Instant::now() + wait);
    let mut stale_check = tokio::time::interval(STALE_CHECK_INTERVAL);
    stale_check.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let outcome = loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(LinkEvent::PairingCodeRefreshed { .. }) => {
                    bar.suspend(|| show_code(&controller.snapshot(), global));
                }
                Ok(LinkEvent::Connected { .. }) => break Ok(Some(controller.snapshot())),
                Ok(LinkEvent::Failed { message }) => break Err(CliError::LinkFailed { message }),
                Ok(LinkEvent::Disposed) | Err(RecvError::Closed) => {
                    break Err(pairlink_core::CoreError::Disposed.into());
                }
                Ok(LinkEvent::Disconnected | LinkEvent::UnlinkPhase(_)) => {}
                Err(RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "event stream lagged, re-reading snapshot");
                    if let Some(done) = settled(controller.snapshot()) {
                        break done.map(Some);
                    }
                }
            },
            _ = stale_check.tick() => {
                if controller.is_pairing_stale() {
                    util::note(&bar, global, "Pairing code expired, requesting a fresh one");
                    if let Err(e) = controller.refresh().await {
                        break Err(e.into());
                    }
                }
            },
            () = until(deadline) => {
                let seconds = max_wait.map_or(0, |wait| wait.as_secs());
                break Err(CliError::Timeout { seconds });
            },
            _ = tokio::signal::ctrl_c() => break Ok(None),
        }
    };
    bar.finish_and_clear();

    match outcome? {
        Some(session) => show_linked(&session, global),
        None => {
            if !global.quiet {
                eprintln!("Interrupted, pairing code left in place");
            }
        }
    }
    Ok(())
}

/// Terminal states: linked, or failed with a message.
fn settled(session: LinkSession) -> Option<Result<LinkSession, CliError>> {
    match session.state {
        LinkState::Connected => Some(Ok(session)),
        LinkState::Error => Some(Err(CliError::LinkFailed {
            message: session.last_error.unwrap_or_default(),
        })),
        LinkState::Loading | LinkState::Disconnected => None,
    }
}

async fn until(deadline: Option<Instant>) {
    match deadline {
        Some(deadline) => tokio::time::sleep_until(deadline).await,
        None => std::future::pending().await,
    }
}

/// Print the session's pairing code in the selected format.
pub(crate) fn show_code(session: &LinkSession, global: &GlobalOpts) {
    let out = output::render_single(
        &global.output,
        session,
        |s| {
            let code = s.pairing_code.as_deref().unwrap_or("(none)");
            format!("Scan this code with the linked phone:\n\n    {code}\n")
        },
        output::session_plain,
    );
    output::print_output(&out, global.quiet);
}

fn show_linked(session: &LinkSession, global: &GlobalOpts) {
    let color = output::should_color(&global.color);
    let out = output::render_single(
        &global.output,
        session,
        |s| output::session_detail(s, color),
        output::session_plain,
    );
    output::print_output(&out, global.quiet);
}
