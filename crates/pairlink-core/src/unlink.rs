// ── Unlink orchestrator ──
//
// Drives unlink → confirm disconnection → (relink kick) → wait for a fresh
// pairing code. Each waiting phase is a bounded poll: a fixed number of
// attempts at a fixed interval, after which the procedure fails for good.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use strum::Display;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::UnlinkPolicy;
use crate::remote::RemoteLink;

/// Where an unlink procedure stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum UnlinkPhase {
    Requesting,
    AwaitingDisconnectConfirm,
    AwaitingCodeRegeneration,
    Done,
    Failed,
}

/// Progress snapshot of a running unlink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct UnlinkProcedure {
    pub phase: UnlinkPhase,
    pub attempt: u32,
    pub max_attempts: u32,
    pub interval: Duration,
}

/// Why an unlink did not produce a new pairing code.
#[derive(Debug, Error)]
pub enum UnlinkError {
    /// The bridge answered the unlink request with `ok: false`.
    #[error("Bridge refused to unlink: {message}")]
    Rejected { message: String },

    /// The unlink request itself failed.
    #[error("Unlink request failed: {0}")]
    Request(#[source] pairlink_api::Error),

    /// A bounded phase ran out of attempts.
    #[error("{phase} exhausted after {attempts} attempts")]
    Exhausted { phase: UnlinkPhase, attempts: u32 },

    #[error("Unlink cancelled")]
    Cancelled,
}

impl UnlinkError {
    /// Operator-facing explanation, with what to do about it.
    pub fn remediation(&self) -> String {
        match self {
            Self::Exhausted {
                phase: UnlinkPhase::AwaitingDisconnectConfirm,
                attempts,
            } => format!(
                "Bridge did not confirm disconnection after {attempts} checks. \
                 Restart the bridge service, then refresh."
            ),
            Self::Exhausted {
                phase: UnlinkPhase::AwaitingCodeRegeneration,
                attempts,
            } => format!(
                "Bridge did not regenerate a pairing code after {attempts} checks. \
                 Restart the bridge service, then refresh."
            ),
            Self::Request(e) => match e {
                pairlink_api::Error::Remote { message, .. } => message.clone(),
                other => other.to_string(),
            },
            Self::Rejected { message } => message.clone(),
            other => other.to_string(),
        }
    }
}

/// Runs one unlink procedure against the bridge.
pub struct UnlinkOrchestrator<R> {
    remote: Arc<R>,
    policy: UnlinkPolicy,
    progress: Option<mpsc::UnboundedSender<UnlinkProcedure>>,
}

impl<R: RemoteLink> UnlinkOrchestrator<R> {
    pub fn new(remote: Arc<R>, policy: UnlinkPolicy) -> Self {
        Self {
            remote,
            policy,
            progress: None,
        }
    }

    /// Send a progress snapshot at every phase change and attempt.
    pub fn with_progress(mut self, progress: mpsc::UnboundedSender<UnlinkProcedure>) -> Self {
        self.progress = Some(progress);
        self
    }

    /// Run the whole procedure. On success returns the new pairing code.
    pub async fn run(&self, cancel: &CancellationToken) -> Result<String, UnlinkError> {
        let result = self.drive(cancel).await;
        match &result {
            Ok(_) => self.report(UnlinkPhase::Done, 1, 1, Duration::ZERO),
            Err(UnlinkError::Cancelled) => debug!("unlink cancelled"),
            Err(e) => {
                warn!(error = %e, "unlink failed");
                self.report(UnlinkPhase::Failed, 1, 1, Duration::ZERO);
            }
        }
        result
    }

    async fn drive(&self, cancel: &CancellationToken) -> Result<String, UnlinkError> {
        let remote = &*self.remote;
        let policy = self.policy;

        // ── Requesting ──
        self.report(UnlinkPhase::Requesting, 1, 1, Duration::ZERO);
        let resp = remote.request_unlink(cancel).await.map_err(request_error)?;
        if !resp.ok {
            return Err(UnlinkError::Rejected {
                message: resp.message,
            });
        }
        info!(message = %resp.message, "bridge accepted unlink");

        sleep_or_cancel(cancel, policy.settle_delay).await?;

        // ── AwaitingDisconnectConfirm ──
        self.poll_until(
            UnlinkPhase::AwaitingDisconnectConfirm,
            policy.confirm_interval,
            policy.confirm_attempts,
            cancel,
            move || async move {
                remote
                    .status(cancel)
                    .await
                    .map(|status| (!status.connected).then_some(()))
            },
        )
        .await?;
        info!("bridge confirmed disconnection");

        if policy.relink_kick {
            match remote.request_relink(cancel).await {
                Ok(resp) if resp.ok => debug!(message = %resp.message, "relink requested"),
                Ok(resp) => warn!(message = %resp.message, "bridge refused relink; waiting anyway"),
                Err(e) if e.is_cancelled() => return Err(UnlinkError::Cancelled),
                Err(e) => warn!(error = %e, "relink request failed; waiting anyway"),
            }
        }

        // ── AwaitingCodeRegeneration ──
        let code = self
            .poll_until(
                UnlinkPhase::AwaitingCodeRegeneration,
                policy.code_interval,
                policy.code_attempts,
                cancel,
                move || remote.pairing_code(cancel),
            )
            .await?;
        info!("bridge issued a new pairing code");
        Ok(code)
    }

    /// Call `probe` up to `max_attempts` times, `interval` apart, until it
    /// yields a value. Probe errors count as unsuccessful attempts.
    async fn poll_until<T, F, Fut>(
        &self,
        phase: UnlinkPhase,
        interval: Duration,
        max_attempts: u32,
        cancel: &CancellationToken,
        mut probe: F,
    ) -> Result<T, UnlinkError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Option<T>, pairlink_api::Error>>,
    {
        for attempt in 1..=max_attempts {
            self.report(phase, attempt, max_attempts, interval);
            match probe().await {
                Ok(Some(value)) => return Ok(value),
                Ok(None) => debug!(%phase, attempt, max_attempts, "not there yet"),
                Err(e) if e.is_cancelled() => return Err(UnlinkError::Cancelled),
                Err(e) => warn!(%phase, attempt, error = %e, "check failed"),
            }
            if attempt < max_attempts {
                sleep_or_cancel(cancel, interval).await?;
            }
        }
        Err(UnlinkError::Exhausted {
            phase,
            attempts: max_attempts,
        })
    }

    fn report(&self, phase: UnlinkPhase, attempt: u32, max_attempts: u32, interval: Duration) {
        if let Some(ref progress) = self.progress {
            let _ = progress.send(UnlinkProcedure {
                phase,
                attempt,
                max_attempts,
                interval,
            });
        }
    }
}

fn request_error(e: pairlink_api::Error) -> UnlinkError {
    if e.is_cancelled() {
        UnlinkError::Cancelled
    } else {
        UnlinkError::Request(e)
    }
}

async fn sleep_or_cancel(cancel: &CancellationToken, delay: Duration) -> Result<(), UnlinkError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(UnlinkError::Cancelled),
        () = tokio::time::sleep(delay) => Ok(()),
    }
}
