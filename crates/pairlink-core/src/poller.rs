// ── Status poller ──
//
// Repeating status check used while the session waits for a scan. Each
// (re)start opens a new generation with its own child cancellation
// token; reports carry the generation they were produced under so the
// consumer can drop anything from a superseded cycle.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::backoff::BackoffPolicy;
use crate::remote::RemoteLink;

/// What one poll tick observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollOutcome {
    Connected { identifier: Option<String> },
    NotConnected,
    Failed { message: String, transient: bool },
}

/// Result of one tick, tagged with the generation that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollReport {
    pub generation: u64,
    pub outcome: PollOutcome,
    /// Failure count after this tick.
    pub consecutive_failures: u32,
    /// Delay before the next tick.
    pub next_delay: Duration,
}

struct PollCycle {
    generation: u64,
    cancel: CancellationToken,
}

/// Owns at most one running poll cycle.
pub struct StatusPoller<R> {
    remote: Arc<R>,
    policy: BackoffPolicy,
    parent: CancellationToken,
    generation: Arc<AtomicU64>,
    cycle: Option<PollCycle>,
}

impl<R: RemoteLink> StatusPoller<R> {
    /// Cycles run under child tokens of `parent`; cancelling it stops
    /// every cycle for good.
    pub fn new(remote: Arc<R>, policy: BackoffPolicy, parent: CancellationToken) -> Self {
        Self {
            remote,
            policy,
            parent,
            generation: Arc::new(AtomicU64::new(0)),
            cycle: None,
        }
    }

    /// Start polling, seeded with `seed_failures` so the first delay
    /// reflects earlier failures.
    ///
    /// Restarts the cycle when already running: the generation is bumped
    /// and the previous cycle's in-flight request is cancelled. Returns
    /// the new generation.
    pub fn start(&mut self, seed_failures: u32, reports: mpsc::Sender<PollReport>) -> u64 {
        self.stop();

        let generation = self.generation.fetch_add(1, Ordering::AcqRel) + 1;
        let cancel = self.parent.child_token();

        debug!(generation, seed_failures, "starting status poller");
        tokio::spawn(poll_loop(
            Arc::clone(&self.remote),
            self.policy,
            Arc::clone(&self.generation),
            generation,
            seed_failures,
            cancel.clone(),
            reports,
        ));

        self.cycle = Some(PollCycle { generation, cancel });
        generation
    }

    /// Stop the running cycle, if any. Safe to call repeatedly.
    pub fn stop(&mut self) {
        if let Some(cycle) = self.cycle.take() {
            debug!(generation = cycle.generation, "stopping status poller");
            cycle.cancel.cancel();
        }
    }

    /// The generation of the most recent start.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    pub fn is_running(&self) -> bool {
        self.cycle
            .as_ref()
            .is_some_and(|cycle| !cycle.cancel.is_cancelled())
    }

    /// Whether `report` belongs to the cycle that is running now.
    pub fn accepts(&self, report: &PollReport) -> bool {
        self.is_running() && report.generation == self.generation()
    }
}

impl<R> Drop for StatusPoller<R> {
    fn drop(&mut self) {
        if let Some(cycle) = self.cycle.take() {
            cycle.cancel.cancel();
        }
    }
}

// ── Poll loop ────────────────────────────────────────────────────

async fn poll_loop<R: RemoteLink>(
    remote: Arc<R>,
    policy: BackoffPolicy,
    current: Arc<AtomicU64>,
    generation: u64,
    mut failures: u32,
    cancel: CancellationToken,
    reports: mpsc::Sender<PollReport>,
) {
    let mut delay = policy.interval(failures);

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        // A tick scheduled under an older generation is a no-op.
        if current.load(Ordering::Acquire) != generation {
            break;
        }

        let outcome = match remote.status(&cancel).await {
            Ok(status) => {
                failures = 0;
                if status.connected {
                    PollOutcome::Connected {
                        identifier: status.identifier,
                    }
                } else {
                    PollOutcome::NotConnected
                }
            }
            Err(e) if e.is_cancelled() => break,
            Err(e) => {
                failures = failures.saturating_add(1);
                debug!(generation, failures, error = %e, "status poll failed");
                PollOutcome::Failed {
                    transient: e.is_transient(),
                    message: e.to_string(),
                }
            }
        };

        // Prospective: the new interval applies to the next tick only.
        delay = policy.interval(failures);
        debug!(
            generation,
            failures,
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "status poll tick"
        );

        if cancel.is_cancelled() || current.load(Ordering::Acquire) != generation {
            break;
        }

        let report = PollReport {
            generation,
            outcome,
            consecutive_failures: failures,
            next_delay: delay,
        };
        if reports.send(report).await.is_err() {
            break;
        }
    }

    debug!(generation, "status poller exited");
}
