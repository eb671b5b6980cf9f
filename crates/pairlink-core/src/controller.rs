// ── Link controller ──
//
// Owns the pairing session for one bridge. A single session task holds
// the `LinkSession`, the status poller and the active-operation slot.
// Commands, poll reports, operation results and unlink progress all
// arrive through its inbox, so every write happens in one place.

use std::sync::Arc;

use chrono::Utc;
use pairlink_api::BridgeClient;
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio_stream::wrappers::WatchStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::{LinkConfig, UnlinkPolicy};
use crate::error::CoreError;
use crate::poller::{PollOutcome, PollReport, StatusPoller};
use crate::remote::RemoteLink;
use crate::session::{Activity, LinkEvent, LinkSession, LinkState};
use crate::unlink::{UnlinkError, UnlinkOrchestrator, UnlinkProcedure};

const COMMAND_CHANNEL_SIZE: usize = 16;
const EVENT_CHANNEL_SIZE: usize = 64;
const POLL_CHANNEL_SIZE: usize = 16;

type Reply = oneshot::Sender<Result<LinkSession, CoreError>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Command {
    Initialize,
    Refresh,
    Unlink,
}

impl Command {
    fn name(self) -> &'static str {
        match self {
            Self::Initialize => "initialize",
            Self::Refresh => "refresh",
            Self::Unlink => "unlink",
        }
    }
}

struct CommandEnvelope {
    command: Command,
    response_tx: Reply,
}

// ── Shared state ─────────────────────────────────────────────────

/// Channels shared by controller handles and the session task.
struct Shared {
    session: watch::Sender<LinkSession>,
    activity: watch::Sender<Activity>,
    event_tx: broadcast::Sender<LinkEvent>,
    cancel: CancellationToken,
}

impl Shared {
    /// Apply `change` to the session unless the controller is disposed.
    ///
    /// The cancellation check runs under the watch lock, and `dispose`
    /// cancels under the same lock, so no write can land after dispose.
    /// Events describing the transition are sent under the lock as well.
    fn commit(&self, change: impl FnOnce(&mut LinkSession)) -> Result<LinkSession, CoreError> {
        let mut snapshot = None;
        self.session.send_if_modified(|session| {
            if self.cancel.is_cancelled() {
                return false;
            }
            let before = session.clone();
            change(session);
            for event in transition_events(&before, session) {
                let _ = self.event_tx.send(event);
            }
            snapshot = Some(session.clone());
            *session != before
        });
        snapshot.ok_or(CoreError::Disposed)
    }

    fn emit(&self, event: LinkEvent) {
        self.session.send_if_modified(|_| {
            if !self.cancel.is_cancelled() {
                let _ = self.event_tx.send(event);
            }
            false
        });
    }

    fn set_activity(&self, activity: Activity) {
        self.activity.send_if_modified(|current| {
            if self.cancel.is_cancelled() || *current == activity {
                return false;
            }
            *current = activity;
            true
        });
    }
}

fn transition_events(before: &LinkSession, after: &LinkSession) -> Vec<LinkEvent> {
    let mut events = Vec::new();
    if before.state != after.state {
        match after.state {
            LinkState::Connected => events.push(LinkEvent::Connected {
                identifier: after.identifier.clone(),
            }),
            LinkState::Disconnected => events.push(LinkEvent::Disconnected),
            LinkState::Error => events.push(LinkEvent::Failed {
                message: after.last_error.clone().unwrap_or_default(),
            }),
            LinkState::Loading => {}
        }
    }
    if let (Some(code), Some(issued_at)) = (&after.pairing_code, after.pairing_issued_at) {
        if before.pairing_code.as_ref() != Some(code) || before.pairing_issued_at != Some(issued_at)
        {
            events.push(LinkEvent::PairingCodeRefreshed {
                code: code.clone(),
                issued_at,
            });
        }
    }
    events
}

// ── LinkController ───────────────────────────────────────────────

/// Pairing-session controller for one bridge.
///
/// Cheaply cloneable via `Arc`. Commands are answered by the session
/// task once the operation they start has settled; observers read
/// [`snapshot()`](Self::snapshot) or subscribe to [`session()`](Self::session)
/// and [`events()`](Self::events).
///
/// Remote failures are reported through the session's `Error` state, not
/// as `Err`: commands fail only for lifecycle reasons (busy, wrong state,
/// superseded, disposed).
pub struct LinkController<R: RemoteLink = BridgeClient> {
    inner: Arc<ControllerInner<R>>,
}

impl<R: RemoteLink> Clone for LinkController<R> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

struct ControllerInner<R> {
    config: LinkConfig,
    remote: Arc<R>,
    shared: Arc<Shared>,
    command_tx: mpsc::Sender<CommandEnvelope>,
}

impl<R> Drop for ControllerInner<R> {
    fn drop(&mut self) {
        self.shared.cancel.cancel();
    }
}

impl LinkController<BridgeClient> {
    /// Build the bridge client described by `config` and start the
    /// session task. Must be called from within a Tokio runtime.
    pub fn new(config: LinkConfig) -> Result<Self, CoreError> {
        let client = config.build_client()?;
        Ok(Self::with_remote(client, config))
    }
}

impl<R: RemoteLink> LinkController<R> {
    /// Start a controller over any [`RemoteLink`]. Must be called from
    /// within a Tokio runtime.
    ///
    /// The session starts in `Loading`; call [`initialize()`](Self::initialize).
    pub fn with_remote(remote: R, config: LinkConfig) -> Self {
        let remote = Arc::new(remote);
        let (session, _) = watch::channel(LinkSession::default());
        let (activity, _) = watch::channel(Activity::Idle);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        let cancel = CancellationToken::new();
        let shared = Arc::new(Shared {
            session,
            activity,
            event_tx,
            cancel: cancel.clone(),
        });

        let (command_tx, command_rx) = mpsc::channel(COMMAND_CHANNEL_SIZE);
        let (poll_tx, poll_rx) = mpsc::channel(POLL_CHANNEL_SIZE);
        let (done_tx, done_rx) = mpsc::unbounded_channel();
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();

        let task = SessionTask {
            shared: Arc::clone(&shared),
            remote: Arc::clone(&remote),
            unlink_policy: config.unlink,
            poller: StatusPoller::new(Arc::clone(&remote), config.backoff, cancel),
            poll_tx,
            done_tx,
            progress_tx,
            op: None,
            next_op_id: 0,
        };
        tokio::spawn(task.run(Inbox {
            commands: command_rx,
            polls: poll_rx,
            done: done_rx,
            progress: progress_rx,
        }));

        Self {
            inner: Arc::new(ControllerInner {
                config,
                remote,
                shared,
                command_tx,
            }),
        }
    }

    /// Access the controller configuration.
    pub fn config(&self) -> &LinkConfig {
        &self.inner.config
    }

    /// The bridge this controller talks to.
    pub fn remote(&self) -> &R {
        &self.inner.remote
    }

    // ── Commands ─────────────────────────────────────────────────

    /// Check the bridge once: `Connected` if paired, otherwise fetch a
    /// pairing code, enter `Disconnected` and start polling.
    ///
    /// Only acts on a fresh session; once the session has settled this
    /// returns the current snapshot. Concurrent calls share one check.
    pub async fn initialize(&self) -> Result<LinkSession, CoreError> {
        self.execute(Command::Initialize).await
    }

    /// Reset the failure counter and start over from `Loading`.
    ///
    /// Supersedes an in-flight initialize or refresh, whose callers get
    /// [`CoreError::Superseded`]. Refused while an unlink runs.
    pub async fn refresh(&self) -> Result<LinkSession, CoreError> {
        self.execute(Command::Refresh).await
    }

    /// Unlink the bridge and wait for a fresh pairing code.
    ///
    /// Valid from `Connected` or `Disconnected`. Polling is suspended for
    /// the whole procedure and resumes once the new code is in place.
    pub async fn unlink(&self) -> Result<LinkSession, CoreError> {
        self.execute(Command::Unlink).await
    }

    /// Cancel everything and freeze the session. Idempotent.
    ///
    /// Takes effect before returning: no result that arrives afterwards
    /// reaches the session or the event stream.
    pub fn dispose(&self) {
        let shared = &self.inner.shared;
        let mut first = false;
        shared.session.send_if_modified(|_| {
            if !shared.cancel.is_cancelled() {
                shared.cancel.cancel();
                first = true;
            }
            false
        });
        if first {
            shared.activity.send_replace(Activity::Idle);
            let _ = shared.event_tx.send(LinkEvent::Disposed);
            info!("link controller disposed");
        }
    }

    pub fn is_disposed(&self) -> bool {
        self.inner.shared.cancel.is_cancelled()
    }

    async fn execute(&self, command: Command) -> Result<LinkSession, CoreError> {
        if self.is_disposed() {
            return Err(CoreError::Disposed);
        }

        let (tx, rx) = oneshot::channel();
        self.inner
            .command_tx
            .send(CommandEnvelope {
                command,
                response_tx: tx,
            })
            .await
            .map_err(|_| CoreError::Disposed)?;

        rx.await.map_err(|_| CoreError::Disposed)?
    }

    // ── Observation ──────────────────────────────────────────────

    /// Current session snapshot.
    pub fn snapshot(&self) -> LinkSession {
        self.inner.shared.session.borrow().clone()
    }

    /// Subscribe to session changes.
    pub fn session(&self) -> watch::Receiver<LinkSession> {
        self.inner.shared.session.subscribe()
    }

    /// Session changes as a `Stream`, starting with the current value.
    pub fn session_stream(&self) -> WatchStream<LinkSession> {
        WatchStream::new(self.session())
    }

    /// Subscribe to changes of the active operation.
    pub fn activity(&self) -> watch::Receiver<Activity> {
        self.inner.shared.activity.subscribe()
    }

    /// Subscribe to controller events.
    pub fn events(&self) -> broadcast::Receiver<LinkEvent> {
        self.inner.shared.event_tx.subscribe()
    }

    /// Whether the current pairing code is older than the configured
    /// staleness threshold.
    pub fn is_pairing_stale(&self) -> bool {
        self.snapshot()
            .is_pairing_stale(Utc::now(), self.inner.config.pairing_stale_after)
    }
}

// ── Session task ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpKind {
    Initialize,
    Unlink,
}

/// The operation holding the active slot.
struct ActiveOp {
    id: u64,
    kind: OpKind,
    cancel: CancellationToken,
    waiters: Vec<Reply>,
}

/// Completion of a spawned operation, tagged with its id.
struct OpDone {
    id: u64,
    result: OpResult,
}

enum OpResult {
    Initialized(InitOutcome),
    Unlinked(Result<String, UnlinkError>),
}

enum InitOutcome {
    Connected { identifier: Option<String> },
    AwaitingScan { code: String },
    Failed { message: String },
    Cancelled,
}

struct Inbox {
    commands: mpsc::Receiver<CommandEnvelope>,
    polls: mpsc::Receiver<PollReport>,
    done: mpsc::UnboundedReceiver<OpDone>,
    progress: mpsc::UnboundedReceiver<UnlinkProcedure>,
}

struct SessionTask<R: RemoteLink> {
    shared: Arc<Shared>,
    remote: Arc<R>,
    unlink_policy: UnlinkPolicy,
    poller: StatusPoller<R>,
    poll_tx: mpsc::Sender<PollReport>,
    done_tx: mpsc::UnboundedSender<OpDone>,
    progress_tx: mpsc::UnboundedSender<UnlinkProcedure>,
    op: Option<ActiveOp>,
    next_op_id: u64,
}

impl<R: RemoteLink> SessionTask<R> {
    async fn run(mut self, mut inbox: Inbox) {
        let cancel = self.shared.cancel.clone();

        loop {
            tokio::select! {
                biased;
                () = cancel.cancelled() => break,
                envelope = inbox.commands.recv() => {
                    let Some(envelope) = envelope else { break };
                    self.handle_command(envelope);
                }
                Some(procedure) = inbox.progress.recv() => {
                    self.shared.emit(LinkEvent::UnlinkPhase(procedure));
                }
                Some(done) = inbox.done.recv() => self.finish(done),
                Some(report) = inbox.polls.recv() => self.apply_poll(report),
            }
        }

        self.poller.stop();
        if let Some(op) = self.op.take() {
            op.cancel.cancel();
        }
        debug!("session task exited");
    }

    fn handle_command(&mut self, envelope: CommandEnvelope) {
        let CommandEnvelope {
            command,
            response_tx,
        } = envelope;
        debug!(command = command.name(), "command received");

        match command {
            Command::Initialize => match self.op.as_mut() {
                Some(op) if op.kind == OpKind::Initialize => op.waiters.push(response_tx),
                Some(_) => self.reply_busy(command, response_tx),
                None if self.shared.session.borrow().state == LinkState::Loading => {
                    self.begin_initialize(response_tx, false);
                }
                None => {
                    let _ = response_tx.send(Ok(self.shared.session.borrow().clone()));
                }
            },
            Command::Refresh => match self.op.take() {
                Some(op) if op.kind == OpKind::Unlink => {
                    self.op = Some(op);
                    self.reply_busy(command, response_tx);
                }
                Some(op) => {
                    debug!(op = op.id, "refresh supersedes in-flight initialize");
                    op.cancel.cancel();
                    for waiter in op.waiters {
                        let _ = waiter.send(Err(CoreError::Superseded));
                    }
                    self.begin_initialize(response_tx, true);
                }
                None => self.begin_initialize(response_tx, true),
            },
            Command::Unlink => {
                if self.op.is_some() {
                    self.reply_busy(command, response_tx);
                    return;
                }
                let state = self.shared.session.borrow().state;
                if matches!(state, LinkState::Connected | LinkState::Disconnected) {
                    self.begin_unlink(response_tx);
                } else {
                    let _ = response_tx.send(Err(CoreError::InvalidState {
                        operation: command.name(),
                        state,
                    }));
                }
            }
        }
    }

    fn reply_busy(&self, command: Command, response_tx: Reply) {
        let active = self.shared.activity.borrow().to_string();
        let _ = response_tx.send(Err(CoreError::Busy {
            operation: command.name(),
            active,
        }));
    }

    fn next_op(&mut self, kind: OpKind, waiter: Reply) -> (u64, CancellationToken) {
        self.next_op_id += 1;
        let id = self.next_op_id;
        let cancel = self.shared.cancel.child_token();
        self.op = Some(ActiveOp {
            id,
            kind,
            cancel: cancel.clone(),
            waiters: vec![waiter],
        });
        (id, cancel)
    }

    // ── Initialize ───────────────────────────────────────────────

    fn begin_initialize(&mut self, response_tx: Reply, reset_failures: bool) {
        self.poller.stop();
        self.shared.set_activity(Activity::Initializing);
        let committed = self.shared.commit(|session| {
            session.begin_loading();
            if reset_failures {
                session.consecutive_failures = 0;
            }
        });
        if let Err(e) = committed {
            let _ = response_tx.send(Err(e));
            return;
        }

        let (id, cancel) = self.next_op(OpKind::Initialize, response_tx);
        debug!(op = id, "checking bridge status");

        let remote = Arc::clone(&self.remote);
        let done_tx = self.done_tx.clone();
        tokio::spawn(async move {
            let outcome = check_bridge(&*remote, &cancel).await;
            let _ = done_tx.send(OpDone {
                id,
                result: OpResult::Initialized(outcome),
            });
        });
    }

    fn apply_initialize(&mut self, outcome: InitOutcome) -> Result<LinkSession, CoreError> {
        match outcome {
            InitOutcome::Connected { identifier } => {
                self.shared.set_activity(Activity::Idle);
                let session = self.shared.commit(|s| s.mark_connected(identifier))?;
                info!(identifier = ?session.identifier, "bridge is paired");
                Ok(session)
            }
            InitOutcome::AwaitingScan { code } => {
                let session = self
                    .shared
                    .commit(|s| s.mark_disconnected(code, Utc::now()))?;
                info!("bridge is waiting for a pairing code scan");
                self.start_polling(session.consecutive_failures);
                Ok(session)
            }
            InitOutcome::Failed { message } => {
                self.shared.set_activity(Activity::Idle);
                warn!(error = %message, "bridge check failed");
                self.shared.commit(|s| {
                    s.consecutive_failures = s.consecutive_failures.saturating_add(1);
                    s.mark_failed(message);
                })
            }
            InitOutcome::Cancelled => Err(CoreError::Cancelled),
        }
    }

    // ── Unlink ───────────────────────────────────────────────────

    fn begin_unlink(&mut self, response_tx: Reply) {
        self.poller.stop();
        self.shared.set_activity(Activity::Unlinking);
        if let Err(e) = self.shared.commit(LinkSession::begin_loading) {
            let _ = response_tx.send(Err(e));
            return;
        }

        let (id, cancel) = self.next_op(OpKind::Unlink, response_tx);
        info!(op = id, "unlinking bridge");

        let orchestrator = UnlinkOrchestrator::new(Arc::clone(&self.remote), self.unlink_policy)
            .with_progress(self.progress_tx.clone());
        let done_tx = self.done_tx.clone();
        tokio::spawn(async move {
            let result = orchestrator.run(&cancel).await;
            let _ = done_tx.send(OpDone {
                id,
                result: OpResult::Unlinked(result),
            });
        });
    }

    fn apply_unlink(&mut self, result: Result<String, UnlinkError>) -> Result<LinkSession, CoreError> {
        match result {
            Ok(code) => {
                let session = self.shared.commit(|s| {
                    s.consecutive_failures = 0;
                    s.mark_disconnected(code, Utc::now());
                })?;
                info!("unlink complete; new pairing code issued");
                self.start_polling(0);
                Ok(session)
            }
            Err(UnlinkError::Cancelled) => Err(CoreError::Cancelled),
            Err(e) => {
                self.shared.set_activity(Activity::Idle);
                let message = e.remediation();
                warn!(error = %e, "unlink failed");
                self.shared.commit(|s| s.mark_failed(message))
            }
        }
    }

    // ── Results ──────────────────────────────────────────────────

    fn finish(&mut self, done: OpDone) {
        let Some(op) = self.op.take_if(|op| op.id == done.id) else {
            debug!(op = done.id, "discarding result of superseded operation");
            return;
        };

        let result = match done.result {
            OpResult::Initialized(outcome) => self.apply_initialize(outcome),
            OpResult::Unlinked(result) => self.apply_unlink(result),
        };

        for waiter in op.waiters {
            let reply = match &result {
                Ok(session) => Ok(session.clone()),
                Err(CoreError::Disposed) => Err(CoreError::Disposed),
                Err(_) => Err(CoreError::Cancelled),
            };
            let _ = waiter.send(reply);
        }
    }

    fn start_polling(&mut self, seed_failures: u32) {
        let generation = self.poller.start(seed_failures, self.poll_tx.clone());
        self.shared.set_activity(Activity::Polling { generation });
    }

    fn apply_poll(&mut self, report: PollReport) {
        if !self.poller.accepts(&report) {
            debug!(generation = report.generation, "discarding stale poll report");
            return;
        }

        let failures = report.consecutive_failures;
        let committed = match report.outcome {
            PollOutcome::Connected { identifier } => {
                self.poller.stop();
                self.shared.set_activity(Activity::Idle);
                info!(identifier = ?identifier, "pairing code scanned; bridge connected");
                self.shared.commit(|s| s.mark_connected(identifier))
            }
            PollOutcome::NotConnected => self.shared.commit(|s| s.consecutive_failures = 0),
            PollOutcome::Failed { message, transient } => {
                warn!(
                    failures,
                    transient,
                    next_delay = ?report.next_delay,
                    error = %message,
                    "status poll failed"
                );
                self.shared.commit(|s| s.consecutive_failures = failures)
            }
        };
        if committed.is_err() {
            self.poller.stop();
        }
    }
}

/// One status check, plus a pairing code when not paired.
async fn check_bridge<R: RemoteLink>(remote: &R, cancel: &CancellationToken) -> InitOutcome {
    match remote.status(cancel).await {
        Ok(status) if status.connected => {
            return InitOutcome::Connected {
                identifier: status.identifier,
            };
        }
        Ok(_) => {}
        Err(e) => return init_failure(e),
    }

    match remote.pairing_code(cancel).await {
        Ok(Some(code)) => InitOutcome::AwaitingScan { code },
        // No code usually means the bridge paired between the two calls.
        Ok(None) => match remote.status(cancel).await {
            Ok(status) if status.connected => InitOutcome::Connected {
                identifier: status.identifier,
            },
            Ok(_) => InitOutcome::Failed {
                message: "Bridge is not paired and has no pairing code yet. Refresh in a few seconds."
                    .into(),
            },
            Err(e) => init_failure(e),
        },
        Err(e) => init_failure(e),
    }
}

fn init_failure(e: pairlink_api::Error) -> InitOutcome {
    if e.is_cancelled() {
        InitOutcome::Cancelled
    } else {
        InitOutcome::Failed {
            message: CoreError::from(e).to_string(),
        }
    }
}
