// Scripted in-memory bridge for unit tests.
//
// Each operation pops its next reply from a queue and falls back to a
// fixed answer once the queue is empty. Gated replies park the call until
// the test releases them, which is how tests hold a request in flight.

#![allow(clippy::unwrap_used)]

use std::collections::VecDeque;
use std::sync::Mutex;

use pairlink_api::{ActionResponse, BridgeStatus, Error};
use tokio::sync::oneshot;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::remote::RemoteLink;

enum Reply<T> {
    Ready(Result<T, Error>),
    Gated(oneshot::Receiver<Result<T, Error>>),
}

pub(crate) struct Script<T> {
    queue: Mutex<VecDeque<Reply<T>>>,
    fallback: Mutex<T>,
    calls: Mutex<Vec<Instant>>,
}

impl<T: Clone + Send> Script<T> {
    fn new(fallback: T) -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn push_ok(&self, value: T) -> &Self {
        self.queue.lock().unwrap().push_back(Reply::Ready(Ok(value)));
        self
    }

    pub(crate) fn push_err(&self, err: Error) -> &Self {
        self.queue.lock().unwrap().push_back(Reply::Ready(Err(err)));
        self
    }

    /// Queue a reply the test resolves later through the returned sender.
    pub(crate) fn push_gate(&self) -> oneshot::Sender<Result<T, Error>> {
        let (tx, rx) = oneshot::channel();
        self.queue.lock().unwrap().push_back(Reply::Gated(rx));
        tx
    }

    pub(crate) fn set_fallback(&self, value: T) {
        *self.fallback.lock().unwrap() = value;
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn call_times(&self) -> Vec<Instant> {
        self.calls.lock().unwrap().clone()
    }

    async fn next(&self, cancel: &CancellationToken) -> Result<T, Error> {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.calls.lock().unwrap().push(Instant::now());
        let reply = self.queue.lock().unwrap().pop_front();
        match reply {
            None => Ok(self.fallback.lock().unwrap().clone()),
            Some(Reply::Ready(result)) => result,
            Some(Reply::Gated(rx)) => {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => Err(Error::Cancelled),
                    result = rx => result.unwrap_or(Err(Error::Cancelled)),
                }
            }
        }
    }
}

pub(crate) struct ScriptedRemote {
    pub(crate) status: Script<BridgeStatus>,
    pub(crate) codes: Script<Option<String>>,
    pub(crate) unlink: Script<ActionResponse>,
    pub(crate) relink: Script<ActionResponse>,
}

impl ScriptedRemote {
    /// A bridge that is not paired and has no code until told otherwise.
    pub(crate) fn new() -> Self {
        Self {
            status: Script::new(not_connected()),
            codes: Script::new(None),
            unlink: Script::new(accepted("unlinked")),
            relink: Script::new(accepted("restarting")),
        }
    }
}

impl RemoteLink for ScriptedRemote {
    async fn status(&self, cancel: &CancellationToken) -> Result<BridgeStatus, Error> {
        self.status.next(cancel).await
    }

    async fn pairing_code(&self, cancel: &CancellationToken) -> Result<Option<String>, Error> {
        self.codes.next(cancel).await
    }

    async fn request_unlink(&self, cancel: &CancellationToken) -> Result<ActionResponse, Error> {
        self.unlink.next(cancel).await
    }

    async fn request_relink(&self, cancel: &CancellationToken) -> Result<ActionResponse, Error> {
        self.relink.next(cancel).await
    }
}

pub(crate) fn connected(identifier: &str) -> BridgeStatus {
    BridgeStatus {
        connected: true,
        identifier: Some(identifier.to_owned()),
    }
}

pub(crate) fn not_connected() -> BridgeStatus {
    BridgeStatus {
        connected: false,
        identifier: None,
    }
}

pub(crate) fn accepted(message: &str) -> ActionResponse {
    ActionResponse {
        ok: true,
        message: message.to_owned(),
    }
}

pub(crate) fn refused(message: &str) -> ActionResponse {
    ActionResponse {
        ok: false,
        message: message.to_owned(),
    }
}

/// A failure the poller should ride out.
pub(crate) fn transient() -> Error {
    Error::Timeout { timeout_secs: 5 }
}
