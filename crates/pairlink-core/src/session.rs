// ── Session model ──
//
// `LinkSession` is the single authoritative view of the pairing state.
// Only the controller's session task mutates it, through the
// `pub(crate)` transition methods below; everyone else sees snapshots.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use strum::Display;

use crate::unlink::UnlinkProcedure;

/// Where the link stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum LinkState {
    /// Initial check or unlink in progress.
    Loading,
    /// The bridge holds an authenticated session.
    Connected,
    /// Waiting for someone to scan `pairing_code`.
    Disconnected,
    /// Unrecoverable failure; `last_error` says why.
    Error,
}

/// Snapshot of the pairing session.
///
/// `pairing_code` is `Some` exactly when `state` is `Disconnected`,
/// `last_error` exactly when it is `Error`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LinkSession {
    pub state: LinkState,
    pub pairing_code: Option<String>,
    /// When the current pairing code was obtained.
    pub pairing_issued_at: Option<DateTime<Utc>>,
    /// Failed status checks since the last successful one.
    pub consecutive_failures: u32,
    pub last_error: Option<String>,
    /// Linked account reported by the bridge while `Connected`.
    pub identifier: Option<String>,
}

impl Default for LinkSession {
    fn default() -> Self {
        Self {
            state: LinkState::Loading,
            pairing_code: None,
            pairing_issued_at: None,
            consecutive_failures: 0,
            last_error: None,
            identifier: None,
        }
    }
}

impl LinkSession {
    /// How long ago the current pairing code was issued.
    pub fn pairing_age(&self, now: DateTime<Utc>) -> Option<Duration> {
        let issued = self.pairing_issued_at?;
        Some((now - issued).to_std().unwrap_or(Duration::ZERO))
    }

    /// Whether the current pairing code is older than `threshold`.
    ///
    /// Advisory only: the controller never expires codes on its own.
    pub fn is_pairing_stale(&self, now: DateTime<Utc>, threshold: Duration) -> bool {
        self.pairing_age(now).is_some_and(|age| age >= threshold)
    }

    /// Check the field invariants.
    pub fn is_consistent(&self) -> bool {
        let disconnected = self.state == LinkState::Disconnected;
        self.pairing_code.is_some() == disconnected
            && self.pairing_issued_at.is_some() == disconnected
            && self.last_error.is_some() == (self.state == LinkState::Error)
            && (self.identifier.is_none() || self.state == LinkState::Connected)
    }

    // ── Transitions (session task only) ──────────────────────────────

    pub(crate) fn begin_loading(&mut self) {
        self.state = LinkState::Loading;
        self.clear_pairing();
        self.last_error = None;
        self.identifier = None;
    }

    pub(crate) fn mark_connected(&mut self, identifier: Option<String>) {
        self.state = LinkState::Connected;
        self.clear_pairing();
        self.consecutive_failures = 0;
        self.last_error = None;
        self.identifier = identifier;
    }

    pub(crate) fn mark_disconnected(&mut self, code: String, issued_at: DateTime<Utc>) {
        self.state = LinkState::Disconnected;
        self.pairing_code = Some(code);
        self.pairing_issued_at = Some(issued_at);
        self.last_error = None;
        self.identifier = None;
    }

    pub(crate) fn mark_failed(&mut self, message: String) {
        self.state = LinkState::Error;
        self.clear_pairing();
        self.last_error = Some(message);
        self.identifier = None;
    }

    fn clear_pairing(&mut self) {
        self.pairing_code = None;
        self.pairing_issued_at = None;
    }
}

/// Which operation currently holds the controller's active slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(tag = "activity", rename_all = "snake_case")]
pub enum Activity {
    #[default]
    Idle,
    Initializing,
    Polling { generation: u64 },
    Unlinking,
}

impl fmt::Display for Activity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Initializing => f.write_str("initializing"),
            Self::Polling { generation } => write!(f, "polling (generation {generation})"),
            Self::Unlinking => f.write_str("unlinking"),
        }
    }
}

/// Notifications broadcast by the controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LinkEvent {
    /// The bridge reported an authenticated session.
    Connected { identifier: Option<String> },
    /// The session entered `Disconnected` from another state.
    Disconnected,
    /// A new pairing code is available.
    PairingCodeRefreshed {
        code: String,
        issued_at: DateTime<Utc>,
    },
    /// The session entered `Error`.
    Failed { message: String },
    /// Progress of a running unlink.
    UnlinkPhase(UnlinkProcedure),
    /// The controller was disposed; nothing further will be sent.
    Disposed,
}
