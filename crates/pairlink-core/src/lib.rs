//! Pairing-session lifecycle controller for the QR-paired messaging bridge.
//!
//! The bridge must be linked once by scanning a pairing code and then stays
//! connected. This crate keeps track of that link against a service that
//! may be slow, restarting, or gone:
//!
//! - **[`LinkController`]** — Owns the authoritative [`LinkSession`].
//!   [`initialize()`](LinkController::initialize) checks the bridge and,
//!   when unpaired, shows a pairing code and starts polling;
//!   [`unlink()`](LinkController::unlink) drives the full unlink/relink
//!   procedure; [`dispose()`](LinkController::dispose) freezes everything.
//!   Observers read snapshots or subscribe to the `watch` and `broadcast`
//!   channels it vends.
//!
//! - **[`StatusPoller`]** — Generation-tagged repeating status check with
//!   stepped backoff ([`BackoffPolicy`]).
//!
//! - **[`UnlinkOrchestrator`]** — Bounded unlink → confirm → regenerate
//!   sequence, failing with a phase-specific message on exhaustion.
//!
//! - **[`RemoteLink`]** — The seam to the bridge, implemented by
//!   [`pairlink_api::BridgeClient`].

pub mod backoff;
pub mod config;
pub mod controller;
pub mod error;
pub mod poller;
pub mod remote;
pub mod session;
pub mod unlink;

#[cfg(test)]
pub(crate) mod testing;

// ── Primary re-exports ──────────────────────────────────────────────
pub use backoff::BackoffPolicy;
pub use config::{LinkConfig, TlsVerification, UnlinkPolicy};
pub use controller::LinkController;
pub use error::CoreError;
pub use poller::{PollOutcome, PollReport, StatusPoller};
pub use remote::RemoteLink;
pub use session::{Activity, LinkEvent, LinkSession, LinkState};
pub use unlink::{UnlinkError, UnlinkOrchestrator, UnlinkPhase, UnlinkProcedure};
