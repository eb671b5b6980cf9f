// ── Core error types ──
//
// Caller-facing errors from pairlink-core. Consumers never match on
// reqwest errors or JSON parse failures directly: the
// `From<pairlink_api::Error>` impl translates transport-layer errors into
// domain variants.

use thiserror::Error;

use crate::session::LinkState;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot reach bridge at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Bridge request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    // ── Bridge answers ───────────────────────────────────────────────
    #[error("Bridge error: {message}")]
    Remote {
        message: String,
        /// HTTP status code (if the bridge answered at all).
        status: Option<u16>,
    },

    // ── Lifecycle errors ─────────────────────────────────────────────
    #[error("Cannot {operation} while the session is {state}")]
    InvalidState {
        operation: &'static str,
        state: LinkState,
    },

    #[error("Cannot {operation}: another operation is in progress ({active})")]
    Busy {
        operation: &'static str,
        active: String,
    },

    #[error("Operation superseded by a newer request")]
    Superseded,

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Link controller has been disposed")]
    Disposed,

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },
}

impl CoreError {
    /// Returns `true` for failures a later retry may clear (timeouts,
    /// unreachable bridge, 5xx answers).
    pub fn is_transient(&self) -> bool {
        match self {
            Self::ConnectionFailed { .. } | Self::Timeout { .. } => true,
            Self::Remote { status, .. } => status.is_some_and(|s| s >= 500),
            _ => false,
        }
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<pairlink_api::Error> for CoreError {
    fn from(err: pairlink_api::Error) -> Self {
        match err {
            pairlink_api::Error::Transport(ref e) => {
                if e.is_timeout() || e.is_connect() {
                    CoreError::ConnectionFailed {
                        url: e
                            .url()
                            .map(ToString::to_string)
                            .unwrap_or_else(|| "<unknown>".into()),
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Remote {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            pairlink_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid bridge URL: {e}"),
            },
            pairlink_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            pairlink_api::Error::Tls(msg) => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("TLS error: {msg}"),
            },
            pairlink_api::Error::Remote { status, message } => CoreError::Remote {
                message,
                status: Some(status),
            },
            pairlink_api::Error::Deserialization { message, .. } => CoreError::Remote {
                message: format!("unexpected response from bridge: {message}"),
                status: None,
            },
            pairlink_api::Error::Cancelled => CoreError::Cancelled,
        }
    }
}
