use thiserror::Error;

/// Top-level error type for the `pairlink-api` crate.
///
/// Covers every failure mode of a single bridge request: transport,
/// non-2xx answers, undecodable bodies, and caller cancellation.
/// `pairlink-core` maps these into controller-level outcomes.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Request timed out.
    #[error("Request timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// TLS handshake or certificate error.
    #[error("TLS error: {0}")]
    Tls(String),

    // ── Bridge ──────────────────────────────────────────────────────
    /// Non-2xx answer. `message` is the bridge's `detail` / `message` /
    /// `error` field when present, otherwise `HTTP {status}`.
    #[error("Bridge error (HTTP {status}): {message}")]
    Remote { status: u16, message: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },

    // ── Caller ──────────────────────────────────────────────────────
    /// The caller's cancellation token fired before the request finished.
    #[error("Request cancelled")]
    Cancelled,
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    ///
    /// Timeouts, connection failures and 5xx answers are transient;
    /// 4xx answers and malformed bodies are not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect() || e.is_request(),
            Self::Timeout { .. } => true,
            Self::Remote { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Returns `true` if the request was abandoned by the caller.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }

    /// HTTP status of the failed request, if the bridge answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Remote { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
