//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use pairlink_config::ConfigError;
use pairlink_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach the bridge at {url}")]
    #[diagnostic(
        code(pairlink::connection_failed),
        help(
            "Check that the bridge service is running and reachable.\n\
             Reason: {reason}\n\
             Try: pairlink status --insecure"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Bridge refused the admin key")]
    #[diagnostic(
        code(pairlink::auth_failed),
        help(
            "Verify the admin key configured for profile '{profile}'.\n\
             Run: pairlink config set-key"
        )
    )]
    AuthFailed { profile: String },

    // ── Link lifecycle ───────────────────────────────────────────────

    #[error("{message}")]
    #[diagnostic(
        code(pairlink::link_failed),
        help("Check the bridge logs, then run: pairlink pair")
    )]
    LinkFailed { message: String },

    #[error("Bridge refused the request: {message}")]
    #[diagnostic(code(pairlink::rejected))]
    Rejected { message: String },

    #[error("Cannot {operation} right now: {reason}")]
    #[diagnostic(
        code(pairlink::conflict),
        help("Wait for the running operation to finish, then try again.")
    )]
    Conflict { operation: String, reason: String },

    // ── API ──────────────────────────────────────────────────────────

    #[error("Bridge error: {message}")]
    #[diagnostic(code(pairlink::api_error))]
    ApiError {
        message: String,
        status: Option<u16>,
    },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(pairlink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(pairlink::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: pairlink config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No bridge configured")]
    #[diagnostic(
        code(pairlink::no_config),
        help(
            "Create a profile with: pairlink config init\n\
             Or pass --bridge / set PAIRLINK_BRIDGE.\n\
             Expected config at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("No admin key configured for profile '{profile}'")]
    #[diagnostic(
        code(pairlink::no_credentials),
        help(
            "Store one with: pairlink config set-key\n\
             Or set PAIRLINK_ADMIN_KEY."
        )
    )]
    NoCredentials { profile: String },

    #[error(transparent)]
    #[diagnostic(code(pairlink::config))]
    Config(Box<figment::Error>),

    #[error("System keyring error: {0}")]
    #[diagnostic(code(pairlink::keyring))]
    Keyring(String),

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(pairlink::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── Timeout ──────────────────────────────────────────────────────

    #[error("Timed out after {seconds}s")]
    #[diagnostic(
        code(pairlink::timeout),
        help("Increase the limit with --timeout / --max-wait or check bridge responsiveness.")
    )]
    Timeout { seconds: u64 },

    // ── IO ───────────────────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for CliError {
    fn from(err: figment::Error) -> Self {
        Self::Config(Box::new(err))
    }
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::AuthFailed { .. } | Self::NoCredentials { .. } => exit_code::AUTH,
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }

    /// Attribute a refused admin key to the profile that supplied it.
    #[must_use]
    pub fn for_profile(self, profile: &str) -> Self {
        match self {
            Self::ApiError {
                status: Some(401 | 403),
                ..
            } => Self::AuthFailed {
                profile: profile.to_owned(),
            },
            other => other,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed { url, reason },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::Remote { message, status } => CliError::ApiError { message, status },

            CoreError::InvalidState { operation, state } => CliError::Conflict {
                operation: operation.into(),
                reason: format!("the session is {state}"),
            },

            CoreError::Busy { operation, active } => CliError::Conflict {
                operation: operation.into(),
                reason: format!("{active} is in progress"),
            },

            e @ (CoreError::Superseded | CoreError::Cancelled | CoreError::Disposed) => {
                CliError::LinkFailed {
                    message: e.to_string(),
                }
            }

            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::Serialization(e) => CliError::Validation {
                field: "config".into(),
                reason: e.to_string(),
            },
            ConfigError::Figment(e) => CliError::Config(e),
            ConfigError::Keyring(e) => CliError::Keyring(e.to_string()),
            ConfigError::Io(e) => CliError::Io(e),
        }
    }
}

// ── Direct client errors ─────────────────────────────────────────────

impl From<pairlink_api::Error> for CliError {
    fn from(err: pairlink_api::Error) -> Self {
        CoreError::from(err).into()
    }
}
