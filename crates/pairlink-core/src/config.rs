// ── Runtime link configuration ──
//
// These types describe *how* to reach a bridge and how patient to be
// with it. They carry the admin key and timing policy, but never touch
// disk. The CLI builds a `LinkConfig` from its profile and hands it in.

use std::path::PathBuf;
use std::time::Duration;

use pairlink_api::transport::{TlsMode, TransportConfig};
use pairlink_api::BridgeClient;
use secrecy::SecretString;
use url::Url;

use crate::backoff::BackoffPolicy;
use crate::error::CoreError;

/// Default age after which observers should treat a pairing code as stale.
pub const DEFAULT_PAIRING_STALE_AFTER: Duration = Duration::from_secs(40);

/// TLS verification strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TlsVerification {
    /// System CA store (strict).
    #[default]
    SystemDefaults,
    /// Custom CA certificate file.
    CustomCa(PathBuf),
    /// Skip verification (self-signed bridge on the clinic LAN).
    DangerAcceptInvalid,
}

/// Pacing and bounds for the unlink procedure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnlinkPolicy {
    /// Wait after the bridge accepts the unlink before checking status.
    pub settle_delay: Duration,
    /// Interval between disconnect-confirmation checks.
    pub confirm_interval: Duration,
    /// Disconnect-confirmation checks before giving up.
    pub confirm_attempts: u32,
    /// Interval between pairing-code checks.
    pub code_interval: Duration,
    /// Pairing-code checks before giving up.
    pub code_attempts: u32,
    /// Ask the bridge to start a fresh session once disconnection is confirmed.
    pub relink_kick: bool,
}

impl Default for UnlinkPolicy {
    fn default() -> Self {
        Self {
            settle_delay: Duration::from_secs(3),
            confirm_interval: Duration::from_secs(2),
            confirm_attempts: 10,
            code_interval: Duration::from_secs(2),
            code_attempts: 15,
            relink_kick: true,
        }
    }
}

/// Configuration for one link controller.
///
/// Built by the CLI (or any other host), passed to `LinkController`.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Gateway base URL the `/bridge/...` paths hang off.
    pub url: Url,
    /// Admin key sent on privileged endpoints.
    pub admin_key: Option<SecretString>,
    /// TLS verification strategy.
    pub tls: TlsVerification,
    /// Whole-request timeout.
    pub timeout: Duration,
    /// TCP connect timeout.
    pub connect_timeout: Duration,
    /// Status-poll pacing while waiting for a scan.
    pub backoff: BackoffPolicy,
    /// Unlink procedure bounds.
    pub unlink: UnlinkPolicy,
    /// Age after which a pairing code is flagged stale to observers.
    pub pairing_stale_after: Duration,
}

impl LinkConfig {
    /// Defaults for everything but the bridge URL.
    pub fn new(url: Url) -> Self {
        Self {
            url,
            admin_key: None,
            tls: TlsVerification::default(),
            timeout: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(3),
            backoff: BackoffPolicy::default(),
            unlink: UnlinkPolicy::default(),
            pairing_stale_after: DEFAULT_PAIRING_STALE_AFTER,
        }
    }

    /// Transport settings for the HTTP client.
    pub fn transport(&self) -> TransportConfig {
        TransportConfig {
            tls: tls_to_transport(&self.tls),
            timeout: self.timeout,
            connect_timeout: self.connect_timeout,
        }
    }

    /// Build the bridge client this configuration describes.
    pub fn build_client(&self) -> Result<BridgeClient, CoreError> {
        Ok(BridgeClient::new(
            self.url.clone(),
            self.admin_key.as_ref(),
            &self.transport(),
        )?)
    }
}

fn tls_to_transport(tls: &TlsVerification) -> TlsMode {
    match tls {
        TlsVerification::SystemDefaults => TlsMode::System,
        TlsVerification::CustomCa(path) => TlsMode::CustomCa(path.clone()),
        TlsVerification::DangerAcceptInvalid => TlsMode::DangerAcceptInvalid,
    }
}
