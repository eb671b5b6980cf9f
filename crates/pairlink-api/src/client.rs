// Bridge HTTP client
//
// Wraps `reqwest::Client` with bridge URL construction, admin-key
// injection, error-body parsing and caller cancellation. Every method is
// a single request: retry policy belongs to the caller.

use std::time::Duration;

use reqwest::RequestBuilder;
use secrecy::SecretString;
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace};
use url::Url;

use crate::error::Error;
use crate::models::{ActionResponse, BridgeStatus, ErrorBody, NotificationRequest, PairingCode};
use crate::transport::TransportConfig;

/// Raw HTTP client for the messaging bridge.
///
/// Public endpoints (status, notify) go through `http`; privileged ones
/// (pairing code, unlink, relink, close-session) go through `admin`,
/// which carries the `X-Admin-Key` header when a key is configured.
#[derive(Clone)]
pub struct BridgeClient {
    http: reqwest::Client,
    admin: reqwest::Client,
    base_url: Url,
    /// Whole-request timeout the clients were built with, if known.
    timeout: Option<Duration>,
}

impl BridgeClient {
    /// Create a new client from a `TransportConfig`.
    ///
    /// `base_url` is the gateway root the `/bridge/...` paths hang off,
    /// e.g. `http://clinic-backend:8000/api`.
    pub fn new(
        base_url: Url,
        admin_key: Option<&SecretString>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        let admin = match admin_key {
            Some(key) => transport.build_admin_client(key)?,
            None => http.clone(),
        };
        Ok(Self {
            http,
            admin,
            base_url,
            timeout: Some(transport.timeout),
        })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    ///
    /// The same client serves both public and privileged endpoints, so
    /// any admin header must already be among its default headers.
    /// Its timeouts surface as `Error::Transport`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self {
            admin: http.clone(),
            http,
            base_url,
            timeout: None,
        }
    }

    /// The gateway base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// `GET /bridge/status`
    pub async fn status(&self, cancel: &CancellationToken) -> Result<BridgeStatus, Error> {
        let url = self.bridge_url("status")?;
        debug!("GET {url}");
        self.send(cancel, self.http.get(url)).await
    }

    /// `GET /bridge/pairing-code` — `Ok(None)` when already paired.
    pub async fn pairing_code(&self, cancel: &CancellationToken) -> Result<Option<String>, Error> {
        let url = self.bridge_url("pairing-code")?;
        debug!("GET {url}");
        let body: PairingCode = self.send(cancel, self.admin.get(url)).await?;
        trace!(available = body.code.is_some(), "pairing code fetched");
        Ok(body.code)
    }

    /// `POST /bridge/unlink` — logout and discard the bridge credentials.
    pub async fn request_unlink(&self, cancel: &CancellationToken) -> Result<ActionResponse, Error> {
        let url = self.bridge_url("unlink")?;
        debug!("POST {url}");
        self.send(cancel, self.admin.post(url)).await
    }

    /// `POST /bridge/relink` — ask the bridge to start a new session.
    pub async fn request_relink(&self, cancel: &CancellationToken) -> Result<ActionResponse, Error> {
        let url = self.bridge_url("relink")?;
        debug!("POST {url}");
        self.send(cancel, self.admin.post(url)).await
    }

    /// `POST /bridge/close-session` — drop the socket, keep credentials.
    pub async fn close_session(&self, cancel: &CancellationToken) -> Result<ActionResponse, Error> {
        let url = self.bridge_url("close-session")?;
        debug!("POST {url}");
        self.send(cancel, self.admin.post(url)).await
    }

    /// `GET /bridge/notify` — send an appointment confirmation.
    pub async fn notify(
        &self,
        request: &NotificationRequest,
        cancel: &CancellationToken,
    ) -> Result<ActionResponse, Error> {
        let url = self.bridge_url("notify")?;
        debug!("GET {url}");
        self.send(cancel, self.http.get(url).query(&request.query())).await
    }

    // ── Request helpers ──────────────────────────────────────────────

    /// Build `{base}/bridge/{path}`.
    fn bridge_url(&self, path: &str) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/bridge/{path}"))?)
    }

    /// Race the request against `cancel`. Dropping the losing future
    /// aborts the in-flight request.
    async fn send<T: DeserializeOwned>(
        &self,
        cancel: &CancellationToken,
        request: RequestBuilder,
    ) -> Result<T, Error> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(Error::Cancelled),
            result = execute(request) => result.map_err(|e| self.transport_error(e)),
        }
    }

    /// Report reqwest's own timeouts with the configured limit.
    fn transport_error(&self, err: Error) -> Error {
        match (err, self.timeout) {
            (Error::Transport(e), Some(timeout)) if e.is_timeout() => Error::Timeout {
                timeout_secs: timeout.as_secs(),
            },
            (err, _) => err,
        }
    }
}

async fn execute<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, Error> {
    let resp = request.send().await?;
    let status = resp.status();
    let body = resp.text().await?;

    if !status.is_success() {
        let message = serde_json::from_str::<ErrorBody>(&body)
            .ok()
            .and_then(ErrorBody::into_message)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
        return Err(Error::Remote {
            status: status.as_u16(),
            message,
        });
    }

    serde_json::from_str(&body).map_err(|e| {
        let preview: String = body.chars().take(200).collect();
        Error::Deserialization {
            message: format!("{e} (body preview: {preview:?})"),
            body,
        }
    })
}
