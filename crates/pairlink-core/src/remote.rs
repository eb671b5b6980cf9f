// ── Remote link seam ──
//
// The four bridge operations the controller depends on. `BridgeClient`
// is the production implementation; tests script their own.

use std::future::Future;

use pairlink_api::{ActionResponse, BridgeClient, BridgeStatus, Error};
use tokio_util::sync::CancellationToken;

/// Single-shot bridge operations used by the poller, the unlink
/// orchestrator and the controller.
///
/// Implementations perform one request per call with no retry, and
/// return [`Error::Cancelled`] promptly once `cancel` fires.
pub trait RemoteLink: Send + Sync + 'static {
    fn status(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<BridgeStatus, Error>> + Send;

    /// `Ok(None)` is a valid answer: the bridge is paired, or has no code yet.
    fn pairing_code(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Option<String>, Error>> + Send;

    fn request_unlink(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ActionResponse, Error>> + Send;

    fn request_relink(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ActionResponse, Error>> + Send;
}

impl RemoteLink for BridgeClient {
    fn status(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<BridgeStatus, Error>> + Send {
        BridgeClient::status(self, cancel)
    }

    fn pairing_code(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<Option<String>, Error>> + Send {
        BridgeClient::pairing_code(self, cancel)
    }

    fn request_unlink(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ActionResponse, Error>> + Send {
        BridgeClient::request_unlink(self, cancel)
    }

    fn request_relink(
        &self,
        cancel: &CancellationToken,
    ) -> impl Future<Output = Result<ActionResponse, Error>> + Send {
        BridgeClient::request_relink(self, cancel)
    }
}
