// pairlink-api: Async Rust client for the QR-paired messaging bridge

pub mod client;
pub mod error;
pub mod models;
pub mod transport;

pub use client::BridgeClient;
pub use error::Error;
pub use models::{ActionResponse, BridgeStatus, NotificationRequest, PairingCode};
pub use transport::{TlsMode, TransportConfig};
