// Wire types for the bridge HTTP API.
//
// Older bridge builds answer with Spanish field names (`conectado`,
// `phone`, `qr`, `mensaje`); serde aliases accept both spellings.

use serde::{Deserialize, Serialize};

/// `GET /bridge/status`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BridgeStatus {
    #[serde(alias = "conectado")]
    pub connected: bool,
    /// Linked account identifier (phone number) while connected.
    #[serde(default, alias = "phone", skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
}

/// `GET /bridge/pairing-code`
///
/// `code` is `None` when the bridge is already paired or has not produced
/// a code yet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingCode {
    #[serde(default, alias = "qr")]
    pub code: Option<String>,
}

/// Answer to the control endpoints (unlink, relink, close-session, notify).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionResponse {
    pub ok: bool,
    #[serde(default, alias = "mensaje", alias = "error")]
    pub message: String,
}

/// Error body shapes seen on non-2xx answers.
///
/// The gateway uses `detail`, the bridge itself uses `error`, some
/// proxies use `message`. First one present wins.
#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorBody {
    #[serde(default)]
    detail: Option<serde_json::Value>,
    #[serde(default)]
    message: Option<serde_json::Value>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl ErrorBody {
    pub(crate) fn into_message(self) -> Option<String> {
        [self.detail, self.message, self.error]
            .into_iter()
            .flatten()
            .find_map(|v| match v {
                serde_json::Value::String(s) if !s.is_empty() => Some(s),
                serde_json::Value::Null | serde_json::Value::String(_) => None,
                other => Some(other.to_string()),
            })
    }
}

/// Appointment confirmation sent through the bridge (`GET /bridge/notify`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationRequest {
    /// Destination MSISDN, country prefix included, digits only.
    pub number: String,
    /// Owner's name.
    pub name: String,
    /// Patient name(s).
    pub patient: String,
    /// Appointment date as shown to the owner.
    pub date: String,
    /// Appointment time, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time: Option<String>,
}

impl NotificationRequest {
    /// Check the destination number before bothering the bridge.
    ///
    /// The number must be all digits, start with `prefix` and be at least
    /// `min_len` characters long.
    pub fn validate(&self, prefix: &str, min_len: usize) -> Result<(), String> {
        if self.number.is_empty() || !self.number.chars().all(|c| c.is_ascii_digit()) {
            return Err(format!("number '{}' must contain digits only", self.number));
        }
        if !self.number.starts_with(prefix) {
            return Err(format!("number must start with country prefix {prefix}"));
        }
        if self.number.len() < min_len {
            return Err(format!("number must be at least {min_len} digits long"));
        }
        Ok(())
    }

    pub(crate) fn query(&self) -> Vec<(&'static str, &str)> {
        let mut params = vec![
            ("number", self.number.as_str()),
            ("name", self.name.as_str()),
            ("patient", self.patient.as_str()),
            ("date", self.date.as_str()),
        ];
        if let Some(ref time) = self.time {
            params.push(("time", time.as_str()));
        }
        params
    }
}
