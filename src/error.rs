//! Bridge errors and their wire form

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Everything a bridged call can fail with.
///
/// Acquisition failures (`Transport`, `PermissionDenied`, `Timeout`) and
/// device failures (`Device`, `Disconnected`) all end up as an error
/// response; none of them escape the handler.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    #[error("Transport unavailable: {0}")]
    Transport(String),

    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Bridge not reachable after {attempts} attempts")]
    Timeout { attempts: u32 },

    #[error("Transport disconnected: {0}")]
    Disconnected(String),

    #[error("{message}")]
    Device {
        name: String,
        message: String,
        status_code: Option<u16>,
    },

    #[error("Invalid params: {0}")]
    InvalidParams(String),
}

impl BridgeError {
    /// Device-side failure with the library's own naming
    pub fn device(name: impl Into<String>, message: impl Into<String>, status_code: Option<u16>) -> Self {
        BridgeError::Device { name: name.into(), message: message.into(), status_code }
    }

    pub fn name(&self) -> &str {
        match self {
            BridgeError::Transport(_) => "TransportError",
            BridgeError::PermissionDenied(_) => "PermissionDenied",
            BridgeError::Timeout { .. } => "BridgeTimeout",
            BridgeError::Disconnected(_) => "Disconnected",
            BridgeError::Device { name, .. } => name,
            BridgeError::InvalidParams(_) => "InvalidParams",
        }
    }

    pub fn status_code(&self) -> Option<u16> {
        match self {
            BridgeError::Device { status_code, .. } => *status_code,
            _ => None,
        }
    }

    /// True for failures that happened before a wallet app existed
    pub fn is_acquisition(&self) -> bool {
        matches!(self, BridgeError::Transport(_) | BridgeError::PermissionDenied(_) | BridgeError::Timeout { .. })
    }

    pub fn to_payload(&self) -> ErrorPayload {
        let message = match self {
            BridgeError::Device { message, .. } => message.clone(),
            other => other.to_string(),
        };
        ErrorPayload { name: self.name().to_string(), message, status_code: self.status_code() }
    }
}

impl From<ErrorPayload> for BridgeError {
    fn from(p: ErrorPayload) -> Self {
        match p.name.as_str() {
            "Disconnected" => BridgeError::Disconnected(p.message),
            "PermissionDenied" => BridgeError::PermissionDenied(p.message),
            "TransportError" => BridgeError::Transport(p.message),
            _ => BridgeError::Device { name: p.name, message: p.message, status_code: p.status_code },
        }
    }
}

/// Error object as posted back to the page
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorPayload {
    pub name: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
}

pub type BridgeResult<T> = Result<T, BridgeError>;
