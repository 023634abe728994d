//! Wire contract between the page and the bridge
//!
//! Inbound:
//! ```text
//! { target: "BEACON-SDK-LEDGER-BRIDGE", action, params, context }
//! ```
//! Outbound:
//! ```text
//! { action, payload, context }   success
//! { action, error, context }     failure
//! ```

use crate::core::path::DerivationPath;
use crate::error::{BridgeError, BridgeResult, ErrorPayload};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Messages carrying any other target are not ours
pub const BRIDGE_TARGET: &str = "BEACON-SDK-LEDGER-BRIDGE";

/// Discriminator the app expects in front of an operation payload
pub const OPERATION_TAG: u8 = 0x03;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Action {
    GetAddress,
    SignTransaction,
    SignHash,
    GetVersion,
}

impl Action {
    pub const ALL: [Action; 4] = [Action::GetAddress, Action::SignTransaction, Action::SignHash, Action::GetVersion];

    pub fn as_str(&self) -> &'static str {
        match self {
            Action::GetAddress => "getAddress",
            Action::SignTransaction => "signTransaction",
            Action::SignHash => "signHash",
            Action::GetVersion => "getVersion",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == value)
    }
}

/// Action parameters as the page sends them. Only the fields an action
/// uses are ever read; anything else in the object is ignored.
#[derive(Debug, Clone, Copy)]
pub struct Params<'a> {
    fields: Option<&'a Map<String, Value>>,
}

impl<'a> Params<'a> {
    /// `null`/missing params mean "all defaults"
    pub fn from_value(value: &'a Value) -> BridgeResult<Self> {
        match value {
            Value::Null => Ok(Self { fields: None }),
            Value::Object(map) => Ok(Self { fields: Some(map) }),
            other => Err(BridgeError::InvalidParams(format!("params must be an object, got {}", other))),
        }
    }

    /// A string field; `null` counts as absent
    pub fn text(&self, key: &str) -> BridgeResult<Option<&'a str>> {
        match self.fields.and_then(|m| m.get(key)) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(_) => Err(BridgeError::InvalidParams(format!("'{}' must be a string", key))),
        }
    }

    /// `derivationPath`, or `default_path` when absent
    pub fn path(&self, default_path: &DerivationPath) -> BridgeResult<DerivationPath> {
        match self.text("derivationPath")? {
            Some(raw) => DerivationPath::parse(raw).map_err(|e| BridgeError::InvalidParams(e.to_string())),
            None => Ok(default_path.clone()),
        }
    }
}

/// A request addressed to this bridge. `C` is the opaque context token,
/// carried untouched from request to response.
#[derive(Debug, Clone, PartialEq)]
pub struct Inbound<C> {
    pub action: Action,
    pub params: Value,
    pub context: C,
}

impl Inbound<Value> {
    /// Returns `None` for anything that is not for us: wrong target,
    /// missing or unknown action.
    pub fn from_json(target: &str, data: &Value) -> Option<Self> {
        if data.get("target")?.as_str()? != target {
            return None;
        }
        let action = Action::from_str(data.get("action")?.as_str()?)?;
        Some(Self {
            action,
            params: data.get("params").cloned().unwrap_or(Value::Null),
            context: data.get("context").cloned().unwrap_or(Value::Null),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Outcome {
    Payload(Value),
    Error(ErrorPayload),
}

impl Outcome {
    pub fn from_result(result: BridgeResult<Value>) -> Self {
        match result {
            Ok(v) => Outcome::Payload(v),
            Err(e) => Outcome::Error(e.to_payload()),
        }
    }

    pub fn is_error(&self) -> bool {
        matches!(self, Outcome::Error(_))
    }
}

/// Exactly one per handled request
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Response<C> {
    pub action: Action,
    #[serde(flatten)]
    pub outcome: Outcome,
    pub context: C,
}

/// A validated, device-ready call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    GetAddress { path: DerivationPath },
    SignOperation { path: DerivationPath, payload: String },
    SignHash { path: DerivationPath, hash: String },
    GetVersion,
}

impl Command {
    /// Validate params for `action`. Paths fall back to `default_path`;
    /// operation payloads get the tag prepended here. `getVersion` takes
    /// no params and never looks at them.
    pub fn build(action: Action, params: &Value, default_path: &DerivationPath) -> BridgeResult<Self> {
        if action == Action::GetVersion {
            return Ok(Command::GetVersion);
        }
        let params = Params::from_value(params)?;
        let path = params.path(default_path)?;

        Ok(match action {
            Action::GetAddress => Command::GetAddress { path },
            Action::SignTransaction => {
                let operation = require_hex("operation", params.text("operation")?)?;
                Command::SignOperation { path, payload: tag_operation(operation) }
            }
            Action::SignHash => {
                let hash = require_hex("hash", params.text("hash")?)?;
                Command::SignHash { path, hash: hash.to_string() }
            }
            Action::GetVersion => Command::GetVersion,
        })
    }
}

/// Prefix a hex operation with the operation discriminator
pub fn tag_operation(operation: &str) -> String {
    format!("{}{}", hex::encode([OPERATION_TAG]), operation)
}

fn require_hex<'a>(field: &str, value: Option<&'a str>) -> BridgeResult<&'a str> {
    let value = value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| BridgeError::InvalidParams(format!("missing '{}'", field)))?;
    hex::decode(value).map_err(|e| BridgeError::InvalidParams(format!("'{}' is not hex: {}", field, e)))?;
    Ok(value)
}
