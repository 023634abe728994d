//! Wallet - the hardware wallet as an external collaborator
//!
//! The device, its transport and the app library live outside this crate.
//! We only see them through two traits:
//!
//! ```text
//! Connector ──connect()──▶ WalletApp
//!     │                       ├── get_address(path, confirm)
//!     │                       ├── sign_operation(path, tagged payload)
//!     │                       ├── sign_hash(path, hash)
//!     │                       └── get_version()
//!     │
//!     └── RemoteConnector (optional): probe local bridge, prompt, poll
//! ```
//!
//! [`WalletHandle`] owns a connector and builds the app lazily, once.
//!
//! All traits are `?Send`: the bridge is single-threaded and the browser
//! app objects are plain `JsValue`s.

mod handle;
pub mod remote;

pub use handle::{HandleState, WalletHandle};
pub use remote::{CompanionLauncher, LivenessProbe, PollPolicy, RemoteConnector, Timer};

use crate::core::DerivationPath;
use crate::error::BridgeResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// What the app reports for a derivation path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressInfo {
    pub public_key: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Signature {
    pub signature: String,
}

/// App version descriptor, posted back as-is for `getVersion`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
    #[serde(default)]
    pub baking_app: bool,
}

/// A protocol-application binding over an open transport.
///
/// Every call may block on a confirmation prompt on the device itself.
#[async_trait(?Send)]
pub trait WalletApp {
    async fn get_address(&self, path: &DerivationPath, confirm: bool) -> BridgeResult<AddressInfo>;
    /// `payload` already carries the operation tag
    async fn sign_operation(&self, path: &DerivationPath, payload: &str) -> BridgeResult<Signature>;
    async fn sign_hash(&self, path: &DerivationPath, hash: &str) -> BridgeResult<Signature>;
    async fn get_version(&self) -> BridgeResult<AppVersion>;
}

/// Opens a transport and binds a [`WalletApp`] over it
#[async_trait(?Send)]
pub trait Connector {
    type App: WalletApp;
    async fn connect(&self) -> BridgeResult<Self::App>;
}
