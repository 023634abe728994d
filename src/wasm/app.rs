//! JS wallet library glue
//!
//! The page hands us a `createApp` factory. Whatever it resolves to must
//! look like the vendor app object:
//!
//! ```javascript
//! app.getAddress(path, confirm)      // → { publicKey, address? }
//! app.signOperation(path, payload)   // → { signature }
//! app.signHash(path, hash)           // → { signature }
//! app.getVersion()                   // → { major, minor, patch, bakingApp }
//! ```

use crate::core::DerivationPath;
use crate::error::{BridgeError, BridgeResult};
use crate::wallet::{AddressInfo, AppVersion, CompanionLauncher, Connector, LivenessProbe, RemoteConnector, Signature, Timer, WalletApp};
use async_trait::async_trait;
use js_sys::{Function, Promise, Reflect};
use serde::de::DeserializeOwned;
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

#[wasm_bindgen]
extern "C" {
    /// App object returned by the page's factory
    pub type JsWalletApp;

    #[wasm_bindgen(method, catch, js_name = getAddress)]
    fn get_address(this: &JsWalletApp, path: &str, confirm: bool) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method, catch, js_name = signOperation)]
    fn sign_operation(this: &JsWalletApp, path: &str, payload: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method, catch, js_name = signHash)]
    fn sign_hash(this: &JsWalletApp, path: &str, hash: &str) -> Result<JsValue, JsValue>;

    #[wasm_bindgen(method, catch, js_name = getVersion)]
    fn get_version(this: &JsWalletApp) -> Result<JsValue, JsValue>;
}

/// Await a value that may or may not be a Promise
async fn settle(value: JsValue) -> Result<JsValue, JsValue> {
    JsFuture::from(Promise::resolve(&value)).await
}

fn field(value: &JsValue, key: &str) -> JsValue {
    Reflect::get(value, &JsValue::from_str(key)).unwrap_or(JsValue::UNDEFINED)
}

/// Turn a thrown JS value into a device error, keeping the library's naming
pub(crate) fn device_error(err: JsValue) -> BridgeError {
    if let Some(message) = err.as_string() {
        return BridgeError::device("Error", message, None);
    }
    let name = field(&err, "name").as_string().unwrap_or_else(|| "Error".into());
    let message = field(&err, "message").as_string().unwrap_or_else(|| format!("{:?}", err));
    let status_code = field(&err, "statusCode").as_f64().map(|c| c as u16);

    match name.as_str() {
        "DisconnectedDevice" | "DisconnectedDeviceDuringOperation" => BridgeError::Disconnected(message),
        _ => BridgeError::Device { name, message, status_code },
    }
}

/// Same, for failures while opening the transport
fn acquisition_error(err: JsValue) -> BridgeError {
    match device_error(err) {
        BridgeError::Device { name, message, .. } => match name.as_str() {
            "NotAllowedError" | "SecurityError" | "TransportOpenUserCancelled" => BridgeError::PermissionDenied(message),
            _ => BridgeError::Transport(message),
        },
        other => other,
    }
}

fn decode<T: DeserializeOwned>(method: &str, value: JsValue) -> BridgeResult<T> {
    serde_wasm_bindgen::from_value(value).map_err(|e| BridgeError::device("ProtocolError", format!("bad {} result: {}", method, e), None))
}

pub struct JsApp {
    inner: JsWalletApp,
}

#[async_trait(?Send)]
impl WalletApp for JsApp {
    async fn get_address(&self, path: &DerivationPath, confirm: bool) -> BridgeResult<AddressInfo> {
        let pending = self.inner.get_address(path.as_str(), confirm).map_err(device_error)?;
        decode("getAddress", settle(pending).await.map_err(device_error)?)
    }

    async fn sign_operation(&self, path: &DerivationPath, payload: &str) -> BridgeResult<Signature> {
        let pending = self.inner.sign_operation(path.as_str(), payload).map_err(device_error)?;
        decode("signOperation", settle(pending).await.map_err(device_error)?)
    }

    async fn sign_hash(&self, path: &DerivationPath, hash: &str) -> BridgeResult<Signature> {
        let pending = self.inner.sign_hash(path.as_str(), hash).map_err(device_error)?;
        decode("signHash", settle(pending).await.map_err(device_error)?)
    }

    async fn get_version(&self) -> BridgeResult<AppVersion> {
        let pending = self.inner.get_version().map_err(device_error)?;
        decode("getVersion", settle(pending).await.map_err(device_error)?)
    }
}

/// Calls the page's `createApp()` factory
pub struct JsConnector {
    factory: Function,
}

impl JsConnector {
    pub fn new(factory: Function) -> Self {
        Self { factory }
    }
}

#[async_trait(?Send)]
impl Connector for JsConnector {
    type App = JsApp;

    async fn connect(&self) -> BridgeResult<JsApp> {
        let created = self.factory.call0(&JsValue::NULL).map_err(acquisition_error)?;
        let app = settle(created).await.map_err(acquisition_error)?;
        if !app.is_object() {
            return Err(BridgeError::Transport("createApp did not return an app object".into()));
        }
        Ok(JsApp { inner: app.unchecked_into() })
    }
}

/// Page-supplied `probe()`; alive when it resolves truthy
pub struct JsProbe {
    probe: Function,
}

impl JsProbe {
    pub fn new(probe: Function) -> Self {
        Self { probe }
    }
}

#[async_trait(?Send)]
impl LivenessProbe for JsProbe {
    async fn check(&self) -> BridgeResult<()> {
        let pending = self.probe.call0(&JsValue::NULL).map_err(acquisition_error)?;
        let alive = settle(pending).await.map_err(acquisition_error)?;
        if alive.is_truthy() {
            Ok(())
        } else {
            Err(BridgeError::Transport("bridge not reachable".into()))
        }
    }
}

/// `setTimeout` as a future
pub struct JsTimer;

#[async_trait(?Send)]
impl Timer for JsTimer {
    async fn sleep(&self, duration: Duration) {
        let ms = duration.as_millis().min(i32::MAX as u128) as i32;
        let promise = Promise::new(&mut |resolve, _reject| {
            let scheduled = web_sys::window()
                .map(|window| window.set_timeout_with_callback_and_timeout_and_arguments_0(&resolve, ms).is_ok())
                .unwrap_or(false);
            // no timer: resolve now
            if !scheduled {
                let _ = resolve.call0(&JsValue::NULL);
            }
        });
        let _ = JsFuture::from(promise).await;
    }
}

/// Opens the companion app via a page callback or a deep link
pub enum JsLauncher {
    Callback(Function),
    Url(String),
    Nothing,
}

impl CompanionLauncher for JsLauncher {
    fn open_companion(&self) {
        match self {
            JsLauncher::Callback(f) => {
                if let Err(e) = f.call0(&JsValue::NULL) {
                    super::log!("[LedgerBridge] openCompanion threw: {:?}", e);
                }
            }
            JsLauncher::Url(url) => {
                if let Some(window) = web_sys::window() {
                    let _ = window.open_with_url(url);
                }
            }
            JsLauncher::Nothing => super::log!("[LedgerBridge] bridge unreachable, waiting for companion app"),
        }
    }
}

pub enum BrowserConnector {
    Direct(JsConnector),
    Remote(RemoteConnector<JsConnector, JsProbe, JsTimer, JsLauncher>),
}

#[async_trait(?Send)]
impl Connector for BrowserConnector {
    type App = JsApp;

    async fn connect(&self) -> BridgeResult<JsApp> {
        match self {
            BrowserConnector::Direct(c) => c.connect().await,
            BrowserConnector::Remote(c) => c.connect().await,
        }
    }
}
