//! WASM module: the bridge inside the page
//!
//! ```text
//! parent window ──postMessage──▶ window "message" listener
//!                                        │ parse_message (target + action)
//!                                        ▼
//!                               Dispatcher (shared core)
//!                                        │
//!                               BrowserConnector
//!                                 ├── Direct: createApp()
//!                                 └── Remote: probe / openCompanion / setTimeout polling
//!                                        │
//!                                        ▼
//!                       JS app object (getAddress, signOperation, ...)
//!                                        │
//! parent window ◀──postMessage("*")── WindowOutbox
//! ```

mod app;
mod bridge;

pub use app::{BrowserConnector, JsApp, JsConnector, JsLauncher, JsProbe, JsTimer, JsWalletApp};
pub use bridge::{LedgerBridge, WindowOutbox};

use wasm_bindgen::prelude::*;

/// Initialize WASM module (called automatically on load)
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
}

/// Log to browser console
pub fn console_log(s: &str) {
    web_sys::console::log_1(&JsValue::from_str(s));
}

macro_rules! log {
    ($($t:tt)*) => {
        crate::wasm::console_log(&format!($($t)*))
    }
}

pub(crate) use log;
