//! ledger-bridge: relays signing requests from a web page to a hardware wallet.
//!
//! # Architecture
//!
//! ```text
//! page ──{target, action, params, context}──▶ Dispatcher
//!                                                │
//!                                          WalletHandle (lazy, reused)
//!                                                │
//!                                          Connector ──▶ WalletApp (device)
//!                                                │
//! page ◀──{action, payload|error, context}── Outbox
//! ```
//!
//! # Actions
//!
//! | Action | Params | Payload |
//! |--------|--------|---------|
//! | `getAddress` | `derivationPath?` | public key (confirmed on device) |
//! | `signTransaction` | `operation`, `derivationPath?` | signature over `03 ‖ operation` |
//! | `signHash` | `hash`, `derivationPath?` | signature over the raw hash |
//! | `getVersion` | - | `{major, minor, patch, bakingApp}` |
//!
//! Default derivation path: `44'/1729'/0'/0'`.
//!
//! # Features
//!
//! - `native` - stdio host + WebSocket bridge to the companion app (tokio)
//! - `wasm` - browser host: window messaging, JS wallet library (wasm-bindgen)
//!
//! # Usage
//!
//! ```ignore
//! use ledger_bridge::{BridgeConfig, Dispatcher};
//! use ledger_bridge::native::{read_requests, serve, LineOutbox, NativeConnector};
//!
//! let config = BridgeConfig::new().remote();
//! let dispatcher = Dispatcher::new(NativeConnector::from_config(&config), LineOutbox::new(std::io::stdout()));
//! let requests = read_requests(tokio::io::BufReader::new(tokio::io::stdin()), &config.target);
//! serve(std::rc::Rc::new(dispatcher), requests, ledger_bridge::runtime::shutdown_signal()).await;
//! ```

// =============================================================================
// Shared modules (compile everywhere)
// =============================================================================
pub mod bridge;
pub mod config;
pub mod core;
pub mod error;
pub mod wallet;

// =============================================================================
// Native-only modules (stdio host, tokio, WebSocket bridge)
// =============================================================================
#[cfg(feature = "native")]
pub mod logging;
#[cfg(feature = "native")]
pub mod native;
#[cfg(feature = "native")]
pub mod runtime;

// =============================================================================
// WASM-only modules (browser, wasm-bindgen)
// =============================================================================
#[cfg(feature = "wasm")]
pub mod wasm;

// =============================================================================
// Re-exports: Shared
// =============================================================================
pub use bridge::{Dispatcher, Outbox, RecordingOutbox, Subscription};
pub use config::{BridgeConfig, TransportMode};
pub use crate::core::{Action, DerivationPath, Inbound, Outcome, Response, BRIDGE_TARGET, DEFAULT_DERIVATION_PATH};
pub use error::{BridgeError, BridgeResult, ErrorPayload};
pub use wallet::{AddressInfo, AppVersion, Connector, HandleState, PollPolicy, RemoteConnector, Signature, WalletApp, WalletHandle};

// =============================================================================
// Re-exports: WASM
// =============================================================================
#[cfg(feature = "wasm")]
pub use wasm::LedgerBridge;
