//! Remote bridge client - tokio-tungstenite WebSocket to the companion app
//!
//! One socket per wallet handle. Calls are JSON frames tagged with an id:
//!
//! ```text
//! → {"id": 1, "method": "signOperation", "params": {"path": "...", "payload": "03..."}}
//! ← {"id": 1, "result": {"signature": "..."}}
//! ← {"id": 2, "error": {"name": "TransportStatusError", "message": "...", "statusCode": 27013}}
//! ```
//!
//! Replies are routed by id, so concurrent calls can share the socket.

use crate::core::DerivationPath;
use crate::error::{BridgeError, BridgeResult, ErrorPayload};
use crate::wallet::{AddressInfo, AppVersion, Connector, LivenessProbe, Signature, WalletApp};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::{connect_async, tungstenite::Message};

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<BridgeResult<Value>>>>>;

fn lock(pending: &Pending) -> MutexGuard<'_, HashMap<u64, oneshot::Sender<BridgeResult<Value>>>> {
    pending.lock().unwrap_or_else(|p| p.into_inner())
}

#[derive(Debug, Deserialize)]
struct Reply {
    id: u64,
    #[serde(default)]
    result: Option<Value>,
    #[serde(default)]
    error: Option<ErrorPayload>,
}

/// Parse a reply frame; `None` for frames that are not replies
fn parse_reply(text: &str) -> Option<(u64, BridgeResult<Value>)> {
    let reply: Reply = serde_json::from_str(text).ok()?;
    let outcome = match (reply.result, reply.error) {
        (_, Some(err)) => Err(BridgeError::from(err)),
        (Some(result), None) => Ok(result),
        (None, None) => Ok(Value::Null),
    };
    Some((reply.id, outcome))
}

/// Liveness check: open a socket, close it again
pub struct WsProbe {
    url: String,
    timeout: Duration,
}

impl WsProbe {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self { url: url.into(), timeout }
    }
}

#[async_trait(?Send)]
impl LivenessProbe for WsProbe {
    async fn check(&self) -> BridgeResult<()> {
        let (mut ws, _) = tokio::time::timeout(self.timeout, connect_async(&self.url))
            .await
            .map_err(|_| BridgeError::Transport(format!("{} did not answer within {:?}", self.url, self.timeout)))?
            .map_err(|e| BridgeError::Transport(format!("{}: {}", self.url, e)))?;
        let _ = ws.close(None).await;
        Ok(())
    }
}

pub struct WsConnector {
    url: String,
    timeout: Duration,
}

impl WsConnector {
    pub fn new(url: impl Into<String>, timeout: Duration) -> Self {
        Self { url: url.into(), timeout }
    }
}

#[async_trait(?Send)]
impl Connector for WsConnector {
    type App = WsWalletApp;

    async fn connect(&self) -> BridgeResult<WsWalletApp> {
        WsWalletApp::connect(&self.url, self.timeout).await
    }
}

/// Wallet app living on the far side of the bridge socket
pub struct WsWalletApp {
    tx: mpsc::Sender<String>,
    pending: Pending,
    next_id: AtomicU64,
    closed: Arc<AtomicBool>,
}

impl WsWalletApp {
    pub async fn connect(url: &str, timeout: Duration) -> BridgeResult<Self> {
        let (ws, _) = tokio::time::timeout(timeout, connect_async(url))
            .await
            .map_err(|_| BridgeError::Transport(format!("{} did not answer within {:?}", url, timeout)))?
            .map_err(|e| BridgeError::Transport(format!("{}: {}", url, e)))?;
        let (mut write, mut read) = ws.split();
        tracing::info!(%url, "bridge socket open");

        let (out_tx, mut out_rx) = mpsc::channel::<String>(32);
        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let closed = Arc::new(AtomicBool::new(false));

        // Writer
        let closed_w = closed.clone();
        tokio::spawn(async move {
            while let Some(msg) = out_rx.recv().await {
                if write.send(Message::Text(msg)).await.is_err() {
                    break;
                }
            }
            closed_w.store(true, Ordering::SeqCst);
        });

        // Reader: route replies, then fail whatever is left once the socket ends
        let (pending_r, closed_r) = (pending.clone(), closed.clone());
        tokio::spawn(async move {
            while let Some(Ok(msg)) = read.next().await {
                match msg {
                    Message::Text(text) => match parse_reply(&text) {
                        Some((id, outcome)) => {
                            if let Some(waiter) = lock(&pending_r).remove(&id) {
                                let _ = waiter.send(outcome);
                            } else {
                                tracing::debug!(id, "reply for unknown request");
                            }
                        }
                        None => tracing::debug!("ignoring non-reply frame"),
                    },
                    Message::Close(_) => break,
                    _ => {}
                }
            }
            closed_r.store(true, Ordering::SeqCst);
            let orphans: Vec<_> = lock(&pending_r).drain().collect();
            for (_, waiter) in orphans {
                let _ = waiter.send(Err(BridgeError::Disconnected("bridge socket closed".into())));
            }
            tracing::info!("bridge socket closed");
        });

        Ok(Self { tx: out_tx, pending, next_id: AtomicU64::new(1), closed })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    async fn call(&self, method: &str, params: Value) -> BridgeResult<Value> {
        if self.is_closed() {
            return Err(BridgeError::Disconnected("bridge socket closed".into()));
        }
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        lock(&self.pending).insert(id, tx);
        // reader marks closed before draining, so a late insert is caught here
        if self.is_closed() {
            lock(&self.pending).remove(&id);
            return Err(BridgeError::Disconnected("bridge socket closed".into()));
        }

        let frame = json!({"id": id, "method": method, "params": params}).to_string();
        if self.tx.send(frame).await.is_err() {
            lock(&self.pending).remove(&id);
            return Err(BridgeError::Disconnected("bridge writer stopped".into()));
        }
        rx.await.map_err(|_| BridgeError::Disconnected("reply channel dropped".into()))?
    }

    async fn call_as<T: DeserializeOwned>(&self, method: &str, params: Value) -> BridgeResult<T> {
        let value = self.call(method, params).await?;
        serde_json::from_value(value).map_err(|e| BridgeError::device("ProtocolError", format!("bad {} reply: {}", method, e), None))
    }
}

#[async_trait(?Send)]
impl WalletApp for WsWalletApp {
    async fn get_address(&self, path: &DerivationPath, confirm: bool) -> BridgeResult<AddressInfo> {
        self.call_as("getAddress", json!({"path": path, "confirm": confirm})).await
    }

    async fn sign_operation(&self, path: &DerivationPath, payload: &str) -> BridgeResult<Signature> {
        self.call_as("signOperation", json!({"path": path, "payload": payload})).await
    }

    async fn sign_hash(&self, path: &DerivationPath, hash: &str) -> BridgeResult<Signature> {
        self.call_as("signHash", json!({"path": path, "hash": hash})).await
    }

    async fn get_version(&self) -> BridgeResult<AppVersion> {
        self.call_as("getVersion", json!({})).await
    }
}
