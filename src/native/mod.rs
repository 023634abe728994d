//! Native host - the bridge outside the browser
//!
//! Same message contract, different plumbing:
//!
//! ```text
//! stdin (JSON lines) ──▶ Dispatcher ──▶ stdout (JSON lines)
//!                            │
//!                     NativeConnector
//!                       ├── Direct: WsConnector
//!                       └── Remote: RemoteConnector(WsProbe, TokioTimer, LogLauncher)
//!                                          │
//!                                   ws://127.0.0.1:8435 (companion app)
//! ```
//!
//! Everything runs on one thread inside a tokio `LocalSet`.

mod stdio;
mod ws;

pub use stdio::{read_requests, LineOutbox};
pub use ws::{WsConnector, WsProbe, WsWalletApp};

use crate::bridge::{Dispatcher, Outbox};
use crate::config::{BridgeConfig, TransportMode};
use crate::core::Inbound;
use crate::error::BridgeResult;
use crate::wallet::{CompanionLauncher, Connector, RemoteConnector, Timer};
use async_trait::async_trait;
use futures::Stream;
use std::rc::Rc;
use std::time::Duration;

pub struct TokioTimer;

#[async_trait(?Send)]
impl Timer for TokioTimer {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }
}

/// No window to pop: tell the operator through the log
pub struct LogLauncher {
    companion_url: Option<String>,
}

impl LogLauncher {
    pub fn new(companion_url: Option<String>) -> Self {
        Self { companion_url }
    }
}

impl CompanionLauncher for LogLauncher {
    fn open_companion(&self) {
        match &self.companion_url {
            Some(url) => tracing::warn!(%url, "hardware wallet bridge is down: open the companion app"),
            None => tracing::warn!("hardware wallet bridge is down: open the companion app"),
        }
    }
}

pub enum NativeConnector {
    Direct(WsConnector),
    Remote(RemoteConnector<WsConnector, WsProbe, TokioTimer, LogLauncher>),
}

impl NativeConnector {
    pub fn from_config(config: &BridgeConfig) -> Self {
        let inner = WsConnector::new(&config.bridge_url, config.probe_timeout);
        match config.mode {
            TransportMode::Direct => NativeConnector::Direct(inner),
            TransportMode::RemoteBridge => {
                let probe = WsProbe::new(&config.bridge_url, config.probe_timeout);
                let launcher = LogLauncher::new(config.companion_url.clone());
                NativeConnector::Remote(RemoteConnector::new(inner, probe, TokioTimer, launcher).with_policy(config.poll))
            }
        }
    }
}

#[async_trait(?Send)]
impl Connector for NativeConnector {
    type App = WsWalletApp;

    async fn connect(&self) -> BridgeResult<WsWalletApp> {
        match self {
            NativeConnector::Direct(c) => c.connect().await,
            NativeConnector::Remote(c) => c.connect().await,
        }
    }
}

/// Run a dispatcher over `inbound` until it ends or `shutdown` resolves.
/// In-flight requests are allowed to finish after intake stops.
pub async fn serve<C, O, S, F>(dispatcher: Rc<Dispatcher<C, O>>, inbound: S, shutdown: F)
where
    C: Connector + 'static,
    O: Outbox + 'static,
    O::Context: 'static,
    S: Stream<Item = Inbound<O::Context>> + 'static,
    F: std::future::Future<Output = ()>,
{
    let (mut subscription, intake) = dispatcher.subscribe(inbound);
    let mut intake = tokio::task::spawn_local(intake);
    tokio::pin!(shutdown);

    let result = tokio::select! {
        res = &mut intake => res,
        _ = &mut shutdown => {
            tracing::info!("shutdown requested, closing intake");
            subscription.dispose();
            intake.await
        }
    };
    if let Err(e) = result {
        tracing::error!(error = %e, "intake task failed");
    }
}
