//! Bridge configuration - built by the hosting layer (CLI flags, JS options)

use crate::core::{DerivationPath, BRIDGE_TARGET};
use crate::wallet::PollPolicy;
use std::time::Duration;

/// Local WebSocket endpoint the companion app serves
pub const DEFAULT_BRIDGE_URL: &str = "ws://127.0.0.1:8435";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportMode {
    /// Talk to the wallet library directly
    Direct,
    /// Go through the companion app's local bridge, polling until it is up
    RemoteBridge,
}

impl Default for TransportMode {
    fn default() -> Self { Self::Direct }
}

impl TransportMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Direct => "direct",
            TransportMode::RemoteBridge => "remote",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "direct" | "local" => Some(TransportMode::Direct),
            "remote" | "bridge" => Some(TransportMode::RemoteBridge),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BridgeConfig {
    pub target: String,
    pub default_path: DerivationPath,
    pub mode: TransportMode,
    pub bridge_url: String,
    pub companion_url: Option<String>,
    pub probe_timeout: Duration,
    pub poll: PollPolicy,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            target: BRIDGE_TARGET.into(),
            default_path: DerivationPath::default(),
            mode: TransportMode::default(),
            bridge_url: DEFAULT_BRIDGE_URL.into(),
            companion_url: None,
            probe_timeout: Duration::from_millis(500),
            poll: PollPolicy::default(),
        }
    }
}

impl BridgeConfig {
    pub fn new() -> Self { Self::default() }
    pub fn with_target(mut self, t: impl Into<String>) -> Self { self.target = t.into(); self }
    pub fn with_default_path(mut self, p: DerivationPath) -> Self { self.default_path = p; self }
    pub fn with_mode(mut self, m: TransportMode) -> Self { self.mode = m; self }
    pub fn with_bridge_url(mut self, url: impl Into<String>) -> Self { self.bridge_url = url.into(); self }
    pub fn with_companion_url(mut self, url: impl Into<String>) -> Self { self.companion_url = Some(url.into()); self }
    pub fn with_probe_timeout(mut self, d: Duration) -> Self { self.probe_timeout = d; self }
    pub fn with_poll(mut self, p: PollPolicy) -> Self { self.poll = p; self }
    pub fn remote(mut self) -> Self { self.mode = TransportMode::RemoteBridge; self }
}
