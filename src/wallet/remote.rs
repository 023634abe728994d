//! Remote-bridge acquisition: wait for the companion app before connecting
//!
//! ```text
//! probe ──ok──────────────────────────────▶ inner.connect()
//!   │
//!   └─fail─▶ open companion ─▶ sleep ─▶ probe ─ok─▶ inner.connect()
//!                                ▲        │
//!                                └─fail───┘   (max_attempts times)
//!                                              then BridgeTimeout
//! ```

use super::Connector;
use crate::error::{BridgeError, BridgeResult};
use async_trait::async_trait;
use std::time::Duration;

/// One second between probes, 180 probes: a three minute ceiling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_attempts: u32,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self { interval: Duration::from_secs(1), max_attempts: 180 }
    }
}

impl PollPolicy {
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self { interval, max_attempts }
    }

    /// Time spent polling before giving up
    pub fn ceiling(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

/// Cheap reachability check against the local bridge endpoint
#[async_trait(?Send)]
pub trait LivenessProbe {
    async fn check(&self) -> BridgeResult<()>;
}

#[async_trait(?Send)]
pub trait Timer {
    async fn sleep(&self, duration: Duration);
}

/// Asks the user to start the desktop app that serves the bridge
pub trait CompanionLauncher {
    fn open_companion(&self);
}

pub struct RemoteConnector<C, P, T, L> {
    inner: C,
    probe: P,
    timer: T,
    launcher: L,
    policy: PollPolicy,
}

impl<C, P, T, L> RemoteConnector<C, P, T, L>
where
    C: Connector,
    P: LivenessProbe,
    T: Timer,
    L: CompanionLauncher,
{
    pub fn new(inner: C, probe: P, timer: T, launcher: L) -> Self {
        Self { inner, probe, timer, launcher, policy: PollPolicy::default() }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    /// Resolve once the bridge answers. After a failed first probe, runs
    /// exactly `max_attempts` more probes, each after one interval.
    pub async fn wait_for_bridge(&self) -> BridgeResult<()> {
        match self.probe.check().await {
            Ok(()) => return Ok(()),
            Err(e) => tracing::info!(error = %e, "bridge not reachable, prompting for companion app"),
        }
        self.launcher.open_companion();

        for attempt in 1..=self.policy.max_attempts {
            self.timer.sleep(self.policy.interval).await;
            match self.probe.check().await {
                Ok(()) => {
                    tracing::info!(attempt, "bridge reachable");
                    return Ok(());
                }
                Err(e) => tracing::debug!(attempt, error = %e, "bridge still down"),
            }
        }

        tracing::warn!(attempts = self.policy.max_attempts, "gave up waiting for bridge");
        Err(BridgeError::Timeout { attempts: self.policy.max_attempts })
    }
}

#[async_trait(?Send)]
impl<C, P, T, L> Connector for RemoteConnector<C, P, T, L>
where
    C: Connector,
    P: LivenessProbe,
    T: Timer,
    L: CompanionLauncher,
{
    type App = C::App;

    async fn connect(&self) -> BridgeResult<C::App> {
        self.wait_for_bridge().await?;
        self.inner.connect().await
    }
}
