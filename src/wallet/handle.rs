//! WalletHandle: lazily acquired, shared app binding

use super::Connector;
use crate::error::{BridgeError, BridgeResult};
use futures::lock::Mutex;
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Lifecycle of a handle.
///
/// `Uninitialized → Acquiring → Ready` and the app is reused from then on,
/// or `Uninitialized → Acquiring → Failed` and the next caller tries again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleState {
    Uninitialized,
    Acquiring,
    Ready,
    Failed,
}

impl HandleState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HandleState::Uninitialized => "uninitialized",
            HandleState::Acquiring => "acquiring",
            HandleState::Ready => "ready",
            HandleState::Failed => "failed",
        }
    }
}

pub struct WalletHandle<C: Connector> {
    connector: C,
    app: Mutex<Option<Rc<C::App>>>,
    state: Cell<HandleState>,
    attempts: Cell<u64>,
    settled: Cell<u64>,
    last_error: RefCell<Option<BridgeError>>,
}

impl<C: Connector> WalletHandle<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            app: Mutex::new(None),
            state: Cell::new(HandleState::Uninitialized),
            attempts: Cell::new(0),
            settled: Cell::new(0),
            last_error: RefCell::new(None),
        }
    }

    pub fn state(&self) -> HandleState {
        self.state.get()
    }

    /// Number of times `connect` has been called on the connector
    pub fn attempts(&self) -> u64 {
        self.attempts.get()
    }

    pub fn connector(&self) -> &C {
        &self.connector
    }

    /// Return the live app, connecting first if there is none.
    ///
    /// Callers arriving while an acquisition is running wait for it and
    /// share its outcome instead of starting their own.
    pub async fn acquire(&self) -> BridgeResult<Rc<C::App>> {
        let ticket = self.settled.get();
        let mut slot = self.app.lock().await;

        if let Some(app) = slot.as_ref() {
            return Ok(app.clone());
        }
        // an attempt settled while we queued and left no app: it failed
        if self.settled.get() > ticket {
            if let Some(err) = self.last_error.borrow().clone() {
                return Err(err);
            }
        }

        self.attempts.set(self.attempts.get() + 1);
        self.state.set(HandleState::Acquiring);
        tracing::debug!(attempt = self.attempts.get(), "acquiring wallet handle");

        let outcome = self.connector.connect().await;
        self.settled.set(self.settled.get() + 1);
        match outcome {
            Ok(app) => {
                let app = Rc::new(app);
                *slot = Some(app.clone());
                self.last_error.borrow_mut().take();
                self.state.set(HandleState::Ready);
                tracing::info!("wallet handle ready");
                Ok(app)
            }
            Err(e) => {
                *self.last_error.borrow_mut() = Some(e.clone());
                self.state.set(HandleState::Failed);
                tracing::warn!(error = %e, "wallet handle acquisition failed");
                Err(e)
            }
        }
    }

    /// Drop the current app so the next call reconnects
    pub async fn reset(&self) {
        let mut slot = self.app.lock().await;
        if slot.take().is_some() {
            tracing::info!("wallet handle reset");
        }
        self.state.set(HandleState::Uninitialized);
    }

    /// Drop `app` if it is still the current one. A failure reported by an
    /// app that was already replaced leaves the newer app alone.
    pub async fn reset_if(&self, app: &Rc<C::App>) -> bool {
        let mut slot = self.app.lock().await;
        match slot.as_ref() {
            Some(current) if Rc::ptr_eq(current, app) => {
                slot.take();
                self.state.set(HandleState::Uninitialized);
                tracing::info!("wallet handle reset");
                true
            }
            _ => {
                tracing::debug!("stale app failed, handle kept");
                false
            }
        }
    }
}
