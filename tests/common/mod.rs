//! In-memory stand-ins for the hardware wallet collaborator

#![allow(dead_code)]

use async_trait::async_trait;
use futures::channel::oneshot;
use ledger_bridge::{AddressInfo, AppVersion, BridgeError, BridgeResult, Connector, DerivationPath, Signature, WalletApp};
use std::cell::{Cell, RefCell};
use std::collections::HashMap;
use std::rc::Rc;

/// What the fake device was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetAddress { path: String, confirm: bool },
    SignOperation { path: String, payload: String },
    SignHash { path: String, hash: String },
    GetVersion,
}

/// Shared device state, observable from the test
#[derive(Default)]
pub struct Device {
    pub calls: RefCell<Vec<Call>>,
    pub connects: Cell<u32>,
    /// Next N connects fail with `Transport`
    pub connect_failures: Cell<u32>,
    /// Every device call fails with this while set
    pub fail_with: RefCell<Option<BridgeError>>,
    /// Calls to these methods wait until the sender side fires
    gates: RefCell<HashMap<&'static str, oneshot::Receiver<()>>>,
}

impl Device {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    pub fn connector(self: &Rc<Self>) -> FakeConnector {
        FakeConnector { device: self.clone() }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.borrow().clone()
    }

    pub fn fail_next_connects(&self, n: u32) {
        self.connect_failures.set(n);
    }

    pub fn fail_calls_with(&self, err: BridgeError) {
        *self.fail_with.borrow_mut() = Some(err);
    }

    pub fn heal(&self) {
        self.fail_with.borrow_mut().take();
    }

    /// Hold the next call to `method` until the returned sender fires
    pub fn gate(&self, method: &'static str) -> oneshot::Sender<()> {
        let (tx, rx) = oneshot::channel();
        self.gates.borrow_mut().insert(method, rx);
        tx
    }

    async fn enter(&self, method: &'static str, call: Call) -> BridgeResult<()> {
        self.calls.borrow_mut().push(call);
        let gate = self.gates.borrow_mut().remove(method);
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        match self.fail_with.borrow().clone() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

pub struct FakeApp {
    device: Rc<Device>,
    pub serial: u32,
}

#[async_trait(?Send)]
impl WalletApp for FakeApp {
    async fn get_address(&self, path: &DerivationPath, confirm: bool) -> BridgeResult<AddressInfo> {
        self.device.enter("getAddress", Call::GetAddress { path: path.to_string(), confirm }).await?;
        Ok(AddressInfo { public_key: format!("edpk:{}", path), address: None })
    }

    async fn sign_operation(&self, path: &DerivationPath, payload: &str) -> BridgeResult<Signature> {
        self.device
            .enter("signOperation", Call::SignOperation { path: path.to_string(), payload: payload.to_string() })
            .await?;
        Ok(Signature { signature: format!("sig:{}", payload) })
    }

    async fn sign_hash(&self, path: &DerivationPath, hash: &str) -> BridgeResult<Signature> {
        self.device.enter("signHash", Call::SignHash { path: path.to_string(), hash: hash.to_string() }).await?;
        Ok(Signature { signature: format!("sig:{}", hash) })
    }

    async fn get_version(&self) -> BridgeResult<AppVersion> {
        self.device.enter("getVersion", Call::GetVersion).await?;
        Ok(AppVersion { major: 2, minor: 3, patch: 1, baking_app: false })
    }
}

pub struct FakeConnector {
    device: Rc<Device>,
}

#[async_trait(?Send)]
impl Connector for FakeConnector {
    type App = FakeApp;

    async fn connect(&self) -> BridgeResult<FakeApp> {
        let d = &self.device;
        d.connects.set(d.connects.get() + 1);
        if d.connect_failures.get() > 0 {
            d.connect_failures.set(d.connect_failures.get() - 1);
            return Err(BridgeError::Transport("no device attached".into()));
        }
        Ok(FakeApp { device: d.clone(), serial: d.connects.get() })
    }
}
