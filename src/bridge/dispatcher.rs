//! Dispatcher: maps an action onto the wallet app and posts the outcome

use super::{Outbox, Subscription};
use crate::core::{Action, Command, DerivationPath, Inbound, Outcome, Response};
use crate::error::{BridgeError, BridgeResult};
use crate::wallet::{Connector, WalletApp, WalletHandle};
use futures::stream::{self, FuturesUnordered, Stream, StreamExt};
use futures::{select, Future};
use serde_json::Value;
use std::rc::Rc;

pub struct Dispatcher<C: Connector, O: Outbox> {
    handle: WalletHandle<C>,
    outbox: O,
    default_path: DerivationPath,
}

impl<C: Connector, O: Outbox> Dispatcher<C, O> {
    pub fn new(connector: C, outbox: O) -> Self {
        Self { handle: WalletHandle::new(connector), outbox, default_path: DerivationPath::default() }
    }

    pub fn with_default_path(mut self, path: DerivationPath) -> Self {
        self.default_path = path;
        self
    }

    pub fn handle(&self) -> &WalletHandle<C> {
        &self.handle
    }

    pub fn outbox(&self) -> &O {
        &self.outbox
    }

    pub fn default_path(&self) -> &DerivationPath {
        &self.default_path
    }

    /// Run one action against the device. Params are validated before the
    /// handle is touched.
    pub async fn execute(&self, action: Action, params: &Value) -> BridgeResult<Value> {
        let command = Command::build(action, params, &self.default_path)?;
        let app = self.handle.acquire().await?;
        let result = run(app.as_ref(), command).await;

        if let Err(BridgeError::Disconnected(reason)) = &result {
            if self.handle.reset_if(&app).await {
                tracing::warn!(%reason, "transport dropped, next request reconnects");
            }
        }
        result
    }

    /// Handle one request and post exactly one response for it
    pub async fn dispatch(&self, inbound: Inbound<O::Context>) {
        let Inbound { action, params, context } = inbound;
        tracing::debug!(action = action.as_str(), "dispatching");

        let result = self.execute(action, &params).await;
        if let Err(e) = &result {
            tracing::warn!(action = action.as_str(), error = %e, "request failed");
        }
        self.outbox.post(Response { action, outcome: Outcome::from_result(result), context });
    }
}

impl<C, O> Dispatcher<C, O>
where
    C: Connector + 'static,
    O: Outbox + 'static,
    O::Context: 'static,
{
    /// Start taking requests from `inbound`.
    ///
    /// The returned future is the intake loop; drive it on the local
    /// executor. Disposing the subscription stops intake; requests already
    /// dispatched still run to completion and post.
    pub fn subscribe<S>(self: &Rc<Self>, inbound: S) -> (Subscription, impl Future<Output = ()>)
    where
        S: Stream<Item = Inbound<O::Context>> + 'static,
    {
        let (intake, abort) = stream::abortable(inbound);
        let this = self.clone();

        let run = async move {
            let mut intake = Box::pin(intake).fuse();
            let mut pending = FuturesUnordered::new();
            loop {
                select! {
                    next = intake.next() => match next {
                        Some(inbound) => {
                            let d = this.clone();
                            pending.push(async move { d.dispatch(inbound).await });
                        }
                        None => break,
                    },
                    () = pending.select_next_some() => {},
                    complete => break,
                }
            }
            tracing::debug!(in_flight = pending.len(), "intake closed");
            while pending.next().await.is_some() {}
        };

        (Subscription::new(move || abort.abort()), run)
    }
}

async fn run<A: WalletApp + ?Sized>(app: &A, command: Command) -> BridgeResult<Value> {
    match command {
        Command::GetAddress { path } => {
            let info = app.get_address(&path, true).await?;
            Ok(Value::String(info.public_key))
        }
        Command::SignOperation { path, payload } => {
            let sig = app.sign_operation(&path, &payload).await?;
            Ok(Value::String(sig.signature))
        }
        Command::SignHash { path, hash } => {
            let sig = app.sign_hash(&path, &hash).await?;
            Ok(Value::String(sig.signature))
        }
        Command::GetVersion => {
            let version = app.get_version().await?;
            serde_json::to_value(version).map_err(|e| BridgeError::device("SerializationError", e.to_string(), None))
        }
    }
}
