//! Bridge - message in, device call, response out
//!
//! ```text
//! inbound stream ──▶ subscribe() intake ──▶ Dispatcher::dispatch
//!                         │                      │
//!                    Subscription           Command::build
//!                    (disposer)                  │
//!                                          WalletHandle::acquire
//!                                                │
//!                                          WalletApp call
//!                                                │
//!                                          Outbox::post ──▶ page
//! ```
//!
//! Requests run concurrently and may finish in any order. The `context`
//! token on each response is the only way to pair it with its request.

mod dispatcher;
mod subscription;

pub use dispatcher::Dispatcher;
pub use subscription::Subscription;

use crate::core::Response;
use futures::channel::mpsc;
use std::cell::RefCell;

/// Where responses go. Posting is fire-and-forget, like `postMessage`.
pub trait Outbox {
    /// Opaque correlation token type for this transport
    type Context;
    fn post(&self, response: Response<Self::Context>);
}

impl<C> Outbox for mpsc::UnboundedSender<Response<C>> {
    type Context = C;
    fn post(&self, response: Response<C>) {
        if self.unbounded_send(response).is_err() {
            tracing::warn!("response dropped: outbox receiver gone");
        }
    }
}

/// Keeps every response in order of posting
pub struct RecordingOutbox<C> {
    posted: RefCell<Vec<Response<C>>>,
}

impl<C> Default for RecordingOutbox<C> {
    fn default() -> Self {
        Self { posted: RefCell::new(Vec::new()) }
    }
}

impl<C: Clone> RecordingOutbox<C> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn posted(&self) -> Vec<Response<C>> {
        self.posted.borrow().clone()
    }

    pub fn len(&self) -> usize {
        self.posted.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.posted.borrow().is_empty()
    }
}

impl<C> Outbox for RecordingOutbox<C> {
    type Context = C;
    fn post(&self, response: Response<C>) {
        self.posted.borrow_mut().push(response);
    }
}
