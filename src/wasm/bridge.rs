//! LedgerBridge: the dispatcher wired to the hosting window

use super::app::{BrowserConnector, JsConnector, JsLauncher, JsProbe, JsTimer};
use super::log;
use crate::bridge::{Dispatcher, Outbox, Subscription};
use crate::config::BridgeConfig;
use crate::core::{Action, DerivationPath, Inbound, Outcome, Response};
use crate::wallet::{PollPolicy, RemoteConnector};
use futures::channel::mpsc;
use js_sys::{Function, Object, Reflect};
use serde::Serialize;
use serde_json::Value;
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use web_sys::MessageEvent;

/// Posts to `window.parent` with a wildcard origin
pub struct WindowOutbox;

fn to_js<T: Serialize>(value: &T) -> JsValue {
    let serializer = serde_wasm_bindgen::Serializer::new().serialize_maps_as_objects(true);
    value.serialize(&serializer).unwrap_or(JsValue::NULL)
}

fn build_message(response: &Response<JsValue>) -> Result<JsValue, JsValue> {
    let msg = Object::new();
    Reflect::set(&msg, &"action".into(), &response.action.as_str().into())?;
    match &response.outcome {
        Outcome::Payload(p) => Reflect::set(&msg, &"payload".into(), &to_js(p))?,
        Outcome::Error(e) => Reflect::set(&msg, &"error".into(), &to_js(e))?,
    };
    // context goes back as the very same JS value
    Reflect::set(&msg, &"context".into(), &response.context)?;
    Ok(msg.into())
}

impl Outbox for WindowOutbox {
    type Context = JsValue;

    fn post(&self, response: Response<JsValue>) {
        let Some(window) = web_sys::window() else {
            log!("[LedgerBridge] no window, dropping {} response", response.action.as_str());
            return;
        };
        let target = match window.parent() {
            Ok(Some(parent)) => parent,
            _ => window,
        };
        let sent = build_message(&response).and_then(|msg| target.post_message(&msg, "*"));
        if let Err(e) = sent {
            log!("[LedgerBridge] postMessage failed: {:?}", e);
        }
    }
}

/// Read an inbound window message; `None` if it is not for `target`
fn parse_message(target: &str, data: &JsValue) -> Option<Inbound<JsValue>> {
    if !data.is_object() {
        return None;
    }
    let get = |key: &str| Reflect::get(data, &JsValue::from_str(key)).ok();
    if get("target")?.as_string()? != target {
        return None;
    }
    let action = Action::from_str(&get("action")?.as_string()?)?;
    let raw = get("params").unwrap_or(JsValue::UNDEFINED);
    let params = if raw.is_undefined() || raw.is_null() {
        Value::Null
    } else {
        // unreadable params fail validation downstream
        serde_wasm_bindgen::from_value(raw).unwrap_or_else(|e| Value::String(e.to_string()))
    };
    Some(Inbound { action, params, context: get("context").unwrap_or(JsValue::UNDEFINED) })
}

fn opt_function(options: &JsValue, key: &str) -> Option<Function> {
    Reflect::get(options, &JsValue::from_str(key)).ok()?.dyn_into::<Function>().ok()
}

fn opt_string(options: &JsValue, key: &str) -> Option<String> {
    Reflect::get(options, &JsValue::from_str(key)).ok()?.as_string()
}

fn opt_number(options: &JsValue, key: &str) -> Option<f64> {
    Reflect::get(options, &JsValue::from_str(key)).ok()?.as_f64()
}

/// Browser-resident hardware wallet bridge.
///
/// ```javascript
/// const bridge = new LedgerBridge({
///     createApp: async () => new Tezos(await TransportWebHID.create()),
/// });
/// bridge.listen();
/// ```
#[wasm_bindgen]
pub struct LedgerBridge {
    dispatcher: Rc<Dispatcher<BrowserConnector, WindowOutbox>>,
    target: String,
    subscription: RefCell<Option<Subscription>>,
}

#[wasm_bindgen]
impl LedgerBridge {
    /// Options: `createApp` (required), `probe`, `openCompanion`,
    /// `companionUrl`, `target`, `derivationPath`, `pollIntervalMs`,
    /// `pollAttempts`.
    #[wasm_bindgen(constructor)]
    pub fn new(options: JsValue) -> Result<LedgerBridge, JsValue> {
        let create_app = opt_function(&options, "createApp")
            .ok_or_else(|| JsValue::from_str("LedgerBridge: options.createApp must be a function"))?;

        let mut config = BridgeConfig::new();
        if let Some(target) = opt_string(&options, "target") {
            config = config.with_target(target);
        }
        if let Some(raw) = opt_string(&options, "derivationPath") {
            let path = DerivationPath::parse(&raw).map_err(|e| JsValue::from_str(&e.to_string()))?;
            config = config.with_default_path(path);
        }
        let mut poll = PollPolicy::default();
        if let Some(ms) = opt_number(&options, "pollIntervalMs") {
            poll.interval = Duration::from_millis(ms.max(0.0) as u64);
        }
        if let Some(n) = opt_number(&options, "pollAttempts") {
            poll.max_attempts = n.max(0.0) as u32;
        }
        config = config.with_poll(poll);

        let direct = JsConnector::new(create_app);
        let connector = match opt_function(&options, "probe") {
            Some(probe) => {
                let launcher = match (opt_function(&options, "openCompanion"), opt_string(&options, "companionUrl")) {
                    (Some(f), _) => JsLauncher::Callback(f),
                    (None, Some(url)) => JsLauncher::Url(url),
                    (None, None) => JsLauncher::Nothing,
                };
                log!("[LedgerBridge] remote bridge mode, polling every {:?} up to {} times", config.poll.interval, config.poll.max_attempts);
                BrowserConnector::Remote(RemoteConnector::new(direct, JsProbe::new(probe), JsTimer, launcher).with_policy(config.poll))
            }
            None => BrowserConnector::Direct(direct),
        };

        let dispatcher = Dispatcher::new(connector, WindowOutbox).with_default_path(config.default_path.clone());
        Ok(Self { dispatcher: Rc::new(dispatcher), target: config.target, subscription: RefCell::new(None) })
    }

    /// Start handling `message` events on this window. Idempotent.
    #[wasm_bindgen]
    pub fn listen(&self) -> Result<(), JsValue> {
        if self.subscription.borrow().is_some() {
            return Ok(());
        }
        let window = web_sys::window().ok_or_else(|| JsValue::from_str("LedgerBridge: no window"))?;

        let (tx, rx) = mpsc::unbounded::<Inbound<JsValue>>();
        let target = self.target.clone();
        let on_message = Closure::<dyn FnMut(MessageEvent)>::new(move |event: MessageEvent| {
            if let Some(inbound) = parse_message(&target, &event.data()) {
                let _ = tx.unbounded_send(inbound);
            }
        });
        window.add_event_listener_with_callback("message", on_message.as_ref().unchecked_ref())?;

        let (mut intake, run) = self.dispatcher.subscribe(rx);
        wasm_bindgen_futures::spawn_local(run);

        let subscription = Subscription::new(move || {
            if let Some(window) = web_sys::window() {
                let _ = window.remove_event_listener_with_callback("message", on_message.as_ref().unchecked_ref());
            }
            drop(on_message);
            intake.dispose();
        });
        *self.subscription.borrow_mut() = Some(subscription);
        log!("[LedgerBridge] listening for {}", self.target);
        Ok(())
    }

    /// Detach the window listener. Requests already running still answer.
    #[wasm_bindgen]
    pub fn dispose(&self) {
        if let Some(mut subscription) = self.subscription.borrow_mut().take() {
            subscription.dispose();
            log!("[LedgerBridge] disposed");
        }
    }

    #[wasm_bindgen(getter)]
    pub fn listening(&self) -> bool {
        self.subscription.borrow().is_some()
    }

    /// `uninitialized`, `acquiring`, `ready` or `failed`
    #[wasm_bindgen(getter, js_name = "handleState")]
    pub fn handle_state(&self) -> String {
        self.dispatcher.handle().state().as_str().to_string()
    }
}
