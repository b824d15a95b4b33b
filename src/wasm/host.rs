//! Browser host: `globalThis` as the root object, `window` for custom events.

use std::cell::RefCell;
use std::rc::Rc;

use async_trait::async_trait;
use js_sys::{Array, Function, Object, Promise, Reflect};
use serde_json::Value;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use super::convert::{to_js, to_json, upstream};
use crate::error::{WalletError, WalletResult};
use crate::host::memory::same_listener;
use crate::host::{HostEnvironment, InjectedObject, Listener};

/// A JS callback handed to a wallet, kept alive until it is unregistered.
struct Registration {
    target: JsValue,
    event: String,
    listener: Listener,
    callback: Closure<dyn Fn(JsValue)>,
}

thread_local! {
    static REGISTRATIONS: RefCell<Vec<Registration>> = RefCell::new(Vec::new());
}

fn remember(target: &JsValue, event: &str, listener: &Listener, callback: Closure<dyn Fn(JsValue)>) {
    REGISTRATIONS.with(|r| {
        r.borrow_mut().push(Registration {
            target: target.clone(),
            event: event.to_string(),
            listener: listener.clone(),
            callback,
        })
    });
}

fn forget(target: &JsValue, event: &str, listener: &Listener) -> Option<Closure<dyn Fn(JsValue)>> {
    REGISTRATIONS.with(|r| {
        let mut registrations = r.borrow_mut();
        let index = registrations.iter().position(|reg| {
            reg.event == event && Object::is(&reg.target, target) && same_listener(&reg.listener, listener)
        })?;
        Some(registrations.remove(index).callback)
    })
}

/// An object reachable from `globalThis`.
#[derive(Debug, Clone)]
pub struct JsObject {
    value: JsValue,
}

impl JsObject {
    pub fn new(value: JsValue) -> Self { Self { value } }

    pub fn value(&self) -> &JsValue { &self.value }

    fn get(&self, key: &str) -> Option<JsValue> {
        Reflect::get(&self.value, &JsValue::from_str(key)).ok().filter(|v| !v.is_undefined() && !v.is_null())
    }

    fn function(&self, name: &str) -> Option<Function> { self.get(name).and_then(|f| f.dyn_into::<Function>().ok()) }
}

#[async_trait(?Send)]
impl InjectedObject for JsObject {
    fn child(&self, key: &str) -> Option<Rc<dyn InjectedObject>> {
        self.get(key)
            .filter(|v| v.is_object() || v.is_function())
            .map(|v| Rc::new(JsObject::new(v)) as Rc<dyn InjectedObject>)
    }

    fn property(&self, key: &str) -> Option<Value> { self.get(key).map(|v| to_json(&v)) }

    fn has_method(&self, method: &str) -> bool { self.function(method).is_some() }

    async fn call(&self, method: &str, args: Vec<Value>) -> WalletResult<Value> {
        let function = self
            .function(method)
            .ok_or_else(|| WalletError::Upstream(format!("{} is not a function", method)))?;
        let js_args = Array::new();
        for arg in &args {
            js_args.push(&to_js(arg).map_err(upstream)?);
        }
        let result = function.apply(&self.value, &js_args).map_err(upstream)?;
        let settled = JsFuture::from(Promise::resolve(&result)).await.map_err(upstream)?;
        Ok(to_json(&settled))
    }

    fn listen(&self, register_method: &str, event: &str, listener: &Listener) -> WalletResult<()> {
        let Some(register) = self.function(register_method) else { return Ok(()) };
        let forward = listener.clone();
        let callback = Closure::<dyn Fn(JsValue)>::new(move |payload: JsValue| forward(to_json(&payload)));
        register
            .call2(&self.value, &JsValue::from_str(event), callback.as_ref())
            .map_err(upstream)?;
        remember(&self.value, event, listener, callback);
        Ok(())
    }

    fn unlisten(&self, unregister_method: &str, event: &str, listener: &Listener) -> WalletResult<()> {
        let Some(unregister) = self.function(unregister_method) else { return Ok(()) };
        if let Some(callback) = forget(&self.value, event, listener) {
            unregister
                .call2(&self.value, &JsValue::from_str(event), callback.as_ref())
                .map_err(upstream)?;
        }
        Ok(())
    }
}

/// `globalThis` + `window`.
#[derive(Debug, Clone, Default)]
pub struct JsHost;

impl JsHost {
    fn window(&self) -> WalletResult<web_sys::Window> {
        web_sys::window().ok_or_else(|| WalletError::ProviderNotFound("window".into()))
    }
}

impl HostEnvironment for JsHost {
    fn root(&self) -> Rc<dyn InjectedObject> { Rc::new(JsObject::new(js_sys::global().into())) }

    fn add_event_listener(&self, event: &str, listener: &Listener) -> WalletResult<()> {
        let window = self.window()?;
        let forward = listener.clone();
        let callback = Closure::<dyn Fn(JsValue)>::new(move |event: JsValue| {
            let detail = match event.dyn_ref::<web_sys::CustomEvent>() {
                Some(custom) => custom.detail(),
                None => event.clone(),
            };
            forward(to_json(&detail))
        });
        window
            .add_event_listener_with_callback(event, callback.as_ref().unchecked_ref())
            .map_err(upstream)?;
        remember(window.as_ref(), event, listener, callback);
        Ok(())
    }

    fn remove_event_listener(&self, event: &str, listener: &Listener) -> WalletResult<()> {
        let window = self.window()?;
        if let Some(callback) = forget(window.as_ref(), event, listener) {
            window
                .remove_event_listener_with_callback(event, callback.as_ref().unchecked_ref())
                .map_err(upstream)?;
        }
        Ok(())
    }
}
