//! In-memory host: scripted wallet objects for tests and native embedders.
//!
//! ```ignore
//! let unisat = MemoryObject::new()
//!     .with_value("requestAccounts", json!(["bc1q..."]))
//!     .with_method("getNetwork", |_| Ok(json!("livenet")))
//!     .with_events();
//! let host = MemoryHost::new().with_global("unisat", unisat.clone());
//! ```

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use async_trait::async_trait;
use serde_json::Value;

use super::{HostEnvironment, InjectedObject, Listener};
use crate::error::{WalletError, WalletResult};

pub type Handler = Rc<dyn Fn(Vec<Value>) -> WalletResult<Value>>;

pub(crate) fn same_listener(a: &Listener, b: &Listener) -> bool {
    std::ptr::eq(Rc::as_ptr(a) as *const (), Rc::as_ptr(b) as *const ())
}

/// Scripted injected object. Records every call it receives.
#[derive(Default)]
pub struct MemoryObject {
    children: RefCell<HashMap<String, Rc<MemoryObject>>>,
    properties: RefCell<HashMap<String, Value>>,
    methods: RefCell<HashMap<String, Handler>>,
    listeners: RefCell<Vec<(String, Listener)>>,
    calls: RefCell<Vec<(String, Vec<Value>)>>,
}

impl MemoryObject {
    pub fn new() -> Rc<Self> { Rc::new(Self::default()) }

    pub fn with_method(self: Rc<Self>, name: &str, f: impl Fn(Vec<Value>) -> WalletResult<Value> + 'static) -> Rc<Self> {
        self.set_method(name, f);
        self
    }
    /// Method that always resolves to `value`.
    pub fn with_value(self: Rc<Self>, name: &str, value: Value) -> Rc<Self> {
        self.with_method(name, move |_| Ok(value.clone()))
    }
    /// Method that always rejects with `message`.
    pub fn with_error(self: Rc<Self>, name: &str, message: &str) -> Rc<Self> {
        let message = message.to_string();
        self.with_method(name, move |_| Err(WalletError::Upstream(message.clone())))
    }
    pub fn with_child(self: Rc<Self>, key: &str, child: Rc<MemoryObject>) -> Rc<Self> {
        self.children.borrow_mut().insert(key.to_string(), child);
        self
    }
    pub fn with_property(self: Rc<Self>, key: &str, value: Value) -> Rc<Self> {
        self.set_property(key, value);
        self
    }
    /// Adds `on`, `off` and `removeListener` so subscriptions get recorded.
    pub fn with_events(self: Rc<Self>) -> Rc<Self> {
        for name in ["on", "off", "removeListener"] {
            self.set_method(name, |_| Ok(Value::Null));
        }
        self
    }

    pub fn set_method(&self, name: &str, f: impl Fn(Vec<Value>) -> WalletResult<Value> + 'static) {
        self.methods.borrow_mut().insert(name.to_string(), Rc::new(f));
    }
    pub fn set_property(&self, key: &str, value: Value) {
        self.properties.borrow_mut().insert(key.to_string(), value);
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> { self.calls.borrow().clone() }

    /// Argument lists of every call to `method`, in order.
    pub fn calls_to(&self, method: &str) -> Vec<Vec<Value>> {
        self.calls.borrow().iter().filter(|(m, _)| m == method).map(|(_, args)| args.clone()).collect()
    }

    pub fn listener_count(&self, event: &str) -> usize {
        self.listeners.borrow().iter().filter(|(e, _)| e == event).count()
    }

    /// Fires `event` to every registered listener.
    pub fn emit(&self, event: &str, payload: Value) {
        let targets: Vec<Listener> = self.listeners.borrow().iter()
            .filter(|(e, _)| e == event)
            .map(|(_, l)| l.clone())
            .collect();
        for listener in targets {
            listener(payload.clone());
        }
    }
}

#[async_trait(?Send)]
impl InjectedObject for MemoryObject {
    fn child(&self, key: &str) -> Option<Rc<dyn InjectedObject>> {
        self.children.borrow().get(key).map(|c| c.clone() as Rc<dyn InjectedObject>)
    }

    fn property(&self, key: &str) -> Option<Value> { self.properties.borrow().get(key).cloned() }

    fn has_method(&self, method: &str) -> bool { self.methods.borrow().contains_key(method) }

    async fn call(&self, method: &str, args: Vec<Value>) -> WalletResult<Value> {
        self.calls.borrow_mut().push((method.to_string(), args.clone()));
        let handler = self.methods.borrow().get(method).cloned();
        match handler {
            Some(handler) => handler(args),
            None => Err(WalletError::Upstream(format!("{} is not a function", method))),
        }
    }

    fn listen(&self, register_method: &str, event: &str, listener: &Listener) -> WalletResult<()> {
        if self.has_method(register_method) {
            self.listeners.borrow_mut().push((event.to_string(), listener.clone()));
        }
        Ok(())
    }

    fn unlisten(&self, unregister_method: &str, event: &str, listener: &Listener) -> WalletResult<()> {
        if self.has_method(unregister_method) {
            self.listeners.borrow_mut().retain(|(e, l)| !(e == event && same_listener(l, listener)));
        }
        Ok(())
    }
}

/// Fake `window`.
pub struct MemoryHost {
    root: Rc<MemoryObject>,
    window_listeners: RefCell<Vec<(String, Listener)>>,
}

impl Default for MemoryHost {
    fn default() -> Self { Self { root: MemoryObject::new(), window_listeners: RefCell::new(Vec::new()) } }
}

impl MemoryHost {
    pub fn new() -> Self { Self::default() }

    /// Installs `object` at a dotted global path, creating empty parents.
    pub fn with_global(self, path: &str, object: Rc<MemoryObject>) -> Self {
        let mut segments: Vec<&str> = path.split('.').collect();
        let Some(last) = segments.pop() else { return self };
        let mut parent = self.root.clone();
        for key in segments {
            let existing = parent.children.borrow().get(key).cloned();
            let next = match existing {
                Some(child) => child,
                None => {
                    let child = MemoryObject::new();
                    parent.children.borrow_mut().insert(key.to_string(), child.clone());
                    child
                }
            };
            parent = next;
        }
        parent.children.borrow_mut().insert(last.to_string(), object);
        self
    }

    pub fn into_rc(self) -> Rc<dyn HostEnvironment> { Rc::new(self) }

    pub fn window_listener_count(&self, event: &str) -> usize {
        self.window_listeners.borrow().iter().filter(|(e, _)| e == event).count()
    }

    /// Fires a window-level custom event.
    pub fn dispatch(&self, event: &str, detail: Value) {
        let targets: Vec<Listener> = self.window_listeners.borrow().iter()
            .filter(|(e, _)| e == event)
            .map(|(_, l)| l.clone())
            .collect();
        for listener in targets {
            listener(detail.clone());
        }
    }
}

impl HostEnvironment for MemoryHost {
    fn root(&self) -> Rc<dyn InjectedObject> { self.root.clone() }

    fn add_event_listener(&self, event: &str, listener: &Listener) -> WalletResult<()> {
        self.window_listeners.borrow_mut().push((event.to_string(), listener.clone()));
        Ok(())
    }

    fn remove_event_listener(&self, event: &str, listener: &Listener) -> WalletResult<()> {
        self.window_listeners.borrow_mut().retain(|(e, l)| !(e == event && same_listener(l, listener)));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::resolve;
    use serde_json::json;
    use std::cell::Cell;

    #[test]
    fn test_resolve_nested_path() {
        let bitcoin = MemoryObject::new().with_value("connect", json!({}));
        let host = MemoryHost::new().with_global("okxwallet.bitcoin", bitcoin);
        let found = resolve(&host, "okxwallet.bitcoin").unwrap();
        assert!(found.has_method("connect"));
        assert!(resolve(&host, "okxwallet.bitcoinSignet").is_none());
        assert!(resolve(&host, "unisat").is_none());
    }

    #[tokio::test]
    async fn test_call_records_and_missing_method_fails() {
        let object = MemoryObject::new().with_method("echo", |args| Ok(Value::Array(args)));
        assert_eq!(object.call("echo", vec![json!(1)]).await.unwrap(), json!([1]));
        let err = object.call("nope", vec![]).await.unwrap_err();
        assert_eq!(err.message(), "nope is not a function");
        assert_eq!(object.calls().len(), 2);
    }

    #[test]
    fn test_listen_unlisten_is_symmetric() {
        let object = MemoryObject::new().with_events();
        let hits = Rc::new(Cell::new(0));
        let counter = hits.clone();
        let listener: Listener = Rc::new(move |_| counter.set(counter.get() + 1));
        let other: Listener = Rc::new(|_| {});

        object.listen("on", "accountsChanged", &listener).unwrap();
        object.listen("on", "accountsChanged", &other).unwrap();
        object.emit("accountsChanged", json!(["bc1q"]));
        assert_eq!(hits.get(), 1);

        object.unlisten("off", "accountsChanged", &listener).unwrap();
        assert_eq!(object.listener_count("accountsChanged"), 1);
        object.emit("accountsChanged", json!([]));
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_listen_without_register_method_is_noop() {
        let object = MemoryObject::new();
        let listener: Listener = Rc::new(|_| {});
        object.listen("on", "accountsChanged", &listener).unwrap();
        assert_eq!(object.listener_count("accountsChanged"), 0);
    }
}
