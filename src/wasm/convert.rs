//! JsValue <-> serde_json::Value

use js_sys::{Array, Object, Reflect, Uint8Array};
use serde::Serialize;
use serde_json::{Map, Number, Value};
use wasm_bindgen::{JsCast, JsValue};

use crate::error::WalletError;

/// Plain JSON view of a JS value. Typed arrays become number arrays; functions are dropped.
pub fn to_json(value: &JsValue) -> Value {
    if value.is_null() || value.is_undefined() || value.is_function() {
        return Value::Null;
    }
    if let Some(b) = value.as_bool() {
        return Value::Bool(b);
    }
    if let Some(n) = value.as_f64() {
        if n.fract() == 0.0 && n.abs() < 9_007_199_254_740_992.0 {
            return Value::from(n as i64);
        }
        return Number::from_f64(n).map(Value::Number).unwrap_or(Value::Null);
    }
    if let Some(s) = value.as_string() {
        return Value::String(s);
    }
    if value.is_bigint() {
        return value
            .unchecked_ref::<js_sys::BigInt>()
            .to_string(10)
            .map(|s| Value::String(String::from(s)))
            .unwrap_or(Value::Null);
    }
    if let Some(bytes) = value.dyn_ref::<Uint8Array>() {
        return Value::Array(bytes.to_vec().into_iter().map(Value::from).collect());
    }
    if Array::is_array(value) {
        return Value::Array(Array::from(value).iter().map(|v| to_json(&v)).collect());
    }
    let mut map = Map::new();
    for entry in Object::entries(value.unchecked_ref::<Object>()).iter() {
        let pair = Array::from(&entry);
        if let Some(key) = pair.get(0).as_string() {
            let field = pair.get(1);
            if !field.is_undefined() && !field.is_function() {
                map.insert(key, to_json(&field));
            }
        }
    }
    Value::Object(map)
}

/// JS value with objects as plain objects (not `Map`s).
pub fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    let serializer = serde_wasm_bindgen::Serializer::json_compatible();
    value.serialize(&serializer).map_err(|e| JsValue::from_str(&e.to_string()))
}

/// Message of a thrown JS value: `error.message`, a thrown string, or its debug form.
pub fn js_message(error: &JsValue) -> String {
    if let Some(s) = error.as_string() {
        return s;
    }
    Reflect::get(error, &JsValue::from_str("message"))
        .ok()
        .and_then(|m| m.as_string())
        .unwrap_or_else(|| format!("{:?}", error))
}

pub fn upstream(error: JsValue) -> WalletError { WalletError::Upstream(js_message(&error)) }

/// Wallet errors surface to JS as `Error` objects.
pub fn js_error(error: WalletError) -> JsValue { js_sys::Error::new(&error.to_string()).into() }
