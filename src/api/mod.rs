mod audio;
mod scene;

pub use audio::AudioBus;
pub use scene::PanoramaViewer;

use crate::core::events::{EventBus, ListenerId, NamedEvent};
use serde::de::DeserializeOwned;
use serde::Serialize;
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;

pub(crate) fn js_error(e: impl std::fmt::Display) -> JsValue {
    js_sys::Error::new(&e.to_string()).into()
}

pub(crate) fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, JsValue> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(js_error)
}

/// `undefined`/`null` yield the type's defaults.
pub(crate) fn from_js<T: DeserializeOwned + Default>(value: JsValue) -> Result<T, JsValue> {
    if value.is_undefined() || value.is_null() {
        return Ok(T::default());
    }
    serde_wasm_bindgen::from_value(value).map_err(js_error)
}

/// JS callbacks registered on one event bus, so they can be removed by
/// function identity.
#[derive(Default)]
pub(crate) struct JsSubscriptions {
    entries: Vec<(String, js_sys::Function, ListenerId)>,
}

impl JsSubscriptions {
    pub(crate) fn on<E>(&mut self, bus: &EventBus<E>, name: &str, callback: js_sys::Function)
    where
        E: NamedEvent + Serialize + 'static,
    {
        let cb = callback.clone();
        let id = bus.on(name, move |ev: &E| {
            let value = to_js(ev).map_err(|e| anyhow::anyhow!("{:?}", e))?;
            cb.call1(&JsValue::NULL, &value)
                .map_err(|e| anyhow::anyhow!("{:?}", e))?;
            Ok(())
        });
        self.entries.push((name.to_string(), callback, id));
    }

    pub(crate) fn off<E: NamedEvent>(&mut self, bus: &EventBus<E>, name: &str, callback: &js_sys::Function) -> bool {
        let Some(pos) = self
            .entries
            .iter()
            .position(|(n, f, _)| n == name && f == callback)
        else {
            return false;
        };
        let (name, _, id) = self.entries.remove(pos);
        bus.off(&name, id)
    }

    /// Register every `{ eventName: callback }` pair of a plain object.
    pub(crate) fn on_all<E>(&mut self, bus: &EventBus<E>, listeners: &JsValue) -> Result<(), JsValue>
    where
        E: NamedEvent + Serialize + 'static,
    {
        if listeners.is_undefined() || listeners.is_null() {
            return Ok(());
        }
        let obj: &js_sys::Object = listeners
            .dyn_ref()
            .ok_or_else(|| js_error("listeners must be an object"))?;
        for entry in js_sys::Object::entries(obj).iter() {
            let pair: js_sys::Array = entry.unchecked_into();
            let name = pair.get(0).as_string().unwrap_or_default();
            let Ok(callback) = pair.get(1).dyn_into::<js_sys::Function>() else {
                log::warn!("[api] listener for '{}' is not a function", name);
                continue;
            };
            self.on(bus, &name, callback);
        }
        Ok(())
    }

    pub(crate) fn clear<E: NamedEvent>(&mut self, bus: &EventBus<E>) {
        for (name, _, id) in self.entries.drain(..) {
            bus.off(&name, id);
        }
    }
}
