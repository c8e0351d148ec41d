use super::{from_js, js_error, to_js, JsSubscriptions};
use crate::audio::WebAudioBackend;
use crate::core::audio::{
    AudioBusHandle, AudioSettings, EffectPlayOptions, HotspotAudioOptions, MusicLoad, MusicOptions,
};
use crate::core::events::EventBus;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::future_to_promise;

#[wasm_bindgen]
pub struct AudioBus {
    bus: AudioBusHandle<WebAudioBackend>,
    subscriptions: JsSubscriptions,
}

impl AudioBus {
    pub(crate) fn handle(&self) -> AudioBusHandle<WebAudioBackend> {
        self.bus.clone()
    }
}

#[wasm_bindgen]
impl AudioBus {
    #[wasm_bindgen(constructor)]
    pub fn new(settings: JsValue, listeners: JsValue) -> Result<AudioBus, JsValue> {
        let settings: AudioSettings = from_js(settings)?;
        let events = Rc::new(EventBus::new());
        let mut subscriptions = JsSubscriptions::default();
        subscriptions.on_all(&events, &listeners)?;
        let bus = AudioBusHandle::create(WebAudioBackend::new(), settings, events);
        Ok(AudioBus { bus, subscriptions })
    }

    pub fn on(&mut self, event: &str, callback: js_sys::Function) {
        self.subscriptions.on(self.bus.events(), event, callback);
    }

    pub fn off(&mut self, event: &str, callback: &js_sys::Function) -> bool {
        self.subscriptions.off(self.bus.events(), event, callback)
    }

    /// Call from a user gesture; browsers start the context suspended.
    #[wasm_bindgen(js_name = resumeContext)]
    pub fn resume_context(&self) -> js_sys::Promise {
        let bus = self.bus.clone();
        future_to_promise(async move {
            bus.resume_context().await.map_err(js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    /// Resolves to `true` when loaded, `false` when a newer load or `destroy` replaced it.
    #[wasm_bindgen(js_name = loadBackgroundMusic)]
    pub fn load_background_music(&self, url: String, options: JsValue) -> Result<js_sys::Promise, JsValue> {
        let options: MusicOptions = from_js(options)?;
        let bus = self.bus.clone();
        Ok(future_to_promise(async move {
            let outcome = bus
                .load_background_music(&url, options)
                .await
                .map_err(js_error)?;
            Ok(JsValue::from_bool(outcome == MusicLoad::Loaded))
        }))
    }

    #[wasm_bindgen(js_name = playBackgroundMusic)]
    pub fn play_background_music(&self) -> js_sys::Promise {
        let bus = self.bus.clone();
        future_to_promise(async move {
            bus.play_background_music().await;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = pauseBackgroundMusic)]
    pub fn pause_background_music(&self) {
        self.bus.with(|m| m.pause_background_music());
    }

    #[wasm_bindgen(js_name = stopBackgroundMusic)]
    pub fn stop_background_music(&self) {
        self.bus.with(|m| m.stop_background_music());
    }

    #[wasm_bindgen(js_name = setMasterVolume)]
    pub fn set_master_volume(&self, volume: f32) {
        self.bus.with(|m| m.set_master_volume(volume));
    }

    #[wasm_bindgen(js_name = setMusicVolume)]
    pub fn set_music_volume(&self, volume: f32) {
        self.bus.with(|m| m.set_music_volume(volume));
    }

    #[wasm_bindgen(js_name = setEffectsVolume)]
    pub fn set_effects_volume(&self, volume: f32) {
        self.bus.with(|m| m.set_effects_volume(volume));
    }

    #[wasm_bindgen(js_name = toggleMute)]
    pub fn toggle_mute(&self) -> bool {
        self.bus.with(|m| m.toggle_mute())
    }

    #[wasm_bindgen(js_name = loadSoundEffect)]
    pub fn load_sound_effect(&self, id: String, url: String) -> js_sys::Promise {
        let bus = self.bus.clone();
        future_to_promise(async move {
            bus.load_sound_effect(&id, &url).await.map_err(js_error)?;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = playSoundEffect)]
    pub fn play_sound_effect(&self, id: String, options: JsValue) -> Result<js_sys::Promise, JsValue> {
        let options: EffectPlayOptions = from_js(options)?;
        let bus = self.bus.clone();
        Ok(future_to_promise(async move {
            bus.play_sound_effect(&id, options).await;
            Ok(JsValue::UNDEFINED)
        }))
    }

    #[wasm_bindgen(js_name = createHotspotAudio)]
    pub fn create_hotspot_audio(
        &self,
        hotspot_id: String,
        url: String,
        options: JsValue,
    ) -> Result<js_sys::Promise, JsValue> {
        let options: HotspotAudioOptions = from_js(options)?;
        let bus = self.bus.clone();
        Ok(future_to_promise(async move {
            bus.create_hotspot_audio(&hotspot_id, &url, options)
                .await
                .map_err(js_error)?;
            Ok(JsValue::UNDEFINED)
        }))
    }

    #[wasm_bindgen(js_name = playHotspotAudio)]
    pub fn play_hotspot_audio(&self, hotspot_id: String) -> js_sys::Promise {
        let bus = self.bus.clone();
        future_to_promise(async move {
            bus.play_hotspot_audio(&hotspot_id).await;
            Ok(JsValue::UNDEFINED)
        })
    }

    #[wasm_bindgen(js_name = stopHotspotAudio)]
    pub fn stop_hotspot_audio(&self, hotspot_id: &str) {
        self.bus.with(|m| m.stop_hotspot_audio(hotspot_id));
    }

    #[wasm_bindgen(js_name = removeHotspotAudio)]
    pub fn remove_hotspot_audio(&self, hotspot_id: &str) -> bool {
        self.bus.with(|m| m.remove_hotspot_audio(hotspot_id))
    }

    #[wasm_bindgen(js_name = stopAll)]
    pub fn stop_all(&self) {
        self.bus.with(|m| m.stop_all());
    }

    #[wasm_bindgen(js_name = pauseAll)]
    pub fn pause_all(&self) {
        self.bus.with(|m| m.pause_all());
    }

    #[wasm_bindgen(js_name = getStatus)]
    pub fn status(&self) -> Result<JsValue, JsValue> {
        to_js(&self.bus.read(|m| m.status()))
    }

    pub fn destroy(&self) {
        self.bus.with(|m| m.destroy());
    }
}
