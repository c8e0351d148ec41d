use super::{from_js, js_error, to_js, AudioBus, JsSubscriptions};
use crate::core::audio::HotspotAudioOptions;
use crate::core::backend::ScreenshotOptions;
use crate::core::error::SceneError;
use crate::core::events::{EventBus, ListenerId};
use crate::core::hotspot::{HotspotContent, HotspotId, HotspotRecord, StylePatch};
use crate::core::scene::{LoadOptions, LoadOutcome, SceneEvent, SceneHandle, SceneOptions};
use crate::dom::{self, ListenerRegistry};
use crate::events;
use crate::fetch::XhrFetcher;
use crate::frame::{self, RenderLoop};
use crate::render::WgpuBackend;
use crate::WebScene;
use glam::Vec3;
use serde::Serialize;
use std::rc::Rc;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::{future_to_promise, spawn_local};
use web_sys as web;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct LoadResult {
    url: String,
    width: u32,
    height: u32,
    superseded: bool,
    cancelled: bool,
}

#[wasm_bindgen]
pub struct PanoramaViewer {
    scene: WebScene,
    canvas: web::HtmlCanvasElement,
    dom_listeners: ListenerRegistry,
    render_loop: RenderLoop,
    subscriptions: JsSubscriptions,
    audio_link: Option<ListenerId>,
}

#[wasm_bindgen]
impl PanoramaViewer {
    /// Set up WebGPU on `#canvasId` and start rendering. `listeners` is an
    /// optional `{ eventName: callback }` object registered before the
    /// `initialized` event fires.
    pub async fn create(
        canvas_id: String,
        options: JsValue,
        listeners: JsValue,
    ) -> Result<PanoramaViewer, JsValue> {
        let options: SceneOptions = from_js(options)?;
        let document = dom::window_document().ok_or_else(|| js_error("no document"))?;
        let canvas = dom::canvas_by_id(&document, &canvas_id).map_err(js_error)?;
        let (width, height) = dom::sync_canvas_backing_size(&canvas);

        let bus = Rc::new(EventBus::new());
        let mut subscriptions = JsSubscriptions::default();
        subscriptions.on_all(&bus, &listeners)?;

        let backend = match WgpuBackend::new(canvas.clone()).await {
            Ok(b) => b,
            Err(e) => {
                let err = SceneError::Gpu(format!("{:#}", e));
                log::error!("[api] {}", err);
                bus.emit(SceneEvent::Error {
                    message: err.to_string(),
                });
                return Err(js_error(err));
            }
        };
        let scene = SceneHandle::create(backend, width, height, options, bus);

        let mut dom_listeners = ListenerRegistry::default();
        events::wire_pointer(&mut dom_listeners, &scene, &canvas);
        events::wire_keyboard(&mut dom_listeners, &scene, &canvas);
        events::wire_viewport(&mut dom_listeners, &scene, &canvas);
        let render_loop = frame::start_loop(scene.clone());
        log::info!(
            "[api] viewer ready on #{} ({}x{}, {} dom listeners)",
            canvas_id,
            width,
            height,
            dom_listeners.len()
        );

        Ok(PanoramaViewer {
            scene,
            canvas,
            dom_listeners,
            render_loop,
            subscriptions,
            audio_link: None,
        })
    }

    pub fn on(&mut self, event: &str, callback: js_sys::Function) {
        self.subscriptions.on(self.scene.events(), event, callback);
    }

    pub fn off(&mut self, event: &str, callback: &js_sys::Function) -> bool {
        self.subscriptions.off(self.scene.events(), event, callback)
    }

    /// Resolves to `{ url, width, height, superseded, cancelled }`; rejects on failure.
    #[wasm_bindgen(js_name = loadPanorama)]
    pub fn load_panorama(&self, url: String, options: JsValue) -> Result<js_sys::Promise, JsValue> {
        let options: LoadOptions = from_js(options)?;
        let scene = self.scene.clone();
        Ok(future_to_promise(async move {
            let outcome = scene
                .load_panorama(&XhrFetcher, &url, options)
                .await
                .map_err(js_error)?;
            let result = match outcome {
                LoadOutcome::Loaded { width, height } => LoadResult {
                    url,
                    width,
                    height,
                    superseded: false,
                    cancelled: false,
                },
                LoadOutcome::Superseded => LoadResult {
                    url,
                    width: 0,
                    height: 0,
                    superseded: true,
                    cancelled: false,
                },
                LoadOutcome::Cancelled => LoadResult {
                    url,
                    width: 0,
                    height: 0,
                    superseded: false,
                    cancelled: true,
                },
            };
            to_js(&result)
        }))
    }

    #[wasm_bindgen(js_name = addHotspot)]
    pub fn add_hotspot(&self, record: JsValue) -> Result<String, JsValue> {
        let record: HotspotRecord = serde_wasm_bindgen::from_value(record)
            .map_err(|e| js_error(SceneError::InvalidRecord(e.to_string())))?;
        let id = self
            .scene
            .with(|m| m.add_hotspot(record))
            .map_err(js_error)?;
        Ok(id.0)
    }

    #[wasm_bindgen(js_name = removeHotspot)]
    pub fn remove_hotspot(&self, id: &str) -> bool {
        self.scene.with(|m| m.remove_hotspot(&HotspotId::from(id)))
    }

    #[wasm_bindgen(js_name = clearHotspots)]
    pub fn clear_hotspots(&self) {
        self.scene.with(|m| m.clear_hotspots());
    }

    #[wasm_bindgen(js_name = getHotspot)]
    pub fn get_hotspot(&self, id: &str) -> Result<JsValue, JsValue> {
        let snapshot = self
            .scene
            .read(|m| m.hotspot(&HotspotId::from(id)).map(|h| h.snapshot()));
        match snapshot {
            Some(s) => to_js(&s),
            None => Ok(JsValue::UNDEFINED),
        }
    }

    #[wasm_bindgen(js_name = getHotspots)]
    pub fn get_hotspots(&self) -> Result<JsValue, JsValue> {
        to_js(&self.scene.read(|m| m.hotspots()))
    }

    #[wasm_bindgen(js_name = updateHotspotContent)]
    pub fn update_hotspot_content(&self, id: &str, patch: JsValue) -> Result<bool, JsValue> {
        let patch: HotspotContent = from_js(patch)?;
        self.scene
            .with(|m| m.update_hotspot_content(&HotspotId::from(id), patch))
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = updateHotspotStyle)]
    pub fn update_hotspot_style(&self, id: &str, patch: JsValue) -> Result<bool, JsValue> {
        let patch: StylePatch = from_js(patch)?;
        self.scene
            .with(|m| m.update_hotspot_style(&HotspotId::from(id), patch))
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = setHotspotPosition)]
    pub fn set_hotspot_position(&self, id: &str, x: f32, y: f32, z: f32) -> bool {
        self.scene
            .with(|m| m.set_hotspot_position(&HotspotId::from(id), Vec3::new(x, y, z)))
    }

    #[wasm_bindgen(js_name = setHotspotVisible)]
    pub fn set_hotspot_visible(&self, id: &str, visible: bool) -> bool {
        self.scene
            .with(|m| m.set_hotspot_visible(&HotspotId::from(id), visible))
    }

    #[wasm_bindgen(js_name = selectHotspot)]
    pub fn select_hotspot(&self, id: &str, selected: bool) -> Result<bool, JsValue> {
        self.scene
            .with(|m| m.select_hotspot(&HotspotId::from(id), selected))
            .map_err(js_error)
    }

    #[wasm_bindgen(js_name = enableHotspotDrag)]
    pub fn enable_hotspot_drag(&self, id: &str) -> bool {
        self.scene.with(|m| m.enable_hotspot_drag(&HotspotId::from(id)))
    }

    #[wasm_bindgen(js_name = disableHotspotDrag)]
    pub fn disable_hotspot_drag(&self, id: &str) {
        self.scene
            .with(|m| m.disable_hotspot_drag(&HotspotId::from(id)));
    }

    #[wasm_bindgen(js_name = resetView)]
    pub fn reset_view(&self) {
        self.scene.with(|m| m.reset_view());
    }

    #[wasm_bindgen(js_name = saveView)]
    pub fn save_view(&self) {
        self.scene.with(|m| m.save_view());
    }

    #[wasm_bindgen(js_name = toggleAutoRotate)]
    pub fn toggle_auto_rotate(&self) -> bool {
        self.scene.with(|m| m.toggle_auto_rotate())
    }

    #[wasm_bindgen(js_name = setAutoRotateSpeed)]
    pub fn set_auto_rotate_speed(&self, speed: f32) {
        self.scene.with(|m| m.set_auto_rotate_speed(speed));
    }

    #[wasm_bindgen(js_name = getCameraPosition)]
    pub fn camera_position(&self) -> Result<JsValue, JsValue> {
        let eye = self.scene.read(|m| m.camera().eye);
        to_js(&crate::core::hotspot::Point3::from(eye))
    }

    #[wasm_bindgen(js_name = enterFullscreen)]
    pub fn enter_fullscreen(&self) {
        events::enter_fullscreen(&self.scene, &self.canvas);
    }

    #[wasm_bindgen(js_name = exitFullscreen)]
    pub fn exit_fullscreen(&self) {
        events::exit_fullscreen(&self.scene);
    }

    #[wasm_bindgen(js_name = toggleFullscreen)]
    pub fn toggle_fullscreen(&self) {
        events::toggle_fullscreen(&self.scene, &self.canvas);
    }

    #[wasm_bindgen(js_name = isFullscreen)]
    pub fn is_fullscreen(&self) -> bool {
        self.scene.read(|m| m.is_fullscreen())
    }

    pub fn resize(&self) {
        let (w, h) = dom::sync_canvas_backing_size(&self.canvas);
        self.scene.with(|m| m.resize(w, h));
    }

    #[wasm_bindgen(js_name = takeScreenshot)]
    pub fn take_screenshot(&self, options: JsValue) -> Result<JsValue, JsValue> {
        let options: ScreenshotOptions = from_js(options)?;
        let shot = self
            .scene
            .with(|m| m.take_screenshot(options))
            .map_err(js_error)?;
        to_js(&shot)
    }

    /// Route `playAudio` from audio hotspots into `audio`.
    #[wasm_bindgen(js_name = connectAudio)]
    pub fn connect_audio(&mut self, audio: &AudioBus) {
        if let Some(id) = self.audio_link.take() {
            self.scene.events().off("playAudio", id);
        }
        let bus = audio.handle();
        let id = self.scene.events().on("playAudio", move |ev: &SceneEvent| {
            let SceneEvent::PlayAudio {
                hotspot_id,
                url,
                looped,
                volume,
            } = ev
            else {
                return Ok(());
            };
            let bus = bus.clone();
            let id = hotspot_id.as_str().to_string();
            let url = url.clone();
            let options = HotspotAudioOptions {
                looped: *looped,
                volume: *volume,
            };
            spawn_local(async move {
                bus.trigger_hotspot_audio(&id, &url, options).await;
            });
            Ok(())
        });
        self.audio_link = Some(id);
    }

    pub fn destroy(&mut self) {
        if self.scene.read(|m| m.is_destroyed()) {
            return;
        }
        self.render_loop.stop();
        self.dom_listeners.remove_all();
        if let Some(id) = self.audio_link.take() {
            self.scene.events().off("playAudio", id);
        }
        self.scene.with(|m| m.destroy());
        self.subscriptions.clear(self.scene.events());
    }
}
