pub mod keyboard;
pub mod pointer;

pub use keyboard::wire_keyboard;
pub use pointer::wire_pointer;

use crate::constants::FULLSCREEN_RESIZE_DELAY_MS;
use crate::core::error::SceneError;
use crate::dom::{self, ListenerRegistry};
use crate::WebScene;
use web_sys as web;

/// Ask the browser to make the canvas fullscreen. Failures are reported on
/// the scene bus, never returned.
pub fn enter_fullscreen(scene: &WebScene, canvas: &web::HtmlCanvasElement) {
    if let Err(e) = canvas.request_fullscreen() {
        let err = SceneError::Fullscreen(format!("{:?}", e));
        scene.with(|m| m.fullscreen_failed(&err));
    }
}

pub fn exit_fullscreen(scene: &WebScene) {
    let Some(document) = dom::window_document() else {
        return;
    };
    if document.fullscreen_element().is_some() {
        document.exit_fullscreen();
    } else {
        let err = SceneError::Fullscreen("not in fullscreen".into());
        scene.with(|m| m.fullscreen_failed(&err));
    }
}

pub fn toggle_fullscreen(scene: &WebScene, canvas: &web::HtmlCanvasElement) {
    let active = dom::window_document().is_some_and(|d| d.fullscreen_element().is_some());
    if active {
        exit_fullscreen(scene);
    } else {
        enter_fullscreen(scene, canvas);
    }
}

fn resize_to_canvas(scene: &WebScene, canvas: &web::HtmlCanvasElement) {
    let (w, h) = dom::sync_canvas_backing_size(canvas);
    scene.with(|m| m.resize(w, h));
}

/// Window resize and `fullscreenchange`. The post-fullscreen resize waits for
/// the browser to settle the new layout.
pub fn wire_viewport(registry: &mut ListenerRegistry, scene: &WebScene, canvas: &web::HtmlCanvasElement) {
    if let Some(window) = web::window() {
        let scene_resize = scene.clone();
        let canvas_resize = canvas.clone();
        registry.add(&window, "resize", move |_ev| {
            resize_to_canvas(&scene_resize, &canvas_resize);
        });
    }
    if let Some(document) = dom::window_document() {
        let scene_fs = scene.clone();
        let canvas_fs = canvas.clone();
        let doc = document.clone();
        registry.add(&document, "fullscreenchange", move |_ev| {
            let fullscreen = doc.fullscreen_element().is_some();
            scene_fs.with(|m| m.set_fullscreen(fullscreen));
            let scene_later = scene_fs.clone();
            let canvas_later = canvas_fs.clone();
            dom::set_timeout(FULLSCREEN_RESIZE_DELAY_MS, move || {
                if !scene_later.read(|m| m.is_destroyed()) {
                    resize_to_canvas(&scene_later, &canvas_later);
                }
            });
        });
        let scene_err = scene.clone();
        registry.add(&document, "fullscreenerror", move |_ev| {
            let err = SceneError::Fullscreen("fullscreen request denied".into());
            scene_err.with(|m| m.fullscreen_failed(&err));
        });
    }
}
