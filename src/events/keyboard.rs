use crate::core::input::KeyAction;
use crate::dom::ListenerRegistry;
use crate::WebScene;
use wasm_bindgen::JsCast;
use web_sys as web;

/// Keyboard shortcuts for one viewer. Keys are read only while its canvas
/// has focus; the canvas is made focusable if the host left it out of the
/// tab order.
pub fn wire_keyboard(registry: &mut ListenerRegistry, scene: &WebScene, canvas: &web::HtmlCanvasElement) {
    if !canvas.has_attribute("tabindex") {
        canvas.set_tab_index(0);
    }
    let scene = scene.clone();
    let c = canvas.clone();
    registry.add(canvas, "keydown", move |ev| {
        let Some(ev) = ev.dyn_ref::<web::KeyboardEvent>() else {
            return;
        };
        if ev.repeat() && ev.key() == "Enter" {
            return;
        }
        if ev.ctrl_key() || ev.meta_key() || ev.alt_key() {
            return;
        }
        let key = ev.key();
        if key == " " || key.starts_with("Arrow") {
            ev.prevent_default();
        }
        match scene.with(|m| m.key(&key)) {
            Some(KeyAction::ToggleFullscreen) => super::toggle_fullscreen(&scene, &c),
            Some(KeyAction::ExitFullscreen) => {
                if scene.read(|m| m.is_fullscreen()) {
                    super::exit_fullscreen(&scene);
                }
            }
            _ => {}
        }
    });
}
