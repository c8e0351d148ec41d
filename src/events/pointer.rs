use crate::core::input::PointerButton;
use crate::dom::{pointer_canvas_px, ListenerRegistry};
use crate::WebScene;
use wasm_bindgen::JsCast;
use web_sys as web;

/// Pointer, click, wheel and context-menu handlers on the canvas.
pub fn wire_pointer(registry: &mut ListenerRegistry, scene: &WebScene, canvas: &web::HtmlCanvasElement) {
    wire_pointerdown(registry, scene, canvas);
    wire_pointermove(registry, scene, canvas);
    wire_pointerup(registry, scene, canvas);
    wire_clicks(registry, scene, canvas);
    wire_wheel(registry, scene, canvas);
}

fn wire_pointerdown(registry: &mut ListenerRegistry, scene: &WebScene, canvas: &web::HtmlCanvasElement) {
    let scene = scene.clone();
    let c = canvas.clone();
    registry.add(canvas, "pointerdown", move |ev| {
        let Some(ev) = ev.dyn_ref::<web::PointerEvent>() else {
            return;
        };
        _ = c.focus();
        let pos = pointer_canvas_px(ev, &c);
        let button = PointerButton::from_dom(ev.button());
        if scene.with(|m| m.pointer_down(pos, button)) {
            _ = c.set_pointer_capture(ev.pointer_id());
        }
    });
}

fn wire_pointermove(registry: &mut ListenerRegistry, scene: &WebScene, canvas: &web::HtmlCanvasElement) {
    let scene_move = scene.clone();
    let c = canvas.clone();
    registry.add(canvas, "pointermove", move |ev| {
        if let Some(ev) = ev.dyn_ref::<web::PointerEvent>() {
            let pos = pointer_canvas_px(ev, &c);
            scene_move.with(|m| m.pointer_move(pos));
        }
    });

    let scene_leave = scene.clone();
    registry.add(canvas, "pointerleave", move |_ev| {
        scene_leave.with(|m| m.pointer_leave());
    });
}

fn wire_pointerup(registry: &mut ListenerRegistry, scene: &WebScene, canvas: &web::HtmlCanvasElement) {
    for name in ["pointerup", "pointercancel"] {
        let scene = scene.clone();
        let c = canvas.clone();
        registry.add(canvas, name, move |ev| {
            if let Some(ev) = ev.dyn_ref::<web::PointerEvent>() {
                if c.has_pointer_capture(ev.pointer_id()) {
                    _ = c.release_pointer_capture(ev.pointer_id());
                }
            }
            scene.with(|m| m.pointer_up());
        });
    }
}

fn wire_clicks(registry: &mut ListenerRegistry, scene: &WebScene, canvas: &web::HtmlCanvasElement) {
    let scene_click = scene.clone();
    let c = canvas.clone();
    registry.add(canvas, "click", move |ev| {
        let Some(ev) = ev.dyn_ref::<web::MouseEvent>() else {
            return;
        };
        let pos = pointer_canvas_px(ev, &c);
        if let Err(e) = scene_click.with(|m| m.click(pos)) {
            log::warn!("[mouse] click failed: {}", e);
        }
    });

    let scene_dbl = scene.clone();
    let c = canvas.clone();
    registry.add(canvas, "dblclick", move |ev| {
        if let Some(ev) = ev.dyn_ref::<web::MouseEvent>() {
            let pos = pointer_canvas_px(ev, &c);
            scene_dbl.with(|m| m.double_click(pos));
        }
    });

    // Right-button drag pans when enabled.
    let scene_menu = scene.clone();
    registry.add(canvas, "contextmenu", move |ev| {
        if scene_menu.read(|m| m.controls().enable_pan) {
            ev.prevent_default();
        }
    });
}

fn wire_wheel(registry: &mut ListenerRegistry, scene: &WebScene, canvas: &web::HtmlCanvasElement) {
    let scene = scene.clone();
    registry.add(canvas, "wheel", move |ev| {
        let Some(ev) = ev.dyn_ref::<web::WheelEvent>() else {
            return;
        };
        if scene.read(|m| m.controls().enable_zoom) {
            ev.prevent_default();
            scene.with(|m| m.wheel(ev.delta_y() as f32));
        }
    });
}
