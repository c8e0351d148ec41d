use crate::core::error::SceneError;
use crate::core::scene::SceneHandle;
use crate::dom;
use crate::render::WgpuBackend;
use instant::Instant;
use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use web_sys as web;

type TickSlot = Rc<RefCell<Option<Closure<dyn FnMut()>>>>;

/// requestAnimationFrame loop driving [`SceneManager::tick`](crate::core::scene::SceneManager::tick).
pub struct RenderLoop {
    running: Rc<Cell<bool>>,
    raf_id: Rc<Cell<Option<i32>>>,
    tick: TickSlot,
}

fn request_frame(slot: &TickSlot, raf_id: &Cell<Option<i32>>) {
    if let (Some(w), Some(cb)) = (web::window(), slot.borrow().as_ref()) {
        raf_id.set(w.request_animation_frame(cb.as_ref().unchecked_ref()).ok());
    }
}

pub fn start_loop(scene: SceneHandle<WgpuBackend>) -> RenderLoop {
    let running = Rc::new(Cell::new(true));
    let raf_id: Rc<Cell<Option<i32>>> = Rc::new(Cell::new(None));
    let tick: TickSlot = Rc::new(RefCell::new(None));

    let weak: Weak<RefCell<Option<Closure<dyn FnMut()>>>> = Rc::downgrade(&tick);
    let running_tick = running.clone();
    let raf_tick = raf_id.clone();
    let mut last_instant = Instant::now();
    *tick.borrow_mut() = Some(Closure::wrap(Box::new(move || {
        raf_tick.set(None);
        if !running_tick.get() {
            return;
        }
        let now = Instant::now();
        let dt_sec = (now - last_instant).as_secs_f32();
        last_instant = now;

        if scene.read(|m| m.is_destroyed()) {
            running_tick.set(false);
            return;
        }
        match scene.with(|m| m.tick(dt_sec)) {
            Ok(()) => {}
            Err(e) => {
                log::error!("[frame] {}", e);
                scene.with(|m| m.report_error(e.to_string()));
                if e == SceneError::ContextLost {
                    running_tick.set(false);
                    return;
                }
            }
        }
        if running_tick.get() {
            if let Some(slot) = weak.upgrade() {
                request_frame(&slot, &raf_tick);
            }
        }
    }) as Box<dyn FnMut()>));
    request_frame(&tick, &raf_id);
    log::info!("[frame] loop started");

    RenderLoop {
        running,
        raf_id,
        tick,
    }
}

impl RenderLoop {
    pub fn is_running(&self) -> bool {
        self.running.get()
    }

    pub fn stop(&self) {
        if !self.running.replace(false) && self.tick.borrow().is_none() {
            return;
        }
        if let (Some(w), Some(id)) = (web::window(), self.raf_id.take()) {
            _ = w.cancel_animation_frame(id);
        }
        // Dropped on a later task: stop() may run inside the tick itself.
        if let Some(closure) = self.tick.borrow_mut().take() {
            dom::set_timeout(0, move || drop(closure));
        }
        log::info!("[frame] loop stopped");
    }
}
