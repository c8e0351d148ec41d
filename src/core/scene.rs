use crate::core::backend::{
    Cursor, DrawCmd, Frame, PanoramaImage, ResourceId, SceneBackend, Screenshot, ScreenshotOptions,
};
use crate::core::camera::{Camera, ControlsConfig, OrbitControls};
use crate::core::constants::*;
use crate::core::error::SceneError;
use crate::core::events::{EventBus, NamedEvent};
use crate::core::hotspot::{
    ClickAction, Hotspot, HotspotContent, HotspotId, HotspotRecord, HotspotSnapshot, ModalRequest,
    Point3, StylePatch,
};
use crate::core::input::{key_action, KeyAction, PointerButton, Ray};
use crate::core::LocalFuture;
use fnv::FnvHashSet;
use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SceneOptions {
    pub enable_controls: bool,
    pub enable_auto_rotate: bool,
    pub auto_rotate_speed: f32,
    pub enable_zoom: bool,
    pub min_distance: f32,
    pub max_distance: f32,
    pub enable_pan: bool,
    pub enable_damping: bool,
    pub damping_factor: f32,
}

impl Default for SceneOptions {
    fn default() -> Self {
        Self {
            enable_controls: true,
            enable_auto_rotate: false,
            auto_rotate_speed: 0.5,
            enable_zoom: true,
            min_distance: 1.0,
            max_distance: 100.0,
            enable_pan: false,
            enable_damping: true,
            damping_factor: 0.05,
        }
    }
}

impl SceneOptions {
    fn controls_config(&self) -> ControlsConfig {
        let min = self.min_distance.max(CAMERA_NEAR);
        ControlsConfig {
            enable_zoom: self.enable_zoom,
            enable_pan: self.enable_pan,
            enable_damping: self.enable_damping,
            damping_factor: self.damping_factor.clamp(0.0, 1.0),
            auto_rotate: self.enable_auto_rotate,
            auto_rotate_speed: self.auto_rotate_speed,
            min_distance: min,
            max_distance: self.max_distance.max(min),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoadOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub reset_view: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_rotate: Option<bool>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PanoramaSource {
    pub url: String,
    pub options: LoadOptions,
}

struct Panorama {
    resource: ResourceId,
    source: PanoramaSource,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LoadTicket {
    generation: u64,
    url: String,
    options: LoadOptions,
}

impl LoadTicket {
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded { width: u32, height: u32 },
    /// A newer load started first; this result was dropped.
    Superseded,
    /// The manager was destroyed while the load was pending.
    Cancelled,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ScreenPoint {
    pub x: f32,
    pub y: f32,
}

impl From<Vec2> for ScreenPoint {
    fn from(v: Vec2) -> Self {
        Self { x: v.x, y: v.y }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum SceneEvent {
    Initialized,
    Error {
        message: String,
    },
    LoadStart {
        url: String,
    },
    LoadProgress {
        url: String,
        loaded: u64,
        total: u64,
        percentage: f64,
    },
    LoadComplete {
        url: String,
        width: u32,
        height: u32,
        options: LoadOptions,
    },
    LoadError {
        url: String,
        message: String,
    },
    HotspotAdded {
        hotspot: HotspotSnapshot,
    },
    HotspotRemoved {
        id: HotspotId,
    },
    HotspotsCleared {
        count: usize,
    },
    HotspotClick {
        hotspot: HotspotSnapshot,
        point: Point3,
    },
    HotspotDragStart {
        hotspot: HotspotSnapshot,
        grab_point: Point3,
    },
    HotspotDrag {
        id: HotspotId,
        position: Point3,
    },
    HotspotDragEnd {
        hotspot: HotspotSnapshot,
    },
    SceneClick {
        screen: ScreenPoint,
        ndc: ScreenPoint,
        point: Point3,
    },
    SceneDoubleClick {
        screen: ScreenPoint,
        point: Option<Point3>,
    },
    ShowModal {
        hotspot_id: HotspotId,
        modal: ModalRequest,
    },
    PlayAudio {
        hotspot_id: HotspotId,
        url: String,
        #[serde(rename = "loop")]
        looped: bool,
        volume: f32,
    },
    CameraChange {
        position: Point3,
        target: Point3,
    },
    Resize {
        width: u32,
        height: u32,
    },
    FullscreenChange {
        fullscreen: bool,
    },
    FullscreenError {
        message: String,
    },
    Screenshot {
        data_url: String,
        width: u32,
        height: u32,
        format: String,
        quality: f64,
    },
    ScreenshotError {
        message: String,
    },
    ViewReset,
    AutoRotateToggle {
        enabled: bool,
    },
    AutoRotateSpeedChange {
        speed: f32,
    },
    Render {
        delta: f32,
    },
    Destroyed,
}

impl NamedEvent for SceneEvent {
    fn name(&self) -> &'static str {
        match self {
            SceneEvent::Initialized => "initialized",
            SceneEvent::Error { .. } => "error",
            SceneEvent::LoadStart { .. } => "loadStart",
            SceneEvent::LoadProgress { .. } => "loadProgress",
            SceneEvent::LoadComplete { .. } => "loadComplete",
            SceneEvent::LoadError { .. } => "loadError",
            SceneEvent::HotspotAdded { .. } => "hotspotAdded",
            SceneEvent::HotspotRemoved { .. } => "hotspotRemoved",
            SceneEvent::HotspotsCleared { .. } => "hotspotsCleared",
            SceneEvent::HotspotClick { .. } => "hotspotClick",
            SceneEvent::HotspotDragStart { .. } => "hotspotDragStart",
            SceneEvent::HotspotDrag { .. } => "hotspotDrag",
            SceneEvent::HotspotDragEnd { .. } => "hotspotDragEnd",
            SceneEvent::SceneClick { .. } => "sceneClick",
            SceneEvent::SceneDoubleClick { .. } => "sceneDoubleClick",
            SceneEvent::ShowModal { .. } => "showModal",
            SceneEvent::PlayAudio { .. } => "playAudio",
            SceneEvent::CameraChange { .. } => "cameraChange",
            SceneEvent::Resize { .. } => "resize",
            SceneEvent::FullscreenChange { .. } => "fullscreenChange",
            SceneEvent::FullscreenError { .. } => "fullscreenError",
            SceneEvent::Screenshot { .. } => "screenshot",
            SceneEvent::ScreenshotError { .. } => "screenshotError",
            SceneEvent::ViewReset => "viewReset",
            SceneEvent::AutoRotateToggle { .. } => "autoRotateToggle",
            SceneEvent::AutoRotateSpeedChange { .. } => "autoRotateSpeedChange",
            SceneEvent::Render { .. } => "render",
            SceneEvent::Destroyed => "destroyed",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum ClickOutcome {
    Hotspot(HotspotId),
    Scene(Vec3),
    Suppressed,
    Miss,
}

struct DragSession {
    id: HotspotId,
    moved: bool,
}

pub struct SceneManager<B: SceneBackend> {
    backend: B,
    events: Rc<EventBus<SceneEvent>>,
    options: SceneOptions,
    camera: Camera,
    controls: OrbitControls,
    width: u32,
    height: u32,
    panorama: Option<Panorama>,
    generation: u64,
    hotspots: Vec<Hotspot>,
    hovered: Option<HotspotId>,
    drag_enabled: FnvHashSet<HotspotId>,
    drag: Option<DragSession>,
    suppress_click: bool,
    elapsed: f32,
    fullscreen: bool,
    destroyed: bool,
    draws: Vec<DrawCmd>,
}

impl<B: SceneBackend> SceneManager<B> {
    pub fn new(
        mut backend: B,
        width: u32,
        height: u32,
        options: SceneOptions,
        events: Rc<EventBus<SceneEvent>>,
    ) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let config = options.controls_config();
        let eye = Vec3::new(0.0, 0.0, config.min_distance);
        let camera = Camera::new(eye, Vec3::ZERO, width as f32 / height as f32);
        let mut controls = OrbitControls::new(eye, Vec3::ZERO, config);
        controls.enabled = options.enable_controls;
        backend.resize(width, height);
        log::info!(
            "[scene] initialized {}x{} (controls: {})",
            width,
            height,
            options.enable_controls
        );
        let manager = Self {
            backend,
            events,
            options,
            camera,
            controls,
            width,
            height,
            panorama: None,
            generation: 0,
            hotspots: Vec::new(),
            hovered: None,
            drag_enabled: FnvHashSet::default(),
            drag: None,
            suppress_click: false,
            elapsed: 0.0,
            fullscreen: false,
            destroyed: false,
            draws: Vec::new(),
        };
        manager.emit(SceneEvent::Initialized);
        manager
    }

    fn emit(&self, event: SceneEvent) {
        self.events.emit(event);
    }

    fn ensure_live(&self) -> Result<(), SceneError> {
        if self.destroyed {
            Err(SceneError::Destroyed)
        } else {
            Ok(())
        }
    }

    pub fn events(&self) -> &Rc<EventBus<SceneEvent>> {
        &self.events
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn options(&self) -> &SceneOptions {
        &self.options
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn controls(&self) -> &OrbitControls {
        &self.controls
    }

    pub fn controls_mut(&mut self) -> &mut OrbitControls {
        &mut self.controls
    }

    pub fn viewport(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn elapsed(&self) -> f32 {
        self.elapsed
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn is_fullscreen(&self) -> bool {
        self.fullscreen
    }

    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    pub fn panorama(&self) -> Option<&PanoramaSource> {
        self.panorama.as_ref().map(|p| &p.source)
    }

    pub fn panorama_resource(&self) -> Option<ResourceId> {
        self.panorama.as_ref().map(|p| p.resource)
    }

    // ---- panorama loading ----

    /// Start a load: drops the current panorama and returns a ticket that
    /// the eventual result must be committed with.
    pub fn begin_load(&mut self, url: &str, options: LoadOptions) -> Result<LoadTicket, SceneError> {
        self.ensure_live()?;
        self.generation += 1;
        if let Some(old) = self.panorama.take() {
            self.backend.release(old.resource);
        }
        log::info!("[scene] loading panorama {} (#{})", url, self.generation);
        self.emit(SceneEvent::LoadStart {
            url: url.to_string(),
        });
        Ok(LoadTicket {
            generation: self.generation,
            url: url.to_string(),
            options,
        })
    }

    pub fn is_current(&self, ticket: &LoadTicket) -> bool {
        !self.destroyed && ticket.generation == self.generation
    }

    pub fn report_progress(&mut self, ticket: &LoadTicket, loaded: u64, total: u64) {
        if !self.is_current(ticket) {
            return;
        }
        let percentage = if total > 0 {
            (loaded as f64 / total as f64 * 100.0).min(100.0)
        } else {
            0.0
        };
        self.emit(SceneEvent::LoadProgress {
            url: ticket.url.clone(),
            loaded,
            total,
            percentage,
        });
    }

    pub fn discard_load(&mut self, ticket: &LoadTicket) -> LoadOutcome {
        if self.destroyed {
            log::info!("[scene] dropping panorama {} after destroy", ticket.url);
            return LoadOutcome::Cancelled;
        }
        log::info!(
            "[scene] dropping superseded panorama {} (#{})",
            ticket.url,
            ticket.generation
        );
        LoadOutcome::Superseded
    }

    pub fn finish_load(
        &mut self,
        ticket: LoadTicket,
        image: Result<PanoramaImage, SceneError>,
    ) -> Result<LoadOutcome, SceneError> {
        if !self.is_current(&ticket) {
            return Ok(self.discard_load(&ticket));
        }
        let committed = image
            .and_then(|img| img.fit_within(self.backend.max_texture_dimension()))
            .and_then(|img| {
                let res = self.backend.create_panorama(&img)?;
                Ok((res, img.width, img.height))
            });
        let (resource, width, height) = match committed {
            Ok(v) => v,
            Err(e) => {
                log::error!("[scene] panorama {} failed: {}", ticket.url, e);
                self.emit(SceneEvent::LoadError {
                    url: ticket.url,
                    message: e.to_string(),
                });
                return Err(e);
            }
        };
        if ticket.options.reset_view {
            self.controls.reset();
            self.sync_camera();
        }
        if let Some(auto) = ticket.options.auto_rotate {
            self.controls.auto_rotate = auto;
        }
        self.panorama = Some(Panorama {
            resource,
            source: PanoramaSource {
                url: ticket.url.clone(),
                options: ticket.options.clone(),
            },
        });
        log::info!("[scene] panorama ready {}x{}", width, height);
        self.emit(SceneEvent::LoadComplete {
            url: ticket.url,
            width,
            height,
            options: ticket.options,
        });
        Ok(LoadOutcome::Loaded { width, height })
    }

    // ---- hotspots ----

    pub fn add_hotspot(&mut self, record: HotspotRecord) -> Result<HotspotId, SceneError> {
        self.ensure_live()?;
        let hotspot = Hotspot::new(record, &mut self.backend)?;
        let id = hotspot.id().clone();
        log::debug!(
            "[scene] hotspot {} added ({})",
            id,
            hotspot.hotspot_type().as_str()
        );
        self.emit(SceneEvent::HotspotAdded {
            hotspot: hotspot.snapshot(),
        });
        self.hotspots.push(hotspot);
        Ok(id)
    }

    fn index_of(&self, id: &HotspotId) -> Option<usize> {
        self.hotspots.iter().position(|h| h.id() == id)
    }

    pub fn hotspot(&self, id: &HotspotId) -> Option<&Hotspot> {
        self.index_of(id).map(|i| &self.hotspots[i])
    }

    pub fn hotspots(&self) -> Vec<HotspotSnapshot> {
        self.hotspots.iter().map(Hotspot::snapshot).collect()
    }

    pub fn hotspot_count(&self) -> usize {
        self.hotspots.len()
    }

    pub fn remove_hotspot(&mut self, id: &HotspotId) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        if self.drag.as_ref().is_some_and(|d| &d.id == id) {
            self.end_drag();
        }
        let hotspot = self.hotspots.remove(idx);
        if self.index_of(id).is_none() {
            self.drag_enabled.remove(id);
        }
        if self.hovered.as_ref() == Some(id) {
            self.hovered = None;
            self.backend.set_cursor(Cursor::Default);
            self.backend.set_tooltip(None);
        }
        hotspot.destroy(&mut self.backend);
        self.emit(SceneEvent::HotspotRemoved { id: id.clone() });
        true
    }

    pub fn clear_hotspots(&mut self) {
        if self.destroyed {
            return;
        }
        let count = self.release_hotspots();
        self.emit(SceneEvent::HotspotsCleared { count });
    }

    fn release_hotspots(&mut self) -> usize {
        if self.drag.is_some() {
            self.end_drag();
        }
        self.drag_enabled.clear();
        if self.hovered.take().is_some() {
            self.backend.set_cursor(Cursor::Default);
            self.backend.set_tooltip(None);
        }
        let count = self.hotspots.len();
        for h in self.hotspots.drain(..) {
            h.destroy(&mut self.backend);
        }
        count
    }

    pub fn update_hotspot_content(
        &mut self,
        id: &HotspotId,
        patch: HotspotContent,
    ) -> Result<bool, SceneError> {
        self.ensure_live()?;
        let Some(idx) = self.index_of(id) else {
            return Ok(false);
        };
        self.hotspots[idx].update_content(patch, &mut self.backend)?;
        Ok(true)
    }

    pub fn update_hotspot_style(&mut self, id: &HotspotId, patch: StylePatch) -> Result<bool, SceneError> {
        self.ensure_live()?;
        let Some(idx) = self.index_of(id) else {
            return Ok(false);
        };
        self.hotspots[idx].update_style(patch, &mut self.backend)?;
        Ok(true)
    }

    pub fn set_hotspot_position(&mut self, id: &HotspotId, position: Vec3) -> bool {
        match self.index_of(id) {
            Some(idx) => {
                self.hotspots[idx].set_position(position);
                true
            }
            None => false,
        }
    }

    pub fn set_hotspot_visible(&mut self, id: &HotspotId, visible: bool) -> bool {
        let Some(idx) = self.index_of(id) else {
            return false;
        };
        self.hotspots[idx].set_visible(visible);
        if !visible && self.drag.as_ref().is_some_and(|d| &d.id == id) {
            self.end_drag();
        }
        if !visible && self.hovered.as_ref() == Some(id) {
            self.hovered = None;
            self.backend.set_cursor(Cursor::Default);
            self.backend.set_tooltip(None);
        }
        true
    }

    pub fn select_hotspot(&mut self, id: &HotspotId, selected: bool) -> Result<bool, SceneError> {
        self.ensure_live()?;
        let Some(idx) = self.index_of(id) else {
            return Ok(false);
        };
        self.hotspots[idx].set_selected(selected, &mut self.backend)?;
        Ok(true)
    }

    // ---- drag ----

    pub fn enable_hotspot_drag(&mut self, id: &HotspotId) -> bool {
        if self.destroyed || self.index_of(id).is_none() {
            return false;
        }
        self.drag_enabled.insert(id.clone());
        true
    }

    pub fn disable_hotspot_drag(&mut self, id: &HotspotId) {
        self.drag_enabled.remove(id);
        if self.drag.as_ref().is_some_and(|d| &d.id == id) {
            self.end_drag();
        }
    }

    pub fn is_drag_enabled(&self, id: &HotspotId) -> bool {
        self.drag_enabled.contains(id)
    }

    fn end_drag(&mut self) {
        let Some(session) = self.drag.take() else {
            return;
        };
        self.controls.enabled = self.options.enable_controls;
        self.suppress_click = session.moved;
        self.backend.set_cursor(if self.hovered.is_some() {
            Cursor::Pointer
        } else {
            Cursor::Default
        });
        if let Some(h) = self.hotspot(&session.id) {
            let hotspot = h.snapshot();
            log::debug!("[scene] drag end {} at {:?}", session.id, hotspot.position);
            self.emit(SceneEvent::HotspotDragEnd { hotspot });
        }
    }

    // ---- picking ----

    fn ray_at(&self, px: Vec2) -> Ray {
        self.camera.ray_from_screen(px, self.width, self.height)
    }

    fn pick_hotspot(&self, ray: &Ray, drag_only: bool) -> Option<(usize, f32)> {
        self.hotspots
            .iter()
            .enumerate()
            .filter(|(_, h)| !drag_only || self.drag_enabled.contains(h.id()))
            .filter_map(|(i, h)| h.hit_distance(ray.origin, ray.dir).map(|t| (i, t)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    fn pick_panorama(&self, ray: &Ray) -> Option<Vec3> {
        self.panorama.as_ref()?;
        crate::core::input::ray_sphere(ray.origin, ray.dir, Vec3::ZERO, PANORAMA_RADIUS)
            .map(|t| ray.at(t))
    }

    pub fn panorama_point_at(&self, px: Vec2) -> Option<Vec3> {
        self.pick_panorama(&self.ray_at(px))
    }

    pub fn hotspot_at(&self, px: Vec2) -> Option<HotspotId> {
        self.pick_hotspot(&self.ray_at(px), false)
            .map(|(i, _)| self.hotspots[i].id().clone())
    }

    // ---- pointer input ----

    pub fn pointer_down(&mut self, px: Vec2, button: PointerButton) -> bool {
        if self.destroyed {
            return false;
        }
        self.suppress_click = false;
        if button == PointerButton::Primary
            && self.panorama.is_some()
            && !self.drag_enabled.is_empty()
        {
            let ray = self.ray_at(px);
            if let Some((idx, t)) = self.pick_hotspot(&ray, true) {
                let grab = ray.at(t);
                let hotspot = self.hotspots[idx].snapshot();
                self.drag = Some(DragSession {
                    id: hotspot.id.clone(),
                    moved: false,
                });
                self.controls.cancel();
                self.controls.enabled = false;
                self.backend.set_cursor(Cursor::Grabbing);
                log::debug!("[scene] drag start {}", hotspot.id);
                self.emit(SceneEvent::HotspotDragStart {
                    hotspot,
                    grab_point: grab.into(),
                });
                return true;
            }
        }
        self.controls.pointer_down(button, px)
    }

    pub fn pointer_move(&mut self, px: Vec2) {
        if self.destroyed {
            return;
        }
        if let Some(id) = self.drag.as_ref().map(|d| d.id.clone()) {
            let Some(point) = self.panorama_point_at(px) else {
                return;
            };
            if let Some(idx) = self.index_of(&id) {
                self.hotspots[idx].set_position(point);
                if let Some(d) = self.drag.as_mut() {
                    d.moved = true;
                }
                self.emit(SceneEvent::HotspotDrag {
                    id,
                    position: point.into(),
                });
            }
            return;
        }
        if self.controls.is_interacting() {
            self.controls.pointer_move(px, &self.camera, self.height);
            return;
        }
        self.update_hover(px);
    }

    pub fn pointer_up(&mut self) {
        if self.destroyed {
            return;
        }
        if self.drag.is_some() {
            self.end_drag();
        } else {
            self.controls.pointer_up();
        }
    }

    pub fn pointer_leave(&mut self) {
        if self.destroyed {
            return;
        }
        self.clear_hover();
    }

    fn clear_hover(&mut self) {
        if let Some(prev) = self.hovered.take() {
            if let Some(idx) = self.index_of(&prev) {
                self.hotspots[idx].on_hover(false);
            }
            self.backend.set_cursor(Cursor::Default);
            self.backend.set_tooltip(None);
        }
    }

    fn update_hover(&mut self, px: Vec2) {
        let hit = self.hotspot_at(px);
        if hit == self.hovered {
            return;
        }
        self.clear_hover();
        let Some(id) = hit else {
            return;
        };
        if let Some(idx) = self.index_of(&id) {
            let cursor = self.hotspots[idx].on_hover(true);
            let tooltip = self.hotspots[idx].tooltip().map(str::to_string);
            self.backend.set_cursor(cursor);
            self.backend.set_tooltip(tooltip.as_deref());
            self.hovered = Some(id);
        }
    }

    pub fn hovered(&self) -> Option<&HotspotId> {
        self.hovered.as_ref()
    }

    pub fn click(&mut self, px: Vec2) -> Result<ClickOutcome, SceneError> {
        self.ensure_live()?;
        if std::mem::take(&mut self.suppress_click) {
            return Ok(ClickOutcome::Suppressed);
        }
        let ray = self.ray_at(px);
        if let Some((idx, t)) = self.pick_hotspot(&ray, false) {
            let action = self.hotspots[idx].on_click(&mut self.backend)?;
            let hotspot = self.hotspots[idx].snapshot();
            let id = hotspot.id.clone();
            log::debug!("[scene] hotspot click {}", id);
            match action {
                Some(ClickAction::ShowModal(modal)) => self.emit(SceneEvent::ShowModal {
                    hotspot_id: id.clone(),
                    modal,
                }),
                Some(ClickAction::OpenLink { url, target }) => self.backend.open_url(&url, &target),
                Some(ClickAction::PlayAudio {
                    url,
                    looped,
                    volume,
                }) => self.emit(SceneEvent::PlayAudio {
                    hotspot_id: id.clone(),
                    url,
                    looped,
                    volume,
                }),
                None => {}
            }
            self.emit(SceneEvent::HotspotClick {
                hotspot,
                point: ray.at(t).into(),
            });
            return Ok(ClickOutcome::Hotspot(id));
        }
        match self.pick_panorama(&ray) {
            Some(point) => {
                let ndc = crate::core::input::screen_to_ndc(px, self.width as f32, self.height as f32);
                self.emit(SceneEvent::SceneClick {
                    screen: px.into(),
                    ndc: ndc.into(),
                    point: point.into(),
                });
                Ok(ClickOutcome::Scene(point))
            }
            None => Ok(ClickOutcome::Miss),
        }
    }

    pub fn double_click(&mut self, px: Vec2) {
        if self.destroyed {
            return;
        }
        let point = self.panorama_point_at(px).map(Point3::from);
        self.emit(SceneEvent::SceneDoubleClick {
            screen: px.into(),
            point,
        });
    }

    pub fn wheel(&mut self, delta_y: f32) {
        if !self.destroyed {
            self.controls.wheel(delta_y);
        }
    }

    /// Apply a keyboard shortcut. Fullscreen actions are returned for the
    /// caller to carry out on the host surface.
    pub fn key(&mut self, key: &str) -> Option<KeyAction> {
        if self.destroyed {
            return None;
        }
        let action = key_action(key, KEY_ROTATE_STEP, ZOOM_STEP)?;
        match action {
            KeyAction::Orbit { left, up } => {
                if self.controls.enabled {
                    self.controls.rotate_left(left);
                    self.controls.rotate_up(up);
                }
                None
            }
            KeyAction::Zoom { scale } => {
                self.controls.zoom(scale);
                None
            }
            KeyAction::ResetView => {
                self.reset_view();
                None
            }
            KeyAction::ToggleAutoRotate => {
                self.toggle_auto_rotate();
                None
            }
            KeyAction::ToggleFullscreen | KeyAction::ExitFullscreen => Some(action),
        }
    }

    // ---- view ----

    fn sync_camera(&mut self) {
        self.camera.eye = self.controls.position();
        self.camera.target = self.controls.target();
    }

    pub fn reset_view(&mut self) {
        if self.destroyed {
            return;
        }
        self.controls.reset();
        self.sync_camera();
        self.emit(SceneEvent::ViewReset);
    }

    pub fn save_view(&mut self) {
        self.controls.save_state();
    }

    pub fn toggle_auto_rotate(&mut self) -> bool {
        if self.destroyed {
            return false;
        }
        self.controls.auto_rotate = !self.controls.auto_rotate;
        let enabled = self.controls.auto_rotate;
        self.emit(SceneEvent::AutoRotateToggle { enabled });
        enabled
    }

    pub fn set_auto_rotate_speed(&mut self, speed: f32) {
        if self.destroyed || !speed.is_finite() {
            return;
        }
        self.controls.auto_rotate_speed = speed;
        self.emit(SceneEvent::AutoRotateSpeedChange { speed });
    }

    pub fn resize(&mut self, width: u32, height: u32) {
        if self.destroyed {
            return;
        }
        self.width = width.max(1);
        self.height = height.max(1);
        self.camera.set_viewport(self.width, self.height);
        self.backend.resize(self.width, self.height);
        self.emit(SceneEvent::Resize {
            width: self.width,
            height: self.height,
        });
    }

    pub fn set_fullscreen(&mut self, fullscreen: bool) {
        if self.destroyed {
            return;
        }
        self.fullscreen = fullscreen;
        self.emit(SceneEvent::FullscreenChange { fullscreen });
    }

    pub fn fullscreen_failed(&mut self, error: &SceneError) {
        log::warn!("[scene] {}", error);
        self.emit(SceneEvent::FullscreenError {
            message: error.to_string(),
        });
    }

    pub fn report_error(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::error!("[scene] {}", message);
        self.emit(SceneEvent::Error { message });
    }

    // ---- frame ----

    fn render_frame(&mut self) -> Result<(), SceneError> {
        let mut draws = std::mem::take(&mut self.draws);
        draws.clear();
        for h in &self.hotspots {
            h.push_draws(self.camera.eye, &mut draws);
        }
        draws.sort_by_key(|d| d.layer);
        let frame = Frame {
            view_proj: self.camera.view_projection(),
            eye: self.camera.eye,
            panorama: self.panorama_resource(),
            draws: &draws,
        };
        let result = self.backend.render(&frame);
        self.draws = draws;
        result
    }

    pub fn tick(&mut self, dt_sec: f32) -> Result<(), SceneError> {
        if self.destroyed {
            return Ok(());
        }
        let dt = dt_sec.max(0.0);
        self.elapsed += dt;
        if self.controls.update(dt) {
            self.sync_camera();
            self.emit(SceneEvent::CameraChange {
                position: self.camera.eye.into(),
                target: self.camera.target.into(),
            });
        }
        for h in &mut self.hotspots {
            h.animate(self.elapsed);
        }
        self.render_frame()?;
        self.emit(SceneEvent::Render { delta: dt });
        Ok(())
    }

    pub fn take_screenshot(&mut self, options: ScreenshotOptions) -> Result<Screenshot, SceneError> {
        self.ensure_live()?;
        let captured = self
            .render_frame()
            .and_then(|_| self.backend.capture(&options));
        match captured {
            Ok(data_url) => {
                let shot = Screenshot {
                    data_url,
                    width: options.width.unwrap_or(self.width),
                    height: options.height.unwrap_or(self.height),
                    format: options.format,
                    quality: options.quality,
                };
                self.emit(SceneEvent::Screenshot {
                    data_url: shot.data_url.clone(),
                    width: shot.width,
                    height: shot.height,
                    format: shot.format.clone(),
                    quality: shot.quality,
                });
                Ok(shot)
            }
            Err(e) => {
                log::error!("[scene] screenshot failed: {}", e);
                self.emit(SceneEvent::ScreenshotError {
                    message: e.to_string(),
                });
                Err(e)
            }
        }
    }

    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.clear_hotspots();
        if let Some(p) = self.panorama.take() {
            self.backend.release(p.resource);
        }
        self.controls.cancel();
        self.controls.enabled = false;
        self.backend.shutdown();
        self.destroyed = true;
        log::info!("[scene] destroyed");
        self.emit(SceneEvent::Destroyed);
    }
}

pub trait ImageFetcher {
    fn fetch(
        &self,
        url: &str,
        progress: Box<dyn FnMut(u64, u64)>,
    ) -> LocalFuture<'static, Result<Vec<u8>, SceneError>>;
}

/// Every call runs with event dispatch deferred until the manager borrow is
/// released, so listeners may call back into the same handle.
pub struct SceneHandle<B: SceneBackend> {
    inner: Rc<RefCell<SceneManager<B>>>,
    events: Rc<EventBus<SceneEvent>>,
}

impl<B: SceneBackend> Clone for SceneHandle<B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            events: self.events.clone(),
        }
    }
}

impl<B: SceneBackend + 'static> SceneHandle<B> {
    pub fn new(manager: SceneManager<B>) -> Self {
        let events = manager.events().clone();
        Self {
            inner: Rc::new(RefCell::new(manager)),
            events,
        }
    }

    pub fn create(
        backend: B,
        width: u32,
        height: u32,
        options: SceneOptions,
        events: Rc<EventBus<SceneEvent>>,
    ) -> Self {
        let bus = events.clone();
        bus.deferred(|| Self::new(SceneManager::new(backend, width, height, options, events)))
    }

    pub fn events(&self) -> &Rc<EventBus<SceneEvent>> {
        &self.events
    }

    pub fn with<T>(&self, f: impl FnOnce(&mut SceneManager<B>) -> T) -> T {
        self.events.deferred(|| f(&mut self.inner.borrow_mut()))
    }

    pub fn read<T>(&self, f: impl FnOnce(&SceneManager<B>) -> T) -> T {
        f(&self.inner.borrow())
    }

    /// Fetch, decode and commit a panorama. The manager is not borrowed
    /// while the fetch is pending.
    pub async fn load_panorama<F: ImageFetcher + ?Sized>(
        &self,
        fetcher: &F,
        url: &str,
        options: LoadOptions,
    ) -> Result<LoadOutcome, SceneError> {
        let ticket = self.with(|m| m.begin_load(url, options))?;
        let progress_handle = self.clone();
        let progress_ticket = ticket.clone();
        let progress = Box::new(move |loaded: u64, total: u64| {
            progress_handle.with(|m| m.report_progress(&progress_ticket, loaded, total));
        });
        let fetched = fetcher.fetch(url, progress).await;
        if !self.read(|m| m.is_current(&ticket)) {
            return Ok(self.with(|m| m.discard_load(&ticket)));
        }
        let image = fetched.and_then(|bytes| PanoramaImage::decode(&bytes));
        self.with(|m| m.finish_load(ticket, image))
    }
}
