use crate::core::backend::{
    Cursor, DrawCmd, DrawLayer, DrawableDesc, LabelDesc, ResourceId, SceneBackend,
};
use crate::core::constants::*;
use crate::core::error::SceneError;
use glam::{Mat4, Quat, Vec3, Vec4};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Point3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl From<Vec3> for Point3 {
    fn from(v: Vec3) -> Self {
        Self {
            x: v.x,
            y: v.y,
            z: v.z,
        }
    }
}

impl From<Point3> for Vec3 {
    fn from(p: Point3) -> Self {
        Vec3::new(p.x, p.y, p.z)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct HotspotId(pub String);

impl HotspotId {
    pub fn generate() -> Self {
        const ALPHABET: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";
        let mut rng = rand::thread_rng();
        let token = (0..HOTSPOT_ID_LEN)
            .map(|_| ALPHABET[rng.gen_range(0..ALPHABET.len())] as char)
            .collect();
        Self(token)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HotspotId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for HotspotId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HotspotType {
    #[default]
    Info,
    Media,
    Link,
    Audio,
}

impl HotspotType {
    pub fn as_str(self) -> &'static str {
        match self {
            HotspotType::Info => "info",
            HotspotType::Media => "media",
            HotspotType::Link => "link",
            HotspotType::Audio => "audio",
        }
    }

    pub fn behavior(self) -> &'static Behavior {
        match self {
            HotspotType::Info => &INFO,
            HotspotType::Media => &MEDIA,
            HotspotType::Link => &LINK,
            HotspotType::Audio => &AUDIO,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HotspotContent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub media_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
    #[serde(rename = "loop", skip_serializing_if = "Option::is_none")]
    pub looped: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tooltip: Option<String>,
}

impl HotspotContent {
    pub fn merge(&mut self, patch: HotspotContent) {
        macro_rules! take {
            ($($f:ident),*) => { $( if patch.$f.is_some() { self.$f = patch.$f; } )* };
        }
        take!(
            title,
            description,
            image,
            media_url,
            media_type,
            url,
            target,
            audio_url,
            looped,
            volume,
            tooltip
        );
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum HotspotKind {
    Info {
        description: Option<String>,
        image: Option<String>,
    },
    Media {
        media_url: Option<String>,
        media_type: Option<String>,
    },
    Link {
        url: Option<String>,
        target: Option<String>,
    },
    Audio {
        audio_url: Option<String>,
        looped: Option<bool>,
        volume: Option<f32>,
    },
}

impl HotspotKind {
    pub fn from_content(ty: HotspotType, c: &HotspotContent) -> Self {
        match ty {
            HotspotType::Info => HotspotKind::Info {
                description: c.description.clone(),
                image: c.image.clone(),
            },
            HotspotType::Media => HotspotKind::Media {
                media_url: c.media_url.clone(),
                media_type: c.media_type.clone(),
            },
            HotspotType::Link => HotspotKind::Link {
                url: c.url.clone(),
                target: c.target.clone(),
            },
            HotspotType::Audio => HotspotKind::Audio {
                audio_url: c.audio_url.clone(),
                looped: c.looped,
                volume: c.volume,
            },
        }
    }

    pub fn hotspot_type(&self) -> HotspotType {
        match self {
            HotspotKind::Info { .. } => HotspotType::Info,
            HotspotKind::Media { .. } => HotspotType::Media,
            HotspotKind::Link { .. } => HotspotType::Link,
            HotspotKind::Audio { .. } => HotspotType::Audio,
        }
    }

    fn write_into(&self, c: &mut HotspotContent) {
        match self {
            HotspotKind::Info { description, image } => {
                c.description = description.clone();
                c.image = image.clone();
            }
            HotspotKind::Media {
                media_url,
                media_type,
            } => {
                c.media_url = media_url.clone();
                c.media_type = media_type.clone();
            }
            HotspotKind::Link { url, target } => {
                c.url = url.clone();
                c.target = target.clone();
            }
            HotspotKind::Audio {
                audio_url,
                looped,
                volume,
            } => {
                c.audio_url = audio_url.clone();
                c.looped = *looped;
                c.volume = *volume;
            }
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotStyle {
    pub color: u32,
    pub size: f32,
    pub opacity: f32,
    pub glow_color: u32,
    pub label_color: String,
    pub label_background: String,
}

impl Default for HotspotStyle {
    fn default() -> Self {
        GENERIC_PRESET.to_style()
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StylePatch {
    pub color: Option<u32>,
    pub size: Option<f32>,
    pub opacity: Option<f32>,
    pub glow_color: Option<u32>,
    pub label_color: Option<String>,
    pub label_background: Option<String>,
}

impl HotspotStyle {
    /// Apply a patch; returns true when a label colour changed.
    pub fn merge(&mut self, patch: StylePatch) -> bool {
        if let Some(c) = patch.color {
            self.color = c;
        }
        if let Some(s) = patch.size {
            self.size = s.max(0.0);
        }
        if let Some(o) = patch.opacity {
            self.opacity = o.clamp(0.0, 1.0);
        }
        if let Some(g) = patch.glow_color {
            self.glow_color = g;
        }
        let mut label_changed = false;
        if let Some(c) = patch.label_color {
            label_changed |= c != self.label_color;
            self.label_color = c;
        }
        if let Some(b) = patch.label_background {
            label_changed |= b != self.label_background;
            self.label_background = b;
        }
        label_changed
    }
}

pub struct StylePreset {
    pub color: u32,
    pub size: f32,
    pub opacity: f32,
    pub glow_color: u32,
    pub label_color: &'static str,
    pub label_background: &'static str,
}

impl StylePreset {
    pub fn to_style(&self) -> HotspotStyle {
        HotspotStyle {
            color: self.color,
            size: self.size,
            opacity: self.opacity,
            glow_color: self.glow_color,
            label_color: self.label_color.to_string(),
            label_background: self.label_background.to_string(),
        }
    }
}

pub const GENERIC_PRESET: StylePreset = StylePreset {
    color: 0xffd700,
    size: 2.0,
    opacity: 0.8,
    glow_color: 0xfff59d,
    label_color: "#ffffff",
    label_background: "rgba(0, 0, 0, 0.6)",
};

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum ModalRequest {
    Info {
        title: Option<String>,
        content: Option<String>,
        image: Option<String>,
    },
    Media {
        title: Option<String>,
        media_url: Option<String>,
        media_type: Option<String>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ClickAction {
    ShowModal(ModalRequest),
    OpenLink { url: String, target: String },
    PlayAudio { url: String, looped: bool, volume: f32 },
}

pub struct Behavior {
    pub preset: StylePreset,
    pub on_click: fn(&HotspotKind, Option<&str>) -> Option<ClickAction>,
}

static INFO: Behavior = Behavior {
    preset: StylePreset {
        color: 0x4fc3f7,
        size: 2.0,
        opacity: 0.8,
        glow_color: 0x81d4fa,
        label_color: "#ffffff",
        label_background: "rgba(79, 195, 247, 0.9)",
    },
    on_click: click_info,
};

static MEDIA: Behavior = Behavior {
    preset: StylePreset {
        color: 0xff7043,
        size: 2.5,
        opacity: 0.8,
        glow_color: 0xffab91,
        label_color: "#ffffff",
        label_background: "rgba(255, 112, 67, 0.9)",
    },
    on_click: click_media,
};

static LINK: Behavior = Behavior {
    preset: StylePreset {
        color: 0x66bb6a,
        size: 2.0,
        opacity: 0.8,
        glow_color: 0xa5d6a7,
        label_color: "#ffffff",
        label_background: "rgba(102, 187, 106, 0.9)",
    },
    on_click: click_link,
};

static AUDIO: Behavior = Behavior {
    preset: StylePreset {
        color: 0xffd54f,
        size: 2.2,
        opacity: 0.8,
        glow_color: 0xfff176,
        label_color: "#333333",
        label_background: "rgba(255, 213, 79, 0.9)",
    },
    on_click: click_audio,
};

fn click_info(kind: &HotspotKind, title: Option<&str>) -> Option<ClickAction> {
    let HotspotKind::Info { description, image } = kind else {
        return None;
    };
    Some(ClickAction::ShowModal(ModalRequest::Info {
        title: title.map(str::to_string),
        content: description.clone(),
        image: image.clone(),
    }))
}

fn click_media(kind: &HotspotKind, title: Option<&str>) -> Option<ClickAction> {
    let HotspotKind::Media {
        media_url,
        media_type,
    } = kind
    else {
        return None;
    };
    Some(ClickAction::ShowModal(ModalRequest::Media {
        title: title.map(str::to_string),
        media_url: media_url.clone(),
        media_type: media_type.clone(),
    }))
}

fn click_link(kind: &HotspotKind, _title: Option<&str>) -> Option<ClickAction> {
    let HotspotKind::Link {
        url: Some(url),
        target,
    } = kind
    else {
        return None;
    };
    Some(ClickAction::OpenLink {
        url: url.clone(),
        target: target.clone().unwrap_or_else(|| "_blank".to_string()),
    })
}

fn click_audio(kind: &HotspotKind, _title: Option<&str>) -> Option<ClickAction> {
    let HotspotKind::Audio {
        audio_url: Some(url),
        looped,
        volume,
    } = kind
    else {
        return None;
    };
    Some(ClickAction::PlayAudio {
        url: url.clone(),
        looped: looped.unwrap_or(false),
        volume: volume.unwrap_or(1.0).clamp(0.0, 1.0),
    })
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HotspotRecord {
    pub id: Option<String>,
    pub position: Point3,
    #[serde(rename = "type")]
    pub kind: HotspotType,
    pub content: HotspotContent,
    pub style: StylePatch,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotSnapshot {
    pub id: HotspotId,
    pub position: Point3,
    #[serde(rename = "type")]
    pub kind: HotspotType,
    pub content: HotspotContent,
    pub style: HotspotStyle,
    pub visible: bool,
    pub hovered: bool,
    pub selected: bool,
}

#[derive(Clone, Copy, Debug)]
struct Animation {
    float_offset: f32,
    spin: f32,
    scale: f32,
    glow_opacity: f32,
    opacity: f32,
}

#[derive(Clone, Copy, Debug)]
struct Parts {
    marker: ResourceId,
    glow: ResourceId,
    label: Option<ResourceId>,
    ring: Option<ResourceId>,
}

pub struct Hotspot {
    id: HotspotId,
    kind: HotspotKind,
    title: Option<String>,
    tooltip: Option<String>,
    style: HotspotStyle,
    behavior: &'static Behavior,
    base: Vec3,
    visible: bool,
    hovered: bool,
    selected: bool,
    anim: Animation,
    parts: Parts,
}

fn rgb(hex: u32) -> Vec3 {
    Vec3::new(
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    )
}

pub fn billboard(position: Vec3, eye: Vec3, scale: f32) -> Mat4 {
    let forward = (eye - position).normalize_or_zero();
    if forward == Vec3::ZERO {
        return Mat4::from_scale_rotation_translation(Vec3::splat(scale), Quat::IDENTITY, position);
    }
    let mut right = Vec3::Y.cross(forward);
    if right.length_squared() < 1e-8 {
        right = Vec3::X;
    }
    let right = right.normalize();
    let up = forward.cross(right);
    Mat4::from_cols(
        (right * scale).extend(0.0),
        (up * scale).extend(0.0),
        (forward * scale).extend(0.0),
        position.extend(1.0),
    )
}

impl Hotspot {
    pub fn new<B: SceneBackend + ?Sized>(
        record: HotspotRecord,
        backend: &mut B,
    ) -> Result<Self, SceneError> {
        let position: Vec3 = record.position.into();
        if !position.is_finite() {
            return Err(SceneError::InvalidRecord(format!(
                "non-finite position {:?}",
                record.position
            )));
        }
        let id = match record.id {
            Some(id) if !id.is_empty() => HotspotId(id),
            _ => HotspotId::generate(),
        };
        let behavior = record.kind.behavior();
        let mut style = behavior.preset.to_style();
        style.merge(record.style);
        let kind = HotspotKind::from_content(record.kind, &record.content);

        let marker = backend.create_drawable(&DrawableDesc::Marker)?;
        let glow = match backend.create_drawable(&DrawableDesc::Glow) {
            Ok(g) => g,
            Err(e) => {
                backend.release(marker);
                return Err(e);
            }
        };
        let mut hotspot = Self {
            id,
            kind,
            title: record.content.title,
            tooltip: record.content.tooltip,
            anim: Animation {
                float_offset: 0.0,
                spin: 0.0,
                scale: 1.0,
                glow_opacity: GLOW_OPACITY,
                opacity: style.opacity,
            },
            style,
            behavior,
            base: position,
            visible: true,
            hovered: false,
            selected: false,
            parts: Parts {
                marker,
                glow,
                label: None,
                ring: None,
            },
        };
        if let Err(e) = hotspot.rebuild_label(backend) {
            hotspot.destroy(backend);
            return Err(e);
        }
        Ok(hotspot)
    }

    pub fn id(&self) -> &HotspotId {
        &self.id
    }

    pub fn kind(&self) -> &HotspotKind {
        &self.kind
    }

    pub fn hotspot_type(&self) -> HotspotType {
        self.kind.hotspot_type()
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    pub fn tooltip(&self) -> Option<&str> {
        self.tooltip.as_deref()
    }

    pub fn style(&self) -> &HotspotStyle {
        &self.style
    }

    pub fn position(&self) -> Vec3 {
        self.base
    }

    pub fn world_position(&self) -> Vec3 {
        self.base + Vec3::Y * self.anim.float_offset
    }

    pub fn scale(&self) -> f32 {
        self.anim.scale
    }

    pub fn opacity(&self) -> f32 {
        self.anim.opacity
    }

    pub fn glow_opacity(&self) -> f32 {
        self.anim.glow_opacity
    }

    pub fn is_visible(&self) -> bool {
        self.visible
    }

    pub fn is_hovered(&self) -> bool {
        self.hovered
    }

    pub fn is_selected(&self) -> bool {
        self.selected
    }

    pub fn has_label(&self) -> bool {
        self.parts.label.is_some()
    }

    pub fn has_ring(&self) -> bool {
        self.parts.ring.is_some()
    }

    pub fn resources(&self) -> Vec<ResourceId> {
        let mut out = vec![self.parts.marker, self.parts.glow];
        out.extend(self.parts.label);
        out.extend(self.parts.ring);
        out
    }

    pub fn content(&self) -> HotspotContent {
        let mut c = HotspotContent {
            title: self.title.clone(),
            tooltip: self.tooltip.clone(),
            ..Default::default()
        };
        self.kind.write_into(&mut c);
        c
    }

    pub fn snapshot(&self) -> HotspotSnapshot {
        HotspotSnapshot {
            id: self.id.clone(),
            position: self.base.into(),
            kind: self.hotspot_type(),
            content: self.content(),
            style: self.style.clone(),
            visible: self.visible,
            hovered: self.hovered,
            selected: self.selected,
        }
    }

    pub fn set_position(&mut self, position: Vec3) {
        if position.is_finite() {
            self.base = position;
        }
    }

    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        if !visible {
            self.hovered = false;
        }
    }

    pub fn on_hover(&mut self, hovered: bool) -> Cursor {
        self.hovered = hovered;
        if hovered {
            Cursor::Pointer
        } else {
            Cursor::Default
        }
    }

    pub fn on_click<B: SceneBackend + ?Sized>(
        &mut self,
        backend: &mut B,
    ) -> Result<Option<ClickAction>, SceneError> {
        self.set_selected(!self.selected, backend)?;
        let action = (self.behavior.on_click)(&self.kind, self.title.as_deref());
        if action.is_none() {
            log::warn!(
                "[hotspot] {} ({}) has no target for its click action",
                self.id,
                self.hotspot_type().as_str()
            );
        }
        Ok(action)
    }

    pub fn set_selected<B: SceneBackend + ?Sized>(
        &mut self,
        selected: bool,
        backend: &mut B,
    ) -> Result<(), SceneError> {
        if selected && self.parts.ring.is_none() {
            self.parts.ring = Some(backend.create_drawable(&DrawableDesc::Ring)?);
        }
        self.selected = selected;
        if !selected {
            self.anim.opacity = self.style.opacity;
        }
        Ok(())
    }

    pub fn update_content<B: SceneBackend + ?Sized>(
        &mut self,
        patch: HotspotContent,
        backend: &mut B,
    ) -> Result<(), SceneError> {
        let mut merged = self.content();
        merged.merge(patch);
        let title_changed = merged.title != self.title;
        self.kind = HotspotKind::from_content(self.hotspot_type(), &merged);
        self.title = merged.title;
        self.tooltip = merged.tooltip;
        if title_changed {
            self.rebuild_label(backend)?;
        }
        Ok(())
    }

    /// Merge a style patch. The label is rebuilt only when its colours changed.
    pub fn update_style<B: SceneBackend + ?Sized>(
        &mut self,
        patch: StylePatch,
        backend: &mut B,
    ) -> Result<(), SceneError> {
        let label_changed = self.style.merge(patch);
        if !self.selected {
            self.anim.opacity = self.style.opacity;
        }
        if label_changed && self.parts.label.is_some() {
            self.rebuild_label(backend)?;
        }
        Ok(())
    }

    fn rebuild_label<B: SceneBackend + ?Sized>(&mut self, backend: &mut B) -> Result<(), SceneError> {
        if let Some(old) = self.parts.label.take() {
            backend.release(old);
        }
        let Some(text) = self.title.as_deref().filter(|t| !t.is_empty()) else {
            return Ok(());
        };
        let desc = DrawableDesc::Label(LabelDesc {
            text: text.to_string(),
            color: self.style.label_color.clone(),
            background: self.style.label_background.clone(),
            width_px: LABEL_RASTER_WIDTH,
            height_px: LABEL_RASTER_HEIGHT,
        });
        self.parts.label = Some(backend.create_drawable(&desc)?);
        Ok(())
    }

    /// Advance idle/hover/selection animation. `elapsed` is seconds since the
    /// scene started; called once per tick.
    pub fn animate(&mut self, elapsed: f32) {
        if !self.visible {
            return;
        }
        self.anim.float_offset = (elapsed * IDLE_FLOAT_RATE).sin() * IDLE_FLOAT_AMPLITUDE;
        self.anim.spin = (self.anim.spin + IDLE_SPIN_PER_TICK) % std::f32::consts::TAU;

        let target = if self.hovered { HOVER_SCALE } else { 1.0 };
        self.anim.scale += (target - self.anim.scale) * HOVER_LERP;
        self.anim.glow_opacity = if self.hovered {
            GLOW_OPACITY_HOVER
        } else {
            GLOW_OPACITY
        };

        self.anim.opacity = if self.selected {
            let pulse = ((elapsed * SELECT_PULSE_RATE).sin() + 1.0) * 0.5;
            self.style.opacity * (SELECT_PULSE_FLOOR + SELECT_PULSE_SPAN * pulse)
        } else {
            self.style.opacity
        };
    }

    pub fn hit_distance(&self, origin: Vec3, dir: Vec3) -> Option<f32> {
        if !self.visible {
            return None;
        }
        crate::core::input::ray_sphere(
            origin,
            dir,
            self.world_position(),
            self.style.size * self.anim.scale,
        )
    }

    pub fn push_draws(&self, eye: Vec3, out: &mut Vec<DrawCmd>) {
        if !self.visible {
            return;
        }
        let pos = self.world_position();
        let size = self.style.size * self.anim.scale;
        let spin = Quat::from_rotation_y(self.anim.spin);
        let emissive = if self.hovered {
            Vec3::splat(HOVER_EMISSIVE)
        } else {
            Vec3::ZERO
        };

        out.push(DrawCmd {
            resource: self.parts.marker,
            model: Mat4::from_scale_rotation_translation(Vec3::splat(size), spin, pos),
            color: rgb(self.style.color).extend(self.anim.opacity),
            emissive,
            layer: DrawLayer::Marker,
        });
        out.push(DrawCmd {
            resource: self.parts.glow,
            model: Mat4::from_scale_rotation_translation(
                Vec3::splat(size * GLOW_SCALE),
                spin,
                pos,
            ),
            color: rgb(self.style.glow_color).extend(self.anim.glow_opacity),
            emissive: Vec3::ZERO,
            layer: DrawLayer::Glow,
        });
        if let (true, Some(ring)) = (self.selected, self.parts.ring) {
            out.push(DrawCmd {
                resource: ring,
                model: billboard(pos, eye, size),
                color: Vec4::new(1.0, 1.0, 1.0, RING_OPACITY),
                emissive: Vec3::ZERO,
                layer: DrawLayer::Overlay,
            });
        }
        if let Some(label) = self.parts.label {
            let at = pos + Vec3::Y * (self.style.size + LABEL_OFFSET) * self.anim.scale;
            out.push(DrawCmd {
                resource: label,
                model: billboard(at, eye, self.anim.scale),
                color: Vec4::ONE,
                emissive: Vec3::ZERO,
                layer: DrawLayer::Overlay,
            });
        }
    }

    pub fn destroy<B: SceneBackend + ?Sized>(self, backend: &mut B) {
        for id in self.resources() {
            backend.release(id);
        }
        log::debug!("[hotspot] {} destroyed", self.id);
    }
}
