use glam::{Vec2, Vec3};

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Ray {
    pub origin: Vec3,
    pub dir: Vec3,
}

impl Ray {
    pub fn new(origin: Vec3, dir: Vec3) -> Self {
        Self {
            origin,
            dir: dir.normalize_or_zero(),
        }
    }

    #[inline]
    pub fn at(&self, t: f32) -> Vec3 {
        self.origin + self.dir * t
    }
}

/// Distance along a normalized ray to the nearest non-negative intersection
/// with a sphere. When the origin is inside the sphere this is the exit point.
#[inline]
pub fn ray_sphere(ray_origin: Vec3, ray_dir: Vec3, center: Vec3, radius: f32) -> Option<f32> {
    let oc = ray_origin - center;
    let b = oc.dot(ray_dir);
    let c = oc.dot(oc) - radius * radius;
    let disc = b * b - c;
    if disc < 0.0 {
        return None;
    }
    let sq = disc.sqrt();
    let near = -b - sq;
    if near >= 0.0 {
        return Some(near);
    }
    let far = -b + sq;
    (far >= 0.0).then_some(far)
}

#[inline]
pub fn screen_to_ndc(px: Vec2, width: f32, height: f32) -> Vec2 {
    let w = width.max(1.0);
    let h = height.max(1.0);
    Vec2::new((px.x / w) * 2.0 - 1.0, 1.0 - (px.y / h) * 2.0)
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PointerButton {
    Primary,
    Middle,
    Secondary,
    Other,
}

impl PointerButton {
    pub fn from_dom(button: i16) -> Self {
        match button {
            0 => PointerButton::Primary,
            1 => PointerButton::Middle,
            2 => PointerButton::Secondary,
            _ => PointerButton::Other,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum KeyAction {
    Orbit { left: f32, up: f32 },
    Zoom { scale: f32 },
    ToggleFullscreen,
    ExitFullscreen,
    ResetView,
    ToggleAutoRotate,
}

#[inline]
pub fn key_action(key: &str, rotate_step: f32, zoom_step: f32) -> Option<KeyAction> {
    match key {
        "ArrowLeft" => Some(KeyAction::Orbit {
            left: rotate_step,
            up: 0.0,
        }),
        "ArrowRight" => Some(KeyAction::Orbit {
            left: -rotate_step,
            up: 0.0,
        }),
        "ArrowUp" => Some(KeyAction::Orbit {
            left: 0.0,
            up: rotate_step,
        }),
        "ArrowDown" => Some(KeyAction::Orbit {
            left: 0.0,
            up: -rotate_step,
        }),
        "+" | "=" => Some(KeyAction::Zoom { scale: zoom_step }),
        "-" | "_" => Some(KeyAction::Zoom {
            scale: 1.0 / zoom_step,
        }),
        "Enter" => Some(KeyAction::ToggleFullscreen),
        "Escape" => Some(KeyAction::ExitFullscreen),
        "r" | "R" => Some(KeyAction::ResetView),
        " " => Some(KeyAction::ToggleAutoRotate),
        _ => None,
    }
}
