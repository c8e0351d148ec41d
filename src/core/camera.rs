use crate::core::constants::*;
use crate::core::input::{screen_to_ndc, PointerButton, Ray};
use glam::{Mat4, Vec2, Vec3, Vec4};
use std::f32::consts::{PI, TAU};

#[derive(Clone, Debug)]
pub struct Camera {
    pub eye: Vec3,
    pub target: Vec3,
    pub up: Vec3,
    pub aspect: f32,
    pub fovy_radians: f32,
    pub znear: f32,
    pub zfar: f32,
}

impl Camera {
    pub fn new(eye: Vec3, target: Vec3, aspect: f32) -> Self {
        Self {
            eye,
            target,
            up: Vec3::Y,
            aspect,
            fovy_radians: CAMERA_FOV_DEGREES.to_radians(),
            znear: CAMERA_NEAR,
            zfar: CAMERA_FAR,
        }
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(self.fovy_radians, self.aspect, self.znear, self.zfar)
    }
    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.eye, self.target, self.up)
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }

    pub fn set_viewport(&mut self, width: u32, height: u32) {
        self.aspect = width.max(1) as f32 / height.max(1) as f32;
    }

    /// World-space ray from the eye through normalized device coordinates.
    pub fn ray_from_ndc(&self, ndc: Vec2) -> Ray {
        let inv = self.view_projection().inverse();
        let p_far = inv * Vec4::new(ndc.x, ndc.y, 1.0, 1.0);
        let p1: Vec3 = p_far.truncate() / p_far.w;
        Ray::new(self.eye, p1 - self.eye)
    }

    pub fn ray_from_screen(&self, px: Vec2, width: u32, height: u32) -> Ray {
        self.ray_from_ndc(screen_to_ndc(px, width as f32, height as f32))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Gesture {
    Idle,
    Rotate,
    Pan,
}

#[derive(Clone, Copy, Debug)]
struct SavedView {
    target: Vec3,
    position: Vec3,
}

#[derive(Clone, Copy, Debug)]
pub struct ControlsConfig {
    pub enable_zoom: bool,
    pub enable_pan: bool,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub auto_rotate: bool,
    pub auto_rotate_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

pub struct OrbitControls {
    pub enabled: bool,
    pub enable_zoom: bool,
    pub enable_pan: bool,
    pub enable_damping: bool,
    pub damping_factor: f32,
    pub auto_rotate: bool,
    pub auto_rotate_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
    pub min_polar_angle: f32,
    pub max_polar_angle: f32,
    pub rotate_speed: f32,

    target: Vec3,
    position: Vec3,
    delta_theta: f32,
    delta_phi: f32,
    scale: f32,
    pan_offset: Vec3,
    gesture: Gesture,
    last_pointer: Vec2,
    saved: SavedView,
}

impl OrbitControls {
    pub fn new(position: Vec3, target: Vec3, config: ControlsConfig) -> Self {
        Self {
            enabled: true,
            enable_zoom: config.enable_zoom,
            enable_pan: config.enable_pan,
            enable_damping: config.enable_damping,
            damping_factor: config.damping_factor,
            auto_rotate: config.auto_rotate,
            auto_rotate_speed: config.auto_rotate_speed,
            min_distance: config.min_distance,
            max_distance: config.max_distance,
            min_polar_angle: 0.0,
            max_polar_angle: PI,
            rotate_speed: 1.0,
            target,
            position,
            delta_theta: 0.0,
            delta_phi: 0.0,
            scale: 1.0,
            pan_offset: Vec3::ZERO,
            gesture: Gesture::Idle,
            last_pointer: Vec2::ZERO,
            saved: SavedView { target, position },
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    pub fn distance(&self) -> f32 {
        (self.position - self.target).length()
    }

    pub fn is_interacting(&self) -> bool {
        self.gesture != Gesture::Idle
    }

    pub fn rotate_left(&mut self, angle: f32) {
        self.delta_theta -= angle;
    }

    pub fn rotate_up(&mut self, angle: f32) {
        self.delta_phi -= angle;
    }

    pub fn zoom(&mut self, factor: f32) {
        if !self.enabled || !self.enable_zoom || factor <= 0.0 {
            return;
        }
        self.scale *= factor;
    }

    pub fn wheel(&mut self, delta_y: f32) {
        if delta_y < 0.0 {
            self.zoom(ZOOM_STEP);
        } else if delta_y > 0.0 {
            self.zoom(1.0 / ZOOM_STEP);
        }
    }

    pub fn pan(&mut self, dx: f32, dy: f32, camera: &Camera, viewport_height: u32) {
        let h = viewport_height.max(1) as f32;
        let distance = self.distance() * (camera.fovy_radians * 0.5).tan();
        let view = camera.view_matrix().inverse();
        let right = view.x_axis.truncate();
        let up = view.y_axis.truncate();
        self.pan_offset += right * (-2.0 * dx * distance / h) + up * (2.0 * dy * distance / h);
    }

    /// Begin a gesture. Returns true when the controls took the pointer.
    pub fn pointer_down(&mut self, button: PointerButton, at: Vec2) -> bool {
        if !self.enabled {
            return false;
        }
        self.gesture = match button {
            PointerButton::Primary => Gesture::Rotate,
            PointerButton::Secondary if self.enable_pan => Gesture::Pan,
            _ => Gesture::Idle,
        };
        self.last_pointer = at;
        self.gesture != Gesture::Idle
    }

    pub fn pointer_move(&mut self, at: Vec2, camera: &Camera, viewport_height: u32) {
        if !self.enabled {
            return;
        }
        let delta = at - self.last_pointer;
        self.last_pointer = at;
        let h = viewport_height.max(1) as f32;
        match self.gesture {
            Gesture::Rotate => {
                self.rotate_left(TAU * delta.x / h * self.rotate_speed);
                self.rotate_up(TAU * delta.y / h * self.rotate_speed);
            }
            Gesture::Pan => self.pan(delta.x, delta.y, camera, viewport_height),
            Gesture::Idle => {}
        }
    }

    pub fn pointer_up(&mut self) {
        self.gesture = Gesture::Idle;
    }

    pub fn cancel(&mut self) {
        self.gesture = Gesture::Idle;
        self.delta_theta = 0.0;
        self.delta_phi = 0.0;
        self.pan_offset = Vec3::ZERO;
        self.scale = 1.0;
    }

    pub fn save_state(&mut self) {
        self.saved = SavedView {
            target: self.target,
            position: self.position,
        };
    }

    pub fn reset(&mut self) {
        self.target = self.saved.target;
        self.position = self.saved.position;
        self.cancel();
    }

    /// Apply accumulated input. Returns true when the camera moved.
    pub fn update(&mut self, dt_sec: f32) -> bool {
        let before = self.position;
        let before_target = self.target;

        if self.enabled && self.auto_rotate && self.gesture == Gesture::Idle {
            self.rotate_left(TAU / 60.0 * self.auto_rotate_speed * dt_sec.max(0.0));
        }

        let offset = self.position - self.target;
        let mut radius = offset.length();
        let (mut theta, mut phi) = if radius > 0.0 {
            (
                offset.x.atan2(offset.z),
                (offset.y / radius).clamp(-1.0, 1.0).acos(),
            )
        } else {
            (0.0, PI * 0.5)
        };

        let k = if self.enable_damping {
            self.damping_factor
        } else {
            1.0
        };
        theta += self.delta_theta * k;
        phi += self.delta_phi * k;
        let min_phi = self.min_polar_angle.max(POLAR_EPSILON);
        let max_phi = self.max_polar_angle.min(PI - POLAR_EPSILON);
        phi = phi.clamp(min_phi, max_phi);

        radius = (radius * self.scale).clamp(self.min_distance, self.max_distance);
        self.target += self.pan_offset * k;

        let sin_phi = phi.sin();
        self.position = self.target
            + Vec3::new(
                radius * sin_phi * theta.sin(),
                radius * phi.cos(),
                radius * sin_phi * theta.cos(),
            );

        if self.enable_damping {
            self.delta_theta *= 1.0 - self.damping_factor;
            self.delta_phi *= 1.0 - self.damping_factor;
            self.pan_offset *= 1.0 - self.damping_factor;
        } else {
            self.delta_theta = 0.0;
            self.delta_phi = 0.0;
            self.pan_offset = Vec3::ZERO;
        }
        self.scale = 1.0;

        before.distance_squared(self.position) > 1e-6 || before_target.distance_squared(self.target) > 1e-6
    }
}
