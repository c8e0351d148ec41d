// Shared geometry, picking, style and volume constants.

// Panorama surface
pub const PANORAMA_RADIUS: f32 = 500.0;
pub const PANORAMA_WIDTH_SEGMENTS: u32 = 60;
pub const PANORAMA_HEIGHT_SEGMENTS: u32 = 40;

// Camera
pub const CAMERA_FOV_DEGREES: f32 = 75.0;
pub const CAMERA_NEAR: f32 = 0.1;
pub const CAMERA_FAR: f32 = 1000.0;

// Orbit controls
pub const POLAR_EPSILON: f32 = 1e-6;
pub const ZOOM_STEP: f32 = 0.95; // dolly scale per wheel notch
pub const KEY_ROTATE_STEP: f32 = 0.08; // radians per arrow key press

// Hotspot meshes
pub const MARKER_SEGMENTS: u32 = 16;
pub const GLOW_SCALE: f32 = 1.5;
pub const GLOW_OPACITY: f32 = 0.3;
pub const GLOW_OPACITY_HOVER: f32 = 0.6;
pub const RING_INNER_SCALE: f32 = 1.5;
pub const RING_OUTER_SCALE: f32 = 1.8;
pub const RING_SEGMENTS: u32 = 32;
pub const RING_OPACITY: f32 = 0.8;
pub const LABEL_WIDTH: f32 = 8.0;
pub const LABEL_HEIGHT: f32 = 2.0;
pub const LABEL_OFFSET: f32 = 3.0; // above the marker's top
pub const LABEL_RASTER_WIDTH: u32 = 256;
pub const LABEL_RASTER_HEIGHT: u32 = 64;

// Hotspot animation
pub const IDLE_FLOAT_AMPLITUDE: f32 = 0.2;
pub const IDLE_FLOAT_RATE: f32 = 2.0;
pub const IDLE_SPIN_PER_TICK: f32 = 0.01;
pub const HOVER_SCALE: f32 = 1.2;
pub const HOVER_LERP: f32 = 0.1;
pub const HOVER_EMISSIVE: f32 = 0x44 as f32 / 255.0;
pub const SELECT_PULSE_RATE: f32 = 5.0;
pub const SELECT_PULSE_FLOOR: f32 = 0.7;
pub const SELECT_PULSE_SPAN: f32 = 0.3;

// Generated hotspot ids
pub const HOTSPOT_ID_LEN: usize = 9;

// Audio volume defaults
pub const DEFAULT_MASTER_VOLUME: f32 = 1.0;
pub const DEFAULT_MUSIC_VOLUME: f32 = 0.7;
pub const DEFAULT_EFFECTS_VOLUME: f32 = 0.8;
pub const DEFAULT_HOTSPOT_VOLUME: f32 = 1.0;
