use crate::core::error::SceneError;
use glam::{Mat4, Vec3, Vec4};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ResourceId(pub u32);

#[derive(Clone, Debug)]
pub struct PanoramaImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl PanoramaImage {
    pub fn decode(bytes: &[u8]) -> Result<Self, SceneError> {
        let img = image::load_from_memory(bytes).map_err(|e| SceneError::Decode(e.to_string()))?;
        let rgba = img.to_rgba8();
        let (width, height) = rgba.dimensions();
        if width == 0 || height == 0 {
            return Err(SceneError::Decode("empty image".into()));
        }
        Ok(Self {
            width,
            height,
            rgba: rgba.into_raw(),
        })
    }

    /// Downscale (keeping aspect) so neither side exceeds `max_dim`.
    pub fn fit_within(self, max_dim: u32) -> Result<Self, SceneError> {
        let max_dim = max_dim.max(1);
        if self.width <= max_dim && self.height <= max_dim {
            return Ok(self);
        }
        let scale = max_dim as f32 / self.width.max(self.height) as f32;
        let w = ((self.width as f32 * scale).round() as u32).clamp(1, max_dim);
        let h = ((self.height as f32 * scale).round() as u32).clamp(1, max_dim);
        let buf = image::RgbaImage::from_raw(self.width, self.height, self.rgba)
            .ok_or_else(|| SceneError::Decode("pixel buffer size mismatch".into()))?;
        let resized = image::imageops::resize(&buf, w, h, image::imageops::FilterType::Triangle);
        log::info!(
            "[scene] panorama downscaled {}x{} -> {}x{}",
            self.width,
            self.height,
            w,
            h
        );
        Ok(Self {
            width: w,
            height: h,
            rgba: resized.into_raw(),
        })
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LabelDesc {
    pub text: String,
    pub color: String,
    pub background: String,
    pub width_px: u32,
    pub height_px: u32,
}

#[derive(Clone, Debug, PartialEq)]
pub enum DrawableDesc {
    Marker,
    Glow,
    Ring,
    Label(LabelDesc),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum DrawLayer {
    Marker,
    Glow,
    Overlay,
}

#[derive(Clone, Copy, Debug)]
pub struct DrawCmd {
    pub resource: ResourceId,
    pub model: Mat4,
    pub color: Vec4,
    pub emissive: Vec3,
    pub layer: DrawLayer,
}

pub struct Frame<'a> {
    pub view_proj: Mat4,
    pub eye: Vec3,
    pub panorama: Option<ResourceId>,
    pub draws: &'a [DrawCmd],
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Cursor {
    Default,
    Pointer,
    Grabbing,
}

impl Cursor {
    pub fn css(self) -> &'static str {
        match self {
            Cursor::Default => "default",
            Cursor::Pointer => "pointer",
            Cursor::Grabbing => "grabbing",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ScreenshotOptions {
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub format: String,
    pub quality: f64,
}

impl Default for ScreenshotOptions {
    fn default() -> Self {
        Self {
            width: None,
            height: None,
            format: "image/png".to_string(),
            quality: 1.0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Screenshot {
    pub data_url: String,
    pub width: u32,
    pub height: u32,
    pub format: String,
    pub quality: f64,
}

pub trait SceneBackend {
    /// Upload an equirectangular image and build the inward-facing sphere.
    fn create_panorama(&mut self, image: &PanoramaImage) -> Result<ResourceId, SceneError>;
    fn create_drawable(&mut self, desc: &DrawableDesc) -> Result<ResourceId, SceneError>;
    fn release(&mut self, id: ResourceId);
    fn resize(&mut self, width: u32, height: u32);
    fn render(&mut self, frame: &Frame<'_>) -> Result<(), SceneError>;
    /// Read back the most recently rendered frame as a data URL.
    fn capture(&mut self, options: &ScreenshotOptions) -> Result<String, SceneError>;
    fn max_texture_dimension(&self) -> u32 {
        8192
    }
    fn set_cursor(&mut self, _cursor: Cursor) {}
    fn set_tooltip(&mut self, _text: Option<&str>) {}
    fn open_url(&mut self, url: &str, target: &str);
    fn shutdown(&mut self);
}
