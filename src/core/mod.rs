pub mod audio;
pub mod backend;
pub mod camera;
pub mod constants;
pub mod error;
pub mod events;
pub mod geometry;
pub mod hotspot;
pub mod input;
pub mod scene;

use std::future::Future;
use std::pin::Pin;

/// Boxed future that need not be `Send` (the browser is single-threaded).
pub type LocalFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

// Shaders bundled as string constants
pub static PANORAMA_WGSL: &str = include_str!("../../shaders/panorama.wgsl");
pub static OBJECT_WGSL: &str = include_str!("../../shaders/object.wgsl");
