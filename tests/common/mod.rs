// Recording test doubles for the platform seams.

#![allow(dead_code)]

use panovr::core::audio::AudioBackend;
use panovr::core::backend::{Cursor, DrawableDesc, Frame, PanoramaImage, ResourceId, SceneBackend, ScreenshotOptions};
use panovr::core::error::{AudioError, SceneError};
use panovr::core::events::{EventBus, NamedEvent};
use panovr::core::scene::ImageFetcher;
use panovr::core::LocalFuture;
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::rc::Rc;

#[derive(Clone, Debug, PartialEq)]
pub enum Kind {
    Panorama { width: u32, height: u32 },
    Drawable(DrawableDesc),
}

#[derive(Default)]
pub struct RecordingBackend {
    pub live: BTreeMap<ResourceId, Kind>,
    next: u32,
    pub released: Vec<ResourceId>,
    pub opened: Vec<(String, String)>,
    pub cursor: Option<Cursor>,
    pub tooltip: Option<String>,
    pub renders: usize,
    pub last_draws: usize,
    pub last_panorama: Option<ResourceId>,
    pub viewport: (u32, u32),
    pub fail_capture: bool,
    pub fail_panorama: bool,
    pub max_texture: Option<u32>,
    pub shutdowns: usize,
}

impl RecordingBackend {
    fn insert(&mut self, kind: Kind) -> ResourceId {
        self.next += 1;
        let id = ResourceId(self.next);
        self.live.insert(id, kind);
        id
    }

    pub fn panoramas(&self) -> usize {
        self.live
            .values()
            .filter(|k| matches!(k, Kind::Panorama { .. }))
            .count()
    }

    pub fn drawables(&self) -> usize {
        self.live.len() - self.panoramas()
    }

    pub fn labels(&self) -> usize {
        self.live
            .values()
            .filter(|k| matches!(k, Kind::Drawable(DrawableDesc::Label(_))))
            .count()
    }
}

impl SceneBackend for RecordingBackend {
    fn create_panorama(&mut self, image: &PanoramaImage) -> Result<ResourceId, SceneError> {
        if self.fail_panorama {
            return Err(SceneError::Gpu("texture upload failed".into()));
        }
        Ok(self.insert(Kind::Panorama {
            width: image.width,
            height: image.height,
        }))
    }

    fn create_drawable(&mut self, desc: &DrawableDesc) -> Result<ResourceId, SceneError> {
        Ok(self.insert(Kind::Drawable(desc.clone())))
    }

    fn release(&mut self, id: ResourceId) {
        if self.live.remove(&id).is_some() {
            self.released.push(id);
        }
    }

    fn resize(&mut self, width: u32, height: u32) {
        self.viewport = (width, height);
    }

    fn render(&mut self, frame: &Frame<'_>) -> Result<(), SceneError> {
        self.renders += 1;
        self.last_draws = frame.draws.len();
        self.last_panorama = frame.panorama;
        Ok(())
    }

    fn capture(&mut self, options: &ScreenshotOptions) -> Result<String, SceneError> {
        if self.fail_capture {
            return Err(SceneError::ContextLost);
        }
        Ok(format!("data:{};base64,AAAA", options.format))
    }

    fn max_texture_dimension(&self) -> u32 {
        self.max_texture.unwrap_or(8192)
    }

    fn set_cursor(&mut self, cursor: Cursor) {
        self.cursor = Some(cursor);
    }

    fn set_tooltip(&mut self, text: Option<&str>) {
        self.tooltip = text.map(str::to_string);
    }

    fn open_url(&mut self, url: &str, target: &str) {
        self.opened.push((url.to_string(), target.to_string()));
    }

    fn shutdown(&mut self) {
        self.shutdowns += 1;
    }
}

/// Audio double. Sources and gains are plain integers; `output(source)` is
/// what a listener would hear relative to full scale.
#[derive(Default)]
pub struct RecordingAudio {
    pub next: u32,
    pub master: Option<u32>,
    pub element_volume: HashMap<u32, f32>,
    pub gains: HashMap<u32, f32>,
    pub routes: HashMap<u32, u32>,
    pub playing: HashSet<u32>,
    pub positions: HashMap<u32, f64>,
    pub urls: HashMap<u32, String>,
    pub released: Vec<u32>,
    pub plays: usize,
    pub fail_graph: bool,
    pub fail_routing: bool,
    pub fail_play: bool,
    pub fail_urls: HashSet<String>,
    pub suspended: bool,
    pub resumes: usize,
    pub closed: bool,
}

impl RecordingAudio {
    fn id(&mut self) -> u32 {
        self.next += 1;
        self.next
    }

    pub fn output(&self, source: u32) -> f32 {
        let element = self.element_volume.get(&source).copied().unwrap_or(1.0);
        // Unrouted elements play straight to the speakers
        let Some(channel) = self.routes.get(&source).and_then(|g| self.gains.get(g)) else {
            return element;
        };
        let master = self
            .master
            .and_then(|m| self.gains.get(&m))
            .copied()
            .unwrap_or(1.0);
        element * channel * master
    }

    pub fn source_for(&self, url: &str) -> Option<u32> {
        self.urls
            .iter()
            .filter(|(s, u)| u.as_str() == url && !self.released.contains(s))
            .map(|(s, _)| *s)
            .max()
    }

    pub fn live_sources(&self) -> usize {
        self.urls.len() - self.released.len()
    }
}

impl AudioBackend for RecordingAudio {
    type Source = u32;
    type Gain = u32;

    fn create_graph(&mut self) -> Result<u32, AudioError> {
        if self.fail_graph {
            return Err(AudioError::GraphUnavailable("no audio device".into()));
        }
        let id = self.id();
        self.gains.insert(id, 1.0);
        self.master = Some(id);
        Ok(id)
    }

    fn is_suspended(&self) -> bool {
        self.suspended
    }

    fn resume(&mut self) -> LocalFuture<'static, Result<(), AudioError>> {
        self.suspended = false;
        self.resumes += 1;
        Box::pin(std::future::ready(Ok(())))
    }

    fn load(&mut self, url: &str, _looped: bool) -> LocalFuture<'static, Result<u32, AudioError>> {
        let result = if self.fail_urls.contains(url) {
            Err(AudioError::Load {
                url: url.to_string(),
                reason: "404".into(),
            })
        } else {
            let id = self.id();
            self.urls.insert(id, url.to_string());
            Ok(id)
        };
        Box::pin(std::future::ready(result))
    }

    fn route(&mut self, source: &u32, _master: &u32) -> Result<u32, AudioError> {
        if self.fail_routing {
            return Err(AudioError::Routing("media source refused".into()));
        }
        let gain = self.id();
        self.gains.insert(gain, 1.0);
        self.routes.insert(*source, gain);
        Ok(gain)
    }

    fn set_gain(&mut self, gain: &u32, value: f32) {
        self.gains.insert(*gain, value);
    }

    fn set_volume(&mut self, source: &u32, value: f32) {
        self.element_volume.insert(*source, value);
    }

    fn play(&mut self, source: &u32) -> LocalFuture<'static, Result<(), AudioError>> {
        self.plays += 1;
        let result = if self.fail_play {
            Err(AudioError::Play("autoplay blocked".into()))
        } else {
            self.playing.insert(*source);
            Ok(())
        };
        Box::pin(std::future::ready(result))
    }

    fn pause(&mut self, source: &u32) {
        self.playing.remove(source);
    }

    fn rewind(&mut self, source: &u32) {
        self.positions.insert(*source, 0.0);
    }

    fn current_time(&self, source: &u32) -> f64 {
        self.positions.get(source).copied().unwrap_or(0.0)
    }

    fn duration(&self, _source: &u32) -> f64 {
        30.0
    }

    fn release(&mut self, source: u32, gain: Option<u32>) {
        self.playing.remove(&source);
        self.released.push(source);
        if let Some(g) = gain {
            self.gains.remove(&g);
        }
    }

    fn close(&mut self) {
        self.closed = true;
    }
}

/// Collects every event name dispatched on a bus.
pub fn record_names<E: NamedEvent + 'static>(bus: &EventBus<E>, names: &[&str]) -> Rc<RefCell<Vec<String>>> {
    let log = Rc::new(RefCell::new(Vec::new()));
    for name in names {
        let log = log.clone();
        bus.on(name, move |ev: &E| {
            log.borrow_mut().push(ev.name().to_string());
            Ok(())
        });
    }
    log
}

/// Small PNG for panorama loads.
pub fn png_bytes(width: u32, height: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(width, height, image::Rgba([40, 80, 160, 255]));
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageOutputFormat::Png)
        .expect("encode png");
    out.into_inner()
}

/// Serves canned bytes per url; anything else fails like a 404.
#[derive(Default)]
pub struct MapFetcher {
    pub files: HashMap<String, Vec<u8>>,
}

impl MapFetcher {
    pub fn with(url: &str, bytes: Vec<u8>) -> Self {
        let mut files = HashMap::new();
        files.insert(url.to_string(), bytes);
        Self { files }
    }
}

impl ImageFetcher for MapFetcher {
    fn fetch(
        &self,
        url: &str,
        mut progress: Box<dyn FnMut(u64, u64)>,
    ) -> LocalFuture<'static, Result<Vec<u8>, SceneError>> {
        let result = match self.files.get(url) {
            Some(bytes) => {
                let total = bytes.len() as u64;
                progress(total / 2, total);
                progress(total, total);
                Ok(bytes.clone())
            }
            None => Err(SceneError::Fetch {
                url: url.to_string(),
                reason: "HTTP 404".into(),
            }),
        };
        Box::pin(std::future::ready(result))
    }
}
