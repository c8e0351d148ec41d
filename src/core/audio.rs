use crate::core::constants::*;
use crate::core::error::AudioError;
use crate::core::events::{EventBus, NamedEvent};
use crate::core::LocalFuture;
use fnv::FnvHashMap;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::rc::Rc;

pub trait AudioBackend {
    type Source: Clone + 'static;
    type Gain: Clone + 'static;

    /// Create the audio context and master gain.
    fn create_graph(&mut self) -> Result<Self::Gain, AudioError>;
    fn is_suspended(&self) -> bool;
    fn resume(&mut self) -> LocalFuture<'static, Result<(), AudioError>>;
    fn load(&mut self, url: &str, looped: bool) -> LocalFuture<'static, Result<Self::Source, AudioError>>;
    /// Connect `source` through a fresh gain node into `master`.
    fn route(&mut self, source: &Self::Source, master: &Self::Gain) -> Result<Self::Gain, AudioError>;
    fn set_gain(&mut self, gain: &Self::Gain, value: f32);
    fn set_volume(&mut self, source: &Self::Source, value: f32);
    fn play(&mut self, source: &Self::Source) -> LocalFuture<'static, Result<(), AudioError>>;
    fn pause(&mut self, source: &Self::Source);
    fn rewind(&mut self, source: &Self::Source);
    fn current_time(&self, source: &Self::Source) -> f64;
    fn duration(&self, source: &Self::Source) -> f64;
    /// Detach and unload a source and its gain node.
    fn release(&mut self, source: Self::Source, gain: Option<Self::Gain>);
    fn close(&mut self);
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct VolumeHierarchy {
    pub master: f32,
    pub music: f32,
    pub effects: f32,
    pub muted: bool,
}

impl Default for VolumeHierarchy {
    fn default() -> Self {
        Self {
            master: DEFAULT_MASTER_VOLUME,
            music: DEFAULT_MUSIC_VOLUME,
            effects: DEFAULT_EFFECTS_VOLUME,
            muted: false,
        }
    }
}

pub fn clamp_volume(v: f32) -> f32 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

impl VolumeHierarchy {
    pub fn master_gain(&self) -> f32 {
        if self.muted {
            0.0
        } else {
            self.master
        }
    }

    pub fn effective(&self, level: f32) -> f32 {
        level * self.master_gain()
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AudioSettings {
    pub master_volume: f32,
    pub music_volume: f32,
    pub effects_volume: f32,
    pub muted: bool,
}

impl Default for AudioSettings {
    fn default() -> Self {
        let v = VolumeHierarchy::default();
        Self {
            master_volume: v.master,
            music_volume: v.music,
            effects_volume: v.effects,
            muted: v.muted,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MusicOptions {
    #[serde(rename = "loop")]
    pub looped: bool,
    pub auto_play: bool,
    pub volume: Option<f32>,
}

impl Default for MusicOptions {
    fn default() -> Self {
        Self {
            looped: true,
            auto_play: false,
            volume: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HotspotAudioOptions {
    #[serde(rename = "loop")]
    pub looped: bool,
    pub volume: f32,
}

impl Default for HotspotAudioOptions {
    fn default() -> Self {
        Self {
            looped: false,
            volume: DEFAULT_HOTSPOT_VOLUME,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EffectPlayOptions {
    pub volume: Option<f32>,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum AudioEvent {
    Initialized,
    Error { message: String },
    ContextResumed,
    MusicLoadStart { url: String },
    MusicLoaded { url: String, #[serde(rename = "loop")] looped: bool, duration: f64 },
    MusicLoadError { url: String, message: String },
    MusicPlay,
    MusicPause,
    MusicStop,
    MusicPlayError { message: String },
    MusicVolumeChange { volume: f32 },
    EffectLoaded { id: String, url: String },
    EffectLoadError { id: String, message: String },
    EffectPlay { id: String, volume: Option<f32> },
    EffectPlayError { id: String, message: String },
    EffectsVolumeChange { volume: f32 },
    HotspotAudioCreated { hotspot_id: String, url: String },
    HotspotAudioError { hotspot_id: String, message: String },
    HotspotAudioPlay { hotspot_id: String },
    HotspotAudioPlayError { hotspot_id: String, message: String },
    HotspotAudioStop { hotspot_id: String },
    MasterVolumeChange { volume: f32 },
    MuteToggle { muted: bool },
    AllStopped,
    AllPaused,
    Destroyed,
}

impl NamedEvent for AudioEvent {
    fn name(&self) -> &'static str {
        match self {
            AudioEvent::Initialized => "initialized",
            AudioEvent::Error { .. } => "error",
            AudioEvent::ContextResumed => "contextResumed",
            AudioEvent::MusicLoadStart { .. } => "musicLoadStart",
            AudioEvent::MusicLoaded { .. } => "musicLoaded",
            AudioEvent::MusicLoadError { .. } => "musicLoadError",
            AudioEvent::MusicPlay => "musicPlay",
            AudioEvent::MusicPause => "musicPause",
            AudioEvent::MusicStop => "musicStop",
            AudioEvent::MusicPlayError { .. } => "musicPlayError",
            AudioEvent::MusicVolumeChange { .. } => "musicVolumeChange",
            AudioEvent::EffectLoaded { .. } => "effectLoaded",
            AudioEvent::EffectLoadError { .. } => "effectLoadError",
            AudioEvent::EffectPlay { .. } => "effectPlay",
            AudioEvent::EffectPlayError { .. } => "effectPlayError",
            AudioEvent::EffectsVolumeChange { .. } => "effectsVolumeChange",
            AudioEvent::HotspotAudioCreated { .. } => "hotspotAudioCreated",
            AudioEvent::HotspotAudioError { .. } => "hotspotAudioError",
            AudioEvent::HotspotAudioPlay { .. } => "hotspotAudioPlay",
            AudioEvent::HotspotAudioPlayError { .. } => "hotspotAudioPlayError",
            AudioEvent::HotspotAudioStop { .. } => "hotspotAudioStop",
            AudioEvent::MasterVolumeChange { .. } => "masterVolumeChange",
            AudioEvent::MuteToggle { .. } => "muteToggle",
            AudioEvent::AllStopped => "allStopped",
            AudioEvent::AllPaused => "allPaused",
            AudioEvent::Destroyed => "destroyed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MusicStatus {
    pub url: String,
    pub playing: bool,
    pub current_time: f64,
    pub duration: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HotspotAudioStatus {
    pub id: String,
    pub url: String,
    pub playing: bool,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AudioStatus {
    pub initialized: bool,
    pub muted: bool,
    pub master_volume: f32,
    pub music_volume: f32,
    pub effects_volume: f32,
    pub background_music: Option<MusicStatus>,
    pub hotspot_audios: Vec<HotspotAudioStatus>,
}

#[derive(Clone, Copy, Debug, PartialEq)]
enum Level {
    Music,
    /// Effects bus unless a play call set an explicit volume.
    Effect(Option<f32>),
    Own(f32),
}

impl Level {
    fn resolve(self, volumes: &VolumeHierarchy) -> f32 {
        match self {
            Level::Music => volumes.music,
            Level::Effect(v) => v.unwrap_or(volumes.effects),
            Level::Own(v) => v,
        }
    }
}

struct Channel<B: AudioBackend> {
    source: B::Source,
    gain: Option<B::Gain>,
    url: String,
    looped: bool,
    level: Level,
    playing: bool,
}

struct Music<B: AudioBackend> {
    channel: Channel<B>,
    options: MusicOptions,
    generation: u64,
}

#[derive(Clone, Debug, PartialEq)]
pub struct MusicTicket {
    generation: u64,
    url: String,
    options: MusicOptions,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MusicLoad {
    Loaded,
    /// A newer music load started first; this one was discarded.
    Superseded,
    /// The bus was destroyed while the load was pending.
    Cancelled,
}

pub struct AudioBusManager<B: AudioBackend> {
    backend: B,
    events: Rc<EventBus<AudioEvent>>,
    master: Option<B::Gain>,
    volumes: VolumeHierarchy,
    music: Option<Music<B>>,
    music_generation: u64,
    effects: FnvHashMap<String, Channel<B>>,
    hotspots: FnvHashMap<String, Channel<B>>,
    destroyed: bool,
}

impl<B: AudioBackend> AudioBusManager<B> {
    pub fn new(backend: B, settings: AudioSettings, events: Rc<EventBus<AudioEvent>>) -> Self {
        let mut manager = Self {
            backend,
            events,
            master: None,
            volumes: VolumeHierarchy {
                master: clamp_volume(settings.master_volume),
                music: clamp_volume(settings.music_volume),
                effects: clamp_volume(settings.effects_volume),
                muted: settings.muted,
            },
            music: None,
            music_generation: 0,
            effects: FnvHashMap::default(),
            hotspots: FnvHashMap::default(),
            destroyed: false,
        };
        manager.init();
        manager
    }

    fn init(&mut self) {
        match self.backend.create_graph() {
            Ok(master) => {
                self.backend.set_gain(&master, self.volumes.master_gain());
                self.master = Some(master);
                log::info!("[audio] graph ready");
                self.emit(AudioEvent::Initialized);
            }
            Err(e) => {
                log::warn!("[audio] {}; falling back to element volume", e);
                self.emit(AudioEvent::Error {
                    message: e.to_string(),
                });
            }
        }
    }

    fn emit(&self, event: AudioEvent) {
        self.events.emit(event);
    }

    fn ensure_live(&self) -> Result<(), AudioError> {
        if self.destroyed {
            Err(AudioError::Destroyed)
        } else {
            Ok(())
        }
    }

    pub fn events(&self) -> &Rc<EventBus<AudioEvent>> {
        &self.events
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn volumes(&self) -> VolumeHierarchy {
        self.volumes
    }

    pub fn is_initialized(&self) -> bool {
        self.master.is_some()
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    pub fn has_music(&self) -> bool {
        self.music.is_some()
    }

    pub fn is_music_playing(&self) -> bool {
        self.music.as_ref().is_some_and(|m| m.channel.playing)
    }

    pub fn has_effect(&self, id: &str) -> bool {
        self.effects.contains_key(id)
    }

    pub fn has_hotspot_audio(&self, id: &str) -> bool {
        self.hotspots.contains_key(id)
    }

    /// True when the hotspot's channel was built from this url and options.
    pub fn hotspot_audio_matches(&self, id: &str, url: &str, options: &HotspotAudioOptions) -> bool {
        self.hotspots.get(id).is_some_and(|c| {
            c.url == url && c.looped == options.looped && c.level == Level::Own(clamp_volume(options.volume))
        })
    }

    pub fn is_hotspot_playing(&self, id: &str) -> bool {
        self.hotspots.get(id).is_some_and(|c| c.playing)
    }

    // ---- volume propagation ----

    fn apply(backend: &mut B, volumes: &VolumeHierarchy, channel: &Channel<B>, level: f32) {
        match &channel.gain {
            Some(gain) => {
                backend.set_gain(gain, level);
                backend.set_volume(&channel.source, 1.0);
            }
            None => backend.set_volume(&channel.source, volumes.effective(level)),
        }
    }

    fn propagate(&mut self) {
        if let Some(master) = &self.master {
            self.backend.set_gain(master, self.volumes.master_gain());
        }
        let volumes = self.volumes;
        let channels = self
            .music
            .iter()
            .map(|m| &m.channel)
            .chain(self.effects.values())
            .chain(self.hotspots.values());
        for ch in channels {
            Self::apply(&mut self.backend, &volumes, ch, ch.level.resolve(&volumes));
        }
    }

    fn make_channel(
        &mut self,
        source: B::Source,
        url: &str,
        looped: bool,
        level: Level,
        what: &str,
    ) -> Channel<B> {
        let gain = match &self.master {
            Some(master) => match self.backend.route(&source, master) {
                Ok(g) => Some(g),
                Err(e) => {
                    log::warn!("[audio] {} routing failed, using element volume: {}", what, e);
                    None
                }
            },
            None => None,
        };
        let channel = Channel {
            source,
            gain,
            url: url.to_string(),
            looped,
            level,
            playing: false,
        };
        Self::apply(
            &mut self.backend,
            &self.volumes,
            &channel,
            level.resolve(&self.volumes),
        );
        channel
    }

    fn release_channel(&mut self, channel: Channel<B>) {
        self.backend.pause(&channel.source);
        self.backend.release(channel.source, channel.gain);
    }

    pub fn set_master_volume(&mut self, volume: f32) {
        if self.destroyed {
            return;
        }
        self.volumes.master = clamp_volume(volume);
        self.propagate();
        self.emit(AudioEvent::MasterVolumeChange {
            volume: self.volumes.master,
        });
    }

    pub fn set_music_volume(&mut self, volume: f32) {
        if self.destroyed {
            return;
        }
        self.volumes.music = clamp_volume(volume);
        self.propagate();
        self.emit(AudioEvent::MusicVolumeChange {
            volume: self.volumes.music,
        });
    }

    pub fn set_effects_volume(&mut self, volume: f32) {
        if self.destroyed {
            return;
        }
        self.volumes.effects = clamp_volume(volume);
        self.propagate();
        self.emit(AudioEvent::EffectsVolumeChange {
            volume: self.volumes.effects,
        });
    }

    pub fn toggle_mute(&mut self) -> bool {
        if self.destroyed {
            return self.volumes.muted;
        }
        self.volumes.muted = !self.volumes.muted;
        self.propagate();
        self.emit(AudioEvent::MuteToggle {
            muted: self.volumes.muted,
        });
        self.volumes.muted
    }

    // ---- context ----

    pub fn begin_resume(&mut self) -> Option<LocalFuture<'static, Result<(), AudioError>>> {
        if self.destroyed || self.master.is_none() || !self.backend.is_suspended() {
            return None;
        }
        Some(self.backend.resume())
    }

    pub fn finish_resume(&mut self, result: Result<(), AudioError>) -> Result<(), AudioError> {
        match result {
            Ok(()) => {
                log::info!("[audio] context resumed");
                self.emit(AudioEvent::ContextResumed);
                Ok(())
            }
            Err(e) => {
                log::error!("[audio] {}", e);
                Err(e)
            }
        }
    }

    // ---- background music ----

    pub fn begin_music_load(
        &mut self,
        url: &str,
        options: MusicOptions,
    ) -> Result<(MusicTicket, LocalFuture<'static, Result<B::Source, AudioError>>), AudioError> {
        self.ensure_live()?;
        self.emit(AudioEvent::MusicLoadStart {
            url: url.to_string(),
        });
        if self.music.is_some() {
            self.stop_background_music();
        }
        if let Some(old) = self.music.take() {
            self.release_channel(old.channel);
        }
        self.music_generation += 1;
        let future = self.backend.load(url, options.looped);
        Ok((
            MusicTicket {
                generation: self.music_generation,
                url: url.to_string(),
                options,
            },
            future,
        ))
    }

    pub fn install_music(
        &mut self,
        ticket: MusicTicket,
        loaded: Result<B::Source, AudioError>,
    ) -> Result<MusicLoad, AudioError> {
        if self.destroyed {
            if let Ok(source) = loaded {
                self.backend.release(source, None);
            }
            log::info!("[audio] dropping music {} after destroy", ticket.url);
            return Ok(MusicLoad::Cancelled);
        }
        if ticket.generation != self.music_generation {
            log::info!("[audio] dropping superseded music {}", ticket.url);
            if let Ok(source) = loaded {
                self.backend.release(source, None);
            }
            return Ok(MusicLoad::Superseded);
        }
        let source = match loaded {
            Ok(s) => s,
            Err(e) => {
                log::error!("[audio] music {} failed: {}", ticket.url, e);
                self.emit(AudioEvent::MusicLoadError {
                    url: ticket.url,
                    message: e.to_string(),
                });
                return Err(e);
            }
        };
        if let Some(v) = ticket.options.volume {
            self.volumes.music = clamp_volume(v);
        }
        let channel = self.make_channel(source, &ticket.url, ticket.options.looped, Level::Music, "music");
        let duration = self.backend.duration(&channel.source);
        self.music = Some(Music {
            channel,
            options: ticket.options.clone(),
            generation: ticket.generation,
        });
        if ticket.options.volume.is_some() {
            self.propagate();
            self.emit(AudioEvent::MusicVolumeChange {
                volume: self.volumes.music,
            });
        }
        log::info!("[audio] music loaded {}", ticket.url);
        self.emit(AudioEvent::MusicLoaded {
            url: ticket.url,
            looped: ticket.options.looped,
            duration,
        });
        Ok(MusicLoad::Loaded)
    }

    pub fn music_auto_play(&self) -> bool {
        self.music.as_ref().is_some_and(|m| m.options.auto_play)
    }

    pub fn begin_music_play(&mut self) -> Option<(u64, LocalFuture<'static, Result<(), AudioError>>)> {
        if self.destroyed {
            return None;
        }
        let music = self.music.as_ref()?;
        let generation = music.generation;
        let source = music.channel.source.clone();
        Some((generation, self.backend.play(&source)))
    }

    pub fn finish_music_play(&mut self, generation: u64, result: Result<(), AudioError>) {
        if self.destroyed {
            return;
        }
        let Some(music) = self.music.as_mut().filter(|m| m.generation == generation) else {
            return;
        };
        match result {
            Ok(()) => {
                music.channel.playing = true;
                self.emit(AudioEvent::MusicPlay);
            }
            Err(e) => {
                log::error!("[audio] music play failed: {}", e);
                self.emit(AudioEvent::MusicPlayError {
                    message: e.to_string(),
                });
            }
        }
    }

    pub fn pause_background_music(&mut self) {
        let Some(music) = self.music.as_mut().filter(|m| m.channel.playing) else {
            return;
        };
        self.backend.pause(&music.channel.source);
        music.channel.playing = false;
        self.emit(AudioEvent::MusicPause);
    }

    pub fn stop_background_music(&mut self) {
        let Some(music) = self.music.as_mut() else {
            return;
        };
        self.backend.pause(&music.channel.source);
        self.backend.rewind(&music.channel.source);
        music.channel.playing = false;
        self.emit(AudioEvent::MusicStop);
    }

    // ---- effects ----

    pub fn begin_effect_load(
        &mut self,
        id: &str,
        url: &str,
    ) -> Result<LocalFuture<'static, Result<B::Source, AudioError>>, AudioError> {
        self.ensure_live()?;
        log::debug!("[audio] loading effect {} from {}", id, url);
        Ok(self.backend.load(url, false))
    }

    pub fn install_effect(
        &mut self,
        id: &str,
        url: &str,
        loaded: Result<B::Source, AudioError>,
    ) -> Result<(), AudioError> {
        if self.destroyed {
            if let Ok(source) = loaded {
                self.backend.release(source, None);
            }
            return Ok(());
        }
        let source = match loaded {
            Ok(s) => s,
            Err(e) => {
                log::error!("[audio] effect {} failed: {}", id, e);
                self.emit(AudioEvent::EffectLoadError {
                    id: id.to_string(),
                    message: e.to_string(),
                });
                return Err(e);
            }
        };
        let channel = self.make_channel(source, url, false, Level::Effect(None), "effect");
        if let Some(old) = self.effects.insert(id.to_string(), channel) {
            self.release_channel(old);
        }
        self.emit(AudioEvent::EffectLoaded {
            id: id.to_string(),
            url: url.to_string(),
        });
        Ok(())
    }

    pub fn begin_effect_play(
        &mut self,
        id: &str,
        options: &EffectPlayOptions,
    ) -> Option<LocalFuture<'static, Result<(), AudioError>>> {
        if self.destroyed {
            return None;
        }
        let Some(channel) = self.effects.get_mut(id) else {
            log::warn!("[audio] unknown sound effect '{}'", id);
            return None;
        };
        self.backend.rewind(&channel.source);
        if let Some(v) = options.volume {
            channel.level = Level::Effect(Some(clamp_volume(v)));
        }
        let level = channel.level.resolve(&self.volumes);
        Self::apply(&mut self.backend, &self.volumes, channel, level);
        let source = channel.source.clone();
        Some(self.backend.play(&source))
    }

    pub fn finish_effect_play(&mut self, id: &str, volume: Option<f32>, result: Result<(), AudioError>) {
        if self.destroyed {
            return;
        }
        match result {
            Ok(()) => self.emit(AudioEvent::EffectPlay {
                id: id.to_string(),
                volume: volume.map(clamp_volume),
            }),
            Err(e) => {
                log::error!("[audio] effect {} play failed: {}", id, e);
                self.emit(AudioEvent::EffectPlayError {
                    id: id.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    // ---- hotspot channels ----

    pub fn begin_hotspot_load(
        &mut self,
        url: &str,
        options: &HotspotAudioOptions,
    ) -> Result<LocalFuture<'static, Result<B::Source, AudioError>>, AudioError> {
        self.ensure_live()?;
        Ok(self.backend.load(url, options.looped))
    }

    pub fn install_hotspot_audio(
        &mut self,
        hotspot_id: &str,
        url: &str,
        options: &HotspotAudioOptions,
        loaded: Result<B::Source, AudioError>,
    ) -> Result<(), AudioError> {
        if self.destroyed {
            if let Ok(source) = loaded {
                self.backend.release(source, None);
            }
            return Ok(());
        }
        let source = match loaded {
            Ok(s) => s,
            Err(e) => {
                log::error!("[audio] hotspot audio {} failed: {}", hotspot_id, e);
                self.emit(AudioEvent::HotspotAudioError {
                    hotspot_id: hotspot_id.to_string(),
                    message: e.to_string(),
                });
                return Err(e);
            }
        };
        let level = Level::Own(clamp_volume(options.volume));
        let channel = self.make_channel(source, url, options.looped, level, "hotspot audio");
        if let Some(old) = self.hotspots.insert(hotspot_id.to_string(), channel) {
            self.release_channel(old);
        }
        self.emit(AudioEvent::HotspotAudioCreated {
            hotspot_id: hotspot_id.to_string(),
            url: url.to_string(),
        });
        Ok(())
    }

    pub fn begin_hotspot_play(&mut self, hotspot_id: &str) -> Option<LocalFuture<'static, Result<(), AudioError>>> {
        if self.destroyed {
            return None;
        }
        let source = self.hotspots.get(hotspot_id)?.source.clone();
        Some(self.backend.play(&source))
    }

    pub fn finish_hotspot_play(&mut self, hotspot_id: &str, result: Result<(), AudioError>) {
        if self.destroyed {
            return;
        }
        let Some(channel) = self.hotspots.get_mut(hotspot_id) else {
            return;
        };
        match result {
            Ok(()) => {
                channel.playing = true;
                self.emit(AudioEvent::HotspotAudioPlay {
                    hotspot_id: hotspot_id.to_string(),
                });
            }
            Err(e) => {
                log::error!("[audio] hotspot audio {} play failed: {}", hotspot_id, e);
                self.emit(AudioEvent::HotspotAudioPlayError {
                    hotspot_id: hotspot_id.to_string(),
                    message: e.to_string(),
                });
            }
        }
    }

    pub fn stop_hotspot_audio(&mut self, hotspot_id: &str) {
        let Some(channel) = self.hotspots.get_mut(hotspot_id).filter(|c| c.playing) else {
            return;
        };
        self.backend.pause(&channel.source);
        self.backend.rewind(&channel.source);
        channel.playing = false;
        self.emit(AudioEvent::HotspotAudioStop {
            hotspot_id: hotspot_id.to_string(),
        });
    }

    pub fn remove_hotspot_audio(&mut self, hotspot_id: &str) -> bool {
        self.stop_hotspot_audio(hotspot_id);
        match self.hotspots.remove(hotspot_id) {
            Some(channel) => {
                self.release_channel(channel);
                true
            }
            None => false,
        }
    }

    // ---- bulk ----

    fn sorted_hotspot_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.hotspots.keys().cloned().collect();
        ids.sort();
        ids
    }

    pub fn stop_all(&mut self) {
        if self.destroyed {
            return;
        }
        self.stop_background_music();
        for id in self.sorted_hotspot_ids() {
            self.stop_hotspot_audio(&id);
        }
        self.emit(AudioEvent::AllStopped);
    }

    pub fn pause_all(&mut self) {
        if self.destroyed {
            return;
        }
        self.pause_background_music();
        for channel in self.hotspots.values_mut().filter(|c| c.playing) {
            self.backend.pause(&channel.source);
            channel.playing = false;
        }
        self.emit(AudioEvent::AllPaused);
    }

    pub fn status(&self) -> AudioStatus {
        let mut hotspot_audios: Vec<HotspotAudioStatus> = self
            .hotspots
            .iter()
            .map(|(id, c)| HotspotAudioStatus {
                id: id.clone(),
                url: c.url.clone(),
                playing: c.playing,
            })
            .collect();
        hotspot_audios.sort_by(|a, b| a.id.cmp(&b.id));
        AudioStatus {
            initialized: self.is_initialized(),
            muted: self.volumes.muted,
            master_volume: self.volumes.master,
            music_volume: self.volumes.music,
            effects_volume: self.volumes.effects,
            background_music: self.music.as_ref().map(|m| MusicStatus {
                url: m.channel.url.clone(),
                playing: m.channel.playing,
                current_time: self.backend.current_time(&m.channel.source),
                duration: self.backend.duration(&m.channel.source),
            }),
            hotspot_audios,
        }
    }

    /// Stop and release everything and close the graph. Second call is a
    /// no-op. Listeners stay registered.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        self.stop_all();
        if let Some(music) = self.music.take() {
            self.release_channel(music.channel);
        }
        let effects: Vec<Channel<B>> = self.effects.drain().map(|(_, c)| c).collect();
        let hotspots: Vec<Channel<B>> = self.hotspots.drain().map(|(_, c)| c).collect();
        for channel in effects.into_iter().chain(hotspots) {
            self.release_channel(channel);
        }
        self.master = None;
        self.backend.close();
        self.destroyed = true;
        log::info!("[audio] destroyed");
        self.emit(AudioEvent::Destroyed);
    }
}

pub struct AudioBusHandle<B: AudioBackend> {
    inner: Rc<RefCell<AudioBusManager<B>>>,
    events: Rc<EventBus<AudioEvent>>,
}

impl<B: AudioBackend> Clone for AudioBusHandle<B> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
            events: self.events.clone(),
        }
    }
}

impl<B: AudioBackend + 'static> AudioBusHandle<B> {
    pub fn new(manager: AudioBusManager<B>) -> Self {
        let events = manager.events().clone();
        Self {
            inner: Rc::new(RefCell::new(manager)),
            events,
        }
    }

    pub fn create(backend: B, settings: AudioSettings, events: Rc<EventBus<AudioEvent>>) -> Self {
        let bus = events.clone();
        bus.deferred(|| Self::new(AudioBusManager::new(backend, settings, events)))
    }

    pub fn events(&self) -> &Rc<EventBus<AudioEvent>> {
        &self.events
    }

    pub fn with<T>(&self, f: impl FnOnce(&mut AudioBusManager<B>) -> T) -> T {
        self.events.deferred(|| f(&mut self.inner.borrow_mut()))
    }

    pub fn read<T>(&self, f: impl FnOnce(&AudioBusManager<B>) -> T) -> T {
        f(&self.inner.borrow())
    }

    pub async fn resume_context(&self) -> Result<(), AudioError> {
        let Some(resume) = self.with(|m| m.begin_resume()) else {
            return Ok(());
        };
        let result = resume.await;
        self.with(|m| m.finish_resume(result))
    }

    pub async fn load_background_music(
        &self,
        url: &str,
        options: MusicOptions,
    ) -> Result<MusicLoad, AudioError> {
        let (ticket, load) = self.with(|m| m.begin_music_load(url, options))?;
        let loaded = load.await;
        let outcome = self.with(|m| m.install_music(ticket, loaded))?;
        if outcome == MusicLoad::Loaded && self.read(|m| m.music_auto_play()) {
            self.play_background_music().await;
        }
        Ok(outcome)
    }

    pub async fn play_background_music(&self) {
        _ = self.resume_context().await;
        let Some((generation, play)) = self.with(|m| m.begin_music_play()) else {
            return;
        };
        let result = play.await;
        self.with(|m| m.finish_music_play(generation, result));
    }

    pub async fn load_sound_effect(&self, id: &str, url: &str) -> Result<(), AudioError> {
        let load = self.with(|m| m.begin_effect_load(id, url))?;
        let loaded = load.await;
        self.with(|m| m.install_effect(id, url, loaded))
    }

    pub async fn play_sound_effect(&self, id: &str, options: EffectPlayOptions) {
        _ = self.resume_context().await;
        let Some(play) = self.with(|m| m.begin_effect_play(id, &options)) else {
            return;
        };
        let result = play.await;
        self.with(|m| m.finish_effect_play(id, options.volume, result));
    }

    pub async fn create_hotspot_audio(
        &self,
        hotspot_id: &str,
        url: &str,
        options: HotspotAudioOptions,
    ) -> Result<(), AudioError> {
        let load = self.with(|m| m.begin_hotspot_load(url, &options))?;
        let loaded = load.await;
        self.with(|m| m.install_hotspot_audio(hotspot_id, url, &options, loaded))
    }

    /// Play a hotspot's sound, rebuilding its channel first when the url or
    /// options differ from the ones it was created with.
    pub async fn trigger_hotspot_audio(&self, hotspot_id: &str, url: &str, options: HotspotAudioOptions) {
        if !self.read(|m| m.hotspot_audio_matches(hotspot_id, url, &options))
            && self.create_hotspot_audio(hotspot_id, url, options).await.is_err()
        {
            return;
        }
        self.play_hotspot_audio(hotspot_id).await;
    }

    pub async fn play_hotspot_audio(&self, hotspot_id: &str) {
        _ = self.resume_context().await;
        let Some(play) = self.with(|m| m.begin_hotspot_play(hotspot_id)) else {
            return;
        };
        let result = play.await;
        self.with(|m| m.finish_hotspot_play(hotspot_id, result));
    }
}
