use crate::core::audio::AudioBackend;
use crate::core::error::AudioError;
use crate::core::LocalFuture;
use wasm_bindgen_futures::JsFuture;
use web_sys as web;

/// Gain node plus the media-element source feeding it, if any.
#[derive(Clone)]
pub struct WebGain {
    gain: web::GainNode,
    source: Option<web::MediaElementAudioSourceNode>,
}

fn create_gain(audio_ctx: &web::AudioContext, value: f32, label: &str) -> Result<web::GainNode, AudioError> {
    match audio_ctx.create_gain() {
        Ok(g) => {
            g.gain().set_value(value);
            Ok(g)
        }
        Err(e) => {
            log::error!("{} GainNode error: {:?}", label, e);
            Err(AudioError::Routing(format!("{} gain node: {:?}", label, e)))
        }
    }
}

/// Web Audio graph: one `AudioContext`, a master gain into the destination and
/// one `<audio>` element per loaded sound.
#[derive(Default)]
pub struct WebAudioBackend {
    ctx: Option<web::AudioContext>,
}

impl WebAudioBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

fn wait_until_playable(el: &web::HtmlAudioElement) -> js_sys::Promise {
    let el = el.clone();
    js_sys::Promise::new(&mut |resolve, reject| {
        let opts = web::AddEventListenerOptions::new();
        opts.set_once(true);
        _ = el.add_event_listener_with_callback_and_add_event_listener_options("canplaythrough", &resolve, &opts);
        _ = el.add_event_listener_with_callback_and_add_event_listener_options("error", &reject, &opts);
    })
}

impl AudioBackend for WebAudioBackend {
    type Source = web::HtmlAudioElement;
    type Gain = WebGain;

    fn create_graph(&mut self) -> Result<WebGain, AudioError> {
        let ctx = web::AudioContext::new().map_err(|e| {
            log::error!("AudioContext error: {:?}", e);
            AudioError::GraphUnavailable(format!("{:?}", e))
        })?;
        let master = create_gain(&ctx, 1.0, "Master").map_err(|e| AudioError::GraphUnavailable(e.to_string()))?;
        _ = master.connect_with_audio_node(&ctx.destination());
        self.ctx = Some(ctx);
        Ok(WebGain {
            gain: master,
            source: None,
        })
    }

    fn is_suspended(&self) -> bool {
        self.ctx
            .as_ref()
            .is_some_and(|c| c.state() == web::AudioContextState::Suspended)
    }

    fn resume(&mut self) -> LocalFuture<'static, Result<(), AudioError>> {
        let promise = self.ctx.as_ref().map(|c| c.resume());
        Box::pin(async move {
            match promise {
                Some(Ok(p)) => JsFuture::from(p).await.map(|_| ()).map_err(|e| {
                    log::warn!("[audio] resume rejected: {:?}", e);
                    AudioError::Resume(format!("{:?}", e))
                }),
                Some(Err(e)) => Err(AudioError::Resume(format!("{:?}", e))),
                None => Ok(()),
            }
        })
    }

    fn load(&mut self, url: &str, looped: bool) -> LocalFuture<'static, Result<web::HtmlAudioElement, AudioError>> {
        let url = url.to_string();
        let el = web::HtmlAudioElement::new();
        Box::pin(async move {
            let el = el.map_err(|e| AudioError::Load {
                url: url.clone(),
                reason: format!("{:?}", e),
            })?;
            el.set_cross_origin(Some("anonymous"));
            el.set_preload("auto");
            el.set_loop(looped);
            let ready = wait_until_playable(&el);
            el.set_src(&url);
            el.load();
            match JsFuture::from(ready).await {
                Ok(_) => Ok(el),
                Err(_) => {
                    let reason = el
                        .error()
                        .map(|e| format!("media error {}", e.code()))
                        .unwrap_or_else(|| "media error".into());
                    Err(AudioError::Load { url, reason })
                }
            }
        })
    }

    fn route(&mut self, source: &web::HtmlAudioElement, master: &WebGain) -> Result<WebGain, AudioError> {
        let ctx = self
            .ctx
            .as_ref()
            .ok_or_else(|| AudioError::Routing("no audio context".into()))?;
        let node = ctx.create_media_element_source(source).map_err(|e| {
            log::warn!("[audio] media source error: {:?}", e);
            AudioError::Routing(format!("{:?}", e))
        })?;
        let gain = create_gain(ctx, 1.0, "Channel")?;
        _ = node.connect_with_audio_node(&gain);
        _ = gain.connect_with_audio_node(&master.gain);
        Ok(WebGain {
            gain,
            source: Some(node),
        })
    }

    fn set_gain(&mut self, gain: &WebGain, value: f32) {
        gain.gain.gain().set_value(value);
    }

    fn set_volume(&mut self, source: &web::HtmlAudioElement, value: f32) {
        source.set_volume(value as f64);
    }

    fn play(&mut self, source: &web::HtmlAudioElement) -> LocalFuture<'static, Result<(), AudioError>> {
        let promise = source.play();
        Box::pin(async move {
            let p = promise.map_err(|e| AudioError::Play(format!("{:?}", e)))?;
            JsFuture::from(p).await.map(|_| ()).map_err(|e| {
                log::warn!("[audio] play rejected: {:?}", e);
                AudioError::Play(format!("{:?}", e))
            })
        })
    }

    fn pause(&mut self, source: &web::HtmlAudioElement) {
        _ = source.pause();
    }

    fn rewind(&mut self, source: &web::HtmlAudioElement) {
        source.set_current_time(0.0);
    }

    fn current_time(&self, source: &web::HtmlAudioElement) -> f64 {
        source.current_time()
    }

    fn duration(&self, source: &web::HtmlAudioElement) -> f64 {
        let d = source.duration();
        if d.is_finite() {
            d
        } else {
            0.0
        }
    }

    fn release(&mut self, source: web::HtmlAudioElement, gain: Option<WebGain>) {
        _ = source.pause();
        source.set_src("");
        source.load();
        if let Some(g) = gain {
            if let Some(node) = g.source {
                _ = node.disconnect();
            }
            _ = g.gain.disconnect();
        }
    }

    fn close(&mut self) {
        if let Some(ctx) = self.ctx.take() {
            if let Ok(p) = ctx.close() {
                wasm_bindgen_futures::spawn_local(async move {
                    _ = JsFuture::from(p).await;
                });
            }
        }
    }
}
