use crate::core::error::SceneError;
use crate::core::scene::ImageFetcher;
use crate::core::LocalFuture;
use wasm_bindgen::closure::Closure;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;
use web_sys as web;

/// Downloads panorama bytes with `XMLHttpRequest` so progress is observable.
#[derive(Clone, Copy, Debug, Default)]
pub struct XhrFetcher;

fn fetch_error(url: &str, reason: impl Into<String>) -> SceneError {
    SceneError::Fetch {
        url: url.to_string(),
        reason: reason.into(),
    }
}

impl ImageFetcher for XhrFetcher {
    fn fetch(
        &self,
        url: &str,
        mut progress: Box<dyn FnMut(u64, u64)>,
    ) -> LocalFuture<'static, Result<Vec<u8>, SceneError>> {
        let url = url.to_string();
        Box::pin(async move {
            let xhr = web::XmlHttpRequest::new().map_err(|e| fetch_error(&url, format!("{:?}", e)))?;
            xhr.open_with_async("GET", &url, true)
                .map_err(|e| fetch_error(&url, format!("{:?}", e)))?;
            xhr.set_response_type(web::XmlHttpRequestResponseType::Arraybuffer);

            let on_progress = Closure::wrap(Box::new(move |ev: web::ProgressEvent| {
                let total = if ev.length_computable() { ev.total() as u64 } else { 0 };
                progress(ev.loaded() as u64, total);
            }) as Box<dyn FnMut(_)>);
            xhr.set_onprogress(Some(on_progress.as_ref().unchecked_ref()));

            let done = js_sys::Promise::new(&mut |resolve, reject| {
                xhr.set_onload(Some(&resolve));
                xhr.set_onerror(Some(&reject));
                xhr.set_onabort(Some(&reject));
            });
            xhr.send().map_err(|e| fetch_error(&url, format!("{:?}", e)))?;
            let outcome = JsFuture::from(done).await;
            xhr.set_onprogress(None);
            drop(on_progress);
            outcome.map_err(|_| fetch_error(&url, "network error"))?;

            let status = xhr.status().unwrap_or(0);
            if status != 0 && !(200..300).contains(&status) {
                return Err(fetch_error(&url, format!("HTTP {}", status)));
            }
            let body = xhr
                .response()
                .map_err(|e| fetch_error(&url, format!("{:?}", e)))?;
            if body.is_null() || body.is_undefined() {
                return Err(fetch_error(&url, "empty response"));
            }
            let bytes = js_sys::Uint8Array::new(&body).to_vec();
            log::info!("[fetch] {} ({} bytes)", url, bytes.len());
            Ok(bytes)
        })
    }
}
