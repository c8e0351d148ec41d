use crate::core::backend::LabelDesc;
use crate::core::error::SceneError;
use wasm_bindgen::JsCast;
use web_sys as web;

const LABEL_FONT: &str = "bold 24px Arial, sans-serif";
const LABEL_RADIUS: f64 = 12.0;

fn js_err(e: wasm_bindgen::JsValue) -> SceneError {
    SceneError::Gpu(format!("label raster: {:?}", e))
}

/// Draw a rounded badge with centred text and return its RGBA8 pixels.
pub(crate) fn rasterize(document: &web::Document, desc: &LabelDesc) -> Result<Vec<u8>, SceneError> {
    let canvas: web::HtmlCanvasElement = document
        .create_element("canvas")
        .map_err(js_err)?
        .dyn_into()
        .map_err(|_| SceneError::Gpu("label canvas".into()))?;
    canvas.set_width(desc.width_px);
    canvas.set_height(desc.height_px);
    let ctx: web::CanvasRenderingContext2d = canvas
        .get_context("2d")
        .map_err(js_err)?
        .ok_or_else(|| SceneError::Gpu("2d context unavailable".into()))?
        .dyn_into()
        .map_err(|_| SceneError::Gpu("2d context".into()))?;

    let w = desc.width_px as f64;
    let h = desc.height_px as f64;
    let r = LABEL_RADIUS.min(h * 0.5);
    ctx.clear_rect(0.0, 0.0, w, h);
    ctx.set_fill_style_str(&desc.background);
    ctx.begin_path();
    ctx.move_to(r, 0.0);
    ctx.line_to(w - r, 0.0);
    ctx.quadratic_curve_to(w, 0.0, w, r);
    ctx.line_to(w, h - r);
    ctx.quadratic_curve_to(w, h, w - r, h);
    ctx.line_to(r, h);
    ctx.quadratic_curve_to(0.0, h, 0.0, h - r);
    ctx.line_to(0.0, r);
    ctx.quadratic_curve_to(0.0, 0.0, r, 0.0);
    ctx.close_path();
    ctx.fill();

    ctx.set_font(LABEL_FONT);
    ctx.set_text_align("center");
    ctx.set_text_baseline("middle");
    ctx.set_fill_style_str(&desc.color);
    ctx.fill_text_with_max_width(&desc.text, w * 0.5, h * 0.5, w - 2.0 * r)
        .map_err(js_err)?;

    let data = ctx.get_image_data(0.0, 0.0, w, h).map_err(js_err)?;
    Ok(data.data().0)
}
