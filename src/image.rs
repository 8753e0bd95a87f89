//! Async bitmap loading for image entities.

use std::collections::HashMap;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use wasm_bindgen_futures::JsFuture;
use web_sys::HtmlImageElement;

use crate::error::EditorError;

/// Decoded bitmaps keyed by source URL.
pub type ImageCache = HashMap<String, HtmlImageElement>;

/// Load and decode `src`.
///
/// The first attempt requests CORS (`crossOrigin = "anonymous"`) so the
/// canvas stays exportable. Servers without CORS headers fail that request,
/// so one retry is made without it.
///
/// # Errors
///
/// Returns [`EditorError::ImageLoad`] when both attempts fail.
pub async fn load_image(src: &str) -> Result<HtmlImageElement, EditorError> {
    match try_load(src, true).await {
        Ok(img) => Ok(img),
        Err(first) => {
            log::warn!("image: cors load failed for {src} ({first:?}); retrying without crossOrigin");
            try_load(src, false).await.map_err(|err| {
                log::warn!("image: load failed for {src}: {err:?}");
                EditorError::ImageLoad { src: src.to_string() }
            })
        }
    }
}

async fn try_load(src: &str, cross_origin: bool) -> Result<HtmlImageElement, JsValue> {
    let img = HtmlImageElement::new()?;
    if cross_origin {
        img.set_cross_origin(Some("anonymous"));
    }

    let promise = js_sys::Promise::new(&mut |resolve: js_sys::Function, reject: js_sys::Function| {
        let onload = Closure::once_into_js(move || {
            if let Err(err) = resolve.call0(&JsValue::NULL) {
                log::warn!("image: resolve failed: {err:?}");
            }
        });
        let onerror = Closure::once_into_js(move |event: JsValue| {
            if let Err(err) = reject.call1(&JsValue::NULL, &event) {
                log::warn!("image: reject failed: {err:?}");
            }
        });
        img.set_onload(Some(onload.unchecked_ref()));
        img.set_onerror(Some(onerror.unchecked_ref()));
    });

    img.set_src(src);
    JsFuture::from(promise).await?;
    img.set_onload(None);
    img.set_onerror(None);

    if img.natural_width() == 0 || img.natural_height() == 0 {
        return Err(JsValue::from_str("decoded image has no size"));
    }
    Ok(img)
}
