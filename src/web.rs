#![cfg(target_arch = "wasm32")]

use log::{info, Level};
use wasm_bindgen::prelude::*;
use wasm_bindgen::JsCast;
use wasm_bindgen_futures::JsFuture;

use crate::app::AppState;
use crate::camera::Viewport;
use crate::config::SceneConfig;
use crate::font::{FontError, FontLoad, Typeface};
use crate::shell;

/// Browser entry point: installs the console hooks, starts fetching the
/// typeface and hands the app to the browser event loop.
#[wasm_bindgen(start)]
pub fn start() -> Result<(), JsValue> {
    console_error_panic_hook::set_once();
    if console_log::init_with_level(Level::Info).is_err() {
        web_sys::console::warn_1(&JsValue::from_str("logger already installed"));
    }

    let config = SceneConfig::default();
    let font = fetch_font(config.font.clone());
    let app = AppState::new(config, Viewport::new(1280, 720), font);
    info!("starting glyph-glow in the browser");
    shell::run_web(app).map_err(|err| JsValue::from_str(&format!("{err:#}")))
}

/// Requests the typeface at `url`; the slot settles when the response has
/// been parsed.
pub fn fetch_font(url: String) -> FontLoad {
    let (load, resolver) = FontLoad::channel();
    wasm_bindgen_futures::spawn_local(async move {
        let result = match fetch_text(&url).await {
            Ok(text) => Typeface::from_json(&text),
            Err(err) => Err(FontError::Fetch {
                url: url.clone(),
                message: describe(&err),
            }),
        };
        resolver.resolve(result);
    });
    load
}

async fn fetch_text(url: &str) -> Result<String, JsValue> {
    let window = web_sys::window().ok_or_else(|| JsValue::from_str("missing window"))?;
    let response: web_sys::Response = JsFuture::from(window.fetch_with_str(url))
        .await?
        .dyn_into()?;
    if !response.ok() {
        return Err(JsValue::from_str(&format!("HTTP {}", response.status())));
    }
    let text = JsFuture::from(response.text()?).await?;
    text.as_string()
        .ok_or_else(|| JsValue::from_str("response body is not text"))
}

fn describe(value: &JsValue) -> String {
    value
        .as_string()
        .unwrap_or_else(|| format!("{value:?}"))
}
