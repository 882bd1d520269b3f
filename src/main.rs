use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use log::info;

use glyph_glow::{
    print_final_state, AppState, Deferred, HeadlessCompositor, SceneConfig, Typeface, Viewport,
};

const DEFAULT_FRAMES: u64 = 60;

#[cfg(not(target_arch = "wasm32"))]
fn main() {
    env_logger::init();
    if let Err(err) = run() {
        eprintln!("Error: {err:?}");
        std::process::exit(1);
    }
}

#[cfg(target_arch = "wasm32")]
fn main() {}

#[cfg(not(target_arch = "wasm32"))]
fn run() -> Result<()> {
    let options = CliOptions::parse(std::env::args().skip(1))?;
    let config = load_config(&options)?;

    println!(
        "Scene with {} glyph(s) using font {}",
        config.glyphs.len(),
        config.font
    );
    for glyph in &config.glyphs {
        println!(" - {} {:?} ({})", glyph.label, glyph.text, glyph.material.name());
    }

    if options.headless {
        return run_headless(config, &options);
    }

    let font = glyph_glow::font::load_in_background(&config.font);
    let app = AppState::new(config.clone(), Viewport::new(1280, 720), font);
    match glyph_glow::shell::run_native(app) {
        Ok(app) => {
            print_final_state(&app);
            Ok(())
        }
        Err(err) if err.downcast_ref::<glyph_glow::WindowInitError>().is_some() => {
            eprintln!(
                "{err}. Falling back to --headless mode (set DISPLAY or install X11 libs to enable rendering)."
            );
            run_headless(config, &options)
        }
        Err(err) => Err(err),
    }
}

fn run_headless(config: SceneConfig, options: &CliOptions) -> Result<()> {
    let font = Deferred::settled(Typeface::load(Path::new(&config.font)));
    let mut app = AppState::new(config, Viewport::new(1280, 720), font);
    let mut compositor = HeadlessCompositor::default();

    for key in options.keys.chars() {
        app.handle_key(&key.to_string());
    }
    for _ in 0..options.frames {
        app.tick(&mut compositor)
            .context("headless compositor rejected a frame")?;
    }
    info!("headless run finished after {} frame(s)", compositor.frames);

    print_final_state(&app);
    Ok(())
}

fn load_config(options: &CliOptions) -> Result<SceneConfig> {
    let mut config = match options.config.as_deref() {
        Some(path) => {
            let xml = fs::read_to_string(path)
                .with_context(|| format!("failed to read scene config {}", path.display()))?;
            SceneConfig::from_xml(&xml)
                .with_context(|| format!("failed to parse scene config {}", path.display()))?
        }
        None => SceneConfig::default(),
    };
    if let Some(font) = options.font.as_deref() {
        config.font = font.display().to_string();
    }
    Ok(config)
}

const USAGE: &str =
    "Usage: glyph-glow [--config <scene.xml>] [--font <path>] [--headless] [--frames <n>] [--keys <chars>]";

#[derive(Debug, PartialEq)]
struct CliOptions {
    config: Option<PathBuf>,
    font: Option<PathBuf>,
    headless: bool,
    frames: u64,
    keys: String,
}

impl CliOptions {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut args = args.into_iter();
        let mut options = Self {
            config: None,
            font: None,
            headless: false,
            frames: DEFAULT_FRAMES,
            keys: String::new(),
        };
        while let Some(arg) = args.next() {
            let mut value = |flag: &str| {
                args.next()
                    .ok_or_else(|| anyhow!("{flag} expects a value. {USAGE}"))
            };
            match arg.as_str() {
                "--config" => options.config = Some(PathBuf::from(value("--config")?)),
                "--font" => options.font = Some(PathBuf::from(value("--font")?)),
                "--headless" => options.headless = true,
                "--frames" => {
                    let raw = value("--frames")?;
                    options.frames = raw
                        .parse()
                        .with_context(|| format!("invalid frame count {raw:?}"))?;
                }
                "--keys" => options.keys = value("--keys")?,
                other => return Err(anyhow!("Unknown argument: {other}. {USAGE}")),
            }
        }
        Ok(options)
    }
}
