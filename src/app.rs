use std::task::Poll;

use log::{info, warn};

use crate::camera::{Camera, Viewport};
use crate::config::SceneConfig;
use crate::font::FontLoad;
use crate::input::{Action, InputController};
use crate::render::{Compositor, Frame, FrameError};
use crate::scene::Scene;

/// Complete mutable state of the demo, independent of any window or GPU.
///
/// The shell owns one `AppState` and passes it by `&mut` to its input,
/// resize and redraw handlers. The headless run and the tests drive it the
/// same way with a [`crate::render::HeadlessCompositor`].
pub struct AppState {
    config: SceneConfig,
    scene: Scene,
    camera: Camera,
    viewport: Viewport,
    input: InputController,
    font: Option<FontLoad>,
    time: f32,
    frames: u64,
}

impl AppState {
    pub fn new(config: SceneConfig, viewport: Viewport, font: FontLoad) -> Self {
        let scene = Scene::new(&config.light, config.glyphs.clone());
        let camera = Camera::new(config.camera.position, config.camera.fov, viewport);
        let input = InputController::new(&config.controls, &scene.rig, &camera);
        info!(
            "scene ready: {} glyph(s) pending, viewport {}x{}",
            scene.glyph_specs().len(),
            viewport.width,
            viewport.height
        );
        Self {
            config,
            scene,
            camera,
            viewport,
            input,
            font: Some(font),
            time: 0.0,
            frames: 0,
        }
    }

    pub fn config(&self) -> &SceneConfig {
        &self.config
    }

    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn input(&self) -> &InputController {
        &self.input
    }

    pub fn time(&self) -> f32 {
        self.time
    }

    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// True while the font has neither arrived nor failed.
    pub fn font_pending(&self) -> bool {
        self.font.is_some()
    }

    pub fn handle_key(&mut self, key: &str) -> Option<Action> {
        self.input
            .handle_key(key, &mut self.scene.rig, &mut self.camera)
    }

    /// Applies a new surface size. Returns `false` when nothing changed.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        let viewport = Viewport::new(width, height);
        if viewport == self.viewport {
            return false;
        }
        self.viewport = viewport;
        self.camera.fit(viewport);
        true
    }

    /// Advances the animation by one step and hands the frame to
    /// `compositor`.
    pub fn tick(&mut self, compositor: &mut dyn Compositor) -> Result<(), FrameError> {
        self.poll_font();

        let animation = &self.config.animation;
        self.time += animation.time_step;
        self.scene.rig.spin(animation.spin);
        self.scene.rig.resync();
        self.frames += 1;

        let frame = Frame {
            view: self.camera.view(),
            projection: self.camera.projection(),
            marker_model: self.scene.rig.marker().model_matrix(),
            light_position: self.scene.rig.light_position(),
            glyphs: self.scene.glyphs(),
            bloom: self.config.bloom,
        };
        compositor.composite(&frame)
    }

    fn poll_font(&mut self) {
        let Some(load) = self.font.as_ref() else {
            return;
        };
        match load.poll() {
            Poll::Pending => {}
            Poll::Ready(Ok(face)) => {
                self.scene.attach_glyphs(&face);
                self.font = None;
            }
            Poll::Ready(Err(err)) => {
                warn!("typeface unavailable, glyphs will not be drawn: {err}");
                self.font = None;
            }
        }
    }

    /// Human readable summary printed at the end of a run.
    pub fn summary(&self) -> Vec<String> {
        let rig = &self.scene.rig;
        let marker = rig.marker_position();
        let light = rig.light_position();
        let rotation = rig.marker().rotation();
        let mut lines = vec![
            format!("Frames: {} time={:.2}", self.frames, self.time),
            format!(
                "Marker pos=({:.2}, {:.2}, {:.2}) rot=({:.2}, {:.2})",
                marker.x, marker.y, marker.z, rotation.x, rotation.y
            ),
            format!("Light pos=({:.2}, {:.2}, {:.2})", light.x, light.y, light.z),
            format!(
                "Camera pos=({:.2}, {:.2}, {:.2}) aspect={:.3}",
                self.camera.position.x,
                self.camera.position.y,
                self.camera.position.z,
                self.camera.aspect()
            ),
            format!("Glyphs: {}", self.scene.glyphs().len()),
        ];
        for glyph in self.scene.glyphs() {
            lines.push(format!(
                " - {} {:?} {} triangles={}",
                glyph.label,
                glyph.text,
                glyph.material.kind.name(),
                glyph.mesh.triangle_count()
            ));
        }
        lines
    }
}

pub fn print_final_state(app: &AppState) {
    println!("Final state:");
    for line in app.summary() {
        println!("{line}");
    }
}
