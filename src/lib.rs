//! Two extruded glyphs lit by a moving point light, with a bloom pass.
//!
//! Scene state ([`AppState`]) is kept apart from the GPU so it can be
//! driven by the windowed shell, the headless run and the tests alike.
//! Rendering goes through the [`Compositor`] seam; [`Renderer`] is the wgpu
//! implementation and [`HeadlessCompositor`] only counts frames.

pub mod app;
pub mod camera;
pub mod config;
pub mod deferred;
pub mod font;
pub mod glyph;
pub mod input;
pub mod light;
pub mod mesh;
pub mod render;
pub mod scene;
pub mod shading;
pub mod shell;
#[cfg(target_arch = "wasm32")]
pub mod web;

pub use app::{print_final_state, AppState};
pub use camera::{Camera, Viewport};
pub use config::{BloomSettings, GlyphSpec, SceneConfig};
pub use deferred::Deferred;
pub use font::{FontError, FontLoad, Typeface};
pub use glyph::{extrude_text, TextStyle};
pub use input::{Action, InputController};
pub use light::{LightHandle, LightRig, PointLight};
pub use mesh::Mesh;
pub use render::{Compositor, Frame, FrameError, HeadlessCompositor, Renderer};
pub use scene::{GlyphObject, Scene};
pub use shading::{Material, MaterialKind};
pub use shell::WindowInitError;
