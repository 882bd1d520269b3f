//! Two-stage frame rendering: the lit scene into an offscreen target, then
//! the bloom compositor onto the window surface.

mod bloom;
mod gpu;
pub mod shaders;

use glam::{Mat4, Vec3};
use thiserror::Error;

use crate::config::BloomSettings;
use crate::scene::GlyphObject;

pub use bloom::BloomPass;
pub use gpu::Renderer;

/// Everything the renderer needs to draw one frame.
#[derive(Debug, Clone, Copy)]
pub struct Frame<'a> {
    pub view: Mat4,
    pub projection: Mat4,
    pub marker_model: Mat4,
    pub light_position: Vec3,
    pub glyphs: &'a [GlyphObject],
    pub bloom: BloomSettings,
}

/// Errors a compositor can report for a single frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    #[error("surface was lost")]
    Lost,
    #[error("surface is outdated")]
    Outdated,
    #[error("timed out acquiring the next surface texture")]
    Timeout,
    #[error("GPU is out of memory")]
    OutOfMemory,
    #[error("surface error: {0}")]
    Other(String),
}

impl From<wgpu::SurfaceError> for FrameError {
    fn from(err: wgpu::SurfaceError) -> Self {
        match err {
            wgpu::SurfaceError::Lost => Self::Lost,
            wgpu::SurfaceError::Outdated => Self::Outdated,
            wgpu::SurfaceError::Timeout => Self::Timeout,
            wgpu::SurfaceError::OutOfMemory => Self::OutOfMemory,
            other => Self::Other(other.to_string()),
        }
    }
}

/// Final stage of a tick: turns a [`Frame`] into pixels.
pub trait Compositor {
    fn composite(&mut self, frame: &Frame<'_>) -> Result<(), FrameError>;
}

/// Compositor that draws nothing and only keeps statistics, used by the
/// headless run and by tests.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct HeadlessCompositor {
    pub frames: u64,
    pub last_glyph_count: usize,
    pub last_light_position: Option<Vec3>,
}

impl Compositor for HeadlessCompositor {
    fn composite(&mut self, frame: &Frame<'_>) -> Result<(), FrameError> {
        self.frames += 1;
        self.last_glyph_count = frame.glyphs.len();
        self.last_light_position = Some(frame.light_position);
        Ok(())
    }
}
