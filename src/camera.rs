use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

/// Size of the drawable surface in physical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: u32,
    pub height: u32,
}

impl Viewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.width as f32 / self.height as f32
    }
}

/// Perspective camera looking down -Z.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub position: Vec3,
    pub fov_y_degrees: f32,
    pub near: f32,
    pub far: f32,
    aspect: f32,
}

impl Camera {
    pub fn new(position: Vec3, fov_y_degrees: f32, viewport: Viewport) -> Self {
        Self {
            position,
            fov_y_degrees,
            near: 0.1,
            far: 1000.0,
            aspect: viewport.aspect(),
        }
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    /// Recomputes the aspect ratio from the viewport. Calling it again with
    /// the same viewport changes nothing.
    pub fn fit(&mut self, viewport: Viewport) {
        self.aspect = viewport.aspect();
    }

    pub fn view(&self) -> Mat4 {
        Mat4::look_to_rh(self.position, Vec3::NEG_Z, Vec3::Y)
    }

    pub fn projection(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.fov_y_degrees.to_radians(),
            self.aspect.max(0.01),
            self.near,
            self.far,
        )
    }
}
