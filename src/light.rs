use std::sync::Arc;

use glam::{Mat4, Vec2, Vec3};
use parking_lot::RwLock;

/// Shared, live position of the point light.
///
/// Materials keep a clone of the handle instead of a copied vector, so they
/// always observe the position the light had when the frame is drawn.
#[derive(Debug, Clone, Default)]
pub struct LightHandle {
    position: Arc<RwLock<Vec3>>,
}

impl LightHandle {
    pub fn new(position: Vec3) -> Self {
        Self {
            position: Arc::new(RwLock::new(position)),
        }
    }

    pub fn get(&self) -> Vec3 {
        *self.position.read()
    }

    pub fn set(&self, position: Vec3) {
        *self.position.write() = position;
    }
}

/// Point light that illuminates the glyphs.
#[derive(Debug, Clone)]
pub struct PointLight {
    position: LightHandle,
    pub color: Vec3,
    pub intensity: f32,
    pub distance: f32,
}

impl PointLight {
    pub fn new(position: Vec3, color: Vec3, intensity: f32, distance: f32) -> Self {
        Self {
            position: LightHandle::new(position),
            color,
            intensity,
            distance,
        }
    }

    pub fn position(&self) -> Vec3 {
        self.position.get()
    }

    pub fn handle(&self) -> LightHandle {
        self.position.clone()
    }
}

/// Small white cube drawn where the light is.
#[derive(Debug, Clone, PartialEq)]
pub struct EmissiveMarker {
    position: Vec3,
    rotation: Vec2,
    pub size: f32,
}

impl EmissiveMarker {
    pub fn position(&self) -> Vec3 {
        self.position
    }

    /// Accumulated rotation around the X and Y axes, in radians.
    pub fn rotation(&self) -> Vec2 {
        self.rotation
    }

    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
            * Mat4::from_rotation_y(self.rotation.y)
            * Mat4::from_rotation_x(self.rotation.x)
            * Mat4::from_scale(Vec3::splat(self.size))
    }
}

/// Owns the light and its marker and keeps their positions identical.
///
/// The marker position is private to this type: every mutation goes through
/// a method that writes the light in the same step.
#[derive(Debug, Clone)]
pub struct LightRig {
    light: PointLight,
    marker: EmissiveMarker,
}

impl LightRig {
    pub fn new(light: PointLight, marker_size: f32) -> Self {
        let marker = EmissiveMarker {
            position: light.position(),
            rotation: Vec2::ZERO,
            size: marker_size,
        };
        Self { light, marker }
    }

    pub fn light(&self) -> &PointLight {
        &self.light
    }

    pub fn marker(&self) -> &EmissiveMarker {
        &self.marker
    }

    pub fn handle(&self) -> LightHandle {
        self.light.handle()
    }

    pub fn marker_position(&self) -> Vec3 {
        self.marker.position
    }

    pub fn light_position(&self) -> Vec3 {
        self.light.position()
    }

    /// Moves the marker and the light together.
    pub fn move_marker(&mut self, position: Vec3) {
        self.marker.position = position;
        self.resync();
    }

    /// Sets only the marker height; X and Z stay where they are.
    pub fn set_marker_y(&mut self, y: f32) {
        self.marker.position.y = y;
        self.resync();
    }

    /// Adds to the marker rotation. Angles are never wrapped.
    pub fn spin(&mut self, delta: Vec2) {
        self.marker.rotation += delta;
    }

    /// Copies the full marker position onto the light.
    pub fn resync(&mut self) {
        self.light.position.set(self.marker.position);
    }

    pub fn is_synchronized(&self) -> bool {
        self.marker.position == self.light.position()
    }
}
