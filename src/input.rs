use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::camera::Camera;
use crate::config::ControlsConfig;
use crate::light::LightRig;

/// What a bound key does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    MarkerUp,
    MarkerDown,
    CameraLeft,
    CameraRight,
}

/// Turns key-down identifiers into marker and camera offsets.
///
/// Offsets are displacements from the marker height and camera X the
/// controller was created with. Every event applies one step; repeats sent
/// by the host are treated like fresh presses.
#[derive(Debug, Clone)]
pub struct InputController {
    bindings: HashMap<String, Action>,
    marker_step: f32,
    camera_step: f32,
    marker_offset: f32,
    camera_offset: f32,
    base_marker_y: f32,
    base_camera_x: f32,
}

impl InputController {
    pub fn new(controls: &ControlsConfig, rig: &LightRig, camera: &Camera) -> Self {
        let bindings = [
            (controls.up.clone(), Action::MarkerUp),
            (controls.down.clone(), Action::MarkerDown),
            (controls.left.clone(), Action::CameraLeft),
            (controls.right.clone(), Action::CameraRight),
        ]
        .into_iter()
        .collect();
        Self {
            bindings,
            marker_step: controls.marker_step,
            camera_step: controls.camera_step,
            marker_offset: 0.0,
            camera_offset: 0.0,
            base_marker_y: rig.marker_position().y,
            base_camera_x: camera.position.x,
        }
    }

    pub fn action_for(&self, key: &str) -> Option<Action> {
        self.bindings.get(key).copied()
    }

    pub fn marker_offset(&self) -> f32 {
        self.marker_offset
    }

    pub fn camera_offset(&self) -> f32 {
        self.camera_offset
    }

    /// Applies one key-down event. Unbound keys change nothing and return
    /// `None`.
    pub fn handle_key(&mut self, key: &str, rig: &mut LightRig, camera: &mut Camera) -> Option<Action> {
        let action = self.action_for(key)?;
        match action {
            Action::MarkerUp => self.marker_offset += self.marker_step,
            Action::MarkerDown => self.marker_offset -= self.marker_step,
            Action::CameraLeft => self.camera_offset -= self.camera_step,
            Action::CameraRight => self.camera_offset += self.camera_step,
        }
        rig.set_marker_y(self.base_marker_y + self.marker_offset);
        camera.position.x = self.base_camera_x + self.camera_offset;
        Some(action)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::Viewport;
    use crate::light::PointLight;
    use glam::Vec3;

    fn setup() -> (InputController, LightRig, Camera) {
        let rig = LightRig::new(
            PointLight::new(Vec3::new(0.5, 0.0, 2.0), Vec3::ONE, 1.0, 100.0),
            0.3,
        );
        let camera = Camera::new(Vec3::new(0.0, 0.0, 5.0), 75.0, Viewport::new(800, 600));
        let controller = InputController::new(&ControlsConfig::default(), &rig, &camera);
        (controller, rig, camera)
    }

    #[test]
    fn repeated_up_presses_accumulate() {
        let (mut input, mut rig, mut camera) = setup();
        for _ in 0..5 {
            assert_eq!(input.handle_key("w", &mut rig, &mut camera), Some(Action::MarkerUp));
        }
        assert_eq!(input.marker_offset(), 10.0);
        for _ in 0..2 {
            input.handle_key("s", &mut rig, &mut camera);
        }
        assert_eq!(input.marker_offset(), 6.0);
        assert_eq!(rig.marker_position(), Vec3::new(0.5, 6.0, 2.0));
        assert_eq!(rig.light_position(), rig.marker_position());
    }

    #[test]
    fn left_and_right_move_the_camera() {
        let (mut input, mut rig, mut camera) = setup();
        input.handle_key("d", &mut rig, &mut camera);
        input.handle_key("d", &mut rig, &mut camera);
        input.handle_key("a", &mut rig, &mut camera);
        assert!((camera.position.x - 0.1).abs() < 1e-6);
        assert_eq!(camera.position.y, 0.0);
        assert_eq!(camera.position.z, 5.0);
        assert_eq!(rig.marker_position(), Vec3::new(0.5, 0.0, 2.0));
    }

    #[test]
    fn unbound_keys_are_ignored() {
        let (mut input, mut rig, mut camera) = setup();
        let before = (rig.marker_position(), camera.position);
        for key in ["W", "q", "ArrowUp", "", " "] {
            assert_eq!(input.handle_key(key, &mut rig, &mut camera), None);
        }
        assert_eq!((rig.marker_position(), camera.position), before);
        assert_eq!(input.marker_offset(), 0.0);
    }

    #[test]
    fn custom_bindings_replace_defaults() {
        let (_, mut rig, mut camera) = setup();
        let controls = ControlsConfig {
            up: "ArrowUp".into(),
            ..ControlsConfig::default()
        };
        let mut input = InputController::new(&controls, &rig, &camera);
        assert_eq!(input.handle_key("w", &mut rig, &mut camera), None);
        assert_eq!(
            input.handle_key("ArrowUp", &mut rig, &mut camera),
            Some(Action::MarkerUp)
        );
        assert_eq!(rig.marker_position().y, 2.0);
    }
}
