use glam::{Mat4, Vec3};
use log::{debug, info};

use crate::config::{GlyphSpec, LightConfig};
use crate::font::Typeface;
use crate::glyph::extrude_text;
use crate::light::{LightRig, PointLight};
use crate::mesh::Mesh;
use crate::shading::Material;

/// Extruded text drawn with one lit material.
#[derive(Debug, Clone)]
pub struct GlyphObject {
    pub label: String,
    pub text: String,
    pub position: Vec3,
    pub material: Material,
    pub mesh: Mesh,
}

impl GlyphObject {
    pub fn model_matrix(&self) -> Mat4 {
        Mat4::from_translation(self.position)
    }
}

/// The light rig plus the glyphs that appear once the font is available.
#[derive(Debug, Clone)]
pub struct Scene {
    pub rig: LightRig,
    glyph_specs: Vec<GlyphSpec>,
    glyphs: Vec<GlyphObject>,
}

impl Scene {
    pub fn new(light: &LightConfig, glyph_specs: Vec<GlyphSpec>) -> Self {
        let point = PointLight::new(light.position, light.color, light.intensity, light.distance);
        Self {
            rig: LightRig::new(point, light.size),
            glyph_specs,
            glyphs: Vec::new(),
        }
    }

    pub fn glyphs(&self) -> &[GlyphObject] {
        &self.glyphs
    }

    pub fn glyph_specs(&self) -> &[GlyphSpec] {
        &self.glyph_specs
    }

    pub fn has_glyphs(&self) -> bool {
        !self.glyphs.is_empty()
    }

    /// Builds every configured glyph from `face`. Runs at most once; later
    /// calls keep the existing objects and return zero.
    pub fn attach_glyphs(&mut self, face: &Typeface) -> usize {
        if self.has_glyphs() {
            return 0;
        }
        let light = self.rig.handle();
        self.glyphs = self
            .glyph_specs
            .iter()
            .map(|spec| {
                let mesh = extrude_text(face, &spec.text, spec.style);
                debug!(
                    "built glyph {} ({:?}) with {} triangles",
                    spec.label,
                    spec.text,
                    mesh.triangle_count()
                );
                GlyphObject {
                    label: spec.label.clone(),
                    text: spec.text.clone(),
                    position: spec.position,
                    material: Material::new(spec.material, spec.ambient, spec.color, light.clone()),
                    mesh,
                }
            })
            .collect();
        info!(
            "attached {} glyph(s) using typeface {}",
            self.glyphs.len(),
            face.family_name
        );
        self.glyphs.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SceneConfig;
    use crate::shading::MaterialKind;

    fn face() -> Typeface {
        Typeface::from_json(include_str!("../assets/blocky.typeface.json")).unwrap()
    }

    fn scene() -> Scene {
        let config = SceneConfig::default();
        Scene::new(&config.light, config.glyphs)
    }

    #[test]
    fn glyphs_start_absent() {
        let scene = scene();
        assert!(!scene.has_glyphs());
        assert_eq!(scene.glyph_specs().len(), 2);
    }

    #[test]
    fn attaching_builds_each_glyph_once() {
        let mut scene = scene();
        assert_eq!(scene.attach_glyphs(&face()), 2);
        assert_eq!(scene.attach_glyphs(&face()), 0);
        let glyphs = scene.glyphs();
        assert_eq!(glyphs.len(), 2);
        assert_eq!(glyphs[0].material.kind, MaterialKind::Plastic);
        assert_eq!(glyphs[1].material.kind, MaterialKind::Metal);
        assert!(glyphs.iter().all(|glyph| !glyph.mesh.is_empty()));
        assert_eq!(glyphs[0].position, Vec3::new(-2.0, 0.0, 0.0));
    }

    #[test]
    fn glyph_materials_follow_the_light() {
        let mut scene = scene();
        scene.attach_glyphs(&face());
        scene.rig.move_marker(Vec3::new(0.0, 6.0, 2.0));
        for glyph in scene.glyphs() {
            assert_eq!(glyph.material.light_position(), Vec3::new(0.0, 6.0, 2.0));
        }
    }
}
