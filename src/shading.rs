//! Per-fragment lighting used by the glyph materials.
//!
//! The CPU evaluation in [`shade`] mirrors the WGSL `phong` helper in
//! [`crate::render::shaders`] term for term, so the numbers produced here are
//! the numbers the GPU draws (up to floating point differences between the
//! two). All vectors are expected in view space.

use glam::{Mat3, Vec3};
use serde::{Deserialize, Serialize};

use crate::light::LightHandle;
use crate::render::shaders;

/// Gray highlight shared by every plastic surface.
pub const PLASTIC_SPECULAR: Vec3 = Vec3::splat(0.3);

/// Surface finish of a lit glyph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MaterialKind {
    /// Dielectric with a dim gray highlight.
    Plastic,
    /// Conductor whose highlight takes the base hue.
    Metal,
}

impl MaterialKind {
    pub const ALL: [MaterialKind; 2] = [MaterialKind::Plastic, MaterialKind::Metal];

    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "plastic" => Some(Self::Plastic),
            "metal" => Some(Self::Metal),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Plastic => "plastic",
            Self::Metal => "metal",
        }
    }

    /// Specular exponent applied by this finish.
    pub fn shininess(self) -> f32 {
        match self {
            Self::Plastic => 16.0,
            Self::Metal => 32.0,
        }
    }

    /// Color the highlight is multiplied by for a surface of `diffuse` color.
    pub fn specular_tint(self, diffuse: Vec3) -> Vec3 {
        match self {
            Self::Plastic => PLASTIC_SPECULAR,
            Self::Metal => diffuse,
        }
    }
}

/// Flattened material inputs for one evaluation of [`shade`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadingParams {
    pub ambient_intensity: f32,
    pub diffuse_color: Vec3,
    pub shininess: f32,
    pub specular_tint: Vec3,
}

/// Geometry of one fragment, in view space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadingInput {
    pub normal: Vec3,
    pub fragment_position: Vec3,
    pub light_position: Vec3,
}

/// Lighting contributions kept apart, mostly useful for inspection.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShadingTerms {
    pub ambient: Vec3,
    pub diffuse: Vec3,
    pub specular: Vec3,
}

impl ShadingTerms {
    pub fn total(&self) -> Vec3 {
        self.ambient + self.diffuse + self.specular
    }
}

/// Evaluates ambient, diffuse and specular terms separately.
pub fn shade_terms(input: &ShadingInput, params: &ShadingParams) -> ShadingTerms {
    let normal = input.normal.normalize_or_zero();
    let ambient = params.ambient_intensity * params.diffuse_color;

    let light_dir = (input.light_position - input.fragment_position).normalize_or_zero();
    let diffuse = normal.dot(light_dir).max(0.0) * params.diffuse_color;

    let view_dir = (-input.fragment_position).normalize_or_zero();
    let reflect_dir = reflect(-light_dir, normal);
    let specular =
        view_dir.dot(reflect_dir).max(0.0).powf(params.shininess) * params.specular_tint;

    ShadingTerms {
        ambient,
        diffuse,
        specular,
    }
}

/// Phong color of a fragment. Alpha is always one and therefore omitted.
pub fn shade(input: &ShadingInput, params: &ShadingParams) -> Vec3 {
    shade_terms(input, params).total()
}

/// GLSL/WGSL `reflect`: mirrors `incident` about `normal`.
pub fn reflect(incident: Vec3, normal: Vec3) -> Vec3 {
    incident - 2.0 * normal.dot(incident) * normal
}

/// Applies a normal matrix and renormalizes, undoing non-uniform scale.
pub fn transform_normal(normal_matrix: Mat3, normal: Vec3) -> Vec3 {
    (normal_matrix * normal).normalize_or_zero()
}

/// A lit material bound to the scene's point light.
#[derive(Debug, Clone)]
pub struct Material {
    pub kind: MaterialKind,
    pub ambient_intensity: f32,
    pub diffuse_color: Vec3,
    light: LightHandle,
}

impl Material {
    pub fn new(
        kind: MaterialKind,
        ambient_intensity: f32,
        diffuse_color: Vec3,
        light: LightHandle,
    ) -> Self {
        Self {
            kind,
            ambient_intensity,
            diffuse_color,
            light,
        }
    }

    /// Current world position of the bound light.
    pub fn light_position(&self) -> Vec3 {
        self.light.get()
    }

    pub fn params(&self) -> ShadingParams {
        ShadingParams {
            ambient_intensity: self.ambient_intensity,
            diffuse_color: self.diffuse_color,
            shininess: self.kind.shininess(),
            specular_tint: self.kind.specular_tint(self.diffuse_color),
        }
    }
}

/// WGSL sources for one material program. The module handed to the GPU is
/// the concatenation of the three parts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShaderProgram {
    pub prelude: &'static str,
    pub vertex: &'static str,
    pub fragment: &'static str,
}

impl ShaderProgram {
    pub fn source(&self) -> String {
        [self.prelude, self.vertex, self.fragment].join("\n")
    }
}

const PROGRAMS: [(MaterialKind, ShaderProgram); 2] = [
    (
        MaterialKind::Plastic,
        ShaderProgram {
            prelude: shaders::LIT_PRELUDE,
            vertex: shaders::LIT_VERTEX,
            fragment: shaders::PLASTIC_FRAGMENT,
        },
    ),
    (
        MaterialKind::Metal,
        ShaderProgram {
            prelude: shaders::LIT_PRELUDE,
            vertex: shaders::LIT_VERTEX,
            fragment: shaders::METAL_FRAGMENT,
        },
    ),
];

/// Flat white program used by the light marker.
pub const EMISSIVE_PROGRAM: ShaderProgram = ShaderProgram {
    prelude: shaders::LIT_PRELUDE,
    vertex: shaders::LIT_VERTEX,
    fragment: shaders::EMISSIVE_FRAGMENT,
};

/// Looks up the program that renders `kind`.
pub fn program(kind: MaterialKind) -> ShaderProgram {
    PROGRAMS
        .iter()
        .find(|(entry, _)| *entry == kind)
        .map(|(_, program)| *program)
        .unwrap_or(EMISSIVE_PROGRAM)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(kind: MaterialKind, diffuse: Vec3) -> ShadingParams {
        ShadingParams {
            ambient_intensity: 0.2,
            diffuse_color: diffuse,
            shininess: kind.shininess(),
            specular_tint: kind.specular_tint(diffuse),
        }
    }

    // Light and eye share the same side so the highlight is non-zero.
    fn facing_input() -> ShadingInput {
        ShadingInput {
            normal: Vec3::Z,
            fragment_position: Vec3::new(0.0, 0.0, -5.0),
            light_position: Vec3::new(0.5, 0.5, 0.0),
        }
    }

    #[test]
    fn shading_is_bit_reproducible() {
        let input = facing_input();
        let params = params(MaterialKind::Metal, Vec3::new(1.0, 0.37, 0.39));
        let first = shade(&input, &params);
        for _ in 0..16 {
            let again = shade(&input, &params);
            assert_eq!(first.to_array().map(f32::to_bits), again.to_array().map(f32::to_bits));
        }
    }

    #[test]
    fn metal_highlight_follows_diffuse_color() {
        let input = facing_input();
        let red = Vec3::new(1.0, 0.0, 0.0);
        let teal = Vec3::new(0.0, 0.63, 0.61);

        let metal_red = shade_terms(&input, &params(MaterialKind::Metal, red)).specular;
        let metal_teal = shade_terms(&input, &params(MaterialKind::Metal, teal)).specular;
        assert!(metal_red.x > 0.0);
        assert_eq!(metal_red.y, 0.0);
        assert_eq!(metal_teal.x, 0.0);
        let scale = metal_red.x / red.x;
        assert!((metal_teal - teal * scale).abs().max_element() < 1e-6);

        let plastic_red = shade_terms(&input, &params(MaterialKind::Plastic, red)).specular;
        let plastic_teal = shade_terms(&input, &params(MaterialKind::Plastic, teal)).specular;
        assert!(plastic_red.x > 0.0);
        assert_eq!(plastic_red, plastic_teal);
        assert_eq!(plastic_red.x, plastic_red.y);
        assert_eq!(plastic_red.y, plastic_red.z);
    }

    #[test]
    fn back_facing_light_leaves_only_ambient() {
        let input = ShadingInput {
            normal: Vec3::Z,
            fragment_position: Vec3::new(0.0, 0.0, -5.0),
            light_position: Vec3::new(0.0, 0.0, -10.0),
        };
        let color = Vec3::new(0.4, 0.6, 0.8);
        let terms = shade_terms(&input, &params(MaterialKind::Plastic, color));
        assert_eq!(terms.diffuse, Vec3::ZERO);
        assert_eq!(terms.specular, Vec3::ZERO);
        assert!((terms.total() - color * 0.2).abs().max_element() < 1e-6);
    }

    #[test]
    fn unnormalized_normals_shade_like_unit_normals() {
        let mut input = facing_input();
        let params = params(MaterialKind::Plastic, Vec3::new(0.2, 0.5, 0.9));
        let unit = shade(&input, &params);
        input.normal = Vec3::new(0.0, 0.0, 7.5);
        let scaled = shade(&input, &params);
        assert!((unit - scaled).abs().max_element() < 1e-6);
    }

    #[test]
    fn normal_matrix_output_is_unit_length() {
        let model = Mat3::from_diagonal(Vec3::new(4.0, 1.0, 0.25));
        let normal_matrix = model.inverse().transpose();
        let n = transform_normal(normal_matrix, Vec3::new(1.0, 1.0, 0.0).normalize());
        assert!((n.length() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn program_table_covers_every_material() {
        for kind in MaterialKind::ALL {
            let program = program(kind);
            assert_ne!(program, EMISSIVE_PROGRAM);
            assert!(program.fragment.contains("fs_main"));
            assert!(program.vertex.contains("vs_main"));
            let exponent = format!("{:.1}", kind.shininess());
            assert!(program.fragment.contains(&exponent), "{kind:?} uses {exponent}");
        }
        assert_ne!(program(MaterialKind::Plastic), program(MaterialKind::Metal));
    }

    #[test]
    fn material_reads_live_light_position() {
        let handle = LightHandle::new(Vec3::ZERO);
        let material = Material::new(MaterialKind::Metal, 0.2, Vec3::ONE, handle.clone());
        handle.set(Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(material.light_position(), Vec3::new(1.0, 2.0, 3.0));
    }

    #[test]
    fn material_names_round_trip() {
        for kind in MaterialKind::ALL {
            assert_eq!(MaterialKind::from_name(kind.name()), Some(kind));
        }
        assert_eq!(MaterialKind::from_name(" Metal "), Some(MaterialKind::Metal));
        assert_eq!(MaterialKind::from_name("glass"), None);
    }
}
