use anyhow::{anyhow, bail, Context, Result};
use glam::{Vec2, Vec3};
use roxmltree::{Document, Node};
use serde::{Deserialize, Serialize};

use crate::glyph::TextStyle;
use crate::shading::MaterialKind;

/// Typeface bundled with the crate, relative to the working directory.
pub const DEFAULT_FONT: &str = "assets/blocky.typeface.json";

/// Everything that can be tuned about the scene.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneConfig {
    /// Path (native) or URL (web) of the typeface.
    pub font: String,
    pub camera: CameraConfig,
    pub light: LightConfig,
    pub glyphs: Vec<GlyphSpec>,
    pub bloom: BloomSettings,
    pub controls: ControlsConfig,
    pub animation: AnimationConfig,
}

impl Default for SceneConfig {
    fn default() -> Self {
        Self {
            font: DEFAULT_FONT.to_string(),
            camera: CameraConfig::default(),
            light: LightConfig::default(),
            glyphs: vec![
                GlyphSpec {
                    label: "letter".into(),
                    text: "L".into(),
                    material: MaterialKind::Plastic,
                    color: hex_color(0x00a19c),
                    ambient: 0.2,
                    position: Vec3::new(-2.0, 0.0, 0.0),
                    style: TextStyle::default(),
                },
                GlyphSpec {
                    label: "digit".into(),
                    text: "7".into(),
                    material: MaterialKind::Metal,
                    color: hex_color(0xff5e63),
                    ambient: 0.2,
                    position: Vec3::new(2.0, 0.0, 0.0),
                    style: TextStyle::default(),
                },
            ],
            bloom: BloomSettings::default(),
            controls: ControlsConfig::default(),
            animation: AnimationConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub position: Vec3,
    pub fov: f32,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 5.0),
            fov: 75.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LightConfig {
    pub position: Vec3,
    pub color: Vec3,
    pub intensity: f32,
    pub distance: f32,
    /// Edge length of the marker cube.
    pub size: f32,
}

impl Default for LightConfig {
    fn default() -> Self {
        Self {
            position: Vec3::new(0.0, 0.0, 2.0),
            color: Vec3::ONE,
            intensity: 1.0,
            distance: 100.0,
            size: 0.3,
        }
    }
}

/// Description of one glyph object, built once the font is available.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlyphSpec {
    pub label: String,
    pub text: String,
    pub material: MaterialKind,
    pub color: Vec3,
    pub ambient: f32,
    pub position: Vec3,
    pub style: TextStyle,
}

/// Glow pass parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BloomSettings {
    pub strength: f32,
    pub radius: f32,
    pub threshold: f32,
}

impl Default for BloomSettings {
    fn default() -> Self {
        Self {
            strength: 1.5,
            radius: 0.4,
            threshold: 0.85,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ControlsConfig {
    pub marker_step: f32,
    pub camera_step: f32,
    pub up: String,
    pub down: String,
    pub left: String,
    pub right: String,
}

impl Default for ControlsConfig {
    fn default() -> Self {
        Self {
            marker_step: 2.0,
            camera_step: 0.1,
            up: "w".into(),
            down: "s".into(),
            left: "a".into(),
            right: "d".into(),
        }
    }
}

impl ControlsConfig {
    /// Each key may drive at most one action.
    pub fn check_bindings(&self) -> Result<()> {
        let keys = [&self.up, &self.down, &self.left, &self.right];
        for (index, key) in keys.iter().enumerate() {
            if keys[..index].contains(key) {
                bail!("key {key:?} is bound to more than one action");
            }
        }
        Ok(())
    }
}

/// Per-frame increments. They are applied once per redraw, not per second.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnimationConfig {
    pub time_step: f32,
    pub spin: Vec2,
}

impl Default for AnimationConfig {
    fn default() -> Self {
        Self {
            time_step: 0.05,
            spin: Vec2::splat(0.01),
        }
    }
}

impl SceneConfig {
    /// Overlays the values found in a scene XML document onto the defaults.
    pub fn from_xml(xml: &str) -> Result<Self> {
        let document = Document::parse(xml).context("invalid scene XML")?;
        let root = document.root_element();
        let mut config = Self::default();

        if let Some(font) = optional_text(&root, "font") {
            config.font = font;
        }
        if let Some(node) = child(&root, "camera") {
            let camera = &mut config.camera;
            camera.position = parse_vec3(optional_text(&node, "position"), camera.position)
                .context("camera position")?;
            camera.fov = parse_f32(optional_text(&node, "fov"), camera.fov).context("camera fov")?;
        }
        if let Some(node) = child(&root, "light") {
            let light = &mut config.light;
            light.position = parse_vec3(optional_text(&node, "position"), light.position)
                .context("light position")?;
            light.color =
                parse_color(optional_text(&node, "color"), light.color).context("light color")?;
            light.intensity = parse_f32(optional_text(&node, "intensity"), light.intensity)
                .context("light intensity")?;
            light.distance = parse_f32(optional_text(&node, "distance"), light.distance)
                .context("light distance")?;
            light.size = parse_f32(optional_text(&node, "size"), light.size).context("marker size")?;
        }

        let glyphs = root
            .children()
            .filter(|n| n.has_tag_name("glyph"))
            .enumerate()
            .map(|(index, node)| {
                parse_glyph(&node).with_context(|| format!("glyph #{}", index + 1))
            })
            .collect::<Result<Vec<_>>>()?;
        if !glyphs.is_empty() {
            config.glyphs = glyphs;
        }

        if let Some(node) = child(&root, "bloom") {
            let bloom = &mut config.bloom;
            bloom.strength = parse_f32(optional_text(&node, "strength"), bloom.strength)
                .context("bloom strength")?;
            bloom.radius =
                parse_f32(optional_text(&node, "radius"), bloom.radius).context("bloom radius")?;
            bloom.threshold = parse_f32(optional_text(&node, "threshold"), bloom.threshold)
                .context("bloom threshold")?;
        }
        if let Some(node) = child(&root, "controls") {
            let controls = &mut config.controls;
            controls.marker_step =
                parse_f32(optional_text(&node, "marker-step"), controls.marker_step)
                    .context("marker step")?;
            controls.camera_step =
                parse_f32(optional_text(&node, "camera-step"), controls.camera_step)
                    .context("camera step")?;
            for (tag, key) in [
                ("up", &mut controls.up),
                ("down", &mut controls.down),
                ("left", &mut controls.left),
                ("right", &mut controls.right),
            ] {
                if let Some(value) = optional_text(&node, tag) {
                    *key = value;
                }
            }
            controls.check_bindings().context("controls")?;
        }
        if let Some(node) = child(&root, "animation") {
            let animation = &mut config.animation;
            animation.time_step = parse_f32(optional_text(&node, "time-step"), animation.time_step)
                .context("time step")?;
            animation.spin =
                parse_vec2(optional_text(&node, "spin"), animation.spin).context("spin")?;
        }

        Ok(config)
    }
}

fn parse_glyph(node: &Node<'_, '_>) -> Result<GlyphSpec> {
    let text = required_text(node, "text")?;
    let material = match optional_text(node, "material") {
        Some(name) => MaterialKind::from_name(&name)
            .ok_or_else(|| anyhow!("unknown material {name:?}"))?,
        None => MaterialKind::Plastic,
    };
    let defaults = TextStyle::default();
    Ok(GlyphSpec {
        label: optional_text(node, "label").unwrap_or_else(|| text.clone()),
        material,
        color: parse_color(optional_text(node, "color"), Vec3::ONE)?,
        ambient: parse_f32(optional_text(node, "ambient"), 0.2)?,
        position: parse_vec3(optional_text(node, "position"), Vec3::ZERO)?,
        style: TextStyle {
            size: parse_f32(optional_text(node, "size"), defaults.size)?,
            depth: parse_f32(optional_text(node, "depth"), defaults.depth)?,
        },
        text,
    })
}

fn hex_color(rgb: u32) -> Vec3 {
    Vec3::new(
        ((rgb >> 16) & 0xff) as f32 / 255.0,
        ((rgb >> 8) & 0xff) as f32 / 255.0,
        (rgb & 0xff) as f32 / 255.0,
    )
}

fn child<'a, 'input>(node: &Node<'a, 'input>, tag: &str) -> Option<Node<'a, 'input>> {
    node.children().find(|n| n.has_tag_name(tag))
}

fn required_text(node: &Node<'_, '_>, tag: &str) -> Result<String> {
    optional_text(node, tag).ok_or_else(|| anyhow!("<{tag}> tag is missing"))
}

fn optional_text(node: &Node<'_, '_>, tag: &str) -> Option<String> {
    child(node, tag)
        .and_then(|child| child.text())
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(|text| text.to_string())
}

fn parse_numbers<const N: usize>(value: &str, what: &str) -> Result<[f32; N]> {
    let mut numbers = [0.0; N];
    let mut parts = value.split_whitespace();
    for slot in numbers.iter_mut() {
        let part = parts
            .next()
            .ok_or_else(|| anyhow!("{what} is missing components"))?;
        *slot = part
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse {what} component {part:?}: {err}"))?;
    }
    if parts.next().is_some() {
        bail!("{what} has more than {N} components");
    }
    Ok(numbers)
}

fn parse_vec3(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    parse_numbers::<3>(&value, "vector").map(Vec3::from_array)
}

fn parse_vec2(value: Option<String>, default: Vec2) -> Result<Vec2> {
    let Some(value) = value else {
        return Ok(default);
    };
    parse_numbers::<2>(&value, "vector").map(Vec2::from_array)
}

fn parse_color(value: Option<String>, default: Vec3) -> Result<Vec3> {
    let Some(value) = value else {
        return Ok(default);
    };
    if let Some(hex) = value.strip_prefix('#') {
        if hex.len() != 6 || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
            bail!("invalid hex color {value:?}");
        }
        let rgb = u32::from_str_radix(hex, 16)
            .map_err(|err| anyhow!("invalid hex color {value:?}: {err}"))?;
        return Ok(hex_color(rgb));
    }
    parse_numbers::<3>(&value, "color").map(|rgb| Vec3::from_array(rgb) / 255.0)
}

fn parse_f32(value: Option<String>, default: f32) -> Result<f32> {
    match value {
        Some(value) => value
            .parse::<f32>()
            .map_err(|err| anyhow!("failed to parse float {value:?}: {err}")),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_describe_the_reference_scene() {
        let config = SceneConfig::default();
        assert_eq!(config.glyphs.len(), 2);
        let letter = &config.glyphs[0];
        assert_eq!(letter.text, "L");
        assert_eq!(letter.material, MaterialKind::Plastic);
        assert_eq!(letter.color, Vec3::new(0.0, 161.0 / 255.0, 156.0 / 255.0));
        let digit = &config.glyphs[1];
        assert_eq!(digit.text, "7");
        assert_eq!(digit.material, MaterialKind::Metal);
        assert_eq!(config.controls.marker_step, 2.0);
        assert_eq!(config.animation.time_step, 0.05);
    }

    #[test]
    fn xml_overrides_selected_values() {
        let xml = r##"
        <scene>
            <font>fonts/other.json</font>
            <light><position>1 2 3</position><color>#ff8000</color></light>
            <glyph>
                <label>initial</label>
                <text>A</text>
                <material>metal</material>
                <color>255 0 0</color>
                <position>0 1 0</position>
            </glyph>
            <bloom><strength>0.5</strength></bloom>
            <controls><marker-step>0.5</marker-step><up>k</up></controls>
            <animation><spin>0.02 0</spin></animation>
        </scene>
        "##;
        let config = SceneConfig::from_xml(xml).unwrap();
        assert_eq!(config.font, "fonts/other.json");
        assert_eq!(config.light.position, Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(config.light.color, Vec3::new(1.0, 128.0 / 255.0, 0.0));
        assert_eq!(config.light.intensity, 1.0);
        assert_eq!(config.glyphs.len(), 1);
        assert_eq!(config.glyphs[0].label, "initial");
        assert_eq!(config.glyphs[0].material, MaterialKind::Metal);
        assert_eq!(config.glyphs[0].color, Vec3::X);
        assert_eq!(config.bloom.strength, 0.5);
        assert_eq!(config.bloom.threshold, 0.85);
        assert_eq!(config.controls.marker_step, 0.5);
        assert_eq!(config.controls.up, "k");
        assert_eq!(config.controls.down, "s");
        assert_eq!(config.animation.spin, Vec2::new(0.02, 0.0));
    }

    #[test]
    fn glyph_without_text_is_an_error() {
        let xml = "<scene><glyph><label>x</label></glyph></scene>";
        assert!(SceneConfig::from_xml(xml).is_err());
    }

    #[test]
    fn bad_values_are_errors() {
        assert!(SceneConfig::from_xml("<scene><camera><fov>wide</fov></camera></scene>").is_err());
        assert!(SceneConfig::from_xml("<scene><light><position>1 2</position></light></scene>").is_err());
        assert!(SceneConfig::from_xml(
            "<scene><glyph><text>A</text><material>glass</material></glyph></scene>"
        )
        .is_err());
        assert!(SceneConfig::from_xml("<scene><light><color>#12</color></light></scene>").is_err());
    }

    #[test]
    fn signed_hex_colors_are_rejected() {
        let xml = "<scene><light><color>#+12345</color></light></scene>";
        assert!(SceneConfig::from_xml(xml).is_err());
        let xml = "<scene><light><color>#-12345</color></light></scene>";
        assert!(SceneConfig::from_xml(xml).is_err());
    }

    #[test]
    fn one_key_cannot_drive_two_actions() {
        let xml = "<scene><controls><up>d</up></controls></scene>";
        let err = SceneConfig::from_xml(xml).unwrap_err();
        assert!(format!("{err:#}").contains("bound to more than one action"));

        let swapped = "<scene><controls><up>s</up><down>w</down></controls></scene>";
        let config = SceneConfig::from_xml(swapped).unwrap();
        assert_eq!(config.controls.up, "s");
        assert_eq!(config.controls.down, "w");
    }
}
