use glam::Vec3;
use log::debug;
use serde::{Deserialize, Serialize};

use crate::font::{GlyphBitmap, Typeface};
use crate::mesh::{Face, Mesh};

/// Cells a space or an unknown character advances the pen by.
const BLANK_ADVANCE: usize = 3;

/// Size of extruded text.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    /// Height of a full glyph row stack.
    pub size: f32,
    /// Extrusion along +Z.
    pub depth: f32,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            size: 1.0,
            depth: 0.2,
        }
    }
}

/// Builds a solid mesh for `text`.
///
/// Every filled cell becomes a box from `z = 0` to `z = depth`. Front and back
/// faces are always emitted; side faces only where the neighboring cell is
/// empty, so shared walls inside a glyph are skipped. The origin is the
/// bottom-left corner of the first glyph.
pub fn extrude_text(face: &Typeface, text: &str, style: TextStyle) -> Mesh {
    let cell = style.size / face.rows() as f32;
    let mut mesh = Mesh::new();
    let mut pen = 0usize;

    for ch in text.chars() {
        match face.glyph(ch) {
            Some(glyph) => {
                extrude_glyph(&mut mesh, glyph, pen as f32 * cell, cell, style.depth);
                pen += glyph.width() + 1;
            }
            None => {
                if !ch.is_whitespace() {
                    debug!("typeface {} has no glyph for {ch:?}", face.family_name);
                }
                pen += BLANK_ADVANCE;
            }
        }
    }
    mesh
}

fn extrude_glyph(mesh: &mut Mesh, glyph: &GlyphBitmap, origin_x: f32, cell: f32, depth: f32) {
    let rows = glyph.height() as isize;
    for row in 0..rows {
        for column in 0..glyph.width() as isize {
            if !glyph.filled(column, row) {
                continue;
            }
            let x = origin_x + column as f32 * cell;
            let y = (rows - 1 - row) as f32 * cell;
            let min = Vec3::new(x, y, 0.0);
            let max = Vec3::new(x + cell, y + cell, depth);

            mesh.push_box_face(min, max, Face::Front);
            mesh.push_box_face(min, max, Face::Back);
            // Rows grow downwards in the bitmap, Y grows upwards in the mesh.
            let neighbors = [
                (Face::Left, column - 1, row),
                (Face::Right, column + 1, row),
                (Face::Top, column, row - 1),
                (Face::Bottom, column, row + 1),
            ];
            for (side, neighbor_column, neighbor_row) in neighbors {
                if !glyph.filled(neighbor_column, neighbor_row) {
                    mesh.push_box_face(min, max, side);
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn face() -> Typeface {
        Typeface::from_json(
            r####"{
                "familyName": "Test",
                "rows": 2,
                "glyphs": {
                    "o": ["#.", ".."],
                    "-": ["##", ".."],
                    "L": ["#.", "##"]
                }
            }"####,
        )
        .unwrap()
    }

    fn quads(mesh: &Mesh) -> usize {
        mesh.indices.len() / 6
    }

    #[test]
    fn single_cell_is_a_closed_box() {
        let mesh = extrude_text(&face(), "o", TextStyle { size: 2.0, depth: 0.5 });
        assert_eq!(quads(&mesh), 6);
        let (min, max) = mesh.bounds().unwrap();
        assert_eq!(min, Vec3::new(0.0, 1.0, 0.0));
        assert_eq!(max, Vec3::new(1.0, 2.0, 0.5));
    }

    #[test]
    fn shared_walls_are_skipped() {
        let bar = extrude_text(&face(), "-", TextStyle::default());
        assert_eq!(quads(&bar), 10);
        let l = extrude_text(&face(), "L", TextStyle::default());
        // Three cells: six caps plus eight exposed sides.
        assert_eq!(quads(&l), 14);
    }

    #[test]
    fn glyphs_advance_by_width_plus_spacing() {
        let mesh = extrude_text(&face(), "oo", TextStyle { size: 2.0, depth: 1.0 });
        assert_eq!(quads(&mesh), 12);
        let (_, max) = mesh.bounds().unwrap();
        assert_eq!(max.x, 4.0);
    }

    #[test]
    fn unknown_characters_only_advance() {
        let mesh = extrude_text(&face(), "?o", TextStyle { size: 2.0, depth: 1.0 });
        assert_eq!(quads(&mesh), 6);
        let (min, _) = mesh.bounds().unwrap();
        assert_eq!(min.x, BLANK_ADVANCE as f32);
        assert!(extrude_text(&face(), "  ", TextStyle::default()).is_empty());
    }
}
