//! Block typefaces and their asynchronous loading.
//!
//! A typeface is a JSON document describing each glyph as a grid of
//! filled (`#`) and empty (`.`) cells, top row first:
//!
//! ```json
//! { "familyName": "Blocky", "rows": 3, "glyphs": { "L": ["#..", "#..", "###"] } }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::deferred::Deferred;

/// Errors produced while fetching or validating a typeface.
#[derive(Debug, Error)]
pub enum FontError {
    #[error("failed to read typeface {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("typeface is not valid JSON")]
    Json(#[from] serde_json::Error),
    #[error("glyph {glyph:?} is invalid: {reason}")]
    InvalidGlyph { glyph: String, reason: String },
    #[error("typeface must have at least one row")]
    NoRows,
    #[error("failed to fetch typeface from {url}: {message}")]
    Fetch { url: String, message: String },
}

/// Pending typeface load polled by the frame loop.
pub type FontLoad = Deferred<Typeface, FontError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawTypeface {
    family_name: String,
    rows: usize,
    glyphs: HashMap<String, Vec<String>>,
}

/// One glyph as a grid of filled cells.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlyphBitmap {
    width: usize,
    cells: Vec<Vec<bool>>,
}

impl GlyphBitmap {
    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.cells.len()
    }

    /// Whether the cell at `column`, counted from the left, and `row`,
    /// counted from the top, is filled. Out of range cells are empty.
    pub fn filled(&self, column: isize, row: isize) -> bool {
        if column < 0 || row < 0 {
            return false;
        }
        self.cells
            .get(row as usize)
            .and_then(|cells| cells.get(column as usize))
            .copied()
            .unwrap_or(false)
    }
}

/// Parsed and validated block typeface.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Typeface {
    pub family_name: String,
    rows: usize,
    glyphs: HashMap<char, GlyphBitmap>,
}

impl Typeface {
    pub fn from_json(json: &str) -> Result<Self, FontError> {
        let raw: RawTypeface = serde_json::from_str(json)?;
        if raw.rows == 0 {
            return Err(FontError::NoRows);
        }

        let mut glyphs = HashMap::with_capacity(raw.glyphs.len());
        for (name, rows) in raw.glyphs {
            let invalid = |reason: String| FontError::InvalidGlyph {
                glyph: name.clone(),
                reason,
            };
            let mut chars = name.chars();
            let (Some(ch), None) = (chars.next(), chars.next()) else {
                return Err(invalid("key must be a single character".into()));
            };
            if rows.len() != raw.rows {
                return Err(invalid(format!(
                    "expected {} rows, found {}",
                    raw.rows,
                    rows.len()
                )));
            }
            let width = rows.first().map(|row| row.chars().count()).unwrap_or(0);
            if width == 0 {
                return Err(invalid("rows are empty".into()));
            }

            let mut cells = Vec::with_capacity(rows.len());
            for row in &rows {
                let parsed = row
                    .chars()
                    .map(|cell| match cell {
                        '#' => Ok(true),
                        '.' => Ok(false),
                        other => Err(invalid(format!("unexpected cell {other:?}"))),
                    })
                    .collect::<Result<Vec<_>, _>>()?;
                if parsed.len() != width {
                    return Err(invalid("rows have different widths".into()));
                }
                cells.push(parsed);
            }
            glyphs.insert(ch, GlyphBitmap { width, cells });
        }

        debug!(
            "parsed typeface {} with {} glyph(s)",
            raw.family_name,
            glyphs.len()
        );
        Ok(Self {
            family_name: raw.family_name,
            rows: raw.rows,
            glyphs,
        })
    }

    pub fn load(path: &Path) -> Result<Self, FontError> {
        let json = std::fs::read_to_string(path).map_err(|source| FontError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Number of cell rows every glyph spans.
    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn glyph(&self, ch: char) -> Option<&GlyphBitmap> {
        self.glyphs.get(&ch)
    }

    pub fn glyph_count(&self) -> usize {
        self.glyphs.len()
    }
}

/// Reads a typeface on a background thread. The returned slot settles when
/// the file has been read and parsed.
#[cfg(not(target_arch = "wasm32"))]
pub fn load_in_background(path: impl Into<PathBuf>) -> FontLoad {
    let path = path.into();
    let (load, resolver) = FontLoad::channel();
    log::info!("loading typeface from {}", path.display());
    let spawned = std::thread::Builder::new()
        .name("font-loader".into())
        .spawn(move || resolver.resolve(Typeface::load(&path)));
    match spawned {
        Ok(_) => load,
        Err(source) => FontLoad::failed(FontError::Io {
            path: PathBuf::from("<font-loader thread>"),
            source,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r####"{
        "familyName": "Test",
        "rows": 3,
        "glyphs": {
            "L": ["#..", "#..", "###"],
            "1": [".#", "##", ".#"]
        }
    }"####;

    #[test]
    fn parses_glyph_grids() {
        let face = Typeface::from_json(SAMPLE).unwrap();
        assert_eq!(face.family_name, "Test");
        assert_eq!(face.rows(), 3);
        assert_eq!(face.glyph_count(), 2);
        let l = face.glyph('L').unwrap();
        assert_eq!((l.width(), l.height()), (3, 3));
        assert!(l.filled(0, 0));
        assert!(!l.filled(1, 0));
        assert!(l.filled(2, 2));
        assert!(!l.filled(-1, 0));
        assert!(!l.filled(3, 2));
        assert!(face.glyph('x').is_none());
    }

    #[test]
    fn rejects_ragged_rows() {
        let json = r####"{"familyName": "Bad", "rows": 2, "glyphs": {"A": ["##", "#"]}}"####;
        let err = Typeface::from_json(json).unwrap_err();
        assert!(matches!(err, FontError::InvalidGlyph { .. }));
    }

    #[test]
    fn rejects_wrong_row_count_and_bad_cells() {
        let short = r####"{"familyName": "Bad", "rows": 3, "glyphs": {"A": ["#", "#"]}}"####;
        assert!(matches!(
            Typeface::from_json(short),
            Err(FontError::InvalidGlyph { .. })
        ));
        let cells = r####"{"familyName": "Bad", "rows": 1, "glyphs": {"A": ["#x"]}}"####;
        assert!(matches!(
            Typeface::from_json(cells),
            Err(FontError::InvalidGlyph { .. })
        ));
        let key = r####"{"familyName": "Bad", "rows": 1, "glyphs": {"AB": ["#"]}}"####;
        assert!(matches!(
            Typeface::from_json(key),
            Err(FontError::InvalidGlyph { .. })
        ));
        let rows = r####"{"familyName": "Bad", "rows": 0, "glyphs": {}}"####;
        assert!(matches!(Typeface::from_json(rows), Err(FontError::NoRows)));
    }

    #[test]
    fn malformed_json_is_an_error() {
        assert!(matches!(
            Typeface::from_json("{not json"),
            Err(FontError::Json(_))
        ));
    }

    #[test]
    fn bundled_typeface_has_letters_and_digits() {
        let face = Typeface::from_json(include_str!("../assets/blocky.typeface.json")).unwrap();
        for ch in ('A'..='Z').chain('0'..='9') {
            assert!(face.glyph(ch).is_some(), "missing {ch}");
        }
    }

    #[test]
    fn background_load_reports_missing_files() {
        let load = load_in_background("/definitely/not/here.json");
        let result = loop {
            if let std::task::Poll::Ready(result) = load.poll() {
                break result;
            }
            std::thread::yield_now();
        };
        assert!(matches!(result, Err(FontError::Io { .. })));
    }

    #[test]
    fn background_load_parses_files() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        std::io::Write::write_all(&mut file, SAMPLE.as_bytes()).unwrap();
        let load = load_in_background(file.path());
        let face = loop {
            if let std::task::Poll::Ready(result) = load.poll() {
                break result.unwrap();
            }
            std::thread::yield_now();
        };
        assert_eq!(face.glyph_count(), 2);
    }
}
