//! The in-memory font model shared by every stage of a merge.
//!
//! A [`FontModel`] owns a glyph arena: glyph ids are plain indices into
//! [`FontModel::glyphs`], and composite glyphs refer to their components by
//! such an index. This keeps the model trivially serializable and makes every
//! transform a plain function from one model to the next.

use std::collections::BTreeMap;

use kurbo::BezPath;
use rustc_hash::FxHashMap;

use crate::stream::F2Dot14;
use crate::{Error, Result, Tag};

/// The outline technology of a font.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum OutlineFormat {
    /// Quadratic outlines in `glyf`/`loca`.
    TrueType,
    /// Cubic PostScript outlines in `CFF ` or `CFF2`.
    Cff,
}

/// A point of a quadratic contour.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct CurvePoint {
    pub x: i16,
    pub y: i16,
    pub on_curve: bool,
}

impl CurvePoint {
    /// An on-curve point.
    pub fn on(x: i16, y: i16) -> Self {
        Self { x, y, on_curve: true }
    }

    /// An off-curve (control) point.
    pub fn off(x: i16, y: i16) -> Self {
        Self { x, y, on_curve: false }
    }
}

/// A closed quadratic contour.
pub type Contour = Vec<CurvePoint>;

/// An axis-aligned bounding box in font units.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct BBox {
    pub x_min: i16,
    pub y_min: i16,
    pub x_max: i16,
    pub y_max: i16,
}

impl BBox {
    /// The bounding box of some points, `None` if there are none.
    pub fn from_points<'a>(points: impl IntoIterator<Item = &'a CurvePoint>) -> Option<Self> {
        points.into_iter().fold(None, |acc, p| {
            Some(match acc {
                None => BBox { x_min: p.x, y_min: p.y, x_max: p.x, y_max: p.y },
                Some(b) => BBox {
                    x_min: b.x_min.min(p.x),
                    y_min: b.y_min.min(p.y),
                    x_max: b.x_max.max(p.x),
                    y_max: b.y_max.max(p.y),
                },
            })
        })
    }

    /// The smallest box containing both boxes.
    pub fn union(self, other: Self) -> Self {
        BBox {
            x_min: self.x_min.min(other.x_min),
            y_min: self.y_min.min(other.y_min),
            x_max: self.x_max.max(other.x_max),
            y_max: self.y_max.max(other.y_max),
        }
    }

    pub fn width(&self) -> i32 {
        i32::from(self.x_max) - i32::from(self.x_min)
    }

    pub fn height(&self) -> i32 {
        i32::from(self.y_max) - i32::from(self.y_min)
    }
}

/// The linear part of a component transform.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum ComponentTransform {
    Identity,
    Scale(F2Dot14),
    XyScale(F2Dot14, F2Dot14),
    /// `xx`, `yx`, `xy`, `yy` in file order.
    Matrix([F2Dot14; 4]),
}

impl ComponentTransform {
    /// Apply the transform to a point.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        match *self {
            Self::Identity => (x, y),
            Self::Scale(s) => (x * s.to_f64(), y * s.to_f64()),
            Self::XyScale(sx, sy) => (x * sx.to_f64(), y * sy.to_f64()),
            Self::Matrix([xx, yx, xy, yy]) => (
                x * xx.to_f64() + y * xy.to_f64(),
                x * yx.to_f64() + y * yy.to_f64(),
            ),
        }
    }
}

/// A reference from a composite glyph to another glyph of the same font.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Component {
    /// Index of the referenced glyph in the same arena.
    pub glyph: u16,
    pub dx: i16,
    pub dy: i16,
    pub transform: ComponentTransform,
    /// Flags that survive rewriting (`ROUND_XY_TO_GRID`, `USE_MY_METRICS`,
    /// `SCALED_COMPONENT_OFFSET`, `UNSCALED_COMPONENT_OFFSET`,
    /// `OVERLAP_COMPOUND`).
    pub flags: u16,
}

/// The outline of one glyph.
#[derive(Debug, Clone, PartialEq)]
pub enum Outline {
    /// No contours at all (e.g. a space).
    Empty,
    /// Quadratic contours.
    Simple { contours: Vec<Contour>, instructions: Vec<u8> },
    /// A glyph built from other glyphs of the same font.
    Composite { components: Vec<Component>, instructions: Vec<u8> },
    /// Cubic contours from a PostScript-flavored font.
    Cubic(BezPath),
}

/// One glyph of a font.
#[derive(Debug, Clone, PartialEq)]
pub struct GlyphRecord {
    /// The glyph index within its font.
    pub glyph_id: u16,
    pub advance_width: u16,
    /// `None` for glyphs without contours.
    pub bbox: Option<BBox>,
    pub outline: Outline,
}

impl GlyphRecord {
    /// A glyph without contours.
    pub fn empty(glyph_id: u16, advance_width: u16) -> Self {
        Self { glyph_id, advance_width, bbox: None, outline: Outline::Empty }
    }

    /// A simple glyph, with its bounding box computed from the points.
    pub fn simple(glyph_id: u16, advance_width: u16, contours: Vec<Contour>) -> Self {
        let bbox = BBox::from_points(contours.iter().flatten());
        let outline = match bbox {
            Some(_) => Outline::Simple { contours, instructions: vec![] },
            None => Outline::Empty,
        };
        Self { glyph_id, advance_width, bbox, outline }
    }

    /// Whether the glyph has no contours.
    pub fn is_empty(&self) -> bool {
        self.bbox.is_none()
    }

    /// The component glyph ids of a composite glyph.
    pub fn component_ids(&self) -> impl Iterator<Item = u16> + '_ {
        let components: &[Component] = match &self.outline {
            Outline::Composite { components, .. } => components,
            _ => &[],
        };
        components.iter().map(|c| c.glyph)
    }
}

/// Font-wide vertical metrics.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct GlobalMetrics {
    pub units_per_em: u16,
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
}

/// The parts of the `head` table that are carried through a merge.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct HeadInfo {
    /// 16.16 fixed-point font revision.
    pub font_revision: i32,
    pub flags: u16,
    /// Seconds since 1904-01-01 00:00 UTC.
    pub created: i64,
    /// Seconds since 1904-01-01 00:00 UTC.
    pub modified: i64,
    pub mac_style: u16,
    pub lowest_rec_ppem: u16,
    pub font_direction_hint: i16,
}

impl Default for HeadInfo {
    fn default() -> Self {
        Self {
            font_revision: 0x0001_0000,
            flags: 0b1011,
            created: 0,
            modified: 0,
            mac_style: 0,
            lowest_rec_ppem: 6,
            font_direction_hint: 2,
        }
    }
}

/// The parts of the `post` table that are carried through a merge.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Default)]
pub struct PostInfo {
    /// 16.16 fixed-point angle.
    pub italic_angle: i32,
    pub underline_position: i16,
    pub underline_thickness: i16,
    pub is_fixed_pitch: bool,
}

/// A complete font in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct FontModel {
    pub format: OutlineFormat,
    pub metrics: GlobalMetrics,
    pub head: HeadInfo,
    pub post: PostInfo,
    /// The glyph arena. The glyph id of a record equals its index.
    pub glyphs: Vec<GlyphRecord>,
    /// The character map.
    pub cmap: BTreeMap<u32, u16>,
    /// Name strings by name id.
    pub names: BTreeMap<u16, String>,
    /// The raw `OS/2` table, patched in place by the assembler.
    pub os2: Option<Vec<u8>>,
    /// Tables that are passed through untouched.
    pub extra_tables: BTreeMap<Tag, Vec<u8>>,
}

impl FontModel {
    /// Create a TrueType model with the given metrics and no glyphs.
    pub fn new(metrics: GlobalMetrics) -> Self {
        Self {
            format: OutlineFormat::TrueType,
            metrics,
            head: HeadInfo::default(),
            post: PostInfo::default(),
            glyphs: vec![],
            cmap: BTreeMap::new(),
            names: BTreeMap::new(),
            os2: None,
            extra_tables: BTreeMap::new(),
        }
    }

    /// Append a glyph, assigning it the next glyph id.
    pub fn push_glyph(&mut self, mut glyph: GlyphRecord) -> u16 {
        let id = self.glyphs.len() as u16;
        glyph.glyph_id = id;
        self.glyphs.push(glyph);
        id
    }

    /// Map a codepoint to a glyph id.
    pub fn map(&mut self, codepoint: u32, glyph: u16) {
        self.cmap.insert(codepoint, glyph);
    }

    /// The glyph a codepoint is mapped to.
    pub fn glyph_for(&self, codepoint: u32) -> Option<&GlyphRecord> {
        self.cmap.get(&codepoint).and_then(|&g| self.glyphs.get(usize::from(g)))
    }

    /// The advance width of the glyph a codepoint is mapped to.
    pub fn advance(&self, codepoint: u32) -> Option<u16> {
        self.glyph_for(codepoint).map(|g| g.advance_width)
    }

    /// The width of one half-width cell.
    ///
    /// This is the advance of the space, else of `A`, else the most common
    /// advance among mapped glyphs (the smaller one on a tie).
    pub fn default_advance_width(&self) -> Option<u16> {
        for cp in [0x20, 0x41] {
            if let Some(w) = self.advance(cp).filter(|&w| w > 0) {
                return Some(w);
            }
        }

        let mut counts: FxHashMap<u16, usize> = FxHashMap::default();
        for &g in self.cmap.values() {
            if let Some(glyph) = self.glyphs.get(usize::from(g)) {
                *counts.entry(glyph.advance_width).or_default() += 1;
            }
        }

        counts
            .into_iter()
            .filter(|&(w, _)| w > 0)
            .max_by(|a, b| a.1.cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(w, _)| w)
    }

    /// Check that every character map entry resolves to a glyph and that
    /// every glyph id matches its arena slot.
    pub fn validate(&self) -> Result<()> {
        let num_glyphs = self.glyphs.len();
        if num_glyphs == 0 {
            return Err(Error::CorruptData("font has no glyphs".into()));
        }

        if num_glyphs > usize::from(u16::MAX) {
            return Err(Error::Overflow);
        }

        for (i, glyph) in self.glyphs.iter().enumerate() {
            if usize::from(glyph.glyph_id) != i {
                return Err(Error::CorruptData(format!(
                    "glyph {} is stored in slot {i}",
                    glyph.glyph_id
                )));
            }

            if let Some(c) = glyph.component_ids().find(|&c| usize::from(c) >= num_glyphs) {
                return Err(Error::CorruptData(format!(
                    "glyph {i} references missing component {c}"
                )));
            }
        }

        if let Some((cp, g)) = self.cmap.iter().find(|(_, &g)| usize::from(g) >= num_glyphs)
        {
            return Err(Error::CorruptData(format!(
                "cmap maps U+{cp:04X} to missing glyph {g}"
            )));
        }

        Ok(())
    }

    /// Compute the bounding box of a glyph, resolving composite components
    /// through the arena.
    pub fn resolve_bbox(&self, glyph: u16) -> Option<BBox> {
        self.resolve_bbox_at_depth(glyph, 0)
    }

    fn resolve_bbox_at_depth(&self, glyph: u16, depth: u8) -> Option<BBox> {
        // Deeper nesting only occurs in malicious fonts.
        if depth > 16 {
            return None;
        }

        let record = self.glyphs.get(usize::from(glyph))?;
        let Outline::Composite { components, .. } = &record.outline else {
            return record.bbox;
        };

        let mut bbox: Option<BBox> = None;
        for component in components {
            let Some(inner) = self.resolve_bbox_at_depth(component.glyph, depth + 1) else {
                continue;
            };

            let corners = [
                (inner.x_min, inner.y_min),
                (inner.x_min, inner.y_max),
                (inner.x_max, inner.y_min),
                (inner.x_max, inner.y_max),
            ];

            for (x, y) in corners {
                let (tx, ty) = component.transform.apply(f64::from(x), f64::from(y));
                let p = CurvePoint::on(
                    clamp_i16(tx.round() + f64::from(component.dx)),
                    clamp_i16(ty.round() + f64::from(component.dy)),
                );
                let single = BBox { x_min: p.x, y_min: p.y, x_max: p.x, y_max: p.y };
                bbox = Some(bbox.map_or(single, |b| b.union(single)));
            }
        }

        bbox
    }
}

fn clamp_i16(v: f64) -> i16 {
    v.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

#[cfg(test)]
mod tests {
    use super::*;

    fn metrics() -> GlobalMetrics {
        GlobalMetrics { units_per_em: 1000, ascender: 800, descender: -200, line_gap: 0 }
    }

    #[test]
    fn default_advance_prefers_space() {
        let mut font = FontModel::new(metrics());
        font.push_glyph(GlyphRecord::empty(0, 500));
        let space = font.push_glyph(GlyphRecord::empty(0, 600));
        let a = font.push_glyph(GlyphRecord::empty(0, 700));
        font.map(0x20, space);
        font.map(0x41, a);
        assert_eq!(font.default_advance_width(), Some(600));
    }

    #[test]
    fn default_advance_falls_back_to_most_common() {
        let mut font = FontModel::new(metrics());
        font.push_glyph(GlyphRecord::empty(0, 0));
        for (cp, w) in [(0x61, 500), (0x62, 500), (0x63, 1000)] {
            let g = font.push_glyph(GlyphRecord::empty(0, w));
            font.map(cp, g);
        }
        assert_eq!(font.default_advance_width(), Some(500));
    }

    #[test]
    fn validate_rejects_dangling_cmap() {
        let mut font = FontModel::new(metrics());
        font.push_glyph(GlyphRecord::empty(0, 500));
        font.map(0x41, 3);
        assert!(matches!(font.validate(), Err(Error::CorruptData(_))));
    }

    #[test]
    fn composite_bbox_is_resolved_through_arena() {
        let mut font = FontModel::new(metrics());
        font.push_glyph(GlyphRecord::empty(0, 500));
        let base = font.push_glyph(GlyphRecord::simple(
            0,
            500,
            vec![vec![CurvePoint::on(0, 0), CurvePoint::on(100, 0), CurvePoint::on(100, 200)]],
        ));
        let composite = font.push_glyph(GlyphRecord {
            glyph_id: 0,
            advance_width: 500,
            bbox: None,
            outline: Outline::Composite {
                components: vec![Component {
                    glyph: base,
                    dx: 50,
                    dy: 10,
                    transform: ComponentTransform::Identity,
                    flags: 0,
                }],
                instructions: vec![],
            },
        });

        assert_eq!(
            font.resolve_bbox(composite),
            Some(BBox { x_min: 50, y_min: 10, x_max: 150, y_max: 210 })
        );
    }
}
