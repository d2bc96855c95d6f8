//! Sorting glyphs into half-width and full-width cells.

use std::collections::BTreeMap;

use crate::model::{BBox, FontModel};

/// The cell a glyph occupies.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum WidthClass {
    /// One cell.
    Half,
    /// Two cells.
    Full,
    /// Neither, within tolerance.
    Reject,
}

impl WidthClass {
    /// The exact advance width of the class.
    pub fn canonical_width(self, unit: u16) -> Option<u16> {
        match self {
            Self::Half => Some(unit),
            Self::Full => unit.checked_mul(2),
            Self::Reject => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Half => "half",
            Self::Full => "full",
            Self::Reject => "reject",
        }
    }
}

/// Tuning of the classifier.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ClassifyOptions {
    /// Maximum distance from the cell width, relative to one cell.
    pub width_tolerance: f64,
    /// How much a bounding box may exceed its cell.
    pub oversize_factor: f64,
    /// The height of a cell, the anchor's ascender minus descender.
    pub cell_height: i32,
}

/// The classification of one codepoint.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct ClassEntry {
    /// The glyph the codepoint is mapped to.
    pub glyph: u16,
    pub class: WidthClass,
    pub advance_width: u16,
    /// The bounding box, with composite glyphs resolved.
    pub bbox: Option<BBox>,
    /// Whether the glyph has no contours.
    pub empty: bool,
    /// Whether the bounding box exceeds the cell of its class.
    pub oversize: bool,
}

/// The classification of all codepoints of one font.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Classification {
    entries: BTreeMap<u32, ClassEntry>,
}

impl Classification {
    /// The entry for a codepoint.
    pub fn get(&self, codepoint: u32) -> Option<&ClassEntry> {
        self.entries.get(&codepoint)
    }

    /// All entries in codepoint order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &ClassEntry)> + '_ {
        self.entries.iter().map(|(&c, e)| (c, e))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// How many codepoints fell into a class.
    pub fn count(&self, class: WidthClass) -> usize {
        self.entries.values().filter(|e| e.class == class).count()
    }
}

/// Classify an advance width against the cell width `unit`.
///
/// The nearer of `unit` and `2 × unit` wins, with the exact midpoint going to
/// [`WidthClass::Half`]. The winner must be within `tolerance × unit`.
pub fn classify_width(advance_width: u16, unit: u16, tolerance: f64) -> WidthClass {
    if advance_width == 0 || unit == 0 {
        return WidthClass::Reject;
    }

    let advance = i32::from(advance_width);
    let unit = i32::from(unit);
    let to_half = (advance - unit).abs();
    let to_full = (advance - 2 * unit).abs();

    let (class, distance) =
        if to_half <= to_full { (WidthClass::Half, to_half) } else { (WidthClass::Full, to_full) };

    if f64::from(distance) <= tolerance * f64::from(unit) {
        class
    } else {
        WidthClass::Reject
    }
}

/// Classify every mapped codepoint of a font.
pub fn classify(font: &FontModel, unit: u16, options: &ClassifyOptions) -> Classification {
    let mut entries = BTreeMap::new();

    for (&codepoint, &glyph) in &font.cmap {
        let Some(record) = font.glyphs.get(usize::from(glyph)) else { continue };
        let bbox = font.resolve_bbox(glyph);
        let class = classify_width(record.advance_width, unit, options.width_tolerance);

        let oversize = match (class.canonical_width(unit), bbox) {
            (Some(width), Some(bbox)) => {
                f64::from(bbox.width()) > f64::from(width) * options.oversize_factor
                    || f64::from(bbox.height())
                        > f64::from(options.cell_height) * options.oversize_factor
            }
            _ => false,
        };

        entries.insert(
            codepoint,
            ClassEntry {
                glyph,
                class,
                advance_width: record.advance_width,
                bbox,
                empty: bbox.is_none(),
                oversize,
            },
        );
    }

    log::debug!(
        "classified {} codepoints: {} half, {} full, {} rejected",
        entries.len(),
        entries.values().filter(|e| e.class == WidthClass::Half).count(),
        entries.values().filter(|e| e.class == WidthClass::Full).count(),
        entries.values().filter(|e| e.class == WidthClass::Reject).count(),
    );

    Classification { entries }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CurvePoint, GlobalMetrics, GlyphRecord};

    #[test]
    fn widths_near_cells() {
        assert_eq!(classify_width(600, 600, 0.1), WidthClass::Half);
        assert_eq!(classify_width(655, 600, 0.1), WidthClass::Half);
        assert_eq!(classify_width(1200, 600, 0.1), WidthClass::Full);
        assert_eq!(classify_width(1140, 600, 0.1), WidthClass::Full);
        assert_eq!(classify_width(1000, 600, 0.1), WidthClass::Reject);
        assert_eq!(classify_width(0, 600, 0.1), WidthClass::Reject);
    }

    #[test]
    fn midpoint_is_half() {
        assert_eq!(classify_width(900, 600, 0.5), WidthClass::Half);
        assert_eq!(classify_width(901, 600, 0.5), WidthClass::Full);
        assert_eq!(classify_width(900, 600, 0.1), WidthClass::Reject);
    }

    #[test]
    fn oversize_against_class_cell() {
        let mut font = FontModel::new(GlobalMetrics {
            units_per_em: 1000,
            ascender: 800,
            descender: -200,
            line_gap: 0,
        });
        font.push_glyph(GlyphRecord::empty(0, 600));
        let space = font.push_glyph(GlyphRecord::empty(0, 600));
        let wide = font.push_glyph(GlyphRecord::simple(
            0,
            600,
            vec![vec![CurvePoint::on(-100, 0), CurvePoint::on(700, 0), CurvePoint::on(0, 500)]],
        ));
        let tall = font.push_glyph(GlyphRecord::simple(
            0,
            1200,
            vec![vec![CurvePoint::on(0, -300), CurvePoint::on(1000, 0), CurvePoint::on(0, 950)]],
        ));
        font.map(0x20, space);
        font.map(0x57, wide);
        font.map(0x4E00, tall);

        let options =
            ClassifyOptions { width_tolerance: 0.1, oversize_factor: 1.2, cell_height: 1000 };
        let classes = classify(&font, 600, &options);

        let space = classes.get(0x20).unwrap();
        assert!(space.empty && !space.oversize);
        assert_eq!(space.class, WidthClass::Half);

        // 800 > 600 × 1.2
        assert!(classes.get(0x57).unwrap().oversize);

        // 1250 > 1000 × 1.2
        let tall = classes.get(0x4E00).unwrap();
        assert_eq!(tall.class, WidthClass::Full);
        assert!(tall.oversize);
        assert_eq!(classes.count(WidthClass::Half), 2);
    }
}
