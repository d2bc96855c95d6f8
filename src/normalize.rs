//! Scaling donor fonts to the anchor's cell width and shifting them to its
//! vertical center.
//!
//! All arithmetic on font units is exact integer arithmetic. The scale is a
//! 16.16 fixed-point ratio, so merging the same fonts always yields the same
//! coordinates regardless of platform float behavior.

use std::fmt::{self, Display, Formatter};

use kurbo::{Affine, Shape};

use crate::model::{BBox, CurvePoint, FontModel, Outline};
use crate::ranges::CodepointSet;
use crate::{util, Error, Result};

/// A uniform scale factor in 16.16 fixed point.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Scale(i32);

impl Scale {
    /// The identity scale.
    pub const ONE: Self = Self(0x10000);

    /// The ratio `num / den`, rounded to the nearest representable value.
    pub fn from_ratio(num: u16, den: u16) -> Result<Self> {
        if den == 0 {
            return Err(Error::CorruptData("scale with zero denominator".into()));
        }

        let num = i64::from(num) << 17;
        let den = i64::from(den);
        let raw = (num / den + 1) >> 1;
        i32::try_from(raw).map(Self).map_err(|_| Error::Overflow)
    }

    /// The raw 16.16 value.
    pub fn raw(self) -> i32 {
        self.0
    }

    pub fn to_f64(self) -> f64 {
        f64::from(self.0) / 65536.0
    }

    /// Scale a value, rounding half away from zero.
    pub fn apply(self, v: i32) -> i32 {
        let product = i64::from(v) * i64::from(self.0);
        let magnitude = (product.abs() + 0x8000) >> 16;
        (product.signum() * magnitude) as i32
    }

    fn apply_i16(self, v: i16) -> Result<i16> {
        to_i16(self.apply(i32::from(v)))
    }
}

impl Display for Scale {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "{:.5}", self.to_f64())
    }
}

/// The transform applied to one donor font.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct ScaleShift {
    pub scale: Scale,
    /// Vertical offset in font units, applied after scaling.
    pub shift: i16,
}

impl ScaleShift {
    pub const IDENTITY: Self = Self { scale: Scale::ONE, shift: 0 };
}

fn to_i16(v: i32) -> Result<i16> {
    i16::try_from(v).map_err(|_| Error::Overflow)
}

/// The scale that makes the donor's reference glyph as wide as the anchor's.
pub fn compute_scale(anchor: &FontModel, donor: &FontModel, reference: u32) -> Result<Scale> {
    let width = |font: &FontModel, which: &str| {
        font.advance(reference).filter(|&w| w > 0).ok_or_else(|| {
            Error::CorruptData(format!(
                "{which} font has no advance width for reference U+{reference:04X}"
            ))
        })
    };

    Scale::from_ratio(width(anchor, "anchor")?, width(donor, "donor")?)
}

/// The value at percentile `p` with floor index truncation: the values are
/// sorted in ascending order and indexed at `n × p / 100`, clamped to the
/// last value.
pub fn percentile(values: &[i16], p: u32) -> Option<i16> {
    let mut sorted = values.to_vec();
    sorted.sort_unstable();
    let n = sorted.len();
    let index = (n * p.min(100) as usize / 100).min(n.checked_sub(1)?);
    sorted.get(index).copied()
}

/// The vertical shift that moves the donor's center onto the anchor's.
///
/// The anchor's center is half the highest point of its `big` glyphs, the
/// donor's the midpoint of the 99th percentile of tops and the 1st
/// percentile of bottoms of its `shift_set` glyphs. The difference is rounded
/// to the nearest unit with exact halves going toward zero.
pub fn compute_shift(
    anchor: &FontModel,
    donor: &FontModel,
    big: &CodepointSet,
    shift_set: &CodepointSet,
) -> Result<i16> {
    let target_top = anchor
        .cmap
        .iter()
        .filter(|(c, _)| big.contains(**c))
        .filter_map(|(_, &g)| anchor.resolve_bbox(g))
        .map(|b| i32::from(b.y_max))
        .max()
        .ok_or(Error::EmptyGlyphSet("big glyphs of the anchor font"))?;

    let (tops, bottoms): (Vec<i16>, Vec<i16>) = donor
        .cmap
        .iter()
        .filter(|(c, _)| shift_set.contains(**c))
        .filter_map(|(_, &g)| donor.resolve_bbox(g))
        .map(|b| (b.y_max, b.y_min))
        .unzip();

    let top = percentile(&tops, 99).ok_or(Error::EmptyGlyphSet("shift glyphs of the donor font"))?;
    let bottom =
        percentile(&bottoms, 1).ok_or(Error::EmptyGlyphSet("shift glyphs of the donor font"))?;

    // Twice the difference of the centers, so that halving it once rounds
    // exact halves toward zero.
    let doubled = target_top - (i32::from(top) + i32::from(bottom));
    let shift = to_i16(doubled / 2)?;

    log::debug!(
        "vertical centers: target {}, source {}, shift {shift}",
        f64::from(target_top) / 2.0,
        (f64::from(top) + f64::from(bottom)) / 2.0
    );

    Ok(shift)
}

/// Scale every outline, advance width and vertical metric of a font.
///
/// Instructions are dropped from scaled glyphs since they would no longer
/// fit the outlines. The units per em stay the same.
pub fn scale_font(font: &FontModel, scale: Scale) -> Result<FontModel> {
    if scale == Scale::ONE {
        return Ok(font.clone());
    }

    let mut scaled = font.clone();
    let point = |p: &CurvePoint| -> Result<CurvePoint> {
        Ok(CurvePoint { x: scale.apply_i16(p.x)?, y: scale.apply_i16(p.y)?, on_curve: p.on_curve })
    };

    for glyph in &mut scaled.glyphs {
        let advance = scale.apply(i32::from(glyph.advance_width));
        glyph.advance_width = u16::try_from(advance).map_err(|_| Error::Overflow)?;

        match &mut glyph.outline {
            Outline::Empty => {}
            Outline::Simple { contours, instructions } => {
                for contour in contours.iter_mut() {
                    for p in contour.iter_mut() {
                        *p = point(p)?;
                    }
                }
                instructions.clear();
                glyph.bbox = BBox::from_points(contours.iter().flatten());
            }
            Outline::Composite { components, instructions } => {
                for component in components.iter_mut() {
                    component.dx = scale.apply_i16(component.dx)?;
                    component.dy = scale.apply_i16(component.dy)?;
                }
                instructions.clear();
            }
            Outline::Cubic(path) => {
                path.apply_affine(Affine::scale(scale.to_f64()));
                glyph.bbox = path_bbox(path)?;
            }
        }
    }

    refresh_composite_bboxes(&mut scaled);

    let metrics = &mut scaled.metrics;
    metrics.ascender = scale.apply_i16(metrics.ascender)?;
    metrics.descender = scale.apply_i16(metrics.descender)?;
    metrics.line_gap = scale.apply_i16(metrics.line_gap)?;
    scaled.post.underline_position = scale.apply_i16(scaled.post.underline_position)?;
    scaled.post.underline_thickness = scale.apply_i16(scaled.post.underline_thickness)?;

    Ok(scaled)
}

/// Move every outline of a font vertically.
///
/// Composite offsets stay untouched since the glyphs they reference are
/// moved already.
pub fn shift_font(font: &FontModel, dy: i16) -> Result<FontModel> {
    if dy == 0 {
        return Ok(font.clone());
    }

    let mut shifted = font.clone();
    let move_y = |y: i16| to_i16(i32::from(y) + i32::from(dy));

    for glyph in &mut shifted.glyphs {
        match &mut glyph.outline {
            Outline::Empty | Outline::Composite { .. } => {}
            Outline::Simple { contours, .. } => {
                for p in contours.iter_mut().flatten() {
                    p.y = move_y(p.y)?;
                }
            }
            Outline::Cubic(path) => {
                path.apply_affine(Affine::translate((0.0, f64::from(dy))));
            }
        }

        if let Some(bbox) = &mut glyph.bbox {
            bbox.y_min = move_y(bbox.y_min)?;
            bbox.y_max = move_y(bbox.y_max)?;
        }
    }

    Ok(shifted)
}

fn path_bbox(path: &kurbo::BezPath) -> Result<Option<BBox>> {
    if path.elements().is_empty() {
        return Ok(None);
    }

    let rect = path.bounding_box();
    Ok(Some(BBox {
        x_min: util::to_i16(rect.x0.floor())?,
        y_min: util::to_i16(rect.y0.floor())?,
        x_max: util::to_i16(rect.x1.ceil())?,
        y_max: util::to_i16(rect.y1.ceil())?,
    }))
}

/// Recompute the boxes of composite glyphs from their components.
pub(crate) fn refresh_composite_bboxes(font: &mut FontModel) {
    let bboxes: Vec<_> = (0..font.glyphs.len())
        .map(|i| match font.glyphs[i].outline {
            Outline::Composite { .. } => Some(font.resolve_bbox(i as u16)),
            _ => None,
        })
        .collect();

    for (glyph, bbox) in font.glyphs.iter_mut().zip(bboxes) {
        if let Some(bbox) = bbox {
            glyph.bbox = bbox;
        }
    }
}
