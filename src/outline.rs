//! Converting cubic outlines into quadratic TrueType contours.

use std::fmt::{self, Display, Formatter};

use kurbo::{BezPath, CubicBez, ParamCurve, PathEl, Point, QuadBez};

use crate::model::{BBox, Contour, CurvePoint, FontModel, Outline, OutlineFormat};
use crate::{Error, Result, Tag};

/// How often the approximation accuracy is halved before giving up.
const MAX_ATTEMPTS: usize = 4;

/// Samples per quadratic segment when measuring the deviation.
const SAMPLES: usize = 8;

/// A glyph whose outline could not be converted within tolerance.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct ToleranceFailure {
    pub glyph: u16,
    /// The smallest deviation reached, in font units.
    pub deviation: f64,
}

impl Display for ToleranceFailure {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "glyph {}: deviation {:.3}", self.glyph, self.deviation)
    }
}

/// Approximate a path with quadratic contours whose points lie on the
/// integer grid.
///
/// Contours are reversed into the clockwise TrueType orientation. Fails with
/// the measured deviation if no attempt gets within `tolerance` font units
/// of the cubic curves.
pub fn cubic_to_quadratic(path: &BezPath, tolerance: f64) -> std::result::Result<Vec<Contour>, f64> {
    let mut accuracy = (tolerance / 2.0).max(1.0 / 1024.0);
    let mut best = f64::INFINITY;

    for _ in 0..MAX_ATTEMPTS {
        let (contours, deviation) = approximate(path, accuracy);
        if deviation <= tolerance {
            return Ok(contours);
        }

        best = best.min(deviation);
        accuracy /= 2.0;
    }

    Err(best)
}

fn approximate(path: &BezPath, accuracy: f64) -> (Vec<Contour>, f64) {
    let mut contours = vec![];
    let mut current: Contour = vec![];
    let mut deviation = 0.0f64;
    let mut last = Point::ZERO;
    let mut start = Point::ZERO;

    for el in path.elements() {
        match *el {
            PathEl::MoveTo(p) => {
                finish(&mut contours, std::mem::take(&mut current));
                current.push(on(p));
                last = p;
                start = p;
            }
            PathEl::LineTo(p) => {
                current.push(on(p));
                last = p;
            }
            PathEl::QuadTo(c, p) => {
                let exact = QuadBez::new(last, c, p);
                deviation = deviation.max(measure(&exact, |t| exact.eval(t)));
                current.push(off(c));
                current.push(on(p));
                last = p;
            }
            PathEl::CurveTo(c1, c2, p) => {
                let cubic = CubicBez::new(last, c1, c2, p);
                for (t0, t1, quad) in cubic.to_quads(accuracy) {
                    let error = measure(&quad, |u| cubic.eval(t0 + u * (t1 - t0)));
                    deviation = deviation.max(error);
                    current.push(off(quad.p1));
                    current.push(on(quad.p2));
                }
                last = p;
            }
            PathEl::ClosePath => {
                finish(&mut contours, std::mem::take(&mut current));
                last = start;
            }
        }
    }

    finish(&mut contours, current);
    (contours, deviation)
}

/// The largest distance between the grid-rounded version of a quadratic
/// segment and the exact curve it stands for.
fn measure(quad: &QuadBez, exact: impl Fn(f64) -> Point) -> f64 {
    let rounded = QuadBez::new(snap(quad.p0), snap(quad.p1), snap(quad.p2));
    (0..=SAMPLES)
        .map(|i| {
            let t = i as f64 / SAMPLES as f64;
            rounded.eval(t).distance(exact(t))
        })
        .fold(0.0, f64::max)
}

fn snap(p: Point) -> Point {
    let c = on(p);
    Point::new(f64::from(c.x), f64::from(c.y))
}

fn grid(v: f64) -> i16 {
    v.round().clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16
}

fn on(p: Point) -> CurvePoint {
    CurvePoint::on(grid(p.x), grid(p.y))
}

fn off(p: Point) -> CurvePoint {
    CurvePoint::off(grid(p.x), grid(p.y))
}

/// Close a contour: drop the point that duplicates the start and reverse the
/// direction, keeping the start point first.
fn finish(contours: &mut Vec<Contour>, mut contour: Contour) {
    if contour.len() > 1 && contour.first() == contour.last() {
        contour.pop();
    }

    if contour.len() < 2 {
        return;
    }

    contour[1..].reverse();
    contours.push(contour);
}

/// Convert all cubic outlines of a font into quadratic ones.
///
/// Fails with every glyph that exceeds the tolerance. Fonts that already
/// have quadratic outlines are returned as they are.
pub fn convert_font(font: FontModel, tolerance: f64) -> Result<FontModel> {
    let has_cubics = font.glyphs.iter().any(|g| matches!(g.outline, Outline::Cubic(_)));
    if font.format == OutlineFormat::TrueType && !has_cubics {
        return Ok(font);
    }

    let mut font = font;
    let mut failures = vec![];
    let mut converted = 0;

    for glyph in &mut font.glyphs {
        let Outline::Cubic(path) = &glyph.outline else { continue };
        match cubic_to_quadratic(path, tolerance) {
            Ok(contours) => {
                glyph.bbox = BBox::from_points(contours.iter().flatten());
                glyph.outline = match glyph.bbox {
                    Some(_) => Outline::Simple { contours, instructions: vec![] },
                    None => Outline::Empty,
                };
                converted += 1;
            }
            Err(deviation) => {
                failures.push(ToleranceFailure { glyph: glyph.glyph_id, deviation })
            }
        }
    }

    if !failures.is_empty() {
        return Err(Error::ConversionToleranceExceeded(failures));
    }

    font.format = OutlineFormat::TrueType;
    for tag in [Tag::CFF, Tag::CFF2, Tag::VORG] {
        font.extra_tables.remove(&tag);
    }

    log::info!("converted {converted} cubic outlines to quadratic");
    Ok(font)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GlobalMetrics, GlyphRecord};

    fn circle() -> BezPath {
        let mut path = BezPath::new();
        let k = 0.5523 * 500.0;
        path.move_to((500.0, 0.0));
        path.curve_to((500.0 + k, 0.0), (1000.0, 500.0 - k), (1000.0, 500.0));
        path.curve_to((1000.0, 500.0 + k), (500.0 + k, 1000.0), (500.0, 1000.0));
        path.curve_to((500.0 - k, 1000.0), (0.0, 500.0 + k), (0.0, 500.0));
        path.curve_to((0.0, 500.0 - k), (500.0 - k, 0.0), (500.0, 0.0));
        path.close_path();
        path
    }

    #[test]
    fn circle_within_tolerance() {
        let contours = cubic_to_quadratic(&circle(), 1.0).unwrap();
        assert_eq!(contours.len(), 1);

        let contour = &contours[0];
        assert_eq!(contour[0], CurvePoint::on(500, 0));
        assert!(contour.iter().any(|p| !p.on_curve));

        // The bounds stay those of the circle.
        let bbox = BBox::from_points(contour).unwrap();
        assert!((bbox.x_min - 0).abs() <= 1 && (bbox.x_max - 1000).abs() <= 1);
        assert!((bbox.y_min - 0).abs() <= 1 && (bbox.y_max - 1000).abs() <= 1);
    }

    #[test]
    fn contours_are_reversed() {
        let mut path = BezPath::new();
        path.move_to((0.0, 0.0));
        path.line_to((100.0, 0.0));
        path.line_to((100.0, 100.0));
        path.line_to((0.0, 0.0));
        path.close_path();

        let contours = cubic_to_quadratic(&path, 1.0).unwrap();
        assert_eq!(
            contours,
            vec![vec![CurvePoint::on(0, 0), CurvePoint::on(100, 100), CurvePoint::on(100, 0)]]
        );
    }

    #[test]
    fn impossible_tolerance_reports_deviation() {
        let deviation = cubic_to_quadratic(&circle(), 0.0).unwrap_err();
        assert!(deviation > 0.0);
    }

    #[test]
    fn quadratic_fonts_are_untouched() {
        let mut font = FontModel::new(GlobalMetrics {
            units_per_em: 1000,
            ascender: 800,
            descender: -200,
            line_gap: 0,
        });
        font.push_glyph(GlyphRecord::empty(0, 500));
        let copy = font.clone();
        assert_eq!(convert_font(font, 1.0).unwrap(), copy);
    }

    #[test]
    fn cubic_fonts_are_converted() {
        let mut font = FontModel::new(GlobalMetrics {
            units_per_em: 1000,
            ascender: 800,
            descender: -200,
            line_gap: 0,
        });
        font.format = OutlineFormat::Cff;
        font.extra_tables.insert(Tag::VORG, vec![0; 8]);
        font.push_glyph(GlyphRecord {
            glyph_id: 0,
            advance_width: 500,
            bbox: None,
            outline: Outline::Cubic(BezPath::new()),
        });
        font.push_glyph(GlyphRecord {
            glyph_id: 0,
            advance_width: 1000,
            bbox: None,
            outline: Outline::Cubic(circle()),
        });

        let converted = convert_font(font.clone(), 1.0).unwrap();
        assert_eq!(converted.format, OutlineFormat::TrueType);
        assert!(converted.extra_tables.is_empty());
        assert_eq!(converted.glyphs[0].outline, Outline::Empty);
        assert!(matches!(converted.glyphs[1].outline, Outline::Simple { .. }));
        assert!(converted.glyphs[1].bbox.is_some());

        match convert_font(font, 0.0) {
            Err(Error::ConversionToleranceExceeded(failures)) => {
                assert_eq!(failures.len(), 1);
                assert_eq!(failures[0].glyph, 1);
            }
            other => panic!("unexpected result {other:?}"),
        }
    }
}
