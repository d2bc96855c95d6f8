//! The `maxp` table. Output fonts always get a version 1.0 table whose
//! statistics are recomputed from the glyphs, since merging changes all of
//! them.

use crate::model::{FontModel, Outline};
use crate::stream::{Reader, Writer};
use crate::Result;

pub fn read_num_glyphs(data: &[u8]) -> Result<u16> {
    let mut r = Reader::new(data);
    r.skip(4)?; // version
    r.read::<u16>()
}

/// The maximum profile of a set of TrueType glyphs.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct MaxpStats {
    pub max_points: u16,
    pub max_contours: u16,
    pub max_composite_points: u16,
    pub max_composite_contours: u16,
    pub max_size_of_instructions: u16,
    pub max_component_elements: u16,
    pub max_component_depth: u16,
}

impl MaxpStats {
    pub fn compute(font: &FontModel) -> Self {
        let mut stats = Self::default();

        for (gid, glyph) in font.glyphs.iter().enumerate() {
            match &glyph.outline {
                Outline::Simple { contours, instructions } => {
                    let points: usize = contours.iter().map(Vec::len).sum();
                    stats.max_points = stats.max_points.max(saturate(points));
                    stats.max_contours = stats.max_contours.max(saturate(contours.len()));
                    stats.max_size_of_instructions =
                        stats.max_size_of_instructions.max(saturate(instructions.len()));
                }
                Outline::Composite { components, instructions } => {
                    let (points, contours, depth) = composite_totals(font, gid as u16, 0);
                    stats.max_composite_points = stats.max_composite_points.max(points);
                    stats.max_composite_contours =
                        stats.max_composite_contours.max(contours);
                    stats.max_component_depth = stats.max_component_depth.max(depth);
                    stats.max_component_elements =
                        stats.max_component_elements.max(saturate(components.len()));
                    stats.max_size_of_instructions =
                        stats.max_size_of_instructions.max(saturate(instructions.len()));
                }
                Outline::Empty | Outline::Cubic(_) => {}
            }
        }

        stats
    }
}

/// Points, contours and nesting depth of a glyph with all its components
/// expanded.
fn composite_totals(font: &FontModel, gid: u16, depth: u16) -> (u16, u16, u16) {
    // Deeper nesting only occurs in malicious fonts.
    if depth > 16 {
        return (0, 0, depth);
    }

    match font.glyphs.get(usize::from(gid)).map(|g| &g.outline) {
        Some(Outline::Simple { contours, .. }) => {
            let points: usize = contours.iter().map(Vec::len).sum();
            (saturate(points), saturate(contours.len()), depth)
        }
        Some(Outline::Composite { components, .. }) => {
            let mut totals = (0u16, 0u16, depth + 1);
            for component in components {
                let (p, c, d) = composite_totals(font, component.glyph, depth + 1);
                totals.0 = totals.0.saturating_add(p);
                totals.1 = totals.1.saturating_add(c);
                totals.2 = totals.2.max(d);
            }
            totals
        }
        _ => (0, 0, depth),
    }
}

fn saturate(n: usize) -> u16 {
    u16::try_from(n).unwrap_or(u16::MAX)
}

pub fn write(num_glyphs: u16, stats: &MaxpStats) -> Vec<u8> {
    let mut w = Writer::with_capacity(32);
    w.write::<u32>(0x00010000);
    w.write::<u16>(num_glyphs);
    w.write::<u16>(stats.max_points);
    w.write::<u16>(stats.max_contours);
    w.write::<u16>(stats.max_composite_points);
    w.write::<u16>(stats.max_composite_contours);
    w.write::<u16>(2); // max zones
    w.write::<u16>(0); // max twilight points
    w.write::<u16>(0); // max storage
    w.write::<u16>(0); // max function defs
    w.write::<u16>(0); // max instruction defs
    w.write::<u16>(0); // max stack elements
    w.write::<u16>(stats.max_size_of_instructions);
    w.write::<u16>(stats.max_component_elements);
    w.write::<u16>(stats.max_component_depth);
    w.finish()
}
