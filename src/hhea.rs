use crate::model::GlobalMetrics;
use crate::stream::{Reader, Writer};
use crate::Result;

/// The parts of the `hhea` table needed to read a font.
#[derive(Debug, Copy, Clone)]
pub struct Hhea {
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
    pub number_of_h_metrics: u16,
}

pub fn read(data: &[u8]) -> Result<Hhea> {
    let mut r = Reader::new(data);
    r.skip(4)?; // version
    let ascender = r.read::<i16>()?;
    let descender = r.read::<i16>()?;
    let line_gap = r.read::<i16>()?;
    r.jump(34);
    let number_of_h_metrics = r.read::<u16>()?;
    Ok(Hhea { ascender, descender, line_gap, number_of_h_metrics })
}

/// Horizontal extremes over all glyphs, as stored in `hhea`.
#[derive(Debug, Copy, Clone, Default, Eq, PartialEq)]
pub struct HorizontalExtents {
    pub advance_width_max: u16,
    pub min_left_side_bearing: i16,
    pub min_right_side_bearing: i16,
    pub x_max_extent: i16,
}

pub fn write(
    metrics: &GlobalMetrics,
    extents: &HorizontalExtents,
    number_of_h_metrics: u16,
) -> Vec<u8> {
    let mut w = Writer::with_capacity(36);
    w.write::<u32>(0x00010000);
    w.write::<i16>(metrics.ascender);
    w.write::<i16>(metrics.descender);
    w.write::<i16>(metrics.line_gap);
    w.write::<u16>(extents.advance_width_max);
    w.write::<i16>(extents.min_left_side_bearing);
    w.write::<i16>(extents.min_right_side_bearing);
    w.write::<i16>(extents.x_max_extent);
    w.write::<i16>(1); // caret slope rise
    w.write::<i16>(0); // caret slope run
    w.write::<i16>(0); // caret offset
    w.write::<[u8; 8]>([0; 8]); // reserved
    w.write::<i16>(0); // metric data format
    w.write::<u16>(number_of_h_metrics);
    w.finish()
}
