//! The `hmtx` table. Advance widths are stored per glyph, left side bearings
//! are always derived from the bounding boxes when writing.

use crate::hhea::HorizontalExtents;
use crate::model::BBox;
use crate::stream::{Reader, Writer};
use crate::{Error, Result};

/// Read the advance widths of all glyphs.
///
/// Glyphs past `number_of_h_metrics` repeat the last advance.
pub fn read(data: &[u8], number_of_h_metrics: u16, num_glyphs: u16) -> Result<Vec<u16>> {
    if number_of_h_metrics == 0 && num_glyphs > 0 {
        return Err(Error::CorruptData("hhea declares no horizontal metrics".into()));
    }

    let mut r = Reader::new(data);
    let mut advances = Vec::with_capacity(usize::from(num_glyphs));
    for _ in 0..number_of_h_metrics.min(num_glyphs) {
        advances.push(r.read::<u16>()?);
        r.skip(2)?; // left side bearing
    }

    let last = advances.last().copied().unwrap_or(0);
    advances.resize(usize::from(num_glyphs), last);
    Ok(advances)
}

/// Write the metrics of all glyphs, folding a trailing run of equal advance
/// widths. Returns the table, the number of long metrics and the extents for
/// `hhea`.
pub fn write(metrics: &[(u16, Option<BBox>)]) -> (Vec<u8>, u16, HorizontalExtents) {
    let mut number_of_h_metrics = metrics.len();
    if let Some(&(last, _)) = metrics.last() {
        while number_of_h_metrics > 1 && metrics[number_of_h_metrics - 2].0 == last {
            number_of_h_metrics -= 1;
        }
    }

    let mut extents: Option<HorizontalExtents> = None;
    let mut advance_width_max = 0;
    let mut w = Writer::with_capacity(metrics.len() * 4);

    for (i, &(advance, bbox)) in metrics.iter().enumerate() {
        let lsb = bbox.map_or(0, |b| b.x_min);
        if i < number_of_h_metrics {
            w.write::<u16>(advance);
        }
        w.write::<i16>(lsb);

        advance_width_max = advance_width_max.max(advance);

        // Glyphs without contours don't count towards the extents.
        let Some(bbox) = bbox else { continue };
        let rsb = i32::from(advance) - i32::from(bbox.x_max);
        let rsb = rsb.clamp(i32::from(i16::MIN), i32::from(i16::MAX)) as i16;
        let current = HorizontalExtents {
            advance_width_max: 0,
            min_left_side_bearing: lsb,
            min_right_side_bearing: rsb,
            x_max_extent: bbox.x_max,
        };

        extents = Some(match extents {
            None => current,
            Some(e) => HorizontalExtents {
                advance_width_max: 0,
                min_left_side_bearing: e.min_left_side_bearing.min(lsb),
                min_right_side_bearing: e.min_right_side_bearing.min(rsb),
                x_max_extent: e.x_max_extent.max(bbox.x_max),
            },
        });
    }

    let extents = HorizontalExtents { advance_width_max, ..extents.unwrap_or_default() };
    (w.finish(), number_of_h_metrics as u16, extents)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trailing_advances_are_folded() {
        let bbox = Some(BBox { x_min: 50, y_min: 0, x_max: 550, y_max: 700 });
        let metrics = [(500, None), (600, bbox), (1200, bbox), (1200, None), (1200, bbox)];
        let (data, count, extents) = write(&metrics);
        assert_eq!(count, 3);
        assert_eq!(data.len(), 3 * 4 + 2 * 2);
        assert_eq!(extents.advance_width_max, 1200);
        assert_eq!(extents.min_left_side_bearing, 50);
        assert_eq!(extents.min_right_side_bearing, 50);
        assert_eq!(extents.x_max_extent, 550);

        let advances = read(&data, count, 5).unwrap();
        assert_eq!(advances, vec![500, 600, 1200, 1200, 1200]);
    }
}
