//! The `head` table. Most of it is carried over as [`HeadInfo`], the rest
//! (bounding box, `loca` format) is recomputed from the glyphs when writing.
//! The checksum adjustment is filled in by `face::construct` in the very end.

use crate::model::{BBox, HeadInfo};
use crate::stream::{Reader, Writer};
use crate::{Error, Result};

const MAGIC: u32 = 0x5F0F3CF5;

/// The parts of the `head` table needed to read a font.
#[derive(Debug, Copy, Clone)]
pub struct Head {
    pub info: HeadInfo,
    pub units_per_em: u16,
    pub long_loca: bool,
}

pub fn read(data: &[u8]) -> Result<Head> {
    let mut r = Reader::new(data);
    r.skip(4)?; // version
    let font_revision = r.read::<i32>()?;
    r.skip(4)?; // checksum adjustment
    if r.read::<u32>()? != MAGIC {
        return Err(Error::CorruptData("bad head magic number".into()));
    }

    let flags = r.read::<u16>()?;
    let units_per_em = r.read::<u16>()?;
    if !(16..=16384).contains(&units_per_em) {
        return Err(Error::CorruptData(format!("invalid units per em {units_per_em}")));
    }

    let created = r.read::<i64>()?;
    let modified = r.read::<i64>()?;
    r.skip(8)?; // bounding box
    let mac_style = r.read::<u16>()?;
    let lowest_rec_ppem = r.read::<u16>()?;
    let font_direction_hint = r.read::<i16>()?;
    let index_to_loc_format = r.read::<i16>()?;

    Ok(Head {
        info: HeadInfo {
            font_revision,
            flags,
            created,
            modified,
            mac_style,
            lowest_rec_ppem,
            font_direction_hint,
        },
        units_per_em,
        long_loca: index_to_loc_format != 0,
    })
}

pub fn write(info: &HeadInfo, units_per_em: u16, bbox: BBox, long_loca: bool) -> Vec<u8> {
    let mut w = Writer::with_capacity(54);
    w.write::<u32>(0x00010000);
    w.write::<i32>(info.font_revision);
    w.write::<u32>(0); // checksum adjustment
    w.write::<u32>(MAGIC);
    w.write::<u16>(info.flags);
    w.write::<u16>(units_per_em);
    w.write::<i64>(info.created);
    w.write::<i64>(info.modified);
    w.write::<i16>(bbox.x_min);
    w.write::<i16>(bbox.y_min);
    w.write::<i16>(bbox.x_max);
    w.write::<i16>(bbox.y_max);
    w.write::<u16>(info.mac_style);
    w.write::<u16>(info.lowest_rec_ppem);
    w.write::<i16>(info.font_direction_hint);
    w.write::<i16>(long_loca as i16);
    w.write::<i16>(0); // glyph data format
    w.finish()
}

/// Seconds between 1904-01-01 (the `head` epoch) and 1970-01-01.
const MAC_EPOCH_OFFSET: i64 = 2_082_844_800;

/// Convert seconds since the Unix epoch to a `head` timestamp.
pub fn timestamp_from_unix(seconds: i64) -> i64 {
    seconds.saturating_add(MAC_EPOCH_OFFSET)
}

/// Parse a version string like `1.250` or `Version 2.1` into a 16.16 fixed
/// point font revision.
pub fn revision_from_version(version: &str) -> Option<i32> {
    let number = version
        .trim()
        .trim_start_matches(|c: char| !c.is_ascii_digit())
        .split(|c: char| !(c.is_ascii_digit() || c == '.'))
        .next()?;

    let value: f64 = number.parse().ok()?;
    let fixed = (value * 65536.0).round();
    (0.0..=f64::from(i32::MAX)).contains(&fixed).then_some(fixed as i32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read() {
        let info = HeadInfo { created: 42, modified: 43, ..HeadInfo::default() };
        let bbox = BBox { x_min: -10, y_min: -200, x_max: 1000, y_max: 900 };
        let data = write(&info, 2048, bbox, true);
        assert_eq!(data.len(), 54);

        let head = read(&data).unwrap();
        assert_eq!(head.info, info);
        assert_eq!(head.units_per_em, 2048);
        assert!(head.long_loca);
    }

    #[test]
    fn revision_parsing() {
        assert_eq!(revision_from_version("1.5"), Some(0x0001_8000));
        assert_eq!(revision_from_version("Version 2.000; build 7"), Some(0x0002_0000));
        assert_eq!(revision_from_version("nightly"), None);
    }

    #[test]
    fn unix_timestamps_are_rebased() {
        assert_eq!(timestamp_from_unix(0), 2_082_844_800);
    }
}
