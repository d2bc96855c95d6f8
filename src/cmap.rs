//! The `cmap` table. Reading picks the best Unicode subtable of format 4 or
//! 12. Writing always emits a format 4 subtable for the BMP and, when
//! supplementary codepoints are mapped or the BMP does not fit format 4, a
//! format 12 subtable for everything.

use std::collections::BTreeMap;

use crate::stream::{Reader, Structure, Writer};
use crate::{Error, Result};

#[derive(Debug, Copy, Clone)]
struct EncodingRecord {
    platform_id: u16,
    encoding_id: u16,
    subtable_offset: u32,
}

impl EncodingRecord {
    fn is_unicode(&self) -> bool {
        self.platform_id == 0
            || (self.platform_id == 3 && [1, 10].contains(&self.encoding_id))
    }
}

impl Structure<'_> for EncodingRecord {
    fn read(r: &mut Reader) -> Result<Self> {
        let platform_id = r.read::<u16>()?;
        let encoding_id = r.read::<u16>()?;
        let subtable_offset = r.read::<u32>()?;
        Ok(EncodingRecord { platform_id, encoding_id, subtable_offset })
    }

    fn write(&self, w: &mut Writer) {
        w.write::<u16>(self.platform_id);
        w.write::<u16>(self.encoding_id);
        w.write::<u32>(self.subtable_offset);
    }
}

/// Read the character map of a font.
pub fn read(data: &[u8], num_glyphs: u16) -> Result<BTreeMap<u32, u16>> {
    let mut r = Reader::new(data);
    r.skip(2)?; // version
    let num_tables = r.read::<u16>()?;
    let records = r.read_vector::<EncodingRecord>(usize::from(num_tables))?;

    // Prefer full repertoire subtables, then the Windows platform.
    let mut best: Option<(u8, &[u8])> = None;
    for record in records.iter().filter(|r| r.is_unicode()) {
        let Some(subtable) = data.get(record.subtable_offset as usize..) else {
            continue;
        };

        let score = match (u16::read_at(subtable, 0)?, record.platform_id) {
            (12, 3) => 4,
            (12, _) => 3,
            (4, 3) => 2,
            (4, _) => 1,
            _ => continue,
        };

        if best.map_or(true, |(s, _)| score > s) {
            best = Some((score, subtable));
        }
    }

    let (score, subtable) =
        best.ok_or_else(|| Error::CorruptData("no unicode cmap subtable".into()))?;
    let mappings = if score >= 3 { read_format12(subtable)? } else { read_format4(subtable)? };

    if let Some((cp, gid)) = mappings.iter().find(|(_, &g)| g >= num_glyphs) {
        return Err(Error::CorruptData(format!(
            "cmap maps U+{cp:04X} to glyph {gid}, but the font has {num_glyphs} glyphs"
        )));
    }

    Ok(mappings)
}

fn read_format4(data: &[u8]) -> Result<BTreeMap<u32, u16>> {
    let mut r = Reader::new(data);
    r.skip(6)?; // format + length + language
    let seg_count_x2 = r.read::<u16>()?;
    if seg_count_x2 < 2 || seg_count_x2 % 2 != 0 {
        return Err(Error::CorruptData("invalid cmap segment count".into()));
    }

    let seg_count = usize::from(seg_count_x2 / 2);
    r.skip(6)?; // search range + entry selector + range shift
    let end_codes = r.read_vector::<u16>(seg_count)?;
    r.skip(2)?; // reserved pad
    let start_codes = r.read_vector::<u16>(seg_count)?;
    let id_deltas = r.read_vector::<i16>(seg_count)?;
    let id_range_offsets_start = r.offset();
    let id_range_offsets = r.read_vector::<u16>(seg_count)?;

    let mut mappings = BTreeMap::new();
    for i in 0..seg_count {
        let (start, end) = (start_codes[i], end_codes[i]);
        // 0xFFFF value is special and indicates codes end.
        if start == 0xFFFF && end == 0xFFFF {
            break;
        }

        let delta = id_deltas[i] as u16;
        let id_range_offset = id_range_offsets[i];
        for code_point in start..=end {
            let glyph = if id_range_offset == 0 {
                code_point.wrapping_add(delta)
            } else {
                let pos = id_range_offsets_start
                    + i * 2
                    + usize::from(id_range_offset)
                    + usize::from(code_point - start) * 2;
                match u16::read_at(data, pos)? {
                    // 0 indicates missing glyph.
                    0 => 0,
                    value => value.wrapping_add(delta),
                }
            };

            if glyph != 0 {
                mappings.insert(u32::from(code_point), glyph);
            }
        }
    }

    Ok(mappings)
}

fn read_format12(data: &[u8]) -> Result<BTreeMap<u32, u16>> {
    let mut r = Reader::new(data);
    r.skip(12)?; // format + reserved + length + language
    let num_groups = r.read::<u32>()?;

    let mut mappings = BTreeMap::new();
    for _ in 0..num_groups {
        let start = r.read::<u32>()?;
        let end = r.read::<u32>()?;
        let start_glyph = r.read::<u32>()?;
        if start > end || end > 0x10FFFF {
            return Err(Error::CorruptData("invalid cmap group".into()));
        }

        for code_point in start..=end {
            let glyph = start_glyph
                .checked_add(code_point - start)
                .and_then(|g| u16::try_from(g).ok())
                .ok_or_else(|| Error::CorruptData("cmap glyph id out of range".into()))?;
            if glyph != 0 {
                mappings.insert(code_point, glyph);
            }
        }
    }

    Ok(mappings)
}

/// Write a character map.
pub fn write(mappings: &BTreeMap<u32, u16>) -> Result<Vec<u8>> {
    let (format4, truncated) = write_format4(mappings)?;
    let needs_format12 = truncated || mappings.keys().any(|&c| c > 0xFFFF);

    let mut subtables = vec![format4];
    if needs_format12 {
        subtables.push(write_format12(mappings)?);
    }

    // Unicode BMP, Unicode full, Windows BMP, Windows full.
    let mut records = vec![(0, 3, 0), (3, 1, 0)];
    if needs_format12 {
        records = vec![(0, 3, 0), (0, 4, 1), (3, 1, 0), (3, 10, 1)];
    }

    let mut w = Writer::new();
    w.write::<u16>(0); // version
    w.write::<u16>(records.len() as u16);

    let mut offsets = vec![];
    let mut offset = 4 + records.len() * 8;
    for subtable in &subtables {
        offsets.push(u32::try_from(offset).map_err(|_| Error::Overflow)?);
        offset += subtable.len();
    }

    for (platform_id, encoding_id, subtable) in records {
        w.write(EncodingRecord {
            platform_id,
            encoding_id,
            subtable_offset: offsets[subtable],
        });
    }

    for subtable in &subtables {
        w.extend(subtable);
    }

    Ok(w.finish())
}

/// A run of consecutive codepoints mapped to consecutive glyphs.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
struct Segment {
    start: u32,
    end: u32,
    start_glyph: u16,
}

fn segments(mappings: impl Iterator<Item = (u32, u16)>) -> Vec<Segment> {
    let mut segments: Vec<Segment> = vec![];
    for (c, g) in mappings {
        if let Some(last) = segments.last_mut() {
            let len = last.end - last.start + 1;
            if c == last.end + 1 && u32::from(g) == u32::from(last.start_glyph) + len {
                last.end = c;
                continue;
            }
        }
        segments.push(Segment { start: c, end: c, start_glyph: g });
    }
    segments
}

/// Write a format 4 subtable. Also returns whether BMP mappings had to be
/// left out, in which case the caller must add a format 12 subtable.
fn write_format4(mappings: &BTreeMap<u32, u16>) -> Result<(Vec<u8>, bool)> {
    let mut segments =
        segments(mappings.range(..0xFFFF).map(|(&c, &g)| (c, g)).filter(|&(_, g)| g != 0));

    // The subtable length is a 16-bit field.
    const MAX_SEGMENTS: usize = (u16::MAX as usize - 16) / 8 - 1;
    let truncated = segments.len() > MAX_SEGMENTS;
    if truncated {
        let dropped: u32 = segments[MAX_SEGMENTS..].iter().map(|s| s.end - s.start + 1).sum();
        log::warn!("format 4 cmap subtable is full, {dropped} codepoints only in format 12");
        segments.truncate(MAX_SEGMENTS);
    }

    segments.push(Segment { start: 0xFFFF, end: 0xFFFF, start_glyph: 0 });

    let seg_count = segments.len() as u16;
    let entry_selector = seg_count.ilog2() as u16;
    let search_range = 2 * (1u16 << entry_selector);
    let length = 16 + 8 * usize::from(seg_count);

    let mut w = Writer::with_capacity(length);
    w.write::<u16>(4);
    w.write::<u16>(u16::try_from(length).map_err(|_| Error::Overflow)?);
    w.write::<u16>(0); // language
    w.write::<u16>(seg_count * 2);
    w.write::<u16>(search_range);
    w.write::<u16>(entry_selector);
    w.write::<u16>(seg_count * 2 - search_range);

    for s in &segments {
        w.write::<u16>(s.end as u16);
    }
    w.write::<u16>(0); // reserved pad
    for s in &segments {
        w.write::<u16>(s.start as u16);
    }
    for s in &segments {
        // The final segment maps 0xFFFF to glyph 0.
        let delta = if s.start == 0xFFFF { 1 } else { s.start_glyph.wrapping_sub(s.start as u16) };
        w.write::<u16>(delta);
    }
    for _ in &segments {
        w.write::<u16>(0); // id range offset
    }

    Ok((w.finish(), truncated))
}

fn write_format12(mappings: &BTreeMap<u32, u16>) -> Result<Vec<u8>> {
    let groups = segments(mappings.iter().map(|(&c, &g)| (c, g)).filter(|&(_, g)| g != 0));
    let length = 16 + 12 * groups.len();

    let mut w = Writer::with_capacity(length);
    w.write::<u16>(12);
    w.write::<u16>(0); // reserved
    w.write::<u32>(u32::try_from(length).map_err(|_| Error::Overflow)?);
    w.write::<u32>(0); // language
    w.write::<u32>(groups.len() as u32);
    for group in &groups {
        w.write::<u32>(group.start);
        w.write::<u32>(group.end);
        w.write::<u32>(u32::from(group.start_glyph));
    }

    Ok(w.finish())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(entries: &[(u32, u16)]) -> BTreeMap<u32, u16> {
        entries.iter().copied().collect()
    }

    #[test]
    fn bmp_only_uses_format4() {
        let mappings = map(&[(0x20, 1), (0x41, 2), (0x42, 3), (0x43, 4), (0x4E00, 9)]);
        let data = write(&mappings).unwrap();
        assert_eq!(u16::read_at(&data, 2).unwrap(), 2);
        assert_eq!(read(&data, 10).unwrap(), mappings);
    }

    #[test]
    fn supplementary_codepoints_use_format12() {
        let mappings = map(&[(0x41, 1), (0x20000, 2), (0x20001, 3)]);
        let data = write(&mappings).unwrap();
        assert_eq!(u16::read_at(&data, 2).unwrap(), 4);
        assert_eq!(read(&data, 4).unwrap(), mappings);
    }

    #[test]
    fn crowded_bmp_falls_back_to_format12() {
        // Every other codepoint, so each one needs its own segment.
        let mappings: BTreeMap<u32, u16> =
            (0..9000u16).map(|i| (0x4E00 + 2 * u32::from(i), i + 1)).collect();
        let data = write(&mappings).unwrap();
        assert_eq!(u16::read_at(&data, 2).unwrap(), 4);
        assert_eq!(read(&data, 9001).unwrap(), mappings);
    }

    #[test]
    fn format12_glyph_overflow_is_corrupt() {
        let mut w = Writer::new();
        w.write::<u16>(12);
        w.write::<u16>(0);
        w.write::<u32>(28);
        w.write::<u32>(0);
        w.write::<u32>(1);
        w.write_vector::<u32>(&[0x41, 0x42, u32::MAX]);
        assert!(matches!(read_format12(&w.finish()), Err(Error::CorruptData(_))));
    }

    #[test]
    fn consecutive_runs_share_a_segment() {
        let runs = segments([(0x41, 5), (0x42, 6), (0x43, 8), (0x45, 9)].into_iter());
        assert_eq!(
            runs,
            vec![
                Segment { start: 0x41, end: 0x42, start_glyph: 5 },
                Segment { start: 0x43, end: 0x43, start_glyph: 8 },
                Segment { start: 0x45, end: 0x45, start_glyph: 9 },
            ]
        );
    }

    #[test]
    fn dangling_glyph_ids_are_corrupt() {
        let data = write(&map(&[(0x41, 7)])).unwrap();
        assert!(matches!(read(&data, 3), Err(Error::CorruptData(_))));
    }

    #[test]
    fn format4_with_glyph_id_array() {
        // One segment 0x61..=0x62 going through the glyph id array, then the
        // final segment.
        let mut w = Writer::new();
        w.write::<u16>(4);
        w.write::<u16>(36);
        w.write::<u16>(0);
        w.write::<u16>(4); // seg count x2
        w.write::<u16>(4);
        w.write::<u16>(1);
        w.write::<u16>(0);
        w.write_vector::<u16>(&[0x62, 0xFFFF]);
        w.write::<u16>(0);
        w.write_vector::<u16>(&[0x61, 0xFFFF]);
        w.write_vector::<i16>(&[0, 1]);
        w.write_vector::<u16>(&[4, 0]);
        w.write_vector::<u16>(&[7, 3]);

        let mappings = read_format4(&w.finish()).unwrap();
        assert_eq!(mappings, map(&[(0x61, 7), (0x62, 3)]));
    }
}
