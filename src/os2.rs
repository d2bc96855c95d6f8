//! The `OS/2` table is carried over from the anchor font as raw bytes and
//! patched in place, like the `head` table's `loca` format.

use crate::stream::{Reader, Structure, Writer};
use crate::{Error, Result};

const X_AVG_CHAR_WIDTH: usize = 2;
const PANOSE_PROPORTION: usize = 35;
const UNICODE_RANGE: usize = 42;
const VENDOR_ID: usize = 58;
const FIRST_CHAR_INDEX: usize = 64;
const TYPO_ASCENDER: usize = 68;
const WIN_ASCENT: usize = 74;
const CODE_PAGE_RANGE: usize = 78;

/// Size of a version 0 table, which lacks the code page ranges.
const VERSION0_LEN: usize = 78;
/// Size of a version 4 table.
const VERSION4_LEN: usize = 96;

/// PANOSE proportion value for monospaced fonts.
const MONOSPACED: u8 = 9;

/// Values the merged font overrides.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Os2Values {
    pub avg_char_width: i16,
    pub ascender: i16,
    pub descender: i16,
    pub line_gap: i16,
    pub first_char_index: u16,
    pub last_char_index: u16,
    pub unicode_ranges: [u32; 4],
    pub code_page_ranges: [u32; 2],
    pub vendor_id: Option<[u8; 4]>,
}

/// A version 4 table for fonts that have none.
pub fn blank() -> Vec<u8> {
    let mut w = Writer::with_capacity(VERSION4_LEN);
    w.write::<u16>(4); // version
    w.write::<i16>(0); // average char width
    w.write::<u16>(400); // weight class
    w.write::<u16>(5); // width class
    w.write::<u16>(0); // embedding permissions
    w.write::<[u8; 20]>([0; 20]); // sub- and superscript, strikeout
    w.write::<i16>(0); // family class
    w.write::<[u8; 10]>([2, 0, 5, 0, 0, 0, 0, 0, 0, 0]); // panose
    w.write::<[u8; 16]>([0; 16]); // unicode ranges
    w.write::<[u8; 4]>(*b"NONE");
    w.write::<u16>(0x0040); // regular
    w.write::<[u8; 22]>([0; 22]); // char indices, metrics, code pages
    w.write::<[u8; 4]>([0; 4]); // x-height, cap height
    w.write::<u16>(0); // default char
    w.write::<u16>(0x20); // break char
    w.write::<u16>(1); // max context
    w.finish()
}

/// The Unicode range bits of a table.
pub fn unicode_ranges(table: &[u8]) -> Result<[u32; 4]> {
    let mut r = Reader::new_at(table, UNICODE_RANGE);
    Ok([r.read()?, r.read()?, r.read()?, r.read()?])
}

/// The code page range bits of a table, zero for version 0 tables.
pub fn code_page_ranges(table: &[u8]) -> Result<[u32; 2]> {
    if table.len() < CODE_PAGE_RANGE + 8 {
        return Ok([0; 2]);
    }

    let mut r = Reader::new_at(table, CODE_PAGE_RANGE);
    Ok([r.read()?, r.read()?])
}

/// Write the merged font's values into a table.
pub fn patch(mut table: Vec<u8>, values: &Os2Values) -> Result<Vec<u8>> {
    if table.len() < VERSION0_LEN {
        return Err(Error::CorruptData("OS/2 table too short".into()));
    }

    // Version 0 tables have no code page ranges, upgrade them.
    if table.len() < CODE_PAGE_RANGE + 8 {
        table.resize(VERSION4_LEN, 0);
        table[0..2].copy_from_slice(&4u16.to_be_bytes());
        put(&mut table, 92, 0x20u16)?; // break char
    }

    put(&mut table, X_AVG_CHAR_WIDTH, values.avg_char_width)?;
    table[PANOSE_PROPORTION] = MONOSPACED;

    for (i, bits) in values.unicode_ranges.iter().enumerate() {
        put(&mut table, UNICODE_RANGE + 4 * i, *bits)?;
    }

    if let Some(vendor_id) = values.vendor_id {
        put(&mut table, VENDOR_ID, vendor_id)?;
    }

    put(&mut table, FIRST_CHAR_INDEX, values.first_char_index)?;
    put(&mut table, FIRST_CHAR_INDEX + 2, values.last_char_index)?;
    put(&mut table, TYPO_ASCENDER, values.ascender)?;
    put(&mut table, TYPO_ASCENDER + 2, values.descender)?;
    put(&mut table, TYPO_ASCENDER + 4, values.line_gap)?;
    put(&mut table, WIN_ASCENT, values.ascender.max(0) as u16)?;
    put(&mut table, WIN_ASCENT + 2, values.descender.unsigned_abs())?;

    for (i, bits) in values.code_page_ranges.iter().enumerate() {
        put(&mut table, CODE_PAGE_RANGE + 4 * i, *bits)?;
    }

    Ok(table)
}

fn put<'a, T: Structure<'a>>(table: &mut [u8], offset: usize, value: T) -> Result<()> {
    let mut w = Writer::with_capacity(4);
    w.write(value);
    let bytes = w.finish();
    table
        .get_mut(offset..offset + bytes.len())
        .ok_or_else(|| Error::CorruptData("OS/2 table too short".into()))?
        .copy_from_slice(&bytes);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_table_has_version4_layout() {
        assert_eq!(blank().len(), VERSION4_LEN);
        assert_eq!(&blank()[VENDOR_ID..VENDOR_ID + 4], b"NONE");
    }

    #[test]
    fn patching_upgrades_version0() {
        let mut table = blank();
        table.truncate(VERSION0_LEN);
        table[0..2].copy_from_slice(&0u16.to_be_bytes());

        let values = Os2Values {
            avg_char_width: 600,
            ascender: 1100,
            descender: -300,
            unicode_ranges: [1, 2, 3, 4],
            code_page_ranges: [0x0004_0001, 0],
            vendor_id: Some(*b"MONO"),
            first_char_index: 0x20,
            last_char_index: 0xFFE5,
            ..Os2Values::default()
        };

        let table = patch(table, &values).unwrap();
        assert_eq!(table.len(), VERSION4_LEN);
        assert_eq!(u16::read_at(&table, 0).unwrap(), 4);
        assert_eq!(i16::read_at(&table, X_AVG_CHAR_WIDTH).unwrap(), 600);
        assert_eq!(table[PANOSE_PROPORTION], MONOSPACED);
        assert_eq!(unicode_ranges(&table).unwrap(), [1, 2, 3, 4]);
        assert_eq!(code_page_ranges(&table).unwrap(), [0x0004_0001, 0]);
        assert_eq!(&table[VENDOR_ID..VENDOR_ID + 4], b"MONO");
        assert_eq!(u16::read_at(&table, WIN_ASCENT + 2).unwrap(), 300);
        assert_eq!(u16::read_at(&table, FIRST_CHAR_INDEX + 2).unwrap(), 0xFFE5);
    }
}
