//! The OpenType table directory: locating tables in a font or collection and
//! constructing a brand new font from a list of tables.

use crate::stream::{Reader, Structure, Writer};
use crate::{Error, Result, Tag};

/// What kind of contents the font has.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum FontKind {
    /// TrueType outlines.
    TrueType,
    /// CFF outlines.
    Cff,
    /// A font collection.
    Collection,
}

impl Structure<'_> for FontKind {
    fn read(r: &mut Reader) -> Result<Self> {
        match r.read::<u32>()? {
            0x00010000 | 0x74727565 => Ok(FontKind::TrueType),
            0x4F54544F => Ok(FontKind::Cff),
            0x74746366 => Ok(FontKind::Collection),
            _ => Err(Error::Format("unknown font magic")),
        }
    }

    fn write(&self, w: &mut Writer) {
        w.write::<u32>(match self {
            FontKind::TrueType => 0x00010000,
            FontKind::Cff => 0x4F54544F,
            FontKind::Collection => 0x74746366,
        })
    }
}

impl Structure<'_> for Tag {
    fn read(r: &mut Reader) -> Result<Self> {
        r.read::<[u8; 4]>().map(Self)
    }

    fn write(&self, w: &mut Writer) {
        w.write::<[u8; 4]>(self.0)
    }
}

/// Locates a table in the font file.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct TableRecord {
    pub tag: Tag,
    pub checksum: u32,
    pub offset: u32,
    pub length: u32,
}

impl Structure<'_> for TableRecord {
    fn read(r: &mut Reader) -> Result<Self> {
        Ok(TableRecord {
            tag: r.read::<Tag>()?,
            checksum: r.read::<u32>()?,
            offset: r.read::<u32>()?,
            length: r.read::<u32>()?,
        })
    }

    fn write(&self, w: &mut Writer) {
        w.write::<Tag>(self.tag);
        w.write::<u32>(self.checksum);
        w.write::<u32>(self.offset);
        w.write::<u32>(self.length);
    }
}

/// A font face with OpenType tables.
pub struct Face<'a> {
    /// The whole file. Table offsets are relative to its start, also for
    /// members of a collection.
    data: &'a [u8],
    kind: FontKind,
    records: Vec<TableRecord>,
}

impl<'a> Face<'a> {
    /// Parse the table directory of the face at `index`.
    ///
    /// The index is only relevant for font collections; for a single font it
    /// must be 0.
    pub fn parse(data: &'a [u8], index: u32) -> Result<Self> {
        let mut r = Reader::new(data);
        let mut kind = r.read::<FontKind>()?;

        if kind == FontKind::Collection {
            r.skip(4)?; // version
            let num_fonts = r.read::<u32>()?;
            if index >= num_fonts {
                return Err(Error::Format("collection index out of range"));
            }

            let offset = u32::read_at(data, 12 + 4 * (index as usize))?;
            r = Reader::new_at(data, offset as usize);
            kind = r.read::<FontKind>()?;
            if kind == FontKind::Collection {
                return Err(Error::Format("nested font collection"));
            }
        } else if index != 0 {
            return Err(Error::Format("collection index out of range"));
        }

        let count = r.read::<u16>()?;
        r.skip(6)?; // search range + entry selector + range shift

        let mut records = r.read_vector::<TableRecord>(usize::from(count))?;
        records.sort_by_key(|record| record.tag);

        log::debug!("face {index}: {kind:?} with {count} tables");

        Ok(Face { data, kind, records })
    }

    /// Whether the face has TrueType or CFF outlines.
    pub fn kind(&self) -> FontKind {
        self.kind
    }

    /// The tags of all tables in the face.
    pub fn tags(&self) -> impl Iterator<Item = Tag> + '_ {
        self.records.iter().map(|record| record.tag)
    }

    /// The data of a table, if present and in bounds.
    pub fn table(&self, tag: Tag) -> Option<&'a [u8]> {
        let i = self.records.binary_search_by(|record| record.tag.cmp(&tag)).ok()?;
        let record = self.records.get(i)?;
        let start = record.offset as usize;
        let end = start.checked_add(record.length as usize)?;
        self.data.get(start..end)
    }

    /// Expect a table.
    pub fn expect_table(&self, tag: Tag) -> Result<&'a [u8]> {
        self.table(tag)
            .ok_or_else(|| Error::CorruptData(format!("missing {tag} table")))
    }
}

/// Construct a brand new TrueType font from its tables.
pub fn construct(mut tables: Vec<(Tag, Vec<u8>)>) -> Result<Vec<u8>> {
    let mut w = Writer::with_capacity(
        12 + tables.iter().map(|(_, data)| 16 + data.len() + 3).sum::<usize>(),
    );
    w.write::<FontKind>(FontKind::TrueType);

    // Tables shall be sorted by tag.
    tables.sort_by_key(|&(tag, _)| tag);

    // Write table directory.
    let count = u16::try_from(tables.len()).map_err(|_| Error::Overflow)?;
    let entry_selector = if count == 0 { 0 } else { count.ilog2() as u16 };
    let search_range = (1u16 << entry_selector) * 16;
    let range_shift = count * 16 - search_range;
    w.write(count);
    w.write(search_range);
    w.write(entry_selector);
    w.write(range_shift);

    // Offset of the checksum adjustment field in the head table, which can
    // only be written after checksumming the whole font.
    let mut checksum_adjustment_offset = None;

    // Write table records.
    let mut offset = 12 + tables.len() * 16;
    for (tag, data) in &mut tables {
        if *tag == Tag::HEAD {
            // Zero out checksum field in head table.
            data.get_mut(8..12)
                .ok_or_else(|| Error::CorruptData("head table too short".into()))?
                .fill(0);
            checksum_adjustment_offset = Some(offset + 8);
        }

        let len = data.len();
        w.write(TableRecord {
            tag: *tag,
            checksum: checksum(data),
            offset: u32::try_from(offset).map_err(|_| Error::Overflow)?,
            length: u32::try_from(len).map_err(|_| Error::Overflow)?,
        });

        log::trace!("{tag}: {len} bytes");

        // Increase offset, plus padding zeros to align to 4 bytes.
        offset += len;
        offset = offset.next_multiple_of(4);
    }

    // Write tables.
    for (_, data) in &tables {
        w.extend(data);
        w.align(4);
    }

    // Write checksum adjustment field in head table.
    let mut data = w.finish();
    if let Some(i) = checksum_adjustment_offset {
        let sum = checksum(&data);
        let val = 0xB1B0AFBA_u32.wrapping_sub(sum);
        data[i..i + 4].copy_from_slice(&val.to_be_bytes());
    }

    Ok(data)
}

/// Calculate a checksum over the sliced data as a sum of u32s. If the data
/// length is not a multiple of four, it is treated as if padded with zero to a
/// length that is a multiple of four.
pub fn checksum(data: &[u8]) -> u32 {
    let mut sum = 0u32;
    for chunk in data.chunks(4) {
        let mut bytes = [0; 4];
        bytes[..chunk.len()].copy_from_slice(chunk);
        sum = sum.wrapping_add(u32::from_be_bytes(bytes));
    }
    sum
}
