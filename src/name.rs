//! The `name` table. Strings are decoded into one string per name id and
//! always written back as Windows Unicode English records.

use std::collections::BTreeMap;

use rustc_hash::FxHashMap;

use crate::stream::{Reader, Structure, Writer};
use crate::{Error, Result};

pub const COPYRIGHT: u16 = 0;
pub const FAMILY: u16 = 1;
pub const SUBFAMILY: u16 = 2;
pub const UNIQUE_ID: u16 = 3;
pub const FULL_NAME: u16 = 4;
pub const VERSION: u16 = 5;
pub const POSTSCRIPT_NAME: u16 = 6;
pub const TYPOGRAPHIC_FAMILY: u16 = 16;
pub const TYPOGRAPHIC_SUBFAMILY: u16 = 17;
pub const WWS_FAMILY: u16 = 21;
pub const WWS_SUBFAMILY: u16 = 22;

const WINDOWS_ENGLISH: u16 = 0x0409;

#[derive(Clone, Copy, Debug)]
struct NameRecord {
    platform_id: u16,
    encoding_id: u16,
    language_id: u16,
    name_id: u16,
    length: u16,
    string_offset: u16,
}

impl NameRecord {
    /// How much a record is preferred over others with the same name id.
    fn rank(&self) -> Option<u8> {
        match (self.platform_id, self.encoding_id, self.language_id) {
            (3, 1 | 10, WINDOWS_ENGLISH) => Some(4),
            (3, 1 | 10, _) => Some(3),
            (0, _, _) => Some(2),
            (1, 0, 0) => Some(1),
            _ => None,
        }
    }

    fn decode(&self, bytes: &[u8]) -> Option<String> {
        if self.platform_id == 1 {
            // Only the ASCII subset of Mac Roman is decoded faithfully.
            return Some(bytes.iter().map(|&b| if b < 128 { b as char } else { '?' }).collect());
        }

        let units: Vec<u16> =
            bytes.chunks_exact(2).map(|c| u16::from_be_bytes([c[0], c[1]])).collect();
        String::from_utf16(&units).ok()
    }
}

impl Structure<'_> for NameRecord {
    fn read(r: &mut Reader) -> Result<Self> {
        Ok(Self {
            platform_id: r.read::<u16>()?,
            encoding_id: r.read::<u16>()?,
            language_id: r.read::<u16>()?,
            name_id: r.read::<u16>()?,
            length: r.read::<u16>()?,
            string_offset: r.read::<u16>()?,
        })
    }

    fn write(&self, w: &mut Writer) {
        w.write::<u16>(self.platform_id);
        w.write::<u16>(self.encoding_id);
        w.write::<u16>(self.language_id);
        w.write::<u16>(self.name_id);
        w.write::<u16>(self.length);
        w.write::<u16>(self.string_offset);
    }
}

/// Decode the best string for every name id.
pub fn read(data: &[u8]) -> Result<BTreeMap<u16, String>> {
    let mut r = Reader::new(data);
    r.skip(2)?; // version
    let count = r.read::<u16>()?;
    let storage_offset = usize::from(r.read::<u16>()?);
    let records = r.read_vector::<NameRecord>(usize::from(count))?;
    let storage = data
        .get(storage_offset..)
        .ok_or_else(|| Error::CorruptData("name storage out of bounds".into()))?;

    let mut best: BTreeMap<u16, (u8, String)> = BTreeMap::new();
    for record in records {
        let Some(rank) = record.rank() else { continue };
        if best.get(&record.name_id).is_some_and(|(r, _)| *r >= rank) {
            continue;
        }

        let start = usize::from(record.string_offset);
        let end = start + usize::from(record.length);
        let Some(string) = storage.get(start..end).and_then(|bytes| record.decode(bytes))
        else {
            log::debug!("skipping undecodable name {}", record.name_id);
            continue;
        };

        best.insert(record.name_id, (rank, string));
    }

    Ok(best.into_iter().map(|(id, (_, string))| (id, string)).collect())
}

/// Encode the strings as Windows Unicode English records.
pub fn write(names: &BTreeMap<u16, String>) -> Result<Vec<u8>> {
    let count = u16::try_from(names.len()).map_err(|_| Error::Overflow)?;

    let mut records = Vec::with_capacity(names.len());
    let mut storage = Writer::new();
    let mut deduplicator: FxHashMap<&str, (u16, u16)> = FxHashMap::default();

    for (&name_id, string) in names {
        let (string_offset, length) = match deduplicator.get(string.as_str()) {
            Some(&location) => location,
            None => {
                let offset = u16::try_from(storage.len()).map_err(|_| Error::Overflow)?;
                for unit in string.encode_utf16() {
                    storage.write::<u16>(unit);
                }
                let length = u16::try_from(storage.len() - usize::from(offset))
                    .map_err(|_| Error::Overflow)?;
                deduplicator.insert(string, (offset, length));
                (offset, length)
            }
        };

        records.push(NameRecord {
            platform_id: 3,
            encoding_id: 1,
            language_id: WINDOWS_ENGLISH,
            name_id,
            length,
            string_offset,
        });
    }

    let mut w = Writer::new();
    w.write::<u16>(0); // version
    w.write::<u16>(count);
    w.write::<u16>(6 + count * 12);
    w.write_vector(&records);
    w.extend(&storage.finish());
    Ok(w.finish())
}
