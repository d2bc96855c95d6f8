//! The `post` table. Output fonts use format 3, which has no glyph names, so
//! merged glyphs from different fonts never need their names reconciled.

use crate::model::PostInfo;
use crate::stream::{Reader, Writer};
use crate::Result;

pub fn read(data: &[u8]) -> Result<PostInfo> {
    let mut r = Reader::new(data);
    r.skip(4)?; // version
    Ok(PostInfo {
        italic_angle: r.read::<i32>()?,
        underline_position: r.read::<i16>()?,
        underline_thickness: r.read::<i16>()?,
        is_fixed_pitch: r.read::<u32>()? != 0,
    })
}

pub fn write(info: &PostInfo) -> Vec<u8> {
    let mut w = Writer::with_capacity(32);
    w.write::<u32>(0x00030000);
    w.write::<i32>(info.italic_angle);
    w.write::<i16>(info.underline_position);
    w.write::<i16>(info.underline_thickness);
    w.write::<u32>(info.is_fixed_pitch as u32);
    // Memory usage hints.
    w.write::<[u8; 16]>([0; 16]);
    w.finish()
}
