//! The `glyf` and `loca` tables.
//!
//! Reading decodes every glyph into an [`Outline`]: simple glyphs into
//! explicit on/off curve points and composite glyphs into components that
//! refer to other glyphs by id. Writing encodes the outlines again, picks
//! the `loca` format from the total size and reports the bounding boxes that
//! the dependent tables (`head`, `hhea`, `hmtx`) need.

use crate::model::{
    BBox, Component, ComponentTransform, Contour, CurvePoint, FontModel, Outline,
};
use crate::stream::{F2Dot14, Reader, Structure, Writer};
use crate::{Error, Result};

// Simple glyph flags.
const ON_CURVE_POINT: u8 = 0x01;
const X_SHORT_VECTOR: u8 = 0x02;
const Y_SHORT_VECTOR: u8 = 0x04;
const REPEAT_FLAG: u8 = 0x08;
const X_IS_SAME_OR_POSITIVE: u8 = 0x10;
const Y_IS_SAME_OR_POSITIVE: u8 = 0x20;

// Composite glyph flags.
const ARG_1_AND_2_ARE_WORDS: u16 = 0x0001;
const ARGS_ARE_XY_VALUES: u16 = 0x0002;
const ROUND_XY_TO_GRID: u16 = 0x0004;
const WE_HAVE_A_SCALE: u16 = 0x0008;
const MORE_COMPONENTS: u16 = 0x0020;
const WE_HAVE_AN_X_AND_Y_SCALE: u16 = 0x0040;
const WE_HAVE_A_TWO_BY_TWO: u16 = 0x0080;
const WE_HAVE_INSTRUCTIONS: u16 = 0x0100;
const USE_MY_METRICS: u16 = 0x0200;
const OVERLAP_COMPOUND: u16 = 0x0400;
const SCALED_COMPONENT_OFFSET: u16 = 0x0800;
const UNSCALED_COMPONENT_OFFSET: u16 = 0x1000;

/// Flags of a component that are kept as-is when rewriting it.
const KEPT_FLAGS: u16 = ROUND_XY_TO_GRID
    | USE_MY_METRICS
    | OVERLAP_COMPOUND
    | SCALED_COMPONENT_OFFSET
    | UNSCALED_COMPONENT_OFFSET;

/// A glyf + loca table.
struct Table<'a> {
    loca: &'a [u8],
    glyf: &'a [u8],
    long: bool,
}

impl<'a> Table<'a> {
    fn glyph_data(&self, id: u16) -> Result<&'a [u8]> {
        let read_offset = |n: usize| -> Result<usize> {
            Ok(if self.long {
                u32::read_at(self.loca, 4 * n)? as usize
            } else {
                2 * usize::from(u16::read_at(self.loca, 2 * n)?)
            })
        };

        let n = usize::from(id);
        let from = read_offset(n)?;
        let to = read_offset(n + 1)?;
        if from > to {
            return Err(Error::CorruptData(format!("glyph {id} has a negative length")));
        }

        self.glyf.get(from..to).ok_or_else(|| {
            Error::CorruptData(format!("glyph {id} points past the glyf table"))
        })
    }
}

/// Decode all glyphs. Returns the bounding box stored in each glyph header
/// next to its outline.
pub fn read(
    glyf: &[u8],
    loca: &[u8],
    long: bool,
    num_glyphs: u16,
) -> Result<Vec<(Option<BBox>, Outline)>> {
    let table = Table { loca, glyf, long };
    let mut glyphs = Vec::with_capacity(usize::from(num_glyphs));
    for id in 0..num_glyphs {
        let data = table.glyph_data(id)?;
        let glyph = read_glyph(data).map_err(|err| match err {
            Error::CorruptData(what) => Error::CorruptData(format!("glyph {id}: {what}")),
            err => err,
        })?;
        glyphs.push(glyph);
    }
    Ok(glyphs)
}

fn read_glyph(data: &[u8]) -> Result<(Option<BBox>, Outline)> {
    if data.is_empty() {
        return Ok((None, Outline::Empty));
    }

    let mut r = Reader::new(data);
    let num_contours = r.read::<i16>()?;
    let bbox = BBox {
        x_min: r.read::<i16>()?,
        y_min: r.read::<i16>()?,
        x_max: r.read::<i16>()?,
        y_max: r.read::<i16>()?,
    };

    if num_contours < 0 {
        let (components, instructions) = read_components(&mut r)?;
        return Ok((Some(bbox), Outline::Composite { components, instructions }));
    }

    if num_contours == 0 {
        return Ok((None, Outline::Empty));
    }

    let (contours, instructions) = read_contours(&mut r, num_contours as usize)?;
    Ok((Some(bbox), Outline::Simple { contours, instructions }))
}

fn read_contours(r: &mut Reader, num_contours: usize) -> Result<(Vec<Contour>, Vec<u8>)> {
    let end_points = r.read_vector::<u16>(num_contours)?;
    let instruction_length = r.read::<u16>()?;
    let instructions = r.read_bytes(usize::from(instruction_length))?.to_vec();

    let num_points = match end_points.last() {
        Some(&last) => usize::from(last) + 1,
        None => 0,
    };

    if end_points.windows(2).any(|w| w[0] >= w[1]) {
        return Err(Error::CorruptData("contour end points are not increasing".into()));
    }

    let mut flags = Vec::with_capacity(num_points);
    while flags.len() < num_points {
        let flag = r.read::<u8>()?;
        flags.push(flag);
        if flag & REPEAT_FLAG != 0 {
            let count = r.read::<u8>()?;
            for _ in 0..count {
                flags.push(flag);
            }
        }
    }
    flags.truncate(num_points);

    let xs = read_coordinates(r, &flags, X_SHORT_VECTOR, X_IS_SAME_OR_POSITIVE)?;
    let ys = read_coordinates(r, &flags, Y_SHORT_VECTOR, Y_IS_SAME_OR_POSITIVE)?;

    let mut contours = Vec::with_capacity(num_contours);
    let mut start = 0;
    for end in end_points {
        let end = usize::from(end) + 1;
        let contour = (start..end)
            .map(|i| CurvePoint { x: xs[i], y: ys[i], on_curve: flags[i] & ON_CURVE_POINT != 0 })
            .collect();
        contours.push(contour);
        start = end;
    }

    Ok((contours, instructions))
}

fn read_coordinates(r: &mut Reader, flags: &[u8], short: u8, same: u8) -> Result<Vec<i16>> {
    let mut value = 0i16;
    let mut coordinates = Vec::with_capacity(flags.len());
    for &flag in flags {
        let delta = if flag & short != 0 {
            let magnitude = i16::from(r.read::<u8>()?);
            if flag & same != 0 { magnitude } else { -magnitude }
        } else if flag & same != 0 {
            0
        } else {
            r.read::<i16>()?
        };
        value = value.wrapping_add(delta);
        coordinates.push(value);
    }
    Ok(coordinates)
}

fn read_components(r: &mut Reader) -> Result<(Vec<Component>, Vec<u8>)> {
    let mut components = vec![];
    let mut have_instructions = false;

    loop {
        let flags = r.read::<u16>()?;
        let glyph = r.read::<u16>()?;

        if flags & ARGS_ARE_XY_VALUES == 0 {
            return Err(Error::CorruptData(
                "point-matching composite glyphs are not supported".into(),
            ));
        }

        let (dx, dy) = if flags & ARG_1_AND_2_ARE_WORDS != 0 {
            (r.read::<i16>()?, r.read::<i16>()?)
        } else {
            (i16::from(r.read::<u8>()? as i8), i16::from(r.read::<u8>()? as i8))
        };

        let transform = if flags & WE_HAVE_A_SCALE != 0 {
            ComponentTransform::Scale(r.read::<F2Dot14>()?)
        } else if flags & WE_HAVE_AN_X_AND_Y_SCALE != 0 {
            ComponentTransform::XyScale(r.read::<F2Dot14>()?, r.read::<F2Dot14>()?)
        } else if flags & WE_HAVE_A_TWO_BY_TWO != 0 {
            ComponentTransform::Matrix([
                r.read::<F2Dot14>()?,
                r.read::<F2Dot14>()?,
                r.read::<F2Dot14>()?,
                r.read::<F2Dot14>()?,
            ])
        } else {
            ComponentTransform::Identity
        };

        components.push(Component { glyph, dx, dy, transform, flags: flags & KEPT_FLAGS });
        have_instructions |= flags & WE_HAVE_INSTRUCTIONS != 0;

        if flags & MORE_COMPONENTS == 0 {
            break;
        }
    }

    let mut instructions = vec![];
    if have_instructions {
        let len = r.read::<u16>()?;
        instructions = r.read_bytes(usize::from(len))?.to_vec();
    }

    Ok((components, instructions))
}

/// The encoded `glyf` and `loca` tables of a font.
pub struct GlyfOutput {
    pub glyf: Vec<u8>,
    pub loca: Vec<u8>,
    pub long_loca: bool,
    /// The bounding box written for each glyph.
    pub bboxes: Vec<Option<BBox>>,
}

/// Encode all glyphs of a font.
pub fn write(font: &FontModel) -> Result<GlyfOutput> {
    let mut entries = Vec::with_capacity(font.glyphs.len());
    let mut bboxes = Vec::with_capacity(font.glyphs.len());
    let mut size = 0;

    for (id, glyph) in font.glyphs.iter().enumerate() {
        let (entry, bbox) = match &glyph.outline {
            Outline::Empty => (vec![], None),
            Outline::Simple { contours, instructions } => {
                match BBox::from_points(contours.iter().flatten()) {
                    Some(bbox) => (write_simple(contours, instructions, bbox)?, Some(bbox)),
                    None => (vec![], None),
                }
            }
            Outline::Composite { components, instructions } => {
                match glyph.bbox.or_else(|| font.resolve_bbox(id as u16)) {
                    Some(bbox) => {
                        (write_composite(components, instructions, bbox)?, Some(bbox))
                    }
                    None => (vec![], None),
                }
            }
            Outline::Cubic(_) => {
                return Err(Error::Format("cubic outlines must be converted first"));
            }
        };

        size += entry.len().next_multiple_of(2);
        entries.push(entry);
        bboxes.push(bbox);
    }

    let long_loca = size > 2 * (u16::MAX as usize);

    let mut glyf = Writer::with_capacity(size);
    let mut loca = Writer::with_capacity((entries.len() + 1) * 4);

    let mut write_offset = |offset: usize| -> Result<()> {
        if long_loca {
            loca.write::<u32>(u32::try_from(offset).map_err(|_| Error::Overflow)?);
        } else {
            loca.write::<u16>((offset / 2) as u16);
        }
        Ok(())
    };

    for entry in &entries {
        write_offset(glyf.len())?;
        glyf.extend(entry);
        glyf.align(if long_loca { 4 } else { 2 });
    }

    // Write the final offset.
    write_offset(glyf.len())?;

    Ok(GlyfOutput { glyf: glyf.finish(), loca: loca.finish(), long_loca, bboxes })
}

fn write_header(w: &mut Writer, num_contours: i16, bbox: BBox) {
    w.write::<i16>(num_contours);
    w.write::<i16>(bbox.x_min);
    w.write::<i16>(bbox.y_min);
    w.write::<i16>(bbox.x_max);
    w.write::<i16>(bbox.y_max);
}

fn write_simple(contours: &[Contour], instructions: &[u8], bbox: BBox) -> Result<Vec<u8>> {
    let contours: Vec<&Contour> = contours.iter().filter(|c| !c.is_empty()).collect();
    let num_contours = i16::try_from(contours.len()).map_err(|_| Error::Overflow)?;
    let instruction_len = u16::try_from(instructions.len()).map_err(|_| Error::Overflow)?;

    let mut w = Writer::new();
    write_header(&mut w, num_contours, bbox);

    let mut end = 0usize;
    for contour in &contours {
        end += contour.len();
        let end_point = u16::try_from(end - 1).map_err(|_| Error::Overflow)?;
        w.write::<u16>(end_point);
    }

    w.write::<u16>(instruction_len);
    w.extend(instructions);

    let points: Vec<CurvePoint> = contours.iter().copied().flatten().copied().collect();
    let mut flags = Vec::with_capacity(points.len());
    let mut xs = Writer::new();
    let mut ys = Writer::new();

    let mut prev = (0i16, 0i16);
    for p in &points {
        let dx = i32::from(p.x) - i32::from(prev.0);
        let dy = i32::from(p.y) - i32::from(prev.1);
        let mut flag = if p.on_curve { ON_CURVE_POINT } else { 0 };
        flag |= encode_delta(&mut xs, dx, X_SHORT_VECTOR, X_IS_SAME_OR_POSITIVE);
        flag |= encode_delta(&mut ys, dy, Y_SHORT_VECTOR, Y_IS_SAME_OR_POSITIVE);
        flags.push(flag);
        prev = (p.x, p.y);
    }

    // Run-length encode the flags.
    let mut i = 0;
    while i < flags.len() {
        let flag = flags[i];
        let mut repeat = 0;
        while repeat < 255 && i + 1 + repeat < flags.len() && flags[i + 1 + repeat] == flag {
            repeat += 1;
        }

        if repeat > 0 {
            w.write::<u8>(flag | REPEAT_FLAG);
            w.write::<u8>(repeat as u8);
        } else {
            w.write::<u8>(flag);
        }
        i += 1 + repeat;
    }

    w.extend(&xs.finish());
    w.extend(&ys.finish());
    Ok(w.finish())
}

fn encode_delta(w: &mut Writer, delta: i32, short: u8, same: u8) -> u8 {
    if delta == 0 {
        same
    } else if (-255..=255).contains(&delta) {
        w.write::<u8>(delta.unsigned_abs() as u8);
        if delta > 0 { short | same } else { short }
    } else {
        // Deltas between two i16 coordinates wrap around the same way on read.
        w.write::<i16>(delta as i16);
        0
    }
}

fn write_composite(
    components: &[Component],
    instructions: &[u8],
    bbox: BBox,
) -> Result<Vec<u8>> {
    let mut w = Writer::new();
    write_header(&mut w, -1, bbox);

    for (i, component) in components.iter().enumerate() {
        let last = i + 1 == components.len();
        let words = i8::try_from(component.dx).is_err() || i8::try_from(component.dy).is_err();

        let mut flags = (component.flags & KEPT_FLAGS) | ARGS_ARE_XY_VALUES;
        if words {
            flags |= ARG_1_AND_2_ARE_WORDS;
        }
        if !last {
            flags |= MORE_COMPONENTS;
        }
        if last && !instructions.is_empty() {
            flags |= WE_HAVE_INSTRUCTIONS;
        }
        flags |= match component.transform {
            ComponentTransform::Identity => 0,
            ComponentTransform::Scale(_) => WE_HAVE_A_SCALE,
            ComponentTransform::XyScale(..) => WE_HAVE_AN_X_AND_Y_SCALE,
            ComponentTransform::Matrix(_) => WE_HAVE_A_TWO_BY_TWO,
        };

        w.write::<u16>(flags);
        w.write::<u16>(component.glyph);
        if words {
            w.write::<i16>(component.dx);
            w.write::<i16>(component.dy);
        } else {
            w.write::<u8>(component.dx as i8 as u8);
            w.write::<u8>(component.dy as i8 as u8);
        }

        match component.transform {
            ComponentTransform::Identity => {}
            ComponentTransform::Scale(s) => w.write(s),
            ComponentTransform::XyScale(x, y) => {
                w.write(x);
                w.write(y);
            }
            ComponentTransform::Matrix(m) => w.write_vector(&m),
        }
    }

    if !instructions.is_empty() {
        w.write::<u16>(u16::try_from(instructions.len()).map_err(|_| Error::Overflow)?);
        w.extend(instructions);
    }

    Ok(w.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{GlobalMetrics, GlyphRecord};

    fn font_with(glyphs: Vec<GlyphRecord>) -> FontModel {
        let mut font = FontModel::new(GlobalMetrics {
            units_per_em: 1000,
            ascender: 800,
            descender: -200,
            line_gap: 0,
        });
        for glyph in glyphs {
            font.push_glyph(glyph);
        }
        font
    }

    fn square(size: i16) -> Contour {
        vec![
            CurvePoint::on(0, 0),
            CurvePoint::on(0, size),
            CurvePoint::off(size / 2, size + 300),
            CurvePoint::on(size, size),
            CurvePoint::on(size, 0),
        ]
    }

    #[test]
    fn simple_and_composite_glyphs_survive() {
        let composite = Outline::Composite {
            components: vec![
                Component {
                    glyph: 1,
                    dx: 0,
                    dy: 0,
                    transform: ComponentTransform::Identity,
                    flags: USE_MY_METRICS,
                },
                Component {
                    glyph: 1,
                    dx: 400,
                    dy: -3,
                    transform: ComponentTransform::Scale(F2Dot14(0x2000)),
                    flags: 0,
                },
            ],
            instructions: vec![],
        };

        let font = font_with(vec![
            GlyphRecord::empty(0, 500),
            GlyphRecord::simple(0, 500, vec![square(300), square(1000)]),
            GlyphRecord { glyph_id: 0, advance_width: 500, bbox: None, outline: composite },
        ]);

        let out = write(&font).unwrap();
        assert!(!out.long_loca);

        let glyphs = read(&out.glyf, &out.loca, out.long_loca, 3).unwrap();
        assert_eq!(glyphs[0], (None, Outline::Empty));
        assert_eq!(glyphs[1].1, font.glyphs[1].outline);
        assert_eq!(glyphs[1].0, font.glyphs[1].bbox);
        assert_eq!(glyphs[2].1, font.glyphs[2].outline);
        assert_eq!(glyphs[2].0, font.resolve_bbox(2));
    }

    #[test]
    fn large_fonts_use_long_loca() {
        let contour: Contour =
            (0..2000).map(|i| CurvePoint::on((i % 2) * 1000, i as i16)).collect();
        let glyphs = (0..50).map(|_| GlyphRecord::simple(0, 500, vec![contour.clone()]));
        let font = font_with(glyphs.collect());

        let out = write(&font).unwrap();
        assert!(out.long_loca);
        assert_eq!(out.loca.len(), 51 * 4);
        assert_eq!(out.glyf.len() % 4, 0);

        let glyphs = read(&out.glyf, &out.loca, true, 50).unwrap();
        assert_eq!(glyphs[49].1, font.glyphs[49].outline);
    }

    #[test]
    fn point_matching_is_unsupported() {
        let mut w = Writer::new();
        write_header(&mut w, -1, BBox { x_min: 0, y_min: 0, x_max: 1, y_max: 1 });
        w.write::<u16>(0); // no ARGS_ARE_XY_VALUES
        w.write::<u16>(1);
        w.write::<u8>(0);
        w.write::<u8>(0);

        let err = read_glyph(&w.finish()).unwrap_err();
        assert!(matches!(err, Error::CorruptData(_)));
    }

    #[test]
    fn cubic_outlines_are_refused() {
        let font = font_with(vec![GlyphRecord {
            glyph_id: 0,
            advance_width: 500,
            bbox: None,
            outline: Outline::Cubic(kurbo::BezPath::new()),
        }]);
        assert!(matches!(write(&font), Err(Error::Format(_))));
    }
}
