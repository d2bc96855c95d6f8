//! PostScript outlines (`CFF ` and `CFF2`) are not decoded by hand. Instead,
//! `skrifa` draws every glyph into a `kurbo` path, which the outline
//! converter later turns into quadratic contours.

use kurbo::BezPath;
use skrifa::instance::{LocationRef, Size};
use skrifa::outline::{DrawSettings, OutlineGlyphFormat, OutlinePen};
use skrifa::{FontRef, GlyphId, OutlineGlyphCollection};

use crate::{Error, Result};

/// Draw the outlines of all glyphs of the face at `index`.
pub fn read(data: &[u8], index: u32, num_glyphs: u16) -> Result<Vec<BezPath>> {
    let font_ref = FontRef::from_index(data, index)
        .map_err(|err| Error::CorruptData(format!("unreadable CFF font: {err}")))?;

    let outlines = OutlineGlyphCollection::with_format(&font_ref, OutlineGlyphFormat::Cff)
        .or_else(|| OutlineGlyphCollection::with_format(&font_ref, OutlineGlyphFormat::Cff2))
        .ok_or_else(|| Error::CorruptData("missing CFF table".into()))?;

    let mut paths = Vec::with_capacity(usize::from(num_glyphs));
    for glyph in 0..num_glyphs {
        let mut pen = PathPen::default();

        if let Some(outline) = outlines.get(GlyphId::new(u32::from(glyph))) {
            outline
                .draw(DrawSettings::unhinted(Size::unscaled(), LocationRef::default()), &mut pen)
                .map_err(|err| {
                    Error::CorruptData(format!("glyph {glyph}: cannot draw outline: {err}"))
                })?;
        }

        paths.push(pen.path);
    }

    Ok(paths)
}

/// Collects drawing commands into a path.
#[derive(Default)]
struct PathPen {
    path: BezPath,
}

impl OutlinePen for PathPen {
    #[inline]
    fn move_to(&mut self, x: f32, y: f32) {
        self.path.move_to((x as f64, y as f64));
    }

    #[inline]
    fn line_to(&mut self, x: f32, y: f32) {
        self.path.line_to((x as f64, y as f64));
    }

    #[inline]
    fn quad_to(&mut self, cx: f32, cy: f32, x: f32, y: f32) {
        self.path.quad_to((cx as f64, cy as f64), (x as f64, y as f64));
    }

    #[inline]
    fn curve_to(&mut self, cx0: f32, cy0: f32, cx1: f32, cy1: f32, x: f32, y: f32) {
        self.path.curve_to(
            (cx0 as f64, cy0 as f64),
            (cx1 as f64, cy1 as f64),
            (x as f64, y as f64),
        );
    }

    #[inline]
    fn close(&mut self) {
        self.path.close_path();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::face::{construct, Face};
    use crate::font_data::{parse, serialize};
    use crate::model::{FontModel, GlobalMetrics, GlyphRecord, Outline, OutlineFormat};
    use crate::outline::convert_font;
    use crate::stream::Writer;
    use crate::Tag;
    use kurbo::PathEl;

    /// A CFF INDEX with 2-byte offsets.
    fn index(items: &[&[u8]]) -> Vec<u8> {
        let mut w = Writer::new();
        w.write::<u16>(items.len() as u16);
        if !items.is_empty() {
            w.write::<u8>(2);
            let mut offset = 1;
            w.write::<u16>(offset);
            for item in items {
                offset += item.len() as u16;
                w.write::<u16>(offset);
            }
            for item in items {
                w.extend(item);
            }
        }
        w.finish()
    }

    /// A charstring operand.
    fn num(v: i16) -> [u8; 3] {
        let [hi, lo] = v.to_be_bytes();
        [28, hi, lo]
    }

    /// A `CFF ` table with an empty `.notdef` and one glyph made of two lines
    /// and a cubic curve.
    fn cff_table() -> Vec<u8> {
        let mut glyph = vec![];
        for (args, op) in [
            (&[100, 0][..], 21),                      // rmoveto
            (&[400, 0][..], 5),                       // rlineto
            (&[100, 200, 0, 300, -100, 200][..], 8),  // rrcurveto
            (&[-400, 0][..], 5),                      // rlineto
        ] {
            glyph.extend(args.iter().flat_map(|&v| num(v)));
            glyph.push(op);
        }
        glyph.push(14); // endchar

        let header = [1, 0, 4, 1];
        let names = index(&[b"Test"]);
        let strings = index(&[]);
        let subrs = index(&[]);

        // The top dict holds one 5-byte offset and the CharStrings operator.
        let top_dict_len = index(&[&[0; 6]]).len();
        let offset = header.len() + names.len() + top_dict_len + strings.len() + subrs.len();
        let mut top_dict = vec![29];
        top_dict.extend((offset as i32).to_be_bytes());
        top_dict.push(17);

        let mut data = header.to_vec();
        data.extend(names);
        data.extend(index(&[&top_dict]));
        data.extend(strings);
        data.extend(subrs);
        data.extend(index(&[&[14], &glyph]));
        data
    }

    /// An OpenType font with CFF outlines.
    fn otf() -> Vec<u8> {
        let mut model = FontModel::new(GlobalMetrics {
            units_per_em: 1000,
            ascender: 800,
            descender: -200,
            line_gap: 0,
        });
        model.push_glyph(GlyphRecord::empty(0, 500));
        let o = model.push_glyph(GlyphRecord::empty(0, 600));
        model.map('O' as u32, o);

        let ttf = serialize(&model).unwrap();
        let face = Face::parse(&ttf, 0).unwrap();
        let mut tables: Vec<(Tag, Vec<u8>)> = face
            .tags()
            .filter(|&tag| tag != Tag::GLYF && tag != Tag::LOCA)
            .map(|tag| (tag, face.table(tag).unwrap().to_vec()))
            .collect();
        tables.push((Tag::CFF, cff_table()));

        let mut data = construct(tables).unwrap();
        data[..4].copy_from_slice(b"OTTO");
        data
    }

    #[test]
    fn draws_cff_glyphs() {
        let paths = read(&otf(), 0, 2).unwrap();
        assert_eq!(paths.len(), 2);
        assert!(paths[0].elements().is_empty());

        let elements = paths[1].elements();
        assert_eq!(elements[0], PathEl::MoveTo((100.0, 0.0).into()));
        assert_eq!(elements[1], PathEl::LineTo((500.0, 0.0).into()));
        assert_eq!(
            elements[2],
            PathEl::CurveTo((600.0, 200.0).into(), (600.0, 500.0).into(), (500.0, 700.0).into())
        );
        assert_eq!(elements[3], PathEl::LineTo((100.0, 700.0).into()));
        assert_eq!(elements.last(), Some(&PathEl::ClosePath));
    }

    #[test]
    fn cff_font_converts_to_quadratic() {
        let font = parse(&otf(), 0).unwrap();
        assert_eq!(font.format, OutlineFormat::Cff);
        assert!(font.extra_tables.is_empty());
        assert!(matches!(font.glyphs[1].outline, Outline::Cubic(_)));
        assert_eq!(font.glyphs[1].advance_width, 600);
        assert_eq!(font.cmap.get(&('O' as u32)), Some(&1));

        let font = convert_font(font, 1.0).unwrap();
        assert_eq!(font.format, OutlineFormat::TrueType);
        assert_eq!(font.glyphs[0].outline, Outline::Empty);

        let Outline::Simple { contours, .. } = &font.glyphs[1].outline else {
            panic!("expected a simple glyph");
        };
        assert_eq!(contours.len(), 1);
        assert!(contours[0].iter().any(|p| !p.on_curve));

        // The curve bulges out to x = 575. Off-curve points may lie a bit
        // further out.
        let bbox = font.glyphs[1].bbox.unwrap();
        assert_eq!((bbox.x_min, bbox.y_min, bbox.y_max), (100, 0, 700));
        assert!((575..=600).contains(&bbox.x_max), "{bbox:?}");
    }

    #[test]
    fn pen_records_all_segments() {
        let mut pen = PathPen::default();
        pen.move_to(0.0, 0.0);
        pen.line_to(100.0, 0.0);
        pen.curve_to(100.0, 50.0, 50.0, 100.0, 0.0, 100.0);
        pen.close();

        let elements = pen.path.elements();
        assert_eq!(elements.len(), 4);
        assert!(matches!(elements[2], PathEl::CurveTo(..)));
        assert_eq!(elements[3], PathEl::ClosePath);
    }

    #[test]
    fn truetype_data_is_not_cff() {
        assert!(read(b"not a font", 0, 1).is_err());
    }
}
