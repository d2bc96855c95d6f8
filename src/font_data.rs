//! Reading fonts into a [`FontModel`] and writing models back out as
//! TrueType fonts.

use std::collections::BTreeMap;
use std::io::Write as _;
use std::path::Path;

use kurbo::Shape;

use crate::face::{self, Face, FontKind};
use crate::maxp::MaxpStats;
use crate::model::{BBox, FontModel, GlobalMetrics, GlyphRecord, Outline, OutlineFormat};
use crate::{cff, cmap, glyf, head, hhea, hmtx, maxp, name, post};
use crate::{Error, Result, Tag};

/// Tables that are modeled explicitly and therefore never passed through.
const MODELED: [Tag; 12] = [
    Tag::CMAP,
    Tag::HEAD,
    Tag::HHEA,
    Tag::HMTX,
    Tag::MAXP,
    Tag::NAME,
    Tag::OS2,
    Tag::POST,
    Tag::GLYF,
    Tag::LOCA,
    Tag::CFF,
    Tag::CFF2,
];

/// Parse a font from OpenType data.
///
/// - The `data` must be in the OpenType font format, with TrueType or CFF
///   outlines.
/// - The `index` is only relevant if the data contains a font collection
///   (`.ttc` or `.otc` file). Otherwise, it should be 0.
pub fn parse(data: &[u8], index: u32) -> Result<FontModel> {
    let face = Face::parse(data, index)?;

    let head = head::read(face.expect_table(Tag::HEAD)?)?;
    let hhea = hhea::read(face.expect_table(Tag::HHEA)?)?;
    let num_glyphs = maxp::read_num_glyphs(face.expect_table(Tag::MAXP)?)?;
    if num_glyphs == 0 {
        return Err(Error::CorruptData("font has no glyphs".into()));
    }

    let advances =
        hmtx::read(face.expect_table(Tag::HMTX)?, hhea.number_of_h_metrics, num_glyphs)?;

    let (format, outlines) = match face.kind() {
        FontKind::TrueType => {
            let glyf = face.expect_table(Tag::GLYF)?;
            let loca = face.expect_table(Tag::LOCA)?;
            (OutlineFormat::TrueType, glyf::read(glyf, loca, head.long_loca, num_glyphs)?)
        }
        FontKind::Cff => {
            if face.table(Tag::CFF).or(face.table(Tag::CFF2)).is_none() {
                return Err(Error::CorruptData("missing CFF table".into()));
            }
            let paths = cff::read(data, index, num_glyphs)?;
            (OutlineFormat::Cff, paths.into_iter().map(cubic_outline).collect())
        }
        FontKind::Collection => return Err(Error::Format("nested font collection")),
    };

    let glyphs = outlines
        .into_iter()
        .zip(advances)
        .enumerate()
        .map(|(i, ((bbox, outline), advance_width))| {
            // The points of simple glyphs are the authority for their bounds.
            let bbox = match &outline {
                Outline::Simple { contours, .. } => BBox::from_points(contours.iter().flatten()),
                _ => bbox,
            };
            GlyphRecord { glyph_id: i as u16, advance_width, bbox, outline }
        })
        .collect();

    let names = match face.table(Tag::NAME) {
        Some(data) => name::read(data)?,
        None => BTreeMap::new(),
    };

    let post = match face.table(Tag::POST) {
        Some(data) => post::read(data)?,
        None => Default::default(),
    };

    let extra_tables = face
        .tags()
        .filter(|tag| !MODELED.contains(tag))
        .filter_map(|tag| Some((tag, face.table(tag)?.to_vec())))
        .collect();

    let model = FontModel {
        format,
        metrics: GlobalMetrics {
            units_per_em: head.units_per_em,
            ascender: hhea.ascender,
            descender: hhea.descender,
            line_gap: hhea.line_gap,
        },
        head: head.info,
        post,
        glyphs,
        cmap: cmap::read(face.expect_table(Tag::CMAP)?, num_glyphs)?,
        names,
        os2: face.table(Tag::OS2).map(<[u8]>::to_vec),
        extra_tables,
    };

    model.validate()?;

    log::debug!(
        "parsed {:?} font with {} glyphs and {} mapped codepoints",
        model.format,
        model.glyphs.len(),
        model.cmap.len()
    );

    Ok(model)
}

fn cubic_outline(path: kurbo::BezPath) -> (Option<BBox>, Outline) {
    if path.elements().is_empty() {
        return (None, Outline::Empty);
    }

    let rect = path.bounding_box();
    let clamp = |v: f64| v.clamp(f64::from(i16::MIN), f64::from(i16::MAX)) as i16;
    let bbox = BBox {
        x_min: clamp(rect.x0.floor()),
        y_min: clamp(rect.y0.floor()),
        x_max: clamp(rect.x1.ceil()),
        y_max: clamp(rect.y1.ceil()),
    };

    (Some(bbox), Outline::Cubic(path))
}

/// Read a font file.
pub fn read(path: impl AsRef<Path>, index: u32) -> Result<FontModel> {
    let path = path.as_ref();
    let data = std::fs::read(path)?;
    log::info!("reading {} (index {index})", path.display());
    parse(&data, index)
}

/// Serialize a font with TrueType outlines.
pub fn serialize(font: &FontModel) -> Result<Vec<u8>> {
    if font.format != OutlineFormat::TrueType {
        return Err(Error::Format("cubic outlines must be converted first"));
    }

    font.validate()?;
    let num_glyphs = font.glyphs.len() as u16;

    let glyf = glyf::write(font)?;
    let metrics: Vec<_> = font
        .glyphs
        .iter()
        .zip(&glyf.bboxes)
        .map(|(glyph, bbox)| (glyph.advance_width, *bbox))
        .collect();
    let (hmtx, number_of_h_metrics, extents) = hmtx::write(&metrics);

    let font_bbox = glyf
        .bboxes
        .iter()
        .flatten()
        .copied()
        .reduce(BBox::union)
        .unwrap_or(BBox { x_min: 0, y_min: 0, x_max: 0, y_max: 0 });

    let mut tables = vec![
        (Tag::HEAD, head::write(&font.head, font.metrics.units_per_em, font_bbox, glyf.long_loca)),
        (Tag::HHEA, hhea::write(&font.metrics, &extents, number_of_h_metrics)),
        (Tag::MAXP, maxp::write(num_glyphs, &MaxpStats::compute(font))),
        (Tag::HMTX, hmtx),
        (Tag::CMAP, cmap::write(&font.cmap)?),
        (Tag::LOCA, glyf.loca),
        (Tag::GLYF, glyf.glyf),
        (Tag::NAME, name::write(&font.names)?),
        (Tag::POST, post::write(&font.post)),
    ];

    if let Some(os2) = &font.os2 {
        tables.push((Tag::OS2, os2.clone()));
    }

    for (&tag, data) in &font.extra_tables {
        if !MODELED.contains(&tag) {
            tables.push((tag, data.clone()));
        }
    }

    face::construct(tables)
}

/// Serialize a font and write it to a file.
///
/// The data goes to a temporary file next to the destination first, which
/// is then renamed into place. If anything fails, no file is left behind.
pub fn write(font: &FontModel, path: impl AsRef<Path>) -> Result<()> {
    let path = path.as_ref();
    let data = serialize(font)?;

    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut file = tempfile::NamedTempFile::new_in(dir)?;
    file.write_all(&data)?;
    file.as_file().sync_all()?;
    file.persist(path).map_err(|err| Error::Io(err.error))?;

    log::info!("wrote {} ({} bytes)", path.display(), data.len());
    Ok(())
}
