//! Building the merged font from the selected donor glyphs.

use std::collections::BTreeMap;
use std::fmt::{self, Display, Formatter};

use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::{MergeConfig, Metadata};
use crate::model::{BBox, FontModel, GlobalMetrics, GlyphRecord, Outline, OutlineFormat};
use crate::normalize::refresh_composite_bboxes;
use crate::provider::{Donor, GlyphRef};
use crate::remapper::GlyphRemapper;
use crate::select::SelectionTable;
use crate::util::{round_half_even, to_i16};
use crate::{head, name, os2, Error, Result, Tag};

/// Share of the extra line height that goes above the glyphs.
const ASCENT_SHARE: f64 = 0.6;

/// One range up to 0xFFFF ppem with gridfitting and symmetric smoothing.
const GASP: [u8; 8] = [0, 1, 0, 1, 0xFF, 0xFF, 0, 0x0F];

/// A mapped glyph whose advance is too far from its cell width.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct WidthViolation {
    pub codepoint: u32,
    pub glyph: GlyphRef,
    pub advance_width: u16,
    /// The canonical width of the glyph's class.
    pub expected: u16,
}

impl Display for WidthViolation {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(
            f,
            "U+{:04X} (font {}, glyph {}) has advance {}, expected {}",
            self.codepoint, self.glyph.donor, self.glyph.glyph, self.advance_width, self.expected,
        )
    }
}

/// Assemble the merged font.
///
/// Glyph 0 is the anchor's `.notdef`. Then follow the selected glyphs in
/// codepoint order and after them the components they need. Mapped glyphs
/// are snapped to the exact width of their cell, but only if they are
/// within `canonical_tolerance` of it. Everything else is a fatal
/// [`Error::InvariantViolation`].
pub fn assemble(
    anchor: &FontModel,
    donors: &[Donor],
    selection: &SelectionTable,
    unit: u16,
    config: &MergeConfig,
) -> Result<FontModel> {
    let sources = Sources { anchor, donors };

    let mut remapper = GlyphRemapper::new(Sources::NOTDEF);
    for (_, chosen) in selection.iter() {
        remapper.remap(chosen.glyph)?;
    }

    // Pull in components. The remapper grows while we walk it.
    let mut new = 0;
    while new < remapper.len() {
        let old = remapper.old(new).ok_or(Error::Overflow)?;
        let components: Vec<u16> = sources.glyph(old)?.component_ids().collect();
        for glyph in components {
            remapper.remap(GlyphRef { donor: old.donor, glyph })?;
        }
        new += 1;
    }

    let mut glyphs = Vec::with_capacity(usize::from(remapper.len()));
    for (id, old) in remapper.remapped_glyphs().enumerate() {
        let mut record = sources.glyph(old)?.clone();
        record.glyph_id = id as u16;
        match &mut record.outline {
            Outline::Simple { instructions, .. } => instructions.clear(),
            Outline::Composite { components, instructions } => {
                instructions.clear();
                for component in components {
                    let old = GlyphRef { donor: old.donor, glyph: component.glyph };
                    component.glyph = remapper.get(old).ok_or_else(|| {
                        Error::CorruptData(format!("component {old:?} was not remapped"))
                    })?;
                }
            }
            Outline::Empty => {}
            Outline::Cubic(_) => {
                return Err(Error::Format("cubic outlines must be converted first"))
            }
        }
        glyphs.push(record);
    }

    let mut cmap = BTreeMap::new();
    let mut violations = vec![];
    let mut snapped = FxHashSet::default();
    let mut moved = FxHashMap::default();

    for (codepoint, chosen) in selection.iter() {
        let id = remapper.get(chosen.glyph).ok_or(Error::Overflow)?;
        cmap.insert(codepoint, id);

        if !snapped.insert(id) {
            continue;
        }

        let expected = chosen.class.canonical_width(unit).ok_or(Error::Overflow)?;
        let bbox = sources.model(chosen.glyph.donor)?.resolve_bbox(chosen.glyph.glyph);
        let record = &mut glyphs[usize::from(id)];
        let advance_width = record.advance_width;

        if advance_width.abs_diff(expected) > config.canonical_tolerance {
            violations.push(WidthViolation {
                codepoint,
                glyph: chosen.glyph,
                advance_width,
                expected,
            });
            continue;
        }

        if advance_width != expected {
            log::trace!("snapping U+{codepoint:04X} from {advance_width} to {expected}");
            let dx = recenter(record, bbox, expected)?;
            if dx != 0 {
                moved.insert(id, dx);
            }
        }
    }

    if !violations.is_empty() {
        return Err(Error::InvariantViolation(violations));
    }

    // Composites built from recentered glyphs stay where they were.
    for record in &mut glyphs {
        let Outline::Composite { components, .. } = &mut record.outline else { continue };
        for component in components {
            let Some(&dx) = moved.get(&component.glyph) else { continue };
            let (x, y) = component.transform.apply(f64::from(dx), 0.0);
            component.dx = to_i16(f64::from(component.dx) - x.round())?;
            component.dy = to_i16(f64::from(component.dy) - y.round())?;
        }
    }

    let mut font = FontModel::new(line_metrics(anchor, config)?);
    font.format = OutlineFormat::TrueType;
    font.glyphs = glyphs;
    font.cmap = cmap;
    font.head = anchor.head;
    font.post = anchor.post;
    font.post.is_fixed_pitch = true;
    font.names = anchor.names.clone();
    font.extra_tables.insert(Tag::GASP, GASP.to_vec());

    apply_metadata(&mut font, &config.metadata);
    font.os2 = Some(build_os2(&sources, selection, &font, unit, &config.metadata)?);

    refresh_composite_bboxes(&mut font);
    font.validate()?;

    log::info!(
        "assembled {} glyphs for {} codepoints, ascender {}, descender {}",
        font.glyphs.len(),
        font.cmap.len(),
        font.metrics.ascender,
        font.metrics.descender,
    );

    Ok(font)
}

/// Where the glyphs of the merged font come from.
struct Sources<'a> {
    anchor: &'a FontModel,
    donors: &'a [Donor],
}

impl<'a> Sources<'a> {
    /// The anchor's `.notdef`. The anchor is always donor 0.
    const NOTDEF: GlyphRef = GlyphRef { donor: 0, glyph: 0 };

    fn model(&self, donor: usize) -> Result<&'a FontModel> {
        if donor == Self::NOTDEF.donor {
            return Ok(self.anchor);
        }

        self.donors
            .iter()
            .find(|d| d.id() == donor)
            .map(Donor::model)
            .ok_or_else(|| Error::CorruptData(format!("unknown font {donor}")))
    }

    fn glyph(&self, glyph: GlyphRef) -> Result<&'a GlyphRecord> {
        self.model(glyph.donor)?
            .glyphs
            .get(usize::from(glyph.glyph))
            .ok_or_else(|| Error::CorruptData(format!("missing glyph {glyph:?}")))
    }
}

/// Give a glyph a new advance and move its outline so that the ratio
/// between left and right margin stays the same. Returns how far the outline
/// moved.
fn recenter(record: &mut GlyphRecord, bbox: Option<BBox>, advance: u16) -> Result<i16> {
    let old_advance = record.advance_width;
    record.advance_width = advance;

    let Some(bbox) = bbox else { return Ok(0) };
    let ink = i32::from(bbox.x_max) - i32::from(bbox.x_min);
    let old_margin = i32::from(old_advance) - ink;
    let new_margin = i32::from(advance) - ink;
    let left = i32::from(bbox.x_min);

    let new_left = if old_margin == 0 {
        f64::from(new_margin) / 2.0
    } else {
        f64::from(left) * f64::from(new_margin) / f64::from(old_margin)
    };

    let dx = to_i16(new_left.round() - f64::from(left))?;
    if dx == 0 {
        return Ok(0);
    }

    let moved = |v: i16| v.checked_add(dx).ok_or(Error::Overflow);
    match &mut record.outline {
        Outline::Simple { contours, .. } => {
            for point in contours.iter_mut().flatten() {
                point.x = moved(point.x)?;
            }
        }
        Outline::Composite { components, .. } => {
            for component in components {
                component.dx = moved(component.dx)?;
            }
        }
        Outline::Empty | Outline::Cubic(_) => {}
    }

    if let Some(bbox) = &mut record.bbox {
        bbox.x_min = moved(bbox.x_min)?;
        bbox.x_max = moved(bbox.x_max)?;
    }

    Ok(dx)
}

/// Derive ascender and descender from the anchor's metric glyphs.
fn line_metrics(anchor: &FontModel, config: &MergeConfig) -> Result<GlobalMetrics> {
    let (y_min, y_max) = config
        .metric_set
        .iter()
        .filter_map(|c| anchor.cmap.get(&c))
        .filter_map(|&g| anchor.resolve_bbox(g))
        .fold(None, |acc: Option<(i16, i16)>, bbox| {
            Some(acc.map_or((bbox.y_min, bbox.y_max), |(lo, hi)| {
                (lo.min(bbox.y_min), hi.max(bbox.y_max))
            }))
        })
        .ok_or(Error::EmptyGlyphSet("metric set"))?;

    let extent = f64::from(y_max) - f64::from(y_min);
    let extension = extent * config.height_multiplier - extent;

    Ok(GlobalMetrics {
        units_per_em: anchor.metrics.units_per_em,
        ascender: to_i16(round_half_even(f64::from(y_max) + ASCENT_SHARE * extension))?,
        descender: to_i16(round_half_even(f64::from(y_min) - (1.0 - ASCENT_SHARE) * extension))?,
        line_gap: 0,
    })
}

/// The anchor's `OS/2` table with the merged font's values.
fn build_os2(
    sources: &Sources,
    selection: &SelectionTable,
    font: &FontModel,
    unit: u16,
    metadata: &Metadata,
) -> Result<Vec<u8>> {
    let mut values = os2::Os2Values {
        avg_char_width: i16::try_from(unit).map_err(|_| Error::Overflow)?,
        ascender: font.metrics.ascender,
        descender: font.metrics.descender,
        line_gap: font.metrics.line_gap,
        first_char_index: font.cmap.keys().next().map_or(0, |&c| c.min(0xFFFF) as u16),
        last_char_index: font.cmap.keys().next_back().map_or(0, |&c| c.min(0xFFFF) as u16),
        vendor_id: metadata.vendor_id,
        ..os2::Os2Values::default()
    };

    let mut contributors = selection.donors();
    contributors.insert(Sources::NOTDEF.donor);
    for donor in contributors {
        let Some(table) = &sources.model(donor)?.os2 else { continue };
        for (bits, more) in values.unicode_ranges.iter_mut().zip(os2::unicode_ranges(table)?) {
            *bits |= more;
        }
        for (bits, more) in values.code_page_ranges.iter_mut().zip(os2::code_page_ranges(table)?)
        {
            *bits |= more;
        }
    }

    let base = sources.anchor.os2.clone().unwrap_or_else(os2::blank);
    os2::patch(base, &values)
}

/// Apply the naming and header overrides.
fn apply_metadata(font: &mut FontModel, metadata: &Metadata) {
    if let Some(family) = &metadata.family {
        let postscript: String = family.chars().filter(char::is_ascii_alphanumeric).collect();
        let postscript = if postscript.is_empty() { "MonoMerged".to_string() } else { postscript };
        let unique = match &metadata.version {
            Some(version) => format!("{family}; {version}"),
            None => family.clone(),
        };

        // These would contradict the new family.
        for id in [
            name::TYPOGRAPHIC_FAMILY,
            name::TYPOGRAPHIC_SUBFAMILY,
            name::WWS_FAMILY,
            name::WWS_SUBFAMILY,
        ] {
            font.names.remove(&id);
        }

        font.names.insert(name::FAMILY, family.clone());
        font.names.insert(name::SUBFAMILY, "Regular".into());
        font.names.insert(name::UNIQUE_ID, unique);
        font.names.insert(name::FULL_NAME, format!("{family} Regular"));
        font.names.insert(name::POSTSCRIPT_NAME, format!("{postscript}-Regular"));
    }

    if let Some(version) = &metadata.version {
        font.names.insert(name::VERSION, format!("Version {version}"));
        match head::revision_from_version(version) {
            Some(revision) => font.head.font_revision = revision,
            None => log::warn!("version {version:?} is not numeric, keeping the font revision"),
        }
    }

    if let Some(timestamp) = metadata.timestamp {
        font.head.created = head::timestamp_from_unix(timestamp);
        font.head.modified = font.head.created;
    }

    if let Some(copyright) = &metadata.copyright {
        font.names.insert(name::COPYRIGHT, copyright.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify, ClassifyOptions};
    use std::collections::BTreeSet;

    use crate::model::{Component, ComponentTransform, CurvePoint};
    use crate::provider::GlyphProvider;
    use crate::ranges::CodepointSet;
    use crate::report::Report;
    use crate::select::select;

    fn metrics() -> GlobalMetrics {
        GlobalMetrics { units_per_em: 1000, ascender: 800, descender: -200, line_gap: 0 }
    }

    fn bar(advance: u16, left: i16, right: i16, bottom: i16, top: i16) -> GlyphRecord {
        GlyphRecord::simple(
            0,
            advance,
            vec![vec![
                CurvePoint::on(left, bottom),
                CurvePoint::on(left, top),
                CurvePoint::on(right, top),
                CurvePoint::on(right, bottom),
            ]],
        )
    }

    fn anchor() -> FontModel {
        let mut font = FontModel::new(metrics());
        font.names.insert(name::FAMILY, "Latin".into());
        font.names.insert(name::TYPOGRAPHIC_FAMILY, "Latin Group".into());
        font.push_glyph(bar(500, 50, 450, 0, 700));
        let space = font.push_glyph(GlyphRecord::empty(0, 500));
        let h = font.push_glyph(bar(500, 50, 450, -100, 700));
        let acute = font.push_glyph(bar(0, 200, 300, 750, 850));
        let e = font.push_glyph(bar(500, 100, 400, 0, 500));
        let e_acute = font.push_glyph(GlyphRecord {
            glyph_id: 0,
            advance_width: 500,
            bbox: None,
            outline: Outline::Composite {
                components: vec![
                    Component {
                        glyph: e,
                        dx: 0,
                        dy: 0,
                        transform: ComponentTransform::Identity,
                        flags: 0,
                    },
                    Component {
                        glyph: acute,
                        dx: 0,
                        dy: -100,
                        transform: ComponentTransform::Identity,
                        flags: 0,
                    },
                ],
                instructions: vec![1, 2, 3],
            },
        });
        font.map(0x20, space);
        font.map(0x48, h);
        font.map(0xE9, e_acute);
        font
    }

    fn cjk() -> FontModel {
        let mut font = FontModel::new(metrics());
        font.push_glyph(GlyphRecord::empty(0, 1000));
        let one = font.push_glyph(bar(1000, 100, 900, -50, 800));
        let two = font.push_glyph(bar(1001, 100, 901, -50, 800));
        let h = font.push_glyph(bar(1000, 100, 900, 0, 800));
        font.map(0x4E00, one);
        font.map(0x4E8C, two);
        font.map(0x48, h);
        font
    }

    fn run(config: &MergeConfig, fonts: Vec<FontModel>) -> Result<FontModel> {
        let options =
            ClassifyOptions { width_tolerance: 0.1, oversize_factor: 1.2, cell_height: 1000 };
        let donors: Vec<Donor> = fonts
            .into_iter()
            .enumerate()
            .map(|(id, font)| {
                let classes = classify(&font, 500, &options);
                Donor::new(id, font, classes)
            })
            .collect();

        let providers: Vec<&dyn GlyphProvider> =
            donors.iter().map(|d| d as &dyn GlyphProvider).collect();
        let requested: BTreeSet<u32> =
            donors.iter().flat_map(|d| d.model().cmap.keys().copied()).collect();
        let selection = select(
            &providers,
            &requested,
            &config.half_ranges,
            &config.full_ranges,
            true,
            &mut Report::new(),
        );

        assemble(donors[0].model(), &donors, &selection, 500, config)
    }

    #[test]
    fn merges_and_remaps() {
        let config = MergeConfig::default();
        let font = run(&config, vec![anchor(), cjk()]).unwrap();

        // .notdef, space, H, é, 一, 二, then the components of é.
        assert_eq!(font.glyphs.len(), 8);
        assert_eq!(font.glyphs[0].advance_width, 500);
        assert_eq!(font.cmap[&0x20], 1);
        assert_eq!(font.cmap[&0x48], 2);
        assert_eq!(font.cmap[&0xE9], 3);
        assert_eq!(font.cmap[&0x4E00], 4);
        assert_eq!(font.cmap[&0x4E8C], 5);

        let Outline::Composite { components, instructions } = &font.glyphs[3].outline else {
            panic!("expected composite");
        };
        assert!(instructions.is_empty());
        assert_eq!(components.iter().map(|c| c.glyph).collect::<Vec<_>>(), vec![6, 7]);
        assert_eq!(font.glyphs[3].bbox, Some(BBox { x_min: 100, y_min: 0, x_max: 400, y_max: 750 }));

        // Component-only glyphs keep their advance.
        assert_eq!(font.glyphs[7].advance_width, 0);

        // 1001 is snapped to 1000, the half unit shift rounds away.
        assert_eq!(font.glyphs[5].advance_width, 1000);
        assert_eq!(font.glyphs[5].bbox.unwrap().x_min, 100);

        assert_eq!(font.extra_tables.get(&Tag::GASP), Some(&GASP.to_vec()));
        assert!(font.post.is_fixed_pitch);
        assert!(font.os2.is_some());
        assert_eq!(font.names.get(&name::FAMILY).map(String::as_str), Some("Latin"));
    }

    #[test]
    fn line_metrics_split_extra_height() {
        let config = MergeConfig::default();
        let font = run(&config, vec![anchor()]).unwrap();

        // Extent 800 → height 1040, 144 above and 96 below.
        assert_eq!(font.metrics.ascender, 844);
        assert_eq!(font.metrics.descender, -196);
        assert_eq!(font.metrics.line_gap, 0);
        assert_eq!(font.metrics.units_per_em, 1000);

        let config = MergeConfig { metric_set: CodepointSet::from_ranges([0x20..=0x20]), ..config };
        assert!(matches!(run(&config, vec![anchor()]), Err(Error::EmptyGlyphSet(_))));
    }

    #[test]
    fn off_by_more_than_tolerance_is_fatal() {
        let mut wide = cjk();
        wide.glyphs[1].advance_width = 1040;

        match run(&MergeConfig::default(), vec![anchor(), wide]) {
            Err(Error::InvariantViolation(violations)) => {
                assert_eq!(
                    violations,
                    vec![WidthViolation {
                        codepoint: 0x4E00,
                        glyph: GlyphRef { donor: 1, glyph: 1 },
                        advance_width: 1040,
                        expected: 1000,
                    }]
                );
            }
            other => panic!("unexpected result {other:?}"),
        }
    }

    #[test]
    fn recenter_keeps_margin_ratio() {
        let mut glyph = bar(600, 100, 400, 0, 100);
        let bbox = glyph.bbox;
        assert_eq!(recenter(&mut glyph, bbox, 500).unwrap(), -33);
        assert_eq!(glyph.advance_width, 500);
        // Margins 100:200 become 67:133.
        assert_eq!(glyph.bbox.unwrap().x_min, 67);
    }

    #[test]
    fn recentered_component_keeps_composite_in_place() {
        let mut font = anchor();
        // `e` is one unit too wide and mapped itself, so it is recentered.
        font.glyphs[4] = bar(501, 300, 400, 0, 500);
        font.map(0x65, 4);

        let merged = run(&MergeConfig::default(), vec![font]).unwrap();
        let e = merged.cmap[&0x65];
        assert_eq!(merged.glyphs[usize::from(e)].advance_width, 500);
        assert_eq!(merged.glyphs[usize::from(e)].bbox.unwrap().x_min, 299);

        let e_acute = &merged.glyphs[usize::from(merged.cmap[&0xE9])];
        let Outline::Composite { components, .. } = &e_acute.outline else {
            panic!("expected composite");
        };
        assert_eq!(components[0].glyph, e);
        assert_eq!(components[0].dx, 1);
        assert_eq!(components[1].dx, 0);
        assert_eq!(e_acute.bbox, Some(BBox { x_min: 200, y_min: 0, x_max: 400, y_max: 750 }));
    }

    #[test]
    fn metadata_overrides() {
        let config = MergeConfig {
            metadata: Metadata {
                family: Some("Merged Mono".into()),
                version: Some("1.5".into()),
                timestamp: Some(0),
                copyright: Some("(c) nobody".into()),
                vendor_id: Some(*b"MRGD"),
            },
            ..MergeConfig::default()
        };

        let font = run(&config, vec![anchor()]).unwrap();
        let get = |id| font.names.get(&id).map(String::as_str);
        assert_eq!(get(name::FAMILY), Some("Merged Mono"));
        assert_eq!(get(name::SUBFAMILY), Some("Regular"));
        assert_eq!(get(name::FULL_NAME), Some("Merged Mono Regular"));
        assert_eq!(get(name::POSTSCRIPT_NAME), Some("MergedMono-Regular"));
        assert_eq!(get(name::UNIQUE_ID), Some("Merged Mono; 1.5"));
        assert_eq!(get(name::VERSION), Some("Version 1.5"));
        assert_eq!(get(name::COPYRIGHT), Some("(c) nobody"));
        assert_eq!(get(name::TYPOGRAPHIC_FAMILY), None);
        assert_eq!(font.head.font_revision, 0x0001_8000);
        assert_eq!(font.head.created, 2_082_844_800);
        assert_eq!(font.head.modified, 2_082_844_800);
    }
}
