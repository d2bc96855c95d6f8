/*!
Merges a Latin font and one or more CJK fonts into a single strictly
monospaced TrueType font.

Every glyph of the output has an advance width of exactly one cell (`unit`,
taken from the first font) or two cells (`2 × unit`). Donor fonts are scaled
so that a reference glyph matches the anchor font, shifted vertically so that
their visual center lines up with the anchor's capitals, converted from cubic
to quadratic outlines if necessary, and then picked per codepoint in priority
order.

# Example
```no_run
use monomerge::{merge, read, write, MergeConfig};

# fn main() -> Result<(), Box<dyn std::error::Error>> {
let latin = read("fonts/Latin-Regular.ttf", 0)?;
let cjk = read("fonts/CJK-Regular.ttc", 2)?;

let mut config = MergeConfig::default();
config.metadata.family = Some("Merged Mono".into());

let output = merge(&config, vec![latin, cjk])?;
write(&output.font, "target/MergedMono-Regular.ttf")?;
# Ok(())
# }
```

Issues that do not abort the merge (rejected or oversized glyphs, codepoints
no donor could provide) are collected in the [`Report`] of the
[`MergeOutput`] and logged as a summary through the `log` facade.
*/

#![deny(unsafe_code)]

mod assemble;
mod cff;
mod classify;
mod cmap;
mod config;
mod face;
mod font_data;
mod glyf;
mod head;
mod hhea;
mod hmtx;
mod maxp;
mod model;
mod name;
mod normalize;
mod os2;
mod outline;
mod post;
mod provider;
mod ranges;
mod remapper;
mod report;
mod select;
mod stream;
mod util;

pub use crate::assemble::{assemble, WidthViolation};
pub use crate::classify::{
    classify, classify_width, ClassEntry, Classification, ClassifyOptions, WidthClass,
};
pub use crate::config::{MergeConfig, Metadata};
pub use crate::font_data::{parse, read, serialize, write};
pub use crate::model::{
    BBox, Component, ComponentTransform, Contour, CurvePoint, FontModel, GlobalMetrics,
    GlyphRecord, HeadInfo, Outline, OutlineFormat, PostInfo,
};
pub use crate::normalize::{
    compute_scale, compute_shift, percentile, scale_font, shift_font, Scale, ScaleShift,
};
pub use crate::outline::{convert_font, cubic_to_quadratic, ToleranceFailure};
pub use crate::provider::{Donor, GlyphProvider, GlyphRef};
pub use crate::ranges::CodepointSet;
pub use crate::remapper::GlyphRemapper;
pub use crate::report::{GlyphDiagnostic, Issue, Report};
pub use crate::select::{select, Selection, SelectionTable};
pub use crate::stream::F2Dot14;

use std::collections::BTreeSet;
use std::fmt::{self, Debug, Display, Formatter};

/// Everything a merge produces.
#[derive(Debug, Clone)]
pub struct MergeOutput {
    /// The merged font, ready to be serialized.
    pub font: FontModel,
    /// The half-width cell width of the merged font.
    pub unit: u16,
    /// The classification of every input font after normalization, in input
    /// order.
    pub classifications: Vec<Classification>,
    /// The transform applied to every input font, in input order. The anchor
    /// always has the identity transform.
    pub scale_shifts: Vec<ScaleShift>,
    /// Which font provides which codepoint.
    pub selection: SelectionTable,
    /// Collected non-fatal issues and per-glyph diagnostics.
    pub report: Report,
}

/// Merge fonts into one monospaced font.
///
/// - The first font is the anchor. It defines the units per em, the cell
///   width and the line metrics, and is never scaled.
/// - All fonts, the anchor included, are donors in the given order: for every
///   codepoint, the first font with an acceptable glyph wins.
pub fn merge(config: &MergeConfig, fonts: Vec<FontModel>) -> Result<MergeOutput> {
    let mut fonts = fonts.into_iter();
    let anchor = fonts.next().ok_or(Error::EmptyGlyphSet("input fonts"))?;
    let anchor = convert_font(anchor, config.conversion_tolerance)?;

    let unit = anchor
        .default_advance_width()
        .ok_or_else(|| Error::CorruptData("anchor font has no advance widths".into()))?;
    log::info!(
        "anchor: {} glyphs, {} units per em, cell width {unit}",
        anchor.glyphs.len(),
        anchor.metrics.units_per_em
    );

    let mut report = Report::new();
    let (donors, scale_shifts) = match prepare_donors(config, &anchor, unit, fonts, &mut report) {
        Ok(prepared) => prepared,
        Err(err) => {
            report.log_summary();
            return Err(err);
        }
    };

    let requested = requested_codepoints(config, &donors);
    let providers: Vec<&dyn GlyphProvider> =
        donors.iter().map(|d| d as &dyn GlyphProvider).collect();
    let selection = select(
        &providers,
        &requested,
        &config.half_ranges,
        &config.full_ranges,
        config.allow_oversize,
        &mut report,
    );

    log::info!("selected {} of {} codepoints", selection.len(), requested.len());
    report.record_selection(&selection, &donors);

    let font = match assemble(&anchor, &donors, &selection, unit, config) {
        Ok(font) => font,
        Err(err) => {
            report.log_summary();
            return Err(err);
        }
    };

    report.log_summary();

    Ok(MergeOutput {
        font,
        unit,
        classifications: donors.into_iter().map(Donor::into_classification).collect(),
        scale_shifts,
        selection,
        report,
    })
}

/// Normalize and classify every font, the anchor first. Classification
/// issues are recorded as each font is done, so that a failing font still
/// leaves the issues of the fonts before it in the report.
fn prepare_donors(
    config: &MergeConfig,
    anchor: &FontModel,
    unit: u16,
    fonts: impl Iterator<Item = FontModel>,
    report: &mut Report,
) -> Result<(Vec<Donor>, Vec<ScaleShift>)> {
    let options = config.classify_options(anchor);
    let classification = classify(anchor, unit, &options);
    report.record_classification(0, &classification);

    let mut scale_shifts = vec![ScaleShift::IDENTITY];
    let mut donors = vec![Donor::new(0, anchor.clone(), classification)];

    for (i, font) in fonts.enumerate() {
        let id = i + 1;
        let (params, model) = normalize_donor(config, anchor, font)?;
        let classification = classify(&model, unit, &options);
        report.record_classification(id, &classification);
        donors.push(Donor::new(id, model, classification));

        log::info!("donor {id}: scale {}, shift {}", params.scale, params.shift);
        scale_shifts.push(params);
    }

    Ok((donors, scale_shifts))
}

/// Scale, shift and convert one donor font.
fn normalize_donor(
    config: &MergeConfig,
    anchor: &FontModel,
    donor: FontModel,
) -> Result<(ScaleShift, FontModel)> {
    let scale = compute_scale(anchor, &donor, config.reference)?;
    let scaled = scale_font(&donor, scale)?;
    let shift = compute_shift(anchor, &scaled, &config.big, &config.shift_set)?;
    let shifted = shift_font(&scaled, shift)?;
    let converted = convert_font(shifted, config.conversion_tolerance)?;
    Ok((ScaleShift { scale, shift }, converted))
}

/// The codepoints the merged font should cover.
fn requested_codepoints(config: &MergeConfig, donors: &[Donor]) -> BTreeSet<u32> {
    match &config.requested {
        Some(set) => set.iter().collect(),
        None => donors
            .iter()
            .flat_map(|d| d.model().cmap.keys().copied())
            .collect(),
    }
}

/// A 4-byte OpenType tag.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Tag(pub [u8; 4]);

impl Tag {
    // General tables.
    pub(crate) const CMAP: Self = Self(*b"cmap");
    pub(crate) const HEAD: Self = Self(*b"head");
    pub(crate) const HHEA: Self = Self(*b"hhea");
    pub(crate) const HMTX: Self = Self(*b"hmtx");
    pub(crate) const MAXP: Self = Self(*b"maxp");
    pub(crate) const NAME: Self = Self(*b"name");
    pub(crate) const OS2: Self = Self(*b"OS/2");
    pub(crate) const POST: Self = Self(*b"post");

    // TrueType.
    pub(crate) const GLYF: Self = Self(*b"glyf");
    pub(crate) const LOCA: Self = Self(*b"loca");
    pub(crate) const GASP: Self = Self(*b"gasp");

    // CFF.
    pub(crate) const CFF: Self = Self(*b"CFF ");
    pub(crate) const CFF2: Self = Self(*b"CFF2");
    pub(crate) const VORG: Self = Self(*b"VORG");
}

impl Debug for Tag {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "Tag({self})")
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        f.pad(std::str::from_utf8(&self.0).unwrap_or("..."))
    }
}

/// The result type for everything.
pub type Result<T> = std::result::Result<T, Error>;

/// Merging failed.
#[derive(Debug)]
pub enum Error {
    /// The data is not a font this crate can read or write.
    Format(&'static str),
    /// The font's tables are missing or internally inconsistent.
    CorruptData(String),
    /// Some cubic outlines could not be approximated with quadratic ones.
    ConversionToleranceExceeded(Vec<ToleranceFailure>),
    /// A statistic had no glyphs to work with. Names the glyph set.
    EmptyGlyphSet(&'static str),
    /// Some mapped glyphs do not have a canonical advance width.
    InvariantViolation(Vec<WidthViolation>),
    /// A value does not fit into its binary field.
    Overflow,
    /// Reading or writing a file failed.
    Io(std::io::Error),
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match self {
            Self::Format(what) => write!(f, "unsupported font format: {what}"),
            Self::CorruptData(what) => write!(f, "corrupt font data: {what}"),
            Self::ConversionToleranceExceeded(failures) => {
                write!(f, "{} glyphs exceed the conversion tolerance", failures.len())?;
                for failure in failures.iter().take(8) {
                    write!(f, "\n  {failure}")?;
                }
                Ok(())
            }
            Self::EmptyGlyphSet(set) => write!(f, "no glyphs in {set}"),
            Self::InvariantViolation(violations) => {
                write!(f, "{} glyphs have a non-canonical width", violations.len())?;
                for violation in violations.iter().take(8) {
                    write!(f, "\n  {violation}")?;
                }
                Ok(())
            }
            Self::Overflow => f.pad("value overflows its field"),
            Self::Io(err) => write!(f, "i/o error: {err}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err)
    }
}
