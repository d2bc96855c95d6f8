use crate::classify::ClassifyOptions;
use crate::model::FontModel;
use crate::ranges::CodepointSet;

/// Everything that steers a merge. Built by the caller and passed to
/// [`merge`](crate::merge) per invocation.
#[derive(Debug, Clone)]
pub struct MergeConfig {
    /// The codepoint whose advance width defines the donor scale.
    /// Defaults to `O` (79).
    pub reference: u32,
    /// Anchor glyphs whose highest point defines the vertical target center.
    /// Defaults to `A-Z` and `0-9`.
    pub big: CodepointSet,
    /// Donor glyphs whose extremes define the vertical source center.
    /// Defaults to the CJK blocks.
    pub shift_set: CodepointSet,
    /// Anchor glyphs from which the line metrics are derived.
    /// Defaults to printable ASCII.
    pub metric_set: CodepointSet,
    /// Codepoints that must be half-width. Defaults to printable ASCII.
    pub half_ranges: CodepointSet,
    /// Codepoints that must be full-width. Defaults to the CJK blocks.
    pub full_ranges: CodepointSet,
    /// The codepoints the merged font should cover. `None` requests every
    /// codepoint mapped by any input font.
    pub requested: Option<CodepointSet>,
    /// The line height relative to the extent of the metric glyphs.
    pub height_multiplier: f64,
    /// Maximum distance of an advance width from a cell width, relative to
    /// the cell width, for it to still count as that cell width.
    pub width_tolerance: f64,
    /// How much larger than its cell a glyph may be before it counts as
    /// oversize.
    pub oversize_factor: f64,
    /// Whether oversize glyphs may be selected.
    pub allow_oversize: bool,
    /// Maximum distance in font units of a final advance width from its
    /// canonical width. Glyphs within it are snapped.
    pub canonical_tolerance: u16,
    /// Maximum deviation in font units when converting cubic outlines.
    pub conversion_tolerance: f64,
    /// Name table and header overrides.
    pub metadata: Metadata,
}

impl Default for MergeConfig {
    fn default() -> Self {
        Self {
            reference: 'O' as u32,
            big: CodepointSet::capitals_and_digits(),
            shift_set: CodepointSet::cjk(),
            metric_set: CodepointSet::ascii(),
            half_ranges: CodepointSet::ascii(),
            full_ranges: CodepointSet::cjk(),
            requested: None,
            height_multiplier: 1.3,
            width_tolerance: 0.1,
            oversize_factor: 1.2,
            allow_oversize: false,
            canonical_tolerance: 1,
            conversion_tolerance: 1.0,
            metadata: Metadata::default(),
        }
    }
}

impl MergeConfig {
    /// Classification options relative to the anchor font's cell.
    pub fn classify_options(&self, anchor: &FontModel) -> ClassifyOptions {
        ClassifyOptions {
            width_tolerance: self.width_tolerance,
            oversize_factor: self.oversize_factor,
            cell_height: i32::from(anchor.metrics.ascender)
                - i32::from(anchor.metrics.descender),
        }
    }
}

/// Overrides for the merged font's naming and header fields.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct Metadata {
    /// The family name. Also derives the full name, unique id and
    /// PostScript name, and sets the subfamily to `Regular`.
    pub family: Option<String>,
    /// A version string like `1.2.0`. Also sets the font revision if it
    /// starts with a number.
    pub version: Option<String>,
    /// The build time in seconds since the Unix epoch.
    pub timestamp: Option<i64>,
    pub copyright: Option<String>,
    /// The four-character vendor id in `OS/2`.
    pub vendor_id: Option<[u8; 4]>,
}
