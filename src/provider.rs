use crate::classify::{ClassEntry, Classification};
use crate::model::{FontModel, GlyphRecord};

/// A glyph of a specific donor font.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct GlyphRef {
    /// The donor's position in the input fonts.
    pub donor: usize,
    /// The glyph id within the donor.
    pub glyph: u16,
}

/// Something that can provide glyphs for codepoints.
///
/// The selector walks an ordered list of providers and asks each in turn,
/// so precedence between fonts is just the order of the list.
pub trait GlyphProvider {
    /// The identity of the donor, unique among the providers of a merge.
    fn donor(&self) -> usize;

    /// The glyph the donor maps a codepoint to.
    fn resolve(&self, codepoint: u32) -> Option<&GlyphRecord>;

    /// How the donor's glyph for a codepoint was classified.
    fn classification(&self, codepoint: u32) -> Option<&ClassEntry>;
}

/// A normalized input font together with its classification.
#[derive(Debug, Clone)]
pub struct Donor {
    id: usize,
    model: FontModel,
    classification: Classification,
}

impl Donor {
    pub fn new(id: usize, model: FontModel, classification: Classification) -> Self {
        Self { id, model, classification }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn model(&self) -> &FontModel {
        &self.model
    }

    /// The classification of all codepoints of the donor.
    pub fn classes(&self) -> &Classification {
        &self.classification
    }

    pub fn into_classification(self) -> Classification {
        self.classification
    }
}

impl GlyphProvider for Donor {
    fn donor(&self) -> usize {
        self.id
    }

    fn resolve(&self, codepoint: u32) -> Option<&GlyphRecord> {
        self.model.glyph_for(codepoint)
    }

    fn classification(&self, codepoint: u32) -> Option<&ClassEntry> {
        self.classification.get(codepoint)
    }
}
