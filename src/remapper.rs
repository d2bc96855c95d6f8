use rustc_hash::FxHashMap;

use crate::provider::GlyphRef;
use crate::{Error, Result};

/// Assigns contiguous glyph ids of the merged font to donor glyphs.
///
/// A font needs glyph ids that start at 0 and have no gaps, but the glyphs
/// of the merged font come from several donors with overlapping id spaces.
/// For example, remapping `(0, 0)`, `(1, 7)`, `(0, 3)` and then `(1, 7)`
/// again yields:
/// (0, 0) -> 0 (.notdef always comes first)
/// (1, 7) -> 1
/// (0, 3) -> 2
#[derive(Debug, Clone)]
pub struct GlyphRemapper {
    /// Maps donor glyphs to their new id.
    forward: FxHashMap<GlyphRef, u16>,
    /// The donor glyph of every new id.
    backward: Vec<GlyphRef>,
}

impl GlyphRemapper {
    /// Create a new remapper whose glyph 0 is the given `.notdef` glyph.
    pub fn new(notdef: GlyphRef) -> Self {
        let mut forward = FxHashMap::default();
        forward.insert(notdef, 0);
        Self { forward, backward: vec![notdef] }
    }

    /// Remap a donor glyph, or return its existing new id.
    ///
    /// Fails if the merged font would have more than 65535 glyphs.
    pub fn remap(&mut self, old: GlyphRef) -> Result<u16> {
        if let Some(&id) = self.forward.get(&old) {
            return Ok(id);
        }

        let id = u16::try_from(self.backward.len()).map_err(|_| Error::Overflow)?;
        if id == u16::MAX {
            return Err(Error::Overflow);
        }

        self.forward.insert(old, id);
        self.backward.push(old);
        Ok(id)
    }

    /// The new id of a donor glyph, if it has been remapped before.
    pub fn get(&self, old: GlyphRef) -> Option<u16> {
        self.forward.get(&old).copied()
    }

    /// The donor glyph that was assigned a new id.
    pub fn old(&self, new: u16) -> Option<GlyphRef> {
        self.backward.get(usize::from(new)).copied()
    }

    /// The number of glyphs of the merged font.
    pub fn len(&self) -> u16 {
        // Never exceeds `u16::MAX` because `remap` checks it.
        self.backward.len() as u16
    }

    /// The donor glyphs in the order of their new ids.
    pub fn remapped_glyphs(&self) -> impl Iterator<Item = GlyphRef> + '_ {
        self.backward.iter().copied()
    }
}
