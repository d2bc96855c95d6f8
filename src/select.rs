//! Picking, per codepoint, the donor that provides its glyph.

use std::collections::{BTreeMap, BTreeSet};

use rustc_hash::FxHashSet;

use crate::classify::{ClassEntry, WidthClass};
use crate::provider::{GlyphProvider, GlyphRef};
use crate::ranges::CodepointSet;
use crate::report::{Issue, Report};

/// The donor glyph chosen for a codepoint.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub struct Selection {
    pub glyph: GlyphRef,
    /// Either [`WidthClass::Half`] or [`WidthClass::Full`].
    pub class: WidthClass,
}

/// The chosen glyph for every codepoint of the merged font.
#[derive(Debug, Clone, Default, Eq, PartialEq)]
pub struct SelectionTable {
    entries: BTreeMap<u32, Selection>,
}

impl SelectionTable {
    pub fn get(&self, codepoint: u32) -> Option<&Selection> {
        self.entries.get(&codepoint)
    }

    /// All selections in codepoint order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &Selection)> + '_ {
        self.entries.iter().map(|(&c, s)| (c, s))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The donors that provide at least one glyph.
    pub fn donors(&self) -> BTreeSet<usize> {
        self.entries.values().map(|s| s.glyph.donor).collect()
    }
}

/// Which cell a codepoint must occupy.
fn slot(codepoint: u32, half_ranges: &CodepointSet, full_ranges: &CodepointSet) -> Option<WidthClass> {
    if half_ranges.contains(codepoint) {
        Some(WidthClass::Half)
    } else if full_ranges.contains(codepoint) {
        Some(WidthClass::Full)
    } else {
        None
    }
}

fn acceptable(
    entry: &ClassEntry,
    slot: Option<WidthClass>,
    allow_oversize: bool,
    allow_empty: bool,
) -> bool {
    entry.class != WidthClass::Reject
        && (allow_oversize || !entry.oversize)
        && (allow_empty || !entry.empty)
        && slot.map_or(true, |class| class == entry.class)
}

/// Select a glyph for every requested codepoint.
///
/// The providers are asked in order and the first acceptable glyph wins. A
/// glyph is acceptable if it has a valid width class that fits the
/// codepoint's slot, is not oversize (unless allowed) and has contours. Only
/// if no provider has such a glyph, glyphs without contours are accepted, as
/// needed for the space. Codepoints that stay unresolved are reported.
///
/// Providers that occur more than once only count at their first position.
pub fn select(
    providers: &[&dyn GlyphProvider],
    requested: &BTreeSet<u32>,
    half_ranges: &CodepointSet,
    full_ranges: &CodepointSet,
    allow_oversize: bool,
    report: &mut Report,
) -> SelectionTable {
    let mut seen = FxHashSet::default();
    let providers: Vec<&dyn GlyphProvider> =
        providers.iter().copied().filter(|p| seen.insert(p.donor())).collect();

    let mut entries = BTreeMap::new();
    for &codepoint in requested {
        let slot = slot(codepoint, half_ranges, full_ranges);
        let pick = |allow_empty: bool| {
            providers.iter().find_map(|provider| {
                let entry = provider.classification(codepoint)?;
                provider.resolve(codepoint)?;
                acceptable(entry, slot, allow_oversize, allow_empty).then_some(Selection {
                    glyph: GlyphRef { donor: provider.donor(), glyph: entry.glyph },
                    class: entry.class,
                })
            })
        };

        match pick(false).or_else(|| pick(true)) {
            Some(selection) => {
                entries.insert(codepoint, selection);
            }
            None => report.push(Issue::Unresolved { codepoint }),
        }
    }

    SelectionTable { entries }
}
