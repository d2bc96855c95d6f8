//! Non-fatal findings of a merge.

use std::fmt::{self, Display, Formatter};

use crate::classify::{Classification, WidthClass};
use crate::model::BBox;
use crate::provider::Donor;
use crate::select::SelectionTable;

/// Something that did not abort the merge but may need attention.
#[derive(Debug, Copy, Clone, Eq, PartialEq, Hash)]
pub enum Issue {
    /// A donor glyph fits neither cell width.
    Rejected { codepoint: u32, donor: usize, advance_width: u16 },
    /// A donor glyph's bounding box exceeds its cell.
    Oversize { codepoint: u32, donor: usize, glyph: u16 },
    /// No donor could provide an acceptable glyph for a codepoint.
    Unresolved { codepoint: u32 },
}

impl Issue {
    /// The codepoint the issue is about.
    pub fn codepoint(&self) -> u32 {
        match *self {
            Self::Rejected { codepoint, .. }
            | Self::Oversize { codepoint, .. }
            | Self::Unresolved { codepoint } => codepoint,
        }
    }
}

impl Display for Issue {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        match *self {
            Self::Rejected { codepoint, donor, advance_width } => write!(
                f,
                "U+{codepoint:04X} of font {donor} has a non-cell advance width of {advance_width}"
            ),
            Self::Oversize { codepoint, donor, glyph } => {
                write!(f, "U+{codepoint:04X} of font {donor} (glyph {glyph}) exceeds its cell")
            }
            Self::Unresolved { codepoint } => {
                write!(f, "U+{codepoint:04X} is not provided by any font")
            }
        }
    }
}

/// Everything known about a selected glyph, one row of a diagnostic dump.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct GlyphDiagnostic {
    pub codepoint: u32,
    pub donor: usize,
    /// The glyph id within the donor.
    pub glyph: u16,
    /// The advance width after normalization, before snapping.
    pub advance_width: u16,
    pub bbox: Option<BBox>,
    pub empty: bool,
    pub oversize: bool,
    pub class: WidthClass,
}

/// Collected issues and diagnostics of one merge.
#[derive(Debug, Clone, Default)]
pub struct Report {
    issues: Vec<Issue>,
    diagnostics: Vec<GlyphDiagnostic>,
}

impl Report {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an issue.
    pub fn push(&mut self, issue: Issue) {
        log::trace!("{issue}");
        self.issues.push(issue);
    }

    /// All issues in the order they were found.
    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// The codepoints no donor could provide.
    pub fn unresolved(&self) -> impl Iterator<Item = u32> + '_ {
        self.issues.iter().filter_map(|issue| match *issue {
            Issue::Unresolved { codepoint } => Some(codepoint),
            _ => None,
        })
    }

    /// One record per selected codepoint, in codepoint order.
    pub fn diagnostics(&self) -> &[GlyphDiagnostic] {
        &self.diagnostics
    }

    /// Record the rejected and oversize glyphs of a donor.
    pub fn record_classification(&mut self, donor: usize, classification: &Classification) {
        for (codepoint, entry) in classification.iter() {
            if entry.class == WidthClass::Reject {
                self.push(Issue::Rejected {
                    codepoint,
                    donor,
                    advance_width: entry.advance_width,
                });
            } else if entry.oversize {
                self.push(Issue::Oversize { codepoint, donor, glyph: entry.glyph });
            }
        }
    }

    /// Record a diagnostic for every selected codepoint.
    pub fn record_selection(&mut self, selection: &SelectionTable, donors: &[Donor]) {
        for (codepoint, chosen) in selection.iter() {
            let Some(entry) = donors
                .iter()
                .find(|d| d.id() == chosen.glyph.donor)
                .and_then(|d| d.classes().get(codepoint))
            else {
                continue;
            };

            self.diagnostics.push(GlyphDiagnostic {
                codepoint,
                donor: chosen.glyph.donor,
                glyph: chosen.glyph.glyph,
                advance_width: entry.advance_width,
                bbox: entry.bbox,
                empty: entry.empty,
                oversize: entry.oversize,
                class: chosen.class,
            });
        }
    }

    /// Log how many issues of each kind were found.
    pub fn log_summary(&self) {
        let mut rejected = 0;
        let mut oversize = 0;
        let mut unresolved = 0;
        for issue in &self.issues {
            match issue {
                Issue::Rejected { .. } => rejected += 1,
                Issue::Oversize { .. } => oversize += 1,
                Issue::Unresolved { .. } => unresolved += 1,
            }
        }

        if rejected > 0 || oversize > 0 {
            log::warn!("{rejected} glyphs fit no cell width, {oversize} glyphs exceed their cell");
        }

        if unresolved > 0 {
            let sample: Vec<String> =
                self.unresolved().take(8).map(|c| format!("U+{c:04X}")).collect();
            log::warn!(
                "{unresolved} codepoints are not provided by any font: {}{}",
                sample.join(", "),
                if unresolved > sample.len() { ", ..." } else { "" }
            );
        }

        log::debug!("{} glyph diagnostics recorded", self.diagnostics.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::{classify, ClassifyOptions};
    use crate::model::{CurvePoint, FontModel, GlobalMetrics, GlyphRecord};
    use crate::provider::GlyphRef;
    use crate::ranges::CodepointSet;
    use crate::select::select;

    #[test]
    fn records_issues_and_diagnostics() {
        let mut font = FontModel::new(GlobalMetrics {
            units_per_em: 1000,
            ascender: 800,
            descender: -200,
            line_gap: 0,
        });
        font.push_glyph(GlyphRecord::empty(0, 500));
        let a = font.push_glyph(GlyphRecord::simple(
            0,
            500,
            vec![vec![CurvePoint::on(0, 0), CurvePoint::on(250, 700), CurvePoint::on(500, 0)]],
        ));
        let odd = font.push_glyph(GlyphRecord::empty(0, 750));
        font.map(0x41, a);
        font.map(0x2192, odd);

        let options =
            ClassifyOptions { width_tolerance: 0.1, oversize_factor: 1.2, cell_height: 1000 };
        let donor = Donor::new(0, font.clone(), classify(&font, 500, &options));

        let mut report = Report::new();
        report.record_classification(0, donor.classes());
        let selection = select(
            &[&donor],
            &[0x41, 0x2192, 0x4E00].into_iter().collect(),
            &CodepointSet::ascii(),
            &CodepointSet::cjk(),
            false,
            &mut report,
        );
        report.record_selection(&selection, std::slice::from_ref(&donor));

        assert_eq!(
            report.issues(),
            &[
                Issue::Rejected { codepoint: 0x2192, donor: 0, advance_width: 750 },
                Issue::Unresolved { codepoint: 0x2192 },
                Issue::Unresolved { codepoint: 0x4E00 },
            ]
        );
        assert_eq!(report.unresolved().collect::<Vec<_>>(), vec![0x2192, 0x4E00]);

        let diagnostics = report.diagnostics();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].codepoint, 0x41);
        assert_eq!(
            GlyphRef { donor: diagnostics[0].donor, glyph: diagnostics[0].glyph },
            GlyphRef { donor: 0, glyph: a }
        );
        assert_eq!(diagnostics[0].class, WidthClass::Half);
        assert!(!diagnostics[0].empty);
    }

    #[test]
    fn display() {
        let issue = Issue::Unresolved { codepoint: 0x4E00 };
        assert_eq!(issue.to_string(), "U+4E00 is not provided by any font");
        assert_eq!(issue.codepoint(), 0x4E00);
    }
}
