use std::fmt::{self, Display, Formatter};
use std::ops::RangeInclusive;
use std::str::FromStr;

/// A set of codepoints, stored as sorted, disjoint, inclusive ranges.
#[derive(Debug, Clone, Default, Eq, PartialEq, Hash)]
pub struct CodepointSet {
    ranges: Vec<(u32, u32)>,
}

impl CodepointSet {
    /// An empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// A set from inclusive ranges in any order, possibly overlapping.
    pub fn from_ranges(ranges: impl IntoIterator<Item = RangeInclusive<u32>>) -> Self {
        let mut ranges: Vec<(u32, u32)> = ranges
            .into_iter()
            .filter(|r| !r.is_empty())
            .map(|r| (*r.start(), *r.end()))
            .collect();
        ranges.sort_unstable();

        let mut merged: Vec<(u32, u32)> = Vec::with_capacity(ranges.len());
        for (start, end) in ranges {
            match merged.last_mut() {
                Some(last) if start <= last.1.saturating_add(1) => last.1 = last.1.max(end),
                _ => merged.push((start, end)),
            }
        }

        Self { ranges: merged }
    }

    /// Printable ASCII, `U+0020..=U+007E`.
    pub fn ascii() -> Self {
        Self::from_ranges([0x20..=0x7E])
    }

    /// Uppercase Latin letters and digits.
    pub fn capitals_and_digits() -> Self {
        Self::from_ranges(['A' as u32..='Z' as u32, '0' as u32..='9' as u32])
    }

    /// The blocks of CJK ideographs, kana, hangul, CJK symbols and fullwidth
    /// forms.
    pub fn cjk() -> Self {
        Self::from_ranges([
            0x1100..=0x11FF,   // Hangul Jamo
            0x2E80..=0x2FDF,   // CJK and Kangxi radicals
            0x2FF0..=0x303F,   // Ideographic description, CJK symbols
            0x3040..=0x30FF,   // Hiragana, Katakana
            0x3100..=0x312F,   // Bopomofo
            0x3130..=0x318F,   // Hangul compatibility Jamo
            0x3190..=0x31FF,   // Kanbun, Bopomofo extended, strokes, Katakana ext.
            0x3200..=0x33FF,   // Enclosed CJK, CJK compatibility
            0x3400..=0x4DBF,   // Extension A
            0x4E00..=0x9FFF,   // Unified ideographs
            0xA960..=0xA97F,   // Hangul Jamo extended A
            0xAC00..=0xD7FF,   // Hangul syllables, Jamo extended B
            0xF900..=0xFAFF,   // Compatibility ideographs
            0xFE30..=0xFE4F,   // CJK compatibility forms
            0xFF01..=0xFF60,   // Fullwidth ASCII variants
            0xFFE0..=0xFFE6,   // Fullwidth signs
            0x20000..=0x3134F, // Supplementary ideographic planes
        ])
    }

    /// Whether the set contains a codepoint.
    pub fn contains(&self, c: u32) -> bool {
        self.ranges
            .binary_search_by(|&(start, end)| {
                if end < c {
                    std::cmp::Ordering::Less
                } else if start > c {
                    std::cmp::Ordering::Greater
                } else {
                    std::cmp::Ordering::Equal
                }
            })
            .is_ok()
    }

    /// Iterate over all codepoints in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        self.ranges.iter().flat_map(|&(start, end)| start..=end)
    }

    /// The inclusive ranges of the set.
    pub fn ranges(&self) -> impl Iterator<Item = RangeInclusive<u32>> + '_ {
        self.ranges.iter().map(|&(start, end)| start..=end)
    }

    /// The number of codepoints in the set.
    pub fn len(&self) -> usize {
        self.ranges.iter().map(|&(start, end)| (end - start) as usize + 1).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// The union of two sets.
    pub fn union(&self, other: &Self) -> Self {
        Self::from_ranges(self.ranges().chain(other.ranges()))
    }
}

impl FromIterator<u32> for CodepointSet {
    fn from_iter<I: IntoIterator<Item = u32>>(iter: I) -> Self {
        Self::from_ranges(iter.into_iter().map(|c| c..=c))
    }
}

impl Display for CodepointSet {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        for (i, &(start, end)) in self.ranges.iter().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            if start == end {
                write!(f, "{start:04X}")?;
            } else {
                write!(f, "{start:04X}-{end:04X}")?;
            }
        }
        Ok(())
    }
}

/// An error while parsing a codepoint set.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct ParseCodepointSetError(String);

impl Display for ParseCodepointSetError {
    fn fmt(&self, f: &mut Formatter) -> fmt::Result {
        write!(f, "invalid codepoint range `{}`", self.0)
    }
}

impl std::error::Error for ParseCodepointSetError {}

impl FromStr for CodepointSet {
    type Err = ParseCodepointSetError;

    /// Parse comma separated hexadecimal codepoints and ranges, like
    /// `20-7E,3000,U+4E00-U+9FFF`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parse = |part: &str| {
            let digits = part.trim().trim_start_matches("U+").trim_start_matches("0x");
            u32::from_str_radix(digits, 16)
                .ok()
                .filter(|&c| c <= 0x10FFFF)
                .ok_or_else(|| ParseCodepointSetError(part.trim().into()))
        };

        let mut ranges = vec![];
        for part in s.split(',').filter(|p| !p.trim().is_empty()) {
            let range = match part.split_once('-') {
                Some((start, end)) => parse(start)?..=parse(end)?,
                None => {
                    let c = parse(part)?;
                    c..=c
                }
            };

            if range.is_empty() {
                return Err(ParseCodepointSetError(part.trim().into()));
            }
            ranges.push(range);
        }

        Ok(Self::from_ranges(ranges))
    }
}
