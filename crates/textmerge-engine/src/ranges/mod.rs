//! # Range Tracker
//!
//! User-selected spans of the *current* output text, tracked independently of diff
//! segments. Each range scopes one piece of an external edit request.
//!
//! The live set is kept sorted by `start`, with no two ranges overlapping or
//! touching: whenever `b.start <= a.end + 1` the two are merged into one.
//!
//! Offsets are byte offsets into the UTF-8 text and always fall on char boundaries.
//! New selections are widened to whole words (see [`WordBoundaries`]) so an external
//! edit never receives a clipped fragment.

mod boundaries;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use boundaries::{DEFAULT_BOUNDARY_PUNCTUATION, WordBoundaries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct RangeId(pub u64);

impl std::fmt::Display for RangeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "range-{}", self.0)
    }
}

/// A half-open byte span `start..end` of the current text plus the text it covered
/// when it was captured
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionRange {
    pub id: RangeId,
    pub start: usize,
    pub end: usize,
    pub text: String,
}

impl SelectionRange {
    pub fn as_range(&self) -> std::ops::Range<usize> {
        self.start..self.end
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RangeError {
    #[error("offset {offset} is past the end of the text (length {len})")]
    OutOfBounds { offset: usize, len: usize },

    #[error("offset {offset} is not on a character boundary")]
    NotCharBoundary { offset: usize },

    #[error("range start {start} is not before its end {end}")]
    Inverted { start: usize, end: usize },
}

/// Check that `offset` is a valid slice point of `text`
pub(crate) fn check_offset(text: &str, offset: usize) -> Result<(), RangeError> {
    if offset > text.len() {
        return Err(RangeError::OutOfBounds {
            offset,
            len: text.len(),
        });
    }
    if !text.is_char_boundary(offset) {
        return Err(RangeError::NotCharBoundary { offset });
    }
    Ok(())
}

#[derive(Debug, Clone, Default)]
pub struct RangeTracker {
    ranges: Vec<SelectionRange>,
    next_id: u64,
    boundaries: WordBoundaries,
}

impl RangeTracker {
    pub fn new(boundaries: WordBoundaries) -> Self {
        Self {
            boundaries,
            ..Self::default()
        }
    }

    pub fn boundaries(&self) -> &WordBoundaries {
        &self.boundaries
    }

    /// Live ranges, ascending by start
    pub fn ranges(&self) -> &[SelectionRange] {
        &self.ranges
    }

    pub fn get(&self, id: RangeId) -> Option<&SelectionRange> {
        self.ranges.iter().find(|range| range.id == id)
    }

    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Capture a selection of `full_text`.
    ///
    /// Reversed offsets are swapped. An empty selection changes nothing and yields
    /// `Ok(None)`. The selection is widened to whole words; a non-additive capture
    /// replaces the whole set, an additive one is merged into it.
    ///
    /// Returns the id of the live range that covers the selection afterwards, which
    /// for an additive capture may be an older range it was merged into.
    pub fn add_range(
        &mut self,
        start: usize,
        end: usize,
        additive: bool,
        full_text: &str,
    ) -> Result<Option<RangeId>, RangeError> {
        let (start, end) = if start <= end {
            (start, end)
        } else {
            (end, start)
        };
        if start == end {
            return Ok(None);
        }
        check_offset(full_text, start)?;
        check_offset(full_text, end)?;

        let (start, end) = self.boundaries.expand(full_text, start, end);
        let id = RangeId(self.next_id);
        self.next_id += 1;

        let range = SelectionRange {
            id,
            start,
            end,
            text: full_text[start..end].to_string(),
        };

        if !additive {
            self.ranges = vec![range];
            return Ok(Some(id));
        }

        self.ranges.push(range);
        self.coalesce(full_text);

        Ok(self
            .ranges
            .iter()
            .find(|range| range.start <= start && end <= range.end)
            .map(|range| range.id))
    }

    pub fn remove_range(&mut self, id: RangeId) -> bool {
        let before = self.ranges.len();
        self.ranges.retain(|range| range.id != id);
        before != self.ranges.len()
    }

    pub fn clear(&mut self) {
        self.ranges.clear();
    }

    /// Sort by start and merge overlapping or touching ranges.
    ///
    /// A merged range keeps the id of its earliest member and re-reads its text from
    /// `full_text`, since it may now cover characters no member selected.
    fn coalesce(&mut self, full_text: &str) {
        self.ranges.sort_by_key(|range| range.start);

        let mut merged: Vec<(SelectionRange, bool)> = Vec::with_capacity(self.ranges.len());
        for range in self.ranges.drain(..) {
            if let Some((last, grew)) = merged.last_mut()
                && range.start <= last.end + 1
            {
                if range.end > last.end {
                    last.end = range.end;
                }
                *grew = true;
                continue;
            }
            merged.push((range, false));
        }

        self.ranges = merged
            .into_iter()
            .map(|(mut range, grew)| {
                if grew {
                    log::debug!(
                        "merged selections into {} at {}..{}",
                        range.id,
                        range.start,
                        range.end
                    );
                    range.text = full_text
                        .get(range.start..range.end)
                        .map(str::to_string)
                        .unwrap_or_default();
                }
                range
            })
            .collect();
    }
}
