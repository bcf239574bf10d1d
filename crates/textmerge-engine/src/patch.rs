//! Range Patcher: splices external replacements back into the text they were
//! computed against.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::ranges::{RangeError, RangeId, SelectionRange, check_offset};

/// Replacement text an edit service produced for one range
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeEditResult {
    pub range_id: RangeId,
    pub replacement: String,
}

impl RangeEditResult {
    pub fn new(range_id: RangeId, replacement: impl Into<String>) -> Self {
        Self {
            range_id,
            replacement: replacement.into(),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PatchError {
    #[error("{id} does not fit the text being patched: {source}")]
    InvalidRange {
        id: RangeId,
        #[source]
        source: RangeError,
    },

    #[error("{first} and {second} overlap")]
    Overlap { first: RangeId, second: RangeId },
}

/// Apply `results` to `text`, using the offsets of the matching `ranges`.
///
/// Ranges without a result keep their original text; results naming an unknown
/// range are ignored. When several results name the same range the last one wins.
///
/// Every matched range is checked against `text` before anything is spliced, so an
/// error leaves nothing half applied: each must be non-empty, in bounds and on char
/// boundaries, and no two may overlap. Splicing runs from the highest start offset
/// down, which keeps the offsets of the ranges still to be processed valid.
pub fn apply_range_results(
    ranges: &[SelectionRange],
    results: &[RangeEditResult],
    text: &str,
) -> Result<String, PatchError> {
    let replacements: HashMap<RangeId, &str> = results
        .iter()
        .map(|result| (result.range_id, result.replacement.as_str()))
        .collect();

    let mut matched: Vec<(&SelectionRange, &str)> = ranges
        .iter()
        .filter_map(|range| {
            let replacement = replacements.get(&range.id)?;
            Some((range, *replacement))
        })
        .collect();

    for (range, _) in &matched {
        check_span(text, range).map_err(|source| PatchError::InvalidRange {
            id: range.id,
            source,
        })?;
    }

    matched.sort_by_key(|(range, _)| range.start);
    if let Some(pair) = matched.windows(2).find(|pair| pair[0].0.end > pair[1].0.start) {
        return Err(PatchError::Overlap {
            first: pair[0].0.id,
            second: pair[1].0.id,
        });
    }

    let unmatched = ranges.len() - matched.len();
    if unmatched > 0 {
        log::debug!("{unmatched} range(s) had no result and keep their text");
    }
    let unknown = replacements.len().saturating_sub(matched.len());
    if unknown > 0 {
        log::debug!("{unknown} result(s) named no known range");
    }

    let mut patched = text.to_string();
    for (range, replacement) in matched.into_iter().rev() {
        patched.replace_range(range.start..range.end, replacement);
    }

    Ok(patched)
}

fn check_span(text: &str, range: &SelectionRange) -> Result<(), RangeError> {
    if range.start >= range.end {
        return Err(RangeError::Inverted {
            start: range.start,
            end: range.end,
        });
    }
    check_offset(text, range.start)?;
    check_offset(text, range.end)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn range(id: u64, start: usize, end: usize, text: &str) -> SelectionRange {
        SelectionRange {
            id: RangeId(id),
            start,
            end,
            text: text[start..end].to_string(),
        }
    }

    const TEXT: &str = "01234 6789 bcdef hij";

    #[test]
    fn test_two_ranges_both_replaced() {
        let ranges = vec![range(0, 0, 5, TEXT), range(1, 11, 16, TEXT)];
        let results = vec![
            RangeEditResult::new(RangeId(0), "Alpha"),
            RangeEditResult::new(RangeId(1), "Beta"),
        ];

        let patched = apply_range_results(&ranges, &results, TEXT).unwrap();

        assert_eq!(TEXT.len(), 20);
        assert_eq!(patched, "Alpha 6789 Beta hij");
        assert_eq!(patched.len(), 19);
    }

    #[test]
    fn test_two_ranges_on_twenty_characters() {
        let text = "0123456789abcdefghij";
        let ranges = vec![range(0, 0, 5, text), range(1, 10, 15, text)];
        let results = vec![
            RangeEditResult::new(RangeId(0), "Alpha"),
            RangeEditResult::new(RangeId(1), "Beta"),
        ];

        let patched = apply_range_results(&ranges, &results, text).unwrap();

        assert_eq!(patched, "Alpha56789Betafghij");
        assert_eq!(patched.len(), text.len() - 1);
    }

    #[test]
    fn test_results_order_does_not_matter() {
        let ranges = vec![range(0, 0, 5, TEXT), range(1, 11, 16, TEXT)];
        let results = vec![
            RangeEditResult::new(RangeId(1), "a much longer replacement"),
            RangeEditResult::new(RangeId(0), "x"),
        ];

        let patched = apply_range_results(&ranges, &results, TEXT).unwrap();

        assert_eq!(patched, "x 6789 a much longer replacement hij");
    }

    #[test]
    fn test_unmatched_range_keeps_original_text() {
        let ranges = vec![range(0, 0, 5, TEXT), range(1, 11, 16, TEXT)];
        let results = vec![RangeEditResult::new(RangeId(1), "B")];

        let patched = apply_range_results(&ranges, &results, TEXT).unwrap();

        assert_eq!(patched, "01234 6789 B hij");
    }

    #[test]
    fn test_unknown_result_is_ignored() {
        let ranges = vec![range(0, 6, 10, TEXT)];
        let results = vec![
            RangeEditResult::new(RangeId(7), "nope"),
            RangeEditResult::new(RangeId(0), "six"),
        ];

        let patched = apply_range_results(&ranges, &results, TEXT).unwrap();

        assert_eq!(patched, "01234 six bcdef hij");
    }

    #[test]
    fn test_empty_results_return_text_unchanged() {
        let ranges = vec![range(0, 0, 5, TEXT)];

        let patched = apply_range_results(&ranges, &[], TEXT).unwrap();

        assert_eq!(patched, TEXT);
    }

    #[test]
    fn test_range_past_text_end_fails_before_splicing() {
        let ranges = vec![
            range(0, 0, 5, TEXT),
            SelectionRange {
                id: RangeId(1),
                start: 18,
                end: 40,
                text: String::new(),
            },
        ];
        let results = vec![
            RangeEditResult::new(RangeId(0), "Alpha"),
            RangeEditResult::new(RangeId(1), "Beta"),
        ];

        let error = apply_range_results(&ranges, &results, TEXT).unwrap_err();

        assert_eq!(
            error,
            PatchError::InvalidRange {
                id: RangeId(1),
                source: RangeError::OutOfBounds { offset: 40, len: 20 },
            }
        );
    }

    #[test]
    fn test_inverted_range_is_rejected() {
        let ranges = vec![SelectionRange {
            id: RangeId(0),
            start: 6,
            end: 2,
            text: String::new(),
        }];
        let results = vec![RangeEditResult::new(RangeId(0), "x")];

        let error = apply_range_results(&ranges, &results, "0123456789").unwrap_err();

        assert_eq!(
            error,
            PatchError::InvalidRange {
                id: RangeId(0),
                source: RangeError::Inverted { start: 6, end: 2 },
            }
        );
    }

    #[test]
    fn test_overlapping_ranges_are_rejected() {
        let text = "0123456789";
        let ranges = vec![range(0, 0, 10, text), range(1, 5, 8, text)];
        let results = vec![
            RangeEditResult::new(RangeId(0), "outer"),
            RangeEditResult::new(RangeId(1), "inner"),
        ];

        let error = apply_range_results(&ranges, &results, text).unwrap_err();

        assert_eq!(
            error,
            PatchError::Overlap {
                first: RangeId(0),
                second: RangeId(1),
            }
        );
    }

    #[test]
    fn test_overlap_with_unmatched_range_is_allowed() {
        let text = "0123456789";
        let ranges = vec![range(0, 0, 10, text), range(1, 5, 8, text)];
        let results = vec![RangeEditResult::new(RangeId(1), "x")];

        let patched = apply_range_results(&ranges, &results, text).unwrap();

        assert_eq!(patched, "01234x89");
    }

    #[test]
    fn test_multibyte_text_is_spliced_on_char_boundaries() {
        let text = "naïve café";
        let ranges = vec![range(0, 0, 6, text), range(1, 7, 12, text)];
        let results = vec![
            RangeEditResult::new(RangeId(0), "naive"),
            RangeEditResult::new(RangeId(1), "coffee"),
        ];

        let patched = apply_range_results(&ranges, &results, text).unwrap();

        assert_eq!(patched, "naive coffee");
    }
}
