use similar::{Algorithm, ChangeTag, TextDiff};

use super::{DiffToken, WordDiff};

/// Word diff over UAX#29 word boundaries.
///
/// Punctuation and whitespace become tokens of their own, so `"red."` diffs as
/// `"red"` + `"."`. Consecutive changes with the same tag are coalesced into one
/// token, which is what makes a multi-word insertion a single toggleable segment.
#[derive(Debug, Clone, Copy, Default)]
pub struct UnicodeWordDiff;

impl WordDiff for UnicodeWordDiff {
    fn diff(&self, source: &str, target: &str) -> Vec<DiffToken> {
        let diff = TextDiff::configure()
            .algorithm(Algorithm::Myers)
            .diff_unicode_words(source, target);

        let mut tokens: Vec<DiffToken> = Vec::new();
        for change in diff.iter_all_changes() {
            let (added, removed) = match change.tag() {
                ChangeTag::Equal => (false, false),
                ChangeTag::Insert => (true, false),
                ChangeTag::Delete => (false, true),
            };

            match tokens.last_mut() {
                Some(last) if last.added == added && last.removed == removed => {
                    last.value.push_str(change.value());
                }
                _ => tokens.push(DiffToken {
                    value: change.value().to_string(),
                    added,
                    removed,
                }),
            }
        }

        tokens
    }
}
