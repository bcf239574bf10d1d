/*!
 * # Word Diff Adapter
 *
 * The merge engine never computes a diff itself. It consumes an ordered list of
 * [`DiffToken`]s from anything implementing [`WordDiff`] and treats that output as
 * the contract of an external collaborator:
 *
 * - tokens are in document order and are never reordered downstream
 * - a token is added, removed, or neither (unchanged), never both
 * - unchanged + removed tokens concatenate to the source text
 * - unchanged + added tokens concatenate to the target text
 *
 * [`validate_tokens`] checks that contract. A violation is a bug in the adapter, so
 * the segment builder fails fast instead of producing a segment list that would
 * silently corrupt the merged output.
 *
 * The default adapter is [`UnicodeWordDiff`], backed by `similar`.
 */

mod unicode;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use unicode::UnicodeWordDiff;

/// One token of a word-level diff as produced by an adapter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffToken {
    pub value: String,
    pub added: bool,
    pub removed: bool,
}

impl DiffToken {
    pub fn unchanged(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            added: false,
            removed: false,
        }
    }

    pub fn added(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            added: true,
            removed: false,
        }
    }

    pub fn removed(value: impl Into<String>) -> Self {
        Self {
            value: value.into(),
            added: false,
            removed: true,
        }
    }
}

/// Which side of the diff a reconstruction check failed for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiffSide {
    Source,
    Target,
}

impl std::fmt::Display for DiffSide {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DiffSide::Source => write!(f, "source"),
            DiffSide::Target => write!(f, "target"),
        }
    }
}

/// Malformed adapter output. Both variants are contract violations of the adapter.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DiffError {
    #[error("malformed diff adapter output: token {index} is both added and removed")]
    AddedAndRemoved { index: usize },

    #[error("malformed diff adapter output: tokens do not reproduce the {0} text")]
    TextMismatch(DiffSide),
}

/// A pure word-level diff function
pub trait WordDiff {
    fn diff(&self, source: &str, target: &str) -> Vec<DiffToken>;
}

impl<F> WordDiff for F
where
    F: Fn(&str, &str) -> Vec<DiffToken>,
{
    fn diff(&self, source: &str, target: &str) -> Vec<DiffToken> {
        self(source, target)
    }
}

/// Check adapter output against the source and target it was computed from
pub fn validate_tokens(tokens: &[DiffToken], source: &str, target: &str) -> Result<(), DiffError> {
    if let Some(index) = tokens.iter().position(|t| t.added && t.removed) {
        return Err(DiffError::AddedAndRemoved { index });
    }

    if !reproduces(tokens.iter().filter(|t| !t.added), source) {
        return Err(DiffError::TextMismatch(DiffSide::Source));
    }
    if !reproduces(tokens.iter().filter(|t| !t.removed), target) {
        return Err(DiffError::TextMismatch(DiffSide::Target));
    }

    Ok(())
}

/// Walk `expected` piece by piece so no intermediate string is allocated
fn reproduces<'a>(tokens: impl Iterator<Item = &'a DiffToken>, expected: &str) -> bool {
    let mut rest = expected;
    for token in tokens {
        match rest.strip_prefix(token.value.as_str()) {
            Some(remaining) => rest = remaining,
            None => return false,
        }
    }
    rest.is_empty()
}
