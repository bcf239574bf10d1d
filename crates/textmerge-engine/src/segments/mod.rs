//! Segment Builder: turns adapter tokens into identified, classified, grouped segments.

use serde::{Deserialize, Serialize};

use crate::diff::{DiffError, DiffToken, WordDiff, validate_tokens};

/// Identifier of a segment, unique within one diff run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SegmentId(pub u64);

impl std::fmt::Display for SegmentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "seg-{}", self.0)
    }
}

/// Identifier shared by the two members of a substitution pair
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SegmentKind {
    Unchanged,
    Added,
    Removed,
}

impl SegmentKind {
    fn from_token(token: &DiffToken) -> Self {
        match (token.added, token.removed) {
            (true, _) => SegmentKind::Added,
            (_, true) => SegmentKind::Removed,
            _ => SegmentKind::Unchanged,
        }
    }

    /// Inclusion a freshly built segment starts with: the target text
    pub fn default_inclusion(self) -> bool {
        !matches!(self, SegmentKind::Removed)
    }
}

/// One contiguous token of a word-level diff
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSegment {
    pub id: SegmentId,
    /// Never empty
    pub value: String,
    pub kind: SegmentKind,
    /// Whether this segment contributes to the preview
    pub included: bool,
    /// Set on both members of an adjacent Removed/Added pair
    pub group: Option<GroupId>,
}

impl DiffSegment {
    pub fn is_change(&self) -> bool {
        self.kind != SegmentKind::Unchanged
    }
}

/// Run the adapter once and build the segment list for a fresh diff run.
///
/// Ids and group ids both start at zero for every run; the history is reset
/// alongside, so ids from a superseded run are simply never found again.
pub fn build_segments(
    adapter: &dyn WordDiff,
    source: &str,
    target: &str,
) -> Result<Vec<DiffSegment>, DiffError> {
    let tokens = adapter.diff(source, target);
    validate_tokens(&tokens, source, target)?;
    Ok(segments_from_tokens(tokens))
}

/// Classify, number and group already validated tokens
pub fn segments_from_tokens(tokens: Vec<DiffToken>) -> Vec<DiffSegment> {
    let mut segments: Vec<DiffSegment> = tokens
        .into_iter()
        .filter(|token| !token.value.is_empty())
        .enumerate()
        .map(|(index, token)| {
            let kind = SegmentKind::from_token(&token);
            DiffSegment {
                id: SegmentId(index as u64),
                value: token.value,
                kind,
                included: kind.default_inclusion(),
                group: None,
            }
        })
        .collect();

    assign_groups(&mut segments);
    segments
}

/// Pair each Removed immediately followed by an Added (or the reverse).
/// A paired segment is never considered again, so `- + -` yields one group.
fn assign_groups(segments: &mut [DiffSegment]) {
    let mut next_group = 0;
    let mut i = 0;
    while i + 1 < segments.len() {
        let pair = (segments[i].kind, segments[i + 1].kind);
        if matches!(
            pair,
            (SegmentKind::Removed, SegmentKind::Added) | (SegmentKind::Added, SegmentKind::Removed)
        ) {
            let group = Some(GroupId(next_group));
            next_group += 1;
            segments[i].group = group;
            segments[i + 1].group = group;
            i += 2;
        } else {
            i += 1;
        }
    }
}
