/*!
 * # Merge History Engine
 *
 * A state machine over segment-list snapshots. Each user choice (toggle, accept
 * all, reject all) produces a whole new snapshot; undo and redo only move a cursor.
 *
 * ## Invariants
 *
 * - The cursor always points at an existing snapshot while the history is non-empty
 * - A new choice truncates every snapshot after the cursor before appending
 * - Within a group exactly one member is included, in every snapshot
 * - The preview text is derived from the current snapshot and never stored
 *
 * Group linkage is kept outside the snapshots in an id-keyed partner map, so
 * snapshots stay flat `Vec<DiffSegment>`s that are cheap to clone.
 */

use std::collections::HashMap;

use serde::Serialize;

use crate::segments::{DiffSegment, GroupId, SegmentId, SegmentKind};

/// Counts over the current snapshot, for status lines
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub unchanged: usize,
    pub added: usize,
    pub removed: usize,
    pub added_included: usize,
    pub removed_included: usize,
    pub groups: usize,
}

#[derive(Debug, Clone, Default)]
pub struct MergeHistory {
    snapshots: Vec<Vec<DiffSegment>>,
    cursor: usize,
    /// Position of each id within every snapshot of this run
    positions: HashMap<SegmentId, usize>,
    /// Group partner of each grouped id, both directions
    partners: HashMap<SegmentId, SegmentId>,
    /// Maximum snapshots retained; `None` keeps everything
    limit: Option<usize>,
}

impl MergeHistory {
    pub fn new(segments: Vec<DiffSegment>) -> Self {
        let mut history = Self::default();
        history.initialize(segments);
        history
    }

    /// Cap the number of retained snapshots, dropping the oldest first.
    /// A limit below one is treated as one.
    pub fn with_limit(mut self, limit: Option<usize>) -> Self {
        self.limit = limit.map(|l| l.max(1));
        self.enforce_limit();
        self
    }

    /// Reset to a single snapshot at cursor 0, discarding all earlier history
    pub fn initialize(&mut self, segments: Vec<DiffSegment>) {
        self.positions = segments
            .iter()
            .enumerate()
            .map(|(index, segment)| (segment.id, index))
            .collect();
        self.partners = partner_map(&segments);
        self.snapshots = vec![segments];
        self.cursor = 0;
    }

    pub fn current(&self) -> &[DiffSegment] {
        self.snapshots
            .get(self.cursor)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn segment(&self, id: SegmentId) -> Option<&DiffSegment> {
        let position = *self.positions.get(&id)?;
        self.current().get(position)
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    pub fn cursor(&self) -> usize {
        self.cursor
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        self.cursor + 1 < self.snapshots.len()
    }

    /// Flip one segment; its group partner takes the complementary value.
    ///
    /// Returns `false` without touching the history when `id` is not part of the
    /// current run (a stale id from a superseded diff).
    pub fn toggle(&mut self, id: SegmentId) -> bool {
        let Some(&position) = self.positions.get(&id) else {
            log::debug!("toggle ignored: {id} is not in the current diff run");
            return false;
        };
        let Some(segment) = self.current().get(position) else {
            return false;
        };

        let included = !segment.included;
        let partner = self
            .partners
            .get(&id)
            .and_then(|partner| self.positions.get(partner))
            .copied();

        let mut next = self.current().to_vec();
        next[position].included = included;
        if let Some(partner_position) = partner {
            next[partner_position].included = !included;
        }
        self.push(next);
        true
    }

    /// Include every addition and exclude every removal
    pub fn accept_all(&mut self) -> bool {
        self.set_changes(true)
    }

    /// Exclude every addition and include every removal
    pub fn reject_all(&mut self) -> bool {
        self.set_changes(false)
    }

    pub fn undo(&mut self) -> bool {
        if !self.can_undo() {
            log::debug!("undo ignored at cursor {}", self.cursor);
            return false;
        }
        self.cursor -= 1;
        true
    }

    pub fn redo(&mut self) -> bool {
        if !self.can_redo() {
            log::debug!("redo ignored at cursor {}", self.cursor);
            return false;
        }
        self.cursor += 1;
        true
    }

    /// Concatenate every included segment in sequence order
    pub fn materialize(&self) -> String {
        self.current()
            .iter()
            .filter(|segment| segment.included)
            .map(|segment| segment.value.as_str())
            .collect()
    }

    /// Byte span a segment occupies in the preview, or `None` when it is excluded
    /// or unknown
    pub fn preview_span(&self, id: SegmentId) -> Option<std::ops::Range<usize>> {
        let position = *self.positions.get(&id)?;
        let current = self.current();
        let segment = current.get(position)?;
        if !segment.included {
            return None;
        }

        let start: usize = current[..position]
            .iter()
            .filter(|s| s.included)
            .map(|s| s.value.len())
            .sum();
        Some(start..start + segment.value.len())
    }

    pub fn stats(&self) -> MergeStats {
        let mut stats = MergeStats::default();
        for segment in self.current() {
            match segment.kind {
                SegmentKind::Unchanged => stats.unchanged += 1,
                SegmentKind::Added => {
                    stats.added += 1;
                    stats.added_included += usize::from(segment.included);
                }
                SegmentKind::Removed => {
                    stats.removed += 1;
                    stats.removed_included += usize::from(segment.included);
                }
            }
        }
        stats.groups = self.partners.len() / 2;
        stats
    }

    fn set_changes(&mut self, accept: bool) -> bool {
        if self.snapshots.is_empty() {
            return false;
        }

        let mut next = self.current().to_vec();
        for segment in next.iter_mut() {
            match segment.kind {
                SegmentKind::Added => segment.included = accept,
                SegmentKind::Removed => segment.included = !accept,
                SegmentKind::Unchanged => {}
            }
        }
        self.push(next);
        true
    }

    fn push(&mut self, snapshot: Vec<DiffSegment>) {
        self.snapshots.truncate(self.cursor + 1);
        self.snapshots.push(snapshot);
        self.cursor = self.snapshots.len() - 1;
        self.enforce_limit();
    }

    fn enforce_limit(&mut self) {
        let Some(limit) = self.limit else {
            return;
        };
        if self.snapshots.len() > limit {
            let excess = self.snapshots.len() - limit;
            self.snapshots.drain(..excess);
            self.cursor = self.cursor.saturating_sub(excess);
        }
    }
}

fn partner_map(segments: &[DiffSegment]) -> HashMap<SegmentId, SegmentId> {
    let mut members: HashMap<GroupId, Vec<SegmentId>> = HashMap::new();
    for segment in segments {
        if let Some(group) = segment.group {
            members.entry(group).or_default().push(segment.id);
        }
    }

    let mut partners = HashMap::new();
    for (group, ids) in members {
        match ids.as_slice() {
            [a, b] => {
                partners.insert(*a, *b);
                partners.insert(*b, *a);
            }
            _ => log::warn!("group {} has {} members, ignoring", group.0, ids.len()),
        }
    }
    partners
}
