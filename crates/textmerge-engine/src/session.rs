use tokio_util::sync::CancellationToken;

use crate::diff::{DiffError, UnicodeWordDiff, WordDiff};
use crate::edit_service::{RangeEditRequest, RangeEditTicket};
use crate::merge::{MergeHistory, MergeStats};
use crate::patch::{PatchError, RangeEditResult, apply_range_results};
use crate::ranges::{RangeError, RangeId, RangeTracker, SelectionRange, WordBoundaries};
use crate::segments::{DiffSegment, SegmentId, build_segments};

/// The merge core as one owned object.
///
/// `MergeSession` ties together the segment builder, the merge history and the
/// range tracker, and is the only type an orchestration layer (a TUI, a desktop
/// shell, a test) needs to drive. It renders nothing and holds no UI state.
///
/// ## Usage Pattern
///
/// ```rust
/// use textmerge_engine::{MergeSession, RangeEditResult};
///
/// let mut session = MergeSession::new();
/// session.run_diff("The sky was red.", "The sky was blue today.").unwrap();
/// assert_eq!(session.preview_text(), "The sky was blue today.");
///
/// // Put the original word back
/// let added = session.current_segments()[2].id;
/// session.toggle(added);
/// assert_eq!(session.preview_text(), "The sky was red.");
/// session.undo();
///
/// // Scope an external edit to one word of the merged text
/// let text = session.preview_text();
/// let id = session.add_range(12, 14, false, &text).unwrap().unwrap();
/// let patched = session
///     .apply_range_results(&[RangeEditResult::new(id, "grey")], &text)
///     .unwrap();
/// assert_eq!(patched, "The sky was grey today.");
/// assert!(session.current_ranges().is_empty());
/// ```
pub struct MergeSession {
    adapter: Box<dyn WordDiff + Send + Sync>,
    history: MergeHistory,
    ranges: RangeTracker,
    history_limit: Option<usize>,
    /// Generation and token of the most recently issued range edit
    pending_edit: Option<(u64, CancellationToken)>,
    edit_generation: u64,
}

impl Default for MergeSession {
    fn default() -> Self {
        Self::new()
    }
}

impl MergeSession {
    pub fn new() -> Self {
        Self {
            adapter: Box::new(UnicodeWordDiff),
            history: MergeHistory::default(),
            ranges: RangeTracker::default(),
            history_limit: None,
            pending_edit: None,
            edit_generation: 0,
        }
    }

    pub fn with_adapter(mut self, adapter: impl WordDiff + Send + Sync + 'static) -> Self {
        self.adapter = Box::new(adapter);
        self
    }

    pub fn with_boundaries(mut self, boundaries: WordBoundaries) -> Self {
        self.ranges = RangeTracker::new(boundaries);
        self
    }

    pub fn with_history_limit(mut self, limit: Option<usize>) -> Self {
        self.history_limit = limit;
        self.history = std::mem::take(&mut self.history).with_limit(limit);
        self
    }

    // Diff and merge choices

    /// Diff `source` against `target` and start a fresh history from the result.
    ///
    /// Malformed adapter output is reported and leaves the previous run untouched.
    pub fn run_diff(&mut self, source: &str, target: &str) -> Result<(), DiffError> {
        let segments = build_segments(self.adapter.as_ref(), source, target)?;
        log::info!(
            "diff produced {} segment(s) from {} -> {} bytes",
            segments.len(),
            source.len(),
            target.len()
        );
        self.history = MergeHistory::new(segments).with_limit(self.history_limit);
        Ok(())
    }

    pub fn toggle(&mut self, id: SegmentId) -> bool {
        self.history.toggle(id)
    }

    pub fn accept_all(&mut self) -> bool {
        self.history.accept_all()
    }

    pub fn reject_all(&mut self) -> bool {
        self.history.reject_all()
    }

    pub fn undo(&mut self) -> bool {
        self.history.undo()
    }

    pub fn redo(&mut self) -> bool {
        self.history.redo()
    }

    pub fn can_undo(&self) -> bool {
        self.history.can_undo()
    }

    pub fn can_redo(&self) -> bool {
        self.history.can_redo()
    }

    pub fn current_segments(&self) -> &[DiffSegment] {
        self.history.current()
    }

    pub fn preview_text(&self) -> String {
        self.history.materialize()
    }

    pub fn preview_span(&self, id: SegmentId) -> Option<std::ops::Range<usize>> {
        self.history.preview_span(id)
    }

    pub fn stats(&self) -> MergeStats {
        self.history.stats()
    }

    pub fn history(&self) -> &MergeHistory {
        &self.history
    }

    // Ranges

    pub fn add_range(
        &mut self,
        start: usize,
        end: usize,
        additive: bool,
        full_text: &str,
    ) -> Result<Option<RangeId>, RangeError> {
        self.ranges.add_range(start, end, additive, full_text)
    }

    pub fn remove_range(&mut self, id: RangeId) -> bool {
        self.ranges.remove_range(id)
    }

    pub fn clear_ranges(&mut self) {
        self.ranges.clear();
    }

    pub fn current_ranges(&self) -> &[SelectionRange] {
        self.ranges.ranges()
    }

    /// The `{id, text}` payload for an edit service, one entry per live range
    pub fn range_edit_requests(&self) -> Vec<RangeEditRequest> {
        self.ranges
            .ranges()
            .iter()
            .map(RangeEditRequest::from)
            .collect()
    }

    /// Patch `full_text` with `results` using the live ranges, then drop every range:
    /// their offsets no longer describe the returned text.
    pub fn apply_range_results(
        &mut self,
        results: &[RangeEditResult],
        full_text: &str,
    ) -> Result<String, PatchError> {
        let snapshot = self.ranges.ranges().to_vec();
        let patched = apply_range_results(&snapshot, results, full_text)?;
        self.ranges.clear();
        log::info!("applied {} range result(s)", results.len());
        Ok(patched)
    }

    // Asynchronous range edits

    /// Cancel any in-flight range edit and issue a ticket for a new one, capturing the
    /// live ranges and `full_text` as they are now.
    pub fn begin_range_edit(&mut self, full_text: &str) -> RangeEditTicket {
        self.cancel_range_edit();

        self.edit_generation += 1;
        let cancel = CancellationToken::new();
        self.pending_edit = Some((self.edit_generation, cancel.clone()));

        RangeEditTicket {
            generation: self.edit_generation,
            ranges: self.ranges.ranges().to_vec(),
            text: full_text.to_string(),
            cancel,
        }
    }

    /// Signal cancellation of the in-flight range edit, if there is one
    pub fn cancel_range_edit(&mut self) -> bool {
        match self.pending_edit.take() {
            Some((generation, token)) => {
                log::debug!("cancelling range edit generation {generation}");
                token.cancel();
                true
            }
            None => false,
        }
    }

    pub fn has_pending_range_edit(&self) -> bool {
        self.pending_edit.is_some()
    }

    /// Generation of the range edit still in flight, if any
    pub fn pending_generation(&self) -> Option<u64> {
        self.pending_edit.as_ref().map(|(generation, _)| *generation)
    }

    /// Apply the answer to `ticket` against the text and ranges it captured.
    ///
    /// Returns `Ok(None)` and changes nothing when the ticket was cancelled or a newer
    /// ticket has been issued since. Otherwise the live ranges are cleared and the
    /// patched text is returned.
    pub fn complete_range_edit(
        &mut self,
        ticket: RangeEditTicket,
        results: &[RangeEditResult],
    ) -> Result<Option<String>, PatchError> {
        let current = matches!(
            self.pending_edit,
            Some((generation, _)) if generation == ticket.generation
        );
        if ticket.is_cancelled() || !current {
            log::warn!(
                "discarding result of range edit generation {}",
                ticket.generation
            );
            return Ok(None);
        }

        let patched = apply_range_results(&ticket.ranges, results, &ticket.text)?;
        self.pending_edit = None;
        self.ranges.clear();
        log::info!(
            "applied {} range result(s) from generation {}",
            results.len(),
            ticket.generation
        );
        Ok(Some(patched))
    }
}
