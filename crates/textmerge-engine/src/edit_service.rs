/*!
 * # Range Edit Service seam
 *
 * Partial edits of the merged text are computed by an external, asynchronous
 * service (typically a language model). This module defines the contract with that
 * service and the bookkeeping that keeps a late answer from corrupting newer state:
 *
 * 1. [`crate::MergeSession::begin_range_edit`] cancels any earlier request and issues
 *    a [`RangeEditTicket`] holding a snapshot of the live ranges and of the text they
 *    point into, plus a fresh cancellation token.
 * 2. [`run_range_edit`] sends the ticket's requests and races the answer against the
 *    token. A cancelled ticket yields `Ok(None)`.
 * 3. [`crate::MergeSession::complete_range_edit`] patches the *snapshotted* text, or
 *    does nothing at all when the ticket was cancelled or superseded meanwhile.
 */

use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::patch::RangeEditResult;
use crate::ranges::{RangeId, SelectionRange};

/// What kind of rewrite the service is asked for. Prompt wording is the service's
/// business; the engine only forwards the choice.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EditMode {
    #[default]
    Improve,
    Proofread,
    Shorten,
    Expand,
}

impl EditMode {
    pub const ALL: [EditMode; 4] = [
        EditMode::Improve,
        EditMode::Proofread,
        EditMode::Shorten,
        EditMode::Expand,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            EditMode::Improve => "improve",
            EditMode::Proofread => "proofread",
            EditMode::Shorten => "shorten",
            EditMode::Expand => "expand",
        }
    }
}

impl std::fmt::Display for EditMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("unknown edit mode '{0}'")]
pub struct UnknownEditMode(pub String);

impl FromStr for EditMode {
    type Err = UnknownEditMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        EditMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| UnknownEditMode(s.to_string()))
    }
}

/// One range's text as sent to the service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RangeEditRequest {
    pub id: RangeId,
    pub text: String,
}

impl From<&SelectionRange> for RangeEditRequest {
    fn from(range: &SelectionRange) -> Self {
        Self {
            id: range.id,
            text: range.text.clone(),
        }
    }
}

#[derive(Debug, Error)]
pub enum EditServiceError {
    #[error("range edit service failed: {0}")]
    Failed(#[from] anyhow::Error),
}

/// Computes replacements for a batch of ranges. The answer may cover only some of
/// the requested ids.
#[async_trait]
pub trait RangeEditService: Send + Sync {
    async fn edit_ranges(
        &self,
        requests: Vec<RangeEditRequest>,
        mode: EditMode,
    ) -> Result<Vec<RangeEditResult>, EditServiceError>;
}

/// Snapshot of everything an in-flight range edit depends on
#[derive(Debug, Clone)]
pub struct RangeEditTicket {
    pub(crate) generation: u64,
    pub(crate) ranges: Vec<SelectionRange>,
    pub(crate) text: String,
    pub(crate) cancel: CancellationToken,
}

impl RangeEditTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn ranges(&self) -> &[SelectionRange] {
        &self.ranges
    }

    /// The full text as it was when the ticket was issued
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn requests(&self) -> Vec<RangeEditRequest> {
        self.ranges.iter().map(RangeEditRequest::from).collect()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token for callers that want to tie their own work to this ticket
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }
}

/// Ask `service` for the ticket's replacements, giving up as soon as the ticket is
/// cancelled. `Ok(None)` means cancelled; nothing should be applied.
pub async fn run_range_edit(
    service: &dyn RangeEditService,
    ticket: &RangeEditTicket,
    mode: EditMode,
) -> Result<Option<Vec<RangeEditResult>>, EditServiceError> {
    if ticket.is_cancelled() {
        return Ok(None);
    }
    if ticket.ranges.is_empty() {
        return Ok(Some(Vec::new()));
    }

    log::info!(
        "requesting {mode} edit for {} range(s), generation {}",
        ticket.ranges.len(),
        ticket.generation
    );

    tokio::select! {
        biased;
        _ = ticket.cancel.cancelled() => {
            log::info!("range edit generation {} cancelled", ticket.generation);
            Ok(None)
        }
        result = service.edit_ranges(ticket.requests(), mode) => result.map(Some),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("improve", EditMode::Improve)]
    #[case("Proofread", EditMode::Proofread)]
    #[case(" shorten ", EditMode::Shorten)]
    #[case("EXPAND", EditMode::Expand)]
    fn test_parse_edit_mode(#[case] input: &str, #[case] expected: EditMode) {
        assert_eq!(input.parse::<EditMode>(), Ok(expected));
    }

    #[test]
    fn test_parse_unknown_edit_mode() {
        assert_eq!(
            "translate".parse::<EditMode>(),
            Err(UnknownEditMode("translate".to_string()))
        );
    }
}
