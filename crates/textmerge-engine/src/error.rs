use thiserror::Error;

use crate::{diff::DiffError, edit_service::EditServiceError, patch::PatchError, ranges::RangeError};

/// Aggregate error for callers that drive the whole engine through one `?`
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Diff(#[from] DiffError),
    #[error(transparent)]
    Range(#[from] RangeError),
    #[error(transparent)]
    Patch(#[from] PatchError),
    #[error(transparent)]
    EditService(#[from] EditServiceError),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MergeSession, RangeEditResult};

    fn merge_and_patch(text_end: usize) -> Result<String, EngineError> {
        let mut session = MergeSession::new();
        session.run_diff("The sky was red.", "The sky was blue today.")?;
        let text = session.preview_text();
        let Some(id) = session.add_range(12, text_end, false, &text)? else {
            return Ok(text);
        };
        Ok(session.apply_range_results(&[RangeEditResult::new(id, "grey")], &text)?)
    }

    #[test]
    fn test_question_mark_through_engine() {
        assert_eq!(merge_and_patch(16).unwrap(), "The sky was grey today.");
    }

    #[test]
    fn test_range_error_converts() {
        let error = merge_and_patch(400).unwrap_err();

        assert!(matches!(
            error,
            EngineError::Range(RangeError::OutOfBounds { offset: 400, .. })
        ));
    }
}
