pub mod diff;
pub mod edit_service;
pub mod error;
pub mod merge;
pub mod patch;
pub mod ranges;
pub mod segments;
pub mod session;

// Re-export key types for easier usage
pub use diff::{DiffError, DiffSide, DiffToken, UnicodeWordDiff, WordDiff};
pub use edit_service::{
    EditMode, EditServiceError, RangeEditRequest, RangeEditService, RangeEditTicket,
    UnknownEditMode, run_range_edit,
};
pub use error::EngineError;
pub use merge::{MergeHistory, MergeStats};
pub use patch::{PatchError, RangeEditResult, apply_range_results};
pub use ranges::{RangeError, RangeId, RangeTracker, SelectionRange, WordBoundaries};
pub use segments::{DiffSegment, GroupId, SegmentId, SegmentKind, build_segments};
pub use session::MergeSession;
