use crate::models::error::EditorError;
use crate::models::report::{RenderReport, TrackReport};

/// Progress callbacks from the mastering pipeline.
///
/// All methods run on the thread that called `render`.
pub trait RenderObserver: Send + Sync {
    /// Track `index` of `count` is about to be decoded.
    fn on_track_started(&self, index: usize, count: usize);

    /// A track was written, or failed with the error recorded in `report`.
    fn on_track_finished(&self, report: &TrackReport);

    /// The render was aborted before any track was processed.
    fn on_render_failed(&self, _error: &EditorError) {}

    fn on_render_finished(&self, report: &RenderReport);
}
