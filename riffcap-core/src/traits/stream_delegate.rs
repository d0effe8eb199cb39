use crate::models::error::WavError;
use crate::models::result::StreamResult;
use crate::models::state::StreamState;

/// Event delegate for stream writer notifications.
///
/// `on_state_changed` fires on whichever thread drove the transition;
/// the others fire on the writer thread. Implementations should marshal to a
/// UI thread if needed.
pub trait StreamDelegate: Send + Sync {
    fn on_state_changed(&self, state: StreamState);

    /// A write failed. The same error is returned by the next `stop()`.
    fn on_error(&self, error: &WavError);

    /// The file is closed and its header patched.
    fn on_capture_finished(&self, result: &StreamResult);
}
