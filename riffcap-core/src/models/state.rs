/// Stream writer state machine.
///
/// ```text
/// idle → opening → streaming → closing → idle
///                      ↓
///                  finished (end condition fired, file already closed)
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Idle,
    Opening,
    Streaming,
    Finished,
    Closing,
}

impl StreamState {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    /// Whether pushed samples are still accepted.
    pub fn is_streaming(&self) -> bool {
        matches!(self, Self::Streaming)
    }

    pub fn is_finished(&self) -> bool {
        matches!(self, Self::Finished)
    }
}
