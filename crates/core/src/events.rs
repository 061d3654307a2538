use crate::message::StreamTarget;

/// Provider-agnostic stream payload mapped into chat domain language.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEventPayload {
    /// One ordered text chunk of the in-progress assistant message.
    Delta(String),
    /// Stream finished normally. Emitted exactly once, after the last delta.
    Done,
    /// Stream aborted. Terminal; `Done` will not follow.
    Error(String),
}

/// One transport update routed to a specific streaming turn.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamEventMapped {
    pub target: StreamTarget,
    pub payload: StreamEventPayload,
}

impl StreamEventMapped {
    pub fn new(target: StreamTarget, payload: StreamEventPayload) -> Self {
        Self { target, payload }
    }
}
