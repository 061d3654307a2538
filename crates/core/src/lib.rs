#![deny(unsafe_code)]

//! Ticket-extraction core: detect, parse, validate, and exactly-once-submit
//! a structured ticket payload embedded inside an incrementally-streamed
//! assistant conversation.
//!
//! Pure state, no IO. The transport adapter and the tracker client live in
//! sibling crates and meet this one at the [`events`] and
//! [`submission::TicketTracker`] seams.

/// Transport update contracts shared with the adapter crate.
pub mod events;
/// Marker/fence recognition over accumulated assistant text.
pub mod extract;
/// Conversation domain entities and stream lifecycle.
pub mod message;
/// Conversation view model composing the ticket pipeline.
pub mod session;
/// Submission state machine, at-most-once gate, and tracker seam.
pub mod submission;
/// Candidate parsing and required-field schema checks.
pub mod validate;

pub use events::{StreamEventMapped, StreamEventPayload};
pub use extract::{TICKET_MARKER, extract_candidate};
pub use message::{
    Conversation, ConversationId, Message, MessageId, MessageStatus, Role, StreamPhase,
    StreamRejection, StreamResult, StreamSessionId, StreamTarget,
};
pub use session::{ChatSession, SessionReaction, TICKET_SYSTEM_PROMPT};
pub use submission::{
    BoxFuture, CreatedTicket, SubmissionCoordinator, SubmissionRejection, SubmissionState,
    SubmissionTransition, TicketTracker, TrackerCallError, TrackerCallResult,
};
pub use validate::{TicketPayload, ValidationError, ValidationResult, validate_candidate};
