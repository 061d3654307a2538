use crate::events::{StreamEventMapped, StreamEventPayload};
use crate::extract::extract_candidate;
use crate::message::{
    Conversation, ConversationId, Message, MessageId, StreamResult, StreamSessionId, StreamTarget,
};
use crate::submission::{SubmissionCoordinator, SubmissionState, TrackerCallResult};
use crate::validate::validate_candidate;

/// System instruction sent as the stream preamble on every request.
///
/// The assistant gathers feature context through clarifying questions and,
/// once ready, emits the marker plus a json fence with exactly `title` and
/// `description`, then asks the user to confirm.
pub const TICKET_SYSTEM_PROMPT: &str = r###"You are a product intake assistant. Your task:
1) Ask clarifying questions to gather feature context, requirements, edge cases and best practices.
2) When ready, emit a JSON string block labeled `TICKET_PAYLOAD` containing `title` (string) and `description` (markdown string).

Example output format when ready to create a ticket:

I've gathered enough information to create a ticket for this feature. Here's what I'll submit:

TICKET_PAYLOAD
```json
{
  "title": "Implement user authentication with social login",
  "description": "## Overview\n\nAdd social login (Google, GitHub) to the authentication flow.\n\n## Requirements\n\n- Support Google and GitHub OAuth\n- Maintain existing email/password login\n- Update user profile with information from social providers"
}
```

Is there anything you'd like to adjust before I create this ticket?
"###;

/// What the caller must do after one stream event has been absorbed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionReaction {
    /// Event absorbed; nothing for the caller to do.
    Handled,
    /// Event discarded as stale or mismatched.
    Ignored,
    /// A validated payload passed the at-most-once gate. State is already
    /// `Submitting`; the caller owns the single tracker call and reports
    /// its outcome via `record_submission_outcome`.
    SubmitTicket(crate::validate::TicketPayload),
}

/// Streaming turn bookkeeping kept outside the domain model.
#[derive(Debug, Clone, Copy)]
struct ActiveTurn {
    target: StreamTarget,
    assistant_message_id: MessageId,
}

/// One chat session: a conversation composed with the ticket pipeline.
///
/// Every transport update is absorbed as one atomic step: append the chunk,
/// re-run extract → validate over the full accumulated text, and consult the
/// submission gate. Extraction and validation failures are logged, never
/// surfaced into the transcript — they usually just mean the payload has not
/// finished streaming.
pub struct ChatSession {
    conversation: Conversation,
    coordinator: SubmissionCoordinator,
    active_turn: Option<ActiveTurn>,
    next_message_id: u64,
    next_session_id: u64,
}

impl ChatSession {
    pub fn new(conversation_id: ConversationId) -> Self {
        Self {
            conversation: Conversation::new(conversation_id),
            coordinator: SubmissionCoordinator::new(),
            active_turn: None,
            next_message_id: 1,
            next_session_id: 1,
        }
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    pub fn messages(&self) -> &[Message] {
        self.conversation.messages()
    }

    pub fn submission_state(&self) -> &SubmissionState {
        self.coordinator.state()
    }

    pub fn is_streaming(&self) -> bool {
        self.conversation.is_streaming()
    }

    pub fn is_submitting(&self) -> bool {
        self.coordinator.state().is_submitting()
    }

    /// URL of the created ticket, once submission has succeeded.
    pub fn ticket_url(&self) -> Option<&str> {
        match self.coordinator.state() {
            SubmissionState::Succeeded(ticket) => Some(ticket.url.as_str()),
            _ => None,
        }
    }

    /// Failure description, once submission has failed.
    pub fn submission_error(&self) -> Option<&str> {
        match self.coordinator.state() {
            SubmissionState::Failed(reason) => Some(reason.as_str()),
            _ => None,
        }
    }

    /// Appends an immutable user message.
    pub fn push_user_message(&mut self, content: impl Into<String>) -> StreamResult<MessageId> {
        let id = self.allocate_message_id();
        self.conversation.push_user(id, content)?;
        Ok(id)
    }

    /// Opens a streaming assistant turn and returns its routing target.
    pub fn begin_assistant_turn(&mut self) -> StreamResult<StreamTarget> {
        let message_id = self.allocate_message_id();
        let session_id = StreamSessionId::new(self.next_session_id);
        let target = StreamTarget::new(self.conversation.id(), session_id);

        self.conversation.begin_stream(message_id, target)?;
        self.next_session_id += 1;
        self.active_turn = Some(ActiveTurn {
            target,
            assistant_message_id: message_id,
        });
        Ok(target)
    }

    /// Absorbs one transport update.
    ///
    /// Deltas grow the streaming message and trigger a full re-scan; `Done`
    /// finalizes the turn (with one last scan); `Error` finalizes the turn
    /// as aborted, which is non-fatal to the conversation. Events for any
    /// other target are discarded.
    pub fn apply_stream_event(&mut self, event: StreamEventMapped) -> SessionReaction {
        match event.payload {
            StreamEventPayload::Delta(chunk) => {
                if let Err(rejection) = self.conversation.append_chunk(event.target, &chunk) {
                    tracing::debug!(?rejection, "discarding stale stream delta");
                    return SessionReaction::Ignored;
                }
                self.scan_for_ticket(event.target)
            }
            StreamEventPayload::Done => {
                if let Err(rejection) = self.conversation.complete_stream(event.target) {
                    tracing::debug!(?rejection, "discarding stale stream completion");
                    return SessionReaction::Ignored;
                }
                let reaction = self.scan_for_ticket(event.target);
                self.active_turn = None;
                reaction
            }
            StreamEventPayload::Error(message) => {
                if let Err(rejection) = self.conversation.fail_stream(event.target, &message) {
                    tracing::debug!(?rejection, "discarding stale stream error");
                    return SessionReaction::Ignored;
                }
                tracing::warn!(error = %message, "assistant stream aborted");
                self.active_turn = None;
                SessionReaction::Handled
            }
        }
    }

    /// Reports the outcome of the single tracker call back into the state
    /// machine.
    pub fn record_submission_outcome(&mut self, outcome: TrackerCallResult) {
        let result = match outcome {
            Ok(ticket) => {
                tracing::info!(url = %ticket.url, "ticket created");
                self.coordinator.record_success(ticket)
            }
            Err(error) => {
                tracing::warn!(error = %error, "ticket submission failed");
                self.coordinator.record_failure(error.message)
            }
        };

        if let Err(rejection) = result {
            tracing::error!(?rejection, "submission outcome arrived without an in-flight submission");
        }
    }

    fn scan_for_ticket(&mut self, target: StreamTarget) -> SessionReaction {
        // Cheap pre-check: once the single attempt is spent, re-scans are
        // pointless and the gate would reject them anyway.
        if !self.coordinator.can_begin() {
            return SessionReaction::Handled;
        }

        let Some(turn) = self.active_turn else {
            return SessionReaction::Handled;
        };
        if turn.target != target {
            return SessionReaction::Handled;
        }

        let Some(content) = self.conversation.message_content(turn.assistant_message_id) else {
            return SessionReaction::Handled;
        };
        let Some(candidate) = extract_candidate(content) else {
            return SessionReaction::Handled;
        };

        let payload = match validate_candidate(candidate) {
            Ok(payload) => payload,
            Err(error) => {
                // Often just a fence that closed around a still-growing
                // payload; silent toward the transcript.
                tracing::debug!(error = %error, "ticket candidate rejected");
                return SessionReaction::Handled;
            }
        };

        match self.coordinator.begin(payload.clone()) {
            Ok(()) => SessionReaction::SubmitTicket(payload),
            Err(rejection) => {
                tracing::debug!(?rejection, "validated payload discarded by submission gate");
                SessionReaction::Handled
            }
        }
    }

    fn allocate_message_id(&mut self) -> MessageId {
        let id = MessageId::new(self.next_message_id);
        self.next_message_id += 1;
        id
    }
}
