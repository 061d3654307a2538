/// Stable identifier for one conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationId(pub u64);

impl ConversationId {
    /// Creates a typed conversation identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Stable identifier for one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub u64);

impl MessageId {
    /// Creates a typed message identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Identifier for one streaming assistant turn.
///
/// This must change on every turn so stale chunks can be rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamSessionId(pub u64);

impl StreamSessionId {
    /// Creates a typed stream session identifier.
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

/// Stream routing key used for stale-chunk rejection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StreamTarget {
    pub conversation_id: ConversationId,
    pub session_id: StreamSessionId,
}

impl StreamTarget {
    /// Builds a full stream target from conversation and session IDs.
    pub const fn new(conversation_id: ConversationId, session_id: StreamSessionId) -> Self {
        Self {
            conversation_id,
            session_id,
        }
    }
}

/// Chat speaker role.
///
/// There is no system role: the system instruction travels as the stream
/// request preamble and never enters the transcript.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    User,
    Assistant,
}

/// Lifecycle status for one message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageStatus {
    Streaming(StreamSessionId),
    Done,
    Error(String),
}

/// One transcript entry.
///
/// User content is immutable after creation. Assistant content grows only by
/// appending while its status is `Streaming`; it is never shortened and its
/// already-emitted prefix is never rewritten.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub status: MessageStatus,
}

impl Message {
    /// Creates a completed user message.
    pub fn user(id: MessageId, content: impl Into<String>) -> Self {
        Self {
            id,
            role: Role::User,
            content: content.into(),
            status: MessageStatus::Done,
        }
    }

    /// Creates an empty assistant placeholder bound to a streaming session.
    pub fn assistant_streaming(id: MessageId, session_id: StreamSessionId) -> Self {
        Self {
            id,
            role: Role::Assistant,
            content: String::new(),
            status: MessageStatus::Streaming(session_id),
        }
    }
}

/// Stream lifecycle phase for one conversation.
///
/// At most one assistant stream is live at a time; terminal phases keep the
/// target so late events can be attributed in logs.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum StreamPhase {
    #[default]
    Idle,
    Streaming(StreamTarget),
    Done(StreamTarget),
    Failed {
        target: StreamTarget,
        message: String,
    },
}

impl StreamPhase {
    /// Returns true when incoming stream data matches the active session.
    pub fn accepts(&self, target: StreamTarget) -> bool {
        matches!(self, Self::Streaming(active) if *active == target)
    }
}

/// Rejection reason for illegal conversation operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamRejection {
    StreamInProgress {
        active: StreamTarget,
    },
    NoActiveStream,
    TargetMismatch {
        active: StreamTarget,
        attempted: StreamTarget,
    },
}

/// Result type for conversation stream operations.
pub type StreamResult<T> = Result<T, StreamRejection>;

/// Conversation aggregate root.
///
/// The message list is append-only and never reordered. The only mutation of
/// an existing message is content growth of the currently-streaming assistant
/// message, so every observation of that message is a prefix-extension of the
/// previous one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Conversation {
    id: ConversationId,
    messages: Vec<Message>,
    stream_phase: StreamPhase,
}

impl Conversation {
    /// Creates an empty conversation in idle phase.
    pub fn new(id: ConversationId) -> Self {
        Self {
            id,
            messages: Vec::new(),
            stream_phase: StreamPhase::Idle,
        }
    }

    pub fn id(&self) -> ConversationId {
        self.id
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn stream_phase(&self) -> &StreamPhase {
        &self.stream_phase
    }

    pub fn is_streaming(&self) -> bool {
        matches!(self.stream_phase, StreamPhase::Streaming(_))
    }

    /// Returns the content of the message with the given id, if present.
    pub fn message_content(&self, id: MessageId) -> Option<&str> {
        self.messages
            .iter()
            .find(|message| message.id == id)
            .map(|message| message.content.as_str())
    }

    /// Appends a user message. Rejected while an assistant stream is live so
    /// one update is always fully processed before the next turn starts.
    pub fn push_user(&mut self, id: MessageId, content: impl Into<String>) -> StreamResult<()> {
        if let StreamPhase::Streaming(active) = self.stream_phase {
            return Err(StreamRejection::StreamInProgress { active });
        }

        self.messages.push(Message::user(id, content));
        Ok(())
    }

    /// Opens a streaming assistant turn and appends its placeholder message.
    pub fn begin_stream(&mut self, message_id: MessageId, target: StreamTarget) -> StreamResult<()> {
        if let StreamPhase::Streaming(active) = self.stream_phase {
            return Err(StreamRejection::StreamInProgress { active });
        }

        self.messages
            .push(Message::assistant_streaming(message_id, target.session_id));
        self.stream_phase = StreamPhase::Streaming(target);
        Ok(())
    }

    /// Appends one chunk to the streaming assistant message.
    ///
    /// Chunks for any other target are rejected, which is what makes stale
    /// events from an abandoned stream harmless.
    pub fn append_chunk(&mut self, target: StreamTarget, chunk: &str) -> StreamResult<()> {
        self.check_active(target)?;

        let message = self
            .streaming_message_mut(target.session_id)
            .ok_or(StreamRejection::NoActiveStream)?;
        message.content.push_str(chunk);
        Ok(())
    }

    /// Marks the streaming turn as finished normally.
    pub fn complete_stream(&mut self, target: StreamTarget) -> StreamResult<()> {
        self.check_active(target)?;

        if let Some(message) = self.streaming_message_mut(target.session_id) {
            message.status = MessageStatus::Done;
        }
        self.stream_phase = StreamPhase::Done(target);
        Ok(())
    }

    /// Marks the streaming turn as aborted.
    ///
    /// The partial content already received stays in the transcript; the
    /// conversation remains usable for further turns.
    pub fn fail_stream(&mut self, target: StreamTarget, message: impl Into<String>) -> StreamResult<()> {
        self.check_active(target)?;

        let message = message.into();
        if let Some(streaming) = self.streaming_message_mut(target.session_id) {
            streaming.status = MessageStatus::Error(message.clone());
        }
        self.stream_phase = StreamPhase::Failed { target, message };
        Ok(())
    }

    fn check_active(&self, target: StreamTarget) -> StreamResult<()> {
        match self.stream_phase {
            StreamPhase::Streaming(active) if active == target => Ok(()),
            StreamPhase::Streaming(active) => Err(StreamRejection::TargetMismatch {
                active,
                attempted: target,
            }),
            StreamPhase::Idle | StreamPhase::Done(_) | StreamPhase::Failed { .. } => {
                Err(StreamRejection::NoActiveStream)
            }
        }
    }

    fn streaming_message_mut(&mut self, session_id: StreamSessionId) -> Option<&mut Message> {
        self.messages
            .iter_mut()
            .rev()
            .find(|message| message.status == MessageStatus::Streaming(session_id))
    }
}
