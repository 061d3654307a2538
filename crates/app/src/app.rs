use std::sync::Arc;

use intake_core::{
    ChatSession, ConversationId, MessageStatus, SessionReaction, StreamEventMapped,
    StreamEventPayload, StreamRejection, TICKET_SYSTEM_PROMPT, TicketTracker,
};
use intake_llm::{LlmProvider, ProviderError, ProviderMessage, ProviderStreamHandle, StreamRequest};
use snafu::Snafu;
use tokio::sync::mpsc;

use crate::render::TranscriptEcho;

#[derive(Debug, Snafu)]
pub enum AppError {
    #[snafu(display("conversation rejected the turn: {rejection:?}"))]
    TurnRejected {
        stage: &'static str,
        rejection: StreamRejection,
    },
    #[snafu(display("provider failed on `{stage}`, {source}"))]
    Provider {
        stage: &'static str,
        source: ProviderError,
    },
}

pub type AppResult<T> = Result<T, AppError>;

/// Presentation boundary for one turn.
///
/// The turn loop reports everything user-visible through this seam;
/// extraction/validation noise never reaches it.
pub trait TurnSink {
    fn assistant_text(&mut self, text: &str);
    fn ticket_prepared(&mut self);
    fn ticket_created(&mut self, url: &str);
    fn submission_failed(&mut self, reason: &str);
    fn stream_failed(&mut self, reason: &str);
}

/// One interactive chat bound to a provider and a tracker.
pub struct App {
    session: ChatSession,
    provider: Arc<dyn LlmProvider>,
    tracker: Arc<dyn TicketTracker>,
    model_id: String,
}

impl App {
    pub fn new(
        provider: Arc<dyn LlmProvider>,
        tracker: Arc<dyn TicketTracker>,
        model_id: impl Into<String>,
    ) -> Self {
        Self {
            session: ChatSession::new(ConversationId::new(1)),
            provider,
            tracker,
            model_id: model_id.into(),
        }
    }

    pub fn session(&self) -> &ChatSession {
        &self.session
    }

    /// Runs one full turn: user message, assistant stream, and - when the
    /// session admits a payload - the single tracker call.
    ///
    /// Stream events keep flowing while the tracker call is outstanding;
    /// nothing ever waits on extraction, validation, or submission.
    pub async fn run_turn(&mut self, input: &str, sink: &mut dyn TurnSink) -> AppResult<()> {
        self.session
            .push_user_message(input)
            .map_err(|rejection| AppError::TurnRejected {
                stage: "push-user-message",
                rejection,
            })?;

        // Snapshot the transcript before the placeholder joins it.
        let history = transcript_messages(&self.session);

        let target = self
            .session
            .begin_assistant_turn()
            .map_err(|rejection| AppError::TurnRejected {
                stage: "begin-assistant-turn",
                rejection,
            })?;

        let request = StreamRequest::new(target, &self.model_id, history)
            .with_preamble(TICKET_SYSTEM_PROMPT);
        let ProviderStreamHandle { mut stream, worker } = match self.provider.stream_chat(request)
        {
            Ok(handle) => handle,
            Err(error) => {
                // The turn already opened a stream; close it as aborted so
                // the conversation stays usable after the provider refusal.
                self.session.apply_stream_event(StreamEventMapped::new(
                    target,
                    StreamEventPayload::Error(error.to_string()),
                ));
                sink.stream_failed(&error.to_string());
                return Err(AppError::Provider {
                    stage: "stream-chat",
                    source: error,
                });
            }
        };
        let worker_task = tokio::spawn(worker);

        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel();
        let mut echo = TranscriptEcho::new();
        let mut stream_open = true;
        let mut submission_inflight = false;

        while stream_open || submission_inflight {
            tokio::select! {
                event = stream.recv(), if stream_open => {
                    let Some(event) = event else {
                        stream_open = false;
                        let tail = echo.finish();
                        if !tail.is_empty() {
                            sink.assistant_text(&tail);
                        }
                        continue;
                    };

                    match &event.payload {
                        StreamEventPayload::Delta(chunk) => {
                            let out = echo.push(chunk);
                            if !out.visible.is_empty() {
                                sink.assistant_text(&out.visible);
                            }
                            if out.prepared {
                                sink.ticket_prepared();
                            }
                        }
                        StreamEventPayload::Error(reason) => sink.stream_failed(reason),
                        StreamEventPayload::Done => {}
                    }

                    if let SessionReaction::SubmitTicket(payload) =
                        self.session.apply_stream_event(event)
                    {
                        submission_inflight = true;
                        let tracker = Arc::clone(&self.tracker);
                        let outcome_tx = outcome_tx.clone();
                        tokio::spawn(async move {
                            let outcome = tracker.create_ticket(&payload).await;
                            let _ = outcome_tx.send(outcome);
                        });
                    }
                }
                Some(outcome) = outcome_rx.recv(), if submission_inflight => {
                    submission_inflight = false;
                    match &outcome {
                        Ok(ticket) => sink.ticket_created(&ticket.url),
                        Err(error) => sink.submission_failed(&error.message),
                    }
                    self.session.record_submission_outcome(outcome);
                }
            }
        }

        let _ = worker_task.await;
        Ok(())
    }
}

/// Settled transcript turns in the shape the backend expects.
fn transcript_messages(session: &ChatSession) -> Vec<ProviderMessage> {
    session
        .messages()
        .iter()
        .filter(|message| !matches!(message.status, MessageStatus::Streaming(_)))
        .map(|message| ProviderMessage::new(message.role, message.content.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use intake_core::{
        BoxFuture, CreatedTicket, StreamEventMapped, SubmissionState, TicketPayload,
        TrackerCallError, TrackerCallResult,
    };
    use intake_llm::{ProviderResult, ProviderWorker, make_event_stream};

    const STREAM: &str = "Let's talk.\nTICKET_PAYLOAD\n```json\n{\"title\":\"Add dark mode\",\"description\":\"Users want a dark theme.\"}\n```\nIs there anything you'd like to adjust?";

    /// Provider double replaying a fixed chunk script for every request.
    struct ScriptedProvider {
        chunks: Vec<String>,
    }

    impl ScriptedProvider {
        fn replaying(text: &str, chunk_size: usize) -> Self {
            let mut chunks = Vec::new();
            let mut current = String::new();
            for ch in text.chars() {
                current.push(ch);
                if current.len() >= chunk_size {
                    chunks.push(std::mem::take(&mut current));
                }
            }
            if !current.is_empty() {
                chunks.push(current);
            }
            Self { chunks }
        }
    }

    impl LlmProvider for ScriptedProvider {
        fn id(&self) -> &str {
            "scripted"
        }

        fn name(&self) -> &str {
            "Scripted"
        }

        fn default_model(&self) -> &str {
            "scripted-model"
        }

        fn stream_chat(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle> {
            let (event_tx, stream, _cancel_rx) = make_event_stream(request.target);
            let target = request.target;
            let chunks = self.chunks.clone();
            let worker: ProviderWorker = Box::pin(async move {
                for chunk in chunks {
                    let _ = event_tx.send(StreamEventMapped::new(
                        target,
                        StreamEventPayload::Delta(chunk),
                    ));
                }
                let _ = event_tx.send(StreamEventMapped::new(target, StreamEventPayload::Done));
            });
            Ok(ProviderStreamHandle { stream, worker })
        }
    }

    /// Tracker double counting every create call.
    struct CountingTracker {
        calls: AtomicUsize,
        outcome: TrackerCallResult,
    }

    impl CountingTracker {
        fn succeeding(url: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                outcome: Ok(CreatedTicket::new(url)),
            }
        }

        fn failing(reason: &str) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                outcome: Err(TrackerCallError::new(reason)),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl TicketTracker for CountingTracker {
        fn create_ticket<'a>(
            &'a self,
            _payload: &'a TicketPayload,
        ) -> BoxFuture<'a, TrackerCallResult> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let outcome = self.outcome.clone();
            Box::pin(async move { outcome })
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        text: String,
        prepared: usize,
        created: Vec<String>,
        failed: Vec<String>,
        stream_failures: Vec<String>,
    }

    impl TurnSink for RecordingSink {
        fn assistant_text(&mut self, text: &str) {
            self.text.push_str(text);
        }

        fn ticket_prepared(&mut self) {
            self.prepared += 1;
        }

        fn ticket_created(&mut self, url: &str) {
            self.created.push(url.to_string());
        }

        fn submission_failed(&mut self, reason: &str) {
            self.failed.push(reason.to_string());
        }

        fn stream_failed(&mut self, reason: &str) {
            self.stream_failures.push(reason.to_string());
        }
    }

    #[tokio::test]
    async fn one_turn_creates_exactly_one_ticket() {
        let provider = Arc::new(ScriptedProvider::replaying(STREAM, 7));
        let tracker = Arc::new(CountingTracker::succeeding(
            "https://linear.app/acme/issue/INT-7",
        ));
        let mut app = App::new(provider, Arc::clone(&tracker) as Arc<dyn TicketTracker>, "gpt-4o");

        let mut sink = RecordingSink::default();
        app.run_turn("We need dark mode", &mut sink).await.unwrap();

        assert_eq!(tracker.calls(), 1);
        assert_eq!(sink.prepared, 1);
        assert_eq!(sink.created, vec!["https://linear.app/acme/issue/INT-7"]);
        assert_eq!(sink.text, "Let's talk.\n");
        assert_eq!(
            app.session().ticket_url(),
            Some("https://linear.app/acme/issue/INT-7")
        );
    }

    #[tokio::test]
    async fn a_second_identical_turn_does_not_resubmit() {
        let provider = Arc::new(ScriptedProvider::replaying(STREAM, 11));
        let tracker = Arc::new(CountingTracker::succeeding("https://linear.app/issue/1"));
        let mut app = App::new(provider, Arc::clone(&tracker) as Arc<dyn TicketTracker>, "gpt-4o");

        let mut sink = RecordingSink::default();
        app.run_turn("We need dark mode", &mut sink).await.unwrap();
        app.run_turn("Repeat that please", &mut sink).await.unwrap();

        assert_eq!(tracker.calls(), 1);
        assert_eq!(sink.created.len(), 1);
        assert!(matches!(
            app.session().submission_state(),
            SubmissionState::Succeeded(_)
        ));
    }

    #[tokio::test]
    async fn failed_submission_is_reported_and_never_retried() {
        let provider = Arc::new(ScriptedProvider::replaying(STREAM, 9));
        let tracker = Arc::new(CountingTracker::failing("tracker returned 500"));
        let mut app = App::new(provider, Arc::clone(&tracker) as Arc<dyn TicketTracker>, "gpt-4o");

        let mut sink = RecordingSink::default();
        app.run_turn("We need dark mode", &mut sink).await.unwrap();
        assert_eq!(sink.failed, vec!["tracker returned 500"]);
        assert_eq!(app.session().submission_error(), Some("tracker returned 500"));

        app.run_turn("Try again", &mut sink).await.unwrap();
        assert_eq!(tracker.calls(), 1, "failed attempts must not retry");
    }

    #[tokio::test]
    async fn plain_conversation_touches_neither_tracker_nor_notice() {
        let provider = Arc::new(ScriptedProvider::replaying(
            "What platforms should dark mode cover?",
            5,
        ));
        let tracker = Arc::new(CountingTracker::succeeding("https://unused"));
        let mut app = App::new(provider, Arc::clone(&tracker) as Arc<dyn TicketTracker>, "gpt-4o");

        let mut sink = RecordingSink::default();
        app.run_turn("We need dark mode", &mut sink).await.unwrap();

        assert_eq!(tracker.calls(), 0);
        assert_eq!(sink.prepared, 0);
        assert_eq!(sink.text, "What platforms should dark mode cover?");
        assert_eq!(app.session().submission_state(), &SubmissionState::Idle);
    }

    #[tokio::test]
    async fn refused_stream_open_does_not_wedge_the_conversation() {
        /// Provider whose `stream_chat` always refuses.
        struct RefusingProvider;

        impl LlmProvider for RefusingProvider {
            fn id(&self) -> &str {
                "refusing"
            }

            fn name(&self) -> &str {
                "Refusing"
            }

            fn default_model(&self) -> &str {
                "refusing-model"
            }

            fn stream_chat(&self, _request: StreamRequest) -> ProviderResult<ProviderStreamHandle> {
                Err(ProviderError::MissingApiKey {
                    stage: "stream-chat",
                    provider_id: "refusing".to_string(),
                })
            }
        }

        let tracker = Arc::new(CountingTracker::succeeding("https://unused"));
        let mut app = App::new(
            Arc::new(RefusingProvider),
            Arc::clone(&tracker) as Arc<dyn TicketTracker>,
            "gpt-4o",
        );

        let mut sink = RecordingSink::default();
        let first = app.run_turn("hello", &mut sink).await;
        assert!(matches!(
            first,
            Err(AppError::Provider {
                stage: "stream-chat",
                ..
            })
        ));
        assert_eq!(sink.stream_failures.len(), 1);
        assert!(!app.session().is_streaming());

        // The next turn must be admitted again, failing at the provider
        // rather than on a stuck stream phase.
        let second = app.run_turn("still there?", &mut sink).await;
        assert!(matches!(
            second,
            Err(AppError::Provider {
                stage: "stream-chat",
                ..
            })
        ));
        assert_eq!(tracker.calls(), 0);
    }

    #[tokio::test]
    async fn aborted_stream_reports_failure_but_keeps_the_session_usable() {
        /// Provider that streams a little prose and then aborts.
        struct AbortingProvider;

        impl LlmProvider for AbortingProvider {
            fn id(&self) -> &str {
                "aborting"
            }

            fn name(&self) -> &str {
                "Aborting"
            }

            fn default_model(&self) -> &str {
                "aborting-model"
            }

            fn stream_chat(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle> {
                let (event_tx, stream, _cancel_rx) = make_event_stream(request.target);
                let target = request.target;
                let worker: ProviderWorker = Box::pin(async move {
                    let _ = event_tx.send(StreamEventMapped::new(
                        target,
                        StreamEventPayload::Delta("Thinking".to_string()),
                    ));
                    let _ = event_tx.send(StreamEventMapped::new(
                        target,
                        StreamEventPayload::Error("connection reset".to_string()),
                    ));
                });
                Ok(ProviderStreamHandle { stream, worker })
            }
        }

        let tracker = Arc::new(CountingTracker::succeeding("https://unused"));
        let mut app = App::new(
            Arc::new(AbortingProvider),
            Arc::clone(&tracker) as Arc<dyn TicketTracker>,
            "gpt-4o",
        );

        let mut sink = RecordingSink::default();
        app.run_turn("hello", &mut sink).await.unwrap();

        assert_eq!(sink.stream_failures, vec!["connection reset"]);
        assert_eq!(tracker.calls(), 0);
        assert!(!app.session().is_streaming());

        // The conversation is still usable after the abort.
        let follow_up = app.run_turn("still there?", &mut sink).await;
        assert!(follow_up.is_ok());
    }
}
