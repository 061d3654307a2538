use std::future::Future;
use std::pin::Pin;

use snafu::Snafu;

use crate::validate::TicketPayload;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Reference returned by the tracker after a successful create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatedTicket {
    pub url: String,
}

impl CreatedTicket {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

/// Flattened tracker failure crossing the collaborator boundary.
///
/// Concrete tracker clients keep their own rich error taxonomy and collapse
/// it to a message here, the same way transport errors collapse into stream
/// error events.
#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
#[snafu(display("ticket tracker call failed: {message}"))]
pub struct TrackerCallError {
    pub message: String,
}

impl TrackerCallError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

pub type TrackerCallResult = Result<CreatedTicket, TrackerCallError>;

/// External ticket-creation collaborator.
///
/// Invoked at most once per conversation, with no internal retry; timeouts
/// are the implementor's concern. Credentials are constructor state of the
/// implementor, never ambient environment reads at call time.
pub trait TicketTracker: Send + Sync {
    fn create_ticket<'a>(&'a self, payload: &'a TicketPayload) -> BoxFuture<'a, TrackerCallResult>;
}

/// Submission lifecycle for one conversation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SubmissionState {
    #[default]
    Idle,
    Submitting(TicketPayload),
    Succeeded(CreatedTicket),
    Failed(String),
}

/// State transition input for the submission lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionTransition {
    Begin(TicketPayload),
    Succeed(CreatedTicket),
    Fail(String),
}

/// Rejection reason for illegal submission transitions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmissionRejection {
    /// `Begin` while a submission is in flight or already resolved.
    AlreadyStarted,
    /// `Begin` after this conversation used its single attempt, whatever the
    /// attempt's outcome was.
    AttemptExhausted,
    /// Terminal transition without an in-flight submission.
    NoSubmissionInFlight,
}

pub type SubmissionTransitionResult = Result<SubmissionState, SubmissionRejection>;

impl SubmissionState {
    pub fn is_submitting(&self) -> bool {
        matches!(self, Self::Submitting(_))
    }

    /// Applies one transition deterministically.
    ///
    /// `Begin` is only legal from `Idle`; `Succeed`/`Fail` only while
    /// `Submitting`. Transitions are one-directional: no state ever returns
    /// to `Idle`.
    pub fn apply(&self, transition: SubmissionTransition) -> SubmissionTransitionResult {
        match transition {
            SubmissionTransition::Begin(payload) => match self {
                Self::Idle => Ok(Self::Submitting(payload)),
                Self::Submitting(_) | Self::Succeeded(_) | Self::Failed(_) => {
                    Err(SubmissionRejection::AlreadyStarted)
                }
            },
            SubmissionTransition::Succeed(ticket) => match self {
                Self::Submitting(_) => Ok(Self::Succeeded(ticket)),
                Self::Idle | Self::Succeeded(_) | Self::Failed(_) => {
                    Err(SubmissionRejection::NoSubmissionInFlight)
                }
            },
            SubmissionTransition::Fail(reason) => match self {
                Self::Submitting(_) => Ok(Self::Failed(reason)),
                Self::Idle | Self::Succeeded(_) | Self::Failed(_) => {
                    Err(SubmissionRejection::NoSubmissionInFlight)
                }
            },
        }
    }
}

/// At-most-once gatekeeper for ticket creation.
///
/// The monotonic `has_ever_submitted` flag is deliberately separate from the
/// current state value: the extractor/validator pipeline keeps producing
/// validated payloads from re-scans long after the fence settles, and every
/// one of them must stay inert once a `Begin` has ever happened — including
/// after `Failed`, which never auto-retries.
#[derive(Debug, Clone, Default)]
pub struct SubmissionCoordinator {
    state: SubmissionState,
    has_ever_submitted: bool,
}

impl SubmissionCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &SubmissionState {
        &self.state
    }

    pub fn has_ever_submitted(&self) -> bool {
        self.has_ever_submitted
    }

    /// Returns true when a `begin` call would currently be admitted.
    pub fn can_begin(&self) -> bool {
        !self.has_ever_submitted && matches!(self.state, SubmissionState::Idle)
    }

    /// Claims the conversation's single submission attempt.
    ///
    /// On success the caller owns exactly one tracker call and must report
    /// its outcome via `record_success` or `record_failure`.
    pub fn begin(&mut self, payload: TicketPayload) -> Result<(), SubmissionRejection> {
        if self.has_ever_submitted {
            return Err(SubmissionRejection::AttemptExhausted);
        }

        self.state = self.state.apply(SubmissionTransition::Begin(payload))?;
        self.has_ever_submitted = true;
        Ok(())
    }

    pub fn record_success(&mut self, ticket: CreatedTicket) -> Result<(), SubmissionRejection> {
        self.state = self.state.apply(SubmissionTransition::Succeed(ticket))?;
        Ok(())
    }

    pub fn record_failure(
        &mut self,
        reason: impl Into<String>,
    ) -> Result<(), SubmissionRejection> {
        self.state = self.state.apply(SubmissionTransition::Fail(reason.into()))?;
        Ok(())
    }
}
