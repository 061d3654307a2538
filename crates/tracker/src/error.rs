use snafu::Snafu;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum TrackerError {
    #[snafu(display("tracker API key is not configured"))]
    MissingApiKey { stage: &'static str },
    #[snafu(display("tracker team id is not configured"))]
    MissingTeamId { stage: &'static str },
    #[snafu(display("tracker request failed on `{stage}`, {source}"))]
    Http {
        stage: &'static str,
        source: reqwest::Error,
    },
    #[snafu(display("tracker endpoint returned status {status}: {body}"))]
    UnexpectedStatus {
        stage: &'static str,
        status: u16,
        body: String,
    },
    #[snafu(display("failed to decode tracker response: {source}"))]
    DecodeResponse {
        stage: &'static str,
        source: serde_json::Error,
    },
    #[snafu(display("tracker reported errors: {}", messages.join("; ")))]
    Graphql {
        stage: &'static str,
        messages: Vec<String>,
    },
    #[snafu(display("tracker refused to create the issue"))]
    CreateRejected { stage: &'static str },
    #[snafu(display("tracker created the issue but returned no URL"))]
    MissingIssueUrl { stage: &'static str },
}

pub type TrackerResult<T> = Result<T, TrackerError>;
