use intake_core::{BoxFuture, CreatedTicket, TicketPayload, TicketTracker, TrackerCallError, TrackerCallResult};
use serde::Deserialize;
use snafu::{ResultExt, ensure};

use crate::error::{
    CreateRejectedSnafu, DecodeResponseSnafu, GraphqlSnafu, HttpSnafu, MissingApiKeySnafu,
    MissingIssueUrlSnafu, MissingTeamIdSnafu, TrackerResult, UnexpectedStatusSnafu,
};

/// Linear's public GraphQL endpoint.
pub const DEFAULT_LINEAR_ENDPOINT: &str = "https://api.linear.app/graphql";

const ISSUE_CREATE_MUTATION: &str = "mutation IssueCreate($input: IssueCreateInput!) { issueCreate(input: $input) { success issue { url } } }";

/// Credentials and routing for one Linear workspace, passed explicitly at
/// construction so the client stays testable without environment coupling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinearConfig {
    pub api_key: String,
    pub team_id: String,
    pub endpoint: String,
}

impl LinearConfig {
    pub fn new(api_key: impl Into<String>, team_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into().trim().to_string(),
            team_id: team_id.into().trim().to_string(),
            endpoint: DEFAULT_LINEAR_ENDPOINT.to_string(),
        }
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into().trim().to_string();
        self
    }
}

/// Issue-creation client for Linear.
///
/// One `createIssue` call per invocation, no internal retry.
#[derive(Debug)]
pub struct LinearClient {
    config: LinearConfig,
    http: reqwest::Client,
}

impl LinearClient {
    pub fn new(config: LinearConfig) -> TrackerResult<Self> {
        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "linear-client-new",
            }
        );
        ensure!(
            !config.team_id.is_empty(),
            MissingTeamIdSnafu {
                stage: "linear-client-new",
            }
        );

        Ok(Self {
            config,
            http: reqwest::Client::new(),
        })
    }

    /// Creates one issue and returns its URL.
    ///
    /// A missing URL on an otherwise successful call is an error, not a
    /// silent success: the caller needs a retrievable reference.
    pub async fn create_issue(&self, payload: &TicketPayload) -> TrackerResult<CreatedTicket> {
        let body = serde_json::json!({
            "query": ISSUE_CREATE_MUTATION,
            "variables": {
                "input": {
                    "teamId": self.config.team_id,
                    "title": payload.title,
                    "description": payload.description,
                }
            }
        });

        let response = self
            .http
            .post(&self.config.endpoint)
            .header(reqwest::header::AUTHORIZATION, &self.config.api_key)
            .json(&body)
            .send()
            .await
            .context(HttpSnafu {
                stage: "send-issue-create",
            })?;

        let status = response.status();
        let text = response.text().await.context(HttpSnafu {
            stage: "read-issue-create",
        })?;

        if !status.is_success() {
            return UnexpectedStatusSnafu {
                stage: "issue-create-status",
                status: status.as_u16(),
                body: text,
            }
            .fail();
        }

        decode_issue_create(&text)
    }
}

impl TicketTracker for LinearClient {
    fn create_ticket<'a>(&'a self, payload: &'a TicketPayload) -> BoxFuture<'a, TrackerCallResult> {
        Box::pin(async move {
            self.create_issue(payload).await.map_err(|error| {
                tracing::warn!(error = %error, "linear issue creation failed");
                TrackerCallError::new(error.to_string())
            })
        })
    }
}

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<IssueCreateData>,
    #[serde(default)]
    errors: Vec<GraphqlErrorEntry>,
}

#[derive(Debug, Deserialize)]
struct GraphqlErrorEntry {
    message: String,
}

#[derive(Debug, Deserialize)]
struct IssueCreateData {
    #[serde(rename = "issueCreate")]
    issue_create: Option<IssueCreatePayload>,
}

#[derive(Debug, Deserialize)]
struct IssueCreatePayload {
    #[serde(default)]
    success: bool,
    issue: Option<IssueRef>,
}

#[derive(Debug, Deserialize)]
struct IssueRef {
    url: Option<String>,
}

/// Decodes an `issueCreate` response body.
///
/// Pure over the body text so the full failure taxonomy is unit-testable
/// without a server.
fn decode_issue_create(body: &str) -> TrackerResult<CreatedTicket> {
    let response: GraphqlResponse = serde_json::from_str(body).context(DecodeResponseSnafu {
        stage: "parse-issue-create",
    })?;

    if !response.errors.is_empty() {
        return GraphqlSnafu {
            stage: "issue-create-errors",
            messages: response
                .errors
                .into_iter()
                .map(|entry| entry.message)
                .collect::<Vec<_>>(),
        }
        .fail();
    }

    let payload = response
        .data
        .and_then(|data| data.issue_create)
        .filter(|payload| payload.success)
        .ok_or_else(|| {
            CreateRejectedSnafu {
                stage: "issue-create-success",
            }
            .build()
        })?;

    match payload.issue.and_then(|issue| issue.url) {
        Some(url) if !url.trim().is_empty() => Ok(CreatedTicket::new(url)),
        _ => MissingIssueUrlSnafu {
            stage: "issue-create-url",
        }
        .fail(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TrackerError;

    #[test]
    fn client_requires_credentials() {
        let error = LinearClient::new(LinearConfig::new("", "team")).unwrap_err();
        assert!(matches!(error, TrackerError::MissingApiKey { .. }));

        let error = LinearClient::new(LinearConfig::new("lin_api_key", "  ")).unwrap_err();
        assert!(matches!(error, TrackerError::MissingTeamId { .. }));

        assert!(LinearClient::new(LinearConfig::new("lin_api_key", "team")).is_ok());
    }

    #[test]
    fn successful_response_yields_the_issue_url() {
        let body = r#"{"data":{"issueCreate":{"success":true,"issue":{"url":"https://linear.app/acme/issue/INT-7"}}}}"#;
        let ticket = decode_issue_create(body).unwrap();
        assert_eq!(ticket.url, "https://linear.app/acme/issue/INT-7");
    }

    #[test]
    fn graphql_errors_are_reported_not_swallowed() {
        let body = r#"{"data":null,"errors":[{"message":"team not found"},{"message":"auth"}]}"#;
        let error = decode_issue_create(body).unwrap_err();
        match error {
            TrackerError::Graphql { messages, .. } => {
                assert_eq!(messages, vec!["team not found", "auth"]);
            }
            other => panic!("expected graphql error, got {other:?}"),
        }
    }

    #[test]
    fn unsuccessful_create_is_an_error() {
        let body = r#"{"data":{"issueCreate":{"success":false,"issue":null}}}"#;
        assert!(matches!(
            decode_issue_create(body).unwrap_err(),
            TrackerError::CreateRejected { .. }
        ));
    }

    #[test]
    fn missing_issue_url_is_an_error() {
        let body = r#"{"data":{"issueCreate":{"success":true,"issue":null}}}"#;
        assert!(matches!(
            decode_issue_create(body).unwrap_err(),
            TrackerError::MissingIssueUrl { .. }
        ));

        let body = r#"{"data":{"issueCreate":{"success":true,"issue":{"url":"  "}}}}"#;
        assert!(matches!(
            decode_issue_create(body).unwrap_err(),
            TrackerError::MissingIssueUrl { .. }
        ));
    }

    #[test]
    fn unparseable_body_is_a_decode_error() {
        assert!(matches!(
            decode_issue_create("<html>gateway timeout</html>").unwrap_err(),
            TrackerError::DecodeResponse { .. }
        ));
    }
}
