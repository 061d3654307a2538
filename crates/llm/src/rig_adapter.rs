use futures::StreamExt;
use intake_core::{Role, StreamEventMapped, StreamEventPayload, StreamTarget};
use rig::completion::{CompletionModel, Message as RigMessage};
use rig::prelude::CompletionClient;
use rig::providers::openai;
use rig::streaming::StreamedAssistantContent;
use snafu::{ResultExt, ensure};
use tokio::sync::{mpsc, oneshot};

use super::provider::{
    CompletionsFailedSnafu, DEFAULT_OPENAI_MODEL, EmptyMessageSetSnafu, HttpClientSnafu,
    LlmProvider, MissingApiKeySnafu, ProviderConfig, ProviderError, ProviderResult,
    ProviderStreamHandle, ProviderWorker, StreamRequest, make_event_stream,
};

pub const RIG_OPENAI_PROVIDER_ID: &str = "openai";

type RigStreamingResponse = rig::streaming::StreamingCompletionResponse<
    rig::providers::openai::responses_api::streaming::StreamingCompletionResponse,
>;

/// OpenAI-compatible transport adapter over rig's streaming completion API.
#[derive(Debug)]
pub struct RigProviderAdapter {
    config: ProviderConfig,
}

impl RigProviderAdapter {
    pub fn new(config: ProviderConfig) -> ProviderResult<Self> {
        ensure!(
            !config.api_key.is_empty(),
            MissingApiKeySnafu {
                stage: "rig-adapter-new",
                provider_id: config.provider_id.clone(),
            }
        );

        Ok(Self { config })
    }

    fn build_client(config: &ProviderConfig) -> ProviderResult<openai::Client> {
        let mut builder = openai::Client::builder().api_key(config.api_key.as_str());
        if !config.endpoint.is_empty() {
            builder = builder.base_url(config.endpoint.as_str());
        }
        builder.build().context(HttpClientSnafu {
            stage: "build-client",
        })
    }

    fn to_rig_message(message: &super::provider::ProviderMessage) -> RigMessage {
        match message.role {
            Role::User => RigMessage::user(message.content.clone()),
            Role::Assistant => RigMessage::assistant(message.content.clone()),
        }
    }

    async fn open_stream(
        config: &ProviderConfig,
        request: &StreamRequest,
    ) -> ProviderResult<RigStreamingResponse> {
        let client = Self::build_client(config)?;
        let model = client.completion_model(request.model_id.clone());

        let mut messages = request
            .messages
            .iter()
            .map(Self::to_rig_message)
            .collect::<Vec<_>>();

        let Some(prompt) = messages.pop() else {
            return EmptyMessageSetSnafu {
                stage: "open-stream-pop-prompt",
                target: request.target,
            }
            .fail();
        };
        let mut builder = model.completion_request(prompt).messages(messages);

        if let Some(preamble) = &request.preamble
            && !preamble.trim().is_empty()
        {
            builder = builder.preamble(preamble.clone());
        }

        if let Some(temperature) = request.temperature {
            builder = builder.temperature(temperature);
        }

        if let Some(max_tokens) = request.max_tokens {
            builder = builder.max_tokens(max_tokens);
        }

        builder.stream().await.context(CompletionsFailedSnafu {
            stage: "open-stream",
        })
    }

    fn emit_error_event(
        event_tx: &mpsc::UnboundedSender<StreamEventMapped>,
        target: StreamTarget,
        error: ProviderError,
    ) {
        let _ = event_tx.send(StreamEventMapped::new(
            target,
            StreamEventPayload::Error(error.to_string()),
        ));
    }

    fn map_stream_item<R>(
        target: StreamTarget,
        item: StreamedAssistantContent<R>,
    ) -> Option<StreamEventMapped>
    where
        R: Clone + Unpin,
    {
        match item {
            StreamedAssistantContent::Text(text) => Some(StreamEventMapped::new(
                target,
                StreamEventPayload::Delta(text.text),
            )),
            // Only transcript text matters here; reasoning and tool traffic
            // never reach the conversation.
            StreamedAssistantContent::Reasoning(_)
            | StreamedAssistantContent::ReasoningDelta { .. }
            | StreamedAssistantContent::ToolCall { .. }
            | StreamedAssistantContent::ToolCallDelta { .. }
            | StreamedAssistantContent::Final(_) => None,
        }
    }

    async fn run_stream_worker(
        config: ProviderConfig,
        request: StreamRequest,
        event_tx: mpsc::UnboundedSender<StreamEventMapped>,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        let target = request.target;
        let mut stream = match Self::open_stream(&config, &request).await {
            Ok(stream) => stream,
            Err(error) => {
                tracing::error!(
                    target = ?target,
                    provider_id = %config.provider_id,
                    model_id = %request.model_id,
                    error = %error,
                    "failed to open provider stream"
                );
                Self::emit_error_event(&event_tx, target, error);
                return;
            }
        };

        let mut cancelled = false;
        let mut stream_failed = false;

        loop {
            tokio::select! {
                _ = &mut cancel_rx => {
                    cancelled = true;
                    // Cancel the upstream rig stream so provider IO stops promptly.
                    tracing::debug!(target = ?target, "provider stream cancelled");
                    stream.cancel();
                    break;
                }
                next_item = stream.next() => {
                    match next_item {
                        Some(Ok(item)) => {
                            if let Some(mapped) = Self::map_stream_item(target, item)
                                && event_tx.send(mapped).is_err()
                            {
                                return;
                            }
                        }
                        Some(Err(source)) => {
                            stream_failed = true;
                            tracing::warn!(
                                target = ?target,
                                error = %source,
                                "provider stream emitted an error chunk"
                            );
                            let error = ProviderError::CompletionsFailed {
                                stage: "stream-chunk",
                                source,
                            };
                            Self::emit_error_event(&event_tx, target, error);
                            break;
                        }
                        None => break,
                    }
                }
            }
        }

        if !cancelled && !stream_failed {
            let _ = event_tx.send(StreamEventMapped::new(target, StreamEventPayload::Done));
        }
    }
}

impl LlmProvider for RigProviderAdapter {
    fn id(&self) -> &str {
        &self.config.provider_id
    }

    fn name(&self) -> &str {
        "Rig OpenAI"
    }

    fn default_model(&self) -> &str {
        self.config
            .default_model
            .as_deref()
            .unwrap_or(DEFAULT_OPENAI_MODEL)
    }

    fn stream_chat(&self, request: StreamRequest) -> ProviderResult<ProviderStreamHandle> {
        ensure!(
            !request.messages.is_empty(),
            EmptyMessageSetSnafu {
                stage: "stream-chat",
                target: request.target,
            }
        );

        let (event_tx, stream, cancel_rx) = make_event_stream(request.target);
        let worker: ProviderWorker = Box::pin(Self::run_stream_worker(
            self.config.clone(),
            request,
            event_tx,
            cancel_rx,
        ));

        Ok(ProviderStreamHandle { stream, worker })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn adapter_rejects_an_empty_api_key() {
        let config = ProviderConfig::new("openai", "   ", "", None);
        let error = RigProviderAdapter::new(config).unwrap_err();
        assert!(matches!(error, ProviderError::MissingApiKey { .. }));
    }

    #[test]
    fn default_model_falls_back_when_unset() {
        let adapter =
            RigProviderAdapter::new(ProviderConfig::new("openai", "sk-test", "", None)).unwrap();
        assert_eq!(adapter.default_model(), DEFAULT_OPENAI_MODEL);

        let adapter = RigProviderAdapter::new(ProviderConfig::new(
            "openai",
            "sk-test",
            "",
            Some("gpt-4o-mini".to_string()),
        ))
        .unwrap();
        assert_eq!(adapter.default_model(), "gpt-4o-mini");
    }
}
