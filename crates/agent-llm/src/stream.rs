//! Streaming completion events

use futures::StreamExt;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};

use crate::{CompletionResponse, LLMError, Message, Result, StopReason, TokenUsage};

/// One event from a streaming completion
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Incremental content
    Delta { text: String },
    /// Terminal event; nothing follows it
    Done {
        stop_reason: StopReason,
        usage: TokenUsage,
    },
}

impl StreamEvent {
    pub fn delta(text: impl Into<String>) -> Self {
        Self::Delta { text: text.into() }
    }
}

/// A provider's stream of content deltas, terminated by [`StreamEvent::Done`]
pub type CompletionStream = BoxStream<'static, Result<StreamEvent>>;

/// Drain a stream into a full response, handing each delta to `on_delta`
///
/// Fails with [`LLMError::StreamInterrupted`] if the stream ends without a
/// `Done` event; a provider error mid-stream is returned as-is.
pub async fn collect_stream(
    mut stream: CompletionStream,
    on_delta: &mut (dyn FnMut(&str) + Send),
) -> Result<CompletionResponse> {
    let mut text = String::new();

    while let Some(event) = stream.next().await {
        match event? {
            StreamEvent::Delta { text: chunk } => {
                on_delta(&chunk);
                text.push_str(&chunk);
            }
            StreamEvent::Done { stop_reason, usage } => {
                return Ok(CompletionResponse {
                    message: Message::assistant(text),
                    stop_reason,
                    usage,
                });
            }
        }
    }

    Err(LLMError::StreamInterrupted(format!(
        "no finish event after {} bytes",
        text.len()
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::stream;

    #[tokio::test]
    async fn test_collect_stream_forwards_deltas() {
        let events = vec![
            Ok(StreamEvent::delta("Hello, ")),
            Ok(StreamEvent::delta("world")),
            Ok(StreamEvent::Done {
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage {
                    input_tokens: 3,
                    output_tokens: 2,
                },
            }),
        ];
        let mut seen = Vec::new();
        let response = collect_stream(stream::iter(events).boxed(), &mut |d: &str| {
            seen.push(d.to_string());
        })
        .await
        .unwrap();

        assert_eq!(response.message.text(), "Hello, world");
        assert_eq!(response.usage.total(), 5);
        assert_eq!(seen, vec!["Hello, ", "world"]);
    }

    #[tokio::test]
    async fn test_collect_stream_without_done_is_an_error() {
        let events = vec![Ok(StreamEvent::delta("partial"))];
        let result = collect_stream(stream::iter(events).boxed(), &mut |_: &str| {}).await;
        assert!(matches!(result, Err(LLMError::StreamInterrupted(_))));
    }

    #[tokio::test]
    async fn test_collect_stream_propagates_provider_error() {
        let events = vec![
            Ok(StreamEvent::delta("partial")),
            Err(LLMError::ProviderError("overloaded".to_string())),
        ];
        let result = collect_stream(stream::iter(events).boxed(), &mut |_: &str| {}).await;
        assert_eq!(
            result.unwrap_err(),
            LLMError::ProviderError("overloaded".to_string())
        );
    }
}
