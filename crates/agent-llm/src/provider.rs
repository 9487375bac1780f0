//! LLM provider trait definition

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;

use crate::{CompletionRequest, CompletionResponse, CompletionStream, Result, StreamEvent};

/// Trait for LLM providers
///
/// Implementations of this trait provide access to different LLM services
/// (e.g., Anthropic, OpenAI, Ollama). Both methods may fail on network or
/// provider errors; callers own retry and failure accounting.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion from the LLM
    ///
    /// # Arguments
    ///
    /// * `request` - The completion request with messages and parameters
    ///
    /// # Returns
    ///
    /// The completion response with the assistant's message and metadata
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Generate a completion as a stream of content deltas
    ///
    /// The default implementation calls [`complete`](Self::complete) and
    /// replays the result as a single delta followed by `Done`, so providers
    /// without native streaming still work.
    async fn complete_stream(&self, request: CompletionRequest) -> Result<CompletionStream> {
        let response = self.complete(request).await?;
        let events = vec![
            Ok(StreamEvent::delta(response.message.content)),
            Ok(StreamEvent::Done {
                stop_reason: response.stop_reason,
                usage: response.usage,
            }),
        ];
        Ok(stream::iter(events).boxed())
    }

    /// Get the provider name (e.g., "anthropic", "openai")
    fn name(&self) -> &str;
}
