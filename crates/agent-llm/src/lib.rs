//! LLM upstream contract for the analysis orchestrator
//!
//! This crate provides provider-agnostic abstractions for talking to an
//! upstream completion API. Concrete vendor wire protocols live outside the
//! workspace and plug in through [`LLMProvider`]. It includes:
//!
//! - Message types for LLM communication
//! - Completion request/response types
//! - Streaming events for incremental delivery
//! - The usage sink invoked after every upstream call

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;
pub mod stream;
pub mod usage;

// Re-export main types
pub use completion::{CompletionRequest, CompletionResponse, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;
pub use stream::{CompletionStream, StreamEvent, collect_stream};
pub use usage::{NoopUsageRecorder, UsageRecord, UsageRecorder};
