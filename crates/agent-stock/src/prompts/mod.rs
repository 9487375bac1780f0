//! Stock analysis prompt templates
//!
//! Templates are organized into:
//! - `system`: System prompts for each agent type and for synthesis
//! - `user`: User message construction and the JSON output contract

mod system;
mod user;

pub use system::{analyst_prompt, synthesis_prompt};
pub use user::{UserPrompt, output_contract, synthesis_contract};
