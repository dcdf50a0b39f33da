// Chat completion providers

pub mod openrouter;

pub use openrouter::{CompletionError, CompletionMessage, OpenRouterClient};
