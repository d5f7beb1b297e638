//! Language-model restructuring of extracted slide content.
//!
//! [`Enhancer`] turns an extracted deck and the user's parameters into a
//! chat-completion request and returns the model's raw reply. The service
//! itself sits behind the [`ChatCompletion`] trait; [`OpenAiClient`] is the
//! production implementation.

pub mod client;
pub mod enhancer;
pub mod prompt;

pub use client::{ChatCompletion, ChatMessage, ChatRequest, OpenAiClient, Role};
pub use enhancer::Enhancer;
pub use prompt::EXAMPLE_REPLY;
