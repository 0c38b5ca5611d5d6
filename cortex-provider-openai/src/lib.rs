#![deny(missing_docs)]
//! OpenAI Chat Completions provider for `cortex-core`'s Model Client port.
//!
//! Grounded on `neuron-provider-openai`: the same client/error/mapping
//! split, adapted to `cortex-core::ports::ModelClient`'s `async_trait`
//! shape and its plainer `CompletionRequest`/`CompletionResponse` types
//! (no streaming, no function-calling-as-default `tool_choice` — the
//! caller picks).

mod client;
mod error;
mod mapping;

pub use client::OpenAi;
