#![deny(missing_docs)]
//! Anthropic Messages API provider for `cortex-core`'s Model Client port.
//!
//! Grounded on `neuron-provider-anthropic`: the same client/error/mapping
//! split, adapted to `cortex-core::ports::ModelClient`'s `async_trait`
//! shape and its plainer `CompletionRequest`/`CompletionResponse` types
//! (no streaming, extended thinking, or prompt caching — `cortex-core`
//! doesn't model those).

mod client;
mod error;
mod mapping;

pub use client::Anthropic;
