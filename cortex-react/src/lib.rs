//! # cortex-react — the bounded ReAct think/act/observe loop
//!
//! `spec.md` §4.6. [`Engine::solve`] drives a model through a bounded
//! number of iterations, each opening `react:iter:<k>:think` and (when
//! the model requests tools) `react:iter:<k>:tools` workflow nodes,
//! dispatching [`layer0::hook::Hook`]s at the five inner-loop points
//! alongside the node-id grammar.

#![deny(missing_docs)]

mod engine;
pub mod hooks;

pub use engine::{EngineConfig, ReactError, ReactResult, Services, StopReason};
pub use hooks::HookRegistry;

pub use engine::Engine;
