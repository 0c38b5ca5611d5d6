//! Tool registry and concurrency limiter for the cortex agent runtime.
//!
//! [`Registry`] is a concrete, concurrent `ToolRegistryPort` — the same
//! `Arc<dyn ToolExecutor>`-keyed-by-name shape as `neuron-tool`'s
//! `ToolRegistry`, generalized to be shared behind `&self` (no `&mut
//! self` registration) so the coordinator can hand a `Arc<Registry>` to
//! concurrent task executions.
//!
//! [`Limiter`] implements `spec.md` §4.3's Tool Concurrency Limiter.

#![deny(missing_docs)]

pub mod limiter;
pub mod registry;

pub use limiter::Limiter;
pub use registry::Registry;
