//! Context window estimation and compression for the cortex agent runtime.
//!
//! [`SlidingWindow`] is a concrete `ContextManager` — the same
//! chars-per-token estimation and drop-oldest-keep-first compaction
//! heuristic `neuron-context`'s `SlidingWindow` uses for `neuron-turn`,
//! generalized to operate over `layer0::Message` and to compress toward
//! an explicit caller-supplied target rather than a fixed half-of-total
//! ratio.

#![deny(missing_docs)]

mod sliding_window;

pub use sliding_window::SlidingWindow;
