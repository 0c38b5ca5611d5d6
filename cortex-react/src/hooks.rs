//! Hook dispatch pipeline carried over from `neuron-hooks::HookRegistry`.
//!
//! Distinct from `cortex_core::ports::Listener`: a [`Hook`] observes and
//! can intervene inside the engine's inner loop (skip a tool, rewrite
//! its input/output, halt the run); a `Listener` only ever receives
//! translated workflow envelopes for outward observability.

use layer0::hook::{Hook, HookAction, HookContext};
use std::sync::Arc;
use tracing::warn;

/// An ordered pipeline of [`Hook`]s, dispatched in registration order.
///
/// Short-circuits on the first non-`Continue` action from a hook
/// registered for the firing point. A hook that returns an error is
/// logged and treated as `Continue` — hook errors never halt a run on
/// their own, only an explicit `HookAction::Halt` does.
#[derive(Default)]
pub struct HookRegistry {
    hooks: Vec<Arc<dyn Hook>>,
}

impl HookRegistry {
    /// An empty pipeline.
    pub fn new() -> Self {
        Self { hooks: Vec::new() }
    }

    /// Append a hook to the end of the pipeline.
    pub fn add(&mut self, hook: Arc<dyn Hook>) {
        self.hooks.push(hook);
    }

    /// Dispatch `ctx` through every hook registered for `ctx.point`, in
    /// order, stopping at the first non-`Continue` action.
    pub async fn dispatch(&self, ctx: &HookContext) -> HookAction {
        for hook in &self.hooks {
            if !hook.points().contains(&ctx.point) {
                continue;
            }
            match hook.on_event(ctx).await {
                Ok(HookAction::Continue) => continue,
                Ok(action) => return action,
                Err(err) => {
                    warn!(error = %err, point = ?ctx.point, "hook errored; continuing");
                    continue;
                }
            }
        }
        HookAction::Continue
    }
}
