//! `ModelClient` decorator that records usage per completion.

use crate::{pricing::PricingTable, provider::provider_for_model, tracker::CostTracker};
use async_trait::async_trait;
use cortex_core::error::ModelError;
use cortex_core::ports::{CompletionRequest, CompletionResponse, ModelClient};
use layer0::id::SessionId;
use layer0::usage::UsageRecord;
use std::sync::Arc;

/// Wraps an `Arc<dyn ModelClient>` to record one `UsageRecord` per
/// successful completion against a fixed session id.
///
/// Holds only shared, read-only state plus its own tracker — it never
/// mutates the wrapped client, so the same underlying client can be
/// shared across sessions while each session gets its own wrapper
/// (`spec.md` §4.5 step 3, §8 point 6).
pub struct CostTrackingClient {
    inner: Arc<dyn ModelClient>,
    session: SessionId,
    tracker: Arc<CostTracker>,
    pricing: Arc<PricingTable>,
}

impl CostTrackingClient {
    /// Wrap `inner`, recording against `session` into `tracker` using `pricing`.
    pub fn new(
        inner: Arc<dyn ModelClient>,
        session: SessionId,
        tracker: Arc<CostTracker>,
        pricing: Arc<PricingTable>,
    ) -> Self {
        Self {
            inner,
            session,
            tracker,
            pricing,
        }
    }

    /// The tracker this client records into.
    pub fn tracker(&self) -> &Arc<CostTracker> {
        &self.tracker
    }

    fn now_millis() -> u64 {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0)
    }
}

#[async_trait]
impl ModelClient for CostTrackingClient {
    async fn complete(
        &self,
        request: CompletionRequest,
    ) -> Result<CompletionResponse, ModelError> {
        let response = self.inner.complete(request).await?;

        let model = self.inner.model().to_string();
        let provider = provider_for_model(&model);
        let (input_cost, output_cost) =
            self.pricing
                .cost_for(&model, response.usage.prompt, response.usage.completion);

        self.tracker.record(UsageRecord::new(
            self.session.clone(),
            model,
            provider,
            response.usage.prompt,
            response.usage.completion,
            input_cost,
            output_cost,
            Self::now_millis(),
        ));

        Ok(response)
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}
