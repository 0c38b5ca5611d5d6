//! The ReAct loop (`spec.md` §4.6): `Engine::solve` drives a model
//! through bounded think/act/observe iterations.

use crate::hooks::HookRegistry;
use cortex_core::event::NodeKind;
use cortex_core::error::ModelError;
use cortex_core::ports::{
    CompletionRequest, FunctionCallParser, ModelClient, ToolChoice, ToolRegistryPort,
};
use cortex_core::task_state::TaskState;
use cortex_core::tool_call::{ToolCall, ToolResult};
use cortex_tool::Limiter;
use cortex_workflow::Workflow;
use layer0::hook::{HookAction, HookContext, HookPoint};
use layer0::session::{Message, MessageSource, Role};
use layer0::ContentBlock;
use std::future::Future;
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tokio_util::sync::CancellationToken;

/// Errors `Engine::solve` can return.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ReactError {
    /// The model client returned an error.
    #[error("model call failed: {0}")]
    Model(#[from] ModelError),

    /// A workflow node transition failed (programmer error).
    #[error("workflow error: {0}")]
    Workflow(#[from] cortex_workflow::WorkflowError),

    /// The run was cancelled at a suspension point.
    #[error("cancelled")]
    Cancelled,
}

/// Why the engine stopped iterating (`spec.md` §4.6 step 4/6), mapped
/// to the wire values `CompletionRequest`/result payloads carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// The model produced a turn with no tool calls.
    Stop,
    /// The iteration budget (`max_iterations`) was exhausted.
    MaxIterations,
}

impl StopReason {
    /// The wire-stable string form (`spec.md` §4.6).
    pub fn as_str(&self) -> &'static str {
        match self {
            StopReason::Stop => "stop",
            StopReason::MaxIterations => "max_iterations",
        }
    }
}

/// Completion defaults the engine applies to every request it builds.
/// Unset fields are omitted from the request rather than defaulted.
#[derive(Debug, Clone, Default)]
pub struct EngineConfig {
    /// Maximum number of think/act iterations (`N`, required, `>= 1`).
    pub max_iterations: u32,
    /// Sampling temperature override.
    pub temperature: Option<f64>,
    /// Maximum output tokens override.
    pub max_tokens: Option<u32>,
    /// Nucleus sampling override.
    pub top_p: Option<f64>,
    /// Stop sequences override.
    pub stop_sequences: Vec<String>,
    /// Which attempt this invocation is (`0` for the original run, `1..`
    /// for auto-reviewer rework passes). Offsets the iteration node-id
    /// numbering and the context/finalize node ids so a rework call
    /// against the same `Workflow` never collides with a prior attempt's
    /// nodes (`spec.md` §4.8's "re-invokes the engine once").
    pub attempt: u32,
}

/// The external collaborators `Engine::solve` drives.
pub struct Services {
    /// The (already cost-wrapped, isolated) model client.
    pub model: Arc<dyn ModelClient>,
    /// The tool registry view selected for this task.
    pub tools: Arc<dyn ToolRegistryPort>,
    /// Fallback parser used when the transport embeds tool calls in text.
    pub parser: Option<Arc<dyn FunctionCallParser>>,
    /// Bounds parallel tool executions.
    pub limiter: Arc<Limiter>,
}

/// The outcome of a `Engine::solve` invocation.
#[derive(Debug, Clone)]
pub struct ReactResult {
    /// Why the loop stopped.
    pub stop_reason: StopReason,
    /// Iterations actually completed.
    pub iterations_completed: u32,
    /// Cumulative token usage across every model call.
    pub tokens_used: u64,
}

/// Drives the bounded think/act/observe loop over a [`TaskState`],
/// emitting workflow nodes against a shared [`Workflow`] and dispatching
/// [`layer0::hook::Hook`]s at each of the five inner-loop hook points.
pub struct Engine {
    workflow: Arc<Workflow>,
    hooks: HookRegistry,
    config: EngineConfig,
}

impl Engine {
    /// Build an engine bound to `workflow` (already opened by the
    /// coordinator's `execute` node) with the given hook pipeline and
    /// completion defaults.
    pub fn new(workflow: Arc<Workflow>, hooks: HookRegistry, config: EngineConfig) -> Self {
        Self {
            workflow,
            hooks,
            config,
        }
    }

    /// Run the bounded loop, mutating `state` in place and returning the
    /// stop condition reached.
    pub async fn solve(
        &self,
        state: &mut TaskState,
        services: &Services,
        cancellation: &CancellationToken,
    ) -> Result<ReactResult, ReactError> {
        let start = Instant::now();

        let context_id = self.scoped_node_id("react:context");
        self.workflow.add_node(&context_id, None).await?;
        self.workflow.start_node(&context_id).await?;
        let tool_defs = services.tools.list();
        self.workflow
            .complete_node_success(
                &context_id,
                Some(serde_json::json!({
                    "message_count": state.messages.len(),
                    "tool_count": tool_defs.len(),
                    "attempt": self.config.attempt,
                })),
            )
            .await?;

        let mut tokens_used = state.tokens_used;
        let base = self.config.attempt * self.config.max_iterations;

        for local_k in 1..=self.config.max_iterations {
            let k = base + local_k;
            let think_id = format!("react:iter:{k}:think");

            if cancellation.is_cancelled() {
                return self.fail_open_node(&think_id, "cancelled").await;
            }

            let hook_ctx = self.hook_context(HookPoint::PreInference, tokens_used, k - 1, start);
            if let HookAction::Halt { reason } = self.hooks.dispatch(&hook_ctx).await {
                return self.fail_open_node(&think_id, &reason).await;
            }

            self.workflow.add_node(&think_id, None).await?;
            self.workflow.start_node(&think_id).await?;

            let request = self.build_request(state, &tool_defs);

            let response = match self
                .cancellable(cancellation, services.model.complete(request))
                .await
            {
                Ok(Ok(response)) => response,
                Ok(Err(err)) => {
                    self.workflow
                        .complete_node_failure(&think_id, Some(serde_json::json!({"error": err.to_string()})))
                        .await?;
                    self.workflow
                        .complete_node_failure("execute", Some(serde_json::json!({"error": err.to_string()})))
                        .await
                        .ok();
                    return Err(ReactError::Model(err));
                }
                Err(_cancelled) => return self.fail_open_node(&think_id, "cancelled").await,
            };

            tokens_used += response.usage.total;
            state.iteration = k;
            state.tokens_used = tokens_used;

            let hook_ctx = {
                let mut ctx = self.hook_context(HookPoint::PostInference, tokens_used, k, start);
                ctx.model_output = Some(layer0::Content::Text(response.content.clone()));
                ctx
            };
            if let HookAction::Halt { reason } = self.hooks.dispatch(&hook_ctx).await {
                return self.fail_open_node(&think_id, &reason).await;
            }

            let tool_calls = self.resolve_tool_calls(&response, services)?;

            let assistant_message = Message {
                tool_calls: tool_calls
                    .iter()
                    .map(|call| ContentBlock::ToolUse {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        input: call.arguments.clone(),
                    })
                    .collect(),
                ..Message::new(Role::Assistant, response.content.clone(), MessageSource::AssistantReply)
            };
            state.messages.push(assistant_message);

            self.workflow
                .emit(
                    self.workflow
                        .new_envelope("generation_summary")
                        .with_node(&think_id, NodeKind::Generation)
                        .with_payload(serde_json::json!({
                            "iteration": k,
                            "content": response.content,
                            "tool_call_count": tool_calls.len(),
                            "final": true,
                        })),
                )
                .await;

            self.workflow.complete_node_success(&think_id, None).await?;

            if tool_calls.is_empty() {
                let finalize_id = self.scoped_node_id("react:finalize");
                self.workflow.add_node(&finalize_id, None).await?;
                self.workflow.start_node(&finalize_id).await?;
                self.workflow
                    .complete_node_success(&finalize_id, None)
                    .await?;
                return Ok(ReactResult {
                    stop_reason: StopReason::Stop,
                    iterations_completed: k,
                    tokens_used,
                });
            }

            let tools_id = format!("react:iter:{k}:tools");
            self.workflow.add_node(&tools_id, None).await?;
            self.workflow.start_node(&tools_id).await?;

            let mut result_blocks = Vec::with_capacity(tool_calls.len());

            for (index, call) in tool_calls.iter().enumerate() {
                if cancellation.is_cancelled() {
                    self.workflow
                        .complete_node_failure(&tools_id, Some(serde_json::json!({"error": "cancelled"})))
                        .await
                        .ok();
                    return self.fail_open_node("execute", "cancelled").await;
                }

                let result = self
                    .execute_one_tool(k, index, call, services, tokens_used, k, start, cancellation)
                    .await?;

                result_blocks.push(ContentBlock::ToolResult {
                    tool_use_id: call.id.clone(),
                    content: result.content.clone(),
                    is_error: result.is_error(),
                });

                state.last_tool_results.push(result);
            }

            self.workflow
                .complete_node_success(&tools_id, None)
                .await?;

            state.messages.push(Message {
                tool_results: result_blocks,
                ..Message::new(Role::Tool, String::new(), MessageSource::ToolResult)
            });

            if local_k == self.config.max_iterations {
                let finalize_id = self.scoped_node_id("react:finalize");
                self.workflow.add_node(&finalize_id, None).await?;
                self.workflow.start_node(&finalize_id).await?;
                self.workflow
                    .complete_node_success(&finalize_id, None)
                    .await?;
                return Ok(ReactResult {
                    stop_reason: StopReason::MaxIterations,
                    iterations_completed: k,
                    tokens_used,
                });
            }
        }

        unreachable!("loop always returns on its last iteration (k == max_iterations)")
    }

    #[allow(clippy::too_many_arguments)]
    async fn execute_one_tool(
        &self,
        iteration: u32,
        index: usize,
        call: &ToolCall,
        services: &Services,
        tokens_used: u64,
        turns_completed: u32,
        start: Instant,
        cancellation: &CancellationToken,
    ) -> Result<ToolResult, ReactError> {
        let node_id = format!("react:iter:{iteration}:tool:{}:{index}", call.name);

        self.workflow.add_node(&node_id, None).await?;
        self.workflow.start_node(&node_id).await?;

        self.workflow
            .emit(
                self.workflow
                    .new_envelope("tool_started")
                    .with_node(&node_id, NodeKind::Tool)
                    .with_payload(serde_json::json!({
                        "tool_name": call.name,
                        "index": index,
                        "input": call.arguments,
                    })),
            )
            .await;

        let mut hook_ctx = HookContext::new(HookPoint::PreToolUse);
        hook_ctx.tool_name = Some(call.name.clone());
        hook_ctx.tool_input = Some(call.arguments.clone());
        hook_ctx.tokens_used = tokens_used;
        hook_ctx.turns_completed = turns_completed;
        hook_ctx.elapsed = start.elapsed().into();

        let mut actual_call = call.clone();
        match self.hooks.dispatch(&hook_ctx).await {
            HookAction::Halt { reason } => {
                self.workflow
                    .complete_node_failure(&node_id, Some(serde_json::json!({"error": reason})))
                    .await?;
                return Err(ReactError::Workflow(cortex_workflow::WorkflowError::IllegalTransition {
                    node: node_id,
                    from: cortex_core::NodeStatus::Running,
                    to: cortex_core::NodeStatus::Failed,
                }));
            }
            HookAction::SkipTool { reason } => {
                let result = ToolResult::success(&call.id, format!("skipped: {reason}"));
                self.complete_tool_node(&node_id, &result).await?;
                return Ok(result);
            }
            HookAction::ModifyToolInput { new_input } => {
                actual_call.arguments = new_input;
            }
            _ => {}
        }

        if cancellation.is_cancelled() {
            let result = ToolResult::failure(&call.id, "cancelled");
            self.workflow
                .complete_node_failure(&node_id, Some(serde_json::json!({"error": "cancelled"})))
                .await
                .ok();
            return Err(ReactError::Cancelled);
        }

        let _permit = self
            .cancellable(cancellation, services.limiter.acquire())
            .await
            .map_err(|_| ReactError::Cancelled)?;

        let executed = match services.tools.get(&actual_call.name) {
            Some(tool) => {
                self.cancellable(cancellation, tool.execute(&actual_call))
                    .await
                    .map_err(|_| ReactError::Cancelled)?
            }
            None => Err(cortex_core::error::ToolPortError::NotFound(actual_call.name.clone())),
        };

        let mut result = match executed {
            Ok(result) => result,
            Err(err) => {
                self.workflow
                    .emit(
                        self.workflow
                            .new_envelope("diagnostic_error")
                            .with_node(&node_id, NodeKind::Diagnostic)
                            .with_payload(serde_json::json!({
                                "tool_name": call.name,
                                "index": index,
                                "error": err.to_string(),
                            })),
                    )
                    .await;
                ToolResult::failure(&call.id, err.to_string())
            }
        };

        let mut hook_ctx = HookContext::new(HookPoint::PostToolUse);
        hook_ctx.tool_name = Some(call.name.clone());
        hook_ctx.tool_result = Some(result.content.clone());
        hook_ctx.tokens_used = tokens_used;
        hook_ctx.turns_completed = turns_completed;
        hook_ctx.elapsed = start.elapsed().into();

        if let HookAction::ModifyToolOutput { new_output } = self.hooks.dispatch(&hook_ctx).await {
            result.content = match new_output {
                serde_json::Value::String(s) => s,
                other => other.to_string(),
            };
        }

        self.workflow
            .emit(
                self.workflow
                    .new_envelope("tool_completed")
                    .with_node(&node_id, NodeKind::Tool)
                    .with_payload(serde_json::json!({
                        "tool_name": call.name,
                        "index": index,
                        "success": !result.is_error(),
                    })),
            )
            .await;

        self.complete_tool_node(&node_id, &result).await?;
        Ok(result)
    }

    async fn complete_tool_node(&self, node_id: &str, result: &ToolResult) -> Result<(), ReactError> {
        if result.is_error() {
            self.workflow
                .complete_node_failure(node_id, Some(serde_json::json!({"error": result.content})))
                .await?;
        } else {
            self.workflow
                .complete_node_success(node_id, Some(serde_json::json!({"content": result.content})))
                .await?;
        }
        Ok(())
    }

    /// Fail the currently open node plus the outer `execute` node with a
    /// cancellation/halt cause, returning the corresponding error.
    async fn fail_open_node(&self, node_id: &str, reason: &str) -> Result<ReactResult, ReactError> {
        let error = serde_json::json!({"error": reason});
        self.workflow
            .complete_node_failure(node_id, Some(error.clone()))
            .await
            .ok();
        self.workflow
            .complete_node_failure("execute", Some(error))
            .await
            .ok();
        if reason == "cancelled" {
            Err(ReactError::Cancelled)
        } else {
            Err(ReactError::Workflow(cortex_workflow::WorkflowError::IllegalTransition {
                node: node_id.to_string(),
                from: cortex_core::NodeStatus::Running,
                to: cortex_core::NodeStatus::Failed,
            }))
        }
    }

    fn build_request(
        &self,
        state: &TaskState,
        tool_defs: &[cortex_core::ports::ToolDefinition],
    ) -> CompletionRequest {
        let mut messages = Vec::with_capacity(state.messages.len() + 1);
        messages.push(Message::new(
            Role::System,
            state.system_prompt.clone(),
            MessageSource::SystemPrompt,
        ));
        messages.extend(state.messages.iter().cloned());

        let mut request = CompletionRequest::new(messages);
        request.tools = tool_defs.to_vec();
        request.tool_choice = ToolChoice::Auto;
        request.temperature = self.config.temperature;
        request.max_tokens = self.config.max_tokens;
        request.top_p = self.config.top_p;
        request.stop_sequences = self.config.stop_sequences.clone();
        request
    }

    /// Extract tool calls from the response, falling back to the parser
    /// port when the transport didn't supply structured calls. Neither
    /// the provider client nor the parser can know this task's real
    /// session/task/parent-task ids, so every call (structured or
    /// parsed) gets them stamped from the workflow's ambient context
    /// before the engine does anything else with it.
    fn resolve_tool_calls(
        &self,
        response: &cortex_core::ports::CompletionResponse,
        services: &Services,
    ) -> Result<Vec<ToolCall>, ReactError> {
        let mut calls = if !response.tool_calls.is_empty() {
            response.tool_calls.clone()
        } else if let Some(parser) = services.parser.as_ref() {
            parser.parse(&response.content).unwrap_or_default()
        } else {
            vec![]
        };

        let ctx = self.workflow.context();
        for call in &mut calls {
            call.session = ctx.session_id.clone();
            call.task = ctx.task_id.clone();
            call.parent_task = ctx.parent_task_id.clone();
        }
        Ok(calls)
    }

    /// The original attempt (`0`) uses the bare node id; rework attempts
    /// suffix it so a re-invocation against the same `Workflow` never
    /// collides with the node ids the original attempt already added.
    fn scoped_node_id(&self, base: &str) -> String {
        if self.config.attempt == 0 {
            base.to_string()
        } else {
            format!("{base}:attempt:{}", self.config.attempt)
        }
    }

    fn hook_context(&self, point: HookPoint, tokens_used: u64, turns_completed: u32, start: Instant) -> HookContext {
        let mut ctx = HookContext::new(point);
        ctx.tokens_used = tokens_used;
        ctx.turns_completed = turns_completed;
        ctx.elapsed = start.elapsed().into();
        ctx
    }

    /// Race `fut` against cancellation, honoring `spec.md` §5's "every
    /// suspension point accepts a cancellable context" requirement.
    async fn cancellable<T>(
        &self,
        cancellation: &CancellationToken,
        fut: impl Future<Output = T>,
    ) -> Result<T, ()> {
        tokio::select! {
            _ = cancellation.cancelled() => Err(()),
            out = fut => Ok(out),
        }
    }
}
