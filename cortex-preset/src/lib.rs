//! # cortex-preset — agent persona and tool preset resolution
//!
//! `spec.md` §4.4. Preset *catalogs* (the mapping from a preset name to
//! persona text or a tool-name list) are an external collaborator — this
//! crate only resolves which preset name wins and applies its effect,
//! consuming the catalog through [`PresetCatalog`].
//!
//! Two axes are resolved independently, both with the same priority
//! rule (context value > config value > unset):
//!
//! - **Persona** ([`Resolver::resolve_persona`]): picks a system-prompt
//!   override, or `None` if neither axis named a preset.
//! - **Tool preset** ([`Resolver::resolve_tool_preset`]): filters a
//!   [`cortex_tool::Registry`] down to the named preset's tools, first
//!   removing the subagent-spawning tool when called from within a
//!   subagent context (`spec.md` §4.4's ordering invariant).

#![deny(missing_docs)]

use cortex_tool::Registry;
use std::collections::HashSet;
use std::sync::Arc;
use thiserror::Error;

/// Errors from preset resolution.
///
/// `spec.md` §7 classifies an unknown preset name as a configuration
/// error: fatal, surfaced before any workflow node opens.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum PresetError {
    /// Neither the persona nor the tool-preset catalog recognized this name.
    #[error("unknown preset: {0}")]
    UnknownPreset(String),
}

/// External port over a preset catalog: persona prompts and tool-name
/// lists keyed by preset name. Prompt template loading and the actual
/// catalog contents live outside this crate.
pub trait PresetCatalog: Send + Sync {
    /// The persona system-prompt text for a named preset, if known.
    fn persona(&self, name: &str) -> Option<String>;

    /// The tool names a named tool preset retains, if known.
    fn tool_names(&self, name: &str) -> Option<Vec<String>>;
}

/// `{preset_name, original_count, filtered_count, retained_ratio,
/// filtered_tool_names}` — the diagnostic payload emitted (by the
/// caller, via its attached listener) when tool-preset filtering
/// actually narrowed the registry.
#[derive(Debug, Clone)]
pub struct ToolFilteringDiagnostic {
    /// The tool preset name that was applied.
    pub preset_name: String,
    /// Tool count before filtering (after subagent-tool removal, if any).
    pub original_count: usize,
    /// Tool count after filtering.
    pub filtered_count: usize,
    /// `filtered_count / original_count`, or `0.0` when `original_count == 0`.
    pub retained_ratio: f64,
    /// Names present before filtering but absent from the filtered view.
    pub filtered_tool_names: Vec<String>,
}

/// Outcome of [`Resolver::resolve_tool_preset`].
pub struct ToolPresetResolution {
    /// The resulting registry view: unchanged, subagent-filtered,
    /// preset-filtered, or both.
    pub registry: Arc<Registry>,
    /// Present only when preset filtering actually ran.
    pub diagnostic: Option<ToolFilteringDiagnostic>,
}

/// Resolves persona and tool presets. Stateless — every method takes
/// its inputs explicitly rather than holding configuration, since
/// resolution happens once per task against that task's own context.
pub struct Resolver;

impl Resolver {
    /// Resolve the persona preset name (context > config > unset) and
    /// look up its prompt text. Returns `Ok(None)` when neither axis
    /// named a preset; errors if a name was given but the catalog
    /// doesn't recognize it.
    pub fn resolve_persona(
        context: Option<&str>,
        config: Option<&str>,
        catalog: &dyn PresetCatalog,
    ) -> Result<Option<String>, PresetError> {
        let Some(name) = context.or(config) else {
            return Ok(None);
        };
        catalog
            .persona(name)
            .ok_or_else(|| PresetError::UnknownPreset(name.to_string()))
            .map(Some)
    }

    /// Resolve the tool preset (context > config > unset) against
    /// `registry`, first removing `subagent_tool_name` when
    /// `is_subagent` is set. Returns the unfiltered (subagent-filtered)
    /// registry, with no diagnostic, when neither axis named a preset.
    pub fn resolve_tool_preset(
        context: Option<&str>,
        config: Option<&str>,
        registry: &Arc<Registry>,
        is_subagent: bool,
        subagent_tool_name: &str,
        catalog: &dyn PresetCatalog,
    ) -> Result<ToolPresetResolution, PresetError> {
        let working = if is_subagent {
            Arc::new(registry.without(subagent_tool_name))
        } else {
            Arc::clone(registry)
        };

        let Some(name) = context.or(config) else {
            return Ok(ToolPresetResolution {
                registry: working,
                diagnostic: None,
            });
        };

        let tool_names = catalog
            .tool_names(name)
            .ok_or_else(|| PresetError::UnknownPreset(name.to_string()))?;

        let original_count = working.len();
        let filtered = working.retaining(&tool_names);
        let filtered_count = filtered.len();
        let retained_ratio = if original_count == 0 {
            0.0
        } else {
            filtered_count as f64 / original_count as f64
        };

        let kept: HashSet<String> = filtered.list().into_iter().map(|d| d.name).collect();
        let filtered_tool_names: Vec<String> = working
            .list()
            .into_iter()
            .map(|d| d.name)
            .filter(|n| !kept.contains(n))
            .collect();

        Ok(ToolPresetResolution {
            registry: Arc::new(filtered),
            diagnostic: Some(ToolFilteringDiagnostic {
                preset_name: name.to_string(),
                original_count,
                filtered_count,
                retained_ratio,
                filtered_tool_names,
            }),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use cortex_core::error::ToolPortError;
    use cortex_core::ports::{ToolDefinition, ToolExecutor};
    use cortex_core::tool_call::{ToolCall, ToolResult};

    struct StubTool(&'static str);

    #[async_trait]
    impl ToolExecutor for StubTool {
        fn definition(&self) -> ToolDefinition {
            ToolDefinition::new(self.0.to_string(), "stub", serde_json::json!({"type": "object"}))
        }

        async fn execute(&self, call: &ToolCall) -> Result<ToolResult, ToolPortError> {
            Ok(ToolResult::success(&call.id, "ok"))
        }
    }

    struct FakeCatalog;

    impl PresetCatalog for FakeCatalog {
        fn persona(&self, name: &str) -> Option<String> {
            match name {
                "reviewer" => Some("You are a meticulous reviewer.".to_string()),
                _ => None,
            }
        }

        fn tool_names(&self, name: &str) -> Option<Vec<String>> {
            match name {
                "minimal" => Some(vec!["echo".to_string()]),
                _ => None,
            }
        }
    }

    fn registry_with(names: &[&str]) -> Arc<Registry> {
        let registry = Registry::new();
        for name in names {
            registry.register(Arc::new(StubTool(name)));
        }
        Arc::new(registry)
    }

    #[test]
    fn persona_prefers_context_over_config() {
        let resolved =
            Resolver::resolve_persona(Some("reviewer"), Some("other"), &FakeCatalog).unwrap();
        assert_eq!(resolved, Some("You are a meticulous reviewer.".to_string()));
    }

    #[test]
    fn persona_falls_back_to_config_when_context_absent() {
        let resolved = Resolver::resolve_persona(None, Some("reviewer"), &FakeCatalog).unwrap();
        assert_eq!(resolved, Some("You are a meticulous reviewer.".to_string()));
    }

    #[test]
    fn persona_is_none_when_neither_axis_set() {
        let resolved = Resolver::resolve_persona(None, None, &FakeCatalog).unwrap();
        assert_eq!(resolved, None);
    }

    #[test]
    fn persona_unknown_name_errors() {
        let err = Resolver::resolve_persona(Some("nope"), None, &FakeCatalog).unwrap_err();
        assert!(matches!(err, PresetError::UnknownPreset(name) if name == "nope"));
    }

    #[test]
    fn tool_preset_no_name_returns_registry_unchanged() {
        let registry = registry_with(&["echo", "subagent"]);
        let resolution =
            Resolver::resolve_tool_preset(None, None, &registry, false, "subagent", &FakeCatalog)
                .unwrap();
        assert_eq!(resolution.registry.len(), 2);
        assert!(resolution.diagnostic.is_none());
    }

    #[test]
    fn subagent_tool_removed_before_preset_filtering() {
        let registry = registry_with(&["echo", "subagent"]);
        let resolution = Resolver::resolve_tool_preset(
            Some("minimal"),
            None,
            &registry,
            true,
            "subagent",
            &FakeCatalog,
        )
        .unwrap();

        // original_count reflects the post-subagent-removal registry (1), not
        // the pre-removal one (2) — the subagent tool never gets a chance to
        // count toward the preset's own filtering diagnostic.
        let diagnostic = resolution.diagnostic.unwrap();
        assert_eq!(diagnostic.original_count, 1);
        assert_eq!(diagnostic.filtered_count, 1);
        assert!(resolution.registry.get("subagent").is_none());
        assert!(resolution.registry.get("echo").is_some());
    }

    #[test]
    fn filtering_diagnostic_reports_retained_ratio_and_dropped_names() {
        let registry = registry_with(&["echo", "write", "search"]);
        let resolution = Resolver::resolve_tool_preset(
            Some("minimal"),
            None,
            &registry,
            false,
            "subagent",
            &FakeCatalog,
        )
        .unwrap();

        let diagnostic = resolution.diagnostic.unwrap();
        assert_eq!(diagnostic.preset_name, "minimal");
        assert_eq!(diagnostic.original_count, 3);
        assert_eq!(diagnostic.filtered_count, 1);
        assert!((diagnostic.retained_ratio - (1.0 / 3.0)).abs() < 1e-9);
        let mut dropped = diagnostic.filtered_tool_names.clone();
        dropped.sort();
        assert_eq!(dropped, vec!["search".to_string(), "write".to_string()]);
    }

    #[test]
    fn tool_preset_unknown_name_errors() {
        let registry = registry_with(&["echo"]);
        let err = Resolver::resolve_tool_preset(
            Some("nonexistent"),
            None,
            &registry,
            false,
            "subagent",
            &FakeCatalog,
        )
        .unwrap_err();
        assert!(matches!(err, PresetError::UnknownPreset(name) if name == "nonexistent"));
    }
}
