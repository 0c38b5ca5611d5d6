//! Model-name-prefix to provider inference (`spec.md` §4.5 step 3).

/// Infer a provider identifier from a model name's prefix.
///
/// The mapping is partial by design (`spec.md` §9's open question):
/// anything not matching a known prefix falls back to `"unknown"`
/// rather than guessing.
pub fn provider_for_model(model: &str) -> &'static str {
    let lower = model.to_ascii_lowercase();
    if lower.starts_with("gpt") || lower.starts_with("o1") || lower.starts_with("o3") {
        "openai"
    } else if lower.starts_with("claude") {
        "anthropic"
    } else if lower.starts_with("deep") {
        "deepseek"
    } else if lower.starts_with("gemini") {
        "google"
    } else if lower.starts_with("llama") || lower.starts_with("mixtral") {
        "openrouter"
    } else {
        "unknown"
    }
}
