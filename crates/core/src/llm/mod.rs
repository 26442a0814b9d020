pub mod error;
pub mod gemini;
pub mod wire;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Provider {
    Gemini,
}

/// Prefix for generation failures shown to the user in place of commentary.
pub const AI_ERROR_PREFIX: &str = "AI Error: ";

#[async_trait::async_trait]
pub trait TextGenerator: Send + Sync {
    fn provider(&self) -> Provider;

    /// Never fails: exhausted candidates come back as an `AI Error: ...` string.
    async fn generate(&self, prompt: &str) -> String;
}
