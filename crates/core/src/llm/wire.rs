use anyhow::Context;
use serde::{Deserialize, Serialize};

pub const GENERATE_CONTENT_METHOD: &str = "generateContent";
const MODEL_NAME_PREFIX: &str = "models/";
const PREFERRED_MODEL_MARKER: &str = "flash";

#[derive(Debug, Clone, Serialize)]
pub struct GenerateContentRequest {
    pub contents: Vec<Content>,
}

impl GenerateContentRequest {
    pub fn from_prompt(prompt: &str) -> Self {
        Self {
            contents: vec![Content {
                parts: vec![Part {
                    text: Some(prompt.to_string()),
                }],
            }],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Part {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<ResponseCandidate>,
}

#[derive(Debug, Clone, Deserialize)]
struct ResponseCandidate {
    #[serde(default)]
    content: Option<Content>,
}

#[derive(Debug, Clone, Deserialize)]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelEntry {
    pub name: String,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
}

impl ModelEntry {
    pub fn can_generate_content(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == GENERATE_CONTENT_METHOD)
    }

    /// Identifier usable in `models/{id}:generateContent`.
    pub fn id(&self) -> &str {
        self.name
            .strip_prefix(MODEL_NAME_PREFIX)
            .unwrap_or(&self.name)
    }
}

/// `candidates[0].content.parts[0].text`
pub fn parse_generated_text(body: &str) -> anyhow::Result<String> {
    let parsed = serde_json::from_str::<GenerateContentResponse>(body)
        .context("response is not a generateContent JSON object")?;
    let candidate = parsed
        .candidates
        .into_iter()
        .next()
        .context("response has no candidates")?;
    let content = candidate.content.context("first candidate has no content")?;
    let part = content
        .parts
        .into_iter()
        .next()
        .context("first candidate has no parts")?;
    part.text.context("first part has no text")
}

pub fn parse_model_listing(body: &str) -> anyhow::Result<Vec<ModelEntry>> {
    let parsed = serde_json::from_str::<ListModelsResponse>(body)
        .context("response is not a model listing JSON object")?;
    Ok(parsed.models)
}

/// First content-generation model whose name contains "flash", else the first capable one.
pub fn select_model(entries: &[ModelEntry]) -> Option<String> {
    let capable: Vec<&ModelEntry> = entries.iter().filter(|e| e.can_generate_content()).collect();
    capable
        .iter()
        .find(|e| e.name.contains(PREFERRED_MODEL_MARKER))
        .or_else(|| capable.first())
        .map(|e| e.id().to_string())
}
