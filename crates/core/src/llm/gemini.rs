use crate::config::Settings;
use crate::llm::error::{AttemptFailure, FailedAttempt, GenerationError};
use crate::llm::wire::{self, GenerateContentRequest};
use crate::llm::{Provider, TextGenerator, AI_ERROR_PREFIX};
use anyhow::Context;
use std::sync::Arc;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_VERSION: &str = "v1beta";

/// Status and body of an upstream reply. Non-success statuses are data, not errors.
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn is_success(&self) -> bool {
        self.status == 200
    }
}

#[async_trait::async_trait]
pub trait GeminiTransport: Send + Sync {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> anyhow::Result<RawResponse>;

    async fn list_models(&self) -> anyhow::Result<RawResponse>;
}

#[derive(Debug, Clone)]
pub struct HttpGeminiTransport {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl HttpGeminiTransport {
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let api_key = settings.require_gemini_api_key()?.to_string();
        let base_url = settings
            .gemini_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        // 0 (the default) leaves requests unbounded.
        let timeout_secs = std::env::var("GEMINI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);

        let mut builder = reqwest::Client::builder();
        if timeout_secs > 0 {
            builder = builder.timeout(Duration::from_secs(timeout_secs));
        }
        let http = builder.build().context("failed to build reqwest client")?;

        Ok(Self {
            http,
            api_key,
            base_url,
        })
    }

    /// `{base}/v1beta/{segments...}`, each segment percent-encoded on its own.
    fn url(&self, segments: &[&str]) -> anyhow::Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .with_context(|| format!("invalid Gemini base URL: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| anyhow::anyhow!("Gemini base URL cannot take a path: {}", self.base_url))?
            .pop_if_empty()
            .push(API_VERSION)
            .extend(segments);
        Ok(url)
    }

    fn generate_content_request(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> anyhow::Result<reqwest::RequestBuilder> {
        let url = self.url(&["models", &format!("{model}:generateContent")])?;
        Ok(self
            .http
            .post(url)
            .query(&[("key", self.api_key.as_str())])
            .json(request))
    }

    fn list_models_request(&self) -> anyhow::Result<reqwest::RequestBuilder> {
        let url = self.url(&["models"])?;
        Ok(self.http.get(url).query(&[("key", self.api_key.as_str())]))
    }

    async fn read(res: reqwest::Response) -> anyhow::Result<RawResponse> {
        let status = res.status().as_u16();
        let body = res
            .text()
            .await
            .context("failed to read Gemini response body")?;
        Ok(RawResponse { status, body })
    }
}

#[async_trait::async_trait]
impl GeminiTransport for HttpGeminiTransport {
    async fn generate_content(
        &self,
        model: &str,
        request: &GenerateContentRequest,
    ) -> anyhow::Result<RawResponse> {
        let res = self
            .generate_content_request(model, request)?
            .send()
            .await
            .context("Gemini generateContent request failed")?;
        Self::read(res).await
    }

    async fn list_models(&self) -> anyhow::Result<RawResponse> {
        let res = self
            .list_models_request()?
            .send()
            .await
            .context("Gemini model listing request failed")?;
        Self::read(res).await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSelection {
    /// Tried in order; the first success wins.
    Static(Vec<String>),
    /// Resolve one model from the listing endpoint and keep it for the client's lifetime.
    Discover { default_model: String },
}

impl ModelSelection {
    pub fn from_settings(settings: &Settings) -> Self {
        if settings.gemini_model_discovery {
            ModelSelection::Discover {
                default_model: settings.gemini_default_model.clone(),
            }
        } else {
            ModelSelection::Static(settings.gemini_models.clone())
        }
    }
}

#[derive(Debug, Clone)]
pub struct Generation {
    pub model: String,
    pub text: String,
    /// Candidates that failed before `model` answered.
    pub failed: Vec<FailedAttempt>,
}

pub struct GeminiClient {
    transport: Arc<dyn GeminiTransport>,
    selection: ModelSelection,
    resolved_model: tokio::sync::Mutex<Option<String>>,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("selection", &self.selection)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    pub fn new(
        transport: Arc<dyn GeminiTransport>,
        selection: ModelSelection,
    ) -> anyhow::Result<Self> {
        if let ModelSelection::Static(models) = &selection {
            anyhow::ensure!(!models.is_empty(), "model candidate list must be non-empty");
        }
        Ok(Self {
            transport,
            selection,
            resolved_model: tokio::sync::Mutex::new(None),
        })
    }

    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let transport = HttpGeminiTransport::from_settings(settings)?;
        Self::new(Arc::new(transport), ModelSelection::from_settings(settings))
    }

    /// The ordered candidates the next generation will walk through.
    pub async fn resolved_models(&self) -> Vec<String> {
        match &self.selection {
            ModelSelection::Static(models) => models.clone(),
            ModelSelection::Discover { default_model } => {
                vec![self.discover_model(default_model).await]
            }
        }
    }

    async fn discover_model(&self, default_model: &str) -> String {
        let mut guard = self.resolved_model.lock().await;
        if let Some(model) = guard.as_ref() {
            return model.clone();
        }

        match self.fetch_listing().await {
            Ok(entries) => {
                let model = wire::select_model(&entries).unwrap_or_else(|| {
                    tracing::warn!(
                        listed = entries.len(),
                        default_model,
                        "no listed model supports generateContent; using default"
                    );
                    default_model.to_string()
                });
                tracing::info!(%model, listed = entries.len(), "resolved Gemini model");
                *guard = Some(model.clone());
                model
            }
            Err(err) => {
                // Not cached: the next call retries the listing.
                tracing::warn!(error = %err, default_model, "model discovery failed; using default");
                default_model.to_string()
            }
        }
    }

    async fn fetch_listing(&self) -> anyhow::Result<Vec<wire::ModelEntry>> {
        let res = self.transport.list_models().await?;
        anyhow::ensure!(
            res.is_success(),
            "model listing returned HTTP {}",
            res.status
        );
        wire::parse_model_listing(&res.body)
    }

    async fn attempt(&self, model: &str, request: &GenerateContentRequest) -> Result<String, AttemptFailure> {
        let res = self
            .transport
            .generate_content(model, request)
            .await
            .map_err(|e| AttemptFailure::Transport(format!("{e:#}")))?;

        if !res.is_success() {
            return Err(AttemptFailure::Http {
                status: res.status,
                body: res.body,
            });
        }

        wire::parse_generated_text(&res.body)
            .map_err(|e| AttemptFailure::MalformedBody(format!("{e:#}")))
    }

    /// One attempt per candidate, in order; stops at the first success.
    pub async fn generate_with_fallback(&self, prompt: &str) -> Result<Generation, GenerationError> {
        let candidates = self.resolved_models().await;
        let request = GenerateContentRequest::from_prompt(prompt);
        let mut failed = Vec::new();

        for (idx, model) in candidates.into_iter().enumerate() {
            let attempt = idx + 1;
            match self.attempt(&model, &request).await {
                Ok(text) => {
                    tracing::info!(%model, attempt, "Gemini generation succeeded");
                    return Ok(Generation {
                        model,
                        text,
                        failed,
                    });
                }
                Err(failure) => {
                    tracing::warn!(%model, attempt, error = %failure, "Gemini candidate failed; advancing");
                    failed.push(FailedAttempt { model, failure });
                }
            }
        }

        Err(GenerationError {
            provider: Provider::Gemini,
            attempts: failed,
        })
    }
}

#[async_trait::async_trait]
impl TextGenerator for GeminiClient {
    fn provider(&self) -> Provider {
        Provider::Gemini
    }

    async fn generate(&self, prompt: &str) -> String {
        match self.generate_with_fallback(prompt).await {
            Ok(generation) => generation.text,
            Err(err) => {
                tracing::error!(error = %err, "Gemini generation exhausted all candidates");
                format!("{AI_ERROR_PREFIX}{err}")
            }
        }
    }
}
