pub mod charts;
pub mod domain;
pub mod ingest;
pub mod llm;

pub mod config {
    use anyhow::Context;

    pub const DEFAULT_WATCHLIST: &[&str] =
        &["NVDA", "TSLA", "AAPL", "AMD", "MSFT", "BTC-USD", "ETH-USD"];

    // Fastest/newest first; the last entries are the ones that have stayed available longest.
    pub const DEFAULT_MODELS: &[&str] = &[
        "gemini-2.0-flash",
        "gemini-1.5-flash",
        "gemini-1.5-pro",
        "gemini-pro",
    ];

    pub const DEFAULT_DISCOVERY_MODEL: &str = "gemini-1.5-flash";

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub gemini_api_key: Option<String>,
        pub gemini_base_url: Option<String>,
        pub gemini_models: Vec<String>,
        pub gemini_model_discovery: bool,
        pub gemini_default_model: String,
        pub quote_base_url: Option<String>,
        pub watchlist: Vec<String>,
        pub scan_headlines: usize,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            let gemini_models = match std::env::var("GEMINI_MODELS") {
                Ok(s) => parse_list(&s),
                Err(_) => DEFAULT_MODELS.iter().map(|s| s.to_string()).collect(),
            };
            anyhow::ensure!(
                !gemini_models.is_empty(),
                "GEMINI_MODELS must name at least one model"
            );

            let watchlist = match std::env::var("WATCHLIST") {
                Ok(s) => parse_list(&s),
                Err(_) => DEFAULT_WATCHLIST.iter().map(|s| s.to_string()).collect(),
            };
            anyhow::ensure!(!watchlist.is_empty(), "WATCHLIST must name at least one ticker");

            let scan_headlines = match std::env::var("SCAN_HEADLINES") {
                Ok(s) => s
                    .trim()
                    .parse::<usize>()
                    .with_context(|| format!("SCAN_HEADLINES is not a number: {s}"))?,
                Err(_) => 0,
            };

            Ok(Self {
                gemini_api_key: std::env::var("GEMINI_API_KEY").ok(),
                gemini_base_url: std::env::var("GEMINI_BASE_URL").ok(),
                gemini_models,
                gemini_model_discovery: std::env::var("GEMINI_MODEL_DISCOVERY")
                    .map(|s| parse_flag(&s))
                    .unwrap_or(false),
                gemini_default_model: std::env::var("GEMINI_DEFAULT_MODEL")
                    .ok()
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .unwrap_or_else(|| DEFAULT_DISCOVERY_MODEL.to_string()),
                quote_base_url: std::env::var("QUOTE_BASE_URL").ok(),
                watchlist,
                scan_headlines,
                sentry_dsn: std::env::var("SENTRY_DSN").ok(),
            })
        }

        pub fn require_gemini_api_key(&self) -> anyhow::Result<&str> {
            self.gemini_api_key
                .as_deref()
                .filter(|s| !s.trim().is_empty())
                .context("GEMINI_API_KEY is required")
        }
    }

    pub fn parse_list(s: &str) -> Vec<String> {
        s.split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn parse_flag(s: &str) -> bool {
        matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on")
    }

}
