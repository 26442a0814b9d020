use crate::config::Settings;
use crate::ingest::provider::QuoteProvider;
use crate::ingest::types::PricePoint;
use anyhow::{Context, Result};
use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://query2.finance.yahoo.com";
const DEFAULT_TIMEOUT_SECS: u64 = 10;
// The chart endpoint rejects requests without a browser-like agent.
const USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36";

const LATEST_RANGE: &str = "1d";
const HISTORY_RANGE: &str = "1mo";
const MAX_TICKER_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct YahooQuoteProvider {
    http: reqwest::Client,
    base_url: String,
}

impl YahooQuoteProvider {
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let base_url = settings
            .quote_base_url
            .clone()
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let timeout_secs = std::env::var("QUOTE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .context("failed to build quote provider http client")?;

        Ok(Self { http, base_url })
    }

    /// Base URL with `segments` appended, each percent-encoded as a single path segment.
    fn url(&self, segments: &[&str]) -> Result<reqwest::Url> {
        let mut url = reqwest::Url::parse(&self.base_url)
            .with_context(|| format!("invalid quote provider base URL: {}", self.base_url))?;
        url.path_segments_mut()
            .map_err(|_| {
                anyhow::anyhow!("quote provider base URL cannot take a path: {}", self.base_url)
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    fn chart_url(&self, ticker: &str) -> Result<reqwest::Url> {
        self.url(&["v8", "finance", "chart", ticker])
    }

    async fn get_json<T: DeserializeOwned>(&self, url: reqwest::Url, query: &[(&str, String)]) -> Result<T> {
        let res = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .context("quote provider request failed")?;

        let status = res.status();
        let text = res
            .text()
            .await
            .context("failed to read quote provider response")?;
        if !status.is_success() {
            anyhow::bail!("quote provider HTTP {status}: {text}");
        }

        serde_json::from_str::<T>(&text)
            .with_context(|| format!("unexpected quote provider response: {text}"))
    }

    async fn chart(&self, ticker: &str, range: &str) -> Result<ChartResult> {
        validate_ticker(ticker)?;
        let envelope: ChartEnvelope = self
            .get_json(
                self.chart_url(ticker)?,
                &[("interval", "1d".to_string()), ("range", range.to_string())],
            )
            .await?;
        envelope.into_result(ticker)
    }
}

/// Symbols look like `NVDA`, `BRK.B`, `BTC-USD`, `^GSPC` or `EURUSD=X`.
fn validate_ticker(ticker: &str) -> Result<()> {
    anyhow::ensure!(
        !ticker.is_empty() && ticker.len() <= MAX_TICKER_LEN,
        "ticker must be 1..={MAX_TICKER_LEN} characters (got {ticker:?})"
    );
    anyhow::ensure!(
        ticker
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '^' | '=' | '_')),
        "ticker has unsupported characters: {ticker:?}"
    );
    Ok(())
}

#[async_trait::async_trait]
impl QuoteProvider for YahooQuoteProvider {
    fn provider_name(&self) -> &'static str {
        "yahoo_chart"
    }

    async fn latest_close(&self, ticker: &str) -> Result<Option<f64>> {
        let chart = self.chart(ticker, LATEST_RANGE).await?;
        Ok(chart.latest_close())
    }

    async fn history(&self, ticker: &str) -> Result<Vec<PricePoint>> {
        let chart = self.chart(ticker, HISTORY_RANGE).await?;
        Ok(chart.price_points())
    }

    async fn headlines(&self, ticker: &str, limit: usize) -> Result<Vec<String>> {
        let res: SearchResponse = self
            .get_json(
                self.url(&["v1", "finance", "search"])?,
                &[
                    ("q", ticker.to_string()),
                    ("newsCount", limit.to_string()),
                    ("quotesCount", "0".to_string()),
                ],
            )
            .await?;
        Ok(res.titles(limit))
    }
}

#[derive(Debug, Deserialize)]
struct ChartEnvelope {
    chart: ChartBody,
}

#[derive(Debug, Deserialize)]
struct ChartBody {
    #[serde(default)]
    result: Option<Vec<ChartResult>>,
    #[serde(default)]
    error: Option<serde_json::Value>,
}

impl ChartEnvelope {
    fn into_result(self, ticker: &str) -> Result<ChartResult> {
        if let Some(err) = self.chart.error.filter(|e| !e.is_null()) {
            anyhow::bail!("chart error for {ticker}: {err}");
        }
        self.chart
            .result
            .and_then(|r| r.into_iter().next())
            .with_context(|| format!("chart response for {ticker} has no result"))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartResult {
    #[serde(default)]
    meta: ChartMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    #[serde(default)]
    indicators: Indicators,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartMeta {
    #[serde(default)]
    regular_market_price: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
struct Indicators {
    #[serde(default)]
    quote: Vec<QuoteSeries>,
}

#[derive(Debug, Default, Deserialize)]
struct QuoteSeries {
    // Yahoo emits null for sessions without a print.
    #[serde(default)]
    close: Vec<Option<f64>>,
}

impl ChartResult {
    fn closes(&self) -> &[Option<f64>] {
        self.indicators
            .quote
            .first()
            .map(|q| q.close.as_slice())
            .unwrap_or(&[])
    }

    fn latest_close(&self) -> Option<f64> {
        self.closes()
            .iter()
            .rev()
            .find_map(|c| *c)
            .or(self.meta.regular_market_price)
    }

    fn price_points(&self) -> Vec<PricePoint> {
        self.timestamp
            .iter()
            .zip(self.closes())
            .filter_map(|(ts, close)| {
                let close = (*close)?;
                let date = DateTime::from_timestamp(*ts, 0)?.date_naive();
                Some(PricePoint { date, close })
            })
            .collect()
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    news: Vec<NewsItem>,
}

#[derive(Debug, Deserialize)]
struct NewsItem {
    #[serde(default)]
    title: String,
}

impl SearchResponse {
    fn titles(self, limit: usize) -> Vec<String> {
        self.news
            .into_iter()
            .map(|n| n.title.trim().to_string())
            .filter(|t| !t.is_empty())
            .take(limit)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use serde_json::json;

    fn chart(v: serde_json::Value) -> Result<ChartResult> {
        serde_json::from_value::<ChartEnvelope>(v)
            .unwrap()
            .into_result("NVDA")
    }

    #[test]
    fn parses_history_and_skips_null_closes() {
        // 2026-10-12, 2026-10-13, 2026-10-14 at 13:30 UTC.
        let parsed = chart(json!({
            "chart": {
                "result": [{
                    "meta": {"regularMarketPrice": 182.0},
                    "timestamp": [1791811800, 1791898200, 1791984600],
                    "indicators": {"quote": [{"close": [180.5, null, 181.25]}]}
                }],
                "error": null
            }
        }))
        .unwrap();

        let points = parsed.price_points();
        assert_eq!(points.len(), 2);
        assert_eq!(points[0].date, NaiveDate::from_ymd_opt(2026, 10, 12).unwrap());
        assert_eq!(points[0].close, 180.5);
        assert_eq!(points[1].date, NaiveDate::from_ymd_opt(2026, 10, 14).unwrap());
        assert_eq!(parsed.latest_close(), Some(181.25));
    }

    #[test]
    fn latest_close_falls_back_to_meta_price() {
        let parsed = chart(json!({
            "chart": {
                "result": [{
                    "meta": {"regularMarketPrice": 99.5},
                    "indicators": {"quote": [{"close": [null]}]}
                }]
            }
        }))
        .unwrap();
        assert_eq!(parsed.latest_close(), Some(99.5));
    }

    #[test]
    fn empty_result_has_no_close() {
        let parsed = chart(json!({"chart": {"result": [{"meta": {}}]}})).unwrap();
        assert_eq!(parsed.latest_close(), None);
        assert!(parsed.price_points().is_empty());
    }

    #[test]
    fn chart_error_is_surfaced() {
        let res = chart(json!({
            "chart": {
                "result": null,
                "error": {"code": "Not Found", "description": "No data found, symbol may be delisted"}
            }
        }));
        assert!(res.is_err());
    }

    fn provider(base_url: &str) -> YahooQuoteProvider {
        YahooQuoteProvider {
            http: reqwest::Client::new(),
            base_url: base_url.to_string(),
        }
    }

    #[test]
    fn chart_url_keeps_ticker_in_one_segment() {
        let p = provider("https://query2.finance.yahoo.com");
        assert_eq!(
            p.chart_url("BTC-USD").unwrap().as_str(),
            "https://query2.finance.yahoo.com/v8/finance/chart/BTC-USD"
        );

        for hostile in ["../../v1/finance/search", "NVDA?range=max&x=", "A/B#frag"] {
            let url = p.chart_url(hostile).unwrap();
            let segments: Vec<&str> = url.path_segments().unwrap().collect();
            assert_eq!(segments.len(), 4, "{url}");
            assert_eq!(&segments[..3], &["v8", "finance", "chart"], "{url}");
            assert_eq!(url.query(), None, "{url}");
            assert_eq!(url.fragment(), None, "{url}");
        }
    }

    #[test]
    fn url_handles_trailing_slash_base() {
        let p = provider("http://127.0.0.1:9/yahoo/");
        assert_eq!(
            p.url(&["v1", "finance", "search"]).unwrap().as_str(),
            "http://127.0.0.1:9/yahoo/v1/finance/search"
        );
    }

    #[test]
    fn validate_ticker_rejects_path_and_query_characters() {
        for ok in ["NVDA", "BRK.B", "BTC-USD", "^GSPC", "EURUSD=X"] {
            assert!(validate_ticker(ok).is_ok(), "{ok}");
        }
        let too_long = "X".repeat(MAX_TICKER_LEN + 1);
        for bad in ["", "../../v1/finance/search", "NVDA?range=max&x=", "A B", too_long.as_str()] {
            assert!(validate_ticker(bad).is_err(), "{bad}");
        }
    }

    #[tokio::test]
    async fn invalid_ticker_fails_before_any_request() {
        // Port 9 (discard) is never contacted: validation short-circuits.
        let p = provider("http://127.0.0.1:9");
        let err = p.history("../../v1/finance/search").await.unwrap_err();
        assert!(err.to_string().contains("unsupported characters"), "{err}");
    }

    #[test]
    fn search_titles_are_trimmed_and_limited() {
        let res: SearchResponse = serde_json::from_value(json!({
            "news": [{"title": " One "}, {"title": ""}, {"title": "Two"}, {"title": "Three"}]
        }))
        .unwrap();
        assert_eq!(res.titles(2), vec!["One".to_string(), "Two".to_string()]);
    }
}
