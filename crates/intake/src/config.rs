//! Intake configuration loaded from environment variables.

use chrono::Duration;
use common::OrderId;

/// Output format of the tracing subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            LogFormat::Json
        } else {
            LogFormat::Text
        }
    }
}

/// Intake configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `DEDUP_WINDOW_SECS` — dedup window in seconds (default: `300`)
/// - `TRACKING_BASE_URL` — prefix for tracking links (default: `"http://localhost:3000"`)
/// - `MATCH_MIN_SIMILARITY` — product name match threshold (default: `0.5`)
/// - `DATABASE_URL` — PostgreSQL connection string (optional)
/// - `RUST_LOG` — tracing filter directive (default: `"info"`)
/// - `LOG_FORMAT` — `text` or `json` (default: `text`)
#[derive(Debug, Clone, PartialEq)]
pub struct IntakeConfig {
    pub dedup_window_secs: u64,
    pub tracking_base_url: String,
    pub min_similarity: f64,
    pub database_url: Option<String>,
    pub log_filter: String,
    pub log_format: LogFormat,
}

impl IntakeConfig {
    pub const DEFAULT_DEDUP_WINDOW_SECS: u64 = 300;
    pub const DEFAULT_TRACKING_BASE_URL: &'static str = "http://localhost:3000";
    pub const DEFAULT_MIN_SIMILARITY: f64 = 0.5;

    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        let defaults = Self::default();

        Self {
            dedup_window_secs: std::env::var("DEDUP_WINDOW_SECS")
                .ok()
                .and_then(|v| v.trim().parse().ok())
                .unwrap_or(defaults.dedup_window_secs),
            tracking_base_url: std::env::var("TRACKING_BASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(|v| trim_base_url(&v))
                .unwrap_or(defaults.tracking_base_url),
            min_similarity: std::env::var("MATCH_MIN_SIMILARITY")
                .ok()
                .and_then(|v| v.trim().parse::<f64>().ok())
                .filter(|v| v.is_finite())
                .map(|v| v.clamp(0.0, 1.0))
                .unwrap_or(defaults.min_similarity),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            log_filter: std::env::var("RUST_LOG").unwrap_or(defaults.log_filter),
            log_format: std::env::var("LOG_FORMAT")
                .map(|v| LogFormat::parse(&v))
                .unwrap_or_default(),
        }
    }

    /// The dedup window as a duration.
    pub fn dedup_window(&self) -> Duration {
        i64::try_from(self.dedup_window_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .unwrap_or(Duration::MAX)
    }

    /// Returns `<base>/track-order/<id>`.
    pub fn tracking_link(&self, order_id: OrderId) -> String {
        format!("{}/track-order/{}", self.tracking_base_url, order_id)
    }
}

fn trim_base_url(url: &str) -> String {
    url.trim().trim_end_matches('/').to_string()
}

impl Default for IntakeConfig {
    fn default() -> Self {
        Self {
            dedup_window_secs: Self::DEFAULT_DEDUP_WINDOW_SECS,
            tracking_base_url: Self::DEFAULT_TRACKING_BASE_URL.to_string(),
            min_similarity: Self::DEFAULT_MIN_SIMILARITY,
            database_url: None,
            log_filter: "info".to_string(),
            log_format: LogFormat::Text,
        }
    }
}
