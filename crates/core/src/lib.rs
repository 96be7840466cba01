pub mod analysis;
pub mod domain;
pub mod error;
pub mod llm;
pub mod render;
pub mod service;

pub use analysis::ChartAnalyzer;
pub use error::AnalysisError;
pub use service::ChartService;

pub mod config {
    use crate::llm::gemini::{DEFAULT_BASE_URL, DEFAULT_MODEL, DEFAULT_TIMEOUT_SECS};
    use anyhow::Context;
    use std::path::PathBuf;
    use std::time::Duration;

    pub const DEFAULT_SNAPSHOTS_DIR: &str = "public/snapshots";
    pub const DEFAULT_RENDER_TIMEOUT_SECS: u64 = 90;

    #[derive(Debug, Clone)]
    pub struct Settings {
        pub gemini_api_key: Option<String>,
        pub gemini_model: String,
        pub gemini_base_url: String,
        pub inference_timeout: Duration,
        pub render_command: Option<String>,
        pub snapshots_dir: PathBuf,
        pub render_timeout: Duration,
        pub sentry_dsn: Option<String>,
    }

    impl Settings {
        pub fn from_env() -> anyhow::Result<Self> {
            Self::from_lookup(|key| std::env::var(key).ok())
        }

        /// Build from any key source. Blank values count as unset.
        pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
            let get = |key: &str| {
                lookup(key)
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty())
            };

            Ok(Self {
                gemini_api_key: get("GEMINI_API_KEY").or_else(|| get("AI_API_KEY")),
                gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
                gemini_base_url: get("GEMINI_BASE_URL")
                    .unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
                inference_timeout: secs(
                    get("INFERENCE_TIMEOUT_SECS"),
                    "INFERENCE_TIMEOUT_SECS",
                    DEFAULT_TIMEOUT_SECS,
                )?,
                render_command: get("CHART_RENDER_COMMAND"),
                snapshots_dir: get("SNAPSHOTS_DIR")
                    .map(PathBuf::from)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_SNAPSHOTS_DIR)),
                render_timeout: secs(
                    get("RENDER_TIMEOUT_SECS"),
                    "RENDER_TIMEOUT_SECS",
                    DEFAULT_RENDER_TIMEOUT_SECS,
                )?,
                sentry_dsn: get("SENTRY_DSN"),
            })
        }

        pub fn require_gemini_api_key(&self) -> anyhow::Result<&str> {
            self.gemini_api_key
                .as_deref()
                .context("GEMINI_API_KEY (or AI_API_KEY) is required")
        }

        pub fn require_render_command(&self) -> anyhow::Result<&str> {
            self.render_command
                .as_deref()
                .context("CHART_RENDER_COMMAND is required")
        }
    }

    fn secs(value: Option<String>, key: &str, default: u64) -> anyhow::Result<Duration> {
        let Some(value) = value else {
            return Ok(Duration::from_secs(default));
        };
        let secs: u64 = value
            .parse()
            .with_context(|| format!("{key} must be a whole number of seconds, got {value:?}"))?;
        anyhow::ensure!(secs > 0, "{key} must be greater than zero");
        Ok(Duration::from_secs(secs))
    }

}
