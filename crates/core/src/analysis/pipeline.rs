use crate::analysis::prompt::{build_prompt, PromptVariant};
use crate::analysis::validate::{missing_critical_fields, validate_and_fill};
use crate::analysis::{ParserChain, ParserKind};
use crate::domain::{AnalysisMetadata, DateRange, DraftAnalysis, TechnicalAnalysisRecord};
use crate::error::AnalysisError;
use crate::llm::{InferenceClient, InferenceError};
use chrono::Utc;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// More than this many empty critical fields triggers the simplified retry.
pub const ESCALATION_THRESHOLD: usize = 3;

/// Which inference attempt a request is on. There is no state after `Simple`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attempt {
    Detailed,
    Simple,
}

impl Attempt {
    pub fn variant(self) -> PromptVariant {
        match self {
            Attempt::Detailed => PromptVariant::Detailed,
            Attempt::Simple => PromptVariant::Simple,
        }
    }

    /// Transition after an attempt left `missing` critical fields empty.
    pub fn next(self, missing: usize) -> Option<Attempt> {
        match self {
            Attempt::Detailed if missing > ESCALATION_THRESHOLD => Some(Attempt::Simple),
            Attempt::Detailed | Attempt::Simple => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AttemptReport {
    pub variant: PromptVariant,
    pub parser: ParserKind,
    pub missing: Vec<&'static str>,
}

#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub record: TechnicalAnalysisRecord,
    pub attempts: Vec<AttemptReport>,
}

pub struct ChartAnalyzer {
    client: Arc<dyn InferenceClient>,
    parsers: ParserChain,
    call_timeout: Duration,
}

impl ChartAnalyzer {
    pub fn new(client: Arc<dyn InferenceClient>, call_timeout: Duration) -> Result<Self, regex::Error> {
        Ok(Self {
            client,
            parsers: ParserChain::standard()?,
            call_timeout,
        })
    }

    pub fn model(&self) -> &str {
        self.client.model()
    }

    /// Analyze a PNG on disk, typically one the renderer just produced.
    pub async fn analyze_chart_image(
        &self,
        image_path: &Path,
        date_range: DateRange,
    ) -> Result<TechnicalAnalysisRecord, AnalysisError> {
        let image = match tokio::fs::read(image_path).await {
            Ok(bytes) if !bytes.is_empty() => bytes,
            Ok(_) => return Err(unreadable(image_path, "file is empty")),
            Err(err) => {
                tracing::warn!(path = %image_path.display(), error = %err, "chart image unreadable");
                return Err(unreadable(image_path, err));
            }
        };
        tracing::debug!(path = %image_path.display(), bytes = image.len(), "read chart image");

        let outcome = self.analyze_image(&image, date_range).await?;
        Ok(outcome.record)
    }

    /// Run the detailed attempt and, if it came back too sparse, one simplified attempt.
    pub async fn analyze_image(
        &self,
        image_png: &[u8],
        date_range: DateRange,
    ) -> Result<AnalysisOutcome, InferenceError> {
        let metadata = AnalysisMetadata {
            timestamp: Utc::now(),
            model: self.client.model().to_string(),
            date_range,
        };

        let mut attempts = Vec::with_capacity(2);
        let mut attempt = Attempt::Detailed;
        loop {
            let (parser, draft) = self.run_attempt(attempt, image_png, date_range).await?;
            let missing = missing_critical_fields(&draft);
            let record = validate_and_fill(draft, metadata.clone());

            tracing::info!(
                variant = attempt.variant().as_str(),
                parser = ?parser,
                missing = missing.len(),
                %date_range,
                "chart analysis attempt finished"
            );
            let count = missing.len();
            attempts.push(AttemptReport {
                variant: attempt.variant(),
                parser,
                missing,
            });

            match attempt.next(count) {
                Some(next) => {
                    tracing::warn!(
                        missing = count,
                        threshold = ESCALATION_THRESHOLD,
                        "analysis too incomplete; retrying with simplified prompt"
                    );
                    attempt = next;
                }
                None => return Ok(AnalysisOutcome { record, attempts }),
            }
        }
    }

    async fn run_attempt(
        &self,
        attempt: Attempt,
        image_png: &[u8],
        date_range: DateRange,
    ) -> Result<(ParserKind, DraftAnalysis), InferenceError> {
        let prompt = build_prompt(attempt.variant(), date_range);
        let raw = tokio::time::timeout(self.call_timeout, self.client.infer(&prompt, image_png))
            .await
            .map_err(|_| InferenceError::Timeout(self.call_timeout))??;
        Ok(self.parsers.parse(&raw))
    }
}

fn unreadable(path: &Path, reason: impl ToString) -> AnalysisError {
    AnalysisError::ImageUnreadable {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    }
}
