use crate::analysis::ChartAnalyzer;
use crate::domain::{DateRange, TechnicalAnalysisRecord};
use crate::error::AnalysisError;
use crate::render::{ChartRenderer, RenderError};
use std::path::Path;
use std::sync::Arc;

/// Render-then-analyze for a symbol. The rendered PNG never outlives the call,
/// even when the call is cancelled part way.
#[derive(Clone)]
pub struct ChartService {
    renderer: Arc<dyn ChartRenderer>,
    analyzer: Arc<ChartAnalyzer>,
}

impl ChartService {
    pub fn new(renderer: Arc<dyn ChartRenderer>, analyzer: Arc<ChartAnalyzer>) -> Self {
        Self { renderer, analyzer }
    }

    pub async fn analyze_chart_image(
        &self,
        image_path: &Path,
        date_range: DateRange,
    ) -> Result<TechnicalAnalysisRecord, AnalysisError> {
        self.analyzer.analyze_chart_image(image_path, date_range).await
    }

    pub async fn capture_and_analyze(
        &self,
        symbol: &str,
        date_range: DateRange,
    ) -> Result<TechnicalAnalysisRecord, AnalysisError> {
        let artifact = self.renderer.render(symbol, date_range).await?;
        let result = match self
            .analyzer
            .analyze_chart_image(artifact.path(), date_range)
            .await
        {
            // The renderer claimed success, so an unusable file is its failure.
            Err(AnalysisError::ImageUnreadable { path, .. }) => {
                Err(RenderError::ArtifactMissing(path).into())
            }
            other => other,
        };
        artifact.remove().await;

        match &result {
            Ok(_) => tracing::info!(%symbol, %date_range, "chart captured and analyzed"),
            Err(err) => tracing::warn!(%symbol, %date_range, error = %err, "chart analysis failed"),
        }
        result
    }
}
