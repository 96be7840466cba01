use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chartlens_core::domain::{DateRange, TechnicalAnalysisRecord};
use chartlens_core::llm::gemini::{GeminiClient, GeminiConfig};
use chartlens_core::llm::InferenceError;
use chartlens_core::render::{validate_symbol, CommandRenderer, RenderError};
use chartlens_core::{AnalysisError, ChartAnalyzer, ChartService};

const MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = chartlens_core::config::Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .with(sentry_tracing::layer())
        .init();

    let analyzer = match build_analyzer(&settings) {
        Ok(analyzer) => {
            tracing::info!(model = analyzer.model(), "chart analyzer ready");
            Some(Arc::new(analyzer))
        }
        Err(e) => {
            sentry_anyhow::capture_anyhow(&e);
            tracing::error!(error = %e, "analyzer unavailable; starting API in degraded mode");
            None
        }
    };

    let service = match (&analyzer, CommandRenderer::from_settings(&settings)) {
        (Some(analyzer), Ok(renderer)) => Some(ChartService::new(Arc::new(renderer), analyzer.clone())),
        (None, _) => None,
        (Some(_), Err(e)) => {
            tracing::error!(error = %e, "chart renderer unavailable; captures disabled");
            None
        }
    };

    let state = AppState { analyzer, service };

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/charts/:symbol/analysis", get(capture_and_analyze))
        .route("/analysis", post(analyze_upload))
        .with_state(state)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http());

    let port: u16 = std::env::var("PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3000);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));

    tracing::info!(%addr, "api listening");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

fn build_analyzer(settings: &chartlens_core::config::Settings) -> anyhow::Result<ChartAnalyzer> {
    let client = GeminiClient::new(GeminiConfig::from_settings(settings)?)?;
    Ok(ChartAnalyzer::new(Arc::new(client), settings.inference_timeout)?)
}

async fn healthz() -> &'static str {
    "ok"
}

#[derive(Clone)]
struct AppState {
    analyzer: Option<Arc<ChartAnalyzer>>,
    service: Option<ChartService>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AnalysisQuery {
    date_range: Option<String>,
}

impl AnalysisQuery {
    fn date_range(&self) -> Result<DateRange, ApiError> {
        match self.date_range.as_deref() {
            None => Ok(DateRange::default()),
            Some(raw) => raw
                .parse()
                .map_err(|e| ApiError::new(StatusCode::BAD_REQUEST, format!("{e}"))),
        }
    }
}

async fn capture_and_analyze(
    State(state): State<AppState>,
    Path(symbol): Path<String>,
    Query(query): Query<AnalysisQuery>,
) -> Result<Json<TechnicalAnalysisRecord>, ApiError> {
    let Some(service) = &state.service else {
        return Err(ApiError::unavailable());
    };

    let date_range = query.date_range()?;
    let symbol = validate_symbol(&symbol).map_err(AnalysisError::from)?;

    let record = service.capture_and_analyze(symbol, date_range).await?;
    Ok(Json(record))
}

/// Analyze a PNG sent as the raw request body.
async fn analyze_upload(
    State(state): State<AppState>,
    Query(query): Query<AnalysisQuery>,
    body: Bytes,
) -> Result<Json<TechnicalAnalysisRecord>, ApiError> {
    let Some(analyzer) = &state.analyzer else {
        return Err(ApiError::unavailable());
    };

    let date_range = query.date_range()?;
    if body.is_empty() {
        return Err(ApiError::new(StatusCode::BAD_REQUEST, "request body must be a PNG image"));
    }

    let outcome = analyzer
        .analyze_image(&body, date_range)
        .await
        .map_err(AnalysisError::from)?;
    Ok(Json(outcome.record))
}

#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    fn unavailable() -> Self {
        Self::new(StatusCode::SERVICE_UNAVAILABLE, "chart analysis is not configured")
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        let status = status_for(&err);
        let message = err.to_string();
        if status.is_server_error() {
            tracing::warn!(error = %message, %status, "chart analysis request failed");
            sentry_anyhow::capture_anyhow(&anyhow::Error::new(err));
        }
        Self::new(status, message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

fn status_for(err: &AnalysisError) -> StatusCode {
    match err {
        AnalysisError::Render(RenderError::InvalidSymbol(_))
        | AnalysisError::ImageUnreadable { .. } => StatusCode::BAD_REQUEST,
        AnalysisError::Render(RenderError::Timeout(_))
        | AnalysisError::Inference(InferenceError::Timeout(_)) => StatusCode::GATEWAY_TIMEOUT,
        AnalysisError::Render(_) | AnalysisError::Inference(_) => StatusCode::BAD_GATEWAY,
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

fn init_sentry(settings: &chartlens_core::config::Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::time::Duration;

    #[test]
    fn maps_pipeline_errors_to_statuses() {
        let cases: [(AnalysisError, StatusCode); 6] = [
            (RenderError::InvalidSymbol("..".into()).into(), StatusCode::BAD_REQUEST),
            (RenderError::Timeout(Duration::from_secs(90)).into(), StatusCode::GATEWAY_TIMEOUT),
            (RenderError::ArtifactMissing(PathBuf::from("x.png")).into(), StatusCode::BAD_GATEWAY),
            (
                AnalysisError::ImageUnreadable {
                    path: PathBuf::from("upload.png"),
                    reason: "file is empty".into(),
                },
                StatusCode::BAD_REQUEST,
            ),
            (InferenceError::Timeout(Duration::from_secs(60)).into(), StatusCode::GATEWAY_TIMEOUT),
            (
                InferenceError::Status { status: 429, body: String::new() }.into(),
                StatusCode::BAD_GATEWAY,
            ),
        ];
        for (err, expected) in cases {
            assert_eq!(status_for(&err), expected, "{err}");
        }
    }

    #[test]
    fn date_range_query_defaults_and_rejects_garbage() {
        let q = AnalysisQuery { date_range: None };
        assert_eq!(q.date_range().unwrap(), DateRange::OneMonth);

        let q = AnalysisQuery { date_range: Some("6M".into()) };
        assert_eq!(q.date_range().unwrap(), DateRange::SixMonths);

        let q = AnalysisQuery { date_range: Some("FOREVER".into()) };
        assert_eq!(q.date_range().unwrap_err().status, StatusCode::BAD_REQUEST);
    }
}
