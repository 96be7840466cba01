use anyhow::Context;
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use chartlens_core::config::Settings;
use chartlens_core::domain::DateRange;
use chartlens_core::llm::gemini::{GeminiClient, GeminiConfig};
use chartlens_core::render::CommandRenderer;
use chartlens_core::{ChartAnalyzer, ChartService};

#[derive(Debug, Parser)]
#[command(name = "chartlens", about = "Technical analysis of stock chart images")]
struct Args {
    /// Analyze an existing chart PNG.
    #[arg(long, conflicts_with = "symbol", required_unless_present = "symbol")]
    image: Option<PathBuf>,

    /// Render a chart for this symbol first (needs CHART_RENDER_COMMAND).
    #[arg(long)]
    symbol: Option<String>,

    /// ONE_DAY, FIVE_DAYS, ... or a range code such as 6M.
    #[arg(long, default_value = "ONE_MONTH")]
    date_range: DateRange,

    /// Write the record here instead of stdout.
    #[arg(long)]
    output: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let settings = Settings::from_env()?;
    let _sentry_guard = init_sentry(&settings);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(sentry_tracing::layer())
        .init();

    let args = Args::parse();

    let result = run(&settings, &args).await;
    if let Err(err) = &result {
        sentry_anyhow::capture_anyhow(err);
        tracing::error!(error = %format!("{err:#}"), "chart analysis failed");
    }
    result
}

async fn run(settings: &Settings, args: &Args) -> anyhow::Result<()> {
    let client = GeminiClient::new(GeminiConfig::from_settings(settings)?)?;
    let analyzer = Arc::new(ChartAnalyzer::new(Arc::new(client), settings.inference_timeout)?);

    let record = match (&args.image, &args.symbol) {
        (Some(image), _) => analyzer
            .analyze_chart_image(image, args.date_range)
            .await
            .with_context(|| format!("analyze {}", image.display()))?,
        (None, Some(symbol)) => {
            let renderer = CommandRenderer::from_settings(settings)?;
            ChartService::new(Arc::new(renderer), analyzer)
                .capture_and_analyze(symbol, args.date_range)
                .await
                .with_context(|| format!("capture and analyze {symbol}"))?
        }
        (None, None) => anyhow::bail!("either --image or --symbol is required"),
    };

    let json = serde_json::to_string_pretty(&record)?;
    match &args.output {
        Some(path) => {
            std::fs::write(path, format!("{json}\n"))
                .with_context(|| format!("write {}", path.display()))?;
            tracing::info!(path = %path.display(), "wrote analysis record");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn init_sentry(settings: &Settings) -> Option<sentry::ClientInitGuard> {
    let dsn = settings.sentry_dsn.as_deref()?;
    Some(sentry::init((
        dsn,
        sentry::ClientOptions {
            release: sentry::release_name!(),
            ..Default::default()
        },
    )))
}
