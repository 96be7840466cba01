pub mod command;

pub use command::CommandRenderer;

use crate::domain::DateRange;
use std::path::{Path, PathBuf};
use std::time::Duration;

const MAX_SYMBOL_LEN: usize = 32;

#[derive(Debug, thiserror::Error)]
pub enum RenderError {
    #[error("invalid symbol: {0:?}")]
    InvalidSymbol(String),

    #[error("failed to start renderer {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("renderer exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("renderer timed out after {0:?}")]
    Timeout(Duration),

    #[error("chart artifact not produced at {}", .0.display())]
    ArtifactMissing(PathBuf),

    #[error("renderer io error: {0}")]
    Io(#[from] std::io::Error),
}

/// A PNG on disk that belongs to one request.
///
/// The file is deleted when the artifact is dropped, so a cancelled request
/// cleans up too. `remove` does the same without blocking the runtime.
#[derive(Debug)]
pub struct ChartArtifact {
    path: PathBuf,
    removed: bool,
}

impl ChartArtifact {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn remove(mut self) {
        log_removal(&self.path, tokio::fs::remove_file(&self.path).await);
        self.removed = true;
    }
}

impl Drop for ChartArtifact {
    fn drop(&mut self) {
        if !self.removed {
            log_removal(&self.path, std::fs::remove_file(&self.path));
        }
    }
}

/// A missing file is fine; anything else is only worth a warning.
fn log_removal(path: &Path, result: std::io::Result<()>) {
    match result {
        Ok(()) => tracing::debug!(path = %path.display(), "removed chart artifact"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => {
            tracing::warn!(path = %path.display(), error = %err, "failed to remove chart artifact")
        }
    }
}

/// Produces a chart PNG for a symbol. Implementations live outside the pipeline
/// (a headless browser, a screenshot service, ...).
#[async_trait::async_trait]
pub trait ChartRenderer: Send + Sync {
    async fn render(&self, symbol: &str, date_range: DateRange) -> Result<ChartArtifact, RenderError>;
}

pub fn validate_symbol(symbol: &str) -> Result<&str, RenderError> {
    let symbol = symbol.trim();
    let valid = !symbol.is_empty()
        && symbol.len() <= MAX_SYMBOL_LEN
        && symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | ':' | '_' | '-'))
        && !symbol.starts_with('.');
    if valid {
        Ok(symbol)
    } else {
        Err(RenderError::InvalidSymbol(symbol.to_string()))
    }
}
