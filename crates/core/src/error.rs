use crate::llm::InferenceError;
use crate::render::RenderError;
use std::path::PathBuf;

/// Everything a caller of the pipeline can see go wrong. Malformed model output is
/// not in here; it degrades to placeholders instead.
#[derive(Debug, thiserror::Error)]
pub enum AnalysisError {
    #[error(transparent)]
    Render(#[from] RenderError),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// A chart image handed in by the caller could not be used.
    #[error("chart image {} is unreadable: {reason}", .path.display())]
    ImageUnreadable { path: PathBuf, reason: String },
}
