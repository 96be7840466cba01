use std::time::Duration;

/// Fatal failure of a single model call. The pipeline never retries the same prompt.
#[derive(Debug, thiserror::Error)]
pub enum InferenceError {
    #[error("inference request failed: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("inference endpoint returned status={status}: {body}")]
    Status { status: u16, body: String },

    #[error("malformed inference response: {detail}")]
    MalformedResponse {
        detail: String,
        raw_response: Option<String>,
    },

    #[error("inference call timed out after {0:?}")]
    Timeout(Duration),
}

impl InferenceError {
    pub(crate) fn malformed(detail: impl Into<String>, raw_response: Option<String>) -> Self {
        InferenceError::MalformedResponse {
            detail: detail.into(),
            raw_response,
        }
    }
}
