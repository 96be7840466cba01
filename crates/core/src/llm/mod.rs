pub mod error;
pub mod gemini;

pub use error::InferenceError;

/// One request to a vision model: instruction text plus a PNG, raw text back.
#[async_trait::async_trait]
pub trait InferenceClient: Send + Sync {
    /// Identifier recorded in `metadata.model`.
    fn model(&self) -> &str;

    async fn infer(&self, prompt: &str, image_png: &[u8]) -> Result<String, InferenceError>;
}
