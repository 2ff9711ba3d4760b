use async_trait::async_trait;

use super::ExtractionError;
use crate::models::ImageBuffer;

/// OCR engine abstraction (allows mocking for tests)
#[async_trait]
pub trait OcrEngine: Send + Sync {
    /// Recognize plain text in one encoded image. Empty output is not an error.
    async fn recognize(&self, image: &ImageBuffer, language: &str) -> Result<String, ExtractionError>;

    /// Short engine name for logs.
    fn name(&self) -> &str;
}
