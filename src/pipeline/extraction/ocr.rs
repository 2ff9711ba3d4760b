use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::types::OcrEngine;
use super::ExtractionError;
use crate::models::ImageBuffer;

/// Tesseract driven through its command-line binary.
///
/// Each call writes the image to a scratch file and runs
/// `tesseract <file> stdout -l <lang>`, returning whatever it prints.
pub struct TesseractCli {
    binary: PathBuf,
}

impl TesseractCli {
    pub fn new() -> Self {
        Self {
            binary: PathBuf::from("tesseract"),
        }
    }

    /// Use a specific binary instead of `tesseract` from `PATH`.
    pub fn with_binary(path: &Path) -> Self {
        Self {
            binary: path.to_path_buf(),
        }
    }
}

impl Default for TesseractCli {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl OcrEngine for TesseractCli {
    async fn recognize(&self, image: &ImageBuffer, language: &str) -> Result<String, ExtractionError> {
        if image.is_empty() {
            return Err(ExtractionError::EmptyImage);
        }

        let scratch = tempfile::Builder::new()
            .prefix("bapp-ocr-")
            .suffix(&format!(".{}", image.extension()))
            .tempfile()?;
        tokio::fs::write(scratch.path(), image.as_bytes()).await?;

        let mut cmd = Command::new(&self.binary);
        cmd.arg(scratch.path()).arg("stdout");
        if !language.trim().is_empty() {
            cmd.arg("-l").arg(language.trim());
        }

        let output = cmd.kill_on_drop(true).output().await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ExtractionError::EngineUnavailable(format!(
                    "'{}' not found: {e}",
                    self.binary.display()
                ))
            } else {
                ExtractionError::Io(e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExtractionError::OcrProcessing(format!(
                "tesseract exited with {}: {}",
                output.status,
                stderr.trim()
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        tracing::debug!(chars = text.len(), language, "Tesseract recognition complete");
        Ok(text)
    }

    fn name(&self) -> &str {
        "tesseract"
    }
}

/// Mock OCR engine for unit testing without Tesseract.
pub struct MockOcrEngine {
    text: String,
    failure: Option<String>,
    by_image: HashMap<Vec<u8>, String>,
    delay: Option<Duration>,
    calls: AtomicUsize,
    languages: Mutex<Vec<String>>,
}

impl MockOcrEngine {
    pub fn new(text: &str) -> Self {
        Self {
            text: text.to_string(),
            failure: None,
            by_image: HashMap::new(),
            delay: None,
            calls: AtomicUsize::new(0),
            languages: Mutex::new(Vec::new()),
        }
    }

    /// Engine whose every call fails with `message`.
    pub fn failing(message: &str) -> Self {
        let mut engine = Self::new("");
        engine.failure = Some(message.to_string());
        engine
    }

    /// Return `text` for images whose bytes equal `image`.
    pub fn with_text_for(mut self, image: &[u8], text: &str) -> Self {
        self.by_image.insert(image.to_vec(), text.to_string());
        self
    }

    /// Sleep before answering, to keep a document in `processing`.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn languages(&self) -> Vec<String> {
        self.languages
            .lock()
            .map(|l| l.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

#[async_trait]
impl OcrEngine for MockOcrEngine {
    async fn recognize(&self, image: &ImageBuffer, language: &str) -> Result<String, ExtractionError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.languages.lock() {
            Ok(mut l) => l.push(language.to_string()),
            Err(poisoned) => poisoned.into_inner().push(language.to_string()),
        }

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(message) = &self.failure {
            return Err(ExtractionError::OcrProcessing(message.clone()));
        }

        Ok(self
            .by_image
            .get(image.as_bytes())
            .cloned()
            .unwrap_or_else(|| self.text.clone()))
    }

    fn name(&self) -> &str {
        "mock"
    }
}
