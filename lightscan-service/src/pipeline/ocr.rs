//! Text recognition boundary.
//!
//! The pipeline only needs `recognize(region, mode) -> text`. Recognition is
//! best-effort: callers go through [`recognize_or_empty`], which logs a
//! failure and carries on with empty text.

use std::process::Command;
use std::sync::Arc;

use image::{GrayImage, ImageFormat};
use tracing::{debug, warn};

use crate::config::{OcrConfig, OcrEngineKind};
use crate::error::RecognitionError;

/// Layout hint passed to the recognizer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecognitionMode {
    /// Multi-line text block (notes, schedule table)
    Block,
    /// Short text around a fixture glyph
    Line,
}

/// A text recognition capability
pub trait TextRecognizer: Send + Sync {
    fn recognize(&self, image: &GrayImage, mode: RecognitionMode)
    -> Result<String, RecognitionError>;

    /// Engine name for logs and health output
    fn name(&self) -> &'static str;

    /// Whether the engine can actually run on this host
    fn is_available(&self) -> bool {
        true
    }
}

/// Recognize text, treating any failure as empty output.
pub fn recognize_or_empty(
    recognizer: &dyn TextRecognizer,
    image: &GrayImage,
    mode: RecognitionMode,
    context: &str,
) -> String {
    match recognizer.recognize(image, mode) {
        Ok(text) => text,
        Err(e) => {
            warn!(
                engine = recognizer.name(),
                context = context,
                error = %e,
                "Text recognition failed, continuing with empty text"
            );
            String::new()
        }
    }
}

/// Build the recognizer selected by configuration.
pub fn build_recognizer(config: &OcrConfig) -> Arc<dyn TextRecognizer> {
    match config.engine {
        OcrEngineKind::TesseractCli => Arc::new(TesseractCli::from_config(config)),
        OcrEngineKind::Disabled => Arc::new(DisabledRecognizer),
        #[cfg(feature = "leptess")]
        OcrEngineKind::Leptess => Arc::new(leptess_engine::LeptessRecognizer::from_config(config)),
        #[cfg(not(feature = "leptess"))]
        OcrEngineKind::Leptess => {
            warn!("leptess engine requested but not compiled in, using tesseract CLI");
            Arc::new(TesseractCli::from_config(config))
        }
    }
}

/// Runs the `tesseract` executable on a temporary PNG per region.
pub struct TesseractCli {
    command: String,
    language: String,
    block_psm: u8,
    line_psm: u8,
}

impl TesseractCli {
    pub fn from_config(config: &OcrConfig) -> Self {
        Self {
            command: config.command.clone(),
            language: config.language.clone(),
            block_psm: config.block_psm,
            line_psm: config.line_psm,
        }
    }

    fn psm(&self, mode: RecognitionMode) -> u8 {
        match mode {
            RecognitionMode::Block => self.block_psm,
            RecognitionMode::Line => self.line_psm,
        }
    }
}

impl TextRecognizer for TesseractCli {
    fn recognize(
        &self,
        image: &GrayImage,
        mode: RecognitionMode,
    ) -> Result<String, RecognitionError> {
        let input = tempfile::Builder::new()
            .prefix("lightscan-ocr-")
            .suffix(".png")
            .tempfile()
            .map_err(|e| RecognitionError::Image(Box::new(e)))?;

        image
            .save_with_format(input.path(), ImageFormat::Png)
            .map_err(|e| RecognitionError::Image(Box::new(e)))?;

        let output = Command::new(&self.command)
            .arg(input.path())
            .arg("stdout")
            .arg("--psm")
            .arg(self.psm(mode).to_string())
            .arg("-l")
            .arg(&self.language)
            .output()
            .map_err(|e| RecognitionError::Engine(format!("{}: {}", self.command, e)))?;

        if !output.status.success() {
            return Err(RecognitionError::Failed {
                status: output.status.to_string(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        let text = String::from_utf8_lossy(&output.stdout).into_owned();
        debug!(
            width = image.width(),
            height = image.height(),
            mode = ?mode,
            chars = text.len(),
            "Tesseract recognized region"
        );
        Ok(text)
    }

    fn name(&self) -> &'static str {
        "tesseract_cli"
    }

    fn is_available(&self) -> bool {
        Command::new(&self.command)
            .arg("--version")
            .output()
            .map(|o| o.status.success())
            .unwrap_or(false)
    }
}

/// Recognizes nothing. Every detection resolves to `UNKNOWN`.
pub struct DisabledRecognizer;

impl TextRecognizer for DisabledRecognizer {
    fn recognize(&self, _: &GrayImage, _: RecognitionMode) -> Result<String, RecognitionError> {
        Ok(String::new())
    }

    fn name(&self) -> &'static str {
        "disabled"
    }

    fn is_available(&self) -> bool {
        false
    }
}

#[cfg(feature = "leptess")]
mod leptess_engine {
    use image::{GrayImage, ImageFormat};
    use leptess::{LepTess, Variable};

    use super::{RecognitionMode, TextRecognizer};
    use crate::config::OcrConfig;
    use crate::error::RecognitionError;

    /// In-process Tesseract. A fresh engine per call since `LepTess` is not `Sync`.
    pub struct LeptessRecognizer {
        language: String,
        block_psm: u8,
        line_psm: u8,
    }

    impl LeptessRecognizer {
        pub fn from_config(config: &OcrConfig) -> Self {
            Self {
                language: config.language.clone(),
                block_psm: config.block_psm,
                line_psm: config.line_psm,
            }
        }
    }

    impl TextRecognizer for LeptessRecognizer {
        fn recognize(
            &self,
            image: &GrayImage,
            mode: RecognitionMode,
        ) -> Result<String, RecognitionError> {
            let mut engine = LepTess::new(None, &self.language)
                .map_err(|e| RecognitionError::Engine(format!("{:?}", e)))?;

            let psm = match mode {
                RecognitionMode::Block => self.block_psm,
                RecognitionMode::Line => self.line_psm,
            };
            engine
                .set_variable(Variable::TesseditPagesegMode, &psm.to_string())
                .map_err(|e| RecognitionError::Engine(format!("{:?}", e)))?;

            let mut png = std::io::Cursor::new(Vec::new());
            image
                .write_to(&mut png, ImageFormat::Png)
                .map_err(|e| RecognitionError::Image(Box::new(e)))?;
            engine
                .set_image_from_mem(png.get_ref())
                .map_err(|e| RecognitionError::Engine(format!("{:?}", e)))?;

            engine.get_utf8_text().map_err(|e| RecognitionError::Failed {
                status: "utf8".to_string(),
                stderr: e.to_string(),
            })
        }

        fn name(&self) -> &'static str {
            "leptess"
        }
    }
}

/// Recognizer backed by a closure, for driving the pipeline in tests
#[cfg(test)]
pub(crate) struct FnRecognizer<F>(F);

#[cfg(test)]
pub(crate) fn scripted<F>(f: F) -> FnRecognizer<F>
where
    F: Fn(&GrayImage, RecognitionMode) -> Result<String, RecognitionError> + Send + Sync,
{
    FnRecognizer(f)
}

#[cfg(test)]
impl<F> TextRecognizer for FnRecognizer<F>
where
    F: Fn(&GrayImage, RecognitionMode) -> Result<String, RecognitionError> + Send + Sync,
{
    fn recognize(
        &self,
        image: &GrayImage,
        mode: RecognitionMode,
    ) -> Result<String, RecognitionError> {
        (self.0)(image, mode)
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}
