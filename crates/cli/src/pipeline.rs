//! The request pipeline: access check, extraction, enhancement, rendering.

use deck_core::{
    AccessGuard, EnhancedDeck, Error, ExtractedDeck, GenerationParameters, Result, Upload,
};
use deck_llm::{ChatCompletion, Enhancer};
use deck_pptx::{PptxBuilder, PptxParser};
use std::io::Cursor;
use std::path::PathBuf;

/// Name offered for the generated file.
pub const OUTPUT_FILE_NAME: &str = "enhanced_presentation.pptx";

/// Everything the form collects besides the access key.
#[derive(Debug, Clone)]
pub struct FormSubmission {
    pub upload: Option<Upload>,
    pub topic: String,
    pub slide_count: u8,
    pub style: String,
}

/// The generated presentation, ready to hand to the user.
#[derive(Debug, Clone)]
pub struct Artifact {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Receives each intermediate result as soon as it exists.
///
/// Display only; an observer cannot stop the pipeline.
pub trait StageObserver {
    fn extracted(&mut self, deck: &ExtractedDeck);
    fn enhanced(&mut self, deck: &EnhancedDeck);
}

/// Sequences guard, extractor, enhancer, and builder for one submission.
pub struct Pipeline<C> {
    guard: AccessGuard,
    enhancer: Enhancer<C>,
    builder: PptxBuilder,
    temp_dir: Option<PathBuf>,
}

impl<C: ChatCompletion> Pipeline<C> {
    pub fn new(guard: AccessGuard, client: C) -> Self {
        Self {
            guard,
            enhancer: Enhancer::new(client),
            builder: PptxBuilder::new(),
            temp_dir: None,
        }
    }

    /// Render into `dir` instead of the system temporary directory.
    #[cfg(test)]
    pub fn with_temp_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.temp_dir = Some(dir.into());
        self
    }

    /// Reject the request unless `key` matches the configured passkey.
    pub fn authorize(&self, key: Option<&str>) -> Result<()> {
        self.guard.check(key)
    }

    /// Process one form submission.
    pub fn run(
        &self,
        key: Option<&str>,
        form: &FormSubmission,
        observer: &mut dyn StageObserver,
    ) -> Result<Artifact> {
        self.authorize(key)?;

        let upload = form.upload.as_ref().ok_or(Error::MissingUpload)?;
        upload.validate()?;
        let params = GenerationParameters::new(&form.topic, form.slide_count, &form.style)?;

        log::info!("Extracting slides from {}", upload.filename);
        let extracted = PptxParser::new().parse(Cursor::new(&upload.bytes))?;
        log::info!("Extracted {} slides", extracted.len());
        observer.extracted(&extracted);

        let reply = self.enhancer.enhance(&params, &extracted)?;
        let enhanced = EnhancedDeck::from_reply(&reply)?;
        log::info!("Model proposed {} slides", enhanced.slides.len());
        observer.enhanced(&enhanced);

        let bytes = self.render(&enhanced)?;

        Ok(Artifact {
            file_name: OUTPUT_FILE_NAME.to_string(),
            bytes,
        })
    }

    /// Build into a temporary file and read it back.
    ///
    /// The temporary file is removed when `temp` drops, whichever way this
    /// function returns.
    fn render(&self, deck: &EnhancedDeck) -> Result<Vec<u8>> {
        let mut options = tempfile::Builder::new();
        options.prefix("deck-").suffix(".pptx");
        let temp = match &self.temp_dir {
            Some(dir) => options.tempfile_in(dir)?,
            None => options.tempfile()?,
        };

        let path = self.builder.save(deck, temp.path())?;
        let bytes = std::fs::read(&path)?;
        log::debug!("Rendered {} bytes via {}", bytes.len(), path.display());

        Ok(bytes)
    }
}
