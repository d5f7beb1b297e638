//! Domain types for extracted and enhanced slide decks.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Title used when the enhanced deck does not carry one.
pub const DEFAULT_TITLE: &str = "Untitled Presentation";

/// Allowed range for the requested number of slides.
pub const SLIDE_COUNT_RANGE: std::ops::RangeInclusive<u8> = 3..=20;

/// The per-slide unit of content: a heading, its bullets, and an optional chart tag.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlideRecord {
    /// Slide heading. Empty when the source slide had no title shape.
    #[serde(default)]
    pub heading: String,

    /// Bullet texts, rendered top-to-bottom in this order.
    #[serde(default)]
    pub bullet_points: Vec<String>,

    /// Chart kind suggested by the model ("bar", "pie", "line", ...).
    /// Not validated; only ever rendered as a label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chart_type: Option<String>,
}

impl SlideRecord {
    /// Create a record with the given heading and no bullets.
    pub fn new(heading: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
            bullet_points: Vec::new(),
            chart_type: None,
        }
    }

    /// Add a bullet to this record.
    pub fn add_bullet(&mut self, text: impl Into<String>) {
        self.bullet_points.push(text.into());
    }

    /// Builder-style chart tag.
    pub fn with_chart_type(mut self, chart_type: impl Into<String>) -> Self {
        self.chart_type = Some(chart_type.into());
        self
    }

    /// The chart tag, if it is present and non-empty.
    pub fn chart_label(&self) -> Option<&str> {
        self.chart_type.as_deref().filter(|c| !c.is_empty())
    }
}

/// Slides extracted from an uploaded presentation, in source order.
///
/// Serializes as a bare JSON array so it can be embedded in the model
/// instruction as-is.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ExtractedDeck {
    pub slides: Vec<SlideRecord>,
}

impl ExtractedDeck {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a slide record.
    pub fn push(&mut self, slide: SlideRecord) {
        self.slides.push(slide);
    }

    pub fn len(&self) -> usize {
        self.slides.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slides.is_empty()
    }
}

/// The restructured deck returned by the language model.
///
/// Every field is optional on the wire; absent values fall back to
/// defaults when the deck is rendered.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnhancedDeck {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default)]
    pub slides: Vec<SlideRecord>,
}

impl EnhancedDeck {
    /// Create a deck with the given title and no slides.
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: Some(title.into()),
            slides: Vec::new(),
        }
    }

    /// Title for the cover slide, falling back to [`DEFAULT_TITLE`] when absent.
    pub fn title_or_default(&self) -> &str {
        self.title.as_deref().unwrap_or(DEFAULT_TITLE)
    }

    /// Number of slides a rendered file will contain: the cover plus one per record.
    pub fn rendered_slide_count(&self) -> usize {
        1 + self.slides.len()
    }
}

/// User-supplied knobs for one enhancement request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationParameters {
    pub topic: String,
    pub target_slide_count: u8,
    pub style: String,
}

impl GenerationParameters {
    /// Build parameters, rejecting a slide count outside [`SLIDE_COUNT_RANGE`].
    pub fn new(
        topic: impl Into<String>,
        target_slide_count: u8,
        style: impl Into<String>,
    ) -> Result<Self> {
        if !SLIDE_COUNT_RANGE.contains(&target_slide_count) {
            return Err(Error::InvalidParameter(format!(
                "slide count must be between {} and {}, got {}",
                SLIDE_COUNT_RANGE.start(),
                SLIDE_COUNT_RANGE.end(),
                target_slide_count
            )));
        }

        Ok(Self {
            topic: topic.into(),
            target_slide_count,
            style: style.into(),
        })
    }
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            topic: "AI in Healthcare".to_string(),
            target_slide_count: 6,
            style: "Professional, modern, minimal".to_string(),
        }
    }
}

/// The format of an uploaded presentation file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PresentationFormat {
    /// Modern PPTX (Office Open XML).
    Pptx,
}

impl PresentationFormat {
    /// Detect format from file extension.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pptx" => Some(Self::Pptx),
            _ => None,
        }
    }

    /// Detect format from file magic bytes.
    pub fn from_magic(bytes: &[u8]) -> Option<Self> {
        // PPTX is a ZIP file (PK\x03\x04)
        if bytes.starts_with(&[0x50, 0x4B, 0x03, 0x04]) {
            return Some(Self::Pptx);
        }

        None
    }
}

/// A file submitted through the upload field.
#[derive(Debug, Clone)]
pub struct Upload {
    /// Original filename (without path).
    pub filename: String,
    pub bytes: Vec<u8>,
}

impl Upload {
    pub fn new(filename: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            bytes,
        }
    }

    /// Confirm the upload is a .pptx by both extension and content.
    pub fn validate(&self) -> Result<PresentationFormat> {
        let by_extension = self
            .filename
            .rsplit_once('.')
            .and_then(|(_, ext)| PresentationFormat::from_extension(ext));
        if by_extension.is_none() {
            return Err(Error::UnsupportedFormat(format!(
                "'{}' is not a .pptx file",
                self.filename
            )));
        }

        PresentationFormat::from_magic(&self.bytes).ok_or_else(|| {
            Error::UnsupportedFormat(format!("'{}' is not a ZIP-based presentation", self.filename))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extracted_deck_serializes_as_array() {
        let mut deck = ExtractedDeck::new();
        let mut slide = SlideRecord::new("Intro");
        slide.add_bullet("Welcome");
        deck.push(slide);

        let json = serde_json::to_string(&deck).unwrap();
        assert_eq!(json, r#"[{"heading":"Intro","bullet_points":["Welcome"]}]"#);
    }

    #[test]
    fn test_enhanced_deck_tolerates_missing_fields() {
        let deck: EnhancedDeck = serde_json::from_str(r#"{"slides":[{}]}"#).unwrap();
        assert_eq!(deck.title_or_default(), DEFAULT_TITLE);
        assert_eq!(deck.slides.len(), 1);
        assert_eq!(deck.slides[0].heading, "");
        assert!(deck.slides[0].bullet_points.is_empty());
        assert_eq!(deck.rendered_slide_count(), 2);
    }

    #[test]
    fn test_empty_title_is_kept() {
        let deck: EnhancedDeck = serde_json::from_str(r#"{"title":""}"#).unwrap();
        assert_eq!(deck.title_or_default(), "");
    }

    #[test]
    fn test_chart_label_ignores_empty_tag() {
        assert_eq!(SlideRecord::new("a").chart_label(), None);
        assert_eq!(SlideRecord::new("a").with_chart_type("").chart_label(), None);
        assert_eq!(
            SlideRecord::new("a").with_chart_type("pie").chart_label(),
            Some("pie")
        );
    }

    #[test]
    fn test_generation_parameters_bounds() {
        assert!(GenerationParameters::new("t", 3, "s").is_ok());
        assert!(GenerationParameters::new("t", 20, "s").is_ok());
        assert!(matches!(
            GenerationParameters::new("t", 2, "s"),
            Err(Error::InvalidParameter(_))
        ));
        assert!(matches!(
            GenerationParameters::new("t", 21, "s"),
            Err(Error::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_default_parameters_match_form_defaults() {
        let params = GenerationParameters::default();
        assert_eq!(params.topic, "AI in Healthcare");
        assert_eq!(params.target_slide_count, 6);
        assert_eq!(params.style, "Professional, modern, minimal");
    }

    #[test]
    fn test_format_detection() {
        assert_eq!(PresentationFormat::from_extension("PPTX"), Some(PresentationFormat::Pptx));
        assert_eq!(PresentationFormat::from_extension("ppt"), None);
        assert_eq!(
            PresentationFormat::from_magic(b"PK\x03\x04rest"),
            Some(PresentationFormat::Pptx)
        );
        assert_eq!(PresentationFormat::from_magic(b"PK"), None);
    }

    #[test]
    fn test_upload_validation() {
        let ok = Upload::new("deck.pptx", b"PK\x03\x04....".to_vec());
        assert_eq!(ok.validate().unwrap(), PresentationFormat::Pptx);

        let wrong_ext = Upload::new("deck.pdf", b"PK\x03\x04....".to_vec());
        assert!(matches!(wrong_ext.validate(), Err(Error::UnsupportedFormat(_))));

        let wrong_bytes = Upload::new("deck.pptx", b"not a zip".to_vec());
        assert!(matches!(wrong_bytes.validate(), Err(Error::UnsupportedFormat(_))));
    }
}
