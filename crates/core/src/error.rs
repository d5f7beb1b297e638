//! Error types for the slide-deck enhancement pipeline.

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while extracting, enhancing, or rebuilding a deck.
#[derive(Error, Debug)]
pub enum Error {
    /// Failed to open, read, or write a local file.
    #[error("Failed to read file: {0}")]
    IoError(#[from] std::io::Error),

    /// The request key was missing or did not match the configured passkey.
    #[error("Access Denied: Invalid or missing key")]
    AccessDenied,

    /// The form was submitted without a presentation file.
    #[error("Please upload a presentation file")]
    MissingUpload,

    /// The uploaded file is not a .pptx presentation.
    #[error("Unsupported or unrecognized file format: {0}")]
    UnsupportedFormat(String),

    /// A user-supplied generation parameter is out of range.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// A required secret is absent from every configuration source.
    #[error("Missing required secret: {0}")]
    MissingSecret(String),

    /// The secrets file exists but could not be read or parsed.
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Failed to interpret the PPTX package structure.
    #[error("PPTX parsing error: {0}")]
    PptxParseError(String),

    /// ZIP archive error (for PPTX).
    #[error("ZIP error: {0}")]
    ZipError(String),

    /// XML parsing error (for PPTX).
    #[error("XML parsing error: {0}")]
    XmlError(String),

    /// The language-model service could not be reached or returned an error.
    #[error("Language-model service failure: {0}")]
    ServiceFailure(String),

    /// The language-model reply was not the expected JSON document.
    #[error("Malformed model response: {0}")]
    MalformedResponse(String),

    /// Failed to construct or save the output presentation.
    #[error("Failed to render presentation: {0}")]
    RenderFailure(String),
}

impl Error {
    /// Whether repeating the same request may succeed.
    ///
    /// Only service failures are transient; a malformed reply or a bad
    /// upload will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Error::ServiceFailure(_))
    }
}
