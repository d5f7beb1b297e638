//! Core domain types, configuration, and access control for the
//! slide-deck enhancer.

pub mod config;
pub mod error;
pub mod guard;
pub mod reply;
pub mod types;

pub use config::{Config, OpenAiSettings};
pub use error::{Error, Result};
pub use guard::AccessGuard;
pub use types::{
    EnhancedDeck, ExtractedDeck, GenerationParameters, PresentationFormat, SlideRecord, Upload,
};
