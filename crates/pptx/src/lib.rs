//! PPTX (Office Open XML) backend for the slide-deck enhancer.
//!
//! [`PptxParser`] reads the text of an uploaded deck; [`PptxBuilder`]
//! writes a new, styled deck from structured slide data.

pub mod builder;
pub mod parser;
mod parts;

pub use builder::PptxBuilder;
pub use parser::PptxParser;
