//! Instruction text sent to the model.

use deck_core::{Error, ExtractedDeck, GenerationParameters, Result};

pub const SYSTEM_PROMPT: &str =
    "You are a presentation designer. Improve structure of presentation slides and return clean JSON.";

/// The reply shape the model is asked to follow. Valid JSON on its own.
pub const EXAMPLE_REPLY: &str = r#"{
  "title": "Title",
  "slides": [
    {
      "heading": "Slide title",
      "bullet_points": ["...", "..."],
      "chart_type": "bar"
    }
  ]
}"#;

/// Compose the user message from the parameters and the extracted slides.
pub fn user_prompt(params: &GenerationParameters, deck: &ExtractedDeck) -> Result<String> {
    let slides = serde_json::to_string_pretty(deck)
        .map_err(|e| Error::InvalidParameter(format!("Cannot serialize extracted slides: {}", e)))?;

    Ok(format!(
        "Topic: {topic}
Slides to improve:
{slides}

Instructions:
- Target slide count: ~{count}
- Style: {style}
- Add chart_type (bar, pie, line) when appropriate; it is optional
- Return only valid JSON like:
{EXAMPLE_REPLY}
",
        topic = params.topic,
        count = params.target_slide_count,
        style = params.style,
    ))
}
