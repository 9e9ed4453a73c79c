//! Generation capabilities.
//!
//! The pipeline only depends on these traits. The implementations shipped
//! here are deterministic local stand-ins: a template echo for text and a
//! hash-coloured PNG for images.

use std::io::Cursor;

use async_trait::async_trait;
use image::{ImageFormat, Rgb, RgbImage};
use sha2::{Digest, Sha256};
use studio_core::artifact_path::{CONTENT_TYPE_MARKDOWN, CONTENT_TYPE_PNG};

#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The backing model or service failed or refused the request.
    #[error("Generation backend failed: {0}")]
    Backend(String),

    #[error("Failed to encode generated output: {0}")]
    Encoding(String),
}

/// Output of a generator together with its MIME type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedContent {
    pub data: Vec<u8>,
    pub content_type: String,
}

#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(&self, prompt: &str) -> Result<String, GenerationError>;

    /// MIME type of the text this generator produces.
    fn content_type(&self) -> &str {
        CONTENT_TYPE_MARKDOWN
    }
}

#[async_trait]
pub trait ImageGenerator: Send + Sync {
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedContent, GenerationError>;
}

// ---------------------------------------------------------------------------
// Local implementations
// ---------------------------------------------------------------------------

/// Echoes the rendered prompt under a heading.
#[derive(Debug, Clone)]
pub struct TemplateTextGenerator {
    heading: String,
}

impl Default for TemplateTextGenerator {
    fn default() -> Self {
        Self {
            heading: "Draft".to_string(),
        }
    }
}

impl TemplateTextGenerator {
    pub fn new(heading: impl Into<String>) -> Self {
        Self {
            heading: heading.into(),
        }
    }
}

#[async_trait]
impl TextGenerator for TemplateTextGenerator {
    async fn generate_text(&self, prompt: &str) -> Result<String, GenerationError> {
        Ok(format!("# {}\n\n{}\n", self.heading, prompt.trim()))
    }
}

/// Placeholder keyframe width in pixels (16:9).
const PLACEHOLDER_WIDTH: u32 = 160;
const PLACEHOLDER_HEIGHT: u32 = 90;

/// Renders a vertical gradient whose colours are derived from the prompt hash,
/// so identical prompts give identical images.
#[derive(Debug, Clone, Default)]
pub struct PlaceholderImageGenerator;

impl PlaceholderImageGenerator {
    fn render(prompt: &str) -> Result<Vec<u8>, GenerationError> {
        let digest = Sha256::digest(prompt.as_bytes());
        let top = [digest[0], digest[1], digest[2]];
        let bottom = [digest[3], digest[4], digest[5]];

        let img = RgbImage::from_fn(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT, |_, y| {
            let t = y as f32 / (PLACEHOLDER_HEIGHT - 1) as f32;
            let mix = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * t).round() as u8;
            Rgb([
                mix(top[0], bottom[0]),
                mix(top[1], bottom[1]),
                mix(top[2], bottom[2]),
            ])
        });

        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, ImageFormat::Png)
            .map_err(|e| GenerationError::Encoding(e.to_string()))?;
        Ok(buf.into_inner())
    }
}

#[async_trait]
impl ImageGenerator for PlaceholderImageGenerator {
    async fn generate_image(&self, prompt: &str) -> Result<GeneratedContent, GenerationError> {
        let data = Self::render(prompt)?;
        tracing::debug!(bytes = data.len(), "Placeholder keyframe rendered");
        Ok(GeneratedContent {
            data,
            content_type: CONTENT_TYPE_PNG.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PNG_MAGIC: &[u8] = &[0x89, b'P', b'N', b'G'];

    #[tokio::test]
    async fn text_generator_echoes_prompt() {
        let text = TemplateTextGenerator::default()
            .generate_text("  Write a synopsis.  ")
            .await
            .unwrap();
        assert_eq!(text, "# Draft\n\nWrite a synopsis.\n");
    }

    #[tokio::test]
    async fn placeholder_image_is_png() {
        let out = PlaceholderImageGenerator
            .generate_image("sunset over the harbour")
            .await
            .unwrap();
        assert_eq!(out.content_type, "image/png");
        assert!(out.data.starts_with(PNG_MAGIC));
    }

    #[tokio::test]
    async fn placeholder_image_is_deterministic_per_prompt() {
        let a = PlaceholderImageGenerator.generate_image("a").await.unwrap();
        let a2 = PlaceholderImageGenerator.generate_image("a").await.unwrap();
        let b = PlaceholderImageGenerator.generate_image("b").await.unwrap();
        assert_eq!(a, a2);
        assert_ne!(a.data, b.data);
    }
}
