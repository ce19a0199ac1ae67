#[cfg(test)]
pub mod fake;
pub mod gemini;
pub mod media;
pub mod prompts;

use async_trait::async_trait;

use crate::error::GenerationError;
use crate::models::{CreatorAttributes, ImagePayload, Persona, ReferenceImage};

pub use gemini::{GeminiClient, GeminiSettings};

/// The four model capabilities the pipelines are built on.
///
/// Implementations resolve a credential before doing anything else and issue
/// exactly one request per call.
#[async_trait]
pub trait GenerationClient: Send + Sync {
    async fn analyze_image(&self, image: &ReferenceImage) -> Result<Persona, GenerationError>;

    async fn plan_story(
        &self,
        persona: &Persona,
        scenario: Option<&str>,
    ) -> Result<Vec<String>, GenerationError>;

    async fn generate_image(
        &self,
        reference: &ReferenceImage,
        scene: &str,
    ) -> Result<ImagePayload, GenerationError>;

    async fn generate_from_attributes(
        &self,
        attrs: &CreatorAttributes,
    ) -> Result<ImagePayload, GenerationError>;
}
