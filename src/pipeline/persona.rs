use tracing::info;

use crate::error::GenerationError;
use crate::llm::GenerationClient;
use crate::models::{CreatorAttributes, Persona, ReferenceImage};

pub async fn persona_from_photo(
    client: &dyn GenerationClient,
    image: &ReferenceImage,
) -> Result<Persona, GenerationError> {
    client.analyze_image(image).await
}

/// Synthesizes a reference portrait, then analyzes it. The analysis never runs
/// when synthesis fails.
///
/// `on_reference` sees the portrait before analysis starts, so it survives a
/// failed analysis.
pub async fn persona_from_attributes(
    client: &dyn GenerationClient,
    attrs: &CreatorAttributes,
    on_reference: impl FnOnce(&ReferenceImage),
) -> Result<(ReferenceImage, Persona), GenerationError> {
    let reference = ReferenceImage::new(client.generate_from_attributes(attrs).await?);
    info!(
        mime_type = %reference.payload().mime_type,
        "Synthesized reference portrait"
    );
    on_reference(&reference);
    let persona = client.analyze_image(&reference).await?;
    Ok((reference, persona))
}
