use tracing::{info, warn};

use crate::error::GenerationError;
use crate::llm::GenerationClient;
use crate::models::{BatchKind, DroppedFrame, Persona, ReferenceImage, StoryBatch, STORY_DEFAULT_LABEL};
use crate::pipeline::join::settle_all;

/// Blank scenarios mean "let the model invent one".
pub fn normalize_scenario(scenario: Option<&str>) -> Option<&str> {
    scenario.map(str::trim).filter(|value| !value.is_empty())
}

pub async fn plan_story(
    client: &dyn GenerationClient,
    persona: &Persona,
    scenario: Option<&str>,
) -> Result<Vec<String>, GenerationError> {
    let prompts = client
        .plan_story(persona, normalize_scenario(scenario))
        .await?;
    info!(frames = prompts.len(), "Story planned");
    Ok(prompts)
}

/// Renders every planned frame concurrently and keeps the successes in prompt
/// order. Failed frames are recorded on the batch; a batch with no frames at
/// all is an error.
pub async fn render_story(
    client: &dyn GenerationClient,
    reference: &ReferenceImage,
    prompts: Vec<String>,
    scenario: Option<&str>,
) -> Result<StoryBatch, GenerationError> {
    let settled = settle_all(
        prompts
            .iter()
            .map(|prompt| client.generate_image(reference, prompt)),
    )
    .await;

    let mut frames = Vec::new();
    let mut dropped = Vec::new();
    for (index, (prompt, outcome)) in prompts.into_iter().zip(settled).enumerate() {
        match outcome {
            Ok(image) => frames.push((image, prompt)),
            Err(err) => {
                warn!(frame = index, prompt = %prompt, error = %err, "Failed to generate story frame");
                dropped.push(DroppedFrame {
                    index,
                    prompt,
                    reason: err.to_string(),
                });
            }
        }
    }

    if frames.is_empty() {
        return Err(GenerationError::GenerationFailed("no images".to_string()));
    }

    let label = normalize_scenario(scenario).unwrap_or(STORY_DEFAULT_LABEL);
    let batch = StoryBatch::new(BatchKind::Story, label, frames, dropped);
    info!(
        batch = %batch.id,
        images = batch.images.len(),
        dropped = batch.dropped.len(),
        "Story batch ready"
    );
    Ok(batch)
}

/// Plans then renders one story. `on_planned` runs between the two stages with
/// the number of planned frames.
pub async fn run_story(
    client: &dyn GenerationClient,
    reference: &ReferenceImage,
    persona: &Persona,
    scenario: Option<&str>,
    on_planned: impl FnOnce(usize),
) -> Result<StoryBatch, GenerationError> {
    let prompts = plan_story(client, persona, scenario).await?;
    on_planned(prompts.len());
    render_story(client, reference, prompts, scenario).await
}
