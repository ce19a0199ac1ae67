use std::collections::HashSet;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use chrono::Utc;
use tokio::fs;
use tracing::info;

use crate::models::{GeneratedImage, ImagePayload, ReferenceImage, StoryBatch};

/// `story-<id>` or `studio-<id>`, depending on what produced the batch.
pub fn batch_prefix(batch: &StoryBatch) -> String {
    format!("{}-{}", batch.kind.file_prefix(), batch.id)
}

/// Images of a batch in order, optionally narrowed to the selected image ids.
pub fn select_images<'a>(
    batch: &'a StoryBatch,
    selected: Option<&HashSet<String>>,
) -> Vec<&'a GeneratedImage> {
    batch
        .images
        .iter()
        .filter(|image| selected.map_or(true, |ids| ids.contains(&image.id)))
        .collect()
}

async fn write_payload(path: &Path, payload: &ImagePayload) -> Result<()> {
    let bytes = payload
        .decode()
        .map_err(|err| anyhow!("Image payload for '{}' is not valid base64: {}", path.display(), err))?;
    fs::write(path, bytes)
        .await
        .map_err(|err| anyhow!("Failed writing '{}': {}", path.display(), err))
}

/// Writes the images one after another as `<prefix>-<n>.<ext>`, numbered from 1
/// over the exported images.
pub async fn export_images(
    images: &[&GeneratedImage],
    prefix: &str,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    if images.is_empty() {
        return Ok(Vec::new());
    }
    fs::create_dir_all(out_dir)
        .await
        .map_err(|err| anyhow!("Failed to create '{}': {}", out_dir.display(), err))?;

    let mut written = Vec::with_capacity(images.len());
    for (index, image) in images.iter().enumerate() {
        let path = out_dir.join(format!(
            "{prefix}-{}.{}",
            index + 1,
            image.image.extension()
        ));
        write_payload(&path, &image.image).await?;
        written.push(path);
    }
    info!(prefix = %prefix, count = written.len(), dir = %out_dir.display(), "Exported images");
    Ok(written)
}

pub async fn export_batch(
    batch: &StoryBatch,
    selected: Option<&HashSet<String>>,
    out_dir: &Path,
) -> Result<Vec<PathBuf>> {
    let images = select_images(batch, selected);
    export_images(&images, &batch_prefix(batch), out_dir).await
}

/// Saves the current reference portrait as `influencer-reference-<millis>.<ext>`.
pub async fn export_reference(reference: &ReferenceImage, out_dir: &Path) -> Result<PathBuf> {
    let payload = reference.payload();
    fs::create_dir_all(out_dir)
        .await
        .map_err(|err| anyhow!("Failed to create '{}': {}", out_dir.display(), err))?;
    let path = out_dir.join(format!(
        "influencer-reference-{}.{}",
        Utc::now().timestamp_millis(),
        payload.extension()
    ));
    write_payload(&path, payload).await?;
    Ok(path)
}
