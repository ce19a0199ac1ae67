use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::GenerationError;
use crate::llm::GenerationClient;
use crate::models::{CreatorAttributes, ImagePayload, Persona, ReferenceImage};

pub fn sample_persona() -> Persona {
    Persona {
        nickname: "Mina".into(),
        age: "mid 20s".into(),
        occupation: "Barista".into(),
        personality: "Warm and curious".into(),
        lifestyle: "Weekend latte art battles".into(),
        vibe: "Cozy minimal".into(),
        description: "Coffee, film cameras and slow mornings.".into(),
        hashtags: vec!["#coffee".into(), "#slowlife".into()],
    }
}

pub fn sample_reference() -> ReferenceImage {
    ReferenceImage::new(ImagePayload::from_bytes(b"reference", "image/png"))
}

/// Image the fake returns for a scene: the scene text itself as bytes.
pub fn image_for(scene: &str) -> ImagePayload {
    ImagePayload::from_bytes(scene.as_bytes(), "image/png")
}

pub fn frame_prompts(count: usize) -> Vec<String> {
    (0..count).map(|index| format!("p{index}")).collect()
}

/// Scripted in-memory client that counts calls per capability.
pub struct FakeClient {
    persona: Result<Persona, GenerationError>,
    plan: Result<Vec<String>, GenerationError>,
    attribute_image: Result<ImagePayload, GenerationError>,
    failing_scenes: HashSet<String>,
    delays: HashMap<String, Duration>,
    pub analyze_calls: AtomicUsize,
    pub plan_calls: AtomicUsize,
    pub generate_calls: AtomicUsize,
    pub attribute_calls: AtomicUsize,
}

impl FakeClient {
    pub fn new() -> Self {
        FakeClient {
            persona: Ok(sample_persona()),
            plan: Ok(frame_prompts(8)),
            attribute_image: Ok(image_for("synthetic portrait")),
            failing_scenes: HashSet::new(),
            delays: HashMap::new(),
            analyze_calls: AtomicUsize::new(0),
            plan_calls: AtomicUsize::new(0),
            generate_calls: AtomicUsize::new(0),
            attribute_calls: AtomicUsize::new(0),
        }
    }

    pub fn with_analyze_result(mut self, result: Result<Persona, GenerationError>) -> Self {
        self.persona = result;
        self
    }

    pub fn with_plan_result(mut self, result: Result<Vec<String>, GenerationError>) -> Self {
        self.plan = result;
        self
    }

    pub fn with_attribute_result(mut self, result: Result<ImagePayload, GenerationError>) -> Self {
        self.attribute_image = result;
        self
    }

    pub fn failing_scene(mut self, scene: &str) -> Self {
        self.failing_scenes.insert(scene.to_string());
        self
    }

    pub fn with_delay(mut self, scene: &str, delay: Duration) -> Self {
        self.delays.insert(scene.to_string(), delay);
        self
    }

    pub fn count(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl GenerationClient for FakeClient {
    async fn analyze_image(&self, _image: &ReferenceImage) -> Result<Persona, GenerationError> {
        self.analyze_calls.fetch_add(1, Ordering::SeqCst);
        self.persona.clone()
    }

    async fn plan_story(
        &self,
        _persona: &Persona,
        _scenario: Option<&str>,
    ) -> Result<Vec<String>, GenerationError> {
        self.plan_calls.fetch_add(1, Ordering::SeqCst);
        self.plan.clone()
    }

    async fn generate_image(
        &self,
        _reference: &ReferenceImage,
        scene: &str,
    ) -> Result<ImagePayload, GenerationError> {
        self.generate_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delays.get(scene) {
            tokio::time::sleep(*delay).await;
        }
        if self.failing_scenes.contains(scene) {
            return Err(GenerationError::GenerationFailed(
                "No image generated".to_string(),
            ));
        }
        Ok(image_for(scene))
    }

    async fn generate_from_attributes(
        &self,
        _attrs: &CreatorAttributes,
    ) -> Result<ImagePayload, GenerationError> {
        self.attribute_calls.fetch_add(1, Ordering::SeqCst);
        self.attribute_image.clone()
    }
}
