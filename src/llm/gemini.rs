use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::config::Config;
use crate::credentials::{Credential, CredentialProvider};
use crate::error::GenerationError;
use crate::llm::media::clean_base64;
use crate::llm::prompts::{
    attribute_portrait_prompt, persona_analysis_prompt, reference_scene_prompt, story_brief,
};
use crate::llm::GenerationClient;
use crate::models::{CreatorAttributes, ImagePayload, Persona, ReferenceImage};
use crate::utils::http::get_http_client;
use crate::utils::timing::log_llm_timing;

#[derive(Debug, Clone, Default)]
pub struct GeminiImageConfig {
    pub aspect_ratio: Option<String>,
    pub image_size: Option<String>,
}

#[derive(Debug, Clone)]
pub struct GeminiSettings {
    pub api_base: String,
    pub text_model: String,
    pub image_model: String,
    pub image_config: GeminiImageConfig,
    pub safety_profile: String,
    pub persona_language: String,
}

impl GeminiSettings {
    pub fn from_config(config: &Config) -> Self {
        GeminiSettings {
            api_base: config.gemini_api_base.clone(),
            text_model: config.gemini_text_model.clone(),
            image_model: config.gemini_image_model.clone(),
            image_config: GeminiImageConfig {
                aspect_ratio: Some(config.gemini_image_aspect_ratio.clone()),
                image_size: Some(config.gemini_image_size.clone()),
            },
            safety_profile: config.gemini_safety_settings.clone(),
            persona_language: config.persona_language.clone(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Option<Vec<GeminiCandidate>>,
    prompt_feedback: Option<GeminiPromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPromptFeedback {
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiCandidate {
    content: Option<GeminiContent>,
}

#[derive(Debug, Deserialize)]
struct GeminiContent {
    parts: Option<Vec<GeminiPart>>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: GeminiInlineData,
    },
    Other(Value),
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiInlineData {
    mime_type: String,
    data: String,
}

impl GeminiResponse {
    fn parts(&self) -> impl Iterator<Item = &GeminiPart> {
        self.candidates
            .iter()
            .flatten()
            .filter_map(|candidate| candidate.content.as_ref())
            .filter_map(|content| content.parts.as_ref())
            .flatten()
    }

    fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
    }
}

fn redact_api_key(text: &str, key: &str) -> String {
    let key = key.trim();
    if key.is_empty() {
        return text.to_string();
    }
    text.replace(key, "[redacted]")
}

fn build_safety_settings(profile: &str) -> Vec<Value> {
    let threshold = match profile {
        "standard" => "BLOCK_MEDIUM_AND_ABOVE",
        "permissive" => "OFF",
        _ => {
            warn!(
                "Unknown GEMINI_SAFETY_SETTINGS value '{}', using permissive defaults.",
                profile
            );
            "OFF"
        }
    };

    vec![
        json!({ "category": "HARM_CATEGORY_HARASSMENT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_HATE_SPEECH", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_SEXUALLY_EXPLICIT", "threshold": threshold }),
        json!({ "category": "HARM_CATEGORY_DANGEROUS_CONTENT", "threshold": threshold }),
    ]
}

fn build_image_config(config: &GeminiImageConfig) -> Option<Value> {
    let mut map = Map::new();

    if let Some(aspect_ratio) = config.aspect_ratio.as_deref() {
        let trimmed = aspect_ratio.trim();
        if !trimmed.is_empty() {
            map.insert("aspectRatio".to_string(), json!(trimmed));
        }
    }

    if let Some(image_size) = config.image_size.as_deref() {
        let trimmed = image_size.trim();
        if !trimmed.is_empty() {
            map.insert("imageSize".to_string(), json!(trimmed));
        }
    }

    if map.is_empty() {
        None
    } else {
        Some(Value::Object(map))
    }
}

fn persona_response_schema() -> Value {
    let fields = [
        "nickname",
        "age",
        "occupation",
        "personality",
        "lifestyle",
        "vibe",
        "description",
    ];
    let mut properties = Map::new();
    for field in fields {
        properties.insert(field.to_string(), json!({ "type": "STRING" }));
    }
    properties.insert(
        "hashtags".to_string(),
        json!({ "type": "ARRAY", "items": { "type": "STRING" } }),
    );
    let mut required: Vec<&str> = fields.to_vec();
    required.push("hashtags");

    json!({
        "type": "OBJECT",
        "properties": Value::Object(properties),
        "required": required,
    })
}

fn story_response_schema() -> Value {
    json!({ "type": "ARRAY", "items": { "type": "STRING" } })
}

fn inline_image_part(image: &ImagePayload) -> Value {
    json!({
        "inlineData": {
            "mimeType": image.mime_type,
            "data": clean_base64(&image.data)
        }
    })
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{truncated}... (truncated)")
}

fn summarize_gemini_parts(parts: &[Value]) -> Vec<Value> {
    parts
        .iter()
        .map(|part| {
            if let Some(text) = part.get("text").and_then(|value| value.as_str()) {
                json!({ "text": truncate_for_log(text, 200) })
            } else if let Some(inline_data) = part.get("inlineData") {
                let mime_type = inline_data
                    .get("mimeType")
                    .and_then(|value| value.as_str())
                    .unwrap_or("unknown");
                let data_len = inline_data
                    .get("data")
                    .and_then(|value| value.as_str())
                    .map(|value| value.len())
                    .unwrap_or(0);
                json!({ "inlineData": { "mimeType": mime_type, "dataLen": data_len } })
            } else {
                json!({ "unknownPart": true })
            }
        })
        .collect()
}

fn summarize_gemini_payload(payload: &Value, prompt_label: Option<&str>) -> Value {
    let mut summary = Map::new();

    if let Some(label) = prompt_label {
        summary.insert("prompt".to_string(), Value::String(label.to_string()));
    }

    if let Some(contents) = payload.get("contents").and_then(|value| value.as_array()) {
        let mut summarized_contents = Vec::new();
        for content in contents {
            let role = content
                .get("role")
                .and_then(|value| value.as_str())
                .unwrap_or("user");
            let parts = content
                .get("parts")
                .and_then(|value| value.as_array())
                .map(|parts| summarize_gemini_parts(parts))
                .unwrap_or_default();
            summarized_contents.push(json!({ "role": role, "parts": parts }));
        }
        summary.insert("contents".to_string(), Value::Array(summarized_contents));
    }

    if let Some(config) = payload.get("generationConfig") {
        summary.insert("generationConfig".to_string(), config.clone());
    }

    if let Some(safety) = payload
        .get("safetySettings")
        .and_then(|value| value.as_array())
    {
        summary.insert("safetySettingsCount".to_string(), json!(safety.len()));
    }

    Value::Object(summary)
}

fn summarize_gemini_response(response: &GeminiResponse) -> Value {
    let mut text_parts = 0usize;
    let mut image_parts = 0usize;
    let mut text_preview = None;
    let mut other_kinds: Vec<String> = Vec::new();

    for part in response.parts() {
        match part {
            GeminiPart::Text { text } => {
                text_parts += 1;
                if text_preview.is_none() && !text.trim().is_empty() {
                    text_preview = Some(truncate_for_log(text, 200));
                }
            }
            GeminiPart::InlineData { inline_data } => {
                if inline_data.mime_type.starts_with("image/") {
                    image_parts += 1;
                }
            }
            GeminiPart::Other(value) => {
                let kind = value
                    .as_object()
                    .and_then(|object| object.keys().next().cloned())
                    .unwrap_or_else(|| "unknown".to_string());
                other_kinds.push(kind);
            }
        }
    }

    json!({
        "candidates": response.candidates.as_ref().map(|candidates| candidates.len()).unwrap_or(0),
        "textParts": text_parts,
        "imageParts": image_parts,
        "otherParts": other_kinds,
        "textPreview": text_preview,
        "blockReason": response.block_reason(),
    })
}

fn summarize_error_body(body: &str) -> (Option<String>, String) {
    let trimmed = body.trim();
    if trimmed.is_empty() {
        return (None, "empty response body".to_string());
    }

    if let Ok(value) = serde_json::from_str::<Value>(trimmed) {
        let message = value
            .pointer("/error/message")
            .and_then(|v| v.as_str())
            .map(|v| v.to_string())
            .or_else(|| {
                value
                    .get("message")
                    .and_then(|v| v.as_str())
                    .map(|v| v.to_string())
            });
        return (message, truncate_for_log(&value.to_string(), 2000));
    }

    (None, truncate_for_log(trimmed, 2000))
}

fn extract_text_from_response(response: &GeminiResponse) -> String {
    let mut text_parts = Vec::new();
    for part in response.parts() {
        if let GeminiPart::Text { text } = part {
            if !text.trim().is_empty() {
                text_parts.push(text.as_str());
            }
        }
    }
    text_parts.join("\n")
}

fn first_inline_image(response: &GeminiResponse) -> Option<ImagePayload> {
    response.parts().find_map(|part| match part {
        GeminiPart::InlineData { inline_data }
            if inline_data.mime_type.starts_with("image/") && !inline_data.data.is_empty() =>
        {
            Some(ImagePayload {
                mime_type: inline_data.mime_type.clone(),
                data: inline_data.data.clone(),
            })
        }
        _ => None,
    })
}

/// Pulls the first inline image out of an image-model answer. With
/// `surface_refusal`, a text-only answer is reported verbatim.
fn image_from_response(
    response: &GeminiResponse,
    surface_refusal: bool,
) -> Result<ImagePayload, GenerationError> {
    if let Some(image) = first_inline_image(response) {
        return Ok(image);
    }
    if let Some(reason) = response.block_reason() {
        return Err(GenerationError::GenerationFailed(format!(
            "Request blocked: {reason}"
        )));
    }
    if surface_refusal {
        let text = extract_text_from_response(response);
        if !text.trim().is_empty() {
            return Err(GenerationError::GenerationFailed(format!(
                "Model refused: {text}"
            )));
        }
    }
    Err(GenerationError::GenerationFailed(
        "No image generated".to_string(),
    ))
}

fn parse_story_prompts(text: &str) -> Result<Vec<String>, GenerationError> {
    let prompts: Vec<String> = serde_json::from_str(text.trim())
        .map_err(|err| GenerationError::MalformedResponse(format!("story plan: {err}")))?;
    if let Some(index) = prompts.iter().position(|prompt| prompt.trim().is_empty()) {
        return Err(GenerationError::MalformedResponse(format!(
            "story plan entry {index} is empty"
        )));
    }
    Ok(prompts)
}

pub struct GeminiClient {
    http: Client,
    settings: GeminiSettings,
    credentials: CredentialProvider,
}

impl GeminiClient {
    pub fn new(credentials: CredentialProvider, settings: GeminiSettings) -> Self {
        GeminiClient {
            http: get_http_client().clone(),
            settings,
            credentials,
        }
    }

    async fn call_gemini_api(
        &self,
        credential: &Credential,
        model: &str,
        payload: Value,
        prompt_label: Option<&str>,
    ) -> Result<GeminiResponse, GenerationError> {
        let url = format!(
            "{}/models/{}:generateContent",
            self.settings.api_base, model
        );

        if tracing::enabled!(tracing::Level::DEBUG) {
            let payload_summary = summarize_gemini_payload(&payload, prompt_label);
            debug!(target: "llm.gemini", model = model, payload = %payload_summary);
        }

        let response = match self
            .http
            .post(&url)
            .header("x-goog-api-key", credential.expose())
            .json(&payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(err) => {
                let err_text = redact_api_key(&err.to_string(), credential.expose());
                warn!(
                    "Gemini request failed to send: {} (timeout={}, connect={}, status={:?})",
                    err_text,
                    err.is_timeout(),
                    err.is_connect(),
                    err.status(),
                );
                return Err(GenerationError::from_transport(format!(
                    "Gemini request failed: {}",
                    err_text
                )));
            }
        };

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let body = redact_api_key(&body, credential.expose());
            let (message, body_summary) = summarize_error_body(&body);
            warn!("Gemini API error: status={}, body={}", status, body_summary);
            let detail = message.unwrap_or(body_summary);
            return Err(GenerationError::from_transport(format!(
                "Gemini request failed with status {}: {}",
                status, detail
            )));
        }

        let body = response.text().await.map_err(|err| {
            GenerationError::from_transport(format!(
                "Gemini response could not be read: {}",
                redact_api_key(&err.to_string(), credential.expose())
            ))
        })?;
        let value = serde_json::from_str::<GeminiResponse>(&body).map_err(|err| {
            GenerationError::MalformedResponse(format!("Gemini response envelope: {err}"))
        })?;
        if tracing::enabled!(tracing::Level::DEBUG) {
            let response_summary = summarize_gemini_response(&value);
            debug!(target: "llm.gemini", model = model, response = %response_summary);
        }
        Ok(value)
    }

    async fn generate_image_payload(
        &self,
        credential: &Credential,
        parts: Vec<Value>,
        operation: &str,
        surface_refusal: bool,
    ) -> Result<ImagePayload, GenerationError> {
        let mut generation_config = json!({
            "responseModalities": ["TEXT", "IMAGE"]
        });
        if let Some(image_config) = build_image_config(&self.settings.image_config) {
            if let Some(config_object) = generation_config.as_object_mut() {
                config_object.insert("imageConfig".to_string(), image_config);
            }
        }

        let payload = json!({
            "contents": [{ "role": "user", "parts": parts }],
            "generationConfig": generation_config,
            "safetySettings": build_safety_settings(&self.settings.safety_profile),
        });

        let model = self.settings.image_model.as_str();
        log_llm_timing("gemini", model, operation, None, || async {
            let response = self
                .call_gemini_api(credential, model, payload, Some(operation))
                .await?;
            image_from_response(&response, surface_refusal)
        })
        .await
    }
}

#[async_trait]
impl GenerationClient for GeminiClient {
    async fn analyze_image(&self, image: &ReferenceImage) -> Result<Persona, GenerationError> {
        let credential = self.credentials.resolve()?;
        let prompt = persona_analysis_prompt(&self.settings.persona_language);
        let payload = json!({
            "contents": [{
                "role": "user",
                "parts": [{ "text": prompt }, inline_image_part(image.payload())]
            }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": persona_response_schema(),
            },
            "safetySettings": build_safety_settings(&self.settings.safety_profile),
        });

        let model = self.settings.text_model.as_str();
        log_llm_timing("gemini", model, "analyze_image", None, || async {
            let response = self
                .call_gemini_api(&credential, model, payload, Some("persona_analysis_prompt"))
                .await?;
            let text = extract_text_from_response(&response);
            if text.trim().is_empty() {
                return Err(GenerationError::MalformedResponse(
                    "persona response contained no text".to_string(),
                ));
            }
            Persona::from_model_json(&text)
        })
        .await
    }

    async fn plan_story(
        &self,
        persona: &Persona,
        scenario: Option<&str>,
    ) -> Result<Vec<String>, GenerationError> {
        let credential = self.credentials.resolve()?;
        let scenario = scenario.map(str::trim).filter(|value| !value.is_empty());
        let brief = story_brief(persona, scenario);
        let payload = json!({
            "contents": [{ "role": "user", "parts": [{ "text": brief }] }],
            "generationConfig": {
                "responseMimeType": "application/json",
                "responseSchema": story_response_schema(),
            },
            "safetySettings": build_safety_settings(&self.settings.safety_profile),
        });

        let model = self.settings.text_model.as_str();
        let metadata = json!({ "customScenario": scenario.is_some() });
        log_llm_timing("gemini", model, "plan_story", Some(metadata), || async {
            let response = self
                .call_gemini_api(&credential, model, payload, Some("story_brief"))
                .await?;
            let text = extract_text_from_response(&response);
            if text.trim().is_empty() {
                return Err(GenerationError::MalformedResponse(
                    "story plan contained no text".to_string(),
                ));
            }
            parse_story_prompts(&text)
        })
        .await
    }

    async fn generate_image(
        &self,
        reference: &ReferenceImage,
        scene: &str,
    ) -> Result<ImagePayload, GenerationError> {
        let credential = self.credentials.resolve()?;
        let parts = vec![
            json!({ "text": reference_scene_prompt(scene) }),
            inline_image_part(reference.payload()),
        ];
        self.generate_image_payload(&credential, parts, "generate_image", false)
            .await
    }

    async fn generate_from_attributes(
        &self,
        attrs: &CreatorAttributes,
    ) -> Result<ImagePayload, GenerationError> {
        let credential = self.credentials.resolve()?;
        let parts = vec![json!({ "text": attribute_portrait_prompt(attrs) })];
        self.generate_image_payload(&credential, parts, "generate_from_attributes", true)
            .await
    }
}
