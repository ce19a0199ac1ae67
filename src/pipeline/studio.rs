use tracing::info;

use crate::error::GenerationError;
use crate::llm::prompts::studio_prompt;
use crate::llm::GenerationClient;
use crate::models::{CameraSettings, ImagePayload, Persona, ReferenceImage};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HorizontalAngle {
    LeftProfile(u32),
    RightProfile(u32),
    Front,
}

impl HorizontalAngle {
    pub fn from_rotation(rotation: i32) -> Self {
        if rotation < -10 {
            HorizontalAngle::LeftProfile(rotation.unsigned_abs())
        } else if rotation > 10 {
            HorizontalAngle::RightProfile(rotation.unsigned_abs())
        } else {
            HorizontalAngle::Front
        }
    }

    pub fn phrase(self) -> String {
        match self {
            HorizontalAngle::LeftProfile(degrees) => {
                format!("left profile, {degrees} degrees, viewed from the left")
            }
            HorizontalAngle::RightProfile(degrees) => {
                format!("right profile, {degrees} degrees, viewed from the right")
            }
            HorizontalAngle::Front => "front facing view".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerticalAngle {
    Low,
    High,
    EyeLevel,
}

impl VerticalAngle {
    pub fn from_vertical(vertical: f32) -> Self {
        if vertical < -0.3 {
            VerticalAngle::Low
        } else if vertical > 0.3 {
            VerticalAngle::High
        } else {
            VerticalAngle::EyeLevel
        }
    }

    pub fn phrase(self) -> &'static str {
        match self {
            VerticalAngle::Low => "low angle shot (worm's eye view), looking up at the subject",
            VerticalAngle::High => "high angle shot (bird's eye view), looking down at the subject",
            VerticalAngle::EyeLevel => "eye-level shot",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Framing {
    ExtremeCloseUp,
    MediumCloseUp,
    FullBody,
}

impl Framing {
    pub fn from_zoom(zoom: u8) -> Self {
        if zoom > 7 {
            Framing::ExtremeCloseUp
        } else if zoom > 3 {
            Framing::MediumCloseUp
        } else {
            Framing::FullBody
        }
    }

    pub fn phrase(self) -> &'static str {
        match self {
            Framing::ExtremeCloseUp => "extreme close-up on face, beauty shot, detailed makeup",
            Framing::MediumCloseUp => "medium close-up (head and shoulders)",
            Framing::FullBody => "full body shot",
        }
    }
}

fn lens_phrase(is_wide_angle: bool) -> &'static str {
    if is_wide_angle {
        "shot with a wide-angle lens (16mm), slightly distorted perspective, dynamic background"
    } else {
        "shot with a portrait lens (85mm), compressed background, flattering perspective"
    }
}

/// Compiles the camera settings into one description: horizontal angle,
/// vertical angle, framing, then lens.
pub fn describe_camera(settings: &CameraSettings) -> String {
    [
        HorizontalAngle::from_rotation(settings.rotation).phrase(),
        VerticalAngle::from_vertical(settings.vertical)
            .phrase()
            .to_string(),
        Framing::from_zoom(settings.zoom).phrase().to_string(),
        lens_phrase(settings.is_wide_angle).to_string(),
    ]
    .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StudioShot {
    pub image: ImagePayload,
    pub prompt: String,
}

pub async fn run_studio(
    client: &dyn GenerationClient,
    reference: &ReferenceImage,
    persona: &Persona,
    settings: &CameraSettings,
) -> Result<StudioShot, GenerationError> {
    let camera = describe_camera(settings);
    info!(camera = %camera, "Compiled studio camera setup");
    let prompt = studio_prompt(persona, &camera);
    let image = client.generate_image(reference, &prompt).await?;
    Ok(StudioShot { image, prompt })
}
