use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use base64::{engine::general_purpose, Engine as _};
use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::error::{GenerationError, InputError};

pub const STORY_DEFAULT_LABEL: &str = "AI Lifestyle Series";
pub const STUDIO_LABEL: &str = "Studio Session";

/// Synthetic identity derived from a reference portrait.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub nickname: String,
    pub age: String,
    pub occupation: String,
    pub personality: String,
    pub lifestyle: String,
    pub vibe: String,
    pub description: String,
    pub hashtags: Vec<String>,
}

impl Persona {
    /// Parses a schema-constrained model answer. Every field must be present and
    /// non-empty; nothing is defaulted.
    pub fn from_model_json(text: &str) -> Result<Self, GenerationError> {
        let persona: Persona = serde_json::from_str(text.trim())
            .map_err(|err| GenerationError::MalformedResponse(format!("persona: {err}")))?;
        persona.validate()?;
        Ok(persona)
    }

    fn validate(&self) -> Result<(), GenerationError> {
        let fields = [
            ("nickname", &self.nickname),
            ("age", &self.age),
            ("occupation", &self.occupation),
            ("personality", &self.personality),
            ("lifestyle", &self.lifestyle),
            ("vibe", &self.vibe),
            ("description", &self.description),
        ];
        for (name, value) in fields {
            if value.trim().is_empty() {
                return Err(GenerationError::MalformedResponse(format!(
                    "persona field '{name}' is empty"
                )));
            }
        }
        if self.hashtags.is_empty() {
            return Err(GenerationError::MalformedResponse(
                "persona field 'hashtags' is empty".to_string(),
            ));
        }
        if self.hashtags.iter().any(|tag| tag.trim().is_empty()) {
            return Err(GenerationError::MalformedResponse(
                "persona field 'hashtags' contains an empty tag".to_string(),
            ));
        }
        Ok(())
    }
}

/// An encoded image: MIME type plus standard base64 data.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    pub data: String,
}

impl ImagePayload {
    pub fn from_bytes(bytes: &[u8], mime_type: &str) -> Self {
        ImagePayload {
            mime_type: mime_type.to_string(),
            data: general_purpose::STANDARD.encode(bytes),
        }
    }

    pub fn decode(&self) -> Result<Vec<u8>, base64::DecodeError> {
        general_purpose::STANDARD.decode(self.data.as_bytes())
    }

    pub fn extension(&self) -> &'static str {
        match self.mime_type.as_str() {
            "image/jpeg" | "image/jpg" => "jpg",
            "image/webp" => "webp",
            "image/gif" => "gif",
            _ => "png",
        }
    }
}

/// Shared handle to the visual identity anchor of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReferenceImage(Arc<ImagePayload>);

impl ReferenceImage {
    pub fn new(payload: ImagePayload) -> Self {
        ReferenceImage(Arc::new(payload))
    }

    pub fn payload(&self) -> &ImagePayload {
        &self.0
    }
}

impl From<ImagePayload> for ReferenceImage {
    fn from(payload: ImagePayload) -> Self {
        ReferenceImage::new(payload)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedImage {
    pub id: String,
    pub image: ImagePayload,
    pub prompt: String,
}

/// A story frame whose generation failed and was left out of its batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedFrame {
    pub index: usize,
    pub prompt: String,
    pub reason: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchKind {
    Story,
    Studio,
}

impl BatchKind {
    pub fn file_prefix(self) -> &'static str {
        match self {
            BatchKind::Story => "story",
            BatchKind::Studio => "studio",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoryBatch {
    pub id: String,
    pub kind: BatchKind,
    pub timestamp: i64,
    pub scenario: String,
    pub images: Vec<GeneratedImage>,
    pub dropped: Vec<DroppedFrame>,
}

static LAST_BATCH_ID: AtomicI64 = AtomicI64::new(0);

/// Creation millis, moved past the previous id when batches share a millisecond.
fn next_batch_id(now_millis: i64) -> i64 {
    let mut previous = LAST_BATCH_ID.load(Ordering::SeqCst);
    loop {
        let candidate = now_millis.max(previous + 1);
        match LAST_BATCH_ID.compare_exchange_weak(
            previous,
            candidate,
            Ordering::SeqCst,
            Ordering::SeqCst,
        ) {
            Ok(_) => return candidate,
            Err(actual) => previous = actual,
        }
    }
}

impl StoryBatch {
    /// Assigns a process-unique id from the creation time and numbers the
    /// images after it.
    pub fn new(
        kind: BatchKind,
        scenario: impl Into<String>,
        frames: Vec<(ImagePayload, String)>,
        dropped: Vec<DroppedFrame>,
    ) -> Self {
        let timestamp = Utc::now().timestamp_millis();
        let id = next_batch_id(timestamp).to_string();
        let images = frames
            .into_iter()
            .enumerate()
            .map(|(index, (image, prompt))| GeneratedImage {
                id: format!("{id}-{index}"),
                image,
                prompt,
            })
            .collect();
        StoryBatch {
            id,
            kind,
            timestamp,
            scenario: scenario.into(),
            images,
            dropped,
        }
    }
}

macro_rules! option_set {
    ($(#[$meta:meta])* $name:ident, $field:literal, { $($variant:ident => $label:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub const ALL: &'static [$name] = &[$($name::$variant),+];

            pub fn label(self) -> &'static str {
                match self {
                    $($name::$variant => $label),+
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.label())
            }
        }

        impl FromStr for $name {
            type Err = InputError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let wanted = value.trim();
                $name::ALL
                    .iter()
                    .copied()
                    .find(|option| option.label().eq_ignore_ascii_case(wanted))
                    .ok_or_else(|| InputError::UnknownOption {
                        field: $field,
                        value: value.to_string(),
                    })
            }
        }
    };
}

option_set!(Gender, "gender", {
    Man => "Man",
    Woman => "Woman",
    NonBinary => "Non-binary",
});

option_set!(Build, "build", {
    Slender => "Slender",
    Athletic => "Athletic",
    Curvy => "Curvy",
    Muscular => "Muscular",
    Petite => "Petite",
    Average => "Average",
    PlusSize => "Plus-size",
});

option_set!(Ethnicity, "ethnicity", {
    Korean => "Korean",
    Japanese => "Japanese",
    Chinese => "Chinese",
    American => "American",
    French => "French",
    Brazilian => "Brazilian",
    Indian => "Indian",
    Russian => "Russian",
    Mixed => "Mixed",
});

option_set!(EyeColor, "eye color", {
    DarkBrown => "Dark Brown",
    Brown => "Brown",
    Blue => "Blue",
    Green => "Green",
    Hazel => "Hazel",
    Grey => "Grey",
    Amber => "Amber",
});

option_set!(HairStyle, "hair style", {
    LongStraight => "Long Straight",
    LongWavy => "Long Wavy",
    BobCut => "Bob Cut",
    Pixie => "Pixie",
    Ponytail => "Ponytail",
    Bun => "Bun",
    Braids => "Braids",
    ShortTextured => "Short Textured",
});

option_set!(HairColor, "hair color", {
    Black => "Black",
    DarkBrown => "Dark Brown",
    Brown => "Brown",
    Blonde => "Blonde",
    Red => "Red",
    Auburn => "Auburn",
    Silver => "Silver",
    PastelPink => "Pastel Pink",
});

option_set!(FashionStyle, "fashion style", {
    MinimalistChic => "Minimalist Chic",
    Streetwear => "Streetwear",
    Luxury => "Luxury/High-End",
    Vintage => "Vintage",
    Casual => "Casual",
    Sporty => "Sporty",
    Bohemian => "Bohemian",
    Business => "Business",
});

option_set!(Vibe, "vibe", {
    Confident => "Confident",
    Friendly => "Friendly",
    Mysterious => "Mysterious",
    Energetic => "Energetic",
    Elegant => "Elegant",
    Cute => "Cute",
    Edgy => "Edgy",
});

pub const AGE_RANGE: (u32, u32) = (18, 65);
pub const HEIGHT_CM_RANGE: (u32, u32) = (140, 210);
pub const WEIGHT_KG_RANGE: (u32, u32) = (40, 150);

/// Creator form input for synthesizing a reference portrait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatorAttributes {
    pub gender: Gender,
    pub age: u32,
    pub height_cm: u32,
    pub weight_kg: u32,
    pub build: Build,
    pub ethnicity: Ethnicity,
    pub eye_color: EyeColor,
    pub hair_style: HairStyle,
    pub hair_color: HairColor,
    pub fashion_style: FashionStyle,
    pub vibe: Vibe,
}

impl Default for CreatorAttributes {
    fn default() -> Self {
        CreatorAttributes {
            gender: Gender::Woman,
            age: 24,
            height_cm: 168,
            weight_kg: 52,
            build: Build::Slender,
            ethnicity: Ethnicity::Korean,
            eye_color: EyeColor::DarkBrown,
            hair_style: HairStyle::LongStraight,
            hair_color: HairColor::Black,
            fashion_style: FashionStyle::MinimalistChic,
            vibe: Vibe::Confident,
        }
    }
}

fn pick<T: Copy, R: Rng + ?Sized>(options: &[T], rng: &mut R) -> T {
    options[rng.gen_range(0..options.len())]
}

impl CreatorAttributes {
    /// Random attributes. Gender is drawn from Man/Woman only and the numeric
    /// ranges are narrower than the accepted bounds.
    pub fn random<R: Rng + ?Sized>(rng: &mut R) -> Self {
        CreatorAttributes {
            gender: if rng.gen_bool(0.5) {
                Gender::Woman
            } else {
                Gender::Man
            },
            age: rng.gen_range(18..=40),
            height_cm: rng.gen_range(155..=185),
            weight_kg: rng.gen_range(45..=90),
            build: pick(Build::ALL, rng),
            ethnicity: pick(Ethnicity::ALL, rng),
            eye_color: pick(EyeColor::ALL, rng),
            hair_style: pick(HairStyle::ALL, rng),
            hair_color: pick(HairColor::ALL, rng),
            fashion_style: pick(FashionStyle::ALL, rng),
            vibe: pick(Vibe::ALL, rng),
        }
    }

    pub fn validate(&self) -> Result<(), InputError> {
        let checks = [
            ("age", self.age, AGE_RANGE),
            ("height", self.height_cm, HEIGHT_CM_RANGE),
            ("weight", self.weight_kg, WEIGHT_KG_RANGE),
        ];
        for (field, value, (min, max)) in checks {
            if value < min || value > max {
                return Err(InputError::out_of_range(field, value, min, max));
            }
        }
        Ok(())
    }
}

/// Discrete studio camera controls.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CameraSettings {
    /// Degrees, -90..=90 in steps of 5.
    pub rotation: i32,
    /// 0..=10.
    pub zoom: u8,
    /// -1.0..=1.0 in steps of 0.1.
    pub vertical: f32,
    pub is_wide_angle: bool,
}

impl CameraSettings {
    pub fn validate(&self) -> Result<(), InputError> {
        if !(-90..=90).contains(&self.rotation) || self.rotation % 5 != 0 {
            return Err(InputError::out_of_range("rotation", self.rotation, -90, 90));
        }
        if self.zoom > 10 {
            return Err(InputError::out_of_range("zoom", self.zoom, 0, 10));
        }
        if !(-1.0..=1.0).contains(&self.vertical) {
            return Err(InputError::out_of_range(
                "vertical",
                self.vertical,
                -1.0,
                1.0,
            ));
        }
        Ok(())
    }
}
