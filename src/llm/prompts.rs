use crate::models::{CreatorAttributes, Persona};

pub const STORY_FRAME_COUNT: usize = 8;

pub fn persona_analysis_prompt(language: &str) -> String {
    format!(
        r#"Study the visual features of the person in this photo in depth and define a concrete "influencer persona" for them.
Write every value in {language}.

Use your imagination and define each item concretely:
1. nickname: a catchy, memorable nickname
2. age: an approximate age bracket (e.g. mid twenties, early thirties)
3. occupation: a job that fits their look and mood (e.g. fitness coach, startup CEO, travel writer)
4. personality: the character their expression and pose suggest (e.g. confident and outgoing, calm and intellectual)
5. lifestyle: hobbies or a way of living they would enjoy (e.g. surfing every weekend, luxury hotel tours, vintage cafe hopping)
6. vibe: keywords for their overall fashion and mood
7. description: one sentence summarizing the persona (at most 15 words)
8. hashtags: 3 to 4 related tags"#
    )
}

pub fn story_brief(persona: &Persona, scenario: Option<&str>) -> String {
    let scenario_directive = match scenario {
        Some(scenario) => format!(
            "SPECIFIC SCENARIO: The user wants the story to be about: \"{scenario}\". Follow it exactly."
        ),
        None => "SCENARIO: Create a trending, engaging lifestyle sequence that fits their Job and Lifestyle perfectly.".to_string(),
    };

    format!(
        r#"We are creating a photo series ({count} images) for a virtual influencer.

INFLUENCER PROFILE (Detailed Persona):
- Name: {nickname}
- Age: {age}
- Job: {occupation}
- Personality: {personality}
- Lifestyle: {lifestyle}
- Vibe: {vibe}

TASK:
Create a sequential {count}-frame visual storyboard. The images should look like a cohesive story or a "day in the life" photo dump.
{scenario_directive}

REQUIREMENTS:
- Return exactly {count} distinct image prompts.
- LOCATION CONSISTENCY (CRITICAL): The background and location MUST remain consistent across all {count} frames to create a continuous narrative. Do not jump between unrelated locations unless the scenario specifically asks to travel.
- Each prompt must describe the outfit, background, action, and lighting.
- Keep the outfit relatively consistent (or logically changing, e.g. jacket on/off) within the story.
- Make the scenes visually diverse (close-ups, wide shots, dynamic angles) while keeping the same location context."#,
        count = STORY_FRAME_COUNT,
        nickname = persona.nickname,
        age = persona.age,
        occupation = persona.occupation,
        personality = persona.personality,
        lifestyle = persona.lifestyle,
        vibe = persona.vibe,
    )
}

pub fn reference_scene_prompt(scene: &str) -> String {
    format!(
        r#"Generate a high-quality influencer photo based on the reference person.

CRITICAL INSTRUCTION: Preserve the facial identity, hair, and body type of the reference image exactly.

SCENE DESCRIPTION: {scene}

STYLE: Professional social media photography, 4k, cinematic lighting.
SKIN & TEXTURE: Flawless skin, beauty filter aesthetic, smooth texture, perfect lighting (no harsh shadows on face).
Avoid: Gritty realism, pores, acne, blemishes, low quality, distortion."#
    )
}

pub fn attribute_portrait_prompt(attrs: &CreatorAttributes) -> String {
    format!(
        r#"Generate a high-end beauty portrait of a fashion model.
Style: Commercial fashion photography, 8k resolution, perfectly retouched.

VISUAL ATTRIBUTES:
- Gender: {gender}
- Age Appearance: Approx {age} years old
- Ethnicity/Heritage: {ethnicity}
- Physique: {build} build, approx {height}cm tall, approx {weight}kg
- Face: {eye_color} eyes, flawless glowing skin, perfect makeup.

HAIR & STYLE:
- Hair: {hair_color}, {hair_style}, shiny and healthy hair texture.
- Fashion: {fashion}
- Vibe: {vibe}

COMPOSITION:
Professional studio photography, front-facing portrait or 3/4 view.
Neutral, soft-focus background.
Lighting: Soft beauty dish lighting, flattering shadows, "golden hour" or studio softbox look.

NEGATIVE PROMPT: Blemishes, pores, wrinkles, gritty texture, low quality, distortion, asymmetrical face."#,
        gender = attrs.gender,
        age = attrs.age,
        ethnicity = attrs.ethnicity,
        build = attrs.build,
        height = attrs.height_cm,
        weight = attrs.weight_kg,
        eye_color = attrs.eye_color,
        hair_color = attrs.hair_color,
        hair_style = attrs.hair_style,
        fashion = attrs.fashion_style,
        vibe = attrs.vibe,
    )
}

pub fn studio_prompt(persona: &Persona, camera_description: &str) -> String {
    format!(
        r#"Studio photography session of {nickname}.
Age: {age}. Occupation: {occupation}.
{vibe} style.

CAMERA SETUP: {camera_description}

The subject is posing professionally in a studio.
Lighting: High-end fashion studio lighting, softbox, rim light, flawless beauty retouching style."#,
        nickname = persona.nickname,
        age = persona.age,
        occupation = persona.occupation,
        vibe = persona.vibe,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Ethnicity, HairColor};

    fn persona() -> Persona {
        Persona {
            nickname: "Mina".into(),
            age: "mid 20s".into(),
            occupation: "Barista".into(),
            personality: "Warm".into(),
            lifestyle: "Latte art competitions".into(),
            vibe: "Cozy".into(),
            description: "Coffee first.".into(),
            hashtags: vec!["#coffee".into()],
        }
    }

    #[test]
    fn story_brief_embeds_scenario_verbatim() {
        let brief = story_brief(&persona(), Some("A rainy day at a Seoul bookstore"));
        assert!(brief.contains("\"A rainy day at a Seoul bookstore\""));
        assert!(brief.contains("- Job: Barista"));
        assert!(!brief.contains("trending, engaging"));
    }

    #[test]
    fn story_brief_invents_scenario_without_input() {
        let brief = story_brief(&persona(), None);
        assert!(brief.contains("fits their Job and Lifestyle"));
        assert!(brief.contains("outfit, background, action, and lighting"));
        assert!(brief.contains("exactly 8 distinct"));
    }

    #[test]
    fn attribute_prompt_mentions_every_attribute() {
        let attrs = CreatorAttributes {
            ethnicity: Ethnicity::Brazilian,
            hair_color: HairColor::PastelPink,
            weight_kg: 61,
            ..CreatorAttributes::default()
        };
        let prompt = attribute_portrait_prompt(&attrs);
        for needle in [
            "Woman", "24 years", "Brazilian", "Slender", "168cm", "61kg", "Dark Brown eyes",
            "Pastel Pink", "Long Straight", "Minimalist Chic", "Confident", "NEGATIVE PROMPT",
        ] {
            assert!(prompt.contains(needle), "missing {needle}");
        }
    }

    #[test]
    fn scene_prompt_keeps_identity_instruction() {
        let prompt = reference_scene_prompt("sipping coffee by the window");
        assert!(prompt.contains("Preserve the facial identity, hair, and body type"));
        assert!(prompt.contains("SCENE DESCRIPTION: sipping coffee by the window"));
    }
}
