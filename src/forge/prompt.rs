//! Turns options into the profile prompt and a sanitized record into the
//! portrait prompt. Both renderings are pure and deterministic.

use crate::forge::options::GenerationOptions;
use crate::forge::record::{CharacterRecord, ImageStyle};
use crate::llm::media::DataUrl;

const PROFILE_PREAMBLE: &str = "Generate a detailed, 3D-ready martial artist character profile.\n\
The character should be unique, with specific attention to physical build, detailed outfit \
textures/materials (for 3D modeling reference), a distinct fighting stance, and a signature \
weapon or fighting tool.";

const PROFILE_GUIDANCE: &[&str] = &[
    "Ensure the color palette provides valid Hex codes.",
    "The fighting stance should be described technically for animation reference and must reflect the chosen Martial Arts Style.",
    "Rate the stance stats (offense, defense, speed, reach) as whole numbers from 1 to 10.",
    "If a specific nationality or ethnicity is requested, ensure the outfit and name reflect it culturally where appropriate, unless the Theme dictates otherwise (e.g. Cyberpunk).",
];

const REFERENCE_IMAGE_DIRECTIVE: &str = "REFERENCE IMAGE: An image is attached. Treat it as the primary visual source of truth \
for the character's face, hair, build, outfit and colors. Where the attached image and the \
constraints above disagree on visual details, follow the image.";

const SPRITE_POSE: &str = "Neutral front-facing A-pose, standing straight and facing the viewer, arms held slightly \
away from the body, feet shoulder-width apart, weapon held at the side.";

const SPRITE_STYLE: &str = "2D fighting game sprite, flat colors, cel-shaded, bold clean outlines, \
vector art, full body visible, solid plain background, no text.";

const CINEMATIC_STYLE: &str = "High quality, 3D render style, octane render, detailed textures, \
cinematic rim lighting, neutral studio background.";

/// Profile prompt text plus the optional reference image, which travels as
/// a separate content part and is never inlined into the text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledPrompt {
    pub text: String,
    pub reference_image: Option<DataUrl>,
}

fn constraint(label: &str, value: Option<&str>, fallback: &str) -> String {
    match value {
        Some(value) => format!("{label}: {value}"),
        None => format!("{label}: {fallback}"),
    }
}

fn name_line(custom_name: Option<&str>) -> String {
    match custom_name {
        Some(name) => format!(
            "Character Name: Use exactly the name \"{name}\" verbatim. Do not translate, shorten, extend or paraphrase it."
        ),
        None => "Character Name: Create a unique, memorable name".to_string(),
    }
}

fn alternate_outfits_line(count: u8) -> String {
    match count {
        0 => "Alternate Outfits: None. Return an empty 'alternateOutfits' array.".to_string(),
        1 => "Alternate Outfits: Generate exactly 1 distinct alternate outfit (e.g., Training Gear, Formal Wear, Stealth, or Casual) in the 'alternateOutfits' array. It must have a name, description, and list of materials.".to_string(),
        count => format!(
            "Alternate Outfits: Generate exactly {count} distinct alternate outfits (e.g., Training Gear, Formal Wear, Stealth, or Casual) in the 'alternateOutfits' array. Each must have a name, description, and list of materials."
        ),
    }
}

fn presentation_line(style: ImageStyle) -> String {
    match style {
        ImageStyle::Cinematic => {
            "Visual Presentation: Cinematic 3D character render".to_string()
        }
        ImageStyle::GameSprite => {
            "Visual Presentation: 2D game sprite; favor bold silhouettes and colors that stay readable at small sizes".to_string()
        }
    }
}

pub fn profile_constraints(options: &GenerationOptions) -> Vec<String> {
    let o = options;
    vec![
        name_line(o.custom_name.as_deref()),
        constraint("Gender", o.gender.as_deref(), "Any"),
        constraint("Species", o.species.as_deref(), "Human or any species that fits the concept"),
        constraint("Age Group", o.age_group.as_deref(), "Any age that fits the concept"),
        constraint("Nationality", o.nationality.as_deref(), "Appropriate to theme"),
        constraint("Ethnicity/Heritage", o.ethnicity.as_deref(), "Consistent with nationality"),
        constraint("Personality Archetype", o.personality.as_deref(), "Unique and compelling"),
        constraint("Alignment/Role", o.alignment.as_deref(), "Any"),
        constraint("Elemental Affinity", o.element.as_deref(), "Any, or purely physical"),
        constraint(
            "Martial Arts Style",
            o.martial_art_style.as_deref(),
            "Select a distinct real-world or believable fictional martial art",
        ),
        constraint("Theme/Style", o.theme.as_deref(), "Unique/Creative"),
        match o.game_inspiration.as_deref() {
            Some(game) => format!(
                "Game Inspiration: Design the character as if they belonged in the roster of {game}"
            ),
            None => "Game Inspiration: Original design, not based on an existing game".to_string(),
        },
        constraint("Weapon Preference", o.weapon.as_deref(), "Any or Unarmed"),
        constraint("Weapon Material", o.weapon_material.as_deref(), "Appropriate to the weapon"),
        constraint("Weapon Color", o.weapon_color.as_deref(), "Harmonious with the color palette"),
        constraint(
            "Outfit Style",
            o.outfit_style.as_deref(),
            "Appropriate to the theme and fighting style",
        ),
        constraint("Face Type", o.face_type.as_deref(), "Any that fits the character"),
        constraint("Skin Tone", o.skin_tone.as_deref(), "Consistent with species and heritage"),
        constraint("Eye Shape", o.eye_shape.as_deref(), "Any that fits the character"),
        constraint("Eye Color", o.eye_color.as_deref(), "Any that fits the character"),
        constraint("Hair Style", o.hair_style.as_deref(), "Any that fits the character"),
        constraint("Hair Color", o.hair_color.as_deref(), "Any that fits the character"),
        constraint("Facial Hair", o.facial_hair.as_deref(), "Any, including none"),
        constraint("Height", o.height.as_deref(), "Any that fits the fighting style"),
        constraint("Weight", o.weight.as_deref(), "Any that fits the fighting style"),
        alternate_outfits_line(o.alternate_outfits_count),
        presentation_line(o.image_style),
    ]
}

pub fn compile_profile_prompt(options: &GenerationOptions) -> CompiledPrompt {
    let mut sections = vec![PROFILE_PREAMBLE.to_string()];

    let constraints = profile_constraints(options)
        .into_iter()
        .map(|line| format!("- {line}"))
        .collect::<Vec<_>>()
        .join("\n");
    sections.push(format!("Constraints & Preferences:\n{constraints}"));
    sections.push(PROFILE_GUIDANCE.join("\n"));

    if options.reference_image.is_some() {
        sections.push(REFERENCE_IMAGE_DIRECTIVE.to_string());
    }

    if let Some(custom) = options.custom_prompt.as_deref() {
        sections.push(format!(
            "PRIORITY USER INSTRUCTIONS:\n\
             The user supplied the following specific instructions. They take precedence over \
             any generic constraint above that conflicts with them; keep every constraint that \
             does not conflict.\n\"\"\"\n{custom}\n\"\"\""
        ));
    }

    CompiledPrompt {
        text: sections.join("\n\n"),
        reference_image: options.reference_image.clone(),
    }
}

fn or_fallback<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.trim().is_empty() {
        fallback
    } else {
        value
    }
}

fn list_or_fallback(values: &[String], fallback: &str) -> String {
    let items: Vec<&str> = values
        .iter()
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect();
    if items.is_empty() {
        fallback.to_string()
    } else {
        items.join(", ")
    }
}

/// The pose sentence of the portrait prompt. Sprites always get the fixed
/// A-pose; the character's own stance is not consulted.
pub fn pose_directive(record: &CharacterRecord) -> String {
    match record.image_style {
        ImageStyle::GameSprite => format!("Pose: {SPRITE_POSE}"),
        ImageStyle::Cinematic => {
            let stance = &record.fighting_stance;
            let description = or_fallback(&stance.description, "A balanced, ready fighting guard");
            let name = or_fallback(&stance.name, "fighting stance");
            let features = list_or_fallback(&stance.key_features, "");
            if features.is_empty() {
                format!("Pose: {name}. {description}")
            } else {
                format!("Pose: {name}. {description} Key features: {features}.")
            }
        }
    }
}

fn style_directive(style: ImageStyle) -> String {
    match style {
        ImageStyle::GameSprite => format!("Style: {SPRITE_STYLE}"),
        ImageStyle::Cinematic => format!("Style: {CINEMATIC_STYLE}"),
    }
}

pub fn compile_image_prompt(record: &CharacterRecord) -> String {
    let appearance = &record.appearance;
    let weapon = &record.weapon;
    let outfit = &record.outfit;
    let palette = &record.color_palette;

    let weapon_name = or_fallback(&weapon.name, "Unarmed");
    let weapon_type = or_fallback(&weapon.kind, "Fists");

    let lines = vec![
        "Full body concept art character design of a martial artist.".to_string(),
        format!("Name: {}.", or_fallback(&record.name, "Unnamed fighter")),
        format!("Species: {}.", or_fallback(&record.species, "Human")),
        format!("Gender: {}.", or_fallback(&record.gender, "Unspecified")),
        format!(
            "Age: {} ({}).",
            record.age,
            or_fallback(&record.age_group, "Adult")
        ),
        format!("Nationality: {}.", or_fallback(&record.nationality, "Unknown")),
        format!(
            "Martial Arts Style: {}.",
            or_fallback(&record.martial_art_style, "Freestyle")
        ),
        format!(
            "Build: {}. {}",
            or_fallback(&record.build.kind, "Average"),
            or_fallback(&record.build.description, "Balanced, athletic proportions.")
        ),
        format!(
            "Face: {} face, {} skin, {} {} eyes.",
            or_fallback(&appearance.face_type, "Neutral"),
            or_fallback(&appearance.skin_tone, "natural"),
            or_fallback(&appearance.eye_shape, "natural"),
            or_fallback(&appearance.eye_color, "dark")
        ),
        format!(
            "Hair: {}, {}. Facial hair: {}.",
            or_fallback(&appearance.hair_style, "Simple"),
            or_fallback(&appearance.hair_color, "natural color"),
            or_fallback(&appearance.facial_hair, "None")
        ),
        format!(
            "Height: {}. Weight: {}.",
            or_fallback(&appearance.height, "Average"),
            or_fallback(&appearance.weight, "Average")
        ),
        format!(
            "Weapon: {weapon_name} ({weapon_type}), made of {}, colored {}.",
            or_fallback(&weapon.material, "unremarkable material"),
            or_fallback(&weapon.color, "natural tones")
        ),
        format!(
            "Outfit: {}. {}",
            or_fallback(&outfit.name, "Training Garb"),
            or_fallback(&outfit.description, "Plain, practical training clothes.")
        ),
        format!(
            "Wearing materials: {}.",
            list_or_fallback(&outfit.materials, "simple woven cloth")
        ),
        format!(
            "Colors: Primary {}, Secondary {}, Accent {}.",
            or_fallback(&palette.primary, "charcoal"),
            or_fallback(&palette.secondary, "grey"),
            or_fallback(&palette.accent, "gold")
        ),
        format!(
            "Markings: {}.",
            list_or_fallback(&record.body_markings, "None visible")
        ),
        format!("Elemental Affinity: {}.", or_fallback(&record.element, "None")),
        pose_directive(record),
        style_directive(record.image_style),
    ];

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::record::{CharacterRecord, ImageStyle};

    fn full_options() -> GenerationOptions {
        GenerationOptions {
            custom_name: Some("Hanzo".to_string()),
            gender: Some("Male".to_string()),
            species: Some("Elf".to_string()),
            martial_art_style: Some("Wing Chun".to_string()),
            alternate_outfits_count: 3,
            custom_prompt: Some("He carries a broken jade flute.".to_string()),
            ..GenerationOptions::default()
        }
    }

    #[test]
    fn compiling_twice_is_byte_identical() {
        let options = full_options();
        let first = compile_profile_prompt(&options);
        let second = compile_profile_prompt(&options);
        assert_eq!(first, second);
        assert_eq!(
            compile_profile_prompt(&GenerationOptions::default()).text,
            compile_profile_prompt(&GenerationOptions::default()).text
        );
    }

    #[test]
    fn unset_fields_get_fallback_lines_and_never_say_random() {
        let text = compile_profile_prompt(&GenerationOptions::default()).text;
        assert!(!text.contains("Random"));
        assert!(text.contains("- Gender: Any"));
        assert!(text.contains("- Nationality: Appropriate to theme"));
        assert!(text.contains("- Weapon Preference: Any or Unarmed"));
        assert!(text.contains("- Character Name: Create a unique, memorable name"));
        assert!(text.contains("Return an empty 'alternateOutfits' array"));
        assert_eq!(
            profile_constraints(&GenerationOptions::default()).len(),
            text.lines().filter(|line| line.starts_with("- ")).count()
        );
    }

    #[test]
    fn set_fields_are_stated_as_given() {
        let text = compile_profile_prompt(&full_options()).text;
        assert!(text.contains("- Gender: Male\n"));
        assert!(text.contains("- Species: Elf\n"));
        assert!(text.contains("- Martial Arts Style: Wing Chun\n"));
        assert!(text.contains("- Ethnicity/Heritage: Consistent with nationality\n"));
    }

    #[test]
    fn custom_name_is_used_verbatim() {
        let text = compile_profile_prompt(&full_options()).text;
        assert!(text.contains("Use exactly the name \"Hanzo\" verbatim"));
        assert!(!text.contains("Create a unique, memorable name"));
    }

    #[test]
    fn custom_prompt_is_a_trailing_priority_block() {
        let text = compile_profile_prompt(&full_options()).text;
        let priority = text.find("PRIORITY").unwrap();
        let last_constraint = text.rfind("- Visual Presentation").unwrap();
        assert!(priority > last_constraint);
        assert!(text.trim_end().ends_with("He carries a broken jade flute.\n\"\"\""));
        assert!(text.contains("Generate exactly 3 distinct alternate outfits"));
    }

    #[test]
    fn reference_image_is_attached_not_inlined() {
        let image = DataUrl::parse("data:image/png;base64,aGVsbG8=").unwrap();
        let options = GenerationOptions {
            reference_image: Some(image.clone()),
            ..GenerationOptions::default()
        };
        let compiled = compile_profile_prompt(&options);
        assert_eq!(compiled.reference_image, Some(image));
        assert!(compiled.text.contains("primary visual source of truth"));
        assert!(!compiled.text.contains("aGVsbG8="));

        let without = compile_profile_prompt(&GenerationOptions::default());
        assert!(without.reference_image.is_none());
        assert!(!without.text.contains("REFERENCE IMAGE"));
    }

    #[test]
    fn sprite_style_overrides_the_stance_pose() {
        let mut record = CharacterRecord::default();
        record.fighting_stance.name = "Tiger Lunge".to_string();
        record.fighting_stance.description = "aggressive forward lunge".to_string();
        record.fighting_stance.key_features = vec!["deep lunge".to_string()];
        record.image_style = ImageStyle::GameSprite;

        let pose = pose_directive(&record);
        assert!(!pose.contains("lunge"));
        assert!(pose.contains("A-pose"));

        let prompt = compile_image_prompt(&record);
        assert!(!prompt.contains("lunge"));
        assert!(prompt.contains("cel-shaded"));
        assert!(prompt.contains("solid plain background"));
        assert!(!prompt.contains("octane"));
    }

    #[test]
    fn cinematic_style_keeps_the_stance() {
        let mut record = CharacterRecord::default();
        record.fighting_stance.description = "aggressive forward lunge".to_string();
        let prompt = compile_image_prompt(&record);
        assert!(prompt.contains("Pose: Basic Stance. aggressive forward lunge"));
        assert!(prompt.contains("octane render"));
    }

    #[test]
    fn empty_fields_get_fallback_phrases() {
        let mut record = CharacterRecord::default();
        record.weapon.name = String::new();
        record.weapon.kind = " ".to_string();
        record.outfit.materials = vec![];
        record.body_markings = vec![" ".to_string()];

        let prompt = compile_image_prompt(&record);
        assert!(prompt.contains("Weapon: Unarmed (Fists)"));
        assert!(prompt.contains("Wearing materials: simple woven cloth."));
        assert!(prompt.contains("Markings: None visible."));
        assert!(prompt.lines().all(|line| !line.trim().is_empty()));
    }
}
