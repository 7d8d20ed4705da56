//! `/forge` command arguments: `key=value` tokens plus free text.

use crate::forge::options::{
    choice, free_text, inspiration_choice, parse_image_style, parse_outfit_count,
    GenerationOptions, OptionsError,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OptionKey {
    CustomName,
    Gender,
    Species,
    AgeGroup,
    Nationality,
    Ethnicity,
    Personality,
    Alignment,
    Element,
    MartialArtStyle,
    Theme,
    GameInspiration,
    Weapon,
    WeaponMaterial,
    WeaponColor,
    OutfitStyle,
    FaceType,
    SkinTone,
    EyeShape,
    EyeColor,
    HairStyle,
    HairColor,
    FacialHair,
    Height,
    Weight,
    AlternateOutfitsCount,
    CustomPrompt,
    ImageStyle,
}

pub struct OptionKeyInfo {
    pub key: OptionKey,
    pub aliases: &'static [&'static str],
    pub example: &'static str,
}

pub const OPTION_KEYS: &[OptionKeyInfo] = &[
    OptionKeyInfo { key: OptionKey::CustomName, aliases: &["name", "custom_name"], example: "\"Iron Monk\"" },
    OptionKeyInfo { key: OptionKey::Gender, aliases: &["gender"], example: "Female" },
    OptionKeyInfo { key: OptionKey::Species, aliases: &["species", "race"], example: "Elf" },
    OptionKeyInfo { key: OptionKey::AgeGroup, aliases: &["age", "age_group"], example: "Veteran" },
    OptionKeyInfo { key: OptionKey::Nationality, aliases: &["nationality", "origin"], example: "Thai" },
    OptionKeyInfo { key: OptionKey::Ethnicity, aliases: &["ethnicity", "heritage"], example: "\"South Asian\"" },
    OptionKeyInfo { key: OptionKey::Personality, aliases: &["personality", "archetype"], example: "\"Zen Monk\"" },
    OptionKeyInfo { key: OptionKey::Alignment, aliases: &["alignment", "role"], example: "Villain" },
    OptionKeyInfo { key: OptionKey::Element, aliases: &["element"], example: "Lightning" },
    OptionKeyInfo { key: OptionKey::MartialArtStyle, aliases: &["art", "martial_art", "martial_art_style"], example: "\"Muay Thai\"" },
    OptionKeyInfo { key: OptionKey::Theme, aliases: &["theme"], example: "Cyberpunk" },
    OptionKeyInfo { key: OptionKey::GameInspiration, aliases: &["game", "inspiration", "game_inspiration"], example: "Tekken" },
    OptionKeyInfo { key: OptionKey::Weapon, aliases: &["weapon"], example: "Staff" },
    OptionKeyInfo { key: OptionKey::WeaponMaterial, aliases: &["weapon_material", "material"], example: "Obsidian" },
    OptionKeyInfo { key: OptionKey::WeaponColor, aliases: &["weapon_color"], example: "Crimson" },
    OptionKeyInfo { key: OptionKey::OutfitStyle, aliases: &["outfit", "outfit_style"], example: "\"Street Wear\"" },
    OptionKeyInfo { key: OptionKey::FaceType, aliases: &["face", "face_type"], example: "Angular" },
    OptionKeyInfo { key: OptionKey::SkinTone, aliases: &["skin", "skin_tone"], example: "Olive" },
    OptionKeyInfo { key: OptionKey::EyeShape, aliases: &["eye_shape"], example: "Hooded" },
    OptionKeyInfo { key: OptionKey::EyeColor, aliases: &["eyes", "eye_color"], example: "Amber" },
    OptionKeyInfo { key: OptionKey::HairStyle, aliases: &["hair", "hair_style"], example: "Topknot" },
    OptionKeyInfo { key: OptionKey::HairColor, aliases: &["hair_color"], example: "Silver" },
    OptionKeyInfo { key: OptionKey::FacialHair, aliases: &["beard", "facial_hair"], example: "Goatee" },
    OptionKeyInfo { key: OptionKey::Height, aliases: &["height"], example: "Tall" },
    OptionKeyInfo { key: OptionKey::Weight, aliases: &["weight"], example: "Heavy" },
    OptionKeyInfo { key: OptionKey::AlternateOutfitsCount, aliases: &["outfits", "alternate_outfits", "alternate_outfits_count"], example: "2" },
    OptionKeyInfo { key: OptionKey::CustomPrompt, aliases: &["prompt", "custom_prompt"], example: "\"a panda in Shaolin robes\"" },
    OptionKeyInfo { key: OptionKey::ImageStyle, aliases: &["style", "image_style"], example: "GameSprite" },
];

/// Lowercases and strips separators so `eyeColor`, `eye_color` and
/// `eye-color` all resolve to the same key.
fn fold_key(key: &str) -> String {
    key.chars()
        .filter(|ch| ch.is_ascii_alphanumeric())
        .map(|ch| ch.to_ascii_lowercase())
        .collect()
}

pub fn lookup_key(key: &str) -> Option<OptionKey> {
    let folded = fold_key(key);
    if folded.is_empty() {
        return None;
    }
    OPTION_KEYS
        .iter()
        .find(|info| info.aliases.iter().any(|alias| fold_key(alias) == folded))
        .map(|info| info.key)
}

#[derive(Debug, Default)]
pub struct ParsedForgeArgs {
    pub options: GenerationOptions,
    pub unknown_keys: Vec<String>,
}

/// Splits on whitespace, keeping double-quoted runs together and dropping
/// the quotes.
fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_quotes = false;

    for ch in input.chars() {
        match ch {
            '"' | '“' | '”' => in_quotes = !in_quotes,
            ch if ch.is_whitespace() && !in_quotes => {
                if !current.is_empty() {
                    tokens.push(std::mem::take(&mut current));
                }
            }
            ch => current.push(ch),
        }
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn apply(options: &mut GenerationOptions, key: OptionKey, value: &str) -> Result<(), OptionsError> {
    match key {
        OptionKey::CustomName => options.custom_name = choice(value),
        OptionKey::Gender => options.gender = choice(value),
        OptionKey::Species => options.species = choice(value),
        OptionKey::AgeGroup => options.age_group = choice(value),
        OptionKey::Nationality => options.nationality = choice(value),
        OptionKey::Ethnicity => options.ethnicity = choice(value),
        OptionKey::Personality => options.personality = choice(value),
        OptionKey::Alignment => options.alignment = choice(value),
        OptionKey::Element => options.element = choice(value),
        OptionKey::MartialArtStyle => options.martial_art_style = choice(value),
        OptionKey::Theme => options.theme = choice(value),
        OptionKey::GameInspiration => options.game_inspiration = inspiration_choice(value),
        OptionKey::Weapon => options.weapon = choice(value),
        OptionKey::WeaponMaterial => options.weapon_material = choice(value),
        OptionKey::WeaponColor => options.weapon_color = choice(value),
        OptionKey::OutfitStyle => options.outfit_style = choice(value),
        OptionKey::FaceType => options.face_type = choice(value),
        OptionKey::SkinTone => options.skin_tone = choice(value),
        OptionKey::EyeShape => options.eye_shape = choice(value),
        OptionKey::EyeColor => options.eye_color = choice(value),
        OptionKey::HairStyle => options.hair_style = choice(value),
        OptionKey::HairColor => options.hair_color = choice(value),
        OptionKey::FacialHair => options.facial_hair = choice(value),
        OptionKey::Height => options.height = choice(value),
        OptionKey::Weight => options.weight = choice(value),
        OptionKey::AlternateOutfitsCount => {
            options.alternate_outfits_count = parse_outfit_count(value)?
        }
        OptionKey::CustomPrompt => options.custom_prompt = free_text(value),
        OptionKey::ImageStyle => options.image_style = parse_image_style(value)?,
    }
    Ok(())
}

pub fn parse_forge_args(input: &str) -> Result<ParsedForgeArgs, OptionsError> {
    let mut parsed = ParsedForgeArgs::default();
    let mut free_words: Vec<String> = Vec::new();
    let mut explicit_prompt: Option<String> = None;

    for token in tokenize(input) {
        let Some((raw_key, value)) = token.split_once('=') else {
            free_words.push(token);
            continue;
        };
        match lookup_key(raw_key) {
            Some(OptionKey::CustomPrompt) => explicit_prompt = free_text(value),
            Some(key) => apply(&mut parsed.options, key, value)?,
            None if raw_key.trim().is_empty() => free_words.push(token),
            None => {
                parsed.unknown_keys.push(raw_key.to_string());
                free_words.push(token);
            }
        }
    }

    let mut prompt_parts = Vec::new();
    if let Some(prompt) = explicit_prompt {
        prompt_parts.push(prompt);
    }
    if !free_words.is_empty() {
        prompt_parts.push(free_words.join(" "));
    }
    parsed.options.custom_prompt = free_text(&prompt_parts.join(" "));

    Ok(parsed)
}

pub fn options_help() -> String {
    let mut lines = vec!["Options for /forge (key=value, quote values with spaces):".to_string()];
    for info in OPTION_KEYS {
        lines.push(format!(
            "- {}: e.g. {}={}",
            info.aliases.join(" / "),
            info.aliases[0],
            info.example
        ));
    }
    lines.push(String::new());
    lines.push("Anything that is not key=value becomes the custom prompt.".to_string());
    lines.push("Reply to a photo with /forge to use it as the visual reference.".to_string());
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::record::ImageStyle;

    #[test]
    fn parses_key_values_and_free_text() {
        let parsed = parse_forge_args(
            r#"name="Iron Monk" gender=Female art="Wing Chun" outfits=2 style=sprite wields a jade staff"#,
        )
        .unwrap();
        let options = parsed.options;

        assert_eq!(options.custom_name.as_deref(), Some("Iron Monk"));
        assert_eq!(options.gender.as_deref(), Some("Female"));
        assert_eq!(options.martial_art_style.as_deref(), Some("Wing Chun"));
        assert_eq!(options.alternate_outfits_count, 2);
        assert_eq!(options.image_style, ImageStyle::GameSprite);
        assert_eq!(options.custom_prompt.as_deref(), Some("wields a jade staff"));
        assert!(parsed.unknown_keys.is_empty());
    }

    #[test]
    fn keys_are_case_and_separator_insensitive() {
        assert_eq!(lookup_key("eyeColor"), Some(OptionKey::EyeColor));
        assert_eq!(lookup_key("EYE-COLOR"), Some(OptionKey::EyeColor));
        assert_eq!(lookup_key("martialArtStyle"), Some(OptionKey::MartialArtStyle));
        assert_eq!(lookup_key("mood"), None);
    }

    #[test]
    fn random_values_stay_unset_and_unknown_keys_are_reported() {
        let parsed = parse_forge_args("gender=Random mood=grim species=Orc").unwrap();
        assert_eq!(parsed.options.gender, None);
        assert_eq!(parsed.options.species.as_deref(), Some("Orc"));
        assert_eq!(parsed.unknown_keys, vec!["mood".to_string()]);
        assert_eq!(parsed.options.custom_prompt.as_deref(), Some("mood=grim"));
    }

    #[test]
    fn free_text_with_equals_signs_is_kept_in_the_prompt() {
        let parsed = parse_forge_args("a physicist who lives by E=mc2 gender=Male").unwrap();
        assert_eq!(parsed.options.gender.as_deref(), Some("Male"));
        assert_eq!(parsed.unknown_keys, vec!["E".to_string()]);
        assert_eq!(
            parsed.options.custom_prompt.as_deref(),
            Some("a physicist who lives by E=mc2")
        );
    }

    #[test]
    fn explicit_prompt_comes_before_loose_words() {
        let parsed = parse_forge_args(r#"prompt="neon katana" and a trench coat"#).unwrap();
        assert_eq!(
            parsed.options.custom_prompt.as_deref(),
            Some("neon katana and a trench coat")
        );
    }

    #[test]
    fn invalid_values_are_errors() {
        assert!(parse_forge_args("outfits=lots").is_err());
        assert!(parse_forge_args("style=watercolor").is_err());
    }

    #[test]
    fn every_key_has_a_unique_alias_set() {
        for info in OPTION_KEYS {
            for alias in info.aliases {
                assert_eq!(lookup_key(alias), Some(info.key), "alias {alias}");
            }
        }
    }
}
