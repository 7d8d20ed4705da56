//! User-selected generation constraints.
//!
//! Every field is optional. The form sentinels (`"Random"`, blank strings and,
//! for game inspiration, `"None"`) collapse to `None` at the boundary so the
//! prompt compiler only ever sees "set" or "unset".

use serde::{Deserialize, Deserializer};

use crate::forge::record::ImageStyle;
use crate::llm::media::{DataUrl, DataUrlError};

pub const MAX_ALTERNATE_OUTFITS: u8 = 3;

#[derive(Debug, thiserror::Error)]
pub enum OptionsError {
    #[error("invalid reference image: {0}")]
    ReferenceImage(#[from] DataUrlError),
    #[error("unknown image style '{0}' (expected Cinematic or GameSprite)")]
    ImageStyle(String),
    #[error("invalid alternate outfit count '{0}' (expected 0-3)")]
    OutfitCount(String),
    #[error("invalid options JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct GenerationOptions {
    #[serde(deserialize_with = "de_choice")]
    pub custom_name: Option<String>,
    #[serde(deserialize_with = "de_choice")]
    pub gender: Option<String>,
    #[serde(deserialize_with = "de_choice")]
    pub species: Option<String>,
    #[serde(deserialize_with = "de_choice")]
    pub age_group: Option<String>,
    #[serde(deserialize_with = "de_choice")]
    pub nationality: Option<String>,
    #[serde(deserialize_with = "de_choice")]
    pub ethnicity: Option<String>,
    #[serde(deserialize_with = "de_choice")]
    pub personality: Option<String>,
    #[serde(deserialize_with = "de_choice")]
    pub alignment: Option<String>,
    #[serde(deserialize_with = "de_choice")]
    pub element: Option<String>,
    #[serde(deserialize_with = "de_choice")]
    pub martial_art_style: Option<String>,
    #[serde(deserialize_with = "de_choice")]
    pub theme: Option<String>,
    #[serde(deserialize_with = "de_inspiration")]
    pub game_inspiration: Option<String>,
    #[serde(deserialize_with = "de_choice")]
    pub weapon: Option<String>,
    #[serde(deserialize_with = "de_choice")]
    pub weapon_material: Option<String>,
    #[serde(deserialize_with = "de_choice")]
    pub weapon_color: Option<String>,
    #[serde(deserialize_with = "de_choice")]
    pub outfit_style: Option<String>,
    #[serde(deserialize_with = "de_choice")]
    pub face_type: Option<String>,
    #[serde(deserialize_with = "de_choice")]
    pub skin_tone: Option<String>,
    #[serde(deserialize_with = "de_choice")]
    pub eye_shape: Option<String>,
    #[serde(deserialize_with = "de_choice")]
    pub eye_color: Option<String>,
    #[serde(deserialize_with = "de_choice")]
    pub hair_style: Option<String>,
    #[serde(deserialize_with = "de_choice")]
    pub hair_color: Option<String>,
    #[serde(deserialize_with = "de_choice")]
    pub facial_hair: Option<String>,
    #[serde(deserialize_with = "de_choice")]
    pub height: Option<String>,
    #[serde(deserialize_with = "de_choice")]
    pub weight: Option<String>,
    #[serde(deserialize_with = "de_outfit_count")]
    pub alternate_outfits_count: u8,
    #[serde(deserialize_with = "de_free_text")]
    pub custom_prompt: Option<String>,
    #[serde(deserialize_with = "de_reference_image")]
    pub reference_image: Option<DataUrl>,
    #[serde(deserialize_with = "de_image_style")]
    pub image_style: ImageStyle,
}

/// Collapses the "let the model decide" sentinels to `None`.
pub fn choice(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("random") {
        return None;
    }
    Some(trimmed.to_string())
}

pub fn inspiration_choice(value: &str) -> Option<String> {
    choice(value).filter(|value| !value.eq_ignore_ascii_case("none"))
}

pub fn free_text(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub fn parse_outfit_count(value: &str) -> Result<u8, OptionsError> {
    let trimmed = value.trim();
    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Ok(0);
    }
    trimmed
        .parse::<i64>()
        .ok()
        .filter(|count| *count >= 0)
        .map(clamp_outfit_count)
        .ok_or_else(|| OptionsError::OutfitCount(trimmed.to_string()))
}

fn clamp_outfit_count(count: i64) -> u8 {
    count.clamp(0, MAX_ALTERNATE_OUTFITS as i64) as u8
}

pub fn parse_image_style(value: &str) -> Result<ImageStyle, OptionsError> {
    if choice(value).is_none() {
        return Ok(ImageStyle::default());
    }
    ImageStyle::parse(value).ok_or_else(|| OptionsError::ImageStyle(value.trim().to_string()))
}

fn de_choice<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(choice))
}

fn de_inspiration<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(inspiration_choice))
}

fn de_free_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    Ok(value.as_deref().and_then(free_text))
}

fn de_outfit_count<'de, D>(deserializer: D) -> Result<u8, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    match value {
        None | Some(serde_json::Value::Null) => Ok(0),
        Some(serde_json::Value::Number(number)) => number
            .as_i64()
            .filter(|count| *count >= 0)
            .map(clamp_outfit_count)
            .ok_or_else(|| serde::de::Error::custom(OptionsError::OutfitCount(number.to_string()))),
        Some(serde_json::Value::String(text)) => {
            parse_outfit_count(&text).map_err(serde::de::Error::custom)
        }
        Some(other) => Err(serde::de::Error::custom(OptionsError::OutfitCount(
            other.to_string(),
        ))),
    }
}

fn de_reference_image<'de, D>(deserializer: D) -> Result<Option<DataUrl>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    match value.as_deref().and_then(free_text) {
        None => Ok(None),
        Some(text) => DataUrl::parse(&text)
            .map(Some)
            .map_err(|err| serde::de::Error::custom(OptionsError::ReferenceImage(err))),
    }
}

fn de_image_style<'de, D>(deserializer: D) -> Result<ImageStyle, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<String>::deserialize(deserializer)?;
    match value {
        None => Ok(ImageStyle::default()),
        Some(text) => parse_image_style(&text).map_err(serde::de::Error::custom),
    }
}

impl GenerationOptions {
    pub fn from_json(text: &str) -> Result<Self, OptionsError> {
        Ok(serde_json::from_str(text)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_collapse_to_unset() {
        let options = GenerationOptions::from_json(
            r#"{
                "gender": "Random",
                "species": "  ",
                "theme": "random",
                "gameInspiration": "None",
                "weaponColor": "",
                "facialHair": "None",
                "customPrompt": "   ",
                "referenceImage": "",
                "alternateOutfitsCount": 0
            }"#,
        )
        .unwrap();

        assert_eq!(options.gender, None);
        assert_eq!(options.species, None);
        assert_eq!(options.theme, None);
        assert_eq!(options.game_inspiration, None);
        assert_eq!(options.weapon_color, None);
        assert_eq!(options.facial_hair.as_deref(), Some("None"));
        assert_eq!(options.custom_prompt, None);
        assert_eq!(options.reference_image, None);
        assert_eq!(options.alternate_outfits_count, 0);
        assert_eq!(options.image_style, ImageStyle::Cinematic);
    }

    #[test]
    fn reads_the_web_form_shape() {
        let options = GenerationOptions::from_json(
            r#"{
                "customName": " Hanzo ",
                "gender": "Male",
                "martialArtStyle": "Wing Chun",
                "alternateOutfitsCount": 2,
                "imageStyle": "GameSprite",
                "referenceImage": "data:image/png;base64,aGVsbG8="
            }"#,
        )
        .unwrap();

        assert_eq!(options.custom_name.as_deref(), Some("Hanzo"));
        assert_eq!(options.gender.as_deref(), Some("Male"));
        assert_eq!(options.martial_art_style.as_deref(), Some("Wing Chun"));
        assert_eq!(options.alternate_outfits_count, 2);
        assert_eq!(options.image_style, ImageStyle::GameSprite);
        assert_eq!(
            options.reference_image.as_ref().map(|image| image.mime_type()),
            Some("image/png")
        );
    }

    #[test]
    fn clamps_outfit_count_to_form_range() {
        let options = GenerationOptions::from_json(r#"{"alternateOutfitsCount": 9}"#).unwrap();
        assert_eq!(options.alternate_outfits_count, MAX_ALTERNATE_OUTFITS);
        let options = GenerationOptions::from_json(r#"{"alternateOutfitsCount": "1"}"#).unwrap();
        assert_eq!(options.alternate_outfits_count, 1);
        assert!(GenerationOptions::from_json(r#"{"alternateOutfitsCount": -1}"#).is_err());
        assert!(parse_outfit_count("many").is_err());
    }

    #[test]
    fn rejects_malformed_reference_image_at_the_boundary() {
        let err = GenerationOptions::from_json(r#"{"referenceImage": "http://x/y.png"}"#)
            .unwrap_err();
        assert!(err.to_string().contains("reference image"));
    }

    #[test]
    fn rejects_unknown_image_style() {
        assert!(GenerationOptions::from_json(r#"{"imageStyle": "Watercolor"}"#).is_err());
        assert_eq!(parse_image_style("Random").unwrap(), ImageStyle::Cinematic);
    }
}
