//! Canonical character entity produced by the forge pipeline.
//!
//! Every leaf is concrete: the sanitizer fills any value the model did not
//! supply, so renderers and the roster never deal with missing fields.

use serde::{Deserialize, Serialize};

pub const DEFAULT_NAME: &str = "Unknown Fighter";
pub const DEFAULT_BACKSTORY: &str = "No known history.";
pub const DEFAULT_STAT: i64 = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ImageStyle {
    #[default]
    Cinematic,
    GameSprite,
}

impl ImageStyle {
    pub fn as_str(self) -> &'static str {
        match self {
            ImageStyle::Cinematic => "Cinematic",
            ImageStyle::GameSprite => "GameSprite",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        let normalized: String = value
            .trim()
            .chars()
            .filter(|ch| ch.is_ascii_alphanumeric())
            .collect::<String>()
            .to_ascii_lowercase();
        match normalized.as_str() {
            "cinematic" | "cinematic3d" | "3d" | "render" => Some(ImageStyle::Cinematic),
            "gamesprite" | "sprite" | "pixel" | "game" => Some(ImageStyle::GameSprite),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appearance {
    pub face_type: String,
    pub skin_tone: String,
    pub eye_shape: String,
    pub eye_color: String,
    pub hair_style: String,
    pub hair_color: String,
    pub facial_hair: String,
    pub height: String,
    pub weight: String,
}

impl Default for Appearance {
    fn default() -> Self {
        Appearance {
            face_type: "Unspecified".to_string(),
            skin_tone: "Unspecified".to_string(),
            eye_shape: "Unspecified".to_string(),
            eye_color: "Unspecified".to_string(),
            hair_style: "Unspecified".to_string(),
            hair_color: "Unspecified".to_string(),
            facial_hair: "None".to_string(),
            height: "Average".to_string(),
            weight: "Average".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Build {
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
}

impl Default for Build {
    fn default() -> Self {
        Build {
            kind: "Average".to_string(),
            description: "An unremarkable, balanced physique.".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Weapon {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub color: String,
    pub material: String,
}

impl Default for Weapon {
    fn default() -> Self {
        Weapon {
            name: "Unarmed".to_string(),
            kind: "Fists".to_string(),
            description: "Fights with bare hands.".to_string(),
            color: "Natural".to_string(),
            material: "Flesh and bone".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Outfit {
    pub name: String,
    pub description: String,
    pub materials: Vec<String>,
}

impl Default for Outfit {
    fn default() -> Self {
        Outfit {
            name: "Training Garb".to_string(),
            description: "Plain, practical training clothes.".to_string(),
            materials: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ColorPalette {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
}

impl Default for ColorPalette {
    fn default() -> Self {
        ColorPalette {
            primary: "#2B2B2B".to_string(),
            secondary: "#8A8A8A".to_string(),
            accent: "#C9A227".to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StanceStats {
    pub offense: i64,
    pub defense: i64,
    pub speed: i64,
    pub reach: i64,
}

impl Default for StanceStats {
    fn default() -> Self {
        StanceStats {
            offense: DEFAULT_STAT,
            defense: DEFAULT_STAT,
            speed: DEFAULT_STAT,
            reach: DEFAULT_STAT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FightingStance {
    pub name: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub description: String,
    pub key_features: Vec<String>,
    pub stats: StanceStats,
}

impl Default for FightingStance {
    fn default() -> Self {
        FightingStance {
            name: "Basic Stance".to_string(),
            kind: "Balanced".to_string(),
            description: "A balanced, neutral guard.".to_string(),
            key_features: Vec::new(),
            stats: StanceStats::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CharacterRecord {
    pub name: String,
    pub species: String,
    pub gender: String,
    pub nationality: String,
    pub age: i64,
    pub age_group: String,
    pub alignment: String,
    pub element: String,
    pub martial_art_style: String,
    pub appearance: Appearance,
    pub build: Build,
    pub weapon: Weapon,
    pub outfit: Outfit,
    pub alternate_outfits: Vec<Outfit>,
    pub color_palette: ColorPalette,
    pub body_markings: Vec<String>,
    pub fighting_stance: FightingStance,
    pub combat_style_description: String,
    pub backstory: String,
    pub image_style: ImageStyle,
}

impl Default for CharacterRecord {
    fn default() -> Self {
        CharacterRecord {
            name: DEFAULT_NAME.to_string(),
            species: "Human".to_string(),
            gender: "Unspecified".to_string(),
            nationality: "Unknown".to_string(),
            age: 30,
            age_group: "Adult".to_string(),
            alignment: "Neutral".to_string(),
            element: "None".to_string(),
            martial_art_style: "Freestyle".to_string(),
            appearance: Appearance::default(),
            build: Build::default(),
            weapon: Weapon::default(),
            outfit: Outfit::default(),
            alternate_outfits: Vec::new(),
            color_palette: ColorPalette::default(),
            body_markings: Vec::new(),
            fighting_stance: FightingStance::default(),
            combat_style_description: "No combat style description available.".to_string(),
            backstory: DEFAULT_BACKSTORY.to_string(),
            image_style: ImageStyle::default(),
        }
    }
}

/// A record as persisted in the roster: the profile plus the fields the
/// surrounding system assigns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedCharacter {
    pub id: String,
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(flatten)]
    pub record: CharacterRecord,
}

impl GeneratedCharacter {
    pub fn new(record: CharacterRecord) -> Self {
        GeneratedCharacter {
            id: uuid::Uuid::new_v4().to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            image_url: None,
            record,
        }
    }

    /// Returns a copy with the portrait attached; the original is left as is.
    pub fn with_image_url(&self, image_url: Option<String>) -> Self {
        GeneratedCharacter {
            image_url,
            ..self.clone()
        }
    }

    pub fn short_id(&self) -> &str {
        let end = self
            .id
            .char_indices()
            .nth(8)
            .map(|(index, _)| index)
            .unwrap_or(self.id.len());
        &self.id[..end]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn serializes_with_camel_case_and_type_keys() {
        let value = serde_json::to_value(CharacterRecord::default()).unwrap();
        assert_eq!(value["martialArtStyle"], json!("Freestyle"));
        assert_eq!(value["weapon"]["type"], json!("Fists"));
        assert_eq!(value["fightingStance"]["keyFeatures"], json!([]));
        assert_eq!(value["fightingStance"]["stats"]["reach"], json!(5));
        assert_eq!(value["imageStyle"], json!("Cinematic"));
    }

    #[test]
    fn generated_character_flattens_record_fields() {
        let character = GeneratedCharacter::new(CharacterRecord::default());
        let value = serde_json::to_value(&character).unwrap();
        assert_eq!(value["name"], json!(DEFAULT_NAME));
        assert!(value.get("imageUrl").is_none());
        assert!(value["timestamp"].as_i64().unwrap() > 0);

        let with_image = character.with_image_url(Some("data:image/png;base64,AAAA".to_string()));
        assert_eq!(character.image_url, None);
        assert_eq!(with_image.id, character.id);
        assert_eq!(
            with_image.image_url.as_deref(),
            Some("data:image/png;base64,AAAA")
        );
    }

    #[test]
    fn image_style_accepts_loose_spellings() {
        assert_eq!(ImageStyle::parse("GameSprite"), Some(ImageStyle::GameSprite));
        assert_eq!(ImageStyle::parse("game-sprite"), Some(ImageStyle::GameSprite));
        assert_eq!(ImageStyle::parse(" cinematic "), Some(ImageStyle::Cinematic));
        assert_eq!(ImageStyle::parse("watercolor"), None);
    }

    #[test]
    fn short_id_is_a_prefix() {
        let character = GeneratedCharacter::new(CharacterRecord::default());
        assert_eq!(character.short_id().len(), 8);
        assert!(character.id.starts_with(character.short_id()));
    }
}
