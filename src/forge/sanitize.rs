//! Normalizes whatever the model returned into a complete `CharacterRecord`.
//!
//! Each field is checked on its own: a wrong type, `null`, blank string or
//! missing key replaces that field with its default and leaves the siblings
//! alone. Applying the sanitizer to its own output changes nothing.

use std::fmt;

use serde_json::{Map, Value};
use tracing::debug;

use crate::forge::record::{
    Appearance, Build, CharacterRecord, ColorPalette, FightingStance, ImageStyle, Outfit,
    StanceStats, Weapon, DEFAULT_STAT,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DefaultReason {
    Missing,
    Null,
    Blank,
    WrongType(&'static str),
    NotFinite,
    Unrecognized,
}

impl fmt::Display for DefaultReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DefaultReason::Missing => write!(f, "missing"),
            DefaultReason::Null => write!(f, "null"),
            DefaultReason::Blank => write!(f, "blank"),
            DefaultReason::WrongType(actual) => write!(f, "wrong type ({actual})"),
            DefaultReason::NotFinite => write!(f, "not finite"),
            DefaultReason::Unrecognized => write!(f, "unrecognized value"),
        }
    }
}

/// One substitution made while sanitizing. Not an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SanitizationDefault {
    pub path: String,
    pub reason: DefaultReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SanitizationReport {
    pub defaults: Vec<SanitizationDefault>,
}

impl SanitizationReport {
    pub fn is_clean(&self) -> bool {
        self.defaults.is_empty()
    }

    pub fn paths(&self) -> Vec<&str> {
        self.defaults.iter().map(|entry| entry.path.as_str()).collect()
    }

    fn push(&mut self, path: String, reason: DefaultReason) {
        debug!(target: "forge.sanitize", path = %path, reason = %reason, "substituted default");
        self.defaults.push(SanitizationDefault { path, reason });
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_string()
    } else {
        format!("{path}.{key}")
    }
}

struct Sanitizer {
    report: SanitizationReport,
}

impl Sanitizer {
    fn reject(&mut self, path: String, value: Option<&Value>) {
        let reason = match value {
            None => DefaultReason::Missing,
            Some(Value::Null) => DefaultReason::Null,
            Some(Value::String(text)) if text.trim().is_empty() => DefaultReason::Blank,
            Some(other) => DefaultReason::WrongType(kind_of(other)),
        };
        self.report.push(path, reason);
    }

    fn text(&mut self, map: &Map<String, Value>, path: &str, key: &str, default: &str) -> String {
        match map.get(key) {
            Some(Value::String(text)) if !text.trim().is_empty() => text.clone(),
            other => {
                self.reject(join(path, key), other);
                default.to_string()
            }
        }
    }

    fn integer(&mut self, map: &Map<String, Value>, path: &str, key: &str, default: i64) -> i64 {
        let value = map.get(key);
        if let Some(Value::Number(number)) = value {
            if let Some(int) = number.as_i64() {
                return int;
            }
            if number.as_u64().is_some() {
                return i64::MAX;
            }
            if let Some(float) = number.as_f64() {
                if float.is_finite() {
                    return float.round() as i64;
                }
                self.report.push(join(path, key), DefaultReason::NotFinite);
                return default;
            }
        }
        self.reject(join(path, key), value);
        default
    }

    fn string_list(&mut self, map: &Map<String, Value>, path: &str, key: &str) -> Vec<String> {
        let full = join(path, key);
        let Some(Value::Array(items)) = map.get(key) else {
            self.reject(full, map.get(key));
            return Vec::new();
        };

        let mut kept = Vec::with_capacity(items.len());
        for (index, item) in items.iter().enumerate() {
            match item {
                Value::String(text) if !text.trim().is_empty() => kept.push(text.clone()),
                other => self.reject(format!("{full}[{index}]"), Some(other)),
            }
        }
        kept
    }

    fn object<'v>(
        &mut self,
        map: &'v Map<String, Value>,
        path: &str,
        key: &str,
    ) -> Option<&'v Map<String, Value>> {
        match map.get(key) {
            Some(Value::Object(inner)) => Some(inner),
            other => {
                self.reject(join(path, key), other);
                None
            }
        }
    }

    fn appearance(&mut self, map: &Map<String, Value>, path: &str) -> Appearance {
        let d = Appearance::default();
        Appearance {
            face_type: self.text(map, path, "faceType", &d.face_type),
            skin_tone: self.text(map, path, "skinTone", &d.skin_tone),
            eye_shape: self.text(map, path, "eyeShape", &d.eye_shape),
            eye_color: self.text(map, path, "eyeColor", &d.eye_color),
            hair_style: self.text(map, path, "hairStyle", &d.hair_style),
            hair_color: self.text(map, path, "hairColor", &d.hair_color),
            facial_hair: self.text(map, path, "facialHair", &d.facial_hair),
            height: self.text(map, path, "height", &d.height),
            weight: self.text(map, path, "weight", &d.weight),
        }
    }

    fn build(&mut self, map: &Map<String, Value>, path: &str) -> Build {
        let d = Build::default();
        Build {
            kind: self.text(map, path, "type", &d.kind),
            description: self.text(map, path, "description", &d.description),
        }
    }

    fn weapon(&mut self, map: &Map<String, Value>, path: &str) -> Weapon {
        let d = Weapon::default();
        Weapon {
            name: self.text(map, path, "name", &d.name),
            kind: self.text(map, path, "type", &d.kind),
            description: self.text(map, path, "description", &d.description),
            color: self.text(map, path, "color", &d.color),
            material: self.text(map, path, "material", &d.material),
        }
    }

    fn outfit(&mut self, map: &Map<String, Value>, path: &str) -> Outfit {
        let d = Outfit::default();
        Outfit {
            name: self.text(map, path, "name", &d.name),
            description: self.text(map, path, "description", &d.description),
            materials: self.string_list(map, path, "materials"),
        }
    }

    fn alternate_outfits(&mut self, map: &Map<String, Value>) -> Vec<Outfit> {
        let Some(Value::Array(items)) = map.get("alternateOutfits") else {
            self.reject("alternateOutfits".to_string(), map.get("alternateOutfits"));
            return Vec::new();
        };

        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let path = format!("alternateOutfits[{index}]");
                match item {
                    Value::Object(inner) => self.outfit(inner, &path),
                    other => {
                        self.reject(path, Some(other));
                        Outfit::default()
                    }
                }
            })
            .collect()
    }

    fn palette(&mut self, map: &Map<String, Value>, path: &str) -> ColorPalette {
        let d = ColorPalette::default();
        ColorPalette {
            primary: self.text(map, path, "primary", &d.primary),
            secondary: self.text(map, path, "secondary", &d.secondary),
            accent: self.text(map, path, "accent", &d.accent),
        }
    }

    fn stats(&mut self, map: &Map<String, Value>, path: &str) -> StanceStats {
        StanceStats {
            offense: self.integer(map, path, "offense", DEFAULT_STAT),
            defense: self.integer(map, path, "defense", DEFAULT_STAT),
            speed: self.integer(map, path, "speed", DEFAULT_STAT),
            reach: self.integer(map, path, "reach", DEFAULT_STAT),
        }
    }

    fn stance(&mut self, map: &Map<String, Value>, path: &str) -> FightingStance {
        let d = FightingStance::default();
        let stats_path = join(path, "stats");
        let stats = match self.object(map, path, "stats") {
            Some(inner) => self.stats(inner, &stats_path),
            None => StanceStats::default(),
        };
        FightingStance {
            name: self.text(map, path, "name", &d.name),
            kind: self.text(map, path, "type", &d.kind),
            description: self.text(map, path, "description", &d.description),
            key_features: self.string_list(map, path, "keyFeatures"),
            stats,
        }
    }

    fn image_style(&mut self, map: &Map<String, Value>) -> ImageStyle {
        let parsed = match map.get("imageStyle") {
            None => return ImageStyle::default(),
            Some(Value::String(text)) => ImageStyle::parse(text),
            Some(_) => None,
        };
        match parsed {
            Some(style) => style,
            None => {
                self.report
                    .push("imageStyle".to_string(), DefaultReason::Unrecognized);
                ImageStyle::default()
            }
        }
    }

    fn record(&mut self, map: &Map<String, Value>) -> CharacterRecord {
        let d = CharacterRecord::default();

        let appearance = match self.object(map, "", "appearance") {
            Some(inner) => self.appearance(inner, "appearance"),
            None => Appearance::default(),
        };
        let build = match self.object(map, "", "build") {
            Some(inner) => self.build(inner, "build"),
            None => Build::default(),
        };
        let weapon = match self.object(map, "", "weapon") {
            Some(inner) => self.weapon(inner, "weapon"),
            None => Weapon::default(),
        };
        let outfit = match self.object(map, "", "outfit") {
            Some(inner) => self.outfit(inner, "outfit"),
            None => Outfit::default(),
        };
        let color_palette = match self.object(map, "", "colorPalette") {
            Some(inner) => self.palette(inner, "colorPalette"),
            None => ColorPalette::default(),
        };
        let fighting_stance = match self.object(map, "", "fightingStance") {
            Some(inner) => self.stance(inner, "fightingStance"),
            None => FightingStance::default(),
        };

        CharacterRecord {
            name: self.text(map, "", "name", &d.name),
            species: self.text(map, "", "species", &d.species),
            gender: self.text(map, "", "gender", &d.gender),
            nationality: self.text(map, "", "nationality", &d.nationality),
            age: self.integer(map, "", "age", d.age),
            age_group: self.text(map, "", "ageGroup", &d.age_group),
            alignment: self.text(map, "", "alignment", &d.alignment),
            element: self.text(map, "", "element", &d.element),
            martial_art_style: self.text(map, "", "martialArtStyle", &d.martial_art_style),
            appearance,
            build,
            weapon,
            outfit,
            alternate_outfits: self.alternate_outfits(map),
            color_palette,
            body_markings: self.string_list(map, "", "bodyMarkings"),
            fighting_stance,
            combat_style_description: self.text(
                map,
                "",
                "combatStyleDescription",
                &d.combat_style_description,
            ),
            backstory: self.text(map, "", "backstory", &d.backstory),
            image_style: self.image_style(map),
        }
    }
}

pub fn sanitize_with_report(value: &Value) -> (CharacterRecord, SanitizationReport) {
    let mut sanitizer = Sanitizer {
        report: SanitizationReport::default(),
    };

    let record = match value {
        Value::Object(map) => sanitizer.record(map),
        other => {
            sanitizer
                .report
                .push("$".to_string(), DefaultReason::WrongType(kind_of(other)));
            CharacterRecord::default()
        }
    };

    if !sanitizer.report.is_clean() {
        debug!(
            target: "forge.sanitize",
            defaults = sanitizer.report.defaults.len(),
            "profile sanitized with defaults"
        );
    }

    (record, sanitizer.report)
}

pub fn sanitize(value: &Value) -> CharacterRecord {
    sanitize_with_report(value).0
}
