//! Response schema sent with the profile request.
//!
//! Uses the generation service's OpenAPI subset (`OBJECT`, `STRING`, ...).
//! Property names mirror the serialized `CharacterRecord`; the tests below
//! walk both shapes so they cannot drift apart.

use serde_json::{json, Map, Value};

fn string() -> Value {
    json!({ "type": "STRING" })
}

fn described(kind: &str, description: &str) -> Value {
    json!({ "type": kind, "description": description })
}

fn string_list(description: &str) -> Value {
    json!({ "type": "ARRAY", "items": { "type": "STRING" }, "description": description })
}

fn object(properties: Vec<(&str, Value)>, required: &[&str]) -> Value {
    let mut props = Map::new();
    for (name, schema) in properties {
        props.insert(name.to_string(), schema);
    }
    let mut schema = Map::new();
    schema.insert("type".to_string(), json!("OBJECT"));
    schema.insert("properties".to_string(), Value::Object(props));
    if !required.is_empty() {
        schema.insert("required".to_string(), json!(required));
    }
    Value::Object(schema)
}

fn outfit_schema() -> Value {
    object(
        vec![
            ("name", string()),
            ("description", string()),
            ("materials", string_list("Fabrics and materials, for 3D texturing reference")),
        ],
        &[],
    )
}

fn stat(description: &str) -> Value {
    described("INTEGER", description)
}

/// Fields the model must always return. Leaf completeness is left to the
/// sanitizer.
pub const REQUIRED_FIELDS: &[&str] = &[
    "name",
    "species",
    "gender",
    "nationality",
    "age",
    "martialArtStyle",
    "appearance",
    "build",
    "weapon",
    "outfit",
    "colorPalette",
    "fightingStance",
];

pub fn character_schema() -> Value {
    object(
        vec![
            ("name", string()),
            ("species", string()),
            ("gender", string()),
            ("nationality", string()),
            ("age", described("INTEGER", "Age in years")),
            ("ageGroup", described("STRING", "e.g. Teen, Young Adult, Veteran, Elder")),
            ("alignment", described("STRING", "Role in a story, e.g. Hero, Villain, Rival")),
            ("element", described("STRING", "Elemental affinity, or None/Physical")),
            (
                "martialArtStyle",
                described(
                    "STRING",
                    "The primary martial art style used by the character (e.g. Kung Fu, Muay Thai, etc.)",
                ),
            ),
            (
                "appearance",
                object(
                    vec![
                        ("faceType", string()),
                        ("skinTone", string()),
                        ("eyeShape", string()),
                        ("eyeColor", string()),
                        ("hairStyle", string()),
                        ("hairColor", string()),
                        ("facialHair", string()),
                        ("height", string()),
                        ("weight", string()),
                    ],
                    &[],
                ),
            ),
            (
                "build",
                object(vec![("type", string()), ("description", string())], &[]),
            ),
            (
                "weapon",
                object(
                    vec![
                        ("name", string()),
                        ("type", string()),
                        ("description", string()),
                        ("color", string()),
                        ("material", string()),
                    ],
                    &[],
                ),
            ),
            ("outfit", outfit_schema()),
            (
                "alternateOutfits",
                json!({ "type": "ARRAY", "items": outfit_schema() }),
            ),
            (
                "colorPalette",
                object(
                    vec![
                        ("primary", described("STRING", "Hex color code")),
                        ("secondary", described("STRING", "Hex color code")),
                        ("accent", described("STRING", "Hex color code")),
                    ],
                    &[],
                ),
            ),
            ("bodyMarkings", string_list("Tattoos, scars, paint or other markings")),
            (
                "fightingStance",
                object(
                    vec![
                        ("name", string()),
                        ("type", described("STRING", "e.g. Aggressive, Defensive, Fluid")),
                        ("description", string()),
                        ("keyFeatures", string_list("Distinctive elements of the stance")),
                        (
                            "stats",
                            object(
                                vec![
                                    ("offense", stat("Offensive power, 1-10")),
                                    ("defense", stat("Defensive ability, 1-10")),
                                    ("speed", stat("Speed, 1-10")),
                                    ("reach", stat("Reach, 1-10")),
                                ],
                                &[],
                            ),
                        ),
                    ],
                    &[],
                ),
            ),
            ("combatStyleDescription", string()),
            ("backstory", string()),
        ],
        REQUIRED_FIELDS,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::record::{CharacterRecord, Outfit};
    use std::collections::BTreeSet;

    /// Collects `a.b.c` paths for every leaf and array of the given value.
    fn record_paths(value: &Value, prefix: &str, out: &mut BTreeSet<String>) {
        match value {
            Value::Object(map) => {
                for (key, child) in map {
                    let path = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    out.insert(path.clone());
                    record_paths(child, &path, out);
                }
            }
            Value::Array(items) => {
                if let Some(first) = items.first() {
                    record_paths(first, &format!("{prefix}[]"), out);
                }
            }
            _ => {}
        }
    }

    fn schema_paths(schema: &Value, prefix: &str, out: &mut BTreeSet<String>) {
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (key, child) in properties {
                let path = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                out.insert(path.clone());
                schema_paths(child, &path, out);
            }
        }
        if let Some(items) = schema.get("items") {
            if items.get("properties").is_some() {
                schema_paths(items, &format!("{prefix}[]"), out);
            }
        }
    }

    #[test]
    fn schema_mirrors_the_record_shape() {
        let record = CharacterRecord {
            alternate_outfits: vec![Outfit::default()],
            ..CharacterRecord::default()
        };
        let mut from_record = BTreeSet::new();
        record_paths(&serde_json::to_value(&record).unwrap(), "", &mut from_record);
        // Carried alongside the record from the options, never asked of the model.
        from_record.remove("imageStyle");

        let mut from_schema = BTreeSet::new();
        schema_paths(&character_schema(), "", &mut from_schema);

        assert_eq!(from_record, from_schema);
    }

    #[test]
    fn required_fields_exist_at_top_level() {
        let schema = character_schema();
        let properties = schema["properties"].as_object().unwrap();
        for field in REQUIRED_FIELDS {
            assert!(properties.contains_key(*field), "missing {field}");
        }
        assert_eq!(schema["required"], json!(REQUIRED_FIELDS));
    }

    #[test]
    fn alternate_outfits_use_the_outfit_shape() {
        let schema = character_schema();
        assert_eq!(
            schema["properties"]["alternateOutfits"]["items"],
            schema["properties"]["outfit"]
        );
    }
}
