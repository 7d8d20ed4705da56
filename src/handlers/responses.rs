use std::time::Duration;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use teloxide::prelude::*;
use teloxide::types::{MessageId, ParseMode};
use tracing::warn;

use crate::forge::record::{GeneratedCharacter, Outfit};

pub fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            '\'' => escaped.push_str("&#39;"),
            _ => escaped.push(ch),
        }
    }
    escaped
}

pub fn truncate_chars(text: &str, max_chars: usize) -> (String, bool) {
    let mut iter = text.chars();
    let truncated: String = iter.by_ref().take(max_chars).collect();
    let was_truncated = iter.next().is_some();
    (truncated, was_truncated)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardFormat {
    Html,
    Plain,
}

impl CardFormat {
    fn text(self, value: &str) -> String {
        match self {
            CardFormat::Html => escape_html(value),
            CardFormat::Plain => value.to_string(),
        }
    }

    fn bold(self, value: &str) -> String {
        match self {
            CardFormat::Html => format!("<b>{}</b>", escape_html(value)),
            CardFormat::Plain => value.to_string(),
        }
    }

    fn code(self, value: &str) -> String {
        match self {
            CardFormat::Html => format!("<code>{}</code>", escape_html(value)),
            CardFormat::Plain => format!("[{value}]"),
        }
    }

    pub fn parse_mode(self) -> Option<ParseMode> {
        match self {
            CardFormat::Html => Some(ParseMode::Html),
            CardFormat::Plain => None,
        }
    }
}

const LONG_FIELD_LIMIT: usize = 700;

fn clipped(value: &str) -> String {
    match truncate_chars(value, LONG_FIELD_LIMIT) {
        (text, true) => format!("{}...", text.trim_end()),
        (text, false) => text,
    }
}

/// Ten-segment bar for a 1-10 stat. Values outside the range are shown
/// clamped; the number next to it is the real value.
pub fn stat_bar(value: i64) -> String {
    let filled = value.clamp(0, 10) as usize;
    format!("{}{}", "▰".repeat(filled), "▱".repeat(10 - filled))
}

fn join_or(values: &[String], fallback: &str) -> String {
    if values.is_empty() {
        fallback.to_string()
    } else {
        values.join(", ")
    }
}

fn outfit_line(format: CardFormat, outfit: &Outfit) -> String {
    format!(
        "{}: {}",
        format.bold(&outfit.name),
        format.text(&clipped(&outfit.description))
    )
}

pub fn render_card(character: &GeneratedCharacter, format: CardFormat) -> String {
    let record = &character.record;
    let appearance = &record.appearance;
    let weapon = &record.weapon;
    let stance = &record.fighting_stance;
    let stats = stance.stats;
    let palette = &record.color_palette;

    let mut lines = vec![
        format!("{} {}", format.bold(&record.name), format.code(character.short_id())),
        format.text(&format!(
            "{} · {} · {} ({}) · {}",
            record.species, record.gender, record.age, record.age_group, record.nationality
        )),
        format.text(&format!(
            "{} · Element: {} · Style: {}",
            record.alignment, record.element, record.martial_art_style
        )),
        String::new(),
        format.bold("Appearance"),
        format.text(&format!(
            "Face: {}, {} skin, {} {} eyes",
            appearance.face_type, appearance.skin_tone, appearance.eye_shape, appearance.eye_color
        )),
        format.text(&format!(
            "Hair: {}, {}. Facial hair: {}",
            appearance.hair_style, appearance.hair_color, appearance.facial_hair
        )),
        format.text(&format!(
            "Height: {} · Weight: {} · Build: {}",
            appearance.height, appearance.weight, record.build.kind
        )),
        format.text(&clipped(&record.build.description)),
        String::new(),
        format!(
            "{} {}",
            format.bold("Weapon:"),
            format.text(&format!(
                "{} ({}), {} {}",
                weapon.name, weapon.kind, weapon.color, weapon.material
            ))
        ),
        format.text(&clipped(&weapon.description)),
        String::new(),
        format!("{} {}", format.bold("Outfit:"), outfit_line(format, &record.outfit)),
        format.text(&format!(
            "Materials: {}",
            join_or(&record.outfit.materials, "unspecified")
        )),
    ];

    if !record.alternate_outfits.is_empty() {
        lines.push(format.bold("Alternate outfits"));
        for outfit in &record.alternate_outfits {
            lines.push(format!("- {}", outfit_line(format, outfit)));
        }
    }

    lines.push(format.text(&format!(
        "Palette: {} / {} / {}",
        palette.primary, palette.secondary, palette.accent
    )));
    lines.push(format.text(&format!(
        "Markings: {}",
        join_or(&record.body_markings, "none")
    )));
    lines.push(String::new());
    lines.push(format!(
        "{} {}",
        format.bold("Stance:"),
        format.text(&format!("{} ({})", stance.name, stance.kind))
    ));
    lines.push(format.text(&clipped(&stance.description)));
    if !stance.key_features.is_empty() {
        lines.push(format.text(&format!("Key features: {}", stance.key_features.join(", "))));
    }
    for (label, value) in [
        ("OFF", stats.offense),
        ("DEF", stats.defense),
        ("SPD", stats.speed),
        ("RCH", stats.reach),
    ] {
        lines.push(format!(
            "{} {} {}",
            format.code(label),
            stat_bar(value),
            value
        ));
    }
    lines.push(String::new());
    lines.push(format!(
        "{} {}",
        format.bold("Combat:"),
        format.text(&clipped(&record.combat_style_description))
    ));
    lines.push(format!(
        "{} {}",
        format.bold("Backstory:"),
        format.text(&clipped(&record.backstory))
    ));

    lines.join("\n")
}

/// Picks the richest card that fits in one Telegram message.
pub fn fit_card(character: &GeneratedCharacter, max_length: usize) -> (String, CardFormat) {
    let html = render_card(character, CardFormat::Html);
    if html.chars().count() <= max_length {
        return (html, CardFormat::Html);
    }
    let plain = render_card(character, CardFormat::Plain);
    match truncate_chars(&plain, max_length.saturating_sub(3)) {
        (text, true) => (format!("{text}..."), CardFormat::Plain),
        (text, false) => (text, CardFormat::Plain),
    }
}

pub fn roster_line(character: &GeneratedCharacter) -> String {
    let created = Utc
        .timestamp_millis_opt(character.timestamp)
        .single()
        .map(|date| date.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "unknown date".to_string());
    let portrait = if character.image_url.is_some() { " 🖼" } else { "" };
    format!(
        "<code>{}</code> {} · {} · {}{}",
        escape_html(character.short_id()),
        escape_html(&character.record.name),
        escape_html(&character.record.martial_art_style),
        created,
        portrait
    )
}

pub async fn edit_text_with_retry(
    bot: &Bot,
    chat_id: ChatId,
    message_id: MessageId,
    text: &str,
    parse_mode: Option<ParseMode>,
) -> Result<()> {
    let mut delay = Duration::from_secs_f32(1.5);
    for attempt in 0..3 {
        let request = bot.edit_message_text(chat_id, message_id, text.to_string());
        let request = if let Some(mode) = parse_mode {
            request.parse_mode(mode)
        } else {
            request
        };

        match request.await {
            Ok(_) => return Ok(()),
            Err(err) => {
                if attempt == 2 {
                    return Err(err.into());
                }
                warn!("edit_message_text failed: {err}");
                tokio::time::sleep(delay).await;
                delay *= 2;
            }
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forge::record::CharacterRecord;

    fn character() -> GeneratedCharacter {
        let mut record = CharacterRecord {
            name: "Mei <Lin>".to_string(),
            martial_art_style: "Baguazhang".to_string(),
            ..CharacterRecord::default()
        };
        record.fighting_stance.stats.speed = 9;
        record.alternate_outfits = vec![Outfit {
            name: "Night & Day".to_string(),
            ..Outfit::default()
        }];
        GeneratedCharacter {
            id: "0123456789abcdef".to_string(),
            timestamp: 1_700_000_000_000,
            image_url: None,
            record,
        }
    }

    #[test]
    fn html_card_escapes_model_text() {
        let card = render_card(&character(), CardFormat::Html);
        assert!(card.starts_with("<b>Mei &lt;Lin&gt;</b> <code>01234567</code>"));
        assert!(card.contains("<b>Night &amp; Day</b>"));
        assert!(card.contains("<code>SPD</code> ▰▰▰▰▰▰▰▰▰▱ 9"));
        assert!(card.contains("Markings: none"));
    }

    #[test]
    fn plain_card_has_no_markup() {
        let card = render_card(&character(), CardFormat::Plain);
        assert!(card.contains("Mei <Lin>"));
        assert!(!card.contains("<b>"));
    }

    #[test]
    fn oversized_cards_fall_back_to_plain_text() {
        let mut long = character();
        long.record.alternate_outfits = vec![Outfit::default(); 40];
        let (card, format) = fit_card(&long, 1000);
        assert_eq!(format, CardFormat::Plain);
        assert!(card.chars().count() <= 1000);

        let (_, format) = fit_card(&character(), 4000);
        assert_eq!(format, CardFormat::Html);
    }

    #[test]
    fn stat_bars_clamp_for_display() {
        assert_eq!(stat_bar(3), "▰▰▰▱▱▱▱▱▱▱");
        assert_eq!(stat_bar(14), "▰".repeat(10));
        assert_eq!(stat_bar(-2), "▱".repeat(10));
    }

    #[test]
    fn roster_lines_show_date_and_short_id() {
        let line = roster_line(&character());
        assert!(line.starts_with("<code>01234567</code> Mei &lt;Lin&gt; · Baguazhang · 2023-11-14"));
    }
}
