use std::time::Duration;

use anyhow::Result;
use teloxide::prelude::*;
use teloxide::types::{ChatAction, InputFile, ParseMode, ReplyParameters};
use tracing::{error, info, info_span, warn, Instrument};

use crate::config::CONFIG;
use crate::forge::args::{options_help, parse_forge_args};
use crate::forge::record::GeneratedCharacter;
use crate::handlers::access::{is_rate_limited, message_user_id};
use crate::handlers::media::{download_reference_image, reference_photo};
use crate::handlers::responses::{
    edit_text_with_retry, escape_html, fit_card, roster_line, truncate_chars,
};
use crate::llm::media::DataUrl;
use crate::roster::{find_by_prefix, PrefixMatch};
use crate::state::AppState;
use crate::utils::telegram::start_chat_action_heartbeat;
use crate::utils::timing::{complete_request_timer, start_request_timer};

const PHOTO_CAPTION_LIMIT: usize = 1000;

async fn reply(bot: &Bot, message: &Message, text: impl Into<String>) -> Result<Message> {
    Ok(bot
        .send_message(message.chat.id, text.into())
        .reply_parameters(ReplyParameters::new(message.id))
        .await?)
}

async fn reply_html(bot: &Bot, message: &Message, text: impl Into<String>) -> Result<Message> {
    Ok(bot
        .send_message(message.chat.id, text.into())
        .reply_parameters(ReplyParameters::new(message.id))
        .parse_mode(ParseMode::Html)
        .await?)
}

async fn send_portrait(
    bot: &Bot,
    message: &Message,
    character: &GeneratedCharacter,
) -> Result<bool> {
    let Some(image_url) = character.image_url.as_deref() else {
        return Ok(false);
    };
    let bytes = match DataUrl::parse(image_url).and_then(|image| image.decode()) {
        Ok(bytes) => bytes,
        Err(err) => {
            warn!("Stored portrait for {} is unreadable: {}", character.id, err);
            return Ok(false);
        }
    };

    let (caption, _) = truncate_chars(
        &format!("{} ({})", character.record.name, character.short_id()),
        PHOTO_CAPTION_LIMIT,
    );
    bot.send_photo(message.chat.id, InputFile::memory(bytes))
        .caption(caption)
        .reply_parameters(ReplyParameters::new(message.id))
        .await?;
    Ok(true)
}

/// Follow-up when the portrait did not reach the chat. A generated image is
/// still kept in the roster even if sending it failed.
fn portrait_notice(has_image: bool, short_id: &str) -> String {
    if has_image {
        format!("The portrait was painted but could not be sent. Try /show {short_id} to see it.")
    } else {
        "The portrait could not be painted this time; the profile was saved without one.".to_string()
    }
}

pub async fn start_handler(bot: Bot, message: Message) -> Result<()> {
    reply(
        &bot,
        &message,
        "Hello! I forge martial-arts fighters: a full profile and a portrait. Use /forge to create one or /help for commands.",
    )
    .await?;
    Ok(())
}

pub async fn help_handler(bot: Bot, message: Message) -> Result<()> {
    let help_text = "\
<b>Martial Forge Commands</b>

/forge - Create a new fighter
Usage: <code>/forge [key=value ...] [description]</code>
Example: <code>/forge gender=Female art=\"Muay Thai\" style=GameSprite a retired champion</code>
Reply to a photo with /forge (or send /forge as a photo caption) to use it as the visual reference.

/options - List every option key and its aliases

/roster - List the fighters forged in this chat

/show - Show a saved fighter again
Usage: <code>/show &lt;id&gt;</code>

/forget - Remove a saved fighter
Usage: <code>/forget &lt;id&gt;</code>

/help - Show this help message";

    reply_html(&bot, &message, help_text).await?;
    Ok(())
}

pub async fn options_handler(bot: Bot, message: Message) -> Result<()> {
    reply(&bot, &message, options_help()).await?;
    Ok(())
}

pub async fn forge_handler(bot: Bot, state: AppState, message: Message, args: String) -> Result<()> {
    let user_id = message_user_id(&message);
    if is_rate_limited(user_id, Duration::from_secs(CONFIG.rate_limit_seconds)) {
        reply(&bot, &message, "Rate limit exceeded. Please try again later.").await?;
        return Ok(());
    }

    let parsed = match parse_forge_args(&args) {
        Ok(parsed) => parsed,
        Err(err) => {
            reply(&bot, &message, format!("Could not read your options: {err}\nSee /options.")).await?;
            return Ok(());
        }
    };
    let mut options = parsed.options;

    let request_id = uuid::Uuid::new_v4().to_string();
    let _in_flight = match state.begin_request(message.chat.id.0, &request_id) {
        Ok(guard) => guard,
        Err(existing) => {
            let elapsed = existing.started_at.elapsed().as_secs();
            reply(
                &bot,
                &message,
                format!("A fighter is already being forged in this chat ({elapsed}s so far). Please wait for it to finish."),
            )
            .await?;
            return Ok(());
        }
    };

    let span = info_span!("forge_request", request_id = %request_id, chat_id = message.chat.id.0);
    let mut timer = start_request_timer("forge", &request_id, &message);

    let mut notice = String::from("Forging your fighter...");
    if !parsed.unknown_keys.is_empty() {
        notice.push_str(&format!(
            "\nUnknown options (kept as free text): {}",
            parsed.unknown_keys.join(", ")
        ));
    }

    if let Some(photo) = reference_photo(&message) {
        options.reference_image = download_reference_image(&bot, photo)
            .instrument(span.clone())
            .await;
        if options.reference_image.is_some() {
            notice.push_str("\nUsing the attached photo as reference.");
        }
    }

    let processing_message = reply(&bot, &message, notice).await?;

    let typing = start_chat_action_heartbeat(bot.clone(), message.chat.id, ChatAction::Typing);
    let profile = state.forge.forge_profile(&options).instrument(span.clone()).await;
    typing.stop();
    let profile = match profile {
        Ok(profile) => profile,
        Err(err) => {
            error!(parent: &span, "Profile generation failed: {}", err);
            complete_request_timer(&mut timer, "error", Some(err.to_string()));
            edit_text_with_retry(
                &bot,
                processing_message.chat.id,
                processing_message.id,
                "The forge went cold: I could not generate a profile. Please try again.",
                None,
            )
            .await?;
            return Ok(());
        }
    };

    let character = GeneratedCharacter::new(profile.record);
    let (card, format) = fit_card(&character, CONFIG.telegram_max_length);
    if let Err(err) = edit_text_with_retry(
        &bot,
        processing_message.chat.id,
        processing_message.id,
        &card,
        format.parse_mode(),
    )
    .await
    {
        warn!(parent: &span, "Failed to show profile card: {}", err);
    }

    let uploading =
        start_chat_action_heartbeat(bot.clone(), message.chat.id, ChatAction::UploadPhoto);
    let image = state.forge.forge_image(&character.record).instrument(span.clone()).await;
    uploading.stop();
    let character = character.with_image_url(image.map(|image| image.to_string()));

    let sent = match send_portrait(&bot, &message, &character).await {
        Ok(sent) => sent,
        Err(err) => {
            warn!(parent: &span, "Failed to send portrait: {}", err);
            false
        }
    };
    let has_image = character.image_url.is_some();
    let short_id = character.short_id().to_string();
    match state.roster.save(message.chat.id.0, character).await {
        Ok(count) => info!(parent: &span, "Saved {} to roster ({} entries)", short_id, count),
        Err(err) => error!(parent: &span, "Failed to save {} to roster: {}", short_id, err),
    }

    if !sent {
        if let Err(err) = reply(&bot, &message, portrait_notice(has_image, &short_id)).await {
            warn!(parent: &span, "Failed to send portrait notice: {}", err);
        }
    }

    let status = match (sent, has_image) {
        (true, _) => "success",
        (false, true) => "image_not_sent",
        (false, false) => "no_image",
    };
    complete_request_timer(&mut timer, status, None);
    Ok(())
}

pub async fn roster_handler(bot: Bot, state: AppState, message: Message) -> Result<()> {
    let roster = state.roster.load(message.chat.id.0).await?;
    if roster.is_empty() {
        reply(&bot, &message, "No fighters have been forged in this chat yet. Try /forge.").await?;
        return Ok(());
    }

    let mut lines = vec![format!("<b>Roster</b> ({} fighters)", roster.len())];
    let mut length = lines[0].len();
    for character in &roster {
        let line = roster_line(character);
        if length + line.len() + 1 > CONFIG.telegram_max_length {
            lines.push("...".to_string());
            break;
        }
        length += line.len() + 1;
        lines.push(line);
    }
    lines.push(String::new());
    lines.push("Use <code>/show &lt;id&gt;</code> to see a fighter again.".to_string());

    reply_html(&bot, &message, lines.join("\n")).await?;
    Ok(())
}

async fn resolve_prefix(
    bot: &Bot,
    state: &AppState,
    message: &Message,
    prefix: &str,
    usage: &str,
) -> Result<Option<GeneratedCharacter>> {
    if prefix.trim().is_empty() {
        reply(bot, message, usage.to_string()).await?;
        return Ok(None);
    }

    let roster = state.roster.load(message.chat.id.0).await?;
    match find_by_prefix(&roster, prefix) {
        PrefixMatch::Unique(character) => Ok(Some(character.clone())),
        PrefixMatch::NotFound => {
            reply_html(
                bot,
                message,
                format!("No fighter with id <code>{}</code>. See /roster.", escape_html(prefix.trim())),
            )
            .await?;
            Ok(None)
        }
        PrefixMatch::Ambiguous(count) => {
            reply(
                bot,
                message,
                format!("{count} fighters match that id. Please type a few more characters."),
            )
            .await?;
            Ok(None)
        }
    }
}

pub async fn show_handler(bot: Bot, state: AppState, message: Message, prefix: String) -> Result<()> {
    let Some(character) =
        resolve_prefix(&bot, &state, &message, &prefix, "Usage: /show <id>").await?
    else {
        return Ok(());
    };

    let (card, format) = fit_card(&character, CONFIG.telegram_max_length);
    let request = bot
        .send_message(message.chat.id, card)
        .reply_parameters(ReplyParameters::new(message.id));
    match format.parse_mode() {
        Some(mode) => request.parse_mode(mode).await?,
        None => request.await?,
    };
    send_portrait(&bot, &message, &character).await?;
    Ok(())
}

pub async fn forget_handler(
    bot: Bot,
    state: AppState,
    message: Message,
    prefix: String,
) -> Result<()> {
    let Some(character) =
        resolve_prefix(&bot, &state, &message, &prefix, "Usage: /forget <id>").await?
    else {
        return Ok(());
    };

    match state.roster.remove(message.chat.id.0, &character.id).await? {
        Some(removed) => {
            reply_html(
                &bot,
                &message,
                format!(
                    "Removed <b>{}</b> <code>{}</code> from the roster.",
                    escape_html(&removed.record.name),
                    escape_html(removed.short_id())
                ),
            )
            .await?;
        }
        None => {
            reply(&bot, &message, "That fighter was already removed.").await?;
        }
    }
    Ok(())
}
