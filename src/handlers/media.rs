use anyhow::{anyhow, Result};
use teloxide::prelude::*;
use teloxide::types::{FileId, PhotoSize};
use tracing::warn;

use crate::config::CONFIG;
use crate::llm::media::DataUrl;
use crate::utils::http::get_http_client;

const MAX_REFERENCE_BYTES: u32 = 10 * 1024 * 1024;

pub async fn get_file_url(bot: &Bot, file_id: &FileId) -> Result<String> {
    let file = bot.get_file(file_id.clone()).await?;
    Ok(format!(
        "https://api.telegram.org/file/bot{}/{}",
        CONFIG.bot_token, file.path
    ))
}

async fn download_bytes(url: &str) -> Result<Vec<u8>> {
    // The file URL embeds the bot token; keep it out of error messages.
    let response = get_http_client()
        .get(url)
        .send()
        .await
        .map_err(|err| err.without_url())?;
    if !response.status().is_success() {
        return Err(anyhow!("download failed with status {}", response.status()));
    }
    let bytes = response.bytes().await.map_err(|err| err.without_url())?;
    Ok(bytes.to_vec())
}

/// The photo attached to the command itself, or else to the message it
/// replies to. Telegram lists sizes smallest first.
pub fn reference_photo(message: &Message) -> Option<&PhotoSize> {
    message
        .photo()
        .or_else(|| message.reply_to_message().and_then(|reply| reply.photo()))
        .and_then(|sizes| sizes.last())
}

pub async fn download_reference_image(bot: &Bot, photo: &PhotoSize) -> Option<DataUrl> {
    if photo.file.size > MAX_REFERENCE_BYTES {
        warn!("Reference photo too large ({} bytes), ignoring", photo.file.size);
        return None;
    }

    let url = match get_file_url(bot, &photo.file.id).await {
        Ok(url) => url,
        Err(err) => {
            warn!("Failed to resolve reference photo: {err}");
            return None;
        }
    };

    match download_bytes(&url).await {
        Ok(bytes) if !bytes.is_empty() => Some(DataUrl::from_bytes(&bytes, "image/jpeg")),
        Ok(_) => {
            warn!("Reference photo download was empty");
            None
        }
        Err(err) => {
            warn!("Failed to download reference photo: {err}");
            None
        }
    }
}
