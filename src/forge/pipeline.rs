//! Two-stage orchestration: profile first, then portrait.
//!
//! Stage 1 failures abort the request. Stage 2 failures are absorbed into
//! "no image" so a valid profile is never thrown away.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{info, warn};

use crate::forge::options::GenerationOptions;
use crate::forge::prompt::{compile_image_prompt, compile_profile_prompt};
use crate::forge::record::{CharacterRecord, GeneratedCharacter};
use crate::forge::sanitize::{sanitize_with_report, SanitizationReport};
use crate::forge::schema::character_schema;
use crate::llm::client::{ClientError, GenerationClient, ProfileRequest};
use crate::llm::media::DataUrl;

pub const DEFAULT_PROFILE_TEMPERATURE: f32 = 0.9;

static CODE_FENCE_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?s)^```[A-Za-z0-9_-]*\s*(.*?)\s*```$").expect("code fence regex")
});

#[derive(Debug, thiserror::Error)]
pub enum ForgeError {
    #[error("profile generation failed: {0}")]
    ProfileGeneration(#[from] ClientError),
    #[error("profile generation returned no text")]
    EmptyProfile,
    #[error("profile generation returned invalid JSON: {0}")]
    MalformedProfile(#[source] serde_json::Error),
}

/// Stage 1 result. The record is complete and usable before Stage 2 runs.
#[derive(Debug, Clone)]
pub struct ForgedProfile {
    pub record: CharacterRecord,
    pub report: SanitizationReport,
}

/// Removes a surrounding Markdown code fence, if the model added one.
pub fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    CODE_FENCE_RE
        .captures(trimmed)
        .and_then(|captures| captures.get(1))
        .map(|inner| inner.as_str())
        .unwrap_or(trimmed)
}

pub fn parse_profile_text(text: &str) -> Result<Value, ForgeError> {
    let body = strip_code_fences(text);
    if body.is_empty() {
        return Err(ForgeError::EmptyProfile);
    }
    serde_json::from_str(body).map_err(ForgeError::MalformedProfile)
}

#[derive(Clone)]
pub struct CharacterForge {
    client: Arc<dyn GenerationClient>,
    temperature: f32,
}

impl CharacterForge {
    pub fn new(client: Arc<dyn GenerationClient>) -> Self {
        Self {
            client,
            temperature: DEFAULT_PROFILE_TEMPERATURE,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub async fn forge_profile(
        &self,
        options: &GenerationOptions,
    ) -> Result<ForgedProfile, ForgeError> {
        let compiled = compile_profile_prompt(options);
        let request = ProfileRequest {
            prompt: compiled.text,
            reference_image: compiled.reference_image,
            schema: character_schema(),
            temperature: self.temperature,
        };

        let text = self.client.generate_profile(request).await?;
        let raw = parse_profile_text(&text)?;
        let (mut record, report) = sanitize_with_report(&raw);
        record.image_style = options.image_style;

        info!(
            name = %record.name,
            style = record.image_style.as_str(),
            defaults = report.defaults.len(),
            "Profile generated"
        );
        Ok(ForgedProfile { record, report })
    }

    /// Never fails: an error or an empty response both mean "no image".
    pub async fn forge_image(&self, record: &CharacterRecord) -> Option<DataUrl> {
        let prompt = compile_image_prompt(record);
        match self.client.generate_image(&prompt).await {
            Ok(Some(image)) => Some(image),
            Ok(None) => {
                warn!(name = %record.name, "Image generation returned no image payload");
                None
            }
            Err(err) => {
                warn!(name = %record.name, "Image generation failed: {}", err);
                None
            }
        }
    }

    /// Runs both stages in order and stamps the result with an id.
    pub async fn forge(
        &self,
        options: &GenerationOptions,
    ) -> Result<GeneratedCharacter, ForgeError> {
        let profile = self.forge_profile(options).await?;
        let image = self.forge_image(&profile.record).await;
        Ok(GeneratedCharacter::new(profile.record).with_image_url(image.map(|image| image.to_string())))
    }
}
