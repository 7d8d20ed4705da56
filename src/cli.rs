use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use tracing::{info, info_span, Instrument};

use crate::config::CONFIG;
use crate::forge::options::GenerationOptions;
use crate::forge::pipeline::CharacterForge;
use crate::forge::record::GeneratedCharacter;
use crate::llm::gemini::GeminiClient;
use crate::utils::timing::{complete_request_timer, RequestTimer};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForgeCliArgs {
    pub options_path: PathBuf,
    pub out_path: Option<PathBuf>,
    pub skip_image: bool,
}

pub fn forge_usage() -> &'static str {
    "Usage: martial_forge_bot forge --options <file.json> [--out <file>] [--no-image]"
}

pub fn parse_forge_cli_args(args: &[String]) -> Result<Option<ForgeCliArgs>> {
    if args.get(1).map(|value| value.as_str()) != Some("forge") {
        return Ok(None);
    }

    let mut options_path: Option<PathBuf> = None;
    let mut out_path: Option<PathBuf> = None;
    let mut skip_image = false;

    let mut index = 2;
    while index < args.len() {
        match args[index].as_str() {
            "--options" => {
                index += 1;
                let value = args
                    .get(index)
                    .ok_or_else(|| anyhow!("Missing value for --options"))?;
                options_path = Some(PathBuf::from(value));
            }
            "--out" => {
                index += 1;
                let value = args
                    .get(index)
                    .ok_or_else(|| anyhow!("Missing value for --out"))?;
                out_path = Some(PathBuf::from(value));
            }
            "--no-image" => {
                skip_image = true;
            }
            "--help" | "-h" => {
                return Err(anyhow!(forge_usage()));
            }
            other => {
                return Err(anyhow!(
                    "Unknown forge argument: {other}\n{}",
                    forge_usage()
                ));
            }
        }
        index += 1;
    }

    let options_path = options_path.ok_or_else(|| anyhow!("--options is required"))?;

    Ok(Some(ForgeCliArgs {
        options_path,
        out_path,
        skip_image,
    }))
}

pub async fn forge_once(
    forge: &CharacterForge,
    options: &GenerationOptions,
    skip_image: bool,
) -> Result<GeneratedCharacter> {
    if skip_image {
        let profile = forge.forge_profile(options).await?;
        return Ok(GeneratedCharacter::new(profile.record));
    }
    Ok(forge.forge(options).await?)
}

pub async fn run_forge_cli(args: ForgeCliArgs) -> Result<GeneratedCharacter> {
    let text = tokio::fs::read_to_string(&args.options_path)
        .await
        .with_context(|| format!("Failed to read {}", args.options_path.display()))?;
    let options = GenerationOptions::from_json(&text)
        .with_context(|| format!("Invalid options in {}", args.options_path.display()))?;

    let client = Arc::new(GeminiClient::from_config(&CONFIG));
    let forge = CharacterForge::new(client).with_temperature(CONFIG.gemini_temperature);

    let request_id = uuid::Uuid::new_v4().to_string();
    let span = info_span!("forge_request", request_id = %request_id);
    let mut timer = RequestTimer::new("cli_forge", &request_id);
    timer.log_received();

    let result = forge_once(&forge, &options, args.skip_image)
        .instrument(span)
        .await;
    match &result {
        Ok(character) => {
            let status = if character.image_url.is_some() || args.skip_image {
                "success"
            } else {
                "no_image"
            };
            complete_request_timer(&mut timer, status, None);
        }
        Err(err) => complete_request_timer(&mut timer, "error", Some(err.to_string())),
    }
    let character = result?;

    let json = serde_json::to_string_pretty(&character)?;
    match &args.out_path {
        Some(path) => {
            tokio::fs::write(path, json)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!("Wrote {} ({}) to {}", character.record.name, character.id, path.display());
        }
        None => println!("{json}"),
    }

    Ok(character)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::client::fake::FakeClient;
    use crate::llm::media::DataUrl;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn ignores_other_invocations() {
        assert_eq!(parse_forge_cli_args(&args(&["bot"])).unwrap(), None);
        assert_eq!(parse_forge_cli_args(&args(&["bot", "serve"])).unwrap(), None);
    }

    #[test]
    fn parses_all_flags() {
        let parsed = parse_forge_cli_args(&args(&[
            "bot", "forge", "--options", "in.json", "--out", "out.json", "--no-image",
        ]))
        .unwrap()
        .unwrap();
        assert_eq!(parsed.options_path, PathBuf::from("in.json"));
        assert_eq!(parsed.out_path, Some(PathBuf::from("out.json")));
        assert!(parsed.skip_image);
    }

    #[test]
    fn reports_missing_and_unknown_arguments() {
        assert!(parse_forge_cli_args(&args(&["bot", "forge"])).is_err());
        assert!(parse_forge_cli_args(&args(&["bot", "forge", "--options"])).is_err());
        let err = parse_forge_cli_args(&args(&["bot", "forge", "--options", "a", "--fast"]))
            .unwrap_err();
        assert!(err.to_string().contains("--fast"));
    }

    #[tokio::test]
    async fn no_image_skips_the_second_stage() {
        let client = Arc::new(
            FakeClient::new("{\"name\":\"Hanzo\"}")
                .with_image(DataUrl::from_base64("image/png", "aGVsbG8=")),
        );
        let forge = CharacterForge::new(client.clone());

        let character = forge_once(&forge, &GenerationOptions::default(), true)
            .await
            .unwrap();
        assert_eq!(character.record.name, "Hanzo");
        assert!(character.image_url.is_none());
        assert!(client.image_prompts.lock().is_empty());

        let character = forge_once(&forge, &GenerationOptions::default(), false)
            .await
            .unwrap();
        assert!(character.image_url.is_some());
    }
}
