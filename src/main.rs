use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use dotenvy::dotenv;
use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use teloxide::types::Me;
use teloxide::utils::command::BotCommands;
use tracing::{error, info};

mod cli;
mod config;
mod db;
mod forge;
mod handlers;
mod llm;
mod roster;
mod state;
mod utils;

use cli::{parse_forge_cli_args, run_forge_cli};
use config::CONFIG;
use db::Database;
use forge::CharacterForge;
use handlers::forge as forge_handlers;
use llm::GeminiClient;
use roster::RosterStore;
use state::AppState;
use utils::logging::init_logging;

#[derive(BotCommands, Clone)]
#[command(rename_rule = "lowercase")]
enum Command {
    Start,
    Help,
    Forge(String),
    Options,
    Roster,
    Show(String),
    Forget(String),
}

type HandlerResult = Result<(), Box<dyn Error + Send + Sync>>;

#[tokio::main]
async fn main() -> HandlerResult {
    dotenv().ok();
    let _guards = init_logging(&CONFIG.log_level, Path::new("logs"));

    let args: Vec<String> = std::env::args().collect();
    if let Some(forge_args) = parse_forge_cli_args(&args)? {
        let character = run_forge_cli(forge_args).await?;
        info!(
            "Forged {} ({}) with portrait={}",
            character.record.name,
            character.id,
            character.image_url.is_some()
        );
        return Ok(());
    }

    if CONFIG.bot_token.trim().is_empty() {
        return Err("BOT_TOKEN is required unless running the forge subcommand".into());
    }

    let bot = Bot::new(CONFIG.bot_token.clone());
    info!("Starting Martial Forge bot");

    let db = Database::init(&CONFIG.database_url).await?;
    db.health_check().await?;
    let forge = CharacterForge::new(Arc::new(GeminiClient::from_config(&CONFIG)))
        .with_temperature(CONFIG.gemini_temperature);
    let state = AppState::new(forge, RosterStore::new(db, CONFIG.roster_max_entries));

    let command_handler = dptree::entry()
        .filter_command::<Command>()
        .endpoint(handle_command);

    // `/forge` sent as a photo caption never reaches filter_command.
    let caption_command_handler = dptree::filter_map(|message: Message, me: Me| {
        let caption = message.caption()?;
        Command::parse(caption, me.username()).ok()
    })
    .endpoint(handle_command);

    let message_handler = Update::filter_message()
        .branch(command_handler)
        .branch(caption_command_handler)
        .endpoint(ignore_message);

    Dispatcher::builder(bot, message_handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

async fn handle_command(
    bot: Bot,
    state: AppState,
    message: Message,
    command: Command,
) -> HandlerResult {
    match command {
        Command::Start => forge_handlers::start_handler(bot, message).await?,
        Command::Help => forge_handlers::help_handler(bot, message).await?,
        Command::Options => forge_handlers::options_handler(bot, message).await?,
        Command::Forge(args) => {
            tokio::spawn(async move {
                if let Err(err) = forge_handlers::forge_handler(bot, state, message, args).await {
                    error!("forge handler failed: {err}");
                }
            });
        }
        Command::Roster => {
            tokio::spawn(async move {
                if let Err(err) = forge_handlers::roster_handler(bot, state, message).await {
                    error!("roster handler failed: {err}");
                }
            });
        }
        Command::Show(prefix) => {
            tokio::spawn(async move {
                if let Err(err) = forge_handlers::show_handler(bot, state, message, prefix).await {
                    error!("show handler failed: {err}");
                }
            });
        }
        Command::Forget(prefix) => {
            tokio::spawn(async move {
                if let Err(err) =
                    forge_handlers::forget_handler(bot, state, message, prefix).await
                {
                    error!("forget handler failed: {err}");
                }
            });
        }
    }
    Ok(())
}

async fn ignore_message(_message: Message) -> HandlerResult {
    Ok(())
}
