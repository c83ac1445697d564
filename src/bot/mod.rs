//! Bot layer - Discord-specific interface and command handlers
//!
//! This module provides the Discord interface for the battle system,
//! including the slash commands, the button and modal handlers, and the
//! serenity implementation of the battle messaging surface.

/// Discord command implementations (battle, admin, general)
pub mod commands;
/// Discord interaction handlers (autocomplete, buttons, modals)
pub mod handlers;
/// Battle messages rendered with serenity builders
pub mod surface;

use crate::{
    config::Settings,
    core::registry::BattleManager,
    errors::{Error, Result},
};
use poise::serenity_prelude as serenity;
use sea_orm::DatabaseConnection;
use std::sync::Arc;
use tracing::{error, info, instrument};

/// Shared data available to all bot commands.
/// This structure holds the database connection, the loaded settings and
/// the registry of running battles.
pub struct BotData {
    /// Database connection for all database operations
    pub database: DatabaseConnection,
    /// Application settings
    pub settings: Arc<Settings>,
    /// Running battles
    pub battles: BattleManager,
}

impl BotData {
    /// Creates a new `BotData` instance with an empty battle registry.
    #[must_use]
    pub fn new(database: DatabaseConnection, settings: Arc<Settings>) -> Self {
        Self {
            database,
            settings,
            battles: BattleManager::new(),
        }
    }
}

async fn on_error(error: poise::FrameworkError<'_, BotData, Error>) {
    match error {
        poise::FrameworkError::Setup { error, .. } => {
            error!("Failed to start bot: {:?}", error);
        }
        poise::FrameworkError::Command { error, ctx, .. } => {
            let message = if error.is_user_facing() {
                error.to_string()
            } else {
                error!("Error in command `{}`: {:?}", ctx.command().name, error);
                "An internal error occurred, please try again later.".to_string()
            };
            let reply = poise::CreateReply::default().content(message).ephemeral(true);
            if let Err(e) = ctx.send(reply).await {
                error!("Failed to send error message: {}", e);
            }
        }
        error => {
            if let Err(e) = poise::builtins::on_error(error).await {
                error!("Error while handling error: {}", e);
            }
        }
    }
}

/// Connects to Discord and runs until the client stops.
#[instrument(skip(token, data))]
pub async fn run_bot(token: String, data: BotData) -> Result<()> {
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: vec![
                commands::battle(),
                commands::admin(),
                commands::ping(),
                commands::help(),
            ],
            on_error: |error| Box::pin(on_error(error)),
            event_handler: |ctx, event, _framework, data| {
                Box::pin(handlers::interactions::handle_event(ctx, event, data))
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!("Logged in as {}", ready.user.name);
                info!("Registering commands globally...");
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;
                Ok(data)
            })
        })
        .build();

    let intents = serenity::GatewayIntents::GUILDS | serenity::GatewayIntents::GUILD_MESSAGES;

    info!("Setting up Serenity client for Poise framework...");
    let mut client = serenity::ClientBuilder::new(&token, intents)
        .framework(framework)
        .await
        .inspect_err(|e| error!("Error creating client: {:?}", e))?;

    info!("Starting bot client...");
    client
        .start()
        .await
        .inspect_err(|e| error!("Client error: {:?}", e))?;
    Ok(())
}

pub use commands::*;
