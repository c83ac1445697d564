//! General Discord commands - ping, help, and other utility commands.
//! This module contains simple commands that don't require database operations
//! and provide basic bot functionality and user assistance.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::BotData,
        errors::{Error, Result},
    };

    /// Responds with "Pong!" to test bot connectivity.
    #[poise::command(slash_command, prefix_command)]
    pub async fn ping(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say("Pong!").await?;
        Ok(())
    }

    /// Displays help information about available commands.
    #[poise::command(slash_command, prefix_command)]
    pub async fn help(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        let settings = &ctx.data().settings;
        let active = ctx.data().battles.active_count().await;
        let help_text = format!(
            "**{} Help**\n\
            Battle your {}s against other players.\n\n\
            **Battle Commands**\n\
            • `/battle start <user> [amount] [duplicates]` - Challenges a user.\n\
            • `/battle add <unit>` - Adds a unit to your team.\n\
            • `/battle remove <unit>` - Removes a unit from your team.\n\
            • `/battle surrender` - Gives up a running battle.\n\
            • `/battle about` - Explains the rules.\n\n\
            **Utility Commands**\n\
            • `/ping` - Checks if the bot is responsive.\n\
            • `/help` - Shows this help message.\n\n\
            Battles running right now: {active}",
            settings.bot_name, settings.collectible_name
        );

        ctx.say(help_text).await?;
        Ok(())
    }
}

// Re-export all commands
pub use inner::*;
