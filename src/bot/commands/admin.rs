//! Owner-only administration commands - hand out units and manage the blacklist.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, handlers::autocomplete},
        core::{
            instance::{create_instance, creature_stats, get_ball_by_country},
            player::{get_or_create_player, set_blacklisted},
        },
        errors::{Error, Result},
    };
    use poise::serenity_prelude as serenity;
    use tracing::info;

    /// Bot administration.
    #[poise::command(
        slash_command,
        owners_only,
        subcommands("admin_give", "admin_blacklist")
    )]
    pub async fn admin(ctx: poise::Context<'_, BotData, Error>) -> Result<()> {
        ctx.say("Admin commands. Available subcommands: `give`, `blacklist`.")
            .await?;
        Ok(())
    }

    /// Gives a unit of a species to a user.
    #[poise::command(slash_command, owners_only, rename = "give")]
    pub async fn admin_give(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "Who receives the unit"] user: serenity::User,
        #[description = "Species of the unit"]
        #[autocomplete = "autocomplete::autocomplete_species"]
        species: String,
        #[description = "Health bonus in percent"]
        #[min = -100]
        #[max = 100]
        health_bonus: Option<i32>,
        #[description = "Attack bonus in percent"]
        #[min = -100]
        #[max = 100]
        attack_bonus: Option<i32>,
    ) -> Result<()> {
        let db = &ctx.data().database;

        let ball = get_ball_by_country(db, &species)
            .await?
            .ok_or(Error::SpeciesNotFound { name: species })?;
        let owner = get_or_create_player(db, user.id.get()).await?;
        let instance = create_instance(
            db,
            owner.id,
            ball.id,
            health_bonus.unwrap_or(0),
            attack_bonus.unwrap_or(0),
        )
        .await?;

        let stats = creature_stats(&instance, &ball);
        info!(
            instance_id = instance.id,
            owner = user.id.get(),
            species = %ball.country,
            "Unit given"
        );
        ctx.say(format!(
            "Gave `#{:X}` {} (ATK:{} HP:{}) to {}.",
            stats.id,
            stats.species,
            stats.attack,
            stats.health,
            user.display_name()
        ))
        .await?;
        Ok(())
    }

    /// Blocks or unblocks a user from battles.
    #[poise::command(slash_command, owners_only, rename = "blacklist")]
    pub async fn admin_blacklist(
        ctx: poise::Context<'_, BotData, Error>,
        #[description = "The user to update"] user: serenity::User,
        #[description = "Whether the user is blacklisted"] blacklisted: bool,
    ) -> Result<()> {
        set_blacklisted(&ctx.data().database, user.id.get(), blacklisted).await?;
        info!(user_id = user.id.get(), blacklisted, "Blacklist updated");

        let status = if blacklisted { "blacklisted" } else { "removed from the blacklist" };
        ctx.say(format!("{} has been {status}.", user.display_name()))
            .await?;
        Ok(())
    }
}

pub use inner::*;
