//! Battle Discord commands - start a battle, build a team, surrender.
//!
//! Each command finds the caller's running battle in the current channel and
//! hands the request to the battle core; validation errors come back as
//! ephemeral replies through the framework error handler.

// Inner module to suppress missing_docs warnings for poise macro-generated code
mod inner {
    #![allow(missing_docs)]

    use crate::{
        bot::{BotData, handlers::autocomplete, surface::DiscordSurface},
        core::{
            battle::Battle,
            display::{ViewText, describe_ball},
            instance::{parse_unit_choice, snapshot_for_battle},
            player::get_or_create_player,
            registry::{BattleRequest, Participant},
            team::{BattleRules, Leader},
        },
        errors::{Error, Result},
    };
    use poise::serenity_prelude as serenity;
    use std::sync::Arc;
    use std::time::Duration;
    use tracing::info;

    type Context<'a> = poise::Context<'a, BotData, Error>;

    const SURRENDER_CONFIRM_ID: &str = "surrender:confirm";
    const SURRENDER_CANCEL_ID: &str = "surrender:cancel";

    async fn reply(ctx: Context<'_>, content: impl Into<String>) -> Result<()> {
        ctx.send(
            poise::CreateReply::default()
                .content(content)
                .ephemeral(true),
        )
        .await?;
        Ok(())
    }

    async fn current_battle(ctx: Context<'_>) -> Result<Arc<Battle>> {
        let guild_id = ctx.guild_id().ok_or(Error::NoActiveBattle)?;
        ctx.data()
            .battles
            .lookup(guild_id.get(), ctx.channel_id().get(), ctx.author().id.get())
            .await
            .ok_or(Error::NoActiveBattle)
    }

    /// Battles between players' countryballs.
    ///
    /// Start a battle with `/battle start`, build your team with `/battle add`
    /// and `/battle remove`, then accept. Use `/battle about` for the rules.
    #[poise::command(
        slash_command,
        guild_only,
        subcommands(
            "battle_start",
            "battle_add",
            "battle_remove",
            "battle_surrender",
            "battle_about"
        )
    )]
    pub async fn battle(ctx: Context<'_>) -> Result<()> {
        let help_text = "Battle commands. Available subcommands:\n\
            `/battle start <user> [amount] [duplicates]`\n\
            `/battle add <unit>`\n\
            `/battle remove <unit>`\n\
            `/battle surrender`\n\
            `/battle about`";
        reply(ctx, help_text).await
    }

    /// Challenges another user to a battle in this channel.
    #[poise::command(slash_command, guild_only, rename = "start")]
    pub async fn battle_start(
        ctx: Context<'_>,
        #[description = "The user you want to battle"] opponent: serenity::User,
        #[description = "Exact number of units each team must bring"]
        #[min = 1]
        amount: Option<u32>,
        #[description = "Allow several units of the same species in a team"]
        duplicates: Option<bool>,
    ) -> Result<()> {
        let data = ctx.data();
        let settings = Arc::clone(&data.settings);
        let db = &data.database;
        let guild_id = ctx.guild_id().ok_or(Error::NoActiveBattle)?;

        let amount = amount.map(|n| usize::try_from(n).unwrap_or(usize::MAX));
        if let Some(n) = amount
            && n > settings.battle.max_amount
        {
            return Err(Error::Ineligible {
                reason: format!(
                    "The amount must be between 1 and {}.",
                    settings.battle.max_amount
                ),
            });
        }

        let author = ctx.author();
        let challenger = get_or_create_player(db, author.id.get()).await?;
        if challenger.blacklisted {
            return Err(Error::Ineligible {
                reason: "You are blacklisted and cannot battle.".to_string(),
            });
        }
        let challenged = get_or_create_player(db, opponent.id.get()).await?;

        let request = BattleRequest {
            guild_id: guild_id.get(),
            channel_id: ctx.channel_id().get(),
            challenger: Participant {
                leader: Leader::new(author.id.get(), author.display_name()),
                player_id: challenger.id,
                is_bot: author.bot,
                blacklisted: challenger.blacklisted,
            },
            opponent: Participant {
                leader: Leader::new(opponent.id.get(), opponent.display_name()),
                player_id: challenged.id,
                is_bot: opponent.bot,
                blacklisted: challenged.blacklisted,
            },
            rules: BattleRules { amount, duplicates },
        };

        let text = ViewText::from(&*settings);
        let surface = DiscordSurface::new(
            Arc::clone(&ctx.serenity_context().http),
            ctx.channel_id(),
            text.clone(),
        );
        let battle = data
            .battles
            .start(request, text, settings.battle.timings(), Arc::new(surface))
            .await?;

        info!(
            battle_id = battle.id(),
            challenger = author.id.get(),
            opponent = opponent.id.get(),
            "Battle requested"
        );
        reply(
            ctx,
            format!(
                "Battle started with {}! Add {}s with `/battle add`.",
                opponent.display_name(),
                settings.collectible_name
            ),
        )
        .await
    }

    /// Adds one of your units to your battle team.
    #[poise::command(slash_command, guild_only, rename = "add")]
    pub async fn battle_add(
        ctx: Context<'_>,
        #[description = "The unit to add"]
        #[autocomplete = "autocomplete::autocomplete_owned_ball"]
        unit: String,
    ) -> Result<()> {
        let battle = current_battle(ctx).await?;
        let data = ctx.data();
        let instance_id = parse_unit_choice(&unit)?;

        let owner = get_or_create_player(&data.database, ctx.author().id.get()).await?;
        let ball = snapshot_for_battle(
            &data.database,
            instance_id,
            owner.id,
            data.settings.battle.stat_modifier(),
        )
        .await?;
        let description = describe_ball(&ball, false);

        battle.add_ball(ctx.author().id.get(), ball).await?;
        reply(ctx, format!("Added `{description}` to your team.")).await
    }

    /// Removes a unit from your battle team.
    #[poise::command(slash_command, guild_only, rename = "remove")]
    pub async fn battle_remove(
        ctx: Context<'_>,
        #[description = "The unit to remove"]
        #[autocomplete = "autocomplete::autocomplete_roster_ball"]
        unit: String,
    ) -> Result<()> {
        let battle = current_battle(ctx).await?;
        let instance_id = parse_unit_choice(&unit)?;

        let removed = battle
            .remove_ball(ctx.author().id.get(), instance_id)
            .await?;
        reply(
            ctx,
            format!("Removed `{}` from your team.", describe_ball(&removed, true)),
        )
        .await
    }

    /// Gives up the running battle.
    #[poise::command(slash_command, guild_only, rename = "surrender")]
    pub async fn battle_surrender(ctx: Context<'_>) -> Result<()> {
        let battle = current_battle(ctx).await?;
        if battle.phase().await.is_proposing() {
            return Err(Error::NotStarted);
        }

        let buttons = serenity::CreateActionRow::Buttons(vec![
            serenity::CreateButton::new(SURRENDER_CONFIRM_ID)
                .label("Surrender")
                .style(serenity::ButtonStyle::Danger),
            serenity::CreateButton::new(SURRENDER_CANCEL_ID)
                .label("Keep fighting")
                .style(serenity::ButtonStyle::Secondary),
        ]);
        let handle = ctx
            .send(
                poise::CreateReply::default()
                    .content("Are you sure you want to surrender?")
                    .components(vec![buttons])
                    .ephemeral(true),
            )
            .await?;
        let message = handle.message().await?;

        let answer = serenity::ComponentInteractionCollector::new(ctx.serenity_context())
            .author_id(ctx.author().id)
            .message_id(message.id)
            .timeout(Duration::from_secs(60))
            .await;

        let outcome = match answer {
            Some(press) if press.data.custom_id == SURRENDER_CONFIRM_ID => {
                press
                    .create_response(ctx.http(), serenity::CreateInteractionResponse::Acknowledge)
                    .await?;
                battle.surrender(ctx.author().id.get()).await?;
                "You surrendered."
            }
            Some(press) => {
                press
                    .create_response(ctx.http(), serenity::CreateInteractionResponse::Acknowledge)
                    .await?;
                "Surrender cancelled."
            }
            None => "Surrender cancelled.",
        };

        handle
            .edit(
                ctx,
                poise::CreateReply::default()
                    .content(outcome)
                    .components(Vec::new()),
            )
            .await?;
        Ok(())
    }

    /// Explains how battles work.
    #[poise::command(slash_command, rename = "about")]
    pub async fn battle_about(ctx: Context<'_>) -> Result<()> {
        let collectible = &ctx.data().settings.collectible_name;
        let about = format!(
            "**How battles work**\n\
            • Challenge someone with `/battle start`. Both players add {collectible}s \
            with `/battle add` and accept once their team is ready.\n\
            • A die decides which team starts. Teams then take turns.\n\
            • You control the first {collectible} of your team: attack an opposing \
            unit or sleep to recover health. Every other {collectible} acts on its own.\n\
            • Defense absorbs damage before health does. A {collectible} whose health \
            drops to zero is out of the battle.\n\
            • The last team standing wins. If you don't act within the time limit the \
            battle is cancelled, and you can give up with `/battle surrender`."
        );
        reply(ctx, about).await
    }
}

pub use inner::*;
