//! Autocomplete handlers for Discord slash command parameters.
//!
//! Suggestions are formatted as `#<hex id> <species>`; the commands only read the
//! leading id, so a suggestion can be submitted as is.

use crate::{
    bot::BotData,
    core::{
        display::describe_ball,
        instance::{self, creature_stats},
        player,
    },
    errors::Error,
};

/// Discord's limit on autocomplete choices.
const MAX_CHOICES: usize = 25;

fn matches(entry: &str, partial_lower: &str) -> bool {
    entry.to_lowercase().contains(partial_lower)
}

/// Provides suggestions for the caller's own units.
///
/// Only the caller's instances are listed, oldest first.
pub async fn autocomplete_owned_ball(
    ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    let db = &ctx.data().database;

    let Ok(Some(owner)) = player::get_player(db, ctx.author().id.get()).await else {
        return Vec::new();
    };
    let Ok(owned) = instance::list_player_instances(db, owner.id).await else {
        return Vec::new();
    };

    let partial_lower = partial.to_lowercase();
    owned
        .iter()
        .map(|(instance, species)| {
            let stats = creature_stats(instance, species);
            format!("#{:X} {}", stats.id, stats.species)
        })
        .filter(|entry| matches(entry, &partial_lower))
        .take(MAX_CHOICES)
        .collect()
}

/// Provides suggestions for the units in the caller's current battle roster.
pub async fn autocomplete_roster_ball(
    ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    let Some(guild_id) = ctx.guild_id() else {
        return Vec::new();
    };
    let user_id = ctx.author().id.get();
    let Some(battle) = ctx
        .data()
        .battles
        .lookup(guild_id.get(), ctx.channel_id().get(), user_id)
        .await
    else {
        return Vec::new();
    };

    let snapshot = battle.snapshot().await;
    let team = if snapshot.team1.leader.id == user_id {
        &snapshot.team1
    } else {
        &snapshot.team2
    };

    let partial_lower = partial.to_lowercase();
    team.proposal
        .iter()
        .map(|ball| describe_ball(ball, true))
        .filter(|entry| matches(entry, &partial_lower))
        .take(MAX_CHOICES)
        .collect()
}

/// Provides suggestions for enabled species names.
pub async fn autocomplete_species(
    ctx: poise::Context<'_, BotData, Error>,
    partial: &str,
) -> Vec<String> {
    let Ok(species) = instance::list_enabled_balls(&ctx.data().database).await else {
        return Vec::new();
    };

    let partial_lower = partial.to_lowercase();
    species
        .into_iter()
        .map(|ball| ball.country)
        .filter(|name| matches(name, &partial_lower))
        .take(MAX_CHOICES)
        .collect()
}
