//! Player records - lookups and blacklist management.

use crate::{
    entities::{Player, player},
    errors::Result,
};
use sea_orm::{Set, prelude::*};

/// Finds the player for a Discord user, creating the record on first use.
pub async fn get_or_create_player(
    db: &DatabaseConnection,
    discord_id: u64,
) -> Result<player::Model> {
    if let Some(existing) = get_player(db, discord_id).await? {
        return Ok(existing);
    }

    let created = player::ActiveModel {
        discord_id: Set(discord_id.to_string()),
        blacklisted: Set(false),
        ..Default::default()
    }
    .insert(db)
    .await?;
    Ok(created)
}

/// Finds the player for a Discord user.
pub async fn get_player(db: &DatabaseConnection, discord_id: u64) -> Result<Option<player::Model>> {
    Player::find()
        .filter(player::Column::DiscordId.eq(discord_id.to_string()))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Sets the blacklist flag of a player, creating the record if needed.
pub async fn set_blacklisted(
    db: &DatabaseConnection,
    discord_id: u64,
    blacklisted: bool,
) -> Result<player::Model> {
    let existing = get_or_create_player(db, discord_id).await?;
    let mut active: player::ActiveModel = existing.into();
    active.blacklisted = Set(blacklisted);
    Ok(active.update(db).await?)
}
