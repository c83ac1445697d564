//! Creature instances - ownership lookups and battle snapshots.
//!
//! An instance's stats are its species' base stats scaled by the instance's
//! percentage bonuses, truncated to integers.

use crate::{
    core::{
        ball::{BattleBall, CreatureStats},
        modifier::{StatModifier, apply_percent},
    },
    entities::{Ball, BallInstance, ball, ball_instance},
    errors::{Error, Result},
};
use sea_orm::{QueryOrder, Set, prelude::*};

/// An owned instance together with its species.
pub type OwnedBall = (ball_instance::Model, ball::Model);

/// Computes the battle stats of an instance.
#[must_use]
pub fn creature_stats(instance: &ball_instance::Model, species: &ball::Model) -> CreatureStats {
    CreatureStats {
        id: instance.id,
        species: species.country.clone(),
        health: apply_percent(species.health, f64::from(instance.health_bonus)),
        attack: apply_percent(species.attack, f64::from(instance.attack_bonus)),
    }
}

/// Parses an instance id as typed by players: hexadecimal, optionally prefixed with `#`.
#[must_use]
pub fn parse_instance_id(text: &str) -> Option<i64> {
    let trimmed = text.trim().trim_start_matches('#');
    if trimmed.is_empty() {
        return None;
    }
    i64::from_str_radix(trimmed, 16).ok()
}

/// Parses an autocomplete choice such as `#1A Spain`: the leading token is the id.
///
/// # Errors
/// [`Error::InvalidUnitChoice`] echoing the input when no id can be read.
pub fn parse_unit_choice(text: &str) -> Result<i64> {
    text.split_whitespace()
        .next()
        .and_then(parse_instance_id)
        .ok_or_else(|| Error::InvalidUnitChoice {
            input: text.trim().to_string(),
        })
}

/// Finds a species by its exact name.
pub async fn get_ball_by_country(
    db: &DatabaseConnection,
    country: &str,
) -> Result<Option<ball::Model>> {
    Ball::find()
        .filter(ball::Column::Country.eq(country))
        .one(db)
        .await
        .map_err(Into::into)
}

/// Lists enabled species, alphabetically.
pub async fn list_enabled_balls(db: &DatabaseConnection) -> Result<Vec<ball::Model>> {
    Ball::find()
        .filter(ball::Column::Enabled.eq(true))
        .order_by_asc(ball::Column::Country)
        .all(db)
        .await
        .map_err(Into::into)
}

/// Creates an instance of `ball_id` owned by `player_id`.
pub async fn create_instance(
    db: &DatabaseConnection,
    player_id: i64,
    ball_id: i64,
    health_bonus: i32,
    attack_bonus: i32,
) -> Result<ball_instance::Model> {
    let instance = ball_instance::ActiveModel {
        ball_id: Set(ball_id),
        player_id: Set(player_id),
        health_bonus: Set(health_bonus),
        attack_bonus: Set(attack_bonus),
        catch_date: Set(chrono::Utc::now()),
        ..Default::default()
    };
    Ok(instance.insert(db).await?)
}

/// Loads an instance owned by `player_id`.
///
/// # Errors
/// [`Error::InstanceNotFound`] when the instance does not exist or belongs to someone else.
pub async fn get_player_instance(
    db: &DatabaseConnection,
    instance_id: i64,
    player_id: i64,
) -> Result<OwnedBall> {
    let found = BallInstance::find_by_id(instance_id)
        .filter(ball_instance::Column::PlayerId.eq(player_id))
        .find_also_related(Ball)
        .one(db)
        .await?;

    match found {
        Some((instance, Some(species))) => Ok((instance, species)),
        _ => Err(Error::InstanceNotFound { id: instance_id }),
    }
}

/// Lists the instances owned by a player, oldest first.
pub async fn list_player_instances(
    db: &DatabaseConnection,
    player_id: i64,
) -> Result<Vec<OwnedBall>> {
    let rows = BallInstance::find()
        .filter(ball_instance::Column::PlayerId.eq(player_id))
        .order_by_asc(ball_instance::Column::Id)
        .find_also_related(Ball)
        .all(db)
        .await?;

    Ok(rows
        .into_iter()
        .filter_map(|(instance, species)| species.map(|s| (instance, s)))
        .collect())
}

/// Builds the battle unit for an owned instance, running it through `modifier`.
pub async fn snapshot_for_battle(
    db: &DatabaseConnection,
    instance_id: i64,
    player_id: i64,
    modifier: &dyn StatModifier,
) -> Result<BattleBall> {
    let (instance, species) = get_player_instance(db, instance_id, player_id).await?;
    let stats = modifier.apply(creature_stats(&instance, &species));
    BattleBall::new(&stats)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::modifier::{BossEffect, NoModifier};
    use crate::core::player::get_or_create_player;
    use crate::test_utils::{create_test_ball, setup_test_db};

    #[test]
    fn test_parse_instance_id() {
        assert_eq!(parse_instance_id("#1A"), Some(0x1A));
        assert_eq!(parse_instance_id("ff"), Some(0xFF));
        assert_eq!(parse_instance_id(" 10 "), Some(0x10));
        assert_eq!(parse_instance_id("#"), None);
        assert_eq!(parse_instance_id("zz"), None);
    }

    #[test]
    fn test_parse_unit_choice() {
        assert_eq!(parse_unit_choice("#1A Spain").unwrap(), 0x1A);
        assert_eq!(parse_unit_choice("2b").unwrap(), 0x2B);

        let err = parse_unit_choice(" Spain ").unwrap_err();
        assert!(matches!(err, Error::InvalidUnitChoice { ref input } if input == "Spain"));
        assert_eq!(err.to_string(), "'Spain' is not a valid unit id.");
        assert!(matches!(
            parse_unit_choice(""),
            Err(Error::InvalidUnitChoice { .. })
        ));
    }

    #[tokio::test]
    async fn test_creature_stats_truncate_bonuses() -> Result<()> {
        let db = setup_test_db().await?;
        let player = get_or_create_player(&db, 1).await?;
        let species = create_test_ball(&db, "Spain", 33, 47).await?;

        // 33 * 1.15 = 37.95, 47 * 0.9 = 42.3
        let instance = create_instance(&db, player.id, species.id, 15, -10).await?;
        let stats = creature_stats(&instance, &species);
        assert_eq!(stats.health, 37);
        assert_eq!(stats.attack, 42);
        assert_eq!(stats.species, "Spain");
        Ok(())
    }

    #[tokio::test]
    async fn test_get_player_instance_checks_owner() -> Result<()> {
        let db = setup_test_db().await?;
        let owner = get_or_create_player(&db, 1).await?;
        let other = get_or_create_player(&db, 2).await?;
        let species = create_test_ball(&db, "Peru", 40, 20).await?;
        let instance = create_instance(&db, owner.id, species.id, 0, 0).await?;

        let (found, found_species) = get_player_instance(&db, instance.id, owner.id).await?;
        assert_eq!(found.id, instance.id);
        assert_eq!(found_species.country, "Peru");

        let result = get_player_instance(&db, instance.id, other.id).await;
        assert!(matches!(result, Err(Error::InstanceNotFound { .. })));

        let result = get_player_instance(&db, 999, owner.id).await;
        assert!(matches!(result, Err(Error::InstanceNotFound { id: 999 })));
        Ok(())
    }

    #[tokio::test]
    async fn test_list_player_instances() -> Result<()> {
        let db = setup_test_db().await?;
        let owner = get_or_create_player(&db, 1).await?;
        let other = get_or_create_player(&db, 2).await?;
        let peru = create_test_ball(&db, "Peru", 40, 20).await?;
        let chile = create_test_ball(&db, "Chile", 40, 20).await?;

        create_instance(&db, owner.id, peru.id, 0, 0).await?;
        create_instance(&db, owner.id, chile.id, 0, 0).await?;
        create_instance(&db, other.id, chile.id, 0, 0).await?;

        let owned = list_player_instances(&db, owner.id).await?;
        assert_eq!(owned.len(), 2);
        assert_eq!(owned[0].1.country, "Peru");
        assert_eq!(owned[1].1.country, "Chile");
        Ok(())
    }

    #[tokio::test]
    async fn test_snapshot_applies_modifier() -> Result<()> {
        let db = setup_test_db().await?;
        let owner = get_or_create_player(&db, 1).await?;
        let species = create_test_ball(&db, "Catalonia", 40, 40).await?;
        let instance = create_instance(&db, owner.id, species.id, 0, 0).await?;

        let plain = snapshot_for_battle(&db, instance.id, owner.id, &NoModifier).await?;
        assert_eq!(plain.health, 40);
        assert_eq!(plain.defense, 40);

        let boosted = snapshot_for_battle(&db, instance.id, owner.id, &BossEffect::Spain).await?;
        assert_eq!(boosted.attack, 50);
        assert_eq!(boosted.health, 30);
        // sqrt(30 * 50) = 38.73
        assert_eq!(boosted.defense, 39);
        Ok(())
    }

    #[tokio::test]
    async fn test_list_enabled_balls() -> Result<()> {
        let db = setup_test_db().await?;
        create_test_ball(&db, "Peru", 40, 20).await?;
        create_test_ball(&db, "Chile", 40, 20).await?;

        let balls = list_enabled_balls(&db).await?;
        let names: Vec<&str> = balls.iter().map(|b| b.country.as_str()).collect();
        assert_eq!(names, vec!["Chile", "Peru"]);
        assert!(get_ball_by_country(&db, "Chile").await?.is_some());
        assert!(get_ball_by_country(&db, "Spain").await?.is_none());
        Ok(())
    }
}
