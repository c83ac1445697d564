//! Ball instance entity - a creature owned by a player.
//!
//! Instances carry percentage bonuses applied on top of their species' base stats.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Owned creature database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "ball_instances")]
pub struct Model {
    /// Unique identifier, shown to players in hexadecimal
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Species this instance belongs to
    pub ball_id: i64,
    /// Owning player
    pub player_id: i64,
    /// Health bonus in percent (can be negative)
    pub health_bonus: i32,
    /// Attack bonus in percent (can be negative)
    pub attack_bonus: i32,
    /// When the instance was obtained
    pub catch_date: DateTimeUtc,
}

/// Defines relationships between `BallInstance` and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// Each instance belongs to one species
    #[sea_orm(
        belongs_to = "super::ball::Entity",
        from = "Column::BallId",
        to = "super::ball::Column::Id"
    )]
    Ball,
    /// Each instance belongs to one player
    #[sea_orm(
        belongs_to = "super::player::Entity",
        from = "Column::PlayerId",
        to = "super::player::Column::Id"
    )]
    Player,
}

impl Related<super::ball::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Ball.def()
    }
}

impl Related<super::player::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Player.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
