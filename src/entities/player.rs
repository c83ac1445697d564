//! Player entity - a Discord user known to the bot.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Player database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "players")]
pub struct Model {
    /// Unique identifier for the player
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Discord user ID
    #[sea_orm(unique)]
    pub discord_id: String,
    /// Blacklisted players cannot be challenged
    pub blacklisted: bool,
}

/// Defines relationships between Player and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One player owns many instances
    #[sea_orm(has_many = "super::ball_instance::Entity")]
    Instances,
}

impl Related<super::ball_instance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Instances.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
