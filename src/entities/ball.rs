//! Ball entity - the species catalogue.
//!
//! Each row is one collectible species with its base stats. Owned copies live in
//! [`super::ball_instance`].

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

/// Species database model
#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "balls")]
pub struct Model {
    /// Unique identifier for the species
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Species name (e.g., "Spain", "Argentina")
    #[sea_orm(unique)]
    pub country: String,
    /// Base health before instance bonuses
    pub health: i64,
    /// Base attack before instance bonuses
    pub attack: i64,
    /// Whether the species can still be given out
    pub enabled: bool,
}

/// Defines relationships between Ball and other entities
#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    /// One species has many owned instances
    #[sea_orm(has_many = "super::ball_instance::Entity")]
    Instances,
}

impl Related<super::ball_instance::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Instances.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
