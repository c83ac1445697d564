//! Database configuration module.
//!
//! Handles the `SQLite` connection and table creation using `SeaORM`'s
//! `Schema::create_table_from_entity`, plus seeding the species catalogue from
//! config.toml.

use crate::config::settings::BallConfig;
use crate::entities::{Ball, BallInstance, Player, ball};
use crate::errors::Result;
use sea_orm::{
    ActiveModelTrait, ConnectionTrait, Database, DatabaseConnection, EntityTrait,
    PaginatorTrait, Schema, Set,
};
use std::path::Path;
use tracing::info;

const DEFAULT_DATABASE_URL: &str = "sqlite://data/ballsdex.sqlite?mode=rwc";

/// Gets the database URL from environment variable or returns the default `SQLite` path.
#[must_use]
pub fn get_database_url() -> String {
    std::env::var("DATABASE_URL").unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
}

/// Creates the directory holding a file-backed `SQLite` database.
fn ensure_database_dir(url: &str) -> Result<()> {
    let Some(path) = url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    let file = path.split('?').next().unwrap_or_default();
    if let Some(parent) = Path::new(file).parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

/// Establishes a connection to the database named by `DATABASE_URL`.
pub async fn create_connection() -> Result<DatabaseConnection> {
    let url = get_database_url();
    ensure_database_dir(&url)?;
    Database::connect(&url).await.map_err(Into::into)
}

/// Creates all tables from the entity definitions, skipping the ones that already exist.
pub async fn create_tables(db: &DatabaseConnection) -> Result<()> {
    let builder = db.get_database_backend();
    let schema = Schema::new(builder);

    let mut ball_table = schema.create_table_from_entity(Ball);
    let mut player_table = schema.create_table_from_entity(Player);
    let mut instance_table = schema.create_table_from_entity(BallInstance);
    ball_table.if_not_exists();
    player_table.if_not_exists();
    instance_table.if_not_exists();

    db.execute(builder.build(&ball_table)).await?;
    db.execute(builder.build(&player_table)).await?;
    db.execute(builder.build(&instance_table)).await?;

    Ok(())
}

/// Inserts the configured species when the catalogue is empty.
///
/// Returns the number of species inserted.
pub async fn seed_catalogue(db: &DatabaseConnection, balls: &[BallConfig]) -> Result<usize> {
    if Ball::find().count(db).await? > 0 {
        info!("Species catalogue already populated, skipping seed");
        return Ok(0);
    }

    for entry in balls {
        ball::ActiveModel {
            country: Set(entry.country.clone()),
            health: Set(entry.health),
            attack: Set(entry.attack),
            enabled: Set(true),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }

    info!("Seeded {} species into the catalogue", balls.len());
    Ok(balls.len())
}
