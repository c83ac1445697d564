//! Entity module - Contains all SeaORM entity definitions for the database.
//! The battle core only reads these; admin commands are the only writers.

pub mod ball;
pub mod ball_instance;
pub mod player;

// Re-export specific types to avoid conflicts
pub use ball::{Column as BallColumn, Entity as Ball, Model as BallModel};
pub use ball_instance::{
    Column as BallInstanceColumn, Entity as BallInstance, Model as BallInstanceModel,
};
pub use player::{Column as PlayerColumn, Entity as Player, Model as PlayerModel};
