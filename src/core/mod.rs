//! Core business logic - framework-agnostic battle operations
//!
//! Nothing in here depends on Discord. The bot layer feeds player input into
//! [`battle::Battle`] and renders what comes out through a
//! [`surface::BattleSurface`].

/// Battle units and damage resolution
pub mod ball;
/// Battle session state machine and combat driver
pub mod battle;
/// Roster rendering and announcement text
pub mod display;
/// Creature instance queries and battle snapshots
pub mod instance;
/// Stat modifiers (boss effects)
pub mod modifier;
/// Player records
pub mod player;
/// Registry of running battles
pub mod registry;
/// Messaging surface trait and combat events
pub mod surface;
/// Teams and roster rules
pub mod team;
/// Turn actions and autonomous decisions
pub mod turn;
