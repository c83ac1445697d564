//! Battle-scoped combatants.
//!
//! A [`BattleBall`] is a snapshot of an owned creature taken when it joins a
//! team. Its health and defense change during the fight; nothing is written
//! back to the database.

use crate::errors::{Error, Result};
use rand::Rng;
use std::fmt;

/// Stats of a creature instance as seen by the battle, after bonuses and modifiers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreatureStats {
    /// Instance id, stable for the whole battle
    pub id: i64,
    /// Species name, used for duplicate checks and target lookup
    pub species: String,
    /// Health the unit starts with
    pub health: i64,
    /// Attack used for every hit
    pub attack: i64,
}

/// A creature taking part in a battle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleBall {
    /// Instance id
    pub id: i64,
    /// Species name
    pub species: String,
    /// Health at creation, used to scale healing
    pub base_health: i64,
    /// Current health; the unit is dead once this drops to zero or below
    pub health: i64,
    /// Damage dealt by this unit
    pub attack: i64,
    /// Absorbs damage before health does
    pub defense: i64,
}

/// Changes caused by one incoming attack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AttackReport {
    /// Damage taken by defense
    pub defense_lost: i64,
    /// Damage taken by health
    pub health_lost: i64,
    /// Defense after the attack
    pub defense: i64,
    /// Health after the attack
    pub health: i64,
}

impl fmt::Display for AttackReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.health_lost == 0 {
            write!(
                f,
                "❤️ Health: {}, 🛡️ Defense: -{} ({})",
                self.health, self.defense_lost, self.defense
            )
        } else {
            write!(
                f,
                "❤️ Health: -{} ({}), 🛡️ Defense: -{} ({})",
                self.health_lost, self.health, self.defense_lost, self.defense
            )
        }
    }
}

/// Defense derived from health and attack: `round(sqrt(health * attack))`.
///
/// Halves round to the even neighbour.
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn derive_defense(health: i64, attack: i64) -> i64 {
    ((health * attack) as f64).sqrt().round_ties_even() as i64
}

#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
fn scaled(base: i64, divisor: f64) -> i64 {
    (base as f64 / divisor).round_ties_even() as i64
}

impl BattleBall {
    /// Snapshots a creature for battle.
    ///
    /// # Errors
    /// Returns [`Error::InvalidStats`] unless both health and attack are positive.
    pub fn new(stats: &CreatureStats) -> Result<Self> {
        if stats.health <= 0 || stats.attack <= 0 {
            return Err(Error::InvalidStats {
                id: stats.id,
                health: stats.health,
                attack: stats.attack,
            });
        }

        Ok(Self {
            id: stats.id,
            species: stats.species.clone(),
            base_health: stats.health,
            health: stats.health,
            attack: stats.attack,
            defense: derive_defense(stats.health, stats.attack),
        })
    }

    /// Identifier shown to players, e.g. `#1A2B`.
    #[must_use]
    pub fn display_id(&self) -> String {
        format!("#{:X}", self.id)
    }

    /// Whether the unit can still act and be targeted.
    #[must_use]
    pub const fn is_alive(&self) -> bool {
        self.health > 0
    }

    /// Restores health and returns the amount gained.
    ///
    /// The gain is the larger of a flat `8..=20` roll and a roll between a tenth
    /// and a seventh of the starting health. There is no upper bound on health.
    pub fn heal<R: Rng + ?Sized>(&mut self, rng: &mut R) -> i64 {
        let flat = rng.random_range(8..=20);
        let low = scaled(self.base_health, 10.0);
        let high = scaled(self.base_health, 7.0).max(low);
        let scaled_roll = rng.random_range(low..=high);

        let extra = flat.max(scaled_roll);
        self.health += extra;
        extra
    }

    /// Applies `amount` damage: defense absorbs first, health takes the rest.
    pub fn receive_attack(&mut self, amount: i64) -> AttackReport {
        if self.defense >= amount {
            self.defense -= amount;
            AttackReport {
                defense_lost: amount,
                health_lost: 0,
                defense: self.defense,
                health: self.health,
            }
        } else {
            let defense_lost = self.defense;
            let health_lost = amount - defense_lost;
            self.defense = 0;
            self.health -= health_lost;
            AttackReport {
                defense_lost,
                health_lost,
                defense: 0,
                health: self.health,
            }
        }
    }
}
