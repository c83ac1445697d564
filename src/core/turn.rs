//! Turn actions: what a unit does when its turn comes.
//!
//! The leader's first unit acts on an explicit [`ActionRequest`]; every other unit
//! decides on its own through [`decide_npc`].

use crate::core::ball::{AttackReport, BattleBall};
use crate::errors::{Error, Result};
use rand::Rng;
use rand::seq::IndexedRandom;

/// The two things a unit can do on its turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BattleAction {
    /// Hit an opposing unit
    Attack,
    /// Sleep to recover health
    Sleep,
}

/// Action picked by a leader, as received from the interaction layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionRequest {
    /// Attack; `target` is the typed id or species name, if one was asked for
    Attack {
        /// Raw text typed by the player
        target: Option<String>,
    },
    /// Sleep
    Sleep,
}

/// Action with its target resolved to a concrete unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolvedAction {
    /// Attack the unit with this instance id
    Attack {
        /// Target instance id
        target_id: i64,
    },
    /// Sleep
    Sleep,
}

/// What an autonomous unit does this turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NpcDecision {
    /// Attack the unit with this instance id
    Attack {
        /// Target instance id
        target_id: i64,
    },
    /// Sleep
    Sleep,
    /// Nothing left to fight
    Skip,
}

/// Result of one attack, as applied to the target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HitOutcome {
    /// Damage breakdown
    pub report: AttackReport,
    /// Whether the target died from this hit
    pub eliminated: bool,
}

/// Finds the opposing unit a player typed.
///
/// The text matches a unit when, without `#` and upper-cased, it equals the unit's
/// hexadecimal id, or when it is contained in the unit's species name (case
/// insensitive). The first match in roster order wins.
///
/// # Errors
/// [`Error::TargetRequired`] for blank input, [`Error::TargetNotFound`] otherwise.
pub fn find_target<'a>(opponents: &'a [BattleBall], query: &str) -> Result<&'a BattleBall> {
    let query = query.trim().to_lowercase();
    if query.is_empty() {
        return Err(Error::TargetRequired);
    }

    let as_id = query.replace('#', "").to_uppercase();
    opponents
        .iter()
        .find(|ball| {
            as_id == format!("{:X}", ball.id) || ball.species.to_lowercase().contains(&query)
        })
        .ok_or(Error::TargetNotFound { query })
}

/// Resolves a leader's request against the opposing roster.
///
/// With a single opponent left the target is implicit and any typed text is ignored.
pub fn resolve_request(
    opponents: &[BattleBall],
    request: &ActionRequest,
) -> Result<ResolvedAction> {
    match request {
        ActionRequest::Sleep => Ok(ResolvedAction::Sleep),
        ActionRequest::Attack { target } => {
            if let [only] = opponents {
                return Ok(ResolvedAction::Attack { target_id: only.id });
            }
            let query = target.as_deref().ok_or(Error::TargetRequired)?;
            let ball = find_target(opponents, query)?;
            Ok(ResolvedAction::Attack { target_id: ball.id })
        }
    }
}

/// Picks one candidate with probability proportional to its weight.
///
/// Returns `None` when there are no candidates or every weight is zero.
pub fn pick_weighted<'a, T, R, F>(rng: &mut R, candidates: &'a [T], weight: F) -> Option<&'a T>
where
    R: Rng + ?Sized,
    F: Fn(&T) -> u64,
{
    candidates.choose_weighted(rng, weight).ok()
}

/// Uniformly picks attack or sleep.
pub fn random_action<R: Rng + ?Sized>(rng: &mut R) -> BattleAction {
    if rng.random_bool(0.5) {
        BattleAction::Attack
    } else {
        BattleAction::Sleep
    }
}

/// Decides the action of an autonomous unit.
///
/// Targets are living opponents weighted by their current health, so healthier
/// units get hit more often.
#[allow(clippy::cast_sign_loss)]
pub fn decide_npc<R: Rng + ?Sized>(rng: &mut R, opponents: &[BattleBall]) -> NpcDecision {
    let action = random_action(rng);

    if opponents.is_empty() {
        return NpcDecision::Skip;
    }

    match action {
        BattleAction::Sleep => NpcDecision::Sleep,
        BattleAction::Attack => {
            let living: Vec<&BattleBall> = opponents.iter().filter(|b| b.is_alive()).collect();
            pick_weighted(rng, &living, |ball| ball.health as u64).map_or(
                NpcDecision::Skip,
                |target| NpcDecision::Attack {
                    target_id: target.id,
                },
            )
        }
    }
}

/// Rolls a six-sided die.
pub fn roll_dice<R: Rng + ?Sized>(rng: &mut R) -> u8 {
    rng.random_range(1..=6)
}

/// Lets `attack` hit `target` and reports whether it died.
pub fn strike(attack: i64, target: &mut BattleBall) -> HitOutcome {
    let report = target.receive_attack(attack);
    HitOutcome {
        report,
        eliminated: !target.is_alive(),
    }
}
