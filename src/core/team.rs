//! One side of a battle: a leader and the roster they propose.

use crate::core::ball::BattleBall;
use crate::errors::{Error, Result};

/// Discord identity of a team leader, kept free of framework types.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Leader {
    /// Discord user id
    pub id: u64,
    /// Display name used in messages
    pub name: String,
}

impl Leader {
    /// Creates a leader identity.
    #[must_use]
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
        }
    }

    /// Discord mention markup.
    #[must_use]
    pub fn mention(&self) -> String {
        format!("<@{}>", self.id)
    }
}

/// Roster rules shared by both teams of a battle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BattleRules {
    /// Exact roster size both teams must reach before accepting
    pub amount: Option<usize>,
    /// Whether two units of the same species may be in one roster.
    /// Only an explicit `Some(true)` allows it.
    pub duplicates: Option<bool>,
}

impl BattleRules {
    /// Whether same-species units may share a roster.
    #[must_use]
    pub const fn allows_duplicates(&self) -> bool {
        matches!(self.duplicates, Some(true))
    }
}

/// A team taking part in a battle.
#[derive(Debug, Clone)]
pub struct BattleTeam {
    /// Controlling user
    pub leader: Leader,
    /// Database id of the leader's player record
    pub player_id: i64,
    /// Units in turn order; the first one is controlled by the leader
    pub proposal: Vec<BattleBall>,
    /// Set once the leader confirmed the roster
    pub accepted: bool,
    /// Set when the leader withdrew
    pub cancelled: bool,
}

impl BattleTeam {
    /// Creates an empty team.
    #[must_use]
    pub const fn new(leader: Leader, player_id: i64) -> Self {
        Self {
            leader,
            player_id,
            proposal: Vec::new(),
            accepted: false,
            cancelled: false,
        }
    }

    /// Appends a unit to the roster.
    ///
    /// # Errors
    /// [`Error::Locked`] once accepted, [`Error::RosterFull`] when the amount cap is
    /// reached, [`Error::DuplicateUnit`] for an instance already present and
    /// [`Error::DuplicateSpecies`] when duplicates are disallowed.
    pub fn add(&mut self, ball: BattleBall, rules: &BattleRules) -> Result<()> {
        if self.accepted {
            return Err(Error::Locked);
        }

        if let Some(cap) = rules.amount
            && self.proposal.len() >= cap
        {
            return Err(Error::RosterFull { cap });
        }

        for added in &self.proposal {
            if added.id == ball.id {
                return Err(Error::DuplicateUnit { id: ball.id });
            }
            if !rules.allows_duplicates() && added.species == ball.species {
                return Err(Error::DuplicateSpecies {
                    species: ball.species,
                });
            }
        }

        self.proposal.push(ball);
        Ok(())
    }

    /// Removes a unit by instance id and returns it.
    ///
    /// # Errors
    /// [`Error::Locked`] once accepted and [`Error::NotInRoster`] for a unit that
    /// is not in the roster.
    pub fn remove(&mut self, ball_id: i64) -> Result<BattleBall> {
        if self.accepted {
            return Err(Error::Locked);
        }

        let index = self
            .position(ball_id)
            .ok_or(Error::NotInRoster { id: ball_id })?;
        Ok(self.proposal.remove(index))
    }

    /// Confirms the roster.
    ///
    /// # Errors
    /// [`Error::InsufficientRoster`] when empty or below the amount, and
    /// [`Error::AlreadyAccepted`] on a second call.
    pub fn accept(&mut self, rules: &BattleRules) -> Result<()> {
        if self.proposal.is_empty() {
            return Err(Error::InsufficientRoster { required: 1 });
        }

        if let Some(amount) = rules.amount
            && self.proposal.len() < amount
        {
            return Err(Error::InsufficientRoster { required: amount });
        }

        if self.accepted {
            return Err(Error::AlreadyAccepted);
        }

        self.accepted = true;
        Ok(())
    }

    /// Marks the team as withdrawn.
    pub const fn cancel(&mut self) {
        self.cancelled = true;
    }

    /// Index of a unit in the roster.
    #[must_use]
    pub fn position(&self, ball_id: i64) -> Option<usize> {
        self.proposal.iter().position(|ball| ball.id == ball_id)
    }

    /// Mutable access to a unit by instance id.
    pub fn ball_mut(&mut self, ball_id: i64) -> Option<&mut BattleBall> {
        self.proposal.iter_mut().find(|ball| ball.id == ball_id)
    }

    /// Removes a dead unit from the roster for good.
    pub fn eliminate(&mut self, ball_id: i64) -> Option<BattleBall> {
        self.position(ball_id).map(|index| self.proposal.remove(index))
    }

    /// Units still able to fight.
    pub fn living(&self) -> impl Iterator<Item = &BattleBall> {
        self.proposal.iter().filter(|ball| ball.is_alive())
    }
}
