//! The messaging surface a battle talks through.
//!
//! The battle core never touches Discord directly. It renders a [`BattleView`],
//! emits [`BattleEvent`]s and asks leaders for actions through a
//! [`BattleSurface`]; the bot layer implements it with serenity, tests with a
//! recorder.

use crate::core::ball::{AttackReport, BattleBall};
use crate::core::display::BattleView;
use crate::core::team::Leader;
use crate::errors::Result;
use async_trait::async_trait;

/// Lightweight reference to a unit for messages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitRef {
    /// Instance id
    pub id: i64,
    /// Species name
    pub species: String,
}

impl From<&BattleBall> for UnitRef {
    fn from(ball: &BattleBall) -> Self {
        Self {
            id: ball.id,
            species: ball.species.clone(),
        }
    }
}

/// How a finished battle ended, with names resolved for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FinishReport {
    /// One team has units left
    Victory {
        /// Leader of the surviving team
        winner: Leader,
    },
    /// Both rosters emptied; both teams are declared winners
    Tie {
        /// First team's leader
        team1: Leader,
        /// Second team's leader
        team2: Leader,
    },
    /// A leader gave up
    Surrender {
        /// Leader who gave up
        loser: Leader,
        /// Leader declared winner
        winner: Leader,
    },
}

/// Something that happened during combat and should be told to the channel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BattleEvent {
    /// The die decided who starts
    DiceRolled {
        /// Face rolled, 1 to 6
        value: u8,
        /// Leader whose team acts first
        starting: Leader,
    },
    /// A unit hit another one that survived
    Attacked {
        /// Acting unit
        attacker: UnitRef,
        /// Unit hit
        target: UnitRef,
        /// Damage breakdown
        report: AttackReport,
    },
    /// A unit hit another one and killed it
    Eliminated {
        /// Acting unit
        attacker: UnitRef,
        /// Unit removed from its roster
        target: UnitRef,
    },
    /// A unit slept and recovered health
    Slept {
        /// Acting unit
        unit: UnitRef,
        /// Health gained
        healed: i64,
        /// Health after healing
        health: i64,
    },
    /// Roster sizes after a turn in which some unit died
    RosterCounts {
        /// First leader and remaining units
        team1: (Leader, usize),
        /// Second leader and remaining units
        team2: (Leader, usize),
    },
    /// The battle is over
    Finished(FinishReport),
}

/// Output channel of a battle.
#[async_trait]
pub trait BattleSurface: Send + Sync {
    /// Posts the proposal message.
    async fn open(&self, view: &BattleView) -> Result<()>;

    /// Re-renders the proposal message.
    async fn refresh(&self, view: &BattleView) -> Result<()>;

    /// Shows the final proposal state with `reason` and disables its controls.
    async fn close(&self, view: &BattleView, reason: &str) -> Result<()>;

    /// Tells the channel about a combat event.
    async fn announce(&self, event: &BattleEvent) -> Result<()>;

    /// Asks `leader` what `unit` should do.
    async fn prompt_action(&self, leader: &Leader, unit: &UnitRef) -> Result<()>;

    /// Disables the controls of the last prompt.
    async fn end_prompt(&self) -> Result<()>;
}
