//! Unified error types for the battle bot.
//!
//! Battle failures are split into the categories reported by [`Error::kind`]:
//! validation problems and illegal-state requests leave a session untouched,
//! timeouts always end it, and target lookups are simply retried by the player.

use thiserror::Error;

/// Broad category of an [`Error`], used by the Discord layer to decide how to react.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request was well-formed but breaks a roster rule.
    Validation,
    /// The request does not make sense in the session's current state.
    IllegalState,
    /// A waiting window elapsed; the session is over.
    Timeout,
    /// The typed attack target matched nothing; the player may try again.
    TargetNotFound,
    /// Infrastructure failure (database, Discord, I/O, configuration).
    Internal,
}

/// Application error type.
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration could not be read or parsed
    #[error("Configuration error: {message}")]
    Config {
        /// What went wrong
        message: String,
    },

    /// Database operation failed
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    /// I/O failure
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Required environment variable missing or invalid
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),

    /// Formatting into a buffer failed
    #[error("Formatting error: {0}")]
    Fmt(#[from] std::fmt::Error),

    /// Discord framework failure
    #[error("Serenity/Poise framework error: {0}")]
    Framework(Box<poise::serenity_prelude::Error>),

    /// Typed unit choice is not an instance id
    #[error("'{input}' is not a valid unit id.")]
    InvalidUnitChoice {
        /// Text typed by the user
        input: String,
    },

    /// Creature instance lookup failed
    #[error("Instance #{id:X} was not found in your collection.")]
    InstanceNotFound {
        /// Instance id that was requested
        id: i64,
    },

    /// Species lookup failed
    #[error("No species named '{name}' exists.")]
    SpeciesNotFound {
        /// Requested species name
        name: String,
    },

    /// A creature's stored stats cannot produce a combatant
    #[error("Instance #{id:X} has invalid stats (health {health}, attack {attack}).")]
    InvalidStats {
        /// Instance id
        id: i64,
        /// Stored health
        health: i64,
        /// Stored attack
        attack: i64,
    },

    /// The roster already holds the configured amount of units
    #[error("You can't add more than {cap} units to your team.")]
    RosterFull {
        /// Roster size cap
        cap: usize,
    },

    /// The same creature instance was added twice
    #[error("Unit #{id:X} is already in your team.")]
    DuplicateUnit {
        /// Instance id
        id: i64,
    },

    /// Another unit of the same species is already in the roster
    #[error("Duplicates are not allowed in this battle, and {species} is already in your team.")]
    DuplicateSpecies {
        /// Species name
        species: String,
    },

    /// Not enough units to accept the battle
    #[error("You need at least {required} unit(s) in your team to accept the battle.")]
    InsufficientRoster {
        /// Units needed
        required: usize,
    },

    /// The team already accepted
    #[error("You already accepted the battle.")]
    AlreadyAccepted,

    /// The roster is frozen because it was accepted
    #[error("You already accepted the battle, your team can't be changed.")]
    Locked,

    /// The unit to remove is not in the roster
    #[error("Unit #{id:X} is not in your team.")]
    NotInRoster {
        /// Instance id
        id: i64,
    },

    /// Any request made after the session ended
    #[error("This battle is over.")]
    BattleFinished,

    /// The request needs the combat phase
    #[error("This battle hasn't started yet.")]
    NotStarted,

    /// Withdrawing is only possible while teams are being proposed
    #[error("The battle already started, surrender instead.")]
    AlreadyStarted,

    /// The user leads neither team
    #[error("You are not part of this battle.")]
    NotAParticipant {
        /// Discord user id
        user_id: u64,
    },

    /// The user is not the one being asked for an action
    #[error("This action is not for you.")]
    NotYourTurn,

    /// No active session was found for the user in this channel
    #[error("You don't have a battle in progress.")]
    NoActiveBattle,

    /// The challenger is already in a session here
    #[error("You already have a battle in progress.")]
    AlreadyInBattle,

    /// The challenged user is already in a session here
    #[error("The user you are trying to battle is already in a battle.")]
    OpponentInBattle,

    /// The challenged user may not be battled
    #[error("{reason}")]
    Ineligible {
        /// Why the challenge was refused
        reason: String,
    },

    /// Attack needs an explicit target because several opponents remain
    #[error("Choose which unit to attack.")]
    TargetRequired,

    /// Typed target did not match any opposing unit
    #[error("No opposing unit matches '{query}'.")]
    TargetNotFound {
        /// Text the player typed
        query: String,
    },

    /// A waiting window elapsed
    #[error("{reason}")]
    Timeout {
        /// Cancellation notice shown to players
        reason: String,
    },
}

impl Error {
    /// Classifies the error for the interaction layer.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::RosterFull { .. }
            | Self::DuplicateUnit { .. }
            | Self::DuplicateSpecies { .. }
            | Self::InsufficientRoster { .. }
            | Self::InvalidUnitChoice { .. }
            | Self::InstanceNotFound { .. }
            | Self::SpeciesNotFound { .. }
            | Self::InvalidStats { .. }
            | Self::Ineligible { .. }
            | Self::TargetRequired => ErrorKind::Validation,
            Self::AlreadyAccepted
            | Self::Locked
            | Self::NotInRoster { .. }
            | Self::BattleFinished
            | Self::NotStarted
            | Self::AlreadyStarted
            | Self::NotAParticipant { .. }
            | Self::NotYourTurn
            | Self::NoActiveBattle
            | Self::AlreadyInBattle
            | Self::OpponentInBattle => ErrorKind::IllegalState,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::TargetNotFound { .. } => ErrorKind::TargetNotFound,
            Self::Config { .. }
            | Self::Database(_)
            | Self::Io(_)
            | Self::EnvVar(_)
            | Self::Fmt(_)
            | Self::Framework(_) => ErrorKind::Internal,
        }
    }

    /// Whether the message is meant for the user who triggered it.
    #[must_use]
    pub const fn is_user_facing(&self) -> bool {
        !matches!(self.kind(), ErrorKind::Internal)
    }
}

impl From<poise::serenity_prelude::Error> for Error {
    fn from(value: poise::serenity_prelude::Error) -> Self {
        Self::Framework(Box::new(value))
    }
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roster_errors_are_validation() {
        assert_eq!(Error::RosterFull { cap: 3 }.kind(), ErrorKind::Validation);
        assert_eq!(
            Error::DuplicateSpecies {
                species: "Spain".to_string()
            }
            .kind(),
            ErrorKind::Validation
        );
        assert_eq!(Error::Locked.kind(), ErrorKind::IllegalState);
        assert_eq!(
            Error::TargetNotFound {
                query: "x".to_string()
            }
            .kind(),
            ErrorKind::TargetNotFound
        );
    }

    #[test]
    fn test_messages_are_readable() {
        assert_eq!(
            Error::DuplicateUnit { id: 255 }.to_string(),
            "Unit #FF is already in your team."
        );
        assert!(Error::Timeout {
            reason: "No action was taken.".to_string()
        }
        .is_user_facing());
        assert!(!Error::Config {
            message: "bad".to_string()
        }
        .is_user_facing());
    }
}
