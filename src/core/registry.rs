//! Active battle sessions, indexed by guild and channel.

use crate::core::battle::{Battle, BattleSetup, BattleTimings};
use crate::core::display::ViewText;
use crate::core::surface::BattleSurface;
use crate::core::team::{BattleRules, BattleTeam, Leader};
use crate::errors::{Error, Result};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{info, warn};

/// A user about to join a battle.
#[derive(Debug, Clone)]
pub struct Participant {
    /// Discord identity
    pub leader: Leader,
    /// Player record id
    pub player_id: i64,
    /// Whether the Discord account is a bot
    pub is_bot: bool,
    /// Whether the player is blacklisted
    pub blacklisted: bool,
}

/// A challenge issued in a channel.
#[derive(Debug, Clone)]
pub struct BattleRequest {
    /// Guild of the channel
    pub guild_id: u64,
    /// Channel the battle runs in
    pub channel_id: u64,
    /// User who issued the challenge
    pub challenger: Participant,
    /// User being challenged
    pub opponent: Participant,
    /// Roster rules
    pub rules: BattleRules,
}

type ChannelKey = (u64, u64);

/// Drops finished battles of a channel, and the channel once it has none left.
fn prune(battles: &mut HashMap<ChannelKey, Vec<Arc<Battle>>>, key: ChannelKey) {
    if let Some(sessions) = battles.get_mut(&key) {
        sessions.retain(|battle| !battle.is_finished());
        if sessions.is_empty() {
            battles.remove(&key);
        }
    }
}

/// Tracks running battles. A user can only be in one battle per channel.
#[derive(Debug, Default)]
pub struct BattleManager {
    battles: RwLock<HashMap<ChannelKey, Vec<Arc<Battle>>>>,
    next_id: AtomicU64,
    seed: Option<u64>,
}

impl BattleManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a manager whose battles use RNGs seeded from `seed`.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self {
            seed: Some(seed),
            ..Self::default()
        }
    }

    /// Creates and starts a battle.
    ///
    /// # Errors
    /// [`Error::Ineligible`] for bots, self-challenges and blacklisted opponents;
    /// [`Error::AlreadyInBattle`] or [`Error::OpponentInBattle`] when one of the
    /// users already battles in this channel.
    pub async fn start(
        &self,
        request: BattleRequest,
        text: ViewText,
        timings: BattleTimings,
        surface: Arc<dyn BattleSurface>,
    ) -> Result<Arc<Battle>> {
        let BattleRequest {
            guild_id,
            channel_id,
            challenger,
            opponent,
            rules,
        } = request;

        if opponent.is_bot {
            return Err(Error::Ineligible {
                reason: "You can't battle bots.".to_string(),
            });
        }
        if opponent.leader.id == challenger.leader.id {
            return Err(Error::Ineligible {
                reason: "You can't battle yourself.".to_string(),
            });
        }

        let battle = {
            let mut battles = self.battles.write().await;
            let key = (guild_id, channel_id);
            prune(&mut battles, key);

            for battle in battles.get(&key).into_iter().flatten() {
                if battle.has_participant(challenger.leader.id).await {
                    return Err(Error::AlreadyInBattle);
                }
                if battle.has_participant(opponent.leader.id).await {
                    return Err(Error::OpponentInBattle);
                }
            }

            if opponent.blacklisted {
                return Err(Error::Ineligible {
                    reason: "You cannot battle a blacklisted user.".to_string(),
                });
            }

            let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
            let battle = Battle::new(
                BattleSetup {
                    id,
                    guild_id,
                    channel_id,
                    team1: BattleTeam::new(challenger.leader, challenger.player_id),
                    team2: BattleTeam::new(opponent.leader, opponent.player_id),
                    rules,
                    text,
                    timings,
                    seed: self.seed.map(|seed| seed.wrapping_add(id)),
                },
                surface,
            );
            battles.entry(key).or_default().push(Arc::clone(&battle));
            battle
        };

        if let Err(e) = battle.start().await {
            warn!(battle_id = battle.id(), "Failed to post battle: {e}");
            battle.cancel("The battle could not be started.").await;
            return Err(e);
        }

        info!(battle_id = battle.id(), guild_id, channel_id, "Battle registered");
        Ok(battle)
    }

    /// The running battle `user_id` takes part in, in this channel.
    pub async fn lookup(
        &self,
        guild_id: u64,
        channel_id: u64,
        user_id: u64,
    ) -> Option<Arc<Battle>> {
        let mut battles = self.battles.write().await;
        let key = (guild_id, channel_id);
        prune(&mut battles, key);

        for battle in battles.get(&key)? {
            if battle.has_participant(user_id).await {
                return Some(Arc::clone(battle));
            }
        }
        None
    }

    /// Finds a battle by id, finished or not.
    pub async fn get(&self, battle_id: u64) -> Option<Arc<Battle>> {
        let battles = self.battles.read().await;
        battles
            .values()
            .flatten()
            .find(|battle| battle.id() == battle_id)
            .cloned()
    }

    /// Number of battles still running.
    pub async fn active_count(&self) -> usize {
        let battles = self.battles.read().await;
        battles
            .values()
            .flatten()
            .filter(|battle| !battle.is_finished())
            .count()
    }
}
