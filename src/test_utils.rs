//! Shared test utilities for the battle bot.
//!
//! This module provides helpers for setting up test databases, building
//! battle units and teams with sensible defaults, and a [`RecordingSurface`]
//! that captures everything a battle tries to show.

use crate::{
    config::database::create_tables,
    core::{
        ball::{BattleBall, CreatureStats},
        battle::{Battle, BattleSetup, BattleState, BattleTimings},
        display::{BattleView, ViewText},
        surface::{BattleEvent, BattleSurface, UnitRef},
        team::{BattleRules, BattleTeam, Leader},
    },
    entities::ball,
    errors::{Error, Result},
};
use async_trait::async_trait;
use rand::SeedableRng;
use rand::rngs::StdRng;
use sea_orm::{ActiveModelTrait, DatabaseConnection, Set};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, mpsc};

/// Creates an in-memory `SQLite` database with all tables initialized.
pub async fn setup_test_db() -> Result<DatabaseConnection> {
    let db = sea_orm::Database::connect("sqlite::memory:").await?;
    create_tables(&db).await?;
    Ok(db)
}

/// Inserts an enabled species.
pub async fn create_test_ball(
    db: &DatabaseConnection,
    country: &str,
    health: i64,
    attack: i64,
) -> Result<ball::Model> {
    let species = ball::ActiveModel {
        country: Set(country.to_string()),
        health: Set(health),
        attack: Set(attack),
        enabled: Set(true),
        ..Default::default()
    };
    Ok(species.insert(db).await?)
}

/// Creature stats without any database record.
#[must_use]
pub fn stats(id: i64, species: &str, health: i64, attack: i64) -> CreatureStats {
    CreatureStats {
        id,
        species: species.to_string(),
        health,
        attack,
    }
}

/// A battle unit with the given stats.
///
/// # Panics
/// When the stats are not positive.
#[must_use]
#[allow(clippy::expect_used)]
pub fn ball(id: i64, species: &str, health: i64, attack: i64) -> BattleBall {
    BattleBall::new(&stats(id, species, health, attack)).expect("test stats must be positive")
}

/// An empty team led by `leader_id`. The player id mirrors the leader id.
#[must_use]
#[allow(clippy::cast_possible_wrap)]
pub fn test_team(leader_id: u64, name: &str) -> BattleTeam {
    BattleTeam::new(Leader::new(leader_id, name), leader_id as i64)
}

/// A deterministic RNG.
#[must_use]
pub fn test_rng(seed: u64) -> StdRng {
    StdRng::seed_from_u64(seed)
}

/// Proposal-phase state between "alice" (1) and "bob" (2).
#[must_use]
pub fn test_state() -> BattleState {
    BattleState::new(
        test_team(1, "alice"),
        test_team(2, "bob"),
        BattleRules::default(),
        test_rng(0),
    )
}

/// A battle between "alice" (1) and "bob" (2) with default windows and no pacing pauses.
#[must_use]
pub fn test_battle(surface: &Arc<RecordingSurface>, seed: u64) -> Arc<Battle> {
    let surface: Arc<dyn BattleSurface> = Arc::clone(surface) as Arc<dyn BattleSurface>;
    Battle::new(
        BattleSetup {
            id: 1,
            guild_id: 10,
            channel_id: 20,
            team1: test_team(1, "alice"),
            team2: test_team(2, "bob"),
            rules: BattleRules::default(),
            text: ViewText::default(),
            timings: BattleTimings::without_delays(),
            seed: Some(seed),
        },
        surface,
    )
}

/// Waits, in virtual time, until `battle` is over.
///
/// # Panics
/// When the battle is still running after a simulated day.
pub async fn wait_until_finished(battle: &Battle) {
    for _ in 0..86_400 {
        if battle.is_finished() {
            return;
        }
        tokio::time::sleep(Duration::from_secs(1)).await;
    }
    panic!("battle {} did not finish", battle.id());
}

/// One call made on a [`RecordingSurface`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SurfaceCall {
    /// Proposal posted
    Open,
    /// Proposal re-rendered
    Refresh,
    /// Proposal closed with a reason
    Close(String),
    /// Event announced
    Announce(BattleEvent),
    /// Leader asked to act
    Prompt {
        /// Leader id
        leader: u64,
        /// Unit id
        unit: i64,
    },
    /// Prompt disabled
    EndPrompt,
}

/// Messaging surface that records every call.
#[derive(Debug)]
pub struct RecordingSurface {
    calls: Mutex<Vec<SurfaceCall>>,
    views: Mutex<Vec<BattleView>>,
    fail_refresh: AtomicBool,
    prompts_tx: mpsc::UnboundedSender<(u64, i64)>,
    prompts_rx: Mutex<mpsc::UnboundedReceiver<(u64, i64)>>,
}

impl RecordingSurface {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Arc<Self> {
        let (prompts_tx, prompts_rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            views: Mutex::new(Vec::new()),
            fail_refresh: AtomicBool::new(false),
            prompts_tx,
            prompts_rx: Mutex::new(prompts_rx),
        })
    }

    /// Makes subsequent refreshes fail.
    pub fn fail_refresh(&self, fail: bool) {
        self.fail_refresh.store(fail, Ordering::SeqCst);
    }

    /// All calls so far.
    pub async fn calls(&self) -> Vec<SurfaceCall> {
        self.calls.lock().await.clone()
    }

    /// Last rendered view.
    pub async fn last_view(&self) -> Option<BattleView> {
        self.views.lock().await.last().cloned()
    }

    /// Next action prompt as `(leader id, unit id)`.
    pub async fn next_prompt(&self) -> Option<(u64, i64)> {
        self.prompts_rx.lock().await.recv().await
    }

    async fn record(&self, call: SurfaceCall) {
        self.calls.lock().await.push(call);
    }
}

#[async_trait]
impl BattleSurface for RecordingSurface {
    async fn open(&self, view: &BattleView) -> Result<()> {
        self.views.lock().await.push(view.clone());
        self.record(SurfaceCall::Open).await;
        Ok(())
    }

    async fn refresh(&self, view: &BattleView) -> Result<()> {
        if self.fail_refresh.load(Ordering::SeqCst) {
            return Err(Error::Config {
                message: "refresh failed".to_string(),
            });
        }
        self.views.lock().await.push(view.clone());
        self.record(SurfaceCall::Refresh).await;
        Ok(())
    }

    async fn close(&self, view: &BattleView, reason: &str) -> Result<()> {
        self.views.lock().await.push(view.clone());
        self.record(SurfaceCall::Close(reason.to_string())).await;
        Ok(())
    }

    async fn announce(&self, event: &BattleEvent) -> Result<()> {
        self.record(SurfaceCall::Announce(event.clone())).await;
        Ok(())
    }

    async fn prompt_action(&self, leader: &Leader, unit: &UnitRef) -> Result<()> {
        self.record(SurfaceCall::Prompt {
            leader: leader.id,
            unit: unit.id,
        })
        .await;
        let _ = self.prompts_tx.send((leader.id, unit.id));
        Ok(())
    }

    async fn end_prompt(&self) -> Result<()> {
        self.record(SurfaceCall::EndPrompt).await;
        Ok(())
    }
}
