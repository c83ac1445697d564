//! The battle session: proposal, confirmation, dice roll, combat and resolution.
//!
//! A [`Battle`] owns the two teams behind a mutex and drives combat from a
//! spawned task. Player input arrives through [`Battle::submit_confirmation`]
//! and [`Battle::submit_action`]; the combat task waits on a one-shot channel
//! for the leader's action and gives up after the action window. A second task
//! re-renders the proposal while teams are being built and cancels the session
//! once its time is up.

use crate::core::ball::BattleBall;
use crate::core::display::{BattleView, ViewText, render_view};
use crate::core::surface::{BattleEvent, BattleSurface, FinishReport, UnitRef};
use crate::core::team::{BattleRules, BattleTeam, Leader};
use crate::core::turn::{
    ActionRequest, NpcDecision, ResolvedAction, decide_npc, resolve_request, roll_dice, strike,
};
use crate::errors::{Error, ErrorKind, Result};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::sync::{Mutex, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep, timeout};
use tracing::{debug, error, info, warn};

/// Shown when the session or a refresh gives up.
pub const SESSION_TIMEOUT_REASON: &str = "The battle timed out.";
/// Shown when a leader lets the action window elapse.
pub const ACTION_TIMEOUT_REASON: &str = "No action was taken.";

/// Timers driving a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BattleTimings {
    /// Period of the proposal re-render
    pub refresh_interval: Duration,
    /// Lifetime of the proposal phase
    pub session_timeout: Duration,
    /// Window a leader has to pick an action
    pub action_timeout: Duration,
    /// Pause after each unit's action and between team turns
    pub turn_delay: Duration,
    /// Pause before the dice result is shown
    pub dice_delay: Duration,
}

impl Default for BattleTimings {
    fn default() -> Self {
        Self {
            refresh_interval: Duration::from_secs(15),
            session_timeout: Duration::from_secs(900),
            action_timeout: Duration::from_secs(600),
            turn_delay: Duration::from_secs(5),
            dice_delay: Duration::from_secs(3),
        }
    }
}

impl BattleTimings {
    /// Default windows without any pacing pauses.
    #[must_use]
    pub fn without_delays() -> Self {
        Self {
            turn_delay: Duration::ZERO,
            dice_delay: Duration::ZERO,
            ..Self::default()
        }
    }
}

/// One of the two teams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// The challenger's team
    One,
    /// The challenged user's team
    Two,
}

impl Side {
    /// The opposing side.
    #[must_use]
    pub const fn other(self) -> Self {
        match self {
            Self::One => Self::Two,
            Self::Two => Self::One,
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BattleOutcome {
    /// Only `winner` has units left
    Victory {
        /// Surviving side
        winner: Side,
    },
    /// Both rosters emptied in the same round; both sides win
    Tie,
    /// `loser` gave up
    Surrender {
        /// Side that surrendered
        loser: Side,
    },
    /// Aborted without a winner
    Cancelled {
        /// Notice shown to players
        reason: String,
    },
}

impl BattleOutcome {
    /// Sides declared winners.
    #[must_use]
    pub fn winners(&self) -> Vec<Side> {
        match self {
            Self::Victory { winner } => vec![*winner],
            Self::Tie => vec![Side::One, Side::Two],
            Self::Surrender { loser } => vec![loser.other()],
            Self::Cancelled { .. } => Vec::new(),
        }
    }
}

/// Lifecycle of a session. `Finished` is terminal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BattlePhase {
    /// Both teams build their rosters
    Proposing,
    /// One team accepted and is locked, the other may still change
    Confirming,
    /// Both accepted, the die decides who starts
    Rolling,
    /// Teams take turns
    InCombat {
        /// Side acting now
        turn: Side,
        /// Team turns played so far, starting at 1
        round: u32,
    },
    /// The session is over
    Finished(BattleOutcome),
}

impl BattlePhase {
    /// Whether rosters may still change.
    #[must_use]
    pub const fn is_proposing(&self) -> bool {
        matches!(self, Self::Proposing | Self::Confirming)
    }
}

/// A leader's answer to the accept/deny prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Confirmation {
    /// Lock the roster
    Accept,
    /// Withdraw and cancel the session
    Deny,
}

/// Result of a confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Waiting for the other team
    Waiting,
    /// Both accepted, combat started
    Started,
    /// The leader withdrew
    Cancelled,
}

/// Even dice start with the first team.
#[must_use]
pub const fn starting_side(dice: u8) -> Side {
    if dice % 2 == 0 { Side::One } else { Side::Two }
}

/// Result of a battle given the remaining roster sizes, if it is decided.
#[must_use]
pub const fn decide_outcome(team1: usize, team2: usize) -> Option<BattleOutcome> {
    match (team1, team2) {
        (0, 0) => Some(BattleOutcome::Tie),
        (0, _) => Some(BattleOutcome::Victory { winner: Side::Two }),
        (_, 0) => Some(BattleOutcome::Victory { winner: Side::One }),
        _ => None,
    }
}

/// Mutable state of a session.
#[derive(Debug)]
pub struct BattleState {
    /// Challenger's team
    pub team1: BattleTeam,
    /// Challenged user's team
    pub team2: BattleTeam,
    /// Roster rules
    pub rules: BattleRules,
    /// Current phase
    pub phase: BattlePhase,
    rng: StdRng,
}

impl BattleState {
    /// Creates a session state in the proposal phase.
    #[must_use]
    pub const fn new(
        team1: BattleTeam,
        team2: BattleTeam,
        rules: BattleRules,
        rng: StdRng,
    ) -> Self {
        Self {
            team1,
            team2,
            rules,
            phase: BattlePhase::Proposing,
            rng,
        }
    }

    /// Whether the session reached its terminal phase.
    #[must_use]
    pub const fn is_finished(&self) -> bool {
        matches!(self.phase, BattlePhase::Finished(_))
    }

    /// Team on `side`.
    #[must_use]
    pub const fn team(&self, side: Side) -> &BattleTeam {
        match side {
            Side::One => &self.team1,
            Side::Two => &self.team2,
        }
    }

    /// Mutable team on `side`.
    pub const fn team_mut(&mut self, side: Side) -> &mut BattleTeam {
        match side {
            Side::One => &mut self.team1,
            Side::Two => &mut self.team2,
        }
    }

    /// Side led by `user_id`.
    ///
    /// # Errors
    /// [`Error::NotAParticipant`] when the user leads neither team.
    pub fn side_of(&self, user_id: u64) -> Result<Side> {
        if self.team1.leader.id == user_id {
            Ok(Side::One)
        } else if self.team2.leader.id == user_id {
            Ok(Side::Two)
        } else {
            Err(Error::NotAParticipant { user_id })
        }
    }

    /// Remaining units per team.
    #[must_use]
    pub fn counts(&self) -> (usize, usize) {
        (self.team1.proposal.len(), self.team2.proposal.len())
    }

    fn split(&mut self, side: Side) -> (&mut BattleTeam, &mut BattleTeam, &mut StdRng) {
        match side {
            Side::One => (&mut self.team1, &mut self.team2, &mut self.rng),
            Side::Two => (&mut self.team2, &mut self.team1, &mut self.rng),
        }
    }

    /// Rolls the die and enters combat.
    pub fn roll(&mut self) -> (u8, Side) {
        let dice = roll_dice(&mut self.rng);
        let side = starting_side(dice);
        self.phase = BattlePhase::InCombat {
            turn: side,
            round: 1,
        };
        (dice, side)
    }

    /// Hands the turn to the other side.
    pub fn switch_turn(&mut self) {
        if let BattlePhase::InCombat { turn, round } = self.phase {
            self.phase = BattlePhase::InCombat {
                turn: turn.other(),
                round: round + 1,
            };
        }
    }

    /// Lets an autonomous unit of `side` pick its action.
    pub fn npc_decision(&mut self, side: Side) -> NpcDecision {
        let (_, opposing, rng) = self.split(side);
        decide_npc(rng, &opposing.proposal)
    }

    /// Applies a resolved action of `unit_id` and returns the resulting events.
    pub fn apply(&mut self, side: Side, unit_id: i64, action: ResolvedAction) -> Vec<BattleEvent> {
        match action {
            ResolvedAction::Attack { target_id } => self.apply_attack(side, unit_id, target_id),
            ResolvedAction::Sleep => self.apply_sleep(side, unit_id),
        }
    }

    /// Lets `attacker_id` hit `target_id`, removing the target if it dies.
    ///
    /// A killing blow is reported only as [`BattleEvent::Eliminated`].
    pub fn apply_attack(
        &mut self,
        side: Side,
        attacker_id: i64,
        target_id: i64,
    ) -> Vec<BattleEvent> {
        let (acting, opposing, _) = self.split(side);
        let Some(attacker) = acting.proposal.iter().find(|b| b.id == attacker_id) else {
            return Vec::new();
        };
        let attacker_ref = UnitRef::from(attacker);
        let attack = attacker.attack;

        let Some(target) = opposing.ball_mut(target_id) else {
            return Vec::new();
        };
        let outcome = strike(attack, target);
        let target_ref = UnitRef::from(&*target);

        if outcome.eliminated {
            opposing.eliminate(target_id);
            return vec![BattleEvent::Eliminated {
                attacker: attacker_ref,
                target: target_ref,
            }];
        }
        vec![BattleEvent::Attacked {
            attacker: attacker_ref,
            target: target_ref,
            report: outcome.report,
        }]
    }

    /// Lets `unit_id` sleep and heal.
    pub fn apply_sleep(&mut self, side: Side, unit_id: i64) -> Vec<BattleEvent> {
        let (acting, _, rng) = self.split(side);
        let Some(unit) = acting.ball_mut(unit_id) else {
            return Vec::new();
        };
        let healed = unit.heal(rng);
        vec![BattleEvent::Slept {
            unit: UnitRef::from(&*unit),
            healed,
            health: unit.health,
        }]
    }

    fn finish_report(&self, outcome: &BattleOutcome) -> Option<FinishReport> {
        let leader = |side| self.team(side).leader.clone();
        match outcome {
            BattleOutcome::Victory { winner } => Some(FinishReport::Victory {
                winner: leader(*winner),
            }),
            BattleOutcome::Tie => Some(FinishReport::Tie {
                team1: self.team1.leader.clone(),
                team2: self.team2.leader.clone(),
            }),
            BattleOutcome::Surrender { loser } => Some(FinishReport::Surrender {
                loser: leader(*loser),
                winner: leader(loser.other()),
            }),
            BattleOutcome::Cancelled { .. } => None,
        }
    }
}

/// Read-only copy of a session's state.
#[derive(Debug, Clone)]
pub struct BattleSnapshot {
    /// Challenger's team
    pub team1: BattleTeam,
    /// Challenged user's team
    pub team2: BattleTeam,
    /// Roster rules
    pub rules: BattleRules,
    /// Current phase
    pub phase: BattlePhase,
}

/// Everything needed to create a session.
#[derive(Debug, Clone)]
pub struct BattleSetup {
    /// Session id
    pub id: u64,
    /// Guild the battle runs in
    pub guild_id: u64,
    /// Channel the battle runs in
    pub channel_id: u64,
    /// Challenger's team
    pub team1: BattleTeam,
    /// Challenged user's team
    pub team2: BattleTeam,
    /// Roster rules
    pub rules: BattleRules,
    /// Names used in rendered text
    pub text: ViewText,
    /// Timers
    pub timings: BattleTimings,
    /// Fixed RNG seed, random when `None`
    pub seed: Option<u64>,
}

struct PendingAction {
    leader_id: u64,
    reply: oneshot::Sender<ResolvedAction>,
}

/// A running battle session.
pub struct Battle {
    id: u64,
    guild_id: u64,
    channel_id: u64,
    text: ViewText,
    timings: BattleTimings,
    created_at: Instant,
    finished: AtomicBool,
    state: Mutex<BattleState>,
    surface: Arc<dyn BattleSurface>,
    pending: Mutex<Option<PendingAction>>,
    refresh_task: Mutex<Option<JoinHandle<()>>>,
}

impl std::fmt::Debug for Battle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Battle")
            .field("id", &self.id)
            .field("guild_id", &self.guild_id)
            .field("channel_id", &self.channel_id)
            .field("finished", &self.is_finished())
            .finish_non_exhaustive()
    }
}

impl Battle {
    /// Creates a session in the proposal phase. Nothing is posted until [`Battle::start`].
    #[must_use]
    pub fn new(setup: BattleSetup, surface: Arc<dyn BattleSurface>) -> Arc<Self> {
        let rng = setup
            .seed
            .map_or_else(StdRng::from_os_rng, StdRng::seed_from_u64);

        Arc::new(Self {
            id: setup.id,
            guild_id: setup.guild_id,
            channel_id: setup.channel_id,
            text: setup.text,
            timings: setup.timings,
            created_at: Instant::now(),
            finished: AtomicBool::new(false),
            state: Mutex::new(BattleState::new(setup.team1, setup.team2, setup.rules, rng)),
            surface,
            pending: Mutex::new(None),
            refresh_task: Mutex::new(None),
        })
    }

    /// Session id.
    #[must_use]
    pub const fn id(&self) -> u64 {
        self.id
    }

    /// Guild the battle runs in.
    #[must_use]
    pub const fn guild_id(&self) -> u64 {
        self.guild_id
    }

    /// Channel the battle runs in.
    #[must_use]
    pub const fn channel_id(&self) -> u64 {
        self.channel_id
    }

    /// Whether the session reached its terminal phase.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.finished.load(Ordering::Acquire)
    }

    /// Current phase.
    pub async fn phase(&self) -> BattlePhase {
        self.state.lock().await.phase.clone()
    }

    /// Leaders of both teams.
    pub async fn leaders(&self) -> (Leader, Leader) {
        let state = self.state.lock().await;
        (state.team1.leader.clone(), state.team2.leader.clone())
    }

    /// Whether `user_id` leads one of the teams.
    pub async fn has_participant(&self, user_id: u64) -> bool {
        self.state.lock().await.side_of(user_id).is_ok()
    }

    /// Copy of the current state.
    pub async fn snapshot(&self) -> BattleSnapshot {
        let state = self.state.lock().await;
        BattleSnapshot {
            team1: state.team1.clone(),
            team2: state.team2.clone(),
            rules: state.rules,
            phase: state.phase.clone(),
        }
    }

    /// Current rendering of the proposal message.
    pub async fn view(&self) -> BattleView {
        let state = self.state.lock().await;
        render_view(&self.text, &state, &self.timings)
    }

    fn set_outcome(&self, state: &mut BattleState, outcome: BattleOutcome) {
        state.phase = BattlePhase::Finished(outcome);
        self.finished.store(true, Ordering::Release);
    }

    /// Posts the proposal message and starts the refresh loop.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        let view = self.view().await;
        self.surface.open(&view).await?;

        let battle = Arc::clone(self);
        let handle = tokio::spawn(async move { battle.refresh_loop().await });
        *self.refresh_task.lock().await = Some(handle);

        info!(
            battle_id = self.id,
            guild_id = self.guild_id,
            channel_id = self.channel_id,
            team1 = view.team1.id,
            team2 = view.team2.id,
            "Battle started"
        );
        Ok(())
    }

    async fn refresh_loop(self: Arc<Self>) {
        loop {
            sleep(self.timings.refresh_interval).await;

            let view = {
                let state = self.state.lock().await;
                if !state.phase.is_proposing() {
                    return;
                }
                render_view(&self.text, &state, &self.timings)
            };

            if self.created_at.elapsed() >= self.timings.session_timeout {
                info!(battle_id = self.id, "Battle proposal timed out");
                self.refresh_task.lock().await.take();
                self.cancel(SESSION_TIMEOUT_REASON).await;
                return;
            }

            if let Err(e) = self.surface.refresh(&view).await {
                error!(
                    battle_id = self.id,
                    guild_id = self.guild_id,
                    channel_id = self.channel_id,
                    team1 = view.team1.id,
                    team2 = view.team2.id,
                    "Failed to refresh battle message: {e}"
                );
                self.refresh_task.lock().await.take();
                self.cancel(SESSION_TIMEOUT_REASON).await;
                return;
            }
        }
    }

    async fn stop_refresh(&self) {
        if let Some(handle) = self.refresh_task.lock().await.take() {
            handle.abort();
        }
    }

    async fn close_with(&self, view: BattleView, reason: &str) {
        self.stop_refresh().await;
        self.pending.lock().await.take();
        if let Err(e) = self.surface.close(&view, reason).await {
            warn!(battle_id = self.id, "Failed to close battle message: {e}");
        }
    }

    /// Ends the session without a winner. Returns `false` if it was already over.
    pub async fn cancel(&self, reason: &str) -> bool {
        let view = {
            let mut state = self.state.lock().await;
            if state.is_finished() {
                return false;
            }
            self.set_outcome(
                &mut state,
                BattleOutcome::Cancelled {
                    reason: reason.to_string(),
                },
            );
            render_view(&self.text, &state, &self.timings)
        };

        info!(battle_id = self.id, reason, "Battle cancelled");
        self.close_with(view, reason).await;
        true
    }

    /// Adds a unit to the roster led by `user_id`.
    pub async fn add_ball(&self, user_id: u64, ball: BattleBall) -> Result<()> {
        let mut state = self.state.lock().await;
        let side = state.side_of(user_id)?;
        if state.is_finished() {
            return Err(Error::BattleFinished);
        }
        if !state.phase.is_proposing() {
            return Err(Error::Locked);
        }

        let rules = state.rules;
        debug!(battle_id = self.id, user_id, ball_id = ball.id, "Adding unit");
        state.team_mut(side).add(ball, &rules)
    }

    /// Removes a unit from the roster led by `user_id`.
    pub async fn remove_ball(&self, user_id: u64, ball_id: i64) -> Result<BattleBall> {
        let mut state = self.state.lock().await;
        let side = state.side_of(user_id)?;
        if state.is_finished() {
            return Err(Error::BattleFinished);
        }
        if !state.phase.is_proposing() {
            return Err(Error::Locked);
        }

        debug!(battle_id = self.id, user_id, ball_id, "Removing unit");
        state.team_mut(side).remove(ball_id)
    }

    /// Handles a leader's accept or deny.
    ///
    /// Once both teams accepted the refresh loop stops and combat begins in
    /// the background.
    ///
    /// # Errors
    /// Roster validation errors from [`BattleTeam::accept`], and
    /// [`Error::Timeout`] when the proposal message could not be updated.
    pub async fn submit_confirmation(
        self: &Arc<Self>,
        user_id: u64,
        decision: Confirmation,
    ) -> Result<ConfirmOutcome> {
        if decision == Confirmation::Deny {
            self.withdraw(user_id).await?;
            return Ok(ConfirmOutcome::Cancelled);
        }

        let (view, both) = {
            let mut state = self.state.lock().await;
            let side = state.side_of(user_id)?;
            match state.phase {
                BattlePhase::Finished(_) => return Err(Error::BattleFinished),
                BattlePhase::Rolling | BattlePhase::InCombat { .. } => {
                    return Err(Error::AlreadyAccepted);
                }
                BattlePhase::Proposing | BattlePhase::Confirming => {}
            }

            let rules = state.rules;
            state.team_mut(side).accept(&rules)?;
            let both = state.team1.accepted && state.team2.accepted;
            state.phase = if both {
                BattlePhase::Rolling
            } else {
                BattlePhase::Confirming
            };
            (render_view(&self.text, &state, &self.timings), both)
        };

        info!(battle_id = self.id, user_id, both, "Battle accepted");
        if both {
            self.stop_refresh().await;
        }

        if let Err(e) = self.surface.refresh(&view).await {
            error!(battle_id = self.id, "Failed to update battle message: {e}");
            self.cancel(SESSION_TIMEOUT_REASON).await;
            return Err(Error::Timeout {
                reason: SESSION_TIMEOUT_REASON.to_string(),
            });
        }

        if both {
            self.spawn_combat();
            Ok(ConfirmOutcome::Started)
        } else {
            Ok(ConfirmOutcome::Waiting)
        }
    }

    async fn withdraw(&self, user_id: u64) -> Result<()> {
        let (view, reason) = {
            let mut state = self.state.lock().await;
            let side = state.side_of(user_id)?;
            if state.is_finished() {
                return Err(Error::BattleFinished);
            }
            if !state.phase.is_proposing() {
                return Err(Error::AlreadyStarted);
            }

            let team = state.team_mut(side);
            team.cancel();
            let reason = format!("{} cancelled the battle.", team.leader.name);
            self.set_outcome(
                &mut state,
                BattleOutcome::Cancelled {
                    reason: reason.clone(),
                },
            );
            (render_view(&self.text, &state, &self.timings), reason)
        };

        info!(battle_id = self.id, user_id, "Battle denied");
        self.close_with(view, &reason).await;
        Ok(())
    }

    /// Gives the battle to the other team.
    ///
    /// # Errors
    /// [`Error::NotStarted`] while teams are still being proposed.
    pub async fn surrender(&self, user_id: u64) -> Result<()> {
        let report = {
            let mut state = self.state.lock().await;
            let side = state.side_of(user_id)?;
            match state.phase {
                BattlePhase::Finished(_) => return Err(Error::BattleFinished),
                BattlePhase::Proposing | BattlePhase::Confirming => return Err(Error::NotStarted),
                BattlePhase::Rolling | BattlePhase::InCombat { .. } => {}
            }

            let outcome = BattleOutcome::Surrender { loser: side };
            let report = state.finish_report(&outcome);
            self.set_outcome(&mut state, outcome);
            report
        };

        info!(battle_id = self.id, user_id, "Battle surrendered");
        self.pending.lock().await.take();
        if let Some(report) = report {
            self.surface.announce(&BattleEvent::Finished(report)).await?;
        }
        Ok(())
    }

    /// Whether an attack by `user_id` right now needs an explicit target.
    ///
    /// # Errors
    /// [`Error::NotYourTurn`] unless the combat is waiting for this user.
    pub async fn needs_target(&self, user_id: u64) -> Result<bool> {
        let pending = self.pending.lock().await;
        let state = self.state.lock().await;
        let side = state.side_of(user_id)?;
        if state.is_finished() {
            return Err(Error::BattleFinished);
        }
        match pending.as_ref() {
            Some(action) if action.leader_id == user_id => {
                Ok(state.team(side.other()).proposal.len() > 1)
            }
            _ => Err(Error::NotYourTurn),
        }
    }

    /// Answers the pending action prompt of `user_id`.
    ///
    /// An unknown target leaves the prompt open so the player can retry.
    pub async fn submit_action(
        &self,
        user_id: u64,
        request: ActionRequest,
    ) -> Result<ResolvedAction> {
        let mut pending = self.pending.lock().await;
        let state = self.state.lock().await;
        let side = state.side_of(user_id)?;
        if state.is_finished() {
            return Err(Error::BattleFinished);
        }
        if !pending.as_ref().is_some_and(|action| action.leader_id == user_id) {
            return Err(Error::NotYourTurn);
        }

        let action = resolve_request(&state.team(side.other()).proposal, &request)?;
        drop(state);

        if let Some(waiting) = pending.take() {
            let _ = waiting.reply.send(action);
        }
        debug!(battle_id = self.id, user_id, ?action, "Action submitted");
        Ok(action)
    }

    fn spawn_combat(self: &Arc<Self>) {
        let battle = Arc::clone(self);
        tokio::spawn(async move {
            if let Err(e) = Arc::clone(&battle).run_combat().await {
                if e.kind() == ErrorKind::Timeout {
                    info!(battle_id = battle.id, "{e}");
                } else {
                    error!(
                        battle_id = battle.id,
                        guild_id = battle.guild_id,
                        channel_id = battle.channel_id,
                        "Battle loop failed: {e}"
                    );
                    battle.cancel(SESSION_TIMEOUT_REASON).await;
                }
            }
        });
    }

    async fn run_combat(self: Arc<Self>) -> Result<()> {
        sleep(self.timings.dice_delay).await;

        let (dice, starting) = {
            let mut state = self.state.lock().await;
            if state.is_finished() {
                return Ok(());
            }
            let (dice, side) = state.roll();
            (dice, state.team(side).leader.clone())
        };
        info!(battle_id = self.id, dice, starting = starting.id, "Dice rolled");
        self.surface
            .announce(&BattleEvent::DiceRolled {
                value: dice,
                starting,
            })
            .await?;

        loop {
            let (side, before) = {
                let state = self.state.lock().await;
                let BattlePhase::InCombat { turn, .. } = state.phase else {
                    return Ok(());
                };
                let (count1, count2) = state.counts();
                if let Some(outcome) = decide_outcome(count1, count2) {
                    drop(state);
                    return self.finish(outcome).await;
                }
                (turn, (count1, count2))
            };

            self.play_turn(side).await?;

            let (after, leaders) = {
                let mut state = self.state.lock().await;
                if state.is_finished() {
                    return Ok(());
                }
                state.switch_turn();
                (
                    state.counts(),
                    (state.team1.leader.clone(), state.team2.leader.clone()),
                )
            };

            if after != before {
                self.surface
                    .announce(&BattleEvent::RosterCounts {
                        team1: (leaders.0, after.0),
                        team2: (leaders.1, after.1),
                    })
                    .await?;
            }
            sleep(self.timings.turn_delay).await;
        }
    }

    async fn play_turn(&self, side: Side) -> Result<()> {
        let unit_ids: Vec<i64> = {
            let state = self.state.lock().await;
            state.team(side).proposal.iter().map(|b| b.id).collect()
        };

        for (index, unit_id) in unit_ids.into_iter().enumerate() {
            let events = if index == 0 {
                let Some(action) = self.leader_action(side, unit_id).await? else {
                    continue;
                };
                let mut state = self.state.lock().await;
                if state.is_finished() {
                    return Ok(());
                }
                state.apply(side, unit_id, action)
            } else {
                let mut state = self.state.lock().await;
                if state.is_finished() {
                    return Ok(());
                }
                match state.npc_decision(side) {
                    NpcDecision::Attack { target_id } => {
                        state.apply_attack(side, unit_id, target_id)
                    }
                    NpcDecision::Sleep => state.apply_sleep(side, unit_id),
                    NpcDecision::Skip => Vec::new(),
                }
            };

            for event in &events {
                debug!(battle_id = self.id, ?event, "Combat event");
                self.surface.announce(event).await?;
            }
            if !events.is_empty() {
                sleep(self.timings.turn_delay).await;
            }
        }
        Ok(())
    }

    async fn leader_action(&self, side: Side, unit_id: i64) -> Result<Option<ResolvedAction>> {
        let (rx, leader, unit) = {
            let mut pending = self.pending.lock().await;
            let state = self.state.lock().await;
            if state.is_finished() || state.team(side.other()).proposal.is_empty() {
                return Ok(None);
            }
            let team = state.team(side);
            let Some(unit) = team.proposal.iter().find(|b| b.id == unit_id) else {
                return Ok(None);
            };

            let (tx, rx) = oneshot::channel();
            *pending = Some(PendingAction {
                leader_id: team.leader.id,
                reply: tx,
            });
            (rx, team.leader.clone(), UnitRef::from(unit))
        };

        self.surface.prompt_action(&leader, &unit).await?;

        match timeout(self.timings.action_timeout, rx).await {
            Ok(Ok(action)) => {
                self.surface.end_prompt().await?;
                Ok(Some(action))
            }
            // Sender dropped: the session ended while waiting
            Ok(Err(_)) => {
                if let Err(e) = self.surface.end_prompt().await {
                    warn!(battle_id = self.id, "Failed to disable action prompt: {e}");
                }
                Ok(None)
            }
            Err(_) => {
                info!(battle_id = self.id, leader = leader.id, "Action window elapsed");
                self.cancel(ACTION_TIMEOUT_REASON).await;
                Err(Error::Timeout {
                    reason: ACTION_TIMEOUT_REASON.to_string(),
                })
            }
        }
    }

    async fn finish(&self, outcome: BattleOutcome) -> Result<()> {
        let report = {
            let mut state = self.state.lock().await;
            if state.is_finished() {
                return Ok(());
            }
            let report = state.finish_report(&outcome);
            self.set_outcome(&mut state, outcome);
            report
        };

        info!(battle_id = self.id, ?report, "Battle finished");
        self.pending.lock().await.take();
        if let Some(report) = report {
            self.surface.announce(&BattleEvent::Finished(report)).await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;
    use crate::core::display::ViewStatus;
    use crate::test_utils::{
        RecordingSurface, SurfaceCall, ball, test_battle, test_rng, test_team, wait_until_finished,
    };

    const ALICE: u64 = 1;
    const BOB: u64 = 2;

    async fn accept_both(battle: &Arc<Battle>) {
        assert_eq!(
            battle.submit_confirmation(ALICE, Confirmation::Accept).await.unwrap(),
            ConfirmOutcome::Waiting
        );
        assert_eq!(
            battle.submit_confirmation(BOB, Confirmation::Accept).await.unwrap(),
            ConfirmOutcome::Started
        );
    }

    #[test]
    fn test_starting_side_follows_parity() {
        assert_eq!(starting_side(2), Side::One);
        assert_eq!(starting_side(6), Side::One);
        assert_eq!(starting_side(1), Side::Two);
        assert_eq!(starting_side(5), Side::Two);
    }

    #[test]
    fn test_decide_outcome() {
        assert_eq!(decide_outcome(2, 3), None);
        assert_eq!(
            decide_outcome(0, 1),
            Some(BattleOutcome::Victory { winner: Side::Two })
        );
        assert_eq!(
            decide_outcome(4, 0),
            Some(BattleOutcome::Victory { winner: Side::One })
        );
        let tie = decide_outcome(0, 0).unwrap();
        assert_eq!(tie, BattleOutcome::Tie);
        assert_eq!(tie.winners(), vec![Side::One, Side::Two]);
        assert_eq!(
            BattleOutcome::Surrender { loser: Side::One }.winners(),
            vec![Side::Two]
        );
    }

    #[test]
    fn test_turns_alternate() {
        let mut state = BattleState::new(
            test_team(ALICE, "alice"),
            test_team(BOB, "bob"),
            BattleRules::default(),
            test_rng(3),
        );
        let (_, first) = state.roll();

        let mut expected = first;
        for round in 1..=10 {
            assert_eq!(
                state.phase,
                BattlePhase::InCombat {
                    turn: expected,
                    round
                }
            );
            state.switch_turn();
            expected = expected.other();
        }
    }

    #[test]
    fn test_attack_eliminates_for_good() {
        let mut team1 = test_team(ALICE, "alice");
        team1.proposal.push(ball(1, "Spain", 50, 200));
        let mut team2 = test_team(BOB, "bob");
        team2.proposal.push(ball(2, "Argentina", 50, 10));
        team2.proposal.push(ball(3, "Chile", 400, 10));
        let mut state = BattleState::new(team1, team2, BattleRules::default(), test_rng(1));

        let events = state.apply_attack(Side::One, 1, 2);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            BattleEvent::Eliminated { ref attacker, ref target }
                if attacker.id == 1 && target.id == 2
        ));
        assert_eq!(state.counts(), (1, 1));

        // defense = round(sqrt(4000)) = 63, so Chile survives with 263
        let events = state.apply_attack(Side::One, 1, 3);
        assert_eq!(events.len(), 1);
        assert!(matches!(
            events[0],
            BattleEvent::Attacked { ref report, .. } if report.health == 263
        ));
        assert_eq!(state.counts(), (1, 1));

        // The eliminated unit can't be hit again
        assert!(state.apply_attack(Side::One, 1, 2).is_empty());
        assert!(state.team2.position(2).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_full_battle_strongest_wins() {
        let surface = RecordingSurface::new();
        let battle = test_battle(&surface, 7);
        battle.start().await.unwrap();

        battle.add_ball(ALICE, ball(0x1A, "Spain", 50, 30)).await.unwrap();
        battle.add_ball(BOB, ball(0x2B, "Argentina", 50, 10)).await.unwrap();
        accept_both(&battle).await;

        while let Ok(Some((leader, _unit))) =
            timeout(Duration::from_secs(60), surface.next_prompt()).await
        {
            battle
                .submit_action(leader, ActionRequest::Attack { target: None })
                .await
                .unwrap();
        }

        wait_until_finished(&battle).await;
        assert_eq!(
            battle.phase().await,
            BattlePhase::Finished(BattleOutcome::Victory { winner: Side::One })
        );

        let calls = surface.calls().await;
        assert!(calls.iter().any(|c| matches!(
            c,
            SurfaceCall::Announce(BattleEvent::DiceRolled { .. })
        )));
        assert!(calls.iter().any(|c| matches!(
            c,
            SurfaceCall::Announce(BattleEvent::Eliminated { target, .. }) if target.id == 0x2B
        )));
        assert!(calls.iter().any(|c| matches!(
            c,
            SurfaceCall::Announce(BattleEvent::Finished(FinishReport::Victory { winner }))
                if winner.id == ALICE
        )));
        let snapshot = battle.snapshot().await;
        assert_eq!(snapshot.team2.proposal.len(), 0);
        assert_eq!(snapshot.team1.proposal.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_npc_units_fight_on_their_own() {
        let surface = RecordingSurface::new();
        let battle = test_battle(&surface, 21);
        battle.start().await.unwrap();

        for (id, species) in [(0x10, "Spain"), (0x11, "France"), (0x12, "Italy")] {
            battle.add_ball(ALICE, ball(id, species, 80, 40)).await.unwrap();
        }
        for (id, species) in [(0x20, "Chile"), (0x21, "Peru"), (0x22, "Bolivia")] {
            battle.add_ball(BOB, ball(id, species, 80, 40)).await.unwrap();
        }
        accept_both(&battle).await;

        // Leaders always hit the first opposing unit by id
        let mut prompted = Vec::new();
        while let Ok(Some((leader, _unit))) =
            timeout(Duration::from_secs(60), surface.next_prompt()).await
        {
            prompted.push(leader);
            let snapshot = battle.snapshot().await;
            let opponents = if leader == ALICE {
                &snapshot.team2
            } else {
                &snapshot.team1
            };
            let target = format!("{:X}", opponents.proposal[0].id);
            battle
                .submit_action(
                    leader,
                    ActionRequest::Attack {
                        target: Some(target),
                    },
                )
                .await
                .unwrap();
        }
        wait_until_finished(&battle).await;

        let calls = surface.calls().await;
        let starting = calls.iter().find_map(|c| match c {
            SurfaceCall::Announce(BattleEvent::DiceRolled { starting, .. }) => Some(starting.id),
            _ => None,
        });
        assert!(prompted.len() >= 2);
        assert_eq!(prompted.first().copied(), starting);
        assert!(prompted.windows(2).all(|pair| pair[0] != pair[1]));

        let mut dead = Vec::new();
        for call in &calls {
            if let SurfaceCall::Announce(event) = call {
                match event {
                    BattleEvent::Attacked { attacker, target, .. } => {
                        assert!(!dead.contains(&attacker.id), "dead unit acted");
                        assert!(!dead.contains(&target.id), "dead unit targeted");
                    }
                    BattleEvent::Slept { unit, .. } => {
                        assert!(!dead.contains(&unit.id), "dead unit acted");
                    }
                    BattleEvent::Eliminated { attacker, target } => {
                        assert!(!dead.contains(&attacker.id), "dead unit acted");
                        dead.push(target.id);
                    }
                    _ => {}
                }
            }
        }

        let phase = battle.phase().await;
        assert!(matches!(
            phase,
            BattlePhase::Finished(BattleOutcome::Victory { .. } | BattleOutcome::Tie)
        ));
        assert!(calls.iter().any(|c| matches!(
            c,
            SurfaceCall::Announce(BattleEvent::RosterCounts { .. })
        )));
    }

    #[tokio::test(start_paused = true)]
    async fn test_action_timeout_cancels() {
        let surface = RecordingSurface::new();
        let battle = test_battle(&surface, 7);
        battle.start().await.unwrap();

        battle.add_ball(ALICE, ball(0x1A, "Spain", 50, 30)).await.unwrap();
        battle.add_ball(BOB, ball(0x2B, "Argentina", 50, 10)).await.unwrap();
        accept_both(&battle).await;

        let (leader, _) = surface.next_prompt().await.unwrap();
        wait_until_finished(&battle).await;

        assert_eq!(
            battle.phase().await,
            BattlePhase::Finished(BattleOutcome::Cancelled {
                reason: ACTION_TIMEOUT_REASON.to_string()
            })
        );
        let calls = surface.calls().await;
        assert!(!calls.iter().any(|c| matches!(
            c,
            SurfaceCall::Announce(BattleEvent::Attacked { .. } | BattleEvent::Slept { .. })
        )));
        assert!(calls.contains(&SurfaceCall::Close(ACTION_TIMEOUT_REASON.to_string())));

        let late = battle.submit_action(leader, ActionRequest::Sleep).await;
        assert!(matches!(late, Err(Error::BattleFinished)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_session_timeout_cancels_proposal() {
        let surface = RecordingSurface::new();
        let battle = test_battle(&surface, 7);
        battle.start().await.unwrap();
        battle.add_ball(ALICE, ball(0x1A, "Spain", 50, 30)).await.unwrap();

        sleep(Duration::from_secs(890)).await;
        assert!(!battle.is_finished());

        sleep(Duration::from_secs(30)).await;
        assert!(battle.is_finished());
        assert_eq!(
            battle.phase().await,
            BattlePhase::Finished(BattleOutcome::Cancelled {
                reason: SESSION_TIMEOUT_REASON.to_string()
            })
        );

        let calls = surface.calls().await;
        let refreshes = calls.iter().filter(|c| **c == SurfaceCall::Refresh).count();
        assert!(refreshes >= 50);
        assert!(matches!(
            battle.add_ball(BOB, ball(0x2B, "Argentina", 50, 10)).await,
            Err(Error::BattleFinished)
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn test_refresh_failure_cancels() {
        let surface = RecordingSurface::new();
        let battle = test_battle(&surface, 7);
        battle.start().await.unwrap();
        surface.fail_refresh(true);

        sleep(Duration::from_secs(16)).await;
        assert!(battle.is_finished());
        assert!(
            surface
                .calls()
                .await
                .contains(&SurfaceCall::Close(SESSION_TIMEOUT_REASON.to_string()))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_surrender() {
        let surface = RecordingSurface::new();
        let battle = test_battle(&surface, 7);
        battle.start().await.unwrap();
        battle.add_ball(ALICE, ball(0x1A, "Spain", 50, 30)).await.unwrap();
        battle.add_ball(BOB, ball(0x2B, "Argentina", 50, 10)).await.unwrap();

        assert!(matches!(battle.surrender(BOB).await, Err(Error::NotStarted)));

        accept_both(&battle).await;
        surface.next_prompt().await.unwrap();

        battle.surrender(BOB).await.unwrap();
        assert_eq!(
            battle.phase().await,
            BattlePhase::Finished(BattleOutcome::Surrender { loser: Side::Two })
        );
        assert!(matches!(battle.surrender(ALICE).await, Err(Error::BattleFinished)));

        // The combat task notices and stops without declaring another result
        sleep(Duration::from_secs(5)).await;
        let finishes = surface
            .calls()
            .await
            .iter()
            .filter(|c| matches!(c, SurfaceCall::Announce(BattleEvent::Finished(_))))
            .count();
        assert_eq!(finishes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_submit_action_rejections() {
        let surface = RecordingSurface::new();
        let battle = test_battle(&surface, 7);
        battle.start().await.unwrap();
        battle.add_ball(ALICE, ball(0x1A, "Spain", 50, 30)).await.unwrap();
        battle.add_ball(BOB, ball(0x2B, "Argentina", 50, 10)).await.unwrap();
        battle.add_ball(BOB, ball(0x2C, "Uruguay", 50, 10)).await.unwrap();
        battle.add_ball(ALICE, ball(0x1B, "Portugal", 50, 10)).await.unwrap();

        assert!(matches!(
            battle.submit_action(ALICE, ActionRequest::Sleep).await,
            Err(Error::NotYourTurn)
        ));
        assert!(matches!(
            battle.submit_action(99, ActionRequest::Sleep).await,
            Err(Error::NotAParticipant { user_id: 99 })
        ));

        accept_both(&battle).await;
        let (leader, _) = surface.next_prompt().await.unwrap();
        let other = if leader == ALICE { BOB } else { ALICE };

        assert!(matches!(
            battle.submit_action(other, ActionRequest::Sleep).await,
            Err(Error::NotYourTurn)
        ));
        assert!(battle.needs_target(leader).await.unwrap());
        assert!(matches!(
            battle
                .submit_action(leader, ActionRequest::Attack { target: None })
                .await,
            Err(Error::TargetRequired)
        ));
        assert!(matches!(
            battle
                .submit_action(
                    leader,
                    ActionRequest::Attack {
                        target: Some("atlantis".to_string())
                    }
                )
                .await,
            Err(Error::TargetNotFound { .. })
        ));

        // The prompt stays open after a bad target
        let action = battle.submit_action(leader, ActionRequest::Sleep).await.unwrap();
        assert_eq!(action, ResolvedAction::Sleep);
        assert!(battle.cancel("done").await);
        assert!(!battle.cancel("again").await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_roster_changes_and_deny() {
        let surface = RecordingSurface::new();
        let battle = test_battle(&surface, 7);
        battle.start().await.unwrap();

        battle.add_ball(ALICE, ball(0x1A, "Spain", 50, 30)).await.unwrap();
        battle.add_ball(ALICE, ball(0x1B, "France", 50, 30)).await.unwrap();
        let removed = battle.remove_ball(ALICE, 0x1A).await.unwrap();
        assert_eq!(removed.species, "Spain");
        assert!(matches!(
            battle.add_ball(99, ball(0x1C, "Chile", 50, 30)).await,
            Err(Error::NotAParticipant { .. })
        ));

        assert!(matches!(
            battle.submit_confirmation(BOB, Confirmation::Accept).await,
            Err(Error::InsufficientRoster { required: 1 })
        ));
        battle.submit_confirmation(ALICE, Confirmation::Accept).await.unwrap();
        assert_eq!(battle.phase().await, BattlePhase::Confirming);
        assert!(matches!(
            battle.add_ball(ALICE, ball(0x1D, "Peru", 50, 30)).await,
            Err(Error::Locked)
        ));

        assert_eq!(
            battle.submit_confirmation(BOB, Confirmation::Deny).await.unwrap(),
            ConfirmOutcome::Cancelled
        );
        let snapshot = battle.snapshot().await;
        assert!(snapshot.team2.cancelled);
        assert_eq!(
            snapshot.phase,
            BattlePhase::Finished(BattleOutcome::Cancelled {
                reason: "bob cancelled the battle.".to_string()
            })
        );
        assert!(
            surface
                .calls()
                .await
                .contains(&SurfaceCall::Close("bob cancelled the battle.".to_string()))
        );
        let view = surface.last_view().await.unwrap();
        assert_eq!(view.status, ViewStatus::Cancelled);
        assert!(view.fields[1].name.starts_with("🚫"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_deny_after_start_is_rejected() {
        let surface = RecordingSurface::new();
        let battle = test_battle(&surface, 7);
        battle.start().await.unwrap();
        battle.add_ball(ALICE, ball(0x1A, "Spain", 50, 30)).await.unwrap();
        battle.add_ball(BOB, ball(0x2B, "Argentina", 50, 10)).await.unwrap();
        accept_both(&battle).await;

        assert!(matches!(
            battle.submit_confirmation(ALICE, Confirmation::Deny).await,
            Err(Error::AlreadyStarted)
        ));
        assert!(matches!(
            battle.submit_confirmation(ALICE, Confirmation::Accept).await,
            Err(Error::AlreadyAccepted)
        ));
        battle.cancel("done").await;
    }
}
