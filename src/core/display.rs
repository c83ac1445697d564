//! Rendering of battle rosters for an embed-like surface.
//!
//! Rosters are split into chunks that never exceed [`FIELD_CHUNK_LIMIT`]
//! characters and never cut an entry in half. If the whole rendering is still
//! above [`EMBED_LIMIT`], entries are shortened; if that is not enough either,
//! only the last chunk of each roster is shown with a notice.

use crate::core::ball::BattleBall;
use crate::core::battle::{BattleOutcome, BattlePhase, BattleState, BattleTimings};
use crate::core::surface::{BattleEvent, FinishReport, UnitRef};
use crate::core::team::{BattleTeam, Leader};
use std::fmt::Write;

/// Largest chunk of roster text placed in one field.
pub const FIELD_CHUNK_LIMIT: usize = 950;
/// Largest total size of a rendered battle.
pub const EMBED_LIMIT: usize = 6000;
/// Invisible filler used for spacer fields.
pub const SPACER: &str = "\u{200B}";

const EMPTY_ROSTER: &str = "*Empty*";
const TRUNCATION_NOTICE: &str = "Battle too long, only showing last page:";

/// Names used in rendered text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewText {
    /// Bot name shown in titles
    pub bot_name: String,
    /// What the collectibles are called
    pub collectible_name: String,
}

impl Default for ViewText {
    fn default() -> Self {
        Self {
            bot_name: "BallsDex".to_string(),
            collectible_name: "countryball".to_string(),
        }
    }
}

impl From<&crate::config::Settings> for ViewText {
    fn from(settings: &crate::config::Settings) -> Self {
        Self {
            bot_name: settings.bot_name.clone(),
            collectible_name: settings.collectible_name.clone(),
        }
    }
}

/// One field of the rendered battle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmbedField {
    /// Field title
    pub name: String,
    /// Field body
    pub value: String,
    /// Whether the field sits next to its neighbours
    pub inline: bool,
}

impl EmbedField {
    fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            inline: true,
        }
    }

    fn spacer() -> Self {
        Self::new(SPACER, SPACER)
    }

    fn len(&self) -> usize {
        self.name.chars().count() + self.value.chars().count()
    }
}

/// State of the proposal message, used to pick colours and enable controls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewStatus {
    /// Teams are still being built
    Open,
    /// Both teams accepted, combat runs
    Locked,
    /// The battle was cancelled or timed out
    Cancelled,
    /// The battle reached a result
    Finished,
}

/// Everything needed to draw the proposal message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BattleView {
    /// Embed title
    pub title: String,
    /// Embed description
    pub description: String,
    /// Embed footer
    pub footer: String,
    /// Roster fields
    pub fields: Vec<EmbedField>,
    /// Message state
    pub status: ViewStatus,
    /// Leader of the first team (the challenger)
    pub team1: Leader,
    /// Leader of the second team (the challenged user)
    pub team2: Leader,
}

/// Marker shown before a leader's name.
#[must_use]
pub const fn prefix_emote(team: &BattleTeam) -> &'static str {
    if team.cancelled {
        "🚫"
    } else if team.accepted {
        "✅"
    } else {
        ""
    }
}

/// One roster entry.
#[must_use]
pub fn describe_ball(ball: &BattleBall, short: bool) -> String {
    if short {
        format!("{} {}", ball.display_id(), ball.species)
    } else {
        format!(
            "{} {} ATK:{} HP:{}",
            ball.display_id(),
            ball.species,
            ball.attack,
            ball.health
        )
    }
}

/// Splits a roster into chunks of at most [`FIELD_CHUNK_LIMIT`] characters.
#[must_use]
pub fn build_roster_chunks(team: &BattleTeam, short: bool) -> Vec<String> {
    let mut chunks = vec![String::new()];

    for ball in &team.proposal {
        let entry = describe_ball(ball, short);
        let text = if team.cancelled {
            format!("~~{entry}~~\n")
        } else {
            format!("- {entry}\n")
        };

        let current_len = chunks.last().map_or(0, |c| c.chars().count());
        if text.chars().count() + current_len > FIELD_CHUNK_LIMIT {
            chunks.push(String::new());
        }
        if let Some(current) = chunks.last_mut() {
            current.push_str(&text);
        }
    }

    if chunks[0].is_empty() {
        chunks[0] = EMPTY_ROSTER.to_string();
    }
    chunks
}

fn team_title(team: &BattleTeam) -> String {
    format!("{} {}", prefix_emote(team), team.leader.name)
        .trim_start()
        .to_string()
}

fn continuation(chunk: Option<&String>) -> EmbedField {
    chunk.map_or_else(EmbedField::spacer, |chunk| EmbedField::new(SPACER, chunk.clone()))
}

fn layout(
    team1: &BattleTeam,
    left: &[String],
    team2: &BattleTeam,
    right: &[String],
) -> Vec<EmbedField> {
    let mut fields = vec![
        EmbedField::new(team_title(team1), left[0].clone()),
        EmbedField::new(team_title(team2), right[0].clone()),
    ];

    if left.len() > 1 || right.len() > 1 {
        // Three fields per row: an empty one keeps later pages stacked under the first
        let pages = left.len().max(right.len());
        for i in 1..pages {
            fields.push(EmbedField::spacer());
            fields.push(continuation(left.get(i)));
            fields.push(continuation(right.get(i)));
        }
        fields.push(EmbedField::spacer());
    }

    fields
}

/// Total rendered size of `fields` plus `base_len` characters of title, description and footer.
#[must_use]
pub fn rendered_len(fields: &[EmbedField], base_len: usize) -> usize {
    base_len + fields.iter().map(EmbedField::len).sum::<usize>()
}

/// Builds the roster fields of both teams within [`EMBED_LIMIT`].
#[must_use]
pub fn fill_battle_fields(
    team1: &BattleTeam,
    team2: &BattleTeam,
    base_len: usize,
) -> Vec<EmbedField> {
    let fields = layout(
        team1,
        &build_roster_chunks(team1, false),
        team2,
        &build_roster_chunks(team2, false),
    );
    if rendered_len(&fields, base_len) <= EMBED_LIMIT {
        return fields;
    }

    let left = build_roster_chunks(team1, true);
    let right = build_roster_chunks(team2, true);
    let compact = layout(team1, &left, team2, &right);
    if rendered_len(&compact, base_len) <= EMBED_LIMIT {
        return compact;
    }

    let last_page = |chunks: &[String]| {
        format!(
            "{TRUNCATION_NOTICE}\n{}",
            chunks.last().map_or("", String::as_str)
        )
    };
    vec![
        EmbedField::new(team_title(team1), last_page(&left)),
        EmbedField::new(team_title(team2), last_page(&right)),
    ]
}

fn status_of(phase: &BattlePhase) -> ViewStatus {
    match phase {
        BattlePhase::Proposing | BattlePhase::Confirming => ViewStatus::Open,
        BattlePhase::Rolling | BattlePhase::InCombat { .. } => ViewStatus::Locked,
        BattlePhase::Finished(BattleOutcome::Cancelled { .. }) => ViewStatus::Cancelled,
        BattlePhase::Finished(_) => ViewStatus::Finished,
    }
}

/// Renders the proposal message for the current state.
#[must_use]
pub fn render_view(text: &ViewText, state: &BattleState, timings: &BattleTimings) -> BattleView {
    let collectible = &text.collectible_name;
    let title = format!("{} Battle", text.bot_name);

    let mut description = format!(
        "⚔️ **Welcome to the {collectible} battle!** ⚔️\n\
         Add {collectible}s to your team to start the fight!\n\
         You will control the first {collectible} you add to your team.\n\
         When you are done, confirm, and let the fight begin!\n"
    );
    if let Some(amount) = state.rules.amount {
        let _ = writeln!(description, "- **Amount:** {amount}");
    }
    if let Some(duplicates) = state.rules.duplicates {
        let _ = writeln!(description, "- **Duplicates:** {duplicates}");
    }

    let footer = format!(
        "This message updates every {} seconds, you have {} minutes before it ends.",
        timings.refresh_interval.as_secs(),
        timings.session_timeout.as_secs() / 60
    );

    let base_len = title.chars().count() + description.chars().count() + footer.chars().count();
    let fields = fill_battle_fields(&state.team1, &state.team2, base_len);

    BattleView {
        title,
        description,
        footer,
        fields,
        status: status_of(&state.phase),
        team1: state.team1.leader.clone(),
        team2: state.team2.leader.clone(),
    }
}

fn unit(unit: &UnitRef) -> String {
    format!("**{}** (`#{:X}`)", unit.species, unit.id)
}

/// Channel message for a combat event.
#[must_use]
pub fn describe_event(event: &BattleEvent, text: &ViewText) -> String {
    match event {
        BattleEvent::DiceRolled { value, starting } => format!(
            "🎲 Rolled a **{value}**\nIt's {}, **{}**'s team starts the fight.",
            if value % 2 == 0 { "even" } else { "odd" },
            starting.name
        ),
        BattleEvent::Attacked {
            attacker,
            target,
            report,
        } => format!(
            "⚔️ {} attacked {}!\n{report}",
            unit(attacker),
            unit(target)
        ),
        BattleEvent::Eliminated { attacker, target } => {
            format!("💀 {} eliminated {}!", unit(attacker), unit(target))
        }
        BattleEvent::Slept {
            unit: sleeper,
            healed,
            health,
        } => format!(
            "💤 {} slept.\n❤️ Health: +{healed} ({health})",
            unit(sleeper)
        ),
        BattleEvent::RosterCounts { team1, team2 } => format!(
            "{}'s team has **{} {}s**.\n{}'s team has **{} {}s**.",
            team1.0.name,
            team1.1,
            text.collectible_name,
            team2.0.name,
            team2.1,
            text.collectible_name
        ),
        BattleEvent::Finished(report) => describe_finish(report),
    }
}

/// Announcement of how a battle ended.
#[must_use]
pub fn describe_finish(report: &FinishReport) -> String {
    match report {
        FinishReport::Victory { winner } => {
            format!("The winner of this battle is...\n**{}!**", winner.name)
        }
        FinishReport::Tie { .. } => "Wow, that was a tie, both teams win!".to_string(),
        FinishReport::Surrender { loser, winner } => format!(
            "{} surrendered.\n\nThe winner of this battle is...\n**{}!**",
            loser.name, winner.name
        ),
    }
}
