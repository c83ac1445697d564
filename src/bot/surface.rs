//! Serenity implementation of the battle messaging surface.
//!
//! The proposal is one embed edited in place; combat events are plain channel
//! messages; each action prompt is a message with Attack and Sleep buttons.
//! Buttons carry fixed custom ids and the interaction handler finds the
//! battle from the channel and the clicking user.

use crate::{
    core::{
        display::{BattleView, ViewStatus, ViewText, describe_event},
        surface::{BattleEvent, BattleSurface, UnitRef},
        team::Leader,
    },
    errors::Result,
};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

/// Custom id of the accept button.
pub const ACCEPT_ID: &str = "battle:accept";
/// Custom id of the deny button.
pub const DENY_ID: &str = "battle:deny";
/// Custom id of the attack button.
pub const ATTACK_ID: &str = "battle:attack";
/// Custom id of the sleep button.
pub const SLEEP_ID: &str = "battle:sleep";
/// Custom id of the target modal.
pub const TARGET_MODAL_ID: &str = "battle:target";
/// Custom id of the target input inside the modal.
pub const TARGET_INPUT_ID: &str = "target";

/// Builds the proposal embed.
#[must_use]
pub fn build_embed(view: &BattleView) -> serenity::CreateEmbed {
    let colour = match view.status {
        ViewStatus::Open => serenity::Colour::BLURPLE,
        ViewStatus::Locked => serenity::Colour::DARK_GREEN,
        ViewStatus::Cancelled => serenity::Colour::RED,
        ViewStatus::Finished => serenity::Colour::DARK_GREY,
    };

    view.fields.iter().fold(
        serenity::CreateEmbed::default()
            .title(&view.title)
            .description(&view.description)
            .colour(colour)
            .footer(serenity::CreateEmbedFooter::new(&view.footer)),
        |embed, field| embed.field(&field.name, &field.value, field.inline),
    )
}

fn confirmation_row(enabled: bool) -> serenity::CreateActionRow {
    serenity::CreateActionRow::Buttons(vec![
        serenity::CreateButton::new(ACCEPT_ID)
            .label("Accept")
            .emoji('✔')
            .style(serenity::ButtonStyle::Success)
            .disabled(!enabled),
        serenity::CreateButton::new(DENY_ID)
            .label("Deny")
            .emoji('✖')
            .style(serenity::ButtonStyle::Danger)
            .disabled(!enabled),
    ])
}

fn action_row(enabled: bool) -> serenity::CreateActionRow {
    serenity::CreateActionRow::Buttons(vec![
        serenity::CreateButton::new(ATTACK_ID)
            .label("Attack")
            .emoji('⚔')
            .style(serenity::ButtonStyle::Danger)
            .disabled(!enabled),
        serenity::CreateButton::new(SLEEP_ID)
            .label("Sleep")
            .emoji('💤')
            .style(serenity::ButtonStyle::Secondary)
            .disabled(!enabled),
    ])
}

/// Modal asking which opposing unit to attack.
#[must_use]
pub fn target_modal() -> serenity::CreateModal {
    let input = serenity::CreateInputText::new(
        serenity::InputTextStyle::Short,
        "Target",
        TARGET_INPUT_ID,
    )
    .placeholder("Id or name of the unit to attack")
    .required(true);

    serenity::CreateModal::new(TARGET_MODAL_ID, "Choose a target")
        .components(vec![serenity::CreateActionRow::InputText(input)])
}

/// Battle messages posted in one channel.
pub struct DiscordSurface {
    http: Arc<serenity::Http>,
    channel_id: serenity::ChannelId,
    text: ViewText,
    message: Mutex<Option<serenity::MessageId>>,
    prompt: Mutex<Option<serenity::MessageId>>,
}

impl DiscordSurface {
    /// Creates a surface for `channel_id`. Nothing is posted yet.
    #[must_use]
    pub fn new(http: Arc<serenity::Http>, channel_id: serenity::ChannelId, text: ViewText) -> Self {
        Self {
            http,
            channel_id,
            text,
            message: Mutex::new(None),
            prompt: Mutex::new(None),
        }
    }

    async fn edit_proposal(&self, embed: serenity::CreateEmbed, enabled: bool) -> Result<()> {
        let Some(message_id) = *self.message.lock().await else {
            return Ok(());
        };
        self.channel_id
            .edit_message(
                &self.http,
                message_id,
                serenity::EditMessage::new()
                    .embed(embed)
                    .components(vec![confirmation_row(enabled)]),
            )
            .await?;
        Ok(())
    }
}

#[async_trait]
impl BattleSurface for DiscordSurface {
    async fn open(&self, view: &BattleView) -> Result<()> {
        let content = format!(
            "Hey {}, {} is proposing a battle with you!",
            view.team2.mention(),
            view.team1.name
        );
        let message = self
            .channel_id
            .send_message(
                &self.http,
                serenity::CreateMessage::new()
                    .content(content)
                    .embed(build_embed(view))
                    .components(vec![confirmation_row(true)]),
            )
            .await?;
        *self.message.lock().await = Some(message.id);
        Ok(())
    }

    async fn refresh(&self, view: &BattleView) -> Result<()> {
        self.edit_proposal(build_embed(view), view.status == ViewStatus::Open)
            .await
    }

    async fn close(&self, view: &BattleView, reason: &str) -> Result<()> {
        let embed = build_embed(view).description(format!("{}\n**{reason}**", view.description));
        self.edit_proposal(embed, false).await?;
        self.end_prompt().await
    }

    async fn announce(&self, event: &BattleEvent) -> Result<()> {
        self.channel_id
            .say(&self.http, describe_event(event, &self.text))
            .await?;
        Ok(())
    }

    async fn prompt_action(&self, leader: &Leader, unit: &UnitRef) -> Result<()> {
        let content = format!(
            "{}, it's your turn! What should **{}** (`#{:X}`) do?",
            leader.mention(),
            unit.species,
            unit.id
        );
        let message = self
            .channel_id
            .send_message(
                &self.http,
                serenity::CreateMessage::new()
                    .content(content)
                    .components(vec![action_row(true)]),
            )
            .await?;
        *self.prompt.lock().await = Some(message.id);
        Ok(())
    }

    async fn end_prompt(&self) -> Result<()> {
        let Some(message_id) = self.prompt.lock().await.take() else {
            return Ok(());
        };
        debug!(channel_id = %self.channel_id, "Disabling action prompt");
        self.channel_id
            .edit_message(
                &self.http,
                message_id,
                serenity::EditMessage::new().components(vec![action_row(false)]),
            )
            .await?;
        Ok(())
    }
}
