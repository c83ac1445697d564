//! Button and modal handlers for running battles.
//!
//! Every reply is ephemeral: the shared battle messages are only changed by the
//! battle itself through its messaging surface.

use crate::{
    bot::{
        BotData,
        surface::{
            ACCEPT_ID, ATTACK_ID, DENY_ID, SLEEP_ID, TARGET_INPUT_ID, TARGET_MODAL_ID,
            target_modal,
        },
    },
    core::{
        battle::{Battle, ConfirmOutcome, Confirmation},
        turn::ActionRequest,
    },
    errors::{Error, ErrorKind, Result},
};
use poise::serenity_prelude as serenity;
use std::sync::Arc;
use tracing::{debug, error};

const CUSTOM_ID_PREFIX: &str = "battle:";

enum ComponentReply {
    Message(String),
    TargetModal,
}

/// Routes gateway events to the battle handlers.
pub async fn handle_event(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    data: &BotData,
) -> Result<()> {
    let serenity::FullEvent::InteractionCreate { interaction } = event else {
        return Ok(());
    };

    match interaction {
        serenity::Interaction::Component(component)
            if component.data.custom_id.starts_with(CUSTOM_ID_PREFIX) =>
        {
            handle_component(ctx, component, data).await
        }
        serenity::Interaction::Modal(modal) if modal.data.custom_id == TARGET_MODAL_ID => {
            handle_target_modal(ctx, modal, data).await
        }
        _ => Ok(()),
    }
}

fn ephemeral(content: impl Into<String>) -> serenity::CreateInteractionResponse {
    serenity::CreateInteractionResponse::Message(
        serenity::CreateInteractionResponseMessage::new()
            .content(content)
            .ephemeral(true),
    )
}

/// Text shown to the user for a failed interaction.
#[must_use]
pub fn describe_error(error: &Error) -> String {
    match error.kind() {
        ErrorKind::TargetNotFound => format!("{error} Click Attack to try again."),
        ErrorKind::Internal => {
            error!("Battle interaction failed: {:?}", error);
            "An internal error occurred, please try again later.".to_string()
        }
        _ => error.to_string(),
    }
}

async fn find_battle(
    data: &BotData,
    guild_id: Option<serenity::GuildId>,
    channel_id: serenity::ChannelId,
    user_id: u64,
) -> Result<Arc<Battle>> {
    let guild_id = guild_id.ok_or(Error::NoActiveBattle)?;
    data.battles
        .lookup(guild_id.get(), channel_id.get(), user_id)
        .await
        .ok_or(Error::NoActiveBattle)
}

async fn handle_component(
    ctx: &serenity::Context,
    component: &serenity::ComponentInteraction,
    data: &BotData,
) -> Result<()> {
    let user_id = component.user.id.get();
    let custom_id = component.data.custom_id.as_str();
    debug!(user_id, custom_id, "Battle button clicked");

    let result = match find_battle(data, component.guild_id, component.channel_id, user_id).await {
        Ok(battle) => run_component(&battle, custom_id, user_id).await,
        Err(e) => Err(e),
    };

    let response = match result {
        Ok(ComponentReply::Message(text)) => ephemeral(text),
        Ok(ComponentReply::TargetModal) => {
            serenity::CreateInteractionResponse::Modal(target_modal())
        }
        Err(e) => ephemeral(describe_error(&e)),
    };
    component.create_response(&ctx.http, response).await?;
    Ok(())
}

async fn run_component(
    battle: &Arc<Battle>,
    custom_id: &str,
    user_id: u64,
) -> Result<ComponentReply> {
    let text = match custom_id {
        ACCEPT_ID => match battle.submit_confirmation(user_id, Confirmation::Accept).await? {
            ConfirmOutcome::Started => "Both teams are ready, let the battle begin!",
            ConfirmOutcome::Waiting => "Done! Waiting for the other player to accept.",
            ConfirmOutcome::Cancelled => "The battle was cancelled.",
        },
        DENY_ID => {
            battle.submit_confirmation(user_id, Confirmation::Deny).await?;
            "You cancelled the battle."
        }
        ATTACK_ID => {
            if battle.needs_target(user_id).await? {
                return Ok(ComponentReply::TargetModal);
            }
            battle
                .submit_action(user_id, ActionRequest::Attack { target: None })
                .await?;
            "Attacking!"
        }
        SLEEP_ID => {
            battle.submit_action(user_id, ActionRequest::Sleep).await?;
            "Sleeping..."
        }
        _ => "This button is no longer supported.",
    };
    Ok(ComponentReply::Message(text.to_string()))
}

/// Text typed in the target modal, if any.
fn typed_target(modal: &serenity::ModalInteraction) -> Option<String> {
    modal
        .data
        .components
        .iter()
        .flat_map(|row| row.components.iter())
        .find_map(|component| match component {
            serenity::ActionRowComponent::InputText(input)
                if input.custom_id == TARGET_INPUT_ID =>
            {
                input.value.clone()
            }
            _ => None,
        })
}

async fn handle_target_modal(
    ctx: &serenity::Context,
    modal: &serenity::ModalInteraction,
    data: &BotData,
) -> Result<()> {
    let user_id = modal.user.id.get();
    let target = typed_target(modal);
    debug!(user_id, ?target, "Attack target submitted");

    let result = match find_battle(data, modal.guild_id, modal.channel_id, user_id).await {
        Ok(battle) => battle
            .submit_action(user_id, ActionRequest::Attack { target })
            .await
            .map(|_| ()),
        Err(e) => Err(e),
    };

    let text = match result {
        Ok(()) => "Attacking!".to_string(),
        Err(e) => describe_error(&e),
    };
    modal.create_response(&ctx.http, ephemeral(text)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_describe_error_hides_internal_details() {
        let internal = Error::Config {
            message: "secret path".to_string(),
        };
        assert!(!describe_error(&internal).contains("secret"));

        let not_found = Error::TargetNotFound {
            query: "peru".to_string(),
        };
        assert_eq!(
            describe_error(&not_found),
            "No opposing unit matches 'peru'. Click Attack to try again."
        );
        assert_eq!(describe_error(&Error::NotYourTurn), "This action is not for you.");
    }
}
