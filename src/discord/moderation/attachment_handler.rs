// Discord-specific attachment handling - bridges gateway messages into the
// core moderation pipeline and translates its verdicts into Discord actions.

use crate::core::moderation::{
    ActionError, AttachmentRef, MessageActions, MessageEvent, MessageRef, ReactionMarker,
};
use crate::discord::{Data, Error};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;

const APPROVED_MARKER: char = '\u{2705}'; // white heavy check mark
const REJECTED_MARKER: char = '\u{274C}'; // cross mark

/// Run the moderation pipeline for an inbound gateway message.
pub async fn handle_message_attachments(
    ctx: &serenity::Context,
    msg: &serenity::Message,
    data: &Data,
) -> Result<(), Error> {
    // Only guild messages carry a policy.
    let guild_id = match msg.guild_id {
        Some(id) => id.get(),
        None => return Ok(()),
    };

    let bot_id = ctx.cache.current_user().id;

    let event = MessageEvent {
        guild_id,
        channel_id: msg.channel_id.get(),
        message_id: msg.id.get(),
        from_self: msg.author.id == bot_id,
        attachments: msg
            .attachments
            .iter()
            .map(|a| AttachmentRef {
                filename: a.filename.clone(),
                url: a.url.clone(),
            })
            .collect(),
    };

    let actions = SerenityActions { http: &ctx.http };
    data.moderation.handle_message(&event, &actions).await?;
    Ok(())
}

/// `MessageActions` sink backed by the serenity HTTP client.
struct SerenityActions<'a> {
    http: &'a serenity::Http,
}

fn platform_error(err: serenity::Error) -> ActionError {
    ActionError::Platform(err.to_string())
}

#[async_trait]
impl MessageActions for SerenityActions<'_> {
    async fn react(&self, msg: MessageRef, marker: ReactionMarker) -> Result<(), ActionError> {
        let emoji = match marker {
            ReactionMarker::Approved => APPROVED_MARKER,
            ReactionMarker::Rejected => REJECTED_MARKER,
        };
        self.http
            .create_reaction(
                serenity::ChannelId::new(msg.channel_id),
                serenity::MessageId::new(msg.message_id),
                &serenity::ReactionType::Unicode(emoji.to_string()),
            )
            .await
            .map_err(platform_error)
    }

    async fn delete_with_notice(
        &self,
        msg: MessageRef,
        filename: &str,
    ) -> Result<(), ActionError> {
        let channel_id = serenity::ChannelId::new(msg.channel_id);
        self.http
            .delete_message(
                channel_id,
                serenity::MessageId::new(msg.message_id),
                Some("Disapproved attachment content type"),
            )
            .await
            .map_err(platform_error)?;

        let notice = format!(
            "Message removed for potentially dangerous attachment: {}",
            filename
        );
        if let Err(e) = channel_id.say(self.http, notice).await {
            // The delete already happened; a lost notice is not fatal.
            tracing::warn!("Failed to send removal notice: {}", e);
        }
        Ok(())
    }
}
