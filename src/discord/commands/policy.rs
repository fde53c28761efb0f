// Discord commands for moderation policy configuration.
//
// **Notice the pattern:**
// 1. Extract primitive data from Discord types
// 2. Call core service
// 3. Format the response based on the result
//
// This layer is THIN - no business logic, just translation. Every command
// runs the authorization guard first; an unauthorized invoker gets no reply
// and causes no state change.

use crate::core::moderation::ModerationService;
use crate::core::policy::{GuildPolicy, Mode, PolicyService};
use crate::infra::moderation::{HttpAttachmentFetcher, InferSniffer};
use crate::infra::policy::SqlitePolicyStore;
use poise::serenity_prelude as serenity;
use std::collections::HashSet;

const MEDIA_TYPE_REGISTRY: &str = "https://www.iana.org/assignments/media-types/media-types.xhtml";

/// Role ids held by the command invoker.
async fn invoker_roles(ctx: Context<'_>) -> Vec<u64> {
    match ctx.author_member().await {
        Some(member) => member.roles.iter().map(|r| r.get()).collect(),
        None => Vec::new(),
    }
}

/// Load the guild policy and run the authorization guard.
///
/// `None` means the invoker may not configure this guild; callers return
/// silently so unauthorized users learn nothing.
async fn guarded_policy(ctx: Context<'_>, guild_id: u64) -> Result<Option<GuildPolicy>, Error> {
    let policy = ctx.data().policies.get(guild_id).await?;
    let roles = invoker_roles(ctx).await;
    if !policy.authorizes(&roles) {
        tracing::info!(
            guild_id,
            user_id = ctx.author().id.get(),
            "Ignoring configuration command from unauthorized user"
        );
        return Ok(None);
    }
    Ok(Some(policy))
}

/// Resolve a channel name against the guild cache. Accepts a leading `#`.
fn resolve_channel(ctx: Context<'_>, name: &str) -> Option<(u64, String)> {
    let guild = ctx.guild()?;
    let wanted = name.trim().trim_start_matches('#');
    guild
        .channels
        .values()
        .find(|c| c.name == wanted)
        .map(|c| (c.id.get(), c.name.clone()))
}

/// Resolve a role name against the guild cache.
fn resolve_role(ctx: Context<'_>, name: &str) -> Option<(u64, String)> {
    let guild = ctx.guild()?;
    let wanted = name.trim();
    guild
        .roles
        .values()
        .find(|r| r.name == wanted)
        .map(|r| (r.id.get(), r.name.clone()))
}

fn channel_names(ctx: Context<'_>, ids: &HashSet<u64>) -> Vec<String> {
    let mut names: Vec<String> = match ctx.guild() {
        Some(guild) => ids
            .iter()
            .map(|id| {
                guild
                    .channels
                    .get(&serenity::ChannelId::new(*id))
                    .map(|c| format!("#{}", c.name))
                    .unwrap_or_else(|| format!("<#{}>", id))
            })
            .collect(),
        None => ids.iter().map(|id| format!("<#{}>", id)).collect(),
    };
    names.sort();
    names
}

fn role_names(ctx: Context<'_>, ids: &HashSet<u64>) -> Vec<String> {
    let mut names: Vec<String> = match ctx.guild() {
        Some(guild) => ids
            .iter()
            .map(|id| {
                guild
                    .roles
                    .get(&serenity::RoleId::new(*id))
                    .map(|r| r.name.clone())
                    .unwrap_or_else(|| format!("<@&{}>", id))
            })
            .collect(),
        None => ids.iter().map(|id| format!("<@&{}>", id)).collect(),
    };
    names.sort();
    names
}

// ============================================================================
// /mode
// ============================================================================

/// Show or set the attachment moderation mode for this server.
#[poise::command(slash_command, guild_only)]
pub async fn mode(
    ctx: Context<'_>,
    #[description = "New mode: off, autoflag, or autodelete"] mode: Option<String>,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let Some(policy) = guarded_policy(ctx, guild_id).await? else {
        return Ok(());
    };

    match mode {
        None => {
            ctx.say(format!("Current mode is {}", policy.mode)).await?;
        }
        Some(name) => match Mode::parse(&name) {
            Ok(parsed) => {
                ctx.data()
                    .policies
                    .update(guild_id, |p| p.mode = parsed)
                    .await?;
                ctx.say(format!("Moderation mode set to {}", parsed)).await?;
            }
            Err(err) => {
                tracing::info!(guild_id, "{}", err);
                ctx.say(format!("Invalid mode name: {}", name)).await?;
            }
        },
    }
    Ok(())
}

// ============================================================================
// /ignore
// ============================================================================

/// Manage the channels exempt from attachment inspection.
#[poise::command(
    slash_command,
    guild_only,
    subcommands("ignore_list", "ignore_add", "ignore_remove")
)]
pub async fn ignore(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Show the currently ignored channels.
#[poise::command(slash_command, guild_only, rename = "list")]
pub async fn ignore_list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let Some(policy) = guarded_policy(ctx, guild_id).await? else {
        return Ok(());
    };

    let names = channel_names(ctx, &policy.ignored_channels);
    ctx.say(format!("Currently ignored channels: {:?}", names))
        .await?;
    Ok(())
}

/// Exempt a channel from attachment inspection.
#[poise::command(slash_command, guild_only, rename = "add")]
pub async fn ignore_add(
    ctx: Context<'_>,
    #[description = "Channel name"] channel: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    if guarded_policy(ctx, guild_id).await?.is_none() {
        return Ok(());
    }

    let Some((channel_id, channel_name)) = resolve_channel(ctx, &channel) else {
        tracing::info!(guild_id, channel = %channel, "Unresolvable channel name");
        ctx.say(format!("Invalid channel name: {}", channel)).await?;
        return Ok(());
    };

    let updated = ctx
        .data()
        .policies
        .update(guild_id, |p| {
            p.ignored_channels.insert(channel_id);
        })
        .await?;

    let names = channel_names(ctx, &updated.ignored_channels);
    ctx.say(format!(
        "Channel #{} added to ignore list: {:?}",
        channel_name, names
    ))
    .await?;
    Ok(())
}

/// Resume attachment inspection in a channel.
#[poise::command(slash_command, guild_only, rename = "remove")]
pub async fn ignore_remove(
    ctx: Context<'_>,
    #[description = "Channel name"] channel: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    if guarded_policy(ctx, guild_id).await?.is_none() {
        return Ok(());
    }

    let Some((channel_id, channel_name)) = resolve_channel(ctx, &channel) else {
        tracing::info!(guild_id, channel = %channel, "Unresolvable channel name");
        ctx.say(format!("Invalid channel name: {}", channel)).await?;
        return Ok(());
    };

    let updated = ctx
        .data()
        .policies
        .update(guild_id, |p| {
            p.ignored_channels.remove(&channel_id);
        })
        .await?;

    let names = channel_names(ctx, &updated.ignored_channels);
    ctx.say(format!(
        "Channel #{} removed from ignore list: {:?}",
        channel_name, names
    ))
    .await?;
    Ok(())
}

// ============================================================================
// /roles
// ============================================================================

/// Manage the roles allowed to configure this bot.
#[poise::command(
    slash_command,
    guild_only,
    subcommands("roles_list", "roles_add", "roles_remove")
)]
pub async fn roles(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Show the roles currently allowed to configure this bot.
#[poise::command(slash_command, guild_only, rename = "list")]
pub async fn roles_list(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let Some(policy) = guarded_policy(ctx, guild_id).await? else {
        return Ok(());
    };

    let names = role_names(ctx, &policy.authorized_roles);
    if names.is_empty() {
        ctx.say("No roles configured - anyone can configure the bot.")
            .await?;
    } else {
        ctx.say(format!("Current configuration roles: {:?}", names))
            .await?;
    }
    Ok(())
}

/// Allow a role to configure this bot.
#[poise::command(slash_command, guild_only, rename = "add")]
pub async fn roles_add(
    ctx: Context<'_>,
    #[description = "Role name"] role: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    if guarded_policy(ctx, guild_id).await?.is_none() {
        return Ok(());
    }

    let Some((role_id, role_name)) = resolve_role(ctx, &role) else {
        tracing::info!(guild_id, role = %role, "Unresolvable role name");
        ctx.say(format!("Invalid role name: {}", role)).await?;
        return Ok(());
    };

    let updated = ctx
        .data()
        .policies
        .update(guild_id, |p| {
            p.authorized_roles.insert(role_id);
        })
        .await?;

    let names = role_names(ctx, &updated.authorized_roles);
    ctx.say(format!(
        "Role {} added to role list: {:?}",
        role_name, names
    ))
    .await?;
    Ok(())
}

/// Stop allowing a role to configure this bot.
#[poise::command(slash_command, guild_only, rename = "remove")]
pub async fn roles_remove(
    ctx: Context<'_>,
    #[description = "Role name"] role: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    if guarded_policy(ctx, guild_id).await?.is_none() {
        return Ok(());
    }

    let Some((role_id, role_name)) = resolve_role(ctx, &role) else {
        tracing::info!(guild_id, role = %role, "Unresolvable role name");
        ctx.say(format!("Invalid role name: {}", role)).await?;
        return Ok(());
    };

    let updated = ctx
        .data()
        .policies
        .update(guild_id, |p| {
            p.authorized_roles.remove(&role_id);
        })
        .await?;

    let names = role_names(ctx, &updated.authorized_roles);
    ctx.say(format!(
        "Role {} removed from role list: {:?}",
        role_name, names
    ))
    .await?;
    Ok(())
}

// ============================================================================
// /types
// ============================================================================

/// Manage the content-type patterns approved for attachments.
#[poise::command(
    slash_command,
    guild_only,
    subcommands("types_info", "types_add", "types_remove")
)]
pub async fn types(_ctx: Context<'_>) -> Result<(), Error> {
    Ok(())
}

/// Show the approved content-type patterns.
#[poise::command(slash_command, guild_only, rename = "info")]
pub async fn types_info(ctx: Context<'_>) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    let Some(policy) = guarded_policy(ctx, guild_id).await? else {
        return Ok(());
    };

    ctx.say(format!(
        "Approved content-type patterns: {:?}\nSee {} for registered media types.",
        policy.allowed_patterns, MEDIA_TYPE_REGISTRY
    ))
    .await?;
    Ok(())
}

/// Approve a content-type pattern, e.g. `image/*` or `application/pdf`.
#[poise::command(slash_command, guild_only, rename = "add")]
pub async fn types_add(
    ctx: Context<'_>,
    #[description = "Pattern such as image/* or application/pdf"] pattern: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    if guarded_policy(ctx, guild_id).await?.is_none() {
        return Ok(());
    }

    let pattern = pattern.trim().to_ascii_lowercase();
    let updated = ctx
        .data()
        .policies
        .update(guild_id, |p| {
            if !p.allowed_patterns.contains(&pattern) {
                p.allowed_patterns.push(pattern.clone());
            }
        })
        .await?;

    ctx.say(format!(
        "Pattern {} added. Approved patterns: {:?}",
        pattern, updated.allowed_patterns
    ))
    .await?;
    Ok(())
}

/// Remove a content-type pattern. Removing the last pattern rejects
/// every attachment.
#[poise::command(slash_command, guild_only, rename = "remove")]
pub async fn types_remove(
    ctx: Context<'_>,
    #[description = "Pattern to remove"] pattern: String,
) -> Result<(), Error> {
    let guild_id = ctx.guild_id().ok_or("Must be in a guild")?.get();
    if guarded_policy(ctx, guild_id).await?.is_none() {
        return Ok(());
    }

    let pattern = pattern.trim().to_ascii_lowercase();
    let updated = ctx
        .data()
        .policies
        .update(guild_id, |p| {
            p.allowed_patterns.retain(|existing| existing != &pattern);
        })
        .await?;

    ctx.say(format!(
        "Pattern {} removed. Approved patterns: {:?}",
        pattern, updated.allowed_patterns
    ))
    .await?;
    Ok(())
}

/// Type alias for our bot's context.
/// This is what every command receives as its first parameter.
pub type Error = Box<dyn std::error::Error + Send + Sync>;
pub type Context<'a> = poise::Context<'a, Data, Error>;

/// Data that's shared across all commands.
/// This is where we store our services.
use std::sync::Arc;

pub struct Data {
    pub policies: Arc<PolicyService<SqlitePolicyStore>>,
    pub moderation:
        Arc<ModerationService<SqlitePolicyStore, HttpAttachmentFetcher, InferSniffer>>,
}
