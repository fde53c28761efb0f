// This is the entry point of the attachment moderation bot.
//
// **Architecture Overview:**
// - `core/` = Business logic (platform-agnostic)
// - `infra/` = Implementations of core traits (database, HTTP, sniffing)
// - `discord/` = Discord-specific adapters (commands, events)
//
// This file's job is to:
// 1. Load configuration
// 2. Initialize services (dependency injection)
// 3. Set up the Discord framework
// 4. Register commands and event handlers

// These attrs point each module declaration at a more descriptive root file
// so we don't end up with half a dozen mod.rs files that all look the same.
#[path = "core/core_layer.rs"]
mod core;
#[path = "discord/discord_layer.rs"]
mod discord;
#[path = "infra/infra_layer.rs"]
mod infra;

use crate::core::moderation::ModerationService;
use crate::core::policy::PolicyService;
use crate::discord::{Data, Error};
use crate::infra::moderation::{HttpAttachmentFetcher, InferSniffer};
use crate::infra::policy::SqlitePolicyStore;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Event handler for non-command Discord events.
/// This is where inbound messages enter the moderation pipeline.
async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    match event {
        serenity::FullEvent::Ready { data_about_bot } => {
            tracing::info!("{} has connected to Discord!", data_about_bot.user.name);
        }
        serenity::FullEvent::Message { new_message } => {
            // No recovery beyond the next event: report and move on.
            if let Err(e) =
                discord::moderation::handle_message_attachments(ctx, new_message, data).await
            {
                tracing::error!("Error moderating message attachments: {}", e);
            }
        }
        _ => {}
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Initialize logging so we can see what's happening
    tracing_subscriber::fmt::init();

    // Load environment variables from .env file (if it exists)
    dotenv::dotenv().ok();

    // Get Discord bot token from environment
    let token = std::env::var("DISCORD_TOKEN").expect(
        "Missing DISCORD_TOKEN environment variable! Create a .env file with your bot token.",
    );

    // Keep runtime databases in a dedicated folder so the repo root stays tidy.
    let db_path = std::env::var("FILEMOD_DB").unwrap_or_else(|_| {
        std::fs::create_dir_all("data").expect("Failed to create data directory");
        "data/policies.db".to_string()
    });

    // ========================================================================
    // DEPENDENCY INJECTION
    // ========================================================================
    // Create our services with their dependencies.
    // This is the "composition root" where we wire everything together.

    let pool = sqlx::sqlite::SqlitePoolOptions::new()
        .connect(&format!("sqlite://{}?mode=rwc", db_path))
        .await
        .expect("Failed to connect to policy DB");
    let policy_store = SqlitePolicyStore::new(pool);
    policy_store
        .migrate()
        .await
        .expect("Failed to migrate policy DB");

    let policies = Arc::new(PolicyService::new(policy_store));

    let fetcher = HttpAttachmentFetcher::new().expect("Failed to create attachment fetcher");
    let moderation = Arc::new(ModerationService::new(
        Arc::clone(&policies),
        fetcher,
        InferSniffer,
    ));

    // Create the data structure that will be shared across all commands
    let data = Data {
        policies: Arc::clone(&policies),
        moderation: Arc::clone(&moderation),
    };

    // ========================================================================
    // DISCORD FRAMEWORK SETUP
    // ========================================================================
    // Configure the poise framework with our commands and settings.

    let intents = serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT // Required to see attachments
        | serenity::GatewayIntents::GUILDS;

    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            // Register all our commands here
            commands: vec![
                discord::commands::policy::mode(),
                discord::commands::policy::ignore(),
                discord::commands::policy::roles(),
                discord::commands::policy::types(),
            ],
            // Event handler for messages and other events
            event_handler: |ctx, event, framework, data| {
                Box::pin(event_handler(ctx, event, framework, data))
            },
            ..Default::default()
        })
        .setup(|ctx, _ready, framework| {
            Box::pin(async move {
                // Register slash commands globally (can take up to an hour to
                // propagate). For faster development, use register_in_guild.
                poise::builtins::register_globally(ctx, &framework.options().commands).await?;

                tracing::info!("Commands registered, bot is ready");
                Ok(data)
            })
        })
        .build();

    // Create the client and start the bot
    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await
        .expect("Error creating client");

    client.start().await.expect("Error running bot");
}
