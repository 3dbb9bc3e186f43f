mod config;
mod events;

use std::sync::Arc;
use std::time::Duration;

use poise::serenity_prelude as serenity;
use tracing::{debug, error, info, warn};
use tracing_subscriber::Layer;
use tracing_subscriber::filter::filter_fn;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use rustls::crypto::ring::default_provider;
use sqlx::postgres::PgPoolOptions;

use warden_commands::{ModlogChannelAuditSink, SerenityPlatform};
use warden_core::audit::{AuditSink, FanoutAuditSink, TracingAuditSink};
use warden_core::guild::GuildRegistry;
use warden_core::scheduler::{NoopSanctionStore, SanctionStore};
use warden_core::{Data, Error, Moderator, UserId};
use warden_database::{Database, MIGRATOR, PgAuditSink, PgSanctionStore};

use crate::config::BotConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let fmt_layer = tracing_subscriber::fmt::layer().with_filter(filter_fn(|metadata| {
        let target = metadata.target();

        let within_info_level = *metadata.level() <= tracing::Level::INFO;
        if !within_info_level {
            return false;
        }

        !(target.starts_with("serenity::gateway::bridge::shard_manager")
            || target.starts_with("serenity::gateway::bridge::shard_runner"))
    }));

    tracing_subscriber::registry().with(fmt_layer).init();

    default_provider()
        .install_default()
        .map_err(|_| anyhow::anyhow!("failed to install rustls ring provider"))?;

    dotenvy::dotenv().ok();

    let config = BotConfig::from_env()?;

    let db = match config.database_url.as_deref() {
        Some(database_url) => {
            let pool = PgPoolOptions::new()
                .max_connections(5)
                .connect(database_url)
                .await?;
            info!("PostgreSQL connection established.");
            Some(Database::new(pool))
        }
        None => {
            warn!("DATABASE_URL is not set; cases and pending sanctions will not survive a restart.");
            None
        }
    };

    if let Some(db) = &db {
        if config.auto_run_migrations {
            MIGRATOR.run(db.pool()).await?;
            info!("Database migrations applied.");
        } else {
            info!("Auto migrations disabled (set AUTO_RUN_MIGRATIONS=true to run at startup).");
        }
    }

    let intents = serenity::GatewayIntents::GUILDS
        | serenity::GatewayIntents::GUILD_MESSAGES
        | serenity::GatewayIntents::MESSAGE_CONTENT;

    let token = config.token.clone();
    let framework = poise::Framework::builder()
        .options(poise::FrameworkOptions {
            commands: warden_commands::commands(),
            event_handler: |ctx, event, framework, data| {
                Box::pin(handle_event(ctx, event, framework, data))
            },
            on_error: |error| Box::pin(on_error(error)),
            prefix_options: poise::PrefixFrameworkOptions {
                prefix: Some(warden_utils::COMMAND_PREFIX.to_string()),
                mention_as_prefix: false,
                ..Default::default()
            },
            ..Default::default()
        })
        .setup(move |ctx, ready, framework| {
            Box::pin(async move {
                info!(bot_user = %ready.user.name, "Warden is online.");

                let moderator = Arc::new(build_moderator(&config, db, ctx, ready.user.id));

                match moderator.restore_sanctions().await {
                    Ok(0) => debug!("no pending sanctions to restore"),
                    Ok(restored) => info!(restored, "Pending sanctions restored."),
                    Err(source) => error!(?source, "failed to restore pending sanctions"),
                }

                spawn_rate_window_sweeper(moderator.registry().clone(), config.sweep_interval);

                match config.guild_id {
                    Some(guild_id) => {
                        poise::builtins::register_in_guild(
                            ctx,
                            &framework.options().commands,
                            serenity::GuildId::new(guild_id),
                        )
                        .await?;
                    }
                    None => {
                        poise::builtins::register_globally(ctx, &framework.options().commands)
                            .await?;
                    }
                }

                Ok(Data { moderator })
            })
        })
        .build();

    info!("Warden is connecting...");

    let mut client = serenity::ClientBuilder::new(token, intents)
        .framework(framework)
        .await?;

    client.start().await?;
    Ok(())
}

fn build_moderator(
    config: &BotConfig,
    db: Option<Database>,
    ctx: &serenity::Context,
    bot_user: serenity::UserId,
) -> Moderator {
    let platform = Arc::new(SerenityPlatform::new(ctx.http.clone()));

    let mut audit = FanoutAuditSink::default();
    audit.push(Arc::new(TracingAuditSink));
    if config.modlog_enabled {
        audit.push(Arc::new(ModlogChannelAuditSink::new(
            ctx.http.clone(),
            config.modlog_channel_name.clone(),
        )));
    }
    if let Some(db) = &db {
        audit.push(Arc::new(PgAuditSink::new(db.clone())));
    }
    info!(sinks = audit.len(), "Audit sinks configured.");

    let store: Arc<dyn SanctionStore> = match db {
        Some(db) => Arc::new(PgSanctionStore::new(db)),
        None => Arc::new(NoopSanctionStore),
    };
    let audit: Arc<dyn AuditSink> = Arc::new(audit);

    Moderator::new(
        config.policy.clone(),
        platform,
        audit,
        store,
        UserId::new(bot_user.get()),
    )
}

fn spawn_rate_window_sweeper(registry: GuildRegistry, every: Duration) {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let dropped = registry.sweep_rate_windows(chrono::Utc::now());
            if dropped > 0 {
                debug!(dropped, "swept idle rate windows");
            }
        }
    });
}

async fn on_error(error: poise::FrameworkError<'_, Data, Error>) {
    match error {
        poise::FrameworkError::Command { error, ctx, .. } => {
            error!(?error, command = %ctx.command().qualified_name, "command error");

            let embed = serenity::CreateEmbed::new()
                .title("Command Error")
                .description("Something went wrong while running this command.")
                .color(warden_utils::embed::DEFAULT_EMBED_COLOR);

            let _ = ctx
                .send(poise::CreateReply::default().ephemeral(true).embed(embed))
                .await;
        }
        poise::FrameworkError::ArgumentParse { ctx, input, .. } => {
            let usage = format!("Usage: `!{}`", ctx.command().qualified_name);
            let description = if let Some(input) = input {
                format!("Invalid argument: `{}`\n{}", input, usage)
            } else {
                format!("Missing required argument.\n{}", usage)
            };

            let _ = ctx.say(description).await;
        }
        poise::FrameworkError::UnknownCommand {
            ctx,
            msg,
            msg_content,
            framework,
            ..
        } => {
            events::unknown_command::handle_unknown_command(
                ctx,
                framework.user_data,
                msg,
                msg_content,
            )
            .await;
        }
        other => {
            error!(?other, "framework error");
        }
    }
}

async fn handle_event(
    _ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    if let serenity::FullEvent::Message { new_message } = event {
        events::spam::handle_message_spam(data, new_message).await;
    }

    Ok(())
}
