mod config;
mod render;

use std::{path::PathBuf, sync::Arc};

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use glucose_core::{FailureReply, Pipeline, PipelineConfig};
use nightscout::{NightscoutClient, NightscoutConfig};
use shared::{
    display::DisplayOptions,
    domain::{ChannelId, ChannelKind, GuildId, Identity, RequestContext, UserId},
};
use storage::Storage;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::{
    config::{load_settings, normalize_database_url},
    render::{parse_mentions, render_model},
};

#[derive(Parser, Debug)]
#[command(name = "bgtool", about = "Manage glucose endpoints and run lookups")]
struct Cli {
    /// Overrides the configured database url.
    #[arg(long)]
    database_url: Option<String>,
    #[arg(long)]
    config: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    CreateUser {
        username: String,
        #[arg(long)]
        display_name: Option<String>,
        #[arg(long)]
        avatar_url: Option<String>,
    },
    JoinGuild {
        user_id: i64,
        guild_id: i64,
        #[arg(long)]
        nickname: Option<String>,
    },
    SetEndpoint {
        user_id: i64,
        url: String,
        #[arg(long)]
        token: Option<String>,
        /// Comma separated, e.g. `title,trend,cob,iob,avatar,simple`.
        #[arg(long)]
        display: Option<String>,
    },
    SetVisibility {
        user_id: i64,
        guild_id: i64,
        #[arg(action = clap::ArgAction::Set)]
        visible: bool,
    },
    SetShort {
        channel_id: i64,
        #[arg(action = clap::ArgAction::Set)]
        short: bool,
    },
    Query {
        #[arg(long)]
        invoker: i64,
        #[arg(long)]
        guild: i64,
        #[arg(long)]
        channel: i64,
        #[arg(long)]
        voice: bool,
        #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
        args: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(database_url) = cli.database_url {
        settings.database_url = database_url;
    }

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_new(&settings.log_filter).unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let database_url = normalize_database_url(&settings.database_url);
    let storage = Storage::new(&database_url).await?;
    storage.health_check().await?;
    info!(database_url = %database_url, "bgtool: storage ready");

    match cli.command {
        Command::CreateUser {
            username,
            display_name,
            avatar_url,
        } => {
            let user_id = storage.create_user(&username).await?;
            if display_name.is_some() || avatar_url.is_some() {
                storage
                    .set_profile(user_id, display_name.as_deref(), avatar_url.as_deref())
                    .await?;
            }
            println!("created user_id={}", user_id.0);
        }
        Command::JoinGuild {
            user_id,
            guild_id,
            nickname,
        } => {
            storage
                .add_membership(GuildId(guild_id), UserId(user_id), nickname.as_deref())
                .await?;
            println!("user_id={user_id} joined guild_id={guild_id}");
        }
        Command::SetEndpoint {
            user_id,
            url,
            token,
            display,
        } => {
            let stored = storage
                .set_endpoint(UserId(user_id), &url, token.as_deref())
                .await?;
            if let Some(display) = display {
                let options = DisplayOptions::parse_list(&display).map_err(|e| anyhow!(e))?;
                storage.set_display_options(UserId(user_id), &options).await?;
            }
            println!("user_id={user_id} endpoint={stored}");
        }
        Command::SetVisibility {
            user_id,
            guild_id,
            visible,
        } => {
            storage
                .set_visibility(UserId(user_id), GuildId(guild_id), visible)
                .await?;
            println!("user_id={user_id} guild_id={guild_id} visible={visible}");
        }
        Command::SetShort { channel_id, short } => {
            storage.set_short_display(ChannelId(channel_id), short).await?;
            println!("channel_id={channel_id} short={short}");
        }
        Command::Query {
            invoker,
            guild,
            channel,
            voice,
            args,
        } => {
            let ctx = build_context(&storage, invoker, guild, channel, voice, args).await?;
            let storage = Arc::new(storage);
            let remote = NightscoutClient::new(NightscoutConfig {
                timeout: settings.fetch_timeout()?,
            })?;
            let pipeline = Pipeline::new(
                storage.clone(),
                storage,
                Arc::new(remote),
                PipelineConfig {
                    stale_after: settings.stale_after()?,
                },
            );

            match pipeline.respond(&ctx).await {
                Ok(response) => {
                    println!("{}", render_model(&response.model, &response.triggers));
                }
                Err(FailureReply::Message(message)) => println!("{message}"),
                Err(FailureReply::Acknowledge) => println!("(x)"),
            }
        }
    }

    Ok(())
}

async fn build_context(
    storage: &Storage,
    invoker: i64,
    guild: i64,
    channel: i64,
    voice: bool,
    args: Vec<String>,
) -> Result<RequestContext> {
    let invoker = known_user(storage, UserId(invoker)).await?;
    let parsed = parse_mentions(args);

    let mut mentions = Vec::with_capacity(parsed.mention_ids.len());
    for id in parsed.mention_ids {
        mentions.push(known_user(storage, id).await?);
    }
    let kind = if voice {
        ChannelKind::Voice
    } else {
        ChannelKind::Text
    };
    let mut ctx = RequestContext::new(invoker, GuildId(guild), ChannelId(channel))
        .with_args(parsed.rest)
        .with_mentions(mentions)
        .with_channel_kind(kind);
    if parsed.mentions_everyone {
        ctx = ctx.with_everyone();
    }
    Ok(ctx)
}

async fn known_user(storage: &Storage, user_id: UserId) -> Result<Identity> {
    storage
        .identity(user_id)
        .await?
        .with_context(|| format!("unknown user_id={}", user_id.0))
}
