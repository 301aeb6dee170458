mod handler;

use {
    anyhow::Context as _,
    clap::Parser,
    mirrorbot_bridge::{InboundMirror, Ingester, OutboundMirror},
    mirrorbot_contentapi::ContentApiClient,
    mirrorbot_discord::DiscordClient,
    mirrorbot_markup::MarkupClient,
    mirrorbot_store::BindingStore,
    secrecy::Secret,
    std::{path::PathBuf, sync::Arc},
    tracing::{error, info},
    tracing_subscriber::EnvFilter,
};

use crate::handler::BridgeHandler;

#[derive(Parser)]
#[command(name = "mirrorbot", about = "Mirrors messages between a contentapi room and Discord channels")]
struct Cli {
    /// contentapi instance domain, e.g. `qcs.shsbs.xyz`.
    #[arg(long, env = "CONTENTAPI_DOMAIN")]
    contentapi_domain: String,

    /// contentapi API token.
    #[arg(long, env = "CONTENTAPI_TOKEN", hide_env_values = true)]
    contentapi_token: String,

    /// Discord bot token.
    #[arg(long, env = "DISCORD_TOKEN", hide_env_values = true)]
    discord_token: String,

    /// Markup translation service domain.
    #[arg(long, env = "MARKUP_DOMAIN")]
    markup_domain: String,

    /// Path of the SQLite bookkeeping database.
    #[arg(long, env = "MIRRORBOT_DB", default_value = "mirrorbot.db")]
    database: PathBuf,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cli.log_level).context("invalid log level")?,
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let pool = mirrorbot_store::open(&cli.database)
        .await
        .context("opening bridge database")?;
    mirrorbot_store::init(&pool).await?;

    let contentapi =
        ContentApiClient::for_domain(&cli.contentapi_domain, Secret::new(cli.contentapi_token))?;
    let markup = MarkupClient::for_domain(&cli.markup_domain)?;
    let discord = DiscordClient::new(Secret::new(cli.discord_token.clone()));

    let outbound = Arc::new(OutboundMirror::new(
        pool.clone(),
        contentapi.clone(),
        discord,
        markup.clone(),
    ));
    let ingester = Ingester::new(
        contentapi.live_socket_url()?,
        contentapi.clone(),
        outbound,
    );
    tokio::spawn(async move {
        // The first connection failing means the token or domain is wrong;
        // there is nothing to retry into.
        if let Err(err) = ingester.run().await {
            error!(error = %err, "could not establish the live stream");
            std::process::exit(1);
        }
    });

    let inbound = Arc::new(InboundMirror::new(pool.clone(), contentapi, markup));
    let handler = BridgeHandler::new(BindingStore::new(pool), inbound);
    let mut client = serenity::Client::builder(&cli.discord_token, BridgeHandler::intents())
        .event_handler(handler)
        .await
        .context("building discord client")?;

    tokio::select! {
        result = client.start() => result.context("discord gateway session ended")?,
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }
    Ok(())
}
