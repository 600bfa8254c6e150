use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use riftfeed::app::AppContext;
use riftfeed::cli::{commands, Cli, Commands, DaemonAction};
use riftfeed::config::Config;
use riftfeed::daemon::DaemonConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("riftfeed=info")))
        .init();

    let cli = Cli::parse();

    // Daemon control never needs the database
    if let Commands::Daemon {
        action: Some(action),
        ..
    } = &cli.command
    {
        match action {
            DaemonAction::Stop => commands::stop_daemon()?,
            DaemonAction::Status => commands::daemon_status(),
        }
        return Ok(());
    }
    if let Commands::Sources = cli.command {
        commands::list_sources();
        return Ok(());
    }

    let mut config = match &cli.config {
        Some(path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    if let Commands::Update { locales, sources } = &cli.command {
        if !locales.is_empty() {
            config.update.locales = locales.clone();
        }
        if !sources.is_empty() {
            config.update.sources = sources.clone();
        }
    }

    let ctx = Arc::new(AppContext::new(config)?);

    let result = match cli.command {
        Commands::Update { .. } => commands::update_sources(&ctx).await,
        Commands::Fetch {
            source,
            locale,
            category,
        } => commands::fetch_source(&ctx, &source, &locale, category.as_deref()).await,
        Commands::Robots { url, user_agent } => {
            commands::check_robots(&ctx, &url, user_agent.as_deref()).await
        }
        Commands::List {
            limit,
            source,
            locale,
        } => commands::list_articles(&ctx, limit, source, locale),
        Commands::Daemon {
            interval,
            no_initial_update,
            ..
        } => {
            let interval = interval.unwrap_or_else(|| ctx.config.update.interval.clone());
            let update_interval_secs =
                DaemonConfig::parse_interval(&interval).map_err(anyhow::Error::msg)?;
            let config = DaemonConfig {
                update_interval_secs,
                update_on_start: !no_initial_update,
            };
            commands::run_daemon(ctx.clone(), config).await
        }
        Commands::Sources => Ok(()),
    };

    ctx.shutdown().await;
    result?;

    Ok(())
}
