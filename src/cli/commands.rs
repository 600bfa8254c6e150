use std::sync::Arc;

use crate::app::{AppContext, Result};
use crate::config::sources;
use crate::daemon::{self, Daemon, DaemonConfig};
use crate::fetcher::default_user_agent;
use crate::service::{NewsClient, ScraperNewsClient};
use crate::store::{ArticleRepository, SourceFilter};

pub async fn update_sources(ctx: &AppContext) -> Result<()> {
    let tasks = ctx.update_service.create_tasks();
    if tasks.is_empty() {
        println!("No sources to update");
        return Ok(());
    }

    println!("Running {} update tasks...", tasks.len());
    let stats = ctx.update_service.update_all_sources().await;

    for (source_id, s) in &stats.sources {
        println!(
            "  {:<16} {} fetched, {} new, {} duplicates",
            source_id, s.fetched, s.new, s.duplicates
        );
    }
    for err in &stats.errors {
        eprintln!("  {}", err);
    }

    println!(
        "\nUpdate complete: {} new, {} duplicates, {} errors ({:.2}s)",
        stats.total_new,
        stats.total_duplicates,
        stats.errors.len(),
        stats.elapsed_seconds
    );
    Ok(())
}

pub async fn fetch_source(
    ctx: &AppContext,
    source_id: &str,
    locale: &str,
    category: Option<&str>,
) -> Result<()> {
    let client = ScraperNewsClient::for_source(source_id, ctx.resources.clone())?;
    let result = client.fetch_news(locale, category).await;
    client.close().await;
    let articles = result?;

    if articles.is_empty() {
        println!("No articles found");
        return Ok(());
    }

    for article in &articles {
        println!("{}", article.title());
        println!("  {}", article.url());
        println!(
            "  {} | {}",
            article.pub_date().format("%Y-%m-%d %H:%M"),
            article.author()
        );
        if !article.categories().is_empty() {
            println!("  [{}]", article.categories().join(", "));
        }
        println!();
    }
    println!("{} articles from {} ({})", articles.len(), source_id, locale);
    Ok(())
}

pub async fn check_robots(ctx: &AppContext, url: &str, user_agent: Option<&str>) -> Result<()> {
    let user_agent = user_agent.unwrap_or_else(|| default_user_agent());
    let allowed = ctx.robots().can_fetch(url, Some(user_agent)).await?;
    let crawl_delay = ctx.robots().get_crawl_delay(url);

    println!("URL:         {}", url);
    println!("User-agent:  {}", user_agent);
    println!("Allowed:     {}", if allowed { "yes" } else { "no" });
    println!("Crawl delay: {:.1}s", crawl_delay);
    Ok(())
}

pub fn list_sources() {
    println!(
        "{:<14} {:<22} {:<10} {:<14} LOCALES",
        "ID", "NAME", "KIND", "CATEGORY"
    );
    for source in sources::all() {
        let locales = if source.locales.is_empty() {
            "all".to_string()
        } else {
            source.locales.join(",")
        };
        println!(
            "{:<14} {:<22} {:<10} {:<14} {}",
            source.id,
            source.name,
            source.kind.as_str(),
            source.category.as_str(),
            locales
        );
    }
}

pub fn list_articles(
    ctx: &AppContext,
    limit: usize,
    source_id: Option<String>,
    locale: Option<String>,
) -> Result<()> {
    let filter = SourceFilter { source_id, locale };
    let articles = ctx.store.get_latest(limit, &filter)?;

    if articles.is_empty() {
        println!("No articles. Run 'riftfeed update' first.");
        return Ok(());
    }

    for article in articles {
        println!(
            "{} [{}/{}] {}",
            article.pub_date.format("%Y-%m-%d"),
            article.source_id,
            article.locale,
            article.title
        );
        println!("  {}", article.url);
    }
    println!("\n{} articles stored in total", ctx.store.count()?);
    Ok(())
}

pub async fn run_daemon(ctx: Arc<AppContext>, config: DaemonConfig) -> Result<()> {
    println!(
        "Starting daemon (interval: {})",
        DaemonConfig::format_interval(config.update_interval_secs)
    );
    Daemon::new(ctx, config).run().await
}

pub fn stop_daemon() -> Result<()> {
    let pid = daemon::stop_daemon()?;
    println!("Daemon stopped (PID {})", pid);
    Ok(())
}

pub fn daemon_status() {
    println!("{}", daemon::daemon_status());
}
