pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "riftfeed")]
#[command(about = "League of Legends news aggregator", long_about = None)]
pub struct Cli {
    /// Path to an alternative config file
    #[arg(long, global = true)]
    pub config: Option<std::path::PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Fetch every configured source and save new articles
    Update {
        /// Restrict to these locales (repeatable)
        #[arg(short, long = "locale")]
        locales: Vec<String>,

        /// Restrict to these source ids (repeatable)
        #[arg(short, long = "source")]
        sources: Vec<String>,
    },
    /// Fetch one source and print its articles without saving
    Fetch {
        /// Source id, see `riftfeed sources`
        source: String,

        #[arg(short, long, default_value = "en-us")]
        locale: String,

        /// News category slug (official sources only)
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Check whether robots.txt allows fetching a URL
    Robots {
        url: String,

        /// User-agent to evaluate (default: the crawler's own)
        #[arg(short, long)]
        user_agent: Option<String>,
    },
    /// List the registered sources
    Sources,
    /// List the latest saved articles
    List {
        /// Maximum number of articles
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        #[arg(short, long)]
        source: Option<String>,

        #[arg(short, long)]
        locale: Option<String>,
    },
    /// Background daemon for periodic updates
    Daemon {
        /// Update interval (e.g., "5m", "1h", "1d"); defaults to `update.interval`
        #[arg(short, long)]
        interval: Option<String>,

        /// Skip initial update on start
        #[arg(long)]
        no_initial_update: bool,

        #[command(subcommand)]
        action: Option<DaemonAction>,
    },
}

#[derive(Subcommand)]
pub enum DaemonAction {
    /// Stop the running daemon
    Stop,
    /// Check daemon status
    Status,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_repeatable_filters() {
        let cli = Cli::parse_from([
            "riftfeed", "update", "-l", "en-us", "-l", "ko-kr", "-s", "lol",
        ]);
        match cli.command {
            Commands::Update { locales, sources } => {
                assert_eq!(locales, vec!["en-us", "ko-kr"]);
                assert_eq!(sources, vec!["lol"]);
            }
            _ => panic!("expected update"),
        }
    }

    #[test]
    fn test_fetch_defaults() {
        let cli = Cli::parse_from(["riftfeed", "fetch", "dexerto"]);
        match cli.command {
            Commands::Fetch {
                source,
                locale,
                category,
            } => {
                assert_eq!(source, "dexerto");
                assert_eq!(locale, "en-us");
                assert!(category.is_none());
            }
            _ => panic!("expected fetch"),
        }
    }

    #[test]
    fn test_daemon_forms() {
        let cli = Cli::parse_from(["riftfeed", "daemon", "-i", "5m"]);
        assert!(matches!(
            cli.command,
            Commands::Daemon { interval: Some(ref i), action: None, .. } if i == "5m"
        ));

        let cli = Cli::parse_from(["riftfeed", "daemon", "stop"]);
        assert!(matches!(
            cli.command,
            Commands::Daemon {
                action: Some(DaemonAction::Stop),
                ..
            }
        ));
    }
}
