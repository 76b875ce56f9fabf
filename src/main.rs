mod commands;
mod config;
mod error;
mod gmail;
mod models;
mod oauth;
mod util;

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{Shell, generate};
use commands::AuthPaths;
use models::Output;
use std::io;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "gmail-spam-cli")]
#[command(version, about = "Empty the Gmail Spam folder", long_about = None)]
struct Cli {
    /// File path to the OAuth client credentials file (default: credentials.json)
    #[arg(short, long, global = true)]
    credentials: Option<PathBuf>,

    /// File path to the cached OAuth token (default: token.json)
    #[arg(short, long, global = true)]
    token: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Permanently delete every message in Spam (default command)
    Purge {
        /// Gmail search query selecting the messages to delete
        #[arg(short, long)]
        query: Option<String>,

        /// Only count matching messages, delete nothing
        #[arg(long)]
        dry_run: bool,
    },

    /// Authorize access and cache the OAuth token
    Auth,

    /// List ids of messages in Spam
    List {
        /// Gmail search query
        #[arg(short, long)]
        query: Option<String>,
    },

    /// Show or set default paths and query
    Config {
        /// Default credentials file
        #[arg(long)]
        credentials_path: Option<PathBuf>,

        /// Default token file
        #[arg(long)]
        token_path: Option<PathBuf>,

        /// Default search query
        #[arg(long)]
        query: Option<String>,
    },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let paths = AuthPaths {
        credentials: cli.credentials.as_deref(),
        token: cli.token.as_deref(),
    };

    let result = match cli.command {
        None => commands::purge(paths, None, false).await,

        Some(Commands::Purge { query, dry_run }) => {
            commands::purge(paths, query.as_deref(), dry_run).await
        }

        Some(Commands::Auth) => commands::auth(paths).await,

        Some(Commands::List { query }) => commands::list_messages(paths, query.as_deref()).await,

        Some(Commands::Config {
            credentials_path,
            token_path,
            query,
        }) => commands::configure(credentials_path, token_path, query),

        Some(Commands::Completions { shell }) => {
            generate(
                shell,
                &mut Cli::command(),
                "gmail-spam-cli",
                &mut io::stdout(),
            );
            return;
        }
    };

    if let Err(e) = result {
        Output::<()>::error(e.to_string()).print();
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_no_subcommand_defaults_to_purge() {
        let cli = Cli::try_parse_from(["gmail-spam-cli", "-c", "creds.json", "-t", "tok.json"]).unwrap();
        assert!(cli.command.is_none());
        assert_eq!(cli.credentials, Some(PathBuf::from("creds.json")));
        assert_eq!(cli.token, Some(PathBuf::from("tok.json")));
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "gmail-spam-cli",
            "purge",
            "--dry-run",
            "--token",
            "cache/token.json",
        ])
        .unwrap();
        assert_eq!(cli.token, Some(PathBuf::from("cache/token.json")));
        assert!(matches!(
            cli.command,
            Some(Commands::Purge { dry_run: true, query: None })
        ));
    }
}
