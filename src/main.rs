mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use evna::config::EvnaConfig;
use evna::server;

#[derive(Parser)]
#[command(name = "evna", version, about = "Context fusion MCP server for AI agents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Start the MCP server (stdio transport)
    Serve,
    /// Capture a message into active context
    Capture {
        /// Conversation id
        #[arg(long)]
        conversation: String,
        /// user, assistant or system
        #[arg(long, default_value = "user")]
        role: String,
        /// claude_code or desktop
        #[arg(long)]
        client: Option<String>,
        /// Message text; may contain key::value annotations
        content: String,
    },
    /// Show recent active context
    Context {
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        project: Option<String>,
        /// Only messages from this client
        #[arg(long)]
        client: Option<String>,
    },
    /// Search active and archived context together
    Search {
        query: String,
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        project: Option<String>,
        /// RFC 3339 lower bound; defaults to the lookback window
        #[arg(long)]
        since: Option<String>,
        #[arg(long)]
        threshold: Option<f64>,
    },
    /// Move expired active context into the archive
    Archive {
        /// Override storage.active_ttl_hours
        #[arg(long)]
        older_than_hours: Option<i64>,
    },
    /// Watch the notes directory and trigger sync after bursts of writes
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = EvnaConfig::load()?;

    // Log to stderr so stdout stays clean for MCP JSON-RPC.
    let filter = EnvFilter::try_new(&config.server.log_level)
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Command::Serve => server::serve_stdio(config).await?,
        Command::Capture {
            conversation,
            role,
            client,
            content,
        } => cli::capture::capture(&config, &conversation, &role, client.as_deref(), &content)
            .await?,
        Command::Context {
            limit,
            project,
            client,
        } => cli::context::context(&config, limit, project.as_deref(), client.as_deref()).await?,
        Command::Search {
            query,
            limit,
            project,
            since,
            threshold,
        } => {
            cli::search::search(
                &config,
                &query,
                limit,
                project,
                since.as_deref(),
                threshold,
            )
            .await?
        }
        Command::Archive { older_than_hours } => {
            cli::archive::archive(&config, older_than_hours).await?
        }
        Command::Watch => cli::watch::watch(&config).await?,
    }

    Ok(())
}
