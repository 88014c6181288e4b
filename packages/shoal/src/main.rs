use std::io::{BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::prelude::*;

use shoal_api::{ApiClient, Credentials};
use shoal_socket::{EventBus, Socket};

mod chat;
mod config;

use crate::chat::ChatContext;
use crate::config::FileConfig;

#[derive(Parser)]
#[command(name = "shoal")]
#[command(about = "Terminal chat client for the Shoal backend")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Directory containing config.toml (defaults to the current directory)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    /// Username (prompted when omitted)
    #[arg(long, global = true)]
    username: Option<String>,

    /// Password (prompted when omitted)
    #[arg(long, global = true)]
    password: Option<String>,

    /// Register a new account instead of logging in
    #[arg(long, global = true)]
    register: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Open a chat with another user
    Chat {
        /// Peer username
        user: String,
    },

    /// List your conversations, most recent first
    Conversations,

    /// List registered users
    Users,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("shoal=info"));
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(env_filter)
        .init();

    let config_dir = cli
        .config_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let file_config: FileConfig = config::load_config(&config_dir)
        .extract()
        .context("invalid configuration")?;

    // Constructed once and passed down; every component reaches the same
    // live connection and the same local bus.
    let ctx = ChatContext {
        api: Arc::new(ApiClient::new(file_config.api.url.clone())?),
        socket: Arc::new(
            Socket::new(file_config.socket.url.clone())
                .with_keep_connect_interval(file_config.socket.keep_connect_interval()),
        ),
        bus: Arc::new(EventBus::new()),
    };

    let credentials = Credentials {
        username: resolve(cli.username, "username: ")?,
        password: resolve(cli.password, "password: ")?,
    };
    if cli.register {
        ctx.api
            .register(&credentials)
            .await
            .context("registration failed")?;
        info!(username = %credentials.username, "registered");
    } else {
        ctx.api.login(&credentials).await.context("login failed")?;
    }

    match cli.command {
        Commands::Chat { user } => chat::run(&ctx, &user).await,
        Commands::Conversations => list_conversations(&ctx).await,
        Commands::Users => list_users(&ctx).await,
    }
}

async fn list_conversations(ctx: &ChatContext) -> Result<()> {
    for conversation in ctx.api.conversations().await? {
        let name = if conversation.name.is_empty() {
            format!("conversation {}", conversation.id)
        } else {
            conversation.name.clone()
        };
        println!(
            "{:>6}  {:10}  {}  ({} participants)",
            conversation.id,
            conversation.kind,
            name,
            conversation.user_ids.len()
        );
    }
    Ok(())
}

async fn list_users(ctx: &ChatContext) -> Result<()> {
    for user in ctx.api.users().await? {
        println!("{:>6}  {}", user.id, user.username);
    }
    Ok(())
}

/// Use the flag value when given, otherwise prompt on the terminal.
fn resolve(flag: Option<String>, prompt: &str) -> Result<String> {
    if let Some(value) = flag {
        return Ok(value);
    }
    print!("{prompt}");
    std::io::stdout().lock().flush()?;
    let mut line = String::new();
    std::io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
