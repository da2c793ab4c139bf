use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

use codeatlas::{build_router, Container, ContainerConfig};

#[derive(Parser)]
#[command(name = "codeatlas")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[arg(short, long)]
    verbose: bool,

    /// Address to listen on.
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    #[arg(short, long, default_value = "8080")]
    port: u16,

    /// Root directory for the database and repository checkouts.
    #[arg(short, long)]
    data_dir: Option<String>,

    /// Deterministic hash-based embeddings instead of the HTTP service.
    #[arg(long)]
    mock_embeddings: bool,

    /// Canned chat answers instead of the OpenAI-compatible service.
    #[arg(long)]
    mock_chat: bool,

    /// Keep vectors in memory instead of DuckDB.
    #[arg(long)]
    memory_storage: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let mut config = ContainerConfig::from_env();
    if let Some(dir) = cli.data_dir.as_deref() {
        config.data_dir = PathBuf::from(dir);
    }
    config.data_dir = PathBuf::from(expand_tilde(&config.data_dir.to_string_lossy()));
    if cli.mock_embeddings {
        config.mock_embeddings = true;
    }
    if cli.mock_chat {
        config.mock_chat = true;
    }
    if cli.memory_storage {
        config.memory_storage = true;
    }

    info!("Data directory: {}", config.data_dir.display());
    let container = Arc::new(Container::new(config)?);
    let app = build_router(container);

    let addr = format!("{}:{}", cli.host, cli.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Server listening on {}", addr);
    axum::serve(listener, app).await?;

    Ok(())
}

fn expand_tilde(path: &str) -> String {
    if path == "~" || path.starts_with("~/") {
        if let Some(home) = std::env::var_os("HOME") {
            if path == "~" {
                return home.to_string_lossy().to_string();
            }
            return path.replacen("~", &home.to_string_lossy(), 1);
        }
    }
    path.to_string()
}

#[cfg(test)]
mod cli_tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cli = Cli::try_parse_from(["codeatlas"]).unwrap();

        assert_eq!(cli.host, "127.0.0.1");
        assert_eq!(cli.port, 8080);
        assert!(cli.data_dir.is_none());
        assert!(!cli.mock_embeddings);
    }

    #[test]
    fn test_expand_tilde_leaves_plain_paths() {
        assert_eq!(expand_tilde("/tmp/data"), "/tmp/data");
        assert_eq!(expand_tilde("relative/data"), "relative/data");
    }
}
