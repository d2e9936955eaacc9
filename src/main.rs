use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use tower_http::trace::TraceLayer;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use git_smart_http::{ServerConfig, SmartHttp};

#[derive(Parser, Debug)]
#[command(name = "git-smart-http")]
#[command(about = "Serve git repositories over the Smart HTTP protocol")]
struct Args {
    /// JSON config file; flags below override its values.
    #[arg(long, env = "GIT_HTTP_CONFIG")]
    config: Option<PathBuf>,

    /// Directory containing the repositories.
    #[arg(long, env = "GIT_HTTP_ROOT")]
    root: Option<PathBuf>,

    #[arg(long, env = "GIT_HTTP_LISTEN")]
    listen: Option<SocketAddr>,

    /// Allow or deny every push; unset defers to `http.receivepack`.
    #[arg(long, env = "GIT_HTTP_ALLOW_PUSH")]
    allow_push: Option<bool>,

    /// Allow or deny every fetch; unset defers to `http.uploadpack`.
    #[arg(long, env = "GIT_HTTP_ALLOW_PULL")]
    allow_pull: Option<bool>,

    #[arg(long, env = "GIT_HTTP_GIT_PATH")]
    git_path: Option<PathBuf>,

    /// Used when RUST_LOG is not set.
    #[arg(long, default_value = "info")]
    log_level: String,
}

impl Args {
    fn into_config(self) -> Result<ServerConfig> {
        let mut config = match &self.config {
            Some(path) => ServerConfig::from_file(path)?,
            None => ServerConfig::default(),
        };
        if let Some(root) = self.root {
            config.root = root;
        }
        if let Some(listen) = self.listen {
            config.listen = listen;
        }
        if let Some(git_path) = self.git_path {
            config.git_path = git_path;
        }
        config.allow_push = self.allow_push.or(config.allow_push);
        config.allow_pull = self.allow_pull.or(config.allow_pull);
        Ok(config.validate()?)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = args.into_config()?;
    tracing::info!(
        root = %config.root.display(),
        listen = %config.listen,
        allow_push = ?config.allow_push,
        allow_pull = ?config.allow_pull,
        "Starting git-smart-http"
    );

    let app = SmartHttp::git(&config)
        .router()
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.listen)
        .await
        .with_context(|| format!("failed to bind {}", config.listen))?;
    axum::serve(listener, app).await?;
    Ok(())
}
