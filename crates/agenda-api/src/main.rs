//! agenda-server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) plus `AGENDA_*`
//! environment variables, and serves the event API over HTTP from memory.
//!
//! ```sh
//! AGENDA_TOKEN=secret AGENDA_ORGANIZATIONS=acme,globex agenda-server
//! ```

use std::path::PathBuf;

use agenda_api::{AppState, ServerConfig};
use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Agenda reference event server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(
      config::Environment::with_prefix("AGENDA")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("organizations")
        .with_list_parse_key("read_only_organizations"),
    )
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  if server_cfg.token.is_empty() {
    anyhow::bail!("no API token configured; set `token` or AGENDA_TOKEN");
  }

  let app = agenda_api::router(AppState::new(&server_cfg));
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!(
    organizations = ?server_cfg.organizations,
    read_only = ?server_cfg.read_only_organizations,
    "Listening on http://{address}"
  );
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}
