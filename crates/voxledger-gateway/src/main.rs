//! voxledger gateway server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), overlays any
//! `VOXLEDGER_*` environment variables, opens the SQLite store, and serves the
//! provider webhooks over HTTP.
//!
//! # Local credentials
//!
//! To mint a short-lived credential signed with the configured secret:
//!
//! ```
//! cargo run -p voxledger-gateway --bin server -- --mint-token --hospital <uuid>
//! cargo run -p voxledger-gateway --bin server -- --mint-token
//! ```
//!
//! Without `--hospital` the credential is super-tenant.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use chrono::Utc;
use clap::Parser;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;
use voxledger_gateway::{
  AppState,
  ServerConfig,
  auth::{AuthConfig, Claims, Role},
};
use voxledger_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "voxledger ingestion gateway")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print a one-hour credential signed with `jwt_secret` and exit.
  #[arg(long)]
  mint_token: bool,

  /// Hospital the minted credential is scoped to.
  #[arg(long, requires = "mint_token")]
  hospital: Option<Uuid>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("VOXLEDGER"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  anyhow::ensure!(
    server_cfg.tokens_per_call > 0,
    "tokens_per_call must be positive, got {}",
    server_cfg.tokens_per_call
  );
  anyhow::ensure!(!server_cfg.jwt_secret.is_empty(), "jwt_secret must be set");

  // Helper mode: mint a credential and exit.
  if cli.mint_token {
    println!("{}", mint_token(&server_cfg, cli.hospital)?);
    return Ok(());
  }

  // Expand `~` in store path.
  let store_path = expand_tilde(&server_cfg.store_path);

  // Open SQLite store.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  // Build application state.
  let state = AppState {
    store:  Arc::new(store),
    auth:   Arc::new(AuthConfig {
      jwt_secret: server_cfg.jwt_secret.clone(),
      jwt_issuer: server_cfg.jwt_issuer.clone(),
    }),
    config: Arc::new(server_cfg.clone()),
  };

  let app = voxledger_gateway::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!(
    tokens_per_call = server_cfg.tokens_per_call,
    "Listening on http://{address}"
  );
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

fn mint_token(cfg: &ServerConfig, hospital: Option<Uuid>) -> anyhow::Result<String> {
  let now = Utc::now().timestamp();
  let claims = Claims {
    sub: Some("voxledger-cli".to_owned()),
    exp: now + 3600,
    iat: Some(now),
    iss: cfg.jwt_issuer.clone(),
    hospital_id: hospital,
    role: if hospital.is_some() { Role::Tenant } else { Role::SuperTenant },
  };
  jsonwebtoken::encode(
    &Header::new(Algorithm::HS256),
    &claims,
    &EncodingKey::from_secret(cfg.jwt_secret.as_bytes()),
  )
  .context("failed to sign credential")
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
