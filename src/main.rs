use keksstube::db;
use keksstube::server::{self, ServerConfig};
use keksstube::state::AppState;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("keksstube=info"));
  tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
  init_tracing();

  let app_dir = db::resolve_app_dir()?;
  let state = AppState::open(&app_dir)?;
  state.subscribe(Box::new(|event| {
    tracing::debug!(revision = event.revision, keys = ?event.keys, "collections changed");
  }))?;

  let config = ServerConfig::from_env();
  tracing::info!(
    app_dir = %app_dir.display(),
    address = %server::local_ip_string(),
    "keksstube ready"
  );
  server::serve(&state, &config)?;
  Ok(())
}
