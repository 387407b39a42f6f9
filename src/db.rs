use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::AppError;

pub const DB_FILE: &str = "keksstube.sqlite";

pub const KEY_PRODUCTS: &str = "products";
pub const KEY_SETTINGS: &str = "settings";
pub const KEY_WEBSITE_SETTINGS: &str = "website_settings";
pub const KEY_INGREDIENTS: &str = "ingredients";
pub const KEY_INVENTORY_AUDITS: &str = "inventory_audits";
pub const KEY_WARN_LEVELS: &str = "warn_levels";
pub const KEY_RECIPES: &str = "recipes";
pub const KEY_TODOS: &str = "todos";
pub const KEY_PRODUCTION_PLANS: &str = "production_plans";
pub const KEY_USERS: &str = "users";
pub const KEY_SCHEMA_VERSION: &str = "schema_version";

pub const ALL_KEYS: [&str; 11] = [
  KEY_PRODUCTS,
  KEY_SETTINGS,
  KEY_WEBSITE_SETTINGS,
  KEY_INGREDIENTS,
  KEY_INVENTORY_AUDITS,
  KEY_WARN_LEVELS,
  KEY_RECIPES,
  KEY_TODOS,
  KEY_PRODUCTION_PLANS,
  KEY_USERS,
  KEY_SCHEMA_VERSION,
];

pub struct Db {
  pub conn: Mutex<Connection>,
  pub db_path: PathBuf,
}

pub fn resolve_app_dir() -> Result<PathBuf, AppError> {
  if let Ok(explicit) = std::env::var("KEKSSTUBE_DATA_DIR") {
    let explicit = explicit.trim();
    if !explicit.is_empty() {
      let dir = PathBuf::from(explicit);
      fs::create_dir_all(&dir)?;
      return Ok(dir);
    }
  }

  if let Some(portable) = resolve_portable_dir()? {
    return Ok(portable);
  }

  let base = dirs_next::data_local_dir()
    .ok_or_else(|| AppError::new("PATH", "AppData Pfad nicht gefunden"))?;
  Ok(base.join("Keksstube"))
}

pub fn init_db(app_dir: &Path) -> Result<Db, AppError> {
  fs::create_dir_all(app_dir)?;
  let db_path = app_dir.join(DB_FILE);
  let mut conn = open_connection(&db_path)?;
  run_migrations(&mut conn)?;

  tracing::info!(path = %db_path.display(), "store opened");
  Ok(Db {
    conn: Mutex::new(conn),
    db_path,
  })
}

pub fn with_conn<T>(db: &Db, f: impl FnOnce(&mut Connection) -> Result<T, AppError>) -> Result<T, AppError> {
  let mut guard = db.conn.lock()?;
  f(&mut guard)
}

fn open_connection(db_path: &Path) -> Result<Connection, AppError> {
  let conn = Connection::open(db_path)?;
  conn.execute_batch("PRAGMA journal_mode = WAL; PRAGMA synchronous = NORMAL;")?;
  conn.busy_timeout(Duration::from_secs(5))?;
  Ok(conn)
}

fn run_migrations(conn: &mut Connection) -> Result<(), AppError> {
  conn.execute_batch(
    "CREATE TABLE IF NOT EXISTS schema_migrations (version TEXT PRIMARY KEY, applied_at TEXT NOT NULL)",
  )?;

  apply_migration(conn, "001_init", include_str!("../migrations/001_init.sql"))?;
  Ok(())
}

fn apply_migration(conn: &mut Connection, version: &str, sql: &str) -> Result<(), AppError> {
  let exists: i64 = conn.query_row(
    "SELECT COUNT(*) FROM schema_migrations WHERE version = ?1",
    params![version],
    |row| row.get(0),
  )?;
  if exists > 0 {
    return Ok(());
  }

  let tx = conn.transaction()?;
  tx.execute_batch(sql)?;
  tx.execute(
    "INSERT INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
    params![version, Utc::now().to_rfc3339()],
  )?;
  tx.commit()?;
  tracing::info!(version, "migration applied");
  Ok(())
}

pub fn load_raw(conn: &Connection, key: &str) -> Result<Option<String>, AppError> {
  let value = conn
    .query_row(
      "SELECT value FROM collections WHERE key = ?1",
      params![key],
      |row| row.get::<_, String>(0),
    )
    .optional()?;
  Ok(value)
}

/// Reads one collection. A missing key yields `None`; an unreadable or
/// undecodable blob is logged and also yields `None` so callers fall back to
/// their default.
pub fn load_blob<T: DeserializeOwned>(conn: &Connection, key: &str) -> Option<T> {
  let raw = match load_raw(conn, key) {
    Ok(Some(raw)) => raw,
    Ok(None) => return None,
    Err(err) => {
      tracing::warn!(key, error = %err, "collection could not be read, using default");
      return None;
    }
  };
  match serde_json::from_str::<T>(&raw) {
    Ok(value) => Some(value),
    Err(err) => {
      tracing::warn!(key, error = %err, "collection could not be decoded, using default");
      None
    }
  }
}

pub fn load_blob_or_default<T: DeserializeOwned + Default>(conn: &Connection, key: &str) -> T {
  load_blob(conn, key).unwrap_or_default()
}

pub fn save_blob<T: Serialize + ?Sized>(conn: &Connection, key: &str, value: &T) -> Result<(), AppError> {
  let json = serde_json::to_string(value)?;
  conn.execute(
    "INSERT INTO collections (key, value, updated_at) VALUES (?1, ?2, ?3)
     ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
    params![key, json, Utc::now().to_rfc3339()],
  )?;
  Ok(())
}

pub fn clear_collections(conn: &Connection) -> Result<(), AppError> {
  conn.execute("DELETE FROM collections", [])?;
  Ok(())
}

pub fn get_last_change(conn: &Connection) -> Result<String, AppError> {
  let ts: Option<String> = conn.query_row("SELECT MAX(updated_at) FROM collections", [], |row| row.get(0))?;
  Ok(ts.unwrap_or_else(|| "1970-01-01T00:00:00Z".to_string()))
}

fn resolve_portable_dir() -> Result<Option<PathBuf>, AppError> {
  let env_enabled = std::env::var("KEKSSTUBE_PORTABLE")
    .ok()
    .map(|value| {
      let value = value.to_ascii_lowercase();
      value == "1" || value == "true" || value == "yes"
    })
    .unwrap_or(false);

  let exe_dir = std::env::current_exe()
    .ok()
    .and_then(|path| path.parent().map(|parent| parent.to_path_buf()));

  if let Some(exe_dir) = exe_dir {
    let flag = exe_dir.join("portable.flag");
    let data_dir = exe_dir.join("data");
    if env_enabled || flag.exists() || data_dir.exists() {
      fs::create_dir_all(&data_dir)?;
      return Ok(Some(data_dir));
    }
  }

  Ok(None)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::Settings;

  #[test]
  fn blob_roundtrip_and_overwrite() {
    let dir = tempfile::tempdir().unwrap();
    let db = init_db(dir.path()).unwrap();
    with_conn(&db, |conn| {
      assert!(load_blob::<Settings>(conn, KEY_SETTINGS).is_none());
      save_blob(conn, KEY_SETTINGS, &Settings::default())?;
      let changed = Settings {
        cost_per_cookie: 0.9,
        cost_per_hour: 45.0,
      };
      save_blob(conn, KEY_SETTINGS, &changed)?;
      assert_eq!(load_blob::<Settings>(conn, KEY_SETTINGS), Some(changed));
      Ok(())
    })
    .unwrap();
  }

  #[test]
  fn corrupt_blob_falls_back_to_default() {
    let dir = tempfile::tempdir().unwrap();
    let db = init_db(dir.path()).unwrap();
    with_conn(&db, |conn| {
      conn.execute(
        "INSERT INTO collections (key, value, updated_at) VALUES (?1, ?2, ?3)",
        params![KEY_SETTINGS, "{not json", "2025-01-01T00:00:00Z"],
      )?;
      let settings: Settings = load_blob_or_default(conn, KEY_SETTINGS);
      assert_eq!(settings, Settings::default());
      Ok(())
    })
    .unwrap();
  }

  #[test]
  fn migrations_run_once() {
    let dir = tempfile::tempdir().unwrap();
    drop(init_db(dir.path()).unwrap());
    let db = init_db(dir.path()).unwrap();
    let count: i64 = with_conn(&db, |conn| {
      Ok(conn.query_row("SELECT COUNT(*) FROM schema_migrations", [], |row| row.get(0))?)
    })
    .unwrap();
    assert_eq!(count, 1);
  }
}
