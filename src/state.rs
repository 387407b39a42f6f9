use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::audit::log::append_activity;
use crate::db::{self, Db};
use crate::domain::{migrate, seed};
use crate::error::AppError;
use crate::models::{Collections, SCHEMA_VERSION};

#[derive(Debug, Serialize, Clone, PartialEq)]
pub struct ChangeEvent {
  pub revision: u64,
  pub keys: Vec<String>,
}

pub type Observer = Box<dyn Fn(&ChangeEvent) + Send + Sync>;

/// One entry for the activity log, written next to the change it describes.
#[derive(Debug, Clone)]
pub struct Activity {
  pub actor: Option<String>,
  pub action: &'static str,
  pub entity_type: &'static str,
  pub entity_id: Option<String>,
  pub payload_json: String,
}

impl Activity {
  pub fn new(action: &'static str, entity_type: &'static str) -> Self {
    Self {
      actor: None,
      action,
      entity_type,
      entity_id: None,
      payload_json: "{}".to_string(),
    }
  }

  pub fn actor(mut self, actor: Option<String>) -> Self {
    self.actor = actor;
    self
  }

  pub fn entity(mut self, id: impl ToString) -> Self {
    self.entity_id = Some(id.to_string());
    self
  }

  pub fn payload<T: Serialize>(mut self, payload: &T) -> Self {
    self.payload_json = serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());
    self
  }
}

/// Owns the collections. Every change goes through [`AppState::mutate`],
/// which works on a copy and only swaps it in once the changed keys are
/// written, so a failing command leaves memory and store untouched.
pub struct AppState {
  pub db: Db,
  pub app_dir: PathBuf,
  collections: Mutex<Collections>,
  observers: Mutex<Vec<Observer>>,
  revision: AtomicU64,
}

impl AppState {
  pub fn open(app_dir: &Path) -> Result<Self, AppError> {
    let db = db::init_db(app_dir)?;
    Self::load(db, app_dir.to_path_buf(), Utc::now())
  }

  pub fn load(db: Db, app_dir: PathBuf, now: DateTime<Utc>) -> Result<Self, AppError> {
    let collections = db::with_conn(&db, |conn| load_collections(conn, now))?;
    Ok(Self {
      db,
      app_dir,
      collections: Mutex::new(collections),
      observers: Mutex::new(Vec::new()),
      revision: AtomicU64::new(0),
    })
  }

  pub fn revision(&self) -> u64 {
    self.revision.load(Ordering::SeqCst)
  }

  pub fn subscribe(&self, observer: Observer) -> Result<(), AppError> {
    self.observers.lock()?.push(observer);
    Ok(())
  }

  pub fn read<T>(&self, f: impl FnOnce(&Collections) -> T) -> Result<T, AppError> {
    let guard = self.collections.lock()?;
    Ok(f(&guard))
  }

  pub fn snapshot(&self) -> Result<Collections, AppError> {
    self.read(Collections::clone)
  }

  pub fn mutate<T>(
    &self,
    keys: &[&'static str],
    activity: Activity,
    f: impl FnOnce(&mut Collections) -> Result<T, AppError>,
  ) -> Result<T, AppError> {
    let mut guard = self.collections.lock()?;
    let mut working = guard.clone();
    let result = f(&mut working)?;

    db::with_conn(&self.db, |conn| {
      let tx = conn.transaction()?;
      for key in keys {
        save_key(&tx, &working, key)?;
      }
      append_activity(
        &tx,
        activity.actor.clone(),
        activity.action,
        activity.entity_type,
        activity.entity_id.clone(),
        activity.payload_json.clone(),
      )?;
      tx.commit()?;
      Ok(())
    })?;

    *guard = working;
    drop(guard);

    tracing::info!(action = activity.action, entity = activity.entity_id.as_deref().unwrap_or("-"), "state changed");
    self.notify(keys.iter().map(|key| key.to_string()).collect());
    Ok(result)
  }

  /// Swaps in a complete set of collections, as done by restore and reset.
  pub fn replace_all(&self, collections: Collections, activity: Activity) -> Result<(), AppError> {
    let mut guard = self.collections.lock()?;
    db::with_conn(&self.db, |conn| {
      let tx = conn.transaction()?;
      db::clear_collections(&tx)?;
      for key in db::ALL_KEYS {
        save_key(&tx, &collections, key)?;
      }
      append_activity(
        &tx,
        activity.actor.clone(),
        activity.action,
        activity.entity_type,
        activity.entity_id.clone(),
        activity.payload_json.clone(),
      )?;
      tx.commit()?;
      Ok(())
    })?;
    *guard = collections;
    drop(guard);

    tracing::info!(action = activity.action, "all collections replaced");
    self.notify(db::ALL_KEYS.iter().map(|key| key.to_string()).collect());
    Ok(())
  }

  pub fn last_change(&self) -> Result<String, AppError> {
    db::with_conn(&self.db, |conn| db::get_last_change(conn))
  }

  fn notify(&self, keys: Vec<String>) {
    let revision = self.revision.fetch_add(1, Ordering::SeqCst) + 1;
    let event = ChangeEvent { revision, keys };
    match self.observers.lock() {
      Ok(observers) => {
        for observer in observers.iter() {
          observer(&event);
        }
      }
      Err(_) => tracing::warn!(revision, "observer list poisoned, change not announced"),
    }
  }
}

fn save_key(conn: &Connection, collections: &Collections, key: &str) -> Result<(), AppError> {
  match key {
    db::KEY_PRODUCTS => db::save_blob(conn, key, &collections.products),
    db::KEY_SETTINGS => db::save_blob(conn, key, &collections.settings),
    db::KEY_WEBSITE_SETTINGS => db::save_blob(conn, key, &collections.website_settings),
    db::KEY_INGREDIENTS => db::save_blob(conn, key, &collections.ingredients),
    db::KEY_INVENTORY_AUDITS => db::save_blob(conn, key, &collections.inventory_audits),
    db::KEY_WARN_LEVELS => db::save_blob(conn, key, &collections.warn_levels),
    db::KEY_RECIPES => db::save_blob(conn, key, &collections.recipes),
    db::KEY_TODOS => db::save_blob(conn, key, &collections.todos),
    db::KEY_PRODUCTION_PLANS => db::save_blob(conn, key, &collections.production_plans),
    db::KEY_USERS => db::save_blob(conn, key, &collections.users),
    db::KEY_SCHEMA_VERSION => db::save_blob(conn, key, &SCHEMA_VERSION),
    other => Err(AppError::new("UNKNOWN_KEY", format!("Unbekannter Schluessel {other}"))),
  }
}

fn save_all(conn: &mut Connection, collections: &Collections) -> Result<(), AppError> {
  let tx = conn.transaction()?;
  for key in db::ALL_KEYS {
    save_key(&tx, collections, key)?;
  }
  tx.commit()?;
  Ok(())
}

/// Decodes every key of a current-version store on its own, so one damaged
/// collection falls back to its default instead of failing the whole load.
fn load_versioned(conn: &Connection) -> Collections {
  Collections {
    products: db::load_blob_or_default(conn, db::KEY_PRODUCTS),
    settings: db::load_blob_or_default(conn, db::KEY_SETTINGS),
    website_settings: db::load_blob_or_default(conn, db::KEY_WEBSITE_SETTINGS),
    ingredients: db::load_blob_or_default(conn, db::KEY_INGREDIENTS),
    inventory_audits: db::load_blob_or_default(conn, db::KEY_INVENTORY_AUDITS),
    warn_levels: db::load_blob_or_default(conn, db::KEY_WARN_LEVELS),
    recipes: db::load_blob_or_default(conn, db::KEY_RECIPES),
    todos: db::load_blob_or_default(conn, db::KEY_TODOS),
    production_plans: db::load_blob_or_default(conn, db::KEY_PRODUCTION_PLANS),
    users: db::load_blob_or_default(conn, db::KEY_USERS),
  }
}

/// Builds the collections from the store. An empty store is seeded; a store
/// written before versioning is migrated once and written back.
fn load_collections(conn: &mut Connection, now: DateTime<Utc>) -> Result<Collections, AppError> {
  let mut collections = if db::load_blob::<u32>(conn, db::KEY_SCHEMA_VERSION) == Some(SCHEMA_VERSION) {
    load_versioned(conn)
  } else {
    let mut doc = Map::new();
    for key in db::ALL_KEYS {
      if let Some(value) = db::load_blob::<Value>(conn, key) {
        doc.insert(key.to_string(), value);
      }
    }

    if doc.is_empty() {
      let seeded = seed::collections(now);
      save_all(conn, &seeded)?;
      tracing::info!("empty store seeded");
      return Ok(seeded);
    }

    let collections = migrate::upgrade(Value::Object(doc), now)?;
    save_all(conn, &collections)?;
    tracing::info!(schema_version = SCHEMA_VERSION, "store brought to current schema");
    collections
  };

  if migrate::ensure_login_possible(&mut collections, now) {
    db::save_blob(conn, db::KEY_USERS, &collections.users)?;
  }
  Ok(collections)
}
