use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use zip::write::FileOptions;
use zip::{ZipArchive, ZipWriter};

use crate::domain::migrate;
use crate::error::AppError;
use crate::models::{Collections, SCHEMA_VERSION};

pub const BACKUP_ENTRY: &str = "backup.json";

/// Full backup: every collection plus when and in which shape it was taken.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BackupDocument {
  #[serde(flatten)]
  pub collections: Collections,
  pub export_date: String,
  pub schema_version: u32,
}

impl BackupDocument {
  pub fn new(collections: Collections, now: DateTime<Utc>) -> Self {
    Self {
      collections,
      export_date: now.to_rfc3339(),
      schema_version: SCHEMA_VERSION,
    }
  }
}

pub fn to_json(collections: &Collections, now: DateTime<Utc>) -> Result<String, AppError> {
  let doc = BackupDocument::new(collections.clone(), now);
  Ok(serde_json::to_string_pretty(&doc)?)
}

/// Parses a backup document of any known version into current collections.
pub fn from_json(text: &str, now: DateTime<Utc>) -> Result<Collections, AppError> {
  let doc: Value = serde_json::from_str(text)
    .map_err(|err| AppError::new("BACKUP_INVALID", format!("Backup ist kein gueltiges JSON: {err}")))?;
  if !doc.is_object() {
    return Err(AppError::new("BACKUP_INVALID", "Backup muss ein JSON Objekt sein"));
  }
  migrate::upgrade(doc, now)
}

pub fn json_file_name(today: &str) -> String {
  format!("cookie_business_backup_{today}.json")
}

pub fn create_archive(
  app_dir: &Path,
  collections: &Collections,
  output_path: Option<String>,
  now: DateTime<Utc>,
) -> Result<String, AppError> {
  let backup_dir = app_dir.join("Backups");
  fs::create_dir_all(&backup_dir)?;

  let filename = output_path.unwrap_or_else(|| {
    let stamp = now.format("%Y%m%d_%H%M%S");
    backup_dir
      .join(format!("backup_{stamp}.zip"))
      .to_string_lossy()
      .to_string()
  });

  if let Some(parent) = Path::new(&filename).parent() {
    fs::create_dir_all(parent)?;
  }

  let json = to_json(collections, now)?;
  let file = File::create(&filename)?;
  let mut zip = ZipWriter::new(file);
  let options = FileOptions::<()>::default().compression_method(zip::CompressionMethod::Deflated);

  zip.start_file(BACKUP_ENTRY, options)?;
  zip.write_all(json.as_bytes())?;
  zip.finish()?;

  tracing::info!(path = %filename, "backup archive written");
  Ok(filename)
}

pub fn read_archive(archive_path: &str, now: DateTime<Utc>) -> Result<Collections, AppError> {
  let file = File::open(archive_path)?;
  let mut archive = ZipArchive::new(file)?;

  let mut entry = match archive.by_name(BACKUP_ENTRY) {
    Ok(entry) => entry,
    Err(zip::result::ZipError::FileNotFound) => {
      return Err(AppError::new(
        "BACKUP_INVALID",
        format!("{BACKUP_ENTRY} fehlt im Archiv"),
      ))
    }
    Err(err) => return Err(err.into()),
  };
  let mut text = String::new();
  entry.read_to_string(&mut text)?;
  from_json(&text, now)
}
