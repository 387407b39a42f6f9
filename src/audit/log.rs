use chrono::{Duration, NaiveDate, Utc};
use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};

use crate::error::AppError;
use crate::models::{AuditFilter, InventoryAudit};

pub fn append_activity(
  conn: &Connection,
  actor: Option<String>,
  action: &str,
  entity_type: &str,
  entity_id: Option<String>,
  payload_json: String,
) -> Result<(), AppError> {
  let ts = Utc::now().to_rfc3339();
  conn.execute(
    "INSERT INTO activity_log (ts, actor, action, entity_type, entity_id, payload_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
    params![ts, actor, action, entity_type, entity_id, payload_json],
  )?;
  Ok(())
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ActivityEntry {
  pub id: i64,
  pub ts: String,
  pub actor: Option<String>,
  pub action: String,
  pub entity_type: String,
  pub entity_id: Option<String>,
  pub payload_json: String,
}

/// Most recent entries first.
pub fn list_activity(conn: &Connection, limit: u32) -> Result<Vec<ActivityEntry>, AppError> {
  let mut stmt = conn.prepare(
    "SELECT id, ts, actor, action, entity_type, entity_id, payload_json
     FROM activity_log
     ORDER BY id DESC
     LIMIT ?1",
  )?;
  let rows = stmt.query_map(params![limit], |row| {
    Ok(ActivityEntry {
      id: row.get(0)?,
      ts: row.get(1)?,
      actor: row.get(2)?,
      action: row.get(3)?,
      entity_type: row.get(4)?,
      entity_id: row.get(5)?,
      payload_json: row.get(6)?,
    })
  })?;

  let mut entries = Vec::new();
  for row in rows {
    entries.push(row?);
  }
  Ok(entries)
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct AuditTotals {
  pub count: usize,
  pub total_difference: i64,
  pub last_7_days: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AuditLog {
  pub audits: Vec<InventoryAudit>,
  pub totals: AuditTotals,
}

fn days_before(today: NaiveDate, days: i64) -> String {
  (today - Duration::days(days)).format("%Y-%m-%d").to_string()
}

fn matches_search(audit: &InventoryAudit, search: &str) -> bool {
  let needle = search.trim().to_lowercase();
  if needle.is_empty() {
    return true;
  }
  audit.user_name.to_lowercase().contains(&needle)
    || audit.date.contains(&needle)
    || audit
      .items
      .iter()
      .any(|line| line.cookie.to_lowercase().contains(&needle))
}

/// Audits matching the filter, newest first. Audits are never edited here;
/// the log only reads what `complete_audit` appended.
pub fn query(audits: &[InventoryAudit], filter: &AuditFilter, today: NaiveDate) -> AuditLog {
  let since = filter.period.days().map(|days| days_before(today, days));

  let mut selected: Vec<InventoryAudit> = audits
    .iter()
    .filter(|audit| matches_search(audit, filter.search.as_deref().unwrap_or("")))
    .filter(|audit| since.as_deref().map_or(true, |since| audit.date.as_str() >= since))
    .cloned()
    .collect();
  selected.sort_by(|a, b| b.date.cmp(&a.date).then_with(|| b.created_at.cmp(&a.created_at)));

  let totals = totals(&selected, today);
  AuditLog {
    audits: selected,
    totals,
  }
}

pub fn totals(audits: &[InventoryAudit], today: NaiveDate) -> AuditTotals {
  let week_ago = days_before(today, 7);
  AuditTotals {
    count: audits.len(),
    total_difference: audits.iter().map(|audit| audit.total_difference).sum(),
    last_7_days: audits
      .iter()
      .filter(|audit| audit.date.as_str() >= week_ago.as_str())
      .count(),
  }
}
