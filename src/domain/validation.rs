use chrono::{DateTime, Local, NaiveDate};

use crate::error::AppError;

/// Largest piece count accepted for a single field of one day or one audit.
pub const MAX_COUNT: u32 = 1_000_000;

const IMPORT_DATE_FORMATS: [&str; 4] = ["%Y-%m-%d", "%d.%m.%Y", "%m/%d/%Y", "%Y/%m/%d"];

pub fn parse_date(date: &str) -> Result<NaiveDate, AppError> {
  NaiveDate::parse_from_str(date.trim(), "%Y-%m-%d")
    .map_err(|_| AppError::new("INVALID_DATE", "Datum muss YYYY-MM-DD sein"))
}

/// Accepts the date spellings found in exported sales sheets and returns the
/// calendar date, or `None` when nothing matches.
pub fn parse_import_date(value: &str) -> Option<NaiveDate> {
  let trimmed = value.trim();
  if trimmed.is_empty() {
    return None;
  }
  for format in IMPORT_DATE_FORMATS {
    if let Ok(date) = NaiveDate::parse_from_str(trimmed, format) {
      return Some(date);
    }
  }
  DateTime::parse_from_rfc3339(trimmed).ok().map(|dt| dt.date_naive())
}

pub fn today() -> String {
  Local::now().date_naive().format("%Y-%m-%d").to_string()
}

/// Resolves an optional date argument, defaulting to today.
pub fn date_or_today(date: Option<&str>) -> Result<String, AppError> {
  match date.map(str::trim).filter(|value| !value.is_empty()) {
    Some(value) => Ok(parse_date(value)?.format("%Y-%m-%d").to_string()),
    None => Ok(today()),
  }
}

pub fn ensure_name(name: &str, label: &str) -> Result<String, AppError> {
  let trimmed = name.trim();
  if trimmed.is_empty() {
    Err(AppError::new("INVALID_NAME", format!("{label} darf nicht leer sein")))
  } else {
    Ok(trimmed.to_string())
  }
}

pub fn ensure_amount_non_negative(amount: f64, label: &str) -> Result<(), AppError> {
  if !amount.is_finite() || amount < 0.0 {
    Err(AppError::new("INVALID_AMOUNT", format!("{label} muss >= 0 sein")))
  } else {
    Ok(())
  }
}

pub fn ensure_quantity_positive(quantity: u32, label: &str) -> Result<(), AppError> {
  if quantity == 0 {
    Err(AppError::new("INVALID_AMOUNT", format!("{label} muss > 0 sein")))
  } else {
    Ok(())
  }
}

pub fn ensure_count(value: u32, label: &str) -> Result<(), AppError> {
  if value > MAX_COUNT {
    Err(AppError::new("INVALID_AMOUNT", format!("{label} darf hoechstens {MAX_COUNT} sein")))
  } else {
    Ok(())
  }
}

pub fn ensure_delta(delta: i64, label: &str) -> Result<(), AppError> {
  if delta.unsigned_abs() > u64::from(MAX_COUNT) {
    Err(AppError::new("INVALID_AMOUNT", format!("{label} darf hoechstens {MAX_COUNT} sein")))
  } else {
    Ok(())
  }
}
