use rust_xlsxwriter::XlsxError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Serialize, Error)]
#[error("{code}: {message}")]
pub struct AppError {
  pub code: String,
  pub message: String,
}

impl AppError {
  pub fn new(code: &str, message: impl Into<String>) -> Self {
    Self {
      code: code.to_string(),
      message: message.into(),
    }
  }

  pub fn not_found(message: impl Into<String>) -> Self {
    Self::new("NOT_FOUND", message)
  }

  pub fn is_not_found(&self) -> bool {
    self.code == "NOT_FOUND"
  }
}

/// Stock violations raised by the domain layer before anything is committed.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StockError {
  #[error("Zutat {name} reicht nicht: benoetigt {required:.3} {unit}, vorhanden {available:.3} {unit}")]
  InsufficientIngredient {
    ingredient_id: u32,
    name: String,
    unit: String,
    required: f64,
    available: f64,
  },
  #[error("Rezept fuer Produkt {0} hat keine gueltige Ausbeute")]
  InvalidYield(u32),
}

impl From<StockError> for AppError {
  fn from(err: StockError) -> Self {
    match err {
      StockError::InsufficientIngredient { .. } => AppError::new("INSUFFICIENT_STOCK", err.to_string()),
      StockError::InvalidYield(_) => AppError::new("INVALID_YIELD", err.to_string()),
    }
  }
}

impl From<rusqlite::Error> for AppError {
  fn from(err: rusqlite::Error) -> Self {
    AppError::new("DB_ERROR", err.to_string())
  }
}

impl From<std::io::Error> for AppError {
  fn from(err: std::io::Error) -> Self {
    AppError::new("IO_ERROR", err.to_string())
  }
}

impl From<zip::result::ZipError> for AppError {
  fn from(err: zip::result::ZipError) -> Self {
    AppError::new("ZIP_ERROR", err.to_string())
  }
}

impl From<XlsxError> for AppError {
  fn from(err: XlsxError) -> Self {
    AppError::new("EXPORT", err.to_string())
  }
}

impl From<serde_json::Error> for AppError {
  fn from(err: serde_json::Error) -> Self {
    AppError::new("JSON", err.to_string())
  }
}

impl From<csv::Error> for AppError {
  fn from(err: csv::Error) -> Self {
    AppError::new("CSV", err.to_string())
  }
}

impl<T> From<std::sync::PoisonError<T>> for AppError {
  fn from(_: std::sync::PoisonError<T>) -> Self {
    AppError::new("LOCK_ERROR", "Zustand konnte nicht gesperrt werden")
  }
}
