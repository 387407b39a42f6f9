use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::stock::warn_level;
use crate::error::AppError;
use crate::models::{AuditCount, AuditLine, AuditSheet, AuditStatus, InventoryAudit, Product, WarnLevels};

/// Expected on-hand count: the baseline left by the last audit, or the running
/// balance of prepared minus sold minus trash over the whole history.
pub fn expected_stock(product: &Product) -> i64 {
  if let Some(target) = product.target_stock {
    return target;
  }
  product
    .history
    .values()
    .map(|day| i64::from(day.prepared) - i64::from(day.sold()) - i64::from(day.trash))
    .sum()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AuditPreviewLine {
  pub product_id: u32,
  pub cookie: String,
  pub soll: i64,
  pub ist_lager_verpackt: Option<u32>,
  pub ist_lager_versand: Option<u32>,
  pub ist_location: Option<u32>,
  pub ist_total: u32,
  pub differenz: Option<i64>,
  pub low_stock: bool,
  pub kommentar: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AuditPreview {
  pub lines: Vec<AuditPreviewLine>,
  pub total_difference: i64,
  pub assessed: usize,
  pub is_complete: bool,
}

pub fn preview_audit(products: &[Product], sheet: &AuditSheet, levels: &WarnLevels) -> AuditPreview {
  let empty = AuditCount::default();
  let lines: Vec<AuditPreviewLine> = products
    .iter()
    .map(|product| {
      let count = sheet.counts.get(&product.id).unwrap_or(&empty);
      let soll = expected_stock(product);
      let ist_total = count.ist_total();
      let differenz = count.is_counted().then(|| i64::from(ist_total) - soll);
      let threshold = match warn_level(levels, &product.name) {
        0 => crate::domain::stock::DEFAULT_WARN_LEVEL,
        level => level,
      };
      AuditPreviewLine {
        product_id: product.id,
        cookie: product.name.clone(),
        soll,
        ist_lager_verpackt: count.verpackt,
        ist_lager_versand: count.versand,
        ist_location: count.location,
        ist_total,
        differenz,
        low_stock: ist_total != 0 && ist_total < threshold,
        kommentar: count.kommentar.clone(),
      }
    })
    .collect();

  let total_difference = lines.iter().filter_map(|line| line.differenz).map(i64::abs).sum();
  let assessed = lines.iter().filter(|line| line.differenz.is_some()).count();
  let is_complete = assessed == lines.len();

  AuditPreview {
    lines,
    total_difference,
    assessed,
    is_complete,
  }
}

/// Applies a fully counted sheet: the counted total becomes the next baseline,
/// physical stock is the count minus the prepared bucket, and the day's
/// record keeps the count as its audit snapshot. Returns the log entry to
/// append. An incomplete sheet leaves every product untouched.
pub fn complete_audit(
  products: &mut [Product],
  sheet: &AuditSheet,
  levels: &WarnLevels,
  user_email: &str,
  user_name: &str,
  date: &str,
  now: DateTime<Utc>,
) -> Result<InventoryAudit, AppError> {
  let preview = preview_audit(products, sheet, levels);
  if !preview.is_complete {
    let missing = preview.lines.len() - preview.assessed;
    return Err(AppError::new(
      "AUDIT_INCOMPLETE",
      format!("Inventur unvollstaendig: {missing} Sorte(n) ohne Zaehlung"),
    ));
  }

  for (product, line) in products.iter_mut().zip(preview.lines.iter()) {
    let ist = line.ist_total;
    product.target_stock = Some(i64::from(ist));
    product.stock = ist.saturating_sub(product.prepared);
    product.day_mut(date).inventur = Some(ist);
  }

  let items = preview
    .lines
    .iter()
    .map(|line| AuditLine {
      product_id: Some(line.product_id),
      cookie: line.cookie.clone(),
      soll: line.soll,
      ist_lager_verpackt: line.ist_lager_verpackt,
      ist_lager_versand: line.ist_lager_versand,
      ist_location: line.ist_location,
      ist_final: line.ist_total,
      differenz: line.differenz,
      kommentar: line.kommentar.clone(),
    })
    .collect();

  Ok(InventoryAudit {
    id: format!("audit_{}", now.timestamp_millis()),
    date: date.to_string(),
    user: user_email.to_string(),
    user_name: user_name.to_string(),
    items,
    total_difference: preview.total_difference,
    status: AuditStatus::Completed,
    created_at: now.to_rfc3339(),
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{DailyRecord, SalesChannel};

  fn count(verpackt: Option<u32>, versand: Option<u32>, location: Option<u32>) -> AuditCount {
    AuditCount {
      verpackt,
      versand,
      location,
      kommentar: String::new(),
    }
  }

  #[test]
  fn soll_from_history_when_no_baseline() {
    let mut product = Product::new(1, "Lemon", "Seasonal", 2.6, 0.8);
    let mut day = DailyRecord {
      prepared: 30,
      trash: 2,
      ..Default::default()
    };
    day.set_channel(SalesChannel::Location, 10);
    day.set_channel(SalesChannel::Mitarbeiter, 4);
    product.history.insert("2025-01-10".to_string(), day);
    product.history.insert(
      "2025-01-11".to_string(),
      DailyRecord {
        prepared: 0,
        legacy_sold: Some(5),
        ..Default::default()
      },
    );
    assert_eq!(expected_stock(&product), 30 - 10 - 2 - 5);
  }

  #[test]
  fn completed_audit_resets_baseline() {
    let mut product = Product::new(1, "Chocolate Chip", "Classic", 2.5, 0.75);
    product.target_stock = Some(20);
    product.prepared = 4;
    let mut products = vec![product];

    let mut sheet = AuditSheet::default();
    sheet.counts.insert(1, count(Some(10), Some(0), Some(5)));

    let preview = preview_audit(&products, &sheet, &WarnLevels::new());
    assert_eq!(preview.lines[0].ist_total, 15);
    assert_eq!(preview.lines[0].differenz, Some(-5));

    let now = Utc::now();
    let audit = complete_audit(&mut products, &sheet, &WarnLevels::new(), "a@b.de", "Anna", "2025-01-16", now).unwrap();
    assert_eq!(products[0].target_stock, Some(15));
    assert_eq!(products[0].stock, 11);
    assert_eq!(products[0].history["2025-01-16"].inventur, Some(15));
    assert_eq!(audit.total_difference, 5);
    assert_eq!(audit.items[0].ist_final, 15);
    assert_eq!(audit.id, format!("audit_{}", now.timestamp_millis()));
    assert_eq!(audit.status, AuditStatus::Completed);
  }

  #[test]
  fn uncounted_product_is_not_assessed() {
    let products = vec![
      Product::new(1, "A", "Classic", 2.5, 0.75),
      Product::new(2, "B", "Classic", 2.5, 0.75),
    ];
    let mut sheet = AuditSheet::default();
    sheet.counts.insert(1, count(Some(0), None, None));
    sheet.counts.insert(2, count(None, None, None));

    let preview = preview_audit(&products, &sheet, &WarnLevels::new());
    assert_eq!(preview.lines[0].differenz, Some(0));
    assert_eq!(preview.lines[1].differenz, None);
    assert!(!preview.is_complete);
    assert_eq!(preview.total_difference, 0);
  }

  #[test]
  fn incomplete_audit_changes_nothing() {
    let mut products = vec![
      Product::new(1, "A", "Classic", 2.5, 0.75),
      Product::new(2, "B", "Classic", 2.5, 0.75),
    ];
    let before = products.clone();
    let mut sheet = AuditSheet::default();
    sheet.counts.insert(1, count(Some(3), None, None));

    let err = complete_audit(&mut products, &sheet, &WarnLevels::new(), "a@b.de", "Anna", "2025-01-16", Utc::now())
      .unwrap_err();
    assert_eq!(err.code, "AUDIT_INCOMPLETE");
    assert_eq!(products, before);
  }

  #[test]
  fn low_stock_flag_ignores_zero() {
    let mut levels = WarnLevels::new();
    levels.insert("A".to_string(), 20);
    let products = vec![Product::new(1, "A", "Classic", 2.5, 0.75), Product::new(2, "B", "Classic", 2.5, 0.75)];
    let mut sheet = AuditSheet::default();
    sheet.counts.insert(1, count(Some(0), None, None));
    sheet.counts.insert(2, count(Some(9), None, None));

    let preview = preview_audit(&products, &sheet, &levels);
    assert!(!preview.lines[0].low_stock);
    assert!(preview.lines[1].low_stock);
  }

  #[test]
  fn repeating_the_same_counts_gives_the_same_baseline() {
    let mut products = vec![Product::new(1, "A", "Classic", 2.5, 0.75)];
    let mut sheet = AuditSheet::default();
    sheet.counts.insert(1, count(Some(7), Some(2), None));

    let first = complete_audit(&mut products, &sheet, &WarnLevels::new(), "a@b.de", "Anna", "2025-01-16", Utc::now()).unwrap();
    let after_first = products[0].target_stock;
    let second = complete_audit(&mut products, &sheet, &WarnLevels::new(), "a@b.de", "Anna", "2025-01-16", Utc::now()).unwrap();

    assert_eq!(first.items[0].ist_final, second.items[0].ist_final);
    assert_eq!(after_first, products[0].target_stock);
    assert_eq!(second.items[0].differenz, Some(0));
  }
}
