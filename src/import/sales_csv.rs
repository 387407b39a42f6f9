use std::collections::BTreeMap;

use csv::{ReaderBuilder, StringRecord, Trim};
use serde::{Deserialize, Serialize};

use crate::domain::validation::parse_import_date;
use crate::error::AppError;
use crate::models::{Product, SalesChannel};

pub const TEMPLATE: &str = "Datum,Cookie,Plattform,Anzahl
2025-01-16,Chocolate Chip,location,15
2025-01-16,Chocolate Chip,ubereats,8
2025-01-16,Oatmeal Raisin,wolt,5
2025-01-16,Double Chocolate,website,12
";

/// Header names chosen by the user for the four imported fields.
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ColumnMapping {
  pub date: String,
  pub product: String,
  pub channel: String,
  pub quantity: String,
}

impl ColumnMapping {
  /// The header of the downloadable template.
  pub fn template() -> Self {
    Self {
      date: "Datum".to_string(),
      product: "Cookie".to_string(),
      channel: "Plattform".to_string(),
      quantity: "Anzahl".to_string(),
    }
  }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ImportInput {
  pub text: String,
  #[serde(default)]
  pub mapping: ColumnMapping,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ImportRow {
  pub line: usize,
  pub date: String,
  pub product_name: String,
  pub product_id: Option<u32>,
  pub channel: SalesChannel,
  pub quantity: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ImportPreview {
  pub columns: Vec<String>,
  pub rows: Vec<ImportRow>,
  pub invalid_rows: usize,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct ImportSummary {
  pub applied_groups: usize,
  pub skipped_groups: usize,
  pub invalid_rows: usize,
  pub skipped_products: Vec<String>,
  pub dates: Vec<String>,
}

fn reader(text: &str) -> csv::Reader<&[u8]> {
  ReaderBuilder::new()
    .has_headers(true)
    .flexible(true)
    .trim(Trim::All)
    .from_reader(text.as_bytes())
}

pub fn read_columns(text: &str) -> Result<Vec<String>, AppError> {
  let mut rdr = reader(text);
  let headers = rdr.headers()?;
  Ok(headers.iter().map(str::to_string).filter(|name| !name.is_empty()).collect())
}

fn column_index(headers: &StringRecord, name: &str, label: &str) -> Result<usize, AppError> {
  let wanted = name.trim();
  if wanted.is_empty() {
    return Err(AppError::new("IMPORT_MAPPING", format!("Bitte eine Spalte fuer {label} zuordnen")));
  }
  headers
    .iter()
    .position(|header| header == wanted)
    .ok_or_else(|| AppError::new("IMPORT_MAPPING", format!("Spalte {wanted} fuer {label} nicht gefunden")))
}

fn match_product(products: &[Product], name: &str) -> Option<u32> {
  let needle = name.to_lowercase();
  products
    .iter()
    .find(|product| product.name.to_lowercase() == needle)
    .map(|product| product.id)
}

/// Normalizes every data row. Rows with an empty mapped cell, an unreadable
/// date or a quantity that is not a whole non-negative number are counted as
/// invalid and left out.
pub fn parse(text: &str, mapping: &ColumnMapping, products: &[Product]) -> Result<ImportPreview, AppError> {
  let mut rdr = reader(text);
  let headers = rdr.headers()?.clone();
  let date_idx = column_index(&headers, &mapping.date, "Datum")?;
  let product_idx = column_index(&headers, &mapping.product, "Cookie")?;
  let channel_idx = column_index(&headers, &mapping.channel, "Plattform")?;
  let quantity_idx = column_index(&headers, &mapping.quantity, "Anzahl")?;

  let mut rows = Vec::new();
  let mut invalid_rows = 0;
  let mut seen = 0;

  for (idx, record) in rdr.records().enumerate() {
    let line = idx + 2;
    let record = match record {
      Ok(record) => record,
      Err(err) => {
        tracing::warn!(line, error = %err, "csv row unreadable");
        invalid_rows += 1;
        continue;
      }
    };
    if record.iter().all(str::is_empty) {
      continue;
    }
    seen += 1;

    let cell = |i: usize| record.get(i).unwrap_or("").trim();
    let (date_raw, name, channel_raw, quantity_raw) = (cell(date_idx), cell(product_idx), cell(channel_idx), cell(quantity_idx));
    if date_raw.is_empty() || name.is_empty() || channel_raw.is_empty() || quantity_raw.is_empty() {
      invalid_rows += 1;
      continue;
    }
    let Some(date) = parse_import_date(date_raw) else {
      invalid_rows += 1;
      continue;
    };
    let Ok(quantity) = quantity_raw.parse::<u32>() else {
      invalid_rows += 1;
      continue;
    };

    rows.push(ImportRow {
      line,
      date: date.format("%Y-%m-%d").to_string(),
      product_name: name.to_string(),
      product_id: match_product(products, name),
      channel: SalesChannel::from_keyword(channel_raw),
      quantity,
    });
  }

  if seen == 0 {
    return Err(AppError::new("IMPORT_EMPTY", "CSV enthaelt keine Datenzeilen"));
  }

  Ok(ImportPreview {
    columns: headers.iter().map(str::to_string).collect(),
    rows,
    invalid_rows,
  })
}

/// Sums the rows per (date, product, channel) and writes each sum over the
/// stored channel value of that day. Channels not present in the import keep
/// their stored value.
pub fn apply(products: &mut [Product], preview: &ImportPreview) -> ImportSummary {
  let mut matched: BTreeMap<(String, u32), BTreeMap<SalesChannel, u32>> = BTreeMap::new();
  let mut unmatched: BTreeMap<(String, String), String> = BTreeMap::new();

  for row in &preview.rows {
    match row.product_id {
      Some(product_id) => {
        let channels = matched.entry((row.date.clone(), product_id)).or_default();
        let slot = channels.entry(row.channel).or_insert(0);
        *slot = slot.saturating_add(row.quantity);
      }
      None => {
        unmatched
          .entry((row.date.clone(), row.product_name.to_lowercase()))
          .or_insert_with(|| row.product_name.clone());
      }
    }
  }

  let mut summary = ImportSummary {
    invalid_rows: preview.invalid_rows,
    ..Default::default()
  };

  for ((date, product_id), channels) in matched {
    let Some(product) = products.iter_mut().find(|product| product.id == product_id) else {
      summary.skipped_groups += 1;
      continue;
    };
    product.update_day(&date, |day| {
      for (channel, amount) in channels {
        day.set_channel(channel, amount);
      }
    });
    summary.applied_groups += 1;
    if !summary.dates.contains(&date) {
      summary.dates.push(date);
    }
  }

  summary.skipped_groups += unmatched.len();
  let mut skipped: Vec<String> = unmatched.into_values().collect();
  skipped.sort();
  skipped.dedup();
  summary.skipped_products = skipped;
  summary.dates.sort();

  if summary.skipped_groups > 0 {
    tracing::warn!(
      skipped = summary.skipped_groups,
      products = ?summary.skipped_products,
      "import rows for unknown products skipped"
    );
  }
  summary
}

#[cfg(test)]
mod tests {
  use super::*;

  fn catalog() -> Vec<Product> {
    vec![
      Product::new(1, "Chocolate Chip", "Classic", 2.5, 0.75),
      Product::new(2, "Oatmeal Raisin", "Classic", 2.25, 0.65),
    ]
  }

  #[test]
  fn template_imports_cleanly() {
    let mut products = catalog();
    let preview = parse(TEMPLATE, &ColumnMapping::template(), &products).unwrap();
    assert_eq!(preview.rows.len(), 4);
    assert_eq!(preview.invalid_rows, 0);

    let summary = apply(&mut products, &preview);
    assert_eq!(summary.applied_groups, 2);
    assert_eq!(summary.skipped_groups, 1);
    assert_eq!(summary.skipped_products, vec!["Double Chocolate".to_string()]);

    let day = &products[0].history["2025-01-16"];
    assert_eq!(day.verkauft_ubereats, 8);
    assert_eq!(day.verkauft_location, 15);
    assert_eq!(day.sold(), 23);
    assert_eq!(products[0].sold, 23);
  }

  #[test]
  fn rows_are_summed_then_overwrite() {
    let mut products = catalog();
    products[0].day_mut("2025-01-16").set_channel(SalesChannel::Wolt, 30);
    products[0].day_mut("2025-01-16").set_channel(SalesChannel::Location, 2);

    let text = "Tag;Sorte;Kanal;Menge\n";
    let text = text.replace(';', ",")
      + "16.01.2025,chocolate chip,Wolt,4\n"
      + "2025-01-16,CHOCOLATE CHIP,wolt,3\n"
      + "2025-01-16,Chocolate Chip,Marktstand,1\n";
    let mapping = ColumnMapping {
      date: "Tag".to_string(),
      product: "Sorte".to_string(),
      channel: "Kanal".to_string(),
      quantity: "Menge".to_string(),
    };
    let preview = parse(&text, &mapping, &products).unwrap();
    let summary = apply(&mut products, &preview);
    assert_eq!(summary.applied_groups, 1);

    let day = &products[0].history["2025-01-16"];
    assert_eq!(day.verkauft_wolt, 7);
    assert_eq!(day.verkauft_location, 1);
    assert_eq!(day.sold(), 8);
  }

  #[test]
  fn invalid_rows_are_counted() {
    let text = "Datum,Cookie,Plattform,Anzahl\n\
                ,Chocolate Chip,location,1\n\
                morgen,Chocolate Chip,location,1\n\
                2025-01-16,Chocolate Chip,location,-3\n\
                2025-01-16,Chocolate Chip,location,2.5\n\
                2025-01-16,Chocolate Chip,location,6\n";
    let preview = parse(text, &ColumnMapping::template(), &catalog()).unwrap();
    assert_eq!(preview.invalid_rows, 4);
    assert_eq!(preview.rows.len(), 1);
  }

  #[test]
  fn mapping_must_name_existing_columns() {
    let mut mapping = ColumnMapping::template();
    mapping.quantity = String::new();
    assert_eq!(parse(TEMPLATE, &mapping, &catalog()).unwrap_err().code, "IMPORT_MAPPING");

    mapping.quantity = "Stueck".to_string();
    assert_eq!(parse(TEMPLATE, &mapping, &catalog()).unwrap_err().code, "IMPORT_MAPPING");
  }

  #[test]
  fn header_only_is_empty() {
    let err = parse("Datum,Cookie,Plattform,Anzahl\n", &ColumnMapping::template(), &catalog()).unwrap_err();
    assert_eq!(err.code, "IMPORT_EMPTY");
    assert_eq!(read_columns(TEMPLATE).unwrap().len(), 4);
  }
}
