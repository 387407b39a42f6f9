use std::path::Path;

use chrono::{Datelike, NaiveDate};
use rust_xlsxwriter::{Color, ExcelDateTime, Format, FormatAlign, Workbook, Worksheet};

use crate::domain::sales::{aggregate, SalesQuery};
use crate::error::AppError;
use crate::models::{Collections, InventoryAudit, Product, SalesChannel};

const MONEY: &str = "[$EUR] #,##0.00";

fn title_format() -> Format {
  Format::new()
    .set_bold()
    .set_font_color(Color::White)
    .set_background_color(Color::RGB(0x78350F))
}

fn header_format() -> Format {
  Format::new()
    .set_bold()
    .set_background_color(Color::RGB(0xFEF3C7))
    .set_align(FormatAlign::Center)
}

/// Writes the report workbook: per-day details, a per-product summary and
/// the audit log.
pub fn export_report(collections: &Collections, path: &Path) -> Result<(), AppError> {
  let mut workbook = Workbook::new();
  write_daily_sheet(&mut workbook, &collections.products)?;
  write_summary_sheet(&mut workbook, &collections.products)?;
  write_audit_sheet(&mut workbook, &collections.inventory_audits)?;

  workbook
    .save(path)
    .map_err(|err| AppError::new("EXPORT", err.to_string()))?;
  tracing::info!(path = %path.display(), "excel report written");
  Ok(())
}

fn write_daily_sheet(workbook: &mut Workbook, products: &[Product]) -> Result<(), AppError> {
  let sheet = workbook.add_worksheet();
  sheet
    .set_name("Tagesdetails")
    .map_err(|err| AppError::new("EXPORT", err.to_string()))?;

  let header = header_format();
  let money = Format::new().set_num_format(MONEY);
  let date_format = Format::new().set_num_format("dd.mm.yyyy");

  let mut headers = vec!["Datum", "Cookie", "Kategorie"];
  headers.extend(SalesChannel::ALL.iter().map(|channel| channel.label()));
  headers.extend(["Verkauft", "Vorbereitet", "Produziert", "Entsorgt", "Benutzt", "Umsatz"]);
  for (idx, label) in headers.iter().enumerate() {
    sheet.write_string_with_format(0, idx as u16, *label, &header)?;
  }

  let mut days: Vec<&String> = products.iter().flat_map(|product| product.history.keys()).collect();
  days.sort();
  days.dedup();

  let mut row = 1;
  for day in days {
    for product in products {
      let Some(record) = product.day(day) else {
        continue;
      };
      write_date(sheet, row, 0, day, &date_format)?;
      sheet.write_string(row, 1, &product.name)?;
      sheet.write_string(row, 2, &product.category)?;
      let mut col = 3;
      for channel in SalesChannel::ALL {
        sheet.write_number(row, col, f64::from(record.channel(channel)))?;
        col += 1;
      }
      let sold = record.sold();
      sheet.write_number(row, col, f64::from(sold))?;
      sheet.write_number(row, col + 1, f64::from(record.prepared))?;
      sheet.write_number(row, col + 2, f64::from(record.produziert))?;
      sheet.write_number(row, col + 3, f64::from(record.trash))?;
      sheet.write_number(row, col + 4, f64::from(record.used))?;
      sheet.write_number_with_format(row, col + 5, f64::from(sold) * product.price, &money)?;
      row += 1;
    }
  }

  let last_col = headers.len() as u16 - 1;
  sheet.set_column_width(0, 12)?;
  sheet.set_column_width(1, 28)?;
  sheet.set_column_width(2, 14)?;
  for col in 3..=last_col {
    sheet.set_column_width(col, 12)?;
  }
  if row > 1 {
    sheet.autofilter(0, 0, row - 1, last_col)?;
  }
  sheet.set_freeze_panes(1, 0)?;
  Ok(())
}

fn write_summary_sheet(workbook: &mut Workbook, products: &[Product]) -> Result<(), AppError> {
  let report = aggregate(products, &SalesQuery::default());

  let sheet = workbook.add_worksheet();
  sheet
    .set_name("Zusammenfassung")
    .map_err(|err| AppError::new("EXPORT", err.to_string()))?;

  let title = title_format();
  let header = header_format();
  let label = Format::new().set_bold();
  let money = Format::new().set_num_format(MONEY);

  sheet.merge_range(0, 0, 0, 7, "Cookie Report", &title)?;

  let kpis = [
    ("Verkauft gesamt", report.totals.total_sales as f64, false),
    ("Mitarbeiterverbrauch", report.totals.staff_consumption as f64, false),
    ("Produziert", report.totals.produced as f64, false),
    ("Umsatz", report.totals.revenue, true),
    ("Produktionskosten", report.totals.production_cost, true),
    ("Marge", report.totals.margin, true),
  ];
  let mut row = 2;
  for (text, value, is_money) in kpis {
    sheet.write_string_with_format(row, 0, text, &label)?;
    if is_money {
      sheet.write_number_with_format(row, 1, value, &money)?;
    } else {
      sheet.write_number(row, 1, value)?;
    }
    row += 1;
  }

  row += 1;
  let headers = [
    "Cookie",
    "Kategorie",
    "Verkauft",
    "Produziert",
    "Entsorgt",
    "Umsatz",
    "Produktionskosten",
    "Marge",
  ];
  for (idx, text) in headers.iter().enumerate() {
    sheet.write_string_with_format(row, idx as u16, *text, &header)?;
  }
  row += 1;

  for item in &report.products {
    sheet.write_string(row, 0, &item.name)?;
    sheet.write_string(row, 1, &item.category)?;
    sheet.write_number(row, 2, item.total_sales as f64)?;
    sheet.write_number(row, 3, item.produced as f64)?;
    sheet.write_number(row, 4, item.trash as f64)?;
    sheet.write_number_with_format(row, 5, item.revenue, &money)?;
    sheet.write_number_with_format(row, 6, item.production_cost, &money)?;
    sheet.write_number_with_format(row, 7, item.margin, &money)?;
    row += 1;
  }

  sheet.set_column_width(0, 28)?;
  sheet.set_column_width(1, 16)?;
  for col in 2..=7 {
    sheet.set_column_width(col, 16)?;
  }
  Ok(())
}

fn write_audit_sheet(workbook: &mut Workbook, audits: &[InventoryAudit]) -> Result<(), AppError> {
  let sheet = workbook.add_worksheet();
  sheet
    .set_name("Inventur")
    .map_err(|err| AppError::new("EXPORT", err.to_string()))?;

  let header = header_format();
  let date_format = Format::new().set_num_format("dd.mm.yyyy");

  let headers = [
    "Datum",
    "Bearbeiter",
    "Cookie",
    "Soll",
    "Lager verpackt",
    "Lager Versand",
    "Location",
    "Ist",
    "Differenz",
    "Kommentar",
  ];
  for (idx, text) in headers.iter().enumerate() {
    sheet.write_string_with_format(0, idx as u16, *text, &header)?;
  }

  let mut row = 1;
  for audit in audits {
    for line in &audit.items {
      write_date(sheet, row, 0, &audit.date, &date_format)?;
      sheet.write_string(row, 1, &audit.user_name)?;
      sheet.write_string(row, 2, &line.cookie)?;
      sheet.write_number(row, 3, line.soll as f64)?;
      for (offset, count) in [line.ist_lager_verpackt, line.ist_lager_versand, line.ist_location]
        .into_iter()
        .enumerate()
      {
        if let Some(value) = count {
          sheet.write_number(row, 4 + offset as u16, f64::from(value))?;
        }
      }
      sheet.write_number(row, 7, f64::from(line.ist_final))?;
      if let Some(diff) = line.differenz {
        sheet.write_number(row, 8, diff as f64)?;
      }
      sheet.write_string(row, 9, &line.kommentar)?;
      row += 1;
    }
  }

  sheet.set_column_width(0, 12)?;
  sheet.set_column_width(1, 20)?;
  sheet.set_column_width(2, 28)?;
  sheet.set_column_width(9, 32)?;
  sheet.set_freeze_panes(1, 0)?;
  Ok(())
}

fn write_date(sheet: &mut Worksheet, row: u32, col: u16, date: &str, format: &Format) -> Result<(), AppError> {
  let parsed = NaiveDate::parse_from_str(date, "%Y-%m-%d")
    .map_err(|_| AppError::new("INVALID_DATE", format!("Ungueltiges Datum: {date}")))?;
  let year = u16::try_from(parsed.year()).map_err(|_| AppError::new("INVALID_DATE", "Ungueltiges Datum"))?;
  let date = ExcelDateTime::from_ymd(year, parsed.month() as u8, parsed.day() as u8)
    .map_err(|err| AppError::new("EXPORT", err.to_string()))?;
  sheet.write_datetime_with_format(row, col, &date, format)?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use std::fs::File;
  use std::io::Read;

  use super::*;
  use crate::domain::seed;

  #[test]
  fn workbook_has_three_sheets() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.xlsx");

    let mut collections = seed::collections(chrono::Utc::now());
    let day = collections.products[0].day_mut("2025-01-16");
    day.set_channel(SalesChannel::Location, 4);
    day.produziert = 10;

    export_report(&collections, &path).unwrap();

    let mut archive = zip::ZipArchive::new(File::open(&path).unwrap()).unwrap();
    let mut workbook_xml = String::new();
    archive
      .by_name("xl/workbook.xml")
      .unwrap()
      .read_to_string(&mut workbook_xml)
      .unwrap();
    assert!(workbook_xml.contains("Tagesdetails"));
    assert!(workbook_xml.contains("Zusammenfassung"));
    assert!(workbook_xml.contains("Inventur"));
  }
}
