use std::fs;
use std::path::Path;

use chrono::DateTime;
use csv::{QuoteStyle, Writer, WriterBuilder};

use crate::domain::costing::recipe_cost;
use crate::domain::stock::{shopping_list, ShoppingList};
use crate::error::AppError;
use crate::models::{AuditStatus, Collections, CsvReport, Ingredient, InventoryAudit, Product, ProductionPlan, Recipe};

fn writer() -> Writer<Vec<u8>> {
  WriterBuilder::new()
    .quote_style(QuoteStyle::NonNumeric)
    .from_writer(Vec::new())
}

fn finish(wtr: Writer<Vec<u8>>) -> Result<String, AppError> {
  let bytes = wtr
    .into_inner()
    .map_err(|err| AppError::new("CSV", err.to_string()))?;
  String::from_utf8(bytes).map_err(|err| AppError::new("CSV", err.to_string()))
}

fn money(value: f64) -> String {
  format!("{value:.2}")
}

fn percent(value: f64) -> String {
  format!("{value:.1}")
}

/// `DD.MM.YYYY` for an RFC 3339 timestamp; anything else is written as is.
fn german_date(timestamp: &str) -> String {
  DateTime::parse_from_rfc3339(timestamp)
    .map(|parsed| parsed.format("%d.%m.%Y").to_string())
    .unwrap_or_else(|_| timestamp.to_string())
}

/// One row per product per day, over every date any product has a record for.
pub fn daily_report(products: &[Product]) -> Result<String, AppError> {
  let mut days: Vec<&String> = products.iter().flat_map(|product| product.history.keys()).collect();
  days.sort();
  days.dedup();

  let mut wtr = writer();
  wtr.write_record([
    "Tag",
    "Cookie",
    "Kategorie",
    "Verkauft",
    "Vorbereitet",
    "Benutzt",
    "Entsorgt",
    "Neu_Produziert",
    "Verkaufspreis",
    "Produktionskosten",
    "Umsatz",
  ])?;

  for day in days {
    for product in products {
      let record = product.day(day).cloned().unwrap_or_default();
      let sold = record.sold();
      wtr.write_record([
        day.clone(),
        product.name.clone(),
        product.category.clone(),
        sold.to_string(),
        record.prepared.to_string(),
        record.used.to_string(),
        record.trash.to_string(),
        record.produziert.to_string(),
        money(product.price),
        money(product.production_price),
        money(f64::from(sold) * product.price),
      ])?;
    }
  }
  finish(wtr)
}

/// One row per product with the lifetime counters and the unit margin.
pub fn summary_report(products: &[Product]) -> Result<String, AppError> {
  let mut wtr = writer();
  wtr.write_record([
    "Cookie_Name",
    "Kategorie",
    "Gesamt_Verkauft",
    "Aktueller_Lagerbestand",
    "Vorbereitet",
    "Verkaufspreis",
    "Produktionskosten",
    "Gesamtumsatz",
    "Gewinnmarge_Euro",
    "Gewinnmarge_Prozent",
  ])?;

  for product in products {
    let margin = product.price - product.production_price;
    let margin_pct = if product.price > 0.0 { margin / product.price * 100.0 } else { 0.0 };
    wtr.write_record([
      product.name.clone(),
      product.category.clone(),
      product.sold.to_string(),
      product.stock.to_string(),
      product.prepared.to_string(),
      money(product.price),
      money(product.production_price),
      money(f64::from(product.sold) * product.price),
      money(margin),
      percent(margin_pct),
    ])?;
  }
  finish(wtr)
}

/// One row per audit line.
pub fn audit_report(audits: &[InventoryAudit]) -> Result<String, AppError> {
  let mut wtr = writer();
  wtr.write_record([
    "Datum",
    "Bearbeiter",
    "Bearbeiter_Name",
    "Cookie",
    "Soll",
    "Ist_Lager_Verpackt",
    "Ist_Lager_Versand",
    "Ist_Location",
    "Ist_Gesamt",
    "Differenz",
    "Kommentar",
    "Gesamtabweichung",
    "Status",
    "Erstellt_Am",
  ])?;

  for audit in audits {
    let status = match audit.status {
      AuditStatus::Completed => "completed",
      AuditStatus::Pending => "pending",
    };
    for line in &audit.items {
      wtr.write_record([
        audit.date.clone(),
        audit.user.clone(),
        audit.user_name.clone(),
        line.cookie.clone(),
        line.soll.to_string(),
        line.ist_lager_verpackt.unwrap_or(0).to_string(),
        line.ist_lager_versand.unwrap_or(0).to_string(),
        line.ist_location.unwrap_or(0).to_string(),
        line.ist_final.to_string(),
        line.differenz.map(|value| value.to_string()).unwrap_or_default(),
        line.kommentar.clone(),
        audit.total_difference.to_string(),
        status.to_string(),
        audit.created_at.clone(),
      ])?;
    }
  }
  finish(wtr)
}

/// One row per recipe with a quantity column for every known ingredient.
pub fn recipe_report(recipes: &[Recipe], products: &[Product], ingredients: &[Ingredient]) -> Result<String, AppError> {
  let mut header = vec![
    "Cookie_Name".to_string(),
    "Kategorie".to_string(),
    "Ausbeute_Stueck".to_string(),
    "Notizen".to_string(),
  ];
  header.extend(ingredients.iter().map(|ingredient| format!("{}_{}", ingredient.name, ingredient.unit)));
  header.push("Gesamtkosten_Euro".to_string());
  header.push("Kosten_pro_Cookie_Euro".to_string());

  let mut wtr = writer();
  wtr.write_record(&header)?;

  for recipe in recipes {
    let Some(product) = products.iter().find(|product| product.id == recipe.product_id) else {
      continue;
    };
    let cost = recipe_cost(recipe, ingredients);
    let mut row = vec![
      product.name.clone(),
      product.category.clone(),
      recipe.yield_units.to_string(),
      recipe.notes.clone(),
    ];
    row.extend(
      ingredients
        .iter()
        .map(|ingredient| recipe.ingredients.get(&ingredient.id).copied().unwrap_or(0.0).to_string()),
    );
    row.push(money(cost.batch_cost));
    row.push(format!("{:.3}", cost.cost_per_unit));
    wtr.write_record(&row)?;
  }
  finish(wtr)
}

pub fn plan_report(plans: &[ProductionPlan]) -> Result<String, AppError> {
  let mut wtr = writer();
  wtr.write_record(["Sorte", "Menge", "Deadline", "Notiz", "Status", "Erstellt_Am"])?;
  for plan in plans {
    wtr.write_record([
      plan.cookie.clone(),
      plan.menge.to_string(),
      plan.deadline.clone(),
      plan.note.clone(),
      if plan.done { "Erledigt" } else { "Offen" }.to_string(),
      german_date(&plan.created_at),
    ])?;
  }
  finish(wtr)
}

pub fn shopping_report(list: &ShoppingList) -> Result<String, AppError> {
  let mut wtr = writer();
  wtr.write_record([
    "Zutat",
    "Aktueller_Bestand",
    "Mindestbestand",
    "Empfohlene_Bestellmenge",
    "Kosten_pro_Einheit",
    "Lieferant",
    "Geschaetzte_Kosten",
  ])?;
  for item in &list.items {
    wtr.write_record([
      format!("{} ({})", item.name, item.unit),
      format!("{:.2}", item.amount),
      format!("{:.2}", item.threshold),
      format!("{:.2}", item.recommended_order),
      money(item.cost_per_unit),
      item.supplier.clone(),
      money(item.estimated_cost),
    ])?;
  }
  finish(wtr)
}

pub fn render(report: CsvReport, collections: &Collections) -> Result<String, AppError> {
  match report {
    CsvReport::Daily => daily_report(&collections.products),
    CsvReport::Summary => summary_report(&collections.products),
    CsvReport::Audits => audit_report(&collections.inventory_audits),
    CsvReport::Recipes => recipe_report(&collections.recipes, &collections.products, &collections.ingredients),
    CsvReport::ProductionPlans => plan_report(&collections.production_plans),
    CsvReport::ShoppingList => shopping_report(&shopping_list(&collections.ingredients, &collections.warn_levels)),
  }
}

pub fn file_name(report: CsvReport, today: &str) -> String {
  let stem = match report {
    CsvReport::Daily => "cookie_report",
    CsvReport::Summary => "cookie_summary",
    CsvReport::Audits => "inventurprotokoll",
    CsvReport::Recipes => "cookie_recipes",
    CsvReport::ProductionPlans => "produktionsplanung",
    CsvReport::ShoppingList => "einkaufsliste",
  };
  format!("{stem}_{today}.csv")
}

pub fn write_report(report: CsvReport, collections: &Collections, path: &Path) -> Result<(), AppError> {
  let content = render(report, collections)?;
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }
  fs::write(path, content)?;
  tracing::info!(report = ?report, path = %path.display(), "csv export written");
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::{AuditLine, SalesChannel};

  fn product() -> Product {
    let mut product = Product::new(1, "Chocolate Chip", "Classic", 2.5, 0.75);
    product.sold = 40;
    product.stock = 12;
    let day = product.day_mut("2025-01-16");
    day.set_channel(SalesChannel::Location, 15);
    day.set_channel(SalesChannel::Ubereats, 8);
    day.prepared = 30;
    day.produziert = 30;
    product
  }

  #[test]
  fn daily_report_quotes_strings_and_formats_money() {
    let csv = daily_report(&[product()]).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
      lines.next().unwrap(),
      "\"Tag\",\"Cookie\",\"Kategorie\",\"Verkauft\",\"Vorbereitet\",\"Benutzt\",\"Entsorgt\",\"Neu_Produziert\",\"Verkaufspreis\",\"Produktionskosten\",\"Umsatz\""
    );
    assert_eq!(
      lines.next().unwrap(),
      "\"2025-01-16\",\"Chocolate Chip\",\"Classic\",23,30,0,0,30,2.50,0.75,57.50"
    );
  }

  #[test]
  fn summary_report_margin() {
    let csv = summary_report(&[product()]).unwrap();
    let row = csv.lines().nth(1).unwrap();
    assert!(row.ends_with("40,12,0,2.50,0.75,100.00,1.75,70.0"));
  }

  #[test]
  fn audit_report_keeps_empty_difference() {
    let audit = InventoryAudit {
      id: "audit_1".to_string(),
      date: "2025-01-16".to_string(),
      user: "admin@cookie.com".to_string(),
      user_name: "Administrator".to_string(),
      items: vec![AuditLine {
        product_id: Some(1),
        cookie: "Lemon".to_string(),
        soll: 5,
        ist_lager_verpackt: None,
        ist_lager_versand: None,
        ist_location: None,
        ist_final: 0,
        differenz: None,
        kommentar: "nicht gezaehlt".to_string(),
      }],
      total_difference: 0,
      status: AuditStatus::Completed,
      created_at: "2025-01-16T10:00:00+00:00".to_string(),
    };
    let csv = audit_report(&[audit]).unwrap();
    let row = csv.lines().nth(1).unwrap();
    assert!(row.contains(",5,0,0,0,0,\"\",\"nicht gezaehlt\",0,\"completed\""));
  }

  #[test]
  fn plan_report_uses_german_dates() {
    let plan = ProductionPlan {
      id: 1,
      cookie: "Lemon".to_string(),
      menge: 50,
      deadline: "2025-01-18".to_string(),
      note: String::new(),
      done: true,
      created_at: "2025-01-02T08:00:00Z".to_string(),
    };
    let csv = plan_report(&[plan]).unwrap();
    assert_eq!(csv.lines().nth(1).unwrap(), "\"Lemon\",50,\"2025-01-18\",\"\",\"Erledigt\",\"02.01.2025\"");
    assert_eq!(file_name(CsvReport::ProductionPlans, "2025-01-16"), "produktionsplanung_2025-01-16.csv");
  }
}
