use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::domain::auth::default_admin;
use crate::domain::seed;
use crate::error::AppError;
use crate::models::{
  AuditLine, AuditStatus, Collections, DailyRecord, Ingredient, InventoryAudit, Permissions, Product, ProductionPlan,
  Recipe, Role, Settings, Todo, User, WarnLevels, WebsiteSettings, SCHEMA_VERSION,
};

/// Brings a stored or exported document to the current record shapes.
///
/// Documents stamped with the current `schema_version` decode directly.
/// Unversioned documents come from the browser era (camelCase keys, a stored
/// `sold` total, `new` next to `produziert`, `sollBestand`, `password`) and go
/// through the legacy converters once. Collections missing from a legacy
/// document keep their seed defaults.
pub fn upgrade(doc: Value, now: DateTime<Utc>) -> Result<Collections, AppError> {
  match doc.get("schema_version").and_then(Value::as_u64) {
    Some(version) if version == u64::from(SCHEMA_VERSION) => {
      let mut collections: Collections = serde_json::from_value(doc)?;
      ensure_login_possible(&mut collections, now);
      Ok(collections)
    }
    Some(version) if version > u64::from(SCHEMA_VERSION) => Err(AppError::new(
      "UNSUPPORTED_SCHEMA",
      format!("Datenstand Version {version} ist neuer als diese Version ({SCHEMA_VERSION})"),
    )),
    _ => from_legacy(doc, now),
  }
}

/// Seeds the default admin when no user is left to log in. Returns whether
/// the users changed.
pub fn ensure_login_possible(collections: &mut Collections, now: DateTime<Utc>) -> bool {
  if collections.users.is_empty() {
    collections.users.push(default_admin(now));
    return true;
  }
  false
}

#[derive(Deserialize, Default)]
struct LegacyDocument {
  #[serde(default, alias = "products")]
  cookies: Option<Vec<LegacyCookie>>,
  #[serde(default)]
  settings: Option<LegacySettings>,
  #[serde(default, alias = "websiteSettings")]
  website_settings: Option<LegacyWebsiteSettings>,
  #[serde(default)]
  ingredients: Option<Vec<LegacyIngredient>>,
  #[serde(default, alias = "inventoryAudits")]
  inventory_audits: Option<Vec<LegacyAudit>>,
  #[serde(default, alias = "warnLevels")]
  warn_levels: Option<BTreeMap<String, f64>>,
  #[serde(default)]
  recipes: Option<Vec<LegacyRecipe>>,
  #[serde(default, alias = "cookieToDos")]
  todos: Option<Vec<LegacyTodo>>,
  #[serde(default, alias = "cookieProdPlans")]
  production_plans: Option<Vec<LegacyPlan>>,
  #[serde(default)]
  users: Option<Vec<LegacyUser>>,
}

#[derive(Deserialize)]
struct LegacyCookie {
  id: u32,
  name: String,
  #[serde(default)]
  category: Option<String>,
  #[serde(default)]
  price: f64,
  #[serde(default, alias = "productionPrice")]
  production_price: f64,
  #[serde(default)]
  sold: f64,
  #[serde(default)]
  stock: f64,
  #[serde(default)]
  prepared: f64,
  #[serde(default, alias = "sollBestand")]
  target_stock: Option<f64>,
  #[serde(default)]
  history: BTreeMap<String, LegacyDay>,
}

#[derive(Deserialize, Default)]
struct LegacyDay {
  #[serde(default)]
  sold: Option<f64>,
  #[serde(default)]
  legacy_sold: Option<f64>,
  #[serde(default)]
  prepared: f64,
  #[serde(default)]
  used: f64,
  #[serde(default)]
  trash: f64,
  #[serde(default)]
  new: Option<f64>,
  #[serde(default)]
  produziert: Option<f64>,
  #[serde(default)]
  verkauft_location: f64,
  #[serde(default)]
  verkauft_ubereats: f64,
  #[serde(default)]
  verkauft_wolt: f64,
  #[serde(default)]
  verkauft_lieferando: f64,
  #[serde(default)]
  verkauft_website: f64,
  #[serde(default)]
  mitarbeiter_verbrauch: f64,
  #[serde(default)]
  inventur: Option<f64>,
}

#[derive(Deserialize)]
struct LegacySettings {
  #[serde(default, alias = "costPerCookie")]
  cost_per_cookie: Option<f64>,
  #[serde(default, alias = "costPerHour")]
  cost_per_hour: Option<f64>,
}

#[derive(Deserialize)]
struct LegacyWebsiteSettings {
  #[serde(default, alias = "companyName")]
  company_name: Option<String>,
  #[serde(default)]
  logo: Option<String>,
  #[serde(default, alias = "backgroundColor")]
  background_color: Option<String>,
  #[serde(default, alias = "textColor")]
  text_color: Option<String>,
  #[serde(default, alias = "buttonBgColor")]
  button_bg_color: Option<String>,
}

#[derive(Deserialize)]
struct LegacyIngredient {
  id: u32,
  name: String,
  #[serde(default)]
  amount: f64,
  #[serde(default)]
  unit: String,
  #[serde(default, alias = "minStock")]
  min_stock: f64,
  #[serde(default, alias = "costPerUnit")]
  cost_per_unit: f64,
  #[serde(default)]
  supplier: Option<String>,
  #[serde(default, alias = "lastUpdated")]
  last_updated: Option<String>,
  #[serde(default, alias = "bestände")]
  bestaende: Option<BTreeMap<String, Option<f64>>>,
}

#[derive(Deserialize)]
struct LegacyAudit {
  id: String,
  date: String,
  #[serde(default)]
  user: String,
  #[serde(default, alias = "userName")]
  user_name: String,
  #[serde(default)]
  items: Vec<LegacyAuditItem>,
  #[serde(default, alias = "createdAt")]
  created_at: Option<String>,
}

#[derive(Deserialize)]
struct LegacyAuditItem {
  #[serde(default)]
  product_id: Option<u32>,
  cookie: String,
  #[serde(default)]
  soll: f64,
  #[serde(default)]
  ist_lager_verpackt: Option<f64>,
  #[serde(default)]
  ist_lager_versand: Option<f64>,
  #[serde(default)]
  ist_location: Option<f64>,
  #[serde(default)]
  ist_final: Option<f64>,
  #[serde(default)]
  ist: Option<f64>,
  #[serde(default)]
  differenz: Option<f64>,
  #[serde(default)]
  kommentar: String,
}

#[derive(Deserialize)]
struct LegacyRecipe {
  #[serde(alias = "cookieId")]
  product_id: u32,
  #[serde(default)]
  ingredients: BTreeMap<String, f64>,
  #[serde(default, rename = "yield")]
  yield_units: Option<f64>,
  #[serde(default)]
  notes: String,
}

#[derive(Deserialize)]
struct LegacyTodo {
  id: i64,
  text: String,
  #[serde(default)]
  date: String,
  #[serde(default)]
  info: String,
  #[serde(default)]
  done: bool,
  #[serde(default, alias = "createdAt")]
  created_at: String,
}

#[derive(Deserialize)]
struct LegacyPlan {
  id: i64,
  cookie: String,
  #[serde(default)]
  menge: f64,
  #[serde(default)]
  deadline: String,
  #[serde(default)]
  note: String,
  #[serde(default)]
  done: bool,
  #[serde(default, alias = "createdAt")]
  created_at: String,
}

#[derive(Deserialize)]
struct LegacyUser {
  id: u32,
  email: String,
  #[serde(alias = "password")]
  login_code: String,
  role: Role,
  name: String,
  #[serde(default)]
  permissions: Option<Permissions>,
  #[serde(default, alias = "createdAt")]
  created_at: Option<String>,
  #[serde(default, alias = "lastLogin")]
  last_login: Option<String>,
  #[serde(default = "default_true", alias = "isActive")]
  is_active: bool,
}

fn default_true() -> bool {
  true
}

/// Browser numbers arrive as floats; counters are whole and never negative.
fn count(value: f64) -> u32 {
  if value.is_finite() && value > 0.0 {
    value.round().min(f64::from(u32::MAX)) as u32
  } else {
    0
  }
}

fn migrate_day(day: LegacyDay) -> DailyRecord {
  let mut record = DailyRecord {
    verkauft_location: count(day.verkauft_location),
    verkauft_ubereats: count(day.verkauft_ubereats),
    verkauft_wolt: count(day.verkauft_wolt),
    verkauft_lieferando: count(day.verkauft_lieferando),
    verkauft_website: count(day.verkauft_website),
    mitarbeiter_verbrauch: count(day.mitarbeiter_verbrauch),
    prepared: count(day.prepared),
    produziert: count(day.produziert.or(day.new).unwrap_or(0.0)),
    trash: count(day.trash),
    used: count(day.used),
    inventur: day.inventur.map(count),
    legacy_sold: None,
  };
  if !record.has_channel_data() {
    let stored = day.legacy_sold.or(day.sold).map(count).unwrap_or(0);
    if stored > 0 {
      record.legacy_sold = Some(stored);
    }
  }
  record
}

fn migrate_cookie(cookie: LegacyCookie) -> Product {
  Product {
    id: cookie.id,
    name: cookie.name,
    category: cookie.category.unwrap_or_else(|| "Classic".to_string()),
    price: cookie.price,
    production_price: cookie.production_price,
    sold: count(cookie.sold),
    stock: count(cookie.stock),
    prepared: count(cookie.prepared),
    target_stock: cookie.target_stock.map(|value| value.round() as i64),
    history: cookie
      .history
      .into_iter()
      .map(|(date, day)| (date, migrate_day(day)))
      .collect(),
  }
}

fn migrate_ingredient(ingredient: LegacyIngredient, today: &str) -> Ingredient {
  let bestaende = ingredient.bestaende.map(|locations| {
    locations
      .into_iter()
      .filter_map(|(location, amount)| amount.map(|amount| (location, amount.max(0.0))))
      .collect()
  });
  Ingredient {
    id: ingredient.id,
    name: ingredient.name,
    amount: ingredient.amount.max(0.0),
    unit: ingredient.unit,
    min_stock: ingredient.min_stock,
    cost_per_unit: ingredient.cost_per_unit,
    supplier: ingredient
      .supplier
      .filter(|value| !value.trim().is_empty())
      .unwrap_or_else(|| "Unbekannt".to_string()),
    last_updated: ingredient.last_updated.unwrap_or_else(|| today.to_string()),
    bestaende,
  }
}

fn migrate_audit(audit: LegacyAudit, products: &[Product], now: DateTime<Utc>) -> InventoryAudit {
  let items: Vec<AuditLine> = audit
    .items
    .into_iter()
    .map(|item| {
      let verpackt = item.ist_lager_verpackt.map(count);
      let versand = item.ist_lager_versand.map(count);
      let location = item.ist_location.map(count);
      let ist_final = item
        .ist_final
        .or(item.ist)
        .map(count)
        .unwrap_or_else(|| verpackt.unwrap_or(0) + versand.unwrap_or(0) + location.unwrap_or(0));
      let product_id = item.product_id.or_else(|| {
        products
          .iter()
          .find(|product| product.name == item.cookie)
          .map(|product| product.id)
      });
      AuditLine {
        product_id,
        cookie: item.cookie,
        soll: item.soll.round() as i64,
        ist_lager_verpackt: verpackt,
        ist_lager_versand: versand,
        ist_location: location,
        ist_final,
        differenz: item.differenz.map(|value| value.round() as i64),
        kommentar: item.kommentar,
      }
    })
    .collect();

  let total_difference = items.iter().filter_map(|line| line.differenz).map(i64::abs).sum();
  InventoryAudit {
    id: audit.id,
    date: audit.date,
    user: audit.user,
    user_name: audit.user_name,
    items,
    total_difference,
    status: AuditStatus::Completed,
    created_at: audit.created_at.unwrap_or_else(|| now.to_rfc3339()),
  }
}

fn migrate_recipe(recipe: LegacyRecipe) -> Recipe {
  Recipe {
    product_id: recipe.product_id,
    ingredients: recipe
      .ingredients
      .into_iter()
      .filter_map(|(id, qty)| id.trim().parse::<u32>().ok().map(|id| (id, qty.max(0.0))))
      .filter(|(_, qty)| *qty > 0.0)
      .collect(),
    yield_units: recipe.yield_units.map(count).filter(|value| *value > 0).unwrap_or(100),
    notes: recipe.notes,
  }
}

fn migrate_user(user: LegacyUser, now: DateTime<Utc>) -> User {
  User {
    permissions: user
      .permissions
      .unwrap_or_else(|| Permissions::for_role(user.role)),
    id: user.id,
    email: user.email,
    login_code: user.login_code,
    role: user.role,
    name: user.name,
    created_at: user.created_at.unwrap_or_else(|| now.to_rfc3339()),
    last_login: user.last_login,
    is_active: user.is_active,
  }
}

fn from_legacy(doc: Value, now: DateTime<Utc>) -> Result<Collections, AppError> {
  let legacy: LegacyDocument = serde_json::from_value(doc)?;
  let today = now.date_naive().format("%Y-%m-%d").to_string();
  let mut collections = seed::collections(now);

  if let Some(cookies) = legacy.cookies.filter(|items| !items.is_empty()) {
    collections.products = cookies.into_iter().map(migrate_cookie).collect();
    collections.recipes = seed::recipes(&collections.products);
  }
  if let Some(settings) = legacy.settings {
    let defaults = Settings::default();
    collections.settings = Settings {
      cost_per_cookie: settings.cost_per_cookie.unwrap_or(defaults.cost_per_cookie),
      cost_per_hour: settings.cost_per_hour.unwrap_or(defaults.cost_per_hour),
    };
  }
  if let Some(website) = legacy.website_settings {
    let defaults = WebsiteSettings::default();
    collections.website_settings = WebsiteSettings {
      company_name: website.company_name.unwrap_or(defaults.company_name),
      logo: website.logo.filter(|logo| !logo.is_empty()),
      background_color: website.background_color.unwrap_or(defaults.background_color),
      text_color: website.text_color.unwrap_or(defaults.text_color),
      button_bg_color: website.button_bg_color.unwrap_or(defaults.button_bg_color),
    };
  }
  if let Some(ingredients) = legacy.ingredients.filter(|items| !items.is_empty()) {
    collections.ingredients = ingredients
      .into_iter()
      .map(|ingredient| migrate_ingredient(ingredient, &today))
      .collect();
  }
  if let Some(audits) = legacy.inventory_audits {
    collections.inventory_audits = audits
      .into_iter()
      .map(|audit| migrate_audit(audit, &collections.products, now))
      .collect();
  }
  if let Some(levels) = legacy.warn_levels {
    collections.warn_levels = levels
      .into_iter()
      .map(|(name, level)| (name, count(level)))
      .collect::<WarnLevels>();
  }
  if let Some(recipes) = legacy.recipes.filter(|items| !items.is_empty()) {
    collections.recipes = recipes.into_iter().map(migrate_recipe).collect();
  }
  if let Some(todos) = legacy.todos {
    collections.todos = todos
      .into_iter()
      .map(|todo| Todo {
        id: todo.id,
        text: todo.text,
        date: todo.date,
        info: todo.info,
        done: todo.done,
        created_at: todo.created_at,
      })
      .collect();
  }
  if let Some(plans) = legacy.production_plans {
    collections.production_plans = plans
      .into_iter()
      .map(|plan| ProductionPlan {
        id: plan.id,
        cookie: plan.cookie,
        menge: count(plan.menge),
        deadline: plan.deadline,
        note: plan.note,
        done: plan.done,
        created_at: plan.created_at,
      })
      .collect();
  }
  if let Some(users) = legacy.users.filter(|items| !items.is_empty()) {
    collections.users = users.into_iter().map(|user| migrate_user(user, now)).collect();
  }
  ensure_login_possible(&mut collections, now);

  tracing::info!(
    products = collections.products.len(),
    audits = collections.inventory_audits.len(),
    "legacy document migrated"
  );
  Ok(collections)
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn legacy_browser_export_is_converted() {
    let doc = json!({
      "cookies": [{
        "id": 1,
        "name": "Chocolate Chip",
        "sold": 12,
        "stock": 5,
        "prepared": 3,
        "price": 2.5,
        "productionPrice": 0.75,
        "category": "Classic",
        "sollBestand": 18,
        "history": {
          "2025-01-10": { "sold": 7, "prepared": 10, "used": 0, "trash": 1, "new": 10 },
          "2025-01-11": { "sold": 99, "prepared": 0, "used": 0, "trash": 0, "new": 4, "produziert": 5,
                          "verkauft_location": 3, "verkauft_wolt": 2 }
        }
      }],
      "settings": { "costPerCookie": 0.8, "costPerHour": 55 },
      "ingredients": [{ "id": 1, "name": "Mehl", "amount": -2, "unit": "kg", "minStock": 10,
                        "costPerUnit": 0.85, "supplier": "", "lastUpdated": "2025-01-01",
                        "bestände": { "hauptlager": 20.5, "filiale1": null } }],
      "inventoryAudits": [{ "id": "audit_1", "date": "2025-01-12", "user": "admin@cookie.com",
                            "userName": "Administrator", "status": "completed",
                            "items": [{ "cookie": "Chocolate Chip", "soll": 20, "ist": 15, "differenz": -5, "kommentar": "" }],
                            "totalDifference": 5, "createdAt": "2025-01-12T10:00:00Z" }],
      "warnLevels": { "Chocolate Chip": 20 },
      "recipes": [{ "cookieId": 1, "ingredients": { "1": 2.5 }, "yield": 50, "notes": "" }],
      "cookieToDos": [{ "id": 1700000000000_i64, "text": "Butter bestellen", "date": "2025-01-13",
                        "info": "", "done": false, "createdAt": "2025-01-12T08:00:00Z" }],
      "users": [{ "id": 2, "email": "m@cookie.com", "password": "7777", "role": "mitarbeiter",
                  "name": "Mia", "createdAt": "2025-01-01T00:00:00Z", "isActive": true }],
      "exportDate": "2025-01-12T12:00:00Z"
    });

    let collections = upgrade(doc, Utc::now()).unwrap();
    let chip = &collections.products[0];
    assert_eq!(chip.target_stock, Some(18));
    assert_eq!(chip.production_price, 0.75);

    let first = &chip.history["2025-01-10"];
    assert_eq!(first.sold(), 7);
    assert_eq!(first.produziert, 10);

    let second = &chip.history["2025-01-11"];
    assert_eq!(second.sold(), 5);
    assert_eq!(second.legacy_sold, None);
    assert_eq!(second.produziert, 5);

    assert_eq!(collections.settings.cost_per_hour, 55.0);
    assert_eq!(collections.ingredients[0].amount, 0.0);
    assert_eq!(collections.ingredients[0].supplier, "Unbekannt");
    assert_eq!(collections.ingredients[0].bestaende.as_ref().map(|b| b.len()), Some(1));

    let line = &collections.inventory_audits[0].items[0];
    assert_eq!(line.ist_final, 15);
    assert_eq!(line.product_id, Some(1));
    assert_eq!(collections.inventory_audits[0].total_difference, 5);

    assert_eq!(collections.recipes[0].yield_units, 50);
    assert_eq!(collections.recipes[0].ingredients.get(&1), Some(&2.5));
    assert_eq!(collections.todos.len(), 1);
    assert_eq!(collections.users[0].login_code, "7777");
    assert_eq!(collections.users[0].permissions, Permissions::employee());
  }

  #[test]
  fn missing_collections_keep_seed_defaults() {
    let collections = upgrade(json!({ "settings": { "costPerHour": 40 } }), Utc::now()).unwrap();
    assert_eq!(collections.products.len(), 9);
    assert_eq!(collections.settings.cost_per_cookie, 0.7);
    assert_eq!(collections.settings.cost_per_hour, 40.0);
    assert_eq!(collections.users.len(), 1);
  }

  #[test]
  fn current_documents_decode_directly() {
    let seeded = seed::collections(Utc::now());
    let mut doc = serde_json::to_value(&seeded).unwrap();
    doc["schema_version"] = json!(SCHEMA_VERSION);
    assert_eq!(upgrade(doc, Utc::now()).unwrap(), seeded);
  }

  #[test]
  fn current_document_without_users_gets_default_admin() {
    let mut doc = serde_json::to_value(seed::collections(Utc::now())).unwrap();
    doc["schema_version"] = json!(SCHEMA_VERSION);
    doc["users"] = json!([]);
    let collections = upgrade(doc, Utc::now()).unwrap();
    assert_eq!(collections.users.len(), 1);
    assert_eq!(collections.users[0].login_code, "12345");
  }

  #[test]
  fn newer_documents_are_refused() {
    let err = upgrade(json!({ "schema_version": SCHEMA_VERSION + 1 }), Utc::now()).unwrap_err();
    assert_eq!(err.code, "UNSUPPORTED_SCHEMA");
  }
}
