use std::fs;
use std::path::{Path, PathBuf};

use chrono::{Local, NaiveDate, Utc};
use serde::Serialize;

use crate::audit::log::{self, append_activity, ActivityEntry, AuditLog};
use crate::db;
use crate::domain::auth;
use crate::domain::costing::{self, CostBreakdown, RecipeCost};
use crate::domain::planning::{self, PlanBoard, TodoBoard};
use crate::domain::production::{self, AvailabilityCheck, ProductionOutcome};
use crate::domain::reconciliation::{self, AuditPreview};
use crate::domain::sales::{self, DayTotals, DrilldownRow, SalesQuery, SalesReport};
use crate::domain::stock::{self, IngredientOverview, ShoppingList, DEFAULT_WARN_LEVEL};
use crate::domain::validation::{
  date_or_today, ensure_amount_non_negative, ensure_count, ensure_delta, ensure_name, ensure_quantity_positive,
  parse_date, today,
};
use crate::domain::seed;
use crate::error::AppError;
use crate::export::{csv, excel};
use crate::files::backup;
use crate::import::sales_csv::{self, ImportInput, ImportPreview, ImportSummary};
use crate::models::*;
use crate::reports::{self, Dashboard, DashboardFilter};
use crate::settings::{self, ColorPreset, PRESETS};
use crate::state::{Activity, AppState};

const DEFAULT_PRICE: f64 = 2.5;
const DEFAULT_PRODUCTION_PRICE: f64 = 0.7;
const DEFAULT_CATEGORY: &str = "Classic";
const DEFAULT_ACTIVITY_LIMIT: u32 = 100;

fn today_date() -> NaiveDate {
  Local::now().date_naive()
}

fn product_mut(products: &mut [Product], id: u32) -> Result<&mut Product, AppError> {
  products
    .iter_mut()
    .find(|product| product.id == id)
    .ok_or_else(|| AppError::not_found(format!("Produkt {id} nicht gefunden")))
}

fn ingredient_mut(ingredients: &mut [Ingredient], id: u32) -> Result<&mut Ingredient, AppError> {
  ingredients
    .iter_mut()
    .find(|ingredient| ingredient.id == id)
    .ok_or_else(|| AppError::not_found(format!("Zutat {id} nicht gefunden")))
}

fn next_id(ids: impl Iterator<Item = u32>) -> u32 {
  ids.max().unwrap_or(0) + 1
}

/// Task ids are creation timestamps in milliseconds, bumped past the
/// largest existing id when two tasks land in the same millisecond.
fn next_task_id(ids: impl Iterator<Item = i64>) -> i64 {
  let now = Utc::now().timestamp_millis();
  match ids.max() {
    Some(max) if max >= now => max + 1,
    _ => now,
  }
}

fn ensure_unique_product_name(products: &[Product], name: &str, except_id: Option<u32>) -> Result<(), AppError> {
  let lowered = name.to_lowercase();
  if products
    .iter()
    .any(|product| Some(product.id) != except_id && product.name.to_lowercase() == lowered)
  {
    return Err(AppError::new("DUPLICATE_NAME", format!("Cookie {name} existiert bereits")));
  }
  Ok(())
}

fn optional_date(value: Option<&str>) -> Result<Option<String>, AppError> {
  match value.map(str::trim).filter(|value| !value.is_empty()) {
    Some(value) => Ok(Some(parse_date(value)?.format("%Y-%m-%d").to_string())),
    None => Ok(None),
  }
}

fn ensure_daily_counts(values: &DailyUpdate) -> Result<(), AppError> {
  for (field, value) in values.fields() {
    if let Some(value) = value {
      ensure_count(value, field)?;
    }
  }
  Ok(())
}

fn ensure_sheet_counts(sheet: &AuditSheet) -> Result<(), AppError> {
  for count in sheet.counts.values() {
    for value in count.values().into_iter().flatten() {
      ensure_count(value, "Zaehlmenge")?;
    }
  }
  Ok(())
}

/// Records a read-only action (exports, backups) in the activity log.
fn log_activity<T: Serialize>(
  state: &AppState,
  actor: Option<String>,
  action: &str,
  entity_id: Option<String>,
  payload: &T,
) -> Result<(), AppError> {
  let payload_json = serde_json::to_string(payload).unwrap_or_else(|_| "{}".to_string());
  db::with_conn(&state.db, |conn| {
    append_activity(conn, actor, action, "EXPORT", entity_id, payload_json)
  })
}

// Products

pub fn list_products(state: &AppState) -> Result<Vec<Product>, AppError> {
  state.read(|c| c.products.clone())
}

pub fn get_product(state: &AppState, input: IdInput) -> Result<Product, AppError> {
  state
    .read(|c| c.products.iter().find(|product| product.id == input.id).cloned())?
    .ok_or_else(|| AppError::not_found(format!("Produkt {} nicht gefunden", input.id)))
}

pub fn add_product(state: &AppState, input: ProductInput, actor: Option<String>) -> Result<Product, AppError> {
  let name = ensure_name(&input.name, "Name")?;
  let category = match input.category.as_deref() {
    Some(category) => ensure_name(category, "Kategorie")?,
    None => DEFAULT_CATEGORY.to_string(),
  };
  let price = input.price.unwrap_or(DEFAULT_PRICE);
  let production_price = input.production_price.unwrap_or(DEFAULT_PRODUCTION_PRICE);
  ensure_amount_non_negative(price, "Preis")?;
  ensure_amount_non_negative(production_price, "Produktionspreis")?;

  let activity = Activity::new("PRODUCT_ADD", "product")
    .actor(actor)
    .entity(&name)
    .payload(&input);
  state.mutate(&[db::KEY_PRODUCTS, db::KEY_WARN_LEVELS, db::KEY_RECIPES], activity, |c| {
    ensure_unique_product_name(&c.products, &name, None)?;
    let id = next_id(c.products.iter().map(|product| product.id));
    let product = Product::new(id, &name, &category, price, production_price);

    c.warn_levels
      .insert(name.clone(), input.warn_level.unwrap_or(DEFAULT_WARN_LEVEL));
    c.recipes.retain(|recipe| recipe.product_id != id);
    c.recipes.push(Recipe::empty(id));
    c.products.push(product.clone());
    Ok(product)
  })
}

/// Renaming a product carries its warn level and open plans along.
pub fn update_product(state: &AppState, input: ProductUpdateInput, actor: Option<String>) -> Result<Product, AppError> {
  let name = input.name.as_deref().map(|name| ensure_name(name, "Name")).transpose()?;
  let category = input
    .category
    .as_deref()
    .map(|category| ensure_name(category, "Kategorie"))
    .transpose()?;
  if let Some(price) = input.price {
    ensure_amount_non_negative(price, "Preis")?;
  }
  if let Some(price) = input.production_price {
    ensure_amount_non_negative(price, "Produktionspreis")?;
  }

  let activity = Activity::new("PRODUCT_UPDATE", "product")
    .actor(actor)
    .entity(input.id)
    .payload(&input);
  let keys = [db::KEY_PRODUCTS, db::KEY_WARN_LEVELS, db::KEY_PRODUCTION_PLANS];
  state.mutate(&keys, activity, |c| {
    if let Some(name) = name.as_deref() {
      ensure_unique_product_name(&c.products, name, Some(input.id))?;
    }
    let product = product_mut(&mut c.products, input.id)?;
    let old_name = product.name.clone();

    if let Some(name) = name {
      product.name = name;
    }
    if let Some(category) = category {
      product.category = category;
    }
    if let Some(price) = input.price {
      product.price = price;
    }
    if let Some(price) = input.production_price {
      product.production_price = price;
    }
    let updated = product.clone();

    if updated.name != old_name {
      if let Some(level) = c.warn_levels.remove(&old_name) {
        c.warn_levels.insert(updated.name.clone(), level);
      }
      for plan in c.production_plans.iter_mut().filter(|plan| plan.cookie == old_name) {
        plan.cookie = updated.name.clone();
      }
    }
    Ok(updated)
  })
}

pub fn delete_product(state: &AppState, input: IdInput, actor: Option<String>) -> Result<(), AppError> {
  let activity = Activity::new("PRODUCT_DELETE", "product").actor(actor).entity(input.id);
  state.mutate(&[db::KEY_PRODUCTS, db::KEY_WARN_LEVELS, db::KEY_RECIPES], activity, |c| {
    let index = c
      .products
      .iter()
      .position(|product| product.id == input.id)
      .ok_or_else(|| AppError::not_found(format!("Produkt {} nicht gefunden", input.id)))?;
    let removed = c.products.remove(index);
    c.warn_levels.remove(&removed.name);
    c.recipes.retain(|recipe| recipe.product_id != removed.id);
    Ok(())
  })
}

pub fn adjust_counter(state: &AppState, input: CounterInput, actor: Option<String>) -> Result<Product, AppError> {
  ensure_delta(input.delta, "Aenderung")?;
  let activity = Activity::new("PRODUCT_COUNTER", "product")
    .actor(actor)
    .entity(input.id)
    .payload(&input);
  state.mutate(&[db::KEY_PRODUCTS], activity, |c| {
    let product = product_mut(&mut c.products, input.id)?;
    product.adjust_counter(input.counter, input.delta);
    Ok(product.clone())
  })
}

// Daily tracking

pub fn update_daily(state: &AppState, input: DailyUpdateInput, actor: Option<String>) -> Result<DailyRecord, AppError> {
  let date = date_or_today(input.date.as_deref())?;
  ensure_daily_counts(&input.values)?;
  let activity = Activity::new("DAILY_UPDATE", "product")
    .actor(actor)
    .entity(input.product_id)
    .payload(&input);
  state.mutate(&[db::KEY_PRODUCTS], activity, |c| {
    let product = product_mut(&mut c.products, input.product_id)?;
    Ok(product.update_day(&date, |day| {
      day.apply(&input.values);
      day.clone()
    }))
  })
}

pub fn increment_daily(state: &AppState, input: DailyIncrementInput, actor: Option<String>) -> Result<DailyRecord, AppError> {
  let date = date_or_today(input.date.as_deref())?;
  ensure_delta(input.delta, "Aenderung")?;
  let activity = Activity::new("DAILY_INCREMENT", "product")
    .actor(actor)
    .entity(input.product_id)
    .payload(&input);
  state.mutate(&[db::KEY_PRODUCTS], activity, |c| {
    let product = product_mut(&mut c.products, input.product_id)?;
    Ok(product.update_day(&date, |day| {
      match input.field {
        DailyField::Prepared => day.prepared = apply_delta(day.prepared, input.delta),
        DailyField::Trash => day.trash = apply_delta(day.trash, input.delta),
        DailyField::Used => day.used = apply_delta(day.used, input.delta),
        field => {
          if let Some(channel) = field.channel() {
            day.set_channel(channel, apply_delta(day.channel(channel), input.delta));
          }
        }
      }
      day.clone()
    }))
  })
}

// Production

pub fn record_production(state: &AppState, input: ProductionInput, actor: Option<String>) -> Result<ProductionOutcome, AppError> {
  let date = date_or_today(input.date.as_deref())?;
  ensure_count(input.produced_total, "Produziert")?;
  let activity = Activity::new("PRODUCTION", "product")
    .actor(actor)
    .entity(input.product_id)
    .payload(&input);
  state.mutate(&[db::KEY_PRODUCTS, db::KEY_INGREDIENTS], activity, |c| {
    let Collections {
      products,
      recipes,
      ingredients,
      ..
    } = c;
    let product = product_mut(products, input.product_id)?;
    let recipe = recipes.iter().find(|recipe| recipe.product_id == input.product_id);
    let outcome = production::record_production(
      product,
      recipe,
      ingredients,
      input.produced_total,
      &date,
      input.allow_shortfall,
    )?;
    Ok(outcome)
  })
}

pub fn check_availability(state: &AppState, input: AvailabilityInput) -> Result<AvailabilityCheck, AppError> {
  ensure_quantity_positive(input.quantity, "Menge")?;
  state.read(|c| {
    if !c.products.iter().any(|product| product.id == input.product_id) {
      return Err(AppError::not_found(format!("Produkt {} nicht gefunden", input.product_id)));
    }
    let recipe = c
      .recipes
      .iter()
      .find(|recipe| recipe.product_id == input.product_id)
      .cloned()
      .unwrap_or_else(|| Recipe::empty(input.product_id));
    Ok(production::check_availability(&recipe, &c.ingredients, input.quantity)?)
  })?
}

pub fn ingredient_usage(state: &AppState, input: UsageInput) -> Result<Vec<UsageLine>, AppError> {
  let from = optional_date(input.from.as_deref())?;
  let to = optional_date(input.to.as_deref())?;
  state.read(|c| {
    production::ingredient_usage(&c.products, &c.recipes, from.as_deref(), to.as_deref())
      .into_iter()
      .filter_map(|(ingredient_id, amount)| {
        let ingredient = c.ingredients.iter().find(|item| item.id == ingredient_id)?;
        Some(UsageLine {
          ingredient_id,
          name: ingredient.name.clone(),
          unit: ingredient.unit.clone(),
          amount,
          cost: amount * ingredient.cost_per_unit,
        })
      })
      .collect()
  })
}

// Ingredients

pub fn list_ingredients(state: &AppState, filter: IngredientFilter) -> Result<IngredientOverview, AppError> {
  state.read(|c| stock::ingredient_overview(&c.ingredients, &filter))
}

pub fn add_ingredient(state: &AppState, input: IngredientInput, actor: Option<String>) -> Result<Ingredient, AppError> {
  let name = ensure_name(&input.name, "Name")?;
  let unit = ensure_name(&input.unit, "Einheit")?;
  ensure_amount_non_negative(input.amount, "Menge")?;
  let min_stock = input.min_stock.unwrap_or(0.0);
  let cost_per_unit = input.cost_per_unit.unwrap_or(0.0);
  ensure_amount_non_negative(min_stock, "Mindestbestand")?;
  ensure_amount_non_negative(cost_per_unit, "Preis pro Einheit")?;

  let activity = Activity::new("INGREDIENT_ADD", "ingredient")
    .actor(actor)
    .entity(&name)
    .payload(&input);
  state.mutate(&[db::KEY_INGREDIENTS], activity, |c| {
    let ingredient = Ingredient {
      id: next_id(c.ingredients.iter().map(|ingredient| ingredient.id)),
      name,
      amount: input.amount,
      unit,
      min_stock,
      cost_per_unit,
      supplier: input.supplier.clone().unwrap_or_default().trim().to_string(),
      last_updated: today(),
      bestaende: None,
    };
    c.ingredients.push(ingredient.clone());
    Ok(ingredient)
  })
}

pub fn update_ingredient(state: &AppState, input: IngredientUpdateInput, actor: Option<String>) -> Result<Ingredient, AppError> {
  let name = input.name.as_deref().map(|name| ensure_name(name, "Name")).transpose()?;
  let unit = input.unit.as_deref().map(|unit| ensure_name(unit, "Einheit")).transpose()?;
  for (value, label) in [
    (input.amount, "Menge"),
    (input.min_stock, "Mindestbestand"),
    (input.cost_per_unit, "Preis pro Einheit"),
  ] {
    if let Some(value) = value {
      ensure_amount_non_negative(value, label)?;
    }
  }

  let activity = Activity::new("INGREDIENT_UPDATE", "ingredient")
    .actor(actor)
    .entity(input.id)
    .payload(&input);
  state.mutate(&[db::KEY_INGREDIENTS], activity, |c| {
    let ingredient = ingredient_mut(&mut c.ingredients, input.id)?;
    if let Some(name) = name {
      ingredient.name = name;
    }
    if let Some(unit) = unit {
      ingredient.unit = unit;
    }
    if let Some(amount) = input.amount {
      ingredient.amount = amount;
    }
    if let Some(min_stock) = input.min_stock {
      ingredient.min_stock = min_stock;
    }
    if let Some(cost) = input.cost_per_unit {
      ingredient.cost_per_unit = cost;
    }
    if let Some(supplier) = input.supplier.as_deref() {
      ingredient.supplier = supplier.trim().to_string();
    }
    ingredient.last_updated = today();
    Ok(ingredient.clone())
  })
}

/// Removes the ingredient and every recipe line that uses it.
pub fn delete_ingredient(state: &AppState, input: IdInput, actor: Option<String>) -> Result<(), AppError> {
  let activity = Activity::new("INGREDIENT_DELETE", "ingredient").actor(actor).entity(input.id);
  state.mutate(&[db::KEY_INGREDIENTS, db::KEY_RECIPES], activity, |c| {
    let before = c.ingredients.len();
    c.ingredients.retain(|ingredient| ingredient.id != input.id);
    if c.ingredients.len() == before {
      return Err(AppError::not_found(format!("Zutat {} nicht gefunden", input.id)));
    }
    for recipe in c.recipes.iter_mut() {
      recipe.ingredients.remove(&input.id);
    }
    Ok(())
  })
}

pub fn adjust_ingredient(state: &AppState, input: IngredientAdjustInput, actor: Option<String>) -> Result<Ingredient, AppError> {
  if !input.delta.is_finite() {
    return Err(AppError::new("INVALID_AMOUNT", "Aenderung muss eine Zahl sein"));
  }
  let activity = Activity::new("INGREDIENT_ADJUST", "ingredient")
    .actor(actor)
    .entity(input.id)
    .payload(&input);
  state.mutate(&[db::KEY_INGREDIENTS], activity, |c| {
    let ingredient = ingredient_mut(&mut c.ingredients, input.id)?;
    ingredient.amount = stock::clamp_amount(ingredient.amount, input.delta);
    ingredient.last_updated = today();
    Ok(ingredient.clone())
  })
}

pub fn shopping_list(state: &AppState) -> Result<ShoppingList, AppError> {
  state.read(|c| stock::shopping_list(&c.ingredients, &c.warn_levels))
}

// Recipes and costing

pub fn get_recipe(state: &AppState, input: IdInput) -> Result<Recipe, AppError> {
  state.read(|c| {
    if !c.products.iter().any(|product| product.id == input.id) {
      return Err(AppError::not_found(format!("Produkt {} nicht gefunden", input.id)));
    }
    Ok(c
      .recipes
      .iter()
      .find(|recipe| recipe.product_id == input.id)
      .cloned()
      .unwrap_or_else(|| Recipe::empty(input.id)))
  })?
}

pub fn update_recipe(state: &AppState, input: RecipeUpdateInput, actor: Option<String>) -> Result<Recipe, AppError> {
  if input.yield_units == 0 {
    return Err(AppError::new("INVALID_YIELD", "Ausbeute muss > 0 sein"));
  }
  for quantity in input.ingredients.values() {
    ensure_amount_non_negative(*quantity, "Rezeptmenge")?;
  }

  let activity = Activity::new("RECIPE_UPDATE", "recipe")
    .actor(actor)
    .entity(input.product_id)
    .payload(&input);
  state.mutate(&[db::KEY_RECIPES], activity, |c| {
    if !c.products.iter().any(|product| product.id == input.product_id) {
      return Err(AppError::not_found(format!("Produkt {} nicht gefunden", input.product_id)));
    }
    if let Some(unknown) = input
      .ingredients
      .keys()
      .find(|id| !c.ingredients.iter().any(|ingredient| ingredient.id == **id))
    {
      return Err(AppError::not_found(format!("Zutat {unknown} nicht gefunden")));
    }

    let recipe = Recipe {
      product_id: input.product_id,
      ingredients: input
        .ingredients
        .iter()
        .filter(|(_, quantity)| **quantity > 0.0)
        .map(|(id, quantity)| (*id, *quantity))
        .collect(),
      yield_units: input.yield_units,
      notes: input.notes.clone().unwrap_or_default(),
    };
    c.recipes.retain(|existing| existing.product_id != input.product_id);
    c.recipes.push(recipe.clone());
    Ok(recipe)
  })
}

pub fn recipe_costs(state: &AppState) -> Result<Vec<RecipeCost>, AppError> {
  state.read(|c| {
    c.recipes
      .iter()
      .map(|recipe| costing::recipe_cost(recipe, &c.ingredients))
      .collect()
  })
}

pub fn calculate_cost(state: &AppState, input: CostInput) -> Result<CostBreakdown, AppError> {
  ensure_quantity_positive(input.quantity, "Menge")?;
  ensure_amount_non_negative(input.hours, "Stunden")?;
  state.read(|c| {
    let product = c
      .products
      .iter()
      .find(|product| product.id == input.product_id)
      .ok_or_else(|| AppError::not_found(format!("Produkt {} nicht gefunden", input.product_id)))?;
    Ok(costing::cost_breakdown(
      product.production_price,
      c.settings.cost_per_hour,
      product.price,
      input.quantity,
      input.hours,
    ))
  })?
}

// Warn levels

pub fn get_warn_levels(state: &AppState) -> Result<WarnLevels, AppError> {
  state.read(|c| c.warn_levels.clone())
}

pub fn set_warn_levels(state: &AppState, levels: WarnLevels, actor: Option<String>) -> Result<WarnLevels, AppError> {
  let activity = Activity::new("WARN_LEVELS_SET", "warn_levels").actor(actor).payload(&levels);
  state.mutate(&[db::KEY_WARN_LEVELS], activity, |c| {
    c.warn_levels = levels.clone();
    Ok(levels)
  })
}

// Inventory audits

pub fn preview_audit(state: &AppState, sheet: AuditSheet) -> Result<AuditPreview, AppError> {
  ensure_sheet_counts(&sheet)?;
  state.read(|c| reconciliation::preview_audit(&c.products, &sheet, &c.warn_levels))
}

pub fn complete_audit(state: &AppState, input: AuditSubmitInput, actor: Option<String>) -> Result<InventoryAudit, AppError> {
  let date = date_or_today(input.date.as_deref())?;
  ensure_sheet_counts(&input.sheet)?;
  let activity = Activity::new("AUDIT_COMPLETE", "inventory_audit")
    .actor(actor)
    .entity(&date)
    .payload(&input);
  state.mutate(&[db::KEY_PRODUCTS, db::KEY_INVENTORY_AUDITS], activity, |c| {
    let audit = reconciliation::complete_audit(
      &mut c.products,
      &input.sheet,
      &c.warn_levels,
      &input.user,
      &input.user_name,
      &date,
      Utc::now(),
    )?;
    c.inventory_audits.push(audit.clone());
    Ok(audit)
  })
}

pub fn list_audits(state: &AppState, filter: AuditFilter) -> Result<AuditLog, AppError> {
  state.read(|c| log::query(&c.inventory_audits, &filter, today_date()))
}

// Sales

pub fn sales_report(state: &AppState, query: SalesQuery) -> Result<SalesReport, AppError> {
  optional_date(query.from.as_deref())?;
  optional_date(query.to.as_deref())?;
  state.read(|c| sales::aggregate(&c.products, &query))
}

pub fn day_totals(state: &AppState, input: DateInput) -> Result<DayTotals, AppError> {
  let date = date_or_today(input.date.as_deref())?;
  state.read(|c| sales::day_totals(&c.products, &date))
}

pub fn day_drilldown(state: &AppState, input: DateInput) -> Result<Vec<DrilldownRow>, AppError> {
  let date = date_or_today(input.date.as_deref())?;
  state.read(|c| sales::drilldown(&c.products, &date))
}

// Sales import

pub fn import_columns(input: ImportInput) -> Result<Vec<String>, AppError> {
  sales_csv::read_columns(&input.text)
}

pub fn import_template() -> String {
  sales_csv::TEMPLATE.to_string()
}

pub fn preview_import(state: &AppState, input: ImportInput) -> Result<ImportPreview, AppError> {
  state.read(|c| sales_csv::parse(&input.text, &input.mapping, &c.products))?
}

pub fn apply_import(state: &AppState, input: ImportInput, actor: Option<String>) -> Result<ImportSummary, AppError> {
  let preview = preview_import(state, input.clone())?;
  let activity = Activity::new("SALES_IMPORT", "product")
    .actor(actor)
    .payload(&input.mapping);
  let summary = state.mutate(&[db::KEY_PRODUCTS], activity, |c| {
    Ok(sales_csv::apply(&mut c.products, &preview))
  })?;
  if summary.invalid_rows > 0 {
    tracing::warn!(invalid_rows = summary.invalid_rows, "sales import left out invalid rows");
  }
  Ok(summary)
}

// Tasks

pub fn list_todos(state: &AppState) -> Result<TodoBoard, AppError> {
  state.read(|c| planning::todo_board(&c.todos, today_date()))
}

pub fn add_todo(state: &AppState, input: TodoInput, actor: Option<String>) -> Result<Todo, AppError> {
  let text = ensure_name(&input.text, "Aufgabe")?;
  let date = optional_date(input.date.as_deref())?.unwrap_or_else(|| planning::default_due_date(today_date()));
  let activity = Activity::new("TODO_ADD", "todo").actor(actor).payload(&input);
  state.mutate(&[db::KEY_TODOS], activity, |c| {
    let todo = Todo {
      id: next_task_id(c.todos.iter().map(|todo| todo.id)),
      text,
      date,
      info: input.info.clone().unwrap_or_default().trim().to_string(),
      done: false,
      created_at: Utc::now().to_rfc3339(),
    };
    c.todos.push(todo.clone());
    Ok(todo)
  })
}

pub fn update_todo(state: &AppState, input: TodoUpdateInput, actor: Option<String>) -> Result<Todo, AppError> {
  let text = ensure_name(&input.text, "Aufgabe")?;
  let date = parse_date(&input.date)?.format("%Y-%m-%d").to_string();
  let activity = Activity::new("TODO_UPDATE", "todo")
    .actor(actor)
    .entity(input.id)
    .payload(&input);
  state.mutate(&[db::KEY_TODOS], activity, |c| {
    let todo = c
      .todos
      .iter_mut()
      .find(|todo| todo.id == input.id)
      .ok_or_else(|| AppError::not_found(format!("Aufgabe {} nicht gefunden", input.id)))?;
    todo.text = text;
    todo.date = date;
    if let Some(info) = input.info.as_deref() {
      todo.info = info.trim().to_string();
    }
    Ok(todo.clone())
  })
}

pub fn toggle_todo(state: &AppState, input: TaskIdInput, actor: Option<String>) -> Result<Todo, AppError> {
  let activity = Activity::new("TODO_TOGGLE", "todo").actor(actor).entity(input.id);
  state.mutate(&[db::KEY_TODOS], activity, |c| {
    let todo = c
      .todos
      .iter_mut()
      .find(|todo| todo.id == input.id)
      .ok_or_else(|| AppError::not_found(format!("Aufgabe {} nicht gefunden", input.id)))?;
    todo.done = !todo.done;
    Ok(todo.clone())
  })
}

pub fn delete_todo(state: &AppState, input: TaskIdInput, actor: Option<String>) -> Result<(), AppError> {
  let activity = Activity::new("TODO_DELETE", "todo").actor(actor).entity(input.id);
  state.mutate(&[db::KEY_TODOS], activity, |c| {
    let before = c.todos.len();
    c.todos.retain(|todo| todo.id != input.id);
    if c.todos.len() == before {
      return Err(AppError::not_found(format!("Aufgabe {} nicht gefunden", input.id)));
    }
    Ok(())
  })
}

pub fn list_plans(state: &AppState) -> Result<PlanBoard, AppError> {
  state.read(|c| planning::plan_board(&c.production_plans, today_date()))
}

pub fn add_plan(state: &AppState, input: PlanInput, actor: Option<String>) -> Result<ProductionPlan, AppError> {
  let cookie = ensure_name(&input.cookie, "Cookie")?;
  ensure_quantity_positive(input.menge, "Menge")?;
  let deadline = optional_date(input.deadline.as_deref())?.unwrap_or_else(|| planning::default_due_date(today_date()));
  let activity = Activity::new("PLAN_ADD", "production_plan").actor(actor).payload(&input);
  state.mutate(&[db::KEY_PRODUCTION_PLANS], activity, |c| {
    let plan = ProductionPlan {
      id: next_task_id(c.production_plans.iter().map(|plan| plan.id)),
      cookie,
      menge: input.menge,
      deadline,
      note: input.note.clone().unwrap_or_default().trim().to_string(),
      done: false,
      created_at: Utc::now().to_rfc3339(),
    };
    c.production_plans.push(plan.clone());
    Ok(plan)
  })
}

pub fn update_plan(state: &AppState, input: PlanUpdateInput, actor: Option<String>) -> Result<ProductionPlan, AppError> {
  let cookie = input.cookie.as_deref().map(|name| ensure_name(name, "Cookie")).transpose()?;
  if let Some(menge) = input.menge {
    ensure_quantity_positive(menge, "Menge")?;
  }
  let deadline = optional_date(input.deadline.as_deref())?;
  let activity = Activity::new("PLAN_UPDATE", "production_plan")
    .actor(actor)
    .entity(input.id)
    .payload(&input);
  state.mutate(&[db::KEY_PRODUCTION_PLANS], activity, |c| {
    let plan = c
      .production_plans
      .iter_mut()
      .find(|plan| plan.id == input.id)
      .ok_or_else(|| AppError::not_found(format!("Produktionsplan {} nicht gefunden", input.id)))?;
    if let Some(cookie) = cookie {
      plan.cookie = cookie;
    }
    if let Some(menge) = input.menge {
      plan.menge = menge;
    }
    if let Some(deadline) = deadline {
      plan.deadline = deadline;
    }
    if let Some(note) = input.note.as_deref() {
      plan.note = note.trim().to_string();
    }
    Ok(plan.clone())
  })
}

pub fn toggle_plan(state: &AppState, input: TaskIdInput, actor: Option<String>) -> Result<ProductionPlan, AppError> {
  let activity = Activity::new("PLAN_TOGGLE", "production_plan").actor(actor).entity(input.id);
  state.mutate(&[db::KEY_PRODUCTION_PLANS], activity, |c| {
    let plan = c
      .production_plans
      .iter_mut()
      .find(|plan| plan.id == input.id)
      .ok_or_else(|| AppError::not_found(format!("Produktionsplan {} nicht gefunden", input.id)))?;
    plan.done = !plan.done;
    Ok(plan.clone())
  })
}

pub fn delete_plan(state: &AppState, input: TaskIdInput, actor: Option<String>) -> Result<(), AppError> {
  let activity = Activity::new("PLAN_DELETE", "production_plan").actor(actor).entity(input.id);
  state.mutate(&[db::KEY_PRODUCTION_PLANS], activity, |c| {
    let before = c.production_plans.len();
    c.production_plans.retain(|plan| plan.id != input.id);
    if c.production_plans.len() == before {
      return Err(AppError::not_found(format!("Produktionsplan {} nicht gefunden", input.id)));
    }
    Ok(())
  })
}

// Users

pub fn login(state: &AppState, input: LoginInput) -> Result<Session, AppError> {
  let email = state.read(|c| auth::find_by_code(&c.users, &input.login_code).map(|user| user.email.clone()))?;
  let mut activity = Activity::new("LOGIN", "user").actor(email.clone());
  if let Some(email) = email {
    activity = activity.entity(email);
  }
  let result = state.mutate(&[db::KEY_USERS], activity, |c| {
    auth::authenticate(&mut c.users, &input.login_code, Utc::now())
  });
  if let Err(err) = &result {
    tracing::warn!(code = %err.code, "login rejected");
  }
  result
}

pub fn list_users(state: &AppState) -> Result<Vec<User>, AppError> {
  state.read(|c| c.users.clone())
}

fn ensure_email_unique(users: &[User], email: &str, except_id: Option<u32>) -> Result<(), AppError> {
  let lowered = email.to_lowercase();
  if users
    .iter()
    .any(|user| Some(user.id) != except_id && user.email.to_lowercase() == lowered)
  {
    return Err(AppError::new("DUPLICATE_EMAIL", format!("E-Mail {email} ist bereits vergeben")));
  }
  Ok(())
}

pub fn create_user(state: &AppState, input: UserInput, actor: Option<String>) -> Result<User, AppError> {
  let email = auth::validate_email(&input.email)?;
  let name = ensure_name(&input.name, "Name")?;
  let code = input.login_code.as_deref().map(auth::validate_login_code).transpose()?;

  let activity = Activity::new("USER_CREATE", "user").actor(actor).entity(&email);
  state.mutate(&[db::KEY_USERS], activity, |c| {
    ensure_email_unique(&c.users, &email, None)?;
    let login_code = match code {
      Some(code) => {
        auth::ensure_code_unique(&c.users, &code, None)?;
        code
      }
      None => auth::generate_login_code(&c.users),
    };
    let user = User {
      id: next_id(c.users.iter().map(|user| user.id)),
      email,
      login_code,
      role: input.role,
      name,
      permissions: input
        .permissions
        .clone()
        .unwrap_or_else(|| Permissions::for_role(input.role)),
      created_at: Utc::now().to_rfc3339(),
      last_login: None,
      is_active: true,
    };
    c.users.push(user.clone());
    Ok(user)
  })
}

fn ensure_admin_remains(users: &[User]) -> Result<(), AppError> {
  if auth::active_admin_count(users) == 0 {
    return Err(AppError::new("LAST_ADMIN", "Der letzte aktive Admin kann nicht entfernt werden"));
  }
  Ok(())
}

pub fn update_user(state: &AppState, input: UserUpdateInput, actor: Option<String>) -> Result<User, AppError> {
  let email = input.email.as_deref().map(auth::validate_email).transpose()?;
  let name = input.name.as_deref().map(|name| ensure_name(name, "Name")).transpose()?;
  let code = input.login_code.as_deref().map(auth::validate_login_code).transpose()?;

  let activity = Activity::new("USER_UPDATE", "user").actor(actor).entity(input.id);
  state.mutate(&[db::KEY_USERS], activity, |c| {
    if let Some(email) = email.as_deref() {
      ensure_email_unique(&c.users, email, Some(input.id))?;
    }
    if let Some(code) = code.as_deref() {
      auth::ensure_code_unique(&c.users, code, Some(input.id))?;
    }
    let user = c
      .users
      .iter_mut()
      .find(|user| user.id == input.id)
      .ok_or_else(|| AppError::not_found(format!("Benutzer {} nicht gefunden", input.id)))?;

    if let Some(email) = email {
      user.email = email;
    }
    if let Some(name) = name {
      user.name = name;
    }
    if let Some(code) = code {
      user.login_code = code;
    }
    if let Some(role) = input.role {
      user.role = role;
      if input.permissions.is_none() {
        user.permissions = Permissions::for_role(role);
      }
    }
    if let Some(permissions) = input.permissions.clone() {
      user.permissions = permissions;
    }
    if let Some(active) = input.is_active {
      user.is_active = active;
    }
    let updated = user.clone();
    ensure_admin_remains(&c.users)?;
    Ok(updated)
  })
}

pub fn delete_user(state: &AppState, input: IdInput, actor: Option<String>) -> Result<(), AppError> {
  let activity = Activity::new("USER_DELETE", "user").actor(actor).entity(input.id);
  state.mutate(&[db::KEY_USERS], activity, |c| {
    let before = c.users.len();
    c.users.retain(|user| user.id != input.id);
    if c.users.len() == before {
      return Err(AppError::not_found(format!("Benutzer {} nicht gefunden", input.id)));
    }
    ensure_admin_remains(&c.users)
  })
}

// Settings

pub fn get_settings(state: &AppState) -> Result<Settings, AppError> {
  state.read(|c| c.settings.clone())
}

pub fn update_settings(state: &AppState, input: SettingsInput, actor: Option<String>) -> Result<Settings, AppError> {
  let activity = Activity::new("UPDATE_SETTINGS", "settings").actor(actor).payload(&input);
  state.mutate(&[db::KEY_SETTINGS], activity, |c| {
    settings::apply_settings(&mut c.settings, &input)?;
    Ok(c.settings.clone())
  })
}

pub fn get_website_settings(state: &AppState) -> Result<WebsiteSettings, AppError> {
  state.read(|c| c.website_settings.clone())
}

pub fn update_website_settings(
  state: &AppState,
  input: WebsiteSettingsInput,
  actor: Option<String>,
) -> Result<WebsiteSettings, AppError> {
  let activity = Activity::new("UPDATE_WEBSITE_SETTINGS", "settings").actor(actor).payload(&input);
  state.mutate(&[db::KEY_WEBSITE_SETTINGS], activity, |c| {
    settings::apply_website_settings(&mut c.website_settings, &input)?;
    Ok(c.website_settings.clone())
  })
}

pub fn set_logo(state: &AppState, input: LogoInput, actor: Option<String>) -> Result<WebsiteSettings, AppError> {
  let logo = settings::logo_data_url(Path::new(&input.path))?;
  let activity = Activity::new("SET_LOGO", "settings").actor(actor).payload(&input);
  state.mutate(&[db::KEY_WEBSITE_SETTINGS], activity, |c| {
    c.website_settings.logo = Some(logo);
    Ok(c.website_settings.clone())
  })
}

pub fn list_presets() -> Vec<ColorPreset> {
  PRESETS.to_vec()
}

// Reports, exports and backups

pub fn dashboard(state: &AppState, filter: DashboardFilter) -> Result<Dashboard, AppError> {
  state.read(|c| reports::dashboard(c, &filter, today_date()))
}

pub fn list_activity(state: &AppState, query: ActivityQuery) -> Result<Vec<ActivityEntry>, AppError> {
  let limit = query.limit.unwrap_or(DEFAULT_ACTIVITY_LIMIT);
  db::with_conn(&state.db, |conn| log::list_activity(conn, limit))
}

fn default_export_path(app_dir: &Path, file_name: &str) -> Result<PathBuf, AppError> {
  let export_dir = app_dir.join("Exports");
  fs::create_dir_all(&export_dir)?;
  Ok(export_dir.join(file_name))
}

/// Renders a CSV report. With an output path the file is also written there.
pub fn export_csv(state: &AppState, request: CsvExportRequest, actor: Option<String>) -> Result<CsvExport, AppError> {
  let collections = state.snapshot()?;
  let content = csv::render(request.report, &collections)?;
  let file_name = csv::file_name(request.report, &today());

  let path = match request.output_path.as_deref() {
    Some(output_path) => {
      csv::write_report(request.report, &collections, Path::new(output_path))?;
      Some(output_path.to_string())
    }
    None => None,
  };

  log_activity(state, actor, "EXPORT_CSV", path.clone(), &request)?;
  Ok(CsvExport {
    file_name,
    content,
    path,
  })
}

pub fn export_excel(state: &AppState, request: ExportRequest, actor: Option<String>) -> Result<String, AppError> {
  let collections = state.snapshot()?;
  let path = match request.output_path.as_deref() {
    Some(output_path) => {
      let path = PathBuf::from(output_path);
      if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
      }
      path
    }
    None => default_export_path(&state.app_dir, &format!("cookie_report_{}.xlsx", today()))?,
  };

  excel::export_report(&collections, &path)?;
  let path = path.to_string_lossy().to_string();
  log_activity(state, actor, "EXPORT_EXCEL", Some(path.clone()), &request)?;
  Ok(path)
}

pub fn export_backup_json(state: &AppState, actor: Option<String>) -> Result<BackupExport, AppError> {
  let collections = state.snapshot()?;
  let export = BackupExport {
    file_name: backup::json_file_name(&today()),
    json: backup::to_json(&collections, Utc::now())?,
  };
  log_activity(
    state,
    actor,
    "EXPORT_BACKUP_JSON",
    Some(export.file_name.clone()),
    &serde_json::json!({ "schema_version": SCHEMA_VERSION }),
  )?;
  Ok(export)
}

pub fn import_backup_json(state: &AppState, input: BackupJsonInput, actor: Option<String>) -> Result<Revision, AppError> {
  let collections = backup::from_json(&input.json, Utc::now())?;
  let activity = Activity::new("BACKUP_IMPORT", "backup").actor(actor);
  state.replace_all(collections, activity)?;
  get_revision(state)
}

pub fn create_backup(state: &AppState, request: BackupRequest, actor: Option<String>) -> Result<String, AppError> {
  let collections = state.snapshot()?;
  let path = backup::create_archive(&state.app_dir, &collections, request.output_path.clone(), Utc::now())?;
  log_activity(state, actor, "BACKUP", Some(path.clone()), &request)?;
  Ok(path)
}

pub fn restore_backup(state: &AppState, request: RestoreRequest, actor: Option<String>) -> Result<Revision, AppError> {
  let collections = backup::read_archive(&request.archive_path, Utc::now())?;
  let activity = Activity::new("RESTORE", "backup")
    .actor(actor)
    .entity(&request.archive_path);
  state.replace_all(collections, activity)?;
  get_revision(state)
}

/// Puts every collection back to the seeded defaults. Users are kept so the
/// people who reset the data can still log in.
pub fn reset_data(state: &AppState, actor: Option<String>) -> Result<Revision, AppError> {
  let mut collections = seed::collections(Utc::now());
  collections.users = state.read(|c| c.users.clone())?;
  let activity = Activity::new("RESET", "collections").actor(actor);
  state.replace_all(collections, activity)?;
  get_revision(state)
}

pub fn get_revision(state: &AppState) -> Result<Revision, AppError> {
  Ok(Revision {
    revision: state.revision(),
    last_change: state.last_change()?,
  })
}

#[cfg(test)]
mod tests {
  use super::*;

  fn open() -> (tempfile::TempDir, AppState) {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::open(dir.path()).unwrap();
    (dir, state)
  }

  fn product_named(state: &AppState, name: &str) -> Product {
    state
      .read(|c| c.products.iter().find(|product| product.name == name).cloned())
      .unwrap()
      .unwrap()
  }

  #[test]
  fn add_product_applies_defaults_and_rejects_duplicates() {
    let (_dir, state) = open();
    let input = ProductInput {
      name: " Pistachio ".to_string(),
      category: None,
      price: None,
      production_price: None,
      warn_level: None,
    };
    let product = add_product(&state, input.clone(), None).unwrap();
    assert_eq!(product.name, "Pistachio");
    assert_eq!(product.price, DEFAULT_PRICE);
    assert_eq!(product.category, "Classic");
    assert_eq!(get_warn_levels(&state).unwrap()["Pistachio"], DEFAULT_WARN_LEVEL);
    assert_eq!(get_recipe(&state, IdInput { id: product.id }).unwrap().yield_units, 100);

    let duplicate = ProductInput {
      name: "pistachio".to_string(),
      ..input
    };
    assert_eq!(add_product(&state, duplicate, None).unwrap_err().code, "DUPLICATE_NAME");
  }

  #[test]
  fn rename_moves_warn_level() {
    let (_dir, state) = open();
    let original = state.read(|c| c.products[0].clone()).unwrap();
    let level = get_warn_levels(&state).unwrap()[&original.name];

    let input = ProductUpdateInput {
      id: original.id,
      name: Some("Renamed".to_string()),
      category: None,
      price: Some(3.0),
      production_price: None,
    };
    update_product(&state, input, None).unwrap();

    let levels = get_warn_levels(&state).unwrap();
    assert_eq!(levels.get("Renamed"), Some(&level));
    assert!(!levels.contains_key(&original.name));
    assert_eq!(product_named(&state, "Renamed").price, 3.0);
  }

  #[test]
  fn daily_edits_track_sold_counter() {
    let (_dir, state) = open();
    let id = state.read(|c| c.products[0].id).unwrap();
    let date = Some("2025-01-16".to_string());

    let update = DailyUpdateInput {
      product_id: id,
      date: date.clone(),
      values: DailyUpdate {
        verkauft_location: Some(10),
        verkauft_wolt: Some(4),
        ..Default::default()
      },
    };
    let day = update_daily(&state, update, None).unwrap();
    assert_eq!(day.sold(), 14);

    let increment = DailyIncrementInput {
      product_id: id,
      date,
      field: DailyField::VerkauftWolt,
      delta: -10,
    };
    let day = increment_daily(&state, increment, None).unwrap();
    assert_eq!(day.verkauft_wolt, 0);
    assert_eq!(get_product(&state, IdInput { id }).unwrap().sold, 10);
  }

  #[test]
  fn unknown_product_is_not_found() {
    let (_dir, state) = open();
    let err = get_product(&state, IdInput { id: 999 }).unwrap_err();
    assert!(err.is_not_found());
    let err = delete_product(&state, IdInput { id: 999 }, None).unwrap_err();
    assert!(err.is_not_found());
    assert_eq!(state.revision(), 0);
  }

  #[test]
  fn deleting_ingredient_cleans_recipes() {
    let (_dir, state) = open();
    let product_id = state.read(|c| c.products[0].id).unwrap();
    let ingredient_id = state.read(|c| c.ingredients[0].id).unwrap();
    let input = RecipeUpdateInput {
      product_id,
      ingredients: [(ingredient_id, 2.0)].into_iter().collect(),
      yield_units: 50,
      notes: None,
    };
    update_recipe(&state, input, None).unwrap();

    delete_ingredient(&state, IdInput { id: ingredient_id }, None).unwrap();
    let recipe = get_recipe(&state, IdInput { id: product_id }).unwrap();
    assert!(recipe.ingredients.is_empty());
  }

  #[test]
  fn zero_yield_is_rejected() {
    let (_dir, state) = open();
    let input = RecipeUpdateInput {
      product_id: 1,
      ingredients: Default::default(),
      yield_units: 0,
      notes: None,
    };
    assert_eq!(update_recipe(&state, input, None).unwrap_err().code, "INVALID_YIELD");
  }

  #[test]
  fn last_admin_cannot_be_removed() {
    let (_dir, state) = open();
    let admin_id = state.read(|c| c.users[0].id).unwrap();
    let err = delete_user(&state, IdInput { id: admin_id }, None).unwrap_err();
    assert_eq!(err.code, "LAST_ADMIN");

    let deactivate = UserUpdateInput {
      id: admin_id,
      email: None,
      name: None,
      role: None,
      login_code: None,
      permissions: None,
      is_active: Some(false),
    };
    assert_eq!(update_user(&state, deactivate, None).unwrap_err().code, "LAST_ADMIN");
    assert_eq!(list_users(&state).unwrap().len(), 1);
  }

  #[test]
  fn created_user_can_log_in() {
    let (_dir, state) = open();
    let input = UserInput {
      email: "lena@cookie.com".to_string(),
      name: "Lena".to_string(),
      role: Role::Mitarbeiter,
      login_code: None,
      permissions: None,
    };
    let user = create_user(&state, input, Some("admin@cookie.com".to_string())).unwrap();
    assert_eq!(user.login_code.len(), 5);

    let session = login(
      &state,
      LoginInput {
        login_code: user.login_code.clone(),
      },
    )
    .unwrap();
    assert_eq!(session.email, "lena@cookie.com");
    let entries = list_activity(&state, ActivityQuery::default()).unwrap();
    assert_eq!(entries[0].action, "LOGIN");
    assert_eq!(entries[0].entity_id.as_deref(), Some("lena@cookie.com"));
    assert_eq!(entries[0].actor.as_deref(), Some("lena@cookie.com"));
    assert_eq!(
      login(
        &state,
        LoginInput {
          login_code: "nope".to_string()
        }
      )
      .unwrap_err()
      .code,
      "LOGIN_FAILED"
    );
  }

  #[test]
  fn todos_get_unique_ids_and_default_due_date() {
    let (_dir, state) = open();
    let first = add_todo(
      &state,
      TodoInput {
        text: "Mehl bestellen".to_string(),
        date: None,
        info: None,
      },
      None,
    )
    .unwrap();
    let second = add_todo(
      &state,
      TodoInput {
        text: "Ofen reinigen".to_string(),
        date: Some("2025-02-01".to_string()),
        info: Some("vor Ladenoeffnung".to_string()),
      },
      None,
    )
    .unwrap();
    assert_ne!(first.id, second.id);
    assert_eq!(first.date, planning::default_due_date(today_date()));

    let toggled = toggle_todo(&state, TaskIdInput { id: first.id }, None).unwrap();
    assert!(toggled.done);
    assert_eq!(list_todos(&state).unwrap().counts.done, 1);
  }

  #[test]
  fn exports_and_activity_log() {
    let (dir, state) = open();
    let export = export_csv(
      &state,
      CsvExportRequest {
        report: CsvReport::Summary,
        output_path: None,
      },
      Some("admin@cookie.com".to_string()),
    )
    .unwrap();
    assert!(export.file_name.ends_with(".csv"));
    assert!(export.path.is_none());

    let path = export_excel(&state, ExportRequest { output_path: None }, None).unwrap();
    assert!(path.starts_with(&dir.path().join("Exports").to_string_lossy().to_string()));

    let backup = export_backup_json(&state, Some("admin@cookie.com".to_string())).unwrap();

    let entries = list_activity(&state, ActivityQuery::default()).unwrap();
    assert_eq!(entries[0].action, "EXPORT_BACKUP_JSON");
    assert_eq!(entries[0].entity_type, "EXPORT");
    assert_eq!(entries[0].entity_id.as_deref(), Some(backup.file_name.as_str()));
    assert_eq!(entries[0].actor.as_deref(), Some("admin@cookie.com"));
    assert_eq!(entries[1].action, "EXPORT_EXCEL");
    assert_eq!(entries[2].actor.as_deref(), Some("admin@cookie.com"));
  }

  #[test]
  fn reset_keeps_users() {
    let (_dir, state) = open();
    let input = UserInput {
      email: "max@cookie.com".to_string(),
      name: "Max".to_string(),
      role: Role::Mitarbeiter,
      login_code: Some("77777".to_string()),
      permissions: None,
    };
    create_user(&state, input, None).unwrap();
    delete_product(&state, IdInput { id: 1 }, None).unwrap();

    let revision = reset_data(&state, None).unwrap();
    assert_eq!(revision.revision, 3);
    assert_eq!(list_products(&state).unwrap().len(), 9);
    assert_eq!(list_users(&state).unwrap().len(), 2);
  }
}
