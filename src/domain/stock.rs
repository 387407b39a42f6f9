use serde::{Deserialize, Serialize};

use crate::models::{Ingredient, IngredientFilter, Product, StatusFilter, WarnLevels};

pub const DEFAULT_WARN_LEVEL: u32 = 10;
const FALLBACK_ORDER_THRESHOLD: f64 = 2.0;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
  Critical,
  Low,
  Good,
}

/// Classifies an on-hand amount against its threshold: at most half of the
/// threshold is critical, at most the threshold is low. A non-positive
/// threshold never warns.
pub fn classify(amount: f64, threshold: f64) -> StockStatus {
  if threshold <= 0.0 {
    return StockStatus::Good;
  }
  let pct = amount / threshold * 100.0;
  if pct <= 50.0 {
    StockStatus::Critical
  } else if pct <= 100.0 {
    StockStatus::Low
  } else {
    StockStatus::Good
  }
}

pub fn warn_level(levels: &WarnLevels, product_name: &str) -> u32 {
  levels.get(product_name).copied().unwrap_or(DEFAULT_WARN_LEVEL)
}

pub fn product_status(product: &Product, levels: &WarnLevels) -> StockStatus {
  classify(f64::from(product.stock), f64::from(warn_level(levels, &product.name)))
}

pub fn ingredient_status(ingredient: &Ingredient) -> StockStatus {
  classify(ingredient.amount, ingredient.min_stock)
}

/// Adds a signed delta to an ingredient amount, never going below zero.
pub fn clamp_amount(amount: f64, delta: f64) -> f64 {
  (amount + delta).max(0.0)
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IngredientView {
  #[serde(flatten)]
  pub ingredient: Ingredient,
  pub status: StockStatus,
  pub total_value: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct IngredientOverview {
  pub items: Vec<IngredientView>,
  pub total_count: usize,
  pub low_count: usize,
  pub critical_count: usize,
  pub total_value: f64,
}

pub fn ingredient_overview(ingredients: &[Ingredient], filter: &IngredientFilter) -> IngredientOverview {
  let needle = filter
    .search
    .as_deref()
    .map(|value| value.trim().to_lowercase())
    .unwrap_or_default();

  let items = ingredients
    .iter()
    .filter(|ingredient| {
      needle.is_empty()
        || ingredient.name.to_lowercase().contains(&needle)
        || ingredient.supplier.to_lowercase().contains(&needle)
    })
    .filter(|ingredient| {
      let status = ingredient_status(ingredient);
      match filter.status {
        StatusFilter::All => true,
        StatusFilter::Low => status != StockStatus::Good,
        StatusFilter::Critical => status == StockStatus::Critical,
      }
    })
    .map(|ingredient| IngredientView {
      status: ingredient_status(ingredient),
      total_value: ingredient.amount * ingredient.cost_per_unit,
      ingredient: ingredient.clone(),
    })
    .collect();

  IngredientOverview {
    items,
    total_count: ingredients.len(),
    low_count: ingredients
      .iter()
      .filter(|ingredient| ingredient_status(ingredient) != StockStatus::Good)
      .count(),
    critical_count: ingredients
      .iter()
      .filter(|ingredient| ingredient_status(ingredient) == StockStatus::Critical)
      .count(),
    total_value: ingredients
      .iter()
      .map(|ingredient| ingredient.amount * ingredient.cost_per_unit)
      .sum(),
  }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
  Urgent,
  Soon,
  Normal,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ShoppingItem {
  pub ingredient_id: u32,
  pub name: String,
  pub unit: String,
  pub supplier: String,
  pub amount: f64,
  pub threshold: f64,
  pub recommended_order: f64,
  pub cost_per_unit: f64,
  pub estimated_cost: f64,
  pub urgency: Urgency,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ShoppingList {
  pub items: Vec<ShoppingItem>,
  pub total_cost: f64,
}

fn order_threshold(ingredient: &Ingredient, levels: &WarnLevels) -> f64 {
  match levels.get(&ingredient.name) {
    Some(level) if *level > 0 => f64::from(*level),
    _ if ingredient.min_stock > 0.0 => ingredient.min_stock,
    _ => FALLBACK_ORDER_THRESHOLD,
  }
}

pub fn shopping_list(ingredients: &[Ingredient], levels: &WarnLevels) -> ShoppingList {
  let items: Vec<ShoppingItem> = ingredients
    .iter()
    .filter_map(|ingredient| {
      let threshold = order_threshold(ingredient, levels);
      if ingredient.amount >= threshold {
        return None;
      }
      let recommended_order = (threshold * 2.0 - ingredient.amount).max(threshold);
      let ratio = ingredient.amount / threshold;
      let urgency = if ratio <= 0.5 {
        Urgency::Urgent
      } else if ratio <= 0.8 {
        Urgency::Soon
      } else {
        Urgency::Normal
      };
      Some(ShoppingItem {
        ingredient_id: ingredient.id,
        name: ingredient.name.clone(),
        unit: ingredient.unit.clone(),
        supplier: ingredient.supplier.clone(),
        amount: ingredient.amount,
        threshold,
        recommended_order,
        cost_per_unit: ingredient.cost_per_unit,
        estimated_cost: recommended_order * ingredient.cost_per_unit,
        urgency,
      })
    })
    .collect();

  let total_cost = items.iter().map(|item| item.estimated_cost).sum();
  ShoppingList { items, total_cost }
}
