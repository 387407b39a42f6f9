use serde::{Deserialize, Serialize};

use crate::models::{Ingredient, Recipe};

pub const LOW_MARGIN_PCT: f64 = 30.0;

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MarginWarning {
  NegativeMargin,
  LowMargin,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CostBreakdown {
  pub quantity: u32,
  pub hours: f64,
  pub material_cost_per_unit: f64,
  pub labor_cost_per_unit: f64,
  pub total_cost_per_unit: f64,
  pub labor_cost_total: f64,
  pub units_per_minute: f64,
  pub margin: f64,
  pub margin_pct: f64,
  pub total_production_cost: f64,
  pub total_revenue: f64,
  pub total_profit: f64,
  pub warning: Option<MarginWarning>,
}

/// Cost and margin for a production run. Labor is spread over the produced
/// units; a zero quantity carries no labor per unit.
pub fn cost_breakdown(material_cost_per_unit: f64, hourly_rate: f64, sales_price: f64, quantity: u32, hours: f64) -> CostBreakdown {
  let minutes = hours * 60.0;
  let cost_per_minute = hourly_rate / 60.0;
  let labor_cost_total = minutes * cost_per_minute;
  let qty = f64::from(quantity);

  let labor_cost_per_unit = if quantity > 0 { labor_cost_total / qty } else { 0.0 };
  let units_per_minute = if minutes > 0.0 { qty / minutes } else { 0.0 };
  let total_cost_per_unit = material_cost_per_unit + labor_cost_per_unit;
  let margin = sales_price - total_cost_per_unit;
  let margin_pct = if sales_price != 0.0 { margin / sales_price * 100.0 } else { 0.0 };

  let total_production_cost = qty * total_cost_per_unit;
  let total_revenue = qty * sales_price;

  CostBreakdown {
    quantity,
    hours,
    material_cost_per_unit,
    labor_cost_per_unit,
    total_cost_per_unit,
    labor_cost_total,
    units_per_minute,
    margin,
    margin_pct,
    total_production_cost,
    total_revenue,
    total_profit: total_revenue - total_production_cost,
    warning: margin_warning(margin, margin_pct),
  }
}

pub fn margin_warning(margin: f64, margin_pct: f64) -> Option<MarginWarning> {
  if margin < 0.0 {
    Some(MarginWarning::NegativeMargin)
  } else if margin_pct < LOW_MARGIN_PCT {
    Some(MarginWarning::LowMargin)
  } else {
    None
  }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RecipeCostLine {
  pub ingredient_id: u32,
  pub name: String,
  pub unit: String,
  pub quantity: f64,
  pub cost_per_unit: f64,
  pub cost: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RecipeCost {
  pub product_id: u32,
  pub yield_units: u32,
  pub lines: Vec<RecipeCostLine>,
  pub batch_cost: f64,
  pub cost_per_unit: f64,
}

pub fn recipe_cost(recipe: &Recipe, ingredients: &[Ingredient]) -> RecipeCost {
  let lines: Vec<RecipeCostLine> = recipe
    .ingredients
    .iter()
    .filter_map(|(ingredient_id, quantity)| {
      let ingredient = ingredients.iter().find(|item| item.id == *ingredient_id)?;
      Some(RecipeCostLine {
        ingredient_id: ingredient.id,
        name: ingredient.name.clone(),
        unit: ingredient.unit.clone(),
        quantity: *quantity,
        cost_per_unit: ingredient.cost_per_unit,
        cost: quantity * ingredient.cost_per_unit,
      })
    })
    .collect();

  let batch_cost: f64 = lines.iter().map(|line| line.cost).sum();
  let cost_per_unit = if recipe.yield_units > 0 {
    batch_cost / f64::from(recipe.yield_units)
  } else {
    0.0
  };

  RecipeCost {
    product_id: recipe.product_id,
    yield_units: recipe.yield_units,
    lines,
    batch_cost,
    cost_per_unit,
  }
}
