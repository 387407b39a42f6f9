use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::stock::clamp_amount;
use crate::error::StockError;
use crate::models::{Ingredient, Product, Recipe};

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Requirement {
  pub ingredient_id: u32,
  pub name: String,
  pub unit: String,
  pub required: f64,
  pub available: f64,
  pub sufficient: bool,
}

/// Ingredient amounts needed to produce `quantity` units. Recipe entries
/// pointing at unknown ingredients are ignored.
pub fn requirements(recipe: &Recipe, ingredients: &[Ingredient], quantity: u32) -> Result<Vec<Requirement>, StockError> {
  if quantity == 0 || recipe.ingredients.is_empty() {
    return Ok(Vec::new());
  }
  if recipe.yield_units == 0 {
    return Err(StockError::InvalidYield(recipe.product_id));
  }
  let multiplier = f64::from(quantity) / f64::from(recipe.yield_units);

  Ok(
    recipe
      .ingredients
      .iter()
      .filter_map(|(ingredient_id, qty)| {
        let ingredient = ingredients.iter().find(|item| item.id == *ingredient_id)?;
        let required = qty * multiplier;
        Some(Requirement {
          ingredient_id: ingredient.id,
          name: ingredient.name.clone(),
          unit: ingredient.unit.clone(),
          required,
          available: ingredient.amount,
          sufficient: ingredient.amount >= required,
        })
      })
      .collect(),
  )
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AvailabilityCheck {
  pub product_id: u32,
  pub quantity: u32,
  pub items: Vec<Requirement>,
  pub sufficient: bool,
}

pub fn check_availability(recipe: &Recipe, ingredients: &[Ingredient], quantity: u32) -> Result<AvailabilityCheck, StockError> {
  let items = requirements(recipe, ingredients, quantity)?;
  let sufficient = items.iter().all(|item| item.sufficient);
  Ok(AvailabilityCheck {
    product_id: recipe.product_id,
    quantity,
    items,
    sufficient,
  })
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Consumption {
  pub ingredient_id: u32,
  pub name: String,
  pub deducted: f64,
  pub remaining: f64,
  pub shortfall: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProductionOutcome {
  pub product_id: u32,
  pub date: String,
  pub previous_total: u32,
  pub produced_total: u32,
  pub delta: i64,
  pub prepared: u32,
  pub consumed: Vec<Consumption>,
}

/// Records today's absolute production total for a product.
///
/// The delta against the stored total drives everything: a positive delta
/// consumes `qty * delta / yield` of every recipe ingredient, and `prepared`
/// moves by the delta in either direction. Without `allow_shortfall` the
/// first insufficient ingredient aborts before anything is touched; with it
/// the deduction clamps at zero and the missing part is reported.
pub fn record_production(
  product: &mut Product,
  recipe: Option<&Recipe>,
  ingredients: &mut [Ingredient],
  produced_total: u32,
  date: &str,
  allow_shortfall: bool,
) -> Result<ProductionOutcome, StockError> {
  let previous_total = product.day(date).map(|day| day.produziert).unwrap_or(0);
  let delta = i64::from(produced_total) - i64::from(previous_total);

  let mut consumed = Vec::new();
  if delta > 0 {
    if let Some(recipe) = recipe {
      let needed = requirements(recipe, ingredients, delta as u32)?;
      if !allow_shortfall {
        if let Some(missing) = needed.iter().find(|item| !item.sufficient) {
          return Err(StockError::InsufficientIngredient {
            ingredient_id: missing.ingredient_id,
            name: missing.name.clone(),
            unit: missing.unit.clone(),
            required: missing.required,
            available: missing.available,
          });
        }
      }

      let by_id: BTreeMap<u32, f64> = needed.iter().map(|item| (item.ingredient_id, item.required)).collect();
      for ingredient in ingredients.iter_mut() {
        let Some(required) = by_id.get(&ingredient.id) else {
          continue;
        };
        let before = ingredient.amount;
        ingredient.amount = clamp_amount(before, -required);
        ingredient.last_updated = date.to_string();
        consumed.push(Consumption {
          ingredient_id: ingredient.id,
          name: ingredient.name.clone(),
          deducted: before - ingredient.amount,
          remaining: ingredient.amount,
          shortfall: (required - before).max(0.0),
        });
      }
    }
  }

  let day = product.day_mut(date);
  day.produziert = produced_total;
  product.adjust_counter(crate::models::CounterKind::Prepared, delta);

  Ok(ProductionOutcome {
    product_id: product.id,
    date: date.to_string(),
    previous_total,
    produced_total,
    delta,
    prepared: product.prepared,
    consumed,
  })
}

/// Ingredient usage implied by recorded production: for every product with a
/// recipe, `qty * produced / yield` summed per ingredient.
pub fn ingredient_usage(
  products: &[Product],
  recipes: &[Recipe],
  from: Option<&str>,
  to: Option<&str>,
) -> BTreeMap<u32, f64> {
  let mut usage = BTreeMap::new();
  for product in products {
    let Some(recipe) = recipes.iter().find(|recipe| recipe.product_id == product.id) else {
      continue;
    };
    if recipe.yield_units == 0 {
      continue;
    }
    let produced: u32 = product
      .history
      .iter()
      .filter(|(date, _)| from.map_or(true, |from| date.as_str() >= from))
      .filter(|(date, _)| to.map_or(true, |to| date.as_str() <= to))
      .map(|(_, day)| day.produziert)
      .sum();
    if produced == 0 {
      continue;
    }
    let multiplier = f64::from(produced) / f64::from(recipe.yield_units);
    for (ingredient_id, qty) in &recipe.ingredients {
      *usage.entry(*ingredient_id).or_insert(0.0) += qty * multiplier;
    }
  }
  usage
}
