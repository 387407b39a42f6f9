use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::domain::auth::default_admin;
use crate::models::{Collections, Ingredient, Product, Recipe, Settings, WarnLevels, WebsiteSettings};

const CATALOG: [(&str, &str, f64, f64, u32); 9] = [
  ("Chocolate Chip", "Classic", 2.50, 0.75, 20),
  ("Oatmeal Raisin", "Classic", 2.25, 0.65, 15),
  ("Double Chocolate", "Premium", 2.75, 0.85, 25),
  ("Peanut Butter", "Classic", 2.40, 0.70, 10),
  ("White Chocolate Macadamia", "Premium", 3.00, 0.95, 18),
  ("Snickerdoodle", "Seasonal", 2.35, 0.60, 12),
  ("Lemon", "Seasonal", 2.60, 0.80, 8),
  ("Red Velvet", "Premium", 2.85, 0.90, 15),
  ("Salted Caramel", "Premium", 2.90, 0.85, 20),
];

// name, amount, unit, min stock, cost per unit, supplier, hauptlager, filiale1
const INGREDIENTS: [(&str, f64, &str, f64, f64, &str, f64, f64); 10] = [
  ("Mehl (Weizenmehl Type 405)", 25.5, "kg", 10.0, 0.85, "Mueller GmbH", 20.5, 5.0),
  ("Zucker (Kristallzucker)", 18.2, "kg", 8.0, 1.20, "Suesswaren AG", 15.2, 3.0),
  ("Butter (ungesalzen)", 12.8, "kg", 5.0, 6.50, "Molkerei Nord", 10.0, 2.8),
  ("Eier (Groesse M)", 144.0, "Stueck", 60.0, 0.25, "Gefluegelhof Schmidt", 120.0, 24.0),
  ("Schokoladenchips (Vollmilch)", 8.5, "kg", 3.0, 8.90, "Choco Deluxe", 6.5, 2.0),
  ("Vanilleextrakt", 0.5, "Liter", 0.2, 45.00, "Gewuerze & Aromen", 0.4, 0.1),
  ("Backpulver", 2.2, "kg", 1.0, 3.20, "Backhilfen Express", 1.8, 0.4),
  ("Salz (fein)", 1.8, "kg", 0.5, 0.90, "Salz & Meer", 1.5, 0.3),
  ("Haferflocken (kernig)", 6.3, "kg", 2.0, 2.40, "Getreide Zentral", 5.0, 1.3),
  ("Rosinen", 3.1, "kg", 1.0, 4.80, "Trockenfruechte Plus", 2.5, 0.6),
];

pub fn products() -> Vec<Product> {
  CATALOG
    .iter()
    .enumerate()
    .map(|(idx, (name, category, price, production_price, _))| {
      Product::new(idx as u32 + 1, name, category, *price, *production_price)
    })
    .collect()
}

pub fn warn_levels() -> WarnLevels {
  CATALOG
    .iter()
    .map(|(name, _, _, _, level)| (name.to_string(), *level))
    .collect()
}

pub fn ingredients(today: &str) -> Vec<Ingredient> {
  INGREDIENTS
    .iter()
    .enumerate()
    .map(|(idx, (name, amount, unit, min_stock, cost, supplier, main, branch))| {
      let mut bestaende = BTreeMap::new();
      bestaende.insert("hauptlager".to_string(), *main);
      bestaende.insert("filiale1".to_string(), *branch);
      Ingredient {
        id: idx as u32 + 1,
        name: name.to_string(),
        amount: *amount,
        unit: unit.to_string(),
        min_stock: *min_stock,
        cost_per_unit: *cost,
        supplier: supplier.to_string(),
        last_updated: today.to_string(),
        bestaende: Some(bestaende),
      }
    })
    .collect()
}

pub fn recipes(products: &[Product]) -> Vec<Recipe> {
  products.iter().map(|product| Recipe::empty(product.id)).collect()
}

/// The state of a freshly installed shop.
pub fn collections(now: DateTime<Utc>) -> Collections {
  let today = now.date_naive().format("%Y-%m-%d").to_string();
  let products = products();
  Collections {
    recipes: recipes(&products),
    products,
    settings: Settings::default(),
    website_settings: WebsiteSettings::default(),
    ingredients: ingredients(&today),
    inventory_audits: Vec::new(),
    warn_levels: warn_levels(),
    todos: Vec::new(),
    production_plans: Vec::new(),
    users: vec![default_admin(now)],
  }
}
