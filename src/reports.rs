use std::collections::BTreeSet;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::domain::planning::{plan_board, todo_board, TaskCounts};
use crate::domain::sales::{day_totals, DayTotals};
use crate::domain::stock::{ingredient_status, product_status, shopping_list, StockStatus};
use crate::models::{Collections, Product};

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DashboardFilter {
  pub search: Option<String>,
  /// `None` or "All" shows every category.
  pub category: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProductCard {
  pub id: u32,
  pub name: String,
  pub category: String,
  pub price: f64,
  pub stock: u32,
  pub prepared: u32,
  pub total_inventory: u32,
  pub status: StockStatus,
  pub sold_today: u32,
  pub prepared_today: u32,
  pub trash_today: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Dashboard {
  pub date: String,
  pub total_sold: u64,
  pub total_stock: u64,
  pub total_prepared: u64,
  pub total_revenue: f64,
  pub low_stock_count: usize,
  pub critical_stock_count: usize,
  pub categories: Vec<String>,
  pub products: Vec<ProductCard>,
  pub today: DayTotals,
  pub todos: TaskCounts,
  pub plans: TaskCounts,
  pub shopping_items: usize,
  pub low_ingredients: usize,
}

fn matches(product: &Product, filter: &DashboardFilter) -> bool {
  let search = filter.search.as_deref().unwrap_or("").trim().to_lowercase();
  let by_name = search.is_empty() || product.name.to_lowercase().contains(&search);
  let by_category = match filter.category.as_deref() {
    None | Some("") | Some("All") => true,
    Some(category) => product.category == category,
  };
  by_name && by_category
}

/// Headline numbers for the start page. Totals cover the whole catalog; the
/// product cards honour the filter.
pub fn dashboard(collections: &Collections, filter: &DashboardFilter, today: NaiveDate) -> Dashboard {
  let date = today.format("%Y-%m-%d").to_string();
  let products = &collections.products;
  let levels = &collections.warn_levels;

  let statuses: Vec<StockStatus> = products.iter().map(|product| product_status(product, levels)).collect();
  let categories: BTreeSet<String> = products.iter().map(|product| product.category.clone()).collect();

  let cards = products
    .iter()
    .zip(statuses.iter())
    .filter(|(product, _)| matches(product, filter))
    .map(|(product, status)| {
      let day = product.day(&date).cloned().unwrap_or_default();
      ProductCard {
        id: product.id,
        name: product.name.clone(),
        category: product.category.clone(),
        price: product.price,
        stock: product.stock,
        prepared: product.prepared,
        total_inventory: product.stock.saturating_add(product.prepared),
        status: *status,
        sold_today: day.sold(),
        prepared_today: day.prepared,
        trash_today: day.trash,
      }
    })
    .collect();

  Dashboard {
    total_sold: products.iter().map(|product| u64::from(product.sold)).sum(),
    total_stock: products.iter().map(|product| u64::from(product.stock)).sum(),
    total_prepared: products.iter().map(|product| u64::from(product.prepared)).sum(),
    total_revenue: products
      .iter()
      .map(|product| f64::from(product.sold) * product.price)
      .sum(),
    low_stock_count: statuses.iter().filter(|status| **status != StockStatus::Good).count(),
    critical_stock_count: statuses.iter().filter(|status| **status == StockStatus::Critical).count(),
    categories: categories.into_iter().collect(),
    products: cards,
    today: day_totals(products, &date),
    todos: todo_board(&collections.todos, today).counts,
    plans: plan_board(&collections.production_plans, today).counts,
    shopping_items: shopping_list(&collections.ingredients, levels).items.len(),
    low_ingredients: collections
      .ingredients
      .iter()
      .filter(|ingredient| ingredient_status(ingredient) != StockStatus::Good)
      .count(),
    date,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::seed;
  use crate::models::SalesChannel;

  #[test]
  fn dashboard_counts_and_filter() {
    let today = NaiveDate::from_ymd_opt(2025, 1, 16).unwrap();
    let mut collections = seed::collections(chrono::Utc::now());
    collections.products[0].stock = 100;
    collections.products[0].sold = 10;
    collections.products[0]
      .day_mut("2025-01-16")
      .set_channel(SalesChannel::Location, 6);

    let all = dashboard(&collections, &DashboardFilter::default(), today);
    assert_eq!(all.products.len(), 9);
    assert_eq!(all.total_sold, 10);
    assert_eq!(all.total_revenue, 25.0);
    assert_eq!(all.today.sold, 6);
    // every other cookie has zero stock against a positive warn level
    assert_eq!(all.critical_stock_count, 8);
    assert_eq!(all.categories, vec!["Classic", "Premium", "Seasonal"]);

    let premium = DashboardFilter {
      search: None,
      category: Some("Premium".to_string()),
    };
    let filtered = dashboard(&collections, &premium, today);
    assert_eq!(filtered.products.len(), 4);
    assert_eq!(filtered.total_sold, 10);

    let chip = DashboardFilter {
      search: Some("chip".to_string()),
      category: Some("All".to_string()),
    };
    let cards = dashboard(&collections, &chip, today).products;
    assert_eq!(cards.len(), 1);
    assert_eq!(cards[0].sold_today, 6);
  }
}
