use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::models::{DailyRecord, Product, SalesChannel};

pub type ChannelTotals = BTreeMap<SalesChannel, u64>;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SalesQuery {
  pub from: Option<String>,
  pub to: Option<String>,
  /// Keep only the most recent N dates that carry any record.
  pub last_days: Option<usize>,
  pub product_ids: Option<Vec<u32>>,
  pub channel: Option<SalesChannel>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProductSales {
  pub product_id: u32,
  pub name: String,
  pub category: String,
  pub channels: ChannelTotals,
  pub staff_consumption: u64,
  pub total_sales: u64,
  pub revenue: f64,
  pub produced: u64,
  pub production_cost: f64,
  pub margin: f64,
  pub trash: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct SalesTotals {
  pub channels: ChannelTotals,
  pub staff_consumption: u64,
  pub total_sales: u64,
  pub revenue: f64,
  pub produced: u64,
  pub production_cost: f64,
  pub margin: f64,
  pub trash: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DayRow {
  pub date: String,
  pub channels: ChannelTotals,
  pub staff_consumption: u64,
  pub total_sales: u64,
  pub revenue: f64,
  pub produced: u64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct RankedEntry {
  pub product_id: u32,
  pub name: String,
  pub value: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SalesReport {
  pub dates: Vec<String>,
  pub products: Vec<ProductSales>,
  pub totals: SalesTotals,
  pub top_seller: Option<RankedEntry>,
  pub top_margins: Vec<RankedEntry>,
  pub days: Vec<DayRow>,
}

fn empty_channels() -> ChannelTotals {
  SalesChannel::ALL.iter().map(|channel| (*channel, 0)).collect()
}

/// Units counted as sales for one record under an optional channel filter.
/// Without a filter this is `sold()`, so aggregate-only records still count.
pub fn sales_for(day: &DailyRecord, channel: Option<SalesChannel>) -> u32 {
  match channel {
    Some(channel) => day.channel(channel),
    None => day.sold(),
  }
}

fn revenue_for(sales: u32, price: f64, channel: Option<SalesChannel>) -> f64 {
  match channel {
    Some(channel) if !channel.is_revenue() => 0.0,
    _ => f64::from(sales) * price,
  }
}

fn selected_dates(products: &[&Product], query: &SalesQuery) -> Vec<String> {
  let all: BTreeSet<&String> = products
    .iter()
    .flat_map(|product| product.history.keys())
    .filter(|date| query.from.as_deref().map_or(true, |from| date.as_str() >= from))
    .filter(|date| query.to.as_deref().map_or(true, |to| date.as_str() <= to))
    .collect();
  let mut dates: Vec<String> = all.into_iter().cloned().collect();
  if let Some(last) = query.last_days {
    if dates.len() > last {
      dates = dates.split_off(dates.len() - last);
    }
  }
  dates
}

pub fn aggregate(products: &[Product], query: &SalesQuery) -> SalesReport {
  let selected: Vec<&Product> = products
    .iter()
    .filter(|product| {
      query
        .product_ids
        .as_ref()
        .map_or(true, |ids| ids.contains(&product.id))
    })
    .collect();
  let dates = selected_dates(&selected, query);

  let mut per_product = Vec::with_capacity(selected.len());
  let mut totals = SalesTotals {
    channels: empty_channels(),
    ..Default::default()
  };
  let mut days: BTreeMap<String, DayRow> = BTreeMap::new();

  for product in &selected {
    let mut row = ProductSales {
      product_id: product.id,
      name: product.name.clone(),
      category: product.category.clone(),
      channels: empty_channels(),
      staff_consumption: 0,
      total_sales: 0,
      revenue: 0.0,
      produced: 0,
      production_cost: 0.0,
      margin: 0.0,
      trash: 0,
    };

    for date in &dates {
      let Some(day) = product.history.get(date) else {
        continue;
      };
      let sales = sales_for(day, query.channel);
      let revenue = revenue_for(sales, product.price, query.channel);
      for channel in SalesChannel::ALL {
        *row.channels.entry(channel).or_insert(0) += u64::from(day.channel(channel));
      }
      row.staff_consumption += u64::from(day.mitarbeiter_verbrauch);
      row.total_sales += u64::from(sales);
      row.revenue += revenue;
      row.produced += u64::from(day.produziert);
      row.trash += u64::from(day.trash);

      let day_row = days.entry(date.clone()).or_insert_with(|| DayRow {
        date: date.clone(),
        channels: empty_channels(),
        staff_consumption: 0,
        total_sales: 0,
        revenue: 0.0,
        produced: 0,
      });
      for channel in SalesChannel::ALL {
        *day_row.channels.entry(channel).or_insert(0) += u64::from(day.channel(channel));
      }
      day_row.staff_consumption += u64::from(day.mitarbeiter_verbrauch);
      day_row.total_sales += u64::from(sales);
      day_row.revenue += revenue;
      day_row.produced += u64::from(day.produziert);
    }

    row.production_cost = row.produced as f64 * product.production_price;
    row.margin = row.revenue - row.production_cost;

    for (channel, value) in &row.channels {
      *totals.channels.entry(*channel).or_insert(0) += value;
    }
    totals.staff_consumption += row.staff_consumption;
    totals.total_sales += row.total_sales;
    totals.revenue += row.revenue;
    totals.produced += row.produced;
    totals.production_cost += row.production_cost;
    totals.trash += row.trash;
    per_product.push(row);
  }
  totals.margin = totals.revenue - totals.production_cost;

  let top_seller = per_product
    .iter()
    .filter(|row| row.total_sales > 0)
    .max_by_key(|row| row.total_sales)
    .map(|row| RankedEntry {
      product_id: row.product_id,
      name: row.name.clone(),
      value: row.total_sales as f64,
    });

  let mut by_margin: Vec<&ProductSales> = per_product.iter().collect();
  by_margin.sort_by(|a, b| b.margin.total_cmp(&a.margin));
  let top_margins = by_margin
    .into_iter()
    .take(3)
    .map(|row| RankedEntry {
      product_id: row.product_id,
      name: row.name.clone(),
      value: row.margin,
    })
    .collect();

  SalesReport {
    dates,
    products: per_product,
    totals,
    top_seller,
    top_margins,
    days: days.into_values().collect(),
  }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DrilldownRow {
  pub product_id: u32,
  pub cookie: String,
  pub produziert: u32,
  pub channels: ChannelTotals,
  pub gesamt_verkauft: u32,
}

pub fn drilldown(products: &[Product], date: &str) -> Vec<DrilldownRow> {
  products
    .iter()
    .map(|product| {
      let day = product.day(date).cloned().unwrap_or_default();
      DrilldownRow {
        product_id: product.id,
        cookie: product.name.clone(),
        produziert: day.produziert,
        channels: SalesChannel::ALL
          .iter()
          .map(|channel| (*channel, u64::from(day.channel(*channel))))
          .collect(),
        gesamt_verkauft: day.sold(),
      }
    })
    .collect()
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DayTotals {
  pub date: String,
  pub sold: u64,
  pub prepared: u64,
  pub used: u64,
  pub trash: u64,
  pub produced: u64,
  pub staff_consumption: u64,
  pub channels: ChannelTotals,
  pub revenue: f64,
  pub waste_rate: f64,
  pub efficiency: f64,
}

pub fn day_totals(products: &[Product], date: &str) -> DayTotals {
  let mut totals = DayTotals {
    date: date.to_string(),
    sold: 0,
    prepared: 0,
    used: 0,
    trash: 0,
    produced: 0,
    staff_consumption: 0,
    channels: empty_channels(),
    revenue: 0.0,
    waste_rate: 0.0,
    efficiency: 0.0,
  };

  for product in products {
    let Some(day) = product.day(date) else {
      continue;
    };
    let sold = day.sold();
    totals.sold += u64::from(sold);
    totals.prepared += u64::from(day.prepared);
    totals.used += u64::from(day.used);
    totals.trash += u64::from(day.trash);
    totals.produced += u64::from(day.produziert);
    totals.staff_consumption += u64::from(day.mitarbeiter_verbrauch);
    totals.revenue += f64::from(sold) * product.price;
    for channel in SalesChannel::ALL {
      *totals.channels.entry(channel).or_insert(0) += u64::from(day.channel(channel));
    }
  }

  totals.waste_rate = percent(totals.trash, totals.produced);
  totals.efficiency = percent(totals.sold, totals.prepared);
  totals
}

fn percent(part: u64, whole: u64) -> f64 {
  if whole == 0 {
    0.0
  } else {
    part as f64 / whole as f64 * 100.0
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn catalog() -> Vec<Product> {
    let mut chip = Product::new(1, "Chocolate Chip", "Classic", 2.5, 0.75);
    let day = chip.day_mut("2025-01-15");
    day.set_channel(SalesChannel::Location, 10);
    day.set_channel(SalesChannel::Ubereats, 5);
    day.set_channel(SalesChannel::Mitarbeiter, 2);
    day.produziert = 20;
    day.prepared = 20;
    day.trash = 1;
    let day = chip.day_mut("2025-01-16");
    day.set_channel(SalesChannel::Wolt, 4);
    day.produziert = 10;

    let mut lemon = Product::new(2, "Lemon", "Seasonal", 2.0, 0.5);
    lemon.history.insert(
      "2025-01-16".to_string(),
      DailyRecord {
        legacy_sold: Some(6),
        prepared: 8,
        ..Default::default()
      },
    );
    vec![chip, lemon]
  }

  #[test]
  fn totals_over_everything() {
    let report = aggregate(&catalog(), &SalesQuery::default());
    assert_eq!(report.dates, vec!["2025-01-15".to_string(), "2025-01-16".to_string()]);
    assert_eq!(report.totals.total_sales, 10 + 5 + 4 + 6);
    assert_eq!(report.totals.staff_consumption, 2);
    assert_eq!(report.totals.channels[&SalesChannel::Ubereats], 5);

    let chip = &report.products[0];
    assert_eq!(chip.total_sales, 19);
    assert!((chip.revenue - 47.5).abs() < 1e-9);
    assert!((chip.production_cost - 22.5).abs() < 1e-9);
    assert!((chip.margin - 25.0).abs() < 1e-9);
    assert_eq!(report.top_seller.as_ref().map(|entry| entry.product_id), Some(1));
    assert_eq!(report.top_margins.len(), 2);
    assert_eq!(report.days.len(), 2);
    assert_eq!(report.days[1].total_sales, 10);
  }

  #[test]
  fn channel_and_range_filters() {
    let query = SalesQuery {
      from: Some("2025-01-16".to_string()),
      channel: Some(SalesChannel::Wolt),
      ..Default::default()
    };
    let report = aggregate(&catalog(), &query);
    assert_eq!(report.totals.total_sales, 4);
    assert!((report.totals.revenue - 10.0).abs() < 1e-9);

    let staff = aggregate(
      &catalog(),
      &SalesQuery {
        channel: Some(SalesChannel::Mitarbeiter),
        ..Default::default()
      },
    );
    assert_eq!(staff.totals.total_sales, 2);
    assert_eq!(staff.totals.revenue, 0.0);
  }

  #[test]
  fn product_subset_and_last_days() {
    let query = SalesQuery {
      last_days: Some(1),
      product_ids: Some(vec![2]),
      ..Default::default()
    };
    let report = aggregate(&catalog(), &query);
    assert_eq!(report.products.len(), 1);
    assert_eq!(report.dates, vec!["2025-01-16".to_string()]);
    assert_eq!(report.totals.total_sales, 6);
  }

  #[test]
  fn day_totals_rates() {
    let totals = day_totals(&catalog(), "2025-01-15");
    assert_eq!(totals.sold, 15);
    assert_eq!(totals.staff_consumption, 2);
    assert!((totals.waste_rate - 5.0).abs() < 1e-9);
    assert!((totals.efficiency - 75.0).abs() < 1e-9);

    let empty = day_totals(&catalog(), "2024-12-31");
    assert_eq!(empty.waste_rate, 0.0);
    assert_eq!(empty.efficiency, 0.0);
  }

  #[test]
  fn drilldown_lists_every_product() {
    let rows = drilldown(&catalog(), "2025-01-15");
    assert_eq!(rows.len(), 2);
    assert_eq!(rows[0].gesamt_verkauft, 15);
    assert_eq!(rows[1].gesamt_verkauft, 0);
  }

  #[test]
  fn large_counts_add_up_without_overflow() {
    let mut products = catalog();
    for product in products.iter_mut() {
      let day = product.day_mut("2025-01-17");
      day.set_channel(SalesChannel::Location, u32::MAX);
      day.set_channel(SalesChannel::Website, u32::MAX);
      day.produziert = u32::MAX;
    }
    let totals = day_totals(&products, "2025-01-17");
    assert_eq!(totals.sold, 2 * u64::from(u32::MAX));
    assert_eq!(totals.channels[&SalesChannel::Location], 2 * u64::from(u32::MAX));
    assert_eq!(totals.produced, 2 * u64::from(u32::MAX));

    let report = aggregate(&products, &SalesQuery::default());
    assert_eq!(report.totals.total_sales, 2 * u64::from(u32::MAX) + 25);
  }
}
