use std::collections::BTreeMap;

use keksstube::commands;
use keksstube::import::sales_csv::{ColumnMapping, ImportInput};
use keksstube::models::*;
use keksstube::state::AppState;
use tempfile::TempDir;

fn open() -> (TempDir, AppState) {
  let dir = tempfile::tempdir().unwrap();
  let state = AppState::open(dir.path()).unwrap();
  (dir, state)
}

fn product(state: &AppState, id: u32) -> Product {
  commands::get_product(state, IdInput { id }).unwrap()
}

fn full_sheet(state: &AppState, counted: &[(u32, AuditCount)]) -> AuditSheet {
  let mut counts: BTreeMap<u32, AuditCount> = commands::list_products(state)
    .unwrap()
    .iter()
    .map(|product| {
      (
        product.id,
        AuditCount {
          verpackt: Some(0),
          ..Default::default()
        },
      )
    })
    .collect();
  for (id, count) in counted {
    counts.insert(*id, count.clone());
  }
  AuditSheet { counts }
}

fn submit(sheet: AuditSheet) -> AuditSubmitInput {
  AuditSubmitInput {
    sheet,
    user: "admin@cookie.com".to_string(),
    user_name: "Admin".to_string(),
    date: Some("2025-01-16".to_string()),
  }
}

#[test]
fn backup_json_restores_into_fresh_store() {
  let (_dir, source) = open();
  commands::update_daily(
    &source,
    DailyUpdateInput {
      product_id: 3,
      date: Some("2025-01-15".to_string()),
      values: DailyUpdate {
        verkauft_website: Some(7),
        trash: Some(2),
        ..Default::default()
      },
    },
    None,
  )
  .unwrap();
  commands::adjust_ingredient(&source, IngredientAdjustInput { id: 2, delta: -0.35 }, None).unwrap();
  let export = commands::export_backup_json(&source, None).unwrap();
  assert!(export.file_name.starts_with("cookie_business_backup_"));
  let json = export.json;

  let (_other, target) = open();
  commands::import_backup_json(&target, BackupJsonInput { json }, Some("admin@cookie.com".to_string())).unwrap();
  assert_eq!(target.snapshot().unwrap(), source.snapshot().unwrap());
}

#[test]
fn archive_backup_restores_after_changes() {
  let (_dir, state) = open();
  let archive = commands::create_backup(&state, BackupRequest { output_path: None }, None).unwrap();
  let before = state.snapshot().unwrap();

  commands::delete_product(&state, IdInput { id: 1 }, None).unwrap();
  assert_ne!(state.snapshot().unwrap(), before);

  commands::restore_backup(&state, RestoreRequest { archive_path: archive }, None).unwrap();
  assert_eq!(state.snapshot().unwrap(), before);
}

#[test]
fn deleting_product_removes_warn_level_and_recipe() {
  let (_dir, state) = open();
  let lemon = product(&state, 7);
  assert!(commands::get_warn_levels(&state).unwrap().contains_key(&lemon.name));

  commands::delete_product(&state, IdInput { id: 7 }, None).unwrap();

  assert!(!commands::get_warn_levels(&state).unwrap().contains_key(&lemon.name));
  assert!(state.read(|c| c.recipes.iter().all(|recipe| recipe.product_id != 7)).unwrap());
  assert!(commands::get_recipe(&state, IdInput { id: 7 }).unwrap_err().is_not_found());
}

#[test]
fn production_consumes_recipe_share() {
  let (_dir, state) = open();
  let sugar = commands::add_ingredient(
    &state,
    IngredientInput {
      name: "Rohrzucker".to_string(),
      amount: 40.0,
      unit: "kg".to_string(),
      min_stock: Some(5.0),
      cost_per_unit: Some(1.0),
      supplier: None,
    },
    None,
  )
  .unwrap();
  commands::update_recipe(
    &state,
    RecipeUpdateInput {
      product_id: 1,
      ingredients: [(sugar.id, 10.0)].into_iter().collect(),
      yield_units: 100,
      notes: None,
    },
    None,
  )
  .unwrap();

  let costs = commands::recipe_costs(&state).unwrap();
  let cost = costs.iter().find(|cost| cost.product_id == 1).unwrap();
  assert_eq!(cost.batch_cost, 10.0);
  assert!((cost.cost_per_unit - 0.10).abs() < 1e-9);

  let outcome = commands::record_production(
    &state,
    ProductionInput {
      product_id: 1,
      produced_total: 50,
      date: Some("2025-01-16".to_string()),
      allow_shortfall: false,
    },
    None,
  )
  .unwrap();
  assert_eq!(outcome.delta, 50);
  assert_eq!(outcome.consumed[0].deducted, 5.0);
  assert_eq!(product(&state, 1).prepared, 50);

  let remaining = state
    .read(|c| c.ingredients.iter().find(|item| item.id == sugar.id).map(|item| item.amount))
    .unwrap();
  assert_eq!(remaining, Some(35.0));
}

#[test]
fn insufficient_stock_commits_nothing() {
  let (_dir, state) = open();
  commands::update_recipe(
    &state,
    RecipeUpdateInput {
      product_id: 2,
      ingredients: [(6, 1.0)].into_iter().collect(),
      yield_units: 10,
      notes: Some("Vanille".to_string()),
    },
    None,
  )
  .unwrap();
  let before = state.snapshot().unwrap();
  let revision = state.revision();

  let err = commands::record_production(
    &state,
    ProductionInput {
      product_id: 2,
      produced_total: 100,
      date: Some("2025-01-16".to_string()),
      allow_shortfall: false,
    },
    None,
  )
  .unwrap_err();
  assert_eq!(err.code, "INSUFFICIENT_STOCK");
  assert!(err.message.contains("Vanilleextrakt"));
  assert_eq!(state.snapshot().unwrap(), before);
  assert_eq!(state.revision(), revision);

  let outcome = commands::record_production(
    &state,
    ProductionInput {
      product_id: 2,
      produced_total: 100,
      date: Some("2025-01-16".to_string()),
      allow_shortfall: true,
    },
    None,
  )
  .unwrap();
  assert_eq!(outcome.consumed[0].remaining, 0.0);
  assert!(outcome.consumed[0].shortfall > 9.0);
}

#[test]
fn audit_sets_baseline_and_repeats_cleanly() {
  let (_dir, state) = open();
  let counted = AuditCount {
    verpackt: Some(10),
    versand: Some(0),
    location: Some(5),
    kommentar: String::new(),
  };
  let sheet = full_sheet(&state, &[(1, counted)]);

  let first = commands::complete_audit(&state, submit(sheet.clone()), None).unwrap();
  let line = first.items.iter().find(|line| line.product_id == Some(1)).unwrap();
  assert_eq!(line.ist_final, 15);
  assert_eq!(product(&state, 1).target_stock, Some(15));

  let second = commands::complete_audit(&state, submit(sheet), None).unwrap();
  let line = second.items.iter().find(|line| line.product_id == Some(1)).unwrap();
  assert_eq!(line.soll, 15);
  assert_eq!(line.ist_final, 15);
  assert_eq!(line.differenz, Some(0));
  assert_eq!(second.total_difference, 0);
  assert_eq!(product(&state, 1).target_stock, Some(15));

  let log = commands::list_audits(&state, AuditFilter::default()).unwrap();
  assert_eq!(log.totals.count, 2);
}

#[test]
fn incomplete_audit_is_rejected() {
  let (_dir, state) = open();
  let mut counts = BTreeMap::new();
  counts.insert(
    1,
    AuditCount {
      verpackt: Some(4),
      ..Default::default()
    },
  );
  let err = commands::complete_audit(&state, submit(AuditSheet { counts }), None).unwrap_err();
  assert_eq!(err.code, "AUDIT_INCOMPLETE");
  assert!(state.read(|c| c.inventory_audits.is_empty()).unwrap());
  assert_eq!(product(&state, 1).target_stock, None);
}

#[test]
fn csv_import_updates_channels_and_sold() {
  let (_dir, state) = open();
  let text = "Datum,Cookie,Plattform,Anzahl\n\
              2025-01-16,Chocolate Chip,ubereats,8\n\
              16.01.2025,chocolate chip,Uber Eats,2\n\
              2025-01-16,Matcha Dream,wolt,3\n\
              gestern,Lemon,wolt,1\n";
  let input = ImportInput {
    text: text.to_string(),
    mapping: ColumnMapping::template(),
  };

  let preview = commands::preview_import(&state, input.clone()).unwrap();
  assert_eq!(preview.rows.len(), 3);
  assert_eq!(preview.invalid_rows, 1);

  let summary = commands::apply_import(&state, input, None).unwrap();
  assert_eq!(summary.applied_groups, 1);
  assert_eq!(summary.skipped_groups, 1);
  assert_eq!(summary.skipped_products, vec!["Matcha Dream".to_string()]);

  let chip = product(&state, 1);
  let day = chip.day("2025-01-16").unwrap();
  assert_eq!(day.verkauft_ubereats, 10);
  assert_eq!(day.sold(), 10);
  assert_eq!(chip.sold, 10);

  let missing = ImportInput {
    text: text.to_string(),
    mapping: ColumnMapping::default(),
  };
  assert_eq!(commands::apply_import(&state, missing, None).unwrap_err().code, "IMPORT_MAPPING");
}

#[test]
fn sales_report_and_day_totals_follow_daily_edits() {
  let (_dir, state) = open();
  for (product_id, location, website) in [(1, 10, 2), (3, 4, 0)] {
    commands::update_daily(
      &state,
      DailyUpdateInput {
        product_id,
        date: Some("2025-01-16".to_string()),
        values: DailyUpdate {
          verkauft_location: Some(location),
          verkauft_website: Some(website),
          mitarbeiter_verbrauch: Some(1),
          ..Default::default()
        },
      },
      None,
    )
    .unwrap();
  }

  let totals = commands::day_totals(
    &state,
    DateInput {
      date: Some("2025-01-16".to_string()),
    },
  )
  .unwrap();
  assert_eq!(totals.sold, 16);
  assert_eq!(totals.staff_consumption, 2);

  let report = commands::sales_report(&state, Default::default()).unwrap();
  assert_eq!(report.totals.total_sales, 16);
  assert_eq!(report.top_seller.unwrap().product_id, 1);

  let bad = keksstube::domain::sales::SalesQuery {
    from: Some("16.01.2025".to_string()),
    ..Default::default()
  };
  assert_eq!(commands::sales_report(&state, bad).unwrap_err().code, "INVALID_DATE");
}

#[test]
fn shopping_list_flags_low_ingredients() {
  let (_dir, state) = open();
  commands::adjust_ingredient(&state, IngredientAdjustInput { id: 3, delta: -100.0 }, None).unwrap();
  let list = commands::shopping_list(&state).unwrap();
  let butter = list.items.iter().find(|item| item.ingredient_id == 3).unwrap();
  assert_eq!(butter.amount, 0.0);
  assert_eq!(butter.recommended_order, 10.0);
  assert!(list.total_cost >= butter.estimated_cost);
}

#[test]
fn oversized_counts_are_rejected_and_store_stays_usable() {
  let (_dir, state) = open();
  let err = commands::update_daily(
    &state,
    DailyUpdateInput {
      product_id: 1,
      date: Some("2025-01-16".to_string()),
      values: DailyUpdate {
        verkauft_location: Some(u32::MAX),
        verkauft_wolt: Some(1),
        ..Default::default()
      },
    },
    None,
  )
  .unwrap_err();
  assert_eq!(err.code, "INVALID_AMOUNT");
  assert_eq!(product(&state, 1).sold, 0);

  let mut counts = BTreeMap::new();
  counts.insert(
    1,
    AuditCount {
      verpackt: Some(u32::MAX),
      versand: Some(1),
      ..Default::default()
    },
  );
  let err = commands::preview_audit(&state, AuditSheet { counts }).unwrap_err();
  assert_eq!(err.code, "INVALID_AMOUNT");

  let err = commands::adjust_counter(
    &state,
    CounterInput {
      id: 1,
      counter: CounterKind::Stock,
      delta: i64::MAX,
    },
    None,
  )
  .unwrap_err();
  assert_eq!(err.code, "INVALID_AMOUNT");

  assert_eq!(commands::list_products(&state).unwrap().len(), 9);
  assert_eq!(state.revision(), 0);
}

#[test]
fn backup_without_users_still_allows_admin_login() {
  let (_dir, state) = open();
  let export = commands::export_backup_json(&state, None).unwrap();
  let mut doc: serde_json::Value = serde_json::from_str(&export.json).unwrap();
  doc["users"] = serde_json::json!([]);

  commands::import_backup_json(&state, BackupJsonInput { json: doc.to_string() }, None).unwrap();
  let session = commands::login(
    &state,
    LoginInput {
      login_code: "12345".to_string(),
    },
  )
  .unwrap();
  assert_eq!(session.email, "admin@cookie.com");
}
