use std::path::PathBuf;

use chrono::{Datelike, Duration, Local, Utc, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use keksstube::db;
use keksstube::error::AppError;
use keksstube::models::{Collections, SalesChannel};
use keksstube::state::{Activity, AppState};

const DEMO_NOTE: &str = "Demo-Daten";

fn main() -> Result<(), Box<dyn std::error::Error>> {
  tracing_subscriber::fmt()
    .with_env_filter(tracing_subscriber::EnvFilter::new("keksstube=info"))
    .init();

  let days = std::env::args()
    .nth(1)
    .and_then(|value| value.parse::<u32>().ok())
    .unwrap_or(60);

  let app_dir = if let Ok(path) = std::env::var("KEKSSTUBE_SEED_DIR") {
    PathBuf::from(path)
  } else {
    db::resolve_app_dir()?
  };

  let state = AppState::open(&app_dir)?;
  let activity = Activity::new("SEED_MOCK", "product").payload(&serde_json::json!({ "days": days, "note": DEMO_NOTE }));
  let records = state.mutate(&[db::KEY_PRODUCTS], activity, |c| seed_history(c, days))?;

  println!("{records} Tageswerte fuer {days} Tage in {} angelegt", app_dir.display());
  Ok(())
}

/// Fills the last `days` days with plausible production and channel sales
/// for every product. Existing days are overwritten.
fn seed_history(collections: &mut Collections, days: u32) -> Result<usize, AppError> {
  if collections.products.is_empty() {
    return Err(AppError::new("SEED", "Keine Produkte vorhanden"));
  }

  let mut rng = StdRng::seed_from_u64(Utc::now().timestamp_millis() as u64);
  let today = Local::now().date_naive();
  let mut records = 0;

  for offset in (0..days).rev() {
    let day_date = today - Duration::days(i64::from(offset));
    let date = day_date.format("%Y-%m-%d").to_string();
    let weekend = matches!(day_date.weekday(), Weekday::Sat | Weekday::Sun);

    for product in collections.products.iter_mut() {
      let produced: u32 = if weekend { rng.gen_range(40..90) } else { rng.gen_range(20..60) };
      let trash = rng.gen_range(0..4).min(produced);
      let mut remaining = produced - trash;

      product.update_day(&date, |day| {
        day.produziert = produced;
        day.prepared = produced;
        day.trash = trash;
        for channel in SalesChannel::ALL {
          let share = match channel {
            SalesChannel::Location => rng.gen_range(0..=remaining / 2),
            SalesChannel::Mitarbeiter => rng.gen_range(0..=remaining.min(2)),
            _ => rng.gen_range(0..=remaining / 4),
          };
          day.set_channel(channel, share);
          remaining -= share;
        }
        day.used = produced - trash - remaining;
      });
      product.stock = remaining;
      records += 1;
    }
  }

  Ok(records)
}
