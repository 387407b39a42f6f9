use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

pub const SCHEMA_VERSION: u32 = 1;

pub type WarnLevels = BTreeMap<String, u32>;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Product {
  pub id: u32,
  pub name: String,
  pub category: String,
  pub price: f64,
  pub production_price: f64,
  #[serde(default)]
  pub sold: u32,
  #[serde(default)]
  pub stock: u32,
  #[serde(default)]
  pub prepared: u32,
  #[serde(default)]
  pub target_stock: Option<i64>,
  #[serde(default)]
  pub history: BTreeMap<String, DailyRecord>,
}

impl Product {
  pub fn new(id: u32, name: &str, category: &str, price: f64, production_price: f64) -> Self {
    Self {
      id,
      name: name.to_string(),
      category: category.to_string(),
      price,
      production_price,
      sold: 0,
      stock: 0,
      prepared: 0,
      target_stock: None,
      history: BTreeMap::new(),
    }
  }

  pub fn day(&self, date: &str) -> Option<&DailyRecord> {
    self.history.get(date)
  }

  pub fn day_mut(&mut self, date: &str) -> &mut DailyRecord {
    self.history.entry(date.to_string()).or_default()
  }

  /// Runs `f` on the record for `date` and carries the change of that day's
  /// sales into the cumulative `sold` counter.
  pub fn update_day<T>(&mut self, date: &str, f: impl FnOnce(&mut DailyRecord) -> T) -> T {
    let day = self.history.entry(date.to_string()).or_default();
    let before = i64::from(day.sold());
    let result = f(day);
    let after = i64::from(day.sold());
    self.sold = apply_delta(self.sold, after - before);
    result
  }

  pub fn adjust_counter(&mut self, counter: CounterKind, delta: i64) {
    let slot = match counter {
      CounterKind::Sold => &mut self.sold,
      CounterKind::Stock => &mut self.stock,
      CounterKind::Prepared => &mut self.prepared,
    };
    *slot = apply_delta(*slot, delta);
  }
}

/// Adds a signed delta to a counter, saturating at zero and `u32::MAX`.
pub fn apply_delta(value: u32, delta: i64) -> u32 {
  (i64::from(value) + delta).clamp(0, i64::from(u32::MAX)) as u32
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CounterKind {
  Sold,
  Stock,
  Prepared,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SalesChannel {
  Location,
  Ubereats,
  Wolt,
  Lieferando,
  Website,
  Mitarbeiter,
}

impl SalesChannel {
  pub const ALL: [SalesChannel; 6] = [
    SalesChannel::Location,
    SalesChannel::Ubereats,
    SalesChannel::Wolt,
    SalesChannel::Lieferando,
    SalesChannel::Website,
    SalesChannel::Mitarbeiter,
  ];

  pub const REVENUE: [SalesChannel; 5] = [
    SalesChannel::Location,
    SalesChannel::Ubereats,
    SalesChannel::Wolt,
    SalesChannel::Lieferando,
    SalesChannel::Website,
  ];

  pub fn is_revenue(self) -> bool {
    self != SalesChannel::Mitarbeiter
  }

  pub fn field_key(self) -> &'static str {
    match self {
      SalesChannel::Location => "verkauft_location",
      SalesChannel::Ubereats => "verkauft_ubereats",
      SalesChannel::Wolt => "verkauft_wolt",
      SalesChannel::Lieferando => "verkauft_lieferando",
      SalesChannel::Website => "verkauft_website",
      SalesChannel::Mitarbeiter => "mitarbeiter_verbrauch",
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      SalesChannel::Location => "Vor Ort",
      SalesChannel::Ubereats => "Uber Eats",
      SalesChannel::Wolt => "Wolt",
      SalesChannel::Lieferando => "Lieferando",
      SalesChannel::Website => "Website",
      SalesChannel::Mitarbeiter => "Mitarbeiter",
    }
  }

  /// Maps a free-text platform keyword to a channel. Unknown keywords land in
  /// the in-store channel.
  pub fn from_keyword(keyword: &str) -> SalesChannel {
    match keyword.trim().to_lowercase().as_str() {
      "location" | "vor ort" | "laden" | "shop" => SalesChannel::Location,
      "ubereats" | "uber eats" | "uber" => SalesChannel::Ubereats,
      "wolt" => SalesChannel::Wolt,
      "lieferando" => SalesChannel::Lieferando,
      "website" | "online" | "web" => SalesChannel::Website,
      "mitarbeiter" | "staff" | "employee" => SalesChannel::Mitarbeiter,
      _ => SalesChannel::Location,
    }
  }
}

/// One product's numbers for one calendar day.
///
/// `sold()` is derived: records written through the channel fields report the
/// channel sum, records imported from the aggregate-only era keep their stored
/// total in `legacy_sold` until a channel is written.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
#[serde(from = "DailyRecordRepr", into = "DailyRecordRepr")]
pub struct DailyRecord {
  pub verkauft_location: u32,
  pub verkauft_ubereats: u32,
  pub verkauft_wolt: u32,
  pub verkauft_lieferando: u32,
  pub verkauft_website: u32,
  pub mitarbeiter_verbrauch: u32,
  pub prepared: u32,
  pub produziert: u32,
  pub trash: u32,
  pub used: u32,
  pub inventur: Option<u32>,
  pub legacy_sold: Option<u32>,
}

impl DailyRecord {
  pub fn channel(&self, channel: SalesChannel) -> u32 {
    match channel {
      SalesChannel::Location => self.verkauft_location,
      SalesChannel::Ubereats => self.verkauft_ubereats,
      SalesChannel::Wolt => self.verkauft_wolt,
      SalesChannel::Lieferando => self.verkauft_lieferando,
      SalesChannel::Website => self.verkauft_website,
      SalesChannel::Mitarbeiter => self.mitarbeiter_verbrauch,
    }
  }

  pub fn set_channel(&mut self, channel: SalesChannel, value: u32) {
    let slot = match channel {
      SalesChannel::Location => &mut self.verkauft_location,
      SalesChannel::Ubereats => &mut self.verkauft_ubereats,
      SalesChannel::Wolt => &mut self.verkauft_wolt,
      SalesChannel::Lieferando => &mut self.verkauft_lieferando,
      SalesChannel::Website => &mut self.verkauft_website,
      SalesChannel::Mitarbeiter => &mut self.mitarbeiter_verbrauch,
    };
    *slot = value;
    if channel.is_revenue() {
      self.legacy_sold = None;
    }
  }

  pub fn channel_sum(&self) -> u32 {
    SalesChannel::REVENUE
      .iter()
      .fold(0u32, |sum, channel| sum.saturating_add(self.channel(*channel)))
  }

  pub fn sold(&self) -> u32 {
    self.legacy_sold.unwrap_or_else(|| self.channel_sum())
  }

  pub fn has_channel_data(&self) -> bool {
    self.channel_sum() > 0
  }

  pub fn apply(&mut self, update: &DailyUpdate) {
    for channel in SalesChannel::ALL {
      if let Some(value) = update.channel(channel) {
        self.set_channel(channel, value);
      }
    }
    if let Some(value) = update.prepared {
      self.prepared = value;
    }
    if let Some(value) = update.produziert {
      self.produziert = value;
    }
    if let Some(value) = update.trash {
      self.trash = value;
    }
    if let Some(value) = update.used {
      self.used = value;
    }
  }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
struct DailyRecordRepr {
  #[serde(default)]
  verkauft_location: u32,
  #[serde(default)]
  verkauft_ubereats: u32,
  #[serde(default)]
  verkauft_wolt: u32,
  #[serde(default)]
  verkauft_lieferando: u32,
  #[serde(default)]
  verkauft_website: u32,
  #[serde(default)]
  mitarbeiter_verbrauch: u32,
  #[serde(default)]
  prepared: u32,
  #[serde(default)]
  produziert: u32,
  #[serde(default)]
  trash: u32,
  #[serde(default)]
  used: u32,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  inventur: Option<u32>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  legacy_sold: Option<u32>,
  #[serde(default)]
  sold: u32,
}

impl From<DailyRecordRepr> for DailyRecord {
  fn from(repr: DailyRecordRepr) -> Self {
    DailyRecord {
      verkauft_location: repr.verkauft_location,
      verkauft_ubereats: repr.verkauft_ubereats,
      verkauft_wolt: repr.verkauft_wolt,
      verkauft_lieferando: repr.verkauft_lieferando,
      verkauft_website: repr.verkauft_website,
      mitarbeiter_verbrauch: repr.mitarbeiter_verbrauch,
      prepared: repr.prepared,
      produziert: repr.produziert,
      trash: repr.trash,
      used: repr.used,
      inventur: repr.inventur,
      legacy_sold: repr.legacy_sold,
    }
  }
}

impl From<DailyRecord> for DailyRecordRepr {
  fn from(record: DailyRecord) -> Self {
    let sold = record.sold();
    DailyRecordRepr {
      verkauft_location: record.verkauft_location,
      verkauft_ubereats: record.verkauft_ubereats,
      verkauft_wolt: record.verkauft_wolt,
      verkauft_lieferando: record.verkauft_lieferando,
      verkauft_website: record.verkauft_website,
      mitarbeiter_verbrauch: record.mitarbeiter_verbrauch,
      prepared: record.prepared,
      produziert: record.produziert,
      trash: record.trash,
      used: record.used,
      inventur: record.inventur,
      legacy_sold: record.legacy_sold,
      sold,
    }
  }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct DailyUpdate {
  pub verkauft_location: Option<u32>,
  pub verkauft_ubereats: Option<u32>,
  pub verkauft_wolt: Option<u32>,
  pub verkauft_lieferando: Option<u32>,
  pub verkauft_website: Option<u32>,
  pub mitarbeiter_verbrauch: Option<u32>,
  pub prepared: Option<u32>,
  pub produziert: Option<u32>,
  pub trash: Option<u32>,
  pub used: Option<u32>,
}

impl DailyUpdate {
  pub fn fields(&self) -> [(&'static str, Option<u32>); 10] {
    [
      ("verkauft_location", self.verkauft_location),
      ("verkauft_ubereats", self.verkauft_ubereats),
      ("verkauft_wolt", self.verkauft_wolt),
      ("verkauft_lieferando", self.verkauft_lieferando),
      ("verkauft_website", self.verkauft_website),
      ("mitarbeiter_verbrauch", self.mitarbeiter_verbrauch),
      ("prepared", self.prepared),
      ("produziert", self.produziert),
      ("trash", self.trash),
      ("used", self.used),
    ]
  }

  pub fn channel(&self, channel: SalesChannel) -> Option<u32> {
    match channel {
      SalesChannel::Location => self.verkauft_location,
      SalesChannel::Ubereats => self.verkauft_ubereats,
      SalesChannel::Wolt => self.verkauft_wolt,
      SalesChannel::Lieferando => self.verkauft_lieferando,
      SalesChannel::Website => self.verkauft_website,
      SalesChannel::Mitarbeiter => self.mitarbeiter_verbrauch,
    }
  }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DailyField {
  VerkauftLocation,
  VerkauftUbereats,
  VerkauftWolt,
  VerkauftLieferando,
  VerkauftWebsite,
  MitarbeiterVerbrauch,
  Prepared,
  Trash,
  Used,
}

impl DailyField {
  pub fn channel(self) -> Option<SalesChannel> {
    match self {
      DailyField::VerkauftLocation => Some(SalesChannel::Location),
      DailyField::VerkauftUbereats => Some(SalesChannel::Ubereats),
      DailyField::VerkauftWolt => Some(SalesChannel::Wolt),
      DailyField::VerkauftLieferando => Some(SalesChannel::Lieferando),
      DailyField::VerkauftWebsite => Some(SalesChannel::Website),
      DailyField::MitarbeiterVerbrauch => Some(SalesChannel::Mitarbeiter),
      DailyField::Prepared | DailyField::Trash | DailyField::Used => None,
    }
  }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Ingredient {
  pub id: u32,
  pub name: String,
  pub amount: f64,
  pub unit: String,
  pub min_stock: f64,
  pub cost_per_unit: f64,
  pub supplier: String,
  pub last_updated: String,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub bestaende: Option<BTreeMap<String, f64>>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Recipe {
  pub product_id: u32,
  #[serde(default)]
  pub ingredients: BTreeMap<u32, f64>,
  #[serde(rename = "yield")]
  pub yield_units: u32,
  #[serde(default)]
  pub notes: String,
}

impl Recipe {
  pub fn empty(product_id: u32) -> Self {
    Self {
      product_id,
      ingredients: BTreeMap::new(),
      yield_units: 100,
      notes: String::new(),
    }
  }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditStatus {
  Completed,
  Pending,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct AuditLine {
  #[serde(default)]
  pub product_id: Option<u32>,
  pub cookie: String,
  pub soll: i64,
  pub ist_lager_verpackt: Option<u32>,
  pub ist_lager_versand: Option<u32>,
  pub ist_location: Option<u32>,
  pub ist_final: u32,
  pub differenz: Option<i64>,
  #[serde(default)]
  pub kommentar: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct InventoryAudit {
  pub id: String,
  pub date: String,
  pub user: String,
  pub user_name: String,
  pub items: Vec<AuditLine>,
  pub total_difference: i64,
  pub status: AuditStatus,
  pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Todo {
  pub id: i64,
  pub text: String,
  pub date: String,
  #[serde(default)]
  pub info: String,
  #[serde(default)]
  pub done: bool,
  pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct ProductionPlan {
  pub id: i64,
  pub cookie: String,
  pub menge: u32,
  pub deadline: String,
  #[serde(default)]
  pub note: String,
  #[serde(default)]
  pub done: bool,
  pub created_at: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Settings {
  pub cost_per_cookie: f64,
  pub cost_per_hour: f64,
}

impl Default for Settings {
  fn default() -> Self {
    Self {
      cost_per_cookie: 0.7,
      cost_per_hour: 60.0,
    }
  }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct WebsiteSettings {
  pub company_name: String,
  pub logo: Option<String>,
  pub background_color: String,
  pub text_color: String,
  pub button_bg_color: String,
}

impl Default for WebsiteSettings {
  fn default() -> Self {
    Self {
      company_name: "Cookie Business".to_string(),
      logo: None,
      background_color: "#fef3c7".to_string(),
      text_color: "#1f2937".to_string(),
      button_bg_color: "#f59e0b".to_string(),
    }
  }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Role {
  Admin,
  Mitarbeiter,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Permissions {
  pub view_dashboard: bool,
  pub view_stats: bool,
  pub view_tagesinfo: bool,
  pub view_cookies: bool,
  pub edit_cookies: bool,
  pub add_cookies: bool,
  pub delete_cookies: bool,
  pub daily_tracking: bool,
  pub production: bool,
  pub view_inventory: bool,
  pub edit_inventory: bool,
  pub perform_inventory: bool,
  pub view_inventory_log: bool,
  pub view_ingredients: bool,
  pub edit_ingredients: bool,
  pub add_ingredients: bool,
  pub delete_ingredients: bool,
  pub view_todos: bool,
  pub edit_todos: bool,
  pub view_production_planning: bool,
  pub edit_production_planning: bool,
  pub view_recipes: bool,
  pub edit_recipes: bool,
  pub view_settings: bool,
  pub edit_settings: bool,
  pub manage_users: bool,
  pub export_data: bool,
  pub view_reports: bool,
  pub view_shopping_list: bool,
  pub edit_shopping_list: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct User {
  pub id: u32,
  pub email: String,
  pub login_code: String,
  pub role: Role,
  pub name: String,
  pub permissions: Permissions,
  pub created_at: String,
  #[serde(default)]
  pub last_login: Option<String>,
  pub is_active: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Session {
  pub user_id: u32,
  pub email: String,
  pub name: String,
  pub role: Role,
  pub permissions: Permissions,
}

/// Every persisted collection. This is what the store holds and what a full
/// backup carries.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Default)]
pub struct Collections {
  #[serde(default)]
  pub products: Vec<Product>,
  #[serde(default)]
  pub settings: Settings,
  #[serde(default)]
  pub website_settings: WebsiteSettings,
  #[serde(default)]
  pub ingredients: Vec<Ingredient>,
  #[serde(default)]
  pub inventory_audits: Vec<InventoryAudit>,
  #[serde(default)]
  pub warn_levels: WarnLevels,
  #[serde(default)]
  pub recipes: Vec<Recipe>,
  #[serde(default)]
  pub todos: Vec<Todo>,
  #[serde(default)]
  pub production_plans: Vec<ProductionPlan>,
  #[serde(default)]
  pub users: Vec<User>,
}

// Command inputs

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProductInput {
  pub name: String,
  pub category: Option<String>,
  pub price: Option<f64>,
  pub production_price: Option<f64>,
  pub warn_level: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProductUpdateInput {
  pub id: u32,
  pub name: Option<String>,
  pub category: Option<String>,
  pub price: Option<f64>,
  pub production_price: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CounterInput {
  pub id: u32,
  pub counter: CounterKind,
  pub delta: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DailyUpdateInput {
  pub product_id: u32,
  pub date: Option<String>,
  #[serde(flatten)]
  pub values: DailyUpdate,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct DailyIncrementInput {
  pub product_id: u32,
  pub date: Option<String>,
  pub field: DailyField,
  pub delta: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ProductionInput {
  pub product_id: u32,
  pub produced_total: u32,
  pub date: Option<String>,
  #[serde(default)]
  pub allow_shortfall: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IngredientInput {
  pub name: String,
  pub amount: f64,
  pub unit: String,
  pub min_stock: Option<f64>,
  pub cost_per_unit: Option<f64>,
  pub supplier: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct IngredientUpdateInput {
  pub id: u32,
  pub name: Option<String>,
  pub amount: Option<f64>,
  pub unit: Option<String>,
  pub min_stock: Option<f64>,
  pub cost_per_unit: Option<f64>,
  pub supplier: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum StatusFilter {
  #[default]
  All,
  Low,
  Critical,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct IngredientFilter {
  pub search: Option<String>,
  #[serde(default)]
  pub status: StatusFilter,
}

/// Counted quantities for one product. An absent count means "not counted";
/// the empty string sent by form inputs deserializes to the same thing.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct AuditCount {
  #[serde(default, deserialize_with = "deserialize_count")]
  pub verpackt: Option<u32>,
  #[serde(default, deserialize_with = "deserialize_count")]
  pub versand: Option<u32>,
  #[serde(default, deserialize_with = "deserialize_count")]
  pub location: Option<u32>,
  #[serde(default)]
  pub kommentar: String,
}

impl AuditCount {
  pub fn is_counted(&self) -> bool {
    self.verpackt.is_some() || self.versand.is_some() || self.location.is_some()
  }

  pub fn ist_total(&self) -> u32 {
    self
      .verpackt
      .unwrap_or(0)
      .saturating_add(self.versand.unwrap_or(0))
      .saturating_add(self.location.unwrap_or(0))
  }

  pub fn values(&self) -> [Option<u32>; 3] {
    [self.verpackt, self.versand, self.location]
  }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AuditSheet {
  #[serde(default)]
  pub counts: BTreeMap<u32, AuditCount>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum AuditPeriod {
  #[default]
  All,
  Days7,
  Days30,
  Days90,
}

impl AuditPeriod {
  pub fn days(self) -> Option<i64> {
    match self {
      AuditPeriod::All => None,
      AuditPeriod::Days7 => Some(7),
      AuditPeriod::Days30 => Some(30),
      AuditPeriod::Days90 => Some(90),
    }
  }
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct AuditFilter {
  pub search: Option<String>,
  #[serde(default)]
  pub period: AuditPeriod,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct RecipeUpdateInput {
  pub product_id: u32,
  pub ingredients: BTreeMap<u32, f64>,
  #[serde(rename = "yield")]
  pub yield_units: u32,
  pub notes: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct CostInput {
  pub product_id: u32,
  pub quantity: u32,
  pub hours: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TodoInput {
  pub text: String,
  pub date: Option<String>,
  pub info: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TodoUpdateInput {
  pub id: i64,
  pub text: String,
  pub date: String,
  pub info: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlanInput {
  pub cookie: String,
  pub menge: u32,
  pub deadline: Option<String>,
  pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserInput {
  pub email: String,
  pub name: String,
  pub role: Role,
  pub login_code: Option<String>,
  pub permissions: Option<Permissions>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct UserUpdateInput {
  pub id: u32,
  pub email: Option<String>,
  pub name: Option<String>,
  pub role: Option<Role>,
  pub login_code: Option<String>,
  pub permissions: Option<Permissions>,
  pub is_active: Option<bool>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct IdInput {
  pub id: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct TaskIdInput {
  pub id: i64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DateInput {
  pub date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct IngredientAdjustInput {
  pub id: u32,
  pub delta: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy)]
pub struct AvailabilityInput {
  pub product_id: u32,
  pub quantity: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct UsageInput {
  pub from: Option<String>,
  pub to: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UsageLine {
  pub ingredient_id: u32,
  pub name: String,
  pub unit: String,
  pub amount: f64,
  pub cost: f64,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct AuditSubmitInput {
  #[serde(flatten)]
  pub sheet: AuditSheet,
  pub user: String,
  pub user_name: String,
  pub date: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlanUpdateInput {
  pub id: i64,
  pub cookie: Option<String>,
  pub menge: Option<u32>,
  pub deadline: Option<String>,
  pub note: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoginInput {
  pub login_code: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct ActivityQuery {
  pub limit: Option<u32>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct BackupExport {
  pub file_name: String,
  pub json: String,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BackupJsonInput {
  pub json: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct CsvExport {
  pub file_name: String,
  pub content: String,
  pub path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct SettingsInput {
  pub cost_per_cookie: Option<f64>,
  pub cost_per_hour: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct WebsiteSettingsInput {
  pub company_name: Option<String>,
  pub background_color: Option<String>,
  pub text_color: Option<String>,
  pub button_bg_color: Option<String>,
  /// Name of a color preset; explicit colors win over the preset.
  pub preset: Option<String>,
  #[serde(default)]
  pub remove_logo: bool,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LogoInput {
  pub path: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CsvReport {
  Daily,
  Summary,
  Audits,
  Recipes,
  ProductionPlans,
  ShoppingList,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ExportRequest {
  pub output_path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CsvExportRequest {
  pub report: CsvReport,
  pub output_path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BackupRequest {
  pub output_path: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RestoreRequest {
  pub archive_path: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct Revision {
  pub revision: u64,
  pub last_change: String,
}

fn deserialize_count<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
  D: Deserializer<'de>,
{
  #[derive(Deserialize)]
  #[serde(untagged)]
  enum Raw {
    Number(u32),
    Text(String),
  }

  match Option::<Raw>::deserialize(deserializer)? {
    None => Ok(None),
    Some(Raw::Number(value)) => Ok(Some(value)),
    Some(Raw::Text(text)) => {
      let trimmed = text.trim();
      if trimmed.is_empty() {
        return Ok(None);
      }
      trimmed
        .parse::<u32>()
        .map(Some)
        .map_err(|_| serde::de::Error::custom(format!("ungueltige Zaehlung: {trimmed}")))
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn channel_write_clears_legacy_total() {
    let mut record = DailyRecord {
      legacy_sold: Some(12),
      ..Default::default()
    };
    assert_eq!(record.sold(), 12);
    record.set_channel(SalesChannel::Wolt, 4);
    assert_eq!(record.legacy_sold, None);
    assert_eq!(record.sold(), 4);
  }

  #[test]
  fn staff_consumption_is_not_a_sale() {
    let mut record = DailyRecord::default();
    record.set_channel(SalesChannel::Mitarbeiter, 3);
    record.set_channel(SalesChannel::Location, 2);
    assert_eq!(record.sold(), 2);
    assert_eq!(record.mitarbeiter_verbrauch, 3);
  }

  #[test]
  fn sums_saturate_instead_of_overflowing() {
    let mut record = DailyRecord::default();
    record.set_channel(SalesChannel::Location, u32::MAX);
    record.set_channel(SalesChannel::Wolt, 1);
    assert_eq!(record.sold(), u32::MAX);

    let count = AuditCount {
      verpackt: Some(u32::MAX),
      versand: Some(1),
      ..Default::default()
    };
    assert_eq!(count.ist_total(), u32::MAX);
  }

  #[test]
  fn serialized_record_carries_sold() {
    let mut record = DailyRecord::default();
    record.set_channel(SalesChannel::Ubereats, 8);
    record.set_channel(SalesChannel::Location, 2);
    let json = serde_json::to_value(&record).unwrap();
    assert_eq!(json["sold"], 10);
    let back: DailyRecord = serde_json::from_value(json).unwrap();
    assert_eq!(back, record);
  }

  #[test]
  fn keyword_synonyms() {
    assert_eq!(SalesChannel::from_keyword(" Uber Eats "), SalesChannel::Ubereats);
    assert_eq!(SalesChannel::from_keyword("online"), SalesChannel::Website);
    assert_eq!(SalesChannel::from_keyword("staff"), SalesChannel::Mitarbeiter);
    assert_eq!(SalesChannel::from_keyword("marktstand"), SalesChannel::Location);
  }

  #[test]
  fn counter_delta_saturates() {
    let mut product = Product::new(1, "Lemon", "Seasonal", 2.6, 0.8);
    product.adjust_counter(CounterKind::Stock, 5);
    product.adjust_counter(CounterKind::Stock, -9);
    assert_eq!(product.stock, 0);
    product.adjust_counter(CounterKind::Prepared, 3);
    assert_eq!(product.prepared, 3);
  }

  #[test]
  fn audit_count_accepts_form_strings() {
    let count: AuditCount =
      serde_json::from_str(r#"{"verpackt":"10","versand":"","location":5}"#).unwrap();
    assert_eq!(count.verpackt, Some(10));
    assert_eq!(count.versand, None);
    assert_eq!(count.location, Some(5));
    assert!(count.is_counted());
    assert_eq!(count.ist_total(), 15);

    let empty: AuditCount = serde_json::from_str(r#"{"verpackt":"","versand":null}"#).unwrap();
    assert!(!empty.is_counted());
  }
}
