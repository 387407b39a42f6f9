use chrono::{DateTime, Utc};
use rand::Rng;

use crate::error::AppError;
use crate::models::{Permissions, Role, Session, User};

pub const DEFAULT_ADMIN_EMAIL: &str = "admin@cookie.com";
pub const DEFAULT_ADMIN_CODE: &str = "12345";
const LOGIN_CODE_LEN: usize = 5;

impl Permissions {
  pub fn admin() -> Self {
    Self {
      view_dashboard: true,
      view_stats: true,
      view_tagesinfo: true,
      view_cookies: true,
      edit_cookies: true,
      add_cookies: true,
      delete_cookies: true,
      daily_tracking: true,
      production: true,
      view_inventory: true,
      edit_inventory: true,
      perform_inventory: true,
      view_inventory_log: true,
      view_ingredients: true,
      edit_ingredients: true,
      add_ingredients: true,
      delete_ingredients: true,
      view_todos: true,
      edit_todos: true,
      view_production_planning: true,
      edit_production_planning: true,
      view_recipes: true,
      edit_recipes: true,
      view_settings: true,
      edit_settings: true,
      manage_users: true,
      export_data: true,
      view_reports: true,
      view_shopping_list: true,
      edit_shopping_list: true,
    }
  }

  pub fn employee() -> Self {
    Self {
      view_stats: false,
      edit_cookies: false,
      add_cookies: false,
      delete_cookies: false,
      view_inventory_log: false,
      add_ingredients: false,
      delete_ingredients: false,
      edit_production_planning: false,
      edit_recipes: false,
      view_settings: false,
      edit_settings: false,
      manage_users: false,
      export_data: false,
      view_reports: false,
      edit_shopping_list: false,
      ..Self::admin()
    }
  }

  pub fn for_role(role: Role) -> Self {
    match role {
      Role::Admin => Self::admin(),
      Role::Mitarbeiter => Self::employee(),
    }
  }
}

pub fn default_admin(now: DateTime<Utc>) -> User {
  User {
    id: 1,
    email: DEFAULT_ADMIN_EMAIL.to_string(),
    login_code: DEFAULT_ADMIN_CODE.to_string(),
    role: Role::Admin,
    name: "Administrator".to_string(),
    permissions: Permissions::admin(),
    created_at: now.to_rfc3339(),
    last_login: None,
    is_active: true,
  }
}

fn code_matches(user: &User, code: &str) -> bool {
  user.is_active && !code.is_empty() && user.login_code == code
}

pub fn find_by_code<'a>(users: &'a [User], login_code: &str) -> Option<&'a User> {
  let code = login_code.trim();
  users.iter().find(|user| code_matches(user, code))
}

/// Matches a login code against the active users and stamps the login time.
pub fn authenticate(users: &mut [User], login_code: &str, now: DateTime<Utc>) -> Result<Session, AppError> {
  let code = login_code.trim();
  let user = users
    .iter_mut()
    .find(|user| code_matches(user, code))
    .ok_or_else(|| AppError::new("LOGIN_FAILED", "Ungueltiger Login-Code"))?;

  user.last_login = Some(now.to_rfc3339());
  Ok(Session {
    user_id: user.id,
    email: user.email.clone(),
    name: user.name.clone(),
    role: user.role,
    permissions: user.permissions.clone(),
  })
}

pub fn validate_login_code(code: &str) -> Result<String, AppError> {
  let trimmed = code.trim();
  if trimmed.is_empty() {
    return Err(AppError::new("INVALID_LOGIN_CODE", "Login-Code darf nicht leer sein"));
  }
  Ok(trimmed.to_string())
}

pub fn validate_email(email: &str) -> Result<String, AppError> {
  let trimmed = email.trim();
  if !trimmed.contains('@') || trimmed.starts_with('@') || trimmed.ends_with('@') {
    return Err(AppError::new("INVALID_EMAIL", "E-Mail Adresse ist ungueltig"));
  }
  Ok(trimmed.to_string())
}

/// A login code must identify one user, otherwise authentication would pick
/// whichever comes first.
pub fn ensure_code_unique(users: &[User], code: &str, except_id: Option<u32>) -> Result<(), AppError> {
  if users
    .iter()
    .any(|user| Some(user.id) != except_id && user.login_code == code)
  {
    return Err(AppError::new("DUPLICATE_LOGIN_CODE", "Login-Code ist bereits vergeben"));
  }
  Ok(())
}

pub fn generate_login_code(users: &[User]) -> String {
  let mut rng = rand::thread_rng();
  loop {
    let code: String = (0..LOGIN_CODE_LEN).map(|_| rng.gen_range(0..10).to_string()).collect();
    if !users.iter().any(|user| user.login_code == code) {
      return code;
    }
  }
}

pub fn active_admin_count(users: &[User]) -> usize {
  users
    .iter()
    .filter(|user| user.is_active && user.role == Role::Admin)
    .count()
}
