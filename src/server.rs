use std::io::{Cursor, Read};

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tiny_http::{Header, Method, Request, Response, Server, StatusCode};

use crate::commands;
use crate::error::AppError;
use crate::state::AppState;

const DEFAULT_PORT: u16 = 48090;
const DEFAULT_BIND: &str = "127.0.0.1";
const ACTOR_HEADER: &str = "X-Actor";

type JsonResponse = Response<Cursor<Vec<u8>>>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
  pub bind: String,
  pub port: u16,
}

impl Default for ServerConfig {
  fn default() -> Self {
    Self {
      bind: DEFAULT_BIND.to_string(),
      port: DEFAULT_PORT,
    }
  }
}

impl ServerConfig {
  /// `KEKSSTUBE_BIND` and `KEKSSTUBE_PORT`; unset or unparsable values fall
  /// back to the defaults.
  pub fn from_env() -> Self {
    let mut config = Self::default();
    if let Ok(bind) = std::env::var("KEKSSTUBE_BIND") {
      let bind = bind.trim();
      if !bind.is_empty() {
        config.bind = bind.to_string();
      }
    }
    if let Ok(port) = std::env::var("KEKSSTUBE_PORT") {
      match port.trim().parse::<u16>() {
        Ok(port) => config.port = port,
        Err(_) => tracing::warn!(value = %port, default = DEFAULT_PORT, "KEKSSTUBE_PORT ungueltig"),
      }
    }
    config
  }
}

#[derive(Debug, Serialize)]
struct StatusResponse {
  revision: u64,
  last_change: String,
  products: usize,
  address: String,
}

/// Serves requests one at a time until the listener closes.
pub fn serve(state: &AppState, config: &ServerConfig) -> Result<(), AppError> {
  let server = Server::http((config.bind.as_str(), config.port))
    .map_err(|err| AppError::new("SERVER", format!("Server konnte nicht starten: {err}")))?;
  tracing::info!(bind = %config.bind, port = config.port, "api listening");

  for request in server.incoming_requests() {
    handle_request(request, state);
  }
  Ok(())
}

pub fn local_ip_string() -> String {
  local_ip_address::local_ip()
    .map(|ip| ip.to_string())
    .unwrap_or_else(|_| "0.0.0.0".to_string())
}

fn handle_request(mut request: Request, state: &AppState) {
  let method = request.method().clone();
  let url = request.url().split('?').next().unwrap_or("").to_string();
  tracing::debug!(method = %method, url = %url, "request");

  let response = match (method, url.as_str()) {
    (Method::Get, "/api/status") => handle_status(state),
    (Method::Post, path) => match path.strip_prefix("/api/") {
      Some(command) => handle_command(&mut request, state, command),
      None => json_error(StatusCode(404), "NOT_FOUND", "Route nicht gefunden"),
    },
    _ => json_error(StatusCode(404), "NOT_FOUND", "Route nicht gefunden"),
  };
  if let Err(err) = request.respond(response) {
    tracing::warn!(error = %err, "response not delivered");
  }
}

fn handle_status(state: &AppState) -> JsonResponse {
  let last_change = state.last_change().unwrap_or_else(|_| "unknown".to_string());
  let products = state.read(|c| c.products.len()).unwrap_or(0);
  json_response(
    StatusCode(200),
    &StatusResponse {
      revision: state.revision(),
      last_change,
      products,
      address: local_ip_string(),
    },
  )
}

fn handle_command(request: &mut Request, state: &AppState, command: &str) -> JsonResponse {
  let mut body = Vec::new();
  if let Err(err) = request.as_reader().read_to_end(&mut body) {
    return json_error(StatusCode(400), "INVALID_REQUEST", &err.to_string());
  }
  let actor = read_header(request, ACTOR_HEADER);

  match dispatch(state, command, &body, actor) {
    Ok(value) => json_response(StatusCode(200), &value),
    Err(err) => {
      let status = status_for(&err);
      if status.0 >= 500 {
        tracing::warn!(command, code = %err.code, message = %err.message, "command failed");
      } else {
        tracing::debug!(command, code = %err.code, "command rejected");
      }
      json_error(status, &err.code, &err.message)
    }
  }
}

fn parse<T: DeserializeOwned>(body: &[u8]) -> Result<T, AppError> {
  let body: &[u8] = if body.iter().all(u8::is_ascii_whitespace) {
    b"{}"
  } else {
    body
  };
  serde_json::from_slice(body)
    .map_err(|err| AppError::new("INVALID_REQUEST", format!("Ungueltiger Request: {err}")))
}

fn reply<T: Serialize>(value: T) -> Result<Value, AppError> {
  Ok(serde_json::to_value(value)?)
}

/// Runs one command by name with a JSON body.
pub fn dispatch(state: &AppState, command: &str, body: &[u8], actor: Option<String>) -> Result<Value, AppError> {
  match command {
    "list_products" => reply(commands::list_products(state)?),
    "get_product" => reply(commands::get_product(state, parse(body)?)?),
    "add_product" => reply(commands::add_product(state, parse(body)?, actor)?),
    "update_product" => reply(commands::update_product(state, parse(body)?, actor)?),
    "delete_product" => reply(commands::delete_product(state, parse(body)?, actor)?),
    "adjust_counter" => reply(commands::adjust_counter(state, parse(body)?, actor)?),

    "update_daily" => reply(commands::update_daily(state, parse(body)?, actor)?),
    "increment_daily" => reply(commands::increment_daily(state, parse(body)?, actor)?),
    "record_production" => reply(commands::record_production(state, parse(body)?, actor)?),
    "check_availability" => reply(commands::check_availability(state, parse(body)?)?),
    "ingredient_usage" => reply(commands::ingredient_usage(state, parse(body)?)?),

    "list_ingredients" => reply(commands::list_ingredients(state, parse(body)?)?),
    "add_ingredient" => reply(commands::add_ingredient(state, parse(body)?, actor)?),
    "update_ingredient" => reply(commands::update_ingredient(state, parse(body)?, actor)?),
    "delete_ingredient" => reply(commands::delete_ingredient(state, parse(body)?, actor)?),
    "adjust_ingredient" => reply(commands::adjust_ingredient(state, parse(body)?, actor)?),
    "shopping_list" => reply(commands::shopping_list(state)?),

    "get_recipe" => reply(commands::get_recipe(state, parse(body)?)?),
    "update_recipe" => reply(commands::update_recipe(state, parse(body)?, actor)?),
    "recipe_costs" => reply(commands::recipe_costs(state)?),
    "calculate_cost" => reply(commands::calculate_cost(state, parse(body)?)?),
    "get_warn_levels" => reply(commands::get_warn_levels(state)?),
    "set_warn_levels" => reply(commands::set_warn_levels(state, parse(body)?, actor)?),

    "preview_audit" => reply(commands::preview_audit(state, parse(body)?)?),
    "complete_audit" => reply(commands::complete_audit(state, parse(body)?, actor)?),
    "list_audits" => reply(commands::list_audits(state, parse(body)?)?),

    "sales_report" => reply(commands::sales_report(state, parse(body)?)?),
    "day_totals" => reply(commands::day_totals(state, parse(body)?)?),
    "day_drilldown" => reply(commands::day_drilldown(state, parse(body)?)?),
    "import_columns" => reply(commands::import_columns(parse(body)?)?),
    "import_template" => reply(commands::import_template()),
    "preview_import" => reply(commands::preview_import(state, parse(body)?)?),
    "apply_import" => reply(commands::apply_import(state, parse(body)?, actor)?),

    "list_todos" => reply(commands::list_todos(state)?),
    "add_todo" => reply(commands::add_todo(state, parse(body)?, actor)?),
    "update_todo" => reply(commands::update_todo(state, parse(body)?, actor)?),
    "toggle_todo" => reply(commands::toggle_todo(state, parse(body)?, actor)?),
    "delete_todo" => reply(commands::delete_todo(state, parse(body)?, actor)?),
    "list_plans" => reply(commands::list_plans(state)?),
    "add_plan" => reply(commands::add_plan(state, parse(body)?, actor)?),
    "update_plan" => reply(commands::update_plan(state, parse(body)?, actor)?),
    "toggle_plan" => reply(commands::toggle_plan(state, parse(body)?, actor)?),
    "delete_plan" => reply(commands::delete_plan(state, parse(body)?, actor)?),

    "login" => reply(commands::login(state, parse(body)?)?),
    "list_users" => reply(commands::list_users(state)?),
    "create_user" => reply(commands::create_user(state, parse(body)?, actor)?),
    "update_user" => reply(commands::update_user(state, parse(body)?, actor)?),
    "delete_user" => reply(commands::delete_user(state, parse(body)?, actor)?),

    "get_settings" => reply(commands::get_settings(state)?),
    "update_settings" => reply(commands::update_settings(state, parse(body)?, actor)?),
    "get_website_settings" => reply(commands::get_website_settings(state)?),
    "update_website_settings" => reply(commands::update_website_settings(state, parse(body)?, actor)?),
    "set_logo" => reply(commands::set_logo(state, parse(body)?, actor)?),
    "list_presets" => reply(commands::list_presets()),

    "dashboard" => reply(commands::dashboard(state, parse(body)?)?),
    "list_activity" => reply(commands::list_activity(state, parse(body)?)?),
    "export_csv" => reply(commands::export_csv(state, parse(body)?, actor)?),
    "export_excel" => reply(commands::export_excel(state, parse(body)?, actor)?),
    "export_backup_json" => reply(commands::export_backup_json(state, actor)?),
    "import_backup_json" => reply(commands::import_backup_json(state, parse(body)?, actor)?),
    "create_backup" => reply(commands::create_backup(state, parse(body)?, actor)?),
    "restore_backup" => reply(commands::restore_backup(state, parse(body)?, actor)?),
    "reset_data" => reply(commands::reset_data(state, actor)?),
    "get_revision" => reply(commands::get_revision(state)?),

    _ => Err(AppError::not_found(format!("Befehl {command} nicht gefunden"))),
  }
}

pub fn status_for(err: &AppError) -> StatusCode {
  match err.code.as_str() {
    "NOT_FOUND" => StatusCode(404),
    "LOGIN_FAILED" => StatusCode(401),
    "DB_ERROR" | "IO_ERROR" | "ZIP_ERROR" | "EXPORT" | "JSON" | "LOCK_ERROR" | "UNKNOWN_KEY" | "PATH" | "SERVER" => {
      StatusCode(500)
    }
    _ => StatusCode(400),
  }
}

fn read_header(request: &Request, name: &str) -> Option<String> {
  request
    .headers()
    .iter()
    .find(|header| header.field.as_str().as_str().eq_ignore_ascii_case(name))
    .map(|header| header.value.as_str().trim().to_string())
    .filter(|value| !value.is_empty())
}

fn json_response<T: Serialize>(status: StatusCode, payload: &T) -> JsonResponse {
  let body = serde_json::to_vec(payload).unwrap_or_else(|_| b"{}".to_vec());
  let mut response = Response::from_data(body).with_status_code(status);
  if let Some(header) = json_header("Content-Type", "application/json") {
    response.add_header(header);
  }
  response
}

fn json_error(status: StatusCode, code: &str, message: &str) -> JsonResponse {
  json_response(
    status,
    &serde_json::json!({
      "code": code,
      "message": message,
    }),
  )
}

fn json_header(name: &str, value: &str) -> Option<Header> {
  Header::from_bytes(name, value).ok()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn open() -> (tempfile::TempDir, AppState) {
    let dir = tempfile::tempdir().unwrap();
    let state = AppState::open(dir.path()).unwrap();
    (dir, state)
  }

  #[test]
  fn dispatch_reads_and_writes() {
    let (_dir, state) = open();
    let products = dispatch(&state, "list_products", b"", None).unwrap();
    assert_eq!(products.as_array().unwrap().len(), 9);

    let added = dispatch(
      &state,
      "add_product",
      br#"{"name": "Matcha", "price": 3.2}"#,
      Some("admin@cookie.com".to_string()),
    )
    .unwrap();
    assert_eq!(added["name"], "Matcha");
    assert_eq!(added["category"], "Classic");

    let revision = dispatch(&state, "get_revision", b"{}", None).unwrap();
    assert_eq!(revision["revision"], 1);
  }

  #[test]
  fn errors_map_to_status_codes() {
    let (_dir, state) = open();
    let err = dispatch(&state, "get_product", br#"{"id": 404}"#, None).unwrap_err();
    assert_eq!(status_for(&err), StatusCode(404));

    let err = dispatch(&state, "login", br#"{"login_code": "00000"}"#, None).unwrap_err();
    assert_eq!(status_for(&err), StatusCode(401));

    let err = dispatch(&state, "add_product", br#"{"name": "  "}"#, None).unwrap_err();
    assert_eq!(err.code, "INVALID_NAME");
    assert_eq!(status_for(&err), StatusCode(400));

    let err = dispatch(&state, "add_product", b"kein json", None).unwrap_err();
    assert_eq!(err.code, "INVALID_REQUEST");

    assert!(dispatch(&state, "format_disk", b"{}", None).unwrap_err().is_not_found());
    assert_eq!(status_for(&AppError::new("DB_ERROR", "x")), StatusCode(500));
  }

  #[test]
  fn config_defaults() {
    let config = ServerConfig::default();
    assert_eq!(config.port, 48090);
    assert_eq!(config.bind, "127.0.0.1");
  }
}
