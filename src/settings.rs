use std::fs;
use std::path::Path;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde::Serialize;

use crate::domain::validation::{ensure_amount_non_negative, ensure_name};
use crate::error::AppError;
use crate::models::{Settings, SettingsInput, WebsiteSettings, WebsiteSettingsInput};

const MAX_LOGO_BYTES: u64 = 2 * 1024 * 1024;

#[derive(Debug, Serialize, Clone, Copy, PartialEq, Eq)]
pub struct ColorPreset {
  pub name: &'static str,
  pub background_color: &'static str,
  pub text_color: &'static str,
  pub button_bg_color: &'static str,
}

pub const PRESETS: [ColorPreset; 6] = [
  ColorPreset {
    name: "Amber Classic",
    background_color: "#fef3c7",
    text_color: "#1f2937",
    button_bg_color: "#f59e0b",
  },
  ColorPreset {
    name: "Blue Professional",
    background_color: "#dbeafe",
    text_color: "#1e3a8a",
    button_bg_color: "#3b82f6",
  },
  ColorPreset {
    name: "Green Fresh",
    background_color: "#d1fae5",
    text_color: "#064e3b",
    button_bg_color: "#10b981",
  },
  ColorPreset {
    name: "Purple Creative",
    background_color: "#e9d5ff",
    text_color: "#581c87",
    button_bg_color: "#8b5cf6",
  },
  ColorPreset {
    name: "Pink Sweet",
    background_color: "#fce7f3",
    text_color: "#831843",
    button_bg_color: "#ec4899",
  },
  ColorPreset {
    name: "Orange Warm",
    background_color: "#fed7aa",
    text_color: "#9a3412",
    button_bg_color: "#ea580c",
  },
];

pub fn apply_settings(settings: &mut Settings, input: &SettingsInput) -> Result<(), AppError> {
  if let Some(value) = input.cost_per_cookie {
    ensure_amount_non_negative(value, "Kosten pro Cookie")?;
    settings.cost_per_cookie = value;
  }
  if let Some(value) = input.cost_per_hour {
    ensure_amount_non_negative(value, "Stundensatz")?;
    settings.cost_per_hour = value;
  }
  Ok(())
}

fn ensure_color(value: &str) -> Result<String, AppError> {
  let trimmed = value.trim();
  let hex = trimmed.strip_prefix('#').unwrap_or("");
  if !(hex.len() == 6 || hex.len() == 3) || !hex.chars().all(|c| c.is_ascii_hexdigit()) {
    return Err(AppError::new("INVALID_COLOR", format!("Ungueltige Farbe: {trimmed}")));
  }
  Ok(trimmed.to_lowercase())
}

pub fn apply_website_settings(website: &mut WebsiteSettings, input: &WebsiteSettingsInput) -> Result<(), AppError> {
  let mut next = website.clone();

  if let Some(name) = input.preset.as_deref() {
    let preset = PRESETS
      .iter()
      .find(|preset| preset.name.eq_ignore_ascii_case(name.trim()))
      .ok_or_else(|| AppError::not_found(format!("Farbschema {name} nicht gefunden")))?;
    next.background_color = preset.background_color.to_string();
    next.text_color = preset.text_color.to_string();
    next.button_bg_color = preset.button_bg_color.to_string();
  }
  if let Some(name) = input.company_name.as_deref() {
    next.company_name = ensure_name(name, "Firmenname")?;
  }
  if let Some(color) = input.background_color.as_deref() {
    next.background_color = ensure_color(color)?;
  }
  if let Some(color) = input.text_color.as_deref() {
    next.text_color = ensure_color(color)?;
  }
  if let Some(color) = input.button_bg_color.as_deref() {
    next.button_bg_color = ensure_color(color)?;
  }
  if input.remove_logo {
    next.logo = None;
  }

  *website = next;
  Ok(())
}

fn mime_for(path: &Path) -> Option<&'static str> {
  let ext = path.extension()?.to_str()?.to_ascii_lowercase();
  match ext.as_str() {
    "png" => Some("image/png"),
    "jpg" | "jpeg" => Some("image/jpeg"),
    "gif" => Some("image/gif"),
    "svg" => Some("image/svg+xml"),
    "webp" => Some("image/webp"),
    _ => None,
  }
}

/// Reads an image file into a `data:` URL so the logo travels inside the
/// settings blob and the backup.
pub fn logo_data_url(path: &Path) -> Result<String, AppError> {
  let mime = mime_for(path).ok_or_else(|| AppError::new("INVALID_LOGO", "Logo muss PNG, JPG, GIF, SVG oder WEBP sein"))?;
  let size = fs::metadata(path)?.len();
  if size > MAX_LOGO_BYTES {
    return Err(AppError::new("INVALID_LOGO", "Logo ist groesser als 2 MB"));
  }
  let bytes = fs::read(path)?;
  Ok(format!("data:{mime};base64,{}", STANDARD.encode(bytes)))
}
