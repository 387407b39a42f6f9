pub mod audit;
pub mod commands;
pub mod db;
pub mod domain;
pub mod error;
pub mod export;
pub mod files;
pub mod import;
pub mod models;
pub mod reports;
pub mod server;
pub mod settings;
pub mod state;

pub use error::AppError;
pub use state::AppState;
