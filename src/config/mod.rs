pub mod app_config;
pub mod auth_config;
pub mod drive_config;
pub mod mail_config;
pub mod matrix_config;
pub mod schedule_config;
pub mod secret;
pub mod workbook_config;

pub use app_config::{AppConfig, ConfigError};
