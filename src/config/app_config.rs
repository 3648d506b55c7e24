use std::path::Path;

use config::{Config, ConfigBuilder, Environment, File, FileFormat};
use error_stack::{report, Report, ResultExt};
use thiserror::Error;

use super::{
    auth_config::AuthConfig, drive_config::DriveConfig, mail_config::MailConfig,
    matrix_config::MatrixConfig, schedule_config::ScheduleConfig,
    workbook_config::WorkbookConfig,
};

/// Variables such as `TIMESHEET__MAIL__PASSWORD` override the file.
pub const ENV_PREFIX: &str = "TIMESHEET";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read configuration source")]
    Source,
    #[error("configuration is missing or has an invalid property: {path}")]
    InvalidProperty { path: String },
}

#[derive(serde::Deserialize, Debug, Clone)]
pub struct AppConfig {
    pub auth: AuthConfig,
    pub drive: DriveConfig,
    #[serde(default)]
    pub workbook: WorkbookConfig,
    pub mail: MailConfig,
    pub matrix: MatrixConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
}

impl AppConfig {
    /// Reads `path` (any extension the `config` crate understands, or none)
    /// and applies environment overrides on top.
    pub fn load(path: &Path) -> error_stack::Result<Self, ConfigError> {
        Self::load_with_env(path, environment())
    }

    fn load_with_env(
        path: &Path,
        environment: Environment,
    ) -> error_stack::Result<Self, ConfigError> {
        let path_str = path.to_string_lossy();
        let builder = Config::builder()
            .add_source(File::with_name(&path_str))
            .add_source(environment);

        Self::build(builder).attach_printable_lazy(|| format!("config file: {}", path_str))
    }

    pub fn from_toml(source: &str) -> error_stack::Result<Self, ConfigError> {
        Self::build(Config::builder().add_source(File::from_str(source, FileFormat::Toml)))
    }

    fn build(
        builder: ConfigBuilder<config::builder::DefaultState>,
    ) -> error_stack::Result<Self, ConfigError> {
        let config = builder.build().change_context(ConfigError::Source)?;

        // `Config` coerces scalars, so `TIMESHEET__MAIL__PASSWORD=123456` is
        // still a string while `smtp_port` still parses as a number.
        serde_path_to_error::deserialize(config).map_err(|err| {
            let path = err.path().to_string();
            Report::new(err.into_inner())
                .change_context(ConfigError::InvalidProperty { path })
                .attach_printable(
                    "Make sure all required fields are present in the configuration file.",
                )
        })
    }

    pub fn ensure_scratch_dir(&self) -> error_stack::Result<(), ConfigError> {
        std::fs::create_dir_all(&self.drive.scratch_dir)
            .map_err(|err| report!(err).change_context(ConfigError::Source))
            .attach_printable_lazy(|| {
                format!(
                    "could not create scratch directory {}",
                    self.drive.scratch_dir.display()
                )
            })
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("__")
        .separator("__")
        .try_parsing(true)
}

#[cfg(test)]
pub(crate) const EXAMPLE_CONFIG: &str = r#"
[auth]
client_id = "00000000-0000-0000-0000-000000000000"

[drive]
folder = "Cerco time/Retail Responce"
file_name = "template.xlsx"
scratch_dir = "/tmp/timesheet"

[mail]
password = "app-password"
from_address = "me@example.com"
to_address = "payroll@example.com"
sender_name = "Sam"

[matrix]
homeserver_url = "https://matrix.example.org"
room_id = "!room:example.org"
access_token = "syt_token"
"#;
