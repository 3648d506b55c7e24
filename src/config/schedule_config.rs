#[derive(serde::Deserialize, Debug, Clone)]
pub struct ScheduleConfig {
    /// Six-field cron expression (`sec min hour dom month dow`), local time.
    #[serde(default = "default_cron")]
    pub cron: Box<str>,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            cron: default_cron(),
        }
    }
}

fn default_cron() -> Box<str> {
    "0 30 16 * * Fri".into()
}
