use super::secret::Secret;

#[derive(serde::Deserialize, Debug, Clone)]
pub struct MailConfig {
    #[serde(default = "default_smtp_host")]
    pub smtp_host: Box<str>,
    #[serde(default = "default_smtp_port")]
    pub smtp_port: u16,
    /// Login name for the relay. Falls back to `from_address`.
    #[serde(default)]
    pub username: Option<Box<str>>,
    pub password: Secret,
    pub from_address: Box<str>,
    pub to_address: Box<str>,
    /// Name used to sign the email body.
    pub sender_name: Box<str>,
    #[serde(default = "default_report_title")]
    pub report_title: Box<str>,
    /// Optional line naming where the work was done.
    #[serde(default)]
    pub site: Option<Box<str>>,
}

impl MailConfig {
    pub fn login(&self) -> &str {
        self.username.as_deref().unwrap_or(&self.from_address)
    }
}

fn default_smtp_host() -> Box<str> {
    "smtp-mail.outlook.com".into()
}

fn default_smtp_port() -> u16 {
    587
}

fn default_report_title() -> Box<str> {
    "Retail Response Timesheet".into()
}
