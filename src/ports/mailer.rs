use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum MailError {
    #[error("invalid mail address or message")]
    Compose,
    #[error("failed to read the attachment")]
    Attachment,
    #[error("could not connect to the mail relay")]
    Connection,
    #[error("mail relay rejected the message or the login")]
    Rejected,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    pub subject: String,
    pub body: String,
    pub attachment: PathBuf,
}

#[async_trait::async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: &OutgoingMail) -> error_stack::Result<(), MailError>;
}
