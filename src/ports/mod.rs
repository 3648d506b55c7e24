pub mod chat_notifier;
pub mod file_store;
pub mod mailer;
pub mod routine;
pub mod token_provider;
