use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("invalid chat endpoint")]
    InvalidEndpoint,
    #[error("request to the chat server failed")]
    Http,
    #[error("chat server answered with status {status}")]
    Status { status: u16 },
}

#[async_trait::async_trait]
pub trait ChatNotifier: Send + Sync {
    async fn notify(&self, message: &str) -> error_stack::Result<(), NotifyError>;
}
