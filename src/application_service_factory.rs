use std::sync::Arc;

use error_stack::ResultExt;
use thiserror::Error;

use timesheet_relay::{
    adapters::{
        auth::MicrosoftAuthenticator, mail::SmtpMailer, matrix::MatrixNotifier,
        onedrive::GraphFileStore,
    },
    application::{service::TimesheetApplicationService, timesheet_routine::TimesheetRoutine},
    config::AppConfig,
};

#[derive(Error, Debug)]
pub enum FactoryError {
    #[error("failed to build the HTTP client")]
    HttpClient,
    #[error("invalid {component} configuration")]
    Component { component: &'static str },
}

pub struct ApplicationServiceFactory;

impl ApplicationServiceFactory {
    pub fn create(
        config: &AppConfig,
    ) -> error_stack::Result<TimesheetApplicationService, FactoryError> {
        let client = reqwest::Client::builder()
            .user_agent(concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")))
            .build()
            .change_context(FactoryError::HttpClient)?;

        let authenticator = Arc::new(
            MicrosoftAuthenticator::new(client.clone(), &config.auth)
                .change_context(FactoryError::Component { component: "auth" })?,
        );
        let file_store = Arc::new(
            GraphFileStore::new(client.clone(), &config.drive)
                .change_context(FactoryError::Component { component: "drive" })?,
        );
        let mailer = Arc::new(
            SmtpMailer::new(&config.mail)
                .change_context(FactoryError::Component { component: "mail" })?,
        );
        let notifier = Arc::new(
            MatrixNotifier::new(client, &config.matrix)
                .change_context(FactoryError::Component { component: "matrix" })?,
        );

        let routine = Arc::new(TimesheetRoutine::new(
            authenticator.clone(),
            file_store,
            mailer,
            notifier,
            config.clone(),
        ));

        Ok(TimesheetApplicationService::new(
            routine,
            authenticator,
            config.auth.token_cache_path.clone(),
        ))
    }
}
