use error_stack::{report, ResultExt};
use reqwest::{Client, StatusCode};
use serde::Serialize;
use tracing::instrument;
use url::Url;

use crate::config::matrix_config::MatrixConfig;
use crate::ports::chat_notifier::{ChatNotifier, NotifyError};

#[derive(Debug, Serialize)]
struct TextMessage<'a> {
    msgtype: &'static str,
    body: &'a str,
}

/// Posts `m.text` messages into one Matrix room through the client-server API.
#[derive(Clone)]
pub struct MatrixNotifier {
    client: Client,
    send_url: Url,
    room_id: String,
}

impl std::fmt::Debug for MatrixNotifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixNotifier")
            .field("room_id", &self.room_id)
            .finish()
    }
}

impl MatrixNotifier {
    pub fn new(client: Client, config: &MatrixConfig) -> error_stack::Result<Self, NotifyError> {
        let mut send_url = Url::parse(&config.homeserver_url)
            .change_context(NotifyError::InvalidEndpoint)
            .attach_printable_lazy(|| format!("homeserver_url: {}", config.homeserver_url))?;

        send_url
            .path_segments_mut()
            .map_err(|()| report!(NotifyError::InvalidEndpoint))
            .attach_printable_lazy(|| format!("homeserver_url: {}", config.homeserver_url))?
            .pop_if_empty()
            .extend(["_matrix", "client", "r0", "rooms"])
            .push(&config.room_id)
            .extend(["send", "m.room.message"]);
        send_url
            .query_pairs_mut()
            .append_pair("access_token", config.access_token.expose());

        Ok(Self {
            client,
            send_url,
            room_id: config.room_id.to_string(),
        })
    }
}

#[async_trait::async_trait]
impl ChatNotifier for MatrixNotifier {
    #[instrument(skip(self, message), name = "MatrixNotifier::notify", fields(room = %self.room_id))]
    async fn notify(&self, message: &str) -> error_stack::Result<(), NotifyError> {
        let response = self
            .client
            .post(self.send_url.clone())
            .json(&TextMessage {
                msgtype: "m.text",
                body: message,
            })
            .send()
            .await
            // The URL carries the access token.
            .map_err(|err| report!(err.without_url()).change_context(NotifyError::Http))?;

        let status = response.status();
        if status != StatusCode::OK {
            let body = response.text().await.unwrap_or_default();
            return Err(report!(NotifyError::Status {
                status: status.as_u16()
            }))
            .attach_printable(body);
        }

        tracing::info!("Notification sent to Matrix room {}", self.room_id);
        Ok(())
    }
}
