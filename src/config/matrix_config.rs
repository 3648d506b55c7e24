use super::secret::Secret;

#[derive(serde::Deserialize, Debug, Clone)]
pub struct MatrixConfig {
    pub homeserver_url: Box<str>,
    pub room_id: Box<str>,
    pub access_token: Secret,
}
