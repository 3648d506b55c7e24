use std::path::PathBuf;

#[derive(serde::Deserialize, Debug, Clone)]
pub struct AuthConfig {
    /// Public client (application) id registered with the identity provider.
    pub client_id: Box<str>,
    #[serde(default = "default_authority")]
    pub authority: Box<str>,
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,
    #[serde(default = "default_token_cache_path")]
    pub token_cache_path: PathBuf,
}

fn default_authority() -> Box<str> {
    "https://login.microsoftonline.com/common".into()
}

fn default_scopes() -> Vec<String> {
    vec!["Files.ReadWrite".to_owned()]
}

fn default_token_cache_path() -> PathBuf {
    PathBuf::from("token_cache.json")
}
