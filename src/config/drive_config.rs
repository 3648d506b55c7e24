use std::path::PathBuf;

#[derive(serde::Deserialize, Debug, Clone)]
pub struct DriveConfig {
    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: Box<str>,
    /// Folder path below the drive root, `/`-separated.
    pub folder: Box<str>,
    /// Name of the template workbook inside `folder`.
    pub file_name: Box<str>,
    /// Where the downloaded and edited workbooks are written during a run.
    #[serde(default = "std::env::temp_dir")]
    pub scratch_dir: PathBuf,
}

fn default_graph_base_url() -> Box<str> {
    "https://graph.microsoft.com/v1.0/".into()
}
