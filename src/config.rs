use std::path::PathBuf;

use serde::Deserialize;

pub const DEFAULT_MAX_UPLOAD_BYTES: u64 = 20 * 1024 * 1024;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub database_url: String,
    #[serde(default = "default_max_connections")]
    pub db_max_connections: u32,

    // Blob storage for uploaded spreadsheets
    #[serde(default = "default_storage_dir")]
    pub storage_dir: PathBuf,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,

    // Used to synthesize addresses for spreadsheet rows without an email column
    #[serde(default = "default_email_domain")]
    pub email_domain: String,

    // SMTP for the summary job
    #[serde(default = "default_smtp_host")]
    pub smtp_host: String,
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
    #[serde(default = "default_smtp_from")]
    pub smtp_from: String,
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenv::dotenv().ok();
        envy::from_env::<Config>()
    }
}

fn default_max_connections() -> u32 {
    5
}

fn default_storage_dir() -> PathBuf {
    PathBuf::from("storage")
}

fn default_max_upload_bytes() -> u64 {
    DEFAULT_MAX_UPLOAD_BYTES
}

fn default_email_domain() -> String {
    "company.com".to_string()
}

fn default_smtp_host() -> String {
    "localhost".to_string()
}

fn default_smtp_from() -> String {
    "reports@company.com".to_string()
}
