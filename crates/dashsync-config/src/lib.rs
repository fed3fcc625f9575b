//! Settings model for dashsync.
//!
//! A settings file lists accounts; each account owns one dashboard workbook,
//! the websites it tracks and the provider credentials its sheets need.

mod settings;
mod validation;

use std::path::PathBuf;

use thiserror::Error;

pub use settings::{
    Account, AnalyticsCredentials, BitlyCredentials, BlogSettings, MailchimpCredentials,
    NewsletterSettings, Settings, SheetKind, Website, required_providers,
};
pub use validation::{ConfigIssue, ValidationError};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid YAML settings: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error("invalid JSON settings: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}

/// Load a settings file and validate it.
pub fn load_validated(path: impl AsRef<std::path::Path>) -> Result<Settings, ConfigError> {
    let settings = Settings::load(path)?;
    settings.validate()?;
    Ok(settings)
}

/// Generate the settings JSON schema as a `serde_json::Value`.
pub fn generate_schema_value() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(Settings)).unwrap_or(serde_json::Value::Null)
}

/// Generate the settings JSON schema as a pretty-printed string.
pub fn generate_schema_json_pretty() -> String {
    serde_json::to_string_pretty(&generate_schema_value()).unwrap_or_default()
}
