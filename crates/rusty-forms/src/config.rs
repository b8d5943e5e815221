// File: src/config.rs
// Purpose: Engine settings parsed from forms.toml

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Engine settings shared by every form built with them
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq)]
pub struct FormsConfig {
    #[serde(default)]
    pub fields: FieldsConfig,

    #[serde(default)]
    pub messages: MessagesConfig,

    #[serde(default)]
    pub session: SessionConfig,
}

/// Names of the request fields the engine reserves for itself
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FieldsConfig {
    #[serde(default = "default_token_field")]
    pub token: String,

    #[serde(default = "default_page_field")]
    pub page: String,
}

/// Error templates
///
/// `{name}` and `{label}` are substituted for every template; rule templates
/// additionally understand `{min}`, `{max}`, `{type}` and `{target}`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MessagesConfig {
    #[serde(default = "default_required")]
    pub required: String,

    #[serde(default = "default_size")]
    pub size: String,

    #[serde(default = "default_size_min")]
    pub size_min: String,

    #[serde(default = "default_size_max")]
    pub size_max: String,

    #[serde(default = "default_min")]
    pub min: String,

    #[serde(default = "default_max")]
    pub max: String,

    #[serde(default = "default_options")]
    pub options: String,

    #[serde(default = "default_blacklist")]
    pub blacklist: String,

    #[serde(default = "default_match")]
    pub r#match: String,

    #[serde(default = "default_is")]
    pub is: String,

    #[serde(default = "default_int")]
    pub int: String,

    #[serde(default = "default_float")]
    pub float: String,

    #[serde(default = "default_invalid")]
    pub invalid: String,
}

/// Session persistence settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionConfig {
    /// Directory used by the filesystem session store
    #[serde(default = "default_session_dir")]
    pub directory: PathBuf,
}

// Default values
fn default_token_field() -> String {
    "token".to_string()
}

fn default_page_field() -> String {
    "page".to_string()
}

fn default_required() -> String {
    "{label} is required".to_string()
}

fn default_size() -> String {
    "{label} must be between {min} and {max} characters".to_string()
}

fn default_size_min() -> String {
    "{label} must be at least {min} characters".to_string()
}

fn default_size_max() -> String {
    "{label} must be at most {max} characters".to_string()
}

fn default_min() -> String {
    "{label} must be at least {min}".to_string()
}

fn default_max() -> String {
    "{label} must be at most {max}".to_string()
}

fn default_options() -> String {
    "{label} has an invalid selection".to_string()
}

fn default_blacklist() -> String {
    "{label} contains a blocked value".to_string()
}

fn default_match() -> String {
    "{label} does not match {target}".to_string()
}

fn default_is() -> String {
    "{label} is not a valid {type}".to_string()
}

fn default_int() -> String {
    "{label} must be a whole number".to_string()
}

fn default_float() -> String {
    "{label} must be a number".to_string()
}

fn default_invalid() -> String {
    "{label} is invalid".to_string()
}

fn default_session_dir() -> PathBuf {
    PathBuf::from(".rusty-forms/sessions")
}

impl Default for FieldsConfig {
    fn default() -> Self {
        Self {
            token: default_token_field(),
            page: default_page_field(),
        }
    }
}

impl Default for MessagesConfig {
    fn default() -> Self {
        Self {
            required: default_required(),
            size: default_size(),
            size_min: default_size_min(),
            size_max: default_size_max(),
            min: default_min(),
            max: default_max(),
            options: default_options(),
            blacklist: default_blacklist(),
            r#match: default_match(),
            is: default_is(),
            int: default_int(),
            float: default_float(),
            invalid: default_invalid(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            directory: default_session_dir(),
        }
    }
}

impl FormsConfig {
    /// Load configuration from forms.toml file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))
    }

    /// Load configuration from forms.toml in the given directory, or use defaults
    pub fn load_or_default<P: AsRef<Path>>(dir: P) -> Self {
        let config_path = dir.as_ref().join("forms.toml");

        if config_path.exists() {
            match Self::load(&config_path) {
                Ok(config) => config,
                Err(e) => {
                    tracing::warn!(path = %config_path.display(), error = %e, "falling back to default form settings");
                    Self::default()
                }
            }
        } else {
            Self::default()
        }
    }

    /// Parse configuration from TOML text
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).context("Invalid forms configuration")
    }
}

/// Substitute `{key}` placeholders in a message template
pub fn render_template(template: &str, vars: &[(&str, &str)]) -> String {
    vars.iter().fold(template.to_string(), |message, (key, value)| {
        message.replace(&format!("{{{}}}", key), value)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_default_config() {
        let config = FormsConfig::default();
        assert_eq!(config.fields.token, "token");
        assert_eq!(config.fields.page, "page");
        assert_eq!(config.messages.required, "{label} is required");
        assert_eq!(config.session.directory, PathBuf::from(".rusty-forms/sessions"));
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = FormsConfig::from_toml_str(
            r#"
            [fields]
            token = "wizard_token"

            [messages]
            required = "Please fill in {label}"
            "#,
        )
        .unwrap();

        assert_eq!(config.fields.token, "wizard_token");
        assert_eq!(config.fields.page, "page");
        assert_eq!(config.messages.required, "Please fill in {label}");
        assert_eq!(config.messages.is, "{label} is not a valid {type}");
    }

    #[test]
    fn test_invalid_toml_is_an_error() {
        assert!(FormsConfig::from_toml_str("[fields\ntoken = 1").is_err());
    }

    #[test]
    fn test_load_or_default_without_file() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(FormsConfig::load_or_default(dir.path()), FormsConfig::default());
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("forms.toml"), "[fields]\npage = \"step\"\n").unwrap();
        let config = FormsConfig::load_or_default(dir.path());
        assert_eq!(config.fields.page, "step");
    }

    #[test]
    fn test_render_template() {
        let rendered = render_template(
            "{label} must be between {min} and {max}",
            &[("label", "Age"), ("min", "18"), ("max", "99")],
        );
        assert_eq!(rendered, "Age must be between 18 and 99");
    }
}
