//! Layered application configuration: defaults, then the TOML file under the
//! user's config directory, then `PORTAL_*` environment variables.

use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat};
use reqwest::Url;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::info;

use crate::calendar::DisplayWindow;

/// Directory under the platform config dir holding portal settings.
pub const CONFIG_DIR: &str = "portal";
/// Settings file name.
pub const CONFIG_FILE: &str = "config.toml";
/// Prefix for environment overrides, e.g. `PORTAL_API_BASE_URL`.
pub const ENV_PREFIX: &str = "PORTAL";

const DEFAULT_CONFIG: &str = r#"# Student portal settings.
# Every key may also be set through the environment, e.g.
#   PORTAL_API_BASE_URL=http://registrar.local:8080
#   PORTAL_DISPLAY_WINDOW__START_HOUR=7

# Registrar backend.
api_base_url = "http://localhost:8080"
request_timeout_secs = 10

# Student the portal acts for; `--student <id>` overrides it.
student_id = ""

# Slot length of the weekly schedule, in minutes.
slot_minutes = 30

# Dashboard lists.
holds = ["Mandatory Health Insurance"]
todo = ["Complete Health Waiver by 8/26"]

# Hours shown on the weekly schedule.
[display_window]
start_hour = 8
end_hour = 22
"#;

/// Runtime settings for the portal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Base url of the registrar backend.
    pub api_base_url: String,
    /// Student id sent with every student-scoped request.
    pub student_id: String,
    /// Per-request timeout enforced by the HTTP client.
    pub request_timeout_secs: u64,
    /// Hours shown on the weekly schedule.
    pub display_window: DisplayWindow,
    /// Slot length of the weekly schedule.
    pub slot_minutes: u32,
    /// Registration holds shown on the dashboard.
    #[serde(deserialize_with = "list_or_csv")]
    pub holds: Vec<String>,
    /// To-do items shown on the dashboard.
    #[serde(deserialize_with = "list_or_csv")]
    pub todo: Vec<String>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_base_url: "http://localhost:8080".to_string(),
            student_id: String::new(),
            request_timeout_secs: 10,
            display_window: DisplayWindow::default(),
            slot_minutes: 30,
            holds: vec!["Mandatory Health Insurance".to_string()],
            todo: vec!["Complete Health Waiver by 8/26".to_string()],
        }
    }
}

impl AppConfig {
    /// Load from the default location plus environment overrides.
    pub fn load() -> Result<Self> {
        Self::load_from(config_path())
    }

    /// Load from `path` (which may be missing) plus environment overrides.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        Self::load_layered(path.as_ref(), environment())
    }

    fn load_layered(path: &Path, env: Environment) -> Result<Self> {
        // Env values stay strings so ids keep their leading zeros; numeric
        // fields are converted during deserialization.
        let settings = Config::builder()
            .add_source(
                File::from(path)
                    .format(FileFormat::Toml)
                    .required(false),
            )
            .add_source(env)
            .build()
            .with_context(|| format!("failed to read configuration from {}", path.display()))?;
        let config: AppConfig = settings
            .try_deserialize()
            .with_context(|| format!("invalid configuration in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Override the student id, e.g. from the command line.
    pub fn with_student(mut self, student_id: impl Into<String>) -> Self {
        self.student_id = student_id.into();
        self
    }

    /// Check values the rest of the portal relies on.
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.api_base_url)
            .with_context(|| format!("api_base_url '{}' is not a valid url", self.api_base_url))?;
        if self.request_timeout_secs == 0 {
            bail!("request_timeout_secs must be positive");
        }
        if self.slot_minutes == 0 {
            bail!("slot_minutes must be positive");
        }
        self.display_window
            .validate()
            .context("invalid display_window")?;
        Ok(())
    }
}

fn environment() -> Environment {
    Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ListOrCsv {
    List(Vec<String>),
    Csv(String),
}

/// Accept a TOML array or a comma-separated string, e.g. `PORTAL_HOLDS=a,b`.
fn list_or_csv<'de, D>(deserializer: D) -> std::result::Result<Vec<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match ListOrCsv::deserialize(deserializer)? {
        ListOrCsv::List(items) => items,
        ListOrCsv::Csv(raw) => raw
            .split(',')
            .map(str::trim)
            .filter(|item| !item.is_empty())
            .map(str::to_string)
            .collect(),
    })
}

/// Location of the settings file.
pub fn config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(CONFIG_DIR)
        .join(CONFIG_FILE)
}

/// Write the commented default settings file if none exists yet.
pub fn ensure_default_config() -> Result<PathBuf> {
    let path = config_path();
    write_default_config(&path)?;
    Ok(path)
}

fn write_default_config(path: &Path) -> Result<()> {
    if path.exists() {
        return Ok(());
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, DEFAULT_CONFIG)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(path = %path.display(), "Wrote default configuration");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::Map;
    use tempfile::tempdir;

    fn env_with(vars: &[(&str, &str)]) -> Environment {
        let vars: Map<String, String> = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        environment().source(Some(vars))
    }

    #[test]
    fn env_student_id_keeps_leading_zeros() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "student_id = \"112233445\"\n")?;
        let config = AppConfig::load_layered(&path, env_with(&[("PORTAL_STUDENT_ID", "001234567")]))?;
        assert_eq!(config.student_id, "001234567");
        Ok(())
    }

    #[test]
    fn env_overrides_numbers_and_lists() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load_layered(
            &dir.path().join("absent.toml"),
            env_with(&[
                ("PORTAL_REQUEST_TIMEOUT_SECS", "25"),
                ("PORTAL_DISPLAY_WINDOW__START_HOUR", "7"),
                ("PORTAL_HOLDS", "Bursar, Advising"),
                ("PORTAL_TODO", ""),
            ]),
        )?;
        assert_eq!(config.request_timeout_secs, 25);
        assert_eq!(config.display_window.start_hour, 7);
        assert_eq!(config.holds, vec!["Bursar", "Advising"]);
        assert!(config.todo.is_empty());
        Ok(())
    }

    #[test]
    fn default_file_matches_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join("portal").join(CONFIG_FILE);
        write_default_config(&path)?;
        assert!(path.exists());
        let loaded = AppConfig::load_from(&path)?;
        assert_eq!(loaded, AppConfig::default());
        Ok(())
    }

    #[test]
    fn existing_file_is_not_overwritten() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "student_id = \"112233445\"\n")?;
        write_default_config(&path)?;
        assert_eq!(fs::read_to_string(&path)?, "student_id = \"112233445\"\n");
        Ok(())
    }

    #[test]
    fn partial_file_keeps_other_defaults() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(
            &path,
            "student_id = \"112233445\"\n[display_window]\nstart_hour = 7\n",
        )?;
        let config = AppConfig::load_from(&path)?;
        assert_eq!(config.student_id, "112233445");
        assert_eq!(config.display_window.start_hour, 7);
        assert_eq!(config.display_window.end_hour, 22);
        assert_eq!(config.api_base_url, "http://localhost:8080");
        Ok(())
    }

    #[test]
    fn missing_file_uses_defaults() -> Result<()> {
        let dir = tempdir()?;
        let config = AppConfig::load_from(dir.path().join("absent.toml"))?;
        assert_eq!(config.slot_minutes, 30);
        Ok(())
    }

    #[test]
    fn rejects_inverted_window() -> Result<()> {
        let dir = tempdir()?;
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, "[display_window]\nstart_hour = 20\nend_hour = 9\n")?;
        assert!(AppConfig::load_from(&path).is_err());
        Ok(())
    }

    #[test]
    fn rejects_bad_url() {
        let config = AppConfig {
            api_base_url: "not a url".to_string(),
            ..AppConfig::default()
        };
        assert!(config.validate().is_err());
        assert!(AppConfig::default().with_student("1").validate().is_ok());
    }
}
