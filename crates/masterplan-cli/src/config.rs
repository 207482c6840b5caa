//! Configuration file management for masterplan.
//!
//! Provides a TOML-based config file at `~/.config/masterplan/config.toml`
//! and a resolution chain: CLI flag > env var > config file > default.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};

use masterplan_core::channels::{ChannelFormatTable, ChannelFormats};
use masterplan_core::extract::ExtractorConfig;
use masterplan_core::generate::RetryPolicy;
use masterplan_core::pipeline::PlanPipeline;
use masterplan_core::service::gemini::{DEFAULT_ENDPOINT, DEFAULT_MODEL, DEFAULT_TIMEOUT};
use masterplan_core::service::{GeminiClient, GeminiConfig, GenerationService, Language};

pub const API_KEY_ENV: &str = "MASTERPLAN_API_KEY";
pub const MODEL_ENV: &str = "MASTERPLAN_MODEL";

// -----------------------------------------------------------------------
// Config file types
// -----------------------------------------------------------------------

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct ConfigFile {
    #[serde(default)]
    pub generation: GenerationSection,
    #[serde(default)]
    pub retry: RetrySection,
    #[serde(default)]
    pub planning: PlanningSection,
    /// Extra channels and formats merged into the built-in table.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub channels: Vec<ChannelFormats>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GenerationSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RetrySection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_attempts: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub delays_secs: Option<Vec<f64>>,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub struct PlanningSection {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_budget: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_year: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_months: Option<u32>,
}

// -----------------------------------------------------------------------
// Paths
// -----------------------------------------------------------------------

/// Return the masterplan config directory.
///
/// Always uses XDG layout: `$XDG_CONFIG_HOME/masterplan` or
/// `~/.config/masterplan`.
pub fn config_dir() -> PathBuf {
    if let Ok(xdg) = std::env::var("XDG_CONFIG_HOME") {
        return PathBuf::from(xdg).join("masterplan");
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config")
        .join("masterplan")
}

/// Return the path to the masterplan config file.
pub fn config_path() -> PathBuf {
    config_dir().join("config.toml")
}

// -----------------------------------------------------------------------
// Read / write
// -----------------------------------------------------------------------

/// Load and parse the config file at `path`.
pub fn load_config_from(path: &Path) -> Result<ConfigFile> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file at {}", path.display()))?;
    let config: ConfigFile = toml::from_str(&contents)
        .with_context(|| format!("failed to parse config file at {}", path.display()))?;
    Ok(config)
}

/// Load the config file if it exists. A present but invalid file is an error.
pub fn load_config() -> Result<Option<ConfigFile>> {
    let path = config_path();
    if !path.exists() {
        return Ok(None);
    }
    load_config_from(&path).map(Some)
}

/// Serialize and write the config file to `path`, creating parent dirs as
/// needed. Sets file permissions to 0600 on Unix.
pub fn save_config_to(config: &ConfigFile, path: &Path) -> Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create config directory {}", dir.display()))?;
    }

    let contents = toml::to_string_pretty(config).context("failed to serialize config")?;
    std::fs::write(path, &contents)
        .with_context(|| format!("failed to write config file at {}", path.display()))?;

    // The file may hold an API key.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        std::fs::set_permissions(path, perms)
            .with_context(|| format!("failed to set permissions on {}", path.display()))?;
    }

    Ok(())
}

pub fn save_config(config: &ConfigFile) -> Result<()> {
    save_config_to(config, &config_path())
}

// -----------------------------------------------------------------------
// Resolved config
// -----------------------------------------------------------------------

/// Fully resolved configuration, ready for use.
#[derive(Debug, Clone)]
pub struct MasterplanConfig {
    pub api_key: Option<String>,
    pub model: String,
    pub endpoint: String,
    pub timeout: Duration,
    pub retry: RetryPolicy,
    pub extractor: ExtractorConfig,
    pub language: Language,
    pub table: ChannelFormatTable,
}

impl MasterplanConfig {
    /// Resolve configuration using the chain: CLI flag > env var > config file > default.
    ///
    /// - API key: `cli_api_key` > `MASTERPLAN_API_KEY` > `generation.api_key` > none
    /// - Model: `cli_model` > `MASTERPLAN_MODEL` > `generation.model` > `DEFAULT_MODEL`
    pub fn resolve(cli_api_key: Option<&str>, cli_model: Option<&str>) -> Result<Self> {
        let file_config = load_config()?;
        Self::from_sources(cli_api_key, cli_model, file_config.unwrap_or_default())
    }

    pub fn from_sources(
        cli_api_key: Option<&str>,
        cli_model: Option<&str>,
        file: ConfigFile,
    ) -> Result<Self> {
        let api_key = cli_api_key
            .map(str::to_string)
            .or_else(|| non_empty_env(API_KEY_ENV))
            .or(file.generation.api_key)
            .filter(|key| !key.trim().is_empty());

        let model = cli_model
            .map(str::to_string)
            .or_else(|| non_empty_env(MODEL_ENV))
            .or(file.generation.model)
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let endpoint = file
            .generation
            .endpoint
            .map(|e| e.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string());

        let timeout = file
            .generation
            .timeout_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TIMEOUT);

        let retry = resolve_retry(&file.retry)?;
        let extractor = resolve_extractor(&file.planning)?;

        let language = match &file.planning.language {
            Some(lang) => lang
                .parse()
                .with_context(|| format!("invalid planning.language in config: {lang}"))?,
            None => Language::default(),
        };

        let table = ChannelFormatTable::builtin()
            .clone()
            .with_custom(&file.channels);

        Ok(Self {
            api_key,
            model,
            endpoint,
            timeout,
            retry,
            extractor,
            language,
            table,
        })
    }

    /// Connection settings for Gemini. Fails when no API key is configured.
    pub fn gemini_config(&self) -> Result<GeminiConfig> {
        let Some(api_key) = &self.api_key else {
            bail!(
                "API key not found; set {API_KEY_ENV} or run `masterplan init --api-key <KEY>` to create a config file"
            );
        };
        Ok(GeminiConfig {
            api_key: api_key.clone(),
            model: self.model.clone(),
            endpoint: self.endpoint.clone(),
            timeout: self.timeout,
        })
    }

    /// A Gemini-backed generation service.
    pub fn gemini_service(&self) -> Result<Arc<dyn GenerationService>> {
        let client =
            GeminiClient::new(self.gemini_config()?).context("failed to build HTTP client")?;
        Ok(Arc::new(client))
    }

    /// A pipeline over `service` carrying this configuration.
    pub fn pipeline(&self, service: Arc<dyn GenerationService>) -> PlanPipeline {
        PlanPipeline::new(service)
            .with_table(self.table.clone())
            .with_extractor(self.extractor.clone())
            .with_policy(self.retry.clone())
            .with_language(self.language)
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn resolve_retry(section: &RetrySection) -> Result<RetryPolicy> {
    let defaults = RetryPolicy::default();
    let max_attempts = section.max_attempts.unwrap_or(defaults.max_attempts);
    if max_attempts == 0 {
        bail!("retry.max_attempts must be at least 1");
    }
    let delays = match &section.delays_secs {
        Some(secs) => secs
            .iter()
            .map(|s| {
                Duration::try_from_secs_f64(*s)
                    .with_context(|| format!("invalid retry delay in config: {s}"))
            })
            .collect::<Result<Vec<_>>>()?,
        None => defaults.delays,
    };
    Ok(RetryPolicy::new(max_attempts, delays))
}

fn resolve_extractor(section: &PlanningSection) -> Result<ExtractorConfig> {
    let mut extractor = ExtractorConfig::default();
    if let Some(budget) = section.default_budget {
        if !budget.is_finite() || budget <= 0.0 {
            bail!("planning.default_budget must be positive, got {budget}");
        }
        extractor.default_budget = budget;
    }
    if let Some(min_year) = section.min_year {
        extractor.min_year = min_year;
    }
    if let Some(max_year) = section.max_year {
        extractor.max_year = max_year;
    }
    if extractor.min_year > extractor.max_year {
        bail!(
            "planning.min_year ({}) is after planning.max_year ({})",
            extractor.min_year,
            extractor.max_year
        );
    }
    if let Some(months) = section.default_months {
        if months == 0 {
            bail!("planning.default_months must be at least 1");
        }
        extractor.default_months = months;
    }
    Ok(extractor)
}

// -----------------------------------------------------------------------
// Tests
// -----------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lock_env() -> std::sync::MutexGuard<'static, ()> {
        crate::test_util::lock_env()
    }

    fn clear_env() {
        unsafe { std::env::remove_var(API_KEY_ENV) };
        unsafe { std::env::remove_var(MODEL_ENV) };
    }

    const SAMPLE: &str = r#"
[generation]
api_key = "file-key"
model = "gemini-file"
endpoint = "http://localhost:9999/v1beta/"
timeout_secs = 5

[retry]
max_attempts = 5
delays_secs = [0.5, 2]

[planning]
default_budget = 12000
language = "en"
default_months = 6

[[channels]]
name = "Google Ads"
formats = ["Demand Gen"]

[[channels]]
name = "Pinterest Ads"
formats = ["Pins"]
"#;

    #[test]
    fn save_and_load_config_roundtrip() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("masterplan").join("config.toml");

        let original = ConfigFile {
            generation: GenerationSection {
                api_key: Some("abc123".to_string()),
                model: Some("gemini-1.5-pro".to_string()),
                ..Default::default()
            },
            planning: PlanningSection {
                default_budget: Some(30_000.0),
                ..Default::default()
            },
            ..Default::default()
        };
        save_config_to(&original, &path).unwrap();

        let loaded = load_config_from(&path).unwrap();
        assert_eq!(loaded.generation.api_key.as_deref(), Some("abc123"));
        assert_eq!(loaded.generation.model.as_deref(), Some("gemini-1.5-pro"));
        assert_eq!(loaded.planning.default_budget, Some(30_000.0));
        assert!(loaded.channels.is_empty());
    }

    #[cfg(unix)]
    #[test]
    fn save_config_sets_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("config.toml");
        save_config_to(&ConfigFile::default(), &path).unwrap();

        let meta = std::fs::metadata(&path).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o600);
    }

    #[test]
    fn file_values_are_applied() {
        let _lock = lock_env();
        clear_env();

        let file: ConfigFile = toml::from_str(SAMPLE).unwrap();
        let config = MasterplanConfig::from_sources(None, None, file).unwrap();

        assert_eq!(config.api_key.as_deref(), Some("file-key"));
        assert_eq!(config.model, "gemini-file");
        assert_eq!(config.endpoint, "http://localhost:9999/v1beta");
        assert_eq!(config.timeout, Duration::from_secs(5));
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(
            config.retry.delays,
            [Duration::from_millis(500), Duration::from_secs(2)]
        );
        assert_eq!(config.extractor.default_budget, 12_000.0);
        assert_eq!(config.extractor.default_months, 6);
        assert_eq!(config.language, Language::En);

        assert!(config.table.is_allowed("Google Ads", "Demand Gen"));
        assert!(config.table.is_allowed("Google Ads", "Search"));
        assert_eq!(config.table.formats_for("Pinterest Ads").unwrap(), ["Pins"]);
    }

    #[test]
    fn cli_flag_overrides_env_and_file() {
        let _lock = lock_env();
        unsafe { std::env::set_var(API_KEY_ENV, "env-key") };
        unsafe { std::env::set_var(MODEL_ENV, "gemini-env") };

        let file: ConfigFile = toml::from_str(SAMPLE).unwrap();
        let config =
            MasterplanConfig::from_sources(Some("cli-key"), Some("gemini-cli"), file).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("cli-key"));
        assert_eq!(config.model, "gemini-cli");

        clear_env();
    }

    #[test]
    fn env_var_overrides_config_file() {
        let _lock = lock_env();
        unsafe { std::env::set_var(API_KEY_ENV, "env-key") };
        unsafe { std::env::set_var(MODEL_ENV, "gemini-env") };

        let file: ConfigFile = toml::from_str(SAMPLE).unwrap();
        let config = MasterplanConfig::from_sources(None, None, file).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("env-key"));
        assert_eq!(config.model, "gemini-env");

        clear_env();
    }

    #[test]
    fn defaults_when_nothing_set() {
        let _lock = lock_env();
        clear_env();

        let config = MasterplanConfig::from_sources(None, None, ConfigFile::default()).unwrap();
        assert!(config.api_key.is_none());
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.endpoint, DEFAULT_ENDPOINT);
        assert_eq!(config.retry, RetryPolicy::default());
        assert_eq!(config.language, Language::PtBr);
        assert_eq!(config.table, *ChannelFormatTable::builtin());

        let err = config.gemini_config().unwrap_err().to_string();
        assert!(err.contains("API key not found"), "unexpected error: {err}");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let _lock = lock_env();
        clear_env();

        let cases = [
            "[retry]\nmax_attempts = 0",
            "[retry]\ndelays_secs = [-1.0]",
            "[planning]\ndefault_budget = 0",
            "[planning]\nlanguage = \"klingon\"",
            "[planning]\nmin_year = 2040\nmax_year = 2030",
        ];
        for case in cases {
            let file: ConfigFile = toml::from_str(case).unwrap();
            assert!(
                MasterplanConfig::from_sources(None, None, file).is_err(),
                "accepted: {case}"
            );
        }
    }

    #[test]
    fn config_path_ends_with_expected_filename() {
        let path = config_path();
        assert!(
            path.ends_with("masterplan/config.toml"),
            "unexpected config path: {}",
            path.display()
        );
    }
}
