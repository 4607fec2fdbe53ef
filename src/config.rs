//! Configuration management for asksql using the prefer crate.
//!
//! Settings (where files live) and Config (how the system behaves) are
//! resolved once at startup and passed down by reference.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::chain::ChainConfig;
use crate::feedback::LearningOptions;
use crate::llm::LlmConfig;
use crate::prompts::FeedbackStyle;

/// Default sample database filename.
pub const DEFAULT_DATABASE_FILENAME: &str = "sample_database.db";

/// Default feedback store filename.
pub const DEFAULT_FEEDBACK_FILENAME: &str = "feedback.db";

/// Application settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Settings {
    /// Base data directory.
    pub data_dir: PathBuf,
    /// Database queried by the chain.
    pub database_path: PathBuf,
    /// Feedback store.
    pub feedback_db_path: PathBuf,
}

impl Default for Settings {
    fn default() -> Self {
        // ~/.local/share/asksql, falling back to home, then the current dir
        let data_dir = dirs::data_dir()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
            .join("asksql");
        Self::with_data_dir(data_dir)
    }
}

impl Settings {
    /// Create settings with a custom data directory.
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            database_path: data_dir.join(DEFAULT_DATABASE_FILENAME),
            feedback_db_path: data_dir.join(DEFAULT_FEEDBACK_FILENAME),
            data_dir,
        }
    }

    pub fn database_exists(&self) -> bool {
        self.database_path.exists()
    }

    /// Ensure the data directory and the parents of both databases exist.
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.data_dir)?;
        for path in [&self.database_path, &self.feedback_db_path] {
            if let Some(parent) = path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }
        Ok(())
    }
}

/// Feedback learning settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedbackConfig {
    /// Use learned feedback when a run doesn't say otherwise.
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub style: FeedbackStyle,
    #[serde(flatten)]
    pub learning: LearningOptions,
}

fn default_true() -> bool {
    true
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            style: FeedbackStyle::default(),
            learning: LearningOptions::default(),
        }
    }
}

/// Models compared by `asksql compare` when none are named.
fn default_models() -> Vec<String> {
    vec![
        "llama3:latest".to_string(),
        "mistral:7b".to_string(),
        "codellama:latest".to_string(),
    ]
}

/// Configuration file contents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Data directory (relative paths resolve against the config file).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
    /// Database path or filename within the data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database: Option<String>,
    /// Feedback store path or filename within the data directory.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback_database: Option<String>,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub feedback: FeedbackConfig,
    #[serde(default = "default_models")]
    pub models: Vec<String>,
    /// Path the config was loaded from.
    #[serde(skip)]
    pub source_path: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: None,
            database: None,
            feedback_database: None,
            llm: LlmConfig::default(),
            chain: ChainConfig::default(),
            feedback: FeedbackConfig::default(),
            models: default_models(),
            source_path: None,
        }
    }
}

impl Config {
    /// Load configuration using prefer crate for discovery.
    /// Automatically discovers asksql config files in standard locations.
    pub async fn load() -> Self {
        match prefer::load("asksql").await {
            Ok(pref_config) => match pref_config.source_path() {
                Some(path) => match Self::load_from_path(path).await {
                    Ok(config) => config,
                    Err(e) => {
                        tracing::warn!("{}", e);
                        Self::default()
                    }
                },
                None => Self::default(),
            },
            // No config file found
            Err(_) => Self::default(),
        }
    }

    /// Load configuration from a specific file path.
    /// Supports JSON, TOML and YAML based on file extension.
    pub async fn load_from_path(path: &Path) -> Result<Self, String> {
        let contents = tokio::fs::read_to_string(path)
            .await
            .map_err(|e| format!("Failed to read config file: {}", e))?;

        let mut config = Self::parse(&contents, path)?;
        config.source_path = Some(path.to_path_buf());
        Ok(config)
    }

    fn parse(contents: &str, path: &Path) -> Result<Self, String> {
        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("json");
        match ext {
            "toml" => {
                toml::from_str(contents).map_err(|e| format!("Failed to parse TOML config: {}", e))
            }
            "yaml" | "yml" => serde_yaml::from_str(contents)
                .map_err(|e| format!("Failed to parse YAML config: {}", e)),
            _ => serde_json::from_str(contents)
                .map_err(|e| format!("Failed to parse JSON config: {}", e)),
        }
    }

    /// Get the base directory for resolving relative paths.
    pub fn base_dir(&self) -> Option<PathBuf> {
        self.source_path
            .as_ref()
            .and_then(|p| p.parent().map(|p| p.to_path_buf()))
    }

    /// Resolve a path that may be relative to `base_dir`, expanding `~`.
    pub fn resolve_path(&self, path_str: &str, base_dir: &Path) -> PathBuf {
        let expanded = shellexpand::tilde(path_str);
        let path = Path::new(expanded.as_ref());

        if path.is_absolute() {
            path.to_path_buf()
        } else {
            base_dir.join(path)
        }
    }

    /// Apply file paths to settings. Database entries are relative to the
    /// data directory.
    pub fn apply_to_settings(&self, settings: &mut Settings, base_dir: &Path) {
        if let Some(ref data_dir) = self.data_dir {
            *settings = Settings::with_data_dir(self.resolve_path(data_dir, base_dir));
        }
        let data_dir = settings.data_dir.clone();
        if let Some(ref database) = self.database {
            settings.database_path = self.resolve_path(database, &data_dir);
        }
        if let Some(ref feedback) = self.feedback_database {
            settings.feedback_db_path = self.resolve_path(feedback, &data_dir);
        }
    }

    /// Apply `LLM_*` and `ASKSQL_MAX_RETRIES`.
    pub fn with_env_overrides(mut self) -> Self {
        self.llm = self.llm.with_env_overrides();
        if let Some(n) = std::env::var("ASKSQL_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse().ok())
        {
            self.chain.max_retries = n;
        }
        self
    }
}

/// Options for loading settings.
#[derive(Debug, Clone, Default)]
pub struct LoadOptions {
    /// Explicit config file path (overrides auto-discovery).
    pub config_path: Option<PathBuf>,
    /// Use CWD for relative paths instead of config file directory.
    pub use_cwd: bool,
    /// Data directory override (--data-dir flag).
    pub data_dir: Option<PathBuf>,
    /// Database override (--database flag).
    pub database: Option<PathBuf>,
}

/// Load config from the explicit path or by discovery.
async fn load_file_config(options: &LoadOptions) -> Config {
    if let Some(ref config_path) = options.config_path {
        return match Config::load_from_path(config_path).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!("{}", e);
                Config::default()
            }
        };
    }
    Config::load().await
}

fn env_path(name: &str) -> Option<PathBuf> {
    std::env::var(name)
        .ok()
        .filter(|s| !s.is_empty())
        .map(|s| PathBuf::from(shellexpand::tilde(&s).as_ref()))
}

/// Load settings with explicit options.
/// Returns (Settings, Config) tuple.
///
/// Precedence, lowest first: defaults, config file, environment
/// (`DATABASE_PATH`, `FEEDBACK_DB_PATH`), command-line flags.
pub async fn load_settings_with_options(options: LoadOptions) -> (Settings, Config) {
    let config = load_file_config(&options).await.with_env_overrides();

    let mut settings = Settings::default();

    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let base_dir = if options.use_cwd {
        cwd.clone()
    } else {
        config.base_dir().unwrap_or_else(|| cwd.clone())
    };

    config.apply_to_settings(&mut settings, &base_dir);

    if let Some(path) = env_path("DATABASE_PATH") {
        tracing::debug!("Using DATABASE_PATH from environment: {}", path.display());
        settings.database_path = path;
    }
    if let Some(path) = env_path("FEEDBACK_DB_PATH") {
        tracing::debug!("Using FEEDBACK_DB_PATH from environment: {}", path.display());
        settings.feedback_db_path = path;
    }

    if let Some(ref data_dir) = options.data_dir {
        let data_dir = config.resolve_path(&data_dir.to_string_lossy(), &cwd);
        settings.database_path = data_dir.join(DEFAULT_DATABASE_FILENAME);
        settings.feedback_db_path = data_dir.join(DEFAULT_FEEDBACK_FILENAME);
        settings.data_dir = data_dir;
    }
    if let Some(ref database) = options.database {
        settings.database_path = config.resolve_path(&database.to_string_lossy(), &cwd);
    }

    (settings, config)
}
