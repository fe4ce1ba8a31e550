//! Layered TOML configuration for cai.
//!
//! Reads configuration from multiple sources with precedence:
//! CLI flags > env vars > config file > defaults

use cai_mcp::ProviderConfig;
use cai_types::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The default chat-completions base URL.
pub const DEFAULT_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// The default model to use.
pub const DEFAULT_MODEL: &str = "stepfun/step-3.5-flash:free";

/// The default chat API timeout, in milliseconds.
pub const DEFAULT_API_TIMEOUT_MS: u64 = 120_000;

/// Key file looked up in the config dir when no key is configured.
pub const DEFAULT_API_KEY_FILE: &str = "api_key";

/// Resolved configuration for one cai invocation.
#[derive(Debug, Clone)]
pub struct CaiConfig {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub api_timeout_ms: u64,
    pub provider: Option<ProviderConfig>,
    pub max_tool_rounds: usize,
    pub resubmit_tools: bool,
    pub strict_catalog: bool,
    pub config_dir: PathBuf,
}

/// Settings that can be read from a TOML config file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SettingsFile {
    #[serde(default)]
    pub api: ApiSettings,
    pub provider: Option<ProviderConfig>,
    #[serde(default)]
    pub conversation: ConversationSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ApiSettings {
    pub api_key: Option<String>,
    pub api_key_file: Option<PathBuf>,
    pub base_url: Option<String>,
    pub model: Option<String>,
    pub timeout_ms: Option<u64>,
}

/// The `[conversation]` section.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversationSettings {
    pub max_tool_rounds: Option<usize>,
    pub resubmit_tools: Option<bool>,
    /// Fail `knowit` instead of continuing without tools when the catalog
    /// cannot be fetched.
    pub strict_catalog: Option<bool>,
}

/// CLI overrides that take highest precedence.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub max_tool_rounds: Option<usize>,
}

impl CaiConfig {
    /// Load configuration from all sources, applying precedence rules.
    ///
    /// Precedence (highest to lowest):
    /// 1. CLI flags
    /// 2. Environment variables (`CAI_API_KEY`, `CAI_MODEL`, `CAI_BASE_URL`)
    /// 3. `config.toml` in the config dir
    /// 4. Defaults
    pub fn load(overrides: CliOverrides) -> Result<Self, ConfigError> {
        let config_dir = config_dir();
        let settings = load_settings_file(&config_dir.join("config.toml"));
        Self::resolve(overrides, settings, config_dir, |key| std::env::var(key).ok())
    }

    fn resolve(
        overrides: CliOverrides,
        settings: SettingsFile,
        config_dir: PathBuf,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let SettingsFile {
            api,
            provider,
            conversation,
        } = settings;

        // Resolve API key: CLI > env > config file > key file
        let key_file = resolve_key_file(&config_dir, api.api_key_file.as_deref());
        // An empty value at one level falls through to the next.
        let api_key = non_empty(overrides.api_key)
            .or_else(|| non_empty(env("CAI_API_KEY")))
            .or_else(|| non_empty(api.api_key))
            .or_else(|| non_empty(read_key_file(&key_file)))
            .ok_or_else(|| ConfigError::MissingKey {
                key: format!(
                    "api_key (set CAI_API_KEY, add it to config.toml, or write it to {})",
                    key_file.display()
                ),
            })?;

        let model = non_empty(overrides.model)
            .or_else(|| non_empty(env("CAI_MODEL")))
            .or_else(|| non_empty(api.model))
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());

        let base_url = non_empty(env("CAI_BASE_URL"))
            .or_else(|| non_empty(api.base_url))
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let api_timeout_ms = api.timeout_ms.unwrap_or(DEFAULT_API_TIMEOUT_MS);
        if api_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                key: "api.timeout_ms".into(),
                message: "must be greater than zero".into(),
            });
        }

        if let Some(provider) = &provider {
            if provider.command.trim().is_empty() {
                return Err(ConfigError::InvalidValue {
                    key: "provider.command".into(),
                    message: "must not be empty".into(),
                });
            }
            if provider.timeout_ms == 0 {
                return Err(ConfigError::InvalidValue {
                    key: "provider.timeout_ms".into(),
                    message: "must be greater than zero".into(),
                });
            }
        }

        let max_tool_rounds = overrides
            .max_tool_rounds
            .or(conversation.max_tool_rounds)
            .unwrap_or(cai_core::DEFAULT_MAX_TOOL_ROUNDS);

        Ok(CaiConfig {
            api_key,
            model,
            base_url,
            api_timeout_ms,
            provider,
            max_tool_rounds,
            resubmit_tools: conversation.resubmit_tools.unwrap_or(true),
            strict_catalog: conversation.strict_catalog.unwrap_or(false),
            config_dir,
        })
    }
}

/// Get the cai config directory path (~/.cai/).
pub fn config_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("CAI_CONFIG_DIR") {
        return PathBuf::from(dir);
    }
    dirs_next::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".cai")
}

/// Load and parse a TOML settings file, returning defaults on any error.
pub fn load_settings_file(path: &Path) -> SettingsFile {
    match std::fs::read_to_string(path) {
        Ok(content) => parse_settings(path, &content).unwrap_or_else(|e| {
            tracing::warn!("{e}");
            SettingsFile::default()
        }),
        Err(_) => SettingsFile::default(),
    }
}

/// Parse settings read from `path`.
pub fn parse_settings(path: &Path, content: &str) -> Result<SettingsFile, ConfigError> {
    toml::from_str(content).map_err(|e| ConfigError::Parse {
        path: path.display().to_string(),
        message: e.to_string(),
    })
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn resolve_key_file(config_dir: &Path, configured: Option<&Path>) -> PathBuf {
    let path = configured.unwrap_or_else(|| Path::new(DEFAULT_API_KEY_FILE));
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        config_dir.join(path)
    }
}

fn read_key_file(path: &Path) -> Option<String> {
    let content = std::fs::read_to_string(path).ok()?;
    tracing::debug!("Read API key from {}", path.display());
    Some(content.trim().to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    fn with_key() -> CliOverrides {
        CliOverrides {
            api_key: Some("cli-key".into()),
            ..CliOverrides::default()
        }
    }

    #[test]
    fn test_default_settings() {
        let settings = SettingsFile::default();
        assert!(settings.api.api_key.is_none());
        assert!(settings.provider.is_none());
        assert!(settings.conversation.max_tool_rounds.is_none());
    }

    #[test]
    fn test_settings_toml_parse() {
        let toml_str = r#"
[api]
model = "openai/gpt-4o-mini"
timeout_ms = 5000

[provider]
command = "uv"
args = ["run", "tools.py"]
env = { TOOLS_MODE = "demo" }

[conversation]
max_tool_rounds = 3
resubmit_tools = false
"#;
        let settings: SettingsFile = toml::from_str(toml_str).unwrap();
        assert_eq!(settings.api.model.as_deref(), Some("openai/gpt-4o-mini"));
        assert_eq!(settings.api.timeout_ms, Some(5000));
        let provider = settings.provider.unwrap();
        assert_eq!(provider.command, "uv");
        assert_eq!(provider.args, vec!["run", "tools.py"]);
        assert_eq!(provider.env.get("TOOLS_MODE").map(String::as_str), Some("demo"));
        assert_eq!(provider.timeout_ms, 30_000);
        assert_eq!(settings.conversation.max_tool_rounds, Some(3));
        assert_eq!(settings.conversation.resubmit_tools, Some(false));
    }

    #[test]
    fn test_defaults_applied() {
        let dir = tempfile::tempdir().unwrap();
        let config = CaiConfig::resolve(
            with_key(),
            SettingsFile::default(),
            dir.path().to_path_buf(),
            no_env,
        )
        .unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.api_timeout_ms, DEFAULT_API_TIMEOUT_MS);
        assert_eq!(config.max_tool_rounds, cai_core::DEFAULT_MAX_TOOL_ROUNDS);
        assert!(config.resubmit_tools);
        assert!(!config.strict_catalog);
        assert!(config.provider.is_none());
    }

    #[test]
    fn test_precedence_cli_over_env_over_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = SettingsFile::default();
        settings.api.api_key = Some("file-key".into());
        settings.api.model = Some("file-model".into());
        settings.api.base_url = Some("http://file/v1".into());
        settings.conversation.max_tool_rounds = Some(4);

        let env = |key: &str| match key {
            "CAI_API_KEY" => Some("env-key".to_string()),
            "CAI_MODEL" => Some("env-model".to_string()),
            _ => None,
        };

        let overrides = CliOverrides {
            model: Some("cli-model".into()),
            max_tool_rounds: Some(1),
            ..CliOverrides::default()
        };
        let config =
            CaiConfig::resolve(overrides, settings, dir.path().to_path_buf(), env).unwrap();
        assert_eq!(config.api_key, "env-key");
        assert_eq!(config.model, "cli-model");
        assert_eq!(config.base_url, "http://file/v1");
        assert_eq!(config.max_tool_rounds, 1);
    }

    #[test]
    fn test_key_file_in_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("api_key"), "sk-from-file\n").unwrap();
        let config = CaiConfig::resolve(
            CliOverrides::default(),
            SettingsFile::default(),
            dir.path().to_path_buf(),
            no_env,
        )
        .unwrap();
        assert_eq!(config.api_key, "sk-from-file");
    }

    #[test]
    fn test_custom_key_file_relative_to_config_dir() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("keys")).unwrap();
        std::fs::write(dir.path().join("keys/openrouter"), "sk-custom").unwrap();
        let mut settings = SettingsFile::default();
        settings.api.api_key_file = Some(PathBuf::from("keys/openrouter"));
        let config = CaiConfig::resolve(
            CliOverrides::default(),
            settings,
            dir.path().to_path_buf(),
            no_env,
        )
        .unwrap();
        assert_eq!(config.api_key, "sk-custom");
    }

    #[test]
    fn test_empty_key_sources_fall_through_to_key_file() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("api_key"), "sk-from-file").unwrap();
        let mut settings = SettingsFile::default();
        settings.api.api_key = Some(String::new());
        let overrides = CliOverrides {
            api_key: Some(String::new()),
            ..CliOverrides::default()
        };
        let env = |key: &str| (key == "CAI_API_KEY").then(String::new);
        let config =
            CaiConfig::resolve(overrides, settings, dir.path().to_path_buf(), env).unwrap();
        assert_eq!(config.api_key, "sk-from-file");
    }

    #[test]
    fn test_missing_key() {
        let dir = tempfile::tempdir().unwrap();
        let err = CaiConfig::resolve(
            CliOverrides::default(),
            SettingsFile::default(),
            dir.path().to_path_buf(),
            no_env,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::MissingKey { .. }));
    }

    #[test]
    fn test_empty_provider_command_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let settings = SettingsFile {
            provider: Some(ProviderConfig::new(" ", vec![])),
            ..SettingsFile::default()
        };
        let err = CaiConfig::resolve(with_key(), settings, dir.path().to_path_buf(), no_env)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "provider.command"));
    }

    #[test]
    fn test_unparseable_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[api\nmodel = ").unwrap();
        let settings = load_settings_file(&path);
        assert!(settings.api.model.is_none());
    }

    #[test]
    fn test_parse_error_names_the_file() {
        let content = "[conversation]\nmax_tool_rounds = \"many\"";
        let err = parse_settings(Path::new("/etc/cai/config.toml"), content).unwrap_err();
        match err {
            ConfigError::Parse { path, message } => {
                assert_eq!(path, "/etc/cai/config.toml");
                assert!(message.contains("max_tool_rounds"), "got {message}");
            }
            other => panic!("Expected Parse, got {other:?}"),
        }
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let settings = load_settings_file(&dir.path().join("absent.toml"));
        assert!(settings.provider.is_none());
    }
}
