use clap::ValueEnum;
use proto::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// System prompt used when neither config nor flags set one.
pub const DEFAULT_SYSTEM_PROMPT: &str = "you're a helpful assistant";

/// File name looked up in the working directory.
const LOCAL_CONFIG_FILE: &str = "ai.toml";

/// Which chat API the client talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
    /// OpenAI chat completions (or a compatible server).
    #[default]
    #[value(name = "openai")]
    OpenAi,
    /// Anthropic Messages API.
    Anthropic,
}

impl ProviderKind {
    /// Model used when neither config nor flags name one.
    pub fn default_model(self) -> &'static str {
        match self {
            Self::OpenAi => "gpt-4o",
            Self::Anthropic => "claude-sonnet-4-5",
        }
    }

    /// Vendor env var consulted when no key is configured.
    pub fn key_env(self) -> &'static str {
        match self {
            Self::OpenAi => "OPENAI_API_KEY",
            Self::Anthropic => "ANTHROPIC_API_KEY",
        }
    }
}

impl std::fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::OpenAi => write!(f, "openai"),
            Self::Anthropic => write!(f, "anthropic"),
        }
    }
}

/// Top-level configuration file contents.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Model, prompt and credential settings.
    #[serde(default)]
    pub agent: AgentConfig,

    /// Terminal output settings.
    #[serde(default)]
    pub display: DisplayConfig,
}

/// Agent model/credential config.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Chat API to use.
    #[serde(default)]
    pub provider: ProviderKind,
    /// Model ID sent with each request; blank means the provider default.
    #[serde(default)]
    pub model: String,
    /// Leading system message of every conversation.
    #[serde(default = "default_system_prompt")]
    pub system_prompt: String,
    /// API key (env overrides applied at load time; see `Config::load`).
    #[serde(default)]
    pub api_key: String,
    /// Explicit API base URL (OpenAI-compatible servers or an Anthropic proxy).
    pub base_url: Option<String>,
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            model: String::new(),
            system_prompt: default_system_prompt(),
            api_key: String::new(),
            base_url: None,
        }
    }
}

impl AgentConfig {
    /// Returns the effective model ID, falling back to the provider's
    /// default when `model` is blank.
    pub fn effective_model(&self) -> &str {
        self.model_for(self.provider)
    }

    fn model_for(&self, provider: ProviderKind) -> &str {
        let model = self.model.trim();
        if model.is_empty() { provider.default_model() } else { model }
    }

    /// Returns the base URL when one is set and non-empty.
    pub fn effective_base_url(&self) -> Option<&str> {
        self.base_url
            .as_deref()
            .map(str::trim)
            .filter(|url| !url.is_empty())
    }
}

/// Output switches shared by the TUI and one-shot mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
pub struct DisplayConfig {
    /// Echo user input and log at debug level.
    #[serde(default)]
    pub verbose: bool,
    /// Hide role prefixes and notices.
    #[serde(default)]
    pub quiet: bool,
    /// Render without colours.
    #[serde(default)]
    pub no_color: bool,
}

/// Values given on the command line; each one wins over the config file.
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub provider: Option<ProviderKind>,
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub system_prompt: Option<String>,
    pub verbose: bool,
    pub quiet: bool,
    pub no_color: bool,
}

/// Fully resolved, immutable settings for one run.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub provider: ProviderKind,
    pub api_key: String,
    pub model: String,
    pub system_prompt: String,
    pub base_url: Option<String>,
    pub display: DisplayConfig,
}

impl std::fmt::Debug for SessionConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionConfig")
            .field("provider", &self.provider)
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("system_prompt", &self.system_prompt)
            .field("base_url", &self.base_url)
            .field("display", &self.display)
            .finish()
    }
}

impl Config {
    /// Loads configuration from explicit path, fallback locations, and env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config_path = path.map(Path::to_path_buf).or_else(Self::discover);
        debug!(path = ?config_path, "Config file resolved");

        let mut config = if let Some(path) = config_path {
            let content = std::fs::read_to_string(&path).map_err(ConfigError::Io)?;
            toml::from_str(&content).map_err(|e| ConfigError::Toml(e.to_string()))?
        } else {
            Config::default()
        };

        if let Ok(provider) = std::env::var("AI_PROVIDER") {
            config.agent.provider = <ProviderKind as ValueEnum>::from_str(provider.trim(), true)
                .map_err(|reason| ConfigError::InvalidValue {
                    field: "AI_PROVIDER".to_string(),
                    reason,
                })?;
        }
        if let Ok(key) = std::env::var("AI_API_KEY") {
            config.agent.api_key = key;
        }
        if let Ok(model) = std::env::var("AI_MODEL") {
            config.agent.model = model;
        }
        if let Ok(url) = std::env::var("AI_BASE_URL") {
            config.agent.base_url = Some(url);
        }

        debug!(
            provider = %config.agent.provider,
            model = %config.agent.effective_model(),
            base_url = ?config.agent.effective_base_url(),
            "Config loaded"
        );
        Ok(config)
    }

    /// Looks in the current dir, then `$HOME/.ai/config.toml`.
    fn discover() -> Option<PathBuf> {
        let cwd = std::env::current_dir().ok()?.join(LOCAL_CONFIG_FILE);
        if cwd.exists() {
            return Some(cwd);
        }
        let home = std::env::var("HOME").ok()?;
        let home_config = PathBuf::from(home).join(".ai").join("config.toml");
        if home_config.exists() {
            return Some(home_config);
        }
        None
    }

    /// Resolves the API key for `provider`.
    ///
    /// Priority:
    /// 1. `agent.api_key` in config file (or `AI_API_KEY` applied at load time)
    /// 2. `OPENAI_API_KEY` or `ANTHROPIC_API_KEY`, matching the provider
    pub fn resolve_api_key(&self, provider: ProviderKind) -> String {
        if !self.agent.api_key.trim().is_empty() {
            debug!(source = "config", "API key resolved");
            return self.agent.api_key.trim().to_string();
        }

        let var = provider.key_env();
        let fallback = std::env::var(var).unwrap_or_default();
        if fallback.trim().is_empty() {
            debug!("No API key found from any source");
        } else {
            debug!(source = "env", var, "API key resolved from vendor env");
        }
        fallback.trim().to_string()
    }

    /// Merges command-line overrides and produces the settings for one run.
    pub fn resolve(&self, cli: &CliOverrides) -> Result<SessionConfig, ConfigError> {
        let provider = cli.provider.unwrap_or(self.agent.provider);
        let api_key = match cli.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => key.to_string(),
            _ => self.resolve_api_key(provider),
        };
        if api_key.is_empty() {
            return Err(ConfigError::MissingField(format!(
                "api_key (set --api-key, AI_API_KEY or {})",
                provider.key_env()
            )));
        }

        let model = match cli.model.as_deref().map(str::trim) {
            Some(model) if !model.is_empty() => model.to_string(),
            Some(_) => {
                return Err(ConfigError::InvalidValue {
                    field: "model".to_string(),
                    reason: "must not be empty".to_string(),
                });
            }
            None => self.agent.model_for(provider).to_string(),
        };

        let system_prompt = cli
            .system_prompt
            .clone()
            .unwrap_or_else(|| self.agent.system_prompt.clone());

        let display = DisplayConfig {
            verbose: cli.verbose || self.display.verbose,
            quiet: cli.quiet || self.display.quiet,
            no_color: cli.no_color || self.display.no_color,
        };

        Ok(SessionConfig {
            provider,
            api_key,
            model,
            system_prompt,
            base_url: self.agent.effective_base_url().map(String::from),
            display,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{remove_env_var, set_env_var, with_locked_env};

    const ENV_VARS: [&str; 6] = [
        "AI_PROVIDER",
        "AI_API_KEY",
        "AI_MODEL",
        "AI_BASE_URL",
        "OPENAI_API_KEY",
        "ANTHROPIC_API_KEY",
    ];

    fn write_file(path: &Path, content: &str) {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("create parent");
        }
        std::fs::write(path, content).expect("write config");
    }

    fn clear_env() {
        for var in ENV_VARS {
            remove_env_var(var);
        }
    }

    fn overrides_with_key() -> CliOverrides {
        CliOverrides {
            api_key: Some("sk-flag".into()),
            ..CliOverrides::default()
        }
    }

    #[test]
    fn default_config_has_expected_values() {
        let cfg = Config::default();
        assert_eq!(cfg.agent.provider, ProviderKind::OpenAi);
        assert_eq!(cfg.agent.effective_model(), "gpt-4o");
        assert_eq!(cfg.agent.system_prompt, "you're a helpful assistant");
        assert!(cfg.agent.api_key.is_empty());
        assert_eq!(cfg.agent.effective_base_url(), None);
        assert_eq!(cfg.display, DisplayConfig::default());
    }

    #[test]
    fn load_reads_explicit_file() {
        with_locked_env(|| {
            clear_env();
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join("custom.toml");
            write_file(
                &path,
                r#"
[agent]
model = "gpt-3.5-turbo"
system_prompt = "answer tersely"
api_key = "sk-file"
base_url = "http://localhost:8080/v1"

[display]
quiet = true
"#,
            );

            let cfg = Config::load(Some(&path)).expect("load");
            assert_eq!(cfg.agent.model, "gpt-3.5-turbo");
            assert_eq!(cfg.agent.system_prompt, "answer tersely");
            assert_eq!(cfg.agent.api_key, "sk-file");
            assert_eq!(
                cfg.agent.effective_base_url(),
                Some("http://localhost:8080/v1")
            );
            assert!(cfg.display.quiet);
            assert!(!cfg.display.no_color);
        });
    }

    #[test]
    fn partial_file_keeps_defaults() {
        with_locked_env(|| {
            clear_env();
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join("ai.toml");
            write_file(&path, "[display]\nno_color = true\n");

            let cfg = Config::load(Some(&path)).expect("load");
            assert_eq!(cfg.agent.effective_model(), ProviderKind::OpenAi.default_model());
            assert_eq!(cfg.agent.system_prompt, DEFAULT_SYSTEM_PROMPT);
            assert!(cfg.display.no_color);
        });
    }

    #[test]
    fn malformed_file_is_toml_error() {
        with_locked_env(|| {
            clear_env();
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join("ai.toml");
            write_file(&path, "[agent\nmodel = ");

            let err = Config::load(Some(&path)).expect_err("must fail");
            assert!(matches!(err, ConfigError::Toml(_)));
        });
    }

    #[test]
    fn missing_explicit_file_is_io_error() {
        with_locked_env(|| {
            clear_env();
            let dir = tempfile::tempdir().expect("tempdir");
            let err = Config::load(Some(&dir.path().join("absent.toml"))).expect_err("must fail");
            assert!(matches!(err, ConfigError::Io(_)));
        });
    }

    #[test]
    fn env_overrides_file_values() {
        with_locked_env(|| {
            clear_env();
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join("ai.toml");
            write_file(&path, "[agent]\nmodel = \"gpt-4\"\napi_key = \"sk-file\"\n");
            set_env_var("AI_API_KEY", "sk-env");
            set_env_var("AI_MODEL", "gpt-4o-mini");
            set_env_var("AI_BASE_URL", "http://proxy/v1");

            let cfg = Config::load(Some(&path)).expect("load");
            clear_env();
            assert_eq!(cfg.agent.api_key, "sk-env");
            assert_eq!(cfg.agent.model, "gpt-4o-mini");
            assert_eq!(cfg.agent.effective_base_url(), Some("http://proxy/v1"));
        });
    }

    #[test]
    fn resolve_api_key_falls_back_to_openai_env() {
        with_locked_env(|| {
            clear_env();
            set_env_var("OPENAI_API_KEY", "sk-openai");
            let cfg = Config::default();
            assert_eq!(cfg.resolve_api_key(ProviderKind::OpenAi), "sk-openai");
            assert_eq!(cfg.resolve_api_key(ProviderKind::Anthropic), "");
            clear_env();
        });
    }

    #[test]
    fn resolve_without_any_key_is_missing_field() {
        with_locked_env(|| {
            clear_env();
            let err = Config::default()
                .resolve(&CliOverrides::default())
                .expect_err("must fail");
            assert!(matches!(err, ConfigError::MissingField(field) if field.starts_with("api_key")));
        });
    }

    #[test]
    fn cli_flags_win_over_config() {
        with_locked_env(|| {
            clear_env();
            let mut cfg = Config::default();
            cfg.agent.api_key = "sk-file".into();
            cfg.agent.model = "gpt-4".into();
            cfg.display.quiet = true;

            let resolved = cfg
                .resolve(&CliOverrides {
                    model: Some("gpt-3.5-turbo".into()),
                    system_prompt: Some("be brief".into()),
                    no_color: true,
                    ..overrides_with_key()
                })
                .expect("resolve");

            assert_eq!(resolved.api_key, "sk-flag");
            assert_eq!(resolved.model, "gpt-3.5-turbo");
            assert_eq!(resolved.system_prompt, "be brief");
            assert!(resolved.display.quiet);
            assert!(resolved.display.no_color);
            assert!(!resolved.display.verbose);
        });
    }

    #[test]
    fn blank_model_flag_is_rejected() {
        with_locked_env(|| {
            clear_env();
            let err = Config::default()
                .resolve(&CliOverrides {
                    model: Some("  ".into()),
                    ..overrides_with_key()
                })
                .expect_err("must fail");
            assert!(matches!(err, ConfigError::InvalidValue { field, .. } if field == "model"));
        });
    }

    #[test]
    fn session_config_debug_hides_key() {
        with_locked_env(|| {
            clear_env();
            let resolved = Config::default()
                .resolve(&overrides_with_key())
                .expect("resolve");
            let rendered = format!("{resolved:?}");
            assert!(!rendered.contains("sk-flag"));
            assert!(rendered.contains("gpt-4o"));
        });
    }

    #[test]
    fn provider_from_file_and_env() {
        with_locked_env(|| {
            clear_env();
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join("ai.toml");
            write_file(&path, "[agent]\nprovider = \"anthropic\"\n");

            let cfg = Config::load(Some(&path)).expect("load");
            assert_eq!(cfg.agent.provider, ProviderKind::Anthropic);
            assert_eq!(cfg.agent.effective_model(), "claude-sonnet-4-5");

            set_env_var("AI_PROVIDER", "OpenAI");
            let cfg = Config::load(Some(&path)).expect("load");
            clear_env();
            assert_eq!(cfg.agent.provider, ProviderKind::OpenAi);
        });
    }

    #[test]
    fn unknown_provider_env_is_invalid_value() {
        with_locked_env(|| {
            clear_env();
            let dir = tempfile::tempdir().expect("tempdir");
            let path = dir.path().join("ai.toml");
            write_file(&path, "");
            set_env_var("AI_PROVIDER", "gemini");

            let err = Config::load(Some(&path)).expect_err("must fail");
            clear_env();
            assert!(matches!(err, ConfigError::InvalidValue { field, .. } if field == "AI_PROVIDER"));
        });
    }

    #[test]
    fn anthropic_flag_picks_its_key_and_default_model() {
        with_locked_env(|| {
            clear_env();
            set_env_var("OPENAI_API_KEY", "sk-openai");
            set_env_var("ANTHROPIC_API_KEY", "sk-ant");

            let resolved = Config::default()
                .resolve(&CliOverrides {
                    provider: Some(ProviderKind::Anthropic),
                    ..CliOverrides::default()
                })
                .expect("resolve");
            clear_env();

            assert_eq!(resolved.provider, ProviderKind::Anthropic);
            assert_eq!(resolved.api_key, "sk-ant");
            assert_eq!(resolved.model, "claude-sonnet-4-5");
        });
    }

    #[test]
    fn missing_anthropic_key_names_its_env_var() {
        with_locked_env(|| {
            clear_env();
            let mut cfg = Config::default();
            cfg.agent.provider = ProviderKind::Anthropic;
            let err = cfg.resolve(&CliOverrides::default()).expect_err("must fail");
            assert!(
                matches!(err, ConfigError::MissingField(field) if field.contains("ANTHROPIC_API_KEY"))
            );
        });
    }
}
