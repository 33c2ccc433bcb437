//! Configuration management.

use secrecy::SecretString;
use serde::Deserialize;
use std::path::PathBuf;

/// Which message a quoted-literal spec is anchored to.
///
/// Deployment revisions differ on this, so it is a configuration choice
/// rather than a hard-coded default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QuoteAnchor {
    /// Anchor to the mentioning message itself.
    #[default]
    Current,
    /// Anchor to the thread root.
    Parent,
}

impl QuoteAnchor {
    /// Parses an anchor string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "parent" | "thread" => Self::Parent,
            _ => Self::Current,
        }
    }
}

/// Provenance restriction applied to query searches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SearchScope {
    /// No restriction.
    All,
    /// Only records captured in public channels.
    #[default]
    PublicChannels,
    /// Only records captured in the asking channel.
    SameChannel,
}

impl SearchScope {
    /// Parses a scope string.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "all" => Self::All,
            "same-channel" | "same_channel" | "channel" => Self::SameChannel,
            _ => Self::PublicChannels,
        }
    }
}

/// Slack workspace credentials and endpoint.
#[derive(Debug, Clone)]
pub struct SlackConfig {
    /// Bot token (`xoxb-...`).
    pub bot_token: SecretString,
    /// Verification token compared against inbound event envelopes.
    pub verification_token: SecretString,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            bot_token: SecretString::from(String::new()),
            verification_token: SecretString::from(String::new()),
        }
    }
}

/// Main configuration for lorebot.
#[derive(Debug, Clone)]
pub struct LorebotConfig {
    /// Path to the data directory (holds the answer database).
    pub data_dir: PathBuf,
    /// Address the event server binds to.
    pub bind_addr: String,
    /// Maximum number of search results per query.
    pub max_results: usize,
    /// Whether the query rule requires a trailing `?`.
    pub require_question_mark: bool,
    /// Which message quoted literals are anchored to.
    pub quote_anchor: QuoteAnchor,
    /// Provenance restriction for query searches.
    pub search_scope: SearchScope,
    /// Reset confirmation phrase.
    pub reset_phrase: String,
    /// Slack credentials.
    pub slack: SlackConfig,
}

impl Default for LorebotConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".lorebot"),
            bind_addr: "0.0.0.0:3000".to_string(),
            max_results: 5,
            require_question_mark: false,
            quote_anchor: QuoteAnchor::default(),
            search_scope: SearchScope::default(),
            reset_phrase: crate::services::DEFAULT_RESET_PHRASE.to_string(),
            slack: SlackConfig::default(),
        }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Data directory.
    pub data_dir: Option<String>,
    /// Bind address.
    pub bind_addr: Option<String>,
    /// Max results.
    pub max_results: Option<usize>,
    /// Require a trailing question mark on queries.
    pub require_question_mark: Option<bool>,
    /// Quote anchor: "current" or "parent".
    pub quote_anchor: Option<String>,
    /// Search scope: "all", "public" or "same-channel".
    pub search_scope: Option<String>,
    /// Reset confirmation phrase override.
    pub reset_phrase: Option<String>,
    /// Slack section.
    pub slack: Option<ConfigFileSlack>,
}

/// Slack section in the config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileSlack {
    /// Bot token.
    pub bot_token: Option<String>,
    /// Verification token.
    pub verification_token: Option<String>,
}

impl LorebotConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &std::path::Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: e.to_string(),
            })?;

        let file: ConfigFile =
            toml::from_str(&contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location, then applies
    /// environment overrides.
    ///
    /// Checks the platform config dir (`~/.config/lorebot/config.toml` and
    /// its platform equivalents) and falls back to defaults.
    #[must_use]
    pub fn load_default() -> Self {
        let mut config = directories::BaseDirs::new()
            .map(|dirs| dirs.config_dir().join("lorebot").join("config.toml"))
            .filter(|path| path.exists())
            .and_then(|path| Self::load_from_file(&path).ok())
            .unwrap_or_default();
        config.apply_env();
        config
    }

    /// Applies environment variable overrides.
    ///
    /// `SLACK_BOT_TOKEN` and `SLACK_VERIFICATION_TOKEN` override the file
    /// values; `LOREBOT_DATA_DIR` overrides the data directory.
    pub fn apply_env(&mut self) {
        if let Ok(token) = std::env::var("SLACK_BOT_TOKEN") {
            self.slack.bot_token = SecretString::from(token);
        }
        if let Ok(token) = std::env::var("SLACK_VERIFICATION_TOKEN") {
            self.slack.verification_token = SecretString::from(token);
        }
        if let Ok(dir) = std::env::var("LOREBOT_DATA_DIR") {
            self.data_dir = PathBuf::from(dir);
        }
    }

    /// Converts a `ConfigFile` to `LorebotConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self::default();

        if let Some(data_dir) = file.data_dir {
            config.data_dir = PathBuf::from(data_dir);
        }
        if let Some(bind_addr) = file.bind_addr {
            config.bind_addr = bind_addr;
        }
        if let Some(max_results) = file.max_results {
            config.max_results = max_results;
        }
        if let Some(require) = file.require_question_mark {
            config.require_question_mark = require;
        }
        if let Some(anchor) = file.quote_anchor {
            config.quote_anchor = QuoteAnchor::parse(&anchor);
        }
        if let Some(scope) = file.search_scope {
            config.search_scope = SearchScope::parse(&scope);
        }
        if let Some(phrase) = file.reset_phrase {
            config.reset_phrase = phrase;
        }
        if let Some(slack) = file.slack {
            if let Some(token) = slack.bot_token {
                config.slack.bot_token = SecretString::from(token);
            }
            if let Some(token) = slack.verification_token {
                config.slack.verification_token = SecretString::from(token);
            }
        }

        config
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.data_dir = path.into();
        self
    }

    /// Returns the answer database path.
    #[must_use]
    pub fn db_path(&self) -> PathBuf {
        self.data_dir.join("answers.db")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn test_defaults() {
        let config = LorebotConfig::default();
        assert_eq!(config.max_results, 5);
        assert!(!config.require_question_mark);
        assert_eq!(config.quote_anchor, QuoteAnchor::Current);
        assert_eq!(config.search_scope, SearchScope::PublicChannels);
        assert_eq!(config.db_path(), PathBuf::from(".lorebot/answers.db"));
    }

    #[test]
    fn test_parse_full_file() {
        let toml = r#"
            data_dir = "/var/lib/lorebot"
            bind_addr = "127.0.0.1:8080"
            max_results = 10
            require_question_mark = true
            quote_anchor = "parent"
            search_scope = "same-channel"

            [slack]
            bot_token = "xoxb-abc"
            verification_token = "vtok"
        "#;
        let file: ConfigFile = toml::from_str(toml).unwrap();
        let config = LorebotConfig::from_config_file(file);

        assert_eq!(config.data_dir, PathBuf::from("/var/lib/lorebot"));
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.max_results, 10);
        assert!(config.require_question_mark);
        assert_eq!(config.quote_anchor, QuoteAnchor::Parent);
        assert_eq!(config.search_scope, SearchScope::SameChannel);
        assert_eq!(config.slack.bot_token.expose_secret(), "xoxb-abc");
        assert_eq!(config.slack.verification_token.expose_secret(), "vtok");
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let file: ConfigFile = toml::from_str("max_results = 3").unwrap();
        let config = LorebotConfig::from_config_file(file);
        assert_eq!(config.max_results, 3);
        assert_eq!(config.bind_addr, "0.0.0.0:3000");
        assert_eq!(config.reset_phrase, crate::services::DEFAULT_RESET_PHRASE);
    }

    #[test]
    fn test_anchor_and_scope_parsing() {
        assert_eq!(QuoteAnchor::parse("parent"), QuoteAnchor::Parent);
        assert_eq!(QuoteAnchor::parse("current"), QuoteAnchor::Current);
        assert_eq!(QuoteAnchor::parse("bogus"), QuoteAnchor::Current);
        assert_eq!(SearchScope::parse("all"), SearchScope::All);
        assert_eq!(SearchScope::parse("same_channel"), SearchScope::SameChannel);
        assert_eq!(SearchScope::parse("bogus"), SearchScope::PublicChannels);
    }
}
