//! Configuration management for fedirelay

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, Result};
use crate::types::Visibility;

/// Post size limit used when an account does not configure one
pub const DEFAULT_POST_SIZE_LIMIT: usize = 500;

/// Host used to build back-links to source posts
pub const DEFAULT_LINK_HOST: &str = "t.me";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub telegram: TelegramConfig,
    pub mastodon: MastodonConfig,
    #[serde(default)]
    pub relay: RelayConfig,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token, inline
    #[serde(default, skip_serializing)]
    pub token: Option<String>,
    /// Path to a file holding the bot token
    #[serde(default)]
    pub token_file: Option<String>,
    /// Channel handles resolved at startup
    #[serde(default)]
    pub channels: Vec<String>,
    #[serde(default = "default_link_host")]
    pub link_host: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MastodonConfig {
    #[serde(default)]
    pub accounts: Vec<MastodonAccountConfig>,
    #[serde(default)]
    pub mappings: Vec<MappingConfig>,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct MastodonAccountConfig {
    pub name: String,
    #[serde(alias = "api_base_url")]
    pub instance: String,
    #[serde(default, skip_serializing)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token_file: Option<String>,
    #[serde(default)]
    pub visibility: Option<Visibility>,
    #[serde(default = "default_post_size_limit")]
    pub post_size_limit: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MappingConfig {
    pub tg_channel_handle: String,
    pub account_name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Directory for temporary media downloads (system temp dir if unset)
    #[serde(default)]
    pub staging_dir: Option<String>,
}

fn default_link_host() -> String {
    DEFAULT_LINK_HOST.to_string()
}

fn default_post_size_limit() -> usize {
    DEFAULT_POST_SIZE_LIMIT
}

// Tokens stay out of Debug output.
impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .field("token_file", &self.token_file)
            .field("channels", &self.channels)
            .field("link_host", &self.link_host)
            .finish()
    }
}

impl std::fmt::Debug for MastodonAccountConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MastodonAccountConfig")
            .field("name", &self.name)
            .field("instance", &self.instance)
            .field("access_token", &self.access_token.as_ref().map(|_| "<redacted>"))
            .field("token_file", &self.token_file)
            .field("visibility", &self.visibility)
            .field("post_size_limit", &self.post_size_limit)
            .finish()
    }
}

impl Config {
    /// Load configuration from the default location
    pub fn load() -> Result<Self> {
        let config_path = resolve_config_path()?;
        Self::load_from_path(&config_path)
    }

    /// Load and validate configuration from a specific path
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(ConfigError::ReadError)?;
        Self::from_toml(&content)
    }

    /// Parse and validate configuration from TOML text
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).map_err(ConfigError::ParseError)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that cannot be expressed through serde defaults
    ///
    /// Mappings that reference undefined accounts are deliberately not
    /// rejected here; the dispatcher reports them per event.
    pub fn validate(&self) -> Result<()> {
        if self.telegram.token.is_none() && self.telegram.token_file.is_none() {
            return Err(ConfigError::MissingField(
                "telegram.token or telegram.token_file".to_string(),
            )
            .into());
        }

        if self.telegram.link_host.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "telegram.link_host".to_string(),
                reason: "must not be empty".to_string(),
            }
            .into());
        }

        for (index, account) in self.mastodon.accounts.iter().enumerate() {
            if account.name.trim().is_empty() {
                return Err(
                    ConfigError::MissingField(format!("mastodon.accounts[{}].name", index)).into(),
                );
            }

            if account.access_token.is_none() && account.token_file.is_none() {
                return Err(ConfigError::MissingField(format!(
                    "mastodon.accounts[{}].access_token or token_file",
                    index
                ))
                .into());
            }

            if account.post_size_limit == 0 {
                return Err(ConfigError::InvalidValue {
                    field: format!("mastodon.accounts[{}].post_size_limit", index),
                    reason: "must be at least 1".to_string(),
                }
                .into());
            }
        }

        Ok(())
    }

    /// Directory where media downloads are staged
    pub fn staging_dir(&self) -> PathBuf {
        self.relay
            .staging_dir
            .as_ref()
            .map(|dir| PathBuf::from(shellexpand::tilde(dir).to_string()))
            .unwrap_or_else(std::env::temp_dir)
    }
}

/// Read a secret either inline or from a file, trimming surrounding whitespace
///
/// `label` names the secret in error messages.
pub fn read_secret(inline: Option<&str>, file: Option<&str>, label: &str) -> Result<String> {
    let secret = match (inline, file) {
        (Some(value), _) => value.trim().to_string(),
        (None, Some(path)) => {
            let expanded = shellexpand::full(path).map_err(|e| ConfigError::InvalidValue {
                field: label.to_string(),
                reason: format!("cannot expand path '{}': {}", path, e),
            })?;
            std::fs::read_to_string(expanded.as_ref())
                .map_err(ConfigError::ReadError)?
                .trim()
                .to_string()
        }
        (None, None) => return Err(ConfigError::MissingField(label.to_string()).into()),
    };

    if secret.is_empty() {
        return Err(ConfigError::InvalidValue {
            field: label.to_string(),
            reason: "is empty".to_string(),
        }
        .into());
    }

    Ok(secret)
}

/// Resolve the configuration file path (`FEDIRELAY_CONFIG`, then the XDG config dir)
pub fn resolve_config_path() -> Result<PathBuf> {
    if let Ok(path) = std::env::var("FEDIRELAY_CONFIG") {
        return Ok(PathBuf::from(shellexpand::tilde(&path).to_string()));
    }

    let config_dir = dirs::config_dir()
        .ok_or_else(|| ConfigError::MissingField("config directory".to_string()))?;

    Ok(config_dir.join("fedirelay").join("config.toml"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RelayError;
    use serial_test::serial;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const EXAMPLE: &str = r#"
[telegram]
token = "123:abc"
channels = ["news", "memes"]

[[mastodon.accounts]]
name = "main"
instance = "https://mastodon.social"
access_token = "secret"
visibility = "unlisted"
post_size_limit = 300

[[mastodon.accounts]]
name = "mirror"
api_base_url = "https://fosstodon.org"
token_file = "/tmp/mirror.token"

[[mastodon.mappings]]
tg_channel_handle = "news"
account_name = "main"

[[mastodon.mappings]]
tg_channel_handle = "news"
account_name = "mirror"
"#;

    #[test]
    fn test_parse_example_config() {
        let config = Config::from_toml(EXAMPLE).unwrap();

        assert_eq!(config.telegram.channels, vec!["news", "memes"]);
        assert_eq!(config.telegram.link_host, "t.me");
        assert_eq!(config.mastodon.accounts.len(), 2);
        assert_eq!(config.mastodon.mappings.len(), 2);

        let main = &config.mastodon.accounts[0];
        assert_eq!(main.visibility, Some(Visibility::Unlisted));
        assert_eq!(main.post_size_limit, 300);

        let mirror = &config.mastodon.accounts[1];
        assert_eq!(mirror.instance, "https://fosstodon.org");
        assert_eq!(mirror.visibility, None);
        assert_eq!(mirror.post_size_limit, DEFAULT_POST_SIZE_LIMIT);
    }

    #[test]
    fn test_missing_telegram_token() {
        let result = Config::from_toml(
            r#"
[telegram]
channels = []

[mastodon]
"#,
        );

        match result {
            Err(RelayError::Config(ConfigError::MissingField(field))) => {
                assert!(field.contains("telegram.token"));
            }
            other => panic!("Expected missing field error, got {:?}", other),
        }
    }

    #[test]
    fn test_zero_post_limit_rejected() {
        let result = Config::from_toml(
            r#"
[telegram]
token = "t"

[[mastodon.accounts]]
name = "main"
instance = "https://example.social"
access_token = "secret"
post_size_limit = 0
"#,
        );

        assert!(matches!(
            result,
            Err(RelayError::Config(ConfigError::InvalidValue { .. }))
        ));
    }

    #[test]
    fn test_account_without_token_rejected() {
        let result = Config::from_toml(
            r#"
[telegram]
token = "t"

[[mastodon.accounts]]
name = "main"
instance = "https://example.social"
"#,
        );

        assert!(matches!(
            result,
            Err(RelayError::Config(ConfigError::MissingField(_)))
        ));
    }

    #[test]
    fn test_unknown_mapped_account_is_accepted_at_load() {
        let config = Config::from_toml(
            r#"
[telegram]
token = "t"

[[mastodon.mappings]]
tg_channel_handle = "news"
account_name = "ghost"
"#,
        )
        .unwrap();

        assert!(config.mastodon.accounts.is_empty());
        assert_eq!(config.mastodon.mappings[0].account_name, "ghost");
    }

    #[test]
    fn test_invalid_toml() {
        let result = Config::from_toml("[telegram\n");
        assert!(matches!(
            result,
            Err(RelayError::Config(ConfigError::ParseError(_)))
        ));
    }

    #[test]
    fn test_load_from_path() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(EXAMPLE.as_bytes()).unwrap();
        file.flush().unwrap();

        let config = Config::load_from_path(file.path()).unwrap();
        assert_eq!(config.mastodon.accounts[0].name, "main");
    }

    #[test]
    fn test_load_missing_file() {
        let result = Config::load_from_path(Path::new("/nonexistent/fedirelay.toml"));
        assert!(matches!(
            result,
            Err(RelayError::Config(ConfigError::ReadError(_)))
        ));
    }

    #[test]
    fn test_staging_dir_default_and_override() {
        let mut config = Config::from_toml(EXAMPLE).unwrap();
        assert_eq!(config.staging_dir(), std::env::temp_dir());

        config.relay.staging_dir = Some("/var/tmp/fedirelay".to_string());
        assert_eq!(config.staging_dir(), PathBuf::from("/var/tmp/fedirelay"));
    }

    #[test]
    fn test_read_secret_inline_and_file() {
        assert_eq!(read_secret(Some(" inline \n"), None, "token").unwrap(), "inline");

        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"  from-file-token  \n").unwrap();
        file.flush().unwrap();
        let path = file.path().to_str().unwrap().to_string();

        assert_eq!(read_secret(None, Some(&path), "token").unwrap(), "from-file-token");
    }

    #[test]
    fn test_read_secret_empty_file() {
        let file = NamedTempFile::new().unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let result = read_secret(None, Some(&path), "mastodon.accounts[0].token_file");
        match result {
            Err(RelayError::Config(ConfigError::InvalidValue { reason, .. })) => {
                assert!(reason.contains("empty"));
            }
            other => panic!("Expected empty secret error, got {:?}", other),
        }
    }

    #[test]
    fn test_debug_redacts_tokens() {
        let config = Config::from_toml(EXAMPLE).unwrap();
        let debug = format!("{:?}", config);

        assert!(!debug.contains("123:abc"));
        assert!(!debug.contains("\"secret\""));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    #[serial]
    fn test_resolve_config_path_env_override() {
        std::env::set_var("FEDIRELAY_CONFIG", "/etc/fedirelay/relay.toml");
        let path = resolve_config_path().unwrap();
        std::env::remove_var("FEDIRELAY_CONFIG");

        assert_eq!(path, PathBuf::from("/etc/fedirelay/relay.toml"));
    }

    #[test]
    #[serial]
    fn test_resolve_config_path_default() {
        std::env::remove_var("FEDIRELAY_CONFIG");
        if let Ok(path) = resolve_config_path() {
            assert!(path.ends_with("fedirelay/config.toml"));
        }
    }
}
