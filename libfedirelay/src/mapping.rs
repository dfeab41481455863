//! Channel to account routing

use std::collections::HashMap;

use crate::config::MastodonConfig;
use crate::types::Visibility;

/// Posting settings of one destination account
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountSettings {
    /// `None` leaves the choice to the server default
    pub visibility: Option<Visibility>,
    pub post_limit: usize,
}

/// Read-only lookup built once at startup
///
/// Accounts referenced by a mapping but missing from the account table are
/// kept as-is; [`MappingTable::settings`] returns `None` for them.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    channels: HashMap<String, Vec<String>>,
    accounts: HashMap<String, AccountSettings>,
}

impl MappingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &MastodonConfig) -> Self {
        let mut table = Self::new();

        for account in &config.accounts {
            table.add_account(
                &account.name,
                AccountSettings {
                    visibility: account.visibility,
                    post_limit: account.post_size_limit,
                },
            );
        }

        for mapping in &config.mappings {
            table.add_mapping(&mapping.tg_channel_handle, &mapping.account_name);
        }

        table
    }

    pub fn add_account(&mut self, name: &str, settings: AccountSettings) {
        self.accounts.insert(name.to_string(), settings);
    }

    /// Route `channel` to `account`; repeated pairs keep their first position
    pub fn add_mapping(&mut self, channel: &str, account: &str) {
        let targets = self.channels.entry(channel.to_string()).or_default();
        if !targets.iter().any(|existing| existing == account) {
            targets.push(account.to_string());
        }
    }

    /// Accounts a channel relays to, in posting order
    pub fn accounts_for(&self, channel: &str) -> Option<&[String]> {
        self.channels.get(channel).map(Vec::as_slice)
    }

    pub fn settings(&self, account: &str) -> Option<&AccountSettings> {
        self.accounts.get(account)
    }

    pub fn channels(&self) -> impl Iterator<Item = &str> {
        self.channels.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MappingConfig, MastodonAccountConfig};

    fn account(name: &str, limit: usize) -> MastodonAccountConfig {
        MastodonAccountConfig {
            name: name.to_string(),
            instance: "https://example.social".to_string(),
            access_token: Some("token".to_string()),
            token_file: None,
            visibility: None,
            post_size_limit: limit,
        }
    }

    fn mapping(channel: &str, account: &str) -> MappingConfig {
        MappingConfig {
            tg_channel_handle: channel.to_string(),
            account_name: account.to_string(),
        }
    }

    #[test]
    fn test_mapping_order_preserved() {
        let config = MastodonConfig {
            accounts: vec![account("a", 500), account("b", 300), account("c", 1000)],
            mappings: vec![mapping("news", "c"), mapping("news", "a"), mapping("news", "b")],
        };

        let table = MappingTable::from_config(&config);
        assert_eq!(table.accounts_for("news").unwrap(), ["c", "a", "b"]);
    }

    #[test]
    fn test_duplicate_mapping_ignored() {
        let mut table = MappingTable::new();
        table.add_mapping("news", "a");
        table.add_mapping("news", "b");
        table.add_mapping("news", "a");

        assert_eq!(table.accounts_for("news").unwrap(), ["a", "b"]);
    }

    #[test]
    fn test_multiple_channels() {
        let config = MastodonConfig {
            accounts: vec![account("a", 500)],
            mappings: vec![mapping("news", "a"), mapping("memes", "a")],
        };

        let table = MappingTable::from_config(&config);
        assert_eq!(table.accounts_for("news").unwrap(), ["a"]);
        assert_eq!(table.accounts_for("memes").unwrap(), ["a"]);

        let mut channels: Vec<&str> = table.channels().collect();
        channels.sort();
        assert_eq!(channels, vec!["memes", "news"]);
    }

    #[test]
    fn test_unknown_channel() {
        let table = MappingTable::new();
        assert!(table.accounts_for("nowhere").is_none());
    }

    #[test]
    fn test_account_settings() {
        let mut config = MastodonConfig {
            accounts: vec![account("a", 280)],
            mappings: vec![mapping("news", "a"), mapping("news", "ghost")],
        };
        config.accounts[0].visibility = Some(Visibility::Private);

        let table = MappingTable::from_config(&config);
        assert_eq!(
            table.settings("a"),
            Some(&AccountSettings {
                visibility: Some(Visibility::Private),
                post_limit: 280,
            })
        );

        // Mapped but undefined accounts survive the build
        assert_eq!(table.accounts_for("news").unwrap(), ["a", "ghost"]);
        assert!(table.settings("ghost").is_none());
    }
}
