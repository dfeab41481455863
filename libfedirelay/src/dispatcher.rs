//! Per-event relay pipeline
//!
//! The [`Dispatcher`] receives every inbound [`SourcePost`], decides whether
//! it is relayed, and drives normalization, chunking, media staging and
//! publishing for each mapped account. It is built once at startup and shared
//! read-only between event tasks.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::chunker::split_into_chunks;
use crate::error::{ConfigError, RelayError};
use crate::mapping::{AccountSettings, MappingTable};
use crate::media::{self, MediaStager};
use crate::normalize::Normalizer;
use crate::platforms::Destination;
use crate::publisher::{publish, PublishFailure};
use crate::source::MediaSource;
use crate::types::{PostChain, SourcePost};

/// Why an event was not relayed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Not a post in a broadcast channel (group chat, discussion, DM)
    NotChannelPost,
    /// Part of an album
    Grouped,
    /// The channel has no handle or no mapping
    Unmapped,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotChannelPost => write!(f, "not a channel post"),
            SkipReason::Grouped => write!(f, "album posts are not supported"),
            SkipReason::Unmapped => write!(f, "channel is not mapped"),
        }
    }
}

/// Result of relaying to one account
#[derive(Debug, Clone)]
pub struct AccountOutcome {
    pub account: String,
    pub result: std::result::Result<PostChain, PublishFailure>,
}

/// Per-account results of a relayed event, in mapping order
#[derive(Debug, Clone, Default)]
pub struct RelayReport {
    pub accounts: Vec<AccountOutcome>,
}

impl RelayReport {
    pub fn succeeded(&self) -> usize {
        self.accounts.iter().filter(|a| a.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.accounts.len() - self.succeeded()
    }

    /// Outcome for a named account
    pub fn account(&self, name: &str) -> Option<&AccountOutcome> {
        self.accounts.iter().find(|a| a.account == name)
    }
}

/// Terminal state of one event
#[derive(Debug)]
pub enum RelayOutcome {
    Skipped(SkipReason),
    Relayed(RelayReport),
    Failed(RelayError),
}

impl RelayOutcome {
    pub fn is_skipped(&self) -> bool {
        matches!(self, RelayOutcome::Skipped(_))
    }

    pub fn is_relayed(&self) -> bool {
        matches!(self, RelayOutcome::Relayed(_))
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, RelayOutcome::Failed(_))
    }
}

/// A mapped account ready to receive posts
struct Target<'a> {
    name: &'a str,
    settings: AccountSettings,
    destination: &'a Arc<dyn Destination>,
}

/// Routes source posts to destination accounts
pub struct Dispatcher {
    mappings: MappingTable,
    destinations: HashMap<String, Arc<dyn Destination>>,
    source: Arc<dyn MediaSource>,
    stager: MediaStager,
    normalizer: Normalizer,
}

impl Dispatcher {
    pub fn new(
        mappings: MappingTable,
        source: Arc<dyn MediaSource>,
        stager: MediaStager,
        normalizer: Normalizer,
    ) -> Self {
        Self {
            mappings,
            destinations: HashMap::new(),
            source,
            stager,
            normalizer,
        }
    }

    /// Register a destination client under its account name
    pub fn add_destination(&mut self, destination: Arc<dyn Destination>) {
        self.destinations
            .insert(destination.name().to_string(), destination);
    }

    pub fn with_destination(mut self, destination: Arc<dyn Destination>) -> Self {
        self.add_destination(destination);
        self
    }

    /// Authenticate destinations and register the ones that succeed
    ///
    /// A destination that fails authentication is left out, so events for
    /// its channels fail with `UnknownAccount` while the other accounts keep
    /// relaying. Returns the names of the accounts that were left out.
    pub async fn connect(&mut self, destinations: Vec<Arc<dyn Destination>>) -> Vec<String> {
        let mut rejected = Vec::new();
        for destination in destinations {
            match destination.authenticate().await {
                Ok(()) => {
                    info!("Authenticated account '{}'", destination.name());
                    self.add_destination(destination);
                }
                Err(e) => {
                    warn!(
                        "Account '{}' failed authentication and will not be relayed to: {}",
                        destination.name(),
                        e
                    );
                    rejected.push(destination.name().to_string());
                }
            }
        }
        rejected
    }

    /// Relay one inbound event
    ///
    /// Never panics and never returns an error to the caller; every failure
    /// is logged and reported in the returned outcome.
    pub async fn handle(&self, post: &SourcePost) -> RelayOutcome {
        let (channel, accounts) = match self.route(post) {
            Ok(route) => route,
            Err(reason) => {
                if reason == SkipReason::Grouped {
                    warn!(
                        "Skipping message {} from {}: {}",
                        post.message_id,
                        post.channel_handle.as_deref().unwrap_or("<no handle>"),
                        reason
                    );
                } else {
                    debug!("Skipping message {}: {}", post.message_id, reason);
                }
                return RelayOutcome::Skipped(reason);
            }
        };

        let targets = match self.resolve_targets(channel, accounts) {
            Ok(targets) => targets,
            Err(e) => {
                error!("Cannot relay {}/{}: {}", channel, post.message_id, e);
                return RelayOutcome::Failed(e);
            }
        };

        info!(
            "Relaying {}/{} to {} account(s)",
            channel,
            post.message_id,
            targets.len()
        );

        let text = self.normalizer.normalize(post);

        let staged = match &post.media {
            Some(media_ref) => match self.stager.stage(self.source.as_ref(), media_ref).await {
                Ok(staged) => Some(staged),
                Err(e) => {
                    error!(
                        "Failed to download {} for {}/{}: {}",
                        media_ref.kind, channel, post.message_id, e
                    );
                    return RelayOutcome::Failed(e);
                }
            },
            None => None,
        };

        let mut report = RelayReport::default();
        for target in targets {
            let chunks = split_into_chunks(&text, target.settings.post_limit);
            let result = publish(
                target.destination.as_ref(),
                &chunks,
                staged.as_ref().map(|s| s.path()),
                target.settings.visibility,
            )
            .await;

            match &result {
                Ok(chain) => info!(
                    "Posted {}/{} to {}: {} post(s), last id {}",
                    channel,
                    post.message_id,
                    target.name,
                    chain.len(),
                    chain.last().unwrap_or("-")
                ),
                Err(failure) => error!(
                    "Failed to post {}/{} to {}: {}; created posts left in place: {:?}",
                    channel,
                    post.message_id,
                    target.name,
                    failure.error,
                    failure.chain.ids()
                ),
            }

            report.accounts.push(AccountOutcome {
                account: target.name.to_string(),
                result,
            });
        }

        media::release(staged).await;

        info!(
            "Finished {}/{}: {} succeeded, {} failed",
            channel,
            post.message_id,
            report.succeeded(),
            report.failed()
        );
        RelayOutcome::Relayed(report)
    }

    /// Channel handle and mapped accounts, or the reason to skip
    fn route<'a>(
        &'a self,
        post: &'a SourcePost,
    ) -> std::result::Result<(&'a str, &'a [String]), SkipReason> {
        if !(post.is_post && post.is_broadcast_channel) {
            return Err(SkipReason::NotChannelPost);
        }
        if post.grouped_id.is_some() {
            return Err(SkipReason::Grouped);
        }

        let channel = post.channel_handle.as_deref().ok_or(SkipReason::Unmapped)?;
        let accounts = self
            .mappings
            .accounts_for(channel)
            .filter(|accounts| !accounts.is_empty())
            .ok_or(SkipReason::Unmapped)?;

        Ok((channel, accounts))
    }

    /// Look up every mapped account before anything is posted
    fn resolve_targets<'a>(
        &'a self,
        channel: &str,
        accounts: &'a [String],
    ) -> std::result::Result<Vec<Target<'a>>, RelayError> {
        accounts
            .iter()
            .map(|account| {
                let settings = self.mappings.settings(account);
                let destination = self.destinations.get(account);
                match (settings, destination) {
                    (Some(settings), Some(destination)) => Ok(Target {
                        name: account,
                        settings: *settings,
                        destination,
                    }),
                    _ => Err(RelayError::from(ConfigError::UnknownAccount {
                        channel: channel.to_string(),
                        account: account.to_string(),
                    })),
                }
            })
            .collect()
    }
}
