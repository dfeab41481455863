//! Telegram source adapter
//!
//! Uses the Bot API through teloxide. The bot has to be a member of every
//! source channel (channels deliver `channel_post` updates only to their
//! administrators). Updates are fetched by long polling and each channel post
//! is handed to the [`Dispatcher`] on its own task.

use std::ops::Range;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use teloxide::{
    net::Download,
    prelude::*,
    types::{
        AllowedUpdate, MediaKind as TelegramMediaKind, MessageEntityKind, MessageKind,
        MessageOrigin, Recipient, UpdateKind,
    },
    ApiError, RequestError,
};
use tokio::io::AsyncWriteExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::{read_secret, TelegramConfig};
use crate::dispatcher::Dispatcher;
use crate::error::{MediaError, Result, SourceError};
use crate::source::MediaSource;
use crate::types::{ForwardOrigin, MediaKind, MediaRef, SourcePost};

/// Long-polling timeout passed to `getUpdates`, in seconds
const POLL_TIMEOUT_SECS: u32 = 30;

/// HTTP timeout, longer than the long-polling timeout
const HTTP_TIMEOUT: Duration = Duration::from_secs(45);

/// Pause after a failed `getUpdates` call
const POLL_BACKOFF: Duration = Duration::from_secs(5);

/// Telegram bot client acting as the relay's source
pub struct TelegramSource {
    bot: Bot,
}

impl TelegramSource {
    /// Create a client for the given bot token
    pub fn new(token: SecretString) -> Result<Self> {
        let client = teloxide::net::default_reqwest_settings()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| SourceError::Telegram(format!("Failed to build HTTP client: {}", e)))?;
        let bot = Bot::with_client(token.expose_secret(), client);

        Ok(Self { bot })
    }

    /// Create a client from configuration, reading the token inline or from file
    pub fn from_config(config: &TelegramConfig) -> Result<Self> {
        let token = read_secret(
            config.token.as_deref(),
            config.token_file.as_deref(),
            "telegram.token",
        )?;
        Self::new(SecretString::from(token))
    }

    /// Verify the token and return the bot's username
    pub async fn authenticate(&self) -> Result<String> {
        let me = self
            .bot
            .get_me()
            .await
            .map_err(|e| SourceError::Authentication(e.to_string()))?;

        Ok(me.username.clone().unwrap_or_default())
    }

    /// Check that every configured channel is reachable by the bot
    ///
    /// Returns the handles that could not be resolved; those are logged but
    /// do not stop the relay, since the bot may be added to them later.
    pub async fn resolve_channels(&self, channels: &[String]) -> Vec<String> {
        let mut unresolved = Vec::new();

        for handle in channels {
            let handle = handle.trim_start_matches('@');
            match self
                .bot
                .get_chat(Recipient::ChannelUsername(format!("@{}", handle)))
                .await
            {
                Ok(_) => info!("Resolved Telegram channel @{}", handle),
                Err(e) => {
                    let error = SourceError::Channel {
                        channel: handle.to_string(),
                        reason: e.to_string(),
                    };
                    warn!("{}", error);
                    unresolved.push(handle.to_string());
                }
            }
        }

        unresolved
    }

    /// Receive channel posts until `cancel` fires
    ///
    /// Every post is relayed on its own task; relays of different posts may
    /// overlap.
    ///
    /// # Errors
    ///
    /// Returns `SourceError::Telegram` if another process is polling with the
    /// same token. Other polling failures are logged and retried.
    pub async fn run(&self, dispatcher: Arc<Dispatcher>, cancel: CancellationToken) -> Result<()> {
        // Long polling does not work while a webhook is set.
        if let Err(e) = self.bot.delete_webhook().send().await {
            warn!("Failed to clear Telegram webhook: {}", e);
        }

        info!("Starting Telegram polling loop");
        let mut offset: i32 = 0;

        loop {
            let request = self
                .bot
                .get_updates()
                .offset(offset)
                .timeout(POLL_TIMEOUT_SECS)
                .allowed_updates(vec![AllowedUpdate::ChannelPost])
                .send();

            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = request => result,
            };

            match result {
                Ok(updates) => {
                    debug!("Got {} Telegram update(s)", updates.len());
                    for update in updates {
                        offset = update.id.as_offset();
                        match update.kind {
                            UpdateKind::ChannelPost(msg) => {
                                let post = source_post_from_message(&msg, true);
                                let dispatcher = Arc::clone(&dispatcher);
                                tokio::spawn(async move {
                                    dispatcher.handle(&post).await;
                                });
                            }
                            other => debug!("Ignoring non-channel update: {:?}", other),
                        }
                    }
                }
                Err(RequestError::Api(ApiError::TerminatedByOtherGetUpdates)) => {
                    error!("Another instance is polling with this Telegram bot token");
                    return Err(SourceError::Telegram(
                        "terminated by another getUpdates request".to_string(),
                    )
                    .into());
                }
                Err(e) => {
                    warn!(
                        "Telegram polling failed: {}. Retrying in {}s",
                        e,
                        POLL_BACKOFF.as_secs()
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(POLL_BACKOFF) => {}
                    }
                }
            }
        }

        info!("Telegram polling stopped");
        Ok(())
    }
}

#[async_trait]
impl MediaSource for TelegramSource {
    async fn download_media(&self, media: &MediaRef, dest: &Path) -> Result<()> {
        let file = self
            .bot
            .get_file(media.file_id.clone())
            .await
            .map_err(|e| {
                MediaError::Download(format!("Failed to look up {}: {}", media.kind, e))
            })?;

        let mut destination = tokio::fs::File::create(dest)
            .await
            .map_err(MediaError::Io)?;

        self.bot
            .download_file(&file.path, &mut destination)
            .await
            .map_err(|e| {
                MediaError::Download(format!("Failed to download {}: {}", media.kind, e))
            })?;

        destination.flush().await.map_err(MediaError::Io)?;

        Ok(())
    }
}

/// Convert a Telegram message into the relay's source post
///
/// `is_post` tells whether the message arrived as a channel post update.
pub fn source_post_from_message(msg: &Message, is_post: bool) -> SourcePost {
    let (text, spans) = match (msg.text(), msg.caption()) {
        (Some(text), _) => (Some(text), msg.parse_entities()),
        (None, Some(caption)) => (Some(caption), msg.parse_caption_entities()),
        (None, None) => (None, None),
    };

    let text = text.map(|text| {
        let spans: Vec<StyledSpan> = spans
            .unwrap_or_default()
            .iter()
            .filter_map(|entity| {
                style_for(entity.kind()).map(|style| StyledSpan {
                    range: entity.range(),
                    style,
                })
            })
            .collect();
        render_markdown(text, &spans)
    });

    let (media, file_name) = attachment_of(msg);

    SourcePost {
        channel_handle: msg.chat.username().map(str::to_string),
        message_id: msg.id.0,
        is_post,
        is_broadcast_channel: msg.chat.is_channel(),
        text,
        grouped_id: msg.media_group_id().map(|id| id.to_string()),
        forward_origin: msg.forward_origin().map(forward_origin_of),
        media,
        file_name,
    }
}

fn forward_origin_of(origin: &MessageOrigin) -> ForwardOrigin {
    match origin {
        MessageOrigin::Channel { chat, .. } => ForwardOrigin {
            title: chat.title().unwrap_or_default().to_string(),
            handle: chat.username().map(str::to_string),
        },
        MessageOrigin::Chat { sender_chat, .. } => ForwardOrigin {
            title: sender_chat.title().unwrap_or_default().to_string(),
            handle: sender_chat.username().map(str::to_string),
        },
        MessageOrigin::User { sender_user, .. } => ForwardOrigin {
            title: sender_user.full_name(),
            handle: sender_user.username.clone(),
        },
        MessageOrigin::HiddenUser {
            sender_user_name, ..
        } => ForwardOrigin {
            title: sender_user_name.clone(),
            handle: None,
        },
    }
}

/// Relayable media and the name of a non-media file, if any
fn attachment_of(msg: &Message) -> (Option<MediaRef>, Option<String>) {
    let MessageKind::Common(common) = &msg.kind else {
        return (None, None);
    };

    match &common.media_kind {
        TelegramMediaKind::Photo(p) => {
            // Largest size comes last
            let media = p.photo.last().map(|size| MediaRef {
                kind: MediaKind::Photo,
                file_id: size.file.id.clone(),
                extension: MediaKind::Photo.extension_for(None),
            });
            (media, None)
        }
        TelegramMediaKind::Video(v) => {
            let mime = v.video.mime_type.as_ref().map(|m| m.as_ref());
            let media = MediaRef {
                kind: MediaKind::Video,
                file_id: v.video.file.id.clone(),
                extension: MediaKind::Video.extension_for(mime),
            };
            (Some(media), None)
        }
        TelegramMediaKind::Animation(a) => {
            let mime = a.animation.mime_type.as_ref().map(|m| m.as_ref());
            let media = MediaRef {
                kind: MediaKind::Animation,
                file_id: a.animation.file.id.clone(),
                extension: MediaKind::Animation.extension_for(mime),
            };
            (Some(media), None)
        }
        TelegramMediaKind::Document(d) => (None, d.document.file_name.clone()),
        TelegramMediaKind::Audio(a) => (None, a.audio.file_name.clone()),
        _ => (None, None),
    }
}

/// Formatting of a range of message text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Style {
    Bold,
    Italic,
    Strikethrough,
    Code,
    Pre,
    Link(String),
}

/// A styled byte range of message text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StyledSpan {
    pub range: Range<usize>,
    pub style: Style,
}

fn style_for(kind: &MessageEntityKind) -> Option<Style> {
    match kind {
        MessageEntityKind::Bold => Some(Style::Bold),
        MessageEntityKind::Italic => Some(Style::Italic),
        MessageEntityKind::Strikethrough => Some(Style::Strikethrough),
        MessageEntityKind::Code => Some(Style::Code),
        MessageEntityKind::Pre { .. } => Some(Style::Pre),
        MessageEntityKind::TextLink { url } => Some(Style::Link(url.to_string())),
        _ => None,
    }
}

fn markers(style: &Style) -> (&'static str, String) {
    match style {
        Style::Bold => ("**", "**".to_string()),
        Style::Italic => ("__", "__".to_string()),
        Style::Strikethrough => ("~~", "~~".to_string()),
        Style::Code => ("`", "`".to_string()),
        Style::Pre => ("```", "```".to_string()),
        Style::Link(url) => ("[", format!("]({})", url)),
    }
}

/// Render styled text in the markdown dialect the normalizer consumes
///
/// Spans must be given in entity order (by start offset, outer first).
/// Ranges that are out of bounds or not on character boundaries are ignored.
pub fn render_markdown(text: &str, spans: &[StyledSpan]) -> String {
    // (position, closes before opens, nesting order, marker)
    let mut inserts: Vec<(usize, u8, usize, String)> = Vec::with_capacity(spans.len() * 2);

    for (index, span) in spans.iter().enumerate() {
        let Range { start, end } = span.range;
        if start >= end
            || end > text.len()
            || !text.is_char_boundary(start)
            || !text.is_char_boundary(end)
        {
            continue;
        }

        let (open, close) = markers(&span.style);
        inserts.push((start, 1, index, open.to_string()));
        inserts.push((end, 0, usize::MAX - index, close));
    }

    inserts.sort_by(|a, b| (a.0, a.1, a.2).cmp(&(b.0, b.1, b.2)));

    let marker_len = inserts.iter().map(|i| i.3.len()).sum::<usize>();
    let mut rendered = String::with_capacity(text.len() + marker_len);
    let mut cursor = 0;
    for (position, _, _, marker) in inserts {
        rendered.push_str(&text[cursor..position]);
        rendered.push_str(&marker);
        cursor = position;
    }
    rendered.push_str(&text[cursor..]);

    rendered
}
