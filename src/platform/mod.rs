pub mod wcf_http;

use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::classify::MediaKind;

/// Message kind, decoded from the gateway's numeric type tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    Text,
    Image,
    Voice,
    Video,
    System,
    Other(u32),
}

impl From<u32> for MessageKind {
    fn from(tag: u32) -> Self {
        match tag {
            1 => MessageKind::Text,
            3 => MessageKind::Image,
            34 => MessageKind::Voice,
            43 => MessageKind::Video,
            10000 => MessageKind::System,
            other => MessageKind::Other(other),
        }
    }
}

/// A message received from the chat network
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Gateway message id, needed to download attachments
    pub id: u64,
    pub kind: MessageKind,
    /// Sender wxid
    pub sender: String,
    /// Group id when the message was posted in a group
    pub room_id: Option<String>,
    /// The message text (or the raw XML/notice for non-text kinds)
    pub content: String,
    /// Gateway-specific attachment hint (e.g. the encrypted image path)
    pub extra: String,
    /// Whether the bot itself is @-mentioned
    pub mentions_self: bool,
    /// Whether the bot sent this message itself
    pub from_self: bool,
}

impl IncomingMessage {
    /// The conversation scope: the group id, or the peer for direct chats
    pub fn scope_id(&self) -> &str {
        self.room_id.as_deref().unwrap_or(&self.sender)
    }

    #[cfg(test)]
    pub fn direct(sender: &str, content: &str) -> Self {
        Self {
            id: 1,
            kind: MessageKind::Text,
            sender: sender.to_string(),
            room_id: None,
            content: content.to_string(),
            extra: String::new(),
            mentions_self: false,
            from_self: false,
        }
    }

    #[cfg(test)]
    pub fn group(room_id: &str, sender: &str, content: &str, mentions_self: bool) -> Self {
        Self {
            room_id: Some(room_id.to_string()),
            mentions_self,
            ..Self::direct(sender, content)
        }
    }
}

/// A message ready to hand to the transport
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub kind: MediaKind,
    pub receiver: String,
    /// Text body, or a local path / URL for media
    pub content: String,
    /// Wire form of the mention specifier (`notify@all` or comma-joined wxids)
    pub aters: Option<String>,
}

/// Primitives the chat network gateway provides to the bot
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, outbound: &Outbound) -> Result<()>;

    /// Display name of a member inside a group
    async fn alias_in_chatroom(&self, wxid: &str, room_id: &str) -> Result<String>;

    /// All contacts as wxid -> nickname
    async fn contacts(&self) -> Result<HashMap<String, String>>;

    async fn self_wxid(&self) -> Result<String>;

    async fn download_image(&self, msg: &IncomingMessage, dir: &Path) -> Result<PathBuf>;

    async fn download_voice(&self, msg: &IncomingMessage, dir: &Path) -> Result<PathBuf>;
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use tokio::sync::Mutex;

    /// Transport double that records every send
    #[derive(Default)]
    pub struct RecordingTransport {
        pub sent: Mutex<Vec<Outbound>>,
        pub aliases: HashMap<String, String>,
        pub fail_sends: bool,
    }

    impl RecordingTransport {
        pub fn with_aliases(aliases: &[(&str, &str)]) -> Self {
            Self {
                aliases: aliases
                    .iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect(),
                ..Default::default()
            }
        }

        pub async fn sent(&self) -> Vec<Outbound> {
            self.sent.lock().await.clone()
        }
    }

    #[async_trait]
    impl Transport for RecordingTransport {
        async fn send(&self, outbound: &Outbound) -> Result<()> {
            if self.fail_sends {
                anyhow::bail!("gateway unavailable");
            }
            self.sent.lock().await.push(outbound.clone());
            Ok(())
        }

        async fn alias_in_chatroom(&self, wxid: &str, _room_id: &str) -> Result<String> {
            self.aliases
                .get(wxid)
                .cloned()
                .ok_or_else(|| anyhow::anyhow!("no alias for {}", wxid))
        }

        async fn contacts(&self) -> Result<HashMap<String, String>> {
            Ok(self.aliases.clone())
        }

        async fn self_wxid(&self) -> Result<String> {
            Ok("wxid_bot".to_string())
        }

        async fn download_image(&self, msg: &IncomingMessage, dir: &Path) -> Result<PathBuf> {
            Ok(dir.join(format!("{}.jpg", msg.id)))
        }

        async fn download_voice(&self, msg: &IncomingMessage, dir: &Path) -> Result<PathBuf> {
            Ok(dir.join(format!("{}.mp3", msg.id)))
        }
    }
}
