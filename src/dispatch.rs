use anyhow::Result;
use futures::FutureExt;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info};

use crate::addressing::{render_mentions, with_mentions, MentionSpecifier};
use crate::classify::{classify, MediaKind};
use crate::platform::{IncomingMessage, Outbound, Transport};

/// What a handler produces: some content to send, or nothing
pub type Reply = Option<String>;

/// A classified, addressed reply waiting to be sent
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyEnvelope {
    /// Group id for group messages, otherwise the sender
    pub target: String,
    /// The asker, @-tagged when replying inside a group
    pub mentions: Option<MentionSpecifier>,
    pub kind: MediaKind,
    pub content: String,
}

impl ReplyEnvelope {
    pub fn for_message(msg: &IncomingMessage, content: String) -> Self {
        let (target, mentions) = match &msg.room_id {
            Some(room) => (room.clone(), Some(MentionSpecifier::member(&msg.sender))),
            None => (msg.sender.clone(), None),
        };
        Self {
            target,
            mentions,
            kind: classify(&content),
            content,
        }
    }
}

/// Sends handler output back to the chat with the right addressing.
///
/// Handlers only produce content; `respond` wraps them so classification,
/// @-mentions and the transport call happen in one place, and so no handler
/// error can escape into the receive loop.
#[derive(Clone)]
pub struct Responder {
    transport: Arc<dyn Transport>,
}

impl Responder {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self { transport }
    }

    pub fn transport(&self) -> &dyn Transport {
        self.transport.as_ref()
    }

    /// Run a handler and deliver whatever it returns.
    ///
    /// Returns the envelope that was sent, or `None` when the handler had
    /// nothing to say, failed, panicked, or the send failed.
    pub async fn respond<F>(&self, msg: &IncomingMessage, handler: F) -> Option<ReplyEnvelope>
    where
        F: Future<Output = Result<Reply>>,
    {
        let content = match AssertUnwindSafe(handler).catch_unwind().await {
            Ok(Ok(Some(content))) if !content.is_empty() => content,
            Ok(Ok(_)) => return None,
            Ok(Err(e)) => {
                error!("Handler failed for message {}: {:#}", msg.id, e);
                return None;
            }
            Err(_) => {
                error!("Handler panicked for message {}", msg.id);
                return None;
            }
        };

        let envelope = ReplyEnvelope::for_message(msg, content);
        match self.deliver(&envelope).await {
            Ok(()) => Some(envelope),
            Err(e) => {
                error!("Failed to send reply to {}: {:#}", envelope.target, e);
                None
            }
        }
    }

    /// Send an envelope. Mentions are rendered into text replies only;
    /// media goes out bare.
    pub async fn deliver(&self, envelope: &ReplyEnvelope) -> Result<()> {
        let outbound = match envelope.kind {
            MediaKind::Text => {
                let ats = match &envelope.mentions {
                    Some(mentions) => {
                        render_mentions(self.transport.as_ref(), mentions, &envelope.target).await
                    }
                    None => String::new(),
                };
                let content = with_mentions(&ats, &envelope.content);
                info!("To {}: {}", envelope.target, content);
                Outbound {
                    kind: MediaKind::Text,
                    receiver: envelope.target.clone(),
                    content,
                    aters: envelope.mentions.as_ref().map(MentionSpecifier::to_wire),
                }
            }
            kind => {
                info!("To {}: sending {} {}", envelope.target, kind, envelope.content);
                Outbound {
                    kind,
                    receiver: envelope.target.clone(),
                    content: envelope.content.clone(),
                    aters: None,
                }
            }
        };
        self.transport.send(&outbound).await
    }

    /// Send plain text to a receiver with no mentions (reports, greetings)
    pub async fn send_text(&self, receiver: &str, text: &str) -> Result<()> {
        info!("To {}: {}", receiver, text);
        self.transport
            .send(&Outbound {
                kind: MediaKind::Text,
                receiver: receiver.to_string(),
                content: text.to_string(),
                aters: None,
            })
            .await
    }

    /// Send an interim text reply to the asker, e.g. "please wait"
    pub async fn acknowledge(&self, msg: &IncomingMessage, text: &str) {
        let envelope = ReplyEnvelope {
            kind: MediaKind::Text,
            ..ReplyEnvelope::for_message(msg, text.to_string())
        };
        if let Err(e) = self.deliver(&envelope).await {
            error!("Failed to send acknowledgment to {}: {:#}", envelope.target, e);
        }
    }
}
