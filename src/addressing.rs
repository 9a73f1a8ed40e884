//! Reply addressing: who receives a reply and which members are @-tagged.

use tracing::warn;

use crate::platform::Transport;

/// Wire sentinel the gateway uses for "mention everyone"
pub const NOTIFY_ALL: &str = "notify@all";

const EVERYONE_TOKEN: &str = " @所有人";

/// The set of members to @-tag in a group reply
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MentionSpecifier {
    Everyone,
    Members(Vec<String>),
}

impl MentionSpecifier {
    /// Parse the wire form: `notify@all` or a comma-separated wxid list.
    /// Returns `None` when no id remains.
    pub fn parse(raw: &str) -> Option<Self> {
        let raw = raw.trim();
        if raw == NOTIFY_ALL {
            return Some(Self::Everyone);
        }
        let ids: Vec<String> = raw
            .split(',')
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .collect();
        if ids.is_empty() {
            None
        } else {
            Some(Self::Members(ids))
        }
    }

    pub fn member(wxid: &str) -> Self {
        Self::Members(vec![wxid.to_string()])
    }

    pub fn to_wire(&self) -> String {
        match self {
            Self::Everyone => NOTIFY_ALL.to_string(),
            Self::Members(ids) => ids.join(","),
        }
    }
}

/// Render the @-prefix for a group reply: one ` @alias` token per member,
/// in input order, or a single ` @所有人` for everyone.
///
/// A member whose alias can't be resolved is tagged with the raw wxid so the
/// reply still goes out.
pub async fn render_mentions(
    transport: &dyn Transport,
    mentions: &MentionSpecifier,
    room_id: &str,
) -> String {
    match mentions {
        MentionSpecifier::Everyone => EVERYONE_TOKEN.to_string(),
        MentionSpecifier::Members(ids) => {
            let mut ats = String::new();
            for wxid in ids {
                let alias = match transport.alias_in_chatroom(wxid, room_id).await {
                    Ok(alias) if !alias.trim().is_empty() => alias,
                    Ok(_) => wxid.clone(),
                    Err(e) => {
                        warn!("Alias lookup failed for {} in {}: {:#}", wxid, room_id, e);
                        wxid.clone()
                    }
                };
                ats.push_str(&format!(" @{}", alias));
            }
            ats
        }
    }
}

/// Prefix text content with rendered mentions
pub fn with_mentions(ats: &str, content: &str) -> String {
    if ats.is_empty() {
        content.to_string()
    } else {
        format!("{}\n{}", ats, content)
    }
}
