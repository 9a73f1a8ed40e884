//! Decides which handler a message goes to.

use regex::Regex;
use std::collections::HashSet;
use std::sync::LazyLock;

use crate::commands::{CommandEntry, CommandRegistry};
use crate::config::RoutingConfig;
use crate::platform::{IncomingMessage, MessageKind};

/// An @-mention token: `@` up to the next space or U+2005 (the separator
/// WeChat puts after a mention)
static MENTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@.*?[\x{2005}\s]").expect("valid mention regex"));

/// Strip mention tokens and every remaining whitespace character
pub fn normalize(text: &str) -> String {
    MENTION
        .replace_all(text, "")
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect()
}

/// The text after `keyword` in `text`, with interior whitespace kept.
/// Whitespace between the keyword's characters is skipped.
fn args_after<'t>(text: &'t str, keyword: &str) -> Option<&'t str> {
    let mut rest = text.trim_start();
    for k in keyword.chars() {
        rest = rest.trim_start();
        rest = rest.strip_prefix(k)?;
    }
    Some(rest.trim())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    News,
    Weather,
}

/// Where a message goes
pub enum Route<'a> {
    Ignore,
    /// "You added X as a friend" system notice
    FriendAdded,
    Image,
    Voice,
    /// Re-send a scheduled report on request
    Report(ReportKind),
    Command {
        entry: &'a CommandEntry,
        args: String,
    },
    Chitchat(String),
    Idiom(String),
}

impl std::fmt::Debug for Route<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Route::Ignore => write!(f, "Ignore"),
            Route::FriendAdded => write!(f, "FriendAdded"),
            Route::Image => write!(f, "Image"),
            Route::Voice => write!(f, "Voice"),
            Route::Report(kind) => write!(f, "Report({:?})", kind),
            Route::Command { entry, args } => {
                write!(f, "Command({}, {:?})", entry.keyword(), args)
            }
            Route::Chitchat(text) => write!(f, "Chitchat({:?})", text),
            Route::Idiom(text) => write!(f, "Idiom({:?})", text),
        }
    }
}

pub struct Router {
    commands: CommandRegistry,
    groups: HashSet<String>,
    group_commands_require_mention: bool,
}

impl Router {
    pub fn new(commands: CommandRegistry, config: &RoutingConfig) -> Self {
        Self {
            commands,
            groups: config.groups.iter().cloned().collect(),
            group_commands_require_mention: config.group_commands_require_mention,
        }
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn route(&self, msg: &IncomingMessage) -> Route<'_> {
        if msg.from_self {
            return Route::Ignore;
        }
        match &msg.room_id {
            Some(room) => self.route_group(room, msg),
            None => self.route_direct(msg),
        }
    }

    fn route_group(&self, room: &str, msg: &IncomingMessage) -> Route<'_> {
        if !self.groups.contains(room) {
            return Route::Ignore;
        }
        match msg.kind {
            MessageKind::Image => return Route::Image,
            MessageKind::Text => {}
            _ => return Route::Ignore,
        }

        let text = normalize(&msg.content);
        if msg.mentions_self {
            return self.command(msg, &text).unwrap_or(Route::Chitchat(text));
        }
        if !self.group_commands_require_mention {
            if let Some(route) = self.command(msg, &text) {
                return route;
            }
        }
        Route::Idiom(text)
    }

    fn route_direct(&self, msg: &IncomingMessage) -> Route<'_> {
        match msg.kind {
            MessageKind::System => return Route::FriendAdded,
            MessageKind::Image => return Route::Image,
            MessageKind::Voice => return Route::Voice,
            MessageKind::Text => {}
            _ => return Route::Ignore,
        }

        match msg.content.trim() {
            "/天气" => return Route::Report(ReportKind::Weather),
            "/新闻" => return Route::Report(ReportKind::News),
            _ => {}
        }

        let text = normalize(&msg.content);
        if text.is_empty() {
            return Route::Ignore;
        }
        self.command(msg, &text).unwrap_or(Route::Chitchat(text))
    }

    /// Match the keyword against the normalized text, but hand the handler
    /// its arguments from the mention-stripped original
    fn command(&self, msg: &IncomingMessage, text: &str) -> Option<Route<'_>> {
        let (entry, normalized_args) = self.commands.find(text)?;
        let stripped = MENTION.replace_all(&msg.content, "");
        let args = args_after(&stripped, entry.keyword()).unwrap_or(normalized_args);
        Some(Route::Command {
            entry,
            args: args.to_string(),
        })
    }
}
