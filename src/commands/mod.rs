//! Command handlers and the registry the router matches against.
//!
//! Add a command by implementing [`Command`] in one of the submodules and
//! registering it in [`builtin`] with its keyword and usage text.

pub mod douyin;
pub mod fun;
pub mod help;
pub mod images;
pub mod lookup;
pub mod music;
pub mod text;
pub mod voice;

use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::bot::AppState;
use crate::dispatch::Reply;
use crate::platform::IncomingMessage;

/// A command handler. `args` is the normalized text after the keyword and is
/// never empty for commands registered with a usage string.
#[async_trait]
pub trait Command: Send + Sync {
    async fn run(&self, state: &AppState, msg: &IncomingMessage, args: &str) -> Result<Reply>;
}

/// A registered command: keyword, usage text and handler
pub struct CommandEntry {
    keyword: &'static str,
    usage: Option<&'static str>,
    handler: Box<dyn Command>,
}

impl CommandEntry {
    pub fn keyword(&self) -> &'static str {
        self.keyword
    }

    /// Run the handler, or answer with the usage text when arguments are
    /// required but missing
    pub async fn invoke(
        &self,
        state: &AppState,
        msg: &IncomingMessage,
        args: &str,
    ) -> Result<Reply> {
        match self.usage {
            Some(usage) if args.is_empty() => Ok(Some(usage.to_string())),
            _ => self.handler.run(state, msg, args).await,
        }
    }
}

/// Ordered command table; the first keyword that prefixes the text wins
#[derive(Default)]
pub struct CommandRegistry {
    entries: Vec<CommandEntry>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(
        &mut self,
        keyword: &'static str,
        usage: Option<&'static str>,
        handler: impl Command + 'static,
    ) {
        if let Some(earlier) = self.entries.iter().find(|e| keyword.starts_with(e.keyword)) {
            warn!(
                "Command '{}' is shadowed by earlier command '{}'",
                keyword, earlier.keyword
            );
        }
        self.entries.push(CommandEntry {
            keyword,
            usage,
            handler: Box::new(handler),
        });
    }

    /// Match normalized text; returns the entry and the text after its keyword
    pub fn find<'t>(&self, text: &'t str) -> Option<(&CommandEntry, &'t str)> {
        self.entries
            .iter()
            .find_map(|e| text.strip_prefix(e.keyword).map(|args| (e, args)))
    }

    pub fn keywords(&self) -> Vec<&'static str> {
        self.entries.iter().map(|e| e.keyword).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }
}

/// The built-in command table
pub fn builtin() -> CommandRegistry {
    let mut registry = CommandRegistry::new();

    registry.register("画", Some(images::DRAW_USAGE), images::Draw);
    registry.register("翻译", Some(text::TRANSLATE_USAGE), text::Translate);
    registry.register("拼音", Some(text::PINYIN_USAGE), text::Pinyin);
    registry.register("搜歌", Some(music::SEARCH_USAGE), music::SearchSong);
    registry.register("听歌", Some(music::PLAY_USAGE), music::PlaySong);
    registry.register("签名", Some(images::SIGNATURE_USAGE), images::Signature);
    registry.register("网名", Some(text::NICKNAME_USAGE), text::Nickname);
    registry.register("取名", Some(text::GIVEN_NAME_USAGE), text::GivenName);
    registry.register("典故", Some(text::ALLUSION_USAGE), text::Allusion);
    registry.register("重名", Some(text::NAME_COUNT_USAGE), text::NameCount);
    registry.register("搜题", Some(text::EXAM_USAGE), text::ExamSearch);
    registry.register("台词", Some(text::MOVIE_LINES_USAGE), text::MovieLines);
    registry.register("扮演", Some(fun::ROLE_PLAY_USAGE), fun::RolePlay);
    registry.register("摸鱼", None, images::SlackerCalendar);
    registry.register("举牌", Some(images::PLACARD_USAGE), images::Placard);
    registry.register("云图", Some(images::WORD_CLOUD_USAGE), images::WordCloud);
    registry.register("识图", None, images::Recognize);
    registry.register("查榜", Some(lookup::HOT_LIST_USAGE), lookup::HotList);
    registry.register("不可说", Some(fun::SAYINGS_USAGE), fun::Sayings);
    registry.register("头像", Some(images::AVATAR_USAGE), images::Avatar);
    registry.register("到账", Some(voice::ALIPAY_USAGE), voice::Alipay);
    registry.register("追番", None, lookup::Anime);
    registry.register("抖音", None, douyin::Trending);
    registry.register("搜抖音", Some(douyin::SEARCH_USAGE), douyin::Search);
    registry.register("看抖音", Some(douyin::WATCH_USAGE), douyin::Watch);
    registry.register("刷抖音", None, douyin::RandomVideo);
    registry.register("小姐姐", None, fun::RandomPhoto);
    registry.register("百家姓", Some(text::SURNAME_USAGE), text::Surname);
    registry.register("发证书", Some(images::CERTIFICATE_USAGE), images::Certificate);
    registry.register("卡路里", Some(text::CALORIES_USAGE), text::Calories);
    registry.register("查星座", Some(lookup::HOROSCOPE_USAGE), lookup::Horoscope);
    registry.register("查油价", Some(lookup::OIL_USAGE), lookup::OilPrice);
    registry.register("查号码", Some(lookup::PHONE_USAGE), lookup::Phone);
    registry.register("查天气", Some(lookup::WEATHER_USAGE), lookup::Weather);
    registry.register("查功能", None, help::Features);
    registry.register("讲述人", Some(voice::NARRATOR_USAGE), voice::Narrator);

    info!("Registered {} commands", registry.len());
    registry
}

/// Split a leading ASCII digit run off `text`: `"3我爱你"` → `(Some(3), "我爱你")`
pub fn split_leading_number(text: &str) -> (Option<u32>, &str) {
    let end = text
        .char_indices()
        .find(|(_, c)| !c.is_ascii_digit())
        .map(|(i, _)| i)
        .unwrap_or(text.len());
    if end == 0 {
        return (None, text);
    }
    match text[..end].parse() {
        Ok(n) => (Some(n), text[end..].trim_start()),
        Err(_) => (None, text),
    }
}

/// Split `"a，b"` (full- or half-width comma) into two trimmed parts
pub fn split_pair(text: &str) -> Option<(&str, &str)> {
    let (a, b) = text.split_once('，').or_else(|| text.split_once(','))?;
    let (a, b) = (a.trim(), b.trim());
    if a.is_empty() || b.is_empty() {
        None
    } else {
        Some((a, b))
    }
}

/// `"1.a\n2.b"` style numbered list
pub fn numbered<S: AsRef<str>>(items: &[S]) -> String {
    items
        .iter()
        .enumerate()
        .map(|(i, item)| format!("{}.{}", i + 1, item.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Truncate to at most `max` characters
pub fn clip(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}
