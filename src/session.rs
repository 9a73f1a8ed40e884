//! Short-lived interaction state: the numbered candidate lists a search
//! command shows, so a follow-up command can pick an entry by rank.
//!
//! Nothing here survives a restart.

use std::collections::HashMap;
use std::path::PathBuf;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::{SessionConfig, SessionScope};

/// Command families that share one ranked result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    /// 搜歌 → 听歌
    Song,
    /// 抖音 → 搜抖音
    VideoTrending,
    /// 搜抖音 → 看抖音
    VideoSearch,
}

impl std::fmt::Display for Family {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Family::Song => write!(f, "song"),
            Family::VideoTrending => write!(f, "video_trending"),
            Family::VideoSearch => write!(f, "video_search"),
        }
    }
}

/// One entry of a result set: an opaque descriptor plus the query
/// parameters needed to fetch it again
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub descriptor: String,
    pub query: Vec<(String, String)>,
}

impl Candidate {
    pub fn new(descriptor: impl Into<String>) -> Self {
        Self {
            descriptor: descriptor.into(),
            query: Vec::new(),
        }
    }

    pub fn with_query(mut self, key: &str, value: impl Into<String>) -> Self {
        self.query.push((key.to_string(), value.into()));
        self
    }
}

/// How a "select" command's argument resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Selection<'a> {
    /// A rank present in the current result set
    Ranked(Candidate),
    /// Not a number: look it up fresh, ignoring the table
    FreeText(&'a str),
    /// A rank with no matching entry (no search yet, stale, or out of range)
    Miss(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct TableKey {
    /// `None` when the store is global
    conversation: Option<String>,
    family: Family,
}

/// Per-family rank tables plus the last image each conversation sent
pub struct SessionStore {
    scope: SessionScope,
    capacity: usize,
    tables: Mutex<HashMap<TableKey, Vec<Candidate>>>,
    images: Mutex<HashMap<String, PathBuf>>,
}

impl SessionStore {
    pub fn new(config: &SessionConfig) -> Self {
        Self {
            scope: config.scope,
            capacity: config.capacity.max(1),
            tables: Mutex::new(HashMap::new()),
            images: Mutex::new(HashMap::new()),
        }
    }

    /// Most entries a result set keeps
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn key(&self, conversation: &str, family: Family) -> TableKey {
        let conversation = match self.scope {
            SessionScope::Global => None,
            SessionScope::Conversation => Some(conversation.to_string()),
        };
        TableKey {
            conversation,
            family,
        }
    }

    /// Replace the family's result set with `results`, ranked from 1.
    ///
    /// Keeps at most `capacity` entries and returns how many were kept, so the
    /// caller can show exactly the ranks that resolve.
    pub async fn record_results(
        &self,
        conversation: &str,
        family: Family,
        mut results: Vec<Candidate>,
    ) -> usize {
        results.truncate(self.capacity);
        let stored = results.len();
        let key = self.key(conversation, family);
        debug!(
            "Recording {} {} result(s) for {:?}",
            stored, family, key.conversation
        );
        self.tables.lock().await.insert(key, results);
        stored
    }

    /// Look up a 1-based rank in the family's current result set
    pub async fn resolve_by_rank(
        &self,
        conversation: &str,
        family: Family,
        rank: usize,
    ) -> Option<Candidate> {
        if rank == 0 {
            return None;
        }
        let tables = self.tables.lock().await;
        tables
            .get(&self.key(conversation, family))
            .and_then(|results| results.get(rank - 1))
            .cloned()
    }

    /// Resolve a select command's argument: digits are a rank, anything else
    /// is free text for a fresh lookup.
    pub async fn select<'a>(
        &self,
        conversation: &str,
        family: Family,
        input: &'a str,
    ) -> Selection<'a> {
        let input = input.trim();
        if input.is_empty() || !input.chars().all(|c| c.is_ascii_digit()) {
            return Selection::FreeText(input);
        }
        let rank = input.parse::<usize>().unwrap_or(0);
        match self.resolve_by_rank(conversation, family, rank).await {
            Some(candidate) => Selection::Ranked(candidate),
            None => Selection::Miss(rank),
        }
    }

    pub async fn remember_image(&self, conversation: &str, path: PathBuf) {
        self.images
            .lock()
            .await
            .insert(self.image_key(conversation), path);
    }

    pub async fn last_image(&self, conversation: &str) -> Option<PathBuf> {
        self.images
            .lock()
            .await
            .get(&self.image_key(conversation))
            .cloned()
    }

    fn image_key(&self, conversation: &str) -> String {
        match self.scope {
            SessionScope::Global => String::new(),
            SessionScope::Conversation => conversation.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store(scope: SessionScope, capacity: usize) -> SessionStore {
        SessionStore::new(&SessionConfig { scope, capacity })
    }

    fn songs(names: &[&str]) -> Vec<Candidate> {
        names.iter().map(|n| Candidate::new(*n)).collect()
    }

    #[tokio::test]
    async fn test_record_then_resolve_every_rank() {
        let store = store(SessionScope::Conversation, 20);
        let list = songs(&["a", "b", "c"]);
        store.record_results("chat", Family::Song, list.clone()).await;

        for (i, expected) in list.iter().enumerate() {
            let got = store.resolve_by_rank("chat", Family::Song, i + 1).await;
            assert_eq!(got.as_ref(), Some(expected));
        }
        assert_eq!(store.resolve_by_rank("chat", Family::Song, 0).await, None);
        assert_eq!(store.resolve_by_rank("chat", Family::Song, 4).await, None);
    }

    #[tokio::test]
    async fn test_second_search_replaces_first() {
        let store = store(SessionScope::Conversation, 20);
        store
            .record_results("chat", Family::Song, songs(&["old1", "old2", "old3"]))
            .await;
        store
            .record_results("chat", Family::Song, songs(&["new1"]))
            .await;

        assert_eq!(
            store.resolve_by_rank("chat", Family::Song, 1).await,
            Some(Candidate::new("new1"))
        );
        assert_eq!(store.resolve_by_rank("chat", Family::Song, 2).await, None);
    }

    #[tokio::test]
    async fn test_families_do_not_collide() {
        let store = store(SessionScope::Conversation, 20);
        store
            .record_results("chat", Family::Song, songs(&["song"]))
            .await;

        assert_eq!(
            store.resolve_by_rank("chat", Family::VideoSearch, 1).await,
            None
        );
        assert_eq!(
            store.resolve_by_rank("chat", Family::VideoTrending, 1).await,
            None
        );
    }

    #[tokio::test]
    async fn test_conversation_scope_isolates_chats() {
        let store = store(SessionScope::Conversation, 20);
        store
            .record_results("chat-a", Family::Song, songs(&["a"]))
            .await;
        assert_eq!(store.resolve_by_rank("chat-b", Family::Song, 1).await, None);
    }

    #[tokio::test]
    async fn test_global_scope_shares_tables() {
        let store = store(SessionScope::Global, 20);
        store
            .record_results("chat-a", Family::Song, songs(&["a"]))
            .await;
        assert_eq!(
            store.resolve_by_rank("chat-b", Family::Song, 1).await,
            Some(Candidate::new("a"))
        );
    }

    #[tokio::test]
    async fn test_capacity_caps_stored_ranks() {
        let store = store(SessionScope::Conversation, 2);
        let stored = store
            .record_results("chat", Family::Song, songs(&["a", "b", "c"]))
            .await;
        assert_eq!(stored, 2);
        assert_eq!(store.resolve_by_rank("chat", Family::Song, 3).await, None);
    }

    #[tokio::test]
    async fn test_select() {
        let store = store(SessionScope::Conversation, 20);
        assert_eq!(
            store.select("chat", Family::Song, "1").await,
            Selection::Miss(1)
        );

        store
            .record_results("chat", Family::Song, songs(&["a"]))
            .await;
        assert_eq!(
            store.select("chat", Family::Song, " 1 ").await,
            Selection::Ranked(Candidate::new("a"))
        );
        assert_eq!(
            store.select("chat", Family::Song, "倒带").await,
            Selection::FreeText("倒带")
        );
        assert_eq!(
            store.select("chat", Family::Song, "99999999999999999999999").await,
            Selection::Miss(0)
        );
    }

    #[tokio::test]
    async fn test_last_image_per_conversation() {
        let store = store(SessionScope::Conversation, 20);
        store.remember_image("a", PathBuf::from("/tmp/a.jpg")).await;
        assert_eq!(
            store.last_image("a").await,
            Some(PathBuf::from("/tmp/a.jpg"))
        );
        assert_eq!(store.last_image("b").await, None);
    }
}
