//! 搜歌 / 听歌: song search and playback links

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::Command;
use crate::bot::AppState;
use crate::dispatch::Reply;
use crate::platform::IncomingMessage;
use crate::providers::{plain, Host, ProviderError};
use crate::session::{Candidate, Family, Selection};

pub const SEARCH_USAGE: &str = "1.功能介绍：\n搜索歌曲并将序号传给【听歌】\n2.调用格式：\n搜歌周杰伦";
pub const PLAY_USAGE: &str =
    "1.功能介绍：\n通过【搜歌】序号或名字听歌\n调用格式\n格式1：听歌1\n格式2：听歌倒带";
const PLAY_MISS: &str = "请先调用【搜歌】，若已搜歌请检查序号";

const MUSIC_PATH: &str = "/api/music/wanneng.php";
const MAX_SONGS: usize = 10;
const RULE: &str = "--------------------------------";

#[derive(Debug, Deserialize)]
struct SongList {
    #[serde(default)]
    data: Vec<SongHit>,
}

#[derive(Debug, Deserialize)]
struct SongHit {
    id: Value,
    #[serde(default)]
    song_name: String,
    #[serde(default)]
    singer: String,
}

#[derive(Debug, Deserialize)]
struct SongLink {
    data: Option<SongLinkData>,
}

#[derive(Debug, Deserialize)]
struct SongLinkData {
    music_link: Option<String>,
}

pub struct SearchSong;

#[async_trait]
impl Command for SearchSong {
    async fn run(&self, state: &AppState, msg: &IncomingMessage, args: &str) -> Result<Reply> {
        let list: SongList = state
            .api
            .get_json(Host::Pearktrue, MUSIC_PATH, &[("name", args)])
            .await?;
        if list.data.is_empty() {
            return Ok(Some("没有找到相关的歌曲。".to_string()));
        }

        let candidates = list
            .data
            .iter()
            .take(MAX_SONGS)
            .map(|song| {
                let id = plain(&song.id);
                Candidate::new(id.clone())
                    .with_query("name", args)
                    .with_query("num", id)
            })
            .collect();
        let stored = state
            .sessions
            .record_results(msg.scope_id(), Family::Song, candidates)
            .await;

        let mut output = String::from("我为您找到了以下结果：\n");
        for (i, song) in list.data.iter().take(stored).enumerate() {
            output.push_str(&format!(
                "Top -{}-\n歌曲名: {}\n歌手: {}\n{}\n",
                i + 1,
                song.song_name,
                song.singer,
                RULE
            ));
        }
        output.push_str("请输入“听歌+数字”来播放音乐\n");
        Ok(Some(output))
    }
}

pub struct PlaySong;

#[async_trait]
impl Command for PlaySong {
    async fn run(&self, state: &AppState, msg: &IncomingMessage, args: &str) -> Result<Reply> {
        let query: Vec<(String, String)> =
            match state.sessions.select(msg.scope_id(), Family::Song, args).await {
                Selection::Ranked(candidate) => candidate.query,
                Selection::FreeText(name) => vec![
                    ("name".to_string(), name.to_string()),
                    ("num".to_string(), "1".to_string()),
                ],
                Selection::Miss(_) => return Ok(Some(PLAY_MISS.to_string())),
            };

        let link: SongLink = state
            .api
            .get_json(Host::Pearktrue, MUSIC_PATH, &query)
            .await?;
        let url = link
            .data
            .and_then(|d| d.music_link)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ProviderError::Payload("no music_link in reply".to_string()))?;
        Ok(Some(url))
    }
}
