//! Short videos: 抖音 (trending) → 搜抖音 (search) → 看抖音 (download), and 刷抖音

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use super::{clip, split_leading_number, Command};
use crate::bot::AppState;
use crate::dispatch::Reply;
use crate::platform::IncomingMessage;
use crate::providers::{expect_code, path_reply, Host, ProviderError};
use crate::session::{Candidate, Family, Selection};

pub const SEARCH_USAGE: &str = "1.功能介绍：\n根据【抖音】序号或者名字搜索抖音\n2.调用格式：\n格式1：搜抖音1\n格式2：搜抖音张大仙\n格式3：搜抖音3张大仙\n注：3表示第3页，默认第1页";
pub const WATCH_USAGE: &str = "1.功能介绍：\n根据【搜抖音】序号看抖音\n2.调用格式：\n看抖音1";
const SEARCH_MISS: &str = "请先调用【抖音】，若已抖音请检查序号";
const WATCH_MISS: &str = "请先调用【搜抖音】，若已搜抖音请检查序号";

const MAX_TRENDING: usize = 20;
const MAX_VIDEOS: usize = 10;
const DESCRIPTION_CHARS: usize = 22;
const RULE: &str = "--------------------------------";

#[derive(Debug, Deserialize)]
struct HotBoard {
    code: i64,
    msg: Option<String>,
    data: Option<HotData>,
}

#[derive(Debug, Deserialize)]
struct HotData {
    #[serde(default)]
    current: Vec<HotTopic>,
}

#[derive(Debug, Deserialize)]
struct HotTopic {
    topic_name: String,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    code: i64,
    msg: Option<String>,
    #[serde(default)]
    data: Vec<Video>,
}

#[derive(Debug, Deserialize)]
struct Video {
    #[serde(default)]
    time: String,
    #[serde(default)]
    nickname: String,
    #[serde(default)]
    description: String,
    linkurl: String,
}

#[derive(Debug, Deserialize)]
struct Parsed {
    data: Option<ParsedData>,
}

#[derive(Debug, Deserialize)]
struct ParsedData {
    url: String,
}

#[derive(Debug, Deserialize)]
struct RandomClip {
    mp4: Option<String>,
}

pub struct Trending;

#[async_trait]
impl Command for Trending {
    async fn run(&self, state: &AppState, msg: &IncomingMessage, _args: &str) -> Result<Reply> {
        let no_query: [(&str, &str); 0] = [];
        let board: HotBoard = state
            .api
            .get_json(Host::Pearktrue, "/api/dy/hot/", &no_query)
            .await?;
        expect_code(board.code, board.msg.as_deref())?;
        let topics = board.data.map(|d| d.current).unwrap_or_default();

        let candidates = topics
            .iter()
            .take(MAX_TRENDING)
            .map(|t| Candidate::new(&t.topic_name).with_query("keyword", &t.topic_name))
            .collect();
        let stored = state
            .sessions
            .record_results(msg.scope_id(), Family::VideoTrending, candidates)
            .await;

        let mut output = String::from("最新的抖音热搜榜单如下：\n");
        for (i, topic) in topics.iter().take(stored).enumerate() {
            output.push_str(&format!("{}.{}\n", i + 1, topic.topic_name));
        }
        output.push_str("请输入“搜抖音+数字”搜索视频\n");
        Ok(Some(output))
    }
}

pub struct Search;

#[async_trait]
impl Command for Search {
    async fn run(&self, state: &AppState, msg: &IncomingMessage, args: &str) -> Result<Reply> {
        let (keyword, page) = match state
            .sessions
            .select(msg.scope_id(), Family::VideoTrending, args)
            .await
        {
            Selection::Ranked(candidate) => (candidate.descriptor, 1),
            Selection::Miss(_) => return Ok(Some(SEARCH_MISS.to_string())),
            Selection::FreeText(text) => match split_leading_number(text) {
                (Some(page), keyword) if !keyword.is_empty() => (keyword.to_string(), page),
                _ => (text.to_string(), 1),
            },
        };

        let page = page.to_string();
        let result: SearchResult = state
            .api
            .get_json(
                Host::Pearktrue,
                "/api/dy/search",
                &[("keyword", keyword.as_str()), ("page", page.as_str())],
            )
            .await?;
        expect_code(result.code, result.msg.as_deref())?;
        if result.data.is_empty() {
            return Ok(Some("没有找到相关的视频。".to_string()));
        }

        let candidates = result
            .data
            .iter()
            .take(MAX_VIDEOS)
            .map(|v| Candidate::new(&v.linkurl).with_query("url", &v.linkurl))
            .collect();
        let stored = state
            .sessions
            .record_results(msg.scope_id(), Family::VideoSearch, candidates)
            .await;

        let mut output = String::from("我为您找到了以下结果：\n");
        for (i, video) in result.data.iter().take(stored).enumerate() {
            output.push_str(&format!(
                "Top -{}-\n时间:{}\n作者:{}\n简介:{}···\n{}\n",
                i + 1,
                video.time,
                video.nickname,
                clip(&video.description, DESCRIPTION_CHARS),
                RULE
            ));
        }
        output.push_str("请输入“看抖音+数字”查看视频\n");
        Ok(Some(output))
    }
}

pub struct Watch;

#[async_trait]
impl Command for Watch {
    async fn run(&self, state: &AppState, msg: &IncomingMessage, args: &str) -> Result<Reply> {
        let candidate = match state
            .sessions
            .select(msg.scope_id(), Family::VideoSearch, args)
            .await
        {
            Selection::Ranked(candidate) => candidate,
            Selection::Miss(_) => return Ok(Some(WATCH_MISS.to_string())),
            Selection::FreeText(_) => return Ok(Some(WATCH_USAGE.to_string())),
        };

        let parsed: Parsed = state
            .api
            .get_json(Host::Pearktrue, "/api/video/douyin", &candidate.query)
            .await?;
        let url = parsed
            .data
            .map(|d| d.url)
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ProviderError::Payload("no video url in reply".to_string()))?;

        let bytes = state.api.download(&url).await?;
        let path = state.media.save("douyin", "mp4", &bytes).await?;
        Ok(Some(path_reply(&path)))
    }
}

pub struct RandomVideo;

#[async_trait]
impl Command for RandomVideo {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, _args: &str) -> Result<Reply> {
        let random: RandomClip = state
            .api
            .get_json(
                Host::Aa1,
                "/api/api-girl-11-02/index.php",
                &[("type", "json")],
            )
            .await?;
        let mp4 = random
            .mp4
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ProviderError::Payload("no mp4 in reply".to_string()))?;
        if mp4.starts_with("http") {
            Ok(Some(mp4))
        } else {
            Ok(Some(format!("https:{}", mp4)))
        }
    }
}
