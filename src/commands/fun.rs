//! Scraped pages: 扮演, 不可说 and 小姐姐

use anyhow::Result;
use async_trait::async_trait;
use reqwest::Url;
use scraper::{Html, Selector};

use super::Command;
use crate::bot::AppState;
use crate::dispatch::Reply;
use crate::platform::IncomingMessage;
use crate::providers::{path_reply, Host, ProviderError};

pub const ROLE_PLAY_USAGE: &str = "1.功能介绍：\n扮演角色，支持扮演怼人、绿茶、御姐\n2.调用格式：\n扮演御姐";
pub const SAYINGS_USAGE: &str = "1.功能介绍：\n佛曰：不可说，支持：哲学、污妖王、毒鸡汤、朋友圈、渣男、舔狗、骚话、情话、笑话\n2.调用格式：\n不可说情话";

const ROLES: [(&str, &str); 3] = [
    ("怼人", "/api/duiren/"),
    ("绿茶", "/api/greentea/"),
    ("御姐", "/api/yujie/"),
];

/// Category → (path, query)
const SAYINGS: [(&str, &str, &[(&str, &str)]); 9] = [
    ("哲学", "/api/jdyl/zhexue.php", &[]),
    ("污妖王", "/api/wuyaowang", &[]),
    ("毒鸡汤", "/api/dujitang", &[]),
    ("朋友圈", "/api/jdyl/pyq.php", &[]),
    ("渣男", "/api/random/zhanan", &[("type", "text")]),
    ("舔狗", "/api/jdyl/tiangou.php", &[]),
    ("骚话", "/api/jdyl/saohua.php", &[]),
    ("情话", "/api/jdyl/qinghua.php", &[]),
    ("笑话", "/api/jdyl/xiaohua.php", &[]),
];

/// `src` of the first element matching `selector`
fn first_src(html: &str, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    Html::parse_document(html)
        .select(&selector)
        .find_map(|el| el.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .map(str::to_string)
}

/// Resolve a possibly relative `src` against the page it came from
fn resolve(page: &str, src: &str) -> Result<Url, ProviderError> {
    Url::parse(page)
        .and_then(|base| base.join(src))
        .map_err(|e| ProviderError::Payload(format!("bad media url {}: {}", src, e)))
}

/// `第一句<br>- 第二句` → `第一句\n第二句`
fn saying_lines(body: &str) -> String {
    body.split("<br>")
        .map(|line| line.replace('-', ""))
        .map(|line| line.trim().to_string())
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// 扮演: a voice clip in the chosen persona
pub struct RolePlay;

#[async_trait]
impl Command for RolePlay {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, args: &str) -> Result<Reply> {
        let Some((_, page)) = ROLES.iter().find(|(role, _)| *role == args) else {
            return Ok(Some(ROLE_PLAY_USAGE.to_string()));
        };

        let no_query: [(&str, &str); 0] = [];
        let html = state.api.get_text(Host::Pearktrue, page, &no_query).await?;
        let src = first_src(&html, "video source[src]")
            .ok_or_else(|| ProviderError::Payload("no audio source in page".to_string()))?;
        let audio = resolve(&state.api.url(Host::Pearktrue, page), &src)?;

        let bytes = state.api.download(audio.as_str()).await?;
        let path = state.media.save("role", "mp3", &bytes).await?;
        Ok(Some(path_reply(&path)))
    }
}

/// 不可说: a random line from one of the text categories
pub struct Sayings;

#[async_trait]
impl Command for Sayings {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, args: &str) -> Result<Reply> {
        let Some((_, page, query)) = SAYINGS.iter().find(|(category, _, _)| *category == args)
        else {
            return Ok(Some(SAYINGS_USAGE.to_string()));
        };

        let body = state.api.get_text(Host::Pearktrue, page, query).await?;
        let text = saying_lines(&body);
        if text.is_empty() {
            return Err(ProviderError::Payload(format!("empty reply from {}", page)).into());
        }
        Ok(Some(text))
    }
}

/// 小姐姐: a random photo link
pub struct RandomPhoto;

#[async_trait]
impl Command for RandomPhoto {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, _args: &str) -> Result<Reply> {
        let html = state
            .api
            .get_text(Host::Photos, "/api", &[("type", "img"), ("mode", "1,3,8")])
            .await?;
        let src = first_src(&html, "[src]")
            .ok_or_else(|| ProviderError::Payload("no image in page".to_string()))?;
        let url = resolve(&state.api.url(Host::Photos, "/api"), &src)?;
        Ok(Some(url.to_string()))
    }
}
