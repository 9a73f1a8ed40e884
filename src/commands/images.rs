//! Commands that answer with a picture: generated, downloaded or recognized

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use serde::Deserialize;
use std::sync::LazyLock;

use super::{split_pair, Command};
use crate::bot::AppState;
use crate::dispatch::Reply;
use crate::platform::IncomingMessage;
use crate::providers::{path_reply, Host, ProviderError};

pub const DRAW_USAGE: &str = "1.功能介绍：\nStableDiffusion绘画\n2.调用格式：\n画一只会飞的猪";
pub const SIGNATURE_USAGE: &str = "1.功能介绍：\n生成个性签名，支持: hsq花式签 swq商务签 gxq个性牵 sxlbz手写连笔字 zkt正楷体 wrns温柔女生 xsq潇洒牵 cjysq超级艺术签 xsq行书签 ksq楷书牵 qsq情书签 xcq行草签 ktkaq卡通可爱签\n2.调用格式：\n签名hsq，郭富城";
pub const PLACARD_USAGE: &str = "1.功能介绍：\n小人举牌\n2.调用格式：\n举牌我出1个亿";
pub const WORD_CLOUD_USAGE: &str =
    "1.功能介绍：\n根据长文本生成中国地图的云图\n2.调用格式：\n云图苹果, 香蕉, 樱桃, 枣, 无花果, 西柚, 哈密瓜, 猕猴桃, 柠檬, 芒果";
pub const AVATAR_USAGE: &str = "1.功能介绍：\n根据设定生成头像\n2.调用格式：头像机器人女友";
pub const CERTIFICATE_USAGE: &str =
    "1.功能介绍：\n生成证书，标题限6字以内\n2.调用格式：\n发证书，颁发[标题]给@[姓名]，[证书正文]";
const NO_IMAGE: &str = "请先发送一张图片";

/// `…发<title>给@<name>，<text>`, read from the raw message so the @name survives
static CERTIFICATE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)发(.+?)给@?([^，,\x{2005}\s]+)[\x{2005}\s]*[，,]\s*(.+)")
        .expect("valid certificate regex")
});

#[derive(Debug, Deserialize)]
struct ImageUrl {
    imgurl: Option<String>,
}

impl ImageUrl {
    fn into_url(self) -> Result<String, ProviderError> {
        self.imgurl
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ProviderError::Payload("no imgurl in reply".to_string()))
    }
}

#[derive(Debug, Deserialize)]
struct Recognition {
    result: Option<String>,
}

pub struct Draw;

#[async_trait]
impl Command for Draw {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, args: &str) -> Result<Reply> {
        let image: ImageUrl = state
            .api
            .get_json(
                Host::Pearktrue,
                "/api/stablediffusion",
                &[("mode", "vertical"), ("prompt", args)],
            )
            .await?;
        Ok(Some(image.into_url()?))
    }
}

pub struct Signature;

#[async_trait]
impl Command for Signature {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, args: &str) -> Result<Reply> {
        let Some((style, word)) = split_pair(args) else {
            return Ok(Some(SIGNATURE_USAGE.to_string()));
        };
        let bytes = state
            .api
            .get_bytes(
                Host::Pearktrue,
                "/api/signature",
                &[
                    ("word", word),
                    ("type", style),
                    ("size", "80"),
                    ("fontcolor", "#000000"),
                    ("colors", "#ffffff"),
                ],
            )
            .await?;
        let path = state.media.save("signature", "png", &bytes).await?;
        Ok(Some(path_reply(&path)))
    }
}

/// 摸鱼: the daily slacker calendar
pub struct SlackerCalendar;

#[async_trait]
impl Command for SlackerCalendar {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, _args: &str) -> Result<Reply> {
        let no_query: [(&str, &str); 0] = [];
        let bytes = state
            .api
            .get_bytes(Host::Vvhan, "/api/moyu", &no_query)
            .await?;
        let path = state.media.save("moyu", "jpg", &bytes).await?;
        Ok(Some(path_reply(&path)))
    }
}

/// 举牌: a cartoon holding up a sign with the text
pub struct Placard;

#[async_trait]
impl Command for Placard {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, args: &str) -> Result<Reply> {
        let bytes = state
            .api
            .get_bytes(Host::Cenguigui, "/api/jp", &[("msg", args)])
            .await?;
        let path = state.media.save("placard", "jpg", &bytes).await?;
        Ok(Some(path_reply(&path)))
    }
}

pub struct WordCloud;

#[async_trait]
impl Command for WordCloud {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, args: &str) -> Result<Reply> {
        let image: ImageUrl = state
            .api
            .get_json(Host::Pearktrue, "/api/wordcloud", &[("text", args)])
            .await?;
        Ok(Some(image.into_url()?))
    }
}

pub struct Avatar;

#[async_trait]
impl Command for Avatar {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, args: &str) -> Result<Reply> {
        let image: ImageUrl = state
            .api
            .get_json(Host::Pearktrue, "/api/aiheadportrait/", &[("prompt", args)])
            .await?;
        let bytes = state.api.download(&image.into_url()?).await?;
        let path = state.media.save("avatar", "png", &bytes).await?;
        Ok(Some(path_reply(&path)))
    }
}

/// 识图: describe the last image this conversation sent
pub struct Recognize;

#[async_trait]
impl Command for Recognize {
    async fn run(&self, state: &AppState, msg: &IncomingMessage, _args: &str) -> Result<Reply> {
        let Some(image) = state.sessions.last_image(msg.scope_id()).await else {
            return Ok(Some(NO_IMAGE.to_string()));
        };
        let recognition: Recognition = state
            .api
            .upload_json(Host::Pearktrue, "/api/airecognizeimg/", &image, "image/jpeg")
            .await?;
        let result = recognition
            .result
            .filter(|r| !r.is_empty())
            .ok_or_else(|| ProviderError::Payload("no recognition result".to_string()))?;
        Ok(Some(result))
    }
}

pub struct Certificate;

#[async_trait]
impl Command for Certificate {
    async fn run(&self, state: &AppState, msg: &IncomingMessage, _args: &str) -> Result<Reply> {
        let raw = msg
            .content
            .split_once("发证书")
            .map(|(_, rest)| rest)
            .unwrap_or(&msg.content);
        let Some(caps) = CERTIFICATE.captures(raw) else {
            return Ok(Some(CERTIFICATE_USAGE.to_string()));
        };
        let (title, name, text) = (caps[1].trim(), caps[2].trim(), caps[3].trim());

        let bytes = state
            .api
            .get_bytes(
                Host::Pearktrue,
                "/api/certificate/",
                &[("name", name), ("title", title), ("text", text)],
            )
            .await?;
        let path = state.media.save("certificate", "jpg", &bytes).await?;
        Ok(Some(path_reply(&path)))
    }
}
