//! Synthesized audio: 到账 and 讲述人

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;

use super::{split_pair, Command};
use crate::bot::AppState;
use crate::dispatch::Reply;
use crate::platform::IncomingMessage;
use crate::providers::{Host, ProviderError};

pub const ALIPAY_USAGE: &str = "1.功能介绍：\n生成支付宝到账语音\n2.调用格式：\n到账100000000000000";
pub const NARRATOR_USAGE: &str = "1.功能介绍：\n讲述文本，支持1-163号讲述人\n2.调用格式：\n讲述人8，你是一朵盛开的花，在生命中散发着美丽的光芒";

/// Narrator voices, numbered from 1
const SPEAKERS: [&str; 163] = [
    "宇祥", "宇蓝", "蕊柔", "宇智", "宇希", "希儿", "蕊诗", "蕊雪", "蕊姗", "珊儿",
    "婉儿", "智宸", "宇昊", "宇铭", "宇伟", "紫瑶", "紫阿", "紫雪", "紫娜", "紫芸",
    "宇全", "玲儿", "艾婷", "宇诚", "宇盛", "宇栋", "宇光", "艾琳", "艾莉", "艾雯",
    "艾诗", "宇驰", "艾薇", "艾洁", "艾蕊", "宇骏", "宇康", "艾悦", "艾冉", "艾楠",
    "宇铭", "艾婧", "艾露", "艾思", "艾媛", "艾茜", "艾菲", "艾雅", "宇泽", "艾冉",
    "晓萱", "晓辰", "晓晓", "晓伊", "云健", "云夏", "云扬", "云希", "晓贝", "晓妮",
    "晓枫", "晓新", "云辰", "沁荷", "芸语", "语嫣", "蕊珠", "沁娜", "沁蕾", "宇璋",
    "馨月", "馨兰", "宇尚", "宇同", "馨欣", "馨瑶", "宇韦", "宇", "晋", "蕊芬",
    "宇晋", "蕊莉", "沁雨", "沁香", "宇康", "馨逸", "沁莲", "宇栋", "馨荣", "芸渲",
    "芸露", "芸梅", "蕊若", "蕊晗", "沁美", "芸柔", "蕊韵", "宇彦", "芸茜", "蕊诗",
    "晓墨", "云枫", "晓悠", "晓睿", "晓梦", "云野", "晓双", "晓秋", "云皓", "晓颜",
    "云泽", "晓甄", "云非", "云溢", "云信", "源司", "银时", "绫音", "绚濑", "星奈",
    "莉亚", "莉娜", "琉璃", "力丸", "小雪", "翔太", "小春", "小梓", "春香", "佑果",
    "小彩", "美月", "影山", "紫苑", "时雨", "龙之介", "梨斗", "悠里", "穗乃香", "Liam",
    "Mason", "Skylar", "Vanessa", "Kayla", "Sadie", "Daniel", "Jacob", "Natalie", "Tyler", "Lily",
    "Thomas", "Harper", "Henry", "Naomi", "Ethan", "Emma", "Ava", "Lucas", "Chloe", "Caleb",
    "Sofia", "Gabriel", "Ivy",
];

fn speaker(index: &str) -> Option<&'static str> {
    let n: usize = index.parse().ok()?;
    SPEAKERS.get(n.checked_sub(1)?).copied()
}

/// 到账: an Alipay "payment received" announcement for the amount
pub struct Alipay;

#[async_trait]
impl Command for Alipay {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, args: &str) -> Result<Reply> {
        #[derive(Deserialize)]
        struct Audio {
            audiourl: Option<String>,
        }

        let audio: Audio = state
            .api
            .get_json(
                Host::Pearktrue,
                "/api/alipay",
                &[("number", args), ("type", "json")],
            )
            .await?;
        let url = audio
            .audiourl
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ProviderError::Payload("no audiourl in reply".to_string()))?;
        Ok(Some(url))
    }
}

/// 讲述人: read text aloud in one of the numbered voices
pub struct Narrator;

#[async_trait]
impl Command for Narrator {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, args: &str) -> Result<Reply> {
        #[derive(Deserialize)]
        struct Voice {
            voiceurl: Option<String>,
        }

        let Some((name, text)) =
            split_pair(args).and_then(|(index, text)| Some((speaker(index)?, text)))
        else {
            return Ok(Some(NARRATOR_USAGE.to_string()));
        };
        let voice: Voice = state
            .api
            .get_json(
                Host::Pearktrue,
                "/api/aivoicenet",
                &[("speak", name), ("text", text)],
            )
            .await?;
        let url = voice
            .voiceurl
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ProviderError::Payload("no voiceurl in reply".to_string()))?;
        Ok(Some(url))
    }
}
