//! 查-style lookups: hot lists, anime, horoscopes, oil prices, phone numbers, weather

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{clip, Command};
use crate::bot::AppState;
use crate::dispatch::Reply;
use crate::platform::IncomingMessage;
use crate::providers::{expect_code, plain, ApiClient, Host, ProviderError};

pub const HOT_LIST_USAGE: &str = "1.功能介绍：获取热搜榜单，支持哔哩哔哩，百度，知乎，百度贴吧，少数派，IT之家，澎湃新闻，今日头条，微博热搜，36氪，稀土掘金，腾讯新闻\n2.调用格式：\n查榜今日头条";
pub const HOROSCOPE_USAGE: &str = "1.功能介绍：\n查星座运势，支持今日、明日、本周、本月、今年、爱情运势\n2.调用格式：\n查星座白羊座今日运势";
pub const OIL_USAGE: &str = "1.功能介绍：\n查各省油价\n2.调用格式：\n查油价江苏";
pub const PHONE_USAGE: &str = "1.功能介绍：\n查手机号码\n2.调用格式：查号码13500000000";
pub const WEATHER_USAGE: &str = "1.功能介绍：查询天气\n2.调用格式：\n查天气河北-唐山";

const MAX_HOT_TOPICS: usize = 20;
const HOT_TITLE_CHARS: usize = 27;

const SIGNS: [(&str, &str); 12] = [
    ("白羊座", "aries"),
    ("金牛座", "taurus"),
    ("双子座", "gemini"),
    ("巨蟹座", "cancer"),
    ("狮子座", "leo"),
    ("处女座", "virgo"),
    ("天秤座", "libra"),
    ("天蝎座", "scorpio"),
    ("射手座", "sagittarius"),
    ("摩羯座", "capricorn"),
    ("水瓶座", "aquarius"),
    ("双鱼座", "pisces"),
];

const PERIODS: [(&str, &str); 6] = [
    ("今日", "today"),
    ("明日", "nextday"),
    ("本周", "week"),
    ("本月", "month"),
    ("今年", "year"),
    ("爱情", "love"),
];

const FORTUNE_LABELS: [(&str, &str); 9] = [
    ("all", "总运"),
    ("love", "爱情"),
    ("work", "工作"),
    ("money", "财运"),
    ("health", "健康"),
    ("girl", "女生"),
    ("boy", "男生"),
    ("decompression", "减压"),
    ("openluck", "缘分"),
];

fn lookup<'a>(table: &[(&str, &'a str)], key: &str) -> Option<&'a str> {
    table.iter().find(|(k, _)| *k == key).map(|(_, v)| *v)
}

fn fortune_label(key: &str) -> &str {
    lookup(&FORTUNE_LABELS, key).unwrap_or(key)
}

/// Numbered titles of a portal's hot list, e.g. "澎湃新闻"
pub async fn hot_list(api: &ApiClient, board: &str) -> Result<String> {
    #[derive(Deserialize)]
    struct Topic {
        #[serde(default)]
        title: String,
    }
    #[derive(Deserialize)]
    struct Board {
        #[serde(default)]
        data: Vec<Topic>,
    }

    let hot: Board = api
        .get_json(Host::Pearktrue, "/api/dailyhot", &[("title", board)])
        .await?;
    if hot.data.is_empty() {
        return Err(ProviderError::Payload(format!("empty hot list for {}", board)).into());
    }
    Ok(hot
        .data
        .iter()
        .take(MAX_HOT_TOPICS)
        .enumerate()
        .map(|(i, t)| format!("{}.{}\n", i + 1, clip(&t.title, HOT_TITLE_CHARS)))
        .collect())
}

/// Today's weather for a city. Accepts `省-市` and uses the city part.
pub async fn weather(api: &ApiClient, place: &str) -> Result<String> {
    let city = place.rsplit('-').next().unwrap_or(place).trim();
    let report: Value = api
        .get_json(Host::Vvhan, "/api/weather", &[("city", city)])
        .await?;
    if report["success"] == Value::Bool(false) {
        return Err(ProviderError::Api {
            code: 0,
            message: plain(&report["message"]),
        }
        .into());
    }
    let today = &report["data"];
    if today.is_null() {
        return Err(ProviderError::Payload("no weather data in reply".to_string()).into());
    }

    let mut output = format!(
        "{}天气\n日期: {} {}\n天气: {}\n温度: {} ~ {}\n风向: {} {}\n",
        plain(&report["city"]),
        plain(&today["date"]),
        plain(&today["week"]),
        plain(&today["type"]),
        plain(&today["low"]),
        plain(&today["high"]),
        plain(&today["fengxiang"]),
        plain(&today["fengli"]),
    );
    if let Some(air) = report["air"]["aqi_name"].as_str() {
        output.push_str(&format!("空气质量: {}\n", air));
    }
    if let Some(tip) = report["tip"].as_str() {
        output.push_str(tip);
    }
    Ok(output.trim_end().to_string())
}

pub struct HotList;

#[async_trait]
impl Command for HotList {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, args: &str) -> Result<Reply> {
        Ok(Some(hot_list(&state.api, args).await?))
    }
}

/// 追番: today's anime updates
pub struct Anime;

#[async_trait]
impl Command for Anime {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, _args: &str) -> Result<Reply> {
        #[derive(Deserialize)]
        struct Show {
            #[serde(default)]
            title: String,
            #[serde(default)]
            status: String,
        }
        #[derive(Deserialize)]
        struct Today {
            code: i64,
            msg: Option<String>,
            #[serde(default)]
            data: Vec<Show>,
        }

        let no_query: [(&str, &str); 0] = [];
        let today: Today = state
            .api
            .get_json(Host::Pearktrue, "/api/todayanime/", &no_query)
            .await?;
        expect_code(today.code, today.msg.as_deref())?;

        let mut output = String::from("最新的番剧更新如下：\n");
        for (i, show) in today.data.iter().enumerate() {
            output.push_str(&format!("{}. {}\n状态: {}\n", i + 1, show.title, show.status));
        }
        output.push_str("以上就是番剧的最近更新。\n");
        Ok(Some(output))
    }
}

pub struct Horoscope;

impl Horoscope {
    /// `白羊座今日运势` → `("aries", "today")`
    fn parse(text: &str) -> Option<(&'static str, &'static str)> {
        let text: String = text.chars().filter(|c| !c.is_whitespace()).collect();
        let sign: String = text.chars().take(3).collect();
        let period: String = text.chars().skip(3).take(2).collect();
        Some((lookup(&SIGNS, &sign)?, lookup(&PERIODS, &period)?))
    }

    fn render(data: &Value) -> String {
        let mut output = String::from("以下是查询到的内容：\n\n");
        output.push_str(&format!("星座: {}\n", plain(&data["title"])));
        output.push_str(&format!("类型: {}\n", plain(&data["type"])));
        output.push_str(&format!("日期: {}\n", plain(&data["time"])));
        for (key, label) in [
            ("luckynumber", "幸运数字"),
            ("luckycolor", "幸运色"),
            ("luckyconstellation", "速配星座"),
        ] {
            if !data[key].is_null() {
                output.push_str(&format!("{}: {}\n", label, plain(&data[key])));
            }
        }
        output.push_str(&format!(
            "建议:\n宜: {}\n忌: {}\n",
            plain(&data["todo"]["yi"]),
            plain(&data["todo"]["ji"])
        ));
        output.push_str(&format!("简评: {}\n\n", plain(&data["shortcomment"])));

        output.push_str("运势指数:\n");
        if let Some(index) = data["index"].as_object() {
            for (key, value) in index {
                output.push_str(&format!("{}: {}\n", fortune_label(key), plain(value)));
            }
        }
        output.push_str("\n运势详解:\n");
        if let Some(texts) = data["fortunetext"].as_object() {
            for (key, value) in texts {
                output.push_str(&format!("{}: {}\n\n", fortune_label(key), plain(value)));
            }
        }
        output
    }
}

#[async_trait]
impl Command for Horoscope {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, args: &str) -> Result<Reply> {
        let Some((sign, period)) = Self::parse(args) else {
            return Ok(Some(HOROSCOPE_USAGE.to_string()));
        };
        let reply: Value = state
            .api
            .get_json(
                Host::Vvhan,
                "/api/horoscope",
                &[("time", period), ("type", sign)],
            )
            .await?;
        if reply["success"] != Value::Bool(true) {
            return Err(ProviderError::Api {
                code: 0,
                message: format!("horoscope lookup failed for {} {}", sign, period),
            }
            .into());
        }
        Ok(Some(Self::render(&reply["data"])))
    }
}

pub struct OilPrice;

#[async_trait]
impl Command for OilPrice {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, args: &str) -> Result<Reply> {
        #[derive(Deserialize)]
        struct Province {
            province: String,
            #[serde(default)]
            prices: serde_json::Map<String, Value>,
        }
        #[derive(Deserialize)]
        struct Oil {
            #[serde(default)]
            data: Vec<Province>,
        }

        let no_query: [(&str, &str); 0] = [];
        let oil: Oil = state
            .api
            .get_json(Host::Pearktrue, "/api/oil", &no_query)
            .await?;

        // Unknown provinces get no reply
        let Some(entry) = oil.data.iter().find(|p| p.province == args) else {
            return Ok(None);
        };
        let prices: String = entry
            .prices
            .iter()
            .map(|(fuel, price)| format!("{}号:{}元\n", fuel, plain(price)))
            .collect();
        Ok(Some(format!("{}油价如下:\n{}", args, prices)))
    }
}

/// 查号码: where a number is registered and whether it's flagged as spam
pub struct Phone;

#[async_trait]
impl Command for Phone {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, args: &str) -> Result<Reply> {
        let found: Value = state
            .api
            .get_json(Host::Pearktrue, "/api/phone", &[("mobile", args)])
            .await?;
        let info = &found["info"];
        let mut output = format!(
            "查询号码: {}\n所在省份: {}\n所在城市: {}\n运营商: {}\n\n",
            plain(&found["mobile"]),
            plain(&info["province"]),
            plain(&info["city"]),
            plain(&info["operator"])
        );
        for service in found["data"].as_array().into_iter().flatten() {
            output.push_str(&format!(
                "服务名称: {}\n查询结果: {}\n\n",
                plain(&service["name"]),
                plain(&service["msg"])
            ));
        }
        Ok(Some(output.trim().to_string()))
    }
}

pub struct Weather;

#[async_trait]
impl Command for Weather {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, args: &str) -> Result<Reply> {
        Ok(Some(weather(&state.api, args).await?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::state;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_horoscope_parse() {
        assert_eq!(Horoscope::parse("白羊座今日运势"), Some(("aries", "today")));
        assert_eq!(Horoscope::parse("双鱼座爱情"), Some(("pisces", "love")));
        assert_eq!(Horoscope::parse("白羊座 今日"), Some(("aries", "today")));
        assert_eq!(Horoscope::parse("白羊今日"), None);
        assert_eq!(Horoscope::parse("白羊座昨天"), None);
    }

    #[tokio::test]
    async fn test_hot_list_caps_count_and_title_length() {
        let topics: Vec<Value> = (1..=25)
            .map(|i| serde_json::json!({ "title": format!("{}{}", i, "长".repeat(40)) }))
            .collect();
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/dailyhot"))
            .and(query_param("title", "知乎"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": topics })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (_, state) = state(&server.uri(), dir.path());
        let msg = IncomingMessage::direct("wxid_a", "查榜知乎");

        let reply = HotList.run(&state, &msg, "知乎").await.unwrap().unwrap();
        let lines: Vec<&str> = reply.lines().collect();
        assert_eq!(lines.len(), 20);
        assert!(lines[19].starts_with("20.20"));
        assert_eq!(lines[0].chars().count(), "1.".chars().count() + 27);
    }

    #[tokio::test]
    async fn test_oil_price_unknown_province_is_silent() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/oil"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "province": "江苏", "prices": { "92": "7.5", "95": "8.0" } }]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (_, state) = state(&server.uri(), dir.path());
        let msg = IncomingMessage::direct("wxid_a", "查油价");

        let reply = OilPrice.run(&state, &msg, "江苏").await.unwrap();
        assert_eq!(reply.as_deref(), Some("江苏油价如下:\n92号:7.5元\n95号:8.0元\n"));
        assert_eq!(OilPrice.run(&state, &msg, "火星").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_weather_uses_city_part() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/weather"))
            .and(query_param("city", "唐山"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "city": "唐山",
                "data": {
                    "date": "2024-05-01", "week": "星期三", "type": "晴",
                    "low": "12°C", "high": "25°C", "fengxiang": "南风", "fengli": "3级"
                },
                "air": { "aqi_name": "良" },
                "tip": "适宜出行"
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (_, state) = state(&server.uri(), dir.path());
        let msg = IncomingMessage::direct("wxid_a", "查天气河北-唐山");

        let reply = Weather.run(&state, &msg, "河北-唐山").await.unwrap().unwrap();
        assert!(reply.starts_with("唐山天气\n日期: 2024-05-01 星期三\n天气: 晴\n"));
        assert!(reply.contains("空气质量: 良\n"));
        assert!(reply.ends_with("适宜出行"));
    }

    #[tokio::test]
    async fn test_horoscope_failure_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/horoscope"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "success": false })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (_, state) = state(&server.uri(), dir.path());
        let msg = IncomingMessage::direct("wxid_a", "查星座");
        assert!(Horoscope.run(&state, &msg, "白羊座今日运势").await.is_err());
    }
}
