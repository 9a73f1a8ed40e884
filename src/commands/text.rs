//! Commands that answer with text: translation, names, quotes, trivia

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use super::{numbered, split_leading_number, Command};
use crate::bot::AppState;
use crate::dispatch::Reply;
use crate::platform::IncomingMessage;
use crate::providers::{plain, Host, ProviderError};

pub const TRANSLATE_USAGE: &str = "1.功能介绍：\n谷歌翻译，支持中英互译\n2.调用格式：\n翻译我喜欢你";
pub const PINYIN_USAGE: &str = "1.功能介绍：\n查找汉字拼音\n2.调用格式：\n拼音我爱你";
pub const NICKNAME_USAGE: &str = "1.功能介绍：\n根据姓氏取网名\n2.调用格式：\n网名刘";
pub const GIVEN_NAME_USAGE: &str = "1.功能介绍：\n根据姓氏取真名\n2.调用格式：\n取名王";
pub const NAME_COUNT_USAGE: &str = "1.功能介绍：\n查询重名\n2.调用格式：\n重名张三";
pub const ALLUSION_USAGE: &str = "1.功能介绍：\n根据语意查典故\n2.调用格式：\n典故遇到困难不要怕";
pub const MOVIE_LINES_USAGE: &str = "1.功能介绍：\n根据台词查找电影\n2.调用格式：\n格式1：台词我爱你\n格式2：台词3我爱你\n注：3表示第3页，默认第1页";
pub const EXAM_USAGE: &str = "1.功能介绍：\n百度教育搜题\n2.调用格式：\n搜题根据契税法律的规定";
pub const SURNAME_USAGE: &str = "1.功能介绍：\n查看百家姓排行\n2.调用格式：\n百家姓张";
pub const CALORIES_USAGE: &str = "1.功能介绍：\n查食物热量\n2.调用格式：\n卡路里橘子";

const RULE: &str = "--------------------------------";
const MAX_ALLUSIONS: usize = 10;

/// `{ "data": [...] }` replies
#[derive(Debug, Deserialize)]
struct DataList<T> {
    #[serde(default = "Vec::new")]
    data: Vec<T>,
}

fn missing(what: &str) -> ProviderError {
    ProviderError::Payload(format!("no {} in reply", what))
}

pub struct Translate;

#[async_trait]
impl Command for Translate {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, args: &str) -> Result<Reply> {
        #[derive(Deserialize)]
        struct Translation {
            result: Option<String>,
        }

        let translation: Translation = state
            .api
            .get_json(
                Host::Pearktrue,
                "/api/googletranslate",
                &[("type", "auto"), ("text", args)],
            )
            .await?;
        Ok(Some(translation.result.ok_or_else(|| missing("result"))?))
    }
}

pub struct Pinyin;

#[async_trait]
impl Command for Pinyin {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, args: &str) -> Result<Reply> {
        let syllables: DataList<String> = state
            .api
            .get_json(Host::Pearktrue, "/api/word/pinyin", &[("word", args)])
            .await?;
        if syllables.data.is_empty() {
            return Err(missing("pinyin").into());
        }
        Ok(Some(syllables.data.join(" ")))
    }
}

/// 网名: online nicknames for a surname
pub struct Nickname;

#[async_trait]
impl Command for Nickname {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, args: &str) -> Result<Reply> {
        let names: DataList<String> = state
            .api
            .get_json(Host::Pearktrue, "/api/namexy", &[("name", args)])
            .await?;
        Ok(Some(numbered(&names.data)))
    }
}

/// 取名: given names for a surname, one list per sex
pub struct GivenName;

impl GivenName {
    async fn generate(state: &AppState, surname: &str, sex: &str) -> Result<Vec<String>> {
        let names: DataList<String> = state
            .api
            .get_json(
                Host::Pearktrue,
                "/api/name/generate",
                &[("xing", surname), ("sex", sex), ("count", "9")],
            )
            .await?;
        Ok(names.data)
    }
}

#[async_trait]
impl Command for GivenName {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, args: &str) -> Result<Reply> {
        let boys = Self::generate(state, args, "male").await?;
        let girls = Self::generate(state, args, "female").await?;
        Ok(Some(format!(
            "如果是男孩: \n{}\n\n如果是女孩: \n{}",
            numbered(&boys),
            numbered(&girls)
        )))
    }
}

/// 重名: how many people share a name
pub struct NameCount;

#[async_trait]
impl Command for NameCount {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, args: &str) -> Result<Reply> {
        #[derive(Deserialize)]
        struct Check {
            data: Option<Value>,
        }

        let check: Check = state
            .api
            .get_json(Host::Pearktrue, "/api/name/check.php", &[("name", args)])
            .await?;
        let info = check.data.ok_or_else(|| missing("data"))?;
        Ok(Some(format!(
            "查询成功：\n查询姓名: {}\n统计人数: {}\n男性占比: {}\n女性占比: {}\n",
            plain(&info["name"]),
            plain(&info["count"]),
            plain(&info["male"]),
            plain(&info["female"])
        )))
    }
}

#[derive(Debug, Deserialize)]
struct Quote {
    #[serde(default)]
    quote: String,
    #[serde(default)]
    source: String,
}

/// 典故: modern and classical quotes matching a meaning
pub struct Allusion;

impl Allusion {
    async fn search(state: &AppState, meaning: &str, kind: &str) -> Result<Vec<Quote>> {
        let quotes: DataList<Quote> = state
            .api
            .get_json(
                Host::Pearktrue,
                "/api/meansearch",
                &[("mean", meaning), ("type", kind)],
            )
            .await?;
        Ok(quotes.data)
    }

    fn section(heading: &str, quotes: &[Quote]) -> Vec<String> {
        std::iter::once(heading.to_string())
            .chain(
                quotes
                    .iter()
                    .take(MAX_ALLUSIONS)
                    .enumerate()
                    .map(|(i, q)| format!("<{}>.{}\n出自: {}\n{}", i + 1, q.quote, q.source, RULE)),
            )
            .collect()
    }
}

#[async_trait]
impl Command for Allusion {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, args: &str) -> Result<Reply> {
        let modern = Self::search(state, args, "现代文").await?;
        let classical = Self::search(state, args, "古诗文").await?;

        let mut lines = Self::section("【现代文】：", &modern);
        lines.extend(Self::section("【古诗文】：", &classical));
        Ok(Some(lines.join("\n")))
    }
}

/// 台词: find films by a line of dialogue
pub struct MovieLines;

#[async_trait]
impl Command for MovieLines {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, args: &str) -> Result<Reply> {
        #[derive(Deserialize)]
        struct Film {
            #[serde(default)]
            title: String,
            #[serde(default)]
            all_zh_word: Vec<String>,
            #[serde(default)]
            all_en_word: Vec<String>,
        }

        let (page, word) = match split_leading_number(args) {
            (Some(page), word) if !word.is_empty() => (page, word),
            _ => (1, args),
        };
        let page = page.to_string();
        let films: DataList<Film> = state
            .api
            .get_json(
                Host::Pearktrue,
                "/api/media/lines.php",
                &[("word", word), ("page", page.as_str())],
            )
            .await?;
        if films.data.is_empty() {
            return Ok(Some("没有找到相关的电影台词。".to_string()));
        }

        let quoted = |lines: &[String]| {
            lines
                .iter()
                .map(|l| format!("“{}”", l))
                .collect::<Vec<_>>()
                .join("\n")
        };
        let mut output = String::from("为您找到以下结果：\n");
        for (i, film) in films.data.iter().enumerate() {
            output.push_str(&format!(
                "{}. {}\n{}\n{}\n{}\n\n",
                i + 1,
                film.title,
                quoted(&film.all_zh_word),
                RULE,
                quoted(&film.all_en_word)
            ));
        }
        Ok(Some(output))
    }
}

/// 搜题: look up an exam question and its answer
pub struct ExamSearch;

#[async_trait]
impl Command for ExamSearch {
    async fn run(&self, state: &AppState, msg: &IncomingMessage, args: &str) -> Result<Reply> {
        #[derive(Deserialize)]
        struct Answer {
            #[serde(default)]
            question: String,
            #[serde(default)]
            options: Vec<String>,
            #[serde(default)]
            answer: String,
        }
        #[derive(Deserialize)]
        struct Tiku {
            data: Option<Answer>,
        }

        state
            .responder
            .acknowledge(
                msg,
                &format!(
                    "正在为您查询\n您要找的题目为：\n{}\n正在查询，请您耐心等待···",
                    args
                ),
            )
            .await;

        let tiku: Tiku = state
            .api
            .get_json(Host::Pearktrue, "/api/baidutiku", &[("question", args)])
            .await?;
        let found = tiku.data.ok_or_else(|| missing("answer"))?;
        Ok(Some(format!(
            "{}\n\n{}\n\n{}",
            found.question,
            found.options.join("\n"),
            found.answer
        )))
    }
}

/// 百家姓: a surname's rank
pub struct Surname;

#[async_trait]
impl Command for Surname {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, args: &str) -> Result<Reply> {
        let rank: Value = state
            .api
            .get_json(Host::Pearktrue, "/api/bjx", &[("name", args)])
            .await?;
        Ok(Some(format!(
            "{}\n姓氏：{}\n排名：{}",
            plain(&rank["msg"]),
            plain(&rank["name"]),
            plain(&rank["top"])
        )))
    }
}

/// 卡路里: calories of foods matching a name
pub struct Calories;

#[async_trait]
impl Command for Calories {
    async fn run(&self, state: &AppState, _msg: &IncomingMessage, args: &str) -> Result<Reply> {
        let found: Value = state
            .api
            .get_json(Host::Pearktrue, "/api/calories", &[("food", args)])
            .await?;
        let foods = found["data"].as_array().ok_or_else(|| missing("data"))?;

        let mut output = format!(
            "查找的食物: {}\n共找到 {} 类食物\n食物{}热量如下：\n",
            plain(&found["food"]),
            plain(&found["count"]),
            args
        );
        for (i, food) in foods.iter().enumerate() {
            output.push_str(&format!(
                "{}. {}：{}\n",
                i + 1,
                plain(&food["food"]),
                plain(&food["calories"])
            ));
        }
        Ok(Some(output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::testing::state;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn server_with(route: &str, body: Value) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(&server)
            .await;
        server
    }

    #[tokio::test]
    async fn test_pinyin_joins_syllables() {
        let server = server_with(
            "/api/word/pinyin",
            serde_json::json!({ "data": ["wǒ", "ài", "nǐ"] }),
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let (_, state) = state(&server.uri(), dir.path());
        let msg = IncomingMessage::direct("wxid_a", "拼音我爱你");

        let reply = Pinyin.run(&state, &msg, "我爱你").await.unwrap();
        assert_eq!(reply.as_deref(), Some("wǒ ài nǐ"));
    }

    #[tokio::test]
    async fn test_given_name_lists_both_sexes() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/name/generate"))
            .and(query_param("sex", "male"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": ["王刚"] })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/name/generate"))
            .and(query_param("sex", "female"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "data": ["王芳", "王丽"] })),
            )
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (_, state) = state(&server.uri(), dir.path());
        let msg = IncomingMessage::direct("wxid_a", "取名王");

        let reply = GivenName.run(&state, &msg, "王").await.unwrap().unwrap();
        assert_eq!(reply, "如果是男孩: \n1.王刚\n\n如果是女孩: \n1.王芳\n2.王丽");
    }

    #[tokio::test]
    async fn test_movie_lines_page_and_empty_result() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/media/lines.php"))
            .and(query_param("word", "我爱你"))
            .and(query_param("page", "3"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{ "title": "大话西游", "all_zh_word": ["我爱你"], "all_en_word": ["I love you"] }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/media/lines.php"))
            .and(query_param("page", "1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "data": [] })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (_, state) = state(&server.uri(), dir.path());
        let msg = IncomingMessage::direct("wxid_a", "台词");

        let reply = MovieLines.run(&state, &msg, "3我爱你").await.unwrap().unwrap();
        assert!(reply.contains("1. 大话西游\n“我爱你”\n"));
        assert!(reply.contains("“I love you”"));

        let reply = MovieLines.run(&state, &msg, "无人说过").await.unwrap();
        assert_eq!(reply.as_deref(), Some("没有找到相关的电影台词。"));
    }

    #[tokio::test]
    async fn test_exam_search_acknowledges_first() {
        let server = server_with(
            "/api/baidutiku",
            serde_json::json!({ "data": {
                "question": "1+1=?",
                "options": ["A.1", "B.2"],
                "answer": "B"
            }}),
        )
        .await;
        let dir = tempfile::tempdir().unwrap();
        let (transport, state) = state(&server.uri(), dir.path());
        let msg = IncomingMessage::group("1@chatroom", "wxid_a", "搜题1+1", true);

        let reply = ExamSearch.run(&state, &msg, "1+1").await.unwrap().unwrap();
        assert_eq!(reply, "1+1=?\n\nA.1\nB.2\n\nB");

        let sent = transport.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].receiver, "1@chatroom");
        assert!(sent[0].content.contains("正在为您查询"));
    }

    #[tokio::test]
    async fn test_surname_and_calories_render_numbers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/bjx"))
            .respond_with(ResponseTemplate::new(200).set_body_json(
                serde_json::json!({ "msg": "获取成功", "name": "张", "top": 3 }),
            ))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/api/calories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "food": "橘子",
                "count": 1,
                "data": [{ "food": "橘子", "calories": "44大卡" }]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let (_, state) = state(&server.uri(), dir.path());
        let msg = IncomingMessage::direct("wxid_a", "百家姓张");

        let reply = Surname.run(&state, &msg, "张").await.unwrap();
        assert_eq!(reply.as_deref(), Some("获取成功\n姓氏：张\n排名：3"));

        let reply = Calories.run(&state, &msg, "橘子").await.unwrap().unwrap();
        assert!(reply.starts_with("查找的食物: 橘子\n共找到 1 类食物\n"));
        assert!(reply.ends_with("1. 橘子：44大卡\n"));
    }
}
