use std::collections::HashMap;
use std::sync::{Arc, LazyLock};

use anyhow::Result;
use regex::Regex;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info, warn};

use crate::commands;
use crate::config::{Config, ReportsConfig};
use crate::dispatch::{Reply, ReplyEnvelope, Responder};
use crate::idiom::IdiomBook;
use crate::llm::LlmClient;
use crate::platform::{IncomingMessage, Transport};
use crate::providers::{path_reply, ApiClient, MediaStore};
use crate::router::{ReportKind, Route, Router};
use crate::scheduler::reports;
use crate::session::SessionStore;
use crate::speech;

static FRIEND_ADDED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"你已添加了(.*)，现在可以开始聊天了。").expect("valid friend notice regex")
});

/// Reply when someone @s the bot and no chat model is configured
const NO_CHAT: &str = "你@我干嘛？";

/// Everything a command handler can reach
pub struct AppState {
    pub api: ApiClient,
    pub media: MediaStore,
    pub sessions: SessionStore,
    pub responder: Responder,
    pub llm: Option<LlmClient>,
    /// Command keywords in registration order, for 查功能
    pub keywords: Vec<&'static str>,
}

/// The outermost message handler: routes each message and sends the reply
pub struct Robot {
    router: Router,
    state: AppState,
    idioms: Option<IdiomBook>,
    /// wxid -> nickname
    contacts: Mutex<HashMap<String, String>>,
    reports: ReportsConfig,
}

impl Robot {
    pub fn new(config: &Config, transport: Arc<dyn Transport>) -> Result<Self> {
        let commands = commands::builtin();
        let keywords = commands.keywords();

        let idioms = match &config.idioms.path {
            Some(path) => Some(IdiomBook::load(path)?),
            None => None,
        };

        let llm = config
            .llm
            .clone()
            .map(|llm| {
                info!("Chat fallback: {} ({})", llm.model, llm.provider);
                LlmClient::new(llm)
            })
            .transpose()?;

        let state = AppState {
            api: ApiClient::new(&config.providers)?,
            media: MediaStore::new(config.storage.media_dir.clone()),
            sessions: SessionStore::new(&config.session),
            responder: Responder::new(transport),
            llm,
            keywords,
        };

        Ok(Self {
            router: Router::new(commands, &config.routing),
            state,
            idioms,
            contacts: Mutex::new(HashMap::new()),
            reports: config.reports.clone(),
        })
    }

    pub fn reports(&self) -> &ReportsConfig {
        &self.reports
    }

    /// Reload the contact list; keeps the old cache when the gateway fails
    pub async fn refresh_contacts(&self) {
        match self.state.responder.transport().contacts().await {
            Ok(contacts) => {
                info!("Loaded {} contacts", contacts.len());
                *self.contacts.lock().await = contacts;
            }
            Err(e) => warn!("Failed to load contacts: {:#}", e),
        }
    }

    async fn display_name(&self, wxid: &str) -> String {
        self.contacts
            .lock()
            .await
            .get(wxid)
            .filter(|name| !name.is_empty())
            .cloned()
            .unwrap_or_else(|| wxid.to_string())
    }

    /// Consume the message queue one message at a time until it closes
    pub async fn run(self: Arc<Self>, mut rx: mpsc::Receiver<IncomingMessage>) {
        info!("Message worker started");
        while let Some(msg) = rx.recv().await {
            self.on_message(msg).await;
        }
        info!("Message queue closed, worker stopping");
    }

    /// Handle one message. Returns the reply that was sent, if any.
    pub async fn on_message(&self, msg: IncomingMessage) -> Option<ReplyEnvelope> {
        let sender = self.display_name(&msg.sender).await;
        info!("{:?} from {} in {}: {}", msg.kind, sender, msg.scope_id(), msg.content);

        let route = self.router.route(&msg);
        debug!("Message {} routed to {:?}", msg.id, route);

        let responder = &self.state.responder;
        match route {
            Route::Ignore => None,
            Route::FriendAdded => responder.respond(&msg, self.greet_friend(&msg)).await,
            Route::Image => responder.respond(&msg, self.save_image(&msg)).await,
            Route::Voice => responder.respond(&msg, self.answer_voice(&msg)).await,
            Route::Report(kind) => {
                self.broadcast(kind).await;
                None
            }
            Route::Command { entry, args } => {
                info!("Command '{}' from {}", entry.keyword(), msg.sender);
                responder
                    .respond(&msg, entry.invoke(&self.state, &msg, &args))
                    .await
            }
            Route::Chitchat(text) => responder.respond(&msg, self.chitchat(&msg, &text)).await,
            Route::Idiom(text) => responder.respond(&msg, self.idiom(&text)).await,
        }
    }

    /// Send a report to its configured receivers now
    pub async fn broadcast(&self, kind: ReportKind) -> usize {
        reports::broadcast(&self.state, &self.reports, kind).await
    }

    async fn greet_friend(&self, msg: &IncomingMessage) -> Result<Reply> {
        let Some(caps) = FRIEND_ADDED.captures(&msg.content) else {
            return Ok(None);
        };
        let nick = caps[1].to_string();
        self.contacts
            .lock()
            .await
            .insert(msg.sender.clone(), nick.clone());
        Ok(Some(format!("Hi {}，我自动通过了你的好友请求。", nick)))
    }

    async fn save_image(&self, msg: &IncomingMessage) -> Result<Reply> {
        let dir = self.state.media.dir("images").await?;
        let path = self
            .state
            .responder
            .transport()
            .download_image(msg, &dir)
            .await?;
        debug!("Saved image {} to {}", msg.id, path.display());
        self.state.sessions.remember_image(msg.scope_id(), path).await;
        Ok(None)
    }

    async fn answer_voice(&self, msg: &IncomingMessage) -> Result<Reply> {
        let Some(llm) = &self.state.llm else {
            warn!("Voice message {} ignored: no chat model configured", msg.id);
            return Ok(None);
        };

        let dir = self.state.media.dir("voice").await?;
        let audio = self
            .state
            .responder
            .transport()
            .download_voice(msg, &dir)
            .await?;
        let question = speech::transcribe(&self.state.api, &audio).await?;
        let answer = llm.answer(&question, msg.scope_id()).await?;
        let spoken = speech::synthesize(&self.state.api, &self.state.media, &answer).await?;
        Ok(Some(path_reply(&spoken)))
    }

    async fn chitchat(&self, msg: &IncomingMessage, text: &str) -> Result<Reply> {
        match &self.state.llm {
            Some(llm) => Ok(Some(llm.answer(text, msg.scope_id()).await?)),
            None => Ok(Some(NO_CHAT.to_string())),
        }
    }

    async fn idiom(&self, text: &str) -> Result<Reply> {
        Ok(self.idioms.as_ref().and_then(|book| book.respond(text)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classify::MediaKind;
    use crate::platform::testing::RecordingTransport;
    use crate::platform::MessageKind;
    use std::path::Path;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(provider_url: &str, media: &Path, extra: &str) -> Config {
        Config::parse(&format!(
            r#"
            [bridge]
            base_url = "http://127.0.0.1:9"

            [routing]
            groups = ["1@chatroom"]

            [providers]
            pearktrue = "{url}"
            vvhan = "{url}"
            cenguigui = "{url}"
            aa1 = "{url}"
            lolimi = "{url}"

            [storage]
            media_dir = "{media}"

            {extra}
            "#,
            url = provider_url,
            media = media.display(),
            extra = extra,
        ))
        .unwrap()
    }

    fn robot(config: &Config) -> (Arc<RecordingTransport>, Robot) {
        let transport = Arc::new(RecordingTransport::with_aliases(&[("wxid_a", "Alice")]));
        let robot = Robot::new(config, transport.clone()).unwrap();
        (transport, robot)
    }

    #[tokio::test]
    async fn test_friend_added_greets_and_caches_nick() {
        let dir = tempfile::tempdir().unwrap();
        let (transport, robot) = robot(&config("http://127.0.0.1:9", dir.path(), ""));

        let mut notice = IncomingMessage::direct("wxid_new", "你已添加了小明，现在可以开始聊天了。");
        notice.kind = MessageKind::System;
        robot.on_message(notice).await.unwrap();

        let sent = transport.sent().await;
        assert_eq!(sent[0].receiver, "wxid_new");
        assert_eq!(sent[0].content, "Hi 小明，我自动通过了你的好友请求。");
        assert_eq!(robot.display_name("wxid_new").await, "小明");

        let mut other = IncomingMessage::direct("wxid_new", "以上是打招呼的内容");
        other.kind = MessageKind::System;
        assert!(robot.on_message(other).await.is_none());
        assert_eq!(transport.sent().await.len(), 1);
    }

    #[tokio::test]
    async fn test_command_reply_in_group_mentions_sender() {
        let dir = tempfile::tempdir().unwrap();
        let (transport, robot) = robot(&config("http://127.0.0.1:9", dir.path(), ""));

        let msg = IncomingMessage::group("1@chatroom", "wxid_a", "@bot\u{2005}查功能", true);
        let envelope = robot.on_message(msg).await.unwrap();
        assert_eq!(envelope.target, "1@chatroom");
        assert!(envelope.content.starts_with("1. 画"));

        let sent = transport.sent().await;
        assert!(sent[0].content.starts_with(" @Alice\n1. 画"));
        assert_eq!(sent[0].aters.as_deref(), Some("wxid_a"));
    }

    #[tokio::test]
    async fn test_chitchat_without_model() {
        let dir = tempfile::tempdir().unwrap();
        let (transport, robot) = robot(&config("http://127.0.0.1:9", dir.path(), ""));

        robot
            .on_message(IncomingMessage::direct("wxid_a", "今天过得怎么样"))
            .await
            .unwrap();
        assert_eq!(transport.sent().await[0].content, NO_CHAT);
    }

    #[tokio::test]
    async fn test_chitchat_with_model() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat/completions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "choices": [{ "message": { "role": "assistant", "content": "挺好的" } }]
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let llm = format!(
            "[llm]\nprovider = \"openai\"\nmodel = \"test\"\nbase_url = \"{}\"",
            server.uri()
        );
        let (transport, robot) = robot(&config("http://127.0.0.1:9", dir.path(), &llm));

        let msg = IncomingMessage::group("1@chatroom", "wxid_a", "@bot\u{2005}你好", true);
        robot.on_message(msg).await.unwrap();
        assert_eq!(transport.sent().await[0].content, " @Alice\n挺好的");
    }

    #[tokio::test]
    async fn test_image_is_remembered_silently() {
        let dir = tempfile::tempdir().unwrap();
        let (transport, robot) = robot(&config("http://127.0.0.1:9", dir.path(), ""));

        let mut image = IncomingMessage::group("1@chatroom", "wxid_a", "<msg/>", false);
        image.kind = MessageKind::Image;
        image.id = 42;
        assert!(robot.on_message(image).await.is_none());

        let remembered = robot.state.sessions.last_image("1@chatroom").await.unwrap();
        assert_eq!(remembered, dir.path().join("images").join("42.jpg"));
        assert!(transport.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_voice_without_model_is_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let (transport, robot) = robot(&config("http://127.0.0.1:9", dir.path(), ""));

        let mut voice = IncomingMessage::direct("wxid_a", "<voicemsg/>");
        voice.kind = MessageKind::Voice;
        assert!(robot.on_message(voice).await.is_none());
        assert!(transport.sent().await.is_empty());
    }

    #[tokio::test]
    async fn test_idiom_chain_in_group() {
        let dir = tempfile::tempdir().unwrap();
        let idioms = dir.path().join("idioms.tsv");
        std::fs::write(
            &idioms,
            "天天向上\ttian tian xiang shang\t每天都向上\n上行下效\tshang xing xia xiao\t\n",
        )
        .unwrap();
        let extra = format!("[idioms]\npath = \"{}\"", idioms.display());
        let (transport, robot) = robot(&config("http://127.0.0.1:9", dir.path(), &extra));

        let msg = IncomingMessage::group("1@chatroom", "wxid_a", "#天天向上", false);
        robot.on_message(msg).await.unwrap();
        assert_eq!(transport.sent().await[0].content, " @Alice\n上行下效");

        let chatter = IncomingMessage::group("1@chatroom", "wxid_a", "今天吃什么", false);
        assert!(robot.on_message(chatter).await.is_none());
    }

    #[tokio::test]
    async fn test_report_request_goes_to_receivers() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/weather"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "city": "北京",
                "data": {
                    "date": "2024-05-01", "week": "星期三", "type": "晴",
                    "low": "12°C", "high": "25°C", "fengxiang": "南风", "fengli": "3级"
                }
            })))
            .mount(&server)
            .await;

        let dir = tempfile::tempdir().unwrap();
        let extra = "[reports]\nweather_receivers = [\"wxid_b\", \"1@chatroom\"]";
        let (transport, robot) = robot(&config(&server.uri(), dir.path(), extra));

        assert!(robot
            .on_message(IncomingMessage::direct("wxid_a", "/天气"))
            .await
            .is_none());

        let sent = transport.sent().await;
        let receivers: Vec<_> = sent.iter().map(|o| o.receiver.as_str()).collect();
        assert_eq!(receivers, vec!["wxid_b", "1@chatroom"]);
        assert!(sent[0].content.starts_with("北京天气"));
        assert_eq!(sent[0].kind, MediaKind::Text);
    }

    #[tokio::test]
    async fn test_worker_processes_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let (transport, robot) = robot(&config("http://127.0.0.1:9", dir.path(), ""));
        let robot = Arc::new(robot);

        let (tx, rx) = mpsc::channel(4);
        let worker = tokio::spawn(robot.clone().run(rx));
        tx.send(IncomingMessage::direct("wxid_a", "第一条")).await.unwrap();
        let mut mine = IncomingMessage::direct("wxid_bot", "自己发的");
        mine.from_self = true;
        tx.send(mine).await.unwrap();
        tx.send(IncomingMessage::direct("wxid_b", "第二条")).await.unwrap();
        drop(tx);
        worker.await.unwrap();

        let receivers: Vec<_> = transport
            .sent()
            .await
            .into_iter()
            .map(|o| o.receiver)
            .collect();
        assert_eq!(receivers, vec!["wxid_a", "wxid_b"]);
    }

    #[tokio::test]
    async fn test_refresh_contacts() {
        let dir = tempfile::tempdir().unwrap();
        let (_, robot) = robot(&config("http://127.0.0.1:9", dir.path(), ""));

        assert_eq!(robot.display_name("wxid_a").await, "wxid_a");
        robot.refresh_contacts().await;
        assert_eq!(robot.display_name("wxid_a").await, "Alice");
    }
}
