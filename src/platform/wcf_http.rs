//! WeChat HTTP gateway: outbound calls go to the gateway's REST API, inbound
//! messages arrive as JSON posts on `/callback`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use axum::{extract::State, http::StatusCode, routing::post, Json, Router};
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, LazyLock};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::{debug, error, info};

use super::{IncomingMessage, MessageKind, Outbound, Transport};
use crate::classify::MediaKind;
use crate::config::BridgeConfig;

/// Seconds the gateway may spend fetching an attachment
const DOWNLOAD_TIMEOUT_SECS: u64 = 30;

static AT_USER_LIST: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<atuserlist>(.*?)</atuserlist>").expect("valid atuserlist regex")
});

static AT_EVERYONE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"@(?:所有人|all|All)").expect("valid @all regex"));

/// Every gateway reply: `status == 0` means success
#[derive(Debug, Deserialize)]
struct GatewayReply<T> {
    status: i64,
    error: Option<String>,
    data: Option<T>,
}

#[derive(Debug, Deserialize)]
struct Contact {
    wxid: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
struct UserInfo {
    wxid: String,
}

/// Client for the gateway's REST API
pub struct WcfHttpClient {
    client: reqwest::Client,
    base_url: String,
}

impl WcfHttpClient {
    pub fn new(config: &BridgeConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(DOWNLOAD_TIMEOUT_SECS + 10))
            .build()
            .context("Failed to build gateway HTTP client")?;
        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post<T, B>(&self, path: &str, body: &B) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .with_context(|| format!("Gateway request to {} failed", path))?;
        Self::unwrap_reply(path, response).await
    }

    async fn get<T, Q>(&self, path: &str, query: &Q) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let response = self
            .client
            .get(self.url(path))
            .query(query)
            .send()
            .await
            .with_context(|| format!("Gateway request to {} failed", path))?;
        Self::unwrap_reply(path, response).await
    }

    async fn unwrap_reply<T: DeserializeOwned>(
        path: &str,
        response: reqwest::Response,
    ) -> Result<Option<T>> {
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Gateway {} returned HTTP {}: {}", path, status, body);
        }
        let reply: GatewayReply<T> = response
            .json()
            .await
            .with_context(|| format!("Failed to parse gateway reply from {}", path))?;
        if reply.status != 0 {
            anyhow::bail!(
                "Gateway {} failed (status {}): {}",
                path,
                reply.status,
                reply.error.unwrap_or_default()
            );
        }
        Ok(reply.data)
    }

    async fn download(&self, path: &str, body: Value) -> Result<PathBuf> {
        let saved: Option<String> = self.post(path, &body).await?;
        saved
            .filter(|p| !p.is_empty())
            .map(PathBuf::from)
            .with_context(|| format!("Gateway {} returned no file path", path))
    }
}

#[async_trait]
impl Transport for WcfHttpClient {
    async fn send(&self, outbound: &Outbound) -> Result<()> {
        let (path, body) = match outbound.kind {
            MediaKind::Text => (
                "/text",
                json!({
                    "msg": outbound.content,
                    "receiver": outbound.receiver,
                    "aters": outbound.aters.as_deref().unwrap_or(""),
                }),
            ),
            MediaKind::Image => (
                "/image",
                json!({ "path": outbound.content, "receiver": outbound.receiver }),
            ),
            MediaKind::Voice | MediaKind::File => (
                "/file",
                json!({ "path": outbound.content, "receiver": outbound.receiver }),
            ),
        };
        let _: Option<Value> = self.post(path, &body).await?;
        Ok(())
    }

    async fn alias_in_chatroom(&self, wxid: &str, room_id: &str) -> Result<String> {
        let alias: Option<String> = self
            .get("/alias-in-chatroom", &[("wxid", wxid), ("roomid", room_id)])
            .await?;
        Ok(alias.unwrap_or_default())
    }

    async fn contacts(&self) -> Result<HashMap<String, String>> {
        let no_query: [(&str, &str); 0] = [];
        let contacts: Option<Vec<Contact>> = self.get("/contacts", &no_query).await?;
        Ok(contacts
            .unwrap_or_default()
            .into_iter()
            .map(|c| (c.wxid, c.name))
            .collect())
    }

    async fn self_wxid(&self) -> Result<String> {
        let no_query: [(&str, &str); 0] = [];
        let info: Option<UserInfo> = self.get("/userinfo", &no_query).await?;
        info.map(|i| i.wxid)
            .filter(|w| !w.is_empty())
            .context("Gateway returned no user info")
    }

    async fn download_image(&self, msg: &IncomingMessage, dir: &Path) -> Result<PathBuf> {
        self.download(
            "/save-image",
            json!({
                "id": msg.id,
                "extra": msg.extra,
                "dir": dir.to_string_lossy(),
                "timeout": DOWNLOAD_TIMEOUT_SECS,
            }),
        )
        .await
    }

    async fn download_voice(&self, msg: &IncomingMessage, dir: &Path) -> Result<PathBuf> {
        self.download(
            "/audio-msg",
            json!({
                "id": msg.id,
                "dir": dir.to_string_lossy(),
                "timeout": DOWNLOAD_TIMEOUT_SECS,
            }),
        )
        .await
    }
}

/// A message as the gateway posts it to `/callback`
#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    #[serde(default)]
    pub is_self: bool,
    #[serde(default)]
    pub is_group: bool,
    pub id: u64,
    #[serde(rename = "type")]
    pub kind: u32,
    #[serde(default)]
    pub roomid: String,
    #[serde(default)]
    pub content: String,
    pub sender: String,
    #[serde(default)]
    pub extra: String,
    #[serde(default)]
    pub xml: String,
}

impl WireMessage {
    pub fn into_incoming(self, self_wxid: &str) -> IncomingMessage {
        let in_group = self.is_group && !self.roomid.is_empty();
        let mentions_self = in_group && mentions(&self.xml, &self.content, self_wxid);
        IncomingMessage {
            id: self.id,
            kind: MessageKind::from(self.kind),
            sender: self.sender,
            room_id: in_group.then_some(self.roomid),
            content: self.content,
            extra: self.extra,
            mentions_self,
            from_self: self.is_self,
        }
    }
}

/// Whether `wxid` is in the message's @-list. `@所有人` broadcasts don't count.
fn mentions(xml: &str, content: &str, wxid: &str) -> bool {
    if wxid.is_empty() || AT_EVERYONE.is_match(content) {
        return false;
    }
    AT_USER_LIST
        .captures(xml)
        .map(|caps| caps[1].contains(wxid))
        .unwrap_or(false)
}

#[derive(Clone)]
struct CallbackState {
    tx: mpsc::Sender<IncomingMessage>,
    self_wxid: Arc<str>,
}

async fn callback(
    State(state): State<CallbackState>,
    Json(wire): Json<WireMessage>,
) -> (StatusCode, Json<Value>) {
    let msg = wire.into_incoming(&state.self_wxid);
    debug!("Callback message {} ({:?})", msg.id, msg.kind);
    match state.tx.send(msg).await {
        Ok(()) => (StatusCode::OK, Json(json!({ "status": 0 }))),
        Err(e) => {
            error!("Message queue closed, dropping message {}", e.0.id);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({ "status": 1, "error": "message queue closed" })),
            )
        }
    }
}

pub fn callback_router(tx: mpsc::Sender<IncomingMessage>, self_wxid: &str) -> Router {
    Router::new()
        .route("/callback", post(callback))
        .with_state(CallbackState {
            tx,
            self_wxid: Arc::from(self_wxid),
        })
}

/// Accept gateway callbacks on `listen` until `shutdown` resolves
pub async fn serve<S>(
    listen: &str,
    tx: mpsc::Sender<IncomingMessage>,
    self_wxid: &str,
    shutdown: S,
) -> Result<()>
where
    S: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(listen)
        .await
        .with_context(|| format!("Failed to bind to {}", listen))?;
    info!("Listening for gateway callbacks on http://{}/callback", listen);

    axum::serve(listener, callback_router(tx, self_wxid))
        .with_graceful_shutdown(shutdown)
        .await
        .context("Callback server error")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const AT_XML: &str = "<msgsource><atuserlist><![CDATA[,wxid_bot]]></atuserlist></msgsource>";

    fn client(base_url: &str) -> WcfHttpClient {
        WcfHttpClient::new(&BridgeConfig {
            base_url: base_url.to_string(),
            listen: "127.0.0.1:0".to_string(),
            self_wxid: None,
            queue_capacity: 4,
        })
        .unwrap()
    }

    fn wire(is_group: bool, content: &str, xml: &str) -> WireMessage {
        WireMessage {
            is_self: false,
            is_group,
            id: 7,
            kind: 1,
            roomid: if is_group { "1@chatroom".to_string() } else { String::new() },
            content: content.to_string(),
            sender: "wxid_a".to_string(),
            extra: String::new(),
            xml: xml.to_string(),
        }
    }

    #[test]
    fn test_mention_detection() {
        assert!(mentions(AT_XML, "@bot 搜歌", "wxid_bot"));
        assert!(!mentions(AT_XML, "@所有人 开会", "wxid_bot"));
        assert!(!mentions("<msgsource></msgsource>", "搜歌", "wxid_bot"));
        assert!(!mentions(AT_XML, "@bot 搜歌", "wxid_other"));
    }

    #[test]
    fn test_wire_to_incoming() {
        let group = wire(true, "@bot\u{2005}搜歌", AT_XML).into_incoming("wxid_bot");
        assert_eq!(group.room_id.as_deref(), Some("1@chatroom"));
        assert!(group.mentions_self);
        assert_eq!(group.kind, MessageKind::Text);

        let direct = wire(false, "你好", AT_XML).into_incoming("wxid_bot");
        assert_eq!(direct.room_id, None);
        assert!(!direct.mentions_self);
    }

    #[tokio::test]
    async fn test_send_text_with_aters() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/text"))
            .and(body_json(json!({
                "msg": " @Alice\nhello",
                "receiver": "1@chatroom",
                "aters": "wxid_a",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": 0 })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server.uri())
            .send(&Outbound {
                kind: MediaKind::Text,
                receiver: "1@chatroom".to_string(),
                content: " @Alice\nhello".to_string(),
                aters: Some("wxid_a".to_string()),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_media_goes_to_its_endpoint() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/image"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": 0 })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/file"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "status": 0 })))
            .expect(1)
            .mount(&server)
            .await;

        let gateway = client(&server.uri());
        for (kind, content) in [
            (MediaKind::Image, "https://img.example.com/a.png"),
            (MediaKind::File, "https://v.example.com/a.mp4"),
        ] {
            gateway
                .send(&Outbound {
                    kind,
                    receiver: "wxid_a".to_string(),
                    content: content.to_string(),
                    aters: None,
                })
                .await
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_gateway_failure_status_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alias-in-chatroom"))
            .and(query_param("wxid", "wxid_a"))
            .and(query_param("roomid", "1@chatroom"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "status": -1, "error": "not in room" })),
            )
            .mount(&server)
            .await;

        let err = client(&server.uri())
            .alias_in_chatroom("wxid_a", "1@chatroom")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not in room"));
    }

    #[tokio::test]
    async fn test_contacts_and_userinfo() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/contacts"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 0,
                "data": [{ "wxid": "wxid_a", "name": "Alice" }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/userinfo"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": 0,
                "data": { "wxid": "wxid_bot", "name": "bot" }
            })))
            .mount(&server)
            .await;

        let gateway = client(&server.uri());
        let contacts = gateway.contacts().await.unwrap();
        assert_eq!(contacts.get("wxid_a").map(String::as_str), Some("Alice"));
        assert_eq!(gateway.self_wxid().await.unwrap(), "wxid_bot");
    }

    #[tokio::test]
    async fn test_callback_enqueues_in_order() {
        let (tx, mut rx) = mpsc::channel(4);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, callback_router(tx, "wxid_bot"))
                .await
                .unwrap();
        });

        let http = reqwest::Client::new();
        for (id, content) in [(1, "第一条"), (2, "第二条")] {
            let reply: Value = http
                .post(format!("http://{}/callback", addr))
                .json(&json!({
                    "is_group": false,
                    "id": id,
                    "type": 1,
                    "content": content,
                    "sender": "wxid_a",
                }))
                .send()
                .await
                .unwrap()
                .json()
                .await
                .unwrap();
            assert_eq!(reply["status"], 0);
        }

        assert_eq!(rx.recv().await.unwrap().content, "第一条");
        assert_eq!(rx.recv().await.unwrap().content, "第二条");
    }
}
