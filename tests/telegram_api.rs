//! Bot API client and update listener against a wiremock server.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::json;
use tokio::sync::Notify;
use tokio::time::timeout;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use event_relay::channels::commands::REPLY_STARTED;
use event_relay::channels::{TelegramBot, UpdateListener};
use event_relay::error::DatabaseError;
use event_relay::poller::{Delivery, OffsetStore, RecipientStore};
use event_relay::store::{ChannelPost, Database, LibSqlBackend};

const TOKEN: &str = "TEST_TOKEN";

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(10);

fn bot(server: &MockServer) -> TelegramBot {
    TelegramBot::new(SecretString::from(TOKEN), server.uri())
}

fn api_path(method_name: &str) -> String {
    format!("/bot{TOKEN}/{method_name}")
}

fn ok(result: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({"ok": true, "result": result}))
}

fn unauthorized() -> ResponseTemplate {
    ResponseTemplate::new(401).set_body_json(json!({
        "ok": false,
        "error_code": 401,
        "description": "Unauthorized"
    }))
}

/// Inbox whose first `fail_first` inserts fail, as a locked database would.
struct FlakyInbox {
    fail_first: usize,
    attempts: Mutex<usize>,
    posts: Mutex<Vec<ChannelPost>>,
}

impl FlakyInbox {
    fn new(fail_first: usize) -> Self {
        Self {
            fail_first,
            attempts: Mutex::new(0),
            posts: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl OffsetStore for FlakyInbox {
    async fn get_last_id(&self, _source: &str) -> Result<i64, DatabaseError> {
        Ok(0)
    }

    async fn set_last_id(&self, _source: &str, _last_id: i64) -> Result<(), DatabaseError> {
        Ok(())
    }
}

#[async_trait]
impl RecipientStore for FlakyInbox {
    async fn list_active_recipients(&self) -> Result<Vec<i64>, DatabaseError> {
        Ok(Vec::new())
    }
}

#[async_trait]
impl Database for FlakyInbox {
    async fn init_schema(&self) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn set_subscription(&self, _chat_id: i64, _enabled: bool) -> Result<(), DatabaseError> {
        Ok(())
    }

    async fn is_subscribed(&self, _chat_id: i64) -> Result<bool, DatabaseError> {
        Ok(false)
    }

    async fn insert_channel_post(&self, post: &ChannelPost) -> Result<bool, DatabaseError> {
        let mut attempts = self.attempts.lock().unwrap();
        *attempts += 1;
        if *attempts <= self.fail_first {
            return Err(DatabaseError::Query("database is locked".into()));
        }
        self.posts.lock().unwrap().push(post.clone());
        Ok(true)
    }

    async fn list_channel_posts(
        &self,
        _source: &str,
        _since_id: i64,
    ) -> Result<Vec<ChannelPost>, DatabaseError> {
        Ok(self.posts.lock().unwrap().clone())
    }

    async fn prune_channel_posts(
        &self,
        _source: &str,
        _through_id: i64,
    ) -> Result<usize, DatabaseError> {
        Ok(0)
    }
}

/// Offsets the listener sent to `getUpdates`, in order.
async fn requested_offsets(server: &MockServer) -> Vec<i64> {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|req| req.url.path() == api_path("getUpdates"))
        .filter_map(|req| req.body_json::<serde_json::Value>().ok())
        .filter_map(|body| body["offset"].as_i64())
        .collect()
}

#[tokio::test]
async fn get_me_returns_identity() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("getMe")))
        .respond_with(ok(json!({
            "id": 777,
            "is_bot": true,
            "first_name": "Relay",
            "username": "event_relay_bot"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let me = bot(&server).get_me().await.unwrap();
    assert_eq!(me.id, 777);
    assert_eq!(me.username.as_deref(), Some("event_relay_bot"));
}

#[tokio::test]
async fn unauthorized_maps_to_auth_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("getMe")))
        .respond_with(unauthorized())
        .mount(&server)
        .await;

    let err = bot(&server).get_me().await.unwrap_err();
    assert!(err.is_auth_failure(), "{err}");
}

#[tokio::test]
async fn send_message_is_plain_text_without_previews() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("sendMessage")))
        .and(body_partial_json(json!({
            "chat_id": 42,
            "text": "Забег в Москве",
            "disable_web_page_preview": true
        })))
        .respond_with(ok(json!({"message_id": 1})))
        .expect(1)
        .mount(&server)
        .await;

    bot(&server).deliver(42, "Забег в Москве").await.unwrap();
}

#[tokio::test]
async fn long_messages_are_split() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("sendMessage")))
        .respond_with(ok(json!({"message_id": 1})))
        .expect(2)
        .mount(&server)
        .await;

    let text = format!("{}\n{}", "а".repeat(3000), "б".repeat(3000));
    bot(&server).send_message(42, &text).await.unwrap();
}

#[tokio::test]
async fn api_error_is_a_send_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("sendMessage")))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "ok": false,
            "error_code": 400,
            "description": "Bad Request: chat not found"
        })))
        .mount(&server)
        .await;

    let err = bot(&server).send_message(42, "hi").await.unwrap_err();
    assert!(!err.is_auth_failure());
    assert!(err.to_string().contains("chat not found"), "{err}");
}

#[tokio::test]
async fn get_updates_returns_raw_updates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("getUpdates")))
        .and(body_partial_json(json!({"offset": 5, "timeout": 0})))
        .respond_with(ok(json!([
            {"update_id": 5, "message": {"message_id": 1, "chat": {"id": 42}, "text": "/status"}}
        ])))
        .mount(&server)
        .await;

    let updates = bot(&server).get_updates(5, 0).await.unwrap();
    assert_eq!(updates.len(), 1);
    assert_eq!(updates[0]["update_id"], 5);
}

#[tokio::test]
async fn listener_captures_posts_handles_commands_and_stops_on_401() {
    let server = MockServer::start().await;

    // First poll: one channel post and one /start command.
    Mock::given(method("POST"))
        .and(path(api_path("getUpdates")))
        .respond_with(ok(json!([
            {
                "update_id": 100,
                "channel_post": {
                    "message_id": 9,
                    "date": 1714566600,
                    "chat": {"id": -1001234, "type": "channel", "username": "Moscow_Runs", "title": "Забеги"},
                    "text": "Забег в Москве"
                }
            },
            {
                "update_id": 101,
                "message": {"message_id": 3, "chat": {"id": 42, "type": "private"}, "text": "/start"}
            }
        ])))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    // Every later poll: the token has been revoked.
    Mock::given(method("POST"))
        .and(path(api_path("getUpdates")))
        .respond_with(unauthorized())
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(api_path("sendMessage")))
        .and(body_partial_json(json!({"chat_id": 42, "text": REPLY_STARTED})))
        .respond_with(ok(json!({"message_id": 4})))
        .expect(1)
        .mount(&server)
        .await;

    let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let revoked = Arc::new(AtomicBool::new(false));
    let listener = UpdateListener::new(
        Arc::new(bot(&server)),
        db.clone(),
        Arc::new(Notify::new()),
        revoked.clone(),
    );

    let err = timeout(TEST_TIMEOUT, listener.run())
        .await
        .expect("listener should stop on 401")
        .unwrap_err();

    assert!(err.is_auth_failure());
    assert!(revoked.load(Ordering::SeqCst));
    assert!(db.is_subscribed(42).await.unwrap());

    let posts = db.list_channel_posts("moscow_runs", 0).await.unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].message_id, 9);
    assert_eq!(posts[0].text, "Забег в Москве");
}

#[tokio::test]
async fn update_is_not_confirmed_until_its_post_is_stored() {
    let server = MockServer::start().await;
    let update = json!([{
        "update_id": 100,
        "channel_post": {
            "message_id": 9,
            "date": 1714566600,
            "chat": {"id": -1001234, "type": "channel", "username": "moscow_runs"},
            "text": "Забег в Москве"
        }
    }]);

    // Telegram redelivers update 100 until an offset past it is requested.
    for offset in [0, 100] {
        Mock::given(method("POST"))
            .and(path(api_path("getUpdates")))
            .and(body_partial_json(json!({"offset": offset})))
            .respond_with(ok(update.clone()))
            .mount(&server)
            .await;
    }
    Mock::given(method("POST"))
        .and(path(api_path("getUpdates")))
        .and(body_partial_json(json!({"offset": 101})))
        .respond_with(unauthorized())
        .mount(&server)
        .await;

    let db = Arc::new(FlakyInbox::new(1));
    let listener = UpdateListener::new(
        Arc::new(bot(&server)),
        db.clone(),
        Arc::new(Notify::new()),
        Arc::new(AtomicBool::new(false)),
    )
    .with_retry_delay(Duration::from_millis(10));

    let err = timeout(TEST_TIMEOUT, listener.run())
        .await
        .expect("listener should stop on 401")
        .unwrap_err();
    assert!(err.is_auth_failure());

    assert_eq!(requested_offsets(&server).await, vec![0, 100, 101]);
    assert_eq!(*db.attempts.lock().unwrap(), 2);
    let posts = db.posts.lock().unwrap();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].message_id, 9);
}

#[tokio::test]
async fn channel_admin_can_subscribe_the_channel() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(api_path("getUpdates")))
        .and(body_partial_json(json!({"offset": 0})))
        .respond_with(ok(json!([{
            "update_id": 200,
            "channel_post": {
                "message_id": 12,
                "chat": {"id": -1005555, "type": "channel", "username": "trail_news"},
                "text": "/start"
            }
        }])))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("getUpdates")))
        .and(body_partial_json(json!({"offset": 201})))
        .respond_with(unauthorized())
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path(api_path("sendMessage")))
        .and(body_partial_json(json!({"chat_id": -1005555, "text": REPLY_STARTED})))
        .respond_with(ok(json!({"message_id": 13})))
        .expect(1)
        .mount(&server)
        .await;

    let db = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let listener = UpdateListener::new(
        Arc::new(bot(&server)),
        db.clone(),
        Arc::new(Notify::new()),
        Arc::new(AtomicBool::new(false)),
    );

    timeout(TEST_TIMEOUT, listener.run())
        .await
        .expect("listener should stop on 401")
        .unwrap_err();

    assert!(db.is_subscribed(-1005555).await.unwrap());
    assert!(db.list_channel_posts("trail_news", 0).await.unwrap().is_empty());
}
