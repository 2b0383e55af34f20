//! Shared fixtures for the HTTP integration tests
#![allow(dead_code)]

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{HeaderMap, Request, StatusCode};
use axum::Router;
use bytes::Bytes;
use chat_relay_backend::api::{self, AppState};
use chat_relay_backend::chat::{
    ChatDb, ChatStore, Conversation, FixedOwnerResolver, Message, Owner, OwnerResolver,
};
use chat_relay_backend::relay::RelayController;
use chat_relay_backend::upstream::{ByteStream, GenerationClient, GenerationRequest, UpstreamError};
use futures_util::stream;
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tower::ServiceExt;

pub const OWNER_ID: &str = "owner-test";
pub const OWNER_EMAIL: &str = "owner@test.local";

/// Generation client that replays fixed chunks or fails with a status
pub struct ScriptedUpstream {
    chunks: Vec<String>,
    fail_status: Option<u16>,
}

impl ScriptedUpstream {
    pub fn streaming(chunks: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            chunks: chunks.iter().map(|c| c.to_string()).collect(),
            fail_status: None,
        })
    }

    pub fn failing(status: u16) -> Arc<Self> {
        Arc::new(Self {
            chunks: Vec::new(),
            fail_status: Some(status),
        })
    }
}

#[async_trait]
impl GenerationClient for ScriptedUpstream {
    async fn generate(&self, _request: &GenerationRequest) -> Result<ByteStream, UpstreamError> {
        if let Some(status) = self.fail_status {
            return Err(UpstreamError::Status {
                status,
                body: "Traceback (most recent call last): internal detail".to_string(),
            });
        }
        let chunks: Vec<Result<Bytes, UpstreamError>> = self
            .chunks
            .iter()
            .map(|c| Ok(Bytes::from(c.clone())))
            .collect();
        Ok(Box::pin(stream::iter(chunks)))
    }
}

pub struct TestApp {
    pub router: Router,
    pub store: Arc<ChatDb>,
    _temp_dir: TempDir,
}

impl TestApp {
    pub async fn new(upstream: Arc<dyn GenerationClient>) -> Self {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("chat.db");
        let store = Arc::new(
            ChatDb::new(db_path.to_str().unwrap())
                .await
                .expect("Failed to create test database"),
        );
        let owners: Arc<dyn OwnerResolver> = Arc::new(FixedOwnerResolver::new(OWNER_ID, OWNER_EMAIL));
        let controller = RelayController::new(store.clone(), upstream, owners.clone(), 50);
        let router = api::router(AppState::new(controller, store.clone(), owners));

        Self {
            router,
            store,
            _temp_dir: temp_dir,
        }
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, HeaderMap, String) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let body = response.into_body().collect().await.unwrap().to_bytes();
        (status, headers, String::from_utf8(body.to_vec()).unwrap())
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, HeaderMap, String) {
        self.send(Request::get(uri).body(Body::empty()).unwrap()).await
    }

    pub async fn post_json(&self, uri: &str, json: serde_json::Value) -> (StatusCode, HeaderMap, String) {
        self.send(
            Request::post(uri)
                .header("content-type", "application/json")
                .body(Body::from(json.to_string()))
                .unwrap(),
        )
        .await
    }

    /// Store a conversation for the test owner with a fixed creation time
    pub async fn seed_conversation(&self, id: &str, title: &str, created_at: i64) {
        self.seed_conversation_for(OWNER_ID, id, title, created_at).await;
    }

    /// Store a conversation for any owner with a fixed creation time
    pub async fn seed_conversation_for(&self, owner_id: &str, id: &str, title: &str, created_at: i64) {
        self.store
            .ensure_owner_exists(&Owner {
                id: owner_id.to_string(),
                email: format!("{}@test.local", owner_id),
            })
            .await
            .unwrap();
        let mut conversation = Conversation::new(id.to_string(), owner_id.to_string(), title.to_string());
        conversation.created_at = created_at;
        conversation.updated_at = created_at;
        self.store.create_conversation(&conversation).await.unwrap();
    }

    /// Poll until the conversation holds `count` messages; the background branch is detached
    pub async fn wait_for_messages(&self, conversation_id: &str, count: usize) -> Vec<Message> {
        for _ in 0..100 {
            let messages = self.store.get_messages(conversation_id).await.unwrap();
            if messages.len() >= count {
                return messages;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("conversation {} never reached {} messages", conversation_id, count);
    }
}

/// Parse the JSON payloads out of an SSE body, skipping the done frame
pub fn sse_events(body: &str) -> Vec<serde_json::Value> {
    body.split("\n\n")
        .filter_map(|frame| frame.strip_prefix("data: "))
        .filter(|data| *data != "[DONE]")
        .map(|data| serde_json::from_str(data).unwrap())
        .collect()
}
