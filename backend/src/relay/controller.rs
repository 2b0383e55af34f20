//! Relay controller
//!
//! Orchestrates one chat request:
//! 1. Ensures the owner and conversation exist and stores the inbound user message
//! 2. Calls the generation service
//! 3. Splits its stream into a client branch (decode, encode, response body) and
//!    a background branch (decode, accumulate, store the assistant message)
//!
//! The caller gets the response body as soon as the upstream call succeeds. The
//! background branch is never cancelled: it runs to completion even if the
//! client has gone away, so the assistant turn is still recorded.
//!
//! Persistence failures before the upstream call are logged and the request
//! continues unpersisted. Failures in the background branch are logged only;
//! the client already has its answer, so there is no retry.

use crate::chat::{ChatStore, Conversation, Message, MessageRole, Owner, OwnerResolver};
use crate::relay::accumulator::ResponseAccumulator;
use crate::relay::decoder::decode_stream;
use crate::relay::encoder::{pump_to_client, ClientOutcome};
use crate::relay::error::RelayError;
use crate::relay::events::StreamEvent;
use crate::relay::request::RelayRequest;
use crate::relay::splitter::split_stream;
use crate::relay::title::{derive_title, truncate_title, DEFAULT_TITLE};
use crate::upstream::GenerationClient;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Frames buffered between the client branch and the HTTP body
const CLIENT_FRAME_BUFFER: usize = 32;

/// Encoded response body handed to the HTTP layer
pub type ClientBody = ReceiverStream<Result<Bytes, std::io::Error>>;

/// A running relay: the client body plus the two branch tasks
pub struct RelayHandle {
    /// Encoded event frames for the client
    pub body: ClientBody,
    /// Client branch task; ends when all frames are written or the client disconnects
    pub client: JoinHandle<ClientOutcome>,
    /// Background persistence task
    pub background: JoinHandle<BackgroundOutcome>,
}

/// What the background branch stored
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BackgroundOutcome {
    /// Id of the stored assistant message, if one was stored
    pub assistant_message_id: Option<String>,
    /// Length in bytes of the accumulated text
    pub text_len: usize,
    /// Whether the upstream title was applied to the conversation
    pub title_updated: bool,
}

/// How the inbound path left the conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConversationState {
    /// Created by this request
    Created,
    /// Already stored
    Existing,
    /// Could not be read or created; the request runs without persistence
    Unpersisted,
}

/// Runs relay requests against a store, a generation client and an owner resolver
#[derive(Clone)]
pub struct RelayController {
    store: Arc<dyn ChatStore>,
    upstream: Arc<dyn GenerationClient>,
    owners: Arc<dyn OwnerResolver>,
    title_max_chars: usize,
}

impl RelayController {
    /// Create a controller
    ///
    /// # Arguments
    /// * `store` - Persistence gateway
    /// * `upstream` - Generation service client
    /// * `owners` - Resolves the identity requests run as
    /// * `title_max_chars` - Bound for derived and upstream titles
    pub fn new(
        store: Arc<dyn ChatStore>,
        upstream: Arc<dyn GenerationClient>,
        owners: Arc<dyn OwnerResolver>,
        title_max_chars: usize,
    ) -> Self {
        Self {
            store,
            upstream,
            owners,
            title_max_chars,
        }
    }

    /// Handle one chat request
    ///
    /// # Returns
    /// * `Ok(RelayHandle)` - Once the upstream stream is open and both branches are running
    /// * `Err(RelayError)` - If the request is invalid or the upstream call failed
    pub async fn handle_request(&self, request: RelayRequest) -> Result<RelayHandle, RelayError> {
        if request.conversation_id.trim().is_empty() {
            return Err(RelayError::InvalidRequest(
                "conversationId cannot be empty".to_string(),
            ));
        }
        if request.messages.is_empty() {
            return Err(RelayError::InvalidRequest(
                "messages cannot be empty".to_string(),
            ));
        }

        let owner = self.owners.resolve();
        let conversation_id = request.conversation_id.clone();

        info!(
            conversation_id = %conversation_id,
            message_count = request.messages.len(),
            "Relay request received"
        );

        let state = self.persist_inbound(&owner, &request).await;

        let generation = request.to_generation_request(&owner.id);
        let upstream = self.upstream.generate(&generation).await.map_err(|e| {
            error!(
                conversation_id = %conversation_id,
                error = %e,
                "Generation service call failed"
            );
            RelayError::Upstream(e)
        })?;

        info!(conversation_id = %conversation_id, "Upstream stream opened");

        let (client_branch, background_branch) = split_stream(upstream);

        let (sink, body) = mpsc::channel(CLIENT_FRAME_BUFFER);
        let client = tokio::spawn(pump_to_client(decode_stream(client_branch), sink));

        let background = tokio::spawn(persist_response(
            decode_stream(background_branch),
            self.store.clone(),
            conversation_id,
            state == ConversationState::Created,
            self.title_max_chars,
        ));

        Ok(RelayHandle {
            body: ReceiverStream::new(body),
            client,
            background,
        })
    }

    async fn persist_inbound(&self, owner: &Owner, request: &RelayRequest) -> ConversationState {
        let conversation_id = request.conversation_id.as_str();

        if let Err(e) = self.store.ensure_owner_exists(owner).await {
            warn!(owner_id = %owner.id, error = %e, "Failed to ensure owner exists");
        }

        let existing = match self.store.get_conversation(conversation_id).await {
            Ok(existing) => existing,
            Err(e) => {
                warn!(
                    conversation_id = %conversation_id,
                    error = %e,
                    "Failed to look up conversation, continuing without persistence"
                );
                return ConversationState::Unpersisted;
            }
        };

        let state = match existing {
            Some(conversation) => {
                if conversation.owner_id != owner.id {
                    warn!(
                        conversation_id = %conversation_id,
                        "Conversation belongs to a different owner"
                    );
                }
                ConversationState::Existing
            }
            None => {
                let title = request
                    .first_user_message()
                    .map(|m| derive_title(&m.content, self.title_max_chars))
                    .unwrap_or_else(|| DEFAULT_TITLE.to_string());
                let conversation =
                    Conversation::new(conversation_id.to_string(), owner.id.clone(), title);

                match self.store.create_conversation(&conversation).await {
                    Ok(true) => {
                        info!(conversation_id = %conversation_id, title = %conversation.title, "Created conversation");
                        ConversationState::Created
                    }
                    Ok(false) => {
                        debug!(conversation_id = %conversation_id, "Conversation created concurrently");
                        ConversationState::Existing
                    }
                    Err(e) => {
                        warn!(
                            conversation_id = %conversation_id,
                            error = %e,
                            "Failed to create conversation, continuing without persistence"
                        );
                        return ConversationState::Unpersisted;
                    }
                }
            }
        };

        if let Some(inbound) = request.latest_user_message() {
            self.save_user_message(inbound.to_record(conversation_id))
                .await;
        }

        state
    }

    async fn save_user_message(&self, message: Message) {
        match self.store.get_message_by_id(&message.id).await {
            Ok(Some(_)) => {
                debug!(message_id = %message.id, "User message already stored");
                return;
            }
            Ok(None) => {}
            Err(e) => {
                warn!(message_id = %message.id, error = %e, "Failed to look up user message");
                return;
            }
        }

        if let Err(e) = self.store.save_messages(std::slice::from_ref(&message)).await {
            warn!(
                conversation_id = %message.conversation_id,
                message_id = %message.id,
                error = %e,
                "Failed to save user message"
            );
        }
    }
}

/// Drain the background branch and store what it produced
///
/// The assistant message is stored only when the accumulated text is
/// non-empty. The upstream title is applied only to conversations this
/// request created.
pub async fn persist_response<S>(
    events: S,
    store: Arc<dyn ChatStore>,
    conversation_id: String,
    apply_title: bool,
    title_max_chars: usize,
) -> BackgroundOutcome
where
    S: Stream<Item = StreamEvent> + Send,
{
    let mut accumulator = ResponseAccumulator::new();
    futures_util::pin_mut!(events);
    while let Some(event) = events.next().await {
        accumulator.observe(&event);
        if event.is_terminal() {
            break;
        }
    }

    let (text, title) = accumulator.into_parts();
    let mut outcome = BackgroundOutcome {
        text_len: text.len(),
        ..Default::default()
    };

    if text.is_empty() {
        info!(conversation_id = %conversation_id, "Empty response, no assistant message stored");
    } else {
        let message = Message::text(
            Uuid::new_v4().to_string(),
            conversation_id.clone(),
            MessageRole::Assistant,
            text,
        );
        match store.save_messages(std::slice::from_ref(&message)).await {
            Ok(()) => {
                info!(
                    conversation_id = %conversation_id,
                    message_id = %message.id,
                    text_len = outcome.text_len,
                    "Assistant message saved"
                );
                outcome.assistant_message_id = Some(message.id);
            }
            Err(e) => error!(
                conversation_id = %conversation_id,
                error = %e,
                "Failed to save assistant message"
            ),
        }
    }

    if let (true, Some(title)) = (apply_title, title) {
        let title = truncate_title(&title, title_max_chars);
        match store.update_conversation_title(&conversation_id, &title).await {
            Ok(()) => {
                debug!(conversation_id = %conversation_id, title = %title, "Applied upstream title");
                outcome.title_updated = true;
            }
            Err(e) => error!(
                conversation_id = %conversation_id,
                error = %e,
                "Failed to apply upstream title"
            ),
        }
    }

    outcome
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::{
        ChatDb, ConversationPage, FixedOwnerResolver, PageCursor, StoreError,
    };
    use crate::upstream::{ByteStream, GenerationRequest, UpstreamError};
    use async_trait::async_trait;
    use futures_util::stream;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Replays canned chunks and records every request it receives
    struct ScriptedUpstream {
        chunks: Vec<&'static str>,
        fail_status: Option<u16>,
        requests: Mutex<Vec<GenerationRequest>>,
    }

    impl ScriptedUpstream {
        fn streaming(chunks: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                chunks,
                fail_status: None,
                requests: Mutex::new(Vec::new()),
            })
        }

        fn failing(status: u16) -> Arc<Self> {
            Arc::new(Self {
                chunks: Vec::new(),
                fail_status: Some(status),
                requests: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl GenerationClient for ScriptedUpstream {
        async fn generate(&self, request: &GenerationRequest) -> Result<ByteStream, UpstreamError> {
            self.requests.lock().unwrap().push(request.clone());
            if let Some(status) = self.fail_status {
                return Err(UpstreamError::Status {
                    status,
                    body: "secret stack trace".to_string(),
                });
            }
            let chunks: Vec<Result<Bytes, UpstreamError>> = self
                .chunks
                .iter()
                .map(|c| Ok(Bytes::from_static(c.as_bytes())))
                .collect();
            Ok(Box::pin(stream::iter(chunks)))
        }
    }

    /// A store whose every operation fails
    struct BrokenStore;

    fn broken() -> StoreError {
        StoreError::NotFound("store offline".to_string())
    }

    #[async_trait]
    impl ChatStore for BrokenStore {
        async fn ensure_owner_exists(&self, _: &Owner) -> Result<(), StoreError> {
            Err(broken())
        }
        async fn get_conversation(&self, _: &str) -> Result<Option<Conversation>, StoreError> {
            Err(broken())
        }
        async fn create_conversation(&self, _: &Conversation) -> Result<bool, StoreError> {
            Err(broken())
        }
        async fn get_message_by_id(&self, _: &str) -> Result<Option<Message>, StoreError> {
            Err(broken())
        }
        async fn save_messages(&self, _: &[Message]) -> Result<(), StoreError> {
            Err(broken())
        }
        async fn update_conversation_title(&self, _: &str, _: &str) -> Result<(), StoreError> {
            Err(broken())
        }
        async fn get_messages(&self, _: &str) -> Result<Vec<Message>, StoreError> {
            Err(broken())
        }
        async fn list_conversations(
            &self,
            _: &str,
            _: u32,
            _: &PageCursor,
        ) -> Result<ConversationPage, StoreError> {
            Err(broken())
        }
        async fn delete_conversation(&self, _: &str) -> Result<(), StoreError> {
            Err(broken())
        }
    }

    async fn create_test_store() -> (Arc<ChatDb>, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("relay.db");
        let db = ChatDb::new(db_path.to_str().unwrap())
            .await
            .expect("Failed to create test database");
        (Arc::new(db), temp_dir)
    }

    fn controller(store: Arc<dyn ChatStore>, upstream: Arc<dyn GenerationClient>) -> RelayController {
        RelayController::new(
            store,
            upstream,
            Arc::new(FixedOwnerResolver::new("owner-1", "owner@example.com")),
            50,
        )
    }

    fn request(conversation_id: &str, message_id: &str, content: &str) -> RelayRequest {
        serde_json::from_value(serde_json::json!({
            "conversationId": conversation_id,
            "messages": [{"id": message_id, "role": "user", "content": content}]
        }))
        .unwrap()
    }

    async fn read_body(body: ClientBody) -> String {
        let frames: Vec<_> = body.collect().await;
        frames
            .into_iter()
            .map(|f| String::from_utf8(f.unwrap().to_vec()).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_new_conversation_full_flow() {
        let (store, _temp_dir) = create_test_store().await;
        let upstream = ScriptedUpstream::streaming(vec![
            "0:\"Hel",
            "lo\"\n0:\" world\"\nt:\"Greetings\"\n",
            "d:{}\n",
        ]);
        let relay = controller(store.clone(), upstream.clone());

        let handle = relay
            .handle_request(request("conv-1", "msg-1", "Say hello. Please."))
            .await
            .unwrap();

        let body = read_body(handle.body).await;
        assert!(body.contains("\"type\":\"text-start\""));
        assert!(body.contains("\"delta\":\"Hello\""));
        assert!(body.contains("\"delta\":\" world\""));
        assert!(body.contains("\"type\":\"data-title\""));
        assert!(body.ends_with("data: {\"type\":\"finish\"}\n\ndata: [DONE]\n\n"));

        let outcome = handle.background.await.unwrap();
        assert_eq!(outcome.text_len, "Hello world".len());
        assert!(outcome.title_updated);

        let conversation = store.get_conversation("conv-1").await.unwrap().unwrap();
        assert_eq!(conversation.title, "Greetings");
        assert_eq!(conversation.owner_id, "owner-1");

        let messages = store.get_messages("conv-1").await.unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].id, "msg-1");
        assert_eq!(messages[0].role, MessageRole::User);
        assert_eq!(messages[1].role, MessageRole::Assistant);
        assert_eq!(messages[1].text_content(), "Hello world");
        assert_eq!(Some(messages[1].id.clone()), outcome.assistant_message_id);

        let sent = upstream.requests.lock().unwrap();
        assert_eq!(sent[0].conversation_id, "conv-1");
        assert_eq!(sent[0].owner_id, "owner-1");
    }

    #[tokio::test]
    async fn test_derived_title_without_upstream_title() {
        let (store, _temp_dir) = create_test_store().await;
        let upstream = ScriptedUpstream::streaming(vec!["0:\"Sure\"\n"]);
        let relay = controller(store.clone(), upstream);

        let handle = relay
            .handle_request(request("conv-2", "msg-1", "Plan my week. I have three meetings."))
            .await
            .unwrap();
        let outcome = handle.background.await.unwrap();

        assert!(!outcome.title_updated);
        let conversation = store.get_conversation("conv-2").await.unwrap().unwrap();
        assert_eq!(conversation.title, "Plan my week.");
    }

    #[tokio::test]
    async fn test_retry_with_same_message_id_is_idempotent() {
        let (store, _temp_dir) = create_test_store().await;
        let upstream = ScriptedUpstream::streaming(vec!["0:\"Answer\"\n"]);
        let relay = controller(store.clone(), upstream);

        for _ in 0..2 {
            let handle = relay
                .handle_request(request("conv-3", "msg-1", "Question"))
                .await
                .unwrap();
            handle.background.await.unwrap();
        }

        let messages = store.get_messages("conv-3").await.unwrap();
        let user_copies = messages.iter().filter(|m| m.id == "msg-1").count();
        assert_eq!(user_copies, 1);
        assert_eq!(
            messages.iter().filter(|m| m.role == MessageRole::Assistant).count(),
            2
        );
    }

    #[tokio::test]
    async fn test_title_not_applied_to_existing_conversation() {
        let (store, _temp_dir) = create_test_store().await;
        let relay = controller(
            store.clone(),
            ScriptedUpstream::streaming(vec!["0:\"One\"\n"]),
        );
        let first = relay
            .handle_request(request("conv-4", "msg-1", "First question"))
            .await
            .unwrap();
        first.background.await.unwrap();

        let relay = controller(
            store.clone(),
            ScriptedUpstream::streaming(vec!["t:\"Replacement\"\n0:\"Two\"\n"]),
        );
        let second = relay
            .handle_request(request("conv-4", "msg-2", "Second question"))
            .await
            .unwrap();
        let outcome = second.background.await.unwrap();

        assert!(!outcome.title_updated);
        let conversation = store.get_conversation("conv-4").await.unwrap().unwrap();
        assert_eq!(conversation.title, "First question");
        assert_eq!(store.get_messages("conv-4").await.unwrap().len(), 4);
    }

    #[tokio::test]
    async fn test_upstream_failure_persists_no_assistant_message() {
        let (store, _temp_dir) = create_test_store().await;
        let relay = controller(store.clone(), ScriptedUpstream::failing(502));

        let result = relay
            .handle_request(request("conv-5", "msg-1", "Hello"))
            .await;
        assert!(matches!(
            result,
            Err(RelayError::Upstream(UpstreamError::Status { status: 502, .. }))
        ));

        let messages = store.get_messages("conv-5").await.unwrap();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, MessageRole::User);
    }

    #[tokio::test]
    async fn test_empty_response_stores_nothing() {
        let (store, _temp_dir) = create_test_store().await;
        let relay = controller(
            store.clone(),
            ScriptedUpstream::streaming(vec!["0:null\n0:\"\"\nd:{}\n"]),
        );

        let handle = relay
            .handle_request(request("conv-6", "msg-1", "Hello"))
            .await
            .unwrap();
        let outcome = handle.background.await.unwrap();

        assert_eq!(outcome, BackgroundOutcome::default());
        assert_eq!(store.get_messages("conv-6").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_client_disconnect_does_not_stop_background() {
        let (store, _temp_dir) = create_test_store().await;
        let relay = controller(
            store.clone(),
            ScriptedUpstream::streaming(vec!["0:\"a\"\n", "0:\"b\"\n", "0:\"c\"\n"]),
        );

        let handle = relay
            .handle_request(request("conv-7", "msg-1", "Hello"))
            .await
            .unwrap();
        drop(handle.body);

        let outcome = handle.background.await.unwrap();
        assert_eq!(outcome.text_len, 3);
        let client = handle.client.await.unwrap();
        assert!(matches!(client, ClientOutcome::Disconnected { .. }));

        let messages = store.get_messages("conv-7").await.unwrap();
        assert_eq!(messages[1].text_content(), "abc");
    }

    #[tokio::test]
    async fn test_broken_store_degrades_but_streams() {
        let relay = controller(
            Arc::new(BrokenStore),
            ScriptedUpstream::streaming(vec!["0:\"still here\"\n"]),
        );

        let handle = relay
            .handle_request(request("conv-8", "msg-1", "Hello"))
            .await
            .unwrap();
        let body = read_body(handle.body).await;
        assert!(body.contains("still here"));

        let outcome = handle.background.await.unwrap();
        assert_eq!(outcome.assistant_message_id, None);
        assert_eq!(outcome.text_len, "still here".len());
    }

    #[tokio::test]
    async fn test_invalid_requests_rejected_before_upstream() {
        let (store, _temp_dir) = create_test_store().await;
        let upstream = ScriptedUpstream::streaming(vec!["0:\"x\"\n"]);
        let relay = controller(store, upstream.clone());

        let empty: RelayRequest =
            serde_json::from_str(r#"{"conversationId": "c", "messages": []}"#).unwrap();
        assert!(matches!(
            relay.handle_request(empty).await,
            Err(RelayError::InvalidRequest(_))
        ));

        let no_id = request("  ", "m", "Hello");
        assert!(matches!(
            relay.handle_request(no_id).await,
            Err(RelayError::InvalidRequest(_))
        ));

        assert!(upstream.requests.lock().unwrap().is_empty());
    }

    /// Delegates to a real store but never reports an existing conversation,
    /// as when another request creates it between lookup and insert
    struct LateLookupStore(Arc<ChatDb>);

    #[async_trait]
    impl ChatStore for LateLookupStore {
        async fn ensure_owner_exists(&self, owner: &Owner) -> Result<(), StoreError> {
            self.0.ensure_owner_exists(owner).await
        }
        async fn get_conversation(&self, _: &str) -> Result<Option<Conversation>, StoreError> {
            Ok(None)
        }
        async fn create_conversation(&self, conversation: &Conversation) -> Result<bool, StoreError> {
            self.0.create_conversation(conversation).await
        }
        async fn get_message_by_id(&self, id: &str) -> Result<Option<Message>, StoreError> {
            self.0.get_message_by_id(id).await
        }
        async fn save_messages(&self, messages: &[Message]) -> Result<(), StoreError> {
            self.0.save_messages(messages).await
        }
        async fn update_conversation_title(&self, id: &str, title: &str) -> Result<(), StoreError> {
            self.0.update_conversation_title(id, title).await
        }
        async fn get_messages(&self, conversation_id: &str) -> Result<Vec<Message>, StoreError> {
            self.0.get_messages(conversation_id).await
        }
        async fn list_conversations(
            &self,
            owner_id: &str,
            limit: u32,
            cursor: &PageCursor,
        ) -> Result<ConversationPage, StoreError> {
            self.0.list_conversations(owner_id, limit, cursor).await
        }
        async fn delete_conversation(&self, id: &str) -> Result<(), StoreError> {
            self.0.delete_conversation(id).await
        }
    }

    #[tokio::test]
    async fn test_losing_concurrent_create_keeps_winner_title() {
        let (store, _temp_dir) = create_test_store().await;
        let relay = controller(
            store.clone(),
            ScriptedUpstream::streaming(vec!["t:\"Winner\"\n0:\"First\"\n"]),
        );
        relay
            .handle_request(request("conv-9", "msg-1", "Opening question"))
            .await
            .unwrap()
            .background
            .await
            .unwrap();

        let racing = controller(
            Arc::new(LateLookupStore(store.clone())),
            ScriptedUpstream::streaming(vec!["t:\"Loser\"\n0:\"Second\"\n"]),
        );
        let outcome = racing
            .handle_request(request("conv-9", "msg-2", "Same conversation"))
            .await
            .unwrap()
            .background
            .await
            .unwrap();

        assert!(!outcome.title_updated);
        let conversation = store.get_conversation("conv-9").await.unwrap().unwrap();
        assert_eq!(conversation.title, "Winner");
        assert_eq!(store.get_messages("conv-9").await.unwrap().len(), 4);
    }
}
