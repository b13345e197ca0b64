//! Conversation synchronizer.
//!
//! Keeps one user's timeline consistent with the shared store. A message only
//! enters the timeline when the store's insert subscription delivers it; `send`
//! never appends locally, so every logical message is shown once no matter
//! how many synchronizers observe the same store.

pub mod timeline;

pub use self::timeline::Timeline;

use futures::StreamExt;
use log::{ debug, error, info, warn };
use std::sync::{ Arc, Mutex, MutexGuard, PoisonError };
use tokio::sync::watch;
use tokio::task::JoinHandle;
use crate::gateway::{ ChatGateway, CONNECTION_FAILURE_TEXT };
use crate::models::chat::{ ChatMessage, Sender };
use crate::session::SessionContext;
use crate::store::{ ConversationStore, InsertStream };

/// Snapshot published to front-ends after every change.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SyncView {
    pub messages: Vec<ChatMessage>,
    pub loading: bool,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IgnoreReason {
    EmptyInput,
    Unauthenticated,
    /// The synchronizer has been shut down.
    Closed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SendOutcome {
    /// Nothing was written.
    Ignored(IgnoreReason),
    /// The user's message could not be stored; the gateway was not called.
    NotPersisted,
    /// The gateway answered and the answer was stored.
    Replied,
    /// The gateway failed and the failure notice was stored.
    GatewayFailed,
    /// The assistant turn (answer or failure notice) could not be stored.
    ReplyNotPersisted,
}

struct SyncState {
    timeline: Timeline,
    in_flight: usize,
    draft: String,
    closed: bool,
    subscription: Option<JoinHandle<()>>,
}

impl SyncState {
    fn view(&self) -> SyncView {
        SyncView {
            messages: self.timeline.messages().to_vec(),
            loading: self.in_flight > 0,
        }
    }
}

struct Shared {
    state: Mutex<SyncState>,
    view: watch::Sender<SyncView>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, SyncState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs `f` on the state and republishes the view. After teardown the
    /// view is frozen.
    fn update<R>(&self, f: impl FnOnce(&mut SyncState) -> R) -> R {
        let mut state = self.lock();
        let result = f(&mut state);
        if !state.closed {
            self.view.send_replace(state.view());
        }
        result
    }

    /// Returns false once the synchronizer has been torn down.
    fn apply_insert(&self, message: ChatMessage) -> bool {
        let mut state = self.lock();
        if state.closed {
            return false;
        }
        let id = message.id;
        if state.timeline.apply(message) {
            self.view.send_replace(state.view());
        } else {
            debug!("Ignoring duplicate insert {:?}", id);
        }
        true
    }
}

/// Holds the loading flag up for as long as it lives, including when the
/// owning future is dropped mid-call.
struct LoadingGuard<'a> {
    shared: &'a Shared,
}

impl<'a> LoadingGuard<'a> {
    fn begin(shared: &'a Shared) -> Self {
        shared.update(|state| {
            state.in_flight += 1;
        });
        Self { shared }
    }
}

impl Drop for LoadingGuard<'_> {
    fn drop(&mut self) {
        self.shared.update(|state| {
            state.in_flight = state.in_flight.saturating_sub(1);
        });
    }
}

pub struct ConversationSynchronizer {
    store: Arc<dyn ConversationStore>,
    gateway: Arc<dyn ChatGateway>,
    session: Arc<dyn SessionContext>,
    shared: Arc<Shared>,
}

impl ConversationSynchronizer {
    /// Subscribes to the user's inserts, loads the stored conversation and
    /// starts applying insert events. Store failures are logged and leave the
    /// timeline empty; sending still works.
    pub async fn start(
        store: Arc<dyn ConversationStore>,
        gateway: Arc<dyn ChatGateway>,
        session: Arc<dyn SessionContext>
    ) -> Self {
        let (view, _) = watch::channel(SyncView::default());
        let shared = Arc::new(Shared {
            state: Mutex::new(SyncState {
                timeline: Timeline::default(),
                in_flight: 0,
                draft: String::new(),
                closed: false,
                subscription: None,
            }),
            view,
        });

        match session.user_id() {
            Some(user_id) => {
                // Subscribe before fetching so nothing inserted in between is
                // missed; the overlap is deduplicated by id.
                let inserts = match store.subscribe(&user_id).await {
                    Ok(stream) => Some(stream),
                    Err(e) => {
                        error!("Failed to subscribe to inserts for {}: {}", user_id, e);
                        None
                    }
                };

                let timeline = match store.get_conversation(&user_id).await {
                    Ok(history) => {
                        info!("Loaded {} stored messages for {}", history.len(), user_id);
                        Timeline::from_history(history)
                    }
                    Err(e) => {
                        error!("Error fetching messages for {}: {}", user_id, e);
                        Timeline::default()
                    }
                };

                shared.update(|state| state.timeline = timeline);
                if let Some(stream) = inserts {
                    let handle = tokio::spawn(apply_inserts(stream, Arc::clone(&shared), user_id));
                    shared.lock().subscription = Some(handle);
                }
            }
            None => {
                warn!("No authenticated user; conversation will not be loaded");
            }
        }

        Self {
            store,
            gateway,
            session,
            shared,
        }
    }

    pub async fn send(&self, text: &str) -> SendOutcome {
        if text.trim().is_empty() {
            return SendOutcome::Ignored(IgnoreReason::EmptyInput);
        }
        if !self.is_active() {
            warn!("Ignoring message: synchronizer is shut down");
            return SendOutcome::Ignored(IgnoreReason::Closed);
        }
        let Some(user_id) = self.session.user_id() else {
            warn!("Ignoring message: no authenticated user");
            return SendOutcome::Ignored(IgnoreReason::Unauthenticated);
        };

        self.shared.update(|state| state.draft.clear());

        if let Err(e) = self.store.add_message(&user_id, Sender::User, text).await {
            error!("Failed to store user message: {}", e);
            self.shared.update(|state| {
                if state.draft.is_empty() {
                    state.draft = text.to_string();
                }
            });
            return SendOutcome::NotPersisted;
        }

        let _loading = LoadingGuard::begin(&self.shared);
        let (content, answered) = match self.gateway.chat(text).await {
            Ok(response) => (response, true),
            Err(e) => {
                error!("Failed to fetch chat response: {}", e);
                (CONNECTION_FAILURE_TEXT.to_string(), false)
            }
        };

        match self.store.add_message(&user_id, Sender::Assistant, &content).await {
            Ok(_) if answered => SendOutcome::Replied,
            Ok(_) => SendOutcome::GatewayFailed,
            Err(e) => {
                error!("Failed to store assistant message: {}", e);
                SendOutcome::ReplyNotPersisted
            }
        }
    }

    /// Sends the current draft.
    pub async fn submit(&self) -> SendOutcome {
        let text = self.draft();
        self.send(&text).await
    }

    pub fn set_draft(&self, text: impl Into<String>) {
        let text = text.into();
        self.shared.update(|state| state.draft = text);
    }

    pub fn draft(&self) -> String {
        self.shared.lock().draft.clone()
    }

    pub fn timeline(&self) -> Vec<ChatMessage> {
        self.shared.lock().timeline.messages().to_vec()
    }

    pub fn is_loading(&self) -> bool {
        self.shared.lock().in_flight > 0
    }

    pub fn is_active(&self) -> bool {
        !self.shared.lock().closed
    }

    pub fn watch(&self) -> watch::Receiver<SyncView> {
        self.shared.view.subscribe()
    }

    /// Cancels the insert subscription. Later calls are no-ops.
    pub fn shutdown(&self) {
        let subscription = {
            let mut state = self.shared.lock();
            if state.closed {
                return;
            }
            state.closed = true;
            state.subscription.take()
        };
        if let Some(handle) = subscription {
            handle.abort();
        }
        info!("Conversation synchronizer stopped");
    }
}

impl Drop for ConversationSynchronizer {
    fn drop(&mut self) {
        self.shutdown();
    }
}

async fn apply_inserts(mut inserts: InsertStream, shared: Arc<Shared>, user_id: String) {
    debug!("Insert subscription started for {}", user_id);
    while let Some(message) = inserts.next().await {
        if !shared.apply_insert(message) {
            break;
        }
    }
    debug!("Insert subscription ended for {}", user_id);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::GatewayError;
    use crate::session::StaticSession;
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::time::Duration;

    struct CannedGateway(Option<&'static str>);

    #[async_trait]
    impl ChatGateway for CannedGateway {
        async fn chat(&self, _query: &str) -> Result<String, GatewayError> {
            self.0
                .map(str::to_string)
                .ok_or_else(|| GatewayError::Malformed("no reply".into()))
        }
    }

    async fn start(store: Arc<MemoryStore>, reply: Option<&'static str>) -> ConversationSynchronizer {
        ConversationSynchronizer::start(
            store,
            Arc::new(CannedGateway(reply)),
            Arc::new(StaticSession::authenticated("u1"))
        ).await
    }

    async fn wait_for_len(sync: &ConversationSynchronizer, len: usize) -> SyncView {
        let mut rx = sync.watch();
        let view = tokio::time
            ::timeout(Duration::from_secs(2), rx.wait_for(|view| view.messages.len() >= len)).await
            .expect("timeline did not fill in time")
            .expect("view channel closed")
            .clone();
        view
    }

    #[tokio::test]
    async fn reply_reaches_timeline_through_subscription() {
        let store = Arc::new(MemoryStore::starting_at(42));
        let sync = start(Arc::clone(&store), Some("Likely a loose gas cap")).await;

        assert_eq!(sync.send("check engine light?").await, SendOutcome::Replied);
        let view = wait_for_len(&sync, 2).await;

        assert!(!view.loading);
        assert_eq!(view.messages[0].id, Some(42));
        assert_eq!(view.messages[0].sender, Sender::User);
        assert_eq!(view.messages[1].id, Some(43));
        assert_eq!(view.messages[1].content, "Likely a loose gas cap");
    }

    #[tokio::test]
    async fn gateway_failure_is_persisted_as_assistant_turn() {
        let store = Arc::new(MemoryStore::new());
        let sync = start(Arc::clone(&store), None).await;

        assert_eq!(sync.send("hello").await, SendOutcome::GatewayFailed);
        let view = wait_for_len(&sync, 2).await;

        assert_eq!(view.messages[1].sender, Sender::Assistant);
        assert_eq!(view.messages[1].content, CONNECTION_FAILURE_TEXT);
        assert!(!sync.is_loading());
    }

    #[tokio::test]
    async fn startup_loads_existing_history() {
        let store = Arc::new(MemoryStore::new());
        store.add_message("u1", Sender::User, "earlier").await.unwrap();
        store.add_message("u2", Sender::User, "someone else").await.unwrap();

        let sync = start(Arc::clone(&store), Some("ok")).await;
        let timeline = sync.timeline();
        assert_eq!(timeline.len(), 1);
        assert_eq!(timeline[0].content, "earlier");
    }

    #[tokio::test]
    async fn whitespace_is_ignored_and_draft_kept() {
        let store = Arc::new(MemoryStore::new());
        let sync = start(Arc::clone(&store), Some("ok")).await;

        sync.set_draft("   ");
        assert_eq!(sync.submit().await, SendOutcome::Ignored(IgnoreReason::EmptyInput));
        assert_eq!(sync.draft(), "   ");
        assert!(store.get_conversation("u1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn submit_clears_draft() {
        let store = Arc::new(MemoryStore::new());
        let sync = start(Arc::clone(&store), Some("ok")).await;

        sync.set_draft("brakes squeal");
        assert_eq!(sync.submit().await, SendOutcome::Replied);
        assert_eq!(sync.draft(), "");
    }

    #[tokio::test]
    async fn shutdown_freezes_the_timeline() {
        let store = Arc::new(MemoryStore::new());
        let sync = start(Arc::clone(&store), Some("ok")).await;

        sync.shutdown();
        sync.shutdown();
        assert!(!sync.is_active());

        store.add_message("u1", Sender::User, "after teardown").await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(sync.timeline().is_empty());
    }

    #[tokio::test]
    async fn send_after_shutdown_writes_nothing() {
        let store = Arc::new(MemoryStore::new());
        let sync = start(Arc::clone(&store), Some("ok")).await;

        sync.shutdown();
        sync.set_draft("still there?");
        assert_eq!(sync.submit().await, SendOutcome::Ignored(IgnoreReason::Closed));
        assert_eq!(sync.draft(), "still there?");
        assert!(store.get_conversation("u1").await.unwrap().is_empty());
    }
}
