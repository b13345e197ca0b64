use async_trait::async_trait;
use chrono::{ DateTime, Utc };
use futures::{ future, StreamExt };
use log::warn;
use std::sync::{ Mutex, MutexGuard, PoisonError };
use tokio::sync::broadcast;
use tokio_stream::wrappers::{ errors::BroadcastStreamRecvError, BroadcastStream };
use crate::error::StoreError;
use crate::models::chat::{ ChatMessage, MessageId, Sender, StoredMessage };
use crate::store::{ ConversationStore, InsertStream };

const INSERT_CHANNEL_CAPACITY: usize = 256;

/// Process-local store. Ids increase by one per insert and timestamps never go
/// backwards, so insert order and `created_at` order agree.
pub struct MemoryStore {
    inner: Mutex<MemoryInner>,
    inserts: broadcast::Sender<StoredMessage>,
}

struct MemoryInner {
    next_id: MessageId,
    last_created_at: Option<DateTime<Utc>>,
    rows: Vec<StoredMessage>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::starting_at(1)
    }

    pub fn starting_at(first_id: MessageId) -> Self {
        let (inserts, _) = broadcast::channel(INSERT_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(MemoryInner {
                next_id: first_id,
                last_created_at: None,
                rows: Vec::new(),
            }),
            inserts,
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConversationStore for MemoryStore {
    async fn add_message(
        &self,
        user_id: &str,
        sender: Sender,
        content: &str
    ) -> Result<ChatMessage, StoreError> {
        let mut inner = self.lock();
        let created_at = match inner.last_created_at {
            Some(last) => last.max(Utc::now()),
            None => Utc::now(),
        };
        let row = StoredMessage {
            id: inner.next_id,
            user_id: user_id.to_string(),
            sender,
            content: content.to_string(),
            created_at,
        };
        inner.next_id += 1;
        inner.last_created_at = Some(created_at);
        inner.rows.push(row.clone());

        // Published under the lock so subscribers see inserts in id order.
        let _ = self.inserts.send(row.clone());
        Ok(row.into())
    }

    async fn get_conversation(&self, user_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        let inner = self.lock();
        Ok(
            inner.rows
                .iter()
                .filter(|row| row.user_id == user_id)
                .cloned()
                .map(ChatMessage::from)
                .collect()
        )
    }

    async fn subscribe(&self, user_id: &str) -> Result<InsertStream, StoreError> {
        let user_id = user_id.to_string();
        let stream = BroadcastStream::new(self.inserts.subscribe()).filter_map(move |event| {
            let message = match event {
                Ok(row) if row.user_id == user_id => Some(ChatMessage::from(row)),
                Ok(_) => None,
                Err(BroadcastStreamRecvError::Lagged(skipped)) => {
                    warn!("Insert subscription for {} lagged, {} events dropped", user_id, skipped);
                    None
                }
            };
            future::ready(message)
        });
        Ok(Box::pin(stream))
    }
}
