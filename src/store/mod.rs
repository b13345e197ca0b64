mod memory;
mod redis;

pub use self::memory::MemoryStore;
pub use self::redis::RedisStore;

use async_trait::async_trait;
use futures::Stream;
use log::info;
use std::error::Error;
use std::pin::Pin;
use std::sync::Arc;
use crate::cli::Args;
use crate::error::StoreError;
use crate::models::chat::{ ChatMessage, Sender };

/// Insert notifications for one user's messages. Dropping the stream cancels
/// the subscription.
pub type InsertStream = Pin<Box<dyn Stream<Item = ChatMessage> + Send>>;

#[async_trait]
pub trait ConversationStore: Send + Sync {
    /// Appends a message and returns it with the id and timestamp the store assigned.
    async fn add_message(
        &self,
        user_id: &str,
        sender: Sender,
        content: &str
    ) -> Result<ChatMessage, StoreError>;

    /// All messages of `user_id`, oldest first.
    async fn get_conversation(&self, user_id: &str) -> Result<Vec<ChatMessage>, StoreError>;

    async fn subscribe(&self, user_id: &str) -> Result<InsertStream, StoreError>;
}

pub fn create_store(
    args: &Args
) -> Result<Arc<dyn ConversationStore>, Box<dyn Error + Send + Sync>> {
    match args.store_type.to_lowercase().as_str() {
        "memory" => Ok(Arc::new(MemoryStore::new())),
        "redis" => {
            let store = RedisStore::new(args)?;
            Ok(Arc::new(store))
        }
        _ =>
            Err(
                Box::new(
                    std::io::Error::new(
                        std::io::ErrorKind::InvalidInput,
                        format!("Unsupported conversation store type: {}", args.store_type)
                    )
                )
            ),
    }
}

pub fn initialize_store(
    args: &Args
) -> Result<Arc<dyn ConversationStore>, Box<dyn Error + Send + Sync>> {
    if args.store_type.eq_ignore_ascii_case("memory") {
        info!("Conversation will be kept in process memory");
    } else {
        info!("Conversation will be stored in: {} at {}", args.store_type, args.store_host);
    }
    create_store(args)
}

/// Orders by `created_at`, breaking ties by id so equal timestamps keep insert order.
pub fn sort_chronologically(messages: &mut [ChatMessage]) {
    messages.sort_by_key(|m| (m.created_at, m.id));
}
