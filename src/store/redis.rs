use async_trait::async_trait;
use chrono::Utc;
use futures::{ future, StreamExt };
use log::error;
use redis::{ AsyncCommands, Client };
use crate::cli::Args;
use crate::error::StoreError;
use crate::models::chat::{ ChatMessage, MessageId, Sender, StoredMessage };
use crate::store::{ sort_chronologically, ConversationStore, InsertStream };

/// Messages live in one JSON list per user; every insert is also published on
/// a per-user channel, which is what subscriptions listen to.
pub struct RedisStore {
    client: Client,
    key_prefix: String,
}

impl RedisStore {
    pub fn new(args: &Args) -> Result<Self, StoreError> {
        Ok(Self {
            client: Client::open(args.store_host.as_str())?,
            key_prefix: args.store_redis_prefix.clone(),
        })
    }

    async fn get_connection(&self) -> Result<redis::aio::MultiplexedConnection, redis::RedisError> {
        self.client.get_multiplexed_async_connection().await
    }

    fn rows_key(&self, user_id: &str) -> String {
        format!("{}{}", self.key_prefix, user_id)
    }

    fn channel(&self, user_id: &str) -> String {
        format!("{}{}:inserts", self.key_prefix, user_id)
    }

    fn id_counter_key(&self) -> String {
        format!("{}next_id", self.key_prefix)
    }
}

fn decode_row(json_entry: &str) -> Option<StoredMessage> {
    match serde_json::from_str::<StoredMessage>(json_entry) {
        Ok(row) => Some(row),
        Err(e) => {
            error!("Error parsing stored message: {}", e);
            None
        }
    }
}

#[async_trait]
impl ConversationStore for RedisStore {
    async fn add_message(
        &self,
        user_id: &str,
        sender: Sender,
        content: &str
    ) -> Result<ChatMessage, StoreError> {
        let mut conn = self.get_connection().await?;
        let id: MessageId = conn.incr(self.id_counter_key(), 1).await?;

        let row = StoredMessage {
            id,
            user_id: user_id.to_string(),
            sender,
            content: content.to_string(),
            created_at: Utc::now(),
        };
        let json_row = serde_json::to_string(&row)?;

        redis
            ::pipe()
            .atomic()
            .rpush(self.rows_key(user_id), &json_row)
            .ignore()
            .publish(self.channel(user_id), &json_row)
            .ignore()
            .query_async::<_, ()>(&mut conn).await?;

        Ok(row.into())
    }

    async fn get_conversation(&self, user_id: &str) -> Result<Vec<ChatMessage>, StoreError> {
        let mut conn = self.get_connection().await?;
        let json_entries: Vec<String> = conn.lrange(self.rows_key(user_id), 0, -1).await?;

        let mut messages: Vec<ChatMessage> = json_entries
            .iter()
            .filter_map(|entry| decode_row(entry))
            .filter(|row| row.user_id == user_id)
            .map(ChatMessage::from)
            .collect();
        sort_chronologically(&mut messages);
        Ok(messages)
    }

    async fn subscribe(&self, user_id: &str) -> Result<InsertStream, StoreError> {
        let mut pubsub = self.client.get_async_pubsub().await?;
        pubsub.subscribe(self.channel(user_id)).await?;

        let user_id = user_id.to_string();
        let stream = pubsub.into_on_message().filter_map(move |msg| {
            let message = match msg.get_payload::<String>() {
                Ok(payload) =>
                    decode_row(&payload)
                        .filter(|row| row.user_id == user_id)
                        .map(ChatMessage::from),
                Err(e) => {
                    error!("Unreadable insert notification on {}: {}", msg.get_channel_name(), e);
                    None
                }
            };
            future::ready(message)
        });
        Ok(Box::pin(stream))
    }
}
