//! # Chat Plan
//!
//! Reference Plan over a [`ConversationStore`] port. Operations:
//!
//! | Operation | Capability | Request | Result |
//! |-----------|------------|---------|--------|
//! | `chat:exportHistory` | `chat:read` | [`ExportHistoryRequest`] | [`ExportHistoryResponse`] |
//! | `chat:listTopics` | `chat:read` | [`ListTopicsRequest`] | [`ListTopicsResponse`] |

use anyhow::anyhow;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dispatch_core::{OperationRecord, Plan, PlanTable};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

pub const CHAT_DOMAIN: &str = "chat";
pub const CHAT_READ: &str = "chat:read";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub topic_id: String,
    pub author: String,
    pub text: String,
    pub sent_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicSummary {
    pub topic_id: String,
    pub name: String,
    pub message_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_message_at: Option<DateTime<Utc>>,
}

/// Read access to stored conversations.
#[async_trait]
pub trait ConversationStore: Send + Sync {
    async fn topics(&self) -> anyhow::Result<Vec<TopicSummary>>;

    /// Messages of a topic in send order; `None` if the topic does not exist.
    async fn messages(&self, topic_id: &str) -> anyhow::Result<Option<Vec<ChatMessage>>>;
}

#[derive(Debug)]
struct StoredTopic {
    name: String,
    messages: Vec<ChatMessage>,
}

/// Process-local [`ConversationStore`].
#[derive(Debug, Default)]
pub struct InMemoryConversationStore {
    topics: RwLock<BTreeMap<String, StoredTopic>>,
    next_message: AtomicU64,
}

impl InMemoryConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a topic; an existing topic keeps its messages and is renamed.
    pub fn add_topic(&self, topic_id: impl Into<String>, name: impl Into<String>) {
        let name = name.into();
        self.topics
            .write()
            .entry(topic_id.into())
            .and_modify(|topic| topic.name = name.clone())
            .or_insert_with(|| StoredTopic {
                name,
                messages: Vec::new(),
            });
    }

    pub fn append(
        &self,
        topic_id: &str,
        author: impl Into<String>,
        text: impl Into<String>,
    ) -> anyhow::Result<ChatMessage> {
        let mut topics = self.topics.write();
        let topic = topics
            .get_mut(topic_id)
            .ok_or_else(|| anyhow!("topic not found: {}", topic_id))?;
        let seq = self.next_message.fetch_add(1, Ordering::Relaxed) + 1;
        let message = ChatMessage {
            id: format!("msg-{}", seq),
            topic_id: topic_id.to_string(),
            author: author.into(),
            text: text.into(),
            sent_at: Utc::now(),
        };
        topic.messages.push(message.clone());
        Ok(message)
    }
}

#[async_trait]
impl ConversationStore for InMemoryConversationStore {
    async fn topics(&self) -> anyhow::Result<Vec<TopicSummary>> {
        Ok(self
            .topics
            .read()
            .iter()
            .map(|(id, topic)| TopicSummary {
                topic_id: id.clone(),
                name: topic.name.clone(),
                message_count: topic.messages.len(),
                last_message_at: topic.messages.last().map(|m| m.sent_at),
            })
            .collect())
    }

    async fn messages(&self, topic_id: &str) -> anyhow::Result<Option<Vec<ChatMessage>>> {
        Ok(self
            .topics
            .read()
            .get(topic_id)
            .map(|topic| topic.messages.clone()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportHistoryRequest {
    pub topic_id: String,
    /// Only messages sent at or after this instant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
    /// Keep only the most recent `limit` messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportHistoryResponse {
    pub topic_id: String,
    pub count: usize,
    pub messages: Vec<ChatMessage>,
    pub exported_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ListTopicsRequest {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ListTopicsResponse {
    pub topics: Vec<TopicSummary>,
}

pub struct ChatService {
    store: Arc<dyn ConversationStore>,
}

impl ChatService {
    pub fn new(store: Arc<dyn ConversationStore>) -> Self {
        Self { store }
    }

    pub async fn export_history(
        &self,
        req: ExportHistoryRequest,
    ) -> anyhow::Result<ExportHistoryResponse> {
        let mut messages = self
            .store
            .messages(&req.topic_id)
            .await?
            .ok_or_else(|| anyhow!("topic not found: {}", req.topic_id))?;

        if let Some(since) = req.since {
            messages.retain(|m| m.sent_at >= since);
        }
        if let Some(limit) = req.limit {
            let skip = messages.len().saturating_sub(limit);
            messages.drain(..skip);
        }

        Ok(ExportHistoryResponse {
            topic_id: req.topic_id,
            count: messages.len(),
            messages,
            exported_at: Utc::now(),
        })
    }

    pub async fn list_topics(&self, _req: ListTopicsRequest) -> anyhow::Result<ListTopicsResponse> {
        Ok(ListTopicsResponse {
            topics: self.store.topics().await?,
        })
    }
}

/// Build the chat Plan's dispatch table.
pub fn chat_plan(service: Arc<ChatService>) -> Arc<dyn Plan> {
    let export = Arc::clone(&service);
    let topics = service;
    Arc::new(
        PlanTable::new(CHAT_DOMAIN)
            .method("exportHistory", move |req: ExportHistoryRequest| {
                let service = Arc::clone(&export);
                async move { service.export_history(req).await }
            })
            .method("listTopics", move |req: ListTopicsRequest| {
                let service = Arc::clone(&topics);
                async move { service.list_topics(req).await }
            }),
    )
}

/// Operation records for the chat Plan.
pub fn chat_operations(service: Arc<ChatService>) -> Vec<OperationRecord> {
    let plan = chat_plan(service);
    vec![
        OperationRecord::new(CHAT_DOMAIN, "exportHistory", Arc::clone(&plan))
            .with_description("Export the message history of one topic")
            .with_capability(CHAT_READ),
        OperationRecord::new(CHAT_DOMAIN, "listTopics", plan)
            .with_description("List topics with message counts")
            .with_capability(CHAT_READ),
    ]
}
