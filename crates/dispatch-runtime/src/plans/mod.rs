//! Plans registered by the runtime.

pub mod chat;
pub mod system;

pub use chat::{
    chat_operations, chat_plan, ChatMessage, ChatService, ConversationStore,
    ExportHistoryRequest, ExportHistoryResponse, InMemoryConversationStore, ListTopicsRequest,
    ListTopicsResponse, TopicSummary, CHAT_READ,
};
pub use system::{system_operations, ListOperationsResponse, SYSTEM_READ};
