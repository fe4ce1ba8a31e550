//! Conversation loop orchestration for cai.

mod conversation;

pub use conversation::{
    Conversation, ConversationConfig, ConversationEvent, ConversationOutcome,
    DEFAULT_MAX_TOOL_ROUNDS,
};
