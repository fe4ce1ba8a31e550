//! Shared conversation types and error hierarchy for cai.

pub mod error;
pub mod message;
pub mod provider;
pub mod tool;

pub use error::{ApiError, CaiError, ConfigError};
pub use message::*;
pub use provider::ChatProvider;
pub use tool::{ToolBackend, ToolCallResult};
