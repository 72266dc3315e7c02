//! 记忆层：会话日志（canonical / display 投影）、会话状态、检索缓存、持久化

pub mod cache;
pub mod conversation;
pub mod persistence;
pub mod session;

pub use cache::{normalize_key, RetrievalCache};
pub use conversation::{Entry, Message, ResponseRecord, Role, SessionLog, ToolCall};
pub use persistence::{SaveFile, SAVEFILE_MAGIC};
pub use session::Session;
