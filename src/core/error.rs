//! 引擎错误类型
//!
//! 除 ReplyPending 外，这些错误都在轮次边界被转换为诊断文本作为本轮回复，不会向调用方传播。

use thiserror::Error;

use crate::llm::LlmError;
use crate::storage::StorageError;
use crate::web::WebError;

#[derive(Error, Debug)]
pub enum EngineError {
    /// 上一轮尚未结束时再次发送
    #[error("A reply is still pending")]
    ReplyPending,

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Web error: {0}")]
    Web(#[from] WebError),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// 外部转录格式不正确
    #[error("Invalid history: {0}")]
    InvalidHistory(String),
}

impl From<config::ConfigError> for EngineError {
    fn from(err: config::ConfigError) -> Self {
        EngineError::Config(err.to_string())
    }
}
