//! LLM 层：客户端抽象、请求构造与实现（OpenAI 兼容 / Mock）

pub mod mock;
pub mod openai;
pub mod request;
pub mod traits;

use std::sync::Arc;

pub use mock::MockChatClient;
pub use openai::{parse_tool_calls, OpenAiClient, TokenUsage};
pub use request::{message_to_json, ChatRequest, InferenceParams, RequestBuilder, ToolSpec};
pub use traits::{collect_stream, ChatClient, Completion, LlmError, TokenStream};

use crate::config::AppConfig;

/// 根据配置选择客户端：provider 为 mock 或缺少 API Key 时使用 Mock
pub fn create_client_from_config(cfg: &AppConfig) -> Arc<dyn ChatClient> {
    let provider = cfg.llm.provider.to_lowercase();
    let api_key = cfg
        .llm
        .api_key
        .clone()
        .or_else(|| std::env::var("OPENAI_API_KEY").ok());

    match (provider.as_str(), api_key) {
        ("mock", _) => {
            tracing::info!("Using Mock LLM");
            Arc::new(MockChatClient::new())
        }
        (_, Some(key)) => {
            tracing::info!("Using OpenAI-compatible LLM ({})", cfg.llm.model);
            Arc::new(OpenAiClient::new(cfg.llm.base_url.as_deref(), &key))
        }
        (_, None) => {
            tracing::warn!("No API key set, using Mock LLM");
            Arc::new(MockChatClient::new())
        }
    }
}
