//! Chat Completion 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Mock）实现 ChatClient：complete（非流式，可返回工具调用）、
//! complete_stream（流式 Token）。流式结果在进入下游处理前由 collect_stream 拼接为完整字符串。

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{stream, Stream, StreamExt};
use thiserror::Error;
use tokio::sync::broadcast;

use crate::llm::ChatRequest;
use crate::memory::ToolCall;

/// 调用补全服务时的错误
#[derive(Error, Debug)]
pub enum LlmError {
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Stream error: {0}")]
    Stream(String),
}

/// 流式 Token
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, LlmError>> + Send>>;

/// 一次补全的结果：工具调用（可能为空）与文本内容
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Completion {
    pub tool_calls: Vec<ToolCall>,
    pub content: String,
}

impl Completion {
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            tool_calls: Vec::new(),
            content: content.into(),
        }
    }

    pub fn with_tool_calls(calls: Vec<ToolCall>) -> Self {
        Self {
            tool_calls: calls,
            content: String::new(),
        }
    }
}

#[async_trait]
pub trait ChatClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, request: &ChatRequest) -> Result<Completion, LlmError>;

    /// 流式完成；默认实现把非流式结果包装成单元素流（工具调用被丢弃）
    async fn complete_stream(&self, request: &ChatRequest) -> Result<TokenStream, LlmError> {
        let completion = self.complete(request).await?;
        Ok(Box::pin(stream::iter(vec![Ok(completion.content)])))
    }

    /// 累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}

/// 拼接流式 Token；每个片段同时转发到 sink（若有订阅者）
pub async fn collect_stream(
    mut tokens: TokenStream,
    sink: Option<&broadcast::Sender<String>>,
) -> Result<String, LlmError> {
    let mut collected = String::new();
    while let Some(piece) = tokens.next().await {
        let piece = piece?;
        if piece.is_empty() {
            continue;
        }
        if let Some(tx) = sink {
            let _ = tx.send(piece.clone());
        }
        collected.push_str(&piece);
    }
    Ok(collected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_collect_stream_reassembles_and_forwards() {
        let tokens: TokenStream = Box::pin(stream::iter(vec![
            Ok("Hel".to_string()),
            Ok(String::new()),
            Ok("lo".to_string()),
        ]));
        let (tx, mut rx) = broadcast::channel(8);
        let text = collect_stream(tokens, Some(&tx)).await.unwrap();
        assert_eq!(text, "Hello");
        assert_eq!(rx.recv().await.unwrap(), "Hel");
        assert_eq!(rx.recv().await.unwrap(), "lo");
    }

    #[tokio::test]
    async fn test_collect_stream_propagates_error() {
        let tokens: TokenStream = Box::pin(stream::iter(vec![
            Ok("partial".to_string()),
            Err(LlmError::Stream("connection reset".into())),
        ]));
        let err = collect_stream(tokens, None).await.unwrap_err();
        assert!(matches!(err, LlmError::Stream(_)));
    }
}
