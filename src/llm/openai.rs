//! OpenAI 兼容 API 客户端
//!
//! 通过 async_openai 调用任意 OpenAI 兼容端点（可配置 base_url）。请求体由 ChatRequest::to_body 生成后
//! 反序列化为 CreateChatCompletionRequest；响应中的 tool_calls 以 JSON 形式读取。

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_openai::config::OpenAIConfig;
use async_openai::types::chat::CreateChatCompletionRequest;
use async_openai::Client;
use async_trait::async_trait;
use futures_util::StreamExt;
use serde_json::Value;

use crate::llm::{ChatClient, ChatRequest, Completion, LlmError, TokenStream};
use crate::memory::ToolCall;

/// Token 使用统计（累计值）
#[derive(Debug, Clone, Default)]
pub struct TokenUsage {
    pub prompt_tokens: Arc<AtomicU64>,
    pub completion_tokens: Arc<AtomicU64>,
    pub total_tokens: Arc<AtomicU64>,
}

impl TokenUsage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&self, prompt: u64, completion: u64) {
        self.prompt_tokens.fetch_add(prompt, Ordering::Relaxed);
        self.completion_tokens.fetch_add(completion, Ordering::Relaxed);
        self.total_tokens.fetch_add(prompt + completion, Ordering::Relaxed);
    }

    pub fn get(&self) -> (u64, u64, u64) {
        (
            self.prompt_tokens.load(Ordering::Relaxed),
            self.completion_tokens.load(Ordering::Relaxed),
            self.total_tokens.load(Ordering::Relaxed),
        )
    }
}

pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    /// 累计 token 使用统计
    pub usage: TokenUsage,
}

impl OpenAiClient {
    pub fn new(base_url: Option<&str>, api_key: &str) -> Self {
        let config = match base_url {
            Some(url) => OpenAIConfig::new().with_api_base(url).with_api_key(api_key),
            None => OpenAIConfig::new().with_api_key(api_key),
        };
        Self {
            client: Client::with_config(config),
            usage: TokenUsage::new(),
        }
    }

    fn to_openai_request(request: &ChatRequest, stream: bool) -> Result<CreateChatCompletionRequest, LlmError> {
        serde_json::from_value(request.to_body(stream))
            .map_err(|e| LlmError::InvalidRequest(e.to_string()))
    }
}

/// 从响应消息 JSON 中读取 tool_calls（id / function.name / function.arguments）
pub fn parse_tool_calls(message: &Value) -> Vec<ToolCall> {
    let Some(calls) = message.get("tool_calls").and_then(Value::as_array) else {
        return Vec::new();
    };
    calls
        .iter()
        .filter_map(|call| {
            let function = call.get("function")?;
            Some(ToolCall {
                id: call.get("id")?.as_str()?.to_string(),
                name: function.get("name")?.as_str()?.to_string(),
                arguments: function
                    .get("arguments")
                    .and_then(Value::as_str)
                    .unwrap_or("{}")
                    .to_string(),
            })
        })
        .collect()
}

#[async_trait]
impl ChatClient for OpenAiClient {
    fn token_usage(&self) -> (u64, u64, u64) {
        self.usage.get()
    }

    async fn complete(&self, request: &ChatRequest) -> Result<Completion, LlmError> {
        let req = Self::to_openai_request(request, false)?;
        let response = self
            .client
            .chat()
            .create(req)
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        if let Some(usage) = &response.usage {
            self.usage
                .add(usage.prompt_tokens as u64, usage.completion_tokens as u64);
        }

        let Some(choice) = response.choices.first() else {
            return Ok(Completion::default());
        };
        let content = choice.message.content.clone().unwrap_or_default();
        let message = serde_json::to_value(&choice.message).map_err(|e| LlmError::Api(e.to_string()))?;
        Ok(Completion {
            tool_calls: parse_tool_calls(&message),
            content,
        })
    }

    async fn complete_stream(&self, request: &ChatRequest) -> Result<TokenStream, LlmError> {
        let req = Self::to_openai_request(request, true)?;
        let stream = self
            .client
            .chat()
            .create_stream(req)
            .await
            .map_err(|e| LlmError::Api(e.to_string()))?;

        let tokens = stream.map(|chunk| match chunk {
            Ok(resp) => Ok(resp
                .choices
                .first()
                .and_then(|c| c.delta.content.clone())
                .unwrap_or_default()),
            Err(e) => Err(LlmError::Stream(e.to_string())),
        });
        Ok(Box::pin(tokens))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::InferenceParams;
    use crate::memory::Message;
    use serde_json::json;

    #[test]
    fn test_parse_tool_calls() {
        let message = json!({
            "role": "assistant",
            "content": null,
            "tool_calls": [
                {"id": "call_1", "type": "function",
                 "function": {"name": "web_search", "arguments": "{\"search_query\":\"rust\"}"}},
                {"type": "function", "function": {"name": "broken"}}
            ]
        });
        let calls = parse_tool_calls(&message);
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_1");
        assert_eq!(calls[0].name, "web_search");
        assert!(parse_tool_calls(&json!({"content": "hi"})).is_empty());
    }

    #[test]
    fn test_request_body_deserializes_into_openai_request() {
        let request = ChatRequest {
            model: "gpt-4o-mini".into(),
            messages: vec![Message::system("S"), Message::user("hi")],
            params: InferenceParams {
                max_tokens: Some(128),
                ..Default::default()
            },
            tools: vec![],
        };
        let req = OpenAiClient::to_openai_request(&request, false).unwrap();
        assert_eq!(req.model, "gpt-4o-mini");
        assert_eq!(req.messages.len(), 2);
    }
}
