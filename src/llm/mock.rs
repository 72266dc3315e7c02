//! Mock 客户端（用于测试与无 API Key 的本地运行）
//!
//! 按脚本依次返回预设的 Completion；脚本耗尽后回显最后一条 user 消息。
//! 记录调用次数与每次收到的请求，便于断言「未调用模型」之类的行为。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::llm::{ChatClient, ChatRequest, Completion, LlmError};

#[derive(Debug, Default)]
pub struct MockChatClient {
    script: Mutex<VecDeque<Result<Completion, String>>>,
    requests: Mutex<Vec<ChatRequest>>,
    calls: AtomicUsize,
}

impl MockChatClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条脚本化回复
    pub fn push(&self, completion: Completion) -> &Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Ok(completion));
        }
        self
    }

    /// 追加一次失败
    pub fn push_error(&self, message: impl Into<String>) -> &Self {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(Err(message.into()));
        }
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<ChatRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl ChatClient for MockChatClient {
    async fn complete(&self, request: &ChatRequest) -> Result<Completion, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let scripted = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match scripted {
            Some(Ok(completion)) => Ok(completion),
            Some(Err(message)) => Err(LlmError::Api(message)),
            None => Ok(Completion::text(format!(
                "Echo from Mock: {}",
                request.last_user().unwrap_or("(no input)")
            ))),
        }
    }
}
