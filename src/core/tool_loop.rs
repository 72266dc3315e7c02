//! 工具调用子协议
//!
//! 模型返回工具调用时：追加带调用元数据的 assistant 消息，逐个执行工具并追加 tool 消息；
//! 任一结果带 `response` 字段时直接作为本轮回复，否则再请求一次模型。只处理一跳，
//! 后续回复中的工具调用只记日志。

use std::time::Duration;

use serde_json::Value;

use crate::core::EngineError;
use crate::llm::{ChatClient, Completion, LlmError, RequestBuilder};
use crate::memory::{Message, Session, ToolCall};
use crate::tools::{ToolExecutor, ToolReply};

/// 工具轮次所需的协作方
pub struct ToolLoop<'a> {
    pub client: &'a dyn ChatClient,
    pub executor: &'a ToolExecutor,
    pub builder: &'a RequestBuilder,
    /// 后续补全请求的超时
    pub timeout: Duration,
}

/// 工具轮次的结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolRoundResult {
    pub content: String,
    /// 是否发出了后续补全请求
    pub follow_up: bool,
}

impl<'a> ToolLoop<'a> {
    pub fn new(
        client: &'a dyn ChatClient,
        executor: &'a ToolExecutor,
        builder: &'a RequestBuilder,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            executor,
            builder,
            timeout,
        }
    }

    /// 执行一次工具轮次，返回本轮最终内容
    ///
    /// assistant 消息只声明已注册的工具调用，保证每个声明的 id 都有对应的 tool 消息。
    pub async fn run(&self, session: &mut Session, completion: &Completion) -> Result<ToolRoundResult, EngineError> {
        let (calls, unknown): (Vec<ToolCall>, Vec<ToolCall>) = completion
            .tool_calls
            .iter()
            .cloned()
            .partition(|call| self.executor.get_tool(&call.name).is_some());
        for call in &unknown {
            tracing::warn!(tool = %call.name, id = %call.id, "unknown tool requested by model, skipped");
        }
        if calls.is_empty() {
            tracing::warn!("no requested tool is registered, using completion content as is");
            return Ok(ToolRoundResult {
                content: completion.content.clone(),
                follow_up: false,
            });
        }

        session
            .log_mut()
            .push(Message::assistant_tool_calls(completion.content.clone(), calls.clone()));

        let mut direct: Option<String> = None;
        for call in &calls {
            let reply = self.invoke(call).await;
            if direct.is_none() {
                direct = reply.response.clone();
            }
            tracing::debug!(tool = %call.name, reply = %reply.to_json_string(), "tool result");
            session.log_mut().push(Message::tool(reply.to_json_string(), call.id.clone()));
        }

        if let Some(content) = direct {
            tracing::info!("tool supplied a direct response, skipping follow-up completion");
            return Ok(ToolRoundResult {
                content,
                follow_up: false,
            });
        }

        let request = self.builder.build(session, self.executor.specs());
        let secs = self.timeout.as_secs();
        let follow = tokio::time::timeout(self.timeout, self.client.complete(&request))
            .await
            .map_err(|_| LlmError::Timeout(secs))??;
        if !follow.tool_calls.is_empty() {
            tracing::warn!(
                count = follow.tool_calls.len(),
                "nested tool calls in follow-up completion are not processed"
            );
        }
        Ok(ToolRoundResult {
            content: follow.content,
            follow_up: true,
        })
    }

    /// 执行单个已注册的调用；失败转换为错误回复
    async fn invoke(&self, call: &ToolCall) -> ToolReply {
        let args: Value = match parse_arguments(&call.arguments) {
            Ok(args) => args,
            Err(e) => return ToolReply::error(format!("Invalid arguments: {e}")),
        };
        match self.executor.execute(&call.name, args).await {
            Ok(reply) => reply,
            Err(e) => ToolReply::error(e.to_string()),
        }
    }
}

/// 空参数按空对象处理
fn parse_arguments(raw: &str) -> Result<Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw)
}

/// 便捷入口：执行一次工具轮次
pub async fn run_tool_calls(
    tool_loop: &ToolLoop<'_>,
    session: &mut Session,
    completion: &Completion,
) -> Result<ToolRoundResult, EngineError> {
    tool_loop.run(session, completion).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{InferenceParams, MockChatClient};
    use crate::memory::Role;
    use crate::tools::{Tool, ToolRegistry};
    use async_trait::async_trait;
    use std::sync::Arc;

    struct Answering;

    #[async_trait]
    impl Tool for Answering {
        fn name(&self) -> &str {
            "answer"
        }
        fn description(&self) -> &str {
            "answers directly"
        }
        async fn execute(&self, _args: Value) -> Result<ToolReply, String> {
            Ok(ToolReply::success("t", "c").with_response("final from tool"))
        }
    }

    struct Lookup;

    #[async_trait]
    impl Tool for Lookup {
        fn name(&self) -> &str {
            "lookup"
        }
        fn description(&self) -> &str {
            "looks things up"
        }
        async fn execute(&self, args: Value) -> Result<ToolReply, String> {
            Ok(ToolReply::success("lookup", args["q"].as_str().unwrap_or_default()))
        }
    }

    fn call(id: &str, name: &str, arguments: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    fn executor() -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        registry.register(Arc::new(Answering));
        registry.register(Arc::new(Lookup));
        ToolExecutor::new(registry, 0)
    }

    #[tokio::test]
    async fn test_direct_response_skips_follow_up() {
        let client = MockChatClient::new();
        let executor = executor();
        let builder = RequestBuilder::new("m", InferenceParams::default());
        let tool_loop = ToolLoop::new(&client, &executor, &builder, Duration::from_secs(5));
        let mut session = Session::new("S");
        session.log_mut().push(Message::user("hi"));

        let completion = Completion::with_tool_calls(vec![call("1", "answer", "{}")]);
        let result = run_tool_calls(&tool_loop, &mut session, &completion).await.unwrap();
        assert_eq!(result.content, "final from tool");
        assert!(!result.follow_up);
        assert_eq!(client.calls(), 0);

        let canonical = session.canonical();
        assert_eq!(canonical.len(), 4);
        assert!(canonical[2].tool_calls.is_some());
        assert_eq!(canonical[3].role, Role::Tool);
        assert_eq!(canonical[3].tool_call_id.as_deref(), Some("1"));
        assert_eq!(session.display()[3], canonical[3]);
    }

    #[tokio::test]
    async fn test_follow_up_and_unknown_tool_skipped() {
        let client = MockChatClient::new();
        client.push(Completion::text("summarised"));
        let executor = executor();
        let builder = RequestBuilder::new("m", InferenceParams::default());
        let tool_loop = ToolLoop::new(&client, &executor, &builder, Duration::from_secs(5));
        let mut session = Session::new("S");
        session.log_mut().push(Message::user("hi"));

        let completion = Completion::with_tool_calls(vec![
            call("1", "missing", "{}"),
            call("2", "lookup", r#"{"q":"rust"}"#),
            call("3", "lookup", "not json"),
        ]);
        let result = tool_loop.run(&mut session, &completion).await.unwrap();
        assert_eq!(result.content, "summarised");
        assert!(result.follow_up);
        assert_eq!(client.calls(), 1);

        let tool_messages: Vec<_> = session
            .canonical()
            .into_iter()
            .filter(|m| m.role == Role::Tool)
            .collect();
        assert_eq!(tool_messages.len(), 2);
        assert!(tool_messages[0].content.contains("rust"));
        assert!(tool_messages[1].content.contains("Invalid arguments"));

        let announced: Vec<String> = session
            .canonical()
            .iter()
            .filter_map(|m| m.tool_calls.as_ref())
            .flatten()
            .map(|c| c.id.clone())
            .collect();
        let answered: Vec<String> = tool_messages.iter().filter_map(|m| m.tool_call_id.clone()).collect();
        assert_eq!(announced, vec!["2".to_string(), "3".to_string()]);
        assert_eq!(answered, announced);
    }

    #[tokio::test]
    async fn test_only_unknown_tools_leave_log_untouched() {
        let client = MockChatClient::new();
        let executor = executor();
        let builder = RequestBuilder::new("m", InferenceParams::default());
        let tool_loop = ToolLoop::new(&client, &executor, &builder, Duration::from_secs(5));
        let mut session = Session::new("S");
        session.log_mut().push(Message::user("hi"));

        let mut completion = Completion::with_tool_calls(vec![call("c1", "no_such_tool", "{}")]);
        completion.content = "partial".into();
        let result = tool_loop.run(&mut session, &completion).await.unwrap();
        assert_eq!(result.content, "partial");
        assert!(!result.follow_up);
        assert_eq!(client.calls(), 0);
        assert_eq!(session.canonical().len(), 2);
        assert!(session.canonical().iter().all(|m| m.tool_calls.is_none()));
    }
}
