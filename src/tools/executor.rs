//! 工具执行器
//!
//! 持有 ToolRegistry 与可选超时（0 表示不限时），execute(tool_name, args) 调用对应工具，
//! 超时或失败时转为 EngineError（ToolTimeout / ToolExecutionFailed / UnknownTool）；每次调用输出结构化审计日志（JSON）。

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio::time::timeout;

use crate::core::EngineError;
use crate::llm::ToolSpec;
use crate::tools::{Tool, ToolRegistry, ToolReply};

pub struct ToolExecutor {
    registry: ToolRegistry,
    timeout: Option<Duration>,
}

impl ToolExecutor {
    pub fn new(registry: ToolRegistry, timeout_secs: u64) -> Self {
        Self {
            registry,
            timeout: (timeout_secs > 0).then(|| Duration::from_secs(timeout_secs)),
        }
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.registry.register(tool);
    }

    pub fn get_tool(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.registry.get(name)
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.registry.tool_names()
    }

    pub fn specs(&self) -> Vec<ToolSpec> {
        self.registry.specs()
    }

    /// 执行指定工具并输出审计日志
    pub async fn execute(&self, tool_name: &str, args: Value) -> Result<ToolReply, EngineError> {
        let tool = self
            .registry
            .get(tool_name)
            .ok_or_else(|| EngineError::UnknownTool(tool_name.to_string()))?;

        let start = Instant::now();
        let preview = args_preview(&args);
        let result = match self.timeout {
            Some(limit) => timeout(limit, tool.execute(args)).await.ok(),
            None => Some(tool.execute(args).await),
        };

        let outcome = match &result {
            Some(Ok(_)) => "ok",
            Some(Err(_)) => "error",
            None => "timeout",
        };
        let audit = serde_json::json!({
            "event": "tool_audit",
            "tool": tool_name,
            "ok": outcome == "ok",
            "outcome": outcome,
            "duration_ms": start.elapsed().as_millis() as u64,
            "args_preview": preview,
        });
        tracing::info!(audit = %audit, "tool");

        match result {
            Some(Ok(reply)) => Ok(reply),
            Some(Err(e)) => Err(EngineError::ToolExecutionFailed(e)),
            None => Err(EngineError::ToolTimeout(tool_name.to_string())),
        }
    }
}

fn args_preview(args: &Value) -> String {
    let s = args.to_string();
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s
    }
}
