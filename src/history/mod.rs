//! 历史转换：把外部持有的对话记录转换为统一的回放步骤
//!
//! 支持两种来源：
//! - 保存的转录 `[{system?, user?, assistant?}]`
//! - OpenAI 兼容请求体 `{model, messages, ...params}`
//!
//! 回放本身由 ChatEngine::replay_* 完成（复用分类与轮次逻辑）。

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::{EngineError, RoundOutcome};

/// 转录中的一轮
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptTurn {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assistant: Option<String>,
}

/// 回放步骤
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReplayStep {
    System(String),
    User(String),
    Assistant(String),
}

/// 回放选项
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ReplayOptions {
    /// 最后一步为普通用户输入时，实时请求模型完成该轮
    pub complete_final: bool,
}

/// 回放结果
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Replayed {
    /// 回放中完成的轮次数
    pub rounds: usize,
    /// 最后一步为控制指令，或按 complete_final 实时完成时的结果
    pub final_round: Option<RoundOutcome>,
}

/// 转录 -> 回放步骤（每轮内按 system、user、assistant 的顺序）
pub fn steps_from_transcript(turns: &[TranscriptTurn]) -> Vec<ReplayStep> {
    let mut steps = Vec::with_capacity(turns.len() * 2);
    for turn in turns {
        if let Some(system) = &turn.system {
            steps.push(ReplayStep::System(system.clone()));
        }
        if let Some(user) = &turn.user {
            steps.push(ReplayStep::User(user.clone()));
        }
        if let Some(assistant) = &turn.assistant {
            steps.push(ReplayStep::Assistant(assistant.clone()));
        }
    }
    steps
}

/// OpenAI 请求体 -> 回放步骤；tool 消息与未知角色被忽略
pub fn steps_from_openai_body(body: &Value) -> Result<Vec<ReplayStep>, EngineError> {
    let messages = body
        .get("messages")
        .and_then(Value::as_array)
        .ok_or_else(|| EngineError::InvalidHistory("missing `messages` array".to_string()))?;

    let mut steps = Vec::with_capacity(messages.len());
    for (i, message) in messages.iter().enumerate() {
        let role = message
            .get("role")
            .and_then(Value::as_str)
            .ok_or_else(|| EngineError::InvalidHistory(format!("message {i} has no role")))?;
        let content = content_text(message.get("content"));
        match role {
            "system" | "developer" => steps.push(ReplayStep::System(content)),
            "user" => steps.push(ReplayStep::User(content)),
            "assistant" => steps.push(ReplayStep::Assistant(content)),
            other => tracing::debug!(role = other, "skipping message during replay"),
        }
    }
    Ok(steps)
}

/// content 可以是字符串或 `[{type: "text", text}]` 片段数组
fn content_text(content: Option<&Value>) -> String {
    match content {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(parts)) => parts
            .iter()
            .filter_map(|p| p.get("text").and_then(Value::as_str))
            .collect::<Vec<_>>()
            .join(""),
        _ => String::new(),
    }
}
