//! 会话日志：单一的追加式条目序列 + 两种投影
//!
//! 每个 Entry 同时保存发送给模型的 canonical 文本（指令展开后的提示词、工具产物）
//! 与展示给用户的 display 文本（原始输入）。canonical() / display() 按需投影为 Message 序列，
//! 因此两条历史的长度始终相同。

use serde::{Deserialize, Serialize};

/// 消息角色（与 Chat Completion API 一致）
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
            Role::Assistant => "assistant",
            Role::Tool => "tool",
        }
    }
}

/// 模型发起的一次工具调用（arguments 为原始 JSON 字符串）
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
}

/// 单条消息
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl Message {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    /// 工具结果消息，携带对应的 tool_call_id
    pub fn tool(content: impl Into<String>, call_id: impl Into<String>) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: None,
            tool_call_id: Some(call_id.into()),
        }
    }

    /// 助手发起工具调用的消息（content 可为空）
    pub fn assistant_tool_calls(content: impl Into<String>, calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_calls: Some(calls),
            tool_call_id: None,
        }
    }
}

/// 每轮完成后的模型原始输出记录：(工具调用或无, 原始文本)
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseRecord {
    pub tool_calls: Option<Vec<ToolCall>>,
    pub output: String,
}

impl ResponseRecord {
    pub fn new(tool_calls: Option<Vec<ToolCall>>, output: impl Into<String>) -> Self {
        Self {
            tool_calls,
            output: output.into(),
        }
    }
}

/// 日志条目：同一位置上的 canonical / display 两份文本
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Entry {
    pub role: Role,
    pub canonical: String,
    pub display: String,
    pub tool_calls: Option<Vec<ToolCall>>,
    pub tool_call_id: Option<String>,
}

impl Entry {
    /// 两份文本相同的条目（系统消息、助手回复、工具结果）
    pub fn shared(message: Message) -> Self {
        Self {
            role: message.role,
            display: message.content.clone(),
            canonical: message.content,
            tool_calls: message.tool_calls,
            tool_call_id: message.tool_call_id,
        }
    }

    fn project(&self, text: &str) -> Message {
        Message {
            role: self.role,
            content: text.to_string(),
            tool_calls: self.tool_calls.clone(),
            tool_call_id: self.tool_call_id.clone(),
        }
    }
}

/// 会话日志：条目按追加顺序排列，delete 类指令通过 truncate 回退
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SessionLog {
    entries: Vec<Entry>,
}

impl SessionLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// 以一条 system 消息作为种子
    pub fn seeded(system_prompt: &str) -> Self {
        let mut log = Self::new();
        log.push(Message::system(system_prompt));
        log
    }

    pub fn push(&mut self, message: Message) {
        self.entries.push(Entry::shared(message));
    }

    /// 追加一条两份文本不同的消息（用户输入：canonical 为展开后的提示词，display 为原文）
    pub fn push_split(&mut self, role: Role, canonical: impl Into<String>, display: impl Into<String>) {
        self.entries.push(Entry {
            role,
            canonical: canonical.into(),
            display: display.into(),
            tool_calls: None,
            tool_call_id: None,
        });
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn last(&self) -> Option<&Entry> {
        self.entries.last()
    }

    pub fn truncate(&mut self, len: usize) {
        self.entries.truncate(len);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 发送给模型的历史
    pub fn canonical(&self) -> Vec<Message> {
        self.entries.iter().map(|e| e.project(&e.canonical)).collect()
    }

    /// 展示给用户的历史
    pub fn display(&self) -> Vec<Message> {
        self.entries.iter().map(|e| e.project(&e.display)).collect()
    }

    /// 由两份投影重建日志；长度或角色不一致时返回 None
    pub fn from_projections(canonical: Vec<Message>, display: Vec<Message>) -> Option<Self> {
        if canonical.len() != display.len() {
            return None;
        }
        let mut entries = Vec::with_capacity(canonical.len());
        for (c, d) in canonical.into_iter().zip(display) {
            if c.role != d.role || c.tool_calls != d.tool_calls || c.tool_call_id != d.tool_call_id {
                return None;
            }
            entries.push(Entry {
                role: c.role,
                canonical: c.content,
                display: d.content,
                tool_calls: c.tool_calls,
                tool_call_id: c.tool_call_id,
            });
        }
        Some(Self { entries })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_projections_keep_equal_length() {
        let mut log = SessionLog::seeded("S");
        log.push_split(Role::User, "expanded prompt", "\\visit a.txt");
        log.push(Message::assistant("answer"));

        let canonical = log.canonical();
        let display = log.display();
        assert_eq!(canonical.len(), display.len());
        assert_eq!(canonical[1].content, "expanded prompt");
        assert_eq!(display[1].content, "\\visit a.txt");
        assert_eq!(canonical[2], display[2]);
    }

    #[test]
    fn test_from_projections_rejects_mismatch() {
        let canonical = vec![Message::system("S"), Message::user("a")];
        let display = vec![Message::system("S")];
        assert!(SessionLog::from_projections(canonical, display).is_none());

        let canonical = vec![Message::system("S"), Message::user("a")];
        let display = vec![Message::system("S"), Message::assistant("a")];
        assert!(SessionLog::from_projections(canonical, display).is_none());
    }

    #[test]
    fn test_tool_messages_serialize_with_call_id() {
        let msg = Message::tool("{\"status\":\"success\"}", "call_1");
        let json = serde_json::to_value(&msg).unwrap();
        assert_eq!(json["role"], "tool");
        assert_eq!(json["tool_call_id"], "call_1");
        assert!(json.get("tool_calls").is_none());
    }
}
