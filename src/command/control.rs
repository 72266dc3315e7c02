//! 控制结果：不经过模型、可确定性处理的指令输出

use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Control {
    /// 用法说明
    Syntax { usage: String },
    /// 删除上一轮（回退到只剩 system）
    Delete,
    /// 删除全部历史（回退到只剩 system）
    DeleteAll,
    ToolcallToggle { enabled: bool },
    Locate { path: String, table: String },
    Connect { table: String },
    Insert { key: String },
    Update { key: String },
    /// 已执行的写语句
    Query { sql: String },
    Error { message: String },
    /// 地址无法识别：不记录任何痕迹
    Ignored,
}

impl Control {
    pub fn error(message: impl Into<String>) -> Self {
        Control::Error {
            message: message.into(),
        }
    }

    /// 作为本轮回复展示的文本
    pub fn reply(&self) -> String {
        match self {
            Control::Syntax { usage } => usage.clone(),
            Control::Delete => "`Previous Chat Deleted`".to_string(),
            Control::DeleteAll => "`Chat History Deleted`".to_string(),
            Control::ToolcallToggle { enabled: true } => "`Tool Calling Enabled`".to_string(),
            Control::ToolcallToggle { enabled: false } => "`Tool Calling Disabled`".to_string(),
            Control::Locate { path, table } => format!("`Located database: {path}, table: {table}`"),
            Control::Connect { table } => format!("`Connected to table: {table}`"),
            Control::Insert { key } => format!("`Inserted by key: {key}`"),
            Control::Update { key } => format!("`Updated by key: {key}`"),
            Control::Query { sql } => format!("`Query executed: {sql}`"),
            Control::Error { message } => format!("`Negative. {message}`"),
            Control::Ignored => String::new(),
        }
    }

    /// 是否需要把两条历史回退到只剩 system 消息
    pub fn truncates_history(&self) -> bool {
        matches!(self, Control::Delete | Control::DeleteAll)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_texts() {
        assert_eq!(Control::Delete.reply(), "`Previous Chat Deleted`");
        assert_eq!(Control::DeleteAll.reply(), "`Chat History Deleted`");
        assert_eq!(
            Control::Connect { table: "notes".into() }.reply(),
            "`Connected to table: notes`"
        );
        assert_eq!(Control::Insert { key: "k".into() }.reply(), "`Inserted by key: k`");
        assert_eq!(Control::Ignored.reply(), "");
        assert!(Control::Delete.truncates_history());
        assert!(!Control::Insert { key: "k".into() }.truncates_history());
    }

    #[test]
    fn test_serialized_with_type_tag() {
        let json = serde_json::to_value(Control::ToolcallToggle { enabled: true }).unwrap();
        assert_eq!(json["type"], "toolcall_toggle");
        assert_eq!(json["enabled"], true);
    }
}
