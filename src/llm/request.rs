//! 补全请求：推理参数、工具声明、消息序列，以及到 OpenAI 请求体的转换

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use crate::memory::{Message, Role, Session};

/// 可选推理参数；None 的字段不写入请求体
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InferenceParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
}

/// 向模型声明的一个函数工具
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSpec {
    /// `{"type":"function","function":{...}}`
    pub fn to_json(&self) -> Value {
        json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            }
        })
    }
}

/// 一次补全请求
#[derive(Clone, Debug, PartialEq)]
pub struct ChatRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub params: InferenceParams,
    pub tools: Vec<ToolSpec>,
}

impl ChatRequest {
    /// 转为 OpenAI Chat Completion 请求体
    pub fn to_body(&self, stream: bool) -> Value {
        let mut body = Map::new();
        body.insert("model".into(), json!(self.model));
        body.insert(
            "messages".into(),
            Value::Array(self.messages.iter().map(message_to_json).collect()),
        );
        if let Ok(Value::Object(params)) = serde_json::to_value(&self.params) {
            body.extend(params);
        }
        if !self.tools.is_empty() {
            body.insert(
                "tools".into(),
                Value::Array(self.tools.iter().map(ToolSpec::to_json).collect()),
            );
        }
        if stream {
            body.insert("stream".into(), json!(true));
        }
        Value::Object(body)
    }

    /// 最后一条 user 消息（Mock 回显用）
    pub fn last_user(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// 单条消息的线上格式：assistant 工具调用的 content 为空时写 null
pub fn message_to_json(message: &Message) -> Value {
    let mut obj = Map::new();
    obj.insert("role".into(), json!(message.role.as_str()));
    match &message.tool_calls {
        Some(calls) => {
            let content = if message.content.is_empty() {
                Value::Null
            } else {
                json!(message.content)
            };
            obj.insert("content".into(), content);
            let calls: Vec<Value> = calls
                .iter()
                .map(|c| {
                    json!({
                        "id": c.id,
                        "type": "function",
                        "function": { "name": c.name, "arguments": c.arguments },
                    })
                })
                .collect();
            obj.insert("tool_calls".into(), Value::Array(calls));
        }
        None => {
            obj.insert("content".into(), json!(message.content));
        }
    }
    if let Some(id) = &message.tool_call_id {
        obj.insert("tool_call_id".into(), json!(id));
    }
    Value::Object(obj)
}

/// 由会话构造请求：canonical 历史 + 配置的推理参数 + 可用工具
#[derive(Clone, Debug)]
pub struct RequestBuilder {
    model: String,
    params: InferenceParams,
}

impl RequestBuilder {
    pub fn new(model: impl Into<String>, params: InferenceParams) -> Self {
        Self {
            model: model.into(),
            params,
        }
    }

    pub fn params(&self) -> &InferenceParams {
        &self.params
    }

    pub fn params_mut(&mut self) -> &mut InferenceParams {
        &mut self.params
    }

    pub fn build(&self, session: &Session, tools: Vec<ToolSpec>) -> ChatRequest {
        ChatRequest {
            model: self.model.clone(),
            messages: pair_tool_messages(session.canonical()),
            params: self.params.clone(),
            tools,
        }
    }
}

/// 让 tool_calls 与 tool 消息一一对应（端点会拒绝不成对的请求）
///
/// 未被回答的调用 id 从 assistant 消息中去掉，调用清空且无正文时整条丢弃；
/// 没有对应调用的 tool 消息也会丢弃。
fn pair_tool_messages(messages: Vec<Message>) -> Vec<Message> {
    let answered: HashSet<String> = messages
        .iter()
        .filter(|m| m.role == Role::Tool)
        .filter_map(|m| m.tool_call_id.clone())
        .collect();

    let mut announced: HashSet<String> = HashSet::new();
    messages
        .into_iter()
        .filter_map(|mut m| {
            if let Some(calls) = m.tool_calls.take() {
                let kept: Vec<_> = calls.into_iter().filter(|c| answered.contains(&c.id)).collect();
                if kept.is_empty() {
                    if m.content.is_empty() {
                        return None;
                    }
                } else {
                    announced.extend(kept.iter().map(|c| c.id.clone()));
                    m.tool_calls = Some(kept);
                }
            }
            match (&m.role, &m.tool_call_id) {
                (Role::Tool, Some(id)) if announced.contains(id) => Some(m),
                (Role::Tool, _) => None,
                _ => Some(m),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::ToolCall;

    fn call(id: &str) -> ToolCall {
        ToolCall {
            id: id.into(),
            name: "web_search".into(),
            arguments: r#"{"search_query":"rust"}"#.into(),
        }
    }

    #[test]
    fn test_body_omits_unset_params_and_empty_tools() {
        let request = ChatRequest {
            model: "m".into(),
            messages: vec![Message::system("S"), Message::user("hi")],
            params: InferenceParams {
                temperature: Some(0.5),
                ..Default::default()
            },
            tools: vec![],
        };
        let body = request.to_body(false);
        assert_eq!(body["model"], "m");
        assert_eq!(body["temperature"], 0.5);
        assert!(body.get("max_tokens").is_none());
        assert!(body.get("tools").is_none());
        assert!(body.get("stream").is_none());
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(request.to_body(true)["stream"], true);
    }

    #[test]
    fn test_tool_call_message_wire_format() {
        let msg = Message::assistant_tool_calls("", vec![call("c1")]);
        let value = message_to_json(&msg);
        assert!(value["content"].is_null());
        assert_eq!(value["tool_calls"][0]["type"], "function");
        assert_eq!(value["tool_calls"][0]["function"]["name"], "web_search");

        let tool = message_to_json(&Message::tool("{}", "c1"));
        assert_eq!(tool["tool_call_id"], "c1");
    }

    #[test]
    fn test_builder_drops_orphan_tool_messages() {
        let mut session = Session::new("S");
        session.log_mut().push(Message::user("q"));
        session.log_mut().push(Message::tool("stray", "nobody"));
        session
            .log_mut()
            .push(Message::assistant_tool_calls("", vec![call("c1")]));
        session.log_mut().push(Message::tool("{}", "c1"));

        let builder = RequestBuilder::new("m", InferenceParams::default());
        let request = builder.build(&session, vec![]);
        assert_eq!(request.messages.len(), 4);
        assert!(request.messages.iter().all(|m| m.content != "stray"));
        assert_eq!(request.last_user(), Some("q"));
    }

    #[test]
    fn test_builder_strips_unanswered_call_ids() {
        let mut session = Session::new("S");
        session.log_mut().push(Message::user("q"));
        session
            .log_mut()
            .push(Message::assistant_tool_calls("", vec![call("c1"), call("c2")]));
        session.log_mut().push(Message::tool("{}", "c2"));
        session.log_mut().push(Message::assistant("done"));
        session.log_mut().push(Message::user("again"));
        session
            .log_mut()
            .push(Message::assistant_tool_calls("", vec![call("c3")]));
        session.log_mut().push(Message::user("next"));

        let builder = RequestBuilder::new("m", InferenceParams::default());
        let request = builder.build(&session, vec![]);

        let announced: Vec<&str> = request
            .messages
            .iter()
            .filter_map(|m| m.tool_calls.as_ref())
            .flatten()
            .map(|c| c.id.as_str())
            .collect();
        let answered: Vec<&str> = request
            .messages
            .iter()
            .filter_map(|m| m.tool_call_id.as_deref())
            .collect();
        assert_eq!(announced, vec!["c2"]);
        assert_eq!(answered, announced);
        assert_eq!(request.messages.len(), 7);
        assert_eq!(request.last_user(), Some("next"));
    }
}
