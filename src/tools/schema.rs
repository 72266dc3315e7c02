//! 工具参数 JSON Schema（schemars 自动生成）
//!
//! 生成的根 schema 去掉 `$schema` 与 `title` 后作为函数声明的 parameters。

use schemars::{schema_for, JsonSchema};
use serde::Deserialize;
use serde_json::Value;

/// web_search 的参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct WebSearchArgs {
    /// 搜索关键词，尽量简短并包含核心实体
    pub search_query: String,
}

/// visit_address 的参数
#[derive(Debug, Deserialize, JsonSchema)]
pub struct VisitAddressArgs {
    /// 本地文件/目录路径或 http(s) URL
    pub address: String,
}

/// 生成类型 T 的参数 schema
pub fn parameters_schema<T: JsonSchema>() -> Value {
    let schema = schema_for!(T);
    let mut value = serde_json::to_value(&schema).unwrap_or_else(|_| serde_json::json!({"type": "object"}));
    if let Some(obj) = value.as_object_mut() {
        obj.remove("$schema");
        obj.remove("title");
    }
    value
}
