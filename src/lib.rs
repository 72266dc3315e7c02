//! Parley - 对话指令分发与会话状态引擎
//!
//! 模块划分：
//! - **command**: 反斜杠指令的分词、分类与控制结果
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **core**: 对话引擎、轮次状态、工具调用子协议
//! - **history**: 外部转录与 OpenAI 请求体的回放
//! - **llm**: Chat Completion 客户端抽象与实现（OpenAI 兼容 / Mock）
//! - **memory**: 双投影会话日志、检索缓存与存档
//! - **storage**: SQLite 知识库（连接池、键值表、select DSL）
//! - **tools**: 模型可调用的工具与执行器
//! - **web**: 地址解析与搜索抓取

pub mod command;
pub mod config;
pub mod core;
pub mod history;
pub mod llm;
pub mod memory;
pub mod observability;
pub mod storage;
pub mod tools;
pub mod web;

pub use crate::core::{ChatEngine, EngineError, RoundKind, RoundOutcome};
