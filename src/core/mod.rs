//! 核心层：对话引擎、轮次状态、工具调用子协议与错误类型

pub mod engine;
pub mod error;
pub mod state;
pub mod tool_loop;

pub use engine::ChatEngine;
pub use error::EngineError;
pub use state::{RoundKind, RoundOutcome, RoundPhase};
pub use tool_loop::{run_tool_calls, ToolLoop, ToolRoundResult};
