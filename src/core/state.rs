//! 轮次状态：阶段与每轮的结果
//!
//! 阶段随 send() 推进：Idle -> AwaitingModel -> (ToolLoop) -> RoundComplete；quit 进入 Terminated。

use serde::Serialize;

use crate::command::Control;

/// 引擎所处阶段
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum RoundPhase {
    #[default]
    Idle,
    AwaitingModel,
    ToolLoop,
    RoundComplete,
    Terminated,
}

/// 一轮的结果类别
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub enum RoundKind {
    /// 模型回复
    Chat,
    /// 控制指令（未调用模型）
    Control(Control),
    /// 调用模型或协作方失败；reply 为诊断文本
    Failed,
    /// 输入被忽略，未记录任何痕迹
    Ignored,
    /// 会话结束
    Terminated,
}

/// send() 的返回值
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct RoundOutcome {
    /// 本轮结束后的轮次号
    pub round: usize,
    pub reply: String,
    pub kind: RoundKind,
}

impl RoundOutcome {
    pub fn is_terminated(&self) -> bool {
        self.kind == RoundKind::Terminated
    }

    pub fn control(&self) -> Option<&Control> {
        match &self.kind {
            RoundKind::Control(c) => Some(c),
            _ => None,
        }
    }
}
