//! 会话状态：会话日志、每轮响应记录、轮次计数
//!
//! 轮次生命周期与并发保护由 ChatEngine 负责，这里只保存数据与清空/快照操作。

use crate::memory::{Message, ResponseRecord, SaveFile, SessionLog};

#[derive(Clone, Debug)]
pub struct Session {
    log: SessionLog,
    responses: Vec<ResponseRecord>,
    round: usize,
    system_prompt: String,
}

impl Session {
    pub fn new(system_prompt: impl Into<String>) -> Self {
        let system_prompt = system_prompt.into();
        Self {
            log: SessionLog::seeded(&system_prompt),
            responses: Vec::new(),
            round: 0,
            system_prompt,
        }
    }

    pub fn log(&self) -> &SessionLog {
        &self.log
    }

    pub fn log_mut(&mut self) -> &mut SessionLog {
        &mut self.log
    }

    pub fn canonical(&self) -> Vec<Message> {
        self.log.canonical()
    }

    pub fn display(&self) -> Vec<Message> {
        self.log.display()
    }

    pub fn responses(&self) -> &[ResponseRecord] {
        &self.responses
    }

    pub fn record_response(&mut self, record: ResponseRecord) {
        self.responses.push(record);
    }

    pub fn round(&self) -> usize {
        self.round
    }

    /// 完成一轮（无论成功、失败还是控制指令），返回新的轮次号
    pub fn complete_round(&mut self) -> usize {
        self.round += 1;
        self.round
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// 替换 system 提示词（历史转换时由外部转录提供）
    pub fn set_system_prompt(&mut self, prompt: impl Into<String>) {
        self.system_prompt = prompt.into();
    }

    /// 两条历史都回退到只剩第一条（system）消息
    pub fn truncate_to_system(&mut self) {
        self.log.truncate(1);
    }

    /// 清空历史与响应记录，system 提示词重置为 default_prompt；keep_system 为 false 时历史完全为空
    pub fn clear(&mut self, default_prompt: &str, keep_system: bool) {
        self.system_prompt = default_prompt.to_string();
        self.responses.clear();
        self.round = 0;
        self.log = if keep_system {
            SessionLog::seeded(default_prompt)
        } else {
            SessionLog::new()
        };
    }

    /// 导出为带魔术标记的存档
    pub fn export(&self) -> SaveFile {
        SaveFile::new(self.log.canonical(), self.log.display(), self.responses.clone())
    }

    /// 导入存档：标记不符或两份历史无法对齐时返回 false，保留当前状态
    pub fn import(&mut self, save: SaveFile) -> bool {
        if !save.is_valid() {
            return false;
        }
        let (canonical, display, responses) = save.into_parts();
        let Some(log) = SessionLog::from_projections(canonical, display) else {
            return false;
        };
        if let Some(first) = log.entries().first() {
            if first.role == crate::memory::Role::System {
                self.system_prompt = first.canonical.clone();
            }
        }
        self.round = responses.len();
        self.responses = responses;
        self.log = log;
        true
    }
}
