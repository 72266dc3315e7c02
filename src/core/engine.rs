//! 对话引擎：一轮 = 分类输入 -> 记录历史 ->（可选）请求模型 ->（可选）工具轮次 -> 完成
//!
//! 同一时刻只允许一轮在进行（pending 标志，无队列、无取消）。模型、抓取、解析等协作方的失败
//! 在轮次边界转换为诊断文本，作为本轮回复返回，轮次号照常推进。

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::command::{Classified, Classifier, ClassifierOptions, Control};
use crate::config::AppConfig;
use crate::core::state::{RoundKind, RoundOutcome, RoundPhase};
use crate::core::tool_loop::ToolLoop;
use crate::core::EngineError;
use crate::history::{steps_from_openai_body, steps_from_transcript, ReplayOptions, ReplayStep, Replayed, TranscriptTurn};
use crate::llm::{
    collect_stream, create_client_from_config, message_to_json, ChatClient, InferenceParams, LlmError,
    RequestBuilder,
};
use crate::memory::{Message, ResponseRecord, Role, SaveFile, Session, ToolCall};
use crate::storage::KvStore;
use crate::tools::{default_registry, Tool, ToolExecutor};
use crate::web::{AddressResolver, LocalResolver, SearchCrawler, WebCrawler};

/// 轮次进行中标志；离开作用域（包括 future 被丢弃）时自动清除
struct PendingGuard {
    flag: Arc<AtomicBool>,
}

impl PendingGuard {
    fn acquire(flag: &Arc<AtomicBool>) -> Result<Self, EngineError> {
        flag.compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map_err(|_| EngineError::ReplyPending)?;
        Ok(Self { flag: flag.clone() })
    }
}

impl Drop for PendingGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

pub struct ChatEngine {
    id: Uuid,
    config: AppConfig,
    client: Arc<dyn ChatClient>,
    classifier: Classifier,
    executor: ToolExecutor,
    session: Session,
    builder: RequestBuilder,
    pending: Arc<AtomicBool>,
    phase: RoundPhase,
    token_sink: Option<broadcast::Sender<String>>,
}

impl ChatEngine {
    /// 由已构造的协作方创建引擎；默认注册 web_search 与 visit_address 工具
    pub fn new(
        config: AppConfig,
        client: Arc<dyn ChatClient>,
        resolver: Arc<dyn AddressResolver>,
        crawler: Arc<dyn SearchCrawler>,
        store: Arc<KvStore>,
    ) -> Self {
        let registry = default_registry(crawler.clone(), resolver.clone(), &config.search);
        let executor = ToolExecutor::new(registry, config.tools.tool_timeout_secs);
        let classifier = Classifier::new(ClassifierOptions::from_config(&config), resolver, crawler, store);
        let session = Session::new(config.app.resolved_system_prompt());
        let builder = RequestBuilder::new(config.llm.model.clone(), config.inference.clone());
        let id = Uuid::new_v4();
        tracing::info!(session = %id, model = %config.llm.model, "chat engine created");
        Self {
            id,
            config,
            client,
            classifier,
            executor,
            session,
            builder,
            pending: Arc::new(AtomicBool::new(false)),
            phase: RoundPhase::Idle,
            token_sink: None,
        }
    }

    /// 按配置创建全部默认协作方
    pub fn from_config(config: AppConfig) -> Result<Self, EngineError> {
        let client = create_client_from_config(&config);
        let crawler: Arc<dyn SearchCrawler> = Arc::new(WebCrawler::from_config(&config.search));
        let resolver: Arc<dyn AddressResolver> = Arc::new(LocalResolver::new(crawler.clone()));
        let store = Arc::new(KvStore::open(
            &config.storage.database,
            config.storage.pool_size,
            Duration::from_secs(config.storage.acquire_timeout_secs),
        )?);
        Ok(Self::new(config, client, resolver, crawler, store))
    }

    /// 流式回复时把每个 Token 转发到 sink
    pub fn with_token_sink(mut self, sink: broadcast::Sender<String>) -> Self {
        self.token_sink = Some(sink);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn classifier(&self) -> &Classifier {
        &self.classifier
    }

    pub fn register_tool(&mut self, tool: Arc<dyn Tool>) {
        tracing::info!(tool = tool.name(), "tool registered");
        self.executor.register(tool);
    }

    pub fn tool_names(&self) -> Vec<String> {
        self.executor.tool_names()
    }

    pub fn set_params(&mut self, params: InferenceParams) {
        *self.builder.params_mut() = params;
    }

    pub fn params_mut(&mut self) -> &mut InferenceParams {
        self.builder.params_mut()
    }

    pub fn tools_enabled(&self) -> bool {
        self.classifier.tools_enabled()
    }

    pub fn set_tools_enabled(&mut self, enabled: bool) {
        self.classifier.set_tools_enabled(enabled);
    }

    pub fn is_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst)
    }

    /// 共享的进行中标志，供外层界面在加锁前判断
    pub fn pending_flag(&self) -> Arc<AtomicBool> {
        self.pending.clone()
    }

    /// 执行一轮；仅在上一轮尚未结束时返回 Err(ReplyPending)
    pub async fn send(&mut self, raw: &str) -> Result<RoundOutcome, EngineError> {
        let _guard = PendingGuard::acquire(&self.pending)?;
        self.phase = RoundPhase::Idle;

        let outcome = match self.classifier.classify(raw).await {
            Classified::Quit => {
                self.phase = RoundPhase::Terminated;
                tracing::info!(session = %self.id, "session terminated");
                RoundOutcome {
                    round: self.session.round(),
                    reply: String::new(),
                    kind: RoundKind::Terminated,
                }
            }
            Classified::Control(Control::Ignored) => {
                tracing::info!(session = %self.id, "input ignored");
                RoundOutcome {
                    round: self.session.round(),
                    reply: String::new(),
                    kind: RoundKind::Ignored,
                }
            }
            Classified::Control(control) => self.finish_control(control),
            Classified::Text(text) | Classified::Prompt(text) => {
                self.session.log_mut().push_split(Role::User, text, raw);
                self.chat_round().await
            }
        };
        Ok(outcome)
    }

    /// 控制指令：不请求模型，直接完成本轮
    fn finish_control(&mut self, control: Control) -> RoundOutcome {
        if control.truncates_history() {
            self.session.truncate_to_system();
        }
        let reply = control.reply();
        self.session.record_response(ResponseRecord::new(None, reply.clone()));
        let round = self.session.complete_round();
        self.phase = RoundPhase::RoundComplete;
        tracing::info!(session = %self.id, round, control = ?control, "control round complete");
        RoundOutcome {
            round,
            reply,
            kind: RoundKind::Control(control),
        }
    }

    /// 假设 user 消息已记录：请求模型并完成本轮
    async fn chat_round(&mut self) -> RoundOutcome {
        self.phase = RoundPhase::AwaitingModel;
        match self.request_completion().await {
            Ok((tool_calls, content)) => {
                tracing::debug!(session = %self.id, content = %content, "model reply");
                self.session.record_response(ResponseRecord::new(tool_calls, content.clone()));
                self.session.log_mut().push(Message::assistant(content.clone()));
                let round = self.session.complete_round();
                self.phase = RoundPhase::RoundComplete;
                tracing::info!(session = %self.id, round, "chat round complete");
                RoundOutcome {
                    round,
                    reply: content,
                    kind: RoundKind::Chat,
                }
            }
            Err(e) => {
                tracing::warn!(session = %self.id, error = %e, "round failed");
                let round = self.session.complete_round();
                self.phase = RoundPhase::RoundComplete;
                RoundOutcome {
                    round,
                    reply: Control::error(e.to_string()).reply(),
                    kind: RoundKind::Failed,
                }
            }
        }
    }

    /// 请求模型；开启工具且模型返回调用时进入工具轮次
    async fn request_completion(&mut self) -> Result<(Option<Vec<ToolCall>>, String), EngineError> {
        let specs = if self.classifier.tools_enabled() {
            self.executor.specs()
        } else {
            Vec::new()
        };
        let tools_on = !specs.is_empty();
        let request = self.builder.build(&self.session, specs);

        if self.config.llm.stream && !tools_on {
            let secs = self.config.llm.timeouts.stream;
            let client = self.client.as_ref();
            let sink = self.token_sink.as_ref();
            let text = tokio::time::timeout(Duration::from_secs(secs), async {
                let tokens = client.complete_stream(&request).await?;
                collect_stream(tokens, sink).await
            })
            .await
            .map_err(|_| LlmError::Timeout(secs))??;
            return Ok((None, text));
        }

        let secs = self.config.llm.timeouts.request;
        let completion = tokio::time::timeout(Duration::from_secs(secs), self.client.complete(&request))
            .await
            .map_err(|_| LlmError::Timeout(secs))??;

        if completion.tool_calls.is_empty() {
            return Ok((None, completion.content));
        }
        if !tools_on {
            tracing::warn!(count = completion.tool_calls.len(), "tool calls returned while tool calling is off, ignored");
            return Ok((None, completion.content));
        }

        self.phase = RoundPhase::ToolLoop;
        let tool_loop = ToolLoop::new(
            self.client.as_ref(),
            &self.executor,
            &self.builder,
            Duration::from_secs(secs),
        );
        let result = tool_loop.run(&mut self.session, &completion).await?;
        Ok((Some(completion.tool_calls), result.content))
    }

    /// 逐行读取输入并执行，直到 quit 或输入结束；每轮结果交给 on_reply
    pub async fn run_loop<R, F>(&mut self, lines: R, mut on_reply: F) -> Result<(), EngineError>
    where
        R: AsyncBufRead + Unpin,
        F: FnMut(&RoundOutcome),
    {
        let mut lines = lines.lines();
        while let Some(line) = lines.next_line().await? {
            if line.trim().is_empty() {
                continue;
            }
            let outcome = self.send(&line).await?;
            on_reply(&outcome);
            if outcome.is_terminated() {
                break;
            }
        }
        Ok(())
    }

    pub fn export(&self) -> SaveFile {
        self.session.export()
    }

    /// 导入存档；标记不符时保留当前状态并返回 false
    pub fn import(&mut self, save: SaveFile) -> bool {
        let ok = self.session.import(save);
        if ok {
            tracing::info!(session = %self.id, round = self.session.round(), "session imported");
        } else {
            tracing::warn!(session = %self.id, "save file rejected, keeping current session");
        }
        ok
    }

    pub fn save_to(&self, path: impl AsRef<Path>) -> Result<(), EngineError> {
        let path = path.as_ref();
        self.export()
            .write_to(path)
            .map_err(|e| EngineError::Persistence(e.to_string()))?;
        tracing::info!(path = %path.display(), "session saved");
        Ok(())
    }

    pub fn load_from(&mut self, path: impl AsRef<Path>) -> bool {
        match SaveFile::read_from(path.as_ref()) {
            Some(save) => self.import(save),
            None => {
                tracing::warn!(path = %path.as_ref().display(), "no valid save file");
                false
            }
        }
    }

    /// 清空历史；system 提示词重置为配置值，keep_system 为 false 时不保留 system 消息
    pub fn clear_messages(&mut self, keep_system: bool) {
        self.session
            .clear(&self.config.app.resolved_system_prompt(), keep_system);
        self.phase = RoundPhase::Idle;
    }

    pub fn clear_caches(&mut self) {
        self.classifier.clear_cache();
    }

    /// 回放保存的转录；转录为空时返回 None 且不改变会话
    pub async fn replay_transcript(
        &mut self,
        turns: &[TranscriptTurn],
        options: ReplayOptions,
    ) -> Result<Option<Replayed>, EngineError> {
        if turns.is_empty() {
            return Ok(None);
        }
        let steps = steps_from_transcript(turns);
        self.replay(steps, options).await.map(Some)
    }

    /// 回放 OpenAI 兼容请求体，返回 messages 替换为 canonical 历史后的请求体
    pub async fn replay_openai_body(
        &mut self,
        body: &Value,
        options: ReplayOptions,
    ) -> Result<(Value, Replayed), EngineError> {
        if body.as_object().map_or(false, |o| o.is_empty()) {
            return Ok((Value::Object(Default::default()), Replayed::default()));
        }
        let steps = steps_from_openai_body(body)?;
        let replayed = self.replay(steps, options).await?;
        let mut rewritten = body.clone();
        rewritten["messages"] = Value::Array(self.session.canonical().iter().map(message_to_json).collect());
        Ok((rewritten, replayed))
    }

    async fn replay(&mut self, steps: Vec<ReplayStep>, options: ReplayOptions) -> Result<Replayed, EngineError> {
        let _guard = PendingGuard::acquire(&self.pending)?;
        self.clear_messages(false);

        let total = steps.len();
        let mut replayed = Replayed::default();
        for (i, step) in steps.into_iter().enumerate() {
            let is_final = i + 1 == total;
            match step {
                ReplayStep::System(text) => {
                    self.session.set_system_prompt(text.clone());
                    self.session.log_mut().push(Message::system(text));
                }
                ReplayStep::User(raw) => {
                    match self.classifier.classify(&raw).await {
                        Classified::Quit => tracing::debug!("quit skipped during replay"),
                        Classified::Control(Control::Ignored) => self.session.log_mut().push(Message::user(raw)),
                        Classified::Control(control) => {
                            if control.truncates_history() {
                                self.session.truncate_to_system();
                            }
                            self.session.log_mut().push(Message::user(raw));
                            let reply = control.reply();
                            self.session.record_response(ResponseRecord::new(None, reply.clone()));
                            let round = self.session.complete_round();
                            replayed.rounds += 1;
                            if is_final {
                                self.session.log_mut().push(Message::assistant(reply.clone()));
                                replayed.final_round = Some(RoundOutcome {
                                    round,
                                    reply,
                                    kind: RoundKind::Control(control),
                                });
                            }
                        }
                        Classified::Text(text) | Classified::Prompt(text) => {
                            self.session.log_mut().push_split(Role::User, text, raw);
                            if is_final && options.complete_final {
                                let outcome = self.chat_round().await;
                                replayed.rounds += 1;
                                replayed.final_round = Some(outcome);
                            }
                        }
                    }
                }
                ReplayStep::Assistant(text) => {
                    self.session.record_response(ResponseRecord::new(None, text.clone()));
                    self.session.complete_round();
                    replayed.rounds += 1;
                    self.session.log_mut().push(Message::assistant(text));
                }
            }
        }
        self.phase = RoundPhase::Idle;
        tracing::info!(session = %self.id, rounds = replayed.rounds, "history replayed");
        Ok(replayed)
    }
}
