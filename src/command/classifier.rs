//! 指令分类器：原始输入 -> {退出, 控制结果, 原文, 展开后的提示词}
//!
//! visit / search 通过检索缓存调用外部协作方；知识库指令经 spawn_blocking 调用 KvStore。
//! 所有协作方的错误都在此处降级为 Control::Error，不会越过分类器边界。

use std::sync::Arc;

use serde_json::Value;

use crate::command::token::{normalize_input, tokenize, CommandKind, Token};
use crate::command::{usage, Control};
use crate::config::{AppConfig, Language};
use crate::memory::{normalize_key, RetrievalCache};
use crate::storage::{JsonRow, KvStore, SelectQuery, StorageError};
use crate::web::{concat_documents, AddressResolver, SearchCrawler};

/// 分类结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Classified {
    /// 结束会话
    Quit,
    /// 不经过模型的控制结果
    Control(Control),
    /// 原样发送给模型的文本
    Text(String),
    /// 指令展开后的提示词（canonical 历史记录展开文本，display 历史记录原文）
    Prompt(String),
}

/// 分类器的可调参数
#[derive(Clone, Debug)]
pub struct ClassifierOptions {
    pub language: Language,
    pub default_table: String,
    pub search_results: usize,
    pub max_chars: usize,
    pub tools_enabled: bool,
}

impl ClassifierOptions {
    pub fn from_config(cfg: &AppConfig) -> Self {
        Self {
            language: cfg.app.language,
            default_table: cfg.storage.default_table.clone(),
            search_results: cfg.search.results,
            max_chars: cfg.search.max_chars,
            tools_enabled: cfg.tools.enabled,
        }
    }
}

pub struct Classifier {
    options: ClassifierOptions,
    cache: RetrievalCache,
    resolver: Arc<dyn AddressResolver>,
    crawler: Arc<dyn SearchCrawler>,
    store: Arc<KvStore>,
    table: String,
    tools_enabled: bool,
}

/// SQL 是否为只读查询
pub fn is_read_query(sql: &str) -> bool {
    let head = sql
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == '(')
        .next()
        .unwrap_or_default()
        .to_ascii_uppercase();
    matches!(head.as_str(), "SELECT" | "WITH" | "PRAGMA" | "EXPLAIN" | "VALUES")
}

fn value_text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => String::new(),
        Some(other) => other.to_string(),
    }
}

/// 单行取 content；多行为 `key: content` 并以三个换行分隔
pub fn format_selected(rows: &[JsonRow]) -> String {
    match rows {
        [] => String::new(),
        [row] => match row.get("content") {
            Some(content) => value_text(Some(content)),
            None => Value::Object(row.clone()).to_string(),
        },
        _ => rows
            .iter()
            .map(|row| {
                format!(
                    "{}: {}\n\n\n",
                    value_text(row.get("key")),
                    value_text(row.get("content"))
                )
            })
            .collect(),
    }
}

fn wrap_reference(prompt: &str, document: &str) -> String {
    format!("[Answer Question]{prompt} based on [Document for Reference] {document}")
}

impl Classifier {
    /// 创建分类器并确保默认表存在
    pub fn new(
        options: ClassifierOptions,
        resolver: Arc<dyn AddressResolver>,
        crawler: Arc<dyn SearchCrawler>,
        store: Arc<KvStore>,
    ) -> Self {
        match store.create_table(&options.default_table) {
            Ok(()) | Err(StorageError::AlreadyExists(_)) => {}
            Err(e) => tracing::warn!(table = %options.default_table, error = %e, "default table unavailable"),
        }
        Self {
            table: options.default_table.clone(),
            tools_enabled: options.tools_enabled,
            options,
            cache: RetrievalCache::new(),
            resolver,
            crawler,
            store,
        }
    }

    pub fn language(&self) -> Language {
        self.options.language
    }

    pub fn tools_enabled(&self) -> bool {
        self.tools_enabled
    }

    pub fn set_tools_enabled(&mut self, enabled: bool) {
        self.tools_enabled = enabled;
    }

    /// 当前连接的表
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn store(&self) -> &Arc<KvStore> {
        &self.store
    }

    pub fn cache(&self) -> &RetrievalCache {
        &self.cache
    }

    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }

    /// 分类一条原始输入
    pub async fn classify(&mut self, raw: &str) -> Classified {
        let input = normalize_input(raw);
        match tokenize(&input) {
            Token::Plain => Classified::Text(raw.to_string()),
            Token::Malformed { reason, .. } => {
                tracing::debug!(reason = %reason, "malformed command");
                Classified::Control(Control::error(format!("Invalid command: {reason}")))
            }
            Token::Command { kind, first, second } => self.dispatch(kind, first, second).await,
        }
    }

    async fn dispatch(&mut self, kind: CommandKind, first: Option<String>, second: Option<String>) -> Classified {
        let first = first.unwrap_or_default();
        match kind {
            CommandKind::Quit => Classified::Quit,
            CommandKind::Syntax => Classified::Control(Control::Syntax {
                usage: usage::usage(self.options.language),
            }),
            CommandKind::Delete => Classified::Control(Control::Delete),
            CommandKind::DeleteAll => Classified::Control(Control::DeleteAll),
            CommandKind::ToolcallToggle => {
                self.tools_enabled = !self.tools_enabled;
                tracing::info!(enabled = self.tools_enabled, "tool calling toggled");
                Classified::Control(Control::ToolcallToggle {
                    enabled: self.tools_enabled,
                })
            }
            CommandKind::Visit => self.visit(&first, second.as_deref()).await,
            CommandKind::Search => self.search(&first, second.as_deref()).await,
            CommandKind::Connect => Classified::Control(self.connect(first).await),
            CommandKind::Locate => Classified::Control(self.locate(&first, second).await),
            CommandKind::Insert => Classified::Control(self.insert(first, second.unwrap_or_default()).await),
            CommandKind::Update => Classified::Control(self.update(first, second.unwrap_or_default()).await),
            CommandKind::Select => self.select(&first, second.as_deref().unwrap_or_default()).await,
            CommandKind::Query => self.query(first, second.as_deref().unwrap_or_default()).await,
        }
    }

    async fn visit(&mut self, address: &str, prompt: Option<&str>) -> Classified {
        let address = normalize_key(address);
        let content = match self.cache.visit(&address) {
            Some(hit) => hit.to_string(),
            None => match self.resolver.resolve(&address).await {
                Ok(Some(content)) => {
                    self.cache.store_visit(&address, content.clone());
                    content
                }
                Ok(None) => {
                    tracing::debug!(address = %address, "unresolvable address ignored");
                    return Classified::Control(Control::Ignored);
                }
                Err(e) => {
                    tracing::warn!(address = %address, error = %e, "visit failed");
                    return Classified::Control(Control::error(format!("Visit failed: {e}")));
                }
            },
        };
        let prompt = prompt.unwrap_or_else(|| usage::default_visit_prompt(self.options.language));
        Classified::Prompt(format!("{prompt}{address}? {content}{{Document}}: {content}"))
    }

    async fn search(&mut self, query: &str, prompt: Option<&str>) -> Classified {
        let query = normalize_key(query);
        let documents = match self.cache.search(&query) {
            Some(hit) => hit.to_vec(),
            None => match self.crawler.search(&query, self.options.search_results).await {
                Ok(docs) => {
                    self.cache.store_search(&query, docs.clone());
                    docs
                }
                Err(e) => {
                    tracing::warn!(query = %query, error = %e, "search failed");
                    return Classified::Control(Control::error(format!("Search failed: {e}")));
                }
            },
        };
        let prompt = prompt.unwrap_or_else(|| usage::default_search_prompt(self.options.language));
        Classified::Prompt(format!(
            "{prompt}{query}? {}",
            concat_documents(&documents, self.options.max_chars)
        ))
    }

    /// 在阻塞线程池中访问知识库
    async fn with_store<T, F>(&self, f: F) -> Result<T, StorageError>
    where
        F: FnOnce(&KvStore) -> Result<T, StorageError> + Send + 'static,
        T: Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(&store))
            .await
            .map_err(|e| StorageError::Blocking(e.to_string()))?
    }

    async fn connect(&mut self, table: String) -> Control {
        let table = match normalize_key(&table) {
            t if t.is_empty() => self.options.default_table.clone(),
            t => t,
        };
        let target = table.clone();
        match self.with_store(move |store| store.create_table(&target)).await {
            Ok(()) => {}
            Err(StorageError::AlreadyExists(_)) => tracing::debug!(table = %table, "table already exists"),
            Err(e) => return Control::error(format!("Connect failed: {e}")),
        }
        tracing::info!(table = %table, "connected");
        self.table = table.clone();
        Control::Connect { table }
    }

    async fn locate(&mut self, path: &str, table: Option<String>) -> Control {
        let path = normalize_key(path);
        let table = table
            .map(|t| normalize_key(&t))
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| self.options.default_table.clone());
        let (p, t) = (path.clone(), table.clone());
        let result = self.with_store(move |store| store.relocate(&p, &t)).await;
        match result {
            Ok(()) => {
                self.table = table.clone();
                Control::Locate { path, table }
            }
            Err(e) => Control::error(format!("Locate failed: {e}")),
        }
    }

    async fn insert(&mut self, key: String, content: String) -> Control {
        let table = self.table.clone();
        let k = key.clone();
        match self.with_store(move |store| store.insert(&table, &k, &content)).await {
            Ok(()) => tracing::info!(key = %key, "inserted"),
            Err(StorageError::Exists(_)) => tracing::warn!(key = %key, "key already exists, insert skipped"),
            Err(e) => return Control::error(format!("Insert failed: {e}")),
        }
        Control::Insert { key }
    }

    async fn update(&mut self, key: String, content: String) -> Control {
        let table = self.table.clone();
        let k = key.clone();
        let result = self
            .with_store(move |store| match store.update(&table, &k, &content) {
                Err(StorageError::Missing(_)) => {
                    tracing::warn!(key = %k, "key missing, falling back to insert");
                    store.insert(&table, &k, &content)
                }
                other => other,
            })
            .await;
        match result {
            Ok(()) => {
                tracing::info!(key = %key, "updated");
                Control::Update { key }
            }
            Err(e) => Control::error(format!("Update failed: {e}")),
        }
    }

    async fn select(&mut self, clause: &str, prompt: &str) -> Classified {
        let query = match SelectQuery::parse(&format!("\\select {} \\select", clause.trim())) {
            Ok(q) => q,
            Err(e) => return Classified::Control(Control::error(format!("Select failed: {e}"))),
        };
        let table = self.table.clone();
        match self.with_store(move |store| store.select(&query, &table)).await {
            Ok(rows) => Classified::Prompt(wrap_reference(prompt.trim(), &format_selected(&rows))),
            Err(e) => Classified::Control(Control::error(format!("Select failed: {e}"))),
        }
    }

    async fn query(&mut self, sql: String, prompt: &str) -> Classified {
        if is_read_query(&sql) {
            let s = sql.clone();
            match self.with_store(move |store| store.fetch_raw(&s)).await {
                Ok(rows) => {
                    let document = serde_json::to_string(&rows).unwrap_or_else(|_| "[]".to_string());
                    Classified::Prompt(wrap_reference(prompt.trim(), &document))
                }
                Err(e) => Classified::Control(Control::error(format!("Query failed: {e}"))),
            }
        } else {
            let s = sql.clone();
            match self.with_store(move |store| store.execute_raw(&s)).await {
                Ok(()) => {
                    tracing::info!(sql = %sql, "query executed");
                    Classified::Control(Control::Query { sql })
                }
                Err(e) => Classified::Control(Control::error(format!("Query failed: {e}"))),
            }
        }
    }
}
