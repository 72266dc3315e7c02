//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `PARLEY__*` 覆盖（双下划线表示嵌套，如 `PARLEY__LLM__MODEL=gpt-4o`）。

use std::path::PathBuf;

use serde::Deserialize;

use crate::llm::InferenceParams;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub app: AppSection,
    pub llm: LlmSection,
    /// 可选推理参数；未设置的字段不进入请求体
    pub inference: InferenceParams,
    pub search: SearchSection,
    pub storage: StorageSection,
    pub tools: ToolsSection,
}

/// 提示词与用法文本的语言
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    #[default]
    En,
    Cn,
}

/// [app] 段：名称、语言、调试、system 提示词、退出时存档路径
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppSection {
    pub name: String,
    pub language: Language,
    pub debug: bool,
    /// 未设置时使用与语言对应的默认提示词
    pub system_prompt: Option<String>,
    /// 设置后 REPL 退出时写入存档，启动时尝试读取
    pub save_path: Option<PathBuf>,
}

impl Default for AppSection {
    fn default() -> Self {
        Self {
            name: "parley".to_string(),
            language: Language::En,
            debug: false,
            system_prompt: None,
            save_path: None,
        }
    }
}

impl AppSection {
    /// 实际使用的 system 提示词
    pub fn resolved_system_prompt(&self) -> String {
        self.system_prompt
            .clone()
            .unwrap_or_else(|| crate::command::usage::default_system_prompt(self.language).to_string())
    }
}

/// [llm] 段：后端、模型、端点、是否流式、超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmSection {
    /// openai（任意 OpenAI 兼容端点）/ mock
    pub provider: String,
    pub model: String,
    pub base_url: Option<String>,
    /// API Key；未设置时读取 OPENAI_API_KEY
    pub api_key: Option<String>,
    pub stream: bool,
    pub timeouts: LlmTimeoutsSection,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "gpt-4o-mini".to_string(),
            base_url: None,
            api_key: None,
            stream: false,
            timeouts: LlmTimeoutsSection::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LlmTimeoutsSection {
    pub request: u64,
    pub stream: u64,
}

impl Default for LlmTimeoutsSection {
    fn default() -> Self {
        Self {
            request: 60,
            stream: 120,
        }
    }
}

/// 搜索引擎
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchEngine {
    #[default]
    Bing,
    Duckduckgo,
}

/// [search] 段：引擎、结果数、拼接上限、抓取超时
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SearchSection {
    pub engine: SearchEngine,
    pub results: usize,
    /// 拼接后文档的最大字符数
    pub max_chars: usize,
    pub timeout_secs: u64,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            engine: SearchEngine::Bing,
            results: 5,
            max_chars: 65536,
            timeout_secs: 15,
        }
    }
}

/// [storage] 段：SQLite 知识库路径、默认表、连接池
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    pub database: PathBuf,
    pub default_table: String,
    pub pool_size: usize,
    pub acquire_timeout_secs: u64,
}

impl Default for StorageSection {
    fn default() -> Self {
        Self {
            database: PathBuf::from("./database/user_database.db"),
            default_table: "user_primary".to_string(),
            pool_size: 5,
            acquire_timeout_secs: 5,
        }
    }
}

/// [tools] 段：是否启用工具调用、单次工具超时（0 表示不限时）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct ToolsSection {
    pub enabled: bool,
    pub tool_timeout_secs: u64,
}

/// 从 config 目录加载配置，环境变量 PARLEY__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 PARLEY__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    for name in ["config/default", "../config/default", "default"] {
        if std::path::Path::new(&format!("{name}.toml")).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(path) = config_path.filter(|p| p.exists()) {
        builder = builder.add_source(config::File::from(path).required(false));
    }

    builder = builder.add_source(
        config::Environment::with_prefix("PARLEY")
            .separator("__")
            .try_parsing(true),
    );

    builder.build()?.try_deserialize()
}
