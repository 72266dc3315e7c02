//! 地址解析：判断地址是文件、目录、URL 还是无法识别，并读取为 Markdown 文本
//!
//! - 文件：json 渲染为代码块，csv 渲染为表格，其余按文本读取（换行转为 Markdown 硬换行）
//! - 目录：列出第一层条目 `'路径', 类型, 大小`
//! - URL（http/https/ftp）：交给 SearchCrawler 抓取
//! - 其余：返回 None，由指令层忽略

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use reqwest::Url;
use walkdir::WalkDir;

use crate::web::{SearchCrawler, WebError};

/// 地址的分类结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AddressKind {
    File(PathBuf),
    Directory(PathBuf),
    Url(String),
    Unknown,
}

/// 地址解析协作方
#[async_trait]
pub trait AddressResolver: Send + Sync {
    /// 解析地址为文本；无法识别时返回 Ok(None)
    async fn resolve(&self, address: &str) -> Result<Option<String>, WebError>;
}

/// 对地址分类（不读取内容）
pub fn classify_address(address: &str) -> AddressKind {
    let address = address.trim();
    if address.is_empty() {
        return AddressKind::Unknown;
    }
    let local = match Url::parse(address) {
        Ok(url) => match url.scheme() {
            "http" | "https" | "ftp" => return AddressKind::Url(address.to_string()),
            "file" => match url.to_file_path() {
                Ok(path) => path,
                Err(()) => return AddressKind::Unknown,
            },
            _ => PathBuf::from(address),
        },
        Err(_) => PathBuf::from(address),
    };
    if local.is_dir() {
        AddressKind::Directory(local)
    } else if local.is_file() {
        AddressKind::File(local)
    } else {
        AddressKind::Unknown
    }
}

/// CSV 文本转 Markdown 表格（首行为表头）
pub fn csv_to_markdown(text: &str) -> String {
    let rows: Vec<Vec<&str>> = text
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.split(',').map(str::trim).collect())
        .collect();
    let Some((header, body)) = rows.split_first() else {
        return String::new();
    };
    let mut out = format!("| {} |\n", header.join(" | "));
    out.push_str(&format!("|{}\n", " --- |".repeat(header.len())));
    for row in body {
        out.push_str(&format!("| {} |\n", row.join(" | ")));
    }
    out
}

async fn read_file(path: &Path) -> Result<String, WebError> {
    let bytes = tokio::fs::read(path).await?;
    let text = String::from_utf8_lossy(&bytes).into_owned();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_lowercase)
        .unwrap_or_default();
    Ok(match ext.as_str() {
        "json" => {
            let value: serde_json::Value =
                serde_json::from_str(&text).map_err(|e| WebError::Parse(format!("{}: {}", path.display(), e)))?;
            let pretty = serde_json::to_string_pretty(&value).map_err(|e| WebError::Parse(e.to_string()))?;
            format!("```json\n{pretty}\n```")
        }
        "csv" => csv_to_markdown(&text),
        _ => text.replace('\n', "  \n"),
    })
}

/// 目录第一层条目，按名称排序
fn list_directory(path: &Path) -> String {
    let mut lines: Vec<String> = WalkDir::new(path)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(Result::ok)
        .map(|entry| {
            let is_dir = entry.file_type().is_dir();
            let size = if is_dir {
                0
            } else {
                entry.metadata().map(|m| m.len()).unwrap_or(0)
            };
            format!(
                "'{}', {}, {}",
                entry.path().display(),
                if is_dir { "folder" } else { "file" },
                size
            )
        })
        .collect();
    if lines.is_empty() {
        lines.push(format!("'{}' is empty", path.display()));
    }
    lines.join("  \n")
}

/// 默认实现：本地文件系统 + 网页抓取
pub struct LocalResolver {
    crawler: Arc<dyn SearchCrawler>,
}

impl LocalResolver {
    pub fn new(crawler: Arc<dyn SearchCrawler>) -> Self {
        Self { crawler }
    }
}

#[async_trait]
impl AddressResolver for LocalResolver {
    async fn resolve(&self, address: &str) -> Result<Option<String>, WebError> {
        match classify_address(address) {
            AddressKind::File(path) => read_file(&path).await.map(Some),
            AddressKind::Directory(path) => {
                let listing = tokio::task::spawn_blocking(move || list_directory(&path))
                    .await
                    .map_err(|e| WebError::Request(e.to_string()))?;
                Ok(Some(listing))
            }
            AddressKind::Url(url) => self.crawler.crawl(&url).await.map(Some),
            AddressKind::Unknown => Ok(None),
        }
    }
}
