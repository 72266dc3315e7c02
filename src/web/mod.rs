//! 外部内容：地址解析（文件 / 目录 / URL）与搜索抓取

pub mod crawler;
pub mod resolver;

use thiserror::Error;

pub use crawler::{concat_documents, extract_bing_links, extract_duckduckgo_links, SearchCrawler, WebCrawler};
pub use resolver::{classify_address, csv_to_markdown, AddressKind, AddressResolver, LocalResolver};

#[derive(Error, Debug)]
pub enum WebError {
    #[error("Request failed: {0}")]
    Request(String),

    #[error("HTTP {0}")]
    Status(u16),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(String),
}
