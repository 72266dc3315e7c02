//! 搜索与抓取：按引擎抓取结果页中的前 k 个链接，逐个抓取并提取可读文本
//!
//! HTML 使用 html2text 提取文本，失败时回退为简易去标签；单个页面抓取失败只记日志并跳过。

use async_trait::async_trait;
use html2text::from_read;
use regex::Regex;
use reqwest::{Client, Url};
use std::sync::OnceLock;
use std::time::Duration;

use crate::config::{SearchEngine, SearchSection};
use crate::web::WebError;

/// 搜索/抓取协作方
#[async_trait]
pub trait SearchCrawler: Send + Sync {
    /// 搜索 query 并抓取前 k 个结果，返回各页面的文本
    async fn search(&self, query: &str, k: usize) -> Result<Vec<String>, WebError>;

    /// 抓取单个 URL 的可读文本
    async fn crawl(&self, url: &str) -> Result<String, WebError>;
}

/// 按编号模板拼接文档并截断到 max_chars 个字符
pub fn concat_documents(documents: &[String], max_chars: usize) -> String {
    let joined: String = documents
        .iter()
        .enumerate()
        .map(|(i, doc)| format!("###Document No{}\n\n{}", i + 1, doc))
        .collect();
    if joined.chars().count() > max_chars {
        joined.chars().take(max_chars).collect()
    } else {
        joined
    }
}

/// 简易去除 HTML 标签（html2text 失败时的回退）
fn strip_html_tags(html: &str) -> String {
    let mut out = String::with_capacity(html.len());
    let mut in_tag = false;
    for c in html.chars() {
        match c {
            '<' => in_tag = true,
            '>' => {
                in_tag = false;
                out.push(' ');
            }
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }
    out.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// 判断内容是否像 HTML
fn looks_like_html(s: &str) -> bool {
    let s = s.trim_start();
    s.starts_with("<!")
        || s.get(..5).is_some_and(|head| head.eq_ignore_ascii_case("<html"))
        || (s.contains('<') && (s.contains("</") || s.contains("<meta") || s.contains("<head")))
}

fn html_to_text(html: &str) -> String {
    match from_read(html.as_bytes(), 120) {
        Ok(text) if !text.trim().is_empty() => text.split_whitespace().collect::<Vec<_>>().join(" "),
        _ => strip_html_tags(html),
    }
}

fn bing_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"(?s)<li class="b_algo"[^>]*>.*?<h2[^>]*>\s*<a[^>]*href="([^"]+)""#)
            .unwrap_or_else(|_| unreachable!())
    })
}

fn ddg_link_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r#"<a[^>]*class="result__a"[^>]*href="([^"]+)""#).unwrap_or_else(|_| unreachable!())
    })
}

/// 从 Bing 结果页提取 `li.b_algo h2 > a` 的链接
pub fn extract_bing_links(html: &str, k: usize) -> Vec<String> {
    bing_link_re()
        .captures_iter(html)
        .filter_map(|c| c.get(1).map(|m| m.as_str().replace("&amp;", "&")))
        .filter(|href| href.starts_with("http"))
        .take(k)
        .collect()
}

/// 从 DuckDuckGo HTML 结果页提取链接（解码 `uddg` 跳转参数）
pub fn extract_duckduckgo_links(html: &str, k: usize) -> Vec<String> {
    ddg_link_re()
        .captures_iter(html)
        .filter_map(|c| c.get(1))
        .filter_map(|m| {
            let href = m.as_str().replace("&amp;", "&");
            let absolute = if href.starts_with("//") {
                format!("https:{href}")
            } else {
                href
            };
            let url = Url::parse(&absolute).ok()?;
            let target = url
                .query_pairs()
                .find(|(name, _)| name == "uddg")
                .map(|(_, value)| value.into_owned());
            Some(target.unwrap_or(absolute))
        })
        .take(k)
        .collect()
}

/// 基于 reqwest 的默认实现
pub struct WebCrawler {
    client: Client,
    engine: SearchEngine,
}

impl WebCrawler {
    pub fn new(engine: SearchEngine, timeout_secs: u64) -> Self {
        const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/131.0.0.0 Safari/537.36";
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .user_agent(USER_AGENT)
            .build()
            .unwrap_or_default();
        Self { client, engine }
    }

    pub fn from_config(section: &SearchSection) -> Self {
        Self::new(section.engine, section.timeout_secs)
    }

    async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String, WebError> {
        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| WebError::Request(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(WebError::Status(resp.status().as_u16()));
        }
        let body = resp.text().await.map_err(|e| WebError::Request(e.to_string()))?;
        Ok(body.trim_start_matches('\u{FEFF}').to_string())
    }

    async fn result_links(&self, query: &str, k: usize) -> Result<Vec<String>, WebError> {
        match self.engine {
            SearchEngine::Bing => {
                let html = self
                    .get_text("https://www.bing.com/search", &[("q", query.to_string()), ("count", k.to_string())])
                    .await?;
                Ok(extract_bing_links(&html, k))
            }
            SearchEngine::Duckduckgo => {
                let html = self
                    .get_text("https://html.duckduckgo.com/html/", &[("q", query.to_string())])
                    .await?;
                Ok(extract_duckduckgo_links(&html, k))
            }
        }
    }
}

#[async_trait]
impl SearchCrawler for WebCrawler {
    async fn search(&self, query: &str, k: usize) -> Result<Vec<String>, WebError> {
        let links = self.result_links(query, k).await?;
        tracing::info!(query, found = links.len(), "search results");
        let mut documents = Vec::with_capacity(links.len());
        for link in links {
            match self.crawl(&link).await {
                Ok(text) if !text.is_empty() => documents.push(text),
                Ok(_) => {}
                Err(e) => tracing::warn!(url = %link, error = %e, "crawl failed, skipped"),
            }
        }
        Ok(documents)
    }

    async fn crawl(&self, url: &str) -> Result<String, WebError> {
        tracing::debug!(url, "crawl");
        let body = self.get_text(url, &[]).await?;
        Ok(if looks_like_html(&body) {
            html_to_text(&body)
        } else {
            body
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_concat_documents_numbering_and_truncation() {
        let docs = vec!["alpha".to_string(), "beta".to_string()];
        assert_eq!(
            concat_documents(&docs, 1000),
            "###Document No1\n\nalpha###Document No2\n\nbeta"
        );
        assert_eq!(concat_documents(&docs, 5), "###Do");
        assert_eq!(concat_documents(&[], 10), "");
    }

    #[test]
    fn test_extract_bing_links() {
        let html = r#"<ol><li class="b_algo" data-x="1"><h2><a href="https://a.example/x?y=1&amp;z=2">A</a></h2></li>
<li class="b_ad"><h2><a href="https://ad.example">Ad</a></h2></li>
<li class="b_algo"><h2><a href="https://b.example">B</a></h2></li></ol>"#;
        assert_eq!(
            extract_bing_links(html, 5),
            vec!["https://a.example/x?y=1&z=2".to_string(), "https://b.example".to_string()]
        );
        assert_eq!(extract_bing_links(html, 1).len(), 1);
    }

    #[test]
    fn test_extract_duckduckgo_links_decodes_redirect() {
        let html = r#"<a rel="nofollow" class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fdocs.rs%2Fserde&amp;rut=abc">serde</a>"#;
        assert_eq!(extract_duckduckgo_links(html, 3), vec!["https://docs.rs/serde".to_string()]);
    }

    #[test]
    fn test_html_detection_and_stripping() {
        assert!(looks_like_html("<!DOCTYPE html><html></html>"));
        assert!(!looks_like_html("plain text"));
        assert_eq!(strip_html_tags("<p>Hello</p><p>world</p>"), "Hello world");
    }
}
