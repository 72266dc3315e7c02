//! 检索缓存：visit（地址 -> 内容）与 search（查询 -> 文档列表）两个独立的写一次缓存
//!
//! 键经过 normalize_key（去首尾空白与成对引号）；空键不缓存。无淘汰、无过期，
//! 适用于单个有界会话；长时间运行的服务需要自行调用 clear。

use std::collections::HashMap;

/// 去掉首尾空白，再去掉一对包裹的单/双引号
pub fn normalize_key(raw: &str) -> String {
    let s = raw.trim();
    let unquoted = ['"', '\'']
        .iter()
        .find_map(|q| {
            if s.len() >= 2 && s.starts_with(*q) && s.ends_with(*q) {
                Some(&s[1..s.len() - 1])
            } else {
                None
            }
        })
        .unwrap_or(s);
    unquoted.to_string()
}

#[derive(Debug, Default)]
pub struct RetrievalCache {
    visit: HashMap<String, String>,
    search: HashMap<String, Vec<String>>,
}

impl RetrievalCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn visit(&self, key: &str) -> Option<&str> {
        self.visit.get(key).map(String::as_str)
    }

    /// 写入 visit 缓存；已存在的键保持不变
    pub fn store_visit(&mut self, key: &str, content: String) {
        if key.is_empty() {
            return;
        }
        self.visit.entry(key.to_string()).or_insert(content);
    }

    pub fn search(&self, key: &str) -> Option<&[String]> {
        self.search.get(key).map(Vec::as_slice)
    }

    /// 写入 search 缓存；已存在的键保持不变
    pub fn store_search(&mut self, key: &str, documents: Vec<String>) {
        if key.is_empty() {
            return;
        }
        self.search.entry(key.to_string()).or_insert(documents);
    }

    pub fn clear(&mut self) {
        self.visit.clear();
        self.search.clear();
    }

    pub fn len(&self) -> (usize, usize) {
        (self.visit.len(), self.search.len())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_key() {
        assert_eq!(normalize_key("  \"a b\" "), "a b");
        assert_eq!(normalize_key("'x'"), "x");
        assert_eq!(normalize_key("\"mismatched'"), "\"mismatched'");
        assert_eq!(normalize_key("\""), "\"");
    }

    #[test]
    fn test_write_once_per_key() {
        let mut cache = RetrievalCache::new();
        cache.store_visit("k", "first".into());
        cache.store_visit("k", "second".into());
        assert_eq!(cache.visit("k"), Some("first"));
        assert!(cache.search("k").is_none());

        cache.store_search("", vec!["ignored".into()]);
        assert_eq!(cache.len(), (1, 0));

        cache.clear();
        assert!(cache.visit("k").is_none());
    }
}
