//! 知识库查询 DSL
//!
//! 语法：`\select 条件 [\columns 列, 列] [\from 表] \select`
//!
//! - 条件按 `,` 分为若干组，组内按 `|` 分为候选；每组取第一个命中的候选（短路）
//! - 候选含 `?` 时为模糊匹配：`?` 替换为 `%` 后作为 LIKE 模式；否则为精确匹配
//! - `\columns` 与 `\from` 可任意顺序出现，均可省略

use std::sync::OnceLock;

use regex::Regex;

use crate::storage::StorageError;

/// 主键匹配方式
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeyMatcher {
    Exact(String),
    Like(String),
}

impl KeyMatcher {
    fn parse(candidate: &str) -> Self {
        if candidate.contains('?') {
            KeyMatcher::Like(candidate.replace('?', "%").trim().to_string())
        } else {
            KeyMatcher::Exact(candidate.to_string())
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SelectQuery {
    pub groups: Vec<Vec<KeyMatcher>>,
    pub columns: Option<Vec<String>>,
    pub table: Option<String>,
}

fn envelope() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"(?is)^\s*\\{1,2}select\b(?P<body>.*?)\\{1,2}select\s*$").unwrap_or_else(|_| unreachable!())
    })
}

fn clause_marker() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?i)\\{1,2}(columns|from)\b").unwrap_or_else(|_| unreachable!()))
}

impl SelectQuery {
    pub fn parse(input: &str) -> Result<Self, StorageError> {
        let caps = envelope()
            .captures(input)
            .ok_or_else(|| StorageError::InvalidQuery(format!("expected \\select ... \\select, got: {input}")))?;
        let body = caps.name("body").map(|m| m.as_str()).unwrap_or_default();

        let markers: Vec<_> = clause_marker().captures_iter(body).collect();
        let conditions_end = markers
            .first()
            .and_then(|c| c.get(0))
            .map(|m| m.start())
            .unwrap_or(body.len());

        let mut columns = None;
        let mut table = None;
        for (i, cap) in markers.iter().enumerate() {
            let (Some(whole), Some(kind)) = (cap.get(0), cap.get(1)) else {
                continue;
            };
            let end = markers
                .get(i + 1)
                .and_then(|next| next.get(0))
                .map(|m| m.start())
                .unwrap_or(body.len());
            let value = body[whole.end()..end].trim();
            if kind.as_str().eq_ignore_ascii_case("columns") {
                let list: Vec<String> = value
                    .split(',')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(String::from)
                    .collect();
                if columns.is_none() && !list.is_empty() {
                    columns = Some(list);
                }
            } else if table.is_none() && !value.is_empty() {
                table = Some(value.to_string());
            }
        }

        let groups: Vec<Vec<KeyMatcher>> = body[..conditions_end]
            .split(',')
            .map(|group| {
                group
                    .split('|')
                    .map(str::trim)
                    .filter(|c| !c.is_empty())
                    .map(KeyMatcher::parse)
                    .collect::<Vec<_>>()
            })
            .filter(|g| !g.is_empty())
            .collect();
        if groups.is_empty() {
            return Err(StorageError::InvalidQuery("empty select conditions".into()));
        }

        Ok(Self { groups, columns, table })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_groups_and_wildcards() {
        let q = SelectQuery::parse(r"\select 1 | 3, name? , ?tail \select").unwrap();
        assert_eq!(
            q.groups,
            vec![
                vec![KeyMatcher::Exact("1".into()), KeyMatcher::Exact("3".into())],
                vec![KeyMatcher::Like("name%".into())],
                vec![KeyMatcher::Like("%tail".into())],
            ]
        );
        assert!(q.columns.is_none());
        assert!(q.table.is_none());
    }

    #[test]
    fn test_parse_optional_clauses_any_order() {
        let q = SelectQuery::parse(r"\SELECT a \from users \columns key, content \select").unwrap();
        assert_eq!(q.table.as_deref(), Some("users"));
        assert_eq!(q.columns, Some(vec!["key".to_string(), "content".to_string()]));
        assert_eq!(q.groups, vec![vec![KeyMatcher::Exact("a".into())]]);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(SelectQuery::parse(r"\select a").is_err());
        assert!(SelectQuery::parse(r"\select  , | \select").is_err());
    }
}
