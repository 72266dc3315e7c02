//! 反斜杠指令的表驱动分词
//!
//! 指令以 `\` 或 `\\` 开头，名称不区分大小写，且其后必须是空白或输入结尾。
//! 每条指令的参数形式由 RULES 中的 Arity 决定：
//!
//! - Flag：整条输入就是指令本身，否则视为普通文本
//! - Open：`\cmd 参数`（裸形式）或 `\cmd 参数 \cmd 提示词`（定界形式，提示词可为空）
//! - Connect：`\cmd`（默认表）或 `\cmd 表 \cmd`；裸形式带参数视为错误
//! - Locate：`\cmd 路径`（默认表）或 `\cmd 路径 \cmd 表`
//! - Pair：只接受定界形式 `\cmd 甲 \cmd 乙`，两个参数都不能为空
//!
//! 定界形式按指令名（不区分大小写）切分，必须恰好得到三段，否则为 Malformed。

use regex::Regex;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Quit,
    Syntax,
    Delete,
    DeleteAll,
    ToolcallToggle,
    Visit,
    Search,
    Connect,
    Locate,
    Insert,
    Update,
    Select,
    Query,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Arity {
    Flag,
    Open,
    Connect,
    Locate,
    Pair,
}

#[derive(Clone, Copy, Debug)]
pub struct Rule {
    pub name: &'static str,
    pub kind: CommandKind,
    pub arity: Arity,
}

pub const RULES: &[Rule] = &[
    Rule { name: "quit", kind: CommandKind::Quit, arity: Arity::Flag },
    Rule { name: "syntax", kind: CommandKind::Syntax, arity: Arity::Flag },
    Rule { name: "delete", kind: CommandKind::Delete, arity: Arity::Flag },
    Rule { name: "deleteall", kind: CommandKind::DeleteAll, arity: Arity::Flag },
    Rule { name: "toolcall-toggle", kind: CommandKind::ToolcallToggle, arity: Arity::Flag },
    Rule { name: "visit", kind: CommandKind::Visit, arity: Arity::Open },
    Rule { name: "search", kind: CommandKind::Search, arity: Arity::Open },
    Rule { name: "connect", kind: CommandKind::Connect, arity: Arity::Connect },
    Rule { name: "locate", kind: CommandKind::Locate, arity: Arity::Locate },
    Rule { name: "insert", kind: CommandKind::Insert, arity: Arity::Pair },
    Rule { name: "update", kind: CommandKind::Update, arity: Arity::Pair },
    Rule { name: "select", kind: CommandKind::Select, arity: Arity::Pair },
    Rule { name: "query", kind: CommandKind::Query, arity: Arity::Pair },
];

/// 分词结果
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Token {
    /// 不是指令，按原文处理
    Plain,
    /// 指令及其参数（各参数已去除首尾空白；缺省的可选参数为 None）
    Command {
        kind: CommandKind,
        first: Option<String>,
        second: Option<String>,
    },
    /// 是指令但参数形式不合法
    Malformed { kind: CommandKind, reason: String },
}

impl Token {
    fn command(kind: CommandKind, first: Option<String>, second: Option<String>) -> Self {
        Token::Command { kind, first, second }
    }

    fn malformed(kind: CommandKind, reason: impl Into<String>) -> Self {
        Token::Malformed {
            kind,
            reason: reason.into(),
        }
    }
}

/// 输入预处理：四个反斜杠的转义先还原为两个，再去除首尾空白
pub fn normalize_input(raw: &str) -> String {
    raw.replace("\\\\\\\\", "\\\\").trim().to_string()
}

/// 匹配输入开头的指令
fn match_rule(input: &str) -> Option<&'static Rule> {
    let rest = input
        .strip_prefix("\\\\")
        .or_else(|| input.strip_prefix('\\'))?;
    RULES.iter().find(|rule| {
        let n = rule.name.len();
        rest.get(..n).is_some_and(|head| head.eq_ignore_ascii_case(rule.name))
            && rest[n..].chars().next().map_or(true, char::is_whitespace)
    })
}

/// 按指令名切分（不区分大小写，指令后须为空白或结尾）
fn split_on_token(input: &str, name: &str) -> Option<Vec<String>> {
    let re = Regex::new(&format!(r"(?i)\\{{1,2}}{}(?:\s+|$)", regex::escape(name))).ok()?;
    Some(re.split(input).map(|s| s.trim().to_string()).collect())
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

/// 对预处理后的输入分词
pub fn tokenize(input: &str) -> Token {
    let input = input.trim();
    let Some(rule) = match_rule(input) else {
        return Token::Plain;
    };
    let kind = rule.kind;

    if rule.arity == Arity::Flag {
        let prefix_len = input.len() - input.trim_start_matches('\\').len();
        return if input.len() == prefix_len + rule.name.len() {
            Token::command(kind, None, None)
        } else {
            Token::Plain
        };
    }

    let Some(segments) = split_on_token(input, rule.name) else {
        return Token::malformed(kind, "invalid command pattern");
    };

    // 只出现一次：裸形式
    if segments.len() == 2 {
        let rest = non_empty(&segments[1]);
        return match (rule.arity, rest) {
            (Arity::Open, Some(arg)) | (Arity::Locate, Some(arg)) => Token::command(kind, Some(arg), None),
            (Arity::Open, None) | (Arity::Locate, None) => {
                Token::malformed(kind, format!("\\{} requires an argument", rule.name))
            }
            (Arity::Connect, None) => Token::command(kind, None, None),
            (Arity::Connect, Some(_)) => {
                Token::malformed(kind, format!("\\{} TABLE must be closed by \\{}", rule.name, rule.name))
            }
            _ => Token::malformed(
                kind,
                format!("usage: \\{0} ARG \\{0} CONTENT", rule.name),
            ),
        };
    }

    if segments.len() != 3 {
        return Token::malformed(
            kind,
            format!("\\{} must appear exactly twice, found {}", rule.name, segments.len() - 1),
        );
    }

    let first = non_empty(&segments[1]);
    let second = non_empty(&segments[2]);
    match (rule.arity, first, second) {
        (_, None, _) => Token::malformed(kind, format!("\\{} requires a non-empty argument", rule.name)),
        (Arity::Pair, Some(_), None) => {
            Token::malformed(kind, format!("\\{} requires a non-empty second argument", rule.name))
        }
        (_, Some(first), second) => Token::command(kind, Some(first), second),
    }
}
