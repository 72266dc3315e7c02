//! 按语言区分的提示词与用法文本

use crate::config::Language;

/// 默认 system 提示词
pub fn default_system_prompt(language: Language) -> &'static str {
    match language {
        Language::En => "You are a helpful assistant. Answer in Markdown.",
        Language::Cn => "你是一个乐于助人的助手，请使用 Markdown 回答。",
    }
}

/// `\visit` 未指定提示词时使用
pub fn default_visit_prompt(language: Language) -> &'static str {
    match language {
        Language::En => "Given the following document or website that the user provided, answer in detail using Markdown. The document may be unformatted, extract the useful content. ",
        Language::Cn => "请根据我提供的文档或者网页来回答用户提出的问题，使用Markdown输出。文档可能较为混杂，请提炼有用的内容。 ",
    }
}

/// `\search` 未指定提示词时使用
pub fn default_search_prompt(language: Language) -> &'static str {
    match language {
        Language::En => "Summarize the following content in detail and answer the question using Markdown. Ignore documents you cannot read. ",
        Language::Cn => "详细总结下面的内容来回答用户提出的问题，使用Markdown输出。忽略你无法分析的文档。 ",
    }
}

const USAGE_EN: &[&str] = &[
    "Special commands:",
    r"`\quit` ends the conversation",
    r"`\syntax` prints this help",
    r"`\delete` deletes the previous round",
    r"`\deleteall` deletes the whole chat history",
    r"`\toolcall-toggle` switches model tool calling on or off",
    r"`\visit ADDR [\visit PROMPT]` reads a web page, local file or folder and answers with PROMPT",
    r"`\search QUERY [\search PROMPT]` searches the internet for QUERY and answers with PROMPT",
    r"`\locate DBPATH [\locate TABLE]` switches to another database file",
    r"`\connect` connects to the default table, creating it if missing",
    r"`\connect TABLE \connect` connects to TABLE, creating it if missing",
    r"`\insert KEY \insert DATA` adds DATA under KEY to the current table",
    r"`\update KEY \update DATA` replaces the DATA stored under KEY",
    r"`\select KEYS \select PROMPT` looks up KEYS (`,` groups, `|` alternatives, `?` wildcard) and answers with PROMPT",
    r"`\query SQL \query PROMPT` runs SQL against the current database and answers with PROMPT",
];

const USAGE_CN: &[&str] = &[
    "特殊指令如下：",
    r"`\quit` 结束对话",
    r"`\syntax` 打印本说明",
    r"`\delete` 删除上一轮的聊天内容",
    r"`\deleteall` 删除本次聊天的全部内容",
    r"`\toolcall-toggle` 开启或关闭模型工具调用",
    r"`\visit 地址 [\visit 提示词]` 访问网页、本地文件或文件夹，并以提示词提问",
    r"`\search 关键词 [\search 提示词]` 联网搜索关键词，并以提示词提问",
    r"`\locate 数据库路径 [\locate 表]` 切换到另一个数据库文件",
    r"`\connect` 连接默认表，不存在时创建",
    r"`\connect 表 \connect` 连接指定的表，不存在时创建",
    r"`\insert 主键 \insert 数据` 向当前表新增数据",
    r"`\update 主键 \update 数据` 修改当前表中主键对应的数据",
    r"`\select 主键 \select 提示词` 按主键检索（`,` 分组，`|` 备选，`?` 通配），并以提示词提问",
    r"`\query SQL \query 提示词` 以标准 SQL 访问当前数据库，并以提示词提问",
];

/// 用法说明（Markdown 硬换行）
pub fn usage(language: Language) -> String {
    let lines = match language {
        Language::En => USAGE_EN,
        Language::Cn => USAGE_CN,
    };
    lines.join("  \n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_usage_mentions_every_command() {
        for lang in [Language::En, Language::Cn] {
            let text = usage(lang);
            for rule in crate::command::token::RULES {
                assert!(text.contains(&format!("\\{}", rule.name)), "{} missing", rule.name);
            }
        }
    }

    #[test]
    fn test_default_prompts_end_with_separator() {
        for lang in [Language::En, Language::Cn] {
            assert!(default_visit_prompt(lang).ends_with(' '));
            assert!(default_search_prompt(lang).ends_with(' '));
        }
    }
}
