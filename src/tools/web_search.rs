//! web_search 工具：搜索并抓取前 k 个结果，拼接为编号文档

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::schema::{parameters_schema, WebSearchArgs};
use crate::tools::{Tool, ToolReply};
use crate::web::{concat_documents, SearchCrawler};

pub struct WebSearchTool {
    crawler: Arc<dyn SearchCrawler>,
    results: usize,
    max_chars: usize,
}

impl WebSearchTool {
    pub fn new(crawler: Arc<dyn SearchCrawler>, results: usize, max_chars: usize) -> Self {
        Self {
            crawler,
            results,
            max_chars,
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the internet for up-to-date information and return the text of the top results."
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema::<WebSearchArgs>()
    }

    async fn execute(&self, args: Value) -> Result<ToolReply, String> {
        let args: WebSearchArgs = serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {e}"))?;
        let query = args.search_query.trim();
        if query.is_empty() {
            return Ok(ToolReply::error("Web searching error: empty search_query"));
        }
        match self.crawler.search(query, self.results).await {
            Ok(documents) => Ok(ToolReply::success(query, concat_documents(&documents, self.max_chars))),
            Err(e) => Ok(ToolReply::error(format!("Web searching error: {e}"))),
        }
    }
}
