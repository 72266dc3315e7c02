//! visit_address 工具：读取本地文件 / 目录或网页内容

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::memory::normalize_key;
use crate::tools::schema::{parameters_schema, VisitAddressArgs};
use crate::tools::{Tool, ToolReply};
use crate::web::AddressResolver;

pub struct VisitAddressTool {
    resolver: Arc<dyn AddressResolver>,
}

impl VisitAddressTool {
    pub fn new(resolver: Arc<dyn AddressResolver>) -> Self {
        Self { resolver }
    }
}

#[async_trait]
impl Tool for VisitAddressTool {
    fn name(&self) -> &str {
        "visit_address"
    }

    fn description(&self) -> &str {
        "Read a local file, list a local directory, or fetch the text of a web page."
    }

    fn parameters_schema(&self) -> Value {
        parameters_schema::<VisitAddressArgs>()
    }

    async fn execute(&self, args: Value) -> Result<ToolReply, String> {
        let args: VisitAddressArgs = serde_json::from_value(args).map_err(|e| format!("Invalid arguments: {e}"))?;
        let address = normalize_key(&args.address);
        match self.resolver.resolve(&address).await {
            Ok(Some(content)) => Ok(ToolReply::success(address, content)),
            Ok(None) => Ok(ToolReply::error(format!("Visitor error: Invalid input arg {address}"))),
            Err(e) => Ok(ToolReply::error(format!("Visitor error: {e}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::web::WebError;

    struct OnlyDocs;

    #[async_trait]
    impl AddressResolver for OnlyDocs {
        async fn resolve(&self, address: &str) -> Result<Option<String>, WebError> {
            Ok((address == "docs").then(|| "document body".to_string()))
        }
    }

    #[tokio::test]
    async fn test_visit_reports_success_and_error() {
        let tool = VisitAddressTool::new(Arc::new(OnlyDocs));
        let ok = tool.execute(serde_json::json!({"address": "\"docs\""})).await.unwrap();
        assert_eq!(ok.status, "success");
        assert_eq!(ok.content.as_deref(), Some("document body"));

        let missing = tool.execute(serde_json::json!({"address": "nope"})).await.unwrap();
        assert_eq!(missing.status, "error");

        assert!(tool.execute(serde_json::json!({"url": "x"})).await.is_err());
    }
}
