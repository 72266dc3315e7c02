//! 工具层：模型可调用的函数工具、注册表与执行器

pub mod executor;
pub mod registry;
pub mod schema;
pub mod visitor;
pub mod web_search;

use std::sync::Arc;

pub use executor::ToolExecutor;
pub use registry::{Tool, ToolRegistry, ToolReply};
pub use schema::{parameters_schema, VisitAddressArgs, WebSearchArgs};
pub use visitor::VisitAddressTool;
pub use web_search::WebSearchTool;

use crate::config::SearchSection;
use crate::web::{AddressResolver, SearchCrawler};

/// 默认工具集：web_search 与 visit_address
pub fn default_registry(
    crawler: Arc<dyn SearchCrawler>,
    resolver: Arc<dyn AddressResolver>,
    search: &SearchSection,
) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Arc::new(WebSearchTool::new(crawler, search.results, search.max_chars)));
    registry.register(Arc::new(VisitAddressTool::new(resolver)));
    registry
}
