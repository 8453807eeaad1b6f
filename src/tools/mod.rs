pub mod executor;
pub mod limiter;
pub mod registry;
pub mod search;

pub use executor::ToolExecutor;
pub use limiter::{CallLimitedTool, CALL_LIMIT_REACHED};
pub use registry::{Tool, ToolRegistry};
pub use search::{
    SearchBackend, SearchDigest, SearchEntry, SearchTool, TavilyBackend, SEARCH_UNAVAILABLE,
    TAVILY_ENDPOINT,
};
