//! Web 搜索工具适配器
//!
//! 对外只有一个调用：search(query) -> String，永不向外抛错：
//! - 未配置 API Key：返回固定的 SEARCH_UNAVAILABLE；
//! - 传输 / 提供方失败：返回 `error: <原因>`，长度受 error_chars 限制；
//! - 成功：至多 max_results 条 `title: snippet`，snippet 超过 snippet_chars 截断，逐行拼接。
//! 结果的解读完全交给调用它的专家模型。

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::SearchSection;
use crate::tools::Tool;

pub const SEARCH_UNAVAILABLE: &str = "Search unavailable: no search API key configured.";
pub const TAVILY_ENDPOINT: &str = "https://api.tavily.com/search";

/// 单条搜索结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchEntry {
    pub title: String,
    pub snippet: String,
}

/// 一次搜索的摘要：有序结果，或 unavailable / error 哨兵
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SearchDigest {
    Results {
        query: String,
        entries: Vec<SearchEntry>,
    },
    Unavailable,
    Error(String),
}

impl SearchDigest {
    /// 渲染为交给模型的文本
    pub fn render(&self, snippet_chars: usize, error_chars: usize) -> String {
        match self {
            SearchDigest::Unavailable => SEARCH_UNAVAILABLE.to_string(),
            SearchDigest::Error(cause) => truncate_chars(&format!("error: {}", cause), error_chars),
            SearchDigest::Results { query, entries } if entries.is_empty() => {
                format!("No results found for '{}'.", query)
            }
            SearchDigest::Results { entries, .. } => entries
                .iter()
                .map(|e| format!("{}: {}", e.title.trim(), truncate_chars(e.snippet.trim(), snippet_chars)))
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

/// 按字符数截断，超出时追加 "..."
pub fn truncate_chars(s: &str, max_chars: usize) -> String {
    if s.chars().count() > max_chars {
        format!("{}...", s.chars().take(max_chars).collect::<String>())
    } else {
        s.to_string()
    }
}

/// 搜索提供方（第三方 API 边界）
#[async_trait]
pub trait SearchBackend: Send + Sync {
    async fn query(&self, query: &str, max_results: usize) -> Result<Vec<SearchEntry>, String>;
}

#[derive(Debug, Serialize)]
struct TavilySearchRequest<'a> {
    api_key: &'a str,
    query: &'a str,
    max_results: usize,
    search_depth: &'a str,
    include_raw_content: bool,
}

#[derive(Debug, Deserialize)]
struct TavilySearchResponse {
    #[serde(default)]
    results: Vec<TavilyResult>,
}

#[derive(Debug, Deserialize)]
struct TavilyResult {
    #[serde(default)]
    title: String,
    #[serde(default)]
    content: String,
}

/// Tavily 搜索 API 客户端
pub struct TavilyBackend {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl TavilyBackend {
    pub fn new(endpoint: impl Into<String>, api_key: impl Into<String>, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs.max(1)))
            .build()
            .unwrap_or_default();
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
        }
    }
}

#[async_trait]
impl SearchBackend for TavilyBackend {
    async fn query(&self, query: &str, max_results: usize) -> Result<Vec<SearchEntry>, String> {
        let body = TavilySearchRequest {
            api_key: &self.api_key,
            query,
            max_results,
            search_depth: "basic",
            include_raw_content: false,
        };
        let resp = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| format!("request failed: {}", e))?;
        if !resp.status().is_success() {
            return Err(format!("HTTP {}", resp.status()));
        }
        let parsed: TavilySearchResponse = resp
            .json()
            .await
            .map_err(|e| format!("invalid response: {}", e))?;
        Ok(parsed
            .results
            .into_iter()
            .map(|r| SearchEntry {
                title: r.title,
                snippet: r.content,
            })
            .collect())
    }
}

/// 搜索工具：backend 为 None 表示未配置凭据
pub struct SearchTool {
    backend: Option<Arc<dyn SearchBackend>>,
    max_results: usize,
    snippet_chars: usize,
    error_chars: usize,
}

impl SearchTool {
    pub fn new(
        backend: Option<Arc<dyn SearchBackend>>,
        max_results: usize,
        snippet_chars: usize,
        error_chars: usize,
    ) -> Self {
        Self {
            backend,
            max_results: max_results.max(1),
            snippet_chars,
            error_chars,
        }
    }

    /// 从配置创建：API Key 取自 section.api_key，或 section.api_key_env 指定的环境变量
    pub fn from_config(section: &SearchSection) -> Self {
        let api_key = section
            .api_key
            .clone()
            .or_else(|| std::env::var(&section.api_key_env).ok())
            .filter(|k| !k.trim().is_empty());
        let backend: Option<Arc<dyn SearchBackend>> = match api_key {
            Some(key) => Some(Arc::new(TavilyBackend::new(
                section.endpoint.clone(),
                key,
                section.timeout_secs,
            ))),
            None => {
                tracing::warn!(env = %section.api_key_env, "search API key not set, web search unavailable");
                None
            }
        };
        Self::new(backend, section.max_results, section.snippet_chars, section.error_chars)
    }

    /// 执行搜索并返回结构化摘要
    pub async fn digest(&self, query: &str) -> SearchDigest {
        let Some(backend) = &self.backend else {
            return SearchDigest::Unavailable;
        };
        let query = query.trim();
        if query.is_empty() {
            return SearchDigest::Error("empty query".to_string());
        }
        match backend.query(query, self.max_results).await {
            Ok(mut entries) => {
                entries.truncate(self.max_results);
                SearchDigest::Results {
                    query: query.to_string(),
                    entries,
                }
            }
            Err(cause) => {
                tracing::warn!(query = %query, error = %cause, "web search failed");
                SearchDigest::Error(cause)
            }
        }
    }

    /// 执行搜索并渲染为文本；永不失败
    pub async fn search(&self, query: &str) -> String {
        self.digest(query)
            .await
            .render(self.snippet_chars, self.error_chars)
    }
}

#[async_trait]
impl Tool for SearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web for current information. Returns the top results as `title: snippet` lines. Args: {\"query\": \"...\"}."
    }

    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "query": {"type": "string", "description": "Search query"}
            },
            "required": ["query"]
        })
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let query = args.get("query").and_then(|v| v.as_str()).unwrap_or("");
        tracing::info!(query = %query, "web search");
        Ok(self.search(query).await)
    }
}
