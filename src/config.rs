//! 应用配置：从 config/default.toml 与环境变量加载
//!
//! 加载顺序：先读 TOML 文件，再用环境变量 `WAYFARER__*` 覆盖（双下划线表示嵌套，如 `WAYFARER__COORDINATOR__POLICY=sequential`）。
//! API Key 本身不写进配置文件，只配置读取哪个环境变量。

use std::path::PathBuf;

use serde::Deserialize;

use crate::tools::TAVILY_ENDPOINT;

/// 应用配置根（对应 config/default.toml 的顶层）
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub llm: LlmSection,
    pub coordinator: CoordinatorSection,
    pub specialists: SpecialistsSection,
    pub tools: ToolsSection,
}

/// [llm] 段：后端选择、模型与超时
#[derive(Debug, Clone, Deserialize)]
pub struct LlmSection {
    /// 后端：gemini / openai / mock
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// 覆盖后端默认的 base_url（自建代理等）
    pub base_url: Option<String>,
    /// 读取模型 API Key 的环境变量名；未设置时按 provider 取 GEMINI_API_KEY / OPENAI_API_KEY
    pub api_key_env: Option<String>,
    /// 单次模型调用超时（秒）
    #[serde(default = "default_llm_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for LlmSection {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            base_url: None,
            api_key_env: None,
            request_timeout_secs: default_llm_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}

fn default_model() -> String {
    crate::llm::GEMINI_FLASH_LITE.to_string()
}

fn default_llm_timeout_secs() -> u64 {
    60
}

/// [coordinator] 段：编排策略与轮次预算
#[derive(Debug, Clone, Deserialize)]
pub struct CoordinatorSection {
    /// parallel：单轮并发委派；sequential：按 Planner → Budget → LocalGuide → Research 逐个委派
    #[serde(default = "default_policy")]
    pub policy: String,
    /// 协调者最多思考 / 委派的轮数，超出即整请求失败
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
    /// 是否强制结构化输出（parallel 策略始终强制）
    #[serde(default = "default_true")]
    pub enforce_schema: bool,
    /// 整个规划请求的超时（秒）
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// 单个专家调用的超时（秒）
    #[serde(default = "default_specialist_timeout_secs")]
    pub specialist_timeout_secs: u64,
    /// 是否提供 Research 专家
    #[serde(default = "default_true")]
    pub enable_research: bool,
}

impl Default for CoordinatorSection {
    fn default() -> Self {
        Self {
            policy: default_policy(),
            max_turns: default_max_turns(),
            enforce_schema: true,
            request_timeout_secs: default_request_timeout_secs(),
            specialist_timeout_secs: default_specialist_timeout_secs(),
            enable_research: true,
        }
    }
}

fn default_policy() -> String {
    "parallel".to_string()
}

fn default_max_turns() -> usize {
    10
}

fn default_true() -> bool {
    true
}

fn default_request_timeout_secs() -> u64 {
    180
}

fn default_specialist_timeout_secs() -> u64 {
    90
}

/// [specialists] 段：专家内部的工具轮数与搜索授权
#[derive(Debug, Clone, Deserialize)]
pub struct SpecialistsSection {
    /// 单次专家调用内最多的模型轮数（含工具调用后的续答）
    #[serde(default = "default_specialist_max_turns")]
    pub max_turns: usize,
    #[serde(default)]
    pub planner_search: bool,
    #[serde(default)]
    pub local_guide_search: bool,
    /// 每个请求内 Research 专家可发起的搜索次数
    #[serde(default = "default_research_search_limit")]
    pub research_search_limit: usize,
    /// Planner / LocalGuide 获授权时每个请求内的搜索次数
    #[serde(default = "default_search_limit")]
    pub search_limit: usize,
}

impl Default for SpecialistsSection {
    fn default() -> Self {
        Self {
            max_turns: default_specialist_max_turns(),
            planner_search: false,
            local_guide_search: false,
            research_search_limit: default_research_search_limit(),
            search_limit: default_search_limit(),
        }
    }
}

fn default_specialist_max_turns() -> usize {
    3
}

fn default_research_search_limit() -> usize {
    1
}

fn default_search_limit() -> usize {
    2
}

/// [tools] 段
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ToolsSection {
    #[serde(default)]
    pub search: SearchSection,
}

/// [tools.search] 段：Tavily 端点、凭据来源与摘要长度
#[derive(Debug, Clone, Deserialize)]
pub struct SearchSection {
    #[serde(default = "default_search_endpoint")]
    pub endpoint: String,
    #[serde(default = "default_search_key_env")]
    pub api_key_env: String,
    /// 直接给出的 Key（优先于环境变量，主要用于测试）
    pub api_key: Option<String>,
    #[serde(default = "default_max_results")]
    pub max_results: usize,
    #[serde(default = "default_snippet_chars")]
    pub snippet_chars: usize,
    #[serde(default = "default_error_chars")]
    pub error_chars: usize,
    #[serde(default = "default_search_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SearchSection {
    fn default() -> Self {
        Self {
            endpoint: default_search_endpoint(),
            api_key_env: default_search_key_env(),
            api_key: None,
            max_results: default_max_results(),
            snippet_chars: default_snippet_chars(),
            error_chars: default_error_chars(),
            timeout_secs: default_search_timeout_secs(),
        }
    }
}

fn default_search_endpoint() -> String {
    TAVILY_ENDPOINT.to_string()
}

fn default_search_key_env() -> String {
    "TAVILY_API_KEY".to_string()
}

fn default_max_results() -> usize {
    3
}

fn default_snippet_chars() -> usize {
    200
}

fn default_error_chars() -> usize {
    200
}

fn default_search_timeout_secs() -> u64 {
    15
}

/// 从 config 目录加载配置，环境变量 WAYFARER__* 可覆盖
///
/// 1. 按顺序查找 config/default.toml、../config/default.toml、default.toml，找到则作为第一源
/// 2. 若传入 config_path 且文件存在，则追加该文件（可覆盖前面的键）
/// 3. 最后叠加环境变量 WAYFARER__*（双下划线表示嵌套键）
pub fn load_config(config_path: Option<PathBuf>) -> Result<AppConfig, config::ConfigError> {
    let mut builder = config::Config::builder();

    let default_names = ["config/default", "../config/default", "default"];
    for name in default_names {
        let path = format!("{}.toml", name);
        if std::path::Path::new(&path).exists() {
            builder = builder.add_source(config::File::with_name(name).required(false));
            break;
        }
    }

    if let Some(ref path) = config_path {
        if path.exists() {
            builder = builder.add_source(config::File::from(path.clone()).required(false));
        } else {
            tracing::warn!(path = %path.display(), "config file not found, ignoring");
        }
    }

    builder = builder.add_source(
        config::Environment::with_prefix("WAYFARER")
            .separator("__")
            .try_parsing(true),
    );

    let c = builder.build()?;
    c.try_deserialize()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_defaults() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.llm.provider, "gemini");
        assert_eq!(cfg.llm.model, "gemini-2.5-flash-lite");
        assert_eq!(cfg.coordinator.max_turns, 10);
        assert_eq!(cfg.coordinator.policy, "parallel");
        assert_eq!(cfg.specialists.research_search_limit, 1);
        assert_eq!(cfg.tools.search.max_results, 3);
        assert_eq!(cfg.tools.search.api_key_env, "TAVILY_API_KEY");
    }

    #[test]
    fn test_load_from_file_overrides_defaults() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "[coordinator]\npolicy = \"sequential\"\nmax_turns = 4\n\n[tools.search]\nsnippet_chars = 80\n"
        )
        .unwrap();

        let cfg = load_config(Some(file.path().to_path_buf())).unwrap();
        assert_eq!(cfg.coordinator.policy, "sequential");
        assert_eq!(cfg.coordinator.max_turns, 4);
        assert!(cfg.coordinator.enforce_schema);
        assert_eq!(cfg.tools.search.snippet_chars, 80);
        assert_eq!(cfg.tools.search.max_results, 3);
        assert_eq!(cfg.llm.provider, "gemini");
    }
}
