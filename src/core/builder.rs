//! 组件构建：统一的初始化逻辑
//!
//! 从 AppConfig 创建模型客户端、搜索工具、专家阵容与协调者，CLI 与库调用方共用这一条路径。

use std::sync::Arc;

use crate::config::AppConfig;
use crate::coordinator::{Coordinator, CoordinatorSettings};
use crate::core::AgentError;
use crate::llm::{create_gemini_client, LlmClient, MockLlmClient, OpenAiClient};
use crate::specialists::default_roster;
use crate::tools::{SearchTool, Tool};

/// 根据 [llm] 段选择后端（gemini / openai / mock）；非 mock 后端缺少 API Key 视为配置错误
pub fn create_llm_from_config(cfg: &AppConfig) -> Result<Arc<dyn LlmClient>, AgentError> {
    let provider = cfg.llm.provider.trim().to_lowercase();
    if provider == "mock" {
        tracing::warn!("Using Mock LLM");
        return Ok(Arc::new(MockLlmClient::new()));
    }

    let key_env = match (&cfg.llm.api_key_env, provider.as_str()) {
        (Some(env), _) => env.clone(),
        (None, "gemini") => "GEMINI_API_KEY".to_string(),
        (None, "openai") => "OPENAI_API_KEY".to_string(),
        (None, other) => {
            return Err(AgentError::Config(format!("unknown llm provider '{}'", other)));
        }
    };
    let api_key = std::env::var(&key_env)
        .ok()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| AgentError::Config(format!("model API key not set (expected env {})", key_env)))?;

    let timeout = cfg.llm.request_timeout_secs;
    match provider.as_str() {
        "gemini" => {
            tracing::info!(model = %cfg.llm.model, "Using Gemini LLM");
            let client = match cfg.llm.base_url.as_deref() {
                Some(base) => OpenAiClient::new(Some(base), &cfg.llm.model, &api_key).with_timeout(timeout),
                None => create_gemini_client(&api_key, Some(&cfg.llm.model), timeout),
            };
            Ok(Arc::new(client))
        }
        "openai" => {
            tracing::info!(model = %cfg.llm.model, "Using OpenAI-compatible LLM");
            Ok(Arc::new(
                OpenAiClient::new(cfg.llm.base_url.as_deref(), &cfg.llm.model, &api_key).with_timeout(timeout),
            ))
        }
        other => Err(AgentError::Config(format!("unknown llm provider '{}'", other))),
    }
}

/// 搜索工具；凭据缺失时仍返回工具，调用时得到 unavailable 提示
pub fn create_search_tool(cfg: &AppConfig) -> Arc<dyn Tool> {
    Arc::new(SearchTool::from_config(&cfg.tools.search))
}

/// 用给定模型与搜索工具组装协调者
pub fn build_coordinator(
    cfg: &AppConfig,
    llm: Arc<dyn LlmClient>,
    search: Option<Arc<dyn Tool>>,
) -> Result<Coordinator, AgentError> {
    let settings = CoordinatorSettings::from_config(&cfg.coordinator)?;
    let specialists = default_roster(
        &cfg.specialists,
        llm.clone(),
        search,
        cfg.coordinator.enable_research,
    );
    tracing::debug!(
        policy = ?settings.policy,
        specialists = specialists.len(),
        "coordinator assembled"
    );
    Ok(Coordinator::new(llm, specialists, settings))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_provider_needs_no_key() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "mock".to_string();
        assert!(create_llm_from_config(&cfg).is_ok());
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let mut cfg = AppConfig::default();
        cfg.llm.api_key_env = Some("WAYFARER_TEST_KEY_THAT_IS_NEVER_SET".to_string());
        let err = create_llm_from_config(&cfg).err().unwrap();
        assert!(matches!(err, AgentError::Config(_)));
    }

    #[test]
    fn test_unknown_provider() {
        let mut cfg = AppConfig::default();
        cfg.llm.provider = "carrier-pigeon".to_string();
        assert!(matches!(
            create_llm_from_config(&cfg),
            Err(AgentError::Config(_))
        ));
    }

    #[test]
    fn test_build_coordinator_respects_research_switch() {
        let mut cfg = AppConfig::default();
        cfg.coordinator.enable_research = false;
        let llm: Arc<dyn LlmClient> = Arc::new(MockLlmClient::new());
        let coordinator = build_coordinator(&cfg, llm.clone(), None).unwrap();
        assert_eq!(coordinator.specialists().len(), 3);

        cfg.coordinator.enable_research = true;
        let coordinator = build_coordinator(&cfg, llm, None).unwrap();
        assert_eq!(coordinator.specialists().len(), 4);
    }
}
