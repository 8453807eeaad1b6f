//! 错误恢复引擎
//!
//! 根据 AgentError 类型返回 RecoveryAction，供协调循环决定是重试、退避还是终止。
//! 每一次重试都会消耗一轮协调预算。

use std::time::Duration;

use crate::core::{AgentError, RecoveryAction};
use crate::llm::LlmError;

/// 语义化错误恢复：将错误映射为可执行动作
#[derive(Debug, Default)]
pub struct RecoveryEngine {
    /// 可委派的专家工具名，用于 HallucinatedTool 的纠正提示
    known_tools: Vec<String>,
}

impl RecoveryEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_known_tools(mut self, tools: Vec<String>) -> Self {
        self.known_tools = tools;
        self
    }

    pub fn handle(&self, err: &AgentError) -> RecoveryAction {
        match err {
            AgentError::JsonParseError(raw) => RecoveryAction::RetryWithPrompt(format!(
                "Your previous output was not valid JSON: {raw}. \
                To delegate, output only one JSON object such as \
                {{\"tool\": \"planner_agent\", \"args\": {{\"input\": \"...\"}}}} \
                or {{\"tool_calls\": [...]}}, with no markdown or extra text."
            )),
            AgentError::HallucinatedTool(name) => RecoveryAction::RetryWithPrompt(format!(
                "There is no agent named '{name}'. Available agents: {}.",
                if self.known_tools.is_empty() {
                    "(none)".to_string()
                } else {
                    self.known_tools.join(", ")
                }
            )),
            AgentError::OutOfOrderDelegation { got, expected } => {
                RecoveryAction::RetryWithPrompt(match expected {
                    Some(next) => format!(
                        "{got} cannot run yet. Agents are called in a fixed order \
                        (planner_agent, budget_agent, local_guide_agent, then optionally research_agent). \
                        Call {next} next."
                    ),
                    None => format!(
                        "{got} is not available: every agent has already been called. \
                        Write the final output now."
                    ),
                })
            }
            AgentError::Llm(LlmError::RateLimited { retry_after_ms }) => {
                RecoveryAction::Backoff(Duration::from_millis(*retry_after_ms))
            }
            AgentError::Llm(LlmError::Timeout(_)) => {
                RecoveryAction::Backoff(Duration::from_millis(500))
            }
            _ => RecoveryAction::Abort,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_recovery_json_parse_error() {
        let engine = RecoveryEngine::new();
        let err = AgentError::JsonParseError("invalid json".to_string());
        match engine.handle(&err) {
            RecoveryAction::RetryWithPrompt(msg) => assert!(msg.contains("JSON")),
            other => panic!("Expected RetryWithPrompt, got {:?}", other),
        }
    }

    #[test]
    fn test_recovery_hallucinated_tool_lists_agents() {
        let engine = RecoveryEngine::new()
            .with_known_tools(vec!["planner_agent".to_string(), "budget_agent".to_string()]);
        let err = AgentError::HallucinatedTool("weather_agent".to_string());
        match engine.handle(&err) {
            RecoveryAction::RetryWithPrompt(msg) => {
                assert!(msg.contains("weather_agent"));
                assert!(msg.contains("planner_agent, budget_agent"));
            }
            other => panic!("Expected RetryWithPrompt, got {:?}", other),
        }
    }

    #[test]
    fn test_recovery_rate_limited_backs_off() {
        let engine = RecoveryEngine::new();
        let err = AgentError::Llm(LlmError::RateLimited { retry_after_ms: 1000 });
        match engine.handle(&err) {
            RecoveryAction::Backoff(d) => assert_eq!(d, Duration::from_millis(1000)),
            other => panic!("Expected Backoff, got {:?}", other),
        }
    }

    #[test]
    fn test_recovery_api_error_aborts() {
        let engine = RecoveryEngine::new();
        let err = AgentError::Llm(LlmError::ApiError("401".to_string()));
        assert!(matches!(engine.handle(&err), RecoveryAction::Abort));
        assert!(err.is_fatal());
    }

    #[test]
    fn test_recovery_cancelled() {
        let engine = RecoveryEngine::new();
        assert!(matches!(engine.handle(&AgentError::Cancelled), RecoveryAction::Abort));
    }

    #[test]
    fn test_out_of_order_names_next_agent() {
        let engine = RecoveryEngine::new();
        let err = AgentError::OutOfOrderDelegation {
            got: "local_guide_agent".to_string(),
            expected: Some("budget_agent".to_string()),
        };
        assert!(!err.is_fatal());
        match engine.handle(&err) {
            RecoveryAction::RetryWithPrompt(msg) => {
                assert!(msg.contains("local_guide_agent cannot run yet"));
                assert!(msg.contains("Call budget_agent next"));
            }
            other => panic!("Expected RetryWithPrompt, got {:?}", other),
        }

        let done = AgentError::OutOfOrderDelegation {
            got: "planner_agent".to_string(),
            expected: None,
        };
        match engine.handle(&done) {
            RecoveryAction::RetryWithPrompt(msg) => assert!(msg.contains("final output")),
            other => panic!("Expected RetryWithPrompt, got {:?}", other),
        }
    }

    #[test]
    fn test_turn_budget_is_fatal() {
        assert!(AgentError::TurnBudgetExhausted { max_turns: 10 }.is_fatal());
        assert!(!AgentError::JsonParseError("x".to_string()).is_fatal());
    }
}
