//! 规划请求错误类型与恢复动作
//!
//! 与 RecoveryEngine 配合：根据 AgentError 决定 RetryWithPrompt / Backoff / Abort。
//! 只有整请求级别的失败会返回给调用方；专家与搜索的失败在各自边界内被吸收。

use std::time::Duration;

use thiserror::Error;

use crate::llm::LlmError;

/// 规划过程中可能出现的错误
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Invalid trip request: {0}")]
    InvalidRequest(String),

    #[error("Coordinator did not converge within {max_turns} turns")]
    TurnBudgetExhausted { max_turns: usize },

    #[error("Planning request timed out after {secs}s")]
    Timeout { secs: u64 },

    #[error("Planning request cancelled")]
    Cancelled,

    #[error("LLM error: {0}")]
    Llm(#[from] LlmError),

    #[error("JSON parse error: {0}")]
    JsonParseError(String),

    #[error("Hallucinated tool: {0}")]
    HallucinatedTool(String),

    /// 串行策略下调用顺序不对；expected 为 None 表示链上的专家都已调用过
    #[error("Out-of-order delegation: {got} (expected {})", .expected.as_deref().unwrap_or("final output"))]
    OutOfOrderDelegation { got: String, expected: Option<String> },

    #[error("Tool execution failed: {0}")]
    ToolExecutionFailed(String),

    #[error("Tool timeout: {0}")]
    ToolTimeout(String),

    #[error("Config error: {0}")]
    Config(String),
}

impl AgentError {
    /// 是否为整请求的终止性错误（直接返回给调用方）
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            AgentError::InvalidRequest(_)
                | AgentError::TurnBudgetExhausted { .. }
                | AgentError::Timeout { .. }
                | AgentError::Cancelled
                | AgentError::Config(_)
        ) || matches!(self, AgentError::Llm(e) if !e.is_transient())
    }
}

/// 恢复引擎根据错误类型给出的建议动作
#[derive(Debug, Clone)]
pub enum RecoveryAction {
    /// 将提示注入下一轮，让协调者重试（如 JSON 格式错误、调用了不存在的专家）
    RetryWithPrompt(String),
    /// 等待后原样重试（限流 / 超时）
    Backoff(Duration),
    /// 终止当前请求
    Abort,
}
