//! LLM 客户端抽象
//!
//! 所有后端（OpenAI 兼容 / Gemini / Mock）实现 LlmClient：complete（自由文本）、
//! complete_structured（附带输出 Schema 约束）。模型输出一律视为不可信文本，由上层解析与校验。

use async_trait::async_trait;
use thiserror::Error;

use crate::llm::Message;

/// 模型调用边界上的错误
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LlmError {
    #[error("API error: {0}")]
    ApiError(String),

    #[error("Request timed out after {0}s")]
    Timeout(u64),

    #[error("Rate limited, retry after {retry_after_ms}ms")]
    RateLimited { retry_after_ms: u64 },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),
}

impl LlmError {
    /// 是否为瞬时错误（超时 / 限流），可在轮次预算内重试
    pub fn is_transient(&self) -> bool {
        matches!(self, LlmError::Timeout(_) | LlmError::RateLimited { .. })
    }
}

/// 输出 Schema 约束：名称 + JSON Schema
#[derive(Debug, Clone)]
pub struct OutputSchema {
    pub name: String,
    pub schema: serde_json::Value,
}

/// LLM 客户端 trait
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// 非流式完成
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError>;

    /// 带输出 Schema 的完成；默认忽略 Schema（Schema 已写入 prompt），后端可覆盖为原生结构化输出
    async fn complete_structured(
        &self,
        messages: &[Message],
        _schema: &OutputSchema,
    ) -> Result<String, LlmError> {
        self.complete(messages).await
    }

    /// 获取累计 token 使用统计：(prompt_tokens, completion_tokens, total_tokens)
    /// 默认返回 (0, 0, 0)，具体实现可覆盖
    fn token_usage(&self) -> (u64, u64, u64) {
        (0, 0, 0)
    }
}
