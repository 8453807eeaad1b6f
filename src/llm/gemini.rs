//! Gemini 客户端（OpenAI 兼容端点）
//!
//! Google 为 Gemini 提供 OpenAI 兼容的 chat/completions 接口。
//! - Base URL: https://generativelanguage.googleapis.com/v1beta/openai/
//! - 模型: gemini-2.5-flash-lite（默认，快且便宜）、gemini-2.5-flash

use crate::llm::OpenAiClient;

pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/openai/";
pub const GEMINI_FLASH_LITE: &str = "gemini-2.5-flash-lite";

/// 创建 Gemini 客户端；api_key 由调用方从环境变量读取后传入
pub fn create_gemini_client(api_key: &str, model: Option<&str>, timeout_secs: u64) -> OpenAiClient {
    let model = model.unwrap_or(GEMINI_FLASH_LITE);
    OpenAiClient::new(Some(GEMINI_BASE_URL), model, api_key).with_timeout(timeout_secs)
}
