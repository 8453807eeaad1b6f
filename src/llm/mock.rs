//! Mock LLM 客户端（用于测试与离线演示，无需 API）
//!
//! 三种应答来源，按优先级：responder 闭包 > 预置脚本队列 > 回显最后一条 User 消息。
//! 并发调用下脚本按到达顺序出队，因此并行场景的测试应使用 responder 按 system prompt 区分角色。

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::llm::{last_user_content, LlmClient, LlmError, Message};

type Responder = dyn Fn(&[Message]) -> Result<String, LlmError> + Send + Sync;

/// Mock 客户端：可脚本化、可注入闭包，并统计调用次数
#[derive(Default)]
pub struct MockLlmClient {
    responder: Option<Arc<Responder>>,
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    calls: AtomicUsize,
}

impl MockLlmClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// 按顺序返回给定文本；用尽后回退为回显
    pub fn scripted<S: Into<String>>(responses: Vec<S>) -> Self {
        Self::from_results(responses.into_iter().map(|s| Ok(s.into())).collect())
    }

    pub fn from_results(results: Vec<Result<String, LlmError>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            ..Self::default()
        }
    }

    /// 每次调用都交给闭包决定应答
    pub fn with_responder<F>(f: F) -> Self
    where
        F: Fn(&[Message]) -> Result<String, LlmError> + Send + Sync + 'static,
    {
        Self {
            responder: Some(Arc::new(f)),
            ..Self::default()
        }
    }

    /// 每次调用都失败
    pub fn failing(err: LlmError) -> Self {
        Self::with_responder(move |_| Err(err.clone()))
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, messages: &[Message]) -> Result<String, LlmError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if let Some(responder) = &self.responder {
            return responder(messages);
        }

        let scripted = self
            .script
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .pop_front();
        if let Some(next) = scripted {
            return next;
        }

        let last_user = last_user_content(messages);
        let last_user = if last_user.is_empty() { "(no input)" } else { last_user };
        Ok(format!("Itinerary:\nEcho from Mock: {}", last_user))
    }
}
