//! 调用次数限制：把「只用一次搜索」从提示词约定变成运行时硬约束
//!
//! CallLimitedTool 包装任意 Tool；超过 max_calls 后不再调用内部工具，直接返回固定提示。
//! 计数器随包装实例存在，协调者为每个规划请求新建包装，请求之间互不影响。

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::tools::Tool;

pub const CALL_LIMIT_REACHED: &str =
    "Tool call limit reached for this request. Answer with the information you already have.";

pub struct CallLimitedTool {
    inner: Arc<dyn Tool>,
    max_calls: usize,
    calls: AtomicUsize,
}

impl CallLimitedTool {
    pub fn new(inner: Arc<dyn Tool>, max_calls: usize) -> Self {
        Self {
            inner,
            max_calls,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl Tool for CallLimitedTool {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    fn parameters_schema(&self) -> Value {
        self.inner.parameters_schema()
    }

    async fn execute(&self, args: Value) -> Result<String, String> {
        let granted = self
            .calls
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                (n < self.max_calls).then_some(n + 1)
            })
            .is_ok();
        if !granted {
            tracing::warn!(tool = %self.inner.name(), max_calls = self.max_calls, "tool call limit reached");
            return Ok(CALL_LIMIT_REACHED.to_string());
        }
        self.inner.execute(args).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingTool(Arc<AtomicUsize>);

    #[async_trait]
    impl Tool for CountingTool {
        fn name(&self) -> &str {
            "web_search"
        }

        fn description(&self) -> &str {
            "counts"
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok("result".to_string())
        }
    }

    #[tokio::test]
    async fn test_limit_is_enforced() {
        let inner_calls = Arc::new(AtomicUsize::new(0));
        let limited = CallLimitedTool::new(Arc::new(CountingTool(inner_calls.clone())), 1);

        assert_eq!(limited.execute(Value::Null).await.unwrap(), "result");
        assert_eq!(limited.execute(Value::Null).await.unwrap(), CALL_LIMIT_REACHED);
        assert_eq!(limited.execute(Value::Null).await.unwrap(), CALL_LIMIT_REACHED);

        assert_eq!(inner_calls.load(Ordering::SeqCst), 1);
        assert_eq!(limited.name(), "web_search");
    }

    #[tokio::test]
    async fn test_zero_limit_blocks_everything() {
        let inner_calls = Arc::new(AtomicUsize::new(0));
        let limited = CallLimitedTool::new(Arc::new(CountingTool(inner_calls.clone())), 0);
        assert_eq!(limited.execute(Value::Null).await.unwrap(), CALL_LIMIT_REACHED);
        assert_eq!(inner_calls.load(Ordering::SeqCst), 0);
    }
}
