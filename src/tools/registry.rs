//! 专家可用工具的注册表
//!
//! 每个专家在每次请求开始时得到自己的一份注册表（见 Specialist::session_executor），
//! 因此注册表只做按名查找，不持有跨请求状态。

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

/// 专家侧工具。execute 的 Err 只表示调用本身失败；「搜索无结果 / 不可用」之类的情况应作为 Ok 文本返回给模型
#[async_trait]
pub trait Tool: Send + Sync {
    /// 委派 JSON 里 "tool" 字段使用的名字
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// 参数 JSON Schema；默认无参数
    fn parameters_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {},
            "required": []
        })
    }

    /// 执行工具
    async fn execute(&self, args: Value) -> Result<String, String>;
}

/// 工具注册表：按名称存储 Arc<dyn Tool>（有序，保证 prompt 中工具列表稳定）
#[derive(Default, Clone)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: impl Tool + 'static) {
        self.register_arc(Arc::new(tool));
    }

    /// 同名工具后注册的覆盖先注册的
    pub fn register_arc(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).cloned()
    }

    pub async fn execute(&self, name: &str, args: Value) -> Result<String, String> {
        match self.tools.get(name) {
            Some(tool) => tool.execute(args).await,
            None => Err(format!("no tool named '{}'", name)),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// 工具 schema JSON，拼入专家的 system prompt
    pub fn to_schema_json(&self) -> String {
        let tools: Vec<Value> = self
            .tools
            .iter()
            .map(|(name, tool)| {
                serde_json::json!({
                    "name": name,
                    "description": tool.description(),
                    "parameters": tool.parameters_schema()
                })
            })
            .collect();
        serde_json::to_string_pretty(&tools).unwrap_or_else(|_| "[]".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedTool(&'static str, &'static str);

    #[async_trait]
    impl Tool for FixedTool {
        fn name(&self) -> &str {
            self.0
        }

        fn description(&self) -> &str {
            "Returns a fixed answer"
        }

        async fn execute(&self, _args: Value) -> Result<String, String> {
            Ok(self.1.to_string())
        }
    }

    #[tokio::test]
    async fn test_lookup_is_by_name_and_sorted() {
        let mut registry = ToolRegistry::new();
        registry.register(FixedTool("web_search", "first"));
        registry.register(FixedTool("currency", "rate"));
        registry.register(FixedTool("web_search", "second"));
        let schema = registry.to_schema_json();
        let currency = schema.find("\"currency\"").unwrap();
        let search = schema.find("\"web_search\"").unwrap();
        assert!(currency < search);

        let out = registry.execute("web_search", Value::Null).await.unwrap();
        assert_eq!(out, "second");
        assert!(registry.execute("weather", Value::Null).await.is_err());
    }
}
