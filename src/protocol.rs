//! 委派协议：解析 Agent 的文本输出
//!
//! 模型以纯文本交互，工具调用约定为 JSON：
//! - 单个：`{"tool": "planner_agent", "args": {"input": "..."}}`
//! - 多个：`{"tool_calls": [ ... ]}` 或直接一个调用对象数组
//! 其余一律视为最终回答。看起来想调用工具（含 `"tool"`）却不是合法 JSON 时返回 JsonParseError，由恢复引擎提示重试。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::core::AgentError;
use crate::plan::extract_json_block;

/// 一次工具 / 专家调用
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ToolCall {
    /// 工具名，如 planner_agent、budget_agent、web_search
    pub tool: String,
    /// 调用参数：专家为 {"input": "..."}，搜索为 {"query": "..."}
    #[serde(default)]
    pub args: Value,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>, args: Value) -> Self {
        Self {
            tool: tool.into(),
            args,
        }
    }

    /// 取文本参数：按给定键依次查找；args 本身是字符串时直接返回
    pub fn text_arg(&self, keys: &[&str]) -> Option<String> {
        if let Value::String(s) = &self.args {
            return Some(s.clone()).filter(|s| !s.trim().is_empty());
        }
        keys.iter()
            .find_map(|k| self.args.get(*k).and_then(|v| v.as_str()))
            .map(str::to_string)
            .filter(|s| !s.trim().is_empty())
    }
}

/// 同一轮内的多个调用（仅用于生成 Schema 写入 prompt）
#[allow(dead_code)]
#[derive(JsonSchema)]
struct ToolCallBatch {
    pub tool_calls: Vec<ToolCall>,
}

/// Agent 单轮输出
#[derive(Debug, Clone, PartialEq)]
pub enum AgentOutput {
    /// 需要执行的调用（至少一个）
    Calls(Vec<ToolCall>),
    /// 最终回答原文（已去除首尾空白）
    Answer(String),
}

/// 解析单轮输出
pub fn parse_agent_output(output: &str) -> Result<AgentOutput, AgentError> {
    let trimmed = output.trim();
    let Some(block) = extract_json_block(trimmed) else {
        return Ok(AgentOutput::Answer(trimmed.to_string()));
    };

    let value: Value = match serde_json::from_str(block) {
        Ok(v) => v,
        Err(e) if looks_like_tool_call(block) => {
            return Err(AgentError::JsonParseError(format!(
                "{}: {}",
                e,
                preview(block)
            )))
        }
        Err(_) => return Ok(AgentOutput::Answer(trimmed.to_string())),
    };

    let calls = match calls_from_value(&value) {
        Some(calls) => calls?,
        None => return Ok(AgentOutput::Answer(trimmed.to_string())),
    };
    let calls: Vec<ToolCall> = calls
        .into_iter()
        .filter(|c| !c.tool.trim().is_empty())
        .collect();
    if calls.is_empty() {
        Ok(AgentOutput::Answer(trimmed.to_string()))
    } else {
        Ok(AgentOutput::Calls(calls))
    }
}

fn looks_like_tool_call(block: &str) -> bool {
    block.contains("\"tool\"") || block.contains("\"tool_calls\"")
}

/// 值不是调用形态时返回 None；是调用形态但字段不合法时返回 Some(Err)
fn calls_from_value(value: &Value) -> Option<Result<Vec<ToolCall>, AgentError>> {
    let items: Vec<&Value> = match value {
        Value::Object(obj) if obj.contains_key("tool_calls") => match obj.get("tool_calls") {
            Some(Value::Array(items)) => items.iter().collect(),
            _ => {
                return Some(Err(AgentError::JsonParseError(
                    "tool_calls must be an array".to_string(),
                )))
            }
        },
        Value::Object(obj) if obj.contains_key("tool") => vec![value],
        Value::Array(items)
            if !items.is_empty()
                && items
                    .iter()
                    .all(|i| i.as_object().is_some_and(|o| o.contains_key("tool"))) =>
        {
            items.iter().collect()
        }
        _ => return None,
    };

    Some(
        items
            .into_iter()
            .map(|item| {
                serde_json::from_value::<ToolCall>(item.clone()).map_err(|e| {
                    AgentError::JsonParseError(format!("{}: {}", e, preview(&item.to_string())))
                })
            })
            .collect(),
    )
}

fn preview(s: &str) -> String {
    if s.chars().count() > 200 {
        format!("{}...", s.chars().take(200).collect::<String>())
    } else {
        s.to_string()
    }
}

/// 调用格式的 JSON Schema（单个调用与批量调用），拼入 system prompt
pub fn tool_call_schema_json() -> String {
    let single = schemars::schema_for!(ToolCall);
    let batch = schemars::schema_for!(ToolCallBatch);
    serde_json::to_string_pretty(&serde_json::json!({
        "single_call": single,
        "batch": batch,
    }))
    .unwrap_or_default()
}
