//! 结构化计划片段与宽松解析
//!
//! 模型声称输出 JSON 时也常带 ```json 围栏、前后说明文字、别名字段或非字符串值；
//! 这里统一转为 PlanFragment，解析不出计划字段时返回 None，交由 Normalizer 按文本处理。

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::plan::PlanField;

/// 计划片段：协调者的结构化输出，或专家输出中的 JSON 部分
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct PlanFragment {
    /// 目的地（仅作参考，最终计划始终使用请求参数）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// 行程时长（仅作参考，最终计划始终使用请求参数）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    /// Day-by-day itinerary
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Cost breakdown and total estimate
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost: Option<String>,
    /// Local food recommendations and cultural tips
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tips: Option<String>,
    /// Time-sensitive notes (events, closures, advisories)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updates: Option<String>,
}

const SUMMARY_KEYS: &[&str] = &["summary", "itinerary", "day_by_day_itinerary", "plan"];
const COST_KEYS: &[&str] = &["cost", "costs", "budget", "budget_breakdown", "cost_estimate"];
const TIPS_KEYS: &[&str] = &["tips", "local_tips", "local_recommendations", "recommendations"];
const UPDATES_KEYS: &[&str] = &["updates", "current_updates", "research", "news"];

impl PlanFragment {
    /// 从模型文本中提取并解析计划片段
    pub fn parse(text: &str) -> Option<Self> {
        let block = extract_json_block(text)?;
        let value: Value = serde_json::from_str(block).ok()?;
        Self::from_value(&value)
    }

    /// 从 JSON 值构造；对象中至少要有一个内容字段，工具调用对象不算
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        if obj.contains_key("tool") || obj.contains_key("tool_calls") {
            return None;
        }
        let normalized: Vec<(String, &Value)> = obj
            .iter()
            .map(|(k, v)| (normalize_key(k), v))
            .collect();
        let lookup = |keys: &[&str]| -> Option<String> {
            keys.iter().find_map(|key| {
                normalized
                    .iter()
                    .find(|(k, _)| k == key)
                    .map(|(_, v)| value_to_text(v))
            })
        };

        let fragment = Self {
            destination: lookup(&["destination"]),
            duration: lookup(&["duration"]),
            summary: lookup(SUMMARY_KEYS),
            cost: lookup(COST_KEYS),
            tips: lookup(TIPS_KEYS),
            updates: lookup(UPDATES_KEYS),
        };
        if fragment.summary.is_none()
            && fragment.cost.is_none()
            && fragment.tips.is_none()
            && fragment.updates.is_none()
        {
            return None;
        }
        Some(fragment)
    }

    /// 取内容字段（去空白后为空视为缺失）
    pub fn field(&self, field: PlanField) -> Option<&str> {
        let value = match field {
            PlanField::Summary => &self.summary,
            PlanField::Cost => &self.cost,
            PlanField::Tips => &self.tips,
            PlanField::Updates => &self.updates,
        };
        value.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

fn normalize_key(key: &str) -> String {
    key.trim()
        .to_lowercase()
        .chars()
        .map(|c| if c == '-' || c == ' ' { '_' } else { c })
        .collect()
}

/// 将任意 JSON 值展平为文本：数组逐行，对象按 `key: value` 逐行
pub fn value_to_text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        Value::Bool(_) | Value::Number(_) => value.to_string(),
        Value::Array(items) => items
            .iter()
            .map(value_to_text)
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Object(map) => map
            .iter()
            .map(|(k, v)| match v {
                Value::Array(_) | Value::Object(_) => format!("{}:\n{}", k, value_to_text(v)),
                _ => format!("{}: {}", k, value_to_text(v)),
            })
            .collect::<Vec<_>>()
            .join("\n"),
    }
}

/// 提取 JSON 块：优先 ```json 围栏，其次首个 `{`/`[` 到对应的最后一个 `}`/`]`
pub fn extract_json_block(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    if let Some(start) = trimmed.find("```json") {
        let rest = &trimmed[start + 7..];
        let inner = rest.find("```").map(|end| &rest[..end]).unwrap_or(rest);
        return Some(inner.trim());
    }

    let obj = trimmed
        .find('{')
        .and_then(|s| trimmed.rfind('}').filter(|e| *e > s).map(|e| (s, e)));
    let arr = trimmed
        .find('[')
        .and_then(|s| trimmed.rfind(']').filter(|e| *e > s).map(|e| (s, e)));
    let (start, end) = match (obj, arr) {
        (Some(o), Some(a)) => {
            if a.0 < o.0 {
                a
            } else {
                o
            }
        }
        (Some(o), None) => o,
        (None, Some(a)) => a,
        (None, None) => return None,
    };
    Some(&trimmed[start..=end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parse_fenced_json_with_prose() {
        let text = "Here is your plan:\n```json\n{\"summary\": \"Day 1: Shibuya\", \"cost\": \"$1500\", \"tips\": \"Try ramen\"}\n```\nEnjoy!";
        let fragment = PlanFragment::parse(text).unwrap();
        assert_eq!(fragment.summary.as_deref(), Some("Day 1: Shibuya"));
        assert_eq!(fragment.cost.as_deref(), Some("$1500"));
        assert_eq!(fragment.tips.as_deref(), Some("Try ramen"));
        assert_eq!(fragment.updates, None);
    }

    #[test]
    fn test_aliases_and_non_string_values() {
        let value = json!({
            "Itinerary": ["Day 1: Louvre", "Day 2: Versailles"],
            "budget": {"lodging": "$600", "total": 1200},
            "local-tips": "Say bonjour"
        });
        let fragment = PlanFragment::from_value(&value).unwrap();
        assert_eq!(
            fragment.summary.as_deref(),
            Some("Day 1: Louvre\nDay 2: Versailles")
        );
        let cost = fragment.cost.unwrap();
        assert!(cost.contains("lodging: $600"));
        assert!(cost.contains("total: 1200"));
        assert_eq!(fragment.tips.as_deref(), Some("Say bonjour"));
    }

    #[test]
    fn test_tool_call_is_not_a_fragment() {
        let value = json!({"tool": "planner_agent", "args": {"input": "x"}});
        assert!(PlanFragment::from_value(&value).is_none());
    }

    #[test]
    fn test_object_without_plan_fields_is_rejected() {
        assert!(PlanFragment::parse(r#"{"destination": "Tokyo"}"#).is_none());
        assert!(PlanFragment::parse("no json here").is_none());
        assert!(PlanFragment::parse("{ broken json").is_none());
    }

    #[test]
    fn test_blank_field_counts_as_missing() {
        let fragment = PlanFragment::parse(r#"{"summary": "  ", "cost": "$5"}"#).unwrap();
        assert_eq!(fragment.field(PlanField::Summary), None);
        assert_eq!(fragment.field(PlanField::Cost), Some("$5"));
    }

    #[test]
    fn test_extract_json_block_prefers_earliest_bracket() {
        assert_eq!(
            extract_json_block(r#"calls: [{"tool": "a"}] done"#),
            Some(r#"[{"tool": "a"}]"#)
        );
        assert_eq!(
            extract_json_block(r#"{"tool_calls": [{"tool": "a"}]}"#),
            Some(r#"{"tool_calls": [{"tool": "a"}]}"#)
        );
        assert_eq!(extract_json_block("plain"), None);
    }
}
