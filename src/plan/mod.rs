//! 规划数据模型
//!
//! TripRequest（输入）→ AgentTask / AgentResult（协调过程中的临时数据）→ TravelPlan（最终输出）。
//! CoordinatorOutput 是协调者原始输出的两种形态：结构化片段或带标签的自由文本。

pub mod document;
pub mod fragment;
pub mod normalizer;

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::core::AgentError;

pub use document::document_file_name;
pub use fragment::{extract_json_block, PlanFragment};
pub use normalizer::{normalize, reconcile, render_labeled};

/// 用户的一次出行请求（创建后不可变）
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripRequest {
    destination: String,
    num_days: u32,
    budget_amount: f64,
    preferences: Option<String>,
}

impl TripRequest {
    /// 校验并构造：目的地非空、天数 ≥ 1、预算为非负有限数；空白偏好视为无
    pub fn new(
        destination: impl Into<String>,
        num_days: u32,
        budget_amount: f64,
        preferences: Option<String>,
    ) -> Result<Self, AgentError> {
        let destination = destination.into().trim().to_string();
        if destination.is_empty() {
            return Err(AgentError::InvalidRequest("destination is empty".to_string()));
        }
        if num_days == 0 {
            return Err(AgentError::InvalidRequest(
                "number of days must be at least 1".to_string(),
            ));
        }
        if !budget_amount.is_finite() || budget_amount < 0.0 {
            return Err(AgentError::InvalidRequest(format!(
                "budget must be a non-negative amount, got {}",
                budget_amount
            )));
        }
        let preferences = preferences
            .map(|p| p.trim().to_string())
            .filter(|p| !p.is_empty());
        Ok(Self {
            destination,
            num_days,
            budget_amount,
            preferences,
        })
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn num_days(&self) -> u32 {
        self.num_days
    }

    pub fn budget_amount(&self) -> f64 {
        self.budget_amount
    }

    pub fn preferences(&self) -> Option<&str> {
        self.preferences.as_deref()
    }

    /// 行程时长文本，始终由请求参数生成
    pub fn duration_label(&self) -> String {
        duration_label(self.num_days)
    }
}

pub fn duration_label(num_days: u32) -> String {
    if num_days == 1 {
        "1 day".to_string()
    } else {
        format!("{} days", num_days)
    }
}

/// 专家角色；顺序即串行模式下的调用优先级
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialistRole {
    Planner,
    Budget,
    LocalGuide,
    Research,
}

impl SpecialistRole {
    pub const ALL: [SpecialistRole; 4] = [
        SpecialistRole::Planner,
        SpecialistRole::Budget,
        SpecialistRole::LocalGuide,
        SpecialistRole::Research,
    ];

    /// 协调者委派时使用的工具名
    pub fn tool_name(self) -> &'static str {
        match self {
            SpecialistRole::Planner => "planner_agent",
            SpecialistRole::Budget => "budget_agent",
            SpecialistRole::LocalGuide => "local_guide_agent",
            SpecialistRole::Research => "research_agent",
        }
    }

    pub fn from_tool_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL.into_iter().find(|r| r.tool_name() == name)
    }

    pub fn display_name(self) -> &'static str {
        match self {
            SpecialistRole::Planner => "Planner Agent",
            SpecialistRole::Budget => "Budget Agent",
            SpecialistRole::LocalGuide => "Local Guide Agent",
            SpecialistRole::Research => "Research Agent",
        }
    }

    /// 预算专家不允许持有搜索工具
    pub fn may_hold_search(self) -> bool {
        !matches!(self, SpecialistRole::Budget)
    }

    /// 该角色负责填充的 TravelPlan 字段
    pub fn plan_field(self) -> PlanField {
        match self {
            SpecialistRole::Planner => PlanField::Summary,
            SpecialistRole::Budget => PlanField::Cost,
            SpecialistRole::LocalGuide => PlanField::Tips,
            SpecialistRole::Research => PlanField::Updates,
        }
    }
}

impl fmt::Display for SpecialistRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tool_name())
    }
}

/// TravelPlan 中由模型产出的四个内容字段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PlanField {
    Summary,
    Cost,
    Tips,
    Updates,
}

/// 协调者对某个专家的一次委派
#[derive(Debug, Clone, PartialEq)]
pub struct AgentTask {
    pub role: SpecialistRole,
    pub prompt_text: String,
    /// 该次调用可用的工具名（如 web_search）
    pub allowed_tools: Vec<String>,
}

/// 专家的一次调用结果；degraded 表示模型调用失败，raw_text 为诊断信息
#[derive(Debug, Clone)]
pub struct AgentResult {
    pub role: SpecialistRole,
    pub raw_text: String,
    pub structured: Option<PlanFragment>,
    pub degraded: bool,
    /// 本次调用实际发起的工具调用次数
    pub tool_calls: usize,
}

impl AgentResult {
    pub fn completed(
        role: SpecialistRole,
        raw_text: impl Into<String>,
        structured: Option<PlanFragment>,
        tool_calls: usize,
    ) -> Self {
        Self {
            role,
            raw_text: raw_text.into(),
            structured,
            degraded: false,
            tool_calls,
        }
    }

    pub fn degraded(role: SpecialistRole, diagnostic: impl Into<String>, tool_calls: usize) -> Self {
        Self {
            role,
            raw_text: diagnostic.into(),
            structured: None,
            degraded: true,
            tool_calls,
        }
    }

    /// 该结果对最终计划的贡献：优先结构化片段中本角色的字段，否则整段文本
    pub fn contribution(&self) -> Option<String> {
        if self.degraded {
            return None;
        }
        let field = self.role.plan_field();
        self.structured
            .as_ref()
            .and_then(|f| f.field(field))
            .map(str::to_string)
            .or_else(|| Some(self.raw_text.trim().to_string()))
            .filter(|s| !s.is_empty())
    }
}

/// 最终旅行计划：所有字段均存在（允许空串）
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelPlan {
    pub destination: String,
    pub duration: String,
    /// 逐日行程
    pub summary: String,
    pub cost: String,
    pub tips: String,
    pub updates: String,
}

impl TravelPlan {
    /// 空计划：destination / duration 来自请求，其余为空串
    pub fn empty_for(request: &TripRequest) -> Self {
        Self {
            destination: request.destination().to_string(),
            duration: request.duration_label(),
            summary: String::new(),
            cost: String::new(),
            tips: String::new(),
            updates: String::new(),
        }
    }

    pub fn field(&self, field: PlanField) -> &str {
        match field {
            PlanField::Summary => &self.summary,
            PlanField::Cost => &self.cost,
            PlanField::Tips => &self.tips,
            PlanField::Updates => &self.updates,
        }
    }

    pub fn field_mut(&mut self, field: PlanField) -> &mut String {
        match field {
            PlanField::Summary => &mut self.summary,
            PlanField::Cost => &mut self.cost,
            PlanField::Tips => &mut self.tips,
            PlanField::Updates => &mut self.updates,
        }
    }
}

/// 协调者最终输出：结构化片段或自由文本（后者交给 Normalizer）
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorOutput {
    Structured(PlanFragment),
    RawText(String),
}

impl CoordinatorOutput {
    /// 对最终回答做形态判定：能解析出含计划字段的 JSON 对象即为结构化，否则为原始文本
    pub fn from_answer(text: &str) -> Self {
        match PlanFragment::parse(text) {
            Some(fragment) => CoordinatorOutput::Structured(fragment),
            None => CoordinatorOutput::RawText(text.to_string()),
        }
    }

    pub fn is_structured(&self) -> bool {
        matches!(self, CoordinatorOutput::Structured(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_trip_request_validation() {
        assert!(TripRequest::new("  ", 3, 100.0, None).is_err());
        assert!(TripRequest::new("Rome", 0, 100.0, None).is_err());
        assert!(TripRequest::new("Rome", 3, -1.0, None).is_err());
        assert!(TripRequest::new("Rome", 3, f64::NAN, None).is_err());

        let req = TripRequest::new(" Rome ", 3, 0.0, Some("   ".to_string())).unwrap();
        assert_eq!(req.destination(), "Rome");
        assert_eq!(req.preferences(), None);
    }

    #[test]
    fn test_duration_label() {
        assert_eq!(duration_label(1), "1 day");
        assert_eq!(duration_label(5), "5 days");
    }

    #[test]
    fn test_role_tool_names_round_trip() {
        for role in SpecialistRole::ALL {
            assert_eq!(SpecialistRole::from_tool_name(role.tool_name()), Some(role));
        }
        assert_eq!(SpecialistRole::from_tool_name("weather_agent"), None);
        assert!(!SpecialistRole::Budget.may_hold_search());
        assert!(SpecialistRole::Research.may_hold_search());
    }

    #[test]
    fn test_role_priority_order() {
        let mut roles = vec![
            SpecialistRole::Research,
            SpecialistRole::LocalGuide,
            SpecialistRole::Planner,
            SpecialistRole::Budget,
        ];
        roles.sort();
        assert_eq!(roles, SpecialistRole::ALL.to_vec());
    }

    #[test]
    fn test_agent_result_contribution() {
        let ok = AgentResult::completed(SpecialistRole::Budget, "  Total: $1800 ", None, 0);
        assert_eq!(ok.contribution().as_deref(), Some("Total: $1800"));

        let degraded = AgentResult::degraded(SpecialistRole::Budget, "Budget Agent unavailable", 0);
        assert_eq!(degraded.contribution(), None);
    }

    #[test]
    fn test_coordinator_output_detection() {
        let structured = CoordinatorOutput::from_answer(r#"{"summary": "Day 1", "cost": "$10"}"#);
        assert!(structured.is_structured());

        let raw = CoordinatorOutput::from_answer("Itinerary:\nDay 1: walk");
        assert_eq!(raw, CoordinatorOutput::RawText("Itinerary:\nDay 1: walk".to_string()));
    }
}
