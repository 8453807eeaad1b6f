//! 旅行规划入口
//!
//! TripPlanner 持有构建好的协调者，可被多个请求共享；每个请求独立计轮、独立计搜索次数。
//! generate_trip_plan 校验参数 → 协调 → 规整 / 回填，返回字段齐全的 TravelPlan。

use std::path::PathBuf;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::config::load_config;
use crate::coordinator::{Coordinator, PlanEvent};
use crate::core::{build_coordinator, create_llm_from_config, create_search_tool, AgentError};
use crate::plan::{reconcile, TravelPlan, TripRequest};

pub struct TripPlanner {
    coordinator: Coordinator,
}

impl TripPlanner {
    pub fn new(coordinator: Coordinator) -> Self {
        Self { coordinator }
    }

    /// 从配置文件与环境变量构建：模型客户端、搜索工具、专家阵容
    pub fn from_config(config_path: Option<PathBuf>) -> Result<Self, AgentError> {
        let cfg = load_config(config_path).map_err(|e| AgentError::Config(e.to_string()))?;
        let llm = create_llm_from_config(&cfg)?;
        let search = create_search_tool(&cfg);
        let coordinator = build_coordinator(&cfg, llm, Some(search))?;
        Ok(Self::new(coordinator))
    }

    pub fn coordinator(&self) -> &Coordinator {
        &self.coordinator
    }

    /// 生成旅行计划
    pub async fn generate_trip_plan(
        &self,
        destination: &str,
        num_days: u32,
        budget: f64,
        preferences: Option<&str>,
    ) -> Result<TravelPlan, AgentError> {
        let request = TripRequest::new(destination, num_days, budget, preferences.map(str::to_string))?;
        self.generate(&request).await
    }

    pub async fn generate(&self, request: &TripRequest) -> Result<TravelPlan, AgentError> {
        self.generate_with(request, None, CancellationToken::new()).await
    }

    /// 带进度事件与取消的生成；event_tx 收到 TurnUpdate / SpecialistStarted / Finished 等事件
    pub async fn generate_with(
        &self,
        request: &TripRequest,
        event_tx: Option<&mpsc::UnboundedSender<PlanEvent>>,
        cancel: CancellationToken,
    ) -> Result<TravelPlan, AgentError> {
        let run = self.coordinator.plan_with(request, event_tx, cancel).await?;
        let plan = reconcile(&run.output, request, &run.specialist_results);
        tracing::info!(
            request_id = %run.request_id,
            turns = run.turns,
            structured = run.output.is_structured(),
            "trip plan ready"
        );
        Ok(plan)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use crate::llm::{LlmClient, LlmError, MockLlmClient};
    use std::sync::Arc;

    fn planner_with(llm: Arc<dyn LlmClient>) -> TripPlanner {
        let mut cfg = AppConfig::default();
        cfg.coordinator.enable_research = false;
        TripPlanner::new(build_coordinator(&cfg, llm, None).unwrap())
    }

    #[tokio::test]
    async fn test_invalid_request_fails_before_any_model_call() {
        let llm = Arc::new(MockLlmClient::new());
        let planner = planner_with(llm.clone());
        let err = planner.generate_trip_plan("", 3, 500.0, None).await.unwrap_err();
        assert!(matches!(err, AgentError::InvalidRequest(_)));
        assert_eq!(llm.call_count(), 0);
    }

    #[tokio::test]
    async fn test_structured_answer_becomes_plan() {
        let llm = Arc::new(MockLlmClient::scripted(vec![
            r#"{"destination": "Lisbon", "duration": "3 days", "summary": "Day 1: Alfama", "cost": "$900", "tips": "Pastel de nata"}"#,
        ]));
        let planner = planner_with(llm);
        let plan = planner
            .generate_trip_plan("Lisbon", 3, 1000.0, Some("food"))
            .await
            .unwrap();
        assert_eq!(plan.destination, "Lisbon");
        assert_eq!(plan.duration, "3 days");
        assert_eq!(plan.summary, "Day 1: Alfama");
        assert_eq!(plan.cost, "$900");
        assert_eq!(plan.tips, "Pastel de nata");
        assert_eq!(plan.updates, "");
    }

    #[tokio::test]
    async fn test_rejected_schema_request_still_returns_normalized_plan() {
        let llm = Arc::new(MockLlmClient::from_results(vec![
            Ok("Itinerary:\nDay 1: Asakusa\nBudget:\n$1500\nLocal Tips:\nRamen".to_string()),
            Err(LlmError::ApiError("response_format json_schema not supported".to_string())),
        ]));
        let planner = planner_with(llm);
        let plan = planner.generate_trip_plan("Tokyo", 5, 2000.0, None).await.unwrap();
        assert_eq!(plan.destination, "Tokyo");
        assert_eq!(plan.duration, "5 days");
        assert_eq!(plan.summary, "Day 1: Asakusa");
        assert_eq!(plan.cost, "$1500");
        assert_eq!(plan.tips, "Ramen");
    }
}
