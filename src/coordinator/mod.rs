//! 协调者：决定委派哪些专家、并行还是串行，并把结果合成为一个最终输出
//!
//! 每个规划请求在一个异步任务内完成，轮次预算（max_turns）是硬上限。

pub mod engine;
pub mod events;
pub mod prompt;

use std::str::FromStr;

use crate::core::AgentError;
use crate::llm::OutputSchema;
use crate::plan::PlanFragment;

pub use engine::{Coordinator, CoordinatorRun, CoordinatorSettings};
pub use events::PlanEvent;
pub use prompt::build_trip_prompt;

/// 编排策略
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrchestrationPolicy {
    /// 单轮内并发委派所有相关专家，输出始终为结构化对象
    ParallelFanOut,
    /// 按 Planner → Budget → LocalGuide（→ Research）逐个委派
    SequentialChain,
}

impl FromStr for OrchestrationPolicy {
    type Err = AgentError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "parallel" | "parallel-fan-out" | "fan-out" => Ok(OrchestrationPolicy::ParallelFanOut),
            "sequential" | "sequential-chain" | "chain" => Ok(OrchestrationPolicy::SequentialChain),
            other => Err(AgentError::Config(format!(
                "unknown orchestration policy '{}', expected parallel or sequential",
                other
            ))),
        }
    }
}

/// 最终计划的 JSON Schema（由 PlanFragment 派生）
pub fn travel_plan_schema() -> OutputSchema {
    let schema = schemars::schema_for!(PlanFragment);
    OutputSchema {
        name: "travel_plan".to_string(),
        schema: serde_json::to_value(&schema).unwrap_or_default(),
    }
}
