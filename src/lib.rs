//! Wayfarer - 多智能体旅行规划
//!
//! 模块划分：
//! - **agent**: 规划入口 TripPlanner（校验 → 协调 → 规整）
//! - **config**: 应用配置加载（TOML + 环境变量）
//! - **coordinator**: 协调者主循环、编排策略、进度事件
//! - **core**: 错误类型、错误恢复、组件构建
//! - **llm**: LLM 客户端抽象与实现（OpenAI 兼容 / Gemini / Mock）
//! - **plan**: 请求 / 结果 / 计划类型，输出规整与 Markdown 文档
//! - **protocol**: 委派调用的文本协议
//! - **specialists**: 专家 Agent 与默认阵容
//! - **tools**: 工具抽象、执行器、网页搜索与调用次数限制

pub mod agent;
pub mod config;
pub mod coordinator;
pub mod core;
pub mod llm;
pub mod observability;
pub mod plan;
pub mod protocol;
pub mod specialists;
pub mod tools;

pub use agent::TripPlanner;
pub use core::AgentError;
pub use plan::{TravelPlan, TripRequest};
