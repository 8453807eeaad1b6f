//! 核心层：错误类型、错误恢复与组件构建

pub mod builder;
pub mod error;
pub mod recovery;

pub use builder::{build_coordinator, create_llm_from_config, create_search_tool};
pub use error::{AgentError, RecoveryAction};
pub use recovery::RecoveryEngine;
