//! 专家 Agent：Planner（行程）、Budget（费用）、LocalGuide（美食与当地提示）、Research（时效信息）

pub mod roster;
pub mod specialist;

pub use roster::default_roster;
pub use specialist::{Specialist, SpecialistConfig, ToolGrant};
