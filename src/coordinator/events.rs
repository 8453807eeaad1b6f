//! 规划过程事件：用于前端展示「哪个专家正在工作」

use serde::Serialize;
use tokio::sync::mpsc;

use crate::plan::SpecialistRole;

/// 单步过程事件（可序列化为 JSON 供前端展示）
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanEvent {
    /// 协调者开始第几轮
    TurnUpdate { turn: usize, max_turns: usize },
    /// 开始委派专家
    SpecialistStarted { role: SpecialistRole },
    /// 专家返回（degraded 表示失败后的占位结果）
    SpecialistFinished {
        role: SpecialistRole,
        degraded: bool,
        tool_calls: usize,
    },
    /// 错误恢复动作（RetryWithPrompt / Backoff）
    Recovery { action: String, detail: String },
    /// 协调者给出最终输出
    Finished { structured: bool, turns: usize },
    /// 整请求失败
    Error { text: String },
}

pub(crate) fn send_event(tx: Option<&mpsc::UnboundedSender<PlanEvent>>, event: PlanEvent) {
    if let Some(tx) = tx {
        let _ = tx.send(event);
    }
}
