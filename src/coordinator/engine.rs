//! 协调主循环
//!
//! 每轮：调用协调者模型 → 解析为「委派」或「最终回答」→ 委派则执行专家并把结果喂回下一轮。
//! 并行策略下同一轮的专家并发执行（互不依赖、按字段名合并，不关心到达顺序）；
//! 串行策略下只接受固定顺序 Planner → Budget → LocalGuide →（可选）Research，跨轮次生效。
//! 轮数达到 max_turns 仍未收敛即整请求失败，已得到的专家结果丢弃；
//! 唯一的例外是已经拿到最终回答、只在等待结构化重排，此时原文交给 Normalizer。

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::CoordinatorSection;
use crate::coordinator::events::send_event;
use crate::coordinator::prompt::{build_trip_prompt, coordinator_system_prompt, reformat_prompt};
use crate::coordinator::{travel_plan_schema, OrchestrationPolicy, PlanEvent};
use crate::core::{AgentError, RecoveryAction, RecoveryEngine};
use crate::llm::{LlmClient, Message};
use crate::plan::{AgentResult, AgentTask, CoordinatorOutput, SpecialistRole, TripRequest};
use crate::protocol::{parse_agent_output, AgentOutput};
use crate::specialists::Specialist;
use crate::tools::ToolExecutor;

type EventSink<'a> = Option<&'a mpsc::UnboundedSender<PlanEvent>>;

/// 协调者运行参数
#[derive(Debug, Clone)]
pub struct CoordinatorSettings {
    pub policy: OrchestrationPolicy,
    pub max_turns: usize,
    /// 串行策略下是否强制结构化输出（并行策略始终强制）
    pub enforce_schema: bool,
    pub request_timeout_secs: u64,
    pub specialist_timeout_secs: u64,
}

impl Default for CoordinatorSettings {
    fn default() -> Self {
        Self {
            policy: OrchestrationPolicy::ParallelFanOut,
            max_turns: 10,
            enforce_schema: true,
            request_timeout_secs: 180,
            specialist_timeout_secs: 90,
        }
    }
}

impl CoordinatorSettings {
    pub fn from_config(section: &CoordinatorSection) -> Result<Self, AgentError> {
        if section.max_turns == 0 {
            return Err(AgentError::Config("coordinator.max_turns must be at least 1".to_string()));
        }
        Ok(Self {
            policy: section.policy.parse()?,
            max_turns: section.max_turns,
            enforce_schema: section.enforce_schema,
            request_timeout_secs: section.request_timeout_secs,
            specialist_timeout_secs: section.specialist_timeout_secs,
        })
    }
}

/// 一次成功的协调：最终输出 + 本请求内所有专家结果（供回填）
#[derive(Debug)]
pub struct CoordinatorRun {
    pub request_id: Uuid,
    pub output: CoordinatorOutput,
    pub specialist_results: Vec<AgentResult>,
    pub turns: usize,
}

pub struct Coordinator {
    llm: Arc<dyn LlmClient>,
    specialists: Vec<Specialist>,
    settings: CoordinatorSettings,
    recovery: RecoveryEngine,
}

impl Coordinator {
    pub fn new(llm: Arc<dyn LlmClient>, specialists: Vec<Specialist>, settings: CoordinatorSettings) -> Self {
        let known = specialists
            .iter()
            .map(|s| s.role().tool_name().to_string())
            .collect();
        Self {
            llm,
            specialists,
            settings,
            recovery: RecoveryEngine::new().with_known_tools(known),
        }
    }

    pub fn settings(&self) -> &CoordinatorSettings {
        &self.settings
    }

    pub fn specialists(&self) -> &[Specialist] {
        &self.specialists
    }

    fn structured_output(&self) -> bool {
        self.settings.policy == OrchestrationPolicy::ParallelFanOut || self.settings.enforce_schema
    }

    fn specialist(&self, role: SpecialistRole) -> Option<&Specialist> {
        self.specialists.iter().find(|s| s.role() == role)
    }

    pub async fn plan(&self, request: &TripRequest) -> Result<CoordinatorRun, AgentError> {
        self.plan_with(request, None, CancellationToken::new()).await
    }

    /// 带事件通道与取消令牌的规划；整请求受 request_timeout_secs 限制
    pub async fn plan_with(
        &self,
        request: &TripRequest,
        events: EventSink<'_>,
        cancel: CancellationToken,
    ) -> Result<CoordinatorRun, AgentError> {
        let request_id = Uuid::new_v4();
        let span = tracing::info_span!(
            "plan",
            request_id = %request_id,
            destination = %request.destination(),
            days = request.num_days()
        );
        let limit = Duration::from_secs(self.settings.request_timeout_secs.max(1));

        let result = async {
            tokio::select! {
                _ = cancel.cancelled() => Err(AgentError::Cancelled),
                res = tokio::time::timeout(limit, self.run_turns(request, request_id, events)) => {
                    res.unwrap_or(Err(AgentError::Timeout { secs: limit.as_secs() }))
                }
            }
        }
        .instrument(span)
        .await;

        match &result {
            Ok(run) => send_event(
                events,
                PlanEvent::Finished {
                    structured: run.output.is_structured(),
                    turns: run.turns,
                },
            ),
            Err(e) => {
                tracing::warn!(request_id = %request_id, error = %e, "planning request failed");
                send_event(events, PlanEvent::Error { text: e.to_string() });
            }
        }
        result
    }

    async fn run_turns(
        &self,
        request: &TripRequest,
        request_id: Uuid,
        events: EventSink<'_>,
    ) -> Result<CoordinatorRun, AgentError> {
        let structured = self.structured_output();
        let schema = travel_plan_schema();
        let schema_json = serde_json::to_string_pretty(&schema.schema).unwrap_or_default();
        let roster: Vec<&Specialist> = self.specialists.iter().collect();
        let system = coordinator_system_prompt(self.settings.policy, &roster, structured, &schema_json);
        let session = RequestSession::new(&self.specialists, self.settings.specialist_timeout_secs);
        let mut chain = (self.settings.policy == OrchestrationPolicy::SequentialChain)
            .then(|| ChainOrder::new(&self.specialists));

        let mut messages = vec![Message::system(system), Message::user(build_trip_prompt(request))];
        let mut results: Vec<AgentResult> = Vec::new();
        // 等待重排时保存的原始最终回答；重排失败就交给 Normalizer
        let mut pending_raw: Option<String> = None;
        let mut reformat_used = false;
        let max_turns = self.settings.max_turns;
        let mut turn = 0;

        loop {
            if turn >= max_turns {
                if let Some(text) = pending_raw.take() {
                    tracing::warn!(max_turns, "turn budget spent while reformatting, keeping raw answer");
                    return Ok(self.finish(request_id, CoordinatorOutput::RawText(text), results, turn));
                }
                tracing::warn!(max_turns, "coordinator turn budget exhausted");
                return Err(AgentError::TurnBudgetExhausted { max_turns });
            }
            turn += 1;
            send_event(events, PlanEvent::TurnUpdate { turn, max_turns });
            tracing::info!(turn, max_turns, "coordinator turn");

            let completion = if pending_raw.is_some() {
                self.llm.complete_structured(&messages, &schema).await
            } else {
                self.llm.complete(&messages).await
            };
            let output = match completion {
                Ok(o) => o,
                Err(e) => {
                    let err = AgentError::Llm(e);
                    if err.is_fatal() {
                        if let Some(text) = pending_raw.take() {
                            tracing::warn!(error = %err, "reformat request failed, keeping raw answer");
                            return Ok(self.finish(request_id, CoordinatorOutput::RawText(text), results, turn));
                        }
                    }
                    self.recover(err, &mut messages, events).await?;
                    continue;
                }
            };
            let reformatting = pending_raw.take();

            let parsed = match parse_agent_output(&output) {
                Ok(p) => p,
                Err(err) => {
                    if let Some(text) = reformatting {
                        tracing::warn!(error = %err, "reformat reply unusable, keeping raw answer");
                        return Ok(self.finish(request_id, CoordinatorOutput::RawText(text), results, turn));
                    }
                    messages.push(Message::assistant(output));
                    self.recover(err, &mut messages, events).await?;
                    continue;
                }
            };

            match parsed {
                AgentOutput::Answer(text) => {
                    let final_output = CoordinatorOutput::from_answer(&text);
                    if structured && !final_output.is_structured() && !reformat_used && turn < max_turns {
                        tracing::info!(turn, "final answer not structured, asking for reformat");
                        reformat_used = true;
                        send_event(
                            events,
                            PlanEvent::Recovery {
                                action: "Reformat".to_string(),
                                detail: reformat_prompt().to_string(),
                            },
                        );
                        messages.push(Message::assistant(text.clone()));
                        messages.push(Message::user(reformat_prompt()));
                        pending_raw = Some(text);
                        continue;
                    }
                    return Ok(self.finish(request_id, final_output, results, turn));
                }
                AgentOutput::Calls(calls) => {
                    messages.push(Message::assistant(output));
                    let mut tasks = Vec::with_capacity(calls.len());
                    for call in calls {
                        let specialist =
                            SpecialistRole::from_tool_name(&call.tool).and_then(|r| self.specialist(r));
                        match specialist {
                            Some(s) => {
                                let input = call
                                    .text_arg(&["input", "task", "prompt", "request"])
                                    .unwrap_or_else(|| build_trip_prompt(request));
                                tasks.push(s.task(input));
                            }
                            None => {
                                self.recover(AgentError::HallucinatedTool(call.tool), &mut messages, events)
                                    .await?;
                            }
                        }
                    }

                    if let Some(chain) = chain.as_mut() {
                        tasks.sort_by_key(|t| t.role);
                        let mut admitted = Vec::with_capacity(tasks.len());
                        for task in tasks {
                            match chain.admit(task.role) {
                                Ok(()) => admitted.push(task),
                                Err(err) => self.recover(err, &mut messages, events).await?,
                            }
                        }
                        tasks = admitted;
                    }
                    if tasks.is_empty() {
                        continue;
                    }

                    for result in self.dispatch(&session, tasks, events).await {
                        messages.push(Message::user(format!(
                            "Result from {}:\n{}",
                            result.role.tool_name(),
                            result.raw_text
                        )));
                        results.push(result);
                    }
                }
            }
        }
    }

    fn finish(
        &self,
        request_id: Uuid,
        output: CoordinatorOutput,
        specialist_results: Vec<AgentResult>,
        turns: usize,
    ) -> CoordinatorRun {
        let (prompt_tokens, completion_tokens, total_tokens) = self.llm.token_usage();
        tracing::info!(
            turns,
            structured = output.is_structured(),
            specialists = specialist_results.len(),
            prompt_tokens,
            completion_tokens,
            total_tokens,
            "coordinator finished"
        );
        CoordinatorRun {
            request_id,
            output,
            specialist_results,
            turns,
        }
    }

    async fn dispatch(
        &self,
        session: &RequestSession<'_>,
        mut tasks: Vec<AgentTask>,
        events: EventSink<'_>,
    ) -> Vec<AgentResult> {
        match self.settings.policy {
            OrchestrationPolicy::ParallelFanOut => {
                tracing::info!(count = tasks.len(), "dispatching specialists in parallel");
                join_all(tasks.iter().map(|t| session.run(t, events))).await
            }
            OrchestrationPolicy::SequentialChain => {
                tasks.sort_by_key(|t| t.role);
                let mut out = Vec::with_capacity(tasks.len());
                for task in &tasks {
                    out.push(session.run(task, events).await);
                }
                out
            }
        }
    }

    /// 按恢复引擎的建议处理可恢复错误；Abort 时把错误原样返回
    async fn recover(
        &self,
        err: AgentError,
        messages: &mut Vec<Message>,
        events: EventSink<'_>,
    ) -> Result<(), AgentError> {
        match self.recovery.handle(&err) {
            RecoveryAction::RetryWithPrompt(prompt) => {
                tracing::warn!(error = %err, "coordinator retrying with correction prompt");
                send_event(
                    events,
                    PlanEvent::Recovery {
                        action: "RetryWithPrompt".to_string(),
                        detail: prompt.clone(),
                    },
                );
                messages.push(Message::user(prompt));
                Ok(())
            }
            RecoveryAction::Backoff(delay) => {
                tracing::warn!(error = %err, delay_ms = delay.as_millis() as u64, "coordinator backing off");
                send_event(
                    events,
                    PlanEvent::Recovery {
                        action: "Backoff".to_string(),
                        detail: err.to_string(),
                    },
                );
                tokio::time::sleep(delay).await;
                Ok(())
            }
            RecoveryAction::Abort => Err(err),
        }
    }
}

/// 串行策略的固定调用顺序：Planner → Budget → LocalGuide → Research（阵容中没有的角色跳过）
///
/// 只放行链上下一个尚未调用的专家，跨轮次生效。
struct ChainOrder {
    pending: VecDeque<SpecialistRole>,
}

impl ChainOrder {
    fn new(specialists: &[Specialist]) -> Self {
        let mut roles: Vec<SpecialistRole> = specialists.iter().map(|s| s.role()).collect();
        roles.sort();
        roles.dedup();
        Self {
            pending: roles.into(),
        }
    }

    fn admit(&mut self, role: SpecialistRole) -> Result<(), AgentError> {
        match self.pending.front() {
            Some(&next) if next == role => {
                self.pending.pop_front();
                Ok(())
            }
            next => Err(AgentError::OutOfOrderDelegation {
                got: role.tool_name().to_string(),
                expected: next.map(|r| r.tool_name().to_string()),
            }),
        }
    }
}

/// 单个规划请求内的专家执行环境：每个专家一个新的 ToolExecutor（调用计数从零开始）
struct RequestSession<'a> {
    executors: HashMap<SpecialistRole, (&'a Specialist, ToolExecutor)>,
    timeout: Duration,
}

impl<'a> RequestSession<'a> {
    fn new(specialists: &'a [Specialist], timeout_secs: u64) -> Self {
        let executors = specialists
            .iter()
            .map(|s| (s.role(), (s, s.session_executor(timeout_secs))))
            .collect();
        Self {
            executors,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }

    async fn run(&self, task: &AgentTask, events: EventSink<'_>) -> AgentResult {
        let Some((specialist, executor)) = self.executors.get(&task.role) else {
            return AgentResult::degraded(
                task.role,
                format!("{} is not configured.", task.role.display_name()),
                0,
            );
        };

        send_event(events, PlanEvent::SpecialistStarted { role: task.role });
        tracing::info!(role = %task.role, tools = ?task.allowed_tools, "specialist started");

        let result = match tokio::time::timeout(self.timeout, specialist.run(task, executor)).await {
            Ok(result) => result,
            Err(_) => AgentResult::degraded(
                task.role,
                format!(
                    "{} timed out after {}s.",
                    task.role.display_name(),
                    self.timeout.as_secs()
                ),
                0,
            ),
        };

        if result.degraded {
            tracing::warn!(role = %task.role, diagnostic = %result.raw_text, "specialist degraded");
        } else {
            tracing::info!(role = %task.role, tool_calls = result.tool_calls, "specialist finished");
        }
        send_event(
            events,
            PlanEvent::SpecialistFinished {
                role: task.role,
                degraded: result.degraded,
                tool_calls: result.tool_calls,
            },
        );
        result
    }
}
