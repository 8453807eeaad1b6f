//! 专家 Agent：单一关注点的无状态文本变换单元
//!
//! run(task, executor) 在最多 max_turns 轮内完成：模型可以先调用被授权的工具（如 web_search），
//! 再给出最终回答。模型调用失败、超出轮数时返回 degraded 的 AgentResult，从不向协调者抛错。

use std::sync::Arc;

use crate::llm::{LlmClient, Message};
use crate::plan::{AgentResult, AgentTask, PlanFragment, SpecialistRole};
use crate::protocol::{parse_agent_output, AgentOutput};
use crate::tools::{CallLimitedTool, Tool, ToolExecutor, ToolRegistry};

/// 授予专家的工具；max_calls 为每个规划请求内的调用上限
#[derive(Clone)]
pub struct ToolGrant {
    pub tool: Arc<dyn Tool>,
    pub max_calls: Option<usize>,
}

impl ToolGrant {
    pub fn unlimited(tool: Arc<dyn Tool>) -> Self {
        Self {
            tool,
            max_calls: None,
        }
    }

    pub fn limited(tool: Arc<dyn Tool>, max_calls: usize) -> Self {
        Self {
            tool,
            max_calls: Some(max_calls),
        }
    }
}

/// 专家配置：角色、指令、输出形状提示与工具授权
#[derive(Clone)]
pub struct SpecialistConfig {
    pub role: SpecialistRole,
    /// 交给协调者的一句话能力描述
    pub description: String,
    pub instructions: String,
    pub output_hint: Option<String>,
    pub tools: Vec<ToolGrant>,
    pub max_turns: usize,
}

impl SpecialistConfig {
    pub fn new(role: SpecialistRole, description: impl Into<String>, instructions: impl Into<String>) -> Self {
        Self {
            role,
            description: description.into(),
            instructions: instructions.into(),
            output_hint: None,
            tools: Vec::new(),
            max_turns: 3,
        }
    }

    pub fn with_output_hint(mut self, hint: impl Into<String>) -> Self {
        self.output_hint = Some(hint.into());
        self
    }

    pub fn with_tool(mut self, grant: ToolGrant) -> Self {
        self.tools.push(grant);
        self
    }

    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = max_turns.max(1);
        self
    }
}

pub struct Specialist {
    config: SpecialistConfig,
    llm: Arc<dyn LlmClient>,
}

impl Specialist {
    /// 创建专家；不允许持有搜索的角色（Budget）上的工具授权会被丢弃
    pub fn new(mut config: SpecialistConfig, llm: Arc<dyn LlmClient>) -> Self {
        if !config.role.may_hold_search() && !config.tools.is_empty() {
            tracing::warn!(role = %config.role, "role may not hold tools, dropping grants");
            config.tools.clear();
        }
        Self { config, llm }
    }

    pub fn role(&self) -> SpecialistRole {
        self.config.role
    }

    pub fn description(&self) -> &str {
        &self.config.description
    }

    pub fn config(&self) -> &SpecialistConfig {
        &self.config
    }

    /// 为一次规划请求创建工具执行器；带上限的授权包一层新的 CallLimitedTool，计数从零开始
    pub fn session_executor(&self, timeout_secs: u64) -> ToolExecutor {
        let mut registry = ToolRegistry::new();
        for grant in &self.config.tools {
            match grant.max_calls {
                Some(n) => registry.register(CallLimitedTool::new(grant.tool.clone(), n)),
                None => registry.register_arc(grant.tool.clone()),
            }
        }
        ToolExecutor::new(registry, timeout_secs)
    }

    pub fn task(&self, prompt_text: impl Into<String>) -> AgentTask {
        AgentTask {
            role: self.config.role,
            prompt_text: prompt_text.into(),
            allowed_tools: self
                .config
                .tools
                .iter()
                .map(|g| g.tool.name().to_string())
                .collect(),
        }
    }

    fn system_prompt(&self, executor: &ToolExecutor) -> String {
        let mut prompt = format!(
            "You are the {}. {}\nBe concise and respond in one message.",
            self.config.role.display_name(),
            self.config.instructions
        );
        if let Some(hint) = &self.config.output_hint {
            prompt.push_str(&format!("\nOutput format: {}", hint));
        }
        if executor.has_tools() {
            let limits: Vec<String> = self
                .config
                .tools
                .iter()
                .filter_map(|g| {
                    g.max_calls
                        .map(|n| format!("Use {} at most {} time(s).", g.tool.name(), n))
                })
                .collect();
            prompt.push_str(&format!(
                "\n\nTo call a tool, reply with only a JSON object: {{\"tool\": \"<name>\", \"args\": {{...}}}}.\nAvailable tools:\n{}\n{}",
                executor.schema_json(),
                limits.join(" ")
            ));
        }
        prompt
    }

    /// 执行一次委派；总是返回 AgentResult
    pub async fn run(&self, task: &AgentTask, executor: &ToolExecutor) -> AgentResult {
        let role = self.config.role;
        let mut messages = vec![
            Message::system(self.system_prompt(executor)),
            Message::user(task.prompt_text.clone()),
        ];
        let mut tool_calls = 0usize;

        for turn in 1..=self.config.max_turns {
            if turn == self.config.max_turns && turn > 1 {
                messages.push(Message::user(
                    "No more tool calls are allowed. Give your final answer now.",
                ));
            }

            let output = match self.llm.complete(&messages).await {
                Ok(o) => o,
                Err(e) => {
                    tracing::warn!(role = %role, error = %e, "specialist model call failed");
                    return AgentResult::degraded(
                        role,
                        format!("{} could not complete the task: {}", role.display_name(), e),
                        tool_calls,
                    );
                }
            };

            match parse_agent_output(&output) {
                Ok(AgentOutput::Answer(text)) => {
                    let structured = PlanFragment::parse(&text);
                    tracing::debug!(role = %role, turn, chars = text.len(), "specialist answered");
                    return AgentResult::completed(role, text, structured, tool_calls);
                }
                // 最后一轮的工具调用不再执行，结果也没有机会被使用
                Ok(AgentOutput::Calls(_)) if turn == self.config.max_turns => {
                    tracing::debug!(role = %role, turn, "tool call on final turn skipped");
                    break;
                }
                Ok(AgentOutput::Calls(calls)) if executor.has_tools() => {
                    messages.push(Message::assistant(output));
                    for call in calls {
                        tool_calls += 1;
                        let observation = match executor.execute(&call.tool, call.args.clone()).await {
                            Ok(content) => content,
                            Err(e) => format!("Tool error: {}", e),
                        };
                        messages.push(Message::user(format!(
                            "Observation from {}:\n{}",
                            call.tool, observation
                        )));
                    }
                }
                Ok(AgentOutput::Calls(_)) => {
                    messages.push(Message::assistant(output));
                    messages.push(Message::user(
                        "You have no tools available. Answer directly in plain text.",
                    ));
                }
                Err(e) => {
                    tracing::debug!(role = %role, error = %e, "specialist emitted malformed tool call");
                    messages.push(Message::assistant(output));
                    messages.push(Message::user(format!(
                        "That was not a valid tool call ({}). Either send valid JSON or answer in plain text.",
                        e
                    )));
                }
            }
        }

        tracing::warn!(role = %role, max_turns = self.config.max_turns, "specialist did not finish");
        AgentResult::degraded(
            role,
            format!(
                "{} did not finish within {} turns.",
                role.display_name(),
                self.config.max_turns
            ),
            tool_calls,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{system_content, LlmError, MockLlmClient};
    use crate::tools::{SearchBackend, SearchEntry, SearchTool, CALL_LIMIT_REACHED};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct CountingBackend(Arc<AtomicUsize>);

    #[async_trait]
    impl SearchBackend for CountingBackend {
        async fn query(&self, query: &str, _max: usize) -> Result<Vec<SearchEntry>, String> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Ok(vec![SearchEntry {
                title: "News".to_string(),
                snippet: format!("about {}", query),
            }])
        }
    }

    fn search_tool(counter: Arc<AtomicUsize>) -> Arc<dyn Tool> {
        Arc::new(SearchTool::new(Some(Arc::new(CountingBackend(counter))), 3, 100, 100))
    }

    #[tokio::test]
    async fn test_plain_answer() {
        let llm = Arc::new(MockLlmClient::scripted(vec!["Day 1: Senso-ji"]));
        let planner = Specialist::new(
            SpecialistConfig::new(SpecialistRole::Planner, "itinerary", "Plan days."),
            llm,
        );
        let executor = planner.session_executor(5);
        let result = planner.run(&planner.task("5 days in Tokyo"), &executor).await;
        assert!(!result.degraded);
        assert_eq!(result.raw_text, "Day 1: Senso-ji");
        assert_eq!(result.tool_calls, 0);
    }

    #[tokio::test]
    async fn test_model_failure_is_degraded_not_error() {
        let llm = Arc::new(MockLlmClient::failing(LlmError::ApiError("503".to_string())));
        let budget = Specialist::new(
            SpecialistConfig::new(SpecialistRole::Budget, "costs", "Estimate costs."),
            llm,
        );
        let executor = budget.session_executor(5);
        let result = budget.run(&budget.task("costs"), &executor).await;
        assert!(result.degraded);
        assert!(result.raw_text.contains("Budget Agent"));
        assert!(result.structured.is_none());
    }

    #[tokio::test]
    async fn test_search_then_answer_respects_limit() {
        let searches = Arc::new(AtomicUsize::new(0));
        let llm = Arc::new(MockLlmClient::scripted(vec![
            r#"{"tool": "web_search", "args": {"query": "tokyo events"}}"#,
            r#"{"tool": "web_search", "args": {"query": "tokyo weather"}}"#,
            "Updates: sumo tournament this week",
        ]));
        let research = Specialist::new(
            SpecialistConfig::new(SpecialistRole::Research, "current events", "Research.")
                .with_tool(ToolGrant::limited(search_tool(searches.clone()), 1)),
            llm,
        );
        let executor = research.session_executor(5);
        let result = research.run(&research.task("Tokyo next week"), &executor).await;

        assert!(!result.degraded);
        assert_eq!(result.tool_calls, 2);
        assert_eq!(searches.load(Ordering::SeqCst), 1);
        assert!(result.raw_text.contains("sumo"));
    }

    #[tokio::test]
    async fn test_limit_message_reaches_model() {
        let searches = Arc::new(AtomicUsize::new(0));
        let llm = Arc::new(MockLlmClient::with_responder(|messages| {
            let last = crate::llm::last_user_content(messages);
            if last.contains(CALL_LIMIT_REACHED) {
                Ok("done without search".to_string())
            } else {
                Ok(r#"{"tool": "web_search", "args": {"query": "x"}}"#.to_string())
            }
        }));
        let research = Specialist::new(
            SpecialistConfig::new(SpecialistRole::Research, "current events", "Research.")
                .with_tool(ToolGrant::limited(search_tool(searches.clone()), 1))
                .with_max_turns(5),
            llm,
        );
        let executor = research.session_executor(5);
        let result = research.run(&research.task("x"), &executor).await;
        assert_eq!(result.raw_text, "done without search");
        assert_eq!(searches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_budget_cannot_hold_search() {
        let budget = Specialist::new(
            SpecialistConfig::new(SpecialistRole::Budget, "costs", "Estimate costs.")
                .with_tool(ToolGrant::unlimited(search_tool(Arc::new(AtomicUsize::new(0))))),
            Arc::new(MockLlmClient::new()),
        );
        assert!(budget.config().tools.is_empty());
        assert!(!budget.session_executor(5).has_tools());
        assert!(budget.task("x").allowed_tools.is_empty());
    }

    #[tokio::test]
    async fn test_turn_cap_returns_degraded() {
        let searches = Arc::new(AtomicUsize::new(0));
        let llm = Arc::new(MockLlmClient::with_responder(|_| {
            Ok(r#"{"tool": "web_search", "args": {"query": "again"}}"#.to_string())
        }));
        let guide = Specialist::new(
            SpecialistConfig::new(SpecialistRole::LocalGuide, "tips", "Tips.")
                .with_tool(ToolGrant::unlimited(search_tool(searches.clone())))
                .with_max_turns(2),
            llm,
        );
        let executor = guide.session_executor(5);
        let result = guide.run(&guide.task("x"), &executor).await;
        assert!(result.degraded);
        assert!(result.raw_text.contains("did not finish within 2 turns"));
        // 第二轮（最后一轮）的搜索不会执行
        assert_eq!(searches.load(Ordering::SeqCst), 1);
        assert_eq!(result.tool_calls, 1);
    }

    #[tokio::test]
    async fn test_final_turn_call_does_not_spend_search_budget() {
        let searches = Arc::new(AtomicUsize::new(0));
        let llm = Arc::new(MockLlmClient::with_responder(|_| {
            Ok(r#"{"tool": "web_search", "args": {"query": "festival dates"}}"#.to_string())
        }));
        let research = Specialist::new(
            SpecialistConfig::new(SpecialistRole::Research, "current events", "Research.")
                .with_tool(ToolGrant::limited(search_tool(searches.clone()), 1))
                .with_max_turns(1),
            llm,
        );
        let executor = research.session_executor(5);
        let result = research.run(&research.task("Kyoto in April"), &executor).await;
        assert!(result.degraded);
        assert_eq!(searches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_system_prompt_mentions_tool_limit() {
        let seen = Arc::new(std::sync::Mutex::new(String::new()));
        let captured = seen.clone();
        let llm = Arc::new(MockLlmClient::with_responder(move |messages| {
            *captured.lock().unwrap() = system_content(messages).to_string();
            Ok("ok".to_string())
        }));
        let research = Specialist::new(
            SpecialistConfig::new(SpecialistRole::Research, "current events", "Research.")
                .with_output_hint("short bullet list")
                .with_tool(ToolGrant::limited(search_tool(Arc::new(AtomicUsize::new(0))), 1)),
            llm,
        );
        let executor = research.session_executor(5);
        research.run(&research.task("x"), &executor).await;
        let system = seen.lock().unwrap().clone();
        assert!(system.contains("Use web_search at most 1 time(s)."));
        assert!(system.contains("Output format: short bullet list"));
        assert!(system.contains("\"web_search\""));
    }
}
