//! 协调者提示词构建
//!
//! 用户请求被拼成一条组合 prompt；system prompt 描述可委派的专家、编排策略与最终输出格式。

use crate::coordinator::OrchestrationPolicy;
use crate::plan::{SpecialistRole, TripRequest};
use crate::protocol::tool_call_schema_json;
use crate::specialists::Specialist;

/// 由请求参数生成给协调者的组合 prompt
pub fn build_trip_prompt(request: &TripRequest) -> String {
    let preferences = match request.preferences() {
        Some(p) => format!("Special preferences: {}", p),
        None => "No special preferences.".to_string(),
    };
    format!(
        "Plan a {}-day trip to {} with a budget of ${:.0} USD.\n\n{}\n\n\
         Please create a comprehensive travel plan including:\n\
         1. A detailed day-by-day itinerary\n\
         2. Estimated costs for accommodations, food, transportation, and activities\n\
         3. Local food recommendations and cultural tips\n",
        request.num_days(),
        request.destination(),
        request.budget_amount(),
        preferences
    )
}

/// 协调者 system prompt
pub fn coordinator_system_prompt(
    policy: OrchestrationPolicy,
    specialists: &[&Specialist],
    structured: bool,
    plan_schema_json: &str,
) -> String {
    let roster = specialists
        .iter()
        .map(|s| format!("- {}: {}", s.role().tool_name(), s.description()))
        .collect::<Vec<_>>()
        .join("\n");

    let has_research = specialists.iter().any(|s| s.role() == SpecialistRole::Research);
    let research_rule = if has_research {
        "\nOnly call research_agent when the trip needs time-sensitive information \
         (events, closures, advisories, seasonal conditions); otherwise skip it."
    } else {
        ""
    };

    let policy_rules = match policy {
        OrchestrationPolicy::ParallelFanOut => {
            "Call planner_agent, budget_agent and local_guide_agent IN PARALLEL: put all calls in a \
             SINGLE turn using {\"tool_calls\": [...]}. The agents never see each other's output. \
             After their results arrive, combine them into the final output immediately."
        }
        OrchestrationPolicy::SequentialChain => {
            "Call the agents one at a time in this order: planner_agent, budget_agent, \
             local_guide_agent. Give each agent the traveller's original request; do not pass one \
             agent's output to another. After the last result arrives, write the final output."
        }
    };

    let output_rules = if structured {
        format!(
            "Final output: reply with ONLY one JSON object matching this schema (no tool field):\n{}\n\
             Put the itinerary in \"summary\", the cost breakdown in \"cost\", food and local tips in \
             \"tips\", and time-sensitive notes in \"updates\" (empty string if none).",
            plan_schema_json
        )
    } else {
        "Final output: plain text with these section headers on their own lines: \
         \"Itinerary:\", \"Budget:\", \"Local Tips:\" and, only if research was done, \
         \"Current Updates:\"."
            .to_string()
    };

    format!(
        "You are the Travel Agent. You orchestrate travel planning by delegating to these agents:\n\
         {roster}\n\n{policy_rules}{research_rule}\n\n\
         To delegate, reply with only JSON in one of these forms \
         ({{\"args\": {{\"input\": \"<task for the agent>\"}}}}):\n{calls}\n\n{output_rules}",
        roster = roster,
        policy_rules = policy_rules,
        research_rule = research_rule,
        calls = tool_call_schema_json(),
        output_rules = output_rules,
    )
}

/// 强制结构化时，对非结构化的最终回答追加的重排提示
pub fn reformat_prompt() -> &'static str {
    "Your final output must be a single JSON object with the fields destination, duration, \
     summary, cost, tips and updates. Rewrite your previous answer in that format only."
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::specialists::roster::{budget_config, planner_config, research_config};
    use std::sync::Arc;

    #[test]
    fn test_trip_prompt_with_and_without_preferences() {
        let req = TripRequest::new("Tokyo", 5, 2000.0, None).unwrap();
        let prompt = build_trip_prompt(&req);
        assert!(prompt.starts_with("Plan a 5-day trip to Tokyo with a budget of $2000 USD."));
        assert!(prompt.contains("No special preferences."));

        let req = TripRequest::new("Tokyo", 5, 2000.0, Some("vegetarian".to_string())).unwrap();
        assert!(build_trip_prompt(&req).contains("Special preferences: vegetarian"));
    }

    #[test]
    fn test_system_prompt_lists_agents_and_policy() {
        let llm = Arc::new(MockLlmClient::new());
        let planner = Specialist::new(planner_config(), llm.clone());
        let budget = Specialist::new(budget_config(), llm.clone());
        let research = Specialist::new(research_config(1), llm);

        let prompt = coordinator_system_prompt(
            OrchestrationPolicy::ParallelFanOut,
            &[&planner, &budget, &research],
            true,
            "{\"schema\": true}",
        );
        assert!(prompt.contains("- planner_agent: Creates a day-by-day itinerary"));
        assert!(prompt.contains("IN PARALLEL"));
        assert!(prompt.contains("Only call research_agent"));
        assert!(prompt.contains("{\"schema\": true}"));

        let prompt = coordinator_system_prompt(
            OrchestrationPolicy::SequentialChain,
            &[&planner, &budget],
            false,
            "",
        );
        assert!(prompt.contains("one at a time"));
        assert!(prompt.contains("\"Local Tips:\""));
        assert!(!prompt.contains("research_agent"));
    }
}
