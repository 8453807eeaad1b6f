//! 默认专家阵容：Planner / Budget / LocalGuide / Research

use std::sync::Arc;

use crate::config::SpecialistsSection;
use crate::llm::LlmClient;
use crate::plan::SpecialistRole;
use crate::specialists::{Specialist, SpecialistConfig, ToolGrant};
use crate::tools::Tool;

pub fn planner_config() -> SpecialistConfig {
    SpecialistConfig::new(
        SpecialistRole::Planner,
        "Creates a day-by-day itinerary",
        "Create a day-by-day travel itinerary with the key attractions and activities for each day. \
         Respect the traveller's preferences and keep travel time between stops realistic.",
    )
    .with_output_hint("one short paragraph or bullet list per day, labelled Day 1, Day 2, ...")
}

pub fn budget_config() -> SpecialistConfig {
    SpecialistConfig::new(
        SpecialistRole::Budget,
        "Estimates trip costs",
        "Estimate travel costs for lodging, food, local transport and activities. \
         Give a breakdown and a total, and say whether it fits the stated budget.",
    )
    .with_output_hint("one line per cost category, then a Total line")
}

pub fn local_guide_config() -> SpecialistConfig {
    SpecialistConfig::new(
        SpecialistRole::LocalGuide,
        "Provides food recommendations and local tips",
        "Recommend local dishes and specific places to eat, and give practical cultural tips \
         (etiquette, tipping, transport passes).",
    )
}

pub fn research_config(search_limit: usize) -> SpecialistConfig {
    SpecialistConfig::new(
        SpecialistRole::Research,
        "Looks up time-sensitive information (events, closures, advisories) with web search",
        format!(
            "Find current, time-sensitive information for the trip: events, festivals, closures, \
             strikes, weather or travel advisories. Use web search sparingly (at most {} time(s)) \
             and summarise only what matters to the traveller.",
            search_limit
        ),
    )
    .with_output_hint("a few short bullet points; say so plainly if nothing notable was found")
}

/// 按配置组装专家；search 为 None 时 Research 仍存在，但只能依靠模型自身知识
pub fn default_roster(
    cfg: &SpecialistsSection,
    llm: Arc<dyn LlmClient>,
    search: Option<Arc<dyn Tool>>,
    enable_research: bool,
) -> Vec<Specialist> {
    let grant = |limit: usize| search.clone().map(|tool| ToolGrant::limited(tool, limit));

    let mut planner = planner_config().with_max_turns(cfg.max_turns);
    if cfg.planner_search {
        if let Some(g) = grant(cfg.search_limit) {
            planner = planner.with_tool(g);
        }
    }

    let mut local_guide = local_guide_config().with_max_turns(cfg.max_turns);
    if cfg.local_guide_search {
        if let Some(g) = grant(cfg.search_limit) {
            local_guide = local_guide.with_tool(g);
        }
    }

    let mut roster = vec![
        Specialist::new(planner, llm.clone()),
        Specialist::new(budget_config().with_max_turns(cfg.max_turns), llm.clone()),
        Specialist::new(local_guide, llm.clone()),
    ];

    if enable_research {
        let mut research = research_config(cfg.research_search_limit).with_max_turns(cfg.max_turns);
        if let Some(g) = grant(cfg.research_search_limit) {
            research = research.with_tool(g);
        }
        roster.push(Specialist::new(research, llm));
    }
    roster
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::MockLlmClient;
    use crate::tools::SearchTool;

    fn search() -> Option<Arc<dyn Tool>> {
        Some(Arc::new(SearchTool::new(None, 3, 100, 100)))
    }

    #[test]
    fn test_default_roster_grants_search_to_research_only() {
        let roster = default_roster(
            &SpecialistsSection::default(),
            Arc::new(MockLlmClient::new()),
            search(),
            true,
        );
        let roles: Vec<SpecialistRole> = roster.iter().map(|s| s.role()).collect();
        assert_eq!(roles, SpecialistRole::ALL.to_vec());
        for s in &roster {
            let has_tools = !s.config().tools.is_empty();
            assert_eq!(has_tools, s.role() == SpecialistRole::Research, "{}", s.role());
        }
        let research = roster.last().unwrap();
        assert_eq!(research.config().tools[0].max_calls, Some(1));
    }

    #[test]
    fn test_optional_grants_and_research_toggle() {
        let cfg = SpecialistsSection {
            planner_search: true,
            local_guide_search: true,
            ..SpecialistsSection::default()
        };
        let roster = default_roster(&cfg, Arc::new(MockLlmClient::new()), search(), false);
        assert_eq!(roster.len(), 3);
        assert_eq!(roster[0].config().tools.len(), 1);
        assert!(roster[1].config().tools.is_empty());
        assert_eq!(roster[2].config().tools[0].max_calls, Some(cfg.search_limit));
    }
}
