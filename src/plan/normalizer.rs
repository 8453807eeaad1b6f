//! Response Normalizer：把协调者的自由文本拆成标准 TravelPlan
//!
//! 识别行首的分段标记（不区分大小写，可带 Markdown 标题 `#`、加粗 `**` 与冒号）：
//! Itinerary / Budget / Tips | Local Tips / Updates | Current Updates。
//! 每个标记的内容延伸到下一个标记或文本末尾；缺失的段落为空串。
//! 三个主标记一个都没有时，整段原文（去除首尾空白）放入 itinerary（summary）字段，其余为空。
//! destination 与 duration 始终取自请求参数，从不从模型文本中解析。

use std::sync::OnceLock;

use regex::Regex;

use crate::plan::{AgentResult, CoordinatorOutput, PlanField, PlanFragment, TravelPlan, TripRequest};

const MARKER_PATTERN: &str = r"(?im)^[ \t]*(?:#{1,6}[ \t]*)?(?:\*\*|__)?[ \t]*(local[ \t]+tips|current[ \t]+updates|itinerary|budget|tips|updates)[ \t]*(?:\*\*|__)?[ \t]*(?::[ \t]*(?:\*\*|__)?|\r?$)";

fn marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(MARKER_PATTERN).expect("marker pattern is valid"))
}

fn label_field(label: &str) -> PlanField {
    let label = label.to_lowercase();
    if label.starts_with("itinerary") {
        PlanField::Summary
    } else if label.starts_with("budget") {
        PlanField::Cost
    } else if label.ends_with("tips") {
        PlanField::Tips
    } else {
        PlanField::Updates
    }
}

/// 按标记拆分文本为 TravelPlan
pub fn normalize(raw_text: &str, destination: &str, num_days: u32) -> TravelPlan {
    let mut plan = TravelPlan {
        destination: destination.to_string(),
        duration: super::duration_label(num_days),
        summary: String::new(),
        cost: String::new(),
        tips: String::new(),
        updates: String::new(),
    };

    let markers: Vec<(PlanField, usize, usize)> = marker_regex()
        .captures_iter(raw_text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let label = caps.get(1)?;
            Some((label_field(label.as_str()), whole.start(), whole.end()))
        })
        .collect();

    let has_primary = markers
        .iter()
        .any(|(field, _, _)| *field != PlanField::Updates);
    if !has_primary {
        tracing::debug!(
            markers = markers.len(),
            "no primary section markers, attributing whole text to itinerary"
        );
        plan.summary = raw_text.trim().to_string();
        return plan;
    }

    if let Some((_, first_start, _)) = markers.first() {
        if !raw_text[..*first_start].trim().is_empty() {
            tracing::debug!(chars = first_start, "dropping preamble before first section marker");
        }
    }

    for (i, (field, _, content_start)) in markers.iter().enumerate() {
        let content_end = markers
            .get(i + 1)
            .map(|(_, next_start, _)| *next_start)
            .unwrap_or(raw_text.len());
        let content = raw_text[*content_start..content_end].trim();
        if content.is_empty() {
            continue;
        }
        let slot = plan.field_mut(*field);
        if !slot.is_empty() {
            slot.push_str("\n\n");
        }
        slot.push_str(content);
    }
    plan
}

/// 将计划渲染回带标签的文本（normalize 的逆过程）；updates 为空时省略该段
pub fn render_labeled(plan: &TravelPlan) -> String {
    let mut out = format!(
        "Itinerary:\n{}\n\nBudget:\n{}\n\nLocal Tips:\n{}\n",
        plan.summary, plan.cost, plan.tips
    );
    if !plan.updates.trim().is_empty() {
        out.push_str(&format!("\nCurrent Updates:\n{}\n", plan.updates));
    }
    out
}

fn from_fragment(fragment: &PlanFragment, request: &TripRequest) -> TravelPlan {
    let mut plan = TravelPlan::empty_for(request);
    for field in [PlanField::Summary, PlanField::Cost, PlanField::Tips, PlanField::Updates] {
        if let Some(text) = fragment.field(field) {
            *plan.field_mut(field) = text.to_string();
        }
    }
    plan
}

/// 将协调者输出统一转为 TravelPlan，并用专家结果回填仍为空的字段
pub fn reconcile(
    output: &CoordinatorOutput,
    request: &TripRequest,
    specialist_results: &[AgentResult],
) -> TravelPlan {
    let mut plan = match output {
        CoordinatorOutput::Structured(fragment) => from_fragment(fragment, request),
        CoordinatorOutput::RawText(text) => {
            normalize(text, request.destination(), request.num_days())
        }
    };

    for result in specialist_results {
        let field = result.role.plan_field();
        if !plan.field(field).trim().is_empty() {
            continue;
        }
        if let Some(text) = result.contribution() {
            tracing::info!(role = %result.role, "backfilling empty plan field from specialist result");
            *plan.field_mut(field) = text;
        }
    }
    plan
}
