//! 可下载的行程文档（Markdown）

use crate::plan::TravelPlan;

impl TravelPlan {
    /// 渲染为 Markdown 文档：固定的 Itinerary / Budget / Local Tips 段，updates 非空时追加 Current Updates
    pub fn to_document(&self) -> String {
        let mut doc = format!(
            "# {} Trip Plan ({})\n\n## Itinerary\n{}\n\n## Budget\n{}\n\n## Local Tips\n{}\n",
            self.destination, self.duration, self.summary, self.cost, self.tips
        );
        if !self.updates.trim().is_empty() {
            doc.push_str(&format!("\n## Current Updates\n{}\n", self.updates));
        }
        doc
    }
}

/// 建议的下载文件名：目的地转小写、空格换成下划线
pub fn document_file_name(destination: &str) -> String {
    let slug: String = destination
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_whitespace() { '_' } else { c })
        .filter(|c| !matches!(c, '/' | '\\' | ':'))
        .collect();
    format!("{}_trip_plan.md", slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plan::normalize;

    fn sample_plan(updates: &str) -> TravelPlan {
        TravelPlan {
            destination: "New York".to_string(),
            duration: "3 days".to_string(),
            summary: "Day 1: Central Park".to_string(),
            cost: "Total $1200".to_string(),
            tips: "Try a bagel".to_string(),
            updates: updates.to_string(),
        }
    }

    #[test]
    fn test_document_headers() {
        let doc = sample_plan("").to_document();
        assert!(doc.starts_with("# New York Trip Plan (3 days)"));
        assert!(doc.contains("## Itinerary\nDay 1: Central Park"));
        assert!(doc.contains("## Budget\nTotal $1200"));
        assert!(doc.contains("## Local Tips\nTry a bagel"));
        assert!(!doc.contains("Current Updates"));

        let doc = sample_plan("Marathon on Sunday").to_document();
        assert!(doc.contains("## Current Updates\nMarathon on Sunday"));
    }

    #[test]
    fn test_document_normalizes_back_to_same_fields() {
        let plan = sample_plan("Marathon on Sunday");
        let doc = plan.to_document();
        let parsed = normalize(&doc, "New York", 3);
        assert_eq!(parsed.summary, plan.summary);
        assert_eq!(parsed.cost, plan.cost);
        assert_eq!(parsed.tips, plan.tips);
        assert_eq!(parsed.updates, plan.updates);
    }

    #[test]
    fn test_document_file_name() {
        assert_eq!(document_file_name("New York"), "new_york_trip_plan.md");
        assert_eq!(document_file_name(" Tokyo "), "tokyo_trip_plan.md");
    }
}
