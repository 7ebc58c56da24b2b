// src/formatting.rs

use crate::core::Alert;
use serde_json::Value;

/// A trait for rendering an alert into provider-specific text.
pub trait TextFormatter: Send + Sync {
    fn format(&self, alert: &Alert) -> String;
}

/// One-line summary used for titles and paging summaries.
pub fn summary(alert: &Alert) -> String {
    match &alert.log_source {
        Some(source) => format!("Rule '{}' triggered on {}", alert.rule_name, source),
        None => format!("Rule '{}' triggered", alert.rule_name),
    }
}

/// Pretty JSON of the triggering record. Keys are sorted by construction.
pub fn record_json(alert: &Alert) -> String {
    serde_json::to_string_pretty(&alert.record).unwrap_or_else(|_| "{}".to_string())
}

/// Markdown for issue trackers.
pub struct MarkdownFormatter;

impl TextFormatter for MarkdownFormatter {
    fn format(&self, alert: &Alert) -> String {
        let description = alert
            .rule_description
            .as_deref()
            .filter(|d| !d.trim().is_empty())
            .unwrap_or("No rule description provided");

        format!(
            "### Description\n{}\n\n### Details\n- **Alert ID:** {}\n- **Created:** {}\n\n### Event data\n\n```json\n{}\n```",
            description,
            alert.id,
            alert.created.to_rfc3339(),
            record_json(alert)
        )
    }
}

/// Slack mrkdwn with the record in a code block.
pub struct SlackTextFormatter;

impl SlackTextFormatter {
    fn format_value(value: &Value) -> String {
        match value {
            Value::String(s) => s.clone(),
            other => other.to_string(),
        }
    }
}

impl TextFormatter for SlackTextFormatter {
    fn format(&self, alert: &Alert) -> String {
        let mut lines = vec![format!("*{}*", summary(alert))];
        if let Some(description) = alert.rule_description.as_deref() {
            lines.push(format!("_{}_", description));
        }
        if !alert.record.is_empty() {
            let fields: Vec<String> = alert
                .record
                .iter()
                .map(|(key, value)| format!("{}: {}", key, Self::format_value(value)))
                .collect();
            lines.push(format!("```\n{}\n```", fields.join("\n")));
        }
        lines.join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_alert() -> Alert {
        Alert::new("alert-1", "root_login")
            .with_description("Root account used")
            .with_field("user", "root")
            .with_field("count", 3)
    }

    #[test]
    fn test_summary_includes_log_source() {
        let mut alert = create_test_alert();
        assert_eq!(summary(&alert), "Rule 'root_login' triggered");

        alert.log_source = Some("cloudtrail:events".to_string());
        assert_eq!(
            summary(&alert),
            "Rule 'root_login' triggered on cloudtrail:events"
        );
    }

    #[test]
    fn test_markdown_formatter() {
        let body = MarkdownFormatter.format(&create_test_alert());
        assert!(body.starts_with("### Description\nRoot account used"));
        assert!(body.contains("- **Alert ID:** alert-1"));
        // Sorted keys
        let count_pos = body.find("\"count\"").unwrap();
        let user_pos = body.find("\"user\"").unwrap();
        assert!(count_pos < user_pos);
    }

    #[test]
    fn test_markdown_formatter_without_description() {
        let alert = Alert::new("alert-2", "no_desc");
        let body = MarkdownFormatter.format(&alert);
        assert!(body.contains("No rule description provided"));
    }

    #[test]
    fn test_slack_formatter() {
        let text = SlackTextFormatter.format(&create_test_alert());
        assert_eq!(
            text,
            "*Rule 'root_login' triggered*\n_Root account used_\n```\ncount: 3\nuser: root\n```"
        );
    }
}
