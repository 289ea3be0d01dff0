use std::fmt;
use std::str::FromStr;

use crate::domain::model::{AggregateResult, ExtractionQuery, SlotRecord};
use crate::utils::error::{Result, ScoutError};

pub const REPORT_TITLE: &str = "# Tee time lookup";
pub const NOTHING_MATCHED: &str = "Nothing matched. Could be full, or a site layout changed.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum ReportFormat {
    #[default]
    Markdown,
    Json,
    Csv,
}

impl FromStr for ReportFormat {
    type Err = ScoutError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "markdown" | "md" => Ok(ReportFormat::Markdown),
            "json" => Ok(ReportFormat::Json),
            "csv" => Ok(ReportFormat::Csv),
            other => Err(ScoutError::InvalidConfigValueError {
                field: "format".to_string(),
                value: other.to_string(),
                reason: "Valid formats: markdown, json, csv".to_string(),
            }),
        }
    }
}

impl fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ReportFormat::Markdown => "markdown",
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
        };
        f.write_str(name)
    }
}

pub fn render(format: ReportFormat, result: &AggregateResult, query: &ExtractionQuery) -> Result<String> {
    match format {
        ReportFormat::Markdown => Ok(render_markdown(result, query)),
        ReportFormat::Json => render_json(result, query),
        ReportFormat::Csv => render_csv(result),
    }
}

fn header_lines(query: &ExtractionQuery) -> Vec<String> {
    vec![
        REPORT_TITLE.to_string(),
        String::new(),
        format!("- Date: **{}**", query.date.format("%Y-%m-%d")),
        format!(
            "- Filter: **{}+ players**, **before {}**",
            query.min_players,
            query.latest_label()
        ),
    ]
}

fn slot_line(record: &SlotRecord) -> String {
    let time = if record.is_placeholder() {
        "unavailable".to_string()
    } else {
        record.time_label()
    };
    let hint = record
        .player_hint
        .as_deref()
        .map(|h| format!(" ({})", h))
        .unwrap_or_default();
    format!("- **{}**{}  [open booking page]({})", time, hint, record.action_url)
}

/// Markdown 報表：依來源首次出現順序分段，沒有結果時只顯示一則提示
pub fn render_markdown(result: &AggregateResult, query: &ExtractionQuery) -> String {
    let mut lines = header_lines(query);

    if result.slots.is_empty() {
        lines.push(String::new());
        lines.push(NOTHING_MATCHED.to_string());
        if !result.failures.is_empty() {
            lines.push(String::new());
            lines.push("Sources that failed:".to_string());
            for failure in &result.failures {
                lines.push(format!(
                    "- {}: {}  [open booking page]({})",
                    failure.source,
                    failure.player_hint.as_deref().unwrap_or("ERROR"),
                    failure.action_url
                ));
            }
        }
        lines.push(String::new());
        return lines.join("\n");
    }

    lines.push("- Tip: right-click a link (or Ctrl/Cmd-click) to open it in a new tab.".to_string());
    lines.push(String::new());

    let merged = result.merged();
    let mut groups: Vec<(&str, Vec<&SlotRecord>)> = Vec::new();
    for record in &merged {
        match groups.iter().position(|(name, _)| *name == record.source) {
            Some(i) => groups[i].1.push(record),
            None => groups.push((record.source.as_str(), vec![record])),
        }
    }

    for (source, items) in groups {
        lines.push(format!("## {}", source));
        lines.push(String::new());
        lines.extend(items.into_iter().map(slot_line));
        lines.push(String::new());
    }

    lines.join("\n")
}

/// 與查詢 API 回應相同的結構
pub fn render_json(result: &AggregateResult, query: &ExtractionQuery) -> Result<String> {
    let payload = serde_json::json!({
        "ok": true,
        "date": query.date.format("%Y-%m-%d").to_string(),
        "players": query.min_players,
        "before": query.latest_label(),
        "slots": result.slots,
        "failures": result.failures,
    });
    Ok(serde_json::to_string_pretty(&payload)?)
}

pub fn render_csv(result: &AggregateResult) -> Result<String> {
    let mut writer = csv::Writer::from_writer(Vec::new());
    for record in result.merged() {
        writer.serialize(&record)?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| ScoutError::IoError(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}
