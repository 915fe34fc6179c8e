use std::collections::BTreeMap;
use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

const PLAY_TARGET: &str = "schnapsen_bot::play";
const GAME_TARGET: &str = "schnapsen_bench::game";

#[derive(Debug, Error)]
pub enum TelemetryError {
    #[error("{context}: {source}")]
    Io {
        context: &'static str,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse telemetry JSON: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Default, Serialize)]
pub struct TelemetrySummary {
    pub games: usize,
    pub decisions: usize,
    pub rejected_turns: usize,
    pub reason_counts: BTreeMap<String, usize>,
    pub agents: BTreeMap<String, AgentTelemetrySummary>,
}

#[derive(Debug, Default, Serialize)]
pub struct AgentTelemetrySummary {
    pub decisions: usize,
    pub leads: usize,
    pub follows: usize,
    pub avg_legal_moves: Option<f64>,
    pub reason_counts: BTreeMap<String, usize>,
}

#[derive(Debug, Default)]
struct Average {
    sum: f64,
    count: usize,
}

impl Average {
    fn add(&mut self, value: f64) {
        self.sum += value;
        self.count += 1;
    }

    fn mean(&self) -> Option<f64> {
        if self.count == 0 {
            None
        } else {
            Some(self.sum / self.count as f64)
        }
    }
}

/// Aggregate per-decision and per-game events written by the structured logger.
pub fn summarise_telemetry(path: &Path) -> Result<TelemetrySummary, TelemetryError> {
    if !path.exists() {
        return Ok(TelemetrySummary::default());
    }

    let file = File::open(path).map_err(|source| TelemetryError::Io {
        context: "opening telemetry log",
        source,
    })?;
    let reader = BufReader::new(file);

    let mut summary = TelemetrySummary::default();
    let mut legal_moves: BTreeMap<String, Average> = BTreeMap::new();

    for line in reader.lines() {
        let line = line.map_err(|source| TelemetryError::Io {
            context: "reading telemetry line",
            source,
        })?;
        if line.trim().is_empty() {
            continue;
        }

        let payload: Value = serde_json::from_str(&line)?;
        let target = payload
            .get("target")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let fields = payload
            .get("fields")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();

        match target {
            PLAY_TARGET => {
                if fields.contains_key("error") {
                    summary.rejected_turns += 1;
                    continue;
                }

                let agent = text_field(&fields, "agent");
                let reason = text_field(&fields, "reason");
                summary.decisions += 1;
                *summary.reason_counts.entry(reason.clone()).or_insert(0) += 1;

                let entry = summary.agents.entry(agent.clone()).or_default();
                entry.decisions += 1;
                *entry.reason_counts.entry(reason).or_insert(0) += 1;
                match fields.get("role").and_then(Value::as_str) {
                    Some("lead") => entry.leads += 1,
                    Some("follow") => entry.follows += 1,
                    _ => {}
                }
                if let Some(count) = fields.get("legal_count").and_then(Value::as_u64) {
                    legal_moves.entry(agent).or_default().add(count as f64);
                }
            }
            GAME_TARGET => summary.games += 1,
            _ => {}
        }
    }

    for (agent, average) in legal_moves {
        if let Some(entry) = summary.agents.get_mut(&agent) {
            entry.avg_legal_moves = average.mean();
        }
    }

    Ok(summary)
}

fn text_field(fields: &serde_json::Map<String, Value>, key: &str) -> String {
    fields
        .get(key)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("<unset>")
        .to_string()
}

pub fn write_summary_outputs(
    telemetry_path: &Path,
    output_dir: &Path,
) -> Result<Option<TelemetryOutputs>, TelemetryError> {
    if !telemetry_path.exists() {
        return Ok(None);
    }

    let summary = summarise_telemetry(telemetry_path)?;
    let json_path = output_dir.join("telemetry_summary.json");
    let md_path = output_dir.join("telemetry_summary.md");

    std::fs::write(&json_path, serde_json::to_vec_pretty(&summary)?).map_err(|source| {
        TelemetryError::Io {
            context: "writing telemetry summary json",
            source,
        }
    })?;

    let markdown = render_markdown(&summary, telemetry_path);
    std::fs::write(&md_path, markdown).map_err(|source| TelemetryError::Io {
        context: "writing telemetry summary markdown",
        source,
    })?;

    Ok(Some(TelemetryOutputs {
        summary,
        json_path,
        markdown_path: md_path,
    }))
}

pub fn append_highlights_to_markdown(
    summary_path: &Path,
    outputs: &TelemetryOutputs,
) -> Result<(), TelemetryError> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(summary_path)
        .map_err(|source| TelemetryError::Io {
            context: "opening summary markdown for telemetry append",
            source,
        })?;

    let summary = &outputs.summary;
    let mut section = String::new();
    section.push_str("\n## Telemetry Highlights\n");
    section.push_str(&format!("- Games logged: {}\n", summary.games));
    section.push_str(&format!("- Decisions logged: {}\n", summary.decisions));
    if summary.rejected_turns > 0 {
        section.push_str(&format!("- Rejected turns: {}\n", summary.rejected_turns));
    }

    section.push_str("\n### Decision Reasons\n");
    if summary.reason_counts.is_empty() {
        section.push_str("- <none>\n");
    } else {
        for (reason, count) in &summary.reason_counts {
            section.push_str(&format!("- {reason}: {count}\n"));
        }
    }

    write!(file, "{section}").map_err(|source| TelemetryError::Io {
        context: "writing telemetry highlights",
        source,
    })?;

    Ok(())
}

fn render_markdown(summary: &TelemetrySummary, telemetry_path: &Path) -> String {
    let mut output = String::new();
    output.push_str("# Telemetry Summary\n\n");
    output.push_str(&format!("- Source: `{}`\n", telemetry_path.display()));
    output.push_str(&format!("- Games: {}\n", summary.games));
    output.push_str(&format!("- Decisions: {}\n", summary.decisions));
    output.push_str(&format!("- Rejected turns: {}\n", summary.rejected_turns));
    output.push('\n');

    if summary.agents.is_empty() {
        output.push_str("## Agents\n- <none>\n");
        return output;
    }

    for (agent, stats) in &summary.agents {
        output.push_str(&format!("## {agent}\n"));
        output.push_str(&format!(
            "- Decisions: {} ({} leading, {} following)\n",
            stats.decisions, stats.leads, stats.follows
        ));
        if let Some(value) = stats.avg_legal_moves {
            output.push_str(&format!("- Avg legal moves: {value:.2}\n"));
        }
        output.push_str("- Reasons:\n");
        for (reason, count) in &stats.reason_counts {
            let share = *count as f64 / stats.decisions.max(1) as f64 * 100.0;
            output.push_str(&format!("  - {reason}: {count} ({share:.1}%)\n"));
        }
        output.push('\n');
    }
    output
}

#[derive(Debug)]
pub struct TelemetryOutputs {
    pub summary: TelemetrySummary,
    pub json_path: PathBuf,
    pub markdown_path: PathBuf,
}
