use std::collections::HashMap;

use serde::Serialize;

use crate::{execution::ValidationResult, util::percentage};

/// One validated worker output, as fed to the execution report.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionRecord {
    pub source: String,
    pub task_type: String,
    pub validation: ValidationResult,
}

#[derive(Debug, Default)]
struct TypeTally {
    total: usize,
    executed: usize,
}

pub fn generate(records: &[ExecutionRecord]) -> String {
    let total = records.len();
    let executed = records.iter().filter(|r| r.validation.executed).count();
    let analyzed = total - executed;

    let mut lines = vec![
        "Execution Report".to_string(),
        "================".to_string(),
        format!("Total tasks: {}", total),
        format!(
            "Executed: {} ({:.1}%)",
            executed,
            percentage(executed, total)
        ),
        format!(
            "Only analyzed: {} ({:.1}%)",
            analyzed,
            percentage(analyzed, total)
        ),
    ];

    let by_type = tally_by_type(records);
    if !by_type.is_empty() {
        lines.push(String::new());
        lines.push("By task type:".to_string());
        for (task_type, tally) in &by_type {
            lines.push(format!(
                "  {}: {}/{} executed",
                task_type, tally.executed, tally.total
            ));
        }
    }

    lines.push(String::new());
    let issues = issue_frequencies(records);
    if issues.is_empty() {
        lines.push("No issues found".to_string());
    } else {
        lines.push("Issues:".to_string());
        for (issue, count) in issues {
            lines.push(format!("  {:>4}x  {}", count, issue));
        }
    }

    lines.join("\n")
}

fn tally_by_type(records: &[ExecutionRecord]) -> Vec<(&str, TypeTally)> {
    let mut tallies: Vec<(&str, TypeTally)> = Vec::new();

    for record in records {
        let position = match tallies.iter().position(|(t, _)| *t == record.task_type) {
            Some(position) => position,
            None => {
                tallies.push((record.task_type.as_str(), TypeTally::default()));
                tallies.len() - 1
            }
        };
        let tally = &mut tallies[position].1;
        tally.total += 1;
        if record.validation.executed {
            tally.executed += 1;
        }
    }

    tallies
}

/// Distinct issues, most frequent first; equal counts keep first-seen order.
pub fn issue_frequencies(records: &[ExecutionRecord]) -> Vec<(&str, usize)> {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for issue in records.iter().flat_map(|r| r.validation.issues.iter()) {
        let count = counts.entry(issue.as_str()).or_insert(0);
        if *count == 0 {
            order.push(issue.as_str());
        }
        *count += 1;
    }

    let mut frequencies: Vec<(&str, usize)> = order
        .into_iter()
        .map(|issue| (issue, counts.get(issue).copied().unwrap_or(0)))
        .collect();
    frequencies.sort_by(|a, b| b.1.cmp(&a.1));
    frequencies
}
