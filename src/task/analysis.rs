use serde::Serialize;

use super::{
    FailedSet, TaskGraph, TaskId, TaskStatus,
    dependency::DependencyAnalysis,
};
use crate::util::truncate_title;

const TITLE_WIDTH: usize = 50;

#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub id: TaskId,
    pub title: String,
    pub status: TaskStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedTaskImpact {
    pub task: TaskId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<TaskStatus>,
    pub blocks_count: usize,
    pub blocks: Vec<TaskSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct BlockedTaskDetail {
    pub task: TaskId,
    pub title: String,
    pub status: TaskStatus,
    pub dependencies: Vec<TaskId>,
    pub chain: Vec<TaskId>,
}

/// Everything the text report prints, in a shape that also serves as the
/// JSON artifact.
#[derive(Debug, Clone, Serialize)]
pub struct DependencyReport {
    pub total_tasks: usize,
    pub failed_tasks: Vec<TaskId>,
    pub blocking_impact: Vec<FailedTaskImpact>,
    pub circular_dependencies: Vec<Vec<TaskId>>,
    pub blocked_tasks: Vec<BlockedTaskDetail>,
}

impl DependencyReport {
    pub fn new(graph: &TaskGraph, analysis: &DependencyAnalysis, failed_ids: &FailedSet) -> Self {
        let blocking_impact = analysis
            .blocking_impact
            .iter()
            .map(|(failed_id, impact)| {
                let failed_task = graph.get(failed_id);
                FailedTaskImpact {
                    task: failed_id.clone(),
                    title: failed_task.map(|t| t.title.clone()),
                    status: failed_task.map(|t| t.status.clone()),
                    blocks_count: impact.blocks_count,
                    blocks: impact
                        .blocks
                        .iter()
                        .filter_map(|id| graph.get(id))
                        .map(|task| TaskSummary {
                            id: task.id.clone(),
                            title: truncate_title(&task.title, TITLE_WIDTH),
                            status: task.status.clone(),
                        })
                        .collect(),
                }
            })
            .collect();

        let blocked_tasks = analysis
            .blocked
            .iter()
            .filter_map(|record| {
                graph.get(&record.task).map(|task| BlockedTaskDetail {
                    task: record.task.clone(),
                    title: truncate_title(&task.title, TITLE_WIDTH),
                    status: task.status.clone(),
                    dependencies: task.dependencies.clone(),
                    chain: record.chain.clone(),
                })
            })
            .collect();

        Self {
            total_tasks: graph.len(),
            failed_tasks: failed_ids.iter().cloned().collect(),
            blocking_impact,
            circular_dependencies: analysis.cycles.clone(),
            blocked_tasks,
        }
    }
}

pub fn format_cycle(cycle: &[TaskId]) -> String {
    let mut parts: Vec<String> = cycle.iter().map(ToString::to_string).collect();
    if let Some(first) = cycle.first() {
        parts.push(first.to_string());
    }
    parts.join(" -> ")
}

fn join_ids(ids: &[TaskId]) -> String {
    ids.iter().map(ToString::to_string).collect::<Vec<_>>().join(", ")
}

pub fn render_dependency_report(report: &DependencyReport) -> String {
    let mut lines = vec![format!("Dependency analysis ({} tasks)", report.total_tasks)];

    lines.push(String::new());
    if report.failed_tasks.is_empty() {
        lines.push("Failed tasks: none".to_string());
    } else {
        lines.push(format!("Failed tasks ({}):", report.failed_tasks.len()));
        for impact in &report.blocking_impact {
            lines.push(format!("  - {}", describe_failed(impact)));
        }
    }

    if !report.blocking_impact.is_empty() {
        lines.push(String::new());
        lines.push("Blocking impact:".to_string());
        for impact in &report.blocking_impact {
            lines.push(format!("  {}", describe_failed(impact)));
            lines.push(format!("    blocks {} task(s)", impact.blocks_count));
            for blocked in &impact.blocks {
                lines.push(format!(
                    "      - {}: {} [{}]",
                    blocked.id, blocked.title, blocked.status
                ));
            }
        }
    }

    lines.push(String::new());
    if report.circular_dependencies.is_empty() {
        lines.push("Circular dependencies: none".to_string());
    } else {
        lines.push(format!(
            "Circular dependencies ({}):",
            report.circular_dependencies.len()
        ));
        for cycle in &report.circular_dependencies {
            lines.push(format!("  {}", format_cycle(cycle)));
        }
    }

    lines.push(String::new());
    if report.blocked_tasks.is_empty() {
        lines.push("Blocked tasks: none".to_string());
    } else {
        lines.push(format!("Blocked tasks ({}):", report.blocked_tasks.len()));
        for detail in &report.blocked_tasks {
            let mut chain = vec![detail.task.to_string()];
            chain.extend(detail.chain.iter().map(ToString::to_string));

            lines.push(format!("  {}: {}", detail.task, detail.title));
            lines.push(format!("    status: {}", detail.status));
            lines.push(format!("    depends on: {}", join_ids(&detail.dependencies)));
            lines.push(format!("    chain: {}", chain.join(" -> ")));
        }
    }

    lines.join("\n")
}

fn describe_failed(impact: &FailedTaskImpact) -> String {
    match (&impact.title, &impact.status) {
        (Some(title), Some(status)) => format!("{}: {} [{}]", impact.task, title, status),
        _ => format!("{}: (not in snapshot)", impact.task),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::task::{Task, dependency::analyze_graph};

    fn sample_graph() -> TaskGraph {
        TaskGraph::new(&[
            Task::new(1, "Provision database", vec![]).with_status(TaskStatus::Failed),
            Task::new(
                2,
                "Write the migration layer for every legacy table in the billing schema",
                vec![TaskId::from(1)],
            ),
            Task::new(3, "Ship billing", vec![TaskId::from(2)]),
            Task::new("a", "Loop start", vec![TaskId::from("b")]),
            Task::new("b", "Loop end", vec![TaskId::from("a")]),
        ])
    }

    #[test]
    fn test_format_cycle_closes_loop() {
        let cycle = vec![TaskId::from("a"), TaskId::from("b"), TaskId::from("c")];
        assert_eq!(format_cycle(&cycle), "a -> b -> c -> a");
        assert_eq!(format_cycle(&[]), "");
    }

    #[test]
    fn test_report_sections() {
        let graph = sample_graph();
        let failed = graph.failed_ids();
        let analysis = analyze_graph(&graph, &failed);
        let report = DependencyReport::new(&graph, &analysis, &failed);

        assert_eq!(report.total_tasks, 5);
        assert_eq!(report.failed_tasks, vec![TaskId::Num(1)]);
        assert_eq!(report.blocking_impact[0].blocks_count, 2);
        assert_eq!(
            report.blocking_impact[0].blocks[0].title,
            "Write the migration layer for every legacy table i..."
        );

        let text = render_dependency_report(&report);
        assert!(text.contains("Failed tasks (1):"));
        assert!(text.contains("  - 1: Provision database [failed]"));
        assert!(text.contains("    blocks 2 task(s)"));
        assert!(text.contains("Circular dependencies (1):\n  a -> b -> a"));
        assert!(text.contains("    chain: 3 -> 2 -> 1"));
        assert!(text.contains("    depends on: 2"));
    }

    #[test]
    fn test_report_json_mirrors_text() {
        let graph = sample_graph();
        let failed = FailedSet::from([TaskId::Num(1), TaskId::from("gone")]);
        let analysis = analyze_graph(&graph, &failed);
        let report = DependencyReport::new(&graph, &analysis, &failed);

        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["failed_tasks"], serde_json::json!([1, "gone"]));
        assert_eq!(json["circular_dependencies"], serde_json::json!([["a", "b"]]));
        assert_eq!(json["blocked_tasks"][1]["chain"], serde_json::json!([2, 1]));
        assert!(json["blocking_impact"][1].get("title").is_none());

        let text = render_dependency_report(&report);
        assert!(text.contains("gone: (not in snapshot)"));
    }

    #[test]
    fn test_empty_report() {
        let graph = TaskGraph::new(&[]);
        let failed = FailedSet::new();
        let analysis = analyze_graph(&graph, &failed);
        let text = render_dependency_report(&DependencyReport::new(&graph, &analysis, &failed));

        assert!(text.contains("Failed tasks: none"));
        assert!(text.contains("Circular dependencies: none"));
        assert!(text.contains("Blocked tasks: none"));
    }
}
