pub mod analysis;
pub mod dependency;
pub mod snapshot;

pub use analysis::{DependencyReport, render_dependency_report};
pub use dependency::analyze;
pub use snapshot::load_snapshot;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::{
    collections::{BTreeSet, HashMap},
    fmt,
    str::FromStr,
};
use tracing::warn;

/// Identifier of a task in a backlog snapshot.
///
/// Snapshots mix integer ids, digit strings and UUIDs. Digit strings are
/// normalized to the integer form so that `"1"` and `1` name the same task;
/// everything else is an opaque string. Integer ids order before string ids.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskId {
    Num(i64),
    Key(String),
}

impl From<i64> for TaskId {
    fn from(id: i64) -> Self {
        TaskId::Num(id)
    }
}

impl From<&str> for TaskId {
    fn from(id: &str) -> Self {
        match id.parse::<i64>() {
            Ok(n) => TaskId::Num(n),
            Err(_) => TaskId::Key(id.to_string()),
        }
    }
}

impl From<String> for TaskId {
    fn from(id: String) -> Self {
        TaskId::from(id.as_str())
    }
}

impl FromStr for TaskId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(TaskId::from(s.trim()))
    }
}

impl TaskId {
    /// Reads an id out of an arbitrary JSON value, if it holds one.
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Number(n) => n.as_i64().map(TaskId::Num),
            serde_json::Value::String(s) if !s.is_empty() => Some(TaskId::from(s.as_str())),
            _ => None,
        }
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskId::Num(n) => write!(f, "{}", n),
            TaskId::Key(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for TaskId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            TaskId::Num(n) => serializer.serialize_i64(*n),
            TaskId::Key(s) => serializer.serialize_str(s),
        }
    }
}

impl<'de> Deserialize<'de> for TaskId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = serde_json::Value::deserialize(deserializer)?;
        TaskId::from_json(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid task id: {}", value)))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum TaskStatus {
    #[default]
    Pending,
    InProgress,
    Done,
    Failed,
    Other(String),
}

impl From<&str> for TaskStatus {
    fn from(status: &str) -> Self {
        match status.trim().to_ascii_lowercase().as_str() {
            "pending" => TaskStatus::Pending,
            "in_progress" | "in-progress" => TaskStatus::InProgress,
            "done" | "completed" => TaskStatus::Done,
            "failed" => TaskStatus::Failed,
            _ => TaskStatus::Other(status.to_string()),
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskStatus::Pending => write!(f, "pending"),
            TaskStatus::InProgress => write!(f, "in_progress"),
            TaskStatus::Done => write!(f, "done"),
            TaskStatus::Failed => write!(f, "failed"),
            TaskStatus::Other(s) => write!(f, "{}", s),
        }
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let status = String::deserialize(deserializer)?;
        Ok(TaskStatus::from(status.as_str()))
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct Task {
    pub id: TaskId,
    #[serde(default, deserialize_with = "lenient_title")]
    pub title: String,
    #[serde(default, deserialize_with = "lenient_ids")]
    pub dependencies: Vec<TaskId>,
    #[serde(default, deserialize_with = "lenient_status")]
    pub status: TaskStatus,
}

#[cfg(test)]
impl Task {
    pub fn new(id: impl Into<TaskId>, title: &str, dependencies: Vec<TaskId>) -> Self {
        Self {
            id: id.into(),
            title: title.to_string(),
            dependencies,
            status: TaskStatus::Pending,
        }
    }

    pub fn with_status(mut self, status: TaskStatus) -> Self {
        self.status = status;
        self
    }
}

/// Title and status fall back to their defaults when they are not strings, so
/// one bad field never drops the whole task.
fn lenient_string<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<String>, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(text) => Ok(Some(text)),
        _ => Ok(None),
    }
}

fn lenient_title<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(lenient_string(deserializer)?.unwrap_or_default())
}

fn lenient_status<'de, D: Deserializer<'de>>(deserializer: D) -> Result<TaskStatus, D::Error> {
    Ok(lenient_string(deserializer)?
        .map(|status| TaskStatus::from(status.as_str()))
        .unwrap_or_default())
}

/// Dependency lists are kept even when some entries are garbage: entries that
/// are not ids are dropped, and `null` means no dependencies.
fn lenient_ids<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<TaskId>, D::Error> {
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    let ids = match value {
        Some(serde_json::Value::Array(items)) => {
            items.iter().filter_map(TaskId::from_json).collect()
        }
        Some(single) => TaskId::from_json(&single).into_iter().collect(),
        None => Vec::new(),
    };
    Ok(ids)
}

pub type FailedSet = BTreeSet<TaskId>;

/// Read-only view of one snapshot, keyed by normalized id.
#[derive(Debug, Default)]
pub struct TaskGraph {
    order: Vec<TaskId>,
    tasks: HashMap<TaskId, Task>,
}

impl TaskGraph {
    pub fn new(tasks: &[Task]) -> Self {
        let mut graph = TaskGraph::default();

        for task in tasks {
            if graph.tasks.contains_key(&task.id) {
                warn!("Duplicate task id '{}' in snapshot, keeping the first", task.id);
                continue;
            }
            graph.order.push(task.id.clone());
            graph.tasks.insert(task.id.clone(), task.clone());
        }

        graph
    }

    pub fn get(&self, id: &TaskId) -> Option<&Task> {
        self.tasks.get(id)
    }

    pub fn contains(&self, id: &TaskId) -> bool {
        self.tasks.contains_key(id)
    }

    pub fn dependencies(&self, id: &TaskId) -> &[TaskId] {
        self.tasks
            .get(id)
            .map(|task| task.dependencies.as_slice())
            .unwrap_or(&[])
    }

    /// Tasks in snapshot order.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.order.iter().filter_map(|id| self.tasks.get(id))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn failed_ids(&self) -> FailedSet {
        self.iter()
            .filter(|task| task.status == TaskStatus::Failed)
            .map(|task| task.id.clone())
            .collect()
    }
}
