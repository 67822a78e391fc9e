use std::{fs, path::Path};

use serde::Deserialize;
use tracing::{debug, warn};

use super::Task;
use crate::error::Result;

#[derive(Debug, Deserialize)]
struct Snapshot {
    #[serde(default)]
    tasks: Vec<serde_json::Value>,
    #[serde(default)]
    meta: Option<serde_json::Value>,
}

pub fn load_snapshot(path: &Path) -> Result<Vec<Task>> {
    let contents = fs::read_to_string(path)?;
    parse_snapshot(&contents)
}

/// Parses a backlog snapshot, skipping entries that cannot be read as tasks.
pub fn parse_snapshot(contents: &str) -> Result<Vec<Task>> {
    let snapshot: Snapshot = serde_json::from_str(contents)?;

    if let Some(meta) = &snapshot.meta {
        debug!("Snapshot meta: {}", meta);
    }

    let tasks = snapshot
        .tasks
        .into_iter()
        .enumerate()
        .filter_map(|(index, entry)| match serde_json::from_value::<Task>(entry) {
            Ok(task) => Some(task),
            Err(e) => {
                warn!("Skipping task entry #{}: {}", index, e);
                None
            }
        })
        .collect();

    Ok(tasks)
}
