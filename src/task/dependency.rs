use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use super::{FailedSet, Task, TaskGraph, TaskId};

/// A task that cannot proceed, with the dependency ids walked from it down to
/// the failed task that stops it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockingRecord {
    pub task: TaskId,
    pub chain: Vec<TaskId>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BlockingImpact {
    pub blocks_count: usize,
    pub blocks: Vec<TaskId>,
}

/// Directed cycle, starting at its smallest id, without repeating it at the end.
pub type Cycle = Vec<TaskId>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyAnalysis {
    pub blocked: Vec<BlockingRecord>,
    pub cycles: Vec<Cycle>,
    pub blocking_impact: BTreeMap<TaskId, BlockingImpact>,
}

pub fn analyze(tasks: &[Task], failed_ids: &FailedSet) -> DependencyAnalysis {
    let graph = TaskGraph::new(tasks);
    analyze_graph(&graph, failed_ids)
}

pub fn analyze_graph(graph: &TaskGraph, failed_ids: &FailedSet) -> DependencyAnalysis {
    let blocked = find_blocked_tasks(graph, failed_ids);
    let cycles = find_cycles(graph);
    let blocking_impact = blocking_impact(&blocked, failed_ids);

    debug!(
        "Analyzed {} tasks: {} blocked, {} cycles",
        graph.len(),
        blocked.len(),
        cycles.len()
    );

    DependencyAnalysis {
        blocked,
        cycles,
        blocking_impact,
    }
}

pub fn find_blocked_tasks(graph: &TaskGraph, failed_ids: &FailedSet) -> Vec<BlockingRecord> {
    let mut resolver = BlockingResolver::new(graph, failed_ids);

    graph
        .iter()
        .filter(|task| !failed_ids.contains(&task.id))
        .filter_map(|task| {
            resolver.resolve(&task.id).map(|chain| BlockingRecord {
                task: task.id.clone(),
                chain,
            })
        })
        .collect()
}

struct Frame<'a> {
    id: &'a TaskId,
    deps: &'a [TaskId],
    next: usize,
    // Set when some dependency was skipped because it is already on the
    // current branch; such results depend on the root and are not reused.
    touched_branch: bool,
}

impl<'a> Frame<'a> {
    fn new(id: &'a TaskId, deps: &'a [TaskId]) -> Self {
        Self {
            id,
            deps,
            next: 0,
            touched_branch: false,
        }
    }
}

enum Step<'a> {
    Descend(&'a TaskId),
    Finish(Option<Vec<TaskId>>),
}

struct BlockingResolver<'a> {
    graph: &'a TaskGraph,
    failed: &'a FailedSet,
    settled: HashMap<&'a TaskId, Option<Vec<TaskId>>>,
}

impl<'a> BlockingResolver<'a> {
    fn new(graph: &'a TaskGraph, failed: &'a FailedSet) -> Self {
        Self {
            graph,
            failed,
            settled: HashMap::new(),
        }
    }

    /// Depth-first search over declared dependencies, in order. The first
    /// dependency that is failed, or leads to a failed task, decides the chain.
    /// A dependency already on the current branch counts as not blocked.
    fn resolve(&mut self, root: &'a TaskId) -> Option<Vec<TaskId>> {
        if let Some(settled) = self.settled.get(root) {
            return settled.clone();
        }
        if !self.graph.contains(root) {
            return None;
        }

        let mut stack = vec![Frame::new(root, self.graph.dependencies(root))];
        let mut branch: HashSet<&'a TaskId> = HashSet::from([root]);
        let mut returned: Option<(Option<Vec<TaskId>>, bool)> = None;

        loop {
            let frame = stack.last_mut()?;
            let mut result = None;
            let mut finished = false;

            if let Some((child, touched)) = returned.take() {
                frame.touched_branch |= touched;
                if let Some(chain) = child {
                    result = Some(prepend(&frame.deps[frame.next - 1], &chain));
                    finished = true;
                }
            }

            if !finished {
                match self.advance(frame, &branch) {
                    Step::Descend(dep) => {
                        branch.insert(dep);
                        stack.push(Frame::new(dep, self.graph.dependencies(dep)));
                        continue;
                    }
                    Step::Finish(outcome) => result = outcome,
                }
            }

            let frame = stack.pop()?;
            branch.remove(frame.id);
            if !frame.touched_branch {
                self.settled.insert(frame.id, result.clone());
            }

            if stack.is_empty() {
                return result;
            }
            returned = Some((result, frame.touched_branch));
        }
    }

    fn advance(&self, frame: &mut Frame<'a>, branch: &HashSet<&'a TaskId>) -> Step<'a> {
        let deps = frame.deps;

        while let Some(dep) = deps.get(frame.next) {
            frame.next += 1;

            if self.failed.contains(dep) {
                return Step::Finish(Some(vec![dep.clone()]));
            }
            if branch.contains(dep) {
                frame.touched_branch = true;
                continue;
            }
            match self.settled.get(dep) {
                Some(Some(chain)) => return Step::Finish(Some(prepend(dep, chain))),
                Some(None) => continue,
                None => {}
            }
            if self.graph.contains(dep) {
                return Step::Descend(dep);
            }
        }

        Step::Finish(None)
    }
}

fn prepend(head: &TaskId, tail: &[TaskId]) -> Vec<TaskId> {
    let mut chain = Vec::with_capacity(tail.len() + 1);
    chain.push(head.clone());
    chain.extend_from_slice(tail);
    chain
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Gray,
    Black,
}

/// Every edge into a node still on the DFS stack closes a cycle. Roots are
/// taken in snapshot order; duplicates found from different entry points are
/// reported once.
pub fn find_cycles(graph: &TaskGraph) -> Vec<Cycle> {
    let mut colors: HashMap<&TaskId, Color> = HashMap::new();
    let mut seen: HashSet<Cycle> = HashSet::new();
    let mut cycles = Vec::new();

    for task in graph.iter() {
        if colors.contains_key(&task.id) {
            continue;
        }

        colors.insert(&task.id, Color::Gray);
        let mut stack: Vec<(&TaskId, usize)> = vec![(&task.id, 0)];

        while let Some((id, next)) = stack.last_mut() {
            let id: &TaskId = *id;
            let Some(dep) = graph.dependencies(id).get(*next) else {
                colors.insert(id, Color::Black);
                stack.pop();
                continue;
            };
            *next += 1;

            match colors.get(dep) {
                Some(Color::Gray) => {
                    let start = stack
                        .iter()
                        .position(|(node, _)| *node == dep)
                        .unwrap_or(0);
                    let cycle = canonical_cycle(
                        stack[start..].iter().map(|(node, _)| (*node).clone()).collect(),
                    );
                    if seen.insert(cycle.clone()) {
                        cycles.push(cycle);
                    }
                }
                Some(Color::Black) => {}
                None => {
                    if graph.contains(dep) {
                        colors.insert(dep, Color::Gray);
                        stack.push((dep, 0));
                    }
                }
            }
        }
    }

    cycles
}

fn canonical_cycle(mut cycle: Cycle) -> Cycle {
    let start = cycle
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(index, _)| index)
        .unwrap_or(0);
    cycle.rotate_left(start);
    cycle
}

fn blocking_impact(
    blocked: &[BlockingRecord],
    failed_ids: &FailedSet,
) -> BTreeMap<TaskId, BlockingImpact> {
    failed_ids
        .iter()
        .map(|failed_id| {
            let blocks: Vec<TaskId> = blocked
                .iter()
                .filter(|record| record.chain.contains(failed_id))
                .map(|record| record.task.clone())
                .collect();
            (
                failed_id.clone(),
                BlockingImpact {
                    blocks_count: blocks.len(),
                    blocks,
                },
            )
        })
        .collect()
}
