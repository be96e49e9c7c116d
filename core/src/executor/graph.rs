use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use crate::error::ExecutorError;
use crate::executor::types::Unit;

/// Unit dependency graph (DAG)
///
/// Units live in a flat arena indexed by discovery order; edges are index
/// lists. The graph is read-only once built and is shared by reference with
/// every in-flight unit of a run.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    /// Units in caller-supplied discovery order.
    units: Vec<Unit>,

    /// unit_id -> arena index
    index: HashMap<String, usize>,

    /// Dependency edges: unit -> units it waits on
    edges: Vec<Vec<usize>>,

    /// Reverse edges: unit -> units that wait on it
    dependents: Vec<Vec<usize>>,

    /// Execution levels (topological batches)
    levels: Vec<Vec<usize>>,
}

impl DependencyGraph {
    /// Build and validate the graph, computing execution levels.
    pub fn from_units(units: Vec<Unit>) -> Result<Self, ExecutorError> {
        let mut index = HashMap::with_capacity(units.len());
        for (i, unit) in units.iter().enumerate() {
            if index.insert(unit.id().to_string(), i).is_some() {
                return Err(ExecutorError::DuplicateUnitId(unit.id().to_string()));
            }
        }

        let mut edges = Vec::with_capacity(units.len());
        let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); units.len()];

        for (i, unit) in units.iter().enumerate() {
            let mut deps = Vec::with_capacity(unit.dependency_ids().len());
            for dep in unit.dependency_ids() {
                let Some(&d) = index.get(dep) else {
                    return Err(ExecutorError::UnresolvedDependency {
                        unit_id: unit.id().to_string(),
                        missing_dep: dep.clone(),
                    });
                };
                deps.push(d);
                dependents[d].push(i);
            }
            edges.push(deps);
        }

        let levels = match compute_levels(&edges, &dependents) {
            Ok(levels) => levels,
            Err(remaining) => return Err(cycle_error(&units, &edges, &remaining)),
        };

        Ok(Self {
            units,
            index,
            edges,
            dependents,
            levels,
        })
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn units(&self) -> &[Unit] {
        &self.units
    }

    pub fn unit(&self, idx: usize) -> &Unit {
        &self.units[idx]
    }

    pub fn index_of(&self, unit_id: &str) -> Option<usize> {
        self.index.get(unit_id).copied()
    }

    pub fn dependencies(&self, idx: usize) -> &[usize] {
        &self.edges[idx]
    }

    pub fn dependents(&self, idx: usize) -> &[usize] {
        &self.dependents[idx]
    }

    /// Levels as arena indices.
    pub fn levels(&self) -> &[Vec<usize>] {
        &self.levels
    }

    /// Levels as unit ids.
    pub fn level_ids(&self) -> Vec<Vec<String>> {
        self.levels
            .iter()
            .map(|level| level.iter().map(|&i| self.units[i].id().to_string()).collect())
            .collect()
    }

    /// Every unit that (transitively) depends on `idx`, in discovery order.
    pub fn transitive_dependents(&self, idx: usize) -> Vec<usize> {
        let mut seen = vec![false; self.units.len()];
        let mut queue: VecDeque<usize> = self.dependents[idx].iter().copied().collect();
        while let Some(next) = queue.pop_front() {
            if seen[next] {
                continue;
            }
            seen[next] = true;
            queue.extend(self.dependents[next].iter().copied());
        }

        seen.iter()
            .enumerate()
            .filter_map(|(i, &hit)| hit.then_some(i))
            .collect()
    }

    /// Serializable view of nodes, edges and levels.
    pub fn snapshot(&self) -> GraphSnapshot {
        let edges = self
            .edges
            .iter()
            .enumerate()
            .flat_map(|(i, deps)| {
                deps.iter().map(move |&d| GraphEdge {
                    unit: self.units[i].id().to_string(),
                    depends_on: self.units[d].id().to_string(),
                })
            })
            .collect();

        GraphSnapshot {
            nodes: self.units.iter().map(|u| u.id().to_string()).collect(),
            edges,
            levels: self.level_ids(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphEdge {
    pub unit: String,
    pub depends_on: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GraphSnapshot {
    pub nodes: Vec<String>,
    pub edges: Vec<GraphEdge>,
    pub levels: Vec<Vec<String>>,
}

/// Level the graph with Kahn's algorithm.
///
/// Each pass takes every unit whose remaining in-degree is zero, then
/// decrements the in-degree of its dependents. Units inside a level keep
/// discovery order. On failure returns the indices that never reached zero.
///
/// O(V + E) plus the per-level sort.
fn compute_levels(
    edges: &[Vec<usize>],
    dependents: &[Vec<usize>],
) -> Result<Vec<Vec<usize>>, Vec<usize>> {
    let mut in_degree: Vec<usize> = edges.iter().map(Vec::len).collect();
    let mut current: Vec<usize> = (0..edges.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut levels = Vec::new();
    let mut placed = 0;

    while !current.is_empty() {
        placed += current.len();

        let mut next = Vec::new();
        for &i in &current {
            for &dependent in &dependents[i] {
                in_degree[dependent] -= 1;
                if in_degree[dependent] == 0 {
                    next.push(dependent);
                }
            }
        }
        next.sort_unstable();

        levels.push(std::mem::replace(&mut current, next));
    }

    if placed != edges.len() {
        return Err((0..edges.len()).filter(|&i| in_degree[i] > 0).collect());
    }

    Ok(levels)
}

fn cycle_error(units: &[Unit], edges: &[Vec<usize>], remaining: &[usize]) -> ExecutorError {
    let mut unresolved = vec![false; units.len()];
    for &i in remaining {
        unresolved[i] = true;
    }

    // Every unresolved unit waits on another unresolved unit, so walking
    // unresolved dependencies must revisit a node.
    let mut path = vec![remaining[0]];
    let mut current = remaining[0];
    let cycle = loop {
        let Some(&next) = edges[current].iter().find(|&&d| unresolved[d]) else {
            break path;
        };
        if let Some(pos) = path.iter().position(|&p| p == next) {
            let mut cycle = path.split_off(pos);
            cycle.push(next);
            break cycle;
        }
        path.push(next);
        current = next;
    };

    ExecutorError::CyclicDependency {
        units: remaining.iter().map(|&i| units[i].id().to_string()).collect(),
        cycle: format_cycle_path(units, &cycle),
    }
}

fn format_cycle_path(units: &[Unit], path: &[usize]) -> String {
    path.iter()
        .map(|&i| units[i].id())
        .collect::<Vec<_>>()
        .join(" -> ")
}
