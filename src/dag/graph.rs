// src/dag/graph.rs

use std::collections::HashMap;

use petgraph::algo::toposort;
use petgraph::graphmap::DiGraphMap;

use crate::errors::{Result, SitemillError};

/// The kind of work a pipeline task performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TaskKind {
    Clean,
    Markup,
    Styles,
    Scripts,
    Statics,
}

/// One node of the task plan: a named unit of work plus ordering edges.
#[derive(Debug, Clone)]
pub struct TaskNode {
    pub name: String,
    pub kind: TaskKind,
    /// Tasks that must succeed before this one may start.
    pub after: Vec<String>,
    /// Whether connected browsers should be told about outputs this task
    /// rewrote.
    pub notify_clients: bool,
}

/// Internal node structure: stores immediate deps and dependents.
#[derive(Debug, Clone)]
struct DagNode {
    deps: Vec<String>,
    dependents: Vec<String>,
}

/// In-memory DAG representation keyed by task name.
///
/// Construction validates the plan: duplicate names, unknown or
/// self-referential `after` entries and cycles are all rejected, so the
/// scheduler can assume a well-formed graph.
#[derive(Debug, Clone)]
pub struct TaskGraph {
    nodes: HashMap<String, DagNode>,
    topo: Vec<String>,
}

impl TaskGraph {
    /// Build a DAG from a task plan.
    pub fn from_nodes(plan: &[TaskNode]) -> Result<Self> {
        let mut nodes: HashMap<String, DagNode> = HashMap::new();

        for node in plan {
            let prev = nodes.insert(
                node.name.clone(),
                DagNode {
                    deps: node.after.clone(),
                    dependents: Vec::new(),
                },
            );
            if prev.is_some() {
                return Err(SitemillError::ConfigError(format!(
                    "duplicate task name '{}' in plan",
                    node.name
                )));
            }
        }

        for node in plan {
            for dep in node.after.iter() {
                if dep == &node.name {
                    return Err(SitemillError::ConfigError(format!(
                        "task '{}' cannot depend on itself",
                        node.name
                    )));
                }
                match nodes.get_mut(dep) {
                    Some(dep_node) => dep_node.dependents.push(node.name.clone()),
                    None => {
                        return Err(SitemillError::ConfigError(format!(
                            "task '{}' depends on unknown task '{}'",
                            node.name, dep
                        )));
                    }
                }
            }
        }

        let topo = topological_order(plan)?;

        Ok(Self { nodes, topo })
    }

    /// Task names in dependency order (dependencies before dependents).
    pub fn topo_order(&self) -> &[String] {
        &self.topo
    }

    /// Immediate dependencies of a task (the tasks listed in its `after`).
    pub fn dependencies_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.deps.as_slice())
            .unwrap_or(&[])
    }

    /// Immediate dependents of a task (tasks that list this one in their `after`).
    pub fn dependents_of(&self, name: &str) -> &[String] {
        self.nodes
            .get(name)
            .map(|n| n.dependents.as_slice())
            .unwrap_or(&[])
    }
}

/// Topologically sort the plan, failing on cycles.
///
/// Edge direction: dep -> task, so the returned order lists dependencies
/// before the tasks that wait on them.
fn topological_order(plan: &[TaskNode]) -> Result<Vec<String>> {
    let mut graph: DiGraphMap<&str, ()> = DiGraphMap::new();

    for node in plan {
        graph.add_node(node.name.as_str());
    }
    for node in plan {
        for dep in node.after.iter() {
            graph.add_edge(dep.as_str(), node.name.as_str(), ());
        }
    }

    match toposort(&graph, None) {
        Ok(order) => Ok(order.into_iter().map(|n| n.to_string()).collect()),
        Err(cycle) => Err(SitemillError::PlanCycle(format!(
            "cycle involving task '{}'",
            cycle.node_id()
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &str, after: &[&str]) -> TaskNode {
        TaskNode {
            name: name.to_string(),
            kind: TaskKind::Markup,
            after: after.iter().map(|s| s.to_string()).collect(),
            notify_clients: false,
        }
    }

    #[test]
    fn topo_order_puts_dependencies_first() {
        let plan = vec![
            node("compile", &["reset"]),
            node("reset", &[]),
            node("copy", &["compile"]),
        ];
        let graph = TaskGraph::from_nodes(&plan).unwrap();
        let order = graph.topo_order();
        let pos = |n: &str| order.iter().position(|t| t == n).unwrap();
        assert!(pos("reset") < pos("compile"));
        assert!(pos("compile") < pos("copy"));
    }

    #[test]
    fn dependents_are_inverted_edges() {
        let plan = vec![node("reset", &[]), node("compile", &["reset"])];
        let graph = TaskGraph::from_nodes(&plan).unwrap();
        assert_eq!(graph.dependents_of("reset"), ["compile".to_string()]);
        assert_eq!(graph.dependencies_of("compile"), ["reset".to_string()]);
    }

    #[test]
    fn rejects_unknown_dependency() {
        let plan = vec![node("compile", &["nope"])];
        let err = TaskGraph::from_nodes(&plan).unwrap_err();
        assert!(err.to_string().contains("unknown task 'nope'"));
    }

    #[test]
    fn rejects_self_dependency() {
        let plan = vec![node("compile", &["compile"])];
        assert!(TaskGraph::from_nodes(&plan).is_err());
    }

    #[test]
    fn rejects_duplicate_names() {
        let plan = vec![node("compile", &[]), node("compile", &[])];
        assert!(TaskGraph::from_nodes(&plan).is_err());
    }

    #[test]
    fn rejects_cycles() {
        let plan = vec![node("a", &["b"]), node("b", &["a"])];
        let err = TaskGraph::from_nodes(&plan).unwrap_err();
        assert!(err.to_string().contains("cycle"));
    }
}
