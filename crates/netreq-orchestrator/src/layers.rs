//! Validation and topological layering of a plan's node list.

use crate::error::OrchestratorError;
use crate::node::OrchestrationNode;
use hashbrown::{HashMap, HashSet};
use std::fmt;
use std::hash::Hash;

/// Validates `nodes` and groups them into execution layers: each layer is a
/// sorted list of ids whose dependencies were all satisfied by a prior
/// layer. Layer 0 holds every node with no dependencies.
pub(crate) fn compute_layers<Id>(nodes: &[OrchestrationNode<Id>]) -> Result<Vec<Vec<Id>>, OrchestratorError<Id>>
where
    Id: Clone + Eq + Hash + Ord + fmt::Debug,
{
    let mut seen: HashSet<Id> = HashSet::with_capacity(nodes.len());
    for node in nodes {
        if !seen.insert(node.id.clone()) {
            return Err(OrchestratorError::DuplicateId(node.id.clone()));
        }
    }

    for node in nodes {
        for dep in &node.deps {
            if !seen.contains(dep) {
                return Err(OrchestratorError::UndefinedDependency(dep.clone()));
            }
        }
    }

    let mut remaining: HashMap<Id, &[Id]> = nodes.iter().map(|n| (n.id.clone(), n.deps.as_slice())).collect();
    let mut completed: HashSet<Id> = HashSet::with_capacity(nodes.len());
    let mut layers = Vec::new();

    while !remaining.is_empty() {
        let mut layer: Vec<Id> = remaining
            .iter()
            .filter(|(_, deps)| deps.iter().all(|d| completed.contains(d)))
            .map(|(id, _)| id.clone())
            .collect();

        if layer.is_empty() {
            return Err(OrchestratorError::CyclicDependency);
        }

        layer.sort();
        for id in &layer {
            remaining.remove(id);
            completed.insert(id.clone());
        }
        layers.push(layer);
    }

    Ok(layers)
}
