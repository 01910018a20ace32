// Copyright (c) 2025 - Cowboy AI, Inc.
//! Dependency Ordering
//!
//! Kahn's algorithm over the dependency edges implied by forward references.
//! Ties are broken by declaration order so the result is deterministic.

use std::collections::{BTreeSet, HashMap};

use super::{GraphError, NodeId, ResourceNode};

/// Topological order of `nodes`, producers before consumers
///
/// Returns [`GraphError::Cycle`] naming the nodes left unordered when the
/// reference graph is cyclic.
pub fn topological_order(nodes: &[ResourceNode]) -> Result<Vec<NodeId>, GraphError> {
    let position: HashMap<&NodeId, usize> =
        nodes.iter().enumerate().map(|(i, n)| (&n.id, i)).collect();

    let mut in_degree = vec![0usize; nodes.len()];
    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); nodes.len()];

    for (consumer, node) in nodes.iter().enumerate() {
        for producer in node.dependencies() {
            let producer = *position
                .get(producer)
                .ok_or_else(|| GraphError::DanglingReference {
                    node: node.id.clone(),
                    target: producer.clone(),
                })?;
            in_degree[consumer] += 1;
            dependents[producer].push(consumer);
        }
    }

    // BTreeSet keyed by declaration index gives the lowest-index ready node
    let mut ready: BTreeSet<usize> = in_degree
        .iter()
        .enumerate()
        .filter(|(_, d)| **d == 0)
        .map(|(i, _)| i)
        .collect();

    let mut order = Vec::with_capacity(nodes.len());
    while let Some(next) = ready.pop_first() {
        order.push(nodes[next].id.clone());
        for &consumer in &dependents[next] {
            in_degree[consumer] -= 1;
            if in_degree[consumer] == 0 {
                ready.insert(consumer);
            }
        }
    }

    if order.len() != nodes.len() {
        let stuck = in_degree
            .iter()
            .enumerate()
            .filter(|(_, d)| **d > 0)
            .map(|(i, _)| nodes[i].id.clone())
            .collect();
        return Err(GraphError::Cycle(stuck));
    }

    Ok(order)
}

/// Whether every node in `order` appears after all of its producers
pub fn is_topological(nodes: &[ResourceNode], order: &[NodeId]) -> bool {
    let position: HashMap<&NodeId, usize> = order.iter().enumerate().map(|(i, id)| (id, i)).collect();
    if position.len() != nodes.len() {
        return false;
    }

    nodes.iter().all(|node| {
        let Some(&own) = position.get(&node.id) else {
            return false;
        };
        node.dependencies()
            .into_iter()
            .all(|producer| matches!(position.get(producer), Some(&p) if p < own))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ResourceKind;
    use crate::graph::{AttributeRef, PropertyValue};

    fn id(s: &str) -> NodeId {
        NodeId::new(s).unwrap()
    }

    fn node(name: &str, deps: &[&str]) -> ResourceNode {
        deps.iter().enumerate().fold(
            ResourceNode::new(id(name), ResourceKind::Subnet),
            |n, (i, dep)| {
                n.with_property(
                    format!("dep{}", i),
                    PropertyValue::Reference(AttributeRef::new(id(dep), "Id")),
                )
            },
        )
    }

    #[test]
    fn test_declaration_order_wins_ties() {
        let nodes = vec![node("a", &[]), node("b", &[]), node("c", &["a"]), node("d", &["b", "c"])];
        let order = topological_order(&nodes).unwrap();
        let names: Vec<&str> = order.iter().map(NodeId::as_str).collect();
        assert_eq!(names, vec!["a", "b", "c", "d"]);
        assert!(is_topological(&nodes, &order));
    }

    #[test]
    fn test_out_of_order_declaration_is_reordered() {
        let nodes = vec![node("consumer", &["producer"]), node("producer", &[])];
        let order = topological_order(&nodes).unwrap();
        assert_eq!(order, vec![id("producer"), id("consumer")]);

        let declared: Vec<NodeId> = nodes.iter().map(|n| n.id.clone()).collect();
        assert!(!is_topological(&nodes, &declared));
    }

    #[test]
    fn test_cycle_detected() {
        let nodes = vec![node("a", &["b"]), node("b", &["a"]), node("c", &[])];
        match topological_order(&nodes) {
            Err(GraphError::Cycle(stuck)) => assert_eq!(stuck, vec![id("a"), id("b")]),
            other => panic!("expected cycle, got {:?}", other),
        }
    }

    #[test]
    fn test_dangling_reference() {
        let nodes = vec![node("a", &["missing"])];
        assert!(matches!(
            topological_order(&nodes),
            Err(GraphError::DanglingReference { .. })
        ));
    }
}
