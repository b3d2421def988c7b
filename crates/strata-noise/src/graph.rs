//! Flat-arena noise graph with acyclicity checked at construction.

use crate::node::{NodeId, NoiseNode};

/// Why a set of nodes does not form a valid graph.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum GraphError {
    #[error("node {node:?} reads from missing node {input:?}")]
    Dangling { node: NodeId, input: NodeId },
    #[error("graph contains a cycle through {0:?}")]
    Cycle(Vec<NodeId>),
    #[error("output node {0:?} does not exist")]
    MissingOutput(NodeId),
}

/// An acyclic operator graph with a designated output node.
#[derive(Clone, Debug, PartialEq)]
pub struct NoiseGraph {
    nodes: Vec<NoiseNode>,
    output: NodeId,
    /// Node ids with every node after all of its inputs.
    order: Vec<NodeId>,
}

impl NoiseGraph {
    /// Build a graph, rejecting dangling references and cycles.
    pub fn new(nodes: Vec<NoiseNode>, output: NodeId) -> Result<Self, GraphError> {
        if output.index() >= nodes.len() {
            return Err(GraphError::MissingOutput(output));
        }
        for (index, node) in nodes.iter().enumerate() {
            if let Some(input) = node.inputs().into_iter().find(|i| i.index() >= nodes.len()) {
                return Err(GraphError::Dangling {
                    node: NodeId(index as u32),
                    input,
                });
            }
        }
        let order = topological_order(&nodes)?;
        Ok(Self {
            nodes,
            output,
            order,
        })
    }

    pub fn output(&self) -> NodeId {
        self.output
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: NodeId) -> Option<&NoiseNode> {
        self.nodes.get(id.index())
    }

    pub fn nodes(&self) -> &[NoiseNode] {
        &self.nodes
    }

    /// Nodes in dependency order (inputs before consumers).
    pub fn topological_order(&self) -> &[NodeId] {
        &self.order
    }
}

/// Kahn's algorithm over input edges. On failure the returned cycle holds
/// only nodes that sit on a cycle, not the nodes downstream of one.
fn topological_order(nodes: &[NoiseNode]) -> Result<Vec<NodeId>, GraphError> {
    let n = nodes.len();
    let mut pending_inputs = vec![0_usize; n];
    let mut consumers: Vec<Vec<usize>> = vec![Vec::new(); n];
    for (index, node) in nodes.iter().enumerate() {
        for input in node.inputs() {
            pending_inputs[index] += 1;
            consumers[input.index()].push(index);
        }
    }

    let mut ready: Vec<usize> = (0..n).filter(|&i| pending_inputs[i] == 0).collect();
    let mut order = Vec::with_capacity(n);
    while let Some(index) = ready.pop() {
        order.push(NodeId(index as u32));
        for &consumer in &consumers[index] {
            pending_inputs[consumer] -= 1;
            if pending_inputs[consumer] == 0 {
                ready.push(consumer);
            }
        }
    }

    if order.len() == n {
        return Ok(order);
    }

    // Strip nodes that merely consume a cycle: repeatedly drop remaining
    // nodes none of the remaining nodes read from.
    let mut remaining: Vec<bool> = pending_inputs.iter().map(|&p| p > 0).collect();
    loop {
        let mut changed = false;
        for index in 0..n {
            if remaining[index] && !consumers[index].iter().any(|&c| remaining[c]) {
                remaining[index] = false;
                changed = true;
            }
        }
        if !changed {
            break;
        }
    }

    let cycle = (0..n)
        .filter(|&i| remaining[i])
        .map(|i| NodeId(i as u32))
        .collect();
    Err(GraphError::Cycle(cycle))
}
