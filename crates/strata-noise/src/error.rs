use crate::node::NodeId;

/// A malformed graph reached evaluation, or a request fell outside the
/// generable world.
///
/// Validated presets never produce the graph variants. One aborts the
/// generation request that hit it and nothing it computed is cached.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum InvariantError {
    #[error("node {0:?} does not exist in the graph")]
    MissingNode(NodeId),

    #[error("node {0:?} was re-entered while it was being evaluated")]
    Reentrant(NodeId),

    #[error("node {node:?} produced non-finite value {value} at {position:?}")]
    NonFinite {
        node: NodeId,
        value: f64,
        position: [f64; 3],
    },

    #[error("combinator {0:?} has no inputs")]
    EmptyCombinator(NodeId),

    #[error("noise node {0:?} has no prepared source")]
    MissingSource(NodeId),

    #[error("chunk {chunk:?} lies outside the generable range of +-{limit} chunks")]
    ChunkOutOfRange { chunk: [i32; 3], limit: i32 },
}
