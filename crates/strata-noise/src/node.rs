//! Noise graph operators.
//!
//! Nodes live in a flat arena owned by [`NoiseGraph`](crate::NoiseGraph) and
//! refer to their inputs by [`NodeId`]. Every operator is a pure function of
//! the world seed and the sample position.

use crate::curve::Curve;
use crate::lattice::NoiseParams;

/// Index of a node inside a graph arena.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u32);

impl NodeId {
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// World axis read by a [`NoiseNode::Coordinate`] source.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    X,
    Y,
    Z,
}

/// One operator in a noise graph.
#[derive(Clone, Debug, PartialEq)]
pub enum NoiseNode {
    // -- sources --
    /// Multi-octave lattice or simplex noise.
    Noise(NoiseParams),
    Constant(f64),
    /// The raw world coordinate along one axis.
    Coordinate(Axis),

    // -- unary --
    ScaleBias {
        input: NodeId,
        scale: f64,
        bias: f64,
    },
    Clamp {
        input: NodeId,
        min: f64,
        max: f64,
    },
    Abs {
        input: NodeId,
    },
    Negate {
        input: NodeId,
    },
    Curve {
        input: NodeId,
        curve: Curve,
    },

    // -- n-ary --
    Sum(Vec<NodeId>),
    Product(Vec<NodeId>),
    Min(Vec<NodeId>),
    Max(Vec<NodeId>),
    /// `a + (b - a) * clamp(weight, 0, 1)`.
    Blend {
        a: NodeId,
        b: NodeId,
        weight: NodeId,
    },

    /// Picks `low` below `threshold` and `high` above it, cross-fading over
    /// `threshold ± falloff`. Only the branches that contribute are evaluated.
    Select {
        selector: NodeId,
        low: NodeId,
        high: NodeId,
        threshold: f64,
        falloff: f64,
    },

    /// Evaluates `input` at `y = 0`, so the value is shared by a whole column.
    Column {
        input: NodeId,
    },
}

impl NoiseNode {
    /// Short operator name used in logs and error messages.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Noise(_) => "noise",
            Self::Constant(_) => "constant",
            Self::Coordinate(_) => "coordinate",
            Self::ScaleBias { .. } => "scale_bias",
            Self::Clamp { .. } => "clamp",
            Self::Abs { .. } => "abs",
            Self::Negate { .. } => "negate",
            Self::Curve { .. } => "curve",
            Self::Sum(_) => "sum",
            Self::Product(_) => "product",
            Self::Min(_) => "min",
            Self::Max(_) => "max",
            Self::Blend { .. } => "blend",
            Self::Select { .. } => "select",
            Self::Column { .. } => "column",
        }
    }

    /// The nodes this operator reads from, in port order.
    pub fn inputs(&self) -> Vec<NodeId> {
        match self {
            Self::Noise(_) | Self::Constant(_) | Self::Coordinate(_) => Vec::new(),
            Self::ScaleBias { input, .. }
            | Self::Clamp { input, .. }
            | Self::Abs { input }
            | Self::Negate { input }
            | Self::Curve { input, .. }
            | Self::Column { input } => vec![*input],
            Self::Sum(inputs) | Self::Product(inputs) | Self::Min(inputs) | Self::Max(inputs) => {
                inputs.clone()
            }
            Self::Blend { a, b, weight } => vec![*a, *b, *weight],
            Self::Select {
                selector, low, high, ..
            } => vec![*selector, *low, *high],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_inputs_in_port_order() {
        let select = NoiseNode::Select {
            selector: NodeId(4),
            low: NodeId(1),
            high: NodeId(2),
            threshold: 0.0,
            falloff: 0.1,
        };
        assert_eq!(select.inputs(), vec![NodeId(4), NodeId(1), NodeId(2)]);

        let sum = NoiseNode::Sum(vec![NodeId(3), NodeId(0)]);
        assert_eq!(sum.inputs(), vec![NodeId(3), NodeId(0)]);
        assert!(NoiseNode::Constant(1.0).inputs().is_empty());
    }

    #[test]
    fn test_kind_names_unique() {
        let nodes = [
            NoiseNode::Noise(NoiseParams::default()),
            NoiseNode::Constant(0.0),
            NoiseNode::Coordinate(Axis::Y),
            NoiseNode::Abs { input: NodeId(0) },
            NoiseNode::Negate { input: NodeId(0) },
            NoiseNode::Column { input: NodeId(0) },
            NoiseNode::Sum(Vec::new()),
            NoiseNode::Product(Vec::new()),
        ];
        let mut names: Vec<_> = nodes.iter().map(NoiseNode::kind_name).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), nodes.len());
    }
}
