//! Noise graph evaluation.
//!
//! An [`Evaluator`] binds a graph to a world seed and prepares one noise
//! source per `Noise` node. Evaluation is a memoised depth-first walk: within
//! one call every node is computed at most once, `Select` only walks the
//! branches it needs, and `Column` values are shared through the
//! [`SampleCache`] when one is attached.

use std::sync::Arc;

use glam::DVec3;

use crate::cache::{COLUMN_TIER, SampleCache, SampleKey};
use crate::error::InvariantError;
use crate::graph::NoiseGraph;
use crate::hash::derive_seed;
use crate::lattice::OctaveNoise;
use crate::node::{Axis, NodeId, NoiseNode};

/// Per-walk memo. Reuse one across calls to avoid reallocating; each
/// evaluation starts a new generation so stale values are never read.
#[derive(Debug, Default)]
pub struct Scratch {
    generation: u32,
    done: Vec<u32>,
    visiting: Vec<u32>,
    values: Vec<f64>,
}

impl Scratch {
    pub fn new(len: usize) -> Self {
        Self {
            generation: 0,
            done: vec![0; len],
            visiting: vec![0; len],
            values: vec![0.0; len],
        }
    }

    fn begin(&mut self, len: usize) {
        if self.done.len() < len {
            self.done.resize(len, 0);
            self.visiting.resize(len, 0);
            self.values.resize(len, 0.0);
        }
        self.generation = self.generation.wrapping_add(1);
        if self.generation == 0 {
            self.done.fill(0);
            self.visiting.fill(0);
            self.generation = 1;
        }
    }
}

/// A graph bound to a seed, ready to sample.
pub struct Evaluator {
    graph: Arc<NoiseGraph>,
    seed: u64,
    sources: Vec<Option<OctaveNoise>>,
    cache: Option<Arc<SampleCache<SampleKey, f64>>>,
    graph_tag: u32,
}

impl Evaluator {
    pub fn new(graph: Arc<NoiseGraph>, seed: u64) -> Self {
        let sources: Vec<Option<OctaveNoise>> = graph
            .nodes()
            .iter()
            .map(|node| match node {
                NoiseNode::Noise(params) => {
                    Some(OctaveNoise::new(derive_seed(seed, params.salt), params.clone()))
                }
                _ => None,
            })
            .collect();
        tracing::debug!(
            nodes = graph.len(),
            sources = sources.iter().flatten().count(),
            "Prepared noise evaluator"
        );
        Self {
            graph,
            seed,
            sources,
            cache: None,
            graph_tag: 0,
        }
    }

    /// Share `Column` results through `cache`. `graph_tag` keeps keys of
    /// different graphs in the same cache apart.
    pub fn with_cache(mut self, cache: Arc<SampleCache<SampleKey, f64>>, graph_tag: u32) -> Self {
        self.cache = Some(cache);
        self.graph_tag = graph_tag;
        self
    }

    pub fn graph(&self) -> &NoiseGraph {
        &self.graph
    }

    pub fn seed(&self) -> u64 {
        self.seed
    }

    pub fn graph_tag(&self) -> u32 {
        self.graph_tag
    }

    pub fn scratch(&self) -> Scratch {
        Scratch::new(self.graph.len())
    }

    /// Evaluate `node` at `position` with a fresh memo.
    pub fn evaluate(&self, node: NodeId, position: DVec3) -> Result<f64, InvariantError> {
        let mut scratch = self.scratch();
        self.evaluate_with(&mut scratch, node, position)
    }

    /// Evaluate the graph's output node.
    pub fn evaluate_output(&self, position: DVec3) -> Result<f64, InvariantError> {
        self.evaluate(self.graph.output(), position)
    }

    /// Evaluate `node` at `position`, reusing `scratch` storage.
    pub fn evaluate_with(
        &self,
        scratch: &mut Scratch,
        node: NodeId,
        position: DVec3,
    ) -> Result<f64, InvariantError> {
        scratch.begin(self.graph.len());
        self.visit(scratch, node, position)
    }

    fn visit(&self, s: &mut Scratch, id: NodeId, pos: DVec3) -> Result<f64, InvariantError> {
        let node = self.graph.node(id).ok_or(InvariantError::MissingNode(id))?;
        let i = id.index();
        if s.done[i] == s.generation {
            return Ok(s.values[i]);
        }
        if s.visiting[i] == s.generation {
            return Err(InvariantError::Reentrant(id));
        }

        s.visiting[i] = s.generation;
        let result = self.apply(s, id, node, pos);
        s.visiting[i] = 0;

        let value = result?;
        if !value.is_finite() {
            return Err(InvariantError::NonFinite {
                node: id,
                value,
                position: pos.to_array(),
            });
        }
        s.values[i] = value;
        s.done[i] = s.generation;
        Ok(value)
    }

    fn apply(
        &self,
        s: &mut Scratch,
        id: NodeId,
        node: &NoiseNode,
        pos: DVec3,
    ) -> Result<f64, InvariantError> {
        let value = match node {
            NoiseNode::Noise(_) => self.sources[id.index()]
                .as_ref()
                .ok_or(InvariantError::MissingSource(id))?
                .sample(pos),
            NoiseNode::Constant(v) => *v,
            NoiseNode::Coordinate(axis) => match axis {
                Axis::X => pos.x,
                Axis::Y => pos.y,
                Axis::Z => pos.z,
            },

            NoiseNode::ScaleBias { input, scale, bias } => self.visit(s, *input, pos)? * scale + bias,
            NoiseNode::Clamp { input, min, max } => self.visit(s, *input, pos)?.max(*min).min(*max),
            NoiseNode::Abs { input } => self.visit(s, *input, pos)?.abs(),
            NoiseNode::Negate { input } => -self.visit(s, *input, pos)?,
            NoiseNode::Curve { input, curve } => curve.sample(self.visit(s, *input, pos)?),

            NoiseNode::Sum(inputs) => self.fold(s, id, inputs, pos, |a, b| a + b)?,
            NoiseNode::Product(inputs) => self.fold(s, id, inputs, pos, |a, b| a * b)?,
            NoiseNode::Min(inputs) => self.fold(s, id, inputs, pos, f64::min)?,
            NoiseNode::Max(inputs) => self.fold(s, id, inputs, pos, f64::max)?,
            NoiseNode::Blend { a, b, weight } => {
                let w = self.visit(s, *weight, pos)?.clamp(0.0, 1.0);
                let a = self.visit(s, *a, pos)?;
                let b = self.visit(s, *b, pos)?;
                a + (b - a) * w
            }

            NoiseNode::Select {
                selector,
                low,
                high,
                threshold,
                falloff,
            } => {
                let sel = self.visit(s, *selector, pos)?;
                let lower = threshold - falloff;
                let upper = threshold + falloff;
                if *falloff <= 0.0 {
                    if sel < *threshold {
                        self.visit(s, *low, pos)?
                    } else {
                        self.visit(s, *high, pos)?
                    }
                } else if sel <= lower {
                    self.visit(s, *low, pos)?
                } else if sel >= upper {
                    self.visit(s, *high, pos)?
                } else {
                    let t = (sel - lower) / (upper - lower);
                    let t = t * t * (3.0 - 2.0 * t);
                    let lo = self.visit(s, *low, pos)?;
                    let hi = self.visit(s, *high, pos)?;
                    lo + (hi - lo) * t
                }
            }

            NoiseNode::Column { input } => self.column(s, id, *input, pos)?,
        };
        Ok(value)
    }

    fn fold(
        &self,
        s: &mut Scratch,
        id: NodeId,
        inputs: &[NodeId],
        pos: DVec3,
        op: impl Fn(f64, f64) -> f64,
    ) -> Result<f64, InvariantError> {
        let (first, rest) = inputs
            .split_first()
            .ok_or(InvariantError::EmptyCombinator(id))?;
        let mut acc = self.visit(s, *first, pos)?;
        for input in rest {
            acc = op(acc, self.visit(s, *input, pos)?);
        }
        Ok(acc)
    }

    fn column(
        &self,
        s: &mut Scratch,
        id: NodeId,
        input: NodeId,
        pos: DVec3,
    ) -> Result<f64, InvariantError> {
        // Same coordinate: the current memo is valid for the column sample.
        if pos.y == 0.0 {
            return self.visit(s, input, pos);
        }

        let column = DVec3::new(pos.x, 0.0, pos.z);
        let compute = || {
            let mut inner = self.scratch();
            inner.begin(self.graph.len());
            self.visit(&mut inner, input, column)
        };

        match (&self.cache, integral(pos.x), integral(pos.z)) {
            (Some(cache), Some(x), Some(z)) => {
                let key = SampleKey {
                    seed: self.seed,
                    graph: self.graph_tag,
                    node: id.0,
                    tier: COLUMN_TIER,
                    position: [x, 0, z],
                };
                cache.try_get_or_compute(key, compute)
            }
            _ => compute(),
        }
    }
}

impl std::fmt::Debug for Evaluator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Evaluator")
            .field("seed", &self.seed)
            .field("nodes", &self.graph.len())
            .field("graph_tag", &self.graph_tag)
            .field("cached", &self.cache.is_some())
            .finish()
    }
}

/// Block coordinate for an integral, in-range float.
fn integral(v: f64) -> Option<i32> {
    if v.fract() == 0.0 && v >= i32::MIN as f64 && v <= i32::MAX as f64 {
        Some(v as i32)
    } else {
        None
    }
}

/// Evaluate `node` of `graph` at `position` under `seed` without a cache.
///
/// Prepares every noise source of the graph on each call; hold an
/// [`Evaluator`] when sampling more than once.
pub fn evaluate(
    graph: &NoiseGraph,
    node: NodeId,
    seed: u64,
    position: DVec3,
) -> Result<f64, InvariantError> {
    Evaluator::new(Arc::new(graph.clone()), seed).evaluate(node, position)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::curve::{Curve, Interpolation};
    use crate::lattice::{NoiseKind, NoiseParams};

    fn graph(nodes: Vec<NoiseNode>, output: u32) -> Arc<NoiseGraph> {
        Arc::new(NoiseGraph::new(nodes, NodeId(output)).unwrap())
    }

    fn noise(salt: u32) -> NoiseNode {
        NoiseNode::Noise(NoiseParams {
            kind: NoiseKind::Gradient,
            salt,
            frequency: 0.01,
            octaves: 3,
            ..Default::default()
        })
    }

    #[test]
    fn test_scale_bias_of_constant() {
        let g = graph(
            vec![
                NoiseNode::Constant(0.5),
                NoiseNode::ScaleBias {
                    input: NodeId(0),
                    scale: 32.0,
                    bias: 64.0,
                },
            ],
            1,
        );
        let v = Evaluator::new(g, 42).evaluate_output(DVec3::ZERO).unwrap();
        assert_eq!(v, 80.0);
    }

    #[test]
    fn test_combinators() {
        let g = graph(
            vec![
                NoiseNode::Constant(2.0),
                NoiseNode::Constant(-3.0),
                NoiseNode::Sum(vec![NodeId(0), NodeId(1)]),
                NoiseNode::Product(vec![NodeId(0), NodeId(1)]),
                NoiseNode::Min(vec![NodeId(0), NodeId(1)]),
                NoiseNode::Max(vec![NodeId(0), NodeId(1)]),
                NoiseNode::Abs { input: NodeId(1) },
                NoiseNode::Negate { input: NodeId(0) },
                NoiseNode::Clamp {
                    input: NodeId(1),
                    min: -1.0,
                    max: 1.0,
                },
            ],
            2,
        );
        let eval = Evaluator::new(g, 0);
        let at = |n: u32| eval.evaluate(NodeId(n), DVec3::ZERO).unwrap();
        assert_eq!(at(2), -1.0);
        assert_eq!(at(3), -6.0);
        assert_eq!(at(4), -3.0);
        assert_eq!(at(5), 2.0);
        assert_eq!(at(6), 3.0);
        assert_eq!(at(7), -2.0);
        assert_eq!(at(8), -1.0);
    }

    #[test]
    fn test_blend_clamps_weight() {
        let g = graph(
            vec![
                NoiseNode::Constant(10.0),
                NoiseNode::Constant(20.0),
                NoiseNode::Coordinate(Axis::X),
                NoiseNode::Blend {
                    a: NodeId(0),
                    b: NodeId(1),
                    weight: NodeId(2),
                },
            ],
            3,
        );
        let eval = Evaluator::new(g, 0);
        assert_eq!(eval.evaluate_output(DVec3::new(0.25, 0.0, 0.0)).unwrap(), 12.5);
        assert_eq!(eval.evaluate_output(DVec3::new(5.0, 0.0, 0.0)).unwrap(), 20.0);
        assert_eq!(eval.evaluate_output(DVec3::new(-5.0, 0.0, 0.0)).unwrap(), 10.0);
    }

    #[test]
    fn test_select_only_walks_needed_branch() {
        // Node 2 is an empty sum and fails whenever it is evaluated.
        let g = graph(
            vec![
                NoiseNode::Coordinate(Axis::X),
                NoiseNode::Constant(5.0),
                NoiseNode::Sum(Vec::new()),
                NoiseNode::Select {
                    selector: NodeId(0),
                    low: NodeId(1),
                    high: NodeId(2),
                    threshold: 0.0,
                    falloff: 0.5,
                },
            ],
            3,
        );
        let eval = Evaluator::new(g, 0);
        assert_eq!(eval.evaluate_output(DVec3::new(-1.0, 0.0, 0.0)).unwrap(), 5.0);
        assert_eq!(
            eval.evaluate_output(DVec3::new(1.0, 0.0, 0.0)),
            Err(InvariantError::EmptyCombinator(NodeId(2)))
        );
    }

    #[test]
    fn test_select_falloff_is_smooth() {
        let g = graph(
            vec![
                NoiseNode::Coordinate(Axis::X),
                NoiseNode::Constant(0.0),
                NoiseNode::Constant(1.0),
                NoiseNode::Select {
                    selector: NodeId(0),
                    low: NodeId(1),
                    high: NodeId(2),
                    threshold: 0.0,
                    falloff: 1.0,
                },
            ],
            3,
        );
        let eval = Evaluator::new(g, 0);
        assert_eq!(eval.evaluate_output(DVec3::new(0.0, 0.0, 0.0)).unwrap(), 0.5);
        let mut prev = eval.evaluate_output(DVec3::new(-1.5, 0.0, 0.0)).unwrap();
        for i in 1..=30 {
            let x = -1.5 + i as f64 * 0.1;
            let v = eval.evaluate_output(DVec3::new(x, 0.0, 0.0)).unwrap();
            assert!(v >= prev && v - prev < 0.2, "Select jumped at x={x}");
            prev = v;
        }
    }

    #[test]
    fn test_curve_node_clamps() {
        let curve = Curve::new(&[[0.0, 0.0], [1.0, 10.0]], Interpolation::Linear).unwrap();
        let g = graph(
            vec![
                NoiseNode::Coordinate(Axis::Y),
                NoiseNode::Curve {
                    input: NodeId(0),
                    curve,
                },
            ],
            1,
        );
        let eval = Evaluator::new(g, 0);
        assert_eq!(eval.evaluate_output(DVec3::new(0.0, 0.5, 0.0)).unwrap(), 5.0);
        assert_eq!(eval.evaluate_output(DVec3::new(0.0, 99.0, 0.0)).unwrap(), 10.0);
    }

    #[test]
    fn test_deterministic_and_seed_dependent() {
        let g = graph(vec![noise(1)], 0);
        let a = Evaluator::new(Arc::clone(&g), 42);
        let b = Evaluator::new(Arc::clone(&g), 42);
        let c = Evaluator::new(g, 43);
        let mut differs = false;
        for i in 0..64 {
            let p = DVec3::new(i as f64 * 7.3, i as f64 * -2.1, i as f64 * 11.9);
            let va = a.evaluate_output(p).unwrap();
            assert_eq!(va.to_bits(), b.evaluate_output(p).unwrap().to_bits());
            differs |= va != c.evaluate_output(p).unwrap();
        }
        assert!(differs, "A different seed should change the field");
    }

    #[test]
    fn test_shared_input_evaluated_once_per_walk() {
        let g = graph(vec![noise(3), NoiseNode::Sum(vec![NodeId(0), NodeId(0)])], 1);
        let eval = Evaluator::new(g, 9);
        let p = DVec3::new(12.5, 3.0, -40.25);
        let single = eval.evaluate(NodeId(0), p).unwrap();
        assert_eq!(eval.evaluate_output(p).unwrap(), single * 2.0);
    }

    #[test]
    fn test_column_ignores_height_and_uses_cache() {
        let g = graph(vec![noise(5), NoiseNode::Column { input: NodeId(0) }], 1);
        let cache = Arc::new(SampleCache::new(64, 2));
        let eval = Evaluator::new(g, 1).with_cache(Arc::clone(&cache), 0);
        let ground = eval.evaluate(NodeId(0), DVec3::new(16.0, 0.0, -8.0)).unwrap();
        for y in [-100.0, 3.0, 250.0] {
            let v = eval.evaluate_output(DVec3::new(16.0, y, -8.0)).unwrap();
            assert_eq!(v, ground);
        }
        assert_eq!(cache.len(), 1, "One column entry expected");
        assert_eq!(cache.stats().hits, 2);
    }

    #[test]
    fn test_errors_instead_of_nan() {
        let g = graph(
            vec![
                NoiseNode::Constant(1.0),
                NoiseNode::ScaleBias {
                    input: NodeId(0),
                    scale: f64::INFINITY,
                    bias: 0.0,
                },
            ],
            1,
        );
        let eval = Evaluator::new(g, 0);
        assert!(matches!(
            eval.evaluate_output(DVec3::ZERO),
            Err(InvariantError::NonFinite { node: NodeId(1), .. })
        ));
        assert_eq!(
            eval.evaluate(NodeId(17), DVec3::ZERO),
            Err(InvariantError::MissingNode(NodeId(17)))
        );
    }

    #[test]
    fn test_scratch_reuse_across_positions() {
        let g = graph(vec![noise(2)], 0);
        let eval = Evaluator::new(g, 77);
        let mut scratch = eval.scratch();
        for i in 0..16 {
            let p = DVec3::new(i as f64 * 3.0, 1.0, 2.0);
            let reused = eval.evaluate_with(&mut scratch, NodeId(0), p).unwrap();
            assert_eq!(reused, eval.evaluate(NodeId(0), p).unwrap());
        }
    }

    #[test]
    fn test_free_function_matches_evaluator() {
        let g = graph(vec![noise(8)], 0);
        let p = DVec3::new(1.5, 2.5, 3.5);
        assert_eq!(
            evaluate(&g, NodeId(0), 5, p).unwrap(),
            Evaluator::new(Arc::clone(&g), 5).evaluate(NodeId(0), p).unwrap()
        );
    }
}
