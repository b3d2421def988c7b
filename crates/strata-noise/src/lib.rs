//! Noise graph evaluation for Strata terrain.
//!
//! A [`NoiseGraph`] is a flat arena of pure scalar operators. An
//! [`Evaluator`] binds it to a world seed and samples it at world positions;
//! [`SampleCache`] shares recomputable samples between threads. All
//! randomness comes from the fixed coordinate hash in [`hash`].

pub mod cache;
pub mod curve;
pub mod error;
pub mod eval;
pub mod graph;
pub mod hash;
pub mod lattice;
pub mod node;

pub use cache::{COLUMN_TIER, CacheStats, SampleCache, SampleKey};
pub use curve::{Curve, CurveError, Interpolation};
pub use error::InvariantError;
pub use eval::{Evaluator, Scratch, evaluate};
pub use graph::{GraphError, NoiseGraph};
pub use hash::{StreamTag, chunk_rng, derive_chunk_seed, derive_seed, hash4, hash_str};
pub use lattice::{NoiseKind, NoiseParams, OctaveNoise};
pub use node::{Axis, NodeId, NoiseNode};
