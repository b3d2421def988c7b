//! Seeded lattice noise and multi-octave fractal Brownian motion (fBm).
//!
//! Gradient and value noise hash each lattice corner with [`hash_cell`], so a
//! sample depends only on the seed and the cell coordinates around it, and the
//! pattern never repeats. Simplex sources use the `noise` crate.

use glam::DVec3;
use noise::{NoiseFn, Simplex};
use serde::{Deserialize, Serialize};

use crate::hash::{derive_seed, hash_cell, unit_f64};

/// The 12 cube-edge gradient directions of improved Perlin noise.
const GRADIENTS: [[f64; 3]; 12] = [
    [1.0, 1.0, 0.0],
    [-1.0, 1.0, 0.0],
    [1.0, -1.0, 0.0],
    [-1.0, -1.0, 0.0],
    [1.0, 0.0, 1.0],
    [-1.0, 0.0, 1.0],
    [1.0, 0.0, -1.0],
    [-1.0, 0.0, -1.0],
    [0.0, 1.0, 1.0],
    [0.0, -1.0, 1.0],
    [0.0, 1.0, -1.0],
    [0.0, -1.0, -1.0],
];

/// Which basis function a noise source uses.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NoiseKind {
    /// Hashed-gradient (Perlin-style) noise.
    #[default]
    Gradient,
    /// Hashed-value noise with smoothstep interpolation.
    Value,
    /// Simplex noise from the `noise` crate.
    Simplex,
}

#[inline]
fn quintic(t: f64) -> f64 {
    t * t * t * (t * (t * 6.0 - 15.0) + 10.0)
}

#[inline]
fn lerp(a: f64, b: f64, t: f64) -> f64 {
    a + (b - a) * t
}

#[inline]
fn cell(v: f64) -> (i32, f64) {
    let floor = v.floor();
    (floor as i32, v - floor)
}

#[inline]
fn corner_gradient(seed: u64, x: i32, y: i32, z: i32, dx: f64, dy: f64, dz: f64) -> f64 {
    let g = GRADIENTS[(hash_cell(seed, x, y, z) % 12) as usize];
    g[0] * dx + g[1] * dy + g[2] * dz
}

/// Single-octave gradient noise. Output lies roughly in `[-1, 1]`.
pub fn gradient_3d(seed: u64, p: DVec3) -> f64 {
    let (x0, fx) = cell(p.x);
    let (y0, fy) = cell(p.y);
    let (z0, fz) = cell(p.z);
    let (x1, y1, z1) = (x0.wrapping_add(1), y0.wrapping_add(1), z0.wrapping_add(1));

    let n000 = corner_gradient(seed, x0, y0, z0, fx, fy, fz);
    let n100 = corner_gradient(seed, x1, y0, z0, fx - 1.0, fy, fz);
    let n010 = corner_gradient(seed, x0, y1, z0, fx, fy - 1.0, fz);
    let n110 = corner_gradient(seed, x1, y1, z0, fx - 1.0, fy - 1.0, fz);
    let n001 = corner_gradient(seed, x0, y0, z1, fx, fy, fz - 1.0);
    let n101 = corner_gradient(seed, x1, y0, z1, fx - 1.0, fy, fz - 1.0);
    let n011 = corner_gradient(seed, x0, y1, z1, fx, fy - 1.0, fz - 1.0);
    let n111 = corner_gradient(seed, x1, y1, z1, fx - 1.0, fy - 1.0, fz - 1.0);

    let (u, v, w) = (quintic(fx), quintic(fy), quintic(fz));
    let x00 = lerp(n000, n100, u);
    let x10 = lerp(n010, n110, u);
    let x01 = lerp(n001, n101, u);
    let x11 = lerp(n011, n111, u);
    lerp(lerp(x00, x10, v), lerp(x01, x11, v), w)
}

#[inline]
fn corner_value(seed: u64, x: i32, y: i32, z: i32) -> f64 {
    unit_f64(hash_cell(seed, x, y, z)) * 2.0 - 1.0
}

/// Single-octave value noise in `[-1, 1]`.
pub fn value_3d(seed: u64, p: DVec3) -> f64 {
    let (x0, fx) = cell(p.x);
    let (y0, fy) = cell(p.y);
    let (z0, fz) = cell(p.z);
    let (x1, y1, z1) = (x0.wrapping_add(1), y0.wrapping_add(1), z0.wrapping_add(1));

    let (u, v, w) = (quintic(fx), quintic(fy), quintic(fz));
    let x00 = lerp(corner_value(seed, x0, y0, z0), corner_value(seed, x1, y0, z0), u);
    let x10 = lerp(corner_value(seed, x0, y1, z0), corner_value(seed, x1, y1, z0), u);
    let x01 = lerp(corner_value(seed, x0, y0, z1), corner_value(seed, x1, y0, z1), u);
    let x11 = lerp(corner_value(seed, x0, y1, z1), corner_value(seed, x1, y1, z1), u);
    lerp(lerp(x00, x10, v), lerp(x01, x11, v), w)
}

/// Configuration for a multi-octave noise source.
#[derive(Clone, Debug, PartialEq)]
pub struct NoiseParams {
    /// Basis function.
    pub kind: NoiseKind,
    /// Salt mixed into the world seed so sibling sources are decorrelated.
    pub salt: u32,
    /// Frequency of the first (lowest) octave, in cycles per block.
    pub frequency: f64,
    /// Multiplier applied to the vertical frequency. `0.0` makes the source
    /// constant along each column.
    pub vertical_scale: f64,
    /// Number of octaves to composite.
    pub octaves: u32,
    /// Amplitude multiplier between successive octaves. Default: 0.5.
    pub persistence: f64,
    /// Frequency multiplier between successive octaves. Default: 2.0.
    pub lacunarity: f64,
}

impl Default for NoiseParams {
    fn default() -> Self {
        Self {
            kind: NoiseKind::Gradient,
            salt: 0,
            frequency: 0.01,
            vertical_scale: 1.0,
            octaves: 1,
            persistence: 0.5,
            lacunarity: 2.0,
        }
    }
}

/// A seeded fBm source. Each octave gets its own derived seed.
///
/// The composite is divided by the amplitude sum, so the output stays in the
/// range of the basis function.
#[derive(Clone)]
pub struct OctaveNoise {
    params: NoiseParams,
    octave_seeds: Vec<u64>,
    simplex: Vec<Simplex>,
    amplitude_sum: f64,
}

impl OctaveNoise {
    /// Create a source for `params` under the given (already node-derived) seed.
    pub fn new(seed: u64, params: NoiseParams) -> Self {
        let octave_seeds: Vec<u64> = (0..params.octaves)
            .map(|octave| derive_seed(seed, octave))
            .collect();
        let simplex = if params.kind == NoiseKind::Simplex {
            octave_seeds.iter().map(|&s| Simplex::new(s as u32)).collect()
        } else {
            Vec::new()
        };

        let mut amplitude_sum = 0.0;
        let mut amplitude = 1.0;
        for _ in 0..params.octaves {
            amplitude_sum += amplitude;
            amplitude *= params.persistence;
        }

        Self {
            params,
            octave_seeds,
            simplex,
            amplitude_sum,
        }
    }

    /// Returns the parameters this source was built from.
    pub fn params(&self) -> &NoiseParams {
        &self.params
    }

    /// Sample the composite at a world-space position.
    pub fn sample(&self, pos: DVec3) -> f64 {
        if self.amplitude_sum == 0.0 {
            return 0.0;
        }

        let mut total = 0.0;
        let mut frequency = self.params.frequency;
        let mut amplitude = 1.0;

        for octave in 0..self.octave_seeds.len() {
            let p = DVec3::new(
                pos.x * frequency,
                pos.y * frequency * self.params.vertical_scale,
                pos.z * frequency,
            );
            total += self.sample_octave(octave, p) * amplitude;

            frequency *= self.params.lacunarity;
            amplitude *= self.params.persistence;
        }

        total / self.amplitude_sum
    }

    fn sample_octave(&self, octave: usize, p: DVec3) -> f64 {
        match self.params.kind {
            NoiseKind::Gradient => gradient_3d(self.octave_seeds[octave], p),
            NoiseKind::Value => value_3d(self.octave_seeds[octave], p),
            NoiseKind::Simplex => self.simplex[octave].get([p.x, p.y, p.z]),
        }
    }
}

impl std::fmt::Debug for OctaveNoise {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OctaveNoise")
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}
