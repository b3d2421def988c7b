//! Worm caves.
//!
//! A cave system starts in an origin chunk with a few tunnels, optionally
//! around a room. Each tunnel walks one block per step while its heading
//! drifts; its radius swells towards the middle of the walk. Wide tunnels
//! split once into two narrower branches at right angles.

use std::f64::consts::{FRAC_PI_2, PI, TAU};

use glam::{DVec3, IVec3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use strata_noise::{StreamTag, chunk_rng};
use strata_noise::hash::{det_cos, det_sin};
use strata_preset::CaveSettings;

use super::{can_reach, carve_shape, origins_around};
use crate::density::{CHUNK_SIZE, DensityField};

/// Normalised vertical offset below which tunnel floors are left intact.
const FLOOR_CUTOFF: f64 = -0.7;

struct Tunnel {
    position: DVec3,
    yaw: f64,
    pitch: f64,
    width: f64,
    step: u32,
    length: u32,
    seed: u64,
    can_branch: bool,
}

/// Carves worm caves into density fields.
pub struct CaveCarver {
    settings: CaveSettings,
}

impl CaveCarver {
    pub fn new(settings: CaveSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &CaveSettings {
        &self.settings
    }

    /// Carve every cave system that reaches the chunk `field` covers.
    pub fn carve(&self, field: &mut DensityField, seed: u64) {
        for origin in origins_around(field.chunk(), self.settings.range) {
            self.carve_from(field, seed, origin);
        }
    }

    fn max_walk(&self) -> u32 {
        (self.settings.range * CHUNK_SIZE as u32)
            .saturating_sub(CHUNK_SIZE as u32)
            .max(8)
    }

    fn carve_from(&self, field: &mut DensityField, seed: u64, origin: IVec3) {
        let mut rng = chunk_rng(seed, origin.to_array(), StreamTag::CAVES);
        if rng.random::<f64>() >= self.settings.probability {
            return;
        }
        // Heavily skewed towards few tunnels.
        let a = rng.random_range(0..=self.settings.max_tunnels);
        let b = rng.random_range(0..=a);
        let count = rng.random_range(0..=b);
        let systems: Vec<u64> = (0..count).map(|_| rng.random()).collect();

        for system in systems {
            self.carve_system(field, origin, ChaCha8Rng::seed_from_u64(system));
        }
    }

    fn carve_system(&self, field: &mut DensityField, origin: IVec3, mut rng: ChaCha8Rng) {
        let size = CHUNK_SIZE as i32;
        let start = (origin * size
            + IVec3::new(
                rng.random_range(0..size),
                rng.random_range(0..size),
                rng.random_range(0..size),
            ))
        .as_dvec3();
        let max_walk = self.max_walk();

        let mut branches = 1;
        if rng.random::<f64>() < self.settings.room_probability {
            let radius_h = 1.5 + 1.0 + rng.random::<f64>() * 6.0;
            let radius_v = radius_h * self.settings.vertical_squash;
            carve_shape(field, start, radius_h, radius_v, self.settings.strength, floor_ellipsoid);
            branches += rng.random_range(0..4);
        }

        let mut pending = Vec::with_capacity(branches as usize);
        for _ in 0..branches {
            let yaw = rng.random::<f64>() * TAU;
            let pitch = (rng.random::<f64>() - 0.5) * 2.0 / 8.0;
            let mut width =
                (rng.random::<f64>() * 2.0 + rng.random::<f64>()) * self.settings.tunnel_radius / 3.0;
            if rng.random_range(0..10) == 0 {
                width *= rng.random::<f64>() * rng.random::<f64>() * 3.0 + 1.0;
            }
            let length = max_walk - rng.random_range(0..max_walk / 4);
            pending.push(Tunnel {
                position: start,
                yaw,
                pitch,
                width,
                step: 0,
                length,
                seed: rng.random(),
                can_branch: true,
            });
        }

        while let Some(tunnel) = pending.pop() {
            self.walk(field, tunnel, &mut pending);
        }
    }

    fn walk(&self, field: &mut DensityField, tunnel: Tunnel, pending: &mut Vec<Tunnel>) {
        let mut rng = ChaCha8Rng::seed_from_u64(tunnel.seed);
        let Tunnel {
            mut position,
            mut yaw,
            mut pitch,
            width,
            length,
            ..
        } = tunnel;
        if tunnel.step >= length {
            return;
        }

        let split_at = if tunnel.can_branch && length >= 4 {
            Some(rng.random_range(length / 4..length / 4 + length / 2 + 1))
        } else {
            None
        };
        let steep = rng.random_range(0..6) == 0;
        let mut yaw_change = 0.0;
        let mut pitch_change = 0.0;

        for step in tunnel.step..length {
            let radius_h = 1.5 + det_sin(f64::from(step) * PI / f64::from(length)) * width;
            let radius_v = radius_h * self.settings.vertical_squash;

            let horizontal = det_cos(pitch);
            position += DVec3::new(det_cos(yaw) * horizontal, det_sin(pitch), det_sin(yaw) * horizontal);

            pitch *= if steep { 0.92 } else { 0.7 };
            pitch += pitch_change * 0.1;
            yaw += yaw_change * 0.1;
            pitch_change *= 0.9;
            yaw_change *= 0.75;
            pitch_change += (rng.random::<f64>() - rng.random::<f64>()) * rng.random::<f64>() * 2.0;
            yaw_change += (rng.random::<f64>() - rng.random::<f64>()) * rng.random::<f64>() * 4.0;

            if split_at == Some(step) && width > 1.0 {
                for turn in [-FRAC_PI_2, FRAC_PI_2] {
                    pending.push(Tunnel {
                        position,
                        yaw: yaw + turn,
                        pitch: pitch / 3.0,
                        width: rng.random::<f64>() * 0.5 + 0.5,
                        step: step + 1,
                        length,
                        seed: rng.random(),
                        can_branch: false,
                    });
                }
                return;
            }

            if rng.random_range(0..4) == 0 {
                continue;
            }
            // Branches are narrower and no longer, so they cannot reach it either.
            if !can_reach(field, position, f64::from(length - step), width + 1.5) {
                return;
            }
            carve_shape(field, position, radius_h, radius_v, self.settings.strength, floor_ellipsoid);
        }
    }
}

fn floor_ellipsoid(offset: DVec3, _y: i32) -> Option<f64> {
    (offset.y > FLOOR_CUTOFF).then(|| offset.length_squared())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn solid_field(chunk: IVec3) -> DensityField {
        let mut field = DensityField::new(chunk);
        for y in 0..CHUNK_SIZE {
            for z in 0..CHUNK_SIZE {
                for x in 0..CHUNK_SIZE {
                    field.set(x, y, z, 5.0);
                }
            }
        }
        field
    }

    fn carver(probability: f64) -> CaveCarver {
        CaveCarver::new(CaveSettings {
            probability,
            range: 3,
            ..CaveSettings::default()
        })
    }

    fn carved_total(carver: &CaveCarver, seed: u64, chunks: impl Iterator<Item = IVec3>) -> usize {
        chunks
            .map(|chunk| {
                let mut field = solid_field(chunk);
                carver.carve(&mut field, seed);
                CHUNK_SIZE * CHUNK_SIZE * CHUNK_SIZE - field.solid_count()
            })
            .sum()
    }

    #[test]
    fn test_caves_carve_something() {
        let carver = carver(1.0);
        let chunks = (-2..=2).flat_map(|x| (-2..=2).map(move |z| IVec3::new(x, 0, z)));
        assert!(carved_total(&carver, 42, chunks) > 0, "certain caves should carve voxels");
    }

    #[test]
    fn test_disabled_probability_carves_nothing() {
        let carver = carver(0.0);
        let chunks = (-1..=1).map(|x| IVec3::new(x, 0, 0));
        assert_eq!(carved_total(&carver, 42, chunks), 0);
    }

    #[test]
    fn test_carving_is_deterministic() {
        let carver = carver(0.5);
        let chunk = IVec3::new(1, -1, 2);
        let mut a = solid_field(chunk);
        let mut b = solid_field(chunk);
        carver.carve(&mut a, 7);
        carver.carve(&mut b, 7);
        assert_eq!(a, b);
    }

    #[test]
    fn test_carved_density_bounded_by_strength() {
        let carver = carver(1.0);
        let mut field = solid_field(IVec3::ZERO);
        carver.carve(&mut field, 3);
        for &d in field.densities() {
            assert!(d >= -carver.settings().strength, "density {d} below -strength");
        }
    }

    #[test]
    fn test_different_seeds_differ() {
        let carver = carver(1.0);
        let mut a = solid_field(IVec3::ZERO);
        let mut b = solid_field(IVec3::ZERO);
        carver.carve(&mut a, 1);
        carver.carve(&mut b, 2);
        assert_ne!(a, b);
    }
}
