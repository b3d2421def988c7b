//! Ravines: long, shallow-angled walks carving tall, narrow cross sections.
//!
//! Each ravine rolls a table of width factors indexed by height, so its
//! walls are uneven from layer to layer.

use std::f64::consts::{PI, TAU};

use glam::{DVec3, IVec3};
use rand::Rng;
use strata_noise::hash::{det_cos, det_sin};
use strata_noise::{StreamTag, chunk_rng};
use strata_preset::RavineSettings;

use super::{can_reach, carve_shape, origins_around};
use crate::density::{CHUNK_SIZE, DensityField};

const WIDTH_TABLE: usize = 256;

/// Carves ravines into density fields.
pub struct RavineCarver {
    settings: RavineSettings,
}

impl RavineCarver {
    pub fn new(settings: RavineSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &RavineSettings {
        &self.settings
    }

    /// Carve every ravine that reaches the chunk `field` covers.
    pub fn carve(&self, field: &mut DensityField, seed: u64) {
        for origin in origins_around(field.chunk(), self.settings.range) {
            self.carve_from(field, seed, origin);
        }
    }

    fn carve_from(&self, field: &mut DensityField, seed: u64, origin: IVec3) {
        let mut rng = chunk_rng(seed, origin.to_array(), StreamTag::RAVINES);
        if rng.random::<f64>() >= self.settings.probability {
            return;
        }
        let size = CHUNK_SIZE as i32;
        let mut position = (origin * size
            + IVec3::new(
                rng.random_range(0..size),
                rng.random_range(0..size),
                rng.random_range(0..size),
            ))
        .as_dvec3();
        if position.y > self.settings.max_start_y {
            return;
        }

        let mut yaw = rng.random::<f64>() * TAU;
        let mut pitch = (rng.random::<f64>() - 0.5) * 2.0 / 8.0;
        let width = (rng.random::<f64>() * 2.0 + rng.random::<f64>()) * self.settings.max_width / 3.0;
        let max_walk = (self.settings.range * CHUNK_SIZE as u32)
            .saturating_sub(CHUNK_SIZE as u32)
            .max(8);
        let length = max_walk - rng.random_range(0..max_walk / 4);

        let mut widths = [0.0; WIDTH_TABLE];
        let mut factor = 1.0;
        for (i, slot) in widths.iter_mut().enumerate() {
            if i == 0 || rng.random_range(0..3) == 0 {
                factor = 1.0 + rng.random::<f64>() * rng.random::<f64>();
            }
            *slot = factor * factor;
        }

        let mut yaw_change = 0.0;
        let mut pitch_change = 0.0;
        for step in 0..length {
            let mut radius_h = 1.5 + det_sin(f64::from(step) * PI / f64::from(length)) * width;
            let mut radius_v = radius_h * self.settings.vertical_stretch;
            radius_h *= rng.random::<f64>() * 0.25 + 0.75;
            radius_v *= rng.random::<f64>() * 0.25 + 0.75;

            let horizontal = det_cos(pitch);
            position += DVec3::new(det_cos(yaw) * horizontal, det_sin(pitch), det_sin(yaw) * horizontal);

            pitch *= 0.7;
            pitch += pitch_change * 0.05;
            yaw += yaw_change * 0.05;
            pitch_change *= 0.8;
            yaw_change *= 0.5;
            pitch_change += (rng.random::<f64>() - rng.random::<f64>()) * rng.random::<f64>() * 2.0;
            yaw_change += (rng.random::<f64>() - rng.random::<f64>()) * rng.random::<f64>() * 4.0;

            if rng.random_range(0..4) == 0 {
                continue;
            }
            if !can_reach(field, position, f64::from(length - step), width + 1.5) {
                return;
            }
            carve_shape(field, position, radius_h, radius_v, self.settings.strength, |offset, y| {
                let factor = widths[y.rem_euclid(WIDTH_TABLE as i32) as usize];
                Some((offset.x * offset.x + offset.z * offset.z) * factor + offset.y * offset.y / 6.0)
            });
        }
    }
}
