//! Seeded sample source for replays.
//!
//! The walker stands in for the host game's position poller:
//! - One sample every `update_period` real seconds, converted to game days
//! - Heading drifts with Gaussian noise, occasional idle stretches
//! - Wanders back toward its start once it strays too far
//!
//! Everything random comes from a single ChaCha8 stream, so a seed fully
//! determines the walk.

use nalgebra::{Vector2, Vector3};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};
use serde::{Deserialize, Serialize};

use crate::error::SimError;

const SECONDS_PER_DAY: f32 = 86_400.0;

/// One polled position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub position: Vector3<f32>,

    /// Game time (days)
    pub time: f32,
}

/// Anything that produces samples and can be reloaded to an earlier state.
pub trait Sampler {
    /// Advances one tick and returns the new sample.
    fn sample(&mut self) -> Sample;

    /// The state a save game taken now would hold.
    fn checkpoint(&self) -> Sample;

    /// Jumps back to `checkpoint`, like loading a save.
    fn restore(&mut self, checkpoint: &Sample);
}

/// Random walk parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WalkConfig {
    /// Real seconds between two samples
    pub update_period: f32,

    /// Game seconds per real second
    pub timescale: f32,

    /// World units per real second while moving
    pub speed: f32,

    /// Standard deviation of the heading change per sample (radians)
    pub turn_std: f32,

    /// Probability that a sample is taken while standing still
    pub idle_chance: f64,

    /// Distance from the start beyond which the walker turns home
    pub leash: f32,

    pub start: Vector3<f32>,
}

impl Default for WalkConfig {
    fn default() -> Self {
        Self {
            update_period: 5.0,
            timescale: 20.0,
            speed: 150.0,
            turn_std: 0.35,
            idle_chance: 0.25,
            leash: 120_000.0,
            start: Vector3::zeros(),
        }
    }
}

/// Seeded random walk over the map.
pub struct RandomWalk {
    config: WalkConfig,
    rng: ChaCha8Rng,
    turn: Normal<f32>,
    position: Vector3<f32>,
    heading: f32,
    time: f32,
}

impl RandomWalk {
    /// Creates a walker at `config.start`, day 0.
    ///
    /// # Arguments
    /// * `seed` - Seed of the walker's random stream
    /// * `config` - Walk parameters
    pub fn new(seed: u64, config: WalkConfig) -> Result<Self, SimError> {
        if !(config.update_period > 0.0) || !(config.timescale > 0.0) {
            return Err(SimError::invalid("update period and timescale must be positive"));
        }
        if !(0.0..=1.0).contains(&config.idle_chance) {
            return Err(SimError::invalid(format!(
                "idle_chance must be within 0..=1, got {}",
                config.idle_chance
            )));
        }
        let turn = Normal::new(0.0, config.turn_std)
            .map_err(|e| SimError::invalid(format!("turn_std: {e}")))?;

        let mut rng = ChaCha8Rng::seed_from_u64(seed);
        let heading = rng.gen_range(0.0..std::f32::consts::TAU);
        Ok(Self {
            position: config.start,
            config,
            rng,
            turn,
            heading,
            time: 0.0,
        })
    }

    /// Game days that pass between two samples.
    pub fn tick_days(&self) -> f32 {
        self.config.update_period * self.config.timescale / SECONDS_PER_DAY
    }

    pub fn position(&self) -> &Vector3<f32> {
        &self.position
    }

    pub fn time(&self) -> f32 {
        self.time
    }
}

impl Sampler for RandomWalk {
    fn sample(&mut self) -> Sample {
        self.time += self.tick_days();

        if !self.rng.gen_bool(self.config.idle_chance) {
            let home = self.config.start.xy() - self.position.xy();
            if home.norm() > self.config.leash {
                self.heading = home.y.atan2(home.x);
            } else {
                self.heading += self.turn.sample(&mut self.rng);
            }

            let step = self.config.speed * self.config.update_period;
            let direction = Vector2::new(self.heading.cos(), self.heading.sin());
            self.position.x += direction.x * step;
            self.position.y += direction.y * step;
            // Rolling terrain
            self.position.z = 500.0 * (self.position.x / 20_000.0).sin();
        }

        Sample {
            position: self.position,
            time: self.time,
        }
    }

    fn checkpoint(&self) -> Sample {
        Sample {
            position: self.position,
            time: self.time,
        }
    }

    fn restore(&mut self, checkpoint: &Sample) {
        self.position = checkpoint.position;
        self.time = checkpoint.time;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn walk(seed: u64, n: usize) -> Vec<Sample> {
        let mut walker = RandomWalk::new(seed, WalkConfig::default()).unwrap();
        (0..n).map(|_| walker.sample()).collect()
    }

    #[test]
    fn test_same_seed_same_walk() {
        assert_eq!(walk(42, 200), walk(42, 200));
    }

    #[test]
    fn test_different_seed_different_walk() {
        assert_ne!(walk(1, 50), walk(2, 50));
    }

    #[test]
    fn test_clock_advances_by_tick_days() {
        let samples = walk(7, 10);
        let walker = RandomWalk::new(7, WalkConfig::default()).unwrap();
        // 5 s at timescale 20 is 100 game seconds
        assert_relative_eq!(walker.tick_days(), 100.0 / 86_400.0);
        for pair in samples.windows(2) {
            assert!(pair[1].time > pair[0].time);
        }
    }

    #[test]
    fn test_steps_never_exceed_speed() {
        let config = WalkConfig::default();
        let max_step = config.speed * config.update_period;
        for pair in walk(3, 500).windows(2) {
            let planar = (pair[1].position.xy() - pair[0].position.xy()).norm();
            assert!(planar <= max_step * 1.001);
        }
    }

    #[test]
    fn test_restore_goes_back_in_time() {
        let mut walker = RandomWalk::new(9, WalkConfig::default()).unwrap();
        walker.sample();
        let saved = walker.checkpoint();
        for _ in 0..20 {
            walker.sample();
        }
        walker.restore(&saved);
        let next = walker.sample();
        assert!(next.time > saved.time);
        assert!(next.time < saved.time + 2.0 * walker.tick_days());
    }

    #[test]
    fn test_rejects_bad_config() {
        let config = WalkConfig {
            update_period: 0.0,
            ..WalkConfig::default()
        };
        assert!(RandomWalk::new(1, config).is_err());
    }
}
