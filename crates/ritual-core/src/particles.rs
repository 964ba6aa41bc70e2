//! Deterministic particle placement.
//!
//! Every attribute of particle `i` comes from a generator seeded with
//! `(seed, i, channel)`, so a field depends only on its inputs and each
//! particle is independent of how many others exist.

use rand::prelude::*;
use rand_pcg::Mcg128Xsl64;
use serde::{Deserialize, Serialize};

/// Attribute channels. Each draws from its own stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u64)]
enum Channel {
    X = 1,
    Y = 2,
    Size = 3,
    Delay = 4,
    Duration = 5,
    Drift = 6,
    Opacity = 7,
}

/// Uniform value in `[0, 1)` for `(seed, index, channel)`.
fn seeded_unit(seed: u64, index: u32, channel: Channel) -> f64 {
    // splitmix-style mixing keeps neighbouring keys far apart.
    let mut key = seed
        ^ (index as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15)
        ^ (channel as u64).wrapping_mul(0xBF58_476D_1CE4_E5B9);
    key ^= key >> 31;
    let mut rng = Mcg128Xsl64::seed_from_u64(key);
    rng.gen::<f64>()
}

/// Shape of a generated field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleSpec {
    pub count: u32,
    pub min_size: f64,
    pub max_size: f64,
    /// Latest start offset within the animation.
    pub max_delay_ms: u64,
    pub min_duration_ms: u64,
    pub max_duration_ms: u64,
    /// Largest horizontal drift as a fraction of the field width.
    pub max_drift: f64,
}

impl Default for ParticleSpec {
    fn default() -> Self {
        Self {
            count: 24,
            min_size: 2.0,
            max_size: 6.0,
            max_delay_ms: 1_500,
            min_duration_ms: 2_000,
            max_duration_ms: 4_000,
            max_drift: 0.15,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Particle {
    pub index: u32,
    /// Horizontal position, 0.0 .. 1.0 of the field width.
    pub x: f64,
    /// Vertical position, 0.0 .. 1.0 of the field height.
    pub y: f64,
    pub size: f64,
    pub delay_ms: u64,
    pub duration_ms: u64,
    /// Signed horizontal drift.
    pub drift: f64,
    pub opacity: f64,
}

impl Particle {
    fn generate(seed: u64, index: u32, spec: &ParticleSpec) -> Self {
        let unit = |channel| seeded_unit(seed, index, channel);
        let lerp = |lo: f64, hi: f64, t: f64| lo + (hi - lo).max(0.0) * t;
        let duration_span = spec.max_duration_ms.saturating_sub(spec.min_duration_ms);

        Self {
            index,
            x: unit(Channel::X),
            y: unit(Channel::Y),
            size: lerp(spec.min_size, spec.max_size, unit(Channel::Size)),
            delay_ms: (unit(Channel::Delay) * spec.max_delay_ms as f64) as u64,
            duration_ms: spec.min_duration_ms
                + (unit(Channel::Duration) * duration_span as f64) as u64,
            drift: (unit(Channel::Drift) * 2.0 - 1.0) * spec.max_drift,
            opacity: lerp(0.35, 1.0, unit(Channel::Opacity)),
        }
    }
}

/// A field generated once per mount.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParticleField {
    pub seed: u64,
    pub particles: Vec<Particle>,
}

impl ParticleField {
    pub fn generate(seed: u64, spec: &ParticleSpec) -> Self {
        let particles = (0..spec.count)
            .map(|index| Particle::generate(seed, index, spec))
            .collect();
        Self { seed, particles }
    }

    pub fn len(&self) -> usize {
        self.particles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.particles.is_empty()
    }
}
