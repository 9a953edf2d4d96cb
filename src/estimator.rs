// src/estimator.rs

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

/// Nominal throughput once the swarm is warm: 800 KiB/s.
pub const BASE_SPEED: f64 = 1024.0 * 1024.0 * 0.8;
/// Progress at which throughput stops ramping up.
pub const RAMP_MIDPOINT: f64 = 50.0;
/// Chance per tick that the peer counts change at all.
pub const PEER_CHURN_PROBABILITY: f64 = 0.3;

#[derive(Debug, Error)]
pub enum EstimateError {
    #[error("telemetry unavailable: {0}")]
    Unavailable(String),
}

/// What the estimator sees of a job at the start of a tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickSample {
    pub progress: f64,
    pub seeders: u32,
    pub leechers: u32,
    pub eta: f64,
    /// Wall-clock time since the current run started.
    pub elapsed: Duration,
}

/// Metrics produced by one tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickUpdate {
    pub progress: f64,
    pub seeders: u32,
    pub leechers: u32,
    pub download_speed: u64,
    pub upload_speed: u64,
    pub eta: f64,
    /// Only known to estimators backed by real telemetry.
    pub total_size: Option<u64>,
    pub downloaded_size: Option<u64>,
}

/// Per-tick progress, peer and throughput estimation.
///
/// The transfer tools give no progress channel, so the default estimator
/// synthesizes one. Implementations may be swapped; the job still enforces
/// monotonic progress and non-negative metrics on whatever they return.
pub trait ProgressEstimator: Send + Sync {
    fn next_tick(&self, sample: &TickSample) -> Result<TickUpdate, EstimateError>;
}

/// Base progress increment for the band `progress` falls in.
pub fn band_increment(progress: f64) -> f64 {
    if progress < 5.0 {
        0.05
    } else if progress < 20.0 {
        0.2
    } else if progress < 80.0 {
        0.3
    } else if progress < 95.0 {
        0.1
    } else {
        0.02
    }
}

/// Linear extrapolation of the remaining time; `None` when progress is zero.
pub fn linear_eta(elapsed: Duration, progress: f64) -> Option<f64> {
    if progress <= 0.0 {
        return None;
    }
    let elapsed = elapsed.as_secs_f64();
    let estimated_total = elapsed * (100.0 / progress);
    Some((estimated_total - elapsed).max(0.0))
}

/// Five-band synthetic model with random peer churn and throughput jitter.
pub struct SimulatedEstimator {
    rng: Mutex<StdRng>,
}

impl SimulatedEstimator {
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_entropy())
    }

    /// Reproducible sequence, for tests and demos.
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self { rng: Mutex::new(rng) }
    }
}

impl Default for SimulatedEstimator {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressEstimator for SimulatedEstimator {
    fn next_tick(&self, sample: &TickSample) -> Result<TickUpdate, EstimateError> {
        let mut rng = match self.rng.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };

        let progress = (sample.progress + band_increment(sample.progress)).clamp(0.0, 100.0);

        let (mut seeders, mut leechers) = (sample.seeders.max(1), sample.leechers);
        if rng.gen_bool(PEER_CHURN_PROBABILITY) {
            seeders = seeders.saturating_add_signed(rng.gen_range(-1..=2)).max(1);
            leechers = leechers.saturating_add_signed(rng.gen_range(-2..=3));
        }

        let ramp = (progress / RAMP_MIDPOINT).min(1.0);
        let jitter = 0.7 + rng.gen::<f64>() * 0.6;
        let download_speed = (BASE_SPEED * ramp * jitter) as u64;
        let upload_speed = (download_speed as f64 * 0.1 * rng.gen::<f64>()) as u64;

        let eta = if progress >= 100.0 || download_speed == 0 {
            0.0
        } else if progress > 1.0 {
            linear_eta(sample.elapsed, progress).unwrap_or(sample.eta)
        } else {
            sample.eta
        };

        Ok(TickUpdate {
            progress,
            seeders,
            leechers,
            download_speed,
            upload_speed,
            eta,
            total_size: None,
            downloaded_size: None,
        })
    }
}
