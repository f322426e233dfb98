/// One-time baseline calibration.
///
/// The sampler feeds every reading taken during the calibration window
/// into a [`Calibrator`], then folds the [`CalibrationResult`] into the
/// shared state and drops it.
use crate::state::{Reading, SharedEnvironmentState};

/// Baselines established by a calibration window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrationResult {
    pub baseline_ppm: f32,
    pub baseline_lux: f32,
    /// Fraction of samples with motion detected, 0.0..=1.0
    pub motion_ratio: f32,
    pub samples: u32,
}

impl CalibrationResult {
    /// Publish the baselines. The motion ratio is diagnostic only.
    pub fn apply(&self, state: &SharedEnvironmentState) {
        log::debug!(
            "Baselines from {} samples: {} ppm, {} lux",
            self.samples,
            self.baseline_ppm,
            self.baseline_lux
        );
        state.set_baselines(self.baseline_ppm, self.baseline_lux);
    }
}

/// Running accumulator of arithmetic means and motion count.
#[derive(Debug, Default, Clone)]
pub struct Calibrator {
    total_ppm: f64,
    total_lux: f64,
    motion_count: u32,
    samples: u32,
}

impl Calibrator {
    pub const fn new() -> Self {
        Self {
            total_ppm: 0.0,
            total_lux: 0.0,
            motion_count: 0,
            samples: 0,
        }
    }

    pub fn push(&mut self, reading: Reading) {
        self.total_ppm += reading.gas_ppm as f64;
        self.total_lux += reading.lux as f64;
        if reading.motion {
            self.motion_count += 1;
        }
        self.samples += 1;
    }

    pub fn samples(&self) -> u32 {
        self.samples
    }

    /// Means over all pushed samples, or `None` if nothing was sampled.
    pub fn finish(&self) -> Option<CalibrationResult> {
        if self.samples == 0 {
            return None;
        }
        let n = self.samples as f64;
        Some(CalibrationResult {
            baseline_ppm: (self.total_ppm / n) as f32,
            baseline_lux: (self.total_lux / n) as f32,
            motion_ratio: (self.motion_count as f64 / n) as f32,
            samples: self.samples,
        })
    }
}
