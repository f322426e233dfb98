/// Gas-concentration estimation for an MQ-135 read through an ADC.
///
/// Coarse estimator, not a calibrated instrument. The three-branch result
/// (degenerate input, cleaner than reference, curve fit) is kept explicit
/// because the alert policy compares against the estimate directly.
use crate::defaults::{CURVE_CONSTANT, NOMINAL_CLEAN_PPM};

/// Outcome of a concentration estimate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum GasEstimate {
    /// Measured or reference voltage was non-positive. Reads as 0 ppm.
    Degenerate,
    /// Measured voltage above the clean-air reference. Reads as the
    /// nominal clean concentration.
    CleanerThanBaseline,
    /// Log-log curve fit of the voltage ratio.
    Curve(f32),
}

impl GasEstimate {
    /// Concentration in ppm for this estimate.
    pub fn ppm(&self) -> f32 {
        match *self {
            GasEstimate::Degenerate => 0.0,
            GasEstimate::CleanerThanBaseline => NOMINAL_CLEAN_PPM,
            GasEstimate::Curve(ppm) => ppm,
        }
    }

    /// True when the estimate came from invalid input.
    pub fn is_degenerate(&self) -> bool {
        matches!(self, GasEstimate::Degenerate)
    }
}

/// Estimate concentration from a measured voltage and the clean-air
/// reference voltage.
///
/// `ppm = 10^(-log10(voltage / reference) + c)`, monotonically
/// non-increasing in `voltage` for a fixed reference.
pub fn estimate_ppm(voltage: f32, reference: f32) -> GasEstimate {
    // Negated comparisons so NaN inputs also land here
    if !(voltage > 0.0) || !(reference > 0.0) {
        return GasEstimate::Degenerate;
    }

    let ratio = voltage / reference;
    if ratio > 1.0 {
        return GasEstimate::CleanerThanBaseline;
    }

    GasEstimate::Curve(libm::powf(10.0, -libm::log10f(ratio) + CURVE_CONSTANT))
}

/// Convert a signed 16-bit ADC conversion to volts for the given
/// full-scale range.
pub fn voltage_from_raw(raw: i16, full_scale: f32) -> f32 {
    raw as f32 * full_scale / 32768.0
}
