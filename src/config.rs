/// Runtime node configuration.
///
/// Starts from the compiled-in [`defaults`](crate::defaults) and can be
/// adjusted at startup (command line) without rebuilding.
use crate::defaults;
use crate::rules::CompoundRule;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NodeConfig {
    /// Multiplier applied to calibrated baselines (`K`)
    pub adaptive_factor: f32,
    /// Fixed gas threshold for the alert line and pre-calibration fallback
    pub gas_threshold_ppm: f32,
    /// Fixed light threshold for pre-calibration fallback
    pub lux_threshold: f32,
    /// Which gas/light combination counts as a compound alert
    pub compound_rule: CompoundRule,
    /// MQ-135 reference voltage in clean air
    pub clean_air_voltage: f32,
}

impl NodeConfig {
    pub const fn new() -> Self {
        Self {
            adaptive_factor: defaults::ADAPTIVE_FACTOR,
            gas_threshold_ppm: defaults::GAS_THRESHOLD_PPM,
            lux_threshold: defaults::LUX_THRESHOLD,
            compound_rule: CompoundRule::GasInDark,
            clean_air_voltage: defaults::CLEAN_AIR_VOLTAGE,
        }
    }
}

impl Default for NodeConfig {
    fn default() -> Self {
        Self::new()
    }
}
