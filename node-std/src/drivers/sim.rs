//! Simulated sensors and alert line for running on a development host.
//!
//! Every stand-in is deterministic: its output depends only on how many
//! times it has been read, so a simulated run replays identically.

use std::io;

use envnode::defaults::{ADC_FULL_SCALE_V, CLEAN_AIR_VOLTAGE};

use super::{AlertLine, GasAdc, LightSensor, MotionSensor, SensorSet};

/// Motion in bursts: `on` reads high out of every `cycle`.
pub struct SimMotion {
    reads: u32,
    cycle: u32,
    on: u32,
}

impl SimMotion {
    pub const fn new(cycle: u32, on: u32) -> Self {
        Self { reads: 0, cycle, on }
    }
}

impl MotionSensor for SimMotion {
    fn read_motion(&mut self) -> io::Result<bool> {
        let phase = self.reads % self.cycle.max(1);
        self.reads = self.reads.wrapping_add(1);
        Ok(phase >= self.cycle.saturating_sub(self.on))
    }
}

/// Gas sensor output hovering just below clean air, with a periodic
/// pollution episode that pulls the voltage far down.
pub struct SimGasAdc {
    reads: u32,
}

/// Reads per gas cycle
const GAS_CYCLE: u32 = 120;
/// Reads at the end of each cycle spent in the pollution episode
const GAS_EPISODE: u32 = 12;
/// Output voltage during an episode (ratio ~0.04, ~700 ppm)
const EPISODE_VOLTAGE: f32 = 0.02;

impl SimGasAdc {
    pub const fn new() -> Self {
        Self { reads: 0 }
    }

    fn voltage(phase: u32) -> f32 {
        if phase >= GAS_CYCLE - GAS_EPISODE {
            return EPISODE_VOLTAGE;
        }
        // Triangle wave between 90% and 100% of the clean-air voltage
        let half = (GAS_CYCLE - GAS_EPISODE) / 2;
        let rise = if phase < half { phase } else { 2 * half - phase };
        CLEAN_AIR_VOLTAGE * (0.9 + 0.1 * rise as f32 / half as f32)
    }
}

impl Default for SimGasAdc {
    fn default() -> Self {
        Self::new()
    }
}

impl GasAdc for SimGasAdc {
    fn read_raw(&mut self, _channel: u8) -> io::Result<i16> {
        let v = Self::voltage(self.reads % GAS_CYCLE);
        self.reads = self.reads.wrapping_add(1);
        Ok((v / ADC_FULL_SCALE_V * 32768.0) as i16)
    }

    fn full_scale(&self) -> f32 {
        ADC_FULL_SCALE_V
    }
}

/// Light level sweeping between dusk and daylight.
pub struct SimLight {
    reads: u32,
}

const LUX_CYCLE: u32 = 200;
const LUX_MIN: f32 = 5.0;
const LUX_MAX: f32 = 400.0;

impl SimLight {
    pub const fn new() -> Self {
        Self { reads: 0 }
    }
}

impl Default for SimLight {
    fn default() -> Self {
        Self::new()
    }
}

impl LightSensor for SimLight {
    fn read_lux(&mut self) -> io::Result<f32> {
        let phase = self.reads % LUX_CYCLE;
        self.reads = self.reads.wrapping_add(1);
        let half = LUX_CYCLE / 2;
        let rise = if phase < half { phase } else { LUX_CYCLE - phase };
        Ok(LUX_MIN + (LUX_MAX - LUX_MIN) * rise as f32 / half as f32)
    }
}

/// The full simulated sensor complement.
pub fn sensor_set() -> SensorSet {
    SensorSet {
        motion: Box::new(SimMotion::new(20, 4)),
        gas: Box::new(SimGasAdc::new()),
        light: Box::new(SimLight::new()),
    }
}

/// Alert line that only logs level changes.
#[derive(Debug, Default)]
pub struct SimAlertLine {
    level: bool,
}

impl SimAlertLine {
    pub const fn new() -> Self {
        Self { level: false }
    }

    #[cfg(test)]
    pub fn level(&self) -> bool {
        self.level
    }
}

impl AlertLine for SimAlertLine {
    fn write_alert(&mut self, high: bool) -> io::Result<()> {
        if high != self.level {
            log::info!("[sim] alert line {}", if high { "HIGH" } else { "LOW" });
        }
        self.level = high;
        Ok(())
    }
}
