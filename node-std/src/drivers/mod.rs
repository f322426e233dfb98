//! Sensor and actuator capabilities.
//!
//! Tasks only see these traits. Linux backends live in [`gpio`], [`i2c`],
//! [`ads1115`] and [`bh1750`]; [`sim`] provides stand-ins for running on a
//! development host. All calls are synchronous with bounded latency.

pub mod ads1115;
pub mod bh1750;
pub mod gpio;
pub mod i2c;
pub mod sim;

use std::io;

use envnode::board;

use crate::error::{NodeError, Result};
use gpio::{AlertPin, GpioBackend, PirSensor};

/// PIR motion input.
pub trait MotionSensor: Send {
    fn read_motion(&mut self) -> io::Result<bool>;
}

/// Single-ended ADC carrying the gas sensor output.
pub trait GasAdc: Send {
    fn read_raw(&mut self, channel: u8) -> io::Result<i16>;

    /// Full-scale voltage of a conversion, for `voltage_from_raw`.
    fn full_scale(&self) -> f32;
}

/// Ambient light sensor.
pub trait LightSensor: Send {
    fn read_lux(&mut self) -> io::Result<f32>;
}

/// Binary alert output. `true` drives the line high (alert engaged).
pub trait AlertLine: Send {
    fn write_alert(&mut self, high: bool) -> io::Result<()>;
}

/// Every sensor the sampler reads, opened together.
pub struct SensorSet {
    pub motion: Box<dyn MotionSensor>,
    pub gas: Box<dyn GasAdc>,
    pub light: Box<dyn LightSensor>,
}

// ── Hardware wiring ──────────────────────────────────────────────────

/// Open the board's PIR input, gas ADC and light sensor.
pub fn open_sensors(backend: GpioBackend) -> Result<SensorSet> {
    let motion = PirSensor::open(backend, board::PIR_PIN).map_err(|e| NodeError::init("pir", e))?;
    let gas = ads1115::Ads1115::open(board::GAS_ADC_BUS, board::GAS_ADC_ADDR)
        .map_err(|e| NodeError::init("ads1115", e))?;
    let light = bh1750::Bh1750::open(board::LIGHT_BUS, board::LIGHT_ADDR)
        .map_err(|e| NodeError::init("bh1750", e))?;
    log::info!(
        "{}: sensors ready (PIR gpio{}, ADS1115 {}@{:#04x}, BH1750 {}@{:#04x})",
        board::BOARD_NAME,
        board::PIR_PIN,
        board::GAS_ADC_BUS,
        board::GAS_ADC_ADDR,
        board::LIGHT_BUS,
        board::LIGHT_ADDR
    );
    Ok(SensorSet {
        motion: Box::new(motion),
        gas: Box::new(gas),
        light: Box::new(light),
    })
}

/// Open the board's alert output, driven low.
pub fn open_alert_line(backend: GpioBackend) -> Result<Box<dyn AlertLine>> {
    let pin = AlertPin::open(backend, board::ALERT_PIN).map_err(|e| NodeError::init("alert", e))?;
    Ok(Box::new(pin))
}
