//! BH1750 ambient light sensor, continuous high-resolution mode.

use std::io;

use super::i2c::I2cDevice;
use super::LightSensor;

const POWER_ON: u8 = 0x01;
const CONTINUOUS_H_RES: u8 = 0x10;

pub struct Bh1750 {
    dev: I2cDevice,
}

impl Bh1750 {
    pub fn open(bus: &str, addr: u16) -> io::Result<Self> {
        let mut dev = I2cDevice::open(bus, addr)?;
        dev.write(&[POWER_ON])?;
        dev.write(&[CONTINUOUS_H_RES])?;
        Ok(Self { dev })
    }
}

/// Measurement counts to lux (datasheet accuracy factor 1.2).
pub fn raw_to_lux(raw: u16) -> f32 {
    raw as f32 / 1.2
}

impl LightSensor for Bh1750 {
    fn read_lux(&mut self) -> io::Result<f32> {
        let mut buf = [0u8; 2];
        self.dev.read(&mut buf)?;
        Ok(raw_to_lux(u16::from_be_bytes(buf)))
    }
}
