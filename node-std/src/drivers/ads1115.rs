//! ADS1115 16-bit ADC, single-shot conversions.

use std::io;
use std::thread;
use std::time::Duration;

use envnode::defaults::ADC_FULL_SCALE_V;

use super::i2c::I2cDevice;
use super::GasAdc;

const REG_CONVERSION: u8 = 0x00;
const REG_CONFIG: u8 = 0x01;

// Config register fields
const OS_SINGLE: u16 = 1 << 15;
const PGA_4_096V: u16 = 0b001 << 9;
const MODE_SINGLE_SHOT: u16 = 1 << 8;
const DR_128_SPS: u16 = 0b100 << 5;
const COMP_DISABLE: u16 = 0b11;

/// 1/128 s plus margin
const CONVERSION_TIME: Duration = Duration::from_millis(9);

pub struct Ads1115 {
    dev: I2cDevice,
}

impl Ads1115 {
    /// Open the device and read back its config register.
    pub fn open(bus: &str, addr: u16) -> io::Result<Self> {
        let mut dev = I2cDevice::open(bus, addr)?;
        let mut config = [0u8; 2];
        dev.write_read(&[REG_CONFIG], &mut config)?;
        log::debug!(
            "ADS1115 at {:#04x}: config {:#06x}",
            dev.addr(),
            u16::from_be_bytes(config)
        );
        Ok(Self { dev })
    }
}

/// Config word starting a single-ended single-shot conversion on `channel`.
pub fn config_word(channel: u8) -> u16 {
    let mux = (0b100 | (channel as u16 & 0b11)) << 12;
    OS_SINGLE | mux | PGA_4_096V | MODE_SINGLE_SHOT | DR_128_SPS | COMP_DISABLE
}

impl GasAdc for Ads1115 {
    fn read_raw(&mut self, channel: u8) -> io::Result<i16> {
        if channel > 3 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "ADS1115 has channels 0..=3",
            ));
        }
        let [hi, lo] = config_word(channel).to_be_bytes();
        self.dev.write(&[REG_CONFIG, hi, lo])?;
        thread::sleep(CONVERSION_TIME);

        let mut buf = [0u8; 2];
        self.dev.write_read(&[REG_CONVERSION], &mut buf)?;
        Ok(i16::from_be_bytes(buf))
    }

    fn full_scale(&self) -> f32 {
        ADC_FULL_SCALE_V
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_word_for_each_channel() {
        assert_eq!(config_word(0), 0xC383);
        assert_eq!(config_word(1), 0xD383);
        assert_eq!(config_word(2), 0xE383);
        assert_eq!(config_word(3), 0xF383);
    }
}
