/// Hardware assignments for supported boards.
///
/// Each board module defines pin numbers, I2C buses and the peripheral
/// window selected at compile time via feature flags. Pin numbers are BCM
/// GPIO numbers, not header positions.

#[cfg(feature = "board-rpi4")]
mod hw {
    pub const PIR_PIN: u8 = 17;
    pub const ALERT_PIN: u8 = 27;
    pub const GAS_ADC_BUS: &str = "/dev/i2c-1";
    pub const GAS_ADC_ADDR: u16 = 0x48;
    pub const GAS_ADC_CHANNEL: u8 = 0;
    pub const LIGHT_BUS: &str = "/dev/i2c-3";
    pub const LIGHT_ADDR: u16 = 0x23;
    pub const GPIO_MEM_DEVICE: &str = "/dev/gpiomem";
    pub const GPIO_CHIP: &str = "/dev/gpiochip0";
    /// BCM2711 peripheral base + GPIO offset
    pub const GPIO_BASE: u64 = 0xFE20_0000;
    pub const BOARD_NAME: &str = "rpi4";
}

#[cfg(all(feature = "board-rpi3", not(feature = "board-rpi4")))]
mod hw {
    pub const PIR_PIN: u8 = 17;
    pub const ALERT_PIN: u8 = 27;
    pub const GAS_ADC_BUS: &str = "/dev/i2c-1";
    pub const GAS_ADC_ADDR: u16 = 0x48;
    pub const GAS_ADC_CHANNEL: u8 = 0;
    pub const LIGHT_BUS: &str = "/dev/i2c-1";
    pub const LIGHT_ADDR: u16 = 0x23;
    pub const GPIO_MEM_DEVICE: &str = "/dev/gpiomem";
    pub const GPIO_CHIP: &str = "/dev/gpiochip0";
    /// BCM2837 peripheral base + GPIO offset
    pub const GPIO_BASE: u64 = 0x3F20_0000;
    pub const BOARD_NAME: &str = "rpi3";
}

#[cfg(not(any(feature = "board-rpi4", feature = "board-rpi3")))]
mod hw {
    pub const PIR_PIN: u8 = 17;
    pub const ALERT_PIN: u8 = 27;
    pub const GAS_ADC_BUS: &str = "/dev/i2c-1";
    pub const GAS_ADC_ADDR: u16 = 0x48;
    pub const GAS_ADC_CHANNEL: u8 = 0;
    pub const LIGHT_BUS: &str = "/dev/i2c-1";
    pub const LIGHT_ADDR: u16 = 0x23;
    pub const GPIO_MEM_DEVICE: &str = "/dev/gpiomem";
    pub const GPIO_CHIP: &str = "/dev/gpiochip0";
    pub const GPIO_BASE: u64 = 0;
    pub const BOARD_NAME: &str = "unknown";
}

pub use hw::*;
