//! Linux userspace I2C (`/dev/i2c-N`) with the `I2C_SLAVE` ioctl.

use std::fs::{File, OpenOptions};
use std::io::{self, Read, Write};
use std::os::unix::io::AsRawFd;

/// `linux/i2c-dev.h`: select the target address for plain read/write
const I2C_SLAVE: libc::c_ulong = 0x0703;

/// One device on an I2C bus.
#[derive(Debug)]
pub struct I2cDevice {
    file: File,
    addr: u16,
}

impl I2cDevice {
    pub fn open(bus: &str, addr: u16) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(bus)?;
        // Safety: fd is open for the duration of the call; I2C_SLAVE takes
        // the address by value
        let rc = unsafe { libc::ioctl(file.as_raw_fd(), I2C_SLAVE as _, addr as libc::c_ulong) };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(Self { file, addr })
    }

    pub fn addr(&self) -> u16 {
        self.addr
    }

    pub fn write(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.file.write_all(bytes)
    }

    pub fn read(&mut self, buf: &mut [u8]) -> io::Result<()> {
        self.file.read_exact(buf)
    }

    /// Select a register, then read from it.
    pub fn write_read(&mut self, reg: &[u8], buf: &mut [u8]) -> io::Result<()> {
        self.write(reg)?;
        self.read(buf)
    }
}
