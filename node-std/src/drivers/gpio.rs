//! GPIO backends for the PIR input and the alert output.
//!
//! Three interchangeable backends, selected at configuration time:
//! - **Sysfs**: `/sys/class/gpio` export/direction/value files.
//! - **Chardev**: line handles requested from `/dev/gpiochipN` with the
//!   GPIO v1 ioctls.
//! - **Mem**: BCM283x/BCM2711 registers mapped from `/dev/gpiomem`
//!   (or `/dev/mem` at the board's GPIO base).

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::os::unix::io::{AsRawFd, FromRawFd};
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use memmap2::{MmapMut, MmapOptions};

use envnode::board;

use super::{AlertLine, MotionSensor};

#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum GpioBackend {
    Sysfs,
    Chardev,
    Mem,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Input,
    Output,
}

/// A single digital line.
pub trait DigitalPin: Send {
    fn read_level(&mut self) -> io::Result<bool>;
    fn write_level(&mut self, high: bool) -> io::Result<()>;
}

impl GpioBackend {
    pub fn open_pin(self, pin: u8, direction: Direction) -> io::Result<Box<dyn DigitalPin>> {
        match self {
            GpioBackend::Sysfs => Ok(Box::new(SysfsPin::open(
                Path::new(SYSFS_ROOT),
                pin,
                direction,
            )?)),
            GpioBackend::Chardev => Ok(Box::new(ChardevPin::open(
                board::GPIO_CHIP,
                pin,
                direction,
            )?)),
            GpioBackend::Mem => Ok(Box::new(MemPin::open(
                board::GPIO_MEM_DEVICE,
                board::GPIO_BASE,
                pin,
                direction,
            )?)),
        }
    }
}

// ── Sysfs backend ────────────────────────────────────────────────────

const SYSFS_ROOT: &str = "/sys/class/gpio";

/// udev may take a moment to fix permissions on a freshly exported line
const EXPORT_RETRIES: u32 = 20;
const EXPORT_RETRY_DELAY: Duration = Duration::from_millis(10);

pub struct SysfsPin {
    root: PathBuf,
    pin: u8,
    value: File,
    /// This handle wrote `export`, so it owns the unexport
    exported: bool,
}

impl SysfsPin {
    pub fn open(root: &Path, pin: u8, direction: Direction) -> io::Result<Self> {
        let pin_dir = root.join(format!("gpio{pin}"));
        let mut exported = false;
        if !pin_dir.exists() {
            // EBUSY means someone else exported it first
            match fs::write(root.join("export"), pin.to_string()) {
                Ok(()) => exported = true,
                Err(e) if e.raw_os_error() == Some(libc::EBUSY) => {}
                Err(e) => return Err(e),
            }
        }

        let dir_value = match direction {
            Direction::Input => "in",
            Direction::Output => "out",
        };
        let mut attempt = 0;
        loop {
            match fs::write(pin_dir.join("direction"), dir_value) {
                Ok(()) => break,
                Err(e) if attempt < EXPORT_RETRIES => {
                    log::trace!("gpio{pin}: direction not writable yet ({e})");
                    attempt += 1;
                    thread::sleep(EXPORT_RETRY_DELAY);
                }
                Err(e) => return Err(e),
            }
        }

        let value = OpenOptions::new()
            .read(true)
            .write(direction == Direction::Output)
            .open(pin_dir.join("value"))?;

        Ok(Self {
            root: root.to_path_buf(),
            pin,
            value,
            exported,
        })
    }
}

impl DigitalPin for SysfsPin {
    fn read_level(&mut self) -> io::Result<bool> {
        let mut buf = String::new();
        self.value.seek(SeekFrom::Start(0))?;
        self.value.read_to_string(&mut buf)?;
        Ok(buf.trim() == "1")
    }

    fn write_level(&mut self, high: bool) -> io::Result<()> {
        self.value.seek(SeekFrom::Start(0))?;
        self.value.write_all(if high { b"1" } else { b"0" })
    }
}

impl Drop for SysfsPin {
    fn drop(&mut self) {
        if !self.exported {
            return;
        }
        if let Err(e) = fs::write(self.root.join("unexport"), self.pin.to_string()) {
            log::debug!("gpio{}: unexport failed: {}", self.pin, e);
        }
    }
}

// ── Character-device backend ─────────────────────────────────────────

/// `linux/gpio.h` (v1 ABI) limits
const GPIOHANDLES_MAX: usize = 64;
const CONSUMER_LABEL_LEN: usize = 32;

const GPIOHANDLE_REQUEST_INPUT: u32 = 1 << 0;
const GPIOHANDLE_REQUEST_OUTPUT: u32 = 1 << 1;

const CONSUMER: &[u8] = b"envnode";

/// `struct gpiohandle_request`
#[repr(C)]
pub struct GpioHandleRequest {
    pub line_offsets: [u32; GPIOHANDLES_MAX],
    pub flags: u32,
    pub default_values: [u8; GPIOHANDLES_MAX],
    pub consumer_label: [u8; CONSUMER_LABEL_LEN],
    pub lines: u32,
    pub fd: libc::c_int,
}

/// `struct gpiohandle_data`
#[repr(C)]
pub struct GpioHandleData {
    pub values: [u8; GPIOHANDLES_MAX],
}

/// `_IOWR(0xB4, nr, size)`
const fn iowr(nr: u32, size: usize) -> u32 {
    const IOC_READ_WRITE: u32 = 3;
    (IOC_READ_WRITE << 30) | ((size as u32) << 16) | (0xB4 << 8) | nr
}

pub const GPIO_GET_LINEHANDLE_IOCTL: u32 = iowr(0x03, std::mem::size_of::<GpioHandleRequest>());
pub const GPIOHANDLE_GET_LINE_VALUES_IOCTL: u32 = iowr(0x08, std::mem::size_of::<GpioHandleData>());
pub const GPIOHANDLE_SET_LINE_VALUES_IOCTL: u32 = iowr(0x09, std::mem::size_of::<GpioHandleData>());

/// Single-line handle request for `offset`, outputs starting low.
pub fn line_request(offset: u8, direction: Direction) -> GpioHandleRequest {
    let mut req = GpioHandleRequest {
        line_offsets: [0; GPIOHANDLES_MAX],
        flags: match direction {
            Direction::Input => GPIOHANDLE_REQUEST_INPUT,
            Direction::Output => GPIOHANDLE_REQUEST_OUTPUT,
        },
        default_values: [0; GPIOHANDLES_MAX],
        consumer_label: [0; CONSUMER_LABEL_LEN],
        lines: 1,
        fd: -1,
    };
    req.line_offsets[0] = offset as u32;
    req.consumer_label[..CONSUMER.len()].copy_from_slice(CONSUMER);
    req
}

/// Line values for a single-line handle.
pub fn line_data(high: bool) -> GpioHandleData {
    let mut data = GpioHandleData {
        values: [0; GPIOHANDLES_MAX],
    };
    data.values[0] = high as u8;
    data
}

pub struct ChardevPin {
    /// Line handle returned by the chip; closing it releases the line
    handle: File,
}

impl ChardevPin {
    pub fn open(chip: &str, pin: u8, direction: Direction) -> io::Result<Self> {
        let chip = OpenOptions::new().read(true).write(true).open(chip)?;
        let mut req = line_request(pin, direction);
        // Safety: req is a live, correctly laid out gpiohandle_request the
        // kernel fills in place
        let rc = unsafe {
            libc::ioctl(
                chip.as_raw_fd(),
                GPIO_GET_LINEHANDLE_IOCTL as _,
                &mut req as *mut GpioHandleRequest,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        if req.fd < 0 {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                "gpiochip returned no line handle",
            ));
        }
        // Safety: on success the kernel hands over a new fd we now own
        let handle = unsafe { File::from_raw_fd(req.fd) };
        Ok(Self { handle })
    }
}

impl DigitalPin for ChardevPin {
    fn read_level(&mut self) -> io::Result<bool> {
        let mut data = line_data(false);
        // Safety: data outlives the call and matches gpiohandle_data
        let rc = unsafe {
            libc::ioctl(
                self.handle.as_raw_fd(),
                GPIOHANDLE_GET_LINE_VALUES_IOCTL as _,
                &mut data as *mut GpioHandleData,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(data.values[0] != 0)
    }

    fn write_level(&mut self, high: bool) -> io::Result<()> {
        let mut data = line_data(high);
        // Safety: see read_level
        let rc = unsafe {
            libc::ioctl(
                self.handle.as_raw_fd(),
                GPIOHANDLE_SET_LINE_VALUES_IOCTL as _,
                &mut data as *mut GpioHandleData,
            )
        };
        if rc < 0 {
            return Err(io::Error::last_os_error());
        }
        Ok(())
    }
}

// ── Memory-mapped backend ────────────────────────────────────────────

const BLOCK_SIZE: usize = 4 * 1024;

// Register word offsets
const GPFSEL0: usize = 0;
const GPSET0: usize = 7;
const GPCLR0: usize = 10;
const GPLEV0: usize = 13;

const FSEL_INPUT: u32 = 0b000;
const FSEL_OUTPUT: u32 = 0b001;

/// Function-select register index and updated word for `pin`.
pub fn fsel_update(current: u32, pin: u8, function: u32) -> (usize, u32) {
    let shift = (pin as u32 % 10) * 3;
    let word = (current & !(0b111 << shift)) | ((function & 0b111) << shift);
    (GPFSEL0 + pin as usize / 10, word)
}

/// Set/clear register index and bit mask driving `pin` to `high`.
pub fn output_write(pin: u8, high: bool) -> (usize, u32) {
    let bank = pin as usize / 32;
    let mask = 1u32 << (pin % 32);
    if high {
        (GPSET0 + bank, mask)
    } else {
        (GPCLR0 + bank, mask)
    }
}

/// Level register index and bit mask for `pin`.
pub fn level_bit(pin: u8) -> (usize, u32) {
    (GPLEV0 + pin as usize / 32, 1u32 << (pin % 32))
}

pub struct MemPin {
    map: MmapMut,
    pin: u8,
}

impl MemPin {
    /// `/dev/gpiomem` exposes the GPIO block at offset 0; `/dev/mem`
    /// needs the physical base address.
    pub fn open(device: &str, base: u64, pin: u8, direction: Direction) -> io::Result<Self> {
        let file = OpenOptions::new().read(true).write(true).open(device)?;
        let offset = if device.ends_with("gpiomem") { 0 } else { base };
        // Safety: the mapping is a device register window owned by this pin;
        // all accesses go through volatile reads/writes within BLOCK_SIZE
        let map = unsafe { MmapOptions::new().offset(offset).len(BLOCK_SIZE).map_mut(&file)? };

        let mut pin_handle = Self { map, pin };
        let function = match direction {
            Direction::Input => FSEL_INPUT,
            Direction::Output => FSEL_OUTPUT,
        };
        let (reg, _) = fsel_update(0, pin, function);
        let (_, word) = fsel_update(pin_handle.read_reg(reg), pin, function);
        pin_handle.write_reg(reg, word);
        Ok(pin_handle)
    }

    fn read_reg(&self, index: usize) -> u32 {
        let base = self.map.as_ptr() as *const u32;
        // Safety: index is a fixed register offset well inside BLOCK_SIZE
        unsafe { std::ptr::read_volatile(base.add(index)) }
    }

    fn write_reg(&mut self, index: usize, value: u32) {
        let base = self.map.as_mut_ptr() as *mut u32;
        // Safety: see read_reg
        unsafe { std::ptr::write_volatile(base.add(index), value) }
    }
}

impl DigitalPin for MemPin {
    fn read_level(&mut self) -> io::Result<bool> {
        let (reg, mask) = level_bit(self.pin);
        Ok(self.read_reg(reg) & mask != 0)
    }

    fn write_level(&mut self, high: bool) -> io::Result<()> {
        let (reg, mask) = output_write(self.pin, high);
        self.write_reg(reg, mask);
        Ok(())
    }
}

// ── Sensor / actuator adapters ───────────────────────────────────────

/// PIR sensor on a digital input.
pub struct PirSensor {
    pin: Box<dyn DigitalPin>,
}

impl PirSensor {
    pub fn open(backend: GpioBackend, pin: u8) -> io::Result<Self> {
        Ok(Self {
            pin: backend.open_pin(pin, Direction::Input)?,
        })
    }
}

impl MotionSensor for PirSensor {
    fn read_motion(&mut self) -> io::Result<bool> {
        self.pin.read_level()
    }
}

/// Alert output on a digital line. Starts low.
pub struct AlertPin {
    pin: Box<dyn DigitalPin>,
}

impl AlertPin {
    pub fn open(backend: GpioBackend, pin: u8) -> io::Result<Self> {
        let mut pin = backend.open_pin(pin, Direction::Output)?;
        pin.write_level(false)?;
        Ok(Self { pin })
    }

    #[cfg(test)]
    pub fn from_pin(pin: Box<dyn DigitalPin>) -> Self {
        Self { pin }
    }
}

impl AlertLine for AlertPin {
    fn write_alert(&mut self, high: bool) -> io::Result<()> {
        self.pin.write_level(high)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fake_sysfs(pin: u8, level: &str) -> tempfile::TempDir {
        let root = tempfile::tempdir().unwrap();
        let pin_dir = root.path().join(format!("gpio{pin}"));
        fs::create_dir(&pin_dir).unwrap();
        fs::write(pin_dir.join("direction"), "in").unwrap();
        fs::write(pin_dir.join("value"), level).unwrap();
        root
    }

    #[test]
    fn sysfs_input_reads_level() {
        let root = fake_sysfs(17, "1\n");
        let mut pin = SysfsPin::open(root.path(), 17, Direction::Input).unwrap();
        assert!(pin.read_level().unwrap());
        fs::write(root.path().join("gpio17/value"), "0\n").unwrap();
        assert!(!pin.read_level().unwrap());
    }

    #[test]
    fn sysfs_output_sets_direction_and_value() {
        let root = fake_sysfs(27, "0");
        let mut pin = SysfsPin::open(root.path(), 27, Direction::Output).unwrap();
        assert_eq!(
            fs::read_to_string(root.path().join("gpio27/direction")).unwrap(),
            "out"
        );
        pin.write_level(true).unwrap();
        assert_eq!(fs::read_to_string(root.path().join("gpio27/value")).unwrap(), "1");
        pin.write_level(false).unwrap();
        assert_eq!(fs::read_to_string(root.path().join("gpio27/value")).unwrap(), "0");
    }

    #[test]
    fn sysfs_leaves_preexported_line_exported() {
        let root = fake_sysfs(5, "0");
        drop(SysfsPin::open(root.path(), 5, Direction::Input).unwrap());
        assert!(!root.path().join("export").exists());
        assert!(!root.path().join("unexport").exists());
    }

    #[test]
    fn sysfs_unexports_line_it_exported() {
        let root = tempfile::tempdir().unwrap();
        let base = root.path().to_path_buf();
        // Stand in for the kernel: once "export" is written, the line
        // directory appears fully populated
        let kernel = std::thread::spawn(move || {
            for _ in 0..2000 {
                if base.join("export").exists() {
                    let staging = base.join(".gpio12");
                    fs::create_dir(&staging).unwrap();
                    fs::write(staging.join("direction"), "in").unwrap();
                    fs::write(staging.join("value"), "1").unwrap();
                    fs::rename(&staging, base.join("gpio12")).unwrap();
                    return;
                }
                std::thread::sleep(std::time::Duration::from_millis(1));
            }
        });

        let mut pin = SysfsPin::open(root.path(), 12, Direction::Input).unwrap();
        kernel.join().unwrap();
        assert_eq!(fs::read_to_string(root.path().join("export")).unwrap(), "12");
        assert!(pin.read_level().unwrap());
        drop(pin);
        assert_eq!(fs::read_to_string(root.path().join("unexport")).unwrap(), "12");
    }

    #[test]
    fn sysfs_missing_line_fails() {
        let root = tempfile::tempdir().unwrap();
        // export "succeeds" (plain file) but the line never appears
        assert!(SysfsPin::open(root.path(), 9, Direction::Input).is_err());
    }

    #[test]
    fn fsel_for_pin_27_and_17() {
        // GPIO27: GPFSEL2, bits 21..=23
        let (reg, word) = fsel_update(0xFFFF_FFFF, 27, FSEL_OUTPUT);
        assert_eq!(reg, 2);
        assert_eq!(word, (0xFFFF_FFFF & !(0b111 << 21)) | (0b001 << 21));
        // GPIO17: GPFSEL1, bits 21..=23, cleared for input
        let (reg, word) = fsel_update(0xFFFF_FFFF, 17, FSEL_INPUT);
        assert_eq!(reg, 1);
        assert_eq!(word, 0xFFFF_FFFF & !(0b111 << 21));
    }

    #[test]
    fn set_clear_and_level_registers() {
        assert_eq!(output_write(27, true), (GPSET0, 1 << 27));
        assert_eq!(output_write(27, false), (GPCLR0, 1 << 27));
        assert_eq!(output_write(40, true), (GPSET0 + 1, 1 << 8));
        assert_eq!(level_bit(17), (GPLEV0, 1 << 17));
    }

    #[test]
    fn chardev_ioctl_numbers_match_kernel_abi() {
        assert_eq!(std::mem::size_of::<GpioHandleRequest>(), 364);
        assert_eq!(std::mem::size_of::<GpioHandleData>(), 64);
        assert_eq!(GPIO_GET_LINEHANDLE_IOCTL, 0xC16C_B403);
        assert_eq!(GPIOHANDLE_GET_LINE_VALUES_IOCTL, 0xC040_B408);
        assert_eq!(GPIOHANDLE_SET_LINE_VALUES_IOCTL, 0xC040_B409);
    }

    #[test]
    fn chardev_request_names_one_line() {
        let req = line_request(27, Direction::Output);
        assert_eq!(req.lines, 1);
        assert_eq!(req.line_offsets[0], 27);
        assert!(req.line_offsets[1..].iter().all(|&o| o == 0));
        assert_eq!(req.flags, GPIOHANDLE_REQUEST_OUTPUT);
        assert!(req.default_values.iter().all(|&v| v == 0));
        assert_eq!(&req.consumer_label[..CONSUMER.len()], b"envnode");
        assert_eq!(req.consumer_label[CONSUMER.len()], 0);
        assert_eq!(req.fd, -1);

        assert_eq!(line_request(17, Direction::Input).flags, GPIOHANDLE_REQUEST_INPUT);
    }

    #[test]
    fn chardev_line_data_sets_first_value() {
        assert_eq!(line_data(true).values[0], 1);
        assert_eq!(line_data(false).values[0], 0);
        assert!(line_data(true).values[1..].iter().all(|&v| v == 0));
    }

    #[test]
    fn chardev_missing_chip_fails() {
        let root = tempfile::tempdir().unwrap();
        let chip = root.path().join("gpiochip9");
        assert!(ChardevPin::open(chip.to_str().unwrap(), 17, Direction::Input).is_err());
    }

    #[test]
    fn chardev_rejects_non_chip_device() {
        // A regular file opens but refuses the line-handle ioctl
        let root = tempfile::tempdir().unwrap();
        let chip = root.path().join("gpiochip0");
        fs::write(&chip, "").unwrap();
        assert!(ChardevPin::open(chip.to_str().unwrap(), 17, Direction::Input).is_err());
    }

    struct RecordingPin(std::sync::Arc<std::sync::Mutex<Vec<bool>>>);

    impl DigitalPin for RecordingPin {
        fn read_level(&mut self) -> io::Result<bool> {
            Ok(self.0.lock().unwrap().last().copied().unwrap_or(false))
        }

        fn write_level(&mut self, high: bool) -> io::Result<()> {
            self.0.lock().unwrap().push(high);
            Ok(())
        }
    }

    #[test]
    fn alert_pin_drives_line() {
        let log = std::sync::Arc::new(std::sync::Mutex::new(Vec::new()));
        let mut alert = AlertPin::from_pin(Box::new(RecordingPin(log.clone())));
        alert.write_alert(true).unwrap();
        alert.write_alert(false).unwrap();
        assert_eq!(*log.lock().unwrap(), vec![true, false]);
    }
}
