/// Process-wide environment state shared between periodic tasks.
///
/// Every field is its own atomic. A load always observes the latest store
/// to that field (`SeqCst` per field), but there is no cross-field
/// snapshot: a reader may combine this tick's motion with last tick's gas
/// reading. No consumer needs multi-field atomicity, so there is no lock.
///
/// Floats are stored as their IEEE-754 bit patterns in `AtomicU32`, which
/// round-trips every value (including NaN payloads) unchanged.
use core::sync::atomic::{AtomicBool, AtomicU32, Ordering};

/// Field selector for the generic [`SharedEnvironmentState::store`] /
/// [`SharedEnvironmentState::load`] accessors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Motion,
    GasPpm,
    Lux,
    BaselinePpm,
    BaselineLux,
}

/// A value carried by a [`Field`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FieldValue {
    Flag(bool),
    Level(f32),
}

impl Field {
    /// True for fields that hold a [`FieldValue::Flag`].
    pub const fn is_flag(self) -> bool {
        matches!(self, Field::Motion)
    }
}

impl FieldValue {
    /// True when this value has the kind `field` holds.
    pub const fn fits(self, field: Field) -> bool {
        match self {
            FieldValue::Flag(_) => field.is_flag(),
            FieldValue::Level(_) => !field.is_flag(),
        }
    }
}

#[derive(Debug, Default)]
pub struct SharedEnvironmentState {
    motion: AtomicBool,
    gas_ppm: AtomicF32,
    lux: AtomicF32,
    baseline_ppm: AtomicF32,
    baseline_lux: AtomicF32,
}

impl SharedEnvironmentState {
    /// All readings and baselines start at zero / no motion.
    pub const fn new() -> Self {
        Self {
            motion: AtomicBool::new(false),
            gas_ppm: AtomicF32::zero(),
            lux: AtomicF32::zero(),
            baseline_ppm: AtomicF32::zero(),
            baseline_lux: AtomicF32::zero(),
        }
    }

    /// Store into a field, unchanged. A value of the wrong kind (a flag
    /// into a level field or the reverse) is rejected and the field keeps
    /// its previous value. Returns whether the store happened.
    pub fn store(&self, field: Field, value: FieldValue) -> bool {
        match (field, value) {
            (Field::Motion, FieldValue::Flag(b)) => self.set_motion(b),
            (Field::GasPpm, FieldValue::Level(v)) => self.gas_ppm.store(v),
            (Field::Lux, FieldValue::Level(v)) => self.lux.store(v),
            (Field::BaselinePpm, FieldValue::Level(v)) => self.baseline_ppm.store(v),
            (Field::BaselineLux, FieldValue::Level(v)) => self.baseline_lux.store(v),
            _ => return false,
        }
        true
    }

    pub fn load(&self, field: Field) -> FieldValue {
        match field {
            Field::Motion => FieldValue::Flag(self.motion()),
            Field::GasPpm => FieldValue::Level(self.gas_ppm()),
            Field::Lux => FieldValue::Level(self.lux()),
            Field::BaselinePpm => FieldValue::Level(self.baseline_ppm()),
            Field::BaselineLux => FieldValue::Level(self.baseline_lux()),
        }
    }

    // ── Typed accessors ──────────────────────────────────────────────

    pub fn motion(&self) -> bool {
        self.motion.load(Ordering::SeqCst)
    }

    pub fn set_motion(&self, motion: bool) {
        self.motion.store(motion, Ordering::SeqCst);
    }

    pub fn gas_ppm(&self) -> f32 {
        self.gas_ppm.load()
    }

    pub fn set_gas_ppm(&self, ppm: f32) {
        self.gas_ppm.store(ppm);
    }

    pub fn lux(&self) -> f32 {
        self.lux.load()
    }

    pub fn set_lux(&self, lux: f32) {
        self.lux.store(lux);
    }

    pub fn baseline_ppm(&self) -> f32 {
        self.baseline_ppm.load()
    }

    pub fn baseline_lux(&self) -> f32 {
        self.baseline_lux.load()
    }

    /// Publish one set of sensor readings. Each field is stored
    /// independently; readers may see a mix of old and new values.
    pub fn publish(&self, reading: Reading) {
        self.set_motion(reading.motion);
        self.set_gas_ppm(reading.gas_ppm);
        self.set_lux(reading.lux);
    }

    /// Write calibrated baselines. Called once, before periodic sampling.
    pub fn set_baselines(&self, baseline_ppm: f32, baseline_lux: f32) {
        self.baseline_ppm.store(baseline_ppm);
        self.baseline_lux.store(baseline_lux);
    }

    /// True once calibration has published a usable gas baseline.
    pub fn has_baseline(&self) -> bool {
        self.baseline_ppm() > 0.0
    }

    /// Field-by-field copy of the current values (not an atomic snapshot).
    pub fn reading(&self) -> Reading {
        Reading {
            motion: self.motion(),
            gas_ppm: self.gas_ppm(),
            lux: self.lux(),
        }
    }
}

/// One set of sensor readings.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Reading {
    pub motion: bool,
    pub gas_ppm: f32,
    pub lux: f32,
}

/// `f32` stored as bits in an `AtomicU32`.
#[derive(Debug, Default)]
struct AtomicF32(AtomicU32);

impl AtomicF32 {
    const fn zero() -> Self {
        // 0.0f32 has an all-zero bit pattern
        Self(AtomicU32::new(0))
    }

    fn load(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::SeqCst))
    }

    fn store(&self, v: f32) {
        self.0.store(v.to_bits(), Ordering::SeqCst);
    }
}
