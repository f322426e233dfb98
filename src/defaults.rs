/// Compiled-in defaults for the sampling and alerting core.
///
/// Task cadence, priorities, threshold policy and calibration window.
/// Runtime-adjustable values start from these through
/// [`NodeConfig::new`](crate::config::NodeConfig::new).

// ── Task schedule (period, SCHED_FIFO priority) ──────────────────────

pub const SAMPLER_PERIOD_MS: u64 = 500;
pub const SAMPLER_PRIORITY: u8 = 80;

pub const MONITOR_PERIOD_MS: u64 = 1000;
pub const MONITOR_PRIORITY: u8 = 70;

pub const CONTROL_PERIOD_MS: u64 = 500;
pub const CONTROL_PRIORITY: u8 = 60;

pub const TELEMETRY_PERIOD_MS: u64 = 2000;
pub const TELEMETRY_PRIORITY: u8 = 50;

// ── Threshold policy ─────────────────────────────────────────────────

/// Adaptive threshold multiplier applied to calibrated baselines
pub const ADAPTIVE_FACTOR: f32 = 1.15;

/// Fixed gas threshold (ppm) used by the alert line and as fallback
pub const GAS_THRESHOLD_PPM: f32 = 500.0;

/// Fixed light threshold (lux) used as fallback
pub const LUX_THRESHOLD: f32 = 30.0;

// ── Gas sensor (MQ-135 on ADS1115) ───────────────────────────────────

/// Sensor output voltage measured in clean air
pub const CLEAN_AIR_VOLTAGE: f32 = 0.46;

/// Reported concentration when air is cleaner than the reference
pub const NOMINAL_CLEAN_PPM: f32 = 400.0;

/// Empirical offset of the log-log curve fit
pub const CURVE_CONSTANT: f32 = 1.5;

/// ADC full-scale voltage for the configured PGA (±4.096 V)
pub const ADC_FULL_SCALE_V: f32 = 4.096;

// ── Calibration window ───────────────────────────────────────────────

pub const CALIBRATION_WINDOW_MS: u64 = 7200;
pub const CALIBRATION_INTERVAL_MS: u64 = 100;

/// Number of samples taken during calibration (72 with the defaults)
pub const CALIBRATION_SAMPLES: u32 = (CALIBRATION_WINDOW_MS / CALIBRATION_INTERVAL_MS) as u32;

// ── Telemetry ────────────────────────────────────────────────────────

pub const TELEMETRY_DEST_IP: [u8; 4] = [192, 168, 1, 100];
pub const TELEMETRY_DEST_PORT: u16 = 5005;

// ── Diagnostics ──────────────────────────────────────────────────────

/// Sampler prints its execution-time summary every N ticks
pub const STATS_REPORT_EVERY: u64 = 10;

/// Smoothing factor for the monitor's running execution-time estimate
pub const EWMA_ALPHA: f64 = 0.125;
