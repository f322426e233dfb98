//! Sensor sampling task.
//!
//! Opens the sensors, runs the one-time baseline calibration, then
//! publishes a fresh [`Reading`] into the shared state every tick while
//! keeping execution-time statistics for diagnostics.

use std::sync::Arc;
use std::time::{Duration, Instant};

use envnode::board;
use envnode::calibration::Calibrator;
use envnode::config::NodeConfig;
use envnode::defaults::{CALIBRATION_INTERVAL_MS, CALIBRATION_SAMPLES, STATS_REPORT_EVERY};
use envnode::gas::{estimate_ppm, voltage_from_raw};
use envnode::state::{Reading, SharedEnvironmentState};
use envnode::stats::ExecStats;

use crate::drivers::SensorSet;
use crate::error::{NodeError, Result};
use crate::periodic::{PeriodicBody, StopSignal};

const NAME: &str = "sampler";

pub struct SamplerTask<F> {
    open: Option<F>,
    sensors: Option<SensorSet>,
    state: Arc<SharedEnvironmentState>,
    config: NodeConfig,
    calibration_samples: u32,
    calibration_interval: Duration,
    stats: ExecStats,
}

impl<F> SamplerTask<F>
where
    F: FnOnce() -> Result<SensorSet> + Send + 'static,
{
    /// `open` runs on the task's own thread during initialization.
    pub fn new(open: F, state: Arc<SharedEnvironmentState>, config: NodeConfig) -> Self {
        Self {
            open: Some(open),
            sensors: None,
            state,
            config,
            calibration_samples: CALIBRATION_SAMPLES,
            calibration_interval: Duration::from_millis(CALIBRATION_INTERVAL_MS),
            stats: ExecStats::new(),
        }
    }

    #[cfg(test)]
    pub fn with_calibration(mut self, samples: u32, interval: Duration) -> Self {
        self.calibration_samples = samples;
        self.calibration_interval = interval;
        self
    }

    fn calibrate(&mut self, stop: &StopSignal) -> Result<()> {
        log::info!(
            "{NAME}: calibrating baselines over {} samples",
            self.calibration_samples
        );
        let mut calibrator = Calibrator::new();
        // Each sample follows a full interval so the light sensor has
        // finished its first conversion before the first read
        for _ in 0..self.calibration_samples {
            if stop.wait_for(self.calibration_interval) {
                return Err(NodeError::Interrupted(NAME));
            }
            if let Some(reading) = self.sample() {
                calibrator.push(reading);
            }
        }

        match calibrator.finish() {
            Some(result) => {
                log::info!(
                    "{NAME}: baseline gas {:.2} ppm, lux {:.2}, motion ratio {:.2}",
                    result.baseline_ppm,
                    result.baseline_lux,
                    result.motion_ratio
                );
                result.apply(&self.state);
            }
            None => log::warn!("{NAME}: no calibration samples; using fixed thresholds"),
        }
        Ok(())
    }

    /// Read every sensor once. Read faults degrade to `false` / `0.0`.
    fn sample(&mut self) -> Option<Reading> {
        let sensors = self.sensors.as_mut()?;

        let motion = sensors.motion.read_motion().unwrap_or_else(|e| {
            log::warn!("{}", NodeError::sensor("pir", e));
            false
        });

        let gas_ppm = match sensors.gas.read_raw(board::GAS_ADC_CHANNEL) {
            Ok(raw) => {
                let voltage = voltage_from_raw(raw, sensors.gas.full_scale());
                let estimate = estimate_ppm(voltage, self.config.clean_air_voltage);
                if estimate.is_degenerate() {
                    log::warn!("{NAME}: degenerate gas reading ({voltage:.3} V)");
                }
                estimate.ppm()
            }
            Err(e) => {
                log::warn!("{}", NodeError::sensor("ads1115", e));
                0.0
            }
        };

        let lux = sensors.light.read_lux().unwrap_or_else(|e| {
            log::warn!("{}", NodeError::sensor("bh1750", e));
            0.0
        });

        Some(Reading {
            motion,
            gas_ppm,
            lux,
        })
    }

    #[cfg(test)]
    pub fn stats(&self) -> &ExecStats {
        &self.stats
    }
}

impl<F> PeriodicBody for SamplerTask<F>
where
    F: FnOnce() -> Result<SensorSet> + Send + 'static,
{
    fn init(&mut self, stop: &StopSignal) -> Result<()> {
        if let Some(open) = self.open.take() {
            self.sensors = Some(open()?);
        }
        self.calibrate(stop)
    }

    fn run(&mut self) {
        let started = Instant::now();
        let Some(reading) = self.sample() else {
            return;
        };
        self.state.publish(reading);
        self.stats.record(started.elapsed().as_secs_f64() * 1000.0);

        log::debug!(
            "{NAME}: motion={} gas={:.1} ppm lux={:.1}",
            reading.motion,
            reading.gas_ppm,
            reading.lux
        );
        if self.stats.count() % STATS_REPORT_EVERY == 0 {
            if let Some(summary) = self.stats.summary() {
                log::info!("{NAME} WCET: {summary}");
            }
        }
    }

    fn finish(&mut self) {
        if let Some(summary) = self.stats.summary() {
            log::info!("{NAME} final WCET: {summary}");
        }
        self.sensors = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drivers::{GasAdc, LightSensor, MotionSensor};
    use std::io;

    struct FixedMotion(bool);

    impl MotionSensor for FixedMotion {
        fn read_motion(&mut self) -> io::Result<bool> {
            Ok(self.0)
        }
    }

    /// Reads above the clean-air voltage, i.e. the nominal 400 ppm.
    struct CleanAirAdc;

    impl GasAdc for CleanAirAdc {
        fn read_raw(&mut self, _channel: u8) -> io::Result<i16> {
            Ok(16_384)
        }

        fn full_scale(&self) -> f32 {
            4.096
        }
    }

    struct FixedLight(f32);

    impl LightSensor for FixedLight {
        fn read_lux(&mut self) -> io::Result<f32> {
            Ok(self.0)
        }
    }

    struct Broken;

    impl MotionSensor for Broken {
        fn read_motion(&mut self) -> io::Result<bool> {
            Err(io::Error::new(io::ErrorKind::TimedOut, "no ack"))
        }
    }

    impl GasAdc for Broken {
        fn read_raw(&mut self, _channel: u8) -> io::Result<i16> {
            Err(io::Error::new(io::ErrorKind::TimedOut, "no ack"))
        }

        fn full_scale(&self) -> f32 {
            4.096
        }
    }

    impl LightSensor for Broken {
        fn read_lux(&mut self) -> io::Result<f32> {
            Err(io::Error::new(io::ErrorKind::TimedOut, "no ack"))
        }
    }

    fn steady() -> Result<SensorSet> {
        Ok(SensorSet {
            motion: Box::new(FixedMotion(false)),
            gas: Box::new(CleanAirAdc),
            light: Box::new(FixedLight(50.0)),
        })
    }

    fn broken() -> Result<SensorSet> {
        Ok(SensorSet {
            motion: Box::new(Broken),
            gas: Box::new(Broken),
            light: Box::new(Broken),
        })
    }

    fn fast<F>(task: SamplerTask<F>) -> SamplerTask<F>
    where
        F: FnOnce() -> Result<SensorSet> + Send + 'static,
    {
        task.with_calibration(8, Duration::from_millis(1))
    }

    #[test]
    fn calibration_publishes_baselines() {
        let state = Arc::new(SharedEnvironmentState::new());
        let mut task = fast(SamplerTask::new(steady, state.clone(), NodeConfig::new()));
        task.init(&StopSignal::new()).unwrap();
        assert_eq!(state.baseline_ppm(), 400.0);
        assert_eq!(state.baseline_lux(), 50.0);
        assert!(state.has_baseline());
    }

    #[test]
    fn tick_publishes_reading_and_records_stats() {
        let state = Arc::new(SharedEnvironmentState::new());
        let mut task = fast(SamplerTask::new(steady, state.clone(), NodeConfig::new()));
        task.init(&StopSignal::new()).unwrap();
        for _ in 0..3 {
            task.run();
        }
        assert_eq!(
            state.reading(),
            Reading {
                motion: false,
                gas_ppm: 400.0,
                lux: 50.0
            }
        );
        assert_eq!(task.stats().count(), 3);
        let summary = task.stats().summary().unwrap();
        assert!(summary.min_ms <= summary.max_ms);
    }

    #[test]
    fn driver_failure_aborts_init() {
        let state = Arc::new(SharedEnvironmentState::new());
        let open = || -> Result<SensorSet> {
            Err(NodeError::init(
                "ads1115",
                io::Error::new(io::ErrorKind::NotFound, "no bus"),
            ))
        };
        let mut task = fast(SamplerTask::new(open, state.clone(), NodeConfig::new()));
        let err = task.init(&StopSignal::new()).unwrap_err();
        assert!(err.is_fatal());
        assert!(!state.has_baseline());
    }

    #[test]
    fn read_faults_publish_degenerate_values() {
        let state = Arc::new(SharedEnvironmentState::new());
        state.set_gas_ppm(123.0);
        state.set_lux(45.0);
        let mut task = fast(SamplerTask::new(broken, state.clone(), NodeConfig::new()));
        task.init(&StopSignal::new()).unwrap();
        task.run();
        assert_eq!(state.reading(), Reading::default());
        assert_eq!(task.stats().count(), 1);
        // Every calibration sample was degenerate
        assert!(!state.has_baseline());
    }

    /// Light sensor that records when it was read.
    struct TimedLight(Arc<std::sync::Mutex<Vec<Instant>>>);

    impl LightSensor for TimedLight {
        fn read_lux(&mut self) -> io::Result<f32> {
            self.0.lock().unwrap().push(Instant::now());
            Ok(50.0)
        }
    }

    #[test]
    fn first_calibration_read_waits_one_interval() {
        let reads = Arc::new(std::sync::Mutex::new(Vec::new()));
        let light = reads.clone();
        let open = move || -> Result<SensorSet> {
            Ok(SensorSet {
                motion: Box::new(FixedMotion(false)),
                gas: Box::new(CleanAirAdc),
                light: Box::new(TimedLight(light)),
            })
        };
        let interval = Duration::from_millis(40);
        let state = Arc::new(SharedEnvironmentState::new());
        let mut task = SamplerTask::new(open, state.clone(), NodeConfig::new())
            .with_calibration(2, interval);

        let started = Instant::now();
        task.init(&StopSignal::new()).unwrap();

        let reads = reads.lock().unwrap();
        assert_eq!(reads.len(), 2);
        assert!(reads[0].duration_since(started) >= interval);
        assert!(reads[1].duration_since(reads[0]) >= interval);
        assert_eq!(state.baseline_lux(), 50.0);
    }

    #[test]
    fn stop_interrupts_calibration() {
        let state = Arc::new(SharedEnvironmentState::new());
        let mut task = SamplerTask::new(steady, state.clone(), NodeConfig::new())
            .with_calibration(1000, Duration::from_secs(1));
        let stop = StopSignal::new();
        stop.request();
        let err = task.init(&stop).unwrap_err();
        assert!(matches!(err, NodeError::Interrupted(_)));
        assert!(!state.has_baseline());
    }
}
