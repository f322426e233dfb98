//! envnode: Linux userspace environmental monitoring node
//!
//! Four fixed-priority periodic tasks share one lock-free state object:
//! the sampler publishes readings, the monitor classifies them, the
//! control task drives the alert line and the telemetry task exports a
//! datagram per tick. SIGINT/SIGTERM, or the optional runtime limit,
//! stops every task and leaves the alert line low.

mod control;
mod drivers;
mod error;
mod monitor;
mod periodic;
mod sampler;
mod telemetry;

use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};

use envnode::board;
use envnode::config::NodeConfig;
use envnode::defaults::{
    CONTROL_PERIOD_MS, CONTROL_PRIORITY, MONITOR_PERIOD_MS, MONITOR_PRIORITY, SAMPLER_PERIOD_MS,
    SAMPLER_PRIORITY, TELEMETRY_DEST_IP, TELEMETRY_DEST_PORT, TELEMETRY_PERIOD_MS,
    TELEMETRY_PRIORITY,
};
use envnode::protocol::VERSION;
use envnode::rules::CompoundRule;
use envnode::state::SharedEnvironmentState;

use control::ControlTask;
use drivers::gpio::GpioBackend;
use drivers::{sim, AlertLine, SensorSet};
use monitor::MonitorTask;
use periodic::{PeriodicBody, PeriodicTask, TaskSpec};
use sampler::SamplerTask;
use telemetry::TelemetryTask;

// ── Task table ───────────────────────────────────────────────────────

const SAMPLER: TaskSpec = TaskSpec::new("sampler", SAMPLER_PERIOD_MS, SAMPLER_PRIORITY);
const MONITOR: TaskSpec = TaskSpec::new("monitor", MONITOR_PERIOD_MS, MONITOR_PRIORITY);
const CONTROL: TaskSpec = TaskSpec::new("control", CONTROL_PERIOD_MS, CONTROL_PRIORITY);
const TELEMETRY: TaskSpec = TaskSpec::new("telemetry", TELEMETRY_PERIOD_MS, TELEMETRY_PRIORITY);

type SensorOpener = Box<dyn FnOnce() -> error::Result<SensorSet> + Send>;
type AlertOpener = Box<dyn FnOnce() -> error::Result<Box<dyn AlertLine>> + Send>;

// ── Command line ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum CompoundArg {
    /// High gas while light is low
    Dark,
    /// High gas while light is high
    Bright,
}

impl From<CompoundArg> for CompoundRule {
    fn from(arg: CompoundArg) -> Self {
        match arg {
            CompoundArg::Dark => CompoundRule::GasInDark,
            CompoundArg::Bright => CompoundRule::GasInBright,
        }
    }
}

#[derive(Parser, Debug)]
#[command(name = "envnode", version, about = "Environmental monitoring node")]
struct Cli {
    /// Stop after this many seconds; runs until SIGINT/SIGTERM when omitted
    #[arg(allow_negative_numbers = true)]
    runtime: Option<i64>,

    /// Telemetry destination
    #[arg(long, default_value_t = default_dest())]
    dest: SocketAddr,

    /// GPIO backend for the PIR input and alert output
    #[arg(long, value_enum, default_value_t = GpioBackend::Sysfs)]
    gpio: GpioBackend,

    /// Which gas + light combination raises a compound alert
    #[arg(long, value_enum, default_value_t = CompoundArg::Dark)]
    compound_rule: CompoundArg,

    /// Use simulated sensors and alert line
    #[arg(long)]
    simulate: bool,
}

fn default_dest() -> SocketAddr {
    SocketAddr::from((TELEMETRY_DEST_IP, TELEMETRY_DEST_PORT))
}

/// Positive seconds become a limit; anything else is ignored.
fn runtime_limit(arg: Option<i64>) -> Option<Duration> {
    match arg {
        Some(secs) if secs > 0 => Some(Duration::from_secs(secs as u64)),
        Some(secs) => {
            log::warn!("ignoring non-positive runtime ({secs}s); running until signalled");
            None
        }
        None => None,
    }
}

// ── Supervisor ───────────────────────────────────────────────────────

#[derive(Default)]
struct Supervisor {
    tasks: Vec<PeriodicTask>,
    failed: bool,
}

impl Supervisor {
    fn start<B: PeriodicBody>(&mut self, spec: TaskSpec, body: B) {
        match PeriodicTask::start(spec, body) {
            Ok(task) => self.tasks.push(task),
            Err(e) => {
                log::error!("{}: {}", spec.name, e);
                self.failed = true;
            }
        }
    }

    /// Stop every task and collect reports. Returns `true` if any task
    /// failed to initialize.
    fn shutdown(mut self) -> bool {
        for task in &self.tasks {
            task.request_stop();
        }
        for task in &mut self.tasks {
            let name = task.spec().name;
            match task.stop() {
                Ok(report) => log::info!(
                    "{}: {} ticks, {} missed",
                    name,
                    report.ticks,
                    report.missed
                ),
                Err(e) if e.is_fatal() => {
                    log::info!("{name}: never started ({e})");
                    self.failed = true;
                }
                Err(e) => log::warn!("{name}: ended early ({e})"),
            }
        }
        self.failed
    }
}

fn main() -> anyhow::Result<ExitCode> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let runtime = runtime_limit(cli.runtime);

    log::info!(
        "envnode v{} starting on {}{}",
        VERSION,
        board::BOARD_NAME,
        if cli.simulate { " (simulated)" } else { "" }
    );

    let (stop_tx, stop_rx) = mpsc::sync_channel::<()>(1);
    ctrlc::set_handler(move || {
        let _ = stop_tx.try_send(());
    })
    .context("installing SIGINT/SIGTERM handler")?;

    let config = NodeConfig {
        compound_rule: cli.compound_rule.into(),
        ..NodeConfig::new()
    };
    log::info!(
        "thresholds: K={}, gas {} ppm, lux {}, compound rule: gas in {}",
        config.adaptive_factor,
        config.gas_threshold_ppm,
        config.lux_threshold,
        config.compound_rule.as_str()
    );

    let backend = cli.gpio;
    let (open_sensors, open_alert): (SensorOpener, AlertOpener) = if cli.simulate {
        (
            Box::new(|| -> error::Result<SensorSet> { Ok(sim::sensor_set()) }),
            Box::new(|| -> error::Result<Box<dyn AlertLine>> {
                Ok(Box::new(sim::SimAlertLine::new()))
            }),
        )
    } else {
        (
            Box::new(move || drivers::open_sensors(backend)),
            Box::new(move || drivers::open_alert_line(backend)),
        )
    };

    let state = Arc::new(SharedEnvironmentState::new());
    let mut supervisor = Supervisor::default();
    supervisor.start(SAMPLER, SamplerTask::new(open_sensors, state.clone(), config));
    supervisor.start(MONITOR, MonitorTask::new(state.clone(), config));
    supervisor.start(CONTROL, ControlTask::new(open_alert, state.clone(), config));
    supervisor.start(TELEMETRY, TelemetryTask::new(cli.dest, state));

    match runtime {
        Some(limit) => match stop_rx.recv_timeout(limit) {
            Ok(()) => log::info!("stop requested"),
            Err(RecvTimeoutError::Timeout) => {
                log::info!("runtime of {}s elapsed", limit.as_secs())
            }
            Err(RecvTimeoutError::Disconnected) => {}
        },
        None => {
            let _ = stop_rx.recv();
            log::info!("stop requested");
        }
    }

    let failed = supervisor.shutdown();
    log::info!("envnode stopped");
    Ok(if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}
