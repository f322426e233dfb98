//! Environment evaluation task: classifies the latest published reading
//! against baseline-derived thresholds and logs the verdict.

use std::sync::Arc;
use std::time::Instant;

use envnode::config::NodeConfig;
use envnode::defaults::{EWMA_ALPHA, STATS_REPORT_EVERY};
use envnode::rules::{classify, Evaluation};
use envnode::state::SharedEnvironmentState;
use envnode::stats::RunningEstimate;

use crate::periodic::PeriodicBody;

pub struct MonitorTask {
    state: Arc<SharedEnvironmentState>,
    config: NodeConfig,
    wcet: RunningEstimate,
    ticks: u64,
    last: Option<Evaluation>,
}

impl MonitorTask {
    pub fn new(state: Arc<SharedEnvironmentState>, config: NodeConfig) -> Self {
        Self {
            state,
            config,
            wcet: RunningEstimate::new(EWMA_ALPHA),
            ticks: 0,
            last: None,
        }
    }

    #[cfg(test)]
    pub fn last(&self) -> Option<&Evaluation> {
        self.last.as_ref()
    }

    /// Smoothed execution time in milliseconds.
    #[cfg(test)]
    pub fn wcet_ms(&self) -> Option<f64> {
        self.wcet.value()
    }
}

impl PeriodicBody for MonitorTask {
    fn run(&mut self) {
        let started = Instant::now();

        let evaluation = classify(
            self.state.reading(),
            self.state.baseline_ppm(),
            self.state.baseline_lux(),
            &self.config,
        );
        log::info!("{evaluation}");
        let was_alert = self
            .last
            .is_some_and(|prev| prev.classification.is_alert());
        if evaluation.classification.is_alert() && !was_alert {
            log::warn!("entering alert: {}", evaluation.classification.as_str());
        }
        self.last = Some(evaluation);

        let wcet = self.wcet.update(started.elapsed().as_secs_f64() * 1000.0);
        self.ticks += 1;
        if self.ticks % STATS_REPORT_EVERY == 0 {
            log::debug!("monitor WCET ~{wcet:.3} ms");
        }
    }
}
