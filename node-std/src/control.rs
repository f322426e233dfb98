//! Alert control task: drives the alert line from motion and gas level,
//! and leaves it low when the task ends.

use std::sync::Arc;

use envnode::config::NodeConfig;
use envnode::rules::alert_engaged;
use envnode::state::SharedEnvironmentState;

use crate::drivers::AlertLine;
use crate::error::{NodeError, Result};
use crate::periodic::{PeriodicBody, StopSignal};

pub struct ControlTask<F> {
    open: Option<F>,
    line: Option<Box<dyn AlertLine>>,
    state: Arc<SharedEnvironmentState>,
    config: NodeConfig,
    engaged: bool,
}

impl<F> ControlTask<F>
where
    F: FnOnce() -> Result<Box<dyn AlertLine>> + Send + 'static,
{
    pub fn new(open: F, state: Arc<SharedEnvironmentState>, config: NodeConfig) -> Self {
        Self {
            open: Some(open),
            line: None,
            state,
            config,
            engaged: false,
        }
    }

    fn drive(&mut self, high: bool) -> Result<()> {
        match self.line.as_mut() {
            Some(line) => line.write_alert(high).map_err(NodeError::Actuation),
            None => Ok(()),
        }
    }
}

impl<F> PeriodicBody for ControlTask<F>
where
    F: FnOnce() -> Result<Box<dyn AlertLine>> + Send + 'static,
{
    fn init(&mut self, _stop: &StopSignal) -> Result<()> {
        if let Some(open) = self.open.take() {
            self.line = Some(open()?);
        }
        Ok(())
    }

    fn run(&mut self) {
        let engaged = alert_engaged(self.state.motion(), self.state.gas_ppm(), &self.config);
        if let Err(e) = self.drive(engaged) {
            log::warn!("{e}");
            return;
        }
        if engaged != self.engaged {
            log::info!("alert {}", if engaged { "engaged" } else { "cleared" });
            self.engaged = engaged;
        }
    }

    /// Return the line to its safe state.
    fn finish(&mut self) {
        match self.drive(false) {
            Ok(()) => log::info!("alert line reset to LOW"),
            Err(e) => log::error!("{e}; alert line may be left HIGH"),
        }
        self.engaged = false;
        self.line = None;
    }
}
