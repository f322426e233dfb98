/// Execution-time bookkeeping for periodic task bodies.
///
/// Observability only: nothing here feeds back into scheduling.

/// Full min/max/average/jitter statistics, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ExecStats {
    min_ms: f64,
    max_ms: f64,
    total_ms: f64,
    count: u64,
}

impl ExecStats {
    pub const fn new() -> Self {
        Self {
            min_ms: f64::MAX,
            max_ms: 0.0,
            total_ms: 0.0,
            count: 0,
        }
    }

    pub fn record(&mut self, exec_ms: f64) {
        self.min_ms = self.min_ms.min(exec_ms);
        self.max_ms = self.max_ms.max(exec_ms);
        self.total_ms += exec_ms;
        self.count += 1;
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    pub fn summary(&self) -> Option<StatsSummary> {
        if self.count == 0 {
            return None;
        }
        Some(StatsSummary {
            avg_ms: self.total_ms / self.count as f64,
            min_ms: self.min_ms,
            max_ms: self.max_ms,
            jitter_ms: self.max_ms - self.min_ms,
            samples: self.count,
        })
    }
}

impl Default for ExecStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of [`ExecStats`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StatsSummary {
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    /// max − min
    pub jitter_ms: f64,
    pub samples: u64,
}

impl core::fmt::Display for StatsSummary {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "Avg: {:.3} ms, Min: {:.3} ms, Max: {:.3} ms, Jitter: {:.3} ms ({} samples)",
            self.avg_ms, self.min_ms, self.max_ms, self.jitter_ms, self.samples
        )
    }
}

/// Exponentially weighted running estimate. Cheaper than [`ExecStats`]
/// and reports a single number.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RunningEstimate {
    alpha: f64,
    value: Option<f64>,
}

impl RunningEstimate {
    pub const fn new(alpha: f64) -> Self {
        Self { alpha, value: None }
    }

    /// Fold in a sample. The first sample seeds the estimate.
    pub fn update(&mut self, sample: f64) -> f64 {
        let next = match self.value {
            None => sample,
            Some(prev) => prev + self.alpha * (sample - prev),
        };
        self.value = Some(next);
        next
    }

    pub fn value(&self) -> Option<f64> {
        self.value
    }
}
