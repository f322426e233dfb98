/// Threshold policy and environment classification.
///
/// Classification is a fixed, ordered decision list: each [`Rule`] is an
/// all-of over [`Condition`]s and the first rule that holds wins. Order is
/// the whole point: the compound motion + gas alert sits ahead of the
/// single-condition rules so it can never be shadowed by them.
///
/// The alert line uses a simpler fixed policy, see [`alert_engaged`].
use crate::config::NodeConfig;
use crate::state::Reading;

// ── Thresholds ───────────────────────────────────────────────────────

/// Which gas + light combination constitutes a compound alert.
///
/// The two historical monitor variants disagreed on this, so it is an
/// explicit configuration choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompoundRule {
    /// High gas while light is below its threshold
    GasInDark,
    /// High gas while light is above its threshold
    GasInBright,
}

impl CompoundRule {
    pub fn as_str(&self) -> &'static str {
        match self {
            CompoundRule::GasInDark => "dark",
            CompoundRule::GasInBright => "bright",
        }
    }
}

/// Where a threshold came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThresholdSource {
    /// `baseline * K`
    Adaptive,
    /// Fixed fallback (no baseline published yet)
    Fixed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
    pub gas_ppm: f32,
    pub lux: f32,
    pub gas_source: ThresholdSource,
    pub lux_source: ThresholdSource,
}

impl Thresholds {
    /// `baseline * K` for each baseline that has been calibrated (> 0);
    /// the configured fixed threshold otherwise.
    pub fn resolve(baseline_ppm: f32, baseline_lux: f32, config: &NodeConfig) -> Self {
        let (gas_ppm, gas_source) = if baseline_ppm > 0.0 {
            (baseline_ppm * config.adaptive_factor, ThresholdSource::Adaptive)
        } else {
            (config.gas_threshold_ppm, ThresholdSource::Fixed)
        };
        let (lux, lux_source) = if baseline_lux > 0.0 {
            (baseline_lux * config.adaptive_factor, ThresholdSource::Adaptive)
        } else {
            (config.lux_threshold, ThresholdSource::Fixed)
        };
        Self {
            gas_ppm,
            lux,
            gas_source,
            lux_source,
        }
    }

    /// Fixed thresholds only, ignoring any baseline.
    pub fn fixed(config: &NodeConfig) -> Self {
        Self::resolve(0.0, 0.0, config)
    }
}

// ── Conditions ───────────────────────────────────────────────────────

/// A boolean fact about one reading, relative to the thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Condition {
    Motion,
    GasHigh,
    LuxLow,
    LuxHigh,
}

impl Condition {
    const fn bit(self) -> u8 {
        match self {
            Condition::Motion => 1 << 0,
            Condition::GasHigh => 1 << 1,
            Condition::LuxLow => 1 << 2,
            Condition::LuxHigh => 1 << 3,
        }
    }
}

/// The set of conditions that hold for a reading. Stack-only, one byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConditionSet {
    bits: u8,
}

impl ConditionSet {
    pub const fn new() -> Self {
        Self { bits: 0 }
    }

    pub fn from_reading(reading: &Reading, thresholds: &Thresholds) -> Self {
        let mut set = Self::new();
        if reading.motion {
            set.set(Condition::Motion);
        }
        if reading.gas_ppm > thresholds.gas_ppm {
            set.set(Condition::GasHigh);
        }
        if reading.lux < thresholds.lux {
            set.set(Condition::LuxLow);
        }
        if reading.lux > thresholds.lux {
            set.set(Condition::LuxHigh);
        }
        set
    }

    pub fn set(&mut self, cond: Condition) {
        self.bits |= cond.bit();
    }

    pub fn holds(&self, cond: Condition) -> bool {
        self.bits & cond.bit() != 0
    }

    pub fn holds_all(&self, conds: &[Condition]) -> bool {
        conds.iter().all(|&c| self.holds(c))
    }
}

// ── Decision list ────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Classification {
    MotionAndGasAlert,
    /// High gas combined with the configured light condition
    GasLightAlert,
    MotionOnly,
    GasOnly,
    Normal,
}

impl Classification {
    pub fn is_alert(&self) -> bool {
        matches!(
            self,
            Classification::MotionAndGasAlert | Classification::GasLightAlert
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Classification::MotionAndGasAlert => "motion_and_gas",
            Classification::GasLightAlert => "gas_light",
            Classification::MotionOnly => "motion_only",
            Classification::GasOnly => "gas_only",
            Classification::Normal => "normal",
        }
    }
}

/// One entry of the decision list.
#[derive(Debug, Clone, Copy)]
pub struct Rule {
    pub classification: Classification,
    /// All must hold. Empty matches unconditionally.
    pub all_of: &'static [Condition],
}

pub static DARK_DECISIONS: &[Rule] = &[
    Rule {
        classification: Classification::MotionAndGasAlert,
        all_of: &[Condition::Motion, Condition::GasHigh],
    },
    Rule {
        classification: Classification::GasLightAlert,
        all_of: &[Condition::GasHigh, Condition::LuxLow],
    },
    Rule {
        classification: Classification::MotionOnly,
        all_of: &[Condition::Motion],
    },
    Rule {
        classification: Classification::GasOnly,
        all_of: &[Condition::GasHigh],
    },
    Rule {
        classification: Classification::Normal,
        all_of: &[],
    },
];

pub static BRIGHT_DECISIONS: &[Rule] = &[
    Rule {
        classification: Classification::MotionAndGasAlert,
        all_of: &[Condition::Motion, Condition::GasHigh],
    },
    Rule {
        classification: Classification::GasLightAlert,
        all_of: &[Condition::GasHigh, Condition::LuxHigh],
    },
    Rule {
        classification: Classification::MotionOnly,
        all_of: &[Condition::Motion],
    },
    Rule {
        classification: Classification::GasOnly,
        all_of: &[Condition::GasHigh],
    },
    Rule {
        classification: Classification::Normal,
        all_of: &[],
    },
];

pub fn decision_list(rule: CompoundRule) -> &'static [Rule] {
    match rule {
        CompoundRule::GasInDark => DARK_DECISIONS,
        CompoundRule::GasInBright => BRIGHT_DECISIONS,
    }
}

/// First matching rule wins; falls through to `Normal`.
pub fn first_match(rules: &[Rule], set: &ConditionSet) -> Classification {
    rules
        .iter()
        .find(|r| set.holds_all(r.all_of))
        .map(|r| r.classification)
        .unwrap_or(Classification::Normal)
}

/// Result of evaluating one reading.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub classification: Classification,
    pub reading: Reading,
    pub thresholds: Thresholds,
    pub compound_rule: CompoundRule,
}

/// Classify a reading against baseline-derived thresholds.
pub fn classify(
    reading: Reading,
    baseline_ppm: f32,
    baseline_lux: f32,
    config: &NodeConfig,
) -> Evaluation {
    let thresholds = Thresholds::resolve(baseline_ppm, baseline_lux, config);
    let set = ConditionSet::from_reading(&reading, &thresholds);
    Evaluation {
        classification: first_match(decision_list(config.compound_rule), &set),
        reading,
        thresholds,
        compound_rule: config.compound_rule,
    }
}

impl core::fmt::Display for Evaluation {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let verdict = match (self.classification, self.compound_rule) {
            (Classification::MotionAndGasAlert, _) => "ALERT: motion with high gas",
            (Classification::GasLightAlert, CompoundRule::GasInDark) => "ALERT: high gas in the dark",
            (Classification::GasLightAlert, CompoundRule::GasInBright) => {
                "ALERT: high gas in bright light"
            }
            (Classification::MotionOnly, _) => "motion only",
            (Classification::GasOnly, _) => "gas level high",
            (Classification::Normal, _) => "environment normal",
        };
        write!(
            f,
            "{} (motion={}, gas={:.1}/{:.1} ppm, lux={:.1}/{:.1})",
            verdict,
            self.reading.motion,
            self.reading.gas_ppm,
            self.thresholds.gas_ppm,
            self.reading.lux,
            self.thresholds.lux,
        )
    }
}

// ── Alert line policy ────────────────────────────────────────────────

/// Fixed policy driving the alert output: any motion, or gas above the
/// fixed threshold. Does not consult the adaptive baseline.
pub fn alert_engaged(motion: bool, gas_ppm: f32, config: &NodeConfig) -> bool {
    motion || gas_ppm > config.gas_threshold_ppm
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(motion: bool, gas_ppm: f32, lux: f32) -> Reading {
        Reading {
            motion,
            gas_ppm,
            lux,
        }
    }

    fn dark() -> NodeConfig {
        NodeConfig::new()
    }

    fn bright() -> NodeConfig {
        NodeConfig {
            compound_rule: CompoundRule::GasInBright,
            ..NodeConfig::new()
        }
    }

    // ── Thresholds ──────────────────────────────────────────────────

    #[test]
    fn adaptive_thresholds_scale_baseline() {
        let t = Thresholds::resolve(400.0, 100.0, &dark());
        assert!((t.gas_ppm - 460.0).abs() < 1e-3);
        assert!((t.lux - 115.0).abs() < 1e-3);
        assert_eq!(t.gas_source, ThresholdSource::Adaptive);
        assert_eq!(t.lux_source, ThresholdSource::Adaptive);
    }

    #[test]
    fn uncalibrated_baseline_falls_back_to_fixed() {
        let t = Thresholds::resolve(0.0, 0.0, &dark());
        assert_eq!(t.gas_ppm, 500.0);
        assert_eq!(t.lux, 30.0);
        assert_eq!(t.gas_source, ThresholdSource::Fixed);
    }

    #[test]
    fn fallback_is_per_field() {
        let t = Thresholds::resolve(200.0, 0.0, &dark());
        assert_eq!(t.gas_source, ThresholdSource::Adaptive);
        assert_eq!(t.lux_source, ThresholdSource::Fixed);
        assert_eq!(t.lux, 30.0);
    }

    // ── ConditionSet ────────────────────────────────────────────────

    #[test]
    fn condition_set_bits() {
        let mut s = ConditionSet::new();
        assert!(!s.holds(Condition::Motion));
        s.set(Condition::Motion);
        s.set(Condition::LuxLow);
        assert!(s.holds(Condition::Motion));
        assert!(s.holds(Condition::LuxLow));
        assert!(!s.holds(Condition::GasHigh));
        assert!(s.holds_all(&[Condition::Motion, Condition::LuxLow]));
        assert!(!s.holds_all(&[Condition::Motion, Condition::GasHigh]));
        assert!(s.holds_all(&[]));
    }

    #[test]
    fn lux_exactly_at_threshold_is_neither_low_nor_high() {
        let t = Thresholds::fixed(&dark());
        let s = ConditionSet::from_reading(&reading(false, 0.0, 30.0), &t);
        assert!(!s.holds(Condition::LuxLow));
        assert!(!s.holds(Condition::LuxHigh));
    }

    // ── Classification ──────────────────────────────────────────────

    #[test]
    fn motion_and_gas_takes_precedence() {
        let baseline = 400.0;
        for lux in [0.0, 10.0, 50.0, 1000.0] {
            for cfg in [dark(), bright()] {
                let e = classify(reading(true, 2.0 * baseline, lux), baseline, 50.0, &cfg);
                assert_eq!(e.classification, Classification::MotionAndGasAlert);
            }
        }
    }

    #[test]
    fn gas_in_dark_rule() {
        let e = classify(reading(false, 900.0, 5.0), 400.0, 50.0, &dark());
        assert_eq!(e.classification, Classification::GasLightAlert);
        let e = classify(reading(false, 900.0, 500.0), 400.0, 50.0, &dark());
        assert_eq!(e.classification, Classification::GasOnly);
    }

    #[test]
    fn gas_in_bright_rule() {
        let e = classify(reading(false, 900.0, 500.0), 400.0, 50.0, &bright());
        assert_eq!(e.classification, Classification::GasLightAlert);
        let e = classify(reading(false, 900.0, 5.0), 400.0, 50.0, &bright());
        assert_eq!(e.classification, Classification::GasOnly);
    }

    #[test]
    fn motion_only_and_normal() {
        let e = classify(reading(true, 300.0, 5.0), 400.0, 50.0, &dark());
        assert_eq!(e.classification, Classification::MotionOnly);
        let e = classify(reading(false, 300.0, 5.0), 400.0, 50.0, &dark());
        assert_eq!(e.classification, Classification::Normal);
        assert!(!e.classification.is_alert());
    }

    #[test]
    fn gas_at_threshold_is_not_high() {
        // 400 * 1.15 computed the same way as the classifier
        let threshold = 400.0f32 * 1.15;
        let e = classify(reading(false, threshold, 50.0), 400.0, 50.0, &dark());
        assert_eq!(e.classification, Classification::Normal);
    }

    #[test]
    fn empty_list_falls_through_to_normal() {
        let mut s = ConditionSet::new();
        s.set(Condition::Motion);
        assert_eq!(first_match(&[], &s), Classification::Normal);
    }

    #[test]
    fn decision_lists_end_with_catch_all() {
        for list in [DARK_DECISIONS, BRIGHT_DECISIONS] {
            let last = list.last().unwrap();
            assert_eq!(last.classification, Classification::Normal);
            assert!(last.all_of.is_empty());
            assert_eq!(list[0].classification, Classification::MotionAndGasAlert);
        }
    }

    #[test]
    fn evaluation_display_is_human_readable() {
        let e = classify(reading(false, 900.0, 5.0), 400.0, 50.0, &dark());
        let text = format!("{e}");
        assert!(text.starts_with("ALERT: high gas in the dark"));
        assert!(text.contains("gas=900.0/460.0 ppm"));
    }

    // ── Alert line policy ───────────────────────────────────────────

    #[test]
    fn alert_policy() {
        let cfg = dark();
        assert!(alert_engaged(true, 0.0, &cfg));
        assert!(alert_engaged(false, 500.1, &cfg));
        assert!(!alert_engaged(false, 500.0, &cfg));
        assert!(!alert_engaged(false, 120.0, &cfg));
    }
}
