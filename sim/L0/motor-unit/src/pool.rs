//! Motor neuron pool: excitation to firing rates.
//!
//! Each motor neuron starts firing once excitation reaches its recruitment
//! threshold. Its rate then rises linearly with excitation from a minimum
//! rate, up to the neuron's peak rate:
//!
//! ```text
//! r[i] = min(peak[i], max(0, g · (e[i] − thr[i]) + minR))   if e[i] >= thr[i]
//!      = 0                                                   otherwise
//! ```
//!
//! # Adaptation
//!
//! Sustained activity lowers firing rates (central fatigue). Each neuron
//! tracks how long it has been recruited. The rate loss grows toward an
//! activity-dependent ceiling with time constant `τ`, and is largest for
//! high-threshold neurons:
//!
//! ```text
//! q[i]     = φ · (r[i] − minR + d) · (thr[i] − 1) / (R − 1)
//! adapt[i] = max(0, q[i] · (1 − exp(−duration[i] / τ)))
//! out[i]   = max(0, r[i] − adapt[i])
//! ```
//!
//! `duration[i]` is the time accumulated by earlier steps. The current
//! step's `dt` is credited after its output is computed, so a rested pool
//! always answers with unadapted rates first.
//!
//! Recruitment durations never decay. A neuron that stops firing keeps the
//! adaptation it accumulated, and resumes from there when it is recruited
//! again. How the published model de-adapts is not established, so no
//! decay is modeled. [`MotorNeuronPool::reset`] restores a rested pool.

use tracing::{debug, trace};

use crate::error::{check_step_input, require_non_negative, require_positive, Result};
use crate::population::{check_motor_unit_count, peak_firing_rates, recruitment_thresholds};
use crate::rate_table::FiringRateTable;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for a motor neuron pool.
///
/// Defaults reproduce Potvin & Fuglevand (2017).
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MotorNeuronPoolConfig {
    /// Number of motor neurons (n). Must be at least 2.
    pub motor_unit_count: usize,

    /// Excitation at which the last neuron is recruited (R).
    pub max_recruitment_threshold: f64,

    /// Slope of firing rate against excitation above threshold (g).
    pub firing_gain: f64,

    /// Firing rate of a neuron at its recruitment threshold, Hz (minR).
    pub min_firing_rate: f64,

    /// Peak firing rate of the first neuron, Hz.
    pub max_firing_rate_first_unit: f64,

    /// Peak firing rate of the last neuron, Hz.
    pub max_firing_rate_last_unit: f64,

    /// Absolute minimum firing rate is `min_firing_rate - derecruitment_delta` (d).
    pub derecruitment_delta: f64,

    /// Magnitude of adaptation (φ).
    pub adaptation_magnitude: f64,

    /// Adaptation time constant, seconds (τ). From Revill & Fuglevand (2011).
    pub adaptation_time_constant: f64,

    /// Longest recruitment duration that will be recorded, seconds.
    pub max_duration: f64,

    /// Whether recruitment durations accumulate, i.e. whether neurons adapt.
    pub apply_fatigue: bool,

    /// Whether to tabulate firing rates for uniform excitation at construction.
    pub pre_calc_firing_rates: bool,

    /// Grid step of the firing-rate table. Must be `1/k` for whole `k`.
    pub pre_calc_resolution: f64,

    /// Highest excitation in the firing-rate table.
    pub pre_calc_max: f64,
}

impl Default for MotorNeuronPoolConfig {
    fn default() -> Self {
        Self {
            motor_unit_count: 120,
            max_recruitment_threshold: 50.0,
            firing_gain: 1.0,
            min_firing_rate: 8.0,
            max_firing_rate_first_unit: 35.0,
            max_firing_rate_last_unit: 25.0,
            derecruitment_delta: 2.0,
            adaptation_magnitude: 0.67,
            adaptation_time_constant: 22.0,
            max_duration: 20_000.0,
            apply_fatigue: true,
            pre_calc_firing_rates: false,
            pre_calc_resolution: 0.1,
            pre_calc_max: 70.0,
        }
    }
}

impl MotorNeuronPoolConfig {
    /// Default configuration with the given number of motor neurons.
    #[must_use]
    pub fn with_motor_units(motor_unit_count: usize) -> Self {
        Self {
            motor_unit_count,
            ..Default::default()
        }
    }

    /// Enable or disable adaptation.
    #[must_use]
    pub fn with_fatigue(mut self, apply_fatigue: bool) -> Self {
        self.apply_fatigue = apply_fatigue;
        self
    }

    /// Enable or disable the uniform-excitation firing-rate table.
    #[must_use]
    pub fn with_rate_table(mut self, pre_calc_firing_rates: bool) -> Self {
        self.pre_calc_firing_rates = pre_calc_firing_rates;
        self
    }

    /// Set the firing-rate table grid.
    #[must_use]
    pub fn with_rate_table_grid(mut self, resolution: f64, max_excitation: f64) -> Self {
        self.pre_calc_resolution = resolution;
        self.pre_calc_max = max_excitation;
        self
    }

    /// Set the recruitment threshold range.
    #[must_use]
    pub fn with_max_recruitment_threshold(mut self, threshold: f64) -> Self {
        self.max_recruitment_threshold = threshold;
        self
    }

    /// Excitation at which the last neuron reaches its peak rate.
    ///
    /// Beyond this, more excitation changes nothing.
    #[must_use]
    pub fn max_excitation(&self) -> f64 {
        self.max_recruitment_threshold
            + (self.max_firing_rate_last_unit - self.min_firing_rate) / self.firing_gain
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        check_motor_unit_count(self.motor_unit_count)?;
        require_positive("max_recruitment_threshold", self.max_recruitment_threshold)?;
        require_positive("firing_gain", self.firing_gain)?;
        require_non_negative("min_firing_rate", self.min_firing_rate)?;
        require_positive("max_firing_rate_first_unit", self.max_firing_rate_first_unit)?;
        require_positive("max_firing_rate_last_unit", self.max_firing_rate_last_unit)?;
        require_non_negative("derecruitment_delta", self.derecruitment_delta)?;
        require_non_negative("adaptation_magnitude", self.adaptation_magnitude)?;
        require_positive("adaptation_time_constant", self.adaptation_time_constant)?;
        require_non_negative("max_duration", self.max_duration)?;
        if self.pre_calc_firing_rates {
            require_positive("pre_calc_resolution", self.pre_calc_resolution)?;
            require_positive("pre_calc_max", self.pre_calc_max)?;
        }
        Ok(())
    }
}

/// Unadapted firing rate of one neuron.
fn base_firing_rate(
    excitation: f64,
    threshold: f64,
    gain: f64,
    min_firing_rate: f64,
    peak_firing_rate: f64,
) -> f64 {
    if excitation < threshold {
        return 0.0;
    }
    (gain * (excitation - threshold) + min_firing_rate)
        .max(0.0)
        .min(peak_firing_rate)
}

/// A pool of motor neurons driving one muscle.
///
/// Owns its intrinsic curves and its recruitment-duration state exclusively.
#[derive(Debug, Clone)]
pub struct MotorNeuronPool {
    config: MotorNeuronPoolConfig,
    recruitment_thresholds: Vec<f64>,
    peak_firing_rates: Vec<f64>,
    /// Seconds each neuron has been recruited, in `[0, max_duration]`.
    recruitment_durations: Vec<f64>,
    rate_table: Option<FiringRateTable>,
}

impl MotorNeuronPool {
    /// Build a pool from its configuration.
    pub fn new(config: MotorNeuronPoolConfig) -> Result<Self> {
        config.validate()?;

        let recruitment_thresholds =
            recruitment_thresholds(config.motor_unit_count, config.max_recruitment_threshold)?;
        let peak_firing_rates = peak_firing_rates(
            &recruitment_thresholds,
            config.max_recruitment_threshold,
            config.max_firing_rate_first_unit,
            config.max_firing_rate_last_unit,
        )?;

        let mut pool = Self {
            recruitment_durations: vec![0.0; config.motor_unit_count],
            recruitment_thresholds,
            peak_firing_rates,
            rate_table: None,
            config,
        };

        if pool.config.pre_calc_firing_rates {
            let table = FiringRateTable::build(
                pool.config.pre_calc_resolution,
                pool.config.pre_calc_max,
                |excitation| pool.uniform_base_firing_rates(excitation),
            )?;
            debug!(levels = table.len(), "built firing-rate table");
            pool.rate_table = Some(table);
        }

        debug!(
            motor_unit_count = pool.config.motor_unit_count,
            max_excitation = pool.max_excitation(),
            apply_fatigue = pool.config.apply_fatigue,
            "created motor neuron pool"
        );

        Ok(pool)
    }

    /// Build a default pool with the given number of motor neurons.
    pub fn with_motor_units(motor_unit_count: usize) -> Result<Self> {
        Self::new(MotorNeuronPoolConfig::with_motor_units(motor_unit_count))
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &MotorNeuronPoolConfig {
        &self.config
    }

    /// Number of motor neurons.
    #[must_use]
    pub fn motor_unit_count(&self) -> usize {
        self.config.motor_unit_count
    }

    /// Excitation at which every neuron fires at its peak rate.
    #[must_use]
    pub fn max_excitation(&self) -> f64 {
        self.config.max_excitation()
    }

    /// Recruitment threshold of each neuron.
    #[must_use]
    pub fn recruitment_thresholds(&self) -> &[f64] {
        &self.recruitment_thresholds
    }

    /// Peak firing rate of each neuron (Hz).
    #[must_use]
    pub fn peak_firing_rates(&self) -> &[f64] {
        &self.peak_firing_rates
    }

    /// Seconds each neuron has spent recruited.
    #[must_use]
    pub fn recruitment_durations(&self) -> &[f64] {
        &self.recruitment_durations
    }

    /// The uniform-excitation firing-rate table, if one was built.
    #[must_use]
    pub fn rate_table(&self) -> Option<&FiringRateTable> {
        self.rate_table.as_ref()
    }

    /// Advance the pool by `dt` seconds.
    ///
    /// Returns the adapted firing rate of every neuron. Inputs are validated
    /// before any state changes.
    pub fn step(&mut self, excitations: &[f64], dt: f64) -> Result<Vec<f64>> {
        check_step_input(excitations, self.motor_unit_count(), dt)?;

        let base = self.base_firing_rates(excitations);
        let adapted = self.adapt(&base);

        if self.config.apply_fatigue {
            self.accumulate_durations(&base, dt);
        }

        Ok(adapted)
    }

    /// Firing rates the next [`step`](Self::step) would return for these
    /// excitations, without advancing any state.
    pub fn preview(&self, excitations: &[f64]) -> Result<Vec<f64>> {
        check_step_input(excitations, self.motor_unit_count(), 0.0)?;
        let base = self.base_firing_rates(excitations);
        Ok(self.adapt(&base))
    }

    /// Restore the rested state.
    pub fn reset(&mut self) {
        self.recruitment_durations.fill(0.0);
    }

    fn uniform_base_firing_rates(&self, excitation: f64) -> Vec<f64> {
        self.recruitment_thresholds
            .iter()
            .zip(&self.peak_firing_rates)
            .map(|(&thr, &peak)| {
                base_firing_rate(
                    excitation,
                    thr,
                    self.config.firing_gain,
                    self.config.min_firing_rate,
                    peak,
                )
            })
            .collect()
    }

    fn base_firing_rates(&self, excitations: &[f64]) -> Vec<f64> {
        if let Some(table) = &self.rate_table {
            if let Some(rates) = table.lookup_uniform(excitations) {
                return rates.to_vec();
            }
            trace!("firing-rate table miss, computing directly");
        }

        excitations
            .iter()
            .zip(&self.recruitment_thresholds)
            .zip(&self.peak_firing_rates)
            .map(|((&e, &thr), &peak)| {
                base_firing_rate(
                    e,
                    thr,
                    self.config.firing_gain,
                    self.config.min_firing_rate,
                    peak,
                )
            })
            .collect()
    }

    /// Subtract the adaptation earned by past recruitment.
    fn adapt(&self, base: &[f64]) -> Vec<f64> {
        let threshold_span = self.config.max_recruitment_threshold - 1.0;
        let tau = self.config.adaptation_time_constant;

        base.iter()
            .zip(&self.recruitment_thresholds)
            .zip(&self.recruitment_durations)
            .map(|((&rate, &thr), &duration)| {
                let curve = self.config.adaptation_magnitude
                    * (rate - self.config.min_firing_rate + self.config.derecruitment_delta)
                    * ((thr - 1.0) / threshold_span);
                let adaptation = (curve * (1.0 - (-duration / tau).exp())).max(0.0);
                (rate - adaptation).max(0.0)
            })
            .collect()
    }

    fn accumulate_durations(&mut self, base: &[f64], dt: f64) {
        let max_duration = self.config.max_duration;
        for (duration, &rate) in self.recruitment_durations.iter_mut().zip(base) {
            if rate > 0.0 {
                *duration = (*duration + dt).clamp(0.0, max_duration);
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn uniform(pool: &MotorNeuronPool, excitation: f64) -> Vec<f64> {
        vec![excitation; pool.motor_unit_count()]
    }

    #[test]
    fn test_default_max_excitation() {
        let pool = MotorNeuronPool::with_motor_units(120).unwrap();
        assert_eq!(pool.motor_unit_count(), 120);
        assert_relative_eq!(pool.max_excitation(), 67.0, epsilon = 1e-12);
    }

    #[test]
    fn test_rejects_single_unit() {
        let err = MotorNeuronPool::with_motor_units(1).unwrap_err();
        assert!(err.is_config_error());
    }

    #[test]
    fn test_zero_excitation() {
        let mut pool = MotorNeuronPool::with_motor_units(120).unwrap();
        let rates = pool.step(&uniform(&pool, 0.0), 1.0).unwrap();
        assert!(rates.iter().all(|&r| r == 0.0));
        assert!(pool.recruitment_durations().iter().all(|&d| d == 0.0));
    }

    #[test]
    fn test_moderate_excitation() {
        let mut pool = MotorNeuronPool::with_motor_units(120).unwrap();
        let rates = pool.step(&uniform(&pool, 40.0), 1.0).unwrap();
        let sum: f64 = rates.iter().sum();
        assert_relative_eq!(sum, 3503.58881, max_relative = 1e-6);
    }

    #[test]
    fn test_excitation_saturates() {
        let mut pool = MotorNeuronPool::with_motor_units(120).unwrap();
        let at_max: f64 = pool.step(&uniform(&pool, 67.0), 1.0).unwrap().iter().sum();
        assert_relative_eq!(at_max, 3915.06787, max_relative = 1e-6);

        let mut pool = MotorNeuronPool::with_motor_units(120).unwrap();
        let above: f64 = pool.step(&uniform(&pool, 107.0), 1.0).unwrap().iter().sum();
        assert_relative_eq!(above, at_max, max_relative = 1e-12);
    }

    #[test]
    fn test_rates_within_peak() {
        let mut pool = MotorNeuronPool::with_motor_units(60).unwrap();
        for &e in &[0.5, 1.0, 10.0, 35.0, 80.0] {
            let rates = pool.step(&uniform(&pool, e), 0.1).unwrap();
            for (rate, peak) in rates.iter().zip(pool.peak_firing_rates()) {
                assert!(*rate >= 0.0);
                assert!(*rate <= *peak);
            }
        }
    }

    #[test]
    fn test_adaptation_lowers_rates() {
        let mut pool = MotorNeuronPool::with_motor_units(120).unwrap();
        let input = uniform(&pool, 67.0);

        let first: f64 = pool.step(&input, 1.0).unwrap().iter().sum();
        let mut adapted = first;
        for _ in 0..10 {
            adapted = pool.step(&input, 1.0).unwrap().iter().sum();
        }

        assert!(adapted < first);
        assert_relative_eq!(adapted, 3749.91061, max_relative = 1e-6);
    }

    #[test]
    fn test_fatigue_disabled() {
        let config = MotorNeuronPoolConfig::default().with_fatigue(false);
        let mut pool = MotorNeuronPool::new(config).unwrap();
        let input = uniform(&pool, 67.0);

        let first = pool.step(&input, 1.0).unwrap();
        for _ in 0..10 {
            assert_eq!(pool.step(&input, 1.0).unwrap(), first);
        }
        assert!(pool.recruitment_durations().iter().all(|&d| d == 0.0));
    }

    #[test]
    fn test_durations_accumulate_and_clamp() {
        let config = MotorNeuronPoolConfig {
            max_duration: 2.5,
            ..MotorNeuronPoolConfig::with_motor_units(10)
        };
        let mut pool = MotorNeuronPool::new(config).unwrap();
        // Only the first few units are recruited at this excitation
        let input = uniform(&pool, 3.0);

        for _ in 0..4 {
            let _ = pool.step(&input, 1.0).unwrap();
        }

        let durations = pool.recruitment_durations();
        assert_relative_eq!(durations[0], 2.5, epsilon = 1e-12);
        assert_relative_eq!(durations[9], 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_durations_do_not_decay() {
        let mut pool = MotorNeuronPool::with_motor_units(20).unwrap();
        let _ = pool.step(&uniform(&pool, 67.0), 2.0).unwrap();
        let before = pool.recruitment_durations().to_vec();

        let _ = pool.step(&uniform(&pool, 0.0), 5.0).unwrap();
        assert_eq!(pool.recruitment_durations(), before.as_slice());
    }

    #[test]
    fn test_invalid_input_leaves_state() {
        let mut pool = MotorNeuronPool::with_motor_units(120).unwrap();
        let _ = pool.step(&uniform(&pool, 40.0), 1.0).unwrap();
        let before = pool.recruitment_durations().to_vec();

        let err = pool.step(&[1.0, 1.0, 1.0], 1.0).unwrap_err();
        assert!(err.is_invalid_input());

        let mut bad = uniform(&pool, 40.0);
        bad[7] = f64::NAN;
        assert!(pool.step(&bad, 1.0).is_err());
        assert!(pool.step(&uniform(&pool, 40.0), -1.0).is_err());

        assert_eq!(pool.recruitment_durations(), before.as_slice());
    }

    #[test]
    fn test_preview_matches_step() {
        let mut pool = MotorNeuronPool::with_motor_units(120).unwrap();
        let input = uniform(&pool, 55.0);
        for _ in 0..3 {
            let preview = pool.preview(&input).unwrap();
            let durations = pool.recruitment_durations().to_vec();
            assert_eq!(pool.recruitment_durations(), durations.as_slice());
            assert_eq!(pool.step(&input, 1.0).unwrap(), preview);
        }
    }

    #[test]
    fn test_rate_table_matches_direct() {
        let mut cached =
            MotorNeuronPool::new(MotorNeuronPoolConfig::default().with_rate_table(true)).unwrap();
        let mut direct = MotorNeuronPool::with_motor_units(120).unwrap();
        assert!(cached.rate_table().is_some());

        for &e in &[0.0, 0.3, 12.7, 33.5, 40.0, 67.0, 68.25, 90.0] {
            let input = vec![e; 120];
            assert_eq!(
                cached.step(&input, 0.5).unwrap(),
                direct.step(&input, 0.5).unwrap()
            );
        }

        // Non-uniform input bypasses the table
        let ramp: Vec<f64> = (0..120).map(|i| i as f64 * 0.5).collect();
        assert_eq!(
            cached.step(&ramp, 0.5).unwrap(),
            direct.step(&ramp, 0.5).unwrap()
        );
    }

    #[test]
    fn test_reset() {
        let mut pool = MotorNeuronPool::with_motor_units(30).unwrap();
        let input = uniform(&pool, 67.0);
        let first = pool.step(&input, 1.0).unwrap();
        for _ in 0..5 {
            let _ = pool.step(&input, 1.0).unwrap();
        }
        pool.reset();
        assert_eq!(pool.step(&input, 1.0).unwrap(), first);
    }
}
