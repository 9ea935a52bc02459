//! Muscle fiber population: firing rates to force.
//!
//! Each motor unit's fibers turn a firing rate into force through the
//! force-frequency curve (see [`crate::curves`]). That force is scaled by the
//! unit's *current* peak twitch force. Sustained activity depletes that
//! capacity (peripheral fatigue). Optionally, it is restored while the unit
//! is silent (recovery).
//!
//! # Step
//!
//! ```text
//! s[i]     = CT_now[i] · rate[i] / 1000            normalized stimulus rate
//! frac[i]  = normalized_force(s[i])
//! force[i] = frac[i] · P_now[i]                    total = Σ force[i]
//!
//! // fatigue enabled
//! P_now[i] −= F[i] · frac[i] · dt
//! // recovery enabled, units with frac[i] <= 0
//! P_now[i] += Rec[i] · (P[i] − P_now[i]) / P[i] · dt
//! P_now[i]  = clamp(P_now[i], 0, P[i])
//! CT_now[i] = CT[i] · (1 + k · (1 − P_now[i] / P[i]))
//! ```
//!
//! Force is computed from the state at the start of the step; capacity is
//! updated afterwards. Fatigued units contract more slowly (Shields et al.
//! 1997), which shifts them along the force-frequency curve.

use tracing::debug;

use crate::curves::{normalized_force, normalized_stimulus_rate};
use crate::error::{
    check_step_input, require_non_negative, require_positive, MotorUnitError, Result,
};
use crate::population::{
    check_motor_unit_count, contraction_times, nominal_fatigabilities, peak_twitch_forces,
    recovery_rates, total_twitch_force,
};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Configuration for a muscle fiber population.
///
/// Defaults reproduce Potvin & Fuglevand (2017) fibers without recovery.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct MuscleFiberConfig {
    /// Number of motor units (n). Must be at least 2.
    pub motor_unit_count: usize,

    /// Ratio of the largest to the smallest peak twitch force (RP).
    pub max_twitch_amplitude: f64,

    /// Contraction time of the slowest unit, ms (tL).
    pub max_contraction_time: f64,

    /// Ratio of the slowest to the fastest contraction time (RT).
    pub contraction_time_range: f64,

    /// Fatigue rate of the largest unit relative to its peak force.
    pub max_fatigue_rate: f64,

    /// Ratio of the largest to the smallest relative fatigue rate.
    pub fatigability_range: f64,

    /// Fractional contraction time increase per fractional force lost.
    pub contraction_time_change_ratio: f64,

    /// Whether capacity is depleted by activity.
    pub apply_fatigue: bool,

    /// Whether silent units recover capacity. Only acts with fatigue enabled.
    pub apply_recovery: bool,

    /// `max_fatigue_rate / recovery_divisor` is the largest recovery rate.
    /// Averaged from Liu et al. (2002), Table 2.
    pub recovery_divisor: f64,

    /// Newtons per arbitrary force unit.
    pub force_conversion_factor: f64,
}

impl Default for MuscleFiberConfig {
    fn default() -> Self {
        Self {
            motor_unit_count: 120,
            max_twitch_amplitude: 100.0,
            max_contraction_time: 90.0,
            contraction_time_range: 3.0,
            max_fatigue_rate: 0.0225,
            fatigability_range: 180.0,
            contraction_time_change_ratio: 0.379,
            apply_fatigue: true,
            apply_recovery: false,
            recovery_divisor: 2.53,
            force_conversion_factor: 0.028,
        }
    }
}

impl MuscleFiberConfig {
    /// Default configuration with the given number of motor units.
    #[must_use]
    pub fn with_motor_units(motor_unit_count: usize) -> Self {
        Self {
            motor_unit_count,
            ..Default::default()
        }
    }

    /// Fibers with both fatigue and recovery.
    #[must_use]
    pub fn recovering(motor_unit_count: usize) -> Self {
        Self {
            motor_unit_count,
            apply_recovery: true,
            ..Default::default()
        }
    }

    /// Enable or disable fatigue.
    #[must_use]
    pub fn with_fatigue(mut self, apply_fatigue: bool) -> Self {
        self.apply_fatigue = apply_fatigue;
        self
    }

    /// Enable or disable recovery.
    #[must_use]
    pub fn with_recovery(mut self, apply_recovery: bool) -> Self {
        self.apply_recovery = apply_recovery;
        self
    }

    /// Set the newtons per arbitrary force unit.
    #[must_use]
    pub fn with_force_conversion_factor(mut self, factor: f64) -> Self {
        self.force_conversion_factor = factor;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        check_motor_unit_count(self.motor_unit_count)?;
        require_positive("max_twitch_amplitude", self.max_twitch_amplitude)?;
        require_positive("max_contraction_time", self.max_contraction_time)?;
        require_positive("contraction_time_range", self.contraction_time_range)?;
        require_positive("max_fatigue_rate", self.max_fatigue_rate)?;
        require_positive("fatigability_range", self.fatigability_range)?;
        require_positive("recovery_divisor", self.recovery_divisor)?;
        require_positive("force_conversion_factor", self.force_conversion_factor)?;
        require_non_negative(
            "contraction_time_change_ratio",
            self.contraction_time_change_ratio,
        )?;
        Ok(())
    }
}

/// The fibers of every motor unit in one muscle.
#[derive(Debug, Clone)]
pub struct MuscleFibers {
    config: MuscleFiberConfig,
    peak_twitch_forces: Vec<f64>,
    contraction_times: Vec<f64>,
    nominal_fatigabilities: Vec<f64>,
    recovery_rates: Option<Vec<f64>>,
    total_peak_force: f64,

    /// Present peak force of each unit, in `[0, peak_twitch_forces[i]]`.
    current_peak_forces: Vec<f64>,
    current_contraction_times: Vec<f64>,
    /// Per-unit force from the most recent step.
    current_forces: Vec<f64>,
}

impl MuscleFibers {
    /// Build a fiber population from its configuration.
    pub fn new(config: MuscleFiberConfig) -> Result<Self> {
        config.validate()?;

        let peak_twitch_forces =
            peak_twitch_forces(config.motor_unit_count, config.max_twitch_amplitude)?;
        let contraction_times = contraction_times(
            &peak_twitch_forces,
            config.max_twitch_amplitude,
            config.max_contraction_time,
            config.contraction_time_range,
        )?;
        let nominal_fatigabilities = nominal_fatigabilities(
            &peak_twitch_forces,
            config.fatigability_range,
            config.max_fatigue_rate,
        )?;
        let recovery_rates = if config.apply_recovery {
            Some(recovery_rates(
                &peak_twitch_forces,
                &nominal_fatigabilities,
                config.max_fatigue_rate,
                config.recovery_divisor,
            )?)
        } else {
            None
        };
        let total_peak_force = total_twitch_force(&peak_twitch_forces);

        debug!(
            motor_unit_count = config.motor_unit_count,
            total_peak_force,
            apply_fatigue = config.apply_fatigue,
            apply_recovery = config.apply_recovery,
            "created muscle fibers"
        );

        Ok(Self {
            current_peak_forces: peak_twitch_forces.clone(),
            current_contraction_times: contraction_times.clone(),
            current_forces: vec![0.0; config.motor_unit_count],
            peak_twitch_forces,
            contraction_times,
            nominal_fatigabilities,
            recovery_rates,
            total_peak_force,
            config,
        })
    }

    /// Build default fibers with the given number of motor units.
    pub fn with_motor_units(motor_unit_count: usize) -> Result<Self> {
        Self::new(MuscleFiberConfig::with_motor_units(motor_unit_count))
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &MuscleFiberConfig {
        &self.config
    }

    /// Number of motor units.
    #[must_use]
    pub fn motor_unit_count(&self) -> usize {
        self.config.motor_unit_count
    }

    /// Rested peak twitch force of each unit.
    #[must_use]
    pub fn peak_twitch_forces(&self) -> &[f64] {
        &self.peak_twitch_forces
    }

    /// Rested contraction time of each unit (ms).
    #[must_use]
    pub fn contraction_times(&self) -> &[f64] {
        &self.contraction_times
    }

    /// Nominal fatigability of each unit.
    #[must_use]
    pub fn nominal_fatigabilities(&self) -> &[f64] {
        &self.nominal_fatigabilities
    }

    /// Recovery rate of each unit, if recovery is enabled.
    #[must_use]
    pub fn recovery_rates(&self) -> Option<&[f64]> {
        self.recovery_rates.as_deref()
    }

    /// Present peak force of each unit.
    #[must_use]
    pub fn current_peak_forces(&self) -> &[f64] {
        &self.current_peak_forces
    }

    /// Present contraction time of each unit (ms).
    #[must_use]
    pub fn current_contraction_times(&self) -> &[f64] {
        &self.current_contraction_times
    }

    /// Per-unit force from the most recent step. Zero before the first step.
    #[must_use]
    pub fn current_forces(&self) -> &[f64] {
        &self.current_forces
    }

    /// Theoretical maximum force of the rested population, arbitrary units.
    #[must_use]
    pub fn total_peak_force(&self) -> f64 {
        self.total_peak_force
    }

    /// Remaining capacity as a fraction of the rested total.
    #[must_use]
    pub fn capacity_fraction(&self) -> f64 {
        total_twitch_force(&self.current_peak_forces) / self.total_peak_force
    }

    /// Newtons per arbitrary force unit.
    #[must_use]
    pub fn force_conversion_factor(&self) -> f64 {
        self.config.force_conversion_factor
    }

    /// Convert a force in arbitrary units to newtons.
    #[must_use]
    pub fn to_newtons(&self, force: f64) -> f64 {
        force * self.config.force_conversion_factor
    }

    /// Advance the fibers by `dt` seconds.
    ///
    /// Returns the total instantaneous force in arbitrary units. Inputs are
    /// validated before any state changes.
    pub fn step(&mut self, firing_rates: &[f64], dt: f64) -> Result<f64> {
        self.check_firing_rates(firing_rates, dt)?;

        let fractions = self.force_fractions(firing_rates);
        for ((force, &frac), &peak) in self
            .current_forces
            .iter_mut()
            .zip(&fractions)
            .zip(&self.current_peak_forces)
        {
            *force = frac * peak;
        }
        let total_force: f64 = self.current_forces.iter().sum();

        if self.config.apply_fatigue {
            self.update_capacity(&fractions, dt);
        }

        Ok(total_force)
    }

    /// Force the next [`step`](Self::step) would return for these rates,
    /// without advancing any state.
    pub fn preview_force(&self, firing_rates: &[f64]) -> Result<f64> {
        self.check_firing_rates(firing_rates, 0.0)?;
        Ok(self
            .force_fractions(firing_rates)
            .iter()
            .zip(&self.current_peak_forces)
            .map(|(frac, peak)| frac * peak)
            .sum())
    }

    /// Restore the rested state.
    pub fn reset(&mut self) {
        self.current_peak_forces
            .copy_from_slice(&self.peak_twitch_forces);
        self.current_contraction_times
            .copy_from_slice(&self.contraction_times);
        self.current_forces.fill(0.0);
    }

    fn check_firing_rates(&self, firing_rates: &[f64], dt: f64) -> Result<()> {
        check_step_input(firing_rates, self.motor_unit_count(), dt)?;
        if let Some((index, &value)) = firing_rates.iter().enumerate().find(|(_, r)| **r < 0.0) {
            return Err(MotorUnitError::NegativeFiringRate { index, value });
        }
        Ok(())
    }

    fn force_fractions(&self, firing_rates: &[f64]) -> Vec<f64> {
        firing_rates
            .iter()
            .zip(&self.current_contraction_times)
            .map(|(&rate, &ct)| normalized_force(normalized_stimulus_rate(ct, rate)))
            .collect()
    }

    fn update_capacity(&mut self, fractions: &[f64], dt: f64) {
        let ratio = self.config.contraction_time_change_ratio;

        for i in 0..self.current_peak_forces.len() {
            let peak = self.peak_twitch_forces[i];
            let mut current =
                self.current_peak_forces[i] - self.nominal_fatigabilities[i] * fractions[i] * dt;

            if let Some(recovery) = &self.recovery_rates {
                if fractions[i] <= 0.0 {
                    current += recovery[i] * ((peak - current) / peak) * dt;
                }
            }

            let current = current.clamp(0.0, peak);
            self.current_peak_forces[i] = current;
            self.current_contraction_times[i] =
                self.contraction_times[i] * (1.0 + ratio * (1.0 - current / peak));
        }
    }
}
