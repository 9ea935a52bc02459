//! Muscle facade: excitation in, force out.
//!
//! A [`Muscle`] pairs one motor neuron pool with one fiber population of the
//! same size and runs them in sequence on every step:
//!
//! ```text
//! excitation ──► Pool.step ──► firing rates ──► Fibers.step ──► force
//! (scalar or      (adapts)                       (fatigues,
//!  per unit)                                      recovers)
//! ```
//!
//! Two presets are provided:
//!
//! - [`Muscle::potvin_fuglevand`]: the published model, with central and
//!   peripheral fatigue and no recovery.
//! - [`StandardMuscle`]: takes and returns values in `[0, 1]`, derives its
//!   unit count from a maximum force in newtons, and models peripheral
//!   fatigue with recovery but no central fatigue.

use std::borrow::Cow;

use tracing::debug;

use crate::error::{require_positive, MotorUnitError, Result};
use crate::fibers::{MuscleFiberConfig, MuscleFibers};
use crate::pool::{MotorNeuronPool, MotorNeuronPoolConfig};
use crate::population::motor_unit_count_for_force;
use crate::PopulationModel;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Excitation for one step: one value for every unit, or one value per unit.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PoolInput<'a> {
    /// The same excitation broadcast to every motor unit.
    Uniform(f64),
    /// One excitation per motor unit.
    PerUnit(&'a [f64]),
}

impl<'a> PoolInput<'a> {
    fn expand(self, motor_unit_count: usize) -> Cow<'a, [f64]> {
        match self {
            Self::Uniform(value) => Cow::Owned(vec![value; motor_unit_count]),
            Self::PerUnit(values) => Cow::Borrowed(values),
        }
    }

    fn scaled(self, motor_unit_count: usize, factor: f64) -> Vec<f64> {
        match self {
            Self::Uniform(value) => vec![value * factor; motor_unit_count],
            Self::PerUnit(values) => values.iter().map(|v| v * factor).collect(),
        }
    }
}

impl From<f64> for PoolInput<'_> {
    fn from(value: f64) -> Self {
        Self::Uniform(value)
    }
}

impl<'a> From<&'a [f64]> for PoolInput<'a> {
    fn from(values: &'a [f64]) -> Self {
        Self::PerUnit(values)
    }
}

impl<'a> From<&'a Vec<f64>> for PoolInput<'a> {
    fn from(values: &'a Vec<f64>) -> Self {
        Self::PerUnit(values)
    }
}

impl<'a, const N: usize> From<&'a [f64; N]> for PoolInput<'a> {
    fn from(values: &'a [f64; N]) -> Self {
        Self::PerUnit(values)
    }
}

/// A motor neuron pool driving a fiber population.
///
/// Owns both halves exclusively. Any pool producing firing rates and any
/// fiber population producing a force can be paired, provided their unit
/// counts agree.
#[derive(Debug, Clone)]
pub struct Muscle<P = MotorNeuronPool, F = MuscleFibers> {
    pool: P,
    fibers: F,
}

impl<P, F> Muscle<P, F>
where
    P: PopulationModel<Output = Vec<f64>>,
    F: PopulationModel<Output = f64>,
{
    /// Pair a pool with a fiber population.
    ///
    /// Fails with [`MotorUnitError::UnitCountMismatch`] if their unit counts
    /// differ.
    pub fn new(pool: P, fibers: F) -> Result<Self> {
        if pool.motor_unit_count() != fibers.motor_unit_count() {
            return Err(MotorUnitError::UnitCountMismatch {
                pool: pool.motor_unit_count(),
                fibers: fibers.motor_unit_count(),
            });
        }
        Ok(Self { pool, fibers })
    }

    /// Number of motor units.
    #[must_use]
    pub fn motor_unit_count(&self) -> usize {
        self.pool.motor_unit_count()
    }

    /// The motor neuron pool.
    #[must_use]
    pub fn pool(&self) -> &P {
        &self.pool
    }

    /// The fiber population.
    #[must_use]
    pub fn fibers(&self) -> &F {
        &self.fibers
    }

    /// Advance the muscle by `dt` seconds.
    ///
    /// Returns the total force in arbitrary units. The pool validates the
    /// input before either half changes state.
    pub fn step<'a>(&mut self, input: impl Into<PoolInput<'a>>, dt: f64) -> Result<f64> {
        let excitations = input.into().expand(self.motor_unit_count());
        let firing_rates = self.pool.step(&excitations, dt)?;
        self.fibers.step(&firing_rates, dt)
    }

    /// Force the next [`step`](Self::step) would return for this input,
    /// without advancing any state.
    pub fn preview_force<'a>(&self, input: impl Into<PoolInput<'a>>) -> Result<f64> {
        let excitations = input.into().expand(self.motor_unit_count());
        let firing_rates = self.pool.preview(&excitations)?;
        self.fibers.preview(&firing_rates)
    }

    /// Restore the rested state of both halves.
    pub fn reset(&mut self) {
        self.pool.reset();
        self.fibers.reset();
    }
}

/// Options for [`Muscle::potvin_fuglevand`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PotvinFuglevandOptions {
    /// Firing-rate adaptation in the pool.
    pub apply_central_fatigue: bool,
    /// Capacity depletion in the fibers.
    pub apply_peripheral_fatigue: bool,
    /// Tabulate firing rates for uniform excitation.
    pub pre_calc_firing_rates: bool,
}

impl Default for PotvinFuglevandOptions {
    fn default() -> Self {
        Self {
            apply_central_fatigue: true,
            apply_peripheral_fatigue: true,
            pre_calc_firing_rates: false,
        }
    }
}

impl Muscle {
    /// The Potvin & Fuglevand (2017) muscle with default population
    /// parameters.
    pub fn potvin_fuglevand(
        motor_unit_count: usize,
        options: PotvinFuglevandOptions,
    ) -> Result<Self> {
        let pool = MotorNeuronPool::new(
            MotorNeuronPoolConfig::with_motor_units(motor_unit_count)
                .with_fatigue(options.apply_central_fatigue)
                .with_rate_table(options.pre_calc_firing_rates),
        )?;
        let fibers = MuscleFibers::new(
            MuscleFiberConfig::with_motor_units(motor_unit_count)
                .with_fatigue(options.apply_peripheral_fatigue),
        )?;
        Self::new(pool, fibers)
    }

    /// Per-unit force from the most recent step.
    #[must_use]
    pub fn current_forces(&self) -> &[f64] {
        self.fibers.current_forces()
    }

    /// Excitation at which every unit fires at its peak rate.
    #[must_use]
    pub fn max_excitation(&self) -> f64 {
        self.pool.max_excitation()
    }

    /// Theoretical maximum force of the rested muscle, arbitrary units.
    #[must_use]
    pub fn total_peak_force(&self) -> f64 {
        self.fibers.total_peak_force()
    }
}

/// Configuration for a [`StandardMuscle`].
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct StandardMuscleConfig {
    /// Maximum force the rested muscle can produce, N.
    pub max_force: f64,

    /// Newtons per arbitrary force unit.
    pub force_conversion_factor: f64,

    /// Firing-rate adaptation in the pool.
    pub apply_central_fatigue: bool,

    /// Capacity depletion (and recovery) in the fibers.
    pub apply_peripheral_fatigue: bool,

    /// Tabulate firing rates for uniform excitation.
    pub pre_calc_firing_rates: bool,
}

impl Default for StandardMuscleConfig {
    fn default() -> Self {
        Self {
            max_force: 32.0,
            force_conversion_factor: 0.0123,
            apply_central_fatigue: false,
            apply_peripheral_fatigue: true,
            pre_calc_firing_rates: false,
        }
    }
}

impl StandardMuscleConfig {
    /// Default configuration for a muscle of the given maximum force (N).
    #[must_use]
    pub fn with_max_force(max_force: f64) -> Self {
        Self {
            max_force,
            ..Default::default()
        }
    }

    /// Enable or disable central fatigue.
    #[must_use]
    pub fn with_central_fatigue(mut self, apply: bool) -> Self {
        self.apply_central_fatigue = apply;
        self
    }

    /// Enable or disable peripheral fatigue.
    #[must_use]
    pub fn with_peripheral_fatigue(mut self, apply: bool) -> Self {
        self.apply_peripheral_fatigue = apply;
        self
    }

    /// Enable or disable the uniform-excitation firing-rate table.
    #[must_use]
    pub fn with_rate_table(mut self, pre_calc_firing_rates: bool) -> Self {
        self.pre_calc_firing_rates = pre_calc_firing_rates;
        self
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        require_positive("max_force", self.max_force)?;
        require_positive("force_conversion_factor", self.force_conversion_factor)?;
        Ok(())
    }
}

/// A muscle driven and read in normalized units.
///
/// Input excitation in `[0, 1]` is scaled to the pool's maximum excitation.
/// Output force is divided by the rested maximum, so a fresh muscle at full
/// excitation reports close to 1.
#[derive(Debug, Clone)]
pub struct StandardMuscle {
    config: StandardMuscleConfig,
    muscle: Muscle,
    last_force: f64,
}

impl StandardMuscle {
    /// Build a muscle whose rested maximum meets `config.max_force`.
    pub fn new(config: StandardMuscleConfig) -> Result<Self> {
        config.validate()?;

        let fiber_config = MuscleFiberConfig::default();
        let motor_unit_count = motor_unit_count_for_force(
            config.max_force,
            config.force_conversion_factor,
            fiber_config.max_twitch_amplitude,
        )?;
        debug!(
            max_force = config.max_force,
            motor_unit_count, "derived motor unit count"
        );

        let pool = MotorNeuronPool::new(
            MotorNeuronPoolConfig::with_motor_units(motor_unit_count)
                .with_fatigue(config.apply_central_fatigue)
                .with_rate_table(config.pre_calc_firing_rates),
        )?;
        let fibers = MuscleFibers::new(
            MuscleFiberConfig::recovering(motor_unit_count)
                .with_fatigue(config.apply_peripheral_fatigue)
                .with_force_conversion_factor(config.force_conversion_factor),
        )?;

        Ok(Self {
            muscle: Muscle::new(pool, fibers)?,
            config,
            last_force: 0.0,
        })
    }

    /// Get the configuration.
    #[must_use]
    pub fn config(&self) -> &StandardMuscleConfig {
        &self.config
    }

    /// Number of motor units derived from the maximum force.
    #[must_use]
    pub fn motor_unit_count(&self) -> usize {
        self.muscle.motor_unit_count()
    }

    /// Requested maximum force, N.
    #[must_use]
    pub fn max_force(&self) -> f64 {
        self.config.max_force
    }

    /// The underlying unnormalized muscle.
    #[must_use]
    pub fn muscle(&self) -> &Muscle {
        &self.muscle
    }

    /// Per-unit force from the most recent step, arbitrary units.
    #[must_use]
    pub fn current_forces(&self) -> &[f64] {
        self.muscle.current_forces()
    }

    /// Total force of the most recent step, N.
    #[must_use]
    pub fn last_force_newtons(&self) -> f64 {
        self.muscle.fibers().to_newtons(self.last_force)
    }

    /// Advance the muscle by `dt` seconds with excitation in `[0, 1]`.
    ///
    /// Returns force as a fraction of the rested maximum.
    pub fn step<'a>(&mut self, input: impl Into<PoolInput<'a>>, dt: f64) -> Result<f64> {
        let excitations = input
            .into()
            .scaled(self.motor_unit_count(), self.muscle.max_excitation());
        let force = self.muscle.step(&excitations, dt)?;
        self.last_force = force;
        Ok(force / self.muscle.total_peak_force())
    }

    /// Restore the rested state.
    pub fn reset(&mut self) {
        self.muscle.reset();
        self.last_force = 0.0;
    }
}
