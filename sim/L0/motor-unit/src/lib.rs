//! Motor-unit based muscle force and fatigue simulation.
//!
//! This crate models a skeletal muscle as a population of motor units. Each
//! unit has its own recruitment threshold, firing-rate range, twitch force,
//! contraction time and fatigability. Driving the population with a
//! time-varying excitation produces a force that fades under sustained
//! effort, as real muscle does.
//!
//! # Two-Stage Model
//!
//! The model follows Potvin & Fuglevand (2017):
//!
//! 1. **Motor neuron pool**: excitation → per-unit firing rates
//!    - Size-ordered recruitment (small units first)
//!    - Linear rate coding above threshold, capped at each unit's peak rate
//!    - Firing-rate adaptation during sustained recruitment (central fatigue)
//!
//! 2. **Muscle fibers**: firing rates → force
//!    - Force-frequency relationship scaled by each unit's contraction time
//!    - Capacity depletion under activity (peripheral fatigue)
//!    - Optional recovery while a unit is silent
//!
//! ```text
//!                 ┌──────────────────────────────────────────┐
//!                 │                  Muscle                  │
//!                 │                                          │
//!   Excitation ──►│  ┌──────────┐   rates   ┌────────────┐   │
//!   (scalar or    │  │   Pool   │──────────►│   Fibers   │───┼──► Force
//!    per unit)    │  └──────────┘           └────────────┘   │
//!                 │   thresholds             twitch forces   │
//!                 │   durations              capacity, CT    │
//!                 └──────────────────────────────────────────┘
//! ```
//!
//! # Quick Start
//!
//! ```
//! use sim_motor_unit::{Muscle, PotvinFuglevandOptions};
//!
//! # fn main() -> sim_motor_unit::Result<()> {
//! let mut muscle = Muscle::potvin_fuglevand(120, PotvinFuglevandOptions::default())?;
//!
//! // Hold a moderate contraction for ten seconds
//! let dt = 0.1;
//! let mut force = 0.0;
//! for _ in 0..100 {
//!     force = muscle.step(40.0, dt)?;
//! }
//! println!("force after 10 s: {force:.1} (max {:.1})", muscle.total_peak_force());
//! # Ok(())
//! # }
//! ```
//!
//! # Normalized Muscles
//!
//! [`StandardMuscle`] takes excitation in `[0, 1]` and reports force as a
//! fraction of its rested maximum. Its unit count is derived from a maximum
//! force in newtons. This is the convenient form for driving an actuator in
//! a physics engine.
//!
//! # Target Force Search
//!
//! [`ExcitationSearch`] finds the smallest excitation that meets a target
//! force under the current fatigue state. [`TargetForceDriver`] uses it to
//! replay a target force time-history through a muscle.
//!
//! # Layer 0 Crate
//!
//! This is a Layer 0 crate with **zero Bevy dependencies**. It can be used in
//! headless loops, analysis tools, or alongside any physics engine.
//!
//! # References
//!
//! - Fuglevand, A.J., Winter, D.A., Patla, A.E. (1993). Models of recruitment
//!   and rate coding organization in motor-unit pools.
//! - Revill, A.L., Fuglevand, A.J. (2011). Effects of persistent inward
//!   currents, accommodation, and adaptation on motor unit behavior.
//! - Potvin, J.R., Fuglevand, A.J. (2017). A motor unit-based model of muscle
//!   fatigue.

#![doc(html_root_url = "https://docs.rs/sim-motor-unit/0.1.0")]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![warn(missing_docs)]
#![allow(
    clippy::missing_const_for_fn,
    clippy::module_name_repetitions,
    clippy::doc_markdown,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::similar_names,
    clippy::too_many_lines,
    clippy::suboptimal_flops,
    clippy::cast_possible_truncation,
    clippy::cast_precision_loss,
    clippy::cast_sign_loss,
    clippy::cast_lossless,
    clippy::derivable_impls,
    clippy::imprecise_flops,
    clippy::needless_range_loop
)]
#![cfg_attr(test, allow(clippy::float_cmp, clippy::let_underscore_must_use))]

pub mod curves;
pub mod error;
pub mod fibers;
pub mod muscle;
pub mod pool;
pub mod population;
pub mod rate_table;
pub mod search;

// Re-export main types at crate root
pub use curves::{
    normalized_force, normalized_stimulus_rate, ContractileForceLengthCurve,
    ContractileForceVelocityCurve,
};
pub use error::{MotorUnitError, Result};
pub use fibers::{MuscleFiberConfig, MuscleFibers};
pub use muscle::{Muscle, PoolInput, PotvinFuglevandOptions, StandardMuscle, StandardMuscleConfig};
pub use pool::{MotorNeuronPool, MotorNeuronPoolConfig};
pub use population::{motor_unit_count_for_force, PopulationIntrinsics};
pub use rate_table::FiringRateTable;
pub use search::{ExcitationSearch, SearchOutcome, TargetForceDriver, TrialRecord};

/// A steppable motor-unit population.
///
/// Pools and fiber populations share nothing but this contract: a fixed
/// unit count and a step taking one value per unit. [`Muscle`] pairs any
/// pool with any fiber population through it.
pub trait PopulationModel {
    /// What one step produces.
    type Output;

    /// Number of motor units.
    fn motor_unit_count(&self) -> usize;

    /// Advance by `dt` seconds.
    ///
    /// # Arguments
    ///
    /// * `input` - One value per motor unit
    /// * `dt` - Timestep (seconds)
    fn step(&mut self, input: &[f64], dt: f64) -> Result<Self::Output>;

    /// What [`step`](Self::step) would return, without changing state.
    fn preview(&self, input: &[f64]) -> Result<Self::Output>;

    /// Restore the rested state.
    fn reset(&mut self);
}

impl PopulationModel for MotorNeuronPool {
    type Output = Vec<f64>;

    fn motor_unit_count(&self) -> usize {
        self.motor_unit_count()
    }

    fn step(&mut self, input: &[f64], dt: f64) -> Result<Vec<f64>> {
        self.step(input, dt)
    }

    fn preview(&self, input: &[f64]) -> Result<Vec<f64>> {
        self.preview(input)
    }

    fn reset(&mut self) {
        self.reset();
    }
}

impl PopulationModel for MuscleFibers {
    type Output = f64;

    fn motor_unit_count(&self) -> usize {
        self.motor_unit_count()
    }

    fn step(&mut self, input: &[f64], dt: f64) -> Result<f64> {
        self.step(input, dt)
    }

    fn preview(&self, input: &[f64]) -> Result<f64> {
        self.preview_force(input)
    }

    fn reset(&mut self) {
        self.reset();
    }
}
