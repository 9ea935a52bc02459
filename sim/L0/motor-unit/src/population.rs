//! Per-unit intrinsic properties of a motor-unit population.
//!
//! A muscle is modeled as `n` motor units ordered by recruitment. Unit 0 is
//! the smallest: it is recruited first, fires fastest, is weakest and
//! fatigues least. The last unit is the largest. Every property is an
//! exponential (or linear-in-threshold) curve across the unit index, fixed
//! entirely by a handful of population-level parameters.
//!
//! ```text
//! thr[i] = exp(ln(R)  * i / (n - 1))           recruitment threshold, 1 ..= R
//! P[i]   = exp(ln(RP) * i / (n - 1))           peak twitch force,     1 ..= RP
//! ct[i]  = tL * (1 / P[i])^(1 / c)             contraction time (ms), c = ln(RP) / ln(RT)
//! F[i]   = exp(ln(FR) * i / (n - 1)) * (f / FR) * P[i]   nominal fatigability
//! ```
//!
//! All functions here are pure. The pool and fiber models call them once at
//! construction and own the resulting vectors exclusively.
//!
//! # References
//!
//! - Fuglevand, A.J., Winter, D.A., Patla, A.E. (1993). Models of recruitment
//!   and rate coding organization in motor-unit pools.
//! - Potvin, J.R., Fuglevand, A.J. (2017). A motor unit-based model of muscle
//!   fatigue.

use crate::error::{require_positive, MotorUnitError, Result};
use crate::fibers::MuscleFiberConfig;
use crate::pool::MotorNeuronPoolConfig;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Smallest population the index curves are defined for.
pub const MIN_MOTOR_UNIT_COUNT: usize = 2;

/// Reject populations too small for the `n - 1` denominators.
pub fn check_motor_unit_count(motor_unit_count: usize) -> Result<()> {
    if motor_unit_count < MIN_MOTOR_UNIT_COUNT {
        return Err(MotorUnitError::invalid_config(format!(
            "motor_unit_count must be at least {MIN_MOTOR_UNIT_COUNT}, got {motor_unit_count}"
        )));
    }
    Ok(())
}

/// `exp(ln(ratio) * i / (n - 1))` for every unit: 1 at the first unit,
/// `ratio` at the last.
fn exponential_range(motor_unit_count: usize, ratio: f64) -> Vec<f64> {
    let scale = ratio.ln() / (motor_unit_count - 1) as f64;
    (0..motor_unit_count)
        .map(|i| (scale * i as f64).exp())
        .collect()
}

/// Recruitment threshold excitation for each motor unit.
///
/// Ranges exponentially from 1 for the first unit to
/// `max_recruitment_threshold` for the last.
pub fn recruitment_thresholds(
    motor_unit_count: usize,
    max_recruitment_threshold: f64,
) -> Result<Vec<f64>> {
    check_motor_unit_count(motor_unit_count)?;
    require_positive("max_recruitment_threshold", max_recruitment_threshold)?;
    if max_recruitment_threshold <= 1.0 {
        return Err(MotorUnitError::invalid_config(format!(
            "max_recruitment_threshold must exceed 1, got {max_recruitment_threshold}"
        )));
    }
    Ok(exponential_range(motor_unit_count, max_recruitment_threshold))
}

/// Peak firing rate for each motor unit (Hz).
///
/// Interpolates linearly from `first_unit_rate` down to `last_unit_rate`,
/// keyed by where each unit's threshold sits within
/// `[thresholds[0], max_recruitment_threshold]`.
pub fn peak_firing_rates(
    thresholds: &[f64],
    max_recruitment_threshold: f64,
    first_unit_rate: f64,
    last_unit_rate: f64,
) -> Result<Vec<f64>> {
    let Some(&first_threshold) = thresholds.first() else {
        return Err(MotorUnitError::invalid_config(
            "cannot derive peak firing rates for an empty population",
        ));
    };
    require_positive("max_firing_rate_first_unit", first_unit_rate)?;
    require_positive("max_firing_rate_last_unit", last_unit_rate)?;

    let span = max_recruitment_threshold - first_threshold;
    if !(span.is_finite() && span > 0.0) {
        return Err(MotorUnitError::invalid_config(
            "max_recruitment_threshold must exceed the first unit's threshold",
        ));
    }

    let rate_range = first_unit_rate - last_unit_rate;
    Ok(thresholds
        .iter()
        .map(|&thr| first_unit_rate - rate_range * ((thr - first_threshold) / span))
        .collect())
}

/// Peak twitch force for each motor unit, in arbitrary force units.
///
/// Ranges exponentially from 1 to `max_twitch_amplitude`.
pub fn peak_twitch_forces(motor_unit_count: usize, max_twitch_amplitude: f64) -> Result<Vec<f64>> {
    check_motor_unit_count(motor_unit_count)?;
    if !(max_twitch_amplitude.is_finite() && max_twitch_amplitude > 1.0) {
        return Err(MotorUnitError::invalid_config(format!(
            "max_twitch_amplitude must exceed 1, got {max_twitch_amplitude}"
        )));
    }
    Ok(exponential_range(motor_unit_count, max_twitch_amplitude))
}

/// Rested contraction time for each motor unit (ms).
///
/// The weakest unit contracts in `max_contraction_time`; the strongest in
/// `max_contraction_time / contraction_time_range`.
pub fn contraction_times(
    twitch_forces: &[f64],
    max_twitch_amplitude: f64,
    max_contraction_time: f64,
    contraction_time_range: f64,
) -> Result<Vec<f64>> {
    require_positive("max_contraction_time", max_contraction_time)?;
    if !(contraction_time_range.is_finite() && contraction_time_range > 1.0) {
        return Err(MotorUnitError::invalid_config(format!(
            "contraction_time_range must exceed 1, got {contraction_time_range}"
        )));
    }
    if !(max_twitch_amplitude.is_finite() && max_twitch_amplitude > 1.0) {
        return Err(MotorUnitError::invalid_config(format!(
            "max_twitch_amplitude must exceed 1, got {max_twitch_amplitude}"
        )));
    }

    let exponent = contraction_time_range.ln() / max_twitch_amplitude.ln();
    Ok(twitch_forces
        .iter()
        .map(|&p| max_contraction_time * (1.0 / p).powf(exponent))
        .collect())
}

/// Nominal fatigability of each motor unit: force lost per second at full
/// activation.
///
/// The last unit fatigues `fatigability_range` times faster (relative to its
/// size) than the first. Rates are scaled by each unit's twitch force so
/// that they are absolute, not relative.
pub fn nominal_fatigabilities(
    twitch_forces: &[f64],
    fatigability_range: f64,
    max_fatigue_rate: f64,
) -> Result<Vec<f64>> {
    check_motor_unit_count(twitch_forces.len())?;
    require_positive("fatigability_range", fatigability_range)?;
    require_positive("max_fatigue_rate", max_fatigue_rate)?;

    let curve = exponential_range(twitch_forces.len(), fatigability_range);
    let scale = max_fatigue_rate / fatigability_range;
    Ok(curve
        .iter()
        .zip(twitch_forces)
        .map(|(c, p)| c * scale * p)
        .collect())
}

/// Recovery rate of each motor unit while it produces no force.
///
/// The largest recovery rate is `max_fatigue_rate / recovery_divisor`
/// (2.53, averaged from Liu et al. 2002). The curve is anchored so the first
/// unit recovers exactly as fast as it fatigues; larger units recover
/// progressively slower than they fatigue.
pub fn recovery_rates(
    twitch_forces: &[f64],
    fatigabilities: &[f64],
    max_fatigue_rate: f64,
    recovery_divisor: f64,
) -> Result<Vec<f64>> {
    require_positive("recovery_divisor", recovery_divisor)?;
    let Some(&first_fatigability) = fatigabilities.first() else {
        return Err(MotorUnitError::invalid_config(
            "cannot derive recovery rates for an empty population",
        ));
    };
    require_positive("first unit fatigability", first_fatigability)?;

    let max_recovery_rate = max_fatigue_rate / recovery_divisor;
    let recovery_range = max_recovery_rate / first_fatigability;
    nominal_fatigabilities(twitch_forces, recovery_range, max_recovery_rate)
}

/// Sum of all rested peak twitch forces: the theoretical maximum force of
/// the population in arbitrary units.
#[must_use]
pub fn total_twitch_force(twitch_forces: &[f64]) -> f64 {
    twitch_forces.iter().sum()
}

/// Smallest motor unit count whose theoretical maximum force reaches
/// `max_force` newtons.
///
/// The sum of an exponential range of twitch forces is well approximated by
///
/// ```text
/// Σ P[i] ≈ (n - 1) (RP - 1) / ln(RP) + (RP + 1) / 2
/// ```
///
/// which is inverted for `n`. For the default `RP = 100`, `ln(RP) ≈ 4.6` is
/// the fitted slope constant. The estimate is then corrected against the
/// exact sum so that `force_conversion_factor * Σ P[i] >= max_force` holds
/// for the returned count and fails for the count below it.
pub fn motor_unit_count_for_force(
    max_force: f64,
    force_conversion_factor: f64,
    max_twitch_amplitude: f64,
) -> Result<usize> {
    require_positive("max_force", max_force)?;
    require_positive("force_conversion_factor", force_conversion_factor)?;
    if !(max_twitch_amplitude.is_finite() && max_twitch_amplitude > 1.0) {
        return Err(MotorUnitError::invalid_config(format!(
            "max_twitch_amplitude must exceed 1, got {max_twitch_amplitude}"
        )));
    }

    let max_arbitrary_force = max_force / force_conversion_factor;
    let slope = max_twitch_amplitude.ln() / (max_twitch_amplitude - 1.0);
    let offset = (max_twitch_amplitude + 1.0) / 2.0;
    let estimate = ((max_arbitrary_force - offset) * slope).ceil() + 1.0;

    let mut count = if estimate.is_finite() && estimate > MIN_MOTOR_UNIT_COUNT as f64 {
        estimate as usize
    } else {
        MIN_MOTOR_UNIT_COUNT
    };

    let reaches = |n: usize| -> Result<bool> {
        let forces = peak_twitch_forces(n, max_twitch_amplitude)?;
        Ok(total_twitch_force(&forces) * force_conversion_factor >= max_force)
    };

    while !reaches(count)? {
        count += 1;
    }
    while count > MIN_MOTOR_UNIT_COUNT && reaches(count - 1)? {
        count -= 1;
    }

    Ok(count)
}

/// The full set of per-unit intrinsic properties for one population.
///
/// All sequences have `motor_unit_count` entries and index the same physical
/// motor unit. This is a read-only snapshot for reporting; the pool and
/// fibers each generate and own their own copies.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PopulationIntrinsics {
    motor_unit_count: usize,
    recruitment_thresholds: Vec<f64>,
    peak_firing_rates: Vec<f64>,
    peak_twitch_forces: Vec<f64>,
    contraction_times: Vec<f64>,
    nominal_fatigabilities: Vec<f64>,
    recovery_rates: Option<Vec<f64>>,
}

impl PopulationIntrinsics {
    /// Generate the intrinsics described by a pool and a fiber configuration.
    ///
    /// Recovery rates are only generated when the fiber configuration
    /// enables recovery.
    pub fn generate(pool: &MotorNeuronPoolConfig, fibers: &MuscleFiberConfig) -> Result<Self> {
        pool.validate()?;
        fibers.validate()?;
        if pool.motor_unit_count != fibers.motor_unit_count {
            return Err(MotorUnitError::UnitCountMismatch {
                pool: pool.motor_unit_count,
                fibers: fibers.motor_unit_count,
            });
        }

        let thresholds =
            recruitment_thresholds(pool.motor_unit_count, pool.max_recruitment_threshold)?;
        let firing_rates = peak_firing_rates(
            &thresholds,
            pool.max_recruitment_threshold,
            pool.max_firing_rate_first_unit,
            pool.max_firing_rate_last_unit,
        )?;
        let twitch_forces =
            peak_twitch_forces(fibers.motor_unit_count, fibers.max_twitch_amplitude)?;
        let times = contraction_times(
            &twitch_forces,
            fibers.max_twitch_amplitude,
            fibers.max_contraction_time,
            fibers.contraction_time_range,
        )?;
        let fatigabilities = nominal_fatigabilities(
            &twitch_forces,
            fibers.fatigability_range,
            fibers.max_fatigue_rate,
        )?;
        let recovery = if fibers.apply_recovery {
            Some(recovery_rates(
                &twitch_forces,
                &fatigabilities,
                fibers.max_fatigue_rate,
                fibers.recovery_divisor,
            )?)
        } else {
            None
        };

        Ok(Self {
            motor_unit_count: pool.motor_unit_count,
            recruitment_thresholds: thresholds,
            peak_firing_rates: firing_rates,
            peak_twitch_forces: twitch_forces,
            contraction_times: times,
            nominal_fatigabilities: fatigabilities,
            recovery_rates: recovery,
        })
    }

    /// Number of motor units.
    #[must_use]
    pub fn motor_unit_count(&self) -> usize {
        self.motor_unit_count
    }

    /// Recruitment threshold of each unit.
    #[must_use]
    pub fn recruitment_thresholds(&self) -> &[f64] {
        &self.recruitment_thresholds
    }

    /// Peak firing rate of each unit (Hz).
    #[must_use]
    pub fn peak_firing_rates(&self) -> &[f64] {
        &self.peak_firing_rates
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

    /// Recovery rate of each unit, if recovery is modeled.
    #[must_use]
    pub fn recovery_rates(&self) -> Option<&[f64]> {
        self.recovery_rates.as_deref()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_threshold_endpoints() {
        for &n in &[2, 3, 60, 120, 500] {
            let thr = recruitment_thresholds(n, 50.0).unwrap();
            assert_eq!(thr.len(), n);
            assert_relative_eq!(thr[0], 1.0, epsilon = 1e-12);
            assert_relative_eq!(thr[n - 1], 50.0, max_relative = 1e-12);
        }
    }

    #[test]
    fn test_thresholds_strictly_increasing() {
        let thr = recruitment_thresholds(120, 50.0).unwrap();
        assert!(thr.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_degenerate_population_rejected() {
        for n in [0, 1] {
            let err = recruitment_thresholds(n, 50.0).unwrap_err();
            assert!(err.is_config_error());
            assert!(peak_twitch_forces(n, 100.0).is_err());
        }
    }

    #[test]
    fn test_peak_firing_rates_decrease() {
        let thr = recruitment_thresholds(120, 50.0).unwrap();
        let rates = peak_firing_rates(&thr, 50.0, 35.0, 25.0).unwrap();

        assert_relative_eq!(rates[0], 35.0, epsilon = 1e-12);
        assert_relative_eq!(rates[119], 25.0, epsilon = 1e-12);
        assert!(rates.windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn test_twitch_forces_and_contraction_times() {
        let p = peak_twitch_forces(120, 100.0).unwrap();
        assert_relative_eq!(p[0], 1.0, epsilon = 1e-12);
        assert_relative_eq!(p[119], 100.0, max_relative = 1e-12);
        assert!(p.windows(2).all(|w| w[1] > w[0]));

        let ct = contraction_times(&p, 100.0, 90.0, 3.0).unwrap();
        assert_relative_eq!(ct[0], 90.0, epsilon = 1e-12);
        assert_relative_eq!(ct[119], 30.0, max_relative = 1e-12);
        assert!(ct.windows(2).all(|w| w[1] < w[0]));
    }

    #[test]
    fn test_fatigabilities_increase() {
        let p = peak_twitch_forces(120, 100.0).unwrap();
        let f = nominal_fatigabilities(&p, 180.0, 0.0225).unwrap();

        assert_relative_eq!(f[0], 0.0225 / 180.0, max_relative = 1e-12);
        assert_relative_eq!(f[119], 0.0225 * 100.0, max_relative = 1e-12);
        assert!(f.windows(2).all(|w| w[1] > w[0]));
    }

    #[test]
    fn test_recovery_never_exceeds_fatigue() {
        let p = peak_twitch_forces(120, 100.0).unwrap();
        let f = nominal_fatigabilities(&p, 180.0, 0.0225).unwrap();
        let r = recovery_rates(&p, &f, 0.0225, 2.53).unwrap();

        assert_relative_eq!(r[0], f[0], max_relative = 1e-12);
        for (rec, fat) in r.iter().zip(&f) {
            assert!(*rec <= *fat * (1.0 + 1e-12));
        }
        // Largest units recover far slower than they fatigue
        assert!(r[119] < 0.5 * f[119]);
    }

    #[test]
    fn test_motor_unit_count_for_force() {
        assert_eq!(motor_unit_count_for_force(32.0, 0.0123, 100.0).unwrap(), 120);
        assert_eq!(motor_unit_count_for_force(90.0, 0.0123, 100.0).unwrap(), 340);
    }

    #[test]
    fn test_motor_unit_count_meets_force() {
        for &force in &[0.5, 5.0, 32.0, 150.0, 1000.0] {
            let n = motor_unit_count_for_force(force, 0.0123, 100.0).unwrap();
            assert!(n >= MIN_MOTOR_UNIT_COUNT);
            let total = total_twitch_force(&peak_twitch_forces(n, 100.0).unwrap());
            assert!(total * 0.0123 >= force);
        }
        assert!(motor_unit_count_for_force(0.0, 0.0123, 100.0).is_err());
        assert!(motor_unit_count_for_force(32.0, -1.0, 100.0).is_err());
    }

    #[test]
    fn test_generate_intrinsics() {
        let pool = MotorNeuronPoolConfig::default();
        let fibers = MuscleFiberConfig::default();
        let intrinsics = PopulationIntrinsics::generate(&pool, &fibers).unwrap();

        assert_eq!(intrinsics.motor_unit_count(), 120);
        assert_eq!(intrinsics.recruitment_thresholds().len(), 120);
        assert_eq!(intrinsics.peak_firing_rates().len(), 120);
        assert_eq!(intrinsics.peak_twitch_forces().len(), 120);
        assert_eq!(intrinsics.contraction_times().len(), 120);
        assert_eq!(intrinsics.nominal_fatigabilities().len(), 120);
        assert!(intrinsics.recovery_rates().is_none());

        let with_recovery = fibers.with_recovery(true);
        let intrinsics = PopulationIntrinsics::generate(&pool, &with_recovery).unwrap();
        assert_eq!(intrinsics.recovery_rates().map(<[f64]>::len), Some(120));
    }

    #[test]
    fn test_generate_rejects_mismatch() {
        let pool = MotorNeuronPoolConfig::with_motor_units(60);
        let fibers = MuscleFiberConfig::with_motor_units(120);
        let err = PopulationIntrinsics::generate(&pool, &fibers).unwrap_err();
        assert_eq!(
            err,
            MotorUnitError::UnitCountMismatch {
                pool: 60,
                fibers: 120
            }
        );
    }
}
