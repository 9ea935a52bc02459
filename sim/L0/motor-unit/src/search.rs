//! Excitation search for a target force.
//!
//! Offline drivers replicate a measured force time-history. For each sample
//! they need the smallest excitation whose force meets the target under the
//! muscle's *current* fatigue state. Then they step once at that excitation.
//!
//! The search walks a grid of uniform excitation levels using non-mutating
//! previews:
//!
//! ```text
//! coarse:  lo ──hop──► ──hop──► ──hop──► ✓ overshoot
//! fine:               └──►──►──►──►──► ✓ first level meeting target
//! ```
//!
//! It relies on force rising with excitation. That holds for the default
//! population parameters but is not guaranteed for every configuration, so
//! a decrease observed along the walk is logged.

use tracing::{debug, warn};

use crate::error::{require_positive, MotorUnitError, Result};
use crate::muscle::Muscle;
use crate::rate_table::grid_divisions;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Target levels at which the rested lower bound is cached (per percent).
const LOWER_BOUND_LEVELS: usize = 100;

/// Grid search for the excitation that meets a target force.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ExcitationSearch {
    /// Spacing of the excitation grid. Must be `1/k` for whole `k`.
    pub resolution: f64,

    /// The coarse phase covers the grid in about this many hops.
    pub hop_divisions: usize,
}

impl Default for ExcitationSearch {
    fn default() -> Self {
        Self {
            resolution: 0.1,
            hop_divisions: 20,
        }
    }
}

/// Result of one excitation search.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct SearchOutcome {
    /// Uniform excitation found.
    pub excitation: f64,
    /// Force at that excitation, arbitrary units.
    pub force: f64,
    /// Whether the force meets the target. False only at max excitation.
    pub reached: bool,
    /// Number of force previews evaluated.
    pub evaluations: usize,
}

impl ExcitationSearch {
    /// Search with the given grid resolution.
    #[must_use]
    pub fn with_resolution(resolution: f64) -> Self {
        Self {
            resolution,
            ..Default::default()
        }
    }

    /// Set the number of coarse hops.
    #[must_use]
    pub fn with_hop_divisions(mut self, hop_divisions: usize) -> Self {
        self.hop_divisions = hop_divisions;
        self
    }

    /// Validate the search parameters.
    pub fn validate(&self) -> Result<()> {
        grid_divisions("resolution", self.resolution)?;
        if self.hop_divisions == 0 {
            return Err(MotorUnitError::invalid_config(
                "hop_divisions must be at least 1",
            ));
        }
        Ok(())
    }

    /// Find the smallest grid excitation whose force meets `target_force`
    /// (arbitrary units) without changing the muscle.
    ///
    /// The coarse phase starts from `lower_bound` when given. If even the
    /// maximum excitation falls short, the maximum is returned with
    /// `reached == false`.
    pub fn find(
        &self,
        muscle: &Muscle,
        target_force: f64,
        lower_bound: Option<f64>,
    ) -> Result<SearchOutcome> {
        self.validate()?;
        let divisions = grid_divisions("resolution", self.resolution)?;
        if !target_force.is_finite() {
            return Err(MotorUnitError::NonFiniteInput {
                index: 0,
                value: target_force,
            });
        }

        let max_excitation = muscle.max_excitation();
        let max_level = (max_excitation * divisions).ceil() as usize;
        let excitation_at = |level: usize| (level as f64 / divisions).min(max_excitation);

        let mut level = lower_bound
            .filter(|e| e.is_finite() && *e > 0.0)
            .map_or(0, |e| ((e * divisions).floor() as usize).min(max_level));
        let mut hop = ((max_level as f64 / self.hop_divisions as f64).round() as usize).max(1);

        let mut evaluations = 0;
        let mut last: Option<(usize, f64)> = None;
        let mut non_monotonic = false;

        loop {
            let excitation = excitation_at(level);
            let force = muscle.preview_force(excitation)?;
            evaluations += 1;

            if let Some((last_level, last_force)) = last {
                if level > last_level && force < last_force && !non_monotonic {
                    warn!(
                        excitation,
                        force, last_force, "force decreased with rising excitation"
                    );
                    non_monotonic = true;
                }
            }
            last = Some((level, force));

            if force >= target_force {
                if hop == 1 {
                    return Ok(SearchOutcome {
                        excitation,
                        force,
                        reached: true,
                        evaluations,
                    });
                }
                // Overshot: walk back up one level at a time
                level = level.saturating_sub(hop - 1);
                hop = 1;
                continue;
            }

            if level >= max_level {
                warn!(
                    target_force,
                    max_force = force,
                    "target force unreachable at max excitation"
                );
                return Ok(SearchOutcome {
                    excitation,
                    force,
                    reached: false,
                    evaluations,
                });
            }
            level = (level + hop).min(max_level);
        }
    }
}

/// One sample of a [`TargetForceDriver`] run.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TrialRecord {
    /// Simulated time at the start of the sample, seconds.
    pub time: f64,
    /// Target force, fraction of the rested maximum.
    pub target: f64,
    /// Uniform excitation applied.
    pub excitation: f64,
    /// Force produced, fraction of the rested maximum.
    pub force: f64,
    /// Force available at max excitation before stepping, fraction of the
    /// rested maximum.
    pub strength: f64,
    /// Whether the target was met.
    pub reached: bool,
}

/// Drives a muscle through a target force time-history.
///
/// For every sample it searches the excitation meeting the target, then
/// steps the muscle once at that excitation for `sample_period` seconds.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct TargetForceDriver {
    /// Excitation search settings.
    pub search: ExcitationSearch,
    /// Time between target samples, seconds.
    pub sample_period: f64,
}

impl TargetForceDriver {
    /// Driver for targets sampled at `sample_rate` Hz.
    pub fn new(sample_rate: f64) -> Result<Self> {
        require_positive("sample_rate", sample_rate)?;
        Ok(Self {
            search: ExcitationSearch::default(),
            sample_period: 1.0 / sample_rate,
        })
    }

    /// Replace the search settings.
    #[must_use]
    pub fn with_search(mut self, search: ExcitationSearch) -> Self {
        self.search = search;
        self
    }

    /// Run every target (fractions of the rested maximum) through `muscle`.
    ///
    /// Each search starts from the excitation the rested muscle needs for
    /// the target rounded down to a whole percent. Fatigue only raises the
    /// excitation required, so that is a lower bound.
    pub fn run(&self, muscle: &mut Muscle, targets: &[f64]) -> Result<Vec<TrialRecord>> {
        self.search.validate()?;
        require_positive("sample_period", self.sample_period)?;
        if let Some((index, &value)) = targets.iter().enumerate().find(|(_, t)| !t.is_finite()) {
            return Err(MotorUnitError::NonFiniteInput { index, value });
        }

        let max_force = muscle.total_peak_force();
        let max_excitation = muscle.max_excitation();
        let mut rested = muscle.clone();
        rested.reset();
        let mut lower_bounds: Vec<Option<f64>> = vec![None; LOWER_BOUND_LEVELS + 1];

        let mut records = Vec::with_capacity(targets.len());
        for (i, &target) in targets.iter().enumerate() {
            let percent = ((target * LOWER_BOUND_LEVELS as f64).floor().max(0.0) as usize)
                .min(LOWER_BOUND_LEVELS);
            let lower_bound = match lower_bounds[percent] {
                Some(bound) => bound,
                None => {
                    let floor_target = percent as f64 / LOWER_BOUND_LEVELS as f64 * max_force;
                    let bound = self.search.find(&rested, floor_target, None)?.excitation;
                    lower_bounds[percent] = Some(bound);
                    bound
                }
            };

            let strength = muscle.preview_force(max_excitation)? / max_force;
            let outcome = self
                .search
                .find(muscle, target * max_force, Some(lower_bound))?;
            let force = muscle.step(outcome.excitation, self.sample_period)?;

            records.push(TrialRecord {
                time: i as f64 * self.sample_period,
                target,
                excitation: outcome.excitation,
                force: force / max_force,
                strength,
                reached: outcome.reached,
            });
        }

        debug!(
            samples = records.len(),
            unreached = records.iter().filter(|r| !r.reached).count(),
            "target force run complete"
        );
        Ok(records)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::muscle::PotvinFuglevandOptions;

    fn muscle() -> Muscle {
        Muscle::potvin_fuglevand(120, PotvinFuglevandOptions::default()).unwrap()
    }

    #[test]
    fn test_finds_smallest_grid_level() {
        let muscle = muscle();
        let search = ExcitationSearch::default();
        let target = muscle.preview_force(40.0).unwrap();

        let outcome = search.find(&muscle, target, None).unwrap();
        assert!(outcome.reached);
        assert!(outcome.force >= target);
        assert!(outcome.excitation <= 40.0);

        let below = outcome.excitation - search.resolution;
        assert!(muscle.preview_force(below).unwrap() < target);
    }

    #[test]
    fn test_search_does_not_mutate() {
        let muscle = muscle();
        let before = muscle.pool().recruitment_durations().to_vec();
        let _ = ExcitationSearch::default().find(&muscle, 1500.0, None).unwrap();
        assert_eq!(muscle.pool().recruitment_durations(), before.as_slice());
        assert!(muscle.current_forces().iter().all(|&f| f == 0.0));
    }

    #[test]
    fn test_zero_target() {
        let outcome = ExcitationSearch::default().find(&muscle(), 0.0, None).unwrap();
        assert!(outcome.reached);
        assert_eq!(outcome.excitation, 0.0);
    }

    #[test]
    fn test_unreachable_target() {
        let muscle = muscle();
        let outcome = ExcitationSearch::default()
            .find(&muscle, 10.0 * muscle.total_peak_force(), None)
            .unwrap();
        assert!(!outcome.reached);
        assert_eq!(outcome.excitation, muscle.max_excitation());
    }

    #[test]
    fn test_lower_bound_same_answer() {
        let muscle = muscle();
        let search = ExcitationSearch::default();
        let target = 0.3 * muscle.total_peak_force();

        let unbounded = search.find(&muscle, target, None).unwrap();
        let bounded = search.find(&muscle, target, Some(20.0)).unwrap();
        assert_eq!(bounded.excitation, unbounded.excitation);
        assert!(bounded.evaluations <= unbounded.evaluations);
    }

    #[test]
    fn test_rejects_bad_settings() {
        let muscle = muscle();
        assert!(ExcitationSearch::with_resolution(0.3)
            .find(&muscle, 100.0, None)
            .is_err());
        assert!(ExcitationSearch::default()
            .with_hop_divisions(0)
            .validate()
            .is_err());
        assert!(ExcitationSearch::default()
            .find(&muscle, f64::NAN, None)
            .unwrap_err()
            .is_invalid_input());
        assert!(TargetForceDriver::new(0.0).is_err());
    }

    #[test]
    fn test_driver_tracks_constant_target() {
        let mut muscle = muscle();
        let driver = TargetForceDriver::new(1.0).unwrap();
        let targets = vec![0.3; 30];

        let records = driver.run(&mut muscle, &targets).unwrap();
        assert_eq!(records.len(), 30);

        for record in &records {
            assert!(record.reached);
            assert!(record.force >= record.target - 1e-12);
            assert!(record.strength >= record.force);
        }
        // Fatigue demands ever more excitation for the same force
        assert!(records[29].excitation > records[0].excitation);
        assert!(records[29].strength < records[0].strength);
        assert_eq!(records[5].time, 5.0);
    }

    #[test]
    fn test_driver_reports_unreached() {
        let mut muscle = muscle();
        let driver = TargetForceDriver::new(10.0).unwrap();
        let records = driver.run(&mut muscle, &[0.2, 1.5, 0.2]).unwrap();
        assert!(records[0].reached);
        assert!(!records[1].reached);
        assert_eq!(records[1].excitation, muscle.max_excitation());
    }
}
