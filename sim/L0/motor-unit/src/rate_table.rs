//! Pre-computed firing rates for uniform excitation.
//!
//! Building the unadapted firing-rate vector is a per-unit loop on every
//! step. When every unit receives the same excitation, the vector depends on
//! a single scalar, so it can be tabulated once over a grid of excitation
//! levels.
//!
//! The table only answers for a uniform input that lands *exactly* on a
//! grid level. Any other input (non-uniform across units, between levels,
//! or beyond the tabulated range) is a miss, and the caller recomputes. A
//! hit returns the same bits a recomputation would.

use crate::error::{require_positive, MotorUnitError, Result};

/// Number of grid levels per unit of excitation for a `1/k` resolution.
///
/// Levels are then `k / divisions`, which land on the same doubles as the
/// decimal literals callers write (`33.5`, `40.1`), unlike `k * resolution`.
pub(crate) fn grid_divisions(name: &str, resolution: f64) -> Result<f64> {
    require_positive(name, resolution)?;
    let divisions = (1.0 / resolution).round();
    if divisions < 1.0 || ((1.0 / resolution) - divisions).abs() > 1e-9 * divisions {
        return Err(MotorUnitError::invalid_config(format!(
            "{name} must be 1/k for a whole number k, got {resolution}"
        )));
    }
    Ok(divisions)
}

/// Firing rates for every motor unit at evenly spaced excitation levels.
#[derive(Debug, Clone, PartialEq)]
pub struct FiringRateTable {
    /// Grid levels per unit of excitation (10 for a 0.1 resolution).
    divisions: f64,
    /// `levels[k]` holds the rates at excitation `k / divisions`.
    levels: Vec<Vec<f64>>,
}

impl FiringRateTable {
    /// Tabulate `rates_at` from excitation 0 up to and including
    /// `max_excitation`, every `resolution`.
    ///
    /// `resolution` must divide 1 into a whole number of steps (0.5, 0.1,
    /// 0.01, ...), so grid levels coincide with the decimal values callers
    /// actually pass in.
    pub fn build(
        resolution: f64,
        max_excitation: f64,
        rates_at: impl Fn(f64) -> Vec<f64>,
    ) -> Result<Self> {
        let divisions = grid_divisions("pre_calc_resolution", resolution)?;
        require_positive("pre_calc_max", max_excitation)?;

        let steps = (max_excitation * divisions).floor() as usize;
        let levels = (0..=steps)
            .map(|k| rates_at(k as f64 / divisions))
            .collect();

        Ok(Self { divisions, levels })
    }

    /// Number of tabulated excitation levels.
    #[must_use]
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    /// Check if the table holds no levels.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Highest tabulated excitation.
    #[must_use]
    pub fn max_excitation(&self) -> f64 {
        self.levels.len().saturating_sub(1) as f64 / self.divisions
    }

    /// Rates at exactly `excitation`, if it is a tabulated level.
    #[must_use]
    pub fn lookup(&self, excitation: f64) -> Option<&[f64]> {
        if !excitation.is_finite() || excitation < 0.0 {
            return None;
        }
        let k = (excitation * self.divisions).round();
        if k / self.divisions != excitation {
            return None;
        }
        self.levels.get(k as usize).map(Vec::as_slice)
    }

    /// Rates for a per-unit excitation vector, if every unit receives the
    /// same tabulated excitation.
    #[must_use]
    pub fn lookup_uniform(&self, excitations: &[f64]) -> Option<&[f64]> {
        let (&first, rest) = excitations.split_first()?;
        if rest.iter().any(|&e| e != first) {
            return None;
        }
        self.lookup(first)
    }
}
