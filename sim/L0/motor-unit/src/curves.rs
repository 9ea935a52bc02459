//! Force curves for motor units and contractile elements.
//!
//! # Force-Frequency Relationship
//!
//! A motor unit's force depends on how fast it is stimulated relative to its
//! twitch contraction time. The normalized stimulus rate
//!
//! ```text
//! s = CT (ms) · f (Hz) / 1000
//! ```
//!
//! is mapped to a fraction of full tetanic fusion. Above `s = 0.4` the
//! Fuglevand (1993) sigmoid `1 − exp(−2 s³)` applies. Below it, force rises
//! linearly to meet the sigmoid at 0.4.
//!
//! ```text
//!  1.0 ┤                      ______________
//!      │                 ___/
//!      │              _/
//!      │            /     sigmoid
//!  sPr ┤ ─ ─ ─ ─ ─ ●
//!      │       __/   linear
//!    0 ┼──/────────┬───────────────────────
//!      0          0.4                  s
//! ```
//!
//! # Contractile Element Curves
//!
//! Two auxiliary Hill-type multipliers are provided for callers that couple
//! the population force to a physics engine. Passive elements, tendon and
//! pennation are left to the host simulator.
//!
//! # References
//!
//! - Fuglevand, A.J., Winter, D.A., Patla, A.E. (1993). Models of recruitment
//!   and rate coding organization in motor-unit pools.
//! - Aubert, X. (1951). Optimal length for force in frog sartorius.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Normalized stimulus rate below which the force-frequency curve is linear.
pub const LINEAR_STIMULUS_LIMIT: f64 = 0.4;

/// Sigmoid force fraction `1 − exp(−2 s³)`.
fn sigmoid_force(normalized_rate: f64) -> f64 {
    1.0 - (-2.0 * normalized_rate.powi(3)).exp()
}

/// Normalized stimulus rate of a unit with the given contraction time (ms)
/// firing at `firing_rate` (Hz).
#[must_use]
pub fn normalized_stimulus_rate(contraction_time: f64, firing_rate: f64) -> f64 {
    contraction_time * (firing_rate / 1000.0)
}

/// Fraction of peak twitch force produced at a normalized stimulus rate.
///
/// Monotonically non-decreasing in `normalized_rate`. Returns 0 at 0 and
/// approaches 1 for high rates.
#[must_use]
pub fn normalized_force(normalized_rate: f64) -> f64 {
    if normalized_rate <= LINEAR_STIMULUS_LIMIT {
        let at_limit = sigmoid_force(LINEAR_STIMULUS_LIMIT);
        at_limit * (normalized_rate / LINEAR_STIMULUS_LIMIT)
    } else {
        sigmoid_force(normalized_rate)
    }
}

/// Contractile element force-length multiplier.
///
/// A gaussian-like bell in the length normalized to *rest* length (not to
/// optimal length, as Anderson and others do), peaking at
/// `peak_force_length`:
///
/// ```text
/// F_l = exp(−w · |L / L_rest − L_peak|³)
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContractileForceLengthCurve {
    /// Width factor `w`. Larger values narrow the curve.
    pub curve_width_factor: f64,

    /// Ratio of the length of maximum force to rest length.
    pub peak_force_length: f64,
}

impl Default for ContractileForceLengthCurve {
    fn default() -> Self {
        Self {
            curve_width_factor: 17.33,
            peak_force_length: 1.10, // Aubert 1951
        }
    }
}

impl ContractileForceLengthCurve {
    /// Create a force-length curve with custom parameters.
    #[must_use]
    pub fn new(curve_width_factor: f64, peak_force_length: f64) -> Self {
        Self {
            curve_width_factor: curve_width_factor.max(0.0),
            peak_force_length,
        }
    }

    /// Fraction of maximum contractile force at `current_length`.
    ///
    /// Returns a value in `(0, 1]`, 1 at the peak force length.
    #[must_use]
    pub fn evaluate(&self, rest_length: f64, current_length: f64) -> f64 {
        let normalized_length = current_length / rest_length;
        let distance = (normalized_length - self.peak_force_length).abs();
        (-self.curve_width_factor * distance.powi(3)).exp()
    }
}

/// Contractile element force-velocity multiplier.
///
/// A sigmoid in normalized shortening velocity. It falls toward 0 for fast
/// shortening, is ≈1 when isometric, and rises toward
/// `max_eccentric_multiple` when lengthening.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ContractileForceVelocityCurve {
    /// Shortening velocity (rest lengths per second) used for normalization.
    pub max_velocity: f64,

    /// Force multiple approached during fast lengthening.
    pub max_eccentric_multiple: f64,
}

impl Default for ContractileForceVelocityCurve {
    fn default() -> Self {
        Self {
            max_velocity: 3.0,
            max_eccentric_multiple: 1.8,
        }
    }
}

impl ContractileForceVelocityCurve {
    /// Create a force-velocity curve with custom parameters.
    #[must_use]
    pub fn new(max_velocity: f64, max_eccentric_multiple: f64) -> Self {
        Self {
            max_velocity: max_velocity.abs().max(f64::EPSILON),
            max_eccentric_multiple: max_eccentric_multiple.max(1.0),
        }
    }

    /// Force multiplier for a shortening velocity in rest lengths per second.
    ///
    /// Positive velocity is shortening.
    #[must_use]
    pub fn evaluate_velocity(&self, shortening_velocity: f64) -> f64 {
        let normalized_velocity = shortening_velocity / self.max_velocity;
        let exponent = (0.04 - normalized_velocity) / 0.18;
        let m = self.max_eccentric_multiple;
        m - m / (1.0 + exponent.exp())
    }

    /// Force multiplier from two successive muscle lengths `time_step`
    /// seconds apart.
    ///
    /// A non-positive `time_step` is treated as isometric.
    #[must_use]
    pub fn evaluate(
        &self,
        rest_length: f64,
        current_length: f64,
        prev_length: f64,
        time_step: f64,
    ) -> f64 {
        let velocity = if time_step > 0.0 {
            ((prev_length - current_length) / rest_length) / time_step
        } else {
            0.0
        };
        self.evaluate_velocity(velocity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_force_frequency_endpoints() {
        assert_relative_eq!(normalized_force(0.0), 0.0, epsilon = 1e-15);
        assert!(normalized_force(3.0) > 0.999);
        assert!(normalized_force(10.0) <= 1.0);
    }

    #[test]
    fn test_force_frequency_continuous_at_limit() {
        let below = normalized_force(LINEAR_STIMULUS_LIMIT);
        let above = normalized_force(LINEAR_STIMULUS_LIMIT + 1e-12);
        assert_relative_eq!(below, 1.0 - (-2.0 * 0.4_f64.powi(3)).exp(), epsilon = 1e-15);
        assert_relative_eq!(below, above, epsilon = 1e-9);
    }

    #[test]
    fn test_force_frequency_monotonic() {
        let mut previous = normalized_force(0.0);
        for i in 1..=2000 {
            let rate = i as f64 * 0.001;
            let force = normalized_force(rate);
            assert!(force >= previous, "not monotonic at {rate}");
            previous = force;
        }
    }

    #[test]
    fn test_linear_region() {
        let half = normalized_force(0.2);
        let full = normalized_force(0.4);
        assert_relative_eq!(half, full / 2.0, epsilon = 1e-15);
    }

    #[test]
    fn test_stimulus_rate() {
        assert_relative_eq!(normalized_stimulus_rate(90.0, 10.0), 0.9, epsilon = 1e-15);
        assert_relative_eq!(normalized_stimulus_rate(30.0, 0.0), 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_force_length_peak() {
        let curve = ContractileForceLengthCurve::default();
        assert_relative_eq!(curve.evaluate(1.0, 1.1), 1.0, epsilon = 1e-12);
        assert_relative_eq!(curve.evaluate(0.2, 0.22), 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_force_length_falls_off() {
        let curve = ContractileForceLengthCurve::default();
        let short = curve.evaluate(1.0, 0.7);
        let long = curve.evaluate(1.0, 1.5);

        assert!(short > 0.0 && short < 1.0);
        assert!(long > 0.0 && long < 1.0);
        // Symmetric about the peak
        assert_relative_eq!(curve.evaluate(1.0, 0.9), curve.evaluate(1.0, 1.3), epsilon = 1e-12);
    }

    #[test]
    fn test_force_velocity_isometric() {
        let curve = ContractileForceVelocityCurve::default();
        let isometric = curve.evaluate(1.0, 1.0, 1.0, 0.01);
        assert_relative_eq!(isometric, 1.0, epsilon = 1e-3);
    }

    #[test]
    fn test_force_velocity_shortening_and_lengthening() {
        let curve = ContractileForceVelocityCurve::default();
        let shortening = curve.evaluate(1.0, 0.99, 1.0, 0.01);
        let lengthening = curve.evaluate(1.0, 1.01, 1.0, 0.01);

        assert!(shortening < 1.0);
        assert!(shortening > 0.0);
        assert!(lengthening > 1.0);
        assert!(lengthening < curve.max_eccentric_multiple);
    }

    #[test]
    fn test_force_velocity_zero_timestep() {
        let curve = ContractileForceVelocityCurve::default();
        assert_relative_eq!(
            curve.evaluate(1.0, 0.5, 1.0, 0.0),
            curve.evaluate_velocity(0.0),
            epsilon = 1e-15
        );
    }
}
