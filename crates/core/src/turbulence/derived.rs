//! Turbulence quantities derived from the canonical path parameters
//!
//! All of r0, per-screen r0, Rytov variance, log-amplitude variance, phase
//! variance and coherence radius come out of [`TurbulencePath::derive`]. When a
//! canonical input changes (for example when turbulence strength is re-targeted
//! by Rytov number) the whole set is re-derived from scratch.
//!
//! Plane-wave weak-fluctuation expressions, k = 2π/λ:
//!
//! ```text
//! r0      = (0.423 k² Cn² L)^(-3/5)
//! σ_R²    = 1.23 Cn² k^(7/6) L^(11/6)
//! σ_χ²    = 0.307 Cn² k^(7/6) L^(11/6)
//! σ_φ²    = 0.78 Cn² k² L L0^(5/3)
//! ρ0      = (1.46 Cn² k² L)^(-3/5)
//! ```
//!
//! # References
//! - Andrews, L.C. & Phillips, R.L. (2005) "Laser Beam Propagation through Random Media"
//! - Schmidt, J.D. (2010) "Numerical Simulation of Optical Wave Propagation", ch. 9

use crate::error::{require_positive, ConfigError};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Equal-strength split of a path r0 across `num_screens` thin screens
///
/// Every screen carries the same integrated Cn², independent of its position
/// along the path: `r0_screen = r0_total / NumScr^(-3/5)`.
pub fn equal_strength_r0(r0_total: f64, num_screens: usize) -> f64 {
    r0_total / (num_screens as f64).powf(-3.0 / 5.0)
}

/// Canonical inputs: everything else is derived from these
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TurbulencePath {
    /// Optical wavelength λ (m)
    pub wavelength: f64,
    /// Total propagation distance L (m)
    pub path_length: f64,
    /// Refractive-index structure constant Cn² (m^-2/3)
    pub cn2: f64,
    /// Outer scale L0 (m)
    pub outer_scale: f64,
    /// Number of phase screens the path is split into
    pub num_screens: usize,
}

/// Quantities derived from a [`TurbulencePath`]
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DerivedTurbulence {
    /// Optical wavenumber k = 2π/λ (rad/m)
    pub wavenumber: f64,
    /// Plane-wave Fried parameter over the full path (m)
    pub r0: f64,
    /// Fried parameter of each equal-strength screen (m)
    pub r0_screen: f64,
    /// Rytov variance σ_R²
    pub rytov_variance: f64,
    /// Rytov number σ_R
    pub rytov_number: f64,
    /// Log-amplitude variance σ_χ²
    pub log_amplitude_variance: f64,
    /// Phase variance σ_φ² (rad²)
    pub phase_variance: f64,
    /// Plane-wave coherence radius ρ0 (m)
    pub coherence_radius: f64,
}

impl TurbulencePath {
    /// Check the canonical inputs
    ///
    /// # Errors
    ///
    /// Any non-positive or non-finite value, or zero screens.
    pub fn validate(&self) -> Result<(), ConfigError> {
        require_positive("wavelength", self.wavelength)?;
        require_positive("path_length", self.path_length)?;
        require_positive("cn2", self.cn2)?;
        require_positive("L0", self.outer_scale)?;
        if self.num_screens == 0 {
            return Err(ConfigError::InvalidCount {
                name: "num_screens",
                value: 0,
                reason: "at least one phase screen is required",
            });
        }
        Ok(())
    }

    /// Optical wavenumber k = 2π/λ
    pub fn wavenumber(&self) -> f64 {
        2.0 * PI / self.wavelength
    }

    /// Derive every dependent quantity
    pub fn derive(&self) -> DerivedTurbulence {
        let k = self.wavenumber();
        let l = self.path_length;
        let cn2 = self.cn2;

        let r0 = (0.423 * k * k * cn2 * l).powf(-3.0 / 5.0);
        let rytov_variance = 1.23 * cn2 * k.powf(7.0 / 6.0) * l.powf(11.0 / 6.0);

        DerivedTurbulence {
            wavenumber: k,
            r0,
            r0_screen: equal_strength_r0(r0, self.num_screens),
            rytov_variance,
            rytov_number: rytov_variance.sqrt(),
            log_amplitude_variance: 0.307 * cn2 * k.powf(7.0 / 6.0) * l.powf(11.0 / 6.0),
            phase_variance: 0.78 * cn2 * k * k * l * self.outer_scale.powf(5.0 / 3.0),
            coherence_radius: (1.46 * cn2 * k * k * l).powf(-3.0 / 5.0),
        }
    }

    /// Copy of this path with Cn² chosen to produce Rytov number `rytov_number`
    ///
    /// # Errors
    ///
    /// `rytov_number` must be finite and positive.
    pub fn with_rytov_number(&self, rytov_number: f64) -> Result<Self, ConfigError> {
        require_positive("rytov_number", rytov_number)?;
        let k = self.wavenumber();
        let denominator = 1.23 * k.powf(7.0 / 6.0) * self.path_length.powf(11.0 / 6.0);
        Ok(Self {
            cn2: rytov_number * rytov_number / denominator,
            ..*self
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn path() -> TurbulencePath {
        TurbulencePath {
            wavelength: 1e-6,
            path_length: 10e3,
            cn2: 1e-16,
            outer_scale: 1e3,
            num_screens: 10,
        }
    }

    #[test]
    fn test_equal_strength_split() {
        assert_relative_eq!(equal_strength_r0(0.1, 1), 0.1, epsilon = 1e-15);
        assert_relative_eq!(
            equal_strength_r0(0.1, 10),
            0.1 * 10.0_f64.powf(0.6),
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_screen_r0_matches_per_segment_cn2() {
        // Equal split equals the r0 of one L/NumScr segment carrying the same Cn²
        let p = path();
        let d = p.derive();
        let segment = TurbulencePath {
            path_length: p.path_length / p.num_screens as f64,
            ..p
        };
        assert_relative_eq!(d.r0_screen, segment.derive().r0, max_relative = 1e-12);
    }

    #[test]
    fn test_known_values() {
        let d = path().derive();
        // (0.423 · (2π·1e6)² · 1e-16 · 1e4)^(-3/5)
        let k = 2.0 * PI * 1e6;
        assert_relative_eq!(d.wavenumber, k, max_relative = 1e-15);
        assert_relative_eq!(
            d.r0,
            (0.423 * k * k * 1e-12).powf(-0.6),
            max_relative = 1e-12
        );
        assert!(d.r0 > 0.01 && d.r0 < 0.2, "r0 = {}", d.r0);
        assert_relative_eq!(d.rytov_number * d.rytov_number, d.rytov_variance, max_relative = 1e-12);
        assert_relative_eq!(
            d.log_amplitude_variance / d.rytov_variance,
            0.307 / 1.23,
            max_relative = 1e-12
        );
    }

    #[test]
    fn test_rytov_retarget_rederives_everything() {
        let p = path();
        let retargeted = p.with_rytov_number(0.5).unwrap();
        let d = retargeted.derive();
        assert_relative_eq!(d.rytov_number, 0.5, max_relative = 1e-12);

        // Same result as constructing from the implied Cn² directly
        let fresh = TurbulencePath {
            cn2: retargeted.cn2,
            ..p
        }
        .derive();
        assert_eq!(d, fresh);

        // Stronger turbulence shrinks r0
        assert!(p.with_rytov_number(1.0).unwrap().derive().r0 < d.r0);
    }

    #[test]
    fn test_validation() {
        let mut p = path();
        p.num_screens = 0;
        assert!(matches!(p.validate(), Err(ConfigError::InvalidCount { .. })));

        let p = TurbulencePath { cn2: -1.0, ..path() };
        assert!(p.validate().unwrap_err().to_string().contains("cn2"));
        assert!(path().with_rytov_number(f64::NAN).is_err());
    }
}
