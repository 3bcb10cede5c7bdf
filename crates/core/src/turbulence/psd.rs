//! Phase power spectral density of atmospheric turbulence
//!
//! Implements the generalized (non-Kolmogorov) modified von Kármán phase PSD:
//!
//! ```text
//! Φ(f) = A(α) · (b·c)^(-α/2) · r0^(2-α) · exp(-(f/fm)²) / (f² + f0²)^(α/2)
//! ```
//!
//! Where:
//! - `α`: power-law exponent (11/3 for Kolmogorov turbulence)
//! - `A(α)`: Stribling consistency parameter × Charnotskii/Bos generalized amplitude
//!   (≈ 0.023 for α = 11/3)
//! - `f0 = 1/L0`: outer-scale cutoff, zero for the Kolmogorov model
//! - `fm = c_α / l0`: inner-scale cutoff, only for the modified von Kármán model
//! - `b`, `c = 1`: anisotropy magnitudes applied after rotating the frequency plane
//!
//! On a discrete grid the DC bin is forced to zero, and a non-Kolmogorov exponent
//! is rescaled so the grid's total power matches the α = 11/3 spectrum with the
//! same parameters.
//!
//! # References
//! - Stribling, B.E. (1995) "Laser beam propagation in non-Kolmogorov atmospheric turbulence"
//! - Toselli, I. et al. (2008) "Angle-of-arrival fluctuations for free space laser beam
//!   propagation through non-Kolmogorov turbulence"
//! - Schmidt, J.D. (2010) "Numerical Simulation of Optical Wave Propagation", ch. 9

use crate::error::{require_positive, ConfigError};
use crate::grid::SampledPlane;
use nalgebra::{Matrix2, Rotation2, Vector2};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use statrs::function::gamma::gamma;
use std::f64::consts::PI;

/// Kolmogorov power-law exponent
pub const KOLMOGOROV_EXPONENT: f64 = 11.0 / 3.0;

/// Spectral shape of the turbulence, each variant carrying the scales it needs
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PsdModel {
    /// Pure power law, no outer or inner scale
    Kolmogorov,
    /// Power law with outer-scale cutoff
    VonKarman {
        /// Outer scale L0 (m)
        outer_scale: f64,
    },
    /// Power law with outer-scale cutoff and inner-scale damping
    ModifiedVonKarman {
        /// Outer scale L0 (m)
        outer_scale: f64,
        /// Inner scale l0 (m)
        inner_scale: f64,
    },
}

impl PsdModel {
    /// Name used in name-keyed settings
    pub fn name(&self) -> &'static str {
        match self {
            Self::Kolmogorov => "kolmogorov",
            Self::VonKarman { .. } => "vonKarman",
            Self::ModifiedVonKarman { .. } => "modified_vonKarman",
        }
    }

    /// Outer scale, if the model has one
    pub fn outer_scale(&self) -> Option<f64> {
        match *self {
            Self::Kolmogorov => None,
            Self::VonKarman { outer_scale } | Self::ModifiedVonKarman { outer_scale, .. } => {
                Some(outer_scale)
            }
        }
    }

    /// Check the scales carried by this variant
    ///
    /// # Errors
    ///
    /// Non-positive or non-finite scales, or `L0 <= l0`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match *self {
            Self::Kolmogorov => Ok(()),
            Self::VonKarman { outer_scale } => require_positive("L0", outer_scale).map(|_| ()),
            Self::ModifiedVonKarman {
                outer_scale,
                inner_scale,
            } => {
                require_positive("L0", outer_scale)?;
                require_positive("l0", inner_scale)?;
                if outer_scale <= inner_scale {
                    return Err(ConfigError::InconsistentScales {
                        outer: outer_scale,
                        inner: inner_scale,
                    });
                }
                Ok(())
            }
        }
    }
}

/// Exponent-dependent constants of the generalized PSD
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpectralConstants {
    /// `A(α) = c1(α)·B(α)`; ≈ 0.023 at α = 11/3
    pub amplitude: f64,
    /// `c_α` such that `fm = c_α / l0`
    pub inner_scale_factor: f64,
}

impl SpectralConstants {
    /// Evaluate the closed-form constants for exponent `alpha`
    pub fn for_exponent(alpha: f64) -> Self {
        // Stribling consistency parameter, 6.88 for Kolmogorov
        let c1 = 2.0 * (8.0 / (alpha - 2.0) * gamma(2.0 / (alpha - 2.0))).powf((alpha - 2.0) / 2.0);
        // Charnotskii/Bos generalized phase amplitude
        let b_num = gamma(alpha / 2.0);
        let b_den = 2.0_f64.powf(2.0 - alpha) * PI * alpha * gamma(-alpha / 2.0);
        let b_fac = (2.0 * PI).powf(2.0 - alpha) * (b_num / b_den);
        // Toselli inner-scale inertial-range consistency
        let a = gamma(alpha - 1.0) * (alpha * PI / 2.0).cos() / (4.0 * PI * PI);
        let c_alpha = (gamma(0.5 * (5.0 - alpha)) * a * 2.0 * PI / 3.0).powf(1.0 / (alpha - 5.0));

        Self {
            amplitude: c1 * b_fac,
            inner_scale_factor: c_alpha,
        }
    }
}

/// Full description of the phase spectrum used to synthesize screens
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhaseSpectrum {
    /// Spectral shape and scales
    pub model: PsdModel,
    /// Power-law exponent α (3 < α < 4)
    pub alpha: f64,
    /// Anisotropy magnitude b along the rotated x axis (1 = isotropic)
    pub anisotropy: f64,
    /// Rotation of the anisotropy axes (radians)
    pub rotation: f64,
}

impl Default for PhaseSpectrum {
    fn default() -> Self {
        Self::new(PsdModel::Kolmogorov)
    }
}

impl PhaseSpectrum {
    /// Isotropic spectrum with the Kolmogorov exponent
    pub fn new(model: PsdModel) -> Self {
        Self {
            model,
            alpha: KOLMOGOROV_EXPONENT,
            anisotropy: 1.0,
            rotation: 0.0,
        }
    }

    /// Replace the power-law exponent
    pub fn with_exponent(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    /// Replace anisotropy magnitude and rotation (radians)
    pub fn with_anisotropy(mut self, anisotropy: f64, rotation: f64) -> Self {
        self.anisotropy = anisotropy;
        self.rotation = rotation;
        self
    }

    /// Whether the exponent is the Kolmogorov 11/3
    pub fn is_kolmogorov_exponent(&self) -> bool {
        (self.alpha - KOLMOGOROV_EXPONENT).abs() < 1e-12
    }

    /// Check every parameter of the spectrum
    ///
    /// # Errors
    ///
    /// Invalid model scales, `α` outside (3, 4), non-positive anisotropy or
    /// non-finite rotation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.model.validate()?;
        if !(self.alpha.is_finite() && self.alpha > 3.0 && self.alpha < 4.0) {
            return Err(ConfigError::InvalidParameter {
                name: "alpha",
                value: self.alpha,
                reason: "power-law exponent must lie in (3, 4)",
            });
        }
        require_positive("anisotropy", self.anisotropy)?;
        if !self.rotation.is_finite() {
            return Err(ConfigError::InvalidParameter {
                name: "rotation",
                value: self.rotation,
                reason: "must be finite",
            });
        }
        Ok(())
    }

    /// Precompute everything that does not depend on frequency
    pub fn evaluator(&self, r0: f64) -> SpectrumEvaluator {
        let constants = SpectralConstants::for_exponent(self.alpha);
        let (b, c) = (self.anisotropy, 1.0);
        let scale = constants.amplitude * (b * c).powf(-self.alpha / 2.0) * r0.powf(2.0 - self.alpha);

        let f0 = self.model.outer_scale().map_or(0.0, |l0_outer| 1.0 / l0_outer);
        let fm = match self.model {
            PsdModel::ModifiedVonKarman { inner_scale, .. } => {
                Some(constants.inner_scale_factor / inner_scale)
            }
            _ => None,
        };

        // Rotate by -θ, then stretch the rotated axes by 1/b and 1/c
        let transform = Matrix2::from_diagonal(&Vector2::new(1.0 / b, 1.0 / c))
            * Rotation2::new(-self.rotation).matrix();

        SpectrumEvaluator {
            scale,
            half_alpha: self.alpha / 2.0,
            f0_squared: f0 * f0,
            fm,
            transform,
        }
    }

    /// Raw density at one frequency (no DC handling, no grid normalization)
    pub fn density(&self, fx: f64, fy: f64, r0: f64) -> f64 {
        self.evaluator(r0).density(fx, fy)
    }

    /// Density sampled on the centered frequency grid of `plane`
    ///
    /// The DC bin is zero. For a non-Kolmogorov exponent the array is rescaled so
    /// its sum equals that of the α = 11/3 spectrum on the same grid. The
    /// reference keeps the rotated and stretched frequencies but takes the
    /// isotropic amplitude, without the `(b·c)^(-α/2)` factor.
    pub fn density_grid(&self, plane: &SampledPlane, r0: f64) -> Array2<f64> {
        let mut psd = sample_grid(&self.evaluator(r0), plane);
        if !self.is_kolmogorov_exponent() {
            let target: f64 = sample_grid(&self.reference_evaluator(r0), plane).sum();
            let total: f64 = psd.sum();
            if total > 0.0 {
                psd *= target / total;
            }
        }
        psd
    }

    /// Kolmogorov-exponent evaluator on this spectrum's frequency transform,
    /// with the anisotropy amplitude removed
    fn reference_evaluator(&self, r0: f64) -> SpectrumEvaluator {
        let reference = self.with_exponent(KOLMOGOROV_EXPONENT).evaluator(r0);
        SpectrumEvaluator {
            scale: reference.scale * self.anisotropy.powf(KOLMOGOROV_EXPONENT / 2.0),
            ..reference
        }
    }
}

fn sample_grid(evaluator: &SpectrumEvaluator, plane: &SampledPlane) -> Array2<f64> {
    let center = plane.size / 2;
    Array2::from_shape_fn((plane.size, plane.size), |(row, col)| {
        if row == center && col == center {
            0.0
        } else {
            let (fx, fy) = plane.frequency(row, col);
            evaluator.density(fx, fy)
        }
    })
}

/// A [`PhaseSpectrum`] bound to one r0, ready for repeated evaluation
#[derive(Debug, Clone, Copy)]
pub struct SpectrumEvaluator {
    scale: f64,
    half_alpha: f64,
    f0_squared: f64,
    fm: Option<f64>,
    transform: Matrix2<f64>,
}

impl SpectrumEvaluator {
    /// Density at `(fx, fy)` (cycles/m)
    #[inline]
    pub fn density(&self, fx: f64, fy: f64) -> f64 {
        let f = (self.transform * Vector2::new(fx, fy)).norm();
        let damping = self.fm.map_or(1.0, |fm| (-(f / fm).powi(2)).exp());
        self.scale * damping / (f * f + self.f0_squared).powf(self.half_alpha)
    }
}
