//! Turbulence statistics and phase-screen synthesis
//!
//! - [`psd`]: phase power spectral density models
//! - [`screen`]: FFT-based screen synthesis and the realized [`PhaseScreen`]
//! - [`subharmonic`]: low-frequency (subharmonic) compensation by direct summation
//! - [`derived`]: r0, Rytov and related quantities from the canonical path parameters
//!
//! Every stochastic function takes the caller's generator explicitly; nothing in
//! this module touches global random state.

pub mod derived;
pub mod psd;
pub mod screen;
pub mod subharmonic;

pub use derived::{equal_strength_r0, DerivedTurbulence, TurbulencePath};
pub use psd::{PhaseSpectrum, PsdModel, SpectralConstants, SpectrumEvaluator, KOLMOGOROV_EXPONENT};
pub use screen::{FftScreenGenerator, PhaseScreen};
pub use subharmonic::SubharmonicCompensator;

use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use rustfft::num_complex::Complex64;

/// One circularly-symmetric complex Gaussian draw
///
/// Real and imaginary parts are independent standard normals, so `E|z|² = 2`.
pub fn circular_gaussian<R: Rng + ?Sized>(rng: &mut R) -> Complex64 {
    let re: f64 = StandardNormal.sample(rng);
    let im: f64 = StandardNormal.sample(rng);
    Complex64::new(re, im)
}
