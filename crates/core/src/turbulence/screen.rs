//! FFT phase-screen synthesis
//!
//! A screen is one realization of a stationary Gaussian random phase field with
//! a prescribed power spectrum. Complex white noise on the centered frequency
//! grid is filtered by `sqrt(Φ)·Δf`, inverse-transformed, and scaled back by
//! `N²` to undo the `1/N²` of the normalized inverse. Only the real part is
//! kept; it is itself a valid realization with the target statistics.
//!
//! FFT screens are periodic with period `N·pitch` and therefore under-represent
//! turbulence at scales comparable to or larger than the grid. See
//! [`super::subharmonic`] for the low-frequency correction.

use super::circular_gaussian;
use super::psd::PhaseSpectrum;
use crate::grid::{CenteredFft2, SampledPlane};
use ndarray::{Array2, Zip};
use rand::Rng;
use rustfft::num_complex::Complex64;

/// One realized phase screen on a sampled plane
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseScreen {
    phase: Array2<f64>,
    pitch: f64,
}

impl PhaseScreen {
    /// Wrap a phase array (radians) sampled at `pitch`
    pub fn new(phase: Array2<f64>, pitch: f64) -> Self {
        Self { phase, pitch }
    }

    /// Zero-phase screen: its transmittance is exactly one everywhere
    pub fn vacuum(size: usize, pitch: f64) -> Self {
        Self::new(Array2::zeros((size, size)), pitch)
    }

    /// Phase (radians)
    pub fn phase(&self) -> &Array2<f64> {
        &self.phase
    }

    /// Consume the screen, returning its phase array
    pub fn into_phase(self) -> Array2<f64> {
        self.phase
    }

    /// Sample spacing of the plane this screen lives on (m)
    pub fn pitch(&self) -> f64 {
        self.pitch
    }

    /// Samples per side
    pub fn size(&self) -> usize {
        self.phase.nrows()
    }

    /// Complex transmittance `exp(i·φ)`
    pub fn transmittance(&self) -> Array2<Complex64> {
        self.phase.mapv(|p| Complex64::from_polar(1.0, p))
    }
}

/// FFT screen generator for a fixed grid size and spectrum
///
/// Holds the planned transforms so that repeated draws on the same grid do not
/// re-plan.
#[derive(Debug, Clone)]
pub struct FftScreenGenerator {
    spectrum: PhaseSpectrum,
    fft: CenteredFft2,
}

impl FftScreenGenerator {
    /// Plan a generator for `size × size` screens
    pub fn new(size: usize, spectrum: PhaseSpectrum) -> Self {
        Self {
            spectrum,
            fft: CenteredFft2::new(size),
        }
    }

    /// Spectrum the screens are drawn from
    pub fn spectrum(&self) -> &PhaseSpectrum {
        &self.spectrum
    }

    /// Samples per side of every generated screen
    pub fn size(&self) -> usize {
        self.fft.size()
    }

    /// Draw one phase realization (radians) on a plane of spacing `pitch`
    pub fn generate<R: Rng + ?Sized>(&self, pitch: f64, r0: f64, rng: &mut R) -> Array2<f64> {
        let n = self.size();
        let plane = SampledPlane::new(n, pitch);
        let df = plane.frequency_spacing();
        let psd = self.spectrum.density_grid(&plane, r0);

        // Row-major draw order keeps a seeded run reproducible
        let noise = Array2::from_shape_simple_fn((n, n), || circular_gaussian(rng));
        let coefficients = Zip::from(&noise)
            .and(&psd)
            .map_collect(|&c, &p| c * (p.sqrt() * df));

        let n_squared = (n * n) as f64;
        self.fft
            .inverse(&coefficients)
            .mapv(|v| v.re * n_squared)
    }
}
