//! Split-step angular-spectrum propagator
//!
//! Advances a complex field plane by plane through a [`PropagationGeometry`].
//! Each step is a Fresnel transfer-function multiply in the centered frequency
//! domain, followed by a super-Gaussian edge window and the next plane's phase
//! screen. Changing pitch between planes is handled by the scaled-coordinate
//! form: a quadratic phase at the source, a transfer function with `dz/m` and
//! a `1/m` amplitude per step, and a closing quadratic phase at the receiver.
//! With `m` the ratio of the next pitch to the current one, the physical energy
//! `Σ|U|²·pitch²` is carried unchanged from plane to plane.
//!
//! # References
//! - Schmidt, J.D. (2010) "Numerical Simulation of Optical Wave Propagation", ch. 8-9

use super::geometry::PropagationGeometry;
use crate::error::{require_positive, ConfigError};
use crate::grid::{CenteredFft2, SampledPlane};
use crate::turbulence::PhaseScreen;
use ndarray::{Array2, Zip};
use rustfft::num_complex::Complex64;
use std::f64::consts::PI;
use tracing::debug;

/// Window radius as a fraction of N, in samples
const WINDOW_RADIUS_FRACTION: f64 = 0.55;

/// Super-Gaussian order of the edge window
const WINDOW_ORDER: i32 = 16;

/// Edge-absorbing window `exp(-(r/(0.55·N))^16)` with `r` in samples
///
/// Defined in index space, so one array serves every plane regardless of pitch.
pub fn absorbing_window(size: usize) -> Array2<f64> {
    let width = WINDOW_RADIUS_FRACTION * size as f64;
    SampledPlane::new(size, 1.0)
        .radius_squared()
        .mapv(|r2| (-(r2 / (width * width)).powi(WINDOW_ORDER / 2)).exp())
}

/// Propagator bound to one geometry and wavelength
#[derive(Debug, Clone)]
pub struct SplitStepPropagator {
    geometry: PropagationGeometry,
    wavelength: f64,
    fft: CenteredFft2,
    window: Array2<f64>,
}

impl SplitStepPropagator {
    /// Plan transforms and the edge window for `geometry`
    ///
    /// # Errors
    ///
    /// `wavelength` must be finite and positive.
    pub fn new(geometry: PropagationGeometry, wavelength: f64) -> Result<Self, ConfigError> {
        require_positive("wavelength", wavelength)?;
        let n = geometry.grid_size();
        Ok(Self {
            fft: CenteredFft2::new(n),
            window: absorbing_window(n),
            geometry,
            wavelength,
        })
    }

    /// Geometry this propagator walks through
    pub fn geometry(&self) -> &PropagationGeometry {
        &self.geometry
    }

    /// Wavelength λ (m)
    pub fn wavelength(&self) -> f64 {
        self.wavelength
    }

    /// Edge window applied after every diffraction step
    pub fn window(&self) -> &Array2<f64> {
        &self.window
    }

    /// Propagate `source` through one screen per interior plane
    ///
    /// # Errors
    ///
    /// [`ConfigError::ShapeMismatch`] when the source or any screen is not N×N,
    /// [`ConfigError::ScreenCount`] when the number of screens differs from the
    /// number of interior planes.
    pub fn propagate(
        &self,
        source: &Array2<Complex64>,
        screens: &[PhaseScreen],
    ) -> Result<Array2<Complex64>, ConfigError> {
        let expected = self.geometry.num_screens();
        if screens.len() != expected {
            return Err(ConfigError::ScreenCount {
                expected,
                found: screens.len(),
            });
        }
        let shape = self.shape();
        if let Some(bad) = screens.iter().find(|s| s.phase().dim() != shape) {
            return Err(ConfigError::ShapeMismatch {
                name: "phase screen",
                expected: shape,
                found: bad.phase().dim(),
            });
        }
        self.march(source, Some(screens))
    }

    /// Propagate `source` with unity transmittance at every plane
    ///
    /// # Errors
    ///
    /// [`ConfigError::ShapeMismatch`] when the source is not N×N.
    pub fn propagate_vacuum(&self, source: &Array2<Complex64>) -> Result<Array2<Complex64>, ConfigError> {
        self.march(source, None)
    }

    fn shape(&self) -> (usize, usize) {
        let n = self.geometry.grid_size();
        (n, n)
    }

    fn march(
        &self,
        source: &Array2<Complex64>,
        screens: Option<&[PhaseScreen]>,
    ) -> Result<Array2<Complex64>, ConfigError> {
        let shape = self.shape();
        if source.dim() != shape {
            return Err(ConfigError::ShapeMismatch {
                name: "source field",
                expected: shape,
                found: source.dim(),
            });
        }

        let geometry = &self.geometry;
        let k = 2.0 * PI / self.wavelength;
        let steps = geometry.step_lengths();
        let ratios = geometry.sampling_ratios();
        let last = steps.len();

        debug!(
            "Split-step propagation: {} planes, wavelength={:.3e}m, vacuum={}",
            last + 1,
            self.wavelength,
            screens.is_none()
        );

        // Scaled-coordinate entry phase at the source pitch
        let entry = k / (2.0 * steps[0]) * (1.0 - ratios[1]);
        let mut field = Zip::from(source)
            .and(&geometry.plane(0).radius_squared())
            .par_map_collect(|&u, &r2| u * Complex64::from_polar(1.0, entry * r2));

        for step in 1..=last {
            let dz = steps[step - 1];
            let m = ratios[step];
            let chirp = -PI * self.wavelength * dz / m;

            // Transform is linear, so the 1/m amplitude rides on the kernel
            let mut spectrum = self.fft.forward(&field);
            Zip::from(&mut spectrum)
                .and(&geometry.plane(step - 1).frequency_squared())
                .par_for_each(|s, &f2| *s *= Complex64::from_polar(1.0 / m, chirp * f2));
            field = self.fft.inverse(&spectrum);

            Zip::from(&mut field)
                .and(&self.window)
                .par_for_each(|u, &w| *u *= w);

            // Plane `step` is a screen plane for every step but the last
            if let Some(screen) = screens.and_then(|s| s.get(step - 1)) {
                Zip::from(&mut field)
                    .and(screen.phase())
                    .par_for_each(|u, &p| *u *= Complex64::from_polar(1.0, p));
            }
            debug!("Step {}: dz={:.2}m, sampling ratio={:.6}", step, dz, m);
        }

        // Closing quadratic phase at the receiver pitch; identity when m = 1
        let m_last = ratios[last];
        let exit = k / 2.0 * (m_last - 1.0) / (m_last * steps[last - 1]);
        Zip::from(&mut field)
            .and(&geometry.plane(last).radius_squared())
            .par_for_each(|u, &r2| *u *= Complex64::from_polar(1.0, exit * r2));

        Ok(field)
    }
}
