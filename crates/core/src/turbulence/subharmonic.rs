//! Subharmonic low-frequency compensation
//!
//! An FFT screen has no power below the first non-zero bin `1/D` (`D = N·pitch`),
//! so it badly underestimates tilt and other large-scale structure. Following
//! Lane et al., each order `p` adds a 6×6 grid of frequencies spaced
//! `Δf_p = 3^(-p)/D` at half-integer offsets `±0.5, ±1.5, ±2.5`. Each component
//! gets a complex Gaussian amplitude `sqrt(Φ(f))·Δf_p` and the resulting plane
//! waves are summed directly on the spatial grid. The spatial mean is removed so
//! the correction adds no piston.
//!
//! # References
//! - Lane, R.G., Glindemann, A. & Dainty, J.C. (1992) "Simulation of a Kolmogorov phase screen"
//! - Johansson, E.M. & Gavel, D.T. (1994) "Simulation of stellar speckle imaging"

use super::circular_gaussian;
use super::psd::PhaseSpectrum;
use crate::grid::SampledPlane;
use ndarray::{Array2, Zip};
use rand::Rng;
use std::f64::consts::PI;
use tracing::trace;

/// Half-integer offsets of one subharmonic order, in units of that order's spacing
const OFFSETS: [f64; 6] = [-2.5, -1.5, -0.5, 0.5, 1.5, 2.5];

/// One plane-wave component: `Re(c · exp(i(kx·x + ky·y)))`
#[derive(Debug, Clone, Copy)]
struct Component {
    re: f64,
    im: f64,
    kx: f64,
    ky: f64,
}

impl Component {
    #[inline]
    fn value(&self, x: f64, y: f64) -> f64 {
        let (sin, cos) = (self.kx * x + self.ky * y).sin_cos();
        self.re * cos - self.im * sin
    }
}

/// Low-frequency screen generator
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SubharmonicCompensator {
    spectrum: PhaseSpectrum,
    orders: usize,
}

impl SubharmonicCompensator {
    /// Compensator adding `orders` subharmonic levels
    pub fn new(spectrum: PhaseSpectrum, orders: usize) -> Self {
        Self { spectrum, orders }
    }

    /// Number of subharmonic levels
    pub fn orders(&self) -> usize {
        self.orders
    }

    /// Draw one zero-mean low-frequency phase realization (radians)
    ///
    /// Uses the raw spectrum (no grid normalization): subharmonic frequencies
    /// are off the FFT grid and the normalization is defined on that grid.
    pub fn generate<R: Rng + ?Sized>(&self, plane: &SampledPlane, r0: f64, rng: &mut R) -> Array2<f64> {
        let evaluator = self.spectrum.evaluator(r0);
        let base_spacing = plane.frequency_spacing();

        // All random draws happen here, in a fixed order, before the parallel sum
        let mut components = Vec::with_capacity(self.orders * OFFSETS.len() * OFFSETS.len());
        for order in 1..=self.orders {
            let spacing = 3.0_f64.powi(-(order as i32)) * base_spacing;
            for &row_offset in &OFFSETS {
                for &col_offset in &OFFSETS {
                    let fx = col_offset * spacing;
                    let fy = -row_offset * spacing;
                    let amplitude = evaluator.density(fx, fy).sqrt() * spacing;
                    let c = circular_gaussian(rng) * amplitude;
                    components.push(Component {
                        re: c.re,
                        im: c.im,
                        kx: 2.0 * PI * fx,
                        ky: 2.0 * PI * fy,
                    });
                }
            }
        }
        trace!(
            "Drew {} subharmonic components over {} orders",
            components.len(),
            self.orders
        );

        let mut screen = Array2::<f64>::zeros((plane.size, plane.size));
        let plane = *plane;
        Zip::indexed(&mut screen).par_for_each(|(row, col), value| {
            let (x, y) = plane.position(row, col);
            *value = components.iter().map(|c| c.value(x, y)).sum();
        });

        let mean = screen.mean().unwrap_or(0.0);
        screen -= mean;
        screen
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turbulence::psd::PsdModel;
    use approx::assert_relative_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_screen_is_zero_mean() {
        let plane = SampledPlane::new(32, 5e-3);
        let compensator = SubharmonicCompensator::new(PhaseSpectrum::default(), 3);
        let mut rng = StdRng::seed_from_u64(9);
        for _ in 0..5 {
            let screen = compensator.generate(&plane, 0.05, &mut rng);
            let peak = screen.iter().fold(0.0_f64, |m, v| m.max(v.abs()));
            assert!(peak > 0.0);
            let mean = screen.mean().unwrap();
            assert!(mean.abs() < 1e-12 * peak, "mean {mean} vs peak {peak}");
        }
    }

    #[test]
    fn test_zero_orders_adds_nothing() {
        let plane = SampledPlane::new(8, 1e-2);
        let compensator = SubharmonicCompensator::new(PhaseSpectrum::default(), 0);
        let mut rng = StdRng::seed_from_u64(1);
        let screen = compensator.generate(&plane, 0.1, &mut rng);
        assert!(screen.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_same_seed_same_screen() {
        let plane = SampledPlane::new(16, 1e-2);
        let spectrum = PhaseSpectrum::new(PsdModel::VonKarman { outer_scale: 50.0 });
        let compensator = SubharmonicCompensator::new(spectrum, 4);
        let a = compensator.generate(&plane, 0.1, &mut StdRng::seed_from_u64(77));
        let b = compensator.generate(&plane, 0.1, &mut StdRng::seed_from_u64(77));
        assert_eq!(a, b);
    }

    #[test]
    fn test_screen_is_smooth_on_the_grid_scale() {
        // Lowest order wavelength is 3·D/2.5, far above the pitch
        let plane = SampledPlane::new(32, 1e-2);
        let compensator = SubharmonicCompensator::new(PhaseSpectrum::default(), 3);
        let screen = compensator.generate(&plane, 0.05, &mut StdRng::seed_from_u64(4));
        let range = screen.iter().fold(f64::NEG_INFINITY, |m, v| m.max(*v))
            - screen.iter().fold(f64::INFINITY, |m, v| m.min(*v));
        let max_step = screen
            .windows((1, 2))
            .into_iter()
            .map(|w| (w[[0, 1]] - w[[0, 0]]).abs())
            .fold(0.0_f64, f64::max);
        assert!(max_step < 0.25 * range, "step {max_step} vs range {range}");
    }

    #[test]
    fn test_ensemble_structure_function_matches_component_sum() {
        // E[(φ(x+r) - φ(x))²] = Σ Φ(f)·Δf²·2(1 - cos(2π fx r)) for a separation r along x
        let n = 16;
        let pitch = 0.05;
        let r0 = 0.1;
        let orders = 3;
        let lag = n / 2;
        let plane = SampledPlane::new(n, pitch);
        let spectrum = PhaseSpectrum::default();
        let compensator = SubharmonicCompensator::new(spectrum, orders);

        let separation = lag as f64 * pitch;
        let mut expected = 0.0;
        for order in 1..=orders {
            let spacing = 3.0_f64.powi(-(order as i32)) * plane.frequency_spacing();
            for &a in &OFFSETS {
                for &b in &OFFSETS {
                    let (fx, fy) = (a * spacing, b * spacing);
                    expected += spectrum.density(fx, fy, r0)
                        * spacing
                        * spacing
                        * 2.0
                        * (1.0 - (2.0 * PI * fx * separation).cos());
                }
            }
        }

        let mut rng = StdRng::seed_from_u64(31);
        let draws = 1000;
        let mut total = 0.0;
        for _ in 0..draws {
            let screen = compensator.generate(&plane, r0, &mut rng);
            let mut sum = 0.0;
            for row in 0..n {
                for col in 0..n - lag {
                    let d = screen[[row, col + lag]] - screen[[row, col]];
                    sum += d * d;
                }
            }
            total += sum / (n * (n - lag)) as f64;
        }
        let measured = total / draws as f64;
        assert_relative_eq!(measured, expected, max_relative = 0.15);
    }
}
