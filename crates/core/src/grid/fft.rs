//! Centered 2-D FFT pair
//!
//! The forward transform is `fftshift(fft2(ifftshift(u)))` and the inverse is
//! `fftshift(ifft2(ifftshift(U)))`, with `ifft2` normalised by `1/N²`. Both
//! directions use the same centering, so the origin of a field and the DC bin of
//! its spectrum both sit at index `N/2`. Mixing conventions between the forward
//! and inverse pass shifts the field by half a grid and silently corrupts every
//! propagation step, which is why there is exactly one implementation of each.
//!
//! Row and column passes run in parallel over lanes with rayon.

use ndarray::parallel::prelude::*;
use ndarray::{Array2, Axis};
use rustfft::num_complex::Complex64;
use rustfft::{Fft, FftPlanner};
use std::fmt;
use std::sync::Arc;

/// Circularly shift both axes so that index 0 moves to index `N/2`
pub fn fftshift<T: Clone>(array: &Array2<T>) -> Array2<T> {
    let (rows, cols) = array.dim();
    roll(array, rows / 2, cols / 2)
}

/// Inverse of [`fftshift`]: index `N/2` moves to index 0
pub fn ifftshift<T: Clone>(array: &Array2<T>) -> Array2<T> {
    let (rows, cols) = array.dim();
    roll(array, rows - rows / 2, cols - cols / 2)
}

/// `out[i][j] = in[i - row_shift][j - col_shift]` with wrap-around
fn roll<T: Clone>(array: &Array2<T>, row_shift: usize, col_shift: usize) -> Array2<T> {
    let (rows, cols) = array.dim();
    Array2::from_shape_fn((rows, cols), |(i, j)| {
        array[[(i + rows - row_shift) % rows, (j + cols - col_shift) % cols]].clone()
    })
}

/// Planned forward/inverse transforms for one grid size
#[derive(Clone)]
pub struct CenteredFft2 {
    size: usize,
    forward: Arc<dyn Fft<f64>>,
    inverse: Arc<dyn Fft<f64>>,
}

impl fmt::Debug for CenteredFft2 {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CenteredFft2")
            .field("size", &self.size)
            .finish()
    }
}

impl CenteredFft2 {
    /// Plan transforms for an `size × size` grid
    pub fn new(size: usize) -> Self {
        let mut planner = FftPlanner::new();
        let forward = planner.plan_fft_forward(size);
        let inverse = planner.plan_fft_inverse(size);
        Self {
            size,
            forward,
            inverse,
        }
    }

    /// Samples per side this plan was built for
    pub fn size(&self) -> usize {
        self.size
    }

    /// Centered forward transform (unnormalised, like `numpy.fft.fft2`)
    pub fn forward(&self, field: &Array2<Complex64>) -> Array2<Complex64> {
        let mut spectrum = ifftshift(field);
        self.transform_axes(&mut spectrum, &self.forward);
        fftshift(&spectrum)
    }

    /// Centered inverse transform (normalised by `1/N²`, like `numpy.fft.ifft2`)
    pub fn inverse(&self, spectrum: &Array2<Complex64>) -> Array2<Complex64> {
        let mut field = ifftshift(spectrum);
        self.transform_axes(&mut field, &self.inverse);
        let scale = 1.0 / (self.size * self.size) as f64;
        field.par_mapv_inplace(|v| v * scale);
        fftshift(&field)
    }

    fn transform_axes(&self, data: &mut Array2<Complex64>, fft: &Arc<dyn Fft<f64>>) {
        debug_assert_eq!(data.dim(), (self.size, self.size));
        // Axis(0) lanes are rows, Axis(1) lanes are columns
        for axis in [Axis(0), Axis(1)] {
            data.axis_iter_mut(axis)
                .into_par_iter()
                .for_each(|mut lane| {
                    let mut buffer = lane.to_vec();
                    fft.process(&mut buffer);
                    for (dst, src) in lane.iter_mut().zip(buffer) {
                        *dst = src;
                    }
                });
        }
    }
}
