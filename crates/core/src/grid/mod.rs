//! Sampled N×N planes and centered transforms
//!
//! Every field and phase screen in a simulation lives on a square grid of `N`
//! samples per side. The physical pitch differs from plane to plane, but the
//! index convention is shared: sample `i` sits at offset `i - floor(N/2)`, so the
//! origin (and the DC bin of a centered spectrum) is at index `N/2`. Columns map
//! to +x and rows map to -y (row 0 is the top of the plane).

pub mod fft;

pub use fft::{fftshift, ifftshift, CenteredFft2};

use ndarray::Array2;

/// Offset of sample `index` from the grid origin, in samples
#[inline]
pub fn centered_offset(index: usize, size: usize) -> f64 {
    index as f64 - (size / 2) as f64
}

/// A square plane of `size × size` samples spaced `pitch` meters apart
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SampledPlane {
    /// Samples per side (N)
    pub size: usize,
    /// Sample spacing (m)
    pub pitch: f64,
}

impl SampledPlane {
    /// Create a plane description
    pub fn new(size: usize, pitch: f64) -> Self {
        Self { size, pitch }
    }

    /// Physical side length `N·pitch` (m)
    pub fn side_length(&self) -> f64 {
        self.size as f64 * self.pitch
    }

    /// Frequency-domain sample spacing `1/(N·pitch)` (cycles/m)
    pub fn frequency_spacing(&self) -> f64 {
        1.0 / self.side_length()
    }

    /// Physical `(x, y)` of sample `(row, col)` (m)
    #[inline]
    pub fn position(&self, row: usize, col: usize) -> (f64, f64) {
        (
            centered_offset(col, self.size) * self.pitch,
            -centered_offset(row, self.size) * self.pitch,
        )
    }

    /// Spatial frequency `(fx, fy)` of centered-spectrum bin `(row, col)` (cycles/m)
    #[inline]
    pub fn frequency(&self, row: usize, col: usize) -> (f64, f64) {
        let df = self.frequency_spacing();
        (
            centered_offset(col, self.size) * df,
            -centered_offset(row, self.size) * df,
        )
    }

    /// `x² + y²` at every sample (m²)
    pub fn radius_squared(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.size, self.size), |(row, col)| {
            let (x, y) = self.position(row, col);
            x * x + y * y
        })
    }

    /// `fx² + fy²` at every bin of a centered spectrum (m⁻²)
    pub fn frequency_squared(&self) -> Array2<f64> {
        Array2::from_shape_fn((self.size, self.size), |(row, col)| {
            let (fx, fy) = self.frequency(row, col);
            fx * fx + fy * fy
        })
    }
}
