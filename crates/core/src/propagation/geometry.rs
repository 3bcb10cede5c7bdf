//! Propagation geometry planner
//!
//! Lays out `NumScr + 2` planes along a path of length `L`: the source, one plane
//! per phase screen, and the receiver. Interior planes are spaced `d = L/NumScr`
//! apart with half-length end segments, so every screen sits at the centre of the
//! path slab it represents:
//!
//! ```text
//! source   s1        s2        ...       sN   receiver
//!   |--d/2--|----d----|----d----| ... |--d/2--|
//! ```
//!
//! Sample pitch grows linearly from `dx` at the source to `Rdx` at the receiver.

use crate::error::{require_positive, ConfigError};
use crate::grid::SampledPlane;
use serde::{Deserialize, Serialize};

/// Planned plane positions, step lengths and per-plane pitch
///
/// Immutable after construction; every invariant is checked by [`PropagationGeometry::new`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropagationGeometry {
    grid_size: usize,
    path_length: f64,
    /// z of every plane, source first (NumScr + 2 entries)
    positions: Vec<f64>,
    /// Distance between consecutive planes (NumScr + 1 entries)
    step_lengths: Vec<f64>,
    /// Pitch of every plane (NumScr + 2 entries)
    pitches: Vec<f64>,
    /// `pitch[k] / pitch[k-1]`, with entry 0 fixed at 1 (NumScr + 2 entries)
    sampling_ratios: Vec<f64>,
}

impl PropagationGeometry {
    /// Plan a path of `path_length` meters split into `num_screens` slabs
    ///
    /// # Errors
    ///
    /// Non-positive or non-finite `path_length`, `source_pitch` or
    /// `receiver_pitch`, a zero `grid_size` or `num_screens`, or a planned
    /// geometry that breaks its own invariants.
    pub fn new(
        grid_size: usize,
        path_length: f64,
        num_screens: usize,
        source_pitch: f64,
        receiver_pitch: f64,
    ) -> Result<Self, ConfigError> {
        require_positive("path_length", path_length)?;
        require_positive("dx", source_pitch)?;
        require_positive("Rdx", receiver_pitch)?;
        if grid_size == 0 {
            return Err(ConfigError::InvalidCount {
                name: "N",
                value: grid_size,
                reason: "grid must have at least one sample per side",
            });
        }
        if num_screens == 0 {
            return Err(ConfigError::InvalidCount {
                name: "num_screens",
                value: num_screens,
                reason: "at least one phase screen is required",
            });
        }

        let slab = path_length / num_screens as f64;
        let mut step_lengths = vec![slab; num_screens + 1];
        step_lengths[0] = 0.5 * slab;
        step_lengths[num_screens] = 0.5 * slab;

        let mut positions = Vec::with_capacity(num_screens + 2);
        let mut z = 0.0;
        positions.push(z);
        for dz in &step_lengths {
            z += dz;
            positions.push(z);
        }
        // Receiver sits exactly at L, not at an accumulated sum
        positions[num_screens + 1] = path_length;

        let pitches: Vec<f64> = positions
            .iter()
            .map(|z| source_pitch + (receiver_pitch - source_pitch) * z / path_length)
            .collect();

        let mut sampling_ratios = Vec::with_capacity(pitches.len());
        sampling_ratios.push(1.0);
        sampling_ratios.extend(pitches.windows(2).map(|w| w[1] / w[0]));

        let geometry = Self {
            grid_size,
            path_length,
            positions,
            step_lengths,
            pitches,
            sampling_ratios,
        };
        geometry.check_invariants()?;
        Ok(geometry)
    }

    fn check_invariants(&self) -> Result<(), ConfigError> {
        let planes = self.num_screens() + 2;
        let total: f64 = self.step_lengths.iter().sum();
        if (total - self.path_length).abs() > 1e-9 * self.path_length {
            return Err(ConfigError::Geometry(format!(
                "step lengths sum to {total} m, path is {} m",
                self.path_length
            )));
        }
        if self.sampling_ratios.len() != planes || self.pitches.len() != planes {
            return Err(ConfigError::Geometry(format!(
                "{} sampling ratios and {} pitches for {planes} planes",
                self.sampling_ratios.len(),
                self.pitches.len()
            )));
        }
        if let Some(bad) = self
            .sampling_ratios
            .iter()
            .chain(&self.pitches)
            .find(|v| !(v.is_finite() && **v > 0.0))
        {
            return Err(ConfigError::Geometry(format!(
                "non-positive or non-finite pitch/ratio {bad}"
            )));
        }
        Ok(())
    }

    /// Samples per side shared by every plane
    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    /// Total path length L (m)
    pub fn path_length(&self) -> f64 {
        self.path_length
    }

    /// Number of interior (screen) planes
    pub fn num_screens(&self) -> usize {
        self.step_lengths.len() - 1
    }

    /// z of every plane, source first
    pub fn positions(&self) -> &[f64] {
        &self.positions
    }

    /// z of the screen planes only
    pub fn screen_positions(&self) -> &[f64] {
        &self.positions[1..=self.num_screens()]
    }

    /// Distances between consecutive planes
    pub fn step_lengths(&self) -> &[f64] {
        &self.step_lengths
    }

    /// Pitch of every plane, source first
    pub fn pitches(&self) -> &[f64] {
        &self.pitches
    }

    /// Pitch of the screen planes only
    pub fn screen_pitches(&self) -> &[f64] {
        &self.pitches[1..=self.num_screens()]
    }

    /// `pitch[k] / pitch[k-1]`; entry 0 is 1
    pub fn sampling_ratios(&self) -> &[f64] {
        &self.sampling_ratios
    }

    /// Source-plane pitch dx
    pub fn source_pitch(&self) -> f64 {
        self.pitches[0]
    }

    /// Receiver-plane pitch Rdx
    pub fn receiver_pitch(&self) -> f64 {
        self.pitches[self.pitches.len() - 1]
    }

    /// Sampled-plane description of plane `index` (0 = source)
    pub fn plane(&self, index: usize) -> SampledPlane {
        SampledPlane::new(self.grid_size, self.pitches[index])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_step_layout_for_various_screen_counts() {
        for num_screens in [1_usize, 2, 10, 100] {
            let geometry = PropagationGeometry::new(64, 1000.0, num_screens, 5e-3, 5e-3).unwrap();
            let steps = geometry.step_lengths();
            assert_eq!(steps.len(), num_screens + 1);
            assert_eq!(geometry.positions().len(), num_screens + 2);
            assert_eq!(geometry.sampling_ratios().len(), num_screens + 2);

            let total: f64 = steps.iter().sum();
            assert_relative_eq!(total, 1000.0, max_relative = 1e-9);

            let d = 1000.0 / num_screens as f64;
            assert_relative_eq!(steps[0], d / 2.0, max_relative = 1e-12);
            assert_relative_eq!(steps[num_screens], d / 2.0, max_relative = 1e-12);
            for dz in &steps[1..num_screens] {
                assert_relative_eq!(*dz, d, max_relative = 1e-12);
            }
            assert_eq!(geometry.positions()[num_screens + 1], 1000.0);
        }
    }

    #[test]
    fn test_single_screen_is_two_half_steps() {
        let geometry = PropagationGeometry::new(32, 500.0, 1, 1e-3, 1e-3).unwrap();
        assert_eq!(geometry.step_lengths(), &[250.0, 250.0]);
        assert_eq!(geometry.screen_positions(), &[250.0]);
    }

    #[test]
    fn test_pitch_interpolates_linearly() {
        let geometry = PropagationGeometry::new(64, 100.0, 4, 1e-3, 3e-3).unwrap();
        assert_relative_eq!(geometry.source_pitch(), 1e-3, max_relative = 1e-15);
        assert_relative_eq!(geometry.receiver_pitch(), 3e-3, max_relative = 1e-15);
        for (z, pitch) in geometry.positions().iter().zip(geometry.pitches()) {
            assert_relative_eq!(*pitch, 1e-3 + 2e-3 * z / 100.0, max_relative = 1e-12);
        }

        let ratios = geometry.sampling_ratios();
        assert_eq!(ratios[0], 1.0);
        for k in 1..ratios.len() {
            assert_relative_eq!(
                ratios[k],
                geometry.pitches()[k] / geometry.pitches()[k - 1],
                max_relative = 1e-15
            );
            assert!(ratios[k] > 1.0);
        }
    }

    #[test]
    fn test_equal_pitches_give_unit_ratios() {
        let geometry = PropagationGeometry::new(16, 10e3, 10, 5e-3, 5e-3).unwrap();
        assert!(geometry.sampling_ratios().iter().all(|&m| m == 1.0));
        assert_eq!(geometry.plane(3), SampledPlane::new(16, 5e-3));
    }

    #[test]
    fn test_rejects_degenerate_inputs() {
        assert!(matches!(
            PropagationGeometry::new(64, 1000.0, 0, 1e-3, 1e-3),
            Err(ConfigError::InvalidCount { name: "num_screens", .. })
        ));
        assert!(PropagationGeometry::new(0, 1000.0, 3, 1e-3, 1e-3).is_err());
        for (l, dx, rdx, field) in [
            (0.0, 1e-3, 1e-3, "path_length"),
            (f64::NAN, 1e-3, 1e-3, "path_length"),
            (10.0, -1e-3, 1e-3, "dx"),
            (10.0, 1e-3, f64::INFINITY, "Rdx"),
        ] {
            let err = PropagationGeometry::new(8, l, 2, dx, rdx).unwrap_err();
            assert!(err.to_string().contains(field), "{err}");
        }
    }
}
