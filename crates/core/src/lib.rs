//! Split-step optical propagation through atmospheric turbulence
//!
//! Simulates a monochromatic field travelling through a turbulent path by
//! alternating Fresnel diffraction in vacuum with thin random phase screens.
//!
//! ## Building blocks
//!
//! - [`turbulence`]: phase PSD models, FFT screen synthesis, subharmonic
//!   compensation and derived turbulence quantities (r0, Rytov number)
//! - [`propagation`]: screen placement and per-plane sampling, and the
//!   split-step propagator with its absorbing edge window
//! - [`atmosphere`]: the ordered stack of screens for one run, built from typed
//!   or name-keyed settings
//! - [`simulation`]: end-to-end driver from a serde configuration
//!
//! Every stochastic call takes an explicit seedable generator; identical seeds
//! reproduce identical screens and output fields.
//!
//! ## Example
//!
//! ```no_run
//! use ndarray::Array2;
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use turbprop_core::{Complex64, Simulation, SimulationConfig};
//!
//! let config = SimulationConfig {
//!     grid_size: 128,
//!     ..SimulationConfig::default()
//! };
//! let sim = Simulation::new(config)?;
//! let source = Array2::from_elem((128, 128), Complex64::new(1.0, 0.0));
//! let output = sim.run(&source, &mut StdRng::seed_from_u64(7))?;
//! println!("scintillation index {}", output.scintillation_index());
//! # Ok::<(), turbprop_core::ConfigError>(())
//! ```

pub mod atmosphere;
pub mod error;
pub mod grid;
pub mod propagation;
pub mod simulation;
pub mod turbulence;

pub use atmosphere::{Atmosphere, AtmosphereConfig, AtmosphereSettings, ScreenMethod};
pub use error::ConfigError;
pub use grid::{CenteredFft2, SampledPlane};
pub use propagation::{PropagationGeometry, SplitStepPropagator};
pub use simulation::{scintillation_index, Simulation, SimulationConfig, SimulationOutput};
pub use turbulence::{
    DerivedTurbulence, FftScreenGenerator, PhaseScreen, PhaseSpectrum, PsdModel,
    SubharmonicCompensator, TurbulencePath,
};

pub use rustfft::num_complex::Complex64;
