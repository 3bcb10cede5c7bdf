//! End-to-end simulation driver
//!
//! `Simulation` ties a [`SimulationConfig`] to everything downstream of it:
//!
//! 1. validate every field and resolve the screen-method / PSD names
//! 2. plan the [`PropagationGeometry`]
//! 3. derive r0, Rytov number and friends ([`DerivedTurbulence`])
//! 4. on each [`Simulation::run`], draw a fresh [`Atmosphere`] and propagate
//!
//! Construction performs no random draws, so a bad configuration fails before
//! any generator state is consumed.

use crate::atmosphere::{Atmosphere, AtmosphereConfig, AtmosphereSettings, ScreenMethod};
use crate::error::{require_positive, ConfigError};
use crate::grid::SampledPlane;
use crate::propagation::{PropagationGeometry, SplitStepPropagator};
use crate::turbulence::{DerivedTurbulence, PhaseScreen, TurbulencePath, KOLMOGOROV_EXPONENT};
use ndarray::Array2;
use rand::Rng;
use rustfft::num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// Complete, serde-friendly simulation configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationConfig {
    /// Samples per side N
    pub grid_size: usize,
    /// Source-plane pitch dx (m)
    pub source_pitch: f64,
    /// Receiver-plane pitch Rdx (m)
    pub receiver_pitch: f64,
    /// Wavelength λ (m)
    pub wavelength: f64,
    /// Path length L (m)
    pub path_length: f64,
    /// Refractive-index structure constant Cn² (m^-2/3)
    pub cn2: f64,
    /// Number of phase screens
    pub num_screens: usize,
    /// Receiver aperture diameter D (m) over which scintillation is evaluated
    pub aperture_diameter: f64,
    /// Outer scale L0 (m)
    pub outer_scale: f64,
    /// Inner scale l0 (m)
    pub inner_scale: f64,
    /// Power-law exponent α
    pub alpha: f64,
    /// Anisotropy magnitude
    pub anisotropy: f64,
    /// Anisotropy rotation (degrees)
    pub rotation_deg: f64,
    /// Subharmonic levels for `ft_sh`
    pub subharmonic_orders: usize,
    /// Add subharmonic screens; `ft_sh` with this off behaves as `ft`
    pub subharmonics: bool,
    /// `vacuum`, `ft` or `ft_sh`
    pub screen_method: String,
    /// `kolmogorov`, `vonKarman` or `modified_vonKarman`
    pub psd: String,
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            grid_size: 256,
            source_pitch: 5e-3,
            receiver_pitch: 5e-3,
            wavelength: 1e-6,
            path_length: 10e3,
            cn2: 1e-16,
            num_screens: 10,
            aperture_diameter: 0.1,
            outer_scale: 1e3,
            inner_scale: 1e-3,
            alpha: KOLMOGOROV_EXPONENT,
            anisotropy: 1.0,
            rotation_deg: 0.0,
            subharmonic_orders: 5,
            subharmonics: true,
            screen_method: "ft_sh".to_string(),
            psd: "kolmogorov".to_string(),
        }
    }
}

impl SimulationConfig {
    /// Canonical turbulence inputs
    pub fn turbulence_path(&self) -> TurbulencePath {
        TurbulencePath {
            wavelength: self.wavelength,
            path_length: self.path_length,
            cn2: self.cn2,
            outer_scale: self.outer_scale,
            num_screens: self.num_screens,
        }
    }

    /// Name-keyed atmosphere settings for a path-integrated `r0`
    pub fn atmosphere_settings(&self, r0: f64) -> AtmosphereSettings {
        let screen_method = if self.screen_method == "ft_sh" && !self.subharmonics {
            "ft".to_string()
        } else {
            self.screen_method.clone()
        };
        AtmosphereSettings {
            screen_method,
            psd: self.psd.clone(),
            r0: Some(r0),
            outer_scale: Some(self.outer_scale),
            inner_scale: Some(self.inner_scale),
            alpha: self.alpha,
            anisotropy: self.anisotropy,
            rotation_deg: self.rotation_deg,
            subharmonic_orders: Some(self.subharmonic_orders),
        }
    }
}

/// Result of one turbulent run
#[derive(Debug, Clone)]
pub struct SimulationOutput {
    /// Field at the receiver plane
    pub field: Array2<Complex64>,
    /// Screens the field passed through, in path order
    pub screens: Vec<PhaseScreen>,
    /// Sampling of the receiver plane
    pub receiver: SampledPlane,
    /// Receiver aperture diameter (m)
    pub aperture_diameter: f64,
}

impl SimulationOutput {
    /// Receiver-plane intensity `|U|²`
    pub fn intensity(&self) -> Array2<f64> {
        self.field.mapv(|u| u.norm_sqr())
    }

    /// Normalized intensity variance inside the receiver aperture
    pub fn scintillation_index(&self) -> f64 {
        scintillation_index(&self.field, &self.receiver, self.aperture_diameter)
    }
}

/// `<I²>/<I>² - 1` over illuminated samples with `r < D/2`
///
/// Radii are measured on `receiver`. Returns 0 when nothing inside the
/// aperture is illuminated.
pub fn scintillation_index(
    field: &Array2<Complex64>,
    receiver: &SampledPlane,
    aperture_diameter: f64,
) -> f64 {
    let radius_sq = 0.25 * aperture_diameter * aperture_diameter;
    let (count, sum, sum_sq) = field
        .indexed_iter()
        .filter(|&((row, col), _)| {
            let (x, y) = receiver.position(row, col);
            x * x + y * y < radius_sq
        })
        .map(|(_, u)| u.norm_sqr())
        .filter(|&i| i > 0.0)
        .fold((0_usize, 0.0, 0.0), |(n, s, s2), i| (n + 1, s + i, s2 + i * i));
    if count == 0 {
        return 0.0;
    }
    let mean = sum / count as f64;
    (sum_sq / count as f64) / (mean * mean) - 1.0
}

/// Validated simulation, ready to run any number of times
#[derive(Debug, Clone)]
pub struct Simulation {
    config: SimulationConfig,
    path: TurbulencePath,
    derived: DerivedTurbulence,
    atmosphere: AtmosphereConfig,
    propagator: SplitStepPropagator,
}

impl Simulation {
    /// Validate `config` and plan everything that does not need randomness
    ///
    /// # Errors
    ///
    /// Any [`ConfigError`]: unknown names, missing or degenerate parameters,
    /// or an impossible geometry.
    pub fn new(config: SimulationConfig) -> Result<Self, ConfigError> {
        let path = config.turbulence_path();
        path.validate()?;
        require_positive("aperture_diameter", config.aperture_diameter)?;
        let geometry = PropagationGeometry::new(
            config.grid_size,
            config.path_length,
            config.num_screens,
            config.source_pitch,
            config.receiver_pitch,
        )?;
        let propagator = SplitStepPropagator::new(geometry, config.wavelength)?;
        let derived = path.derive();
        let atmosphere = AtmosphereConfig::try_from(config.atmosphere_settings(derived.r0))?;

        info!(
            "Simulation ready: N={}, L={:.1}m, {} screens, method={}, psd={}",
            config.grid_size,
            config.path_length,
            config.num_screens,
            atmosphere.method.name(),
            config.psd
        );
        log_derived(&derived);

        Ok(Self {
            config,
            path,
            derived,
            atmosphere,
            propagator,
        })
    }

    /// Configuration as currently in effect (Cn² reflects any re-targeting)
    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Derived turbulence quantities
    pub fn derived(&self) -> &DerivedTurbulence {
        &self.derived
    }

    /// Planned geometry
    pub fn geometry(&self) -> &PropagationGeometry {
        self.propagator.geometry()
    }

    /// Typed atmosphere configuration
    pub fn atmosphere_config(&self) -> &AtmosphereConfig {
        &self.atmosphere
    }

    /// Re-target the turbulence strength to a Rytov number
    ///
    /// Cn² is solved for and every derived quantity is recomputed from scratch.
    ///
    /// # Errors
    ///
    /// `rytov_number` must be finite and positive.
    pub fn set_rytov_number(&mut self, rytov_number: f64) -> Result<(), ConfigError> {
        let path = self.path.with_rytov_number(rytov_number)?;
        let derived = path.derive();
        info!(
            "Re-targeted Rytov number {:.3}: Cn2={:.3e}",
            rytov_number, path.cn2
        );
        log_derived(&derived);

        self.config.cn2 = path.cn2;
        self.path = path;
        self.derived = derived;
        self.atmosphere.r0 = derived.r0;
        Ok(())
    }

    /// Draw a fresh atmosphere for this simulation's geometry
    ///
    /// # Errors
    ///
    /// Never for a validated simulation; propagated for completeness.
    pub fn atmosphere<R: Rng + ?Sized>(&self, rng: &mut R) -> Result<Atmosphere, ConfigError> {
        Atmosphere::from_geometry(self.geometry(), self.atmosphere, rng)
    }

    /// Propagate `source` through a freshly drawn atmosphere
    ///
    /// # Errors
    ///
    /// [`ConfigError::ShapeMismatch`] when `source` is not N×N; checked
    /// before any random draw.
    pub fn run<R: Rng + ?Sized>(
        &self,
        source: &Array2<Complex64>,
        rng: &mut R,
    ) -> Result<SimulationOutput, ConfigError> {
        self.check_source(source)?;
        let atmosphere = self.atmosphere(rng)?;
        let field = if self.atmosphere.method == ScreenMethod::Vacuum {
            self.propagator.propagate_vacuum(source)?
        } else {
            self.propagator.propagate(source, atmosphere.screens())?
        };
        Ok(SimulationOutput {
            field,
            screens: atmosphere.into_screens(),
            receiver: self.receiver(),
            aperture_diameter: self.config.aperture_diameter,
        })
    }

    /// Sampling of the receiver plane
    pub fn receiver(&self) -> SampledPlane {
        let geometry = self.geometry();
        geometry.plane(geometry.num_screens() + 1)
    }

    /// Scintillation index of a receiver-plane `field` over this simulation's aperture
    pub fn scintillation_index(&self, field: &Array2<Complex64>) -> f64 {
        scintillation_index(field, &self.receiver(), self.config.aperture_diameter)
    }

    /// Propagate `source` with unity transmittance at every plane
    ///
    /// # Errors
    ///
    /// [`ConfigError::ShapeMismatch`] when `source` is not N×N.
    pub fn run_vacuum(&self, source: &Array2<Complex64>) -> Result<Array2<Complex64>, ConfigError> {
        self.propagator.propagate_vacuum(source)
    }

    fn check_source(&self, source: &Array2<Complex64>) -> Result<(), ConfigError> {
        let n = self.config.grid_size;
        if source.dim() == (n, n) {
            Ok(())
        } else {
            Err(ConfigError::ShapeMismatch {
                name: "source field",
                expected: (n, n),
                found: source.dim(),
            })
        }
    }
}

fn log_derived(derived: &DerivedTurbulence) {
    info!(
        "Derived turbulence: r0={:.4}m, r0_screen={:.4}m, Rytov={:.4}, rho0={:.4}m",
        derived.r0, derived.r0_screen, derived.rytov_variance, derived.coherence_radius
    );
    if derived.rytov_variance > 1.0 {
        warn!(
            "Rytov variance {:.2} > 1: strong fluctuations, weak-turbulence estimates are unreliable",
            derived.rytov_variance
        );
    }
}
