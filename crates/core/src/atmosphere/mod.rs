//! Turbulent atmosphere as an ordered stack of phase screens
//!
//! An [`Atmosphere`] owns one realized [`PhaseScreen`] per screen plane. Screens
//! are drawn eagerly when the atmosphere is built and never reused: every
//! simulation run builds a fresh atmosphere.
//!
//! Turbulence is split with equal strength per screen, so every screen uses
//! `r0_screen = r0 / NumScr^(-3/5)` regardless of where it sits on the path.
//!
//! Screens are synthesized in parallel. One child seed per screen is drawn from
//! the caller's generator in screen order before the parallel section, so a
//! seeded run reproduces the same atmosphere on any thread count.

mod settings;

pub use settings::AtmosphereSettings;

use crate::error::{require_positive, ConfigError};
use crate::grid::SampledPlane;
use crate::propagation::PropagationGeometry;
use crate::turbulence::{
    equal_strength_r0, FftScreenGenerator, PhaseScreen, PhaseSpectrum, SubharmonicCompensator,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::ops::Index;
use tracing::{debug, info};

/// How screens are synthesized
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum ScreenMethod {
    /// No turbulence: every screen is zero phase
    Vacuum,
    /// FFT screens only
    Fft(PhaseSpectrum),
    /// FFT screens plus subharmonic low-frequency compensation
    FftSubharmonic {
        /// Spectrum shared by both parts
        spectrum: PhaseSpectrum,
        /// Subharmonic levels
        orders: usize,
    },
}

impl ScreenMethod {
    /// Name used in name-keyed settings
    pub fn name(&self) -> &'static str {
        match self {
            Self::Vacuum => "vacuum",
            Self::Fft(_) => "ft",
            Self::FftSubharmonic { .. } => "ft_sh",
        }
    }

    /// Spectrum, unless vacuum
    pub fn spectrum(&self) -> Option<&PhaseSpectrum> {
        match self {
            Self::Vacuum => None,
            Self::Fft(spectrum) | Self::FftSubharmonic { spectrum, .. } => Some(spectrum),
        }
    }
}

/// Typed atmosphere configuration
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AtmosphereConfig {
    /// Screen synthesis method, carrying its spectrum
    pub method: ScreenMethod,
    /// Fried parameter of the whole path (m); ignored for vacuum
    pub r0: f64,
}

impl AtmosphereConfig {
    /// Check the method's spectrum, order count and r0
    ///
    /// # Errors
    ///
    /// Invalid spectrum parameters, zero subharmonic orders, or a
    /// non-positive r0 for any non-vacuum method.
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.method {
            ScreenMethod::Vacuum => return Ok(()),
            ScreenMethod::Fft(spectrum) => spectrum.validate()?,
            ScreenMethod::FftSubharmonic { spectrum, orders } => {
                spectrum.validate()?;
                if orders == 0 {
                    return Err(ConfigError::InvalidCount {
                        name: "n_subharm",
                        value: orders,
                        reason: "subharmonic compensation needs at least one order",
                    });
                }
            }
        }
        require_positive("r0", self.r0).map(|_| ())
    }
}

/// Realized stack of phase screens
#[derive(Debug, Clone)]
pub struct Atmosphere {
    config: AtmosphereConfig,
    grid_size: usize,
    locations: Vec<f64>,
    r0_screen: f64,
    screens: Vec<PhaseScreen>,
}

impl Atmosphere {
    /// Draw screens at `locations` (m along the path)
    ///
    /// Each screen's pitch is interpolated between `source_pitch` and
    /// `receiver_pitch` by `z / z_last`.
    ///
    /// # Errors
    ///
    /// Invalid configuration, an empty or non-increasing location list, or
    /// non-positive pitches. Nothing is drawn from `rng` on failure.
    pub fn new<R: Rng + ?Sized>(
        grid_size: usize,
        locations: &[f64],
        source_pitch: f64,
        receiver_pitch: f64,
        config: AtmosphereConfig,
        rng: &mut R,
    ) -> Result<Self, ConfigError> {
        require_positive("dx", source_pitch)?;
        require_positive("Rdx", receiver_pitch)?;
        let z_last = match locations.last() {
            Some(&z) => require_positive("screen location", z)?,
            None => {
                return Err(ConfigError::InvalidCount {
                    name: "num_screens",
                    value: 0,
                    reason: "at least one phase screen is required",
                })
            }
        };
        if let Some(pair) = locations.windows(2).find(|w| !(w[0] >= 0.0 && w[0] < w[1])) {
            return Err(ConfigError::InvalidParameter {
                name: "screen location",
                value: pair[0],
                reason: "locations must be non-negative and strictly increasing",
            });
        }

        let pitches: Vec<f64> = locations
            .iter()
            .map(|z| source_pitch + (receiver_pitch - source_pitch) * z / z_last)
            .collect();
        Self::realize(grid_size, locations.to_vec(), &pitches, config, rng)
    }

    /// Draw one screen per interior plane of `geometry`, at that plane's pitch
    ///
    /// # Errors
    ///
    /// Invalid configuration. Nothing is drawn from `rng` on failure.
    pub fn from_geometry<R: Rng + ?Sized>(
        geometry: &PropagationGeometry,
        config: AtmosphereConfig,
        rng: &mut R,
    ) -> Result<Self, ConfigError> {
        Self::realize(
            geometry.grid_size(),
            geometry.screen_positions().to_vec(),
            geometry.screen_pitches(),
            config,
            rng,
        )
    }

    fn realize<R: Rng + ?Sized>(
        grid_size: usize,
        locations: Vec<f64>,
        pitches: &[f64],
        config: AtmosphereConfig,
        rng: &mut R,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if grid_size == 0 {
            return Err(ConfigError::InvalidCount {
                name: "N",
                value: grid_size,
                reason: "grid must have at least one sample per side",
            });
        }

        let r0_screen = equal_strength_r0(config.r0, locations.len());
        info!(
            "Building atmosphere: {} screens, {}x{} grid, method={}, r0_screen={:.4}m",
            locations.len(),
            grid_size,
            grid_size,
            config.method.name(),
            r0_screen
        );

        let screens = match config.method {
            ScreenMethod::Vacuum => pitches
                .iter()
                .map(|&pitch| PhaseScreen::vacuum(grid_size, pitch))
                .collect(),
            ScreenMethod::Fft(spectrum) => {
                synthesize(grid_size, pitches, r0_screen, spectrum, None, rng)
            }
            ScreenMethod::FftSubharmonic { spectrum, orders } => synthesize(
                grid_size,
                pitches,
                r0_screen,
                spectrum,
                Some(SubharmonicCompensator::new(spectrum, orders)),
                rng,
            ),
        };

        Ok(Self {
            config,
            grid_size,
            locations,
            r0_screen,
            screens,
        })
    }

    /// Configuration the screens were drawn from
    pub fn config(&self) -> &AtmosphereConfig {
        &self.config
    }

    /// Samples per side of every screen
    pub fn grid_size(&self) -> usize {
        self.grid_size
    }

    /// Number of screens
    pub fn len(&self) -> usize {
        self.screens.len()
    }

    /// Whether the stack holds no screens (never true for a built atmosphere)
    pub fn is_empty(&self) -> bool {
        self.screens.is_empty()
    }

    /// Screen positions along the path (m)
    pub fn locations(&self) -> &[f64] {
        &self.locations
    }

    /// Fried parameter used for every screen (m)
    pub fn r0_screen(&self) -> f64 {
        self.r0_screen
    }

    /// Screen `index`, if it exists
    pub fn screen(&self, index: usize) -> Option<&PhaseScreen> {
        self.screens.get(index)
    }

    /// All screens in path order
    pub fn screens(&self) -> &[PhaseScreen] {
        &self.screens
    }

    /// Iterate over screens in path order
    pub fn iter(&self) -> std::slice::Iter<'_, PhaseScreen> {
        self.screens.iter()
    }

    /// Consume the atmosphere, returning its screens
    pub fn into_screens(self) -> Vec<PhaseScreen> {
        self.screens
    }
}

impl Index<usize> for Atmosphere {
    type Output = PhaseScreen;

    fn index(&self, index: usize) -> &PhaseScreen {
        &self.screens[index]
    }
}

impl<'a> IntoIterator for &'a Atmosphere {
    type Item = &'a PhaseScreen;
    type IntoIter = std::slice::Iter<'a, PhaseScreen>;

    fn into_iter(self) -> Self::IntoIter {
        self.screens.iter()
    }
}

fn synthesize<R: Rng + ?Sized>(
    grid_size: usize,
    pitches: &[f64],
    r0_screen: f64,
    spectrum: PhaseSpectrum,
    subharmonics: Option<SubharmonicCompensator>,
    rng: &mut R,
) -> Vec<PhaseScreen> {
    let generator = FftScreenGenerator::new(grid_size, spectrum);
    let seeds: Vec<u64> = pitches.iter().map(|_| rng.next_u64()).collect();

    seeds
        .par_iter()
        .zip(pitches.par_iter())
        .enumerate()
        .map(|(index, (&seed, &pitch))| {
            let mut child = StdRng::seed_from_u64(seed);
            let mut phase = generator.generate(pitch, r0_screen, &mut child);
            if let Some(compensator) = &subharmonics {
                let plane = SampledPlane::new(grid_size, pitch);
                phase += &compensator.generate(&plane, r0_screen, &mut child);
            }
            debug!("Screen {}: pitch={:.4e}m, seed={:#018x}", index, pitch, seed);
            PhaseScreen::new(phase, pitch)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::turbulence::PsdModel;
    use approx::assert_relative_eq;
    use rand::RngCore;

    fn ft_config() -> AtmosphereConfig {
        AtmosphereConfig {
            method: ScreenMethod::Fft(PhaseSpectrum::default()),
            r0: 0.05,
        }
    }

    #[test]
    fn test_one_screen_per_location_with_interpolated_pitch() {
        let mut rng = StdRng::seed_from_u64(1);
        let locations = [100.0, 300.0, 500.0];
        let atmosphere = Atmosphere::new(32, &locations, 1e-3, 3e-3, ft_config(), &mut rng).unwrap();

        assert_eq!(atmosphere.len(), 3);
        assert_eq!(atmosphere.locations(), &locations);
        let pitches: Vec<f64> = atmosphere.iter().map(PhaseScreen::pitch).collect();
        assert_relative_eq!(pitches[0], 1e-3 + 2e-3 * 0.2, max_relative = 1e-12);
        assert_relative_eq!(pitches[1], 1e-3 + 2e-3 * 0.6, max_relative = 1e-12);
        assert_relative_eq!(pitches[2], 3e-3, max_relative = 1e-12);
        for screen in &atmosphere {
            assert_eq!(screen.phase().dim(), (32, 32));
        }
        assert_eq!(atmosphere[1], *atmosphere.screen(1).unwrap());
        assert!(atmosphere.screen(3).is_none());
    }

    #[test]
    fn test_equal_strength_r0() {
        let mut rng = StdRng::seed_from_u64(2);
        let geometry = PropagationGeometry::new(16, 1000.0, 10, 5e-3, 5e-3).unwrap();
        let atmosphere = Atmosphere::from_geometry(&geometry, ft_config(), &mut rng).unwrap();
        assert_eq!(atmosphere.len(), 10);
        assert_relative_eq!(
            atmosphere.r0_screen(),
            0.05 * 10.0_f64.powf(0.6),
            max_relative = 1e-12
        );
        assert_eq!(atmosphere.locations(), geometry.screen_positions());
    }

    #[test]
    fn test_vacuum_screens_are_exactly_unit_transmittance() {
        let mut rng = StdRng::seed_from_u64(3);
        let before = rng.clone().next_u64();
        let config = AtmosphereConfig {
            method: ScreenMethod::Vacuum,
            r0: f64::INFINITY,
        };
        let geometry = PropagationGeometry::new(16, 100.0, 4, 1e-3, 1e-3).unwrap();
        let atmosphere = Atmosphere::from_geometry(&geometry, config, &mut rng).unwrap();
        assert_eq!(atmosphere.len(), 4);
        for screen in &atmosphere {
            assert!(screen.transmittance().iter().all(|t| t.re == 1.0 && t.im == 0.0));
        }
        // Vacuum consumes no randomness
        assert_eq!(rng.next_u64(), before);
    }

    #[test]
    fn test_seeded_atmospheres_are_reproducible() {
        let geometry = PropagationGeometry::new(32, 2000.0, 4, 5e-3, 5e-3).unwrap();
        let config = AtmosphereConfig {
            method: ScreenMethod::FftSubharmonic {
                spectrum: PhaseSpectrum::new(PsdModel::VonKarman { outer_scale: 100.0 }),
                orders: 3,
            },
            r0: 0.05,
        };
        let a = Atmosphere::from_geometry(&geometry, config, &mut StdRng::seed_from_u64(42)).unwrap();
        let b = Atmosphere::from_geometry(&geometry, config, &mut StdRng::seed_from_u64(42)).unwrap();
        assert_eq!(a.screens(), b.screens());
        // Screens are independent draws, not copies
        assert_ne!(a[0], a[1]);
    }

    #[test]
    fn test_invalid_config_draws_nothing() {
        let mut rng = StdRng::seed_from_u64(5);
        let before = rng.clone().next_u64();
        let config = AtmosphereConfig {
            method: ScreenMethod::FftSubharmonic {
                spectrum: PhaseSpectrum::default(),
                orders: 0,
            },
            r0: 0.05,
        };
        let geometry = PropagationGeometry::new(16, 100.0, 2, 1e-3, 1e-3).unwrap();
        assert!(Atmosphere::from_geometry(&geometry, config, &mut rng).is_err());

        let bad_r0 = AtmosphereConfig { r0: -1.0, ..ft_config() };
        assert!(Atmosphere::from_geometry(&geometry, bad_r0, &mut rng).is_err());
        assert_eq!(rng.next_u64(), before);
    }

    #[test]
    fn test_rejects_bad_locations() {
        let mut rng = StdRng::seed_from_u64(6);
        assert!(Atmosphere::new(16, &[], 1e-3, 1e-3, ft_config(), &mut rng).is_err());
        assert!(Atmosphere::new(16, &[10.0, 5.0], 1e-3, 1e-3, ft_config(), &mut rng).is_err());
        assert!(Atmosphere::new(16, &[-1.0, 5.0], 1e-3, 1e-3, ft_config(), &mut rng).is_err());
        assert!(Atmosphere::new(16, &[0.0], 1e-3, 1e-3, ft_config(), &mut rng).is_err());
    }
}
