//! Name-keyed atmosphere settings
//!
//! Mirrors the string-keyed configuration users write in JSON. Conversion into
//! [`AtmosphereConfig`] resolves every name into a closed variant and checks
//! that each parameter the chosen combination needs is present.

use super::{AtmosphereConfig, ScreenMethod};
use crate::error::ConfigError;
use crate::turbulence::{PhaseSpectrum, PsdModel, KOLMOGOROV_EXPONENT};
use serde::{Deserialize, Serialize};

/// String-keyed atmosphere description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AtmosphereSettings {
    /// `vacuum`, `ft` or `ft_sh`
    pub screen_method: String,
    /// `kolmogorov`, `vonKarman` or `modified_vonKarman`
    pub psd: String,
    /// Fried parameter of the whole path (m)
    pub r0: Option<f64>,
    /// Outer scale (m)
    #[serde(rename = "L0")]
    pub outer_scale: Option<f64>,
    /// Inner scale (m)
    #[serde(rename = "l0")]
    pub inner_scale: Option<f64>,
    /// Power-law exponent
    pub alpha: f64,
    /// Anisotropy magnitude
    pub anisotropy: f64,
    /// Anisotropy rotation (degrees)
    pub rotation_deg: f64,
    /// Subharmonic order count for `ft_sh`
    #[serde(rename = "n_subharm")]
    pub subharmonic_orders: Option<usize>,
}

impl Default for AtmosphereSettings {
    fn default() -> Self {
        Self {
            screen_method: "ft_sh".to_string(),
            psd: "kolmogorov".to_string(),
            r0: None,
            outer_scale: None,
            inner_scale: None,
            alpha: KOLMOGOROV_EXPONENT,
            anisotropy: 1.0,
            rotation_deg: 0.0,
            subharmonic_orders: None,
        }
    }
}

enum MethodName {
    Vacuum,
    Fft,
    FftSubharmonic,
}

fn parse_method(name: &str) -> Result<MethodName, ConfigError> {
    match name {
        "vacuum" => Ok(MethodName::Vacuum),
        "ft" => Ok(MethodName::Fft),
        "ft_sh" => Ok(MethodName::FftSubharmonic),
        other => Err(ConfigError::UnknownScreenMethod(other.to_string())),
    }
}

impl AtmosphereSettings {
    fn psd_model(&self) -> Result<PsdModel, ConfigError> {
        let outer = || self.outer_scale.ok_or(ConfigError::MissingParameter("L0"));
        match self.psd.as_str() {
            "kolmogorov" => Ok(PsdModel::Kolmogorov),
            "vonKarman" | "von_karman" => Ok(PsdModel::VonKarman {
                outer_scale: outer()?,
            }),
            "modified_vonKarman" | "modified_von_karman" => Ok(PsdModel::ModifiedVonKarman {
                outer_scale: outer()?,
                inner_scale: self.inner_scale.ok_or(ConfigError::MissingParameter("l0"))?,
            }),
            other => Err(ConfigError::UnknownPsd(other.to_string())),
        }
    }
}

impl TryFrom<&AtmosphereSettings> for AtmosphereConfig {
    type Error = ConfigError;

    fn try_from(settings: &AtmosphereSettings) -> Result<Self, Self::Error> {
        let method_name = parse_method(&settings.screen_method)?;
        // PSD name is checked even for vacuum so a typo never goes unnoticed
        let model = settings.psd_model()?;
        let spectrum = PhaseSpectrum::new(model)
            .with_exponent(settings.alpha)
            .with_anisotropy(settings.anisotropy, settings.rotation_deg.to_radians());

        let method = match method_name {
            MethodName::Vacuum => ScreenMethod::Vacuum,
            MethodName::Fft => ScreenMethod::Fft(spectrum),
            MethodName::FftSubharmonic => ScreenMethod::FftSubharmonic {
                spectrum,
                orders: settings
                    .subharmonic_orders
                    .ok_or(ConfigError::MissingParameter("n_subharm"))?,
            },
        };
        let r0 = match method {
            ScreenMethod::Vacuum => settings.r0.unwrap_or(f64::INFINITY),
            _ => settings.r0.ok_or(ConfigError::MissingParameter("r0"))?,
        };

        let config = AtmosphereConfig { method, r0 };
        config.validate()?;
        Ok(config)
    }
}

impl TryFrom<AtmosphereSettings> for AtmosphereConfig {
    type Error = ConfigError;

    fn try_from(settings: AtmosphereSettings) -> Result<Self, Self::Error> {
        Self::try_from(&settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn settings(method: &str, psd: &str) -> AtmosphereSettings {
        AtmosphereSettings {
            screen_method: method.to_string(),
            psd: psd.to_string(),
            r0: Some(0.05),
            ..AtmosphereSettings::default()
        }
    }

    #[test]
    fn test_kolmogorov_ft() {
        let config = AtmosphereConfig::try_from(settings("ft", "kolmogorov")).unwrap();
        assert_eq!(config.method, ScreenMethod::Fft(PhaseSpectrum::default()));
        assert_eq!(config.r0, 0.05);
    }

    #[test]
    fn test_modified_von_karman_with_subharmonics() {
        let s = AtmosphereSettings {
            outer_scale: Some(100.0),
            inner_scale: Some(1e-3),
            subharmonic_orders: Some(3),
            rotation_deg: 90.0,
            anisotropy: 2.0,
            ..settings("ft_sh", "modified_vonKarman")
        };
        let config = AtmosphereConfig::try_from(&s).unwrap();
        match config.method {
            ScreenMethod::FftSubharmonic { spectrum, orders } => {
                assert_eq!(orders, 3);
                assert_eq!(
                    spectrum.model,
                    PsdModel::ModifiedVonKarman {
                        outer_scale: 100.0,
                        inner_scale: 1e-3
                    }
                );
                assert_relative_eq!(spectrum.rotation, std::f64::consts::FRAC_PI_2, epsilon = 1e-15);
                assert_eq!(spectrum.anisotropy, 2.0);
            }
            other => panic!("unexpected method {other:?}"),
        }
    }

    #[test]
    fn test_unknown_names_are_reported() {
        assert_eq!(
            AtmosphereConfig::try_from(settings("ft", "tatarskii")),
            Err(ConfigError::UnknownPsd("tatarskii".to_string()))
        );
        assert_eq!(
            AtmosphereConfig::try_from(settings("zernike", "kolmogorov")),
            Err(ConfigError::UnknownScreenMethod("zernike".to_string()))
        );
        // Vacuum still rejects a misspelled PSD
        assert!(AtmosphereConfig::try_from(settings("vacuum", "kolmogrov")).is_err());
    }

    #[test]
    fn test_missing_parameters_are_named() {
        assert_eq!(
            AtmosphereConfig::try_from(settings("ft", "vonKarman")),
            Err(ConfigError::MissingParameter("L0"))
        );
        let s = AtmosphereSettings {
            outer_scale: Some(10.0),
            ..settings("ft", "modified_vonKarman")
        };
        assert_eq!(
            AtmosphereConfig::try_from(s),
            Err(ConfigError::MissingParameter("l0"))
        );
        assert_eq!(
            AtmosphereConfig::try_from(settings("ft_sh", "kolmogorov")),
            Err(ConfigError::MissingParameter("n_subharm"))
        );
        let no_r0 = AtmosphereSettings {
            r0: None,
            ..settings("ft", "kolmogorov")
        };
        assert_eq!(
            AtmosphereConfig::try_from(no_r0),
            Err(ConfigError::MissingParameter("r0"))
        );
    }

    #[test]
    fn test_vacuum_needs_no_r0() {
        let s = AtmosphereSettings {
            r0: None,
            ..settings("vacuum", "kolmogorov")
        };
        let config = AtmosphereConfig::try_from(s).unwrap();
        assert_eq!(config.method, ScreenMethod::Vacuum);
    }

    #[test]
    fn test_snake_case_aliases_and_json_keys() {
        let json = r#"{"screen_method":"ft","psd":"von_karman","r0":0.1,"L0":20.0}"#;
        let s: AtmosphereSettings = serde_json::from_str(json).unwrap();
        let config = AtmosphereConfig::try_from(s).unwrap();
        assert_eq!(
            config.method,
            ScreenMethod::Fft(PhaseSpectrum::new(PsdModel::VonKarman { outer_scale: 20.0 }))
        );
    }
}
