//! Configuration errors
//!
//! Every failure in this crate is a configuration defect: an unknown model name,
//! a missing or degenerate parameter, or an array of the wrong shape handed in at
//! the library boundary. Errors are raised at construction time, before any
//! random draw, and always name the offending field.

use thiserror::Error;

/// Errors raised while validating a simulation, atmosphere or geometry setup
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ConfigError {
    /// Screen synthesis method name is not recognised
    #[error("unknown screen method '{0}' (expected one of: vacuum, ft, ft_sh)")]
    UnknownScreenMethod(String),

    /// PSD model name is not recognised
    #[error("unknown PSD model '{0}' (expected one of: kolmogorov, vonKarman, modified_vonKarman)")]
    UnknownPsd(String),

    /// A parameter required by the selected method/PSD combination was not supplied
    #[error("missing required parameter '{0}'")]
    MissingParameter(&'static str),

    /// A numeric parameter is non-finite or outside its valid range
    #[error("invalid parameter '{name}' = {value}: {reason}")]
    InvalidParameter {
        /// Field name
        name: &'static str,
        /// Offending value
        value: f64,
        /// What the value must satisfy
        reason: &'static str,
    },

    /// Outer scale must exceed inner scale
    #[error("outer scale L0 = {outer} m must exceed inner scale l0 = {inner} m")]
    InconsistentScales {
        /// Outer scale (m)
        outer: f64,
        /// Inner scale (m)
        inner: f64,
    },

    /// Grid size or screen count out of range
    #[error("invalid count '{name}' = {value}: {reason}")]
    InvalidCount {
        /// Field name
        name: &'static str,
        /// Offending value
        value: usize,
        /// What the value must satisfy
        reason: &'static str,
    },

    /// A planned geometry broke one of its invariants
    #[error("propagation geometry invariant violated: {0}")]
    Geometry(String),

    /// An array handed across the library boundary has the wrong shape
    #[error("{name} has shape {found:?}, expected {expected:?}")]
    ShapeMismatch {
        /// Which array
        name: &'static str,
        /// Required shape
        expected: (usize, usize),
        /// Shape that was supplied
        found: (usize, usize),
    },

    /// Number of phase screens does not match the number of interior planes
    #[error("expected {expected} phase screens, got {found}")]
    ScreenCount {
        /// Interior planes in the geometry
        expected: usize,
        /// Screens supplied
        found: usize,
    },
}

/// Reject non-finite or non-positive values
///
/// # Errors
///
/// Returns [`ConfigError::InvalidParameter`] naming `name` when `value` is NaN,
/// infinite, zero or negative.
pub fn require_positive(name: &'static str, value: f64) -> Result<f64, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::InvalidParameter {
            name,
            value,
            reason: "must be finite and > 0",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_require_positive_accepts_positive() {
        assert_eq!(require_positive("dx", 5e-3), Ok(5e-3));
    }

    #[test]
    fn test_require_positive_rejects_degenerate_values() {
        for bad in [0.0, -1.0, f64::NAN, f64::INFINITY] {
            let err = require_positive("path_length", bad).unwrap_err();
            assert!(
                err.to_string().contains("path_length"),
                "error should name the field: {err}"
            );
        }
    }

    #[test]
    fn test_unknown_psd_message_names_key() {
        let err = ConfigError::UnknownPsd("tatarskii".to_string());
        assert!(err.to_string().contains("tatarskii"));
    }
}
