use crate::common::constants::{DEFAULT_HUBBLE_CONSTANT, DEFAULT_OMEGA_MATTER, SPEED_OF_LIGHT_KM_S};
use crate::domain::{PhotozError, PhotozResult};

/// Luminosity distance in Mpc as a function of redshift.
pub trait LuminosityDistance: Send + Sync {
    fn luminosity_distance(&self, redshift: f64) -> f64;
}

/// Flat ΛCDM luminosity distance using the Pen (1999) fitting formula for the
/// conformal time, accurate to a few parts per thousand for 0.2 <= Ω_m <= 1.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlatLambdaCdm {
    hubble_constant: f64,
    omega_matter: f64,
}

impl Default for FlatLambdaCdm {
    fn default() -> Self {
        Self {
            hubble_constant: DEFAULT_HUBBLE_CONSTANT,
            omega_matter: DEFAULT_OMEGA_MATTER,
        }
    }
}

impl FlatLambdaCdm {
    pub fn new(hubble_constant: f64, omega_matter: f64) -> PhotozResult<Self> {
        if !(hubble_constant.is_finite() && hubble_constant > 0.0) {
            return Err(PhotozError::configuration(
                "CONFIG.COSMOLOGY",
                format!("Hubble constant must be finite and > 0, got {hubble_constant}"),
            ));
        }
        if !(omega_matter.is_finite() && omega_matter > 0.0 && omega_matter <= 1.0) {
            return Err(PhotozError::configuration(
                "CONFIG.COSMOLOGY",
                format!("matter density must lie in (0, 1], got {omega_matter}"),
            ));
        }

        Ok(Self {
            hubble_constant,
            omega_matter,
        })
    }

    pub fn hubble_distance(&self) -> f64 {
        SPEED_OF_LIGHT_KM_S / self.hubble_constant
    }

    fn eta(&self, scale_factor: f64) -> f64 {
        let s3 = (1.0 - self.omega_matter) / self.omega_matter;
        let s = s3.cbrt();
        let a = scale_factor;
        let polynomial = 1.0 / a.powi(4) - 0.1540 * s / a.powi(3) + 0.4304 * s * s / (a * a)
            + 0.19097 * s3 / a
            + 0.066941 * s3 * s;
        2.0 * (s3 + 1.0).sqrt() * polynomial.powf(-0.125)
    }
}

impl LuminosityDistance for FlatLambdaCdm {
    fn luminosity_distance(&self, redshift: f64) -> f64 {
        let opz = 1.0 + redshift;
        self.hubble_distance() * opz * (self.eta(1.0) - self.eta(1.0 / opz))
    }
}
