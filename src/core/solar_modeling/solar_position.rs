//! Sun position and extraterrestrial irradiance for a series of timestamps.

use crate::errors::BifiError;
use crate::input::{AugmentationConfig, SiteInfo};
use crate::timeseries::Timestamp;
use serde::{Deserialize, Serialize};
use solar_positioning::{spa, RefractionCorrection};
use std::f64::consts::PI;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SolarPosition {
    /// Zenith angle corrected for atmospheric refraction, degrees
    pub apparent_zenith: f64,
    /// Degrees, 0 = North, 90 = East
    pub azimuth: f64,
}

impl SolarPosition {
    pub fn apparent_elevation(&self) -> f64 {
        90. - self.apparent_zenith
    }
}

/// Source of sun angles and top-of-atmosphere irradiance.
pub trait SolarEphemeris {
    fn solar_position(
        &self,
        timestamps: &[Timestamp],
        site: &SiteInfo,
    ) -> Result<Vec<SolarPosition>, BifiError>;

    /// Extraterrestrial direct normal irradiance for a day of the year (1-366), W/m2.
    fn extraterrestrial_radiation(&self, day_of_year: u32) -> f64;
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExtraterrestrialModel {
    /// Spencer (1971) Fourier series around a 1366.1 W/m2 solar constant
    #[default]
    Spencer,
    /// BS EN ISO 52010-1 single cosine around 1367 W/m2
    Iso52010,
}

impl ExtraterrestrialModel {
    pub fn radiation(self, day_of_year: u32) -> f64 {
        match self {
            ExtraterrestrialModel::Spencer => {
                let b = 2. * PI * (day_of_year as f64 - 1.) / 365.;
                let r_over_r0_squared = 1.00011
                    + 0.034221 * b.cos()
                    + 0.00128 * b.sin()
                    + 0.000719 * (2. * b).cos()
                    + 0.000077 * (2. * b).sin();
                1366.1 * r_over_r0_squared
            }
            ExtraterrestrialModel::Iso52010 => {
                1367.0 * (1.0 + 0.033 * earth_orbit_deviation(day_of_year).to_radians().cos())
            }
        }
    }
}

/// Earth orbit deviation in degrees for a 1-indexed day of the year.
fn earth_orbit_deviation(day_of_year: u32) -> f64 {
    (360.0 / 365.0) * day_of_year as f64
}

/// NREL Solar Position Algorithm (Reda & Andreas 2003) with the refraction
/// correction applied to give apparent zenith.
#[derive(Clone, Copy, Debug)]
pub struct SpaEphemeris {
    delta_t: f64,
    temperature: f64,
    extraterrestrial: ExtraterrestrialModel,
}

impl Default for SpaEphemeris {
    fn default() -> Self {
        Self::new(67., 12., ExtraterrestrialModel::Spencer)
    }
}

impl SpaEphemeris {
    /// Arguments:
    /// * `delta_t` - difference between terrestrial and universal time, in seconds
    /// * `temperature` - air temperature for the refraction correction, in deg C
    /// * `extraterrestrial` - model for top-of-atmosphere irradiance
    pub fn new(delta_t: f64, temperature: f64, extraterrestrial: ExtraterrestrialModel) -> Self {
        Self {
            delta_t,
            temperature,
            extraterrestrial,
        }
    }

    pub fn from_config(config: &AugmentationConfig) -> Self {
        Self::new(
            config.delta_t_seconds,
            config.refraction_temperature,
            config.extraterrestrial_model,
        )
    }
}

impl SolarEphemeris for SpaEphemeris {
    fn solar_position(
        &self,
        timestamps: &[Timestamp],
        site: &SiteInfo,
    ) -> Result<Vec<SolarPosition>, BifiError> {
        site.check()?;
        let refraction =
            RefractionCorrection::new(pressure_from_altitude(site.elevation), self.temperature)?;

        timestamps
            .iter()
            .map(|timestamp| {
                spa::solar_position(
                    *timestamp,
                    site.latitude,
                    site.longitude,
                    site.elevation,
                    self.delta_t,
                    Some(refraction),
                )
                .map(|position| SolarPosition {
                    apparent_zenith: position.zenith_angle(),
                    azimuth: position.azimuth(),
                })
                .map_err(BifiError::from)
            })
            .collect()
    }

    fn extraterrestrial_radiation(&self, day_of_year: u32) -> f64 {
        self.extraterrestrial.radiation(day_of_year)
    }
}

/// Standard-atmosphere pressure at an altitude in metres, in hPa.
pub fn pressure_from_altitude(altitude: f64) -> f64 {
    ((44331.514 - altitude) / 11880.516).powf(1. / 0.1902632)
}
