use crate::compare_floats::clip;
use crate::core::solar_modeling::solar_position::SolarPosition;
use crate::errors::BifiError;
use crate::input::{AugmentationConfig, SystemInfo};
use tracing::debug;

/// Mechanical description of a single-axis tracker row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackerAxis {
    /// Tilt of the rotation axis from horizontal, degrees
    pub axis_tilt: f64,
    /// Compass direction the axis points along, degrees (180 = N-S axis)
    pub axis_azimuth: f64,
    /// Rotation limit either side of flat, degrees
    pub max_angle: f64,
    pub backtrack: bool,
    /// Ground coverage ratio: collector width over row pitch
    pub gcr: f64,
}

impl TrackerAxis {
    pub fn from_system(system: SystemInfo, config: &AugmentationConfig) -> Self {
        Self {
            axis_tilt: config.axis_tilt,
            axis_azimuth: config.axis_azimuth,
            max_angle: system.max_tilt,
            backtrack: config.backtrack,
            gcr: system.gcr,
        }
    }

    fn check(&self) -> Result<(), BifiError> {
        if !(self.gcr > 0. && self.gcr <= 1.) {
            return Err(BifiError::InvalidGroundCoverRatio(self.gcr));
        }
        if !(0. ..=180.).contains(&self.max_angle) {
            return Err(BifiError::InvalidInput(format!(
                "tracker max angle {} outside [0, 180]",
                self.max_angle
            )));
        }
        Ok(())
    }
}

/// Modelled tracker state for one timestamp. Every field is NaN while the sun is
/// below the horizon.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TrackerOrientation {
    /// Rotation from flat, degrees; negative rotates the modules to face east
    pub tracker_theta: f64,
    /// Angle of incidence of the beam on the module front, degrees
    pub aoi: f64,
    pub surface_azimuth: f64,
    pub surface_tilt: f64,
}

impl TrackerOrientation {
    const UNDEFINED: Self = Self {
        tracker_theta: f64::NAN,
        aoi: f64::NAN,
        surface_azimuth: f64::NAN,
        surface_tilt: f64::NAN,
    };
}

pub trait TrackerSolver {
    fn orient(
        &self,
        positions: &[SolarPosition],
        axis: &TrackerAxis,
    ) -> Result<Vec<TrackerOrientation>, BifiError>;
}

/// Ideal true-tracking rotation with optional backtracking to avoid row-to-row
/// shading (Anderson & Mikofski 2020, for a level cross-axis slope).
#[derive(Clone, Copy, Debug, Default)]
pub struct SingleAxisTracker;

impl TrackerSolver for SingleAxisTracker {
    fn orient(
        &self,
        positions: &[SolarPosition],
        axis: &TrackerAxis,
    ) -> Result<Vec<TrackerOrientation>, BifiError> {
        axis.check()?;

        let orientations = positions
            .iter()
            .map(|position| orient_one(position, axis))
            .collect::<Vec<_>>();

        debug!(
            rows = orientations.len(),
            night_rows = orientations
                .iter()
                .filter(|o| o.tracker_theta.is_nan())
                .count(),
            "modelled tracker orientation"
        );

        Ok(orientations)
    }
}

fn sind(degrees: f64) -> f64 {
    degrees.to_radians().sin()
}

fn cosd(degrees: f64) -> f64 {
    degrees.to_radians().cos()
}

fn orient_one(position: &SolarPosition, axis: &TrackerAxis) -> TrackerOrientation {
    let zenith = position.apparent_zenith;
    if zenith.is_nan() || zenith > 90. {
        return TrackerOrientation::UNDEFINED;
    }

    // sun vector in a frame with x east-ish, y south-ish, z up, then rotated into
    // the frame of the tracker axis
    let elevation = position.apparent_elevation();
    let azimuth = position.azimuth - 180.;
    let x = cosd(elevation) * sind(azimuth);
    let y = cosd(elevation) * cosd(azimuth);
    let z = sind(elevation);

    let axis_azimuth_south = axis.axis_azimuth - 180.;
    let xp = x * cosd(axis_azimuth_south) - y * sind(axis_azimuth_south);
    let zp = x * sind(axis_azimuth_south) * sind(axis.axis_tilt)
        + y * cosd(axis_azimuth_south) * sind(axis.axis_tilt)
        + z * cosd(axis.axis_tilt);

    let ideal = xp.atan2(zp).to_degrees();

    let mut theta = ideal;
    if axis.backtrack {
        let temp = (cosd(ideal) / axis.gcr).abs();
        // no row-to-row shade to avoid once temp reaches 1
        if temp < 1. {
            theta += -ideal.signum() * temp.acos().to_degrees();
        }
    }
    let theta = clip(theta, -axis.max_angle, axis.max_angle);

    let surface_tilt = (cosd(theta) * cosd(axis.axis_tilt)).abs().acos().to_degrees();
    let azimuth_delta = if sind(surface_tilt) != 0. {
        let delta = clip(sind(theta) / sind(surface_tilt), -1., 1.)
            .asin()
            .to_degrees();
        if theta.abs() < 90. {
            delta
        } else {
            -delta + theta.signum() * 180.
        }
    } else {
        90.
    };
    let surface_azimuth = (axis.axis_azimuth + azimuth_delta).rem_euclid(360.);

    let cos_aoi = cosd(surface_tilt) * cosd(zenith)
        + sind(surface_tilt) * sind(zenith) * cosd(position.azimuth - surface_azimuth);
    let aoi = clip(cos_aoi, -1., 1.).acos().to_degrees();

    TrackerOrientation {
        tracker_theta: theta,
        aoi,
        surface_azimuth,
        surface_tilt,
    }
}
