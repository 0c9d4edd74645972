//! Closed-form shading geometry for an outboard sensor on a single-axis tracker.
//!
//! All angles taken and returned here are in radians.

use crate::compare_floats::clip_to_unit_domain;
use crate::errors::{check_length, BifiError};

/// Cosine of the shade angle from the sun's azimuth and elevation.
///
/// Arguments:
/// * `sun_azimuth` - radians, 0 = North, pi/2 = East
/// * `sun_elevation` - radians, 0 = horizon, pi/2 = zenith
///
/// The result is negative when the sun is behind the array; no shade is cast then.
pub fn shade_cosine(sun_azimuth: f64, sun_elevation: f64) -> f64 {
    -sun_azimuth.cos() * sun_elevation.cos()
}

/// Shade angle `phi` from its cosine.
///
/// Overshoot of [-1, 1] within floating-point tolerance lands on the boundary. Anything
/// further out gives NaN so the row stays visible downstream instead of being clamped.
pub fn shade_angle(cos_phi: f64) -> f64 {
    clip_to_unit_domain(cos_phi).map_or(f64::NAN, f64::acos)
}

/// Angle between the sensor and the shade line, measured along the tracker axis.
///
/// Arguments:
/// * `phi` - shade angle relative to the array edge along the tracker axis (0 = horizontal)
/// * `height` - height of the bottom of the array's shading edge, in m
/// * `offset` - horizontal offset of the sensor from the shade-casting edge, in m;
///   positive when set back from the edge, negative when forward of it
///
/// `atan2` keeps the result in the right quadrant for either sign of `offset`, and
/// reduces to `phi` when `offset` is zero.
pub fn shade_line_angle(phi: f64, height: f64, offset: f64) -> f64 {
    let s_phi = phi.sin();
    (height * s_phi).atan2(offset * s_phi + height * phi.cos())
}

/// Second, independent derivation of [`shade_line_angle`] through `arccos`.
///
/// Both must agree; having the two lets a transcription slip in either be caught.
/// A ratio outside [-1, 1] beyond floating-point tolerance, or a non-positive
/// denominator, means the geometry was specified wrongly and is an error.
pub fn shade_line_angle_alt(phi: f64, height: f64, offset: f64) -> Result<f64, BifiError> {
    let s_phi = phi.sin();
    let c_phi = phi.cos();
    let o_s_phi = offset * s_phi;
    let h_c_phi = height * c_phi;

    let num = o_s_phi + h_c_phi;
    let den2 = o_s_phi * o_s_phi + 2. * h_c_phi * o_s_phi + height * height;

    if den2 <= 0. {
        return Err(BifiError::DomainViolation {
            function: "shade_line_angle_alt",
            detail: format!(
                "squared distance to shade line is {den2} for phi={phi}, height={height}, offset={offset}"
            ),
        });
    }

    let ratio = num / den2.sqrt();
    let ratio = clip_to_unit_domain(ratio).ok_or_else(|| BifiError::DomainViolation {
        function: "shade_line_angle_alt",
        detail: format!(
            "arccos argument {ratio} outside [-1, 1] for phi={phi}, height={height}, offset={offset}"
        ),
    })?;

    Ok(ratio.acos())
}

/// W weighting factor for a shade angle: 1 with the shade line straight overhead of
/// the sensor's reference direction, 0 when it lies opposite.
pub fn shade_weight(psi: f64) -> f64 {
    0.5 * (1. + psi.cos())
}

pub fn shade_cosines(
    sun_azimuths: &[f64],
    sun_elevations: &[f64],
) -> Result<Vec<f64>, BifiError> {
    check_length("sun_elevation", sun_azimuths.len(), sun_elevations)?;

    Ok(sun_azimuths
        .iter()
        .zip(sun_elevations)
        .map(|(&az, &el)| shade_cosine(az, el))
        .collect())
}

pub fn shade_line_angles(phis: &[f64], height: f64, offset: f64) -> Vec<f64> {
    phis.iter()
        .map(|&phi| shade_line_angle(phi, height, offset))
        .collect()
}

pub fn shade_weights(psis: &[f64]) -> Vec<f64> {
    psis.iter().map(|&psi| shade_weight(psi)).collect()
}
