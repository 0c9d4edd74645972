//! Plane-of-array irradiance from horizontal measurements.

use crate::compare_floats::{clip, max_of_2};
use crate::errors::{check_length, BifiError};
use std::f64::consts::PI;

/// Per-row inputs to a transposition, all parallel. Angles in degrees, irradiance in W/m2.
#[derive(Clone, Copy, Debug)]
pub struct PoaInputs<'a> {
    pub surface_tilt: &'a [f64],
    pub surface_azimuth: &'a [f64],
    pub solar_zenith: &'a [f64],
    pub solar_azimuth: &'a [f64],
    pub dni: &'a [f64],
    pub ghi: &'a [f64],
    pub dhi: &'a [f64],
    pub dni_extra: &'a [f64],
    pub albedo: &'a [f64],
}

impl PoaInputs<'_> {
    pub fn len(&self) -> usize {
        self.surface_tilt.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surface_tilt.is_empty()
    }

    fn check(&self) -> Result<(), BifiError> {
        let expected = self.len();
        for (name, values) in [
            ("surface_azimuth", self.surface_azimuth),
            ("solar_zenith", self.solar_zenith),
            ("solar_azimuth", self.solar_azimuth),
            ("dni", self.dni),
            ("ghi", self.ghi),
            ("dhi", self.dhi),
            ("dni_extra", self.dni_extra),
            ("albedo", self.albedo),
        ] {
            check_length(name, expected, values)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct PoaIrradiance {
    pub poa_global: f64,
    pub poa_direct: f64,
    pub poa_diffuse: f64,
    pub poa_sky_diffuse: f64,
    pub poa_ground_diffuse: f64,
}

pub trait TranspositionModel {
    fn poa_irradiance(&self, inputs: &PoaInputs) -> Result<Vec<PoaIrradiance>, BifiError>;
}

/// Perez et al. (1990) anisotropic sky with the all-sites composite coefficients,
/// plus an isotropic ground reflection term.
#[derive(Clone, Copy, Debug, Default)]
pub struct PerezTransposition;

impl TranspositionModel for PerezTransposition {
    fn poa_irradiance(&self, inputs: &PoaInputs) -> Result<Vec<PoaIrradiance>, BifiError> {
        inputs.check()?;

        Ok((0..inputs.len())
            .map(|i| {
                poa_for_row(
                    inputs.surface_tilt[i],
                    inputs.surface_azimuth[i],
                    inputs.solar_zenith[i],
                    inputs.solar_azimuth[i],
                    inputs.dni[i],
                    inputs.ghi[i],
                    inputs.dhi[i],
                    inputs.dni_extra[i],
                    inputs.albedo[i],
                )
            })
            .collect())
    }
}

fn poa_for_row(
    surface_tilt: f64,
    surface_azimuth: f64,
    solar_zenith: f64,
    solar_azimuth: f64,
    dni: f64,
    ghi: f64,
    dhi: f64,
    dni_extra: f64,
    albedo: f64,
) -> PoaIrradiance {
    let tilt = surface_tilt.to_radians();
    let zenith = solar_zenith.to_radians();
    let cos_aoi = clip(
        tilt.cos() * zenith.cos()
            + tilt.sin() * zenith.sin() * (solar_azimuth - surface_azimuth).to_radians().cos(),
        -1.,
        1.,
    );

    let beam = dni * cos_aoi;
    let poa_direct = if beam.is_nan() { beam } else { max_of_2(beam, 0.) };
    let poa_sky_diffuse = sky_diffuse(tilt, zenith, cos_aoi, dni, dhi, dni_extra);
    let poa_ground_diffuse = ghi * albedo * (1. - tilt.cos()) * 0.5;
    let poa_diffuse = poa_sky_diffuse + poa_ground_diffuse;

    PoaIrradiance {
        poa_global: poa_direct + poa_diffuse,
        poa_direct,
        poa_diffuse,
        poa_sky_diffuse,
        poa_ground_diffuse,
    }
}

fn sky_diffuse(tilt: f64, zenith: f64, cos_aoi: f64, dni: f64, dhi: f64, dni_extra: f64) -> f64 {
    let air_mass = relative_air_mass(zenith.to_degrees());
    // no sky model below the horizon
    if air_mass.is_nan() {
        return 0.;
    }

    let e = dimensionless_clearness_parameter(dhi, dni, zenith);
    let delta = dimensionless_sky_brightness_parameter(air_mass, dhi, dni_extra);
    let f1 = circumsolar_brightness_coefficient(e, delta, zenith);
    let f2 = horizontal_brightness_coefficient(e, delta, zenith);

    let a = max_of_2(cos_aoi, 0.);
    let b = max_of_2(zenith.cos(), (85. * PI / 180.).cos());

    let sky = dhi * (0.5 * (1. - f1) * (1. + tilt.cos()) + f1 * a / b + f2 * tilt.sin());
    if sky.is_nan() {
        sky
    } else {
        max_of_2(sky, 0.)
    }
}

/// Kasten & Young (1989) relative optical air mass; NaN with the sun below the horizon.
fn relative_air_mass(zenith_degrees: f64) -> f64 {
    if zenith_degrees > 90. {
        return f64::NAN;
    }
    1.0 / (zenith_degrees.to_radians().cos()
        + 0.50572 * (6.07995 + (90. - zenith_degrees)).powf(-1.6364))
}

enum BrightnessCoefficientName {
    F11,
    F12,
    F13,
    F21,
    F22,
    F23,
}

struct BrightnessCoefficientsRow {
    f11: f64,
    f12: f64,
    f13: f64,
    f21: f64,
    f22: f64,
    f23: f64,
}

// all-sites composite 1990 coefficients, one row per sky clearness bin
static BRIGHTNESS_COEFFICIENTS: [BrightnessCoefficientsRow; 8] = [
    BrightnessCoefficientsRow {
        f11: -0.008,
        f12: 0.588,
        f13: -0.062,
        f21: -0.06,
        f22: 0.072,
        f23: -0.022,
    },
    BrightnessCoefficientsRow {
        f11: 0.13,
        f12: 0.683,
        f13: -0.151,
        f21: -0.019,
        f22: 0.066,
        f23: -0.029,
    },
    BrightnessCoefficientsRow {
        f11: 0.33,
        f12: 0.487,
        f13: -0.221,
        f21: 0.055,
        f22: -0.064,
        f23: -0.026,
    },
    BrightnessCoefficientsRow {
        f11: 0.568,
        f12: 0.187,
        f13: -0.295,
        f21: 0.109,
        f22: -0.152,
        f23: -0.014,
    },
    BrightnessCoefficientsRow {
        f11: 0.873,
        f12: -0.392,
        f13: -0.362,
        f21: 0.226,
        f22: -0.462,
        f23: 0.001,
    },
    BrightnessCoefficientsRow {
        f11: 1.132,
        f12: -1.237,
        f13: -0.412,
        f21: 0.288,
        f22: -0.823,
        f23: 0.056,
    },
    BrightnessCoefficientsRow {
        f11: 1.06,
        f12: -1.6,
        f13: -0.359,
        f21: 0.264,
        f22: -1.127,
        f23: 0.131,
    },
    BrightnessCoefficientsRow {
        f11: 0.678,
        f12: -0.327,
        f13: -0.25,
        f21: 0.156,
        f22: -1.377,
        f23: 0.251,
    },
];

fn brightness_coefficient(e: f64, fij: BrightnessCoefficientName) -> f64 {
    if e.is_nan() {
        return f64::NAN;
    }
    // bin upper edges are inclusive
    let row = &BRIGHTNESS_COEFFICIENTS[if e <= 1.065 {
        0usize
    } else if e <= 1.23 {
        1usize
    } else if e <= 1.5 {
        2usize
    } else if e <= 1.95 {
        3usize
    } else if e <= 2.8 {
        4usize
    } else if e <= 4.5 {
        5usize
    } else if e <= 6.2 {
        6usize
    } else {
        7usize
    }];
    match fij {
        BrightnessCoefficientName::F11 => row.f11,
        BrightnessCoefficientName::F12 => row.f12,
        BrightnessCoefficientName::F13 => row.f13,
        BrightnessCoefficientName::F21 => row.f21,
        BrightnessCoefficientName::F22 => row.f22,
        BrightnessCoefficientName::F23 => row.f23,
    }
}

/// F1, floored at zero. `zenith` in radians.
fn circumsolar_brightness_coefficient(e: f64, delta: f64, zenith: f64) -> f64 {
    let f1 = brightness_coefficient(e, BrightnessCoefficientName::F11)
        + brightness_coefficient(e, BrightnessCoefficientName::F12) * delta
        + brightness_coefficient(e, BrightnessCoefficientName::F13) * zenith;
    if f1 < 0.0 {
        0.0
    } else {
        f1
    }
}

/// F2. `zenith` in radians.
fn horizontal_brightness_coefficient(e: f64, delta: f64, zenith: f64) -> f64 {
    brightness_coefficient(e, BrightnessCoefficientName::F21)
        + brightness_coefficient(e, BrightnessCoefficientName::F22) * delta
        + brightness_coefficient(e, BrightnessCoefficientName::F23) * zenith
}

const CLEARNESS_FORMULA_K: f64 = 1.041;

fn dimensionless_clearness_parameter(
    diffuse_horizontal_radiation: f64,
    direct_normal_radiation: f64,
    zenith: f64,
) -> f64 {
    if diffuse_horizontal_radiation == 0.0 {
        999.0
    } else {
        ((diffuse_horizontal_radiation + direct_normal_radiation) / diffuse_horizontal_radiation
            + CLEARNESS_FORMULA_K * zenith.powi(3))
            / (1.0 + CLEARNESS_FORMULA_K * zenith.powi(3))
    }
}

fn dimensionless_sky_brightness_parameter(
    air_mass: f64,
    diffuse_horizontal_radiation: f64,
    extra_terrestrial_radiation: f64,
) -> f64 {
    air_mass * diffuse_horizontal_radiation / extra_terrestrial_radiation
}
