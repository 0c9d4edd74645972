//! Rear-side (bifacial) irradiance for an outboard, down-facing sensor on a single-axis
//! tracker, following the PVsyst back-irradiance estimator.

use crate::core::bifi_calcs::geometry::{
    shade_angle, shade_cosines, shade_line_angles, shade_weights,
};
use crate::errors::{check_length, BifiError};
use crate::input::{ArrayGeometry, AzimuthConvention};
use crate::timeseries::Timeseries;
use tracing::{debug, warn};

// PVsyst channel names used by the rear irradiance estimate
pub const GLOBAL_ON_GROUND: &str = "GlobGnd";
pub const GLOBAL_HORIZONTAL: &str = "GlobHor";
pub const DIFFUSE_HORIZONTAL: &str = "DifHor";
pub const ALBEDO_INCIDENCE_LOSS: &str = "Alb_Inc";
pub const BACK_VIEW_FACTOR_LOSS: &str = "BkVFLss";
pub const BEAM_INCIDENT_ON_BACK: &str = "BmIncBk";
pub const GLOBAL_ON_BACK: &str = "GlobBak";

/// Shading weight profile for an outboard sensor, one entry per timestamp.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SensorWeight {
    /// Sun azimuth in the kernel's convention (radians, 0 = North, pi/2 = East)
    pub sun_az: Vec<f64>,
    /// Sun elevation (radians, 0 = horizon)
    pub sun_el: Vec<f64>,
    /// Shade angle along the tracker axis (radians, 0 = horizontal)
    pub phi: Vec<f64>,
    /// Angle between sensor and shade line along the tracker axis (radians)
    pub psi: Vec<f64>,
    pub phi_deg: Vec<f64>,
    pub psi_deg: Vec<f64>,
    /// Weighting factor for the specified offset (unitless)
    pub w: Vec<f64>,
}

impl SensorWeight {
    pub fn len(&self) -> usize {
        self.w.len()
    }

    pub fn is_empty(&self) -> bool {
        self.w.is_empty()
    }

    /// Rows whose weight is a number outside [0, 1]. Such a value can only come from an
    /// angle or sign-convention bug upstream, so these are reported rather than clamped.
    pub fn out_of_range_rows(&self) -> Vec<usize> {
        self.w
            .iter()
            .enumerate()
            .filter(|(_, w)| !w.is_nan() && !(0. ..=1.).contains(*w))
            .map(|(i, _)| i)
            .collect()
    }

    /// Attaches the profile as `phi`, `psi`, `phi_deg`, `psi_deg` and `W` columns.
    pub fn append_to(&self, table: Timeseries) -> Result<Timeseries, BifiError> {
        table
            .with_column("phi", self.phi.clone())?
            .with_column("psi", self.psi.clone())?
            .with_column("phi_deg", self.phi_deg.clone())?
            .with_column("psi_deg", self.psi_deg.clone())?
            .with_column("W", self.w.clone())
    }
}

/// Models the shading weight seen by an outboard sensor on a single-axis tracker.
///
/// Arguments:
/// * `solar_azimuth` - sun azimuth in degrees, in the convention named by `convention`
/// * `solar_elevation` - apparent sun elevation in degrees (0 = horizon)
/// * `geometry` - height of the shading edge and sensor offset
/// * `convention` - which way `solar_azimuth` is referenced
///
/// Rows with the sun below the horizon are computed like any other; their weights are
/// physically meaningless and must be filtered out by the caller before aggregating.
pub fn outboard_sensor_weight(
    solar_azimuth: &[f64],
    solar_elevation: &[f64],
    geometry: &ArrayGeometry,
    convention: AzimuthConvention,
) -> Result<SensorWeight, BifiError> {
    check_length("solar_elevation", solar_azimuth.len(), solar_elevation)?;

    let sun_az = solar_azimuth
        .iter()
        .map(|az| convention.to_north_referenced(*az).to_radians())
        .collect::<Vec<_>>();
    let sun_el = solar_elevation
        .iter()
        .map(|el| el.to_radians())
        .collect::<Vec<_>>();

    let phi = shade_cosines(&sun_az, &sun_el)?
        .into_iter()
        .map(shade_angle)
        .collect::<Vec<_>>();
    let psi = shade_line_angles(&phi, geometry.height(), geometry.offset());
    let w = shade_weights(&psi);

    let weights = SensorWeight {
        phi_deg: phi.iter().map(|x| x.to_degrees()).collect(),
        psi_deg: psi.iter().map(|x| x.to_degrees()).collect(),
        sun_az,
        sun_el,
        phi,
        psi,
        w,
    };

    let flagged = weights.out_of_range_rows();
    if !flagged.is_empty() {
        warn!(
            rows = flagged.len(),
            first = flagged[0],
            "shading weight outside [0, 1]; check azimuth convention and geometry"
        );
    }
    debug!(rows = weights.len(), "computed outboard sensor weights");

    Ok(weights)
}

/// Measured channels feeding the PVsyst rear-side estimate. Every slice is parallel to
/// `w`; all irradiances are in W/m2 and `albedo_near` is a unitless fraction.
#[derive(Clone, Copy, Debug)]
pub struct RearIrradianceInputs<'a> {
    pub w: &'a [f64],
    pub glob_gnd: &'a [f64],
    pub glob_hor: &'a [f64],
    pub dif_hor: &'a [f64],
    pub albedo_near: &'a [f64],
    pub alb_inc: &'a [f64],
    pub bk_vf_lss: &'a [f64],
    pub bm_inc_bk: &'a [f64],
    pub glob_bak: &'a [f64],
}

impl RearIrradianceInputs<'_> {
    fn check_lengths(&self) -> Result<usize, BifiError> {
        let n = self.w.len();
        check_length(GLOBAL_ON_GROUND, n, self.glob_gnd)?;
        check_length(GLOBAL_HORIZONTAL, n, self.glob_hor)?;
        check_length(DIFFUSE_HORIZONTAL, n, self.dif_hor)?;
        check_length("albedo_near", n, self.albedo_near)?;
        check_length(ALBEDO_INCIDENCE_LOSS, n, self.alb_inc)?;
        check_length(BACK_VIEW_FACTOR_LOSS, n, self.bk_vf_lss)?;
        check_length(BEAM_INCIDENT_ON_BACK, n, self.bm_inc_bk)?;
        check_length(GLOBAL_ON_BACK, n, self.glob_bak)?;
        Ok(n)
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RearIrradianceEstimate {
    pub e_sky_rear: Vec<f64>,
    pub e_gnd_rear: Vec<f64>,
    pub e_rear_calc: Vec<f64>,
    pub g1: Vec<f64>,
    pub g2: Vec<f64>,
    /// Rows where the estimate falls short of the measured back irradiance. A NaN on
    /// either side compares false, so missing data is never marked odd.
    pub odd: Vec<bool>,
}

impl RearIrradianceEstimate {
    pub fn odd_count(&self) -> usize {
        self.odd.iter().filter(|&&odd| odd).count()
    }

    /// Attaches the estimate as columns; `odd` is stored as 1.0/0.0.
    pub fn append_to(&self, table: Timeseries) -> Result<Timeseries, BifiError> {
        table
            .with_column("E_sky_rear", self.e_sky_rear.clone())?
            .with_column("E_gnd_rear", self.e_gnd_rear.clone())?
            .with_column("E_rear_calc", self.e_rear_calc.clone())?
            .with_column("G1", self.g1.clone())?
            .with_column("G2", self.g2.clone())?
            .with_column(
                "odd",
                self.odd.iter().map(|&odd| if odd { 1. } else { 0. }).collect(),
            )
    }
}

/// PVsyst-style estimate of irradiance reaching an outboard, down-facing rear sensor.
///
/// The ground term blends two view-factor regimes: `W` weights the near-sensor,
/// albedo-corrected term and `1 - W` weights the far-field term normalised by GCR.
/// Negative results from noisy channels are passed through unchanged.
pub fn rear_irradiance_estimate(
    inputs: RearIrradianceInputs,
    gcr: f64,
) -> Result<RearIrradianceEstimate, BifiError> {
    if !(gcr > 0. && gcr <= 1.) {
        return Err(BifiError::InvalidGroundCoverRatio(gcr));
    }
    let n = inputs.check_lengths()?;

    let mut estimate = RearIrradianceEstimate {
        e_sky_rear: Vec::with_capacity(n),
        e_gnd_rear: Vec::with_capacity(n),
        e_rear_calc: Vec::with_capacity(n),
        g1: Vec::with_capacity(n),
        g2: Vec::with_capacity(n),
        odd: Vec::with_capacity(n),
    };

    for i in 0..n {
        let w = inputs.w[i];
        let reflected_near = inputs.glob_gnd[i] * inputs.albedo_near[i];
        let near_term = reflected_near - inputs.alb_inc[i];
        let far_term = reflected_near / gcr - inputs.bk_vf_lss[i];

        let e_sky_rear = w * inputs.dif_hor[i];
        let e_gnd_rear = w * near_term + (1. - w) * far_term;
        let e_rear_calc = e_gnd_rear + e_sky_rear + inputs.bm_inc_bk[i];

        estimate.e_sky_rear.push(e_sky_rear);
        estimate.e_gnd_rear.push(e_gnd_rear);
        estimate.e_rear_calc.push(e_rear_calc);
        estimate.odd.push(e_rear_calc < inputs.glob_bak[i]);
        // G1 is referenced to the horizontal global, not the ground global
        estimate
            .g1
            .push(inputs.glob_hor[i] * inputs.albedo_near[i] - inputs.alb_inc[i]);
        estimate.g2.push(far_term);
    }

    debug!(
        rows = n,
        odd = estimate.odd_count(),
        "computed rear irradiance estimate"
    );

    Ok(estimate)
}

/// Runs [`rear_irradiance_estimate`] on the PVsyst channels of a time series.
pub fn rear_irradiance_from_table(
    table: &Timeseries,
    w: &[f64],
    near_albedo_column: &str,
    gcr: f64,
) -> Result<RearIrradianceEstimate, BifiError> {
    check_length("W", table.len(), w)?;

    rear_irradiance_estimate(
        RearIrradianceInputs {
            w,
            glob_gnd: table.column(GLOBAL_ON_GROUND)?,
            glob_hor: table.column(GLOBAL_HORIZONTAL)?,
            dif_hor: table.column(DIFFUSE_HORIZONTAL)?,
            albedo_near: table.column(near_albedo_column)?,
            alb_inc: table.column(ALBEDO_INCIDENCE_LOSS)?,
            bk_vf_lss: table.column(BACK_VIEW_FACTOR_LOSS)?,
            bm_inc_bk: table.column(BEAM_INCIDENT_ON_BACK)?,
            glob_bak: table.column(GLOBAL_ON_BACK)?,
        },
        gcr,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use chrono::{DateTime, Duration, FixedOffset};
    use pretty_assertions::assert_eq;
    use rstest::*;

    #[fixture]
    fn geometry() -> ArrayGeometry {
        ArrayGeometry::new(1.5, 1.).unwrap()
    }

    #[rstest]
    fn test_weight_follows_scalar_kernel(geometry: ArrayGeometry) {
        use crate::core::bifi_calcs::geometry::{shade_cosine, shade_line_angle, shade_weight};

        let azimuths = [95., 180., 265.];
        let elevations = [10., 45., 20.];
        let weights = outboard_sensor_weight(
            &azimuths,
            &elevations,
            &geometry,
            AzimuthConvention::NorthReferenced,
        )
        .unwrap();

        for (row, (az, el)) in azimuths.iter().zip(elevations).enumerate() {
            let phi = shade_angle(shade_cosine(az.to_radians(), el.to_radians()));
            let psi = shade_line_angle(phi, geometry.height(), geometry.offset());
            assert_relative_eq!(weights.phi[row], phi);
            assert_relative_eq!(weights.psi[row], psi);
            assert_relative_eq!(weights.w[row], shade_weight(psi));
        }
    }

    #[rstest]
    fn test_weight_with_known_shade_angle(geometry: ArrayGeometry) {
        // sun due south, 30 degrees up: phi = 30 degrees
        let weights = outboard_sensor_weight(
            &[180.],
            &[30.],
            &geometry,
            AzimuthConvention::NorthReferenced,
        )
        .unwrap();

        assert_relative_eq!(weights.phi_deg[0], 30., epsilon = 1e-9);
        assert_relative_eq!(weights.psi[0], 0.39498093, epsilon = 1e-6);
        assert_relative_eq!(weights.w[0], 0.5 * (1. + 0.39498093f64.cos()), epsilon = 1e-6);
        assert!(weights.out_of_range_rows().is_empty());
    }

    #[rstest]
    fn test_south_referenced_azimuth_is_rotated_half_turn(geometry: ArrayGeometry) {
        let north = outboard_sensor_weight(
            &[180., 120., 250.],
            &[30., 45., 10.],
            &geometry,
            AzimuthConvention::NorthReferenced,
        )
        .unwrap();
        let south = outboard_sensor_weight(
            &[0., -60., 70.],
            &[30., 45., 10.],
            &geometry,
            AzimuthConvention::SouthReferenced,
        )
        .unwrap();

        for (n, s) in north.w.iter().zip(&south.w) {
            assert_relative_eq!(n, s, epsilon = 1e-12);
        }
    }

    #[rstest]
    fn test_wrong_convention_inverts_shading(geometry: ArrayGeometry) {
        let right = outboard_sensor_weight(
            &[180.],
            &[30.],
            &geometry,
            AzimuthConvention::NorthReferenced,
        )
        .unwrap();
        let wrong = outboard_sensor_weight(
            &[180.],
            &[30.],
            &geometry,
            AzimuthConvention::SouthReferenced,
        )
        .unwrap();

        assert_relative_eq!(right.phi_deg[0], 30., epsilon = 1e-9);
        assert_relative_eq!(wrong.phi_deg[0], 150., epsilon = 1e-9);
        assert!(wrong.w[0] < right.w[0]);
    }

    #[rstest]
    fn test_sun_below_horizon_passes_through(geometry: ArrayGeometry) {
        let weights = outboard_sensor_weight(
            &[180.],
            &[-10.],
            &geometry,
            AzimuthConvention::NorthReferenced,
        )
        .unwrap();

        assert_eq!(weights.len(), 1);
        assert!(weights.w[0].is_finite());
    }

    #[rstest]
    fn test_weight_rejects_mismatched_lengths(geometry: ArrayGeometry) {
        assert!(matches!(
            outboard_sensor_weight(
                &[180., 170.],
                &[30.],
                &geometry,
                AzimuthConvention::NorthReferenced
            ),
            Err(BifiError::LengthMismatch { .. })
        ));
    }

    struct Channels {
        w: Vec<f64>,
        glob_gnd: Vec<f64>,
        glob_hor: Vec<f64>,
        dif_hor: Vec<f64>,
        albedo_near: Vec<f64>,
        alb_inc: Vec<f64>,
        bk_vf_lss: Vec<f64>,
        bm_inc_bk: Vec<f64>,
        glob_bak: Vec<f64>,
    }

    impl Channels {
        fn inputs(&self) -> RearIrradianceInputs {
            RearIrradianceInputs {
                w: &self.w,
                glob_gnd: &self.glob_gnd,
                glob_hor: &self.glob_hor,
                dif_hor: &self.dif_hor,
                albedo_near: &self.albedo_near,
                alb_inc: &self.alb_inc,
                bk_vf_lss: &self.bk_vf_lss,
                bm_inc_bk: &self.bm_inc_bk,
                glob_bak: &self.glob_bak,
            }
        }
    }

    #[fixture]
    fn channels() -> Channels {
        Channels {
            w: vec![0.8, 0.5, 0.2, 0.6],
            glob_gnd: vec![800., 600., 100., f64::NAN],
            glob_hor: vec![820., 610., 110., 400.],
            dif_hor: vec![100., 150., 80., 90.],
            albedo_near: vec![0.2, 0.2, 0.2, 0.2],
            alb_inc: vec![5., 4., 30., 2.],
            bk_vf_lss: vec![20., 15., 10., 5.],
            bm_inc_bk: vec![0., 10., 0., 0.],
            glob_bak: vec![150., 500., 20., 50.],
        }
    }

    #[rstest]
    fn test_rear_irradiance_estimate_values(channels: Channels) {
        let estimate = rear_irradiance_estimate(channels.inputs(), 0.35).unwrap();

        // row 0 by hand
        let near = 800. * 0.2 - 5.;
        let far = 800. * 0.2 / 0.35 - 20.;
        assert_relative_eq!(estimate.e_sky_rear[0], 80.);
        assert_relative_eq!(estimate.e_gnd_rear[0], 0.8 * near + 0.2 * far, epsilon = 1e-9);
        assert_relative_eq!(
            estimate.e_rear_calc[0],
            0.8 * near + 0.2 * far + 80.,
            epsilon = 1e-9
        );
        assert_relative_eq!(estimate.g1[0], 820. * 0.2 - 5.);
        assert_relative_eq!(estimate.g2[0], far, epsilon = 1e-9);
    }

    #[rstest]
    fn test_odd_flag_matches_comparison(channels: Channels) {
        let estimate = rear_irradiance_estimate(channels.inputs(), 0.35).unwrap();

        for (i, odd) in estimate.odd.iter().enumerate() {
            assert_eq!(*odd, estimate.e_rear_calc[i] < channels.glob_bak[i]);
        }
        // row 3 has a missing ground global: NaN compares false
        assert!(estimate.e_rear_calc[3].is_nan());
        assert!(!estimate.odd[3]);
        assert_eq!(estimate.odd, vec![false, true, false, false]);
        assert_eq!(estimate.odd_count(), 1);
    }

    #[rstest]
    fn test_negative_estimates_are_not_clamped(channels: Channels) {
        let estimate = rear_irradiance_estimate(channels.inputs(), 0.35).unwrap();

        // row 2: near term is 100 * 0.2 - 30 = -10
        assert!(estimate.g1[2] < 0.);
        assert_relative_eq!(
            estimate.e_gnd_rear[2],
            0.2 * -10. + 0.8 * (100. * 0.2 / 0.35 - 10.),
            epsilon = 1e-9
        );
    }

    #[rstest]
    #[case(0.)]
    #[case(-0.3)]
    #[case(1.2)]
    #[case(f64::NAN)]
    fn test_rejects_invalid_gcr(channels: Channels, #[case] gcr: f64) {
        assert!(matches!(
            rear_irradiance_estimate(channels.inputs(), gcr),
            Err(BifiError::InvalidGroundCoverRatio(_))
        ));
    }

    #[rstest]
    fn test_rejects_mismatched_channel(mut channels: Channels) {
        channels.bk_vf_lss.pop();
        assert!(matches!(
            rear_irradiance_estimate(channels.inputs(), 0.35),
            Err(BifiError::LengthMismatch { .. })
        ));
    }

    #[rstest]
    fn test_from_table_reports_missing_column(channels: Channels) {
        let start = DateTime::<FixedOffset>::parse_from_rfc3339("2021-06-01T12:00:00-07:00").unwrap();
        let index = (0..4).map(|i| start + Duration::minutes(i)).collect();
        let table = Timeseries::new(
            index,
            [
                (GLOBAL_ON_GROUND, channels.glob_gnd.clone()),
                (GLOBAL_HORIZONTAL, channels.glob_hor.clone()),
                (DIFFUSE_HORIZONTAL, channels.dif_hor.clone()),
                ("daily_albedo", channels.albedo_near.clone()),
                (ALBEDO_INCIDENCE_LOSS, channels.alb_inc.clone()),
                (BEAM_INCIDENT_ON_BACK, channels.bm_inc_bk.clone()),
                (GLOBAL_ON_BACK, channels.glob_bak.clone()),
            ]
            .into_iter()
            .map(|(name, values)| (name.to_string(), values))
            .collect(),
        )
        .unwrap();

        let err = rear_irradiance_from_table(&table, &channels.w, "daily_albedo", 0.35).unwrap_err();
        assert_eq!(err.to_string(), format!("Required column '{BACK_VIEW_FACTOR_LOSS}' was not found in the time series"));

        let table = table
            .with_column(BACK_VIEW_FACTOR_LOSS, channels.bk_vf_lss.clone())
            .unwrap();
        let estimate = rear_irradiance_from_table(&table, &channels.w, "daily_albedo", 0.35).unwrap();
        assert_eq!(estimate.odd_count(), 1);
    }
}
