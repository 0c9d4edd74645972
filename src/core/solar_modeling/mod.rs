//! Augments a telemetry table with modelled sun, tracker and plane-of-array columns.

pub mod albedo;
pub mod solar_position;
pub mod tracking;
pub mod transposition;

use crate::core::solar_modeling::albedo::DailyAlbedo;
use crate::core::solar_modeling::solar_position::{SolarEphemeris, SolarPosition};
use crate::core::solar_modeling::tracking::{TrackerAxis, TrackerSolver};
use crate::core::solar_modeling::transposition::{PoaInputs, TranspositionModel};
use crate::errors::BifiError;
use crate::input::{AugmentationConfig, SiteInfo, SystemInfoTable};
use crate::timeseries::{Timeseries, Timestamp};
use chrono::{Datelike, Duration};
use tracing::debug;

pub const SOLAR_APPARENT_ZENITH: &str = "solar_apparent_zenith";
pub const SOLAR_AZIMUTH: &str = "solar_azimuth";
pub const SOLAR_APPARENT_ELEVATION: &str = "solar_apparent_elevation";
pub const DNI_EXTRA: &str = "dni_extra";

/// Instants the readings represent: interval start shifted by `offset`.
pub fn interval_midpoints(
    index: &[Timestamp],
    offset: Duration,
) -> Result<Vec<Timestamp>, BifiError> {
    index
        .iter()
        .map(|timestamp| {
            timestamp.checked_add_signed(offset).ok_or_else(|| {
                BifiError::InvalidInput(format!(
                    "{timestamp} shifted by {offset} is out of the representable range"
                ))
            })
        })
        .collect()
}

/// Adds daily albedo, sun position at each interval midpoint and extraterrestrial
/// irradiance for the midpoint's day of year.
pub fn add_solar_geometry(
    table: Timeseries,
    site: &SiteInfo,
    config: &AugmentationConfig,
    ephemeris: &impl SolarEphemeris,
) -> Result<Timeseries, BifiError> {
    let midpoints = interval_midpoints(table.index(), config.interval_midpoint_offset()?)?;
    let daily_albedo = DailyAlbedo::from_table(&table, &midpoints, config)?;

    let positions = ephemeris.solar_position(&midpoints, site)?;
    if positions.len() != midpoints.len() {
        return Err(BifiError::length_mismatch(
            "solar_position",
            midpoints.len(),
            positions.len(),
        ));
    }
    let dni_extra = midpoints
        .iter()
        .map(|midpoint| ephemeris.extraterrestrial_radiation(midpoint.ordinal()))
        .collect();

    let mut table = table;
    for (name, values) in daily_albedo.per_row(&midpoints) {
        table = table.with_column(name, values)?;
    }

    debug!(
        rows = table.len(),
        days = daily_albedo.days().len(),
        "added solar geometry"
    );

    table
        .with_column(
            SOLAR_APPARENT_ZENITH,
            positions.iter().map(|p| p.apparent_zenith).collect(),
        )?
        .with_column(SOLAR_AZIMUTH, positions.iter().map(|p| p.azimuth).collect())?
        .with_column(
            SOLAR_APPARENT_ELEVATION,
            positions.iter().map(SolarPosition::apparent_elevation).collect(),
        )?
        .with_column(DNI_EXTRA, dni_extra)
}

/// Adds the modelled backtracking orientation of the configured row and the front-side
/// plane-of-array irradiance for the row's measured position.
///
/// The measured tracker angle is east-positive: a negative reading has the modules
/// facing west. Modelled rotation follows the opposite, east-negative, convention.
pub fn add_array_irradiance(
    table: Timeseries,
    systems: &SystemInfoTable,
    config: &AugmentationConfig,
    tracker: &impl TrackerSolver,
    transposition: &impl TranspositionModel,
) -> Result<Timeseries, BifiError> {
    let system = systems.get(&config.site, &config.row)?;
    let axis = TrackerAxis::from_system(system, config);

    let (orientations, poa) = {
        let zenith = table.column(SOLAR_APPARENT_ZENITH)?;
        let azimuth = table.column(SOLAR_AZIMUTH)?;
        let positions = zenith
            .iter()
            .zip(azimuth)
            .map(|(&apparent_zenith, &azimuth)| SolarPosition {
                apparent_zenith,
                azimuth,
            })
            .collect::<Vec<_>>();
        let orientations = tracker.orient(&positions, &axis)?;

        let measured = table.column(&config.tracker_angle_column)?;
        let surface_tilt = measured.iter().map(|angle| angle.abs()).collect::<Vec<_>>();
        let surface_azimuth = measured
            .iter()
            .map(|&angle| if angle < 0. { 270. } else { 90. })
            .collect::<Vec<_>>();

        let poa = transposition.poa_irradiance(&PoaInputs {
            surface_tilt: &surface_tilt,
            surface_azimuth: &surface_azimuth,
            solar_zenith: zenith,
            solar_azimuth: azimuth,
            dni: table.column(&config.dni_column)?,
            ghi: table.column(&config.ghi_column)?,
            dhi: table.column(&config.dhi_column)?,
            dni_extra: table.column(DNI_EXTRA)?,
            albedo: table.column(&config.daily_albedo_column)?,
        })?;

        (orientations, poa)
    };

    let row = &config.row;
    debug!(
        site = config.site.as_str(),
        row = row.as_str(),
        max_tilt = system.max_tilt,
        gcr = system.gcr,
        "added array irradiance"
    );

    table
        .with_column(
            format!("modeled_{row}tracker_theta"),
            orientations.iter().map(|o| o.tracker_theta).collect(),
        )?
        .with_column(
            format!("modeled_{row}aoi"),
            orientations.iter().map(|o| o.aoi).collect(),
        )?
        .with_column(
            format!("modeled_{row}tracker_azimuth"),
            orientations.iter().map(|o| o.surface_azimuth).collect(),
        )?
        .with_column(
            format!("modeled_{row}tracker_tilt"),
            orientations.iter().map(|o| o.surface_tilt).collect(),
        )?
        .with_column(
            format!("modeled_Gfront_{row}pos"),
            poa.iter().map(|p| p.poa_global).collect(),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::solar_modeling::tracking::SingleAxisTracker;
    use crate::core::solar_modeling::transposition::PerezTransposition;
    use crate::input::SystemInfoRecord;
    use approx::assert_relative_eq;
    use chrono::DateTime;
    use indexmap::IndexMap;
    use pretty_assertions::assert_eq;
    use rstest::*;
    use std::cell::RefCell;

    /// Sun fixed in the sky that remembers which instants it was asked about.
    #[derive(Default)]
    struct FixedSun {
        requested: RefCell<Vec<Timestamp>>,
    }

    impl SolarEphemeris for FixedSun {
        fn solar_position(
            &self,
            timestamps: &[Timestamp],
            _site: &SiteInfo,
        ) -> Result<Vec<SolarPosition>, BifiError> {
            self.requested.borrow_mut().extend_from_slice(timestamps);
            Ok(vec![
                SolarPosition {
                    apparent_zenith: 40.,
                    azimuth: 120.,
                };
                timestamps.len()
            ])
        }

        fn extraterrestrial_radiation(&self, day_of_year: u32) -> f64 {
            day_of_year as f64
        }
    }

    fn at(value: &str) -> Timestamp {
        DateTime::parse_from_rfc3339(value).unwrap()
    }

    #[fixture]
    fn site() -> SiteInfo {
        SiteInfo::new(39.74, -105.18, 1829.).unwrap()
    }

    #[fixture]
    fn systems() -> SystemInfoTable {
        SystemInfoTable::new([SystemInfoRecord {
            site: "BEST".into(),
            row: "row7".into(),
            max_tilt: 52.,
            gcr: 0.33,
        }])
    }

    #[fixture]
    fn table() -> Timeseries {
        Timeseries::new(
            vec![
                at("2021-12-31T12:00:00-07:00"),
                at("2021-12-31T12:01:00-07:00"),
                at("2021-12-31T23:59:45-07:00"),
            ],
            IndexMap::from([
                ("albedo".to_string(), vec![0.2, 0.2, 0.9]),
                ("SRRL_albedo".to_string(), vec![0.25, 0.25, 0.9]),
                ("row7tracker_angle".to_string(), vec![0., 30., -30.]),
                ("SRRL_GHI".to_string(), vec![600.; 3]),
                ("SRRL_DHI".to_string(), vec![100.; 3]),
                ("SRRL_DNI".to_string(), vec![650.; 3]),
            ]),
        )
        .unwrap()
    }

    #[rstest]
    fn test_solar_geometry_uses_interval_midpoints(site: SiteInfo, table: Timeseries) {
        let sun = FixedSun::default();
        let result =
            add_solar_geometry(table.clone(), &site, &AugmentationConfig::default(), &sun)
                .unwrap();

        assert_eq!(
            *sun.requested.borrow(),
            interval_midpoints(table.index(), Duration::seconds(30)).unwrap()
        );
        // the last midpoint falls on New Year's Day
        assert_eq!(result.column(DNI_EXTRA).unwrap(), &[365., 365., 1.]);
        assert_eq!(result.column(SOLAR_APPARENT_ELEVATION).unwrap(), &[50.; 3]);
        assert_eq!(result.column("daily_albedo").unwrap()[..2], [0.2, 0.2]);
    }

    #[rstest]
    fn test_solar_geometry_with_longer_sampling_interval(site: SiteInfo) {
        let table = Timeseries::new(
            vec![
                at("2021-12-31T12:00:00-07:00"),
                at("2021-12-31T23:57:00-07:00"),
                at("2021-12-31T23:58:00-07:00"),
                at("2022-01-01T12:00:00-07:00"),
            ],
            IndexMap::from([
                ("albedo".to_string(), vec![0.2, 0.9, 0.9, 0.3]),
                ("SRRL_albedo".to_string(), vec![0.25, 0.9, 0.9, 0.35]),
            ]),
        )
        .unwrap();
        // five-minute data
        let config = AugmentationConfig {
            interval_midpoint_offset_seconds: 150,
            ..AugmentationConfig::default()
        };
        let sun = FixedSun::default();

        let result = add_solar_geometry(table, &site, &config, &sun).unwrap();

        assert_eq!(
            *sun.requested.borrow(),
            [
                at("2021-12-31T12:02:30-07:00"),
                at("2021-12-31T23:59:30-07:00"),
                at("2022-01-01T00:00:30-07:00"),
                at("2022-01-01T12:02:30-07:00"),
            ]
        );
        assert_eq!(result.column(DNI_EXTRA).unwrap(), &[365., 365., 1., 1.]);
        // the third row starts on New Year's Eve but takes New Year's Day albedo
        assert_eq!(
            result.column("daily_albedo").unwrap(),
            &[0.2, 0.2, 0.3, 0.3]
        );
        assert_eq!(
            result.column("daily_SRRL_albedo").unwrap(),
            &[0.25, 0.25, 0.35, 0.35]
        );
    }

    #[rstest]
    fn test_midpoint_out_of_range() {
        assert!(matches!(
            interval_midpoints(
                &[at("2021-06-21T12:00:00-07:00")],
                Duration::days(366 * 300_000)
            ),
            Err(BifiError::InvalidInput(_))
        ));
    }

    #[rstest]
    fn test_solar_geometry_keeps_existing_columns_first(site: SiteInfo, table: Timeseries) {
        let result = add_solar_geometry(
            table,
            &site,
            &AugmentationConfig::default(),
            &FixedSun::default(),
        )
        .unwrap();

        assert_eq!(
            result.column_names().skip(6).collect::<Vec<_>>(),
            [
                "daily_albedo",
                "daily_SRRL_albedo",
                SOLAR_APPARENT_ZENITH,
                SOLAR_AZIMUTH,
                SOLAR_APPARENT_ELEVATION,
                DNI_EXTRA
            ]
        );
    }

    #[rstest]
    fn test_array_irradiance_columns(site: SiteInfo, systems: SystemInfoTable, table: Timeseries) {
        let config = AugmentationConfig::default();
        let table = add_solar_geometry(table, &site, &config, &FixedSun::default()).unwrap();
        let result = add_array_irradiance(
            table,
            &systems,
            &config,
            &SingleAxisTracker,
            &PerezTransposition,
        )
        .unwrap();

        for name in [
            "modeled_row7tracker_theta",
            "modeled_row7aoi",
            "modeled_row7tracker_azimuth",
            "modeled_row7tracker_tilt",
            "modeled_Gfront_row7pos",
        ] {
            assert!(result.has_column(name), "missing {name}");
        }

        // morning sun, so the modelled rotation faces east
        let theta = result.column("modeled_row7tracker_theta").unwrap();
        assert!(theta.iter().all(|&angle| angle < 0. && angle >= -52.));
        for &azimuth in result.column("modeled_row7tracker_azimuth").unwrap() {
            assert_relative_eq!(azimuth, 90., epsilon = 1e-6);
        }

        // flat modules see the horizontal total
        let g_front = result.column("modeled_Gfront_row7pos").unwrap();
        assert_relative_eq!(
            g_front[0],
            650. * 40_f64.to_radians().cos() + 100.,
            max_relative = 1e-9
        );
        // tilted toward the morning sun beats tilted away from it
        assert!(g_front[1] > g_front[0]);
        assert!(g_front[2] < g_front[0]);
    }

    #[rstest]
    fn test_array_irradiance_requires_known_system(
        site: SiteInfo,
        systems: SystemInfoTable,
        table: Timeseries,
    ) {
        let config = AugmentationConfig {
            row: "row9".into(),
            ..AugmentationConfig::default()
        };
        let table = add_solar_geometry(table, &site, &config, &FixedSun::default()).unwrap();

        assert!(matches!(
            add_array_irradiance(
                table,
                &systems,
                &config,
                &SingleAxisTracker,
                &PerezTransposition
            ),
            Err(BifiError::UnknownSystem { .. })
        ));
    }

    #[rstest]
    fn test_array_irradiance_requires_solar_geometry(systems: SystemInfoTable, table: Timeseries) {
        assert!(matches!(
            add_array_irradiance(
                table,
                &systems,
                &AugmentationConfig::default(),
                &SingleAxisTracker,
                &PerezTransposition
            ),
            Err(BifiError::MissingColumn(name)) if name == SOLAR_APPARENT_ZENITH
        ));
    }
}
