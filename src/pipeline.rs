//! One review run: window the telemetry, attach modelled columns, then reshape.

use crate::core::bifi_calcs::irradiance::{outboard_sensor_weight, rear_irradiance_from_table};
use crate::core::solar_modeling::solar_position::{SpaEphemeris, SolarEphemeris};
use crate::core::solar_modeling::tracking::{SingleAxisTracker, TrackerSolver};
use crate::core::solar_modeling::transposition::{PerezTransposition, TranspositionModel};
use crate::core::solar_modeling::{add_array_irradiance, add_solar_geometry};
use crate::errors::BifiError;
use crate::input::{AugmentationConfig, ProjectConfig, SensorConfig, SiteInfo, SystemInfoTable};
use crate::timeseries::{LongRecord, Timeseries, Timestamp};
use tracing::{info, warn};

/// What the reviewer asked to see.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ReviewRequest {
    /// Inclusive start of the window
    pub start: Option<Timestamp>,
    /// Exclusive end of the window
    pub end: Option<Timestamp>,
    /// Columns to keep, in order; everything when `None`
    pub variables: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct PipelineOutput {
    pub wide: Timeseries,
    pub long: Vec<LongRecord>,
}

pub struct Pipeline<E = SpaEphemeris, T = SingleAxisTracker, P = PerezTransposition> {
    site: SiteInfo,
    systems: SystemInfoTable,
    config: AugmentationConfig,
    ephemeris: E,
    tracker: T,
    transposition: P,
}

impl Pipeline {
    /// A pipeline with the built-in sun, tracker and sky models.
    pub fn from_project(project: &ProjectConfig) -> Self {
        Self::with_models(
            project.site.clone(),
            project.system_table(),
            project.augmentation.clone(),
            SpaEphemeris::from_config(&project.augmentation),
            SingleAxisTracker,
            PerezTransposition,
        )
    }
}

impl<E, T, P> Pipeline<E, T, P>
where
    E: SolarEphemeris,
    T: TrackerSolver,
    P: TranspositionModel,
{
    pub fn with_models(
        site: SiteInfo,
        systems: SystemInfoTable,
        config: AugmentationConfig,
        ephemeris: E,
        tracker: T,
        transposition: P,
    ) -> Self {
        Self {
            site,
            systems,
            config,
            ephemeris,
            tracker,
            transposition,
        }
    }

    pub fn config(&self) -> &AugmentationConfig {
        &self.config
    }

    pub fn run(
        &self,
        table: Timeseries,
        request: &ReviewRequest,
    ) -> Result<PipelineOutput, BifiError> {
        let table = table.between(request.start, request.end);
        info!(rows = table.len(), "augmenting telemetry");

        let table = add_solar_geometry(table, &self.site, &self.config, &self.ephemeris)?;
        let table = add_array_irradiance(
            table,
            &self.systems,
            &self.config,
            &self.tracker,
            &self.transposition,
        )?;
        let table = match &self.config.sensor {
            Some(sensor) => self.add_sensor_columns(table, sensor)?,
            None => table,
        };

        let wide = match &request.variables {
            Some(variables) => table.select(variables.as_slice())?,
            None => table,
        };
        let long = wide.melt();
        info!(
            rows = wide.len(),
            variables = wide.column_names().count(),
            records = long.len(),
            "review data ready"
        );

        Ok(PipelineOutput { wide, long })
    }

    fn add_sensor_columns(
        &self,
        table: Timeseries,
        sensor: &SensorConfig,
    ) -> Result<Timeseries, BifiError> {
        let weight = outboard_sensor_weight(
            table.column(&sensor.azimuth_column)?,
            table.column(&sensor.elevation_column)?,
            &sensor.geometry,
            sensor.azimuth_convention,
        )?;

        let estimate = if sensor.rear_estimate {
            let system = self.systems.get(&self.config.site, &self.config.row)?;
            let estimate = rear_irradiance_from_table(
                &table,
                &weight.w,
                &sensor.near_albedo_column,
                system.gcr,
            )?;
            if estimate.odd_count() > 0 {
                warn!(
                    rows = estimate.odd_count(),
                    "rear estimate below measured back irradiance"
                );
            }
            Some(estimate)
        } else {
            None
        };

        let table = weight.append_to(table)?;
        match estimate {
            Some(estimate) => estimate.append_to(table),
            None => Ok(table),
        }
    }
}
