use crate::core::solar_modeling::solar_position::ExtraterrestrialModel;
use crate::errors::BifiError;
use chrono::Duration;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_valid::Validate;
use std::io::Read;

/// Location of a measurement site, as needed by the solar ephemeris.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SiteInfo {
    /// degrees, north positive
    pub latitude: f64,
    /// degrees, east positive
    pub longitude: f64,
    /// metres above sea level
    pub elevation: f64,
}

impl SiteInfo {
    pub fn new(latitude: f64, longitude: f64, elevation: f64) -> Result<Self, BifiError> {
        let site = Self {
            latitude,
            longitude,
            elevation,
        };
        site.check()?;
        Ok(site)
    }

    pub(crate) fn check(&self) -> Result<(), BifiError> {
        if !(-90. ..=90.).contains(&self.latitude) {
            return Err(BifiError::InvalidInput(format!(
                "latitude {} outside [-90, 90]",
                self.latitude
            )));
        }
        if !(-180. ..=180.).contains(&self.longitude) {
            return Err(BifiError::InvalidInput(format!(
                "longitude {} outside [-180, 180]",
                self.longitude
            )));
        }
        if !self.elevation.is_finite() {
            return Err(BifiError::InvalidInput(format!(
                "elevation {} is not a number of metres",
                self.elevation
            )));
        }
        Ok(())
    }
}

/// Design parameters for one tracker row.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SystemInfo {
    /// Maximum tilt allowed by design, degrees from horizontal
    pub max_tilt: f64,
    /// Ground cover ratio, fraction in (0, 1]
    pub gcr: f64,
}

#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct SystemInfoRecord {
    pub site: String,
    pub row: String,
    #[validate(minimum = 0.)]
    #[validate(maximum = 90.)]
    pub max_tilt: f64,
    #[validate(exclusive_minimum = 0.)]
    #[validate(maximum = 1.)]
    pub gcr: f64,
}

/// System information keyed by (site, row). Built once and only ever looked up.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SystemInfoTable(IndexMap<(String, String), SystemInfo>);

impl SystemInfoTable {
    pub fn new(records: impl IntoIterator<Item = SystemInfoRecord>) -> Self {
        Self(
            records
                .into_iter()
                .map(|record| {
                    (
                        (record.site, record.row),
                        SystemInfo {
                            max_tilt: record.max_tilt,
                            gcr: record.gcr,
                        },
                    )
                })
                .collect(),
        )
    }

    pub fn get(&self, site: &str, row: &str) -> Result<SystemInfo, BifiError> {
        self.0
            .get(&(site.to_string(), row.to_string()))
            .copied()
            .ok_or_else(|| BifiError::UnknownSystem {
                site: site.to_string(),
                row: row.to_string(),
            })
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Height and sensor offset for one outboard sensor configuration.
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
#[serde(try_from = "ArrayGeometryInput", into = "ArrayGeometryInput")]
pub struct ArrayGeometry {
    height: f64,
    offset: f64,
}

#[derive(Clone, Copy, Debug, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
struct ArrayGeometryInput {
    height: f64,
    offset: f64,
}

impl ArrayGeometry {
    /// Arguments:
    /// * `height` - height of the bottom of the array's shading edge above ground, in m (> 0)
    /// * `offset` - horizontal displacement of the sensor from the shading edge, in m;
    ///   positive when set back from the edge, negative when forward of it
    pub fn new(height: f64, offset: f64) -> Result<Self, BifiError> {
        if !(height.is_finite() && height > 0.) {
            return Err(BifiError::InvalidGeometry(format!(
                "height must be a positive number of metres, got {height}"
            )));
        }
        if !offset.is_finite() {
            return Err(BifiError::InvalidGeometry(format!(
                "offset must be a finite number of metres, got {offset}"
            )));
        }
        Ok(Self { height, offset })
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn offset(&self) -> f64 {
        self.offset
    }
}

impl TryFrom<ArrayGeometryInput> for ArrayGeometry {
    type Error = BifiError;

    fn try_from(input: ArrayGeometryInput) -> Result<Self, Self::Error> {
        Self::new(input.height, input.offset)
    }
}

impl From<ArrayGeometry> for ArrayGeometryInput {
    fn from(geometry: ArrayGeometry) -> Self {
        Self {
            height: geometry.height,
            offset: geometry.offset,
        }
    }
}

/// Reference direction of a sun azimuth series.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AzimuthConvention {
    /// Compass bearing: 0 = North, 90 = East (ephemeris output)
    #[default]
    NorthReferenced,
    /// PVsyst: 0 = South, 90 = West
    SouthReferenced,
}

impl AzimuthConvention {
    /// Azimuth in degrees as a North-referenced compass bearing.
    pub fn to_north_referenced(self, azimuth: f64) -> f64 {
        match self {
            AzimuthConvention::NorthReferenced => azimuth,
            AzimuthConvention::SouthReferenced => azimuth + 180.,
        }
    }
}

/// Where the outboard rear sensor sits and which columns feed its weight profile.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SensorConfig {
    pub geometry: ArrayGeometry,
    #[serde(default)]
    pub azimuth_convention: AzimuthConvention,
    #[serde(default = "default_sensor_azimuth_column")]
    pub azimuth_column: String,
    #[serde(default = "default_sensor_elevation_column")]
    pub elevation_column: String,
    #[serde(default = "default_daily_albedo_column")]
    pub near_albedo_column: String,
    /// Whether to run the PVsyst rear-side estimate; needs the PVsyst channels.
    #[serde(default = "default_true")]
    pub rear_estimate: bool,
}

fn default_sensor_azimuth_column() -> String {
    "solar_azimuth".into()
}

fn default_sensor_elevation_column() -> String {
    "solar_apparent_elevation".into()
}

fn default_daily_albedo_column() -> String {
    "daily_albedo".into()
}

fn default_true() -> bool {
    true
}

/// Settings for attaching solar geometry and tracker columns to a time series.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, Validate)]
#[serde(default, deny_unknown_fields)]
pub struct AugmentationConfig {
    /// Shift from a row's timestamp (interval start) to the instant its measurement
    /// represents. Half the sampling interval: 30 s for one-minute data.
    #[validate(minimum = 0)]
    #[validate(maximum = 86_400)]
    pub interval_midpoint_offset_seconds: i64,
    /// Local hours (of interval start) used for the daily albedo median
    #[validate(min_items = 1)]
    pub noon_hours: Vec<u32>,
    /// Source albedo channel -> daily albedo column
    pub albedo_columns: IndexMap<String, String>,
    pub daily_albedo_column: String,
    pub site: String,
    pub row: String,
    /// Measured tracker angle, degrees, east positive
    pub tracker_angle_column: String,
    pub ghi_column: String,
    pub dhi_column: String,
    pub dni_column: String,
    pub axis_tilt: f64,
    #[validate(minimum = 0.)]
    #[validate(maximum = 360.)]
    pub axis_azimuth: f64,
    pub backtrack: bool,
    pub extraterrestrial_model: ExtraterrestrialModel,
    /// TT - UT1 in seconds
    pub delta_t_seconds: f64,
    /// Air temperature used for the refraction correction, deg C
    pub refraction_temperature: f64,
    pub sensor: Option<SensorConfig>,
}

impl Default for AugmentationConfig {
    fn default() -> Self {
        Self {
            interval_midpoint_offset_seconds: 30,
            noon_hours: vec![11, 12, 13],
            albedo_columns: IndexMap::from([
                ("albedo".to_string(), "daily_albedo".to_string()),
                ("SRRL_albedo".to_string(), "daily_SRRL_albedo".to_string()),
            ]),
            daily_albedo_column: default_daily_albedo_column(),
            site: "BEST".into(),
            row: "row7".into(),
            tracker_angle_column: "row7tracker_angle".into(),
            ghi_column: "SRRL_GHI".into(),
            dhi_column: "SRRL_DHI".into(),
            dni_column: "SRRL_DNI".into(),
            axis_tilt: 0.,
            axis_azimuth: 180.,
            backtrack: true,
            extraterrestrial_model: ExtraterrestrialModel::Spencer,
            delta_t_seconds: 67.,
            refraction_temperature: 12.,
            sensor: None,
        }
    }
}

impl AugmentationConfig {
    pub fn interval_midpoint_offset(&self) -> Result<Duration, BifiError> {
        Duration::try_seconds(self.interval_midpoint_offset_seconds).ok_or_else(|| {
            BifiError::InvalidInput(format!(
                "interval midpoint offset of {} s is out of range",
                self.interval_midpoint_offset_seconds
            ))
        })
    }
}

/// Everything a review run needs besides the data itself.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct ProjectConfig {
    pub site: SiteInfo,
    #[validate]
    pub systems: Vec<SystemInfoRecord>,
    #[serde(default)]
    #[validate]
    pub augmentation: AugmentationConfig,
}

impl ProjectConfig {
    pub fn from_json(json: impl Read) -> Result<Self, BifiError> {
        let config: ProjectConfig = serde_json::from_reader(json)?;
        config
            .validate()
            .map_err(|errors| BifiError::InvalidInput(errors.to_string()))?;
        config.site.check()?;
        if config.augmentation.axis_tilt.abs() > 90. {
            return Err(BifiError::InvalidInput(format!(
                "axis tilt {} outside [-90, 90]",
                config.augmentation.axis_tilt
            )));
        }
        if let Some(hour) = config.augmentation.noon_hours.iter().find(|&&h| h > 23) {
            return Err(BifiError::InvalidInput(format!(
                "noon hour {hour} is not an hour of the day"
            )));
        }
        Ok(config)
    }

    pub fn system_table(&self) -> SystemInfoTable {
        SystemInfoTable::new(self.systems.iter().cloned())
    }
}
