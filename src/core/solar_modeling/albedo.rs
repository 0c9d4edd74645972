//! Daily ground albedo from near-noon readings of the albedometers.

use crate::errors::BifiError;
use crate::input::AugmentationConfig;
use crate::statistics::{forward_fill, nan_median};
use crate::timeseries::{Timeseries, Timestamp};
use chrono::{NaiveDate, Timelike};
use indexmap::IndexMap;
use itertools::{Itertools, MinMaxResult};
use tracing::{debug, warn};

/// One albedo value per calendar day for each configured channel, over a contiguous
/// range of local dates.
#[derive(Clone, Debug, PartialEq)]
pub struct DailyAlbedo {
    days: Vec<NaiveDate>,
    columns: IndexMap<String, Vec<f64>>,
}

impl DailyAlbedo {
    /// Median of each albedo channel over rows whose interval starts in one of
    /// `config.noon_hours`, grouped by the local date of interval start. `midpoints`
    /// are the rows' interval midpoints and widen the day range past the last start.
    ///
    /// A daily median of 1 or more is not physical (snow glare, a covered down-facing
    /// sensor) and is treated as missing. Missing days then carry the previous day's
    /// value forward; days before the first valid value stay NaN.
    pub fn from_table(
        table: &Timeseries,
        midpoints: &[Timestamp],
        config: &AugmentationConfig,
    ) -> Result<Self, BifiError> {
        if midpoints.len() != table.len() {
            return Err(BifiError::length_mismatch(
                "interval midpoints",
                table.len(),
                midpoints.len(),
            ));
        }
        let start_dates = table
            .index()
            .iter()
            .map(|timestamp| timestamp.date_naive())
            .collect::<Vec<_>>();
        let midpoint_dates = midpoint_dates(midpoints);

        let days = match start_dates.iter().chain(&midpoint_dates).minmax() {
            MinMaxResult::NoElements => vec![],
            MinMaxResult::OneElement(&day) => vec![day],
            MinMaxResult::MinMax(&first, &last) => {
                first.iter_days().take_while(|day| *day <= last).collect()
            }
        };

        let noon_rows = table
            .index()
            .iter()
            .positions(|timestamp| config.noon_hours.contains(&timestamp.hour()))
            .collect::<Vec<_>>();

        let mut columns = IndexMap::new();
        for (source, target) in &config.albedo_columns {
            let values = table.column(source)?;

            let mut samples = vec![vec![]; days.len()];
            for &row in &noon_rows {
                samples[day_offset(&days, start_dates[row])].push(values[row]);
            }

            let mut recoded = 0;
            let medians = samples
                .iter()
                .map(|day| {
                    let median = nan_median(day);
                    if median >= 1. {
                        recoded += 1;
                        f64::NAN
                    } else {
                        median
                    }
                })
                .collect::<Vec<_>>();
            if recoded > 0 {
                warn!(
                    column = source.as_str(),
                    days = recoded,
                    "daily albedo of 1 or more treated as missing"
                );
            }

            columns.insert(target.clone(), forward_fill(&medians));
        }

        debug!(
            days = days.len(),
            channels = columns.len(),
            "computed daily albedo"
        );

        Ok(Self { days, columns })
    }

    pub fn days(&self) -> &[NaiveDate] {
        &self.days
    }

    pub fn column(&self, name: &str) -> Result<&[f64], BifiError> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| BifiError::MissingColumn(name.to_string()))
    }

    /// Spreads the daily values onto rows, matching each row by the local date of its
    /// interval midpoint.
    pub fn per_row(&self, midpoints: &[Timestamp]) -> IndexMap<String, Vec<f64>> {
        let row_days = midpoint_dates(midpoints)
            .into_iter()
            .map(|date| self.days.binary_search(&date).ok())
            .collect::<Vec<_>>();

        self.columns
            .iter()
            .map(|(name, daily)| {
                let values = row_days
                    .iter()
                    .map(|day| day.map_or(f64::NAN, |day| daily[day]))
                    .collect();
                (name.clone(), values)
            })
            .collect()
    }
}

fn midpoint_dates(midpoints: &[Timestamp]) -> Vec<NaiveDate> {
    midpoints.iter().map(Timestamp::date_naive).collect()
}

fn day_offset(days: &[NaiveDate], date: NaiveDate) -> usize {
    // days is contiguous and starts no later than any row's date
    date.signed_duration_since(days[0]).num_days() as usize
}
