//! Wide-format telemetry table: one timezone-aware timestamp per row (interval start)
//! and one `f64` column per physical channel, with NaN for a missing reading.

use crate::errors::{check_length, BifiError};
use chrono::{DateTime, FixedOffset};
use csv::{ReaderBuilder, WriterBuilder};
use indexmap::IndexMap;
use itertools::Itertools;
use std::io::{Read, Write};

pub type Timestamp = DateTime<FixedOffset>;

/// Format pandas writes for a timezone-aware index, accepted alongside RFC 3339.
const PANDAS_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%:z";
const INDEX_LABEL: &str = "timestamp";

#[derive(Clone, Debug, PartialEq)]
pub struct Timeseries {
    index: Vec<Timestamp>,
    columns: IndexMap<String, Vec<f64>>,
}

/// One row of the long (melted) form.
#[derive(Clone, Debug, PartialEq)]
pub struct LongRecord {
    pub timestamp: Timestamp,
    pub variable: String,
    pub value: f64,
}

impl Timeseries {
    /// Builds a table, checking that every column is parallel to `index` and that the
    /// index is strictly increasing.
    pub fn new(
        index: Vec<Timestamp>,
        columns: IndexMap<String, Vec<f64>>,
    ) -> Result<Self, BifiError> {
        if let Some(position) = index.windows(2).position(|pair| pair[1] <= pair[0]) {
            return Err(BifiError::UnsortedIndex(position + 1));
        }
        for (name, values) in &columns {
            check_length(name, index.len(), values)?;
        }

        Ok(Self { index, columns })
    }

    pub fn index(&self) -> &[Timestamp] {
        &self.index
    }

    pub fn len(&self) -> usize {
        self.index.len()
    }

    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.keys().map(String::as_str)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }

    pub fn column(&self, name: &str) -> Result<&[f64], BifiError> {
        self.columns
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| BifiError::MissingColumn(name.to_string()))
    }

    /// Adds a column, or replaces one of the same name in place.
    pub fn with_column(
        mut self,
        name: impl Into<String>,
        values: Vec<f64>,
    ) -> Result<Self, BifiError> {
        let name = name.into();
        check_length(&name, self.len(), &values)?;
        self.columns.insert(name, values);
        Ok(self)
    }

    /// Rows with `start <= timestamp < end`; an open bound keeps that side unfiltered.
    pub fn between(&self, start: Option<Timestamp>, end: Option<Timestamp>) -> Self {
        let keep = self
            .index
            .iter()
            .map(|ts| start.map_or(true, |start| *ts >= start) && end.map_or(true, |end| *ts < end))
            .collect::<Vec<_>>();

        let pick = |values: &[f64]| {
            values
                .iter()
                .zip(&keep)
                .filter_map(|(value, keep)| keep.then_some(*value))
                .collect::<Vec<_>>()
        };

        Self {
            index: self
                .index
                .iter()
                .zip(&keep)
                .filter_map(|(ts, keep)| keep.then_some(*ts))
                .collect(),
            columns: self
                .columns
                .iter()
                .map(|(name, values)| (name.clone(), pick(values.as_slice())))
                .collect(),
        }
    }

    /// Keeps only the named columns, in the order given.
    pub fn select<S: AsRef<str>>(&self, variables: &[S]) -> Result<Self, BifiError> {
        let columns = variables
            .iter()
            .map(|name| {
                let name = name.as_ref();
                self.column(name)
                    .map(|values| (name.to_string(), values.to_vec()))
            })
            .collect::<Result<IndexMap<_, _>, _>>()?;

        Ok(Self {
            index: self.index.clone(),
            columns,
        })
    }

    /// Long form: one record per (variable, timestamp), grouped by variable.
    pub fn melt(&self) -> Vec<LongRecord> {
        self.columns
            .iter()
            .flat_map(|(variable, values)| {
                self.index
                    .iter()
                    .zip(values)
                    .map(move |(timestamp, value)| LongRecord {
                        timestamp: *timestamp,
                        variable: variable.clone(),
                        value: *value,
                    })
            })
            .collect()
    }

    /// Reads a wide CSV whose first column holds the timestamps. Empty cells are
    /// missing values. Rows are sorted by timestamp.
    pub fn read_csv(reader: impl Read) -> Result<Self, BifiError> {
        let mut reader = ReaderBuilder::new().has_headers(true).from_reader(reader);
        let names = reader
            .headers()?
            .iter()
            .skip(1)
            .map(str::to_string)
            .collect::<Vec<_>>();

        let mut rows: Vec<(Timestamp, Vec<f64>)> = vec![];
        for (row_idx, record) in reader.records().enumerate() {
            let record = record?;
            let timestamp = parse_timestamp(record.get(0).unwrap_or_default())?;
            let values = names
                .iter()
                .enumerate()
                .map(|(col_idx, name)| parse_value(record.get(col_idx + 1), name, row_idx))
                .collect::<Result<Vec<_>, _>>()?;
            rows.push((timestamp, values));
        }
        rows.sort_by_key(|(timestamp, _)| *timestamp);

        let index = rows.iter().map(|(timestamp, _)| *timestamp).collect();
        let columns = names
            .into_iter()
            .enumerate()
            .map(|(col_idx, name)| (name, rows.iter().map(|(_, values)| values[col_idx]).collect()))
            .collect();

        Self::new(index, columns)
    }

    /// Writes the wide table as CSV, leaving missing values empty.
    pub fn write_csv(&self, writer: impl Write) -> Result<(), BifiError> {
        let mut writer = WriterBuilder::new().from_writer(writer);

        writer.write_record(std::iter::once(INDEX_LABEL).chain(self.column_names()))?;
        for (row_idx, timestamp) in self.index.iter().enumerate() {
            writer.write_record(
                std::iter::once(timestamp.to_rfc3339()).chain(
                    self.columns
                        .values()
                        .map(|values| format_value(values[row_idx])),
                ),
            )?;
        }
        writer.flush()?;

        Ok(())
    }
}

/// Writes long-form records as `timestamp,variable,value` CSV.
pub fn write_long_csv(records: &[LongRecord], writer: impl Write) -> Result<(), BifiError> {
    let mut writer = WriterBuilder::new().from_writer(writer);

    writer.write_record([INDEX_LABEL, "variable", "value"])?;
    for record in records {
        writer.write_record([
            record.timestamp.to_rfc3339(),
            record.variable.clone(),
            format_value(record.value),
        ])?;
    }
    writer.flush()?;

    Ok(())
}

/// Distinct variable names of a long-form table, in first-seen order.
pub fn long_variables(records: &[LongRecord]) -> Vec<&str> {
    records
        .iter()
        .map(|record| record.variable.as_str())
        .unique()
        .collect()
}

fn parse_timestamp(value: &str) -> Result<Timestamp, BifiError> {
    let value = value.trim();
    DateTime::parse_from_rfc3339(value)
        .or_else(|_| DateTime::parse_from_str(value, PANDAS_TIMESTAMP_FORMAT))
        .map_err(|source| BifiError::Timestamp {
            value: value.to_string(),
            source,
        })
}

fn parse_value(cell: Option<&str>, name: &str, row_idx: usize) -> Result<f64, BifiError> {
    match cell.map(str::trim) {
        None | Some("") => Ok(f64::NAN),
        Some(cell) => cell.parse::<f64>().map_err(|_| {
            BifiError::InvalidInput(format!(
                "value '{cell}' in column '{name}' at data row {row_idx} is not a number"
            ))
        }),
    }
}

fn format_value(value: f64) -> String {
    if value.is_nan() {
        String::new()
    } else {
        value.to_string()
    }
}
