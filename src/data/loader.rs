//! CSV import of observations and export of interval forecasts.

use crate::core::{IntervalForecast, MissingValuePolicy, WindSeries};
use crate::error::{ForecastError, Result};
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, warn};

const TIMESTAMP_HEADERS: [&str; 5] = ["timestamp", "time", "date", "datetime", "ds"];

/// How to read a series out of a CSV file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvOptions {
    /// Value column by header name or zero-based index; first numeric column
    /// when unset.
    pub column: Option<String>,
    /// Timestamp column; detected from common header names when unset.
    pub timestamp_column: Option<String>,
    pub delimiter: u8,
    pub missing: MissingValuePolicy,
}

impl Default for CsvOptions {
    fn default() -> Self {
        Self {
            column: None,
            timestamp_column: None,
            delimiter: b',',
            missing: MissingValuePolicy::ForwardFill,
        }
    }
}

impl CsvOptions {
    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_timestamp_column(mut self, column: impl Into<String>) -> Self {
        self.timestamp_column = Some(column.into());
        self
    }

    pub fn with_delimiter(mut self, delimiter: u8) -> Self {
        self.delimiter = delimiter;
        self
    }

    pub fn with_missing(mut self, missing: MissingValuePolicy) -> Self {
        self.missing = missing;
        self
    }
}

fn find_column(headers: &csv::StringRecord, name: &str) -> Result<usize> {
    headers
        .iter()
        .position(|h| h == name)
        .or_else(|| name.parse::<usize>().ok().filter(|&i| i < headers.len()))
        .ok_or_else(|| ForecastError::Parse(format!("column '{name}' not found")))
}

/// Parse RFC 3339 or one of the common naive layouts (read as UTC).
pub fn parse_timestamp(text: &str) -> Option<DateTime<Utc>> {
    let text = text.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(text, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

/// Load one column of a CSV file as a [`WindSeries`].
///
/// Cells that do not parse as numbers become missing values and are then
/// resolved with `options.missing`.
pub fn load_csv(path: impl AsRef<Path>, options: &CsvOptions) -> Result<WindSeries> {
    let path = path.as_ref();
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .trim(csv::Trim::All)
        .from_path(path)?;
    let headers = reader.headers()?.clone();
    let records: Vec<csv::StringRecord> = reader.records().collect::<std::result::Result<_, _>>()?;
    if records.is_empty() {
        return Err(ForecastError::EmptyData);
    }

    let ts_idx = match &options.timestamp_column {
        Some(name) => Some(find_column(&headers, name)?),
        None => headers
            .iter()
            .position(|h| TIMESTAMP_HEADERS.contains(&h.to_ascii_lowercase().as_str())),
    };

    let value_idx = match &options.column {
        Some(name) => find_column(&headers, name)?,
        None => (0..headers.len())
            .filter(|&i| Some(i) != ts_idx)
            .find(|&i| {
                records
                    .iter()
                    .any(|r| r.get(i).is_some_and(|f| f.parse::<f64>().is_ok()))
            })
            .ok_or_else(|| ForecastError::Parse("no numeric column found".to_string()))?,
    };

    let values: Vec<f64> = records
        .iter()
        .map(|r| {
            r.get(value_idx)
                .and_then(|f| f.parse::<f64>().ok())
                .unwrap_or(f64::NAN)
        })
        .collect();

    let label = headers.get(value_idx).unwrap_or("value").to_string();
    let series = match ts_idx {
        Some(idx) => {
            let timestamps = records
                .iter()
                .enumerate()
                .map(|(row, r)| {
                    let cell = r.get(idx).unwrap_or("");
                    parse_timestamp(cell).ok_or_else(|| {
                        ForecastError::TimestampError(format!(
                            "row {}: cannot parse '{cell}'",
                            row + 1
                        ))
                    })
                })
                .collect::<Result<Vec<_>>>()?;
            WindSeries::new(timestamps, values)?
        }
        None => WindSeries::from_values(values),
    }
    .with_label(label);

    debug!(path = %path.display(), rows = series.len(), column = series.label(), "loaded csv");

    if series.has_missing_values() {
        let missing = series.values().iter().filter(|v| !v.is_finite()).count();
        warn!(missing, policy = ?options.missing, "repairing missing values");
        return series.sanitized(options.missing);
    }
    Ok(series)
}

#[derive(Debug, Serialize)]
struct ForecastRow {
    index: usize,
    timestamp: Option<String>,
    actual: f64,
    lower: f64,
    point: f64,
    upper: f64,
    covered: bool,
}

/// Write actuals next to their intervals, one row per window.
///
/// Columns: `index,timestamp,actual,lower,point,upper,covered`.
pub fn write_forecast_csv(
    path: impl AsRef<Path>,
    actual: &[f64],
    forecast: &IntervalForecast,
    timestamps: Option<&[DateTime<Utc>]>,
) -> Result<()> {
    if actual.len() != forecast.len() {
        return Err(ForecastError::DimensionMismatch {
            expected: forecast.len(),
            got: actual.len(),
        });
    }
    if let Some(ts) = timestamps {
        if ts.len() != actual.len() {
            return Err(ForecastError::DimensionMismatch {
                expected: actual.len(),
                got: ts.len(),
            });
        }
    }

    let mut writer = csv::Writer::from_path(path.as_ref())?;
    for (i, (interval, &y)) in forecast.iter().zip(actual).enumerate() {
        writer.serialize(ForecastRow {
            index: i,
            timestamp: timestamps.map(|ts| ts[i].to_rfc3339()),
            actual: y,
            lower: interval.lower,
            point: interval.point,
            upper: interval.upper,
            covered: interval.contains(y),
        })?;
    }
    writer.flush()?;
    Ok(())
}

#[derive(Debug, Deserialize)]
struct IntervalRow {
    actual: f64,
    lower: f64,
    upper: f64,
    #[serde(default)]
    point: Option<f64>,
}

/// Read `actual,lower,upper` (and optionally `point`) columns, e.g. a file
/// written by [`write_forecast_csv`] or produced by another model.
pub fn read_interval_csv(path: impl AsRef<Path>) -> Result<(Vec<f64>, IntervalForecast)> {
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path.as_ref())?;

    let mut actual = Vec::new();
    let mut lower = Vec::new();
    let mut point = Vec::new();
    let mut upper = Vec::new();
    for row in reader.deserialize() {
        let row: IntervalRow = row?;
        actual.push(row.actual);
        lower.push(row.lower);
        point.push(row.point.unwrap_or(0.5 * (row.lower + row.upper)));
        upper.push(row.upper);
    }
    if actual.is_empty() {
        return Err(ForecastError::EmptyData);
    }
    Ok((actual, IntervalForecast::from_bounds(lower, point, upper)?))
}
